use std::net::IpAddr;

use tokio::net::lookup_host;
use tracing::debug;

use crate::error::ScanError;

/// Resolve a host name or literal address to the single IP that will be scanned.
///
/// IPv4 answers are preferred; an IPv6 answer is used only when the name has no
/// IPv4 mapping.
pub async fn resolve(host: &str) -> Result<IpAddr, ScanError> {
    let host = host.trim();
    let literal = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs: Vec<IpAddr> = lookup_host((host, 0))
        .await
        .map_err(|source| ScanError::Resolution {
            host: host.to_string(),
            source,
        })?
        .map(|saddr| saddr.ip())
        .collect();

    let ip = addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| ScanError::NoAddress(host.to_string()))?;

    debug!("Found `{}` mapped by target `{}`", ip, host);
    Ok(ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[tokio::test]
    async fn literal_ipv4_skips_lookup() {
        let ip = resolve("192.0.2.7").await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7)));
    }

    #[tokio::test]
    async fn bracketed_ipv6_literal() {
        let ip = resolve("[::1]").await.unwrap();
        assert_eq!(ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn localhost_resolves() {
        let ip = resolve("localhost").await.unwrap();
        assert!(ip.is_loopback());
    }

    #[tokio::test]
    async fn garbage_host_is_resolution_error() {
        let err = resolve("no such host.invalid").await.unwrap_err();
        assert!(err.is_resolution());
    }
}
