use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ScanError;

/// Inclusive TCP port range, `1 <= min <= max <= 65535`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    min: u16,
    max: u16,
}

impl PortRange {
    pub fn new(min: u16, max: u16) -> Result<Self, ScanError> {
        if min == 0 || max < min {
            return Err(ScanError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u16 {
        self.min
    }

    pub fn max(&self) -> u16 {
        self.max
    }

    /// Number of ports in the range. Never zero.
    pub fn len(&self) -> u64 {
        u64::from(self.max) - u64::from(self.min) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.min..=self.max).contains(&port)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Terminal classification of a single probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Remote end accepted the connection.
    Open,
    /// Refused, unreachable, or any other non-timeout failure.
    Closed,
    /// No answer before the deadline.
    Timedout,
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Open => write!(f, "open"),
            ProbeOutcome::Closed => write!(f, "closed"),
            ProbeOutcome::Timedout => write!(f, "timed out"),
        }
    }
}

/// Validated input for one scan. The target is already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub target: IpAddr,
    pub range: PortRange,
    pub timeout: Duration,
    pub pool_size: usize,
}

impl ScanRequest {
    /// Checks pool size and timeout. Keeping `pool_size` within the process's
    /// descriptor budget is left to the caller (see [`crate::limits`]).
    pub fn new(
        target: IpAddr,
        range: PortRange,
        timeout: Duration,
        pool_size: usize,
    ) -> Result<Self, ScanError> {
        if pool_size == 0 {
            return Err(ScanError::InvalidPoolSize(pool_size));
        }
        if timeout.is_zero() {
            return Err(ScanError::ZeroTimeout);
        }
        Ok(Self {
            target,
            range,
            timeout,
            pool_size,
        })
    }
}

/// Aggregate results and progress counters.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanResults {
    pub scanned_total: u64,
    pub scanned_done: u64,
    pub open_count: u64,
    pub closed_count: u64,
    pub timed_out_count: u64,
    /// Open ports in the order workers reported them.
    pub open_ports: Vec<u16>,
}

impl ScanResults {
    /// Open ports in ascending order, for presentation.
    pub fn sorted_open_ports(&self) -> Vec<u16> {
        let mut ports = self.open_ports.clone();
        ports.sort_unstable();
        ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn range_rejects_reversed_and_zero() {
        assert!(matches!(
            PortRange::new(100, 1),
            Err(ScanError::InvalidRange { min: 100, max: 1 })
        ));
        assert!(PortRange::new(0, 10).is_err());
    }

    #[test]
    fn single_port_range_has_len_one() {
        let r = PortRange::new(8080, 8080).unwrap();
        assert_eq!(r.len(), 1);
        assert!(r.contains(8080));
        assert!(!r.contains(8081));
    }

    #[test]
    fn full_range_len() {
        let r = PortRange::new(1, u16::MAX).unwrap();
        assert_eq!(r.len(), 65_535);
        assert_eq!(r.to_string(), "1-65535");
    }

    #[test]
    fn request_validates_pool_and_timeout() {
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let range = PortRange::new(1, 100).unwrap();
        assert!(matches!(
            ScanRequest::new(ip, range, Duration::from_millis(200), 0),
            Err(ScanError::InvalidPoolSize(0))
        ));
        assert!(matches!(
            ScanRequest::new(ip, range, Duration::ZERO, 10),
            Err(ScanError::ZeroTimeout)
        ));
        assert!(ScanRequest::new(ip, range, Duration::from_millis(200), 10).is_ok());
    }

    #[test]
    fn sorted_open_ports_is_ascending() {
        let results = ScanResults {
            open_ports: vec![8080, 22, 443],
            ..Default::default()
        };
        assert_eq!(results.sorted_open_ports(), vec![22, 443, 8080]);
    }

    #[test]
    fn outcome_display() {
        assert_eq!(ProbeOutcome::Timedout.to_string(), "timed out");
        assert_eq!(ProbeOutcome::Open.to_string(), "open");
    }
}
