use crate::error::ScanError;
use crate::feed::PortFeed;
use crate::types::{ProbeOutcome, ScanRequest, ScanResults};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Scan every port of `request.range` on `request.target` with a fixed pool of workers.
///
/// - Spawns exactly `pool_size` tasks that drain a shared [`PortFeed`].
/// - Uses `tokio::time::timeout` to bound connect time per socket.
/// - Each worker keeps its open ports privately; they are merged after every task joined.
/// - Per-port failures are classified, never propagated.
pub async fn scan(request: &ScanRequest) -> Result<ScanResults, ScanError> {
    scan_internal(request, None, None).await
}

/// Variant that accepts a `CancellationToken` to allow external cancellation.
///
/// Once cancelled, workers stop claiming ports. Probes already in flight still
/// finish, and the ports found so far are returned.
pub async fn scan_with_cancel(
    request: &ScanRequest,
    cancel: CancellationToken,
) -> Result<ScanResults, ScanError> {
    scan_internal(request, Some(cancel), None).await
}

/// Live counters shared between the probe pool and an observer.
///
/// Use a fresh instance per scan.
#[derive(Clone, Debug)]
pub struct SharedProgress {
    pub scanned_done: Arc<AtomicU64>,
    pub open_count: Arc<AtomicU64>,
    pub closed_count: Arc<AtomicU64>,
    pub timed_out_count: Arc<AtomicU64>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self {
            scanned_done: Arc::new(AtomicU64::new(0)),
            open_count: Arc::new(AtomicU64::new(0)),
            closed_count: Arc::new(AtomicU64::new(0)),
            timed_out_count: Arc::new(AtomicU64::new(0)),
        }
    }

    fn record(&self, outcome: ProbeOutcome) {
        let counter = match outcome {
            ProbeOutcome::Open => &self.open_count,
            ProbeOutcome::Closed => &self.closed_count,
            ProbeOutcome::Timedout => &self.timed_out_count,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.scanned_done.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for SharedProgress {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn scan_with_shared(
    request: &ScanRequest,
    cancel: CancellationToken,
    shared: SharedProgress,
) -> Result<ScanResults, ScanError> {
    scan_internal(request, Some(cancel), Some(shared)).await
}

async fn scan_internal(
    request: &ScanRequest,
    cancel_opt: Option<CancellationToken>,
    shared_opt: Option<SharedProgress>,
) -> Result<ScanResults, ScanError> {
    let progress = shared_opt.unwrap_or_default();
    let cancel = cancel_opt.unwrap_or_default();
    let feed = Arc::new(PortFeed::from_range(request.range));

    info!(
        host = %request.target,
        range = %request.range,
        pool = request.pool_size,
        timeout_ms = request.timeout.as_millis() as u64,
        "starting scan"
    );

    let mut set = JoinSet::new();
    for _ in 0..request.pool_size {
        let feed = feed.clone();
        let progress = progress.clone();
        let cancel = cancel.clone();
        let target = request.target;
        let timeout = request.timeout;
        set.spawn(async move { run_worker(target, timeout, &feed, &progress, &cancel).await });
    }

    let mut open_ports = Vec::new();
    while let Some(res) = set.join_next().await {
        open_ports.extend(res?);
    }

    let results = ScanResults {
        scanned_total: request.range.len(),
        scanned_done: progress.scanned_done.load(Ordering::Relaxed),
        open_count: progress.open_count.load(Ordering::Relaxed),
        closed_count: progress.closed_count.load(Ordering::Relaxed),
        timed_out_count: progress.timed_out_count.load(Ordering::Relaxed),
        open_ports,
    };
    if cancel.is_cancelled() {
        warn!(
            scanned = results.scanned_done,
            total = results.scanned_total,
            "scan cancelled before the range was exhausted"
        );
    }
    info!(
        scanned = results.scanned_done,
        open = results.open_count,
        timed_out = results.timed_out_count,
        "scan finished"
    );
    Ok(results)
}

/// One pool worker: claim ports until the feed runs dry or the scan is cancelled.
async fn run_worker(
    target: IpAddr,
    timeout: Duration,
    feed: &PortFeed,
    progress: &SharedProgress,
    cancel: &CancellationToken,
) -> Vec<u16> {
    let mut open = Vec::new();
    while !cancel.is_cancelled() {
        let Some(port) = feed.next() else {
            break;
        };
        let outcome = probe(SocketAddr::new(target, port), timeout).await;
        progress.record(outcome);
        match outcome {
            ProbeOutcome::Open => {
                debug!(port, "found open port");
                open.push(port);
            }
            ProbeOutcome::Timedout => warn!(port, "timed out"),
            ProbeOutcome::Closed => {}
        }
    }
    open
}

/// Attempt a single TCP connection to `addr` and classify the result.
///
/// An accepted connection is closed right away; no data is exchanged.
/// Transient dial errors are reported and count as `Closed` for this probe.
/// They are not retried.
pub async fn probe(addr: SocketAddr, timeout: Duration) -> ProbeOutcome {
    match time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => classify_connected(&stream),
        Ok(Err(err)) => {
            if is_transient(&err) {
                warn!(%addr, error = %err, "transient dial error");
            } else {
                trace!(%addr, error = %err, "connect failed");
            }
            classify_error(&err)
        }
        Err(_elapsed) => ProbeOutcome::Timedout,
    }
}

/// An established stream counts as `Open` unless it is a loopback self-connect:
/// the kernel picked the destination port as the source port and the socket
/// completed a simultaneous open with itself, with nothing listening.
fn classify_connected(stream: &TcpStream) -> ProbeOutcome {
    match (stream.local_addr(), stream.peer_addr()) {
        (Ok(local), Ok(peer)) if local == peer => {
            debug!(addr = %peer, "self-connect, no listener");
            ProbeOutcome::Closed
        }
        _ => ProbeOutcome::Open,
    }
}

/// Map a failed connect to its outcome. Only a kernel-level timeout counts as
/// `Timedout`; everything else (refused, unreachable, reset, ...) is `Closed`.
pub fn classify_error(err: &io::Error) -> ProbeOutcome {
    match err.kind() {
        io::ErrorKind::TimedOut => ProbeOutcome::Timedout,
        _ => ProbeOutcome::Closed,
    }
}

/// Temporary failures where a later attempt might succeed: interrupted calls,
/// resets and local resource exhaustion.
pub fn is_transient(err: &io::Error) -> bool {
    match err.kind() {
        io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => true,
        _ => is_transient_os_error(err),
    }
}

#[cfg(unix)]
fn is_transient_os_error(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EMFILE) | Some(libc::ENFILE) | Some(libc::ENOBUFS) | Some(libc::EAGAIN)
    )
}

#[cfg(not(unix))]
fn is_transient_os_error(_err: &io::Error) -> bool {
    false
}
