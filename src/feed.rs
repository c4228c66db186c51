use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::ScanError;
use crate::types::PortRange;

/// Hands out every port of a range exactly once to any number of concurrent
/// consumers.
///
/// Backed by a single atomic cursor: `next` never blocks and keeps returning
/// `None` once the range is drained.
#[derive(Debug)]
pub struct PortFeed {
    cursor: AtomicU32,
    end: u32,
    start: u32,
}

impl PortFeed {
    pub fn new(min: u16, max: u16) -> Result<Self, ScanError> {
        PortRange::new(min, max).map(Self::from_range)
    }

    pub fn from_range(range: PortRange) -> Self {
        Self {
            cursor: AtomicU32::new(u32::from(range.min())),
            end: u32::from(range.max()) + 1,
            start: u32::from(range.min()),
        }
    }

    /// Claim the next port, or `None` when the feed is exhausted.
    pub fn next(&self) -> Option<u16> {
        // The cursor stops at `end`, so calls after exhaustion never move it.
        self.cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                (c < self.end).then_some(c + 1)
            })
            .ok()
            .map(|claimed| claimed as u16)
    }

    /// Ports not yet claimed.
    pub fn remaining(&self) -> u64 {
        u64::from(self.end - self.cursor.load(Ordering::Relaxed))
    }

    /// Total ports the feed was created with.
    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
