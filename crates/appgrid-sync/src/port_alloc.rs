//! Plugin port allocator.
//!
//! Inbound-network plugins put a proxy in front of each exposed container
//! port. The proxy listens on a port taken from a bounded range at the top
//! of the port space. Allocation is per component and plugin model: the
//! caller passes the ports already held in that scope, read inside the same
//! transaction that will persist the result.

use std::collections::BTreeSet;

use appgrid_core::config::{DEFAULT_STREAM_PORT_END, DEFAULT_STREAM_PORT_START, StreamPortsConfig};

use crate::error::{SyncError, SyncResult};

/// Hands out proxy ports from `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAllocator {
    start: u16,
    end: u16,
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_PORT_START, DEFAULT_STREAM_PORT_END)
    }
}

impl From<&StreamPortsConfig> for PortAllocator {
    fn from(cfg: &StreamPortsConfig) -> Self {
        Self::new(cfg.start, cfg.end)
    }
}

impl PortAllocator {
    pub fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn range(&self) -> (u16, u16) {
        (self.start, self.end)
    }

    /// Allocate one port per entry of `requested`, in input order.
    ///
    /// The result never contains a port from `existing` and never repeats a
    /// port, since the cursor only moves forward. Fails instead of wrapping
    /// when the range runs out.
    pub fn allocate(&self, existing: &BTreeSet<u16>, requested: &[u16]) -> SyncResult<Vec<u16>> {
        let mut allocated = Vec::with_capacity(requested.len());
        // u32 so that stepping past 65535 cannot overflow.
        let mut cursor = u32::from(self.start);

        for _ in requested {
            let port = loop {
                if cursor > u32::from(self.end) {
                    return Err(SyncError::PortRangeExhausted {
                        start: self.start,
                        end: self.end,
                    });
                }
                let candidate = cursor as u16;
                cursor += 1;
                if !existing.contains(&candidate) {
                    break candidate;
                }
            };
            allocated.push(port);
        }
        Ok(allocated)
    }

    /// Allocate a single port.
    pub fn allocate_one(&self, existing: &BTreeSet<u16>) -> SyncResult<u16> {
        let mut ports = self.allocate(existing, &[0])?;
        ports.pop().ok_or(SyncError::PortRangeExhausted {
            start: self.start,
            end: self.end,
        })
    }
}
