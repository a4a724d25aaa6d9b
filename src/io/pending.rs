//! Pending-request table
//!
//! Maps a correlation id to the in-flight request awaiting its response.
//! Each entry leaves the table exactly once: either taken by the matching
//! response or cancelled in bulk when the connection closes.

use crate::protocol::request::Request;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, warn};

/// A written request waiting for its response
#[derive(Debug)]
pub struct InFlight {
    pub request: Request,
    pub sent_at: Instant,
}

/// Thread-safe id → request table
#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<u64, InFlight>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request under its id
    ///
    /// # Returns
    /// `Err(request)` if the id is 0 or already registered
    pub fn insert(&self, request: Request) -> std::result::Result<(), Request> {
        let id = request.id();
        if id == 0 {
            return Err(request);
        }

        let mut entries = self.entries.lock();
        if entries.contains_key(&id) {
            warn!(id = id, "Duplicate request id, not registering");
            return Err(request);
        }

        entries.insert(
            id,
            InFlight {
                request,
                sent_at: Instant::now(),
            },
        );
        debug!(id = id, pending = entries.len(), "Registered pending request");
        Ok(())
    }

    /// Remove and return the entry for `id`
    pub fn take(&self, id: u64) -> Option<InFlight> {
        self.entries.lock().remove(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// Restart the round-trip clock for `id` once its line is on the wire
    pub fn mark_sent(&self, id: u64) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.sent_at = Instant::now();
        }
    }

    /// Cancel every entry, releasing blocked waiters
    ///
    /// # Returns
    /// Number of requests cancelled
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<InFlight> = self.entries.lock().drain().map(|(_, v)| v).collect();
        let count = drained.len();
        for mut entry in drained {
            entry.request.cancel();
        }
        if count > 0 {
            debug!(cancelled = count, "Cancelled pending requests");
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
