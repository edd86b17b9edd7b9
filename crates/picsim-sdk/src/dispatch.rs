//! Engine-to-host dispatch with panic isolation
//!
//! The engine cannot propagate a host-side failure back through its own
//! call stack, so every native-to-host call goes through
//! [`dispatch_guarded`]: panics are caught at the boundary, converted
//! to a [`BridgeError::DispatchFailure`] record, counted, and the call
//! site continues. The policy is fixed log-and-continue; all role
//! methods are notification-style.
//!
//! [`InterfaceTable`] is the dispatch table for the `Interface` role:
//! it adopts host implementations, assigns each a unique id from a
//! monotonically increasing sequence, and fans notifications out to
//! every registered entry.

use std::panic::{self, AssertUnwindSafe};

use crate::error::{BridgeError, BridgeResult};
use crate::handle::InterfaceHandle;
use crate::roles::{Interface, InterfaceId, INTERFACE_ROLE};

/// Diagnostics for dispatch failures. No failure is dropped without
/// incrementing the counter.
#[derive(Debug, Default, Clone)]
pub struct DispatchStats {
    failures: u64,
    last_failure: Option<BridgeError>,
}

impl DispatchStats {
    /// Number of host overrides that failed during dispatch.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// The most recent failure, if any.
    pub fn last_failure(&self) -> Option<&BridgeError> {
        self.last_failure.as_ref()
    }

    fn record(&mut self, role: &'static str, method: &'static str, message: String) {
        self.failures += 1;
        self.last_failure = Some(BridgeError::DispatchFailure {
            role,
            method,
            message,
        });
    }
}

/// Invoke a host override, absorbing any panic into `stats`.
///
/// Returns `true` if the override completed normally.
pub fn dispatch_guarded(
    role: &'static str,
    method: &'static str,
    stats: &mut DispatchStats,
    f: impl FnOnce(),
) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            stats.record(role, method, message);
            false
        }
    }
}

/// Dispatch table for registered `Interface` implementations.
pub struct InterfaceTable {
    entries: Vec<(InterfaceId, Box<dyn Interface>)>,
    seq: InterfaceId,
    stats: DispatchStats,
}

impl InterfaceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            seq: 0,
            stats: DispatchStats::default(),
        }
    }

    /// Adopt a host interface implementation, assigning the next id.
    ///
    /// On failure the payload stays with the handle and the caller must
    /// release it; on success the table owns the implementation until
    /// [`InterfaceTable::remove`] or [`InterfaceTable::clear`].
    pub fn adopt(&mut self, handle: &mut InterfaceHandle) -> BridgeResult<InterfaceId> {
        let payload = handle.take_for_adoption()?;
        self.seq += 1;
        self.entries.push((self.seq, payload));
        Ok(self.seq)
    }

    /// Remove and drop the implementation with the given id. Returns
    /// `false` if no such id is registered.
    pub fn remove(&mut self, id: InterfaceId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(eid, _)| *eid != id);
        self.entries.len() != before
    }

    /// Number of registered implementations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no implementations are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered ids, in registration order.
    pub fn ids(&self) -> Vec<InterfaceId> {
        self.entries.iter().map(|(id, _)| *id).collect()
    }

    /// Dispatch diagnostics.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Drop all registered implementations. The id sequence is not
    /// rewound; ids stay unique for the lifetime of the table.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = DispatchStats::default();
    }

    /// Notify every entry that the simulation stopped.
    pub fn notify_simulation_has_stopped(&mut self) {
        let stats = &mut self.stats;
        for (_, iface) in &mut self.entries {
            dispatch_guarded(INTERFACE_ROLE, "simulation_has_stopped", stats, || {
                iface.simulation_has_stopped()
            });
        }
    }

    /// Notify every entry of a newly added processor.
    pub fn notify_new_processor(&mut self, name: &str) {
        let stats = &mut self.stats;
        for (_, iface) in &mut self.entries {
            dispatch_guarded(INTERFACE_ROLE, "new_processor", stats, || {
                iface.new_processor(name)
            });
        }
    }

    /// Notify every entry of a newly instantiated module.
    pub fn notify_new_module(&mut self, name: &str) {
        let stats = &mut self.stats;
        for (_, iface) in &mut self.entries {
            dispatch_guarded(INTERFACE_ROLE, "new_module", stats, || {
                iface.new_module(name)
            });
        }
    }

    /// Ask every entry to refresh itself.
    pub fn notify_update(&mut self) {
        let stats = &mut self.stats;
        for (_, iface) in &mut self.entries {
            dispatch_guarded(INTERFACE_ROLE, "update", stats, || iface.update());
        }
    }
}

impl Default for InterfaceTable {
    fn default() -> Self {
        Self::new()
    }
}
