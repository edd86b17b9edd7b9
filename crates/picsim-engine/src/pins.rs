//! Pins and pin monitors
//!
//! Pins are owned by their processor and exposed to the host only as
//! views. Each pin carries a [`PinMonitor`] that adopts host
//! [`SignalSink`] implementations and fans out level changes to them.
//! After adoption the monitor owns a sink until the pin is torn down,
//! at which point the sink's `release` is invoked exactly once.

use picsim_sdk::{dispatch_guarded, DispatchStats, SignalSink, SinkHandle};
use picsim_sdk::{BridgeResult, SIGNAL_SINK_ROLE};

/// Monitor attached to one pin, owning the adopted sinks.
pub struct PinMonitor {
    sinks: Vec<Box<dyn SignalSink>>,
    stats: DispatchStats,
}

impl PinMonitor {
    fn new() -> Self {
        Self {
            sinks: Vec::new(),
            stats: DispatchStats::default(),
        }
    }

    /// Adopt a host sink. On success the monitor owns it and the
    /// handle's later `release()` calls fail with `UseAfterRelease`;
    /// on failure the payload stays with the caller.
    pub fn add_signal_sink(&mut self, handle: &mut SinkHandle) -> BridgeResult<()> {
        let sink = handle.take_for_adoption()?;
        self.sinks.push(sink);
        Ok(())
    }

    /// Number of adopted sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Dispatch diagnostics for this monitor's sinks.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    fn set_state(&mut self, state: char) {
        let stats = &mut self.stats;
        for sink in &mut self.sinks {
            dispatch_guarded(SIGNAL_SINK_ROLE, "set_sink_state", stats, || {
                sink.set_sink_state(state)
            });
        }
    }

    /// Notify and drop all adopted sinks.
    pub(crate) fn release_all(&mut self) {
        let stats = &mut self.stats;
        for sink in &mut self.sinks {
            dispatch_guarded(SIGNAL_SINK_ROLE, "release", stats, || sink.release());
        }
        self.sinks.clear();
    }
}

/// One digital I/O pin.
///
/// Levels are logic-level characters: `'0'`, `'1'`, high-impedance
/// `'Z'`, unknown `'X'`.
pub struct Pin {
    name: String,
    level: char,
    monitor: PinMonitor,
}

impl Pin {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: 'Z',
            monitor: PinMonitor::new(),
        }
    }

    /// Pin name, e.g. `porta3`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current logic level as a character.
    pub fn bit_char(&self) -> char {
        self.level
    }

    /// The pin's monitor, for attaching signal sinks.
    pub fn monitor(&self) -> &PinMonitor {
        &self.monitor
    }

    /// The pin's monitor, for attaching signal sinks.
    pub fn monitor_mut(&mut self) -> &mut PinMonitor {
        &mut self.monitor
    }

    /// Drive the pin to a new logical level. Sinks fire only on an
    /// actual change.
    pub(crate) fn set_level(&mut self, level: char) {
        if self.level != level {
            self.level = level;
            self.monitor.set_state(level);
        }
    }
}
