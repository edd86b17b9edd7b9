//! The closed set of roles host code can implement
//!
//! Roles are fixed capability contracts defined by the engine. Host
//! code fulfills one by implementing the trait directly or by building
//! an extension descriptor (see [`crate::extension`]). Every method has
//! a no-op default, so partial implementations are always safe to
//! dispatch.

/// Engine-assigned identity of a registered interface. Unique among
/// the interfaces currently registered with one simulation context.
pub type InterfaceId = u32;

/// Role name used in dispatch-failure diagnostics.
pub const INTERFACE_ROLE: &str = "Interface";

/// Role name used in dispatch-failure diagnostics.
pub const SIGNAL_SINK_ROLE: &str = "SignalSink";

/// Observer role notified of simulation lifecycle events.
///
/// The engine invokes these methods synchronously from inside its own
/// blocking calls (`step`, `add_processor_by_type`, `clear`). Overrides
/// must not assume a particular host thread and must not re-enter the
/// owning context.
pub trait Interface: Send {
    /// Invoked when the engine stops simulating, e.g. at the end of a
    /// `step` call.
    fn simulation_has_stopped(&mut self) {}

    /// Invoked when a processor is added to the simulation context.
    fn new_processor(&mut self, _name: &str) {}

    /// Invoked when a non-processor module is instantiated.
    fn new_module(&mut self, _name: &str) {}

    /// Invoked when the interface should refresh whatever it mirrors.
    fn update(&mut self) {}
}

/// Sink role receiving digital level changes from a pin monitor.
///
/// After a successful attach, the pin's monitor owns the sink and
/// invokes [`SignalSink::set_sink_state`] on every logical level
/// change. [`SignalSink::release`] is the monitor's detach notification
/// and is called exactly once, just before the sink is dropped.
pub trait SignalSink: Send {
    /// The monitored pin changed to `state` (a logic-level character
    /// such as `'0'`, `'1'`, `'Z'` or `'X'`).
    fn set_sink_state(&mut self, _state: char) {}

    /// The native side is done with this sink.
    fn release(&mut self) {}
}
