//! Simulation context: the owning aggregate for one session
//!
//! A [`SimulationContext`] owns the registered host interfaces, the
//! named processors, and the trace buffer of one simulation session.
//! Host code interacts with owned objects only through borrowed views;
//! ownership crosses the boundary exclusively via the adopt operations
//! (`add_interface`, `attach_signal_sink` on a pin monitor).
//!
//! Contexts are single-threaded by contract: every call is synchronous
//! and blocking, `step` is uninterruptible once invoked, and host
//! overrides run inside the blocking window. `step` takes `&mut self`,
//! so overrides cannot re-enter the context.

use std::collections::BTreeMap;

use picsim_sdk::{BridgeError, BridgeResult, DispatchStats, InterfaceHandle, InterfaceId};
use picsim_sdk::InterfaceTable;

use crate::error::{EngineError, EngineResult};
use crate::processor::{Processor, StepCondition};
use crate::registry::ProcessorRegistry;
use crate::trace::{ResetType, TraceBuffer, TraceEvent, TraceReader, TraceWriter};

/// The aggregate owning processors, interfaces, and the trace buffer
/// for one simulation session.
///
/// Lifecycle: created once per session; [`SimulationContext::clear`]
/// returns it to its initial empty state for reuse.
pub struct SimulationContext {
    processors: BTreeMap<String, Processor>,
    interfaces: InterfaceTable,
    trace: TraceBuffer,
    registry: ProcessorRegistry,
    cycles: u64,
}

impl SimulationContext {
    /// A context with the built-in processor types and the default
    /// trace capacity.
    pub fn new() -> Self {
        Self::with_registry(ProcessorRegistry::with_builtins())
    }

    /// A context with an injected processor registry.
    pub fn with_registry(registry: ProcessorRegistry) -> Self {
        Self {
            processors: BTreeMap::new(),
            interfaces: InterfaceTable::new(),
            trace: TraceBuffer::default(),
            registry,
            cycles: 0,
        }
    }

    /// Override the trace ring capacity. Clears any buffered events.
    pub fn set_trace_capacity(&mut self, capacity: usize) {
        self.trace = TraceBuffer::with_capacity(capacity);
    }

    /// The registry this context constructs processors from.
    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    // ========================================================================
    // Interfaces
    // ========================================================================

    /// Adopt a host interface implementation, returning its assigned
    /// id.
    ///
    /// On success the context owns the implementation and the caller
    /// must not release the handle; on failure the payload stays with
    /// the caller, who must release it.
    pub fn add_interface(&mut self, handle: &mut InterfaceHandle) -> BridgeResult<InterfaceId> {
        self.interfaces.adopt(handle)
    }

    /// Remove and drop the interface with the given id. Returns `false`
    /// when the id is not registered.
    pub fn remove_interface(&mut self, id: InterfaceId) -> bool {
        self.interfaces.remove(id)
    }

    /// Number of currently registered interfaces.
    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Diagnostics for interface dispatch failures.
    pub fn dispatch_stats(&self) -> &DispatchStats {
        self.interfaces.stats()
    }

    // ========================================================================
    // Processors
    // ========================================================================

    /// Construct a processor of a registered type and adopt it under
    /// `name`. The result is native-owned: the returned borrow is a
    /// view and no host release is ever required.
    pub fn add_processor_by_type(
        &mut self,
        type_name: &str,
        name: &str,
    ) -> EngineResult<&mut Processor> {
        let constructor = self
            .registry
            .find_by_type(type_name)
            .ok_or_else(|| EngineError::UnknownProcessorType(type_name.to_string()))?;
        if self.processors.contains_key(name) {
            return Err(BridgeError::AdoptionFailed(format!(
                "processor name {name:?} already in use"
            ))
            .into());
        }
        let processor = constructor.construct(name);
        self.processors.insert(name.to_string(), processor);
        self.interfaces.notify_new_processor(name);
        Ok(self.processors.get_mut(name).expect("just inserted"))
    }

    /// Borrow a processor by name.
    pub fn processor(&self, name: &str) -> Option<&Processor> {
        self.processors.get(name)
    }

    /// Mutably borrow a processor by name.
    pub fn processor_mut(&mut self, name: &str) -> Option<&mut Processor> {
        self.processors.get_mut(name)
    }

    /// Number of owned processors.
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Names of owned processors, in name order.
    pub fn processor_names(&self) -> Vec<&str> {
        self.processors.keys().map(|s| s.as_str()).collect()
    }

    // ========================================================================
    // Stepping and reset
    // ========================================================================

    /// Run the simulation until the condition is done, stepping every
    /// owned processor one cycle per iteration.
    ///
    /// Synchronous and blocking; host overrides invoked during the run
    /// execute inside this call's window. Ends by notifying registered
    /// interfaces (`update`, then `simulation_has_stopped`).
    pub fn step(&mut self, cond: impl Into<StepCondition>) {
        let mut cond = cond.into();
        self.trace
            .emplace(TraceEvent::CycleCounter { cycle: self.cycles });
        let mut cycle = 0u64;
        while cond.should_run(cycle) {
            let mut writer = TraceWriter::new(&mut self.trace);
            for processor in self.processors.values_mut() {
                processor.step_one(&mut writer);
            }
            self.cycles += 1;
            cycle += 1;
        }
        self.interfaces.notify_update();
        self.interfaces.notify_simulation_has_stopped();
    }

    /// Step a single named processor, leaving the others untouched.
    pub fn step_processor(
        &mut self,
        name: &str,
        cond: impl Into<StepCondition>,
    ) -> EngineResult<()> {
        let processor = self
            .processors
            .get_mut(name)
            .ok_or_else(|| EngineError::NoSuchProcessor(name.to_string()))?;
        self.trace
            .emplace(TraceEvent::CycleCounter { cycle: self.cycles });
        let mut cond = cond.into();
        let mut cycle = 0u64;
        let mut writer = TraceWriter::new(&mut self.trace);
        while cond.should_run(cycle) {
            processor.step_one(&mut writer);
            self.cycles += 1;
            cycle += 1;
        }
        self.interfaces.notify_update();
        self.interfaces.notify_simulation_has_stopped();
        Ok(())
    }

    /// Reset every owned processor with the given cause. Each
    /// processor traces one `reset` record.
    pub fn reset(&mut self, cause: ResetType) {
        for processor in self.processors.values_mut() {
            processor.reset(cause, &mut self.trace);
        }
        self.interfaces.notify_update();
    }

    /// Total simulated cycles since creation or the last `clear`.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    // ========================================================================
    // Trace access and teardown
    // ========================================================================

    /// The context's trace reader view.
    pub fn trace_reader(&mut self) -> TraceReader<'_> {
        TraceReader::new(&mut self.trace)
    }

    /// Release everything owned by this context and return it to its
    /// initial empty state.
    ///
    /// Attached signal sinks get their `release` notification, owned
    /// processors and interfaces are dropped, and the trace buffer is
    /// reset along with its `discarded` counter. The context is
    /// reusable afterwards; an identical registration sequence succeeds
    /// again.
    pub fn clear(&mut self) {
        for processor in self.processors.values_mut() {
            processor.release_sinks();
        }
        self.processors.clear();
        self.interfaces.clear();
        self.trace.clear();
        self.cycles = 0;
    }
}

impl Default for SimulationContext {
    fn default() -> Self {
        Self::new()
    }
}
