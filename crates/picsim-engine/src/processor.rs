//! Processors: state, memory loading, pin views, and stepping
//!
//! A [`Processor`] pairs generic state (program memory, file registers,
//! W, PC, pins) with an [`ExecutionModel`] implementing a concrete
//! instruction set. Processors are constructed through the registry and
//! adopted by a simulation context immediately; host code only ever
//! sees borrowed views.

use picsim_sdk::{BridgeError, BridgeResult};

use crate::pins::Pin;
use crate::trace::{ResetType, TraceBuffer, TraceEvent, TraceWriter};

/// Static layout of a processor type.
#[derive(Debug, Clone)]
pub struct ProcessorLayout {
    /// Program memory size in bytes.
    pub program_bytes: usize,
    /// File register count.
    pub register_count: usize,
    /// Number of I/O pins. At most 8; pins mirror the bits of the
    /// single 8-bit port register.
    pub pin_count: usize,
    /// Pin name prefix; pins are named `<prefix>0..`.
    pub pin_prefix: &'static str,
    /// File register mirrored onto the pins.
    pub port_addr: u16,
}

/// Mutable processor state shared with the execution model.
pub struct ProcessorState {
    name: String,
    type_name: String,
    program: Vec<u8>,
    regs: Vec<u8>,
    w: u8,
    pc: u16,
    asleep: bool,
    pins: Vec<Pin>,
    port_addr: u16,
}

impl ProcessorState {
    fn new(name: String, type_name: String, layout: &ProcessorLayout) -> Self {
        assert!(
            layout.pin_count <= 8,
            "pin_count {} exceeds the 8 bits of the port register",
            layout.pin_count
        );
        let mut pins = Vec::with_capacity(layout.pin_count);
        for i in 0..layout.pin_count {
            pins.push(Pin::new(format!("{}{}", layout.pin_prefix, i)));
        }
        let mut state = Self {
            name,
            type_name,
            program: vec![0; layout.program_bytes],
            regs: vec![0; layout.register_count],
            w: 0,
            pc: 0,
            asleep: false,
            pins,
            port_addr: layout.port_addr,
        };
        // Pins start driven low; no sinks can be attached yet.
        state.sync_pins();
        state
    }

    /// Working register value.
    pub fn w(&self) -> u8 {
        self.w
    }

    /// Set the working register.
    pub fn set_w(&mut self, value: u8) {
        self.w = value;
    }

    /// Program counter, in instruction words.
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Set the program counter.
    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    /// Put the processor to sleep; stepping becomes a no-op until
    /// reset.
    pub fn sleep(&mut self) {
        self.asleep = true;
    }

    /// True while the processor is asleep.
    pub fn is_asleep(&self) -> bool {
        self.asleep
    }

    /// Fetch a little-endian instruction word. Addresses beyond program
    /// memory read as zero.
    pub fn program_word(&self, word_addr: u16) -> u16 {
        let base = word_addr as usize * 2;
        if base + 1 >= self.program.len() {
            return 0;
        }
        u16::from_le_bytes([self.program[base], self.program[base + 1]])
    }

    /// Read a register without tracing (used for addressing decisions).
    pub fn peek_register(&self, addr: u16) -> u8 {
        self.regs.get(addr as usize).copied().unwrap_or(0)
    }

    /// Read a register, tracing the access.
    pub fn read_register(&mut self, addr: u16, trace: &mut TraceWriter<'_>) -> u8 {
        let value = self.peek_register(addr);
        trace.emplace(TraceEvent::ReadRegister {
            address: addr,
            value,
        });
        value
    }

    /// Write a register, tracing the access and driving the pins when
    /// the port register changes.
    pub fn write_register(&mut self, addr: u16, value: u8, trace: &mut TraceWriter<'_>) {
        if let Some(slot) = self.regs.get_mut(addr as usize) {
            *slot = value;
        }
        trace.emplace(TraceEvent::WriteRegister {
            address: addr,
            value,
        });
        if addr == self.port_addr {
            self.sync_pins();
        }
    }

    /// Reset register file, W, PC and wake the processor.
    pub fn reset_core(&mut self) {
        self.regs.iter_mut().for_each(|r| *r = 0);
        self.w = 0;
        self.pc = 0;
        self.asleep = false;
        self.sync_pins();
    }

    fn sync_pins(&mut self) {
        let port = self.peek_register(self.port_addr);
        for (i, pin) in self.pins.iter_mut().enumerate() {
            let level = if port & (1 << i) != 0 { '1' } else { '0' };
            pin.set_level(level);
        }
    }
}

/// Instruction-set implementation plugged into a [`Processor`].
pub trait ExecutionModel: Send {
    /// Apply a reset of the given cause to the state.
    fn reset(&mut self, state: &mut ProcessorState, cause: ResetType);

    /// Execute one simulated cycle, appending trace events.
    fn execute_cycle(&mut self, state: &mut ProcessorState, trace: &mut TraceWriter<'_>);

    /// Decode the instruction at `word_addr` to text, when possible.
    fn disasm(&self, _state: &ProcessorState, _word_addr: u16) -> Option<String> {
        None
    }
}

/// Structured step-count configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepConfig {
    /// Number of cycles to run; defaults to 1 when unset.
    pub num_steps: Option<u64>,
}

/// Condition controlling how long a `step` call runs.
///
/// Stepping is synchronous and uninterruptible once invoked; a host
/// that wants cancellable stepping must loop over short conditions
/// itself and check its own flag between calls.
pub enum StepCondition {
    /// Run a fixed number of cycles.
    Cycles(u64),
    /// Run while the predicate returns `true` for the upcoming cycle
    /// index (0-based within this call).
    While(Box<dyn FnMut(u64) -> bool + Send>),
    /// Run per a structured configuration.
    Config(StepConfig),
}

impl StepCondition {
    /// Run while `pred` returns `true` for the upcoming cycle index.
    pub fn while_cond(pred: impl FnMut(u64) -> bool + Send + 'static) -> Self {
        StepCondition::While(Box::new(pred))
    }

    /// Whether the cycle with this in-call index should run.
    pub fn should_run(&mut self, cycle_index: u64) -> bool {
        match self {
            StepCondition::Cycles(n) => cycle_index < *n,
            StepCondition::While(pred) => pred(cycle_index),
            StepCondition::Config(cfg) => cycle_index < cfg.num_steps.unwrap_or(1),
        }
    }
}

impl From<u64> for StepCondition {
    fn from(n: u64) -> Self {
        StepCondition::Cycles(n)
    }
}

impl From<StepConfig> for StepCondition {
    fn from(cfg: StepConfig) -> Self {
        StepCondition::Config(cfg)
    }
}

/// A simulated processor owned by its simulation context.
pub struct Processor {
    state: ProcessorState,
    model: Box<dyn ExecutionModel>,
}

impl Processor {
    /// Build a processor from a layout and an execution model. Called
    /// by processor constructors; host code goes through the registry.
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        layout: &ProcessorLayout,
        model: Box<dyn ExecutionModel>,
    ) -> Self {
        Self {
            state: ProcessorState::new(name.into(), type_name.into(), layout),
            model,
        }
    }

    /// Instance name, as given at construction.
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Processor type name.
    pub fn type_name(&self) -> &str {
        &self.state.type_name
    }

    /// Number of pins.
    pub fn pin_count(&self) -> usize {
        self.state.pins.len()
    }

    /// Pin view by 1-based index. Index 0 and indices beyond
    /// [`Processor::pin_count`] return `None`; absent pins are not an
    /// error.
    pub fn pin(&self, index: usize) -> Option<&Pin> {
        if index == 0 {
            return None;
        }
        self.state.pins.get(index - 1)
    }

    /// Mutable pin view by 1-based index; same indexing rules as
    /// [`Processor::pin`]. Needed to attach signal sinks.
    pub fn pin_mut(&mut self, index: usize) -> Option<&mut Pin> {
        if index == 0 {
            return None;
        }
        self.state.pins.get_mut(index - 1)
    }

    /// File register count.
    pub fn register_count(&self) -> usize {
        self.state.regs.len()
    }

    /// Register value by address, or `None` outside the register file.
    pub fn register(&self, addr: u16) -> Option<u8> {
        self.state.regs.get(addr as usize).copied()
    }

    /// Working register value.
    pub fn w(&self) -> u8 {
        self.state.w()
    }

    /// Program counter, in instruction words.
    pub fn pc(&self) -> u16 {
        self.state.pc()
    }

    /// True while the processor sleeps.
    pub fn is_asleep(&self) -> bool {
        self.state.is_asleep()
    }

    /// Instruction word at a word address, zero outside program
    /// memory.
    pub fn program_word(&self, word_addr: u16) -> u16 {
        self.state.program_word(word_addr)
    }

    /// Load raw instruction/data bytes at a byte offset into program
    /// memory.
    pub fn init_program_memory_at_index(
        &mut self,
        address: usize,
        bytes: &[u8],
    ) -> BridgeResult<()> {
        let size = self.state.program.len();
        let end = address
            .checked_add(bytes.len())
            .filter(|end| *end <= size)
            .ok_or(BridgeError::OutOfBounds {
                address,
                len: bytes.len(),
                size,
            })?;
        self.state.program[address..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Decode the instruction at `word_addr` to text, when the model
    /// can.
    pub fn disasm(&self, word_addr: u16) -> Option<String> {
        self.model.disasm(&self.state, word_addr)
    }

    /// Reset the processor, tracing a `reset` record with its cause.
    pub fn reset(&mut self, cause: ResetType, buffer: &mut TraceBuffer) {
        let mut writer = TraceWriter::new(buffer);
        self.model.reset(&mut self.state, cause);
        writer.emplace(TraceEvent::Reset { reset: cause });
    }

    /// Run until the condition is done. Synchronous and blocking;
    /// appends trace records as a side effect.
    pub fn step(&mut self, cond: impl Into<StepCondition>, buffer: &mut TraceBuffer) {
        let mut cond = cond.into();
        let mut writer = TraceWriter::new(buffer);
        let mut cycle = 0u64;
        while cond.should_run(cycle) {
            self.step_one(&mut writer);
            cycle += 1;
        }
    }

    /// Advance one cycle. Sleeping processors consume the cycle without
    /// executing.
    pub(crate) fn step_one(&mut self, trace: &mut TraceWriter<'_>) {
        if self.state.is_asleep() {
            return;
        }
        self.model.execute_cycle(&mut self.state, trace);
    }

    /// Notify and drop every sink attached to this processor's pins.
    pub(crate) fn release_sinks(&mut self) {
        for pin in &mut self.state.pins {
            pin.monitor_mut().release_all();
        }
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.state.name)
            .field("type", &self.state.type_name)
            .field("pc", &self.state.pc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct IdleModel;

    impl ExecutionModel for IdleModel {
        fn reset(&mut self, state: &mut ProcessorState, _cause: ResetType) {
            state.reset_core();
        }

        fn execute_cycle(&mut self, state: &mut ProcessorState, trace: &mut TraceWriter<'_>) {
            let pc = state.pc();
            trace.emplace(TraceEvent::IncrementPc {
                address: pc,
                target: None,
                insn: None,
            });
            state.set_pc(pc + 1);
        }
    }

    const LAYOUT: ProcessorLayout = ProcessorLayout {
        program_bytes: 64,
        register_count: 32,
        pin_count: 4,
        pin_prefix: "porta",
        port_addr: 0x05,
    };

    fn idle_proc() -> Processor {
        Processor::new("t", "idle", &LAYOUT, Box::new(IdleModel))
    }

    #[test]
    fn test_pin_indexing_is_one_based_and_total() {
        let p = idle_proc();
        let count = p.pin_count();
        assert_eq!(count, 4);
        assert!(p.pin(0).is_none());
        assert!(p.pin(1).is_some());
        assert!(p.pin(count).is_some());
        assert!(p.pin(count + 1).is_none());
        assert_eq!(p.pin(1).unwrap().name(), "porta0");
    }

    #[test]
    fn test_program_load_bounds() {
        let mut p = idle_proc();
        assert!(p.init_program_memory_at_index(0, &[1, 2, 3]).is_ok());
        assert!(p.init_program_memory_at_index(62, &[1, 2]).is_ok());
        let err = p.init_program_memory_at_index(63, &[1, 2]).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfBounds { size: 64, .. }));
        // Overflowing offsets are rejected, not wrapped, and the
        // resulting error still renders.
        let err = p
            .init_program_memory_at_index(usize::MAX, &[1])
            .unwrap_err();
        assert!(err.to_string().contains("exceeds memory"));
    }

    #[test]
    fn test_step_count_and_predicate_conditions() {
        let mut p = idle_proc();
        let mut buf = TraceBuffer::with_capacity(64);
        p.step(5u64, &mut buf);
        assert_eq!(p.pc(), 5);

        p.step(StepCondition::while_cond(|cycle| cycle < 3), &mut buf);
        assert_eq!(p.pc(), 8);

        p.step(StepConfig { num_steps: None }, &mut buf);
        assert_eq!(p.pc(), 9);
        assert_eq!(buf.len(), 9);
    }

    #[test]
    #[should_panic(expected = "pin_count 9 exceeds")]
    fn test_layout_with_too_many_pins_is_rejected_at_construction() {
        let layout = ProcessorLayout {
            pin_count: 9,
            ..LAYOUT
        };
        Processor::new("t", "idle", &layout, Box::new(IdleModel));
    }

    #[test]
    fn test_reset_traces_cause() {
        let mut p = idle_proc();
        let mut buf = TraceBuffer::with_capacity(8);
        p.reset(ResetType::MclrReset, &mut buf);
        assert_eq!(
            buf.front(),
            Some(&TraceEvent::Reset {
                reset: ResetType::MclrReset
            })
        );
    }
}
