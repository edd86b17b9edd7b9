//! Trace streaming: bounded event ring with destructive reads
//!
//! Processors append [`TraceEvent`]s through a [`TraceWriter`] while
//! stepping; the host drains them through a [`TraceReader`] with the
//! `while !empty { front; pop }` protocol. The ring is bounded: under
//! pressure the oldest events are evicted and the `discarded` counter
//! is incremented once per eviction. That counter is the only signal of
//! loss; it never decreases within a session and is reset to zero only
//! by [`SimulationContext::clear`](crate::context::SimulationContext::clear).

use serde::{Deserialize, Serialize};

/// Cause tags for reset trace records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetType {
    /// Simulation exit
    #[serde(rename = "EXIT_RESET")]
    ExitReset,
    /// External master-clear pin
    #[serde(rename = "MCLR_RESET")]
    MclrReset,
    /// Power-on reset
    #[serde(rename = "POR_RESET")]
    PorReset,
    /// Reset requested through the simulator
    #[serde(rename = "SIM_RESET")]
    SimReset,
}

/// One discrete simulation event.
///
/// The serialized form is the bridge's wire shape and round-trips
/// exactly: a `type` tag plus the variant's fields, with `target` and
/// `insn` omitted when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TraceEvent {
    /// Padding record; carries no information.
    Empty,
    /// Cycle counter checkpoint.
    CycleCounter {
        /// Absolute simulated cycle number
        cycle: u64,
    },
    /// A file register was read.
    ReadRegister {
        /// Register address
        address: u16,
        /// Value read
        value: u8,
    },
    /// A file register was written.
    WriteRegister {
        /// Register address
        address: u16,
        /// Value written
        value: u8,
    },
    /// The working register was read.
    ReadW {
        /// Address of the instruction reading W
        address: u16,
        /// Value read
        value: u8,
    },
    /// The working register was written.
    WriteW {
        /// Address of the instruction writing W
        address: u16,
        /// Value written
        value: u8,
    },
    /// The program counter was set outright.
    #[serde(rename = "setPC")]
    SetPc {
        /// Instruction address the transition happened at
        address: u16,
        /// Destination, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<u16>,
        /// Decoded instruction text, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        insn: Option<String>,
    },
    /// The program counter advanced to the next instruction.
    #[serde(rename = "incrementPC")]
    IncrementPc {
        /// Instruction address the transition happened at
        address: u16,
        /// Destination, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<u16>,
        /// Decoded instruction text, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        insn: Option<String>,
    },
    /// The program counter skipped the next instruction.
    #[serde(rename = "skipPC")]
    SkipPc {
        /// Instruction address the transition happened at
        address: u16,
        /// Destination, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<u16>,
        /// Decoded instruction text, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        insn: Option<String>,
    },
    /// The program counter branched.
    #[serde(rename = "branchPC")]
    BranchPc {
        /// Instruction address the transition happened at
        address: u16,
        /// Destination, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<u16>,
        /// Decoded instruction text, when known
        #[serde(skip_serializing_if = "Option::is_none")]
        insn: Option<String>,
    },
    /// An interrupt was taken.
    Interrupt,
    /// The processor was reset.
    Reset {
        /// Reset cause
        reset: ResetType,
    },
}

/// Default ring capacity used by a fresh simulation context.
pub const DEFAULT_TRACE_CAPACITY: usize = 4096;

/// Bounded ring of trace events.
#[derive(Debug)]
pub struct TraceBuffer {
    entries: std::collections::VecDeque<TraceEvent>,
    capacity: usize,
    discarded: u64,
}

impl TraceBuffer {
    /// Create a ring holding at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "trace buffer capacity must be non-zero");
        Self {
            entries: std::collections::VecDeque::with_capacity(capacity),
            capacity,
            discarded: 0,
        }
    }

    /// True when no events are buffered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of events evicted unread to make room for new ones.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Oldest unconsumed event, without removing it.
    pub fn front(&self) -> Option<&TraceEvent> {
        self.entries.front()
    }

    /// Remove the oldest event. Popping an empty buffer is a no-op.
    pub fn pop(&mut self) {
        self.entries.pop_front();
    }

    /// Append an event, evicting the oldest if the ring is full.
    pub fn emplace(&mut self, event: TraceEvent) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.discarded += 1;
        }
        self.entries.push_back(event);
    }

    /// Iterate over buffered events, oldest first, without consuming.
    pub fn iter(&self) -> impl Iterator<Item = &TraceEvent> {
        self.entries.iter()
    }

    /// Drop all events and reset the discard counter.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.discarded = 0;
    }
}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRACE_CAPACITY)
    }
}

/// Append-only view handed to processors while stepping.
pub struct TraceWriter<'a> {
    buffer: &'a mut TraceBuffer,
}

impl<'a> TraceWriter<'a> {
    /// Wrap a buffer in a write-only proxy.
    pub fn new(buffer: &'a mut TraceBuffer) -> Self {
        Self { buffer }
    }

    /// Append an event, evicting the oldest under pressure.
    pub fn emplace(&mut self, event: TraceEvent) {
        self.buffer.emplace(event);
    }
}

/// Pull-based destructive view over the trace ring.
///
/// Consumption protocol: `while !reader.is_empty() { read front; pop }`.
/// Once popped, an event cannot be re-read.
pub struct TraceReader<'a> {
    buffer: &'a mut TraceBuffer,
}

impl<'a> TraceReader<'a> {
    /// Wrap a buffer in a read-side proxy.
    pub fn new(buffer: &'a mut TraceBuffer) -> Self {
        Self { buffer }
    }

    /// True when nothing is left to consume.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of events lost to eviction before the host saw them.
    pub fn discarded(&self) -> u64 {
        self.buffer.discarded()
    }

    /// Oldest unconsumed event, or `None` when empty.
    pub fn front(&self) -> Option<&TraceEvent> {
        self.buffer.front()
    }

    /// Consume the oldest event. On an empty reader this is a no-op.
    pub fn pop(&mut self) {
        self.buffer.pop();
    }

    /// Drain all buffered events into a vector.
    pub fn drain(&mut self) -> Vec<TraceEvent> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(event) = self.front() {
            out.push(event.clone());
            self.pop();
        }
        out
    }
}
