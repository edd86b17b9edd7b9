//! PIC Simulation Engine
//!
//! This crate provides the simulation side of the picsim bridge:
//! - **Context**: Simulation session owning processors, interfaces, and
//!   the trace buffer (`context` module)
//! - **Processors**: Execution state, stepping, and the built-in 14-bit
//!   core (`processor` and `pic14` modules)
//! - **Registry**: Processor type name to constructor mapping
//!   (`registry` module)
//! - **Trace**: Bounded execution trace ring and its wire shape
//!   (`trace` module)
//! - **Pins**: Pin levels and signal sink fan-out (`pins` module)
//! - **Program**: Loadable firmware artifact with source metadata
//!   (`program` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use picsim_engine::{SimulationContext, StepCondition};
//!
//! let mut ctx = SimulationContext::new();
//! let proc = ctx.add_processor_by_type("p16f887", "main")?;
//! proc.init_program_memory_at_index(0, &firmware)?;
//!
//! ctx.step(StepCondition::Cycles(20));
//! for event in ctx.trace_reader().drain() {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Simulation context: session aggregate tying everything together
pub mod context;

/// Engine error types
pub mod error;

/// Built-in 14-bit PIC core
pub mod pic14;

/// Pins and signal sink fan-out
pub mod pins;

/// Processor state, stepping, and the execution model seam
pub mod processor;

/// Firmware program artifact
pub mod program;

/// Processor type registry
pub mod registry;

/// Execution trace ring and wire shape
pub mod trace;

// ============================================================================
// Re-exports
// ============================================================================

pub use context::SimulationContext;
pub use error::{EngineError, EngineResult};
pub use pins::{Pin, PinMonitor};
pub use processor::{
    ExecutionModel, Processor, ProcessorLayout, ProcessorState, StepCondition, StepConfig,
};
pub use program::{
    CodeRange, Program, SourceDirective, SourceLineRef, SourceSymbol, SourceSymbolKind,
};
pub use registry::{
    default_registry, find_by_type, ProcessorConstructor, ProcessorRegistry,
};
pub use trace::{
    ResetType, TraceBuffer, TraceEvent, TraceReader, TraceWriter, DEFAULT_TRACE_CAPACITY,
};
