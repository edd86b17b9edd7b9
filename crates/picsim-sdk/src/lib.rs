//! picsim SDK - Lightweight SDK for writing host-side simulator extensions
//!
//! This crate provides the minimal types needed to implement the
//! engine-defined roles (`Interface`, `SignalSink`) and to move those
//! implementations across the host/engine boundary, without depending
//! on the full picsim-engine.
//!
//! # Example
//!
//! ```ignore
//! use picsim_sdk::{ExtensionArgs, SinkDescriptor, offer};
//!
//! let sink = SinkDescriptor::builder("LedSink")
//!     .construct(|args| args.int(0).unwrap_or(0))
//!     .on_set_sink_state(|_state, level| println!("pin -> {level}"))
//!     .build();
//!
//! // Host-owned until a pin monitor adopts it.
//! let handle = sink.instantiate(ExtensionArgs::from(1));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod dispatch;
pub mod error;
pub mod extension;
pub mod handle;
pub mod roles;

pub use dispatch::{dispatch_guarded, DispatchStats, InterfaceTable};
pub use error::{BridgeError, BridgeResult};
pub use extension::{
    ArgValue, ExtensionArgs, ExtensionState, InterfaceBuilder, InterfaceDescriptor, SinkBuilder,
    SinkDescriptor,
};
pub use handle::{offer, HandleId, HandleState, HostHandle, InterfaceHandle, SinkHandle};
pub use roles::{Interface, InterfaceId, SignalSink, INTERFACE_ROLE, SIGNAL_SINK_ROLE};
