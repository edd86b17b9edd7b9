//! Error types shared across the host/engine boundary

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by the object bridge.
///
/// `NotFound`-style conditions (processor type lookup, symbol lookup)
/// are deliberately not part of this enum: lookups return `Option` so
/// that an absent value is an ordinary result, not a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// A handle was used after releasing its payload or after the
    /// engine adopted it. This is a programming error in the host code
    /// and is reported loudly rather than silently ignored.
    #[error("use after release: handle {0} no longer owns its payload")]
    UseAfterRelease(u64),

    /// The owning aggregate rejected an ownership transfer. The caller
    /// still owns the handle and is responsible for releasing it.
    #[error("adoption failed: {0}")]
    AdoptionFailed(String),

    /// A memory or address operation fell outside the valid range.
    #[error("address range {address:#x}..{:#x} exceeds memory of {size} bytes", .address.saturating_add(*.len))]
    OutOfBounds {
        /// First byte of the rejected range
        address: usize,
        /// Length of the rejected range
        len: usize,
        /// Size of the addressed memory
        size: usize,
    },

    /// A host override failed during a native-invoked dispatch. This
    /// variant is recorded in [`DispatchStats`](crate::DispatchStats)
    /// rather than propagated into the engine.
    #[error("dispatch failure in {role}::{method}: {message}")]
    DispatchFailure {
        /// Role whose override failed
        role: &'static str,
        /// Method being dispatched
        method: &'static str,
        /// Panic payload rendered as text
        message: String,
    },
}
