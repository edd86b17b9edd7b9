//! Engine error types

use picsim_sdk::BridgeError;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors from direct host-to-engine calls. These propagate normally
/// as recoverable results, unlike dispatch failures, which are absorbed
/// at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A bridge-level failure (ownership, bounds, dispatch).
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// `add_processor_by_type` was given a type the registry does not
    /// know.
    #[error("unknown processor type: {0}")]
    UnknownProcessorType(String),

    /// An operation referenced a processor name the context does not
    /// own.
    #[error("no processor named {0:?} in this context")]
    NoSuchProcessor(String),

    /// A firmware upload targeted a different processor type than the
    /// one it was offered.
    #[error("program targets {expected:?}, processor is a {actual:?}")]
    ProgramTargetMismatch {
        /// Type name the program was built for.
        expected: String,
        /// Type name of the processor it was offered to.
        actual: String,
    },
}
