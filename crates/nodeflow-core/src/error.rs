//! Value error types.

use thiserror::Error;

/// Type-erased error for boxing errors from user code.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while reading or converting a [`Value`](crate::Value).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// The value does not hold the requested type.
    #[error("expected a value of type {expected}, found {found}")]
    TypeMismatch {
        /// Name of the requested type.
        expected: &'static str,
        /// Name of the type actually held.
        found: &'static str,
    },

    /// A registered converter rejected the value.
    #[error("cannot convert {from} to {to}: {message}")]
    Conversion {
        /// Name of the source type.
        from: &'static str,
        /// Name of the target type.
        to: &'static str,
        /// Converter-provided reason.
        message: String,
    },
}

/// Result type for value operations.
pub type ValueResult<T> = Result<T, ValueError>;
