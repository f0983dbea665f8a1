//! Error types for stridekit.
//!
//! Every failure is local: it is detected, owned scratch buffers are released
//! by normal drop, and the error is returned. Nothing is retried.

use std::collections::TryReserveError;
use thiserror::Error;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors returned by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Scratch storage (partition descriptors, job lists, partial slots,
    /// hash index) could not be reserved.
    #[error("scratch allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// Area/centroid needs at least three vertices (or index elements).
    #[error("insufficient input: expected at least {expected} elements, got {actual}")]
    InsufficientInput {
        /// Minimum element count.
        expected: usize,
        /// Element count supplied.
        actual: usize,
    },

    /// A caller-provided output buffer is shorter than required.
    #[error("output buffer too small: need {required} elements, got {provided}")]
    BufferTooSmall {
        /// Required length in elements of the buffer's type.
        required: usize,
        /// Provided length.
        provided: usize,
    },

    /// One or more concurrent jobs reported failure. Side effects of the
    /// failed job and of its siblings are not rolled back.
    #[error("{failed} task(s) failed, first: {first}")]
    TaskFailure {
        /// Number of failed jobs.
        failed: usize,
        /// First failure in submission order.
        first: TaskError,
    },

    /// Vertex layout or buffer length is inconsistent.
    #[error("invalid vertex layout: {reason}")]
    InvalidLayout {
        /// What is wrong.
        reason: String,
    },

    /// An index buffer entry names a vertex past the end of the view.
    #[error("vertex index {index} out of range for {count} vertices")]
    IndexOutOfRange {
        /// Offending vertex index.
        index: usize,
        /// Vertex count of the view.
        count: usize,
    },

    /// A count does not fit the 32-bit output index type.
    #[error("{count} elements do not fit 32-bit indices")]
    IndexOverflow {
        /// The count that overflowed.
        count: usize,
    },

    /// Engine configuration is unusable.
    #[error("invalid config: {name} ({reason})")]
    InvalidConfig {
        /// Field name.
        name: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl EngineError {
    /// Create an invalid layout error.
    pub fn layout<T: Into<String>>(reason: T) -> Self {
        EngineError::InvalidLayout {
            reason: reason.into(),
        }
    }

    /// Integer status code of the C-style interface: `-2` for insufficient
    /// input, `-1` for everything else. Success is `0` and has no error value.
    pub fn status_code(&self) -> i32 {
        match self {
            EngineError::InsufficientInput { .. } => -2,
            _ => -1,
        }
    }
}

/// Failure of a single unit of work handed to a [`TaskRunner`](crate::runner::TaskRunner).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The job panicked; the payload message if it was a string.
    #[error("job panicked: {0}")]
    Panicked(String),

    /// A worker thread could not be started.
    #[error("worker spawn failed: {0}")]
    Spawn(String),

    /// The job ran and reported failure itself.
    #[error("job failed: {0}")]
    Failed(String),

    /// The job was dropped without reporting a status.
    #[error("job lost before completion")]
    Lost,
}

impl TaskError {
    /// Build a [`TaskError::Panicked`] from a panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        TaskError::Panicked(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_c_interface() {
        let short = EngineError::InsufficientInput {
            expected: 3,
            actual: 2,
        };
        assert_eq!(short.status_code(), -2);
        let small = EngineError::BufferTooSmall {
            required: 4,
            provided: 3,
        };
        assert_eq!(small.status_code(), -1);
        assert_eq!(EngineError::IndexOverflow { count: 1 }.status_code(), -1);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let e = TaskError::from_panic(Box::new("boom"));
        assert_eq!(e, TaskError::Panicked("boom".into()));
        let e = TaskError::from_panic(Box::new(String::from("bang")));
        assert_eq!(e, TaskError::Panicked("bang".into()));
        let e = TaskError::from_panic(Box::new(7_u8));
        assert!(matches!(e, TaskError::Panicked(_)));
    }
}
