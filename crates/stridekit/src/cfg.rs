//! Engine configuration.
//!
//! Policy
//! - Defaults match the historical behaviour (four tasks per operation).
//! - The task count is fixed per engine and independent of input size.

use std::time::Duration;

use crate::error::{EngineError, Result};

/// Default number of tasks submitted per operation.
pub const DEFAULT_TASKS: usize = 4;

/// Configuration of an [`Engine`](crate::Engine).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineCfg {
    /// Jobs submitted per partitioned operation (`T`). Also the size of the
    /// default worker pool.
    pub tasks: usize,
    /// How long the default pool waits on a job before logging a warning.
    /// The wait continues afterwards: this is not a cancellation deadline.
    pub join_timeout: Duration,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            tasks: DEFAULT_TASKS,
            join_timeout: Duration::from_secs(10),
        }
    }
}

impl EngineCfg {
    /// Same defaults with a different task count.
    pub fn with_tasks(tasks: usize) -> Self {
        Self {
            tasks,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tasks == 0 {
            return Err(EngineError::InvalidConfig {
                name: "tasks",
                reason: "must be at least 1",
            });
        }
        if self.join_timeout.is_zero() {
            return Err(EngineError::InvalidConfig {
                name: "join_timeout",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}
