//! Remote executor interface.
//!
//! The remote executor performs a device-level instruction against a remote
//! actuator and reports whether it succeeded. Implementations live outside the
//! core crate (SSH, dry-run, test doubles).

use async_trait::async_trait;

use crate::error::Result;
use crate::intent::DeviceInstruction;

/// Outcome reported by a remote executor that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    Failed { reason: String },
}

impl ExecutionOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Performs device-level instructions on a remote actuator.
///
/// # Implementation Notes
///
/// - `Ok(ExecutionOutcome::Failed { .. })` means the actuator ran and reported
///   failure; `Err(_)` means the executor itself could not complete the call
///   (spawn error, timeout, ...). Both end the task as failed.
/// - The returned future may be dropped when a task is cancelled, so
///   implementations should release external resources on drop.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Runs one instruction.
    async fn execute(&self, instruction: DeviceInstruction) -> Result<ExecutionOutcome>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}
