//! Executor that pretends to run instructions.
//!
//! Used when no actuator is attached: logs the instruction, waits the
//! configured latency and reports success.

use std::time::Duration;

use async_trait::async_trait;
use taskdeck_core::error::Result;
use taskdeck_core::executor::{ExecutionOutcome, RemoteExecutor};
use taskdeck_core::intent::DeviceInstruction;

#[derive(Debug, Clone, Default)]
pub struct DryRunExecutor {
    latency: Duration,
}

impl DryRunExecutor {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl RemoteExecutor for DryRunExecutor {
    async fn execute(&self, instruction: DeviceInstruction) -> Result<ExecutionOutcome> {
        tracing::info!(%instruction, latency_ms = self.latency.as_millis() as u64, "dry run");
        tokio::time::sleep(self.latency).await;
        Ok(ExecutionOutcome::Succeeded)
    }

    fn name(&self) -> &str {
        "dry_run"
    }
}
