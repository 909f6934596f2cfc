//! System status domain model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::Display;

/// Coarse health of the whole service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OverallHealth {
    #[default]
    Healthy,
    Warning,
    Critical,
}

/// Performance figures shown on the dashboard.
///
/// `active_tasks` and `total_tasks` come from the task registry; the rest is
/// produced by a metrics source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub latency_p80: f64,
    pub accuracy: f64,
    pub active_tasks: usize,
    pub total_tasks: u64,
}

impl Default for PerformanceSnapshot {
    fn default() -> Self {
        Self {
            cpu_percent: 45.0,
            memory_percent: 65.0,
            latency_p80: 118.0,
            accuracy: 96.0,
            active_tasks: 0,
            total_tasks: 0,
        }
    }
}

/// Security controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityFlags {
    pub kill_switch_active: bool,
    pub privacy_level: String,
}

impl Default for SecurityFlags {
    fn default() -> Self {
        Self {
            kill_switch_active: false,
            privacy_level: "basic".to_string(),
        }
    }
}

/// Names of the subsystems reported in [`SystemStatus::components`].
pub const DEFAULT_COMPONENTS: &[&str] = &[
    "perception",
    "reflex",
    "privacy",
    "cloud_brain",
    "performance_monitor",
];

/// Process-wide status aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: OverallHealth,
    pub components: BTreeMap<String, String>,
    pub performance: PerformanceSnapshot,
    pub security: SecurityFlags,
}

impl Default for SystemStatus {
    fn default() -> Self {
        Self {
            status: OverallHealth::Healthy,
            components: DEFAULT_COMPONENTS
                .iter()
                .map(|name| (name.to_string(), "active".to_string()))
                .collect(),
            performance: PerformanceSnapshot::default(),
            security: SecurityFlags::default(),
        }
    }
}
