//! System status domain module.

mod model;

pub use model::{
    DEFAULT_COMPONENTS, OverallHealth, PerformanceSnapshot, SecurityFlags, SystemStatus,
};
