//! Domain types shared by the taskdeck crates: tasks, intents, system status,
//! dashboard events, the remote executor interface and configuration.

pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod intent;
pub mod status;
pub mod task;

// Re-export common error type
pub use error::TaskdeckError;
