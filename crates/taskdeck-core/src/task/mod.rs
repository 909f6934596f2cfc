//! Task domain module.
//!
//! This module contains the task entity and its lifecycle rules.
//!
//! # Usage
//!
//! ```ignore
//! use taskdeck_core::task::{Task, TaskStatus};
//! ```

mod model;

// Re-export public API
pub use model::{
    DEFAULT_PRIORITY, MAX_PRIORITY, MIN_PRIORITY, Task, TaskStatus, validate_submission,
};
