//! Command interpretation.
//!
//! - `model`: [`Intent`], [`IntentKind`] and the device-level [`DeviceInstruction`]
//! - `interpreter`: the keyword interpreter ([`parse`])

pub mod interpreter;
mod model;

pub use interpreter::parse;
pub use model::{DeviceInstruction, Intent, IntentKind, ScrollDirection};
