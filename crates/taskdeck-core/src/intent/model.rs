//! Intent domain model.
//!
//! An intent is the typed result of interpreting a free-text command: the
//! kind of device action plus its kind-specific fields and a confidence score.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Direction for scroll intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl Default for ScrollDirection {
    fn default() -> Self {
        ScrollDirection::Down
    }
}

/// Kind-specific payload of an intent.
///
/// Serialized with an inline `type` tag so a flattened [`Intent`] reads as
/// `{"type": "click", "target": "Login", "confidence": 0.9}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentKind {
    Click {
        target: String,
    },
    Type {
        text: String,
        target: String,
    },
    Navigate {
        target: String,
    },
    Search {
        query: String,
    },
    Scroll {
        direction: ScrollDirection,
    },
    Unknown {
        original_command: String,
    },
}

impl IntentKind {
    /// Short lowercase name of the kind (`"click"`, `"scroll"`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            IntentKind::Click { .. } => "click",
            IntentKind::Type { .. } => "type",
            IntentKind::Navigate { .. } => "navigate",
            IntentKind::Search { .. } => "search",
            IntentKind::Scroll { .. } => "scroll",
            IntentKind::Unknown { .. } => "unknown",
        }
    }

    /// Informational duration estimate in seconds.
    pub fn estimated_duration_secs(&self) -> u32 {
        match self {
            IntentKind::Click { .. } => 2,
            IntentKind::Type { .. } => 3,
            IntentKind::Navigate { .. } => 5,
            IntentKind::Scroll { .. } => 1,
            IntentKind::Search { .. } => 8,
            IntentKind::Unknown { .. } => 5,
        }
    }
}

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(flatten)]
    pub kind: IntentKind,
    pub confidence: f32,
}

impl Intent {
    pub fn new(kind: IntentKind, confidence: f32) -> Self {
        Self { kind, confidence }
    }

    pub fn estimated_duration_secs(&self) -> u32 {
        self.kind.estimated_duration_secs()
    }

    /// Maps the intent to the device-level instruction understood by the
    /// remote actuator. Returns `None` for kinds the actuator cannot perform.
    pub fn to_instruction(&self) -> Option<DeviceInstruction> {
        match &self.kind {
            IntentKind::Click { .. } => Some(DeviceInstruction::Click),
            IntentKind::Type { .. } => Some(DeviceInstruction::Type),
            IntentKind::Scroll { direction } => Some(match direction {
                ScrollDirection::Up => DeviceInstruction::MouseUp,
                ScrollDirection::Down => DeviceInstruction::MouseDown,
                ScrollDirection::Left => DeviceInstruction::MouseLeft,
                ScrollDirection::Right => DeviceInstruction::MouseRight,
            }),
            IntentKind::Navigate { .. } | IntentKind::Search { .. } | IntentKind::Unknown { .. } => {
                None
            }
        }
    }
}

/// Instruction string sent to the remote actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceInstruction {
    Click,
    Type,
    MouseUp,
    MouseDown,
    MouseLeft,
    MouseRight,
}
