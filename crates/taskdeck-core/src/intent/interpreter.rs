//! Keyword-based command interpreter.
//!
//! Maps free text to an [`Intent`]. Triggers are matched as case-insensitive
//! substrings and evaluated in a fixed precedence order; the first kind whose
//! keyword appears wins.

use once_cell::sync::Lazy;
use regex::Regex;

use super::model::{Intent, IntentKind, ScrollDirection};

pub const CLICK_CONFIDENCE: f32 = 0.9;
pub const TYPE_CONFIDENCE: f32 = 0.85;
pub const NAVIGATE_CONFIDENCE: f32 = 0.8;
pub const SEARCH_CONFIDENCE: f32 = 0.8;
pub const SCROLL_CONFIDENCE: f32 = 0.75;
pub const UNKNOWN_CONFIDENCE: f32 = 0.5;

const UNKNOWN_TARGET: &str = "unknown target";

const CLICK_WORDS: &[&str] = &["click", "press", "tap"];
const TYPE_WORDS: &[&str] = &["type", "enter", "write", "input"];
const NAVIGATE_WORDS: &[&str] = &["navigate", "go", "open", "visit"];
const SEARCH_WORDS: &[&str] = &["search", "find", "look"];
const SCROLL_WORDS: &[&str] = &["scroll", "move"];

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]*)""#).expect("valid regex"));

// Keyword triggers ignore case; the phrase patterns below do not.
static TARGET_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:on\s+the\s+|the\s+)([a-zA-Z\s]+?)(?:\s+button|\s+field|\s+menu|$)")
        .expect("valid regex")
});

static TYPE_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"type\s+(?:in\s+)?([a-zA-Z0-9\s@._-]+)").expect("valid regex")
});

static SEARCH_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:search\s+for|find|look\s+for)\s+(.+)").expect("valid regex")
});

/// Interprets a free-text command. Never fails: text without a recognizable
/// keyword yields an `unknown` intent carrying the original text.
pub fn parse(text: &str) -> Intent {
    let lower = text.to_lowercase();
    let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has_any(CLICK_WORDS) {
        Intent::new(
            IntentKind::Click {
                target: extract_target(text),
            },
            CLICK_CONFIDENCE,
        )
    } else if has_any(TYPE_WORDS) {
        Intent::new(
            IntentKind::Type {
                text: extract_text(text),
                target: extract_target(text),
            },
            TYPE_CONFIDENCE,
        )
    } else if has_any(NAVIGATE_WORDS) {
        Intent::new(
            IntentKind::Navigate {
                target: extract_target(text),
            },
            NAVIGATE_CONFIDENCE,
        )
    } else if has_any(SEARCH_WORDS) {
        Intent::new(
            IntentKind::Search {
                query: extract_query(text),
            },
            SEARCH_CONFIDENCE,
        )
    } else if has_any(SCROLL_WORDS) {
        Intent::new(
            IntentKind::Scroll {
                direction: extract_direction(&lower),
            },
            SCROLL_CONFIDENCE,
        )
    } else {
        Intent::new(
            IntentKind::Unknown {
                original_command: text.to_string(),
            },
            UNKNOWN_CONFIDENCE,
        )
    }
}

fn quoted(text: &str) -> Option<String> {
    QUOTED.captures(text).map(|c| c[1].to_string())
}

fn extract_target(text: &str) -> String {
    if let Some(q) = quoted(text) {
        return q;
    }
    TARGET_PHRASE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNKNOWN_TARGET.to_string())
}

fn extract_text(text: &str) -> String {
    if let Some(q) = quoted(text) {
        return q;
    }
    TYPE_PHRASE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default()
}

fn extract_query(text: &str) -> String {
    SEARCH_PHRASE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default()
}

// up > down > left > right, regardless of position in the text
fn extract_direction(lower: &str) -> ScrollDirection {
    [
        ("up", ScrollDirection::Up),
        ("down", ScrollDirection::Down),
        ("left", ScrollDirection::Left),
        ("right", ScrollDirection::Right),
    ]
    .into_iter()
    .find(|(word, _)| lower.contains(word))
    .map(|(_, dir)| dir)
    .unwrap_or_default()
}
