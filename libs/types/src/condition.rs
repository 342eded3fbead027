//! Condition observations: fault/warning state with persistent "active"
//! semantics distinct from ordinary value observations.

use serde::{Deserialize, Serialize};

/// Severity level of a condition observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionLevel {
    Normal,
    Warning,
    Fault,
    Unavailable,
}

impl ConditionLevel {
    /// Parse a wire token, case-insensitively. Returns `None` for tokens
    /// that are not condition levels — the codec uses this to tell
    /// condition lines apart from data lines.
    pub fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("normal") {
            Some(ConditionLevel::Normal)
        } else if token.eq_ignore_ascii_case("warning") {
            Some(ConditionLevel::Warning)
        } else if token.eq_ignore_ascii_case("fault") {
            Some(ConditionLevel::Fault)
        } else if token.eq_ignore_ascii_case("unavailable") {
            Some(ConditionLevel::Unavailable)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionLevel::Normal => "NORMAL",
            ConditionLevel::Warning => "WARNING",
            ConditionLevel::Fault => "FAULT",
            ConditionLevel::Unavailable => "UNAVAILABLE",
        }
    }

    /// Whether an observation at this level clears the data item's active
    /// condition set. UNAVAILABLE clears like NORMAL: the item's state is
    /// unknown, so no previously reported instance can be considered live.
    pub fn clears_active_set(&self) -> bool {
        matches!(self, ConditionLevel::Normal | ConditionLevel::Unavailable)
    }
}

/// Payload of a condition observation.
///
/// Active instances are identified by `native_code` within their data
/// item's scope only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub level: ConditionLevel,
    pub native_code: String,
    pub native_severity: String,
    pub qualifier: String,
    pub message: String,
}

impl Condition {
    pub fn new(level: ConditionLevel) -> Self {
        Self {
            level,
            native_code: String::new(),
            native_severity: String::new(),
            qualifier: String::new(),
            message: String::new(),
        }
    }

    pub fn with_native_code(mut self, native_code: impl Into<String>) -> Self {
        self.native_code = native_code.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}
