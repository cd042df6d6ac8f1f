//! User-facing messages queued by actions.

use serde::{Deserialize, Serialize};

/// Severity level for action messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    /// Informational message (neutral)
    Info,
    /// Success message (action committed)
    Success,
    /// Warning message (action ran but saved nothing)
    Warning,
    /// Error message (action failed)
    Error,
}

impl MessageLevel {
    /// CSS class used when the host page renders the queue.
    pub fn css_class(&self) -> &'static str {
        match self {
            MessageLevel::Info => "alert-info",
            MessageLevel::Success => "alert-success",
            MessageLevel::Warning => "alert-warning",
            MessageLevel::Error => "alert-danger",
        }
    }
}

impl std::fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageLevel::Info => write!(f, "info"),
            MessageLevel::Success => write!(f, "success"),
            MessageLevel::Warning => write!(f, "warning"),
            MessageLevel::Error => write!(f, "error"),
        }
    }
}

/// A queued message. The text may contain markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

impl Message {
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Success, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Error, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_serializes_lowercase() {
        let msg = Message::success("<b>Bob</b> has been successfully added.");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["level"], "success");
        assert_eq!(msg.level.css_class(), "alert-success");
        assert_eq!(MessageLevel::Warning.to_string(), "warning");
    }
}
