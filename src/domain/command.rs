use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("scroll distance must be a positive number of pixels, got {0}")]
    NonPositiveScroll(i64),
    #[error("wait duration must be a finite, non-negative number of seconds in range, got {0}")]
    InvalidWait(f64),
    #[error("selector for type command is empty")]
    EmptySelector,
    #[error("key name for press_key command is empty")]
    EmptyKey,
    #[error("intent has no supported target sites")]
    NoTargetSites,
}

/// One browser automation primitive.
///
/// The set of kinds is closed. Outside this crate values can only be built
/// through the validating constructors (or deserialized, which runs the same
/// checks), so every `Command` in a workflow is well formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CommandRecord", into = "CommandRecord")]
pub enum Command {
    #[non_exhaustive]
    Navigate { url: Url },
    #[non_exhaustive]
    Scroll { pixels: u32 },
    #[non_exhaustive]
    Wait { duration: Duration },
    #[non_exhaustive]
    Type { selector: String, text: String },
    #[non_exhaustive]
    PressKey { key: String },
}

impl Command {
    pub fn navigate(url: &str) -> Result<Self, ValidationError> {
        let parsed = Url::parse(url).map_err(|e| ValidationError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(Command::Navigate { url: parsed }),
            other => Err(ValidationError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme {other}"),
            }),
        }
    }

    pub fn scroll(pixels: i64) -> Result<Self, ValidationError> {
        match u32::try_from(pixels) {
            Ok(p) if p > 0 => Ok(Command::Scroll { pixels: p }),
            _ => Err(ValidationError::NonPositiveScroll(pixels)),
        }
    }

    pub fn wait(seconds: f64) -> Result<Self, ValidationError> {
        match Duration::try_from_secs_f64(seconds) {
            Ok(duration) => Ok(Command::Wait { duration }),
            Err(_) => Err(ValidationError::InvalidWait(seconds)),
        }
    }

    pub fn type_text(selector: &str, text: &str) -> Result<Self, ValidationError> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(ValidationError::EmptySelector);
        }
        Ok(Command::Type {
            selector: selector.to_string(),
            text: text.to_string(),
        })
    }

    pub fn press_key(key: &str) -> Result<Self, ValidationError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ValidationError::EmptyKey);
        }
        Ok(Command::PressKey {
            key: key.to_string(),
        })
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Navigate { .. } => CommandKind::Navigate,
            Command::Scroll { .. } => CommandKind::Scroll,
            Command::Wait { .. } => CommandKind::Wait,
            Command::Type { .. } => CommandKind::Type,
            Command::PressKey { .. } => CommandKind::PressKey,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Navigate,
    Scroll,
    Wait,
    Type,
    PressKey,
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CommandKind::Navigate => "navigate",
            CommandKind::Scroll => "scroll",
            CommandKind::Wait => "wait",
            CommandKind::Type => "type",
            CommandKind::PressKey => "press_key",
        };
        f.write_str(name)
    }
}

/// Tagged record form used for logging and replay: `{"kind": ..., params...}`.
#[derive(Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum CommandRecord {
    Navigate { url: String },
    Scroll { pixels: i64 },
    Wait { seconds: f64 },
    Type { selector: String, text: String },
    PressKey { key: String },
}

impl TryFrom<CommandRecord> for Command {
    type Error = ValidationError;

    fn try_from(value: CommandRecord) -> Result<Self, Self::Error> {
        match value {
            CommandRecord::Navigate { url } => Command::navigate(&url),
            CommandRecord::Scroll { pixels } => Command::scroll(pixels),
            CommandRecord::Wait { seconds } => Command::wait(seconds),
            CommandRecord::Type { selector, text } => Command::type_text(&selector, &text),
            CommandRecord::PressKey { key } => Command::press_key(&key),
        }
    }
}

impl From<Command> for CommandRecord {
    fn from(value: Command) -> Self {
        match value {
            Command::Navigate { url } => CommandRecord::Navigate { url: url.into() },
            Command::Scroll { pixels } => CommandRecord::Scroll {
                pixels: pixels.into(),
            },
            Command::Wait { duration } => CommandRecord::Wait {
                seconds: duration.as_secs_f64(),
            },
            Command::Type { selector, text } => CommandRecord::Type { selector, text },
            Command::PressKey { key } => CommandRecord::PressKey { key },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Command, CommandKind, ValidationError};

    #[test]
    fn navigate_rejects_bad_urls() {
        assert!(matches!(
            Command::navigate("not a url"),
            Err(ValidationError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Command::navigate("ftp://files.example.com"),
            Err(ValidationError::InvalidUrl { .. })
        ));
        assert!(Command::navigate("https://www.amazon.in/s?k=trimmer").is_ok());
    }

    #[test]
    fn scroll_requires_positive_distance() {
        assert_eq!(
            Command::scroll(-5),
            Err(ValidationError::NonPositiveScroll(-5))
        );
        assert_eq!(Command::scroll(0), Err(ValidationError::NonPositiveScroll(0)));
        assert_eq!(Command::scroll(2000), Ok(Command::Scroll { pixels: 2000 }));
    }

    #[test]
    fn wait_rejects_negative_and_nan() {
        assert!(Command::wait(-1.0).is_err());
        assert!(Command::wait(f64::NAN).is_err());
        assert_eq!(
            Command::wait(0.0),
            Ok(Command::Wait {
                duration: Duration::ZERO
            })
        );
    }

    #[test]
    fn wait_rejects_durations_too_large_to_represent() {
        assert_eq!(Command::wait(1e30), Err(ValidationError::InvalidWait(1e30)));
        assert!(Command::wait(f64::INFINITY).is_err());

        let replayed = serde_json::from_str::<Command>(r#"{"kind": "wait", "seconds": 1e30}"#);
        assert!(replayed.is_err());
    }

    #[test]
    fn type_and_press_key_reject_empty_input() {
        assert_eq!(
            Command::type_text("   ", "trimmer"),
            Err(ValidationError::EmptySelector)
        );
        assert_eq!(Command::press_key(""), Err(ValidationError::EmptyKey));

        let command = Command::type_text(" input[name='q'] ", "trimmer").unwrap();
        assert_eq!(command.kind(), CommandKind::Type);
        assert_eq!(
            command,
            Command::Type {
                selector: "input[name='q']".to_string(),
                text: "trimmer".to_string()
            }
        );
    }

    #[test]
    fn serializes_as_tagged_record() {
        let command = Command::wait(2.0).unwrap();
        let json = serde_json::to_value(&command).unwrap();

        assert_eq!(json, serde_json::json!({"kind": "wait", "seconds": 2.0}));
    }

    #[test]
    fn deserialization_runs_validation() {
        let bad = serde_json::from_str::<Command>(r#"{"kind": "scroll", "pixels": -20}"#);
        assert!(bad.is_err());

        let good: Command =
            serde_json::from_str(r#"{"kind": "press_key", "key": "Enter"}"#).unwrap();
        assert_eq!(good, Command::press_key("Enter").unwrap());
    }
}
