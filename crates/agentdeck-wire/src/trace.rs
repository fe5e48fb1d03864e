use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One server-pushed unit of agent progress, carried as the `data:` payload of an
/// SSE frame on the chat stream.
///
/// Fields that do not belong to the event's `type` are ignored on decode, so an
/// `end` event that also carries an empty `content` is still well formed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    Message { node: String, content: String },
    End,
    Error { message: String },
}

impl TraceEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TraceEvent::End | TraceEvent::Error { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TraceEvent::Message { .. } => "message",
            TraceEvent::End => "end",
            TraceEvent::Error { .. } => "error",
        }
    }
}

/// Operating mode forwarded verbatim to the remote agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Autonomy,
    Build,
    Plan,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Autonomy, Mode::Build, Mode::Plan];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Autonomy => "autonomy",
            Mode::Build => "build",
            Mode::Plan => "plan",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Autonomy => "Max Autonomy",
            Mode::Build => "Build Mode",
            Mode::Plan => "Plan Mode",
        }
    }

    pub fn next(self) -> Mode {
        match self {
            Mode::Autonomy => Mode::Build,
            Mode::Build => Mode::Plan,
            Mode::Plan => Mode::Autonomy,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode '{0}' (expected autonomy, build or plan)")]
pub struct ParseModeError(pub String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "autonomy" => Ok(Mode::Autonomy),
            "build" => Ok(Mode::Build),
            "plan" => Ok(Mode::Plan),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}
