//! Plans produced by the planner and the `SAY` formatting step.

use std::sync::LazyLock;

use databot_core::error::PlanError;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[doc\d+\]").expect("citation marker regex"));

/// An ordered list of commands to run for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub commands: Vec<PlanCommand>,
}

impl Plan {
    /// A plan that speaks a single message.
    pub fn say(content: impl Into<String>) -> Self {
        Self {
            commands: vec![PlanCommand::Say {
                content: content.into(),
            }],
        }
    }
}

/// A single step of a [`Plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanCommand {
    /// Send `content` to the user.
    Say { content: String },
}

impl PlanCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Say { .. } => "SAY",
        }
    }
}

/// Prepare model output for the chat surface.
///
/// Removes `[docN]` citation markers left by grounded completions,
/// normalizes line endings and trims. Fails when nothing remains.
pub fn format_say(content: &str) -> Result<String, PlanError> {
    let text = CITATION_RE.replace_all(content, "").replace("\r\n", "\n");
    let text = text.trim();

    if text.is_empty() {
        return Err(PlanError::EmptySay);
    }
    Ok(text.to_string())
}
