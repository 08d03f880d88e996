//! Turn context: where a bot's replies for one user turn go.
//!
//! The planner only ever needs to send text back to the user, so the
//! trait has a single capability. The HTTP layer uses [`ReplyBuffer`] to
//! capture replies and return them in the response body.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::debug;

use crate::error::ChannelError;

/// Receives the bot's replies for a single turn.
#[async_trait]
pub trait TurnContext: Send + Sync {
    /// Send a text reply to the user.
    async fn send(&self, text: &str) -> Result<(), ChannelError>;
}

/// A turn context that records every reply in order.
#[derive(Debug, Default)]
pub struct ReplyBuffer {
    replies: Mutex<Vec<String>>,
}

impl ReplyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All replies sent so far, oldest first.
    pub fn replies(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// The most recent reply, if any.
    pub fn last_reply(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    pub fn has_responded(&self) -> bool {
        !self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.replies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TurnContext for ReplyBuffer {
    async fn send(&self, text: &str) -> Result<(), ChannelError> {
        debug!(len = text.len(), "Reply captured");
        self.lock().push(text.to_string());
        Ok(())
    }
}
