//! Bot Framework activity payloads for `/api/messages`.
//!
//! Only the fields the gateway reads or echoes back are modeled; anything
//! else in the incoming JSON is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MESSAGE: &str = "message";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationAccount {
    pub id: String,
}

impl Activity {
    pub fn is_message(&self) -> bool {
        self.kind == MESSAGE
    }

    /// The user text of a message activity, if it has any.
    pub fn message_text(&self) -> Option<&str> {
        if !self.is_message() {
            return None;
        }
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Build a message activity answering this one.
    ///
    /// Sender and recipient are swapped; conversation and channel are kept.
    pub fn reply(&self, text: impl Into<String>) -> Activity {
        Activity {
            kind: MESSAGE.into(),
            id: Some(uuid::Uuid::new_v4().to_string()),
            text: Some(text.into()),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            conversation: self.conversation.clone(),
            channel_id: self.channel_id.clone(),
            service_url: self.service_url.clone(),
            reply_to_id: self.id.clone(),
            timestamp: Some(Utc::now()),
        }
    }
}

/// Body returned for expect-replies delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<Activity>,
}
