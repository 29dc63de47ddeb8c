use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter, EnumString};

/// Marker the bot stores as the attachment fallback of its own posts, so a
/// later run can recognise what it already did.
#[derive(AsRefStr, EnumString, EnumIter, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum MessageType {
    ChannelWarning,
    ChannelArchive,
    ChannelAnnouncement,
    FlaggedMessage,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Topic {
    #[serde(default)]
    pub value: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub created: i64,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_private: bool,
    pub num_members: Option<i64>,
    pub creator: Option<String>,
    pub purpose: Option<Topic>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ListResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub channels: Option<Vec<Channel>>,
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InfoResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub channel: Option<Channel>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct MembersResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub members: Option<Vec<String>>,
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct AttachmentField {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Attachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
}

impl Attachment {
    pub fn marker(message_type: MessageType) -> Self {
        Self {
            fallback: Some(message_type.as_ref().to_string()),
            ..Self::default()
        }
    }

    /// True when the attachment carries something a person wrote, as opposed
    /// to nothing at all or only one of the bot's markers.
    pub fn has_content(&self) -> bool {
        let fallback_is_content = self
            .fallback
            .as_deref()
            .is_some_and(|f| !f.trim().is_empty() && MessageType::from_str(f).is_err());

        let non_empty = |s: &Option<String>| s.as_deref().is_some_and(|s| !s.trim().is_empty());

        fallback_is_content
            || non_empty(&self.text)
            || non_empty(&self.pretext)
            || non_empty(&self.title)
            || self
                .fields
                .iter()
                .any(|f| !f.title.trim().is_empty() || !f.value.trim().is_empty())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    pub name: String,
    pub count: u32,
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct Message {
    #[serde(rename = "type", default)]
    pub kind: String,

    pub subtype: Option<String>,

    /// Might not exist for bots
    pub user: Option<String>,

    #[serde(default)]
    pub text: String,

    /// Timestamp
    #[serde(default)]
    pub ts: String,

    pub attachments: Option<Vec<Attachment>>,

    /// Uploads on `file_share` messages; only their presence matters here
    pub files: Option<Vec<serde_json::Value>>,

    pub reactions: Option<Vec<Reaction>>,
}

impl Message {
    /// The bot marker this message was posted with, if any.
    pub fn marker(&self) -> Option<MessageType> {
        self.attachments
            .iter()
            .flatten()
            .filter_map(|a| a.fallback.as_deref())
            .find_map(|f| MessageType::from_str(f).ok())
    }

    pub fn has_marker(&self, message_type: MessageType) -> bool {
        self.attachments
            .iter()
            .flatten()
            .any(|a| a.fallback.as_deref() == Some(message_type.as_ref()))
    }

    pub fn has_files(&self) -> bool {
        self.files.as_ref().is_some_and(|files| !files.is_empty())
    }

    pub fn has_attachment_content(&self) -> bool {
        self.attachments.iter().flatten().any(Attachment::has_content)
    }

    pub fn reaction_count(&self, emoji: &str) -> u32 {
        self.reactions
            .iter()
            .flatten()
            .filter(|r| r.name == emoji)
            .map(|r| r.count)
            .sum()
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct HistoryResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub messages: Option<Vec<Message>>,
    pub has_more: Option<bool>,
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct PostMessageResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub channel: Option<String>,
    pub ts: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct ArchiveResponse {
    pub ok: bool,
    pub error: Option<String>,
}
