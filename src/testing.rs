//! In-memory [`Slacker`] for exercising the rule engine and phases without a
//! workspace.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::config::Config;
use crate::conversations::{
    ArchiveResponse, Attachment, Channel, Message, MessageType, PostMessageResponse, Topic,
};
use crate::slacker::{ChannelInfo, SlackError, Slacker};

pub const DAY: i64 = 86_400;
pub const BOT_USER: &str = "UBOT";

/// One `get_messages_in_time_range` call.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFetch {
    pub channel_id: String,
    pub oldest: i64,
    pub latest: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub channel: String,
    pub text: String,
    pub message_type: Option<MessageType>,
}

pub struct FakeSlacker {
    /// Channel ages are measured against this, fixed at construction
    now: i64,
    channels: Vec<Channel>,
    channels_by_name: BTreeMap<String, String>,
    history: Mutex<HashMap<String, Vec<Message>>>,
    members: HashMap<String, Vec<String>>,
    only_restricted: HashSet<String>,
    failing: HashSet<String>,
    archive_ok: bool,
    pub posts: Mutex<Vec<Post>>,
    pub archived: Mutex<Vec<String>>,
    pub history_fetches: Mutex<Vec<HistoryFetch>>,
}

impl FakeSlacker {
    /// Channels are `(name, id)`; every channel starts 90 days old and empty.
    pub fn new(channels: &[(&str, &str)]) -> Self {
        let now = Utc::now().timestamp();
        let channels: Vec<Channel> = channels
            .iter()
            .map(|(name, id)| Channel {
                id: id.to_string(),
                name: name.to_string(),
                created: now - 90 * DAY,
                is_archived: false,
                is_private: false,
                num_members: None,
                creator: Some("U2147483697".to_string()),
                purpose: None,
            })
            .collect();
        let channels_by_name = channels
            .iter()
            .map(|c| (c.name.clone(), c.id.clone()))
            .collect();

        Self {
            now,
            channels,
            channels_by_name,
            history: Mutex::new(HashMap::new()),
            members: HashMap::new(),
            only_restricted: HashSet::new(),
            failing: HashSet::new(),
            archive_ok: true,
            posts: Mutex::new(Vec::new()),
            archived: Mutex::new(Vec::new()),
            history_fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn with_age(mut self, name: &str, age: i64) -> Self {
        if let Some(channel) = self.channels.iter_mut().find(|c| c.name == name) {
            channel.created = self.now - age;
        }
        self
    }

    pub fn with_purpose(mut self, name: &str, purpose: &str) -> Self {
        if let Some(channel) = self.channels.iter_mut().find(|c| c.name == name) {
            channel.purpose = Some(Topic {
                value: purpose.to_string(),
            });
        }
        self
    }

    pub fn with_history(self, name: &str, messages: Vec<Message>) -> Self {
        let id = self.channels_by_name[name].clone();
        self.history
            .lock()
            .unwrap()
            .insert(id, messages);
        self
    }

    pub fn with_members(mut self, name: &str, members: &[&str]) -> Self {
        self.members.insert(
            name.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    pub fn with_only_restricted_members(mut self, name: &str) -> Self {
        self.only_restricted.insert(name.to_string());
        self
    }

    pub fn with_failing_history(mut self, name: &str) -> Self {
        self.failing.insert(self.channels_by_name[name].clone());
        self
    }

    pub fn with_archive_refused(mut self) -> Self {
        self.archive_ok = false;
        self
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }

    pub fn posts_to(&self, channel: &str) -> Vec<Post> {
        self.posts()
            .into_iter()
            .filter(|p| p.channel == channel)
            .collect()
    }

    pub fn archived(&self) -> Vec<String> {
        self.archived.lock().unwrap().clone()
    }

    pub fn history_fetches(&self) -> Vec<HistoryFetch> {
        self.history_fetches.lock().unwrap().clone()
    }

    fn id(&self, name: &str) -> Result<String, SlackError> {
        self.get_channelid(name)
            .map(str::to_string)
            .ok_or_else(|| SlackError::UnknownChannel(name.to_string()))
    }
}

#[async_trait]
impl Slacker for FakeSlacker {
    fn get_channels(&self) -> &[Channel] {
        &self.channels
    }

    fn channels_by_name(&self) -> &BTreeMap<String, String> {
        &self.channels_by_name
    }

    async fn get_channel_info(&self, name: &str) -> Result<ChannelInfo, SlackError> {
        let channel = self
            .channels
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| SlackError::UnknownChannel(name.to_string()))?;

        Ok(ChannelInfo::from_channel(channel, self.now))
    }

    async fn get_messages_in_time_range(
        &self,
        channel_id: &str,
        oldest: i64,
        latest: i64,
    ) -> Result<Vec<Message>, SlackError> {
        self.history_fetches.lock().unwrap().push(HistoryFetch {
            channel_id: channel_id.to_string(),
            oldest,
            latest,
        });

        if self.failing.contains(channel_id) {
            return Err(SlackError::api("conversations.history", "channel_not_found"));
        }

        Ok(self
            .history
            .lock()
            .unwrap()
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_channel_member_names(&self, name: &str) -> Result<Vec<String>, SlackError> {
        Ok(self.members.get(name).cloned().unwrap_or_default())
    }

    async fn channel_has_only_restricted_members(&self, name: &str) -> Result<bool, SlackError> {
        Ok(self.only_restricted.contains(name))
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        message_type: Option<MessageType>,
    ) -> Result<PostMessageResponse, SlackError> {
        let id = self.id(channel)?;
        let ts = format!("{}.{:06}", self.now, self.posts.lock().unwrap().len());

        self.posts.lock().unwrap().push(Post {
            channel: channel.to_string(),
            text: text.to_string(),
            message_type,
        });

        // Posted messages show up in later history fetches, like on Slack.
        self.history
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_default()
            .push(Message {
                kind: "message".to_string(),
                subtype: Some("bot_message".to_string()),
                user: Some(BOT_USER.to_string()),
                text: text.to_string(),
                ts: ts.clone(),
                attachments: message_type.map(|t| vec![Attachment::marker(t)]),
                files: None,
                reactions: None,
            });

        Ok(PostMessageResponse {
            ok: true,
            error: None,
            channel: Some(id),
            ts: Some(ts),
        })
    }

    async fn archive(&self, channel: &str) -> Result<ArchiveResponse, SlackError> {
        self.id(channel)?;
        self.archived.lock().unwrap().push(channel.to_string());

        Ok(ArchiveResponse {
            ok: self.archive_ok,
            error: (!self.archive_ok).then(|| "restricted_action".to_string()),
        })
    }
}

pub fn test_config() -> Config {
    Config::from_toml_str(
        r#"
slack_name = "rands-leadership"
warning_text = "This channel has been quiet for a while. Post something or it will be archived."
closure_text = "This channel is being archived for inactivity."
"#,
    )
    .unwrap()
}

pub fn message(user: &str, text: &str) -> Message {
    Message {
        kind: "message".to_string(),
        user: Some(user.to_string()),
        text: text.to_string(),
        ts: "1355517523.000005".to_string(),
        ..Message::default()
    }
}

/// A mix of human, bot, rename and rich attachment messages.
pub fn sample_messages() -> Vec<Message> {
    serde_json::from_value(json!([
        {
            "type": "message",
            "channel": "C2147483705",
            "user": "U2147483697",
            "text": "Human human human.",
            "ts": "1355517523.000005",
            "edited": { "user": "U2147483697", "ts": "1355517536.000001" }
        },
        {
            "type": "message",
            "subtype": "bot_message",
            "text": "Robot robot robot.",
            "ts": "1403051575.000407",
            "user": "U023BEAD1"
        },
        {
            "type": "message",
            "subtype": "channel_name",
            "text": "#stalin has been renamed <C2147483705|khrushchev>",
            "ts": "1403051575.000407",
            "user": "U023BECGF"
        },
        {
            "type": "message",
            "channel": "C2147483705",
            "user": "U2147483697",
            "text": "Contemplating existence.",
            "ts": "1355517523.000005"
        },
        {
            "type": "message",
            "subtype": "bot_message",
            "attachments": [{
                "fallback": "Required plain-text summary of the attachment.",
                "color": "#36a64f",
                "title": "Slack API Documentation",
                "text": "Optional text that appears within the attachment",
                "fields": [{ "title": "Priority", "value": "High", "short": false }]
            }],
            "ts": "1403051575.000407",
            "user": "U023BEAD1"
        }
    ]))
    .unwrap()
}

pub fn sample_users() -> Vec<String> {
    let mut users: Vec<String> = sample_messages()
        .into_iter()
        .filter_map(|m| m.user)
        .collect();
    users.sort();
    users.dedup();
    users
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_users_are_unique() {
        assert_eq!(sample_users(), vec!["U023BEAD1", "U023BECGF", "U2147483697"]);
    }
}
