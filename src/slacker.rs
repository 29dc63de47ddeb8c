//! Messaging client facade over the Slack Web API.
//!
//! The rest of the bot only talks to the workspace through the [`Slacker`]
//! trait. [`SlackClient`] is the real implementation; it lists channels and
//! users once when connecting and answers name lookups from that snapshot.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::auth_headers;
use crate::channel;
use crate::conversations::{
    ArchiveResponse, Attachment, Channel, MessageType, Message, PostMessageResponse,
};
use crate::user::{get_users, User};

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("slack request {method} failed: {source}")]
    Request {
        method: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("slack api {method} failed: {error}")]
    Api { method: &'static str, error: String },

    #[error("unknown channel #{0}")]
    UnknownChannel(String),

    #[error("token cannot be used as an authorization header")]
    InvalidToken,
}

impl SlackError {
    pub fn api(method: &'static str, error: impl Into<String>) -> Self {
        Self::Api {
            method,
            error: error.into(),
        }
    }
}

/// Thin HTTP wrapper that knows where the Web API lives.
#[derive(Debug, Clone)]
pub struct SlackApi {
    http: reqwest::Client,
    base: String,
}

impl SlackApi {
    pub fn new(base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        method: &'static str,
        headers: &HeaderMap,
        query: &[(&str, &str)],
    ) -> Result<T, SlackError> {
        let response = self
            .http
            .get(self.url(method))
            .headers(headers.clone())
            .query(query)
            .send()
            .await
            .map_err(|source| SlackError::Request { method, source })?;

        response
            .json::<T>()
            .await
            .map_err(|source| SlackError::Request { method, source })
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        method: &'static str,
        headers: &HeaderMap,
        body: &Value,
    ) -> Result<T, SlackError> {
        let response = self
            .http
            .post(self.url(method))
            .headers(headers.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| SlackError::Request { method, source })?;

        response
            .json::<T>()
            .await
            .map_err(|source| SlackError::Request { method, source })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub created: i64,
    /// Seconds since the channel was created
    pub age: i64,
    pub creator: Option<String>,
    pub purpose: Option<String>,
}

impl ChannelInfo {
    pub fn from_channel(channel: Channel, now: i64) -> Self {
        Self {
            age: now - channel.created,
            id: channel.id,
            name: channel.name,
            created: channel.created,
            creator: channel.creator,
            purpose: channel
                .purpose
                .map(|p| p.value)
                .filter(|p| !p.trim().is_empty()),
        }
    }
}

#[async_trait]
pub trait Slacker: Send + Sync {
    fn get_channels(&self) -> &[Channel];

    fn channels_by_name(&self) -> &BTreeMap<String, String>;

    fn get_channelid(&self, name: &str) -> Option<&str> {
        self.channels_by_name().get(name).map(String::as_str)
    }

    /// `<#ID|name>` for a known channel.
    fn add_channel_markup(&self, name: &str) -> Option<String> {
        self.get_channelid(name)
            .map(|id| format!("<#{id}|{name}>"))
    }

    async fn get_channel_info(&self, name: &str) -> Result<ChannelInfo, SlackError>;

    async fn get_messages_in_time_range(
        &self,
        channel_id: &str,
        oldest: i64,
        latest: i64,
    ) -> Result<Vec<Message>, SlackError>;

    async fn get_channel_member_names(&self, name: &str) -> Result<Vec<String>, SlackError>;

    async fn channel_has_only_restricted_members(&self, name: &str) -> Result<bool, SlackError>;

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        message_type: Option<MessageType>,
    ) -> Result<PostMessageResponse, SlackError>;

    /// Archives the channel. A refusal from Slack comes back as a non-ok
    /// response rather than an error.
    async fn archive(&self, channel: &str) -> Result<ArchiveResponse, SlackError>;
}

pub struct SlackClient {
    api: SlackApi,
    /// Workspace token: reads and archives
    api_headers: HeaderMap,
    /// Bot token: posts
    bot_headers: HeaderMap,
    channels: Vec<Channel>,
    channels_by_name: BTreeMap<String, String>,
    users: HashMap<String, User>,
}

impl SlackClient {
    pub async fn connect(api_base: &str, api_token: &str, bot_token: &str) -> Result<Self, SlackError> {
        let api = SlackApi::new(api_base);
        let api_headers = auth_headers(api_token)?;
        let bot_headers = auth_headers(bot_token)?;

        let channels = channel::get_channels(&api, &api_headers).await?;
        let users = get_users(&api, &api_headers).await?;

        info!(
            channels = channels.len(),
            users = users.len(),
            "connected to slack workspace"
        );

        let channels_by_name = channels
            .iter()
            .map(|c| (c.name.clone(), c.id.clone()))
            .collect();
        let users = users.into_iter().map(|u| (u.id.clone(), u)).collect();

        Ok(Self {
            api,
            api_headers,
            bot_headers,
            channels,
            channels_by_name,
            users,
        })
    }

    fn require_channelid(&self, name: &str) -> Result<&str, SlackError> {
        self.get_channelid(name)
            .ok_or_else(|| SlackError::UnknownChannel(name.to_string()))
    }

    async fn get_channel_member_ids(&self, name: &str) -> Result<Vec<String>, SlackError> {
        let channel_id = self.require_channelid(name)?;
        channel::get_member_ids(&self.api, &self.api_headers, channel_id).await
    }
}

#[async_trait]
impl Slacker for SlackClient {
    fn get_channels(&self) -> &[Channel] {
        &self.channels
    }

    fn channels_by_name(&self) -> &BTreeMap<String, String> {
        &self.channels_by_name
    }

    async fn get_channel_info(&self, name: &str) -> Result<ChannelInfo, SlackError> {
        let channel_id = self.require_channelid(name)?;
        let channel = channel::get_channel_info(&self.api, &self.api_headers, channel_id).await?;

        Ok(ChannelInfo::from_channel(channel, Utc::now().timestamp()))
    }

    async fn get_messages_in_time_range(
        &self,
        channel_id: &str,
        oldest: i64,
        latest: i64,
    ) -> Result<Vec<Message>, SlackError> {
        channel::get_messages(&self.api, &self.api_headers, channel_id, oldest, latest).await
    }

    async fn get_channel_member_names(&self, name: &str) -> Result<Vec<String>, SlackError> {
        let ids = self.get_channel_member_ids(name).await?;

        Ok(ids
            .iter()
            .map(|id| {
                self.users
                    .get(id)
                    .map_or_else(|| id.clone(), |u| u.display_name().to_string())
            })
            .collect())
    }

    async fn channel_has_only_restricted_members(&self, name: &str) -> Result<bool, SlackError> {
        let ids = self.get_channel_member_ids(name).await?;
        if ids.is_empty() {
            return Ok(false);
        }

        Ok(ids
            .iter()
            .all(|id| self.users.get(id).is_some_and(User::is_guest)))
    }

    async fn post_message(
        &self,
        channel: &str,
        text: &str,
        message_type: Option<MessageType>,
    ) -> Result<PostMessageResponse, SlackError> {
        let channel_id = self.require_channelid(channel)?;

        let mut payload = json!({
            "channel": channel_id,
            "text": text,
            "link_names": true,
        });
        if let Some(message_type) = message_type {
            payload["attachments"] = json!([Attachment::marker(message_type)]);
        }

        let response: PostMessageResponse = self
            .api
            .post("chat.postMessage", &self.bot_headers, &payload)
            .await?;
        if !response.ok {
            return Err(SlackError::api(
                "chat.postMessage",
                response.error.unwrap_or_default(),
            ));
        }

        debug!(channel, ts = ?response.ts, "posted message");
        Ok(response)
    }

    async fn archive(&self, channel: &str) -> Result<ArchiveResponse, SlackError> {
        let channel_id = self.require_channelid(channel)?;

        self.api
            .post(
                "conversations.archive",
                &self.api_headers,
                &json!({ "channel": channel_id }),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn mock_workspace(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/conversations.list");
            then.status(200).json_body(json!({
                "ok": true,
                "channels": [
                    { "id": "C012839", "name": "leninists", "created": 1_000 },
                    { "id": "C102843", "name": "stalinists", "created": 2_000 }
                ],
                "response_metadata": { "next_cursor": "" }
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/users.list");
            then.status(200).json_body(json!({
                "ok": true,
                "members": [
                    { "id": "U1", "name": "sridhar" },
                    { "id": "U2", "name": "jane", "is_restricted": true },
                    { "id": "U3", "name": "guest", "is_ultra_restricted": true }
                ]
            }));
        });
    }

    async fn connect(server: &MockServer) -> SlackClient {
        SlackClient::connect(&server.base_url(), "xoxp-api", "xoxb-bot")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn connect_indexes_channels_by_name() {
        let server = MockServer::start();
        mock_workspace(&server);

        let client = connect(&server).await;

        assert_eq!(client.get_channelid("leninists"), Some("C012839"));
        assert_eq!(client.get_channelid("trotskyists"), None);
        assert_eq!(
            client.add_channel_markup("stalinists").as_deref(),
            Some("<#C102843|stalinists>")
        );
        assert_eq!(client.get_channels().len(), 2);
    }

    #[tokio::test]
    async fn member_names_and_restricted_check_use_user_directory() {
        let server = MockServer::start();
        mock_workspace(&server);
        server.mock(|when, then| {
            when.method(GET)
                .path("/conversations.members")
                .query_param("channel", "C012839");
            then.status(200)
                .json_body(json!({ "ok": true, "members": ["U1", "U2"] }));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path("/conversations.members")
                .query_param("channel", "C102843");
            then.status(200)
                .json_body(json!({ "ok": true, "members": ["U2", "U3"] }));
        });

        let client = connect(&server).await;

        assert_eq!(
            client.get_channel_member_names("leninists").await.unwrap(),
            vec!["sridhar", "jane"]
        );
        assert!(!client
            .channel_has_only_restricted_members("leninists")
            .await
            .unwrap());
        assert!(client
            .channel_has_only_restricted_members("stalinists")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn post_message_tags_message_type_with_bot_token() {
        let server = MockServer::start();
        mock_workspace(&server);
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/chat.postMessage")
                .header("authorization", "Bearer xoxb-bot")
                .body_includes(r#""channel":"C102843""#)
                .body_includes(r#""attachments":[{"fallback":"channel_warning"}]"#);
            then.status(200)
                .json_body(json!({ "ok": true, "channel": "C102843", "ts": "1.2" }));
        });

        let client = connect(&server).await;
        let response = client
            .post_message("stalinists", "hello", Some(MessageType::ChannelWarning))
            .await
            .unwrap();

        assert_eq!(response.ts.as_deref(), Some("1.2"));
        assert_eq!(post.calls(), 1);
    }

    #[tokio::test]
    async fn archive_returns_non_ok_response() {
        let server = MockServer::start();
        mock_workspace(&server);
        server.mock(|when, then| {
            when.method(POST)
                .path("/conversations.archive")
                .header("authorization", "Bearer xoxp-api");
            then.status(200)
                .json_body(json!({ "ok": false, "error": "cant_archive_general" }));
        });

        let client = connect(&server).await;
        let response = client.archive("leninists").await.unwrap();

        assert!(!response.ok);
        assert_eq!(response.error.as_deref(), Some("cant_archive_general"));
    }

    #[tokio::test]
    async fn unknown_channel_is_an_error() {
        let server = MockServer::start();
        mock_workspace(&server);

        let client = connect(&server).await;
        let err = client.archive("trotskyists").await.unwrap_err();

        assert!(matches!(err, SlackError::UnknownChannel(name) if name == "trotskyists"));
    }

    #[test]
    fn channel_info_computes_age_and_drops_blank_purpose() {
        let channel: Channel = serde_json::from_value(json!({
            "id": "C1",
            "name": "general",
            "created": 1_000,
            "purpose": { "value": "  " }
        }))
        .unwrap();

        let info = ChannelInfo::from_channel(channel, 1_000 + 86_400);

        assert_eq!(info.age, 86_400);
        assert_eq!(info.purpose, None);
    }
}
