use reqwest::header::HeaderMap;
use tracing::debug;

use crate::conversations::{
    Channel, HistoryResponse, InfoResponse, ListResponse, MembersResponse, Message,
    ResponseMetadata,
};
use crate::slacker::{SlackApi, SlackError};

const PAGE_LIMIT: &str = "999";

fn next_cursor(metadata: Option<&ResponseMetadata>) -> Option<String> {
    match metadata.map(|m| m.next_cursor.as_str()) {
        None | Some("") => None,
        Some(cursor) => Some(cursor.to_string()),
    }
}

/// Lists every unarchived public channel in the workspace.
pub async fn get_channels(api: &SlackApi, headers: &HeaderMap) -> Result<Vec<Channel>, SlackError> {
    let mut all_channels = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut params = vec![
            ("types", "public_channel"),
            ("exclude_archived", "true"),
            ("limit", PAGE_LIMIT),
        ];
        if let Some(cursor) = &cursor {
            params.push(("cursor", cursor));
        }

        let list: ListResponse = api.get("conversations.list", headers, &params).await?;
        if !list.ok {
            return Err(SlackError::api(
                "conversations.list",
                list.error.unwrap_or_default(),
            ));
        }

        all_channels.extend(list.channels.unwrap_or_default());

        match next_cursor(list.response_metadata.as_ref()) {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(all_channels)
}

pub async fn get_channel_info(
    api: &SlackApi,
    headers: &HeaderMap,
    channel_id: &str,
) -> Result<Channel, SlackError> {
    let info: InfoResponse = api
        .get("conversations.info", headers, &[("channel", channel_id)])
        .await?;

    match info {
        InfoResponse {
            ok: true,
            channel: Some(channel),
            ..
        } => Ok(channel),
        InfoResponse { error, .. } => Err(SlackError::api(
            "conversations.info",
            error.unwrap_or_else(|| "missing channel".to_string()),
        )),
    }
}

/// Fetches the channel history between `oldest` and `latest` (unix seconds),
/// following pagination cursors until Slack reports no more pages.
pub async fn get_messages(
    api: &SlackApi,
    headers: &HeaderMap,
    channel_id: &str,
    oldest: i64,
    latest: i64,
) -> Result<Vec<Message>, SlackError> {
    let mut all_messages = Vec::new();
    let mut cursor: Option<String> = None;
    let oldest = oldest.to_string();
    let latest = latest.to_string();

    let mut page = 1;

    loop {
        let mut params = vec![
            ("channel", channel_id),
            ("oldest", &oldest),
            ("latest", &latest),
            ("inclusive", "true"),
            ("limit", PAGE_LIMIT),
        ];
        if let Some(cursor) = &cursor {
            params.push(("cursor", cursor));
        }

        let channel_history: HistoryResponse =
            api.get("conversations.history", headers, &params).await?;
        if !channel_history.ok {
            return Err(SlackError::api(
                "conversations.history",
                channel_history.error.unwrap_or_default(),
            ));
        }

        if let Some(messages) = channel_history.messages {
            all_messages.extend(messages);
        }

        let Some(next) = next_cursor(channel_history.response_metadata.as_ref()) else {
            break;
        };
        cursor = Some(next);

        page += 1;
        debug!(channel_id, page, "fetching next history page");
    }

    Ok(all_messages)
}

pub async fn get_member_ids(
    api: &SlackApi,
    headers: &HeaderMap,
    channel_id: &str,
) -> Result<Vec<String>, SlackError> {
    let mut all_members = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut params = vec![("channel", channel_id), ("limit", PAGE_LIMIT)];
        if let Some(cursor) = &cursor {
            params.push(("cursor", cursor));
        }

        let members: MembersResponse = api.get("conversations.members", headers, &params).await?;
        if !members.ok {
            return Err(SlackError::api(
                "conversations.members",
                members.error.unwrap_or_default(),
            ));
        }

        all_members.extend(members.members.unwrap_or_default());

        match next_cursor(members.response_metadata.as_ref()) {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(all_members)
}
