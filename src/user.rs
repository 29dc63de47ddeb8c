use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::conversations::ResponseMetadata;
use crate::slacker::{SlackApi, SlackError};

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct Profile {
    #[serde(default)]
    pub real_name_normalized: String,
    #[serde(default)]
    pub display_name_normalized: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
    /// Multi-channel guest
    #[serde(default)]
    pub is_restricted: bool,
    /// Single-channel guest
    #[serde(default)]
    pub is_ultra_restricted: bool,
    #[serde(default)]
    pub profile: Profile,
}

impl User {
    pub fn is_guest(&self) -> bool {
        self.is_restricted || self.is_ultra_restricted
    }

    pub fn display_name(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.profile.display_name_normalized.is_empty() {
            &self.profile.display_name_normalized
        } else {
            &self.profile.real_name_normalized
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct UsersListResponse {
    pub ok: bool,
    pub error: Option<String>,
    pub members: Option<Vec<User>>,
    pub response_metadata: Option<ResponseMetadata>,
}

pub async fn get_users(api: &SlackApi, headers: &HeaderMap) -> Result<Vec<User>, SlackError> {
    let mut all_users = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut params = vec![("limit", "999")];
        if let Some(cursor) = &cursor {
            params.push(("cursor", cursor));
        }

        let response: UsersListResponse = api.get("users.list", headers, &params).await?;
        if !response.ok {
            return Err(SlackError::api(
                "users.list",
                response.error.unwrap_or_default(),
            ));
        }

        all_users.extend(response.members.unwrap_or_default());

        match response
            .response_metadata
            .map(|m| m.next_cursor)
            .filter(|c| !c.is_empty())
        {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(all_users)
}
