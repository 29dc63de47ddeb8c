use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::{Deserialize, Serialize};

use crate::slacker::{SlackApi, SlackError};

#[derive(Deserialize, Serialize, Debug, Clone)]
struct TestResponse {
    ok: bool,
    error: Option<String>,
    team: Option<String>,
    user: Option<String>,
}

pub fn auth_headers(token: &str) -> Result<HeaderMap, SlackError> {
    let mut headers = HeaderMap::new();
    let value = format!("Bearer {}", token.trim())
        .parse()
        .map_err(|_| SlackError::InvalidToken)?;
    headers.insert(AUTHORIZATION, value);

    Ok(headers)
}

/// Checks the token against `auth.test` and returns the `team/user` it
/// belongs to.
pub async fn validate_token(api: &SlackApi, token: &str) -> Result<String, SlackError> {
    let headers = auth_headers(token)?;

    let test_response: TestResponse = api.get("auth.test", &headers, &[]).await?;

    if !test_response.ok {
        return Err(SlackError::api(
            "auth.test",
            test_response
                .error
                .unwrap_or_else(|| "Could not validate auth token".to_string()),
        ));
    }

    Ok(format!(
        "{}/{}",
        test_response.team.unwrap_or_default(),
        test_response.user.unwrap_or_default()
    ))
}
