//! Twitter API v2 client for the mention timeline.

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use std::time::Duration;

use crate::error::ClientError;

use super::types::{MentionsResponse, Page, PageRequest, User, UserLookupResponse};

const TWITTER_API_BASE: &str = "https://api.twitter.com/2";

/// Source of paginated mentions.
#[async_trait]
pub trait MentionFeed: Send + Sync {
    /// Fetch one page of mentions.
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ClientError>;
}

/// Twitter API v2 client authenticated with an app bearer token.
pub struct TwitterClient {
    client: Client,
    bearer_token: String,
    base_url: String,
}

impl TwitterClient {
    /// Create a client for the public API.
    pub fn new(bearer_token: String) -> Result<Self, ClientError> {
        Self::with_base_url(bearer_token, TWITTER_API_BASE)
    }

    /// Create a client targeting a custom base URL.
    pub fn with_base_url(
        bearer_token: String,
        base_url: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            bearer_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a username (with or without `@`) to its user.
    pub async fn lookup_user(&self, username: &str) -> Result<User, ClientError> {
        let username = username.trim_start_matches('@');
        let response = self
            .client
            .get(format!("{}/users/by/username/{username}", self.base_url))
            .bearer_auth(&self.bearer_token)
            .header("Accept", "application/json")
            .send()
            .await?;

        let body = Self::check(response).await?;
        let parsed: UserLookupResponse = serde_json::from_str(&body)?;
        match parsed.data {
            Some(user) => Ok(user),
            None => {
                let detail = parsed
                    .errors
                    .first()
                    .map(|p| format!("{}: {}", p.title, p.detail))
                    .unwrap_or_else(|| format!("user {username} not found"));
                Err(ClientError::MalformedResponse(detail))
            }
        }
    }

    async fn check(response: reqwest::Response) -> Result<String, ClientError> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(ClientError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

#[async_trait]
impl MentionFeed for TwitterClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Page, ClientError> {
        let mut params: Vec<(&str, String)> = vec![
            ("max_results", request.max_results.to_string()),
            ("tweet.fields", "lang,author_id".to_string()),
        ];
        if let Some(start) = request.window_start {
            params.push(("start_time", start.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(end) = request.window_end {
            params.push(("end_time", end.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(token) = &request.continuation_token {
            params.push(("pagination_token", token.clone()));
        }

        tracing::debug!(
            target_id = %request.target_id,
            token = ?request.continuation_token,
            "Fetching mentions page"
        );

        let response = self
            .client
            .get(format!("{}/users/{}/mentions", self.base_url, request.target_id))
            .bearer_auth(&self.bearer_token)
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await?;

        let body = Self::check(response).await?;
        let parsed: MentionsResponse = serde_json::from_str(&body)?;

        Ok(Page::new(parsed.data, parsed.meta.next_token))
    }
}
