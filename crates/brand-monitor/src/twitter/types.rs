//! Twitter data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A post mentioning the tracked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Unique tweet ID.
    pub id: String,
    /// Tweet text content.
    pub text: String,
    /// Language detected by Twitter (BCP 47, `und` when unknown).
    #[serde(rename = "lang", default = "undetermined")]
    pub language: String,
    /// Author ID, when requested.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub author_id: Option<String>,
}

fn undetermined() -> String {
    "und".to_string()
}

impl Mention {
    /// Create a mention with minimal required fields.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            language: language.into(),
            author_id: None,
        }
    }
}

/// One page of the mention timeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Mentions in timeline order.
    pub mentions: Vec<Mention>,
    /// Cursor for the next page, absent on the last page.
    pub continuation_token: Option<String>,
}

impl Page {
    /// Create a page.
    #[must_use]
    pub fn new(mentions: Vec<Mention>, continuation_token: Option<String>) -> Self {
        Self {
            mentions,
            continuation_token,
        }
    }
}

/// Parameters of a single page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Account whose mentions are fetched.
    pub target_id: String,
    /// Page size.
    pub max_results: u32,
    /// Inclusive window start.
    pub window_start: Option<DateTime<Utc>>,
    /// Window end.
    pub window_end: Option<DateTime<Utc>>,
    /// Cursor returned by the previous page.
    pub continuation_token: Option<String>,
}

/// Raw `GET /2/users/:id/mentions` response.
#[derive(Debug, Deserialize)]
pub(crate) struct MentionsResponse {
    #[serde(default)]
    pub data: Vec<Mention>,
    #[serde(default)]
    pub meta: ResponseMeta,
}

/// Pagination metadata.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResponseMeta {
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Raw `GET /2/users/by/username/:username` response.
#[derive(Debug, Deserialize)]
pub(crate) struct UserLookupResponse {
    pub data: Option<User>,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

/// Twitter user.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// Numeric user ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Handle (without @).
    pub username: String,
}

/// Error object embedded in a 200 response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiProblem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}
