use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Role {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "assistant")]
    Assistant,
    /// Only appears in the legacy `/api/history` payload. Never shown.
    #[serde(rename = "system")]
    System,
}

/// One entry of a conversation transcript.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now", deserialize_with = "lenient_utc")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A server-side conversation as listed in the sidebar.
///
/// The backend stores conversations in MongoDB and serializes the key as `_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Conversation {
    #[serde(alias = "_id")]
    pub id: String,
    pub title: String,
    #[serde(deserialize_with = "lenient_utc")]
    pub updated_at: DateTime<Utc>,
}

/// Reads an RFC 3339 timestamp, or a naive one (no offset) taken as UTC.
///
/// The backend stores datetimes without a zone and serializes them as
/// `2025-03-01T10:00:00.123000`.
fn lenient_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// Body of `POST /api/chat`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    /// Absent means "create a new conversation".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Body of `POST /api/conversations` and `PUT /api/conversations/{id}`.
#[derive(Serialize, Debug)]
pub(crate) struct TitleBody<'a> {
    pub title: &'a str,
}

/// `{success: bool}` reply of rename and delete.
#[derive(Deserialize, Debug)]
pub(crate) struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
}
