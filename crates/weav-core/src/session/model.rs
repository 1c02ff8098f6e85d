//! Session domain model.
//!
//! A session is a persisted conversation or generation thread owned by the
//! backend; the client only ever holds a cached copy of it.

use serde::{Deserialize, Serialize};

/// The kind of content a session holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Chat,
    Image,
    Studio,
}

impl SessionKind {
    /// Wire representation, also used for `?kind=` query filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Chat => "chat",
            SessionKind::Image => "image",
            SessionKind::Studio => "studio",
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(SessionKind::Chat),
            "image" => Ok(SessionKind::Image),
            "studio" => Ok(SessionKind::Studio),
            other => Err(format!("unknown session kind: {other}")),
        }
    }
}

/// The author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat message within a session.
///
/// Messages are append-only from the client's perspective: they are created
/// by the backend and replaced wholesale on refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub role: Role,
    pub content: String,
    /// Timestamp when the message was created (ISO 8601 format)
    pub created_at: String,
}

/// One generated image within an image session.
///
/// Same append-only lifecycle as [`Message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: i64,
    /// The prompt the image was generated from
    pub prompt: String,
    pub image_url: String,
    /// Identifier of the model that produced the image
    pub model: String,
    /// Timestamp when the record was created (ISO 8601 format)
    pub created_at: String,
}

/// A session as served by the backend.
///
/// The list endpoint returns sessions without their content; the detail
/// endpoint fills in `messages` (chat) or `image_records` (image), whichever
/// is relevant for the kind. Both default to empty so one type covers both
/// shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub kind: SessionKind,
    pub title: String,
    /// Timestamp when the session was created (ISO 8601 format)
    pub created_at: String,
    /// Timestamp when the session was last updated (ISO 8601 format)
    pub updated_at: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub image_records: Vec<ImageRecord>,
}
