//! Session API trait.
//!
//! Defines the interface for session CRUD against the backend.

use super::model::{Session, SessionKind};
use crate::error::Result;
use async_trait::async_trait;

/// An abstract client for the backend's session endpoints.
///
/// This trait decouples the session directory from the concrete transport
/// (HTTP in production, in-memory fakes in tests). The backend owns all
/// session state; implementations only move it across the wire.
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Lists all sessions, optionally filtered by kind.
    ///
    /// Sessions come back without their message/image content.
    async fn list(&self, kind: Option<SessionKind>) -> Result<Vec<Session>>;

    /// Fetches the full detail of one session, including its messages or
    /// image records.
    async fn fetch(&self, session_id: i64) -> Result<Session>;

    /// Creates a session of the given kind.
    ///
    /// When `title` is `None` the backend picks a placeholder title.
    async fn create(&self, kind: SessionKind, title: Option<String>) -> Result<Session>;

    /// Renames a session and returns the updated copy.
    async fn rename(&self, session_id: i64, title: &str) -> Result<Session>;

    /// Deletes a session.
    async fn delete(&self, session_id: i64) -> Result<()>;
}
