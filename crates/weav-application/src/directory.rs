//! Session directory: the session list and the current selection.
//!
//! The directory is the single source of truth the presentation layer reads
//! from. All mutations happen in the completion handlers of its own async
//! operations; the lock is never held across an await, so each mutation is
//! atomic with respect to the others.

use std::sync::{Arc, RwLock};
use weav_core::error::Result;
use weav_core::session::{Session, SessionApi, SessionKind};

struct DirectoryState {
    sessions: Vec<Session>,
    current: Option<Session>,
}

/// Cache of the backend's session list plus the currently open session.
///
/// Invariant: at most one session is current at a time. Background refreshes
/// resolving after the user selected a different session update the list
/// cache but never the current selection.
pub struct SessionDirectory {
    api: Arc<dyn SessionApi>,
    state: RwLock<DirectoryState>,
}

impl SessionDirectory {
    pub fn new(api: Arc<dyn SessionApi>) -> Self {
        Self {
            api,
            state: RwLock::new(DirectoryState {
                sessions: Vec::new(),
                current: None,
            }),
        }
    }

    /// A snapshot of the cached session list.
    pub fn sessions(&self) -> Vec<Session> {
        self.state.read().unwrap().sessions.clone()
    }

    /// A snapshot of the current session, if any.
    pub fn current(&self) -> Option<Session> {
        self.state.read().unwrap().current.clone()
    }

    /// Id of the current session, if any.
    pub fn current_id(&self) -> Option<i64> {
        self.state.read().unwrap().current.as_ref().map(|s| s.id)
    }

    /// Fetches all sessions and replaces the cached list wholesale.
    pub async fn load_sessions(&self) -> Result<()> {
        let sessions = self.api.list(None).await?;
        self.state.write().unwrap().sessions = sessions;
        Ok(())
    }

    /// Makes a session current, fetching its full detail first.
    ///
    /// `None` clears the current selection.
    pub async fn select(&self, session_id: Option<i64>) -> Result<()> {
        let Some(session_id) = session_id else {
            self.state.write().unwrap().current = None;
            return Ok(());
        };
        let full = self.api.fetch(session_id).await?;
        self.state.write().unwrap().current = Some(full);
        Ok(())
    }

    /// Creates a session, prepends it to the list, and makes it current.
    pub async fn create(&self, kind: SessionKind, title: Option<String>) -> Result<Session> {
        let session = self.api.create(kind, title).await?;
        let mut state = self.state.write().unwrap();
        state.sessions.insert(0, session.clone());
        state.current = Some(session.clone());
        Ok(session)
    }

    /// Renames a session, patching the list entry and the current session
    /// when the ids match.
    pub async fn rename(&self, session_id: i64, title: &str) -> Result<()> {
        let updated = self.api.rename(session_id, title).await?;
        let mut state = self.state.write().unwrap();
        if let Some(entry) = state.sessions.iter_mut().find(|s| s.id == session_id) {
            *entry = updated.clone();
        }
        if state.current.as_ref().is_some_and(|c| c.id == session_id) {
            state.current = Some(updated);
        }
        Ok(())
    }

    /// Deletes a session, dropping it from the list; if it was current, the
    /// selection is cleared.
    pub async fn remove(&self, session_id: i64) -> Result<()> {
        self.api.delete(session_id).await?;
        let mut state = self.state.write().unwrap();
        state.sessions.retain(|s| s.id != session_id);
        if state.current.as_ref().is_some_and(|c| c.id == session_id) {
            state.current = None;
        }
        Ok(())
    }

    /// Best-effort re-fetch of the current session.
    pub async fn refresh_current(&self) {
        let Some(session_id) = self.current_id() else {
            return;
        };
        self.refresh_one(session_id).await;
    }

    /// Re-fetches one session and patches it into the cache.
    ///
    /// The current session is updated only when its id still equals
    /// `session_id` at the time the fetch resolves; a refresh that lost a
    /// race with the user navigating away updates the list entry only.
    ///
    /// Returns whether the refreshed session was (and remains) current, so
    /// callers can decide whether errors tied to it may be surfaced. This is
    /// best-effort background sync: all failures are swallowed and reported
    /// as `false`.
    pub async fn refresh_one(&self, session_id: i64) -> bool {
        let updated = match self.api.fetch(session_id).await {
            Ok(session) => session,
            Err(err) => {
                tracing::debug!("background refresh of session {session_id} failed: {err}");
                return false;
            }
        };

        let mut state = self.state.write().unwrap();
        if let Some(entry) = state.sessions.iter_mut().find(|s| s.id == session_id) {
            *entry = updated.clone();
        }
        let still_current = state.current.as_ref().is_some_and(|c| c.id == session_id);
        if still_current {
            state.current = Some(updated);
        }
        still_current
    }
}
