//! Backend job types.
//!
//! A job is one asynchronous unit of backend work (one generation request)
//! tracked by a task id. Jobs are transient on the client: they exist only
//! for the duration of one submit→poll cycle and are never cached.

use crate::session::{ImageRecord, Message};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a backend job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Success,
    Failure,
}

impl JobState {
    /// Whether the job has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Success | JobState::Failure)
    }
}

/// Response of a generation submit call.
///
/// `message_id` is present on chat paths only: it identifies the user
/// message the backend created for the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTicket {
    pub task_id: String,
    pub job_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

/// Status of a job as reported by the backend.
///
/// On `success` the backend attaches the resulting message or image record;
/// on `failure` it attaches the error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub task_id: String,
    pub job_id: i64,
    pub status: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
