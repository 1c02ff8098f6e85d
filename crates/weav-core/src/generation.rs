//! Generation API trait and request types.
//!
//! Generation is asynchronous on the backend: a submit call returns a
//! [`JobTicket`](crate::job::JobTicket) and the client polls the job until it
//! reaches a terminal state. This module defines the seam the orchestrator
//! drives; the HTTP implementation lives in `weav-interaction`.

use crate::error::Result;
use crate::job::{JobStatus, JobTicket};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A fully resolved image generation request.
///
/// `reference_image_id` and `reference_image_url` are mutually exclusive;
/// the orchestrator resolves the pair before submitting, with the URL
/// taking precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
    pub num_images: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// Option subset accepted by the image regenerate endpoint.
///
/// The prompt and model are not part of it: the backend reuses those of the
/// most recent image record in the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRegenOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

/// An abstract client for the backend's generation and job endpoints.
#[async_trait]
pub trait GenerationApi: Send + Sync {
    /// Submits a chat completion for the session.
    async fn complete_chat(
        &self,
        session_id: i64,
        prompt: &str,
        model: &str,
        system_prompt: Option<&str>,
    ) -> Result<JobTicket>;

    /// Resubmits the session's last exchange, optionally with an edited
    /// prompt or a different model.
    async fn regenerate_chat(
        &self,
        session_id: i64,
        model: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<JobTicket>;

    /// Submits an image generation for the session.
    async fn complete_image(&self, session_id: i64, request: &ImageRequest) -> Result<JobTicket>;

    /// Resubmits the session's most recent image generation with adjusted
    /// options.
    async fn regenerate_image(
        &self,
        session_id: i64,
        options: &ImageRegenOptions,
    ) -> Result<JobTicket>;

    /// Queries the status of a job by task id.
    async fn job_status(&self, task_id: &str) -> Result<JobStatus>;

    /// Asks the backend to cancel a job. Fire-and-forget: the backend only
    /// acknowledges, it does not report whether the job was still running.
    async fn cancel_job(&self, task_id: &str) -> Result<()>;

    /// Uploads a reference image and returns the URL the backend stored it
    /// under.
    async fn upload_reference_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String>;
}
