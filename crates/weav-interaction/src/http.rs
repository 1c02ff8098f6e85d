//! Reqwest-based implementation of the backend API traits.
//!
//! Error bodies follow the backend's `{"detail": "..."}` convention; when a
//! body does not parse, the HTTP status text is surfaced instead.

use crate::config::ApiConfig;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use weav_core::error::{Result, WeavError};
use weav_core::generation::{GenerationApi, ImageRegenOptions, ImageRequest};
use weav_core::job::{JobStatus, JobTicket};
use weav_core::session::{Session, SessionApi, SessionKind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the weav backend.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    /// Creates a client from the given configuration.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| WeavError::http(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_http_error(status, &body))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport_error)?;
        self.check(response).await?.json().await.map_err(decode_error)
    }

    async fn post_json<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        self.check(response).await?.json().await.map_err(decode_error)
    }
}

fn transport_error(err: reqwest::Error) -> WeavError {
    WeavError::http(err.to_string())
}

fn decode_error(err: reqwest::Error) -> WeavError {
    WeavError::Serialization {
        format: "JSON".to_string(),
        message: err.to_string(),
    }
}

fn map_http_error(status: StatusCode, body: &str) -> WeavError {
    let message = serde_json::from_str::<ErrorDetail>(body)
        .map(|detail| detail.detail)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    WeavError::api(status.as_u16(), message)
}

#[derive(Deserialize)]
struct ErrorDetail {
    detail: String,
}

#[derive(Serialize)]
struct CreateSessionRequest {
    kind: SessionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
}

#[derive(Serialize)]
struct PatchSessionRequest<'a> {
    title: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    session_id: i64,
    prompt: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<&'a str>,
}

#[derive(Serialize)]
struct RegenerateChatRequest<'a> {
    session_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
}

#[derive(Serialize)]
struct ImageGenerationRequest<'a> {
    session_id: i64,
    #[serde(flatten)]
    request: &'a ImageRequest,
}

#[derive(Serialize)]
struct ImageRegenerationRequest<'a> {
    session_id: i64,
    #[serde(flatten)]
    options: &'a ImageRegenOptions,
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

#[async_trait]
impl SessionApi for HttpApi {
    async fn list(&self, kind: Option<SessionKind>) -> Result<Vec<Session>> {
        let path = match kind {
            Some(kind) => format!("/api/v1/sessions/?kind={}", kind.as_str()),
            None => "/api/v1/sessions/".to_string(),
        };
        self.get_json(&path).await
    }

    async fn fetch(&self, session_id: i64) -> Result<Session> {
        self.get_json(&format!("/api/v1/sessions/{session_id}/")).await
    }

    async fn create(&self, kind: SessionKind, title: Option<String>) -> Result<Session> {
        self.post_json("/api/v1/sessions/", &CreateSessionRequest { kind, title })
            .await
    }

    async fn rename(&self, session_id: i64, title: &str) -> Result<Session> {
        let response = self
            .client
            .patch(self.url(&format!("/api/v1/sessions/{session_id}/")))
            .json(&PatchSessionRequest { title })
            .send()
            .await
            .map_err(transport_error)?;
        self.check(response).await?.json().await.map_err(decode_error)
    }

    async fn delete(&self, session_id: i64) -> Result<()> {
        let response = self
            .client
            .delete(self.url(&format!("/api/v1/sessions/{session_id}/")))
            .send()
            .await
            .map_err(transport_error)?;
        // 204, no body
        self.check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl GenerationApi for HttpApi {
    async fn complete_chat(
        &self,
        session_id: i64,
        prompt: &str,
        model: &str,
        system_prompt: Option<&str>,
    ) -> Result<JobTicket> {
        self.post_json(
            "/api/v1/chat/complete/",
            &ChatCompletionRequest {
                session_id,
                prompt,
                model,
                system_prompt,
            },
        )
        .await
    }

    async fn regenerate_chat(
        &self,
        session_id: i64,
        model: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<JobTicket> {
        self.post_json(
            "/api/v1/chat/regenerate/",
            &RegenerateChatRequest {
                session_id,
                model,
                prompt,
            },
        )
        .await
    }

    async fn complete_image(&self, session_id: i64, request: &ImageRequest) -> Result<JobTicket> {
        self.post_json(
            "/api/v1/chat/image/",
            &ImageGenerationRequest {
                session_id,
                request,
            },
        )
        .await
    }

    async fn regenerate_image(
        &self,
        session_id: i64,
        options: &ImageRegenOptions,
    ) -> Result<JobTicket> {
        self.post_json(
            "/api/v1/chat/image/regenerate/",
            &ImageRegenerationRequest {
                session_id,
                options,
            },
        )
        .await
    }

    async fn job_status(&self, task_id: &str) -> Result<JobStatus> {
        self.get_json(&format!("/api/v1/chat/job/{task_id}/")).await
    }

    async fn cancel_job(&self, task_id: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/api/v1/chat/job/{task_id}/cancel/")))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(transport_error)?;
        self.check(response).await?;
        Ok(())
    }

    async fn upload_reference_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(self.url("/api/v1/chat/image/upload-reference/"))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let upload: UploadResponse =
            self.check(response).await?.json().await.map_err(decode_error)?;
        Ok(upload.url)
    }
}
