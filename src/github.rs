//! Write side of the pipeline: pushes a composed status to the GitHub
//! profile-status endpoint.

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, StatusCode};
use serde::Serialize;
use thiserror::Error;

use crate::status::compose::StatusMessage;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("status sink returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusSink: Send {
    async fn publish(&mut self, status: &StatusMessage) -> Result<(), PublishError>;
}

#[derive(Serialize)]
struct StatusPayload<'a> {
    emoji: &'a str,
    message: &'a str,
}

pub struct GithubStatusClient {
    http: reqwest::Client,
    endpoint: String,
    auth_header: String,
}

impl GithubStatusClient {
    pub fn new(endpoint: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
            auth_header: format!("Bearer {token}"),
        }
    }
}

#[async_trait]
impl StatusSink for GithubStatusClient {
    /// One write, no retry. Retrying is the fetch side's concern only.
    async fn publish(&mut self, status: &StatusMessage) -> Result<(), PublishError> {
        let payload = StatusPayload {
            emoji: &status.emoji,
            message: &status.text,
        };
        let response = self
            .http
            .post(&self.endpoint)
            .header(AUTHORIZATION, &self.auth_header)
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PublishError::Rejected {
                status: response.status(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}
