//! Request Pipeline: credential lookup, request configuration and transport
//! to the captioning backend.

use crate::models::{CaptionEnvelope, CaptionPatch, Event};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tonio_core::{ClientError, ErrorCause, Failure};
use tonio_identity::SessionState;
use tracing::{debug, error};

/// Transport-level failures talking to the captioning backend.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Tonio service rejected the request: HTTP {status}")]
    Rejected { status: u16, body: Option<Value> },

    #[error("Failed to decode Tonio service response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Rejected { status, .. } => Some(*status),
            RequestError::Http(error) => error.status().map(|s| s.as_u16()),
            RequestError::Decode(_) => None,
        }
    }
}

impl From<RequestError> for ErrorCause {
    fn from(error: RequestError) -> Self {
        let body = match &error {
            RequestError::Rejected { body, .. } => body.clone(),
            _ => None,
        };
        ErrorCause::from_envelope(error, body.as_ref())
    }
}

impl From<RequestError> for Failure {
    fn from(error: RequestError) -> Self {
        Failure::Raw(error.into())
    }
}

/// Base URL and headers for one backend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
}

impl RequestConfig {
    /// `<base>/<path>` with exactly one slash between them.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Clone)]
pub struct RequestPipeline {
    http_client: reqwest::Client,
    base_url: Option<String>,
}

impl RequestPipeline {
    pub fn new(base_url: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http_client: reqwest::Client, base_url: Option<String>) -> Self {
        Self {
            http_client,
            base_url,
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Id token of the signed-in user, possibly cached.
    pub async fn current_credential(&self, session: &SessionState) -> Result<String, Failure> {
        let app = session.require_app()?;
        if app.current_user().is_none() {
            return Err(ClientError::not_authenticated().into());
        }
        Ok(app.get_id_token(false).await?)
    }

    pub fn build_config(&self, token: &str) -> Result<RequestConfig, ClientError> {
        let base_url = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(ClientError::missing_service_url)?;

        let headers = BTreeMap::from([
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Accept".to_string(), "application/json".to_string()),
            ("Accept-Encoding".to_string(), "gzip, deflate, br".to_string()),
            ("Connection".to_string(), "keep-alive".to_string()),
            ("Authorization".to_string(), format!("Bearer {}", token)),
        ]);

        Ok(RequestConfig {
            base_url: base_url.to_string(),
            headers,
        })
    }

    /// `POST <base>/events`, decoding the response as `T`.
    pub async fn submit_event<T>(&self, config: &RequestConfig, event: &Event) -> Result<T, RequestError>
    where
        T: DeserializeOwned,
    {
        self.send(Method::POST, config, "events", event).await
    }

    /// `PATCH <base>/captions`.
    pub async fn submit_caption_patch(
        &self,
        config: &RequestConfig,
        patch: &CaptionPatch,
    ) -> Result<CaptionEnvelope, RequestError> {
        self.send(Method::PATCH, config, "captions", patch).await
    }

    async fn send<B, T>(
        &self,
        method: Method,
        config: &RequestConfig,
        path: &str,
        body: &B,
    ) -> Result<T, RequestError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = config.url(path);
        debug!(%method, %url, "Sending request to Tonio service");

        let mut request = self.http_client.request(method, &url);
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.body(serde_json::to_vec(body)?).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!(status = %status, body_len = text.len(), "Tonio service rejected request");
            return Err(RequestError::Rejected {
                status: status.as_u16(),
                body: serde_json::from_str(&text).ok(),
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("base_url", &self.base_url)
            .finish()
    }
}
