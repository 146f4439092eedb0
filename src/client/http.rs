// HTTP client for drift endpoints
//
// Deployed endpoints answer in three shapes: the bare body, the proxy envelope
// with `body` as a JSON string, or the envelope with `body` already an object.
// All three decode to the same outcome.

use crate::models::response::DriftResponseBody;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const MIN_TIMEOUT_SECS: u64 = 1;
pub const MAX_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid timeout: {0}s. Must be between 1 and 300 seconds")]
    InvalidTimeout(u64),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not decode response: {0}")]
    Decode(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A decoded drift response
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// Status of the HTTP response itself
    pub http_status: u16,
    /// The envelope's `statusCode` when there is one, else `http_status`
    pub status: u16,
    pub body: DriftResponseBody,
    /// Inner body as received
    pub raw: Value,
    /// `body` arrived as a JSON string inside the envelope
    pub double_encoded: bool,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.body.error.is_none()
    }
}

pub fn decode_response(http_status: u16, text: &str) -> ClientResult<ProbeOutcome> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| ClientError::Decode(format!("response is not JSON ({}): {}", e, preview(text))))?;

    let envelope_status = value
        .get("statusCode")
        .and_then(Value::as_u64)
        .and_then(|s| u16::try_from(s).ok());

    let (status, raw, double_encoded) = match (envelope_status, value.get("body")) {
        (Some(status), Some(Value::String(inner))) => {
            let raw = serde_json::from_str(inner)
                .map_err(|e| ClientError::Decode(format!("envelope body is not JSON: {}", e)))?;
            (status, raw, true)
        }
        (Some(status), Some(inner @ Value::Object(_))) => (status, inner.clone(), false),
        (Some(_), _) => {
            return Err(ClientError::Decode(
                "envelope has no usable body".to_string(),
            ))
        }
        (None, _) => (http_status, value, false),
    };

    let body = serde_json::from_value(raw.clone())
        .map_err(|e| ClientError::Decode(format!("unexpected body fields: {}", e)))?;

    Ok(ProbeOutcome {
        http_status,
        status,
        body,
        raw,
        double_encoded,
    })
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

pub struct DriftClient {
    http: reqwest::Client,
    endpoint: String,
}

impl DriftClient {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> ClientResult<Self> {
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout_secs) {
            return Err(ClientError::InvalidTimeout(timeout_secs));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST a payload and decode whatever shape comes back
    pub async fn analyze<T: Serialize + ?Sized>(&self, payload: &T) -> ClientResult<ProbeOutcome> {
        let response = self.http.post(&self.endpoint).json(payload).send().await?;
        let http_status = response.status().as_u16();
        let text = response.text().await?;

        debug!(endpoint = %self.endpoint, http_status, bytes = text.len(), "Drift response");
        decode_response(http_status, &text)
    }
}
