use std::env;

use async_trait::async_trait;
use eyre::{eyre, Result};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

/// A successful reply from the answering service.
///
/// `Answer` carries the raw answer text, which may embed a `"See more:"`
/// section; `ServerError` carries the message of a payload that explicitly
/// marks failure. Problems reaching or understanding the service are
/// `ResponderError`s instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderReply {
    Answer(String),
    ServerError(String),
}

/// Failures reaching or understanding the answering service.
#[derive(Debug, Error)]
pub enum ResponderError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("responder returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("responder returned an unrecognized payload")]
    MalformedPayload,
}

/// The answering service as the conversation controller sees it.
#[async_trait]
pub trait Responder {
    async fn ask(&self, user_message: &str)
        -> std::result::Result<ResponderReply, ResponderError>;
}

/// HTTP client for the answering service's `/chat` endpoint.
pub struct ResponderClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl ResponderClient {
    /// Build a client from `RESPONDER_BASE_URL`, or from an explicit
    /// override (the `--endpoint` flag).
    pub fn from_env(endpoint_override: Option<&str>) -> Result<Self> {
        let base = match endpoint_override {
            Some(value) => value.to_string(),
            None => env::var("RESPONDER_BASE_URL")
                .map_err(|_| eyre!("RESPONDER_BASE_URL environment variable not set"))?,
        };
        Self::with_base_url(&base)
    }

    pub fn with_base_url(base: &str) -> Result<Self> {
        let mut endpoint =
            Url::parse(base).map_err(|e| eyre!("invalid responder endpoint {base:?}: {e}"))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| eyre!("invalid responder endpoint {base:?}"))?
            .pop_if_empty()
            .push("chat");

        Ok(Self {
            endpoint,
            client: reqwest::Client::new(),
        })
    }

    fn request_url(&self, user_message: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("user_message", user_message);
        url
    }
}

/// Decide what a 2xx body means.
///
/// The service answers either with a string (plain text or JSON-encoded) or
/// with a JSON object whose `error` field carries a failure message. Bodies
/// that are valid JSON but neither shape are malformed.
fn interpret_payload(body: &str) -> std::result::Result<ResponderReply, ResponderError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::String(answer)) => Ok(ResponderReply::Answer(answer)),
        Ok(Value::Object(fields)) => match fields.get("error") {
            Some(Value::String(message)) => Ok(ResponderReply::ServerError(message.clone())),
            Some(other) => Ok(ResponderReply::ServerError(other.to_string())),
            None => Err(ResponderError::MalformedPayload),
        },
        Ok(_) => Err(ResponderError::MalformedPayload),
        Err(_) => Ok(ResponderReply::Answer(body.to_string())),
    }
}

#[async_trait]
impl Responder for ResponderClient {
    async fn ask(
        &self,
        user_message: &str,
    ) -> std::result::Result<ResponderReply, ResponderError> {
        let url = self.request_url(user_message);
        debug!("Sending chat request to {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Responder request failed with status {}: {}", status, body);
            return Err(ResponderError::Status(status));
        }

        let body = response.text().await?;
        debug!("Received responder payload: {}", body);

        interpret_payload(&body)
    }
}
