//! Remote viseme sequencing client.
//!
//! Delegates the alignment-path computation to a backend endpoint
//! (`POST {base_url}/viseme/elevenlabs`). One request per utterance; failures
//! are surfaced to the caller without retry or local fallback.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Viseme;
use super::sequence::VisemeSequence;
use crate::config::RemoteConfig;
use crate::error::{LipSyncError, Result};

/// Path of the sequencing endpoint, relative to the base URL.
pub const VISEME_ENDPOINT_PATH: &str = "/viseme/elevenlabs";

fn default_version() -> u32 {
    1
}

/// Request body of the sequencing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisemeRequest {
    /// The spoken text.
    pub sentence: String,
    /// Per-character start times in seconds.
    pub start_seconds: Vec<f64>,
    /// Per-character end times in seconds.
    #[serde(default)]
    pub end_seconds: Vec<f64>,
    /// Sequencing algorithm revision.
    #[serde(default = "default_version")]
    pub version: u32,
}

/// Response body of the sequencing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisemeResponse {
    #[serde(rename = "visemeList")]
    pub viseme_list: Vec<Viseme>,
}

/// HTTP client for the remote sequencing endpoint.
#[derive(Debug, Clone)]
pub struct RemoteSequencer {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteSequencer {
    /// Create a client for `base_url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Remote`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LipSyncError::Remote(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Create a client from the `[remote]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Remote`] if the HTTP client cannot be built.
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> String {
        format!("{}{VISEME_ENDPOINT_PATH}", self.base_url)
    }

    /// Ask the backend to sequence `text`.
    ///
    /// The returned list is passed through the sequence normaliser, so the
    /// usual ordering, dedup and neutral-tail guarantees hold even if the
    /// backend misbehaves.
    ///
    /// # Errors
    ///
    /// - [`LipSyncError::Timeout`] if the request exceeds the client timeout.
    /// - [`LipSyncError::Remote`] on connection failure, non-2xx status or a
    ///   malformed response body.
    pub async fn sequence_remote(
        &self,
        text: &str,
        start_seconds: &[f64],
        end_seconds: &[f64],
        version: u32,
    ) -> Result<VisemeSequence> {
        let body = VisemeRequest {
            sentence: text.to_owned(),
            start_seconds: start_seconds.to_vec(),
            end_seconds: end_seconds.to_vec(),
            version,
        };
        let url = self.endpoint();
        debug!(%url, version, chars = start_seconds.len(), "requesting remote viseme sequence");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body_text));
        }

        let parsed: VisemeResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LipSyncError::Timeout(format!("remote sequencing response: {e}"))
            } else {
                LipSyncError::Remote(format!("malformed response body: {e}"))
            }
        })?;

        let raw = VisemeSequence::from_raw(parsed.viseme_list);
        if let Err(violation) = raw.check() {
            warn!(%violation, "remote sequence is not well formed; normalizing");
        }
        Ok(VisemeSequence::normalized(raw, None))
    }
}

fn map_transport_error(e: reqwest::Error) -> LipSyncError {
    if e.is_timeout() {
        LipSyncError::Timeout(format!("remote sequencing request: {e}"))
    } else {
        LipSyncError::Remote(format!("request failed: {e}"))
    }
}

/// Map a non-2xx status to an error, preferring the server's own message.
fn map_http_error(status: reqwest::StatusCode, body: &str) -> LipSyncError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string());
    LipSyncError::Remote(format!("HTTP {}: {message}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn request_serializes_snake_case_fields() {
        let req = VisemeRequest {
            sentence: "hi".to_owned(),
            start_seconds: vec![0.0, 0.1],
            end_seconds: vec![0.1, 0.2],
            version: 1,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sentence": "hi",
                "start_seconds": [0.0, 0.1],
                "end_seconds": [0.1, 0.2],
                "version": 1
            })
        );
    }

    #[test]
    fn request_defaults_version_and_end_times() {
        let req: VisemeRequest =
            serde_json::from_str(r#"{"sentence":"a","start_seconds":[0.0]}"#).unwrap();
        assert_eq!(req.version, 1);
        assert!(req.end_seconds.is_empty());
    }

    #[test]
    fn response_uses_viseme_list_key() {
        let resp: VisemeResponse =
            serde_json::from_str(r#"{"visemeList":[{"visemeId":11,"startMs":0}]}"#).unwrap();
        assert_eq!(resp.viseme_list, vec![Viseme::new(11, 0)]);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = RemoteSequencer::new("http://localhost:9/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9/viseme/elevenlabs");
    }

    #[test]
    fn http_error_prefers_json_message() {
        let err = map_http_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"unsupported version 9","type":"invalid_request_error"}}"#,
        );
        assert_eq!(
            err.to_string(),
            "remote sequencing error: HTTP 400: unsupported version 9"
        );
    }

    #[test]
    fn http_error_falls_back_to_body() {
        let err = map_http_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.to_string().contains("HTTP 502: upstream down"));
    }

    #[tokio::test]
    async fn connection_refused_is_remote_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client =
            RemoteSequencer::new(format!("http://127.0.0.1:{port}"), Duration::from_secs(2))
                .unwrap();
        let err = client
            .sequence_remote("hello", &[0.0], &[], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LipSyncError::Remote(_)), "{err}");
    }
}
