//! Client for the AI inference endpoint.
//!
//! The endpoint is an opaque remote function (text in, text out) whose response
//! shape has drifted over time, so the reply is taken from the first present
//! field among a small ordered list, with a fixed fallback when none is there.
//! Failures are classified into four user-facing apology messages; the
//! conversation transcript always gets one of them instead of aborting.

use serde::Serialize;

use crate::error::{ChatError, Result};
use uuid::Uuid;

/// Response keys checked in order for the reply text.
const REPLY_FIELDS: &[&str] = &["output", "response", "message", "text"];

/// Used when the endpoint answers 2xx but none of the known fields is present.
pub const FALLBACK_REPLY: &str =
    "I received your message but couldn't put together a proper answer. \
     Could you rephrase the question?";

/// Source of bot replies. The HTTP client is the real implementation; tests
/// substitute their own.
pub trait InferenceProvider: Send + Sync {
    fn reply(
        &self,
        session_id: Uuid,
        text: &str,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

pub struct InferenceClient {
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceRequest<'a> {
    session_id: String,
    message: &'a str,
}

impl InferenceClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeouts(base_url, 60, 5)
    }

    pub fn from_config(api: &crate::config::ApiConfig) -> Result<Self> {
        // Model replies are slow; give them double the store timeout.
        Self::with_timeouts(&api.base_url, api.timeout_secs * 2, api.connect_timeout_secs)
    }

    fn with_timeouts(base_url: &str, timeout_secs: u64, connect_timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .connect_timeout(std::time::Duration::from_secs(connect_timeout_secs))
                .build()?,
        })
    }
}

impl InferenceProvider for InferenceClient {
    async fn reply(&self, session_id: Uuid, text: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let req = InferenceRequest {
            session_id: session_id.to_string(),
            message: text,
        };

        let resp = self
            .http
            .post(&url)
            .json(&req)
            .send()
            .await
            .map_err(|e| ChatError::Inference {
                status: None,
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ChatError::Inference {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let json: serde_json::Value = serde_json::from_str(&body).unwrap_or_default();
        Ok(extract_reply(&json))
    }
}

/// First present string field among the known reply keys, else the fallback.
pub fn extract_reply(json: &serde_json::Value) -> String {
    REPLY_FIELDS
        .iter()
        .find_map(|field| json[field].as_str())
        .unwrap_or(FALLBACK_REPLY)
        .to_string()
}

/// User-facing classification of an inference failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    ServiceUnavailable,
    EndpointMissing,
    NetworkUnreachable,
    Generic,
}

impl FaultKind {
    pub fn classify(err: &ChatError) -> Self {
        match err {
            ChatError::Inference { status: Some(code), .. } => match code {
                404 => FaultKind::EndpointMissing,
                500..=599 => FaultKind::ServiceUnavailable,
                _ => FaultKind::Generic,
            },
            err if err.is_network() => FaultKind::NetworkUnreachable,
            _ => FaultKind::Generic,
        }
    }

    /// The apology appended to the transcript in place of a real reply.
    pub fn user_message(self) -> &'static str {
        match self {
            FaultKind::ServiceUnavailable => {
                "Sorry — the assistant is temporarily unavailable. Please try again in a few minutes."
            }
            FaultKind::EndpointMissing => {
                "Sorry — I can't reach the assistant service right now. The team has been notified."
            }
            FaultKind::NetworkUnreachable => {
                "It looks like the connection dropped. Check your network and try again."
            }
            FaultKind::Generic => "Sorry, something went wrong while answering. Please try again.",
        }
    }
}

/// Shorthand: classify and return the apology text.
pub fn apology_for(err: &ChatError) -> &'static str {
    FaultKind::classify(err).user_message()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_reply_prefers_output() {
        let json = json!({"output": "from output", "response": "from response"});
        assert_eq!(extract_reply(&json), "from output");
    }

    #[test]
    fn test_extract_reply_field_order() {
        assert_eq!(extract_reply(&json!({"response": "r"})), "r");
        assert_eq!(extract_reply(&json!({"message": "m"})), "m");
        assert_eq!(extract_reply(&json!({"text": "t"})), "t");
    }

    #[test]
    fn test_extract_reply_fallback_when_no_known_field() {
        let json = json!({"payload": "unexpected shape"});
        assert_eq!(extract_reply(&json), FALLBACK_REPLY);
    }

    #[test]
    fn test_extract_reply_ignores_non_string_fields() {
        let json = json!({"output": 42, "response": "usable"});
        assert_eq!(extract_reply(&json), "usable");
    }

    #[test]
    fn test_classify_5xx_as_unavailable() {
        let err = ChatError::Inference {
            status: Some(503),
            message: "overloaded".into(),
        };
        assert_eq!(FaultKind::classify(&err), FaultKind::ServiceUnavailable);
    }

    #[test]
    fn test_classify_404_as_missing_endpoint() {
        let err = ChatError::Inference {
            status: Some(404),
            message: "no route".into(),
        };
        assert_eq!(FaultKind::classify(&err), FaultKind::EndpointMissing);
    }

    #[test]
    fn test_classify_transport_error_as_network() {
        let err = ChatError::Inference {
            status: None,
            message: "error sending request: connection refused".into(),
        };
        assert_eq!(FaultKind::classify(&err), FaultKind::NetworkUnreachable);
    }

    #[test]
    fn test_classify_everything_else_as_generic() {
        let err = ChatError::Inference {
            status: Some(400),
            message: "bad request".into(),
        };
        assert_eq!(FaultKind::classify(&err), FaultKind::Generic);

        let err = ChatError::Storage("disk full".into());
        assert_eq!(FaultKind::classify(&err), FaultKind::Generic);
    }

    #[test]
    fn test_each_fault_has_distinct_apology() {
        let kinds = [
            FaultKind::ServiceUnavailable,
            FaultKind::EndpointMissing,
            FaultKind::NetworkUnreachable,
            FaultKind::Generic,
        ];
        let mut messages: Vec<&str> = kinds.iter().map(|k| k.user_message()).collect();
        messages.dedup();
        assert_eq!(messages.len(), kinds.len());
    }
}
