use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChatError, Result};
use crate::model::{ChatSession, Feedback, Message, SessionOrigin};

use super::SessionStore;

/// Remote account store. Talks to the portal backend over JSON/HTTPS.
///
/// Write endpoints answer with a `{success: bool}` envelope; a `false` there is
/// surfaced as a storage error even on HTTP 200. The session list tolerates a
/// missing envelope and reads it as "no sessions".
pub struct RemoteStore {
    base_url: String,
    auth_token: Option<String>,
    http: reqwest::Client,
}

impl RemoteStore {
    pub fn new(base_url: &str, auth_token: Option<&str>) -> Result<Self> {
        Self::with_timeouts(base_url, auth_token, 30, 5)
    }

    pub fn from_config(api: &crate::config::ApiConfig) -> Result<Self> {
        Self::with_timeouts(
            &api.base_url,
            api.auth_token.as_deref(),
            api.timeout_secs,
            api.connect_timeout_secs,
        )
    }

    fn with_timeouts(
        base_url: &str,
        auth_token: Option<&str>,
        timeout_secs: u64,
        connect_timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.map(|t| t.to_string()),
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(timeout_secs))
                .connect_timeout(std::time::Duration::from_secs(connect_timeout_secs))
                .build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<R: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<R> {
        let resp = self.authorize(req).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(ChatError::Storage(format!(
                "session store returned {status}: {body}"
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ChatError::Storage(format!(
                "failed to deserialize session store response: {e}\nBody: {}",
                body_preview(&body)
            ))
        })
    }
}

/// First 300 chars of a response body, cut on a char boundary.
fn body_preview(body: &str) -> String {
    body.chars().take(300).collect()
}

// -- Wire types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveSessionRequest<'a> {
    session_id: String,
    title: &'a str,
    preview: &'a str,
    messages: &'a [Message],
    timestamp: String,
}

#[derive(Serialize)]
struct RenameRequest<'a> {
    title: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FeedbackRequest {
    message_id: i64,
    feedback: Feedback,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    session_id: Uuid,
    #[serde(default)]
    title: String,
    #[serde(default)]
    preview: String,
    #[serde(default)]
    messages: Vec<Message>,
    timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<SessionRecord> for ChatSession {
    fn from(r: SessionRecord) -> Self {
        ChatSession {
            session_id: r.session_id,
            title: r.title,
            preview: r.preview,
            messages: r.messages,
            timestamp: r.timestamp,
            origin: SessionOrigin::Remote,
        }
    }
}

/// A missing `sessions` field means "no sessions", not an error.
#[derive(Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    sessions: Vec<SessionRecord>,
}

#[derive(Deserialize)]
struct SaveEnvelope {
    success: bool,
}

#[derive(Deserialize)]
struct GetEnvelope {
    success: bool,
    session: Option<SessionRecord>,
}

impl SessionStore for RemoteStore {
    async fn list(&self) -> Result<Vec<ChatSession>> {
        let body: serde_json::Value = self
            .send(self.http.get(self.url("api/chat/sessions")))
            .await?;
        let envelope: ListEnvelope =
            serde_json::from_value(body).unwrap_or(ListEnvelope { sessions: Vec::new() });
        Ok(envelope.sessions.into_iter().map(ChatSession::from).collect())
    }

    async fn get(&self, id: Uuid) -> Result<ChatSession> {
        let envelope: GetEnvelope = self
            .send(self.http.get(self.url(&format!("api/chat/sessions/{id}"))))
            .await?;
        match envelope.session {
            Some(record) if envelope.success => Ok(record.into()),
            _ => Err(ChatError::NotFound(format!("remote session {id}"))),
        }
    }

    async fn save(&self, session: &ChatSession) -> Result<()> {
        let req = SaveSessionRequest {
            session_id: session.session_id.to_string(),
            title: &session.title,
            preview: &session.preview,
            messages: &session.messages,
            timestamp: session.timestamp.to_rfc3339(),
        };
        let envelope: SaveEnvelope = self
            .send(self.http.post(self.url("api/chat/sessions")).json(&req))
            .await?;
        if !envelope.success {
            return Err(ChatError::Storage(format!(
                "session store rejected save of {}",
                session.session_id
            )));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let envelope: SaveEnvelope = self
            .send(self.http.delete(self.url(&format!("api/chat/sessions/{id}"))))
            .await?;
        if !envelope.success {
            return Err(ChatError::Storage(format!("session store refused to delete {id}")));
        }
        Ok(())
    }

    async fn rename(&self, id: Uuid, title: &str) -> Result<()> {
        let req = RenameRequest { title };
        let envelope: SaveEnvelope = self
            .send(
                self.http
                    .patch(self.url(&format!("api/chat/sessions/{id}/title")))
                    .json(&req),
            )
            .await?;
        if !envelope.success {
            return Err(ChatError::Storage(format!("session store refused to rename {id}")));
        }
        Ok(())
    }

    async fn set_feedback(&self, session_id: Uuid, message_id: i64, value: Feedback) -> Result<()> {
        let req = FeedbackRequest {
            message_id,
            feedback: value,
        };
        let envelope: SaveEnvelope = self
            .send(
                self.http
                    .post(self.url(&format!("api/chat/sessions/{session_id}/feedback")))
                    .json(&req),
            )
            .await?;
        if !envelope.success {
            return Err(ChatError::Storage(format!(
                "session store refused feedback on message {message_id}"
            )));
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Err(ChatError::Storage(
            "the remote store cannot be cleared wholesale".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_envelope_tolerates_missing_field() {
        let envelope: ListEnvelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.sessions.is_empty());
    }

    #[test]
    fn test_session_record_maps_to_remote_origin() {
        let json = r#"{
            "sessionId": "9b2e65a4-7f70-4a8f-9d6c-0f2b1a3c4d5e",
            "title": "Rent & Payments",
            "preview": "when is rent due",
            "messages": [],
            "timestamp": "2026-03-01T12:00:00Z"
        }"#;
        let record: SessionRecord = serde_json::from_str(json).unwrap();
        let session: ChatSession = record.into();
        assert_eq!(session.origin, SessionOrigin::Remote);
        assert_eq!(session.title, "Rent & Payments");
    }

    #[test]
    fn test_save_request_uses_camel_case() {
        let session = ChatSession::new();
        let req = SaveSessionRequest {
            session_id: session.session_id.to_string(),
            title: &session.title,
            preview: &session.preview,
            messages: &session.messages,
            timestamp: session.timestamp.to_rfc3339(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"sessionId\""));
        assert!(!json.contains("\"session_id\""));
    }

    #[test]
    fn test_url_joins_cleanly() {
        let store = RemoteStore::new("https://portal.example/", None).unwrap();
        assert_eq!(
            store.url("/api/chat/sessions"),
            "https://portal.example/api/chat/sessions"
        );
    }

    #[test]
    fn test_body_preview_cuts_on_char_boundary() {
        // One ASCII char then 3-byte chars, so byte offset 300 is mid-char.
        let body = format!("a{}", "€".repeat(400));
        let preview = body_preview(&body);
        assert_eq!(preview.chars().count(), 300);

        assert_eq!(body_preview("short"), "short");
    }
}
