//! HTTP client for the VANT AI backend (http://127.0.0.1:9000 by default).
//!
//! Every endpoint answers with JSON. The body's `status` field decides success; the HTTP
//! status only matters when the body is not JSON.

use crate::api::{Backend, BackendError};
use crate::config::{self, Config};
use crate::model::{
    ChatReply, Document, HistoryMessage, Model, ModelList, Session, SessionId, UploadFile,
};
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const STATUS_SUCCESS: &str = "success";

/// Client for the backend HTTP API.
#[derive(Clone)]
pub struct BackendClient {
    base_url: Url,
    client: reqwest::Client,
}

impl BackendClient {
    /// Build a client for `base_url`. `timeout` bounds every request when set.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| BackendError::Url(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Url(base_url.to_string()));
        }
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            base_url,
            client: builder.build()?,
        })
    }

    /// Client for the backend named by config (VANT_BACKEND_URL wins over `backend.url`).
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        Self::new(&config::resolve_backend_url(config), config.backend.timeout())
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Base URL joined with percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Read the body as JSON. Any failed HTTP status is an API error carrying the body's
/// `message` (or FastAPI's `detail`) when there is one, else `"<status> <body>"`.
async fn read_json<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, BackendError> {
    let status = res.status();
    let body = res.text().await?;
    if !status.is_success() {
        return Err(BackendError::Api(failure_text(status, &body)));
    }
    serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

fn failure_text(status: reqwest::StatusCode, body: &str) -> String {
    let from_body = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "detail"].iter().find_map(|key| match v.get(*key)? {
                serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                serde_json::Value::String(_) | serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
        });
    from_body.unwrap_or_else(|| format!("{} {}", status, body.trim()))
}

/// List endpoints only send `status` on failure; absent means the payload stands.
fn ensure_listed(status: Option<String>, message: Option<String>) -> Result<(), BackendError> {
    match status {
        Some(s) => ensure_success(&s, message),
        None => Ok(()),
    }
}

fn ensure_success(status: &str, message: Option<String>) -> Result<(), BackendError> {
    if status == STATUS_SUCCESS {
        Ok(())
    } else {
        Err(BackendError::Api(
            message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "unknown error".to_string()),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentsResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    documents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SessionsResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    sessions: Vec<Session>,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "id")]
    session_id: Option<SessionId>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    models: Vec<Model>,
    #[serde(default)]
    current: Option<String>,
}

#[async_trait]
impl Backend for BackendClient {
    /// POST /process: multipart upload, returns the server's confirmation message.
    async fn process(&self, file: UploadFile) -> Result<String, BackendError> {
        let url = self.endpoint(&["process"])?;
        log::debug!("POST {} ({}, {} bytes)", url, file.name, file.bytes.len());
        let part = reqwest::multipart::Part::bytes(file.bytes).file_name(file.name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);
        let res = self.client.post(url).multipart(form).send().await?;
        let data: StatusResponse = read_json(res).await?;
        let message = data.message.clone();
        ensure_success(&data.status, data.message)?;
        Ok(message.unwrap_or_else(|| format!("{} processed.", file.name)))
    }

    /// POST /chat: form fields `message` and, when given, `session_id`.
    async fn chat(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, BackendError> {
        let url = self.endpoint(&["chat"])?;
        log::debug!("POST {} (session {:?})", url, session_id);
        let mut form: Vec<(&str, &str)> = vec![("message", message)];
        if let Some(id) = session_id {
            form.push(("session_id", id));
        }
        let res = self.client.post(url).form(&form).send().await?;
        let data: ChatResponse = read_json(res).await?;
        ensure_success(&data.status, data.message)?;
        Ok(ChatReply {
            response: data.response.unwrap_or_default(),
            sources: data.sources,
        })
    }

    /// GET /documents
    async fn list_documents(&self) -> Result<Vec<Document>, BackendError> {
        let url = self.endpoint(&["documents"])?;
        log::debug!("GET {}", url);
        let res = self.client.get(url).send().await?;
        let data: DocumentsResponse = read_json(res).await?;
        ensure_listed(data.status, data.message)?;
        Ok(data.documents.into_iter().map(Document::new).collect())
    }

    /// DELETE /documents/{name}
    async fn delete_document(&self, name: &str) -> Result<(), BackendError> {
        let url = self.endpoint(&["documents", name])?;
        log::debug!("DELETE {}", url);
        let res = self.client.delete(url).send().await?;
        let data: StatusResponse = read_json(res).await?;
        ensure_success(&data.status, data.message)
    }

    /// GET /summarize/{name}
    async fn summarize(&self, name: &str) -> Result<String, BackendError> {
        let url = self.endpoint(&["summarize", name])?;
        log::debug!("GET {}", url);
        let res = self.client.get(url).send().await?;
        let data: SummaryResponse = read_json(res).await?;
        ensure_success(&data.status, data.message)?;
        Ok(data.summary.unwrap_or_default())
    }

    /// GET /sessions
    async fn list_sessions(&self) -> Result<Vec<Session>, BackendError> {
        let url = self.endpoint(&["sessions"])?;
        log::debug!("GET {}", url);
        let res = self.client.get(url).send().await?;
        let data: SessionsResponse = read_json(res).await?;
        ensure_listed(data.status, data.message)?;
        Ok(data.sessions)
    }

    /// POST /sessions returns the new session id.
    async fn create_session(&self) -> Result<SessionId, BackendError> {
        let url = self.endpoint(&["sessions"])?;
        log::debug!("POST {}", url);
        let res = self.client.post(url).send().await?;
        let data: CreateSessionResponse = read_json(res).await?;
        ensure_listed(data.status, data.message)?;
        data.session_id
            .ok_or_else(|| BackendError::Decode("missing session_id".to_string()))
    }

    /// GET /sessions/{id}/history
    async fn session_history(&self, id: &str) -> Result<Vec<HistoryMessage>, BackendError> {
        let url = self.endpoint(&["sessions", id, "history"])?;
        log::debug!("GET {}", url);
        let res = self.client.get(url).send().await?;
        let data: HistoryResponse = read_json(res).await?;
        ensure_listed(data.status, data.message)?;
        Ok(data.messages)
    }

    /// DELETE /sessions/{id}
    async fn delete_session(&self, id: &str) -> Result<(), BackendError> {
        let url = self.endpoint(&["sessions", id])?;
        log::debug!("DELETE {}", url);
        let res = self.client.delete(url).send().await?;
        let data: StatusResponse = read_json(res).await?;
        ensure_success(&data.status, data.message)
    }

    /// GET /models
    async fn list_models(&self) -> Result<ModelList, BackendError> {
        let url = self.endpoint(&["models"])?;
        log::debug!("GET {}", url);
        let res = self.client.get(url).send().await?;
        let data: ModelsResponse = read_json(res).await?;
        ensure_listed(data.status, data.message)?;
        Ok(ModelList {
            models: data.models,
            current: data.current,
        })
    }

    /// POST /models/change: form field `model_id`.
    async fn change_model(&self, model_id: &str) -> Result<(), BackendError> {
        let url = self.endpoint(&["models", "change"])?;
        log::debug!("POST {} ({})", url, model_id);
        let res = self
            .client
            .post(url)
            .form(&[("model_id", model_id)])
            .send()
            .await?;
        let data: StatusResponse = read_json(res).await?;
        ensure_success(&data.status, data.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_encodes_segments() {
        let c = BackendClient::new("http://127.0.0.1:9000/", None).unwrap();
        let url = c.endpoint(&["documents", "Q3 report#1.pdf"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/documents/Q3%20report%231.pdf");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let c = BackendClient::new("http://host/vant/api", None).unwrap();
        let url = c.endpoint(&["sessions", "s-1", "history"]).unwrap();
        assert_eq!(url.as_str(), "http://host/vant/api/sessions/s-1/history");
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(matches!(
            BackendClient::new("mailto:vant@example.com", None),
            Err(BackendError::Url(_))
        ));
        assert!(matches!(BackendClient::new("not a url", None), Err(BackendError::Url(_))));
    }

    #[test]
    fn ensure_success_uses_server_message() {
        assert!(ensure_success("success", None).is_ok());
        match ensure_success("error", Some("file too large".into())) {
            Err(BackendError::Api(m)) => assert_eq!(m, "file too large"),
            other => panic!("unexpected {:?}", other),
        }
        match ensure_success("error", Some("  ".into())) {
            Err(BackendError::Api(m)) => assert_eq!(m, "unknown error"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn failed_status_prefers_body_message_or_detail() {
        let code = reqwest::StatusCode::INTERNAL_SERVER_ERROR;
        assert_eq!(
            failure_text(code, r#"{"status":"error","message":"database is locked"}"#),
            "database is locked"
        );
        assert_eq!(
            failure_text(reqwest::StatusCode::NOT_FOUND, r#"{"detail":"Session not found"}"#),
            "Session not found"
        );
        assert_eq!(
            failure_text(reqwest::StatusCode::UNPROCESSABLE_ENTITY, r#"{"detail":[{"loc":["body"]}]}"#),
            r#"[{"loc":["body"]}]"#
        );
        assert_eq!(failure_text(code, "  upstream down "), "500 Internal Server Error upstream down");
    }

    #[test]
    fn list_status_is_checked_only_when_present() {
        assert!(ensure_listed(None, None).is_ok());
        assert!(ensure_listed(Some("success".into()), None).is_ok());
        match ensure_listed(Some("error".into()), Some("index offline".into())) {
            Err(BackendError::Api(m)) => assert_eq!(m, "index offline"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
