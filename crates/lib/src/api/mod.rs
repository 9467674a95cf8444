//! Backend abstraction and HTTP client.
//!
//! The [`Backend`] trait is the seam between UI state and transport: the controller drives any
//! implementation, the HTTP client is the production one.

mod client;

pub use client::BackendClient;

use crate::model::{ChatReply, Document, HistoryMessage, ModelList, Session, SessionId, UploadFile};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Application-level failure: the backend answered but did not report success.
    #[error("{0}")]
    Api(String),
    #[error("unexpected backend response: {0}")]
    Decode(String),
    #[error("invalid backend url: {0}")]
    Url(String),
}

impl BackendError {
    /// Server-supplied error text, when the backend itself reported the failure.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            BackendError::Api(m) => Some(m.as_str()),
            _ => None,
        }
    }
}

/// Operations the client needs from the VANT AI backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Upload a file for indexing. Returns the server's confirmation message.
    async fn process(&self, file: UploadFile) -> Result<String, BackendError>;

    /// Send a chat message, optionally within a session.
    async fn chat(&self, message: &str, session_id: Option<&str>)
        -> Result<ChatReply, BackendError>;

    async fn list_documents(&self) -> Result<Vec<Document>, BackendError>;

    async fn delete_document(&self, name: &str) -> Result<(), BackendError>;

    async fn summarize(&self, name: &str) -> Result<String, BackendError>;

    async fn list_sessions(&self) -> Result<Vec<Session>, BackendError>;

    /// Create an empty session and return its id.
    async fn create_session(&self) -> Result<SessionId, BackendError>;

    async fn session_history(&self, id: &str) -> Result<Vec<HistoryMessage>, BackendError>;

    async fn delete_session(&self, id: &str) -> Result<(), BackendError>;

    async fn list_models(&self) -> Result<ModelList, BackendError>;

    async fn change_model(&self, model_id: &str) -> Result<(), BackendError>;
}
