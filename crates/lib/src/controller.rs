//! Chat UI controller: runs user actions against a [`Backend`] and folds results into
//! [`ChatState`].
//!
//! One operation runs at a time (the caller awaits each), which suits the terminal client.
//! The desktop client drives `ChatState`'s begin/finish steps itself from worker threads.

use crate::api::Backend;
use crate::config::ChatMode;
use crate::model::UploadFile;
use crate::snapshot::SnapshotStore;
use crate::state::{ChatFollowUp, ChatState, SessionPlan};
use crate::voice::SpeechRecognizer;

/// Asks the user to confirm a destructive action.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Confirmation text for deleting a document.
pub fn delete_document_prompt(name: &str) -> String {
    format!("Delete {} from the knowledge base?", name)
}

/// Confirmation text for deleting a conversation.
pub fn delete_session_prompt(title: &str) -> String {
    format!("Delete the conversation \"{}\"?", title)
}

pub struct Controller<B: Backend> {
    backend: B,
    state: ChatState,
    /// Local mode only.
    snapshot: Option<SnapshotStore>,
}

impl<B: Backend> Controller<B> {
    pub fn new(backend: B, mode: ChatMode, voice_supported: bool) -> Self {
        Self {
            backend,
            state: ChatState::new(mode, voice_supported),
            snapshot: None,
        }
    }

    /// Persist the transcript to `store` and restore whatever it holds now (local mode).
    pub fn with_snapshot(mut self, store: SnapshotStore) -> Self {
        if let Some(t) = store.load_transcript() {
            log::info!("restored {} messages from {}", t.len(), store.path().display());
            self.state.restore_transcript(t);
        }
        self.snapshot = Some(store);
        self
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ChatState {
        &mut self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn save_snapshot(&self) {
        if let Some(store) = &self.snapshot {
            if let Err(e) = store.save_transcript(self.state.transcript()) {
                log::warn!("saving chat snapshot failed: {}", e);
            }
        }
    }

    /// Initial load: documents, models, and (in session mode) sessions.
    pub async fn start(&mut self) {
        self.refresh_documents().await;
        self.refresh_models().await;
        if self.state.mode() == ChatMode::Sessions {
            self.refresh_sessions().await;
        }
    }

    /// Send a chat message. Returns false (and does nothing) for blank input.
    pub async fn send(&mut self, input: &str) -> bool {
        let Some(ticket) = self.state.begin_send(input) else {
            return false;
        };
        let result = self
            .backend
            .chat(&ticket.message, ticket.session_id.as_deref())
            .await;
        let settled = self.state.finish_send(&ticket, result);
        match self.state.after_chat(settled) {
            ChatFollowUp::RefreshSessions => self.refresh_sessions().await,
            ChatFollowUp::SaveSnapshot => self.save_snapshot(),
            ChatFollowUp::Nothing => {}
        }
        true
    }

    /// Upload a file; on success the document list is refreshed.
    pub async fn upload(&mut self, file: UploadFile) {
        let name = file.name.clone();
        self.state.begin_upload(&name);
        let result = self.backend.process(file).await;
        if self.state.finish_upload(&name, result) {
            self.save_snapshot();
            self.refresh_documents().await;
        }
    }

    pub async fn refresh_documents(&mut self) {
        match self.backend.list_documents().await {
            Ok(docs) => self.state.apply_documents(docs),
            Err(e) => {
                log::warn!("listing documents failed: {}", e);
                self.state.set_notice(format!("Could not load documents: {}", e));
            }
        }
    }

    /// Delete a document after confirmation. Returns true if the backend deleted it.
    pub async fn delete_document(&mut self, name: &str, confirm: &mut dyn Confirm) -> bool {
        if !confirm.confirm(&delete_document_prompt(name)) {
            return false;
        }
        let deleted = match self.backend.delete_document(name).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("deleting document {} failed: {}", name, e);
                self.state.set_notice(format!("Could not delete {}: {}", name, e));
                false
            }
        };
        self.refresh_documents().await;
        deleted
    }

    /// Open or close a document's summary, fetching it the first time.
    pub async fn toggle_summary(&mut self, name: &str) {
        if self.state.toggle_summary(name) {
            let result = self.backend.summarize(name).await;
            self.state.finish_summary(name, result);
        }
    }

    /// Fetch the session list and store it; returns the follow-up plan.
    async fn fetch_sessions(&mut self) -> Option<SessionPlan> {
        match self.backend.list_sessions().await {
            Ok(sessions) => Some(self.state.apply_sessions(sessions)),
            Err(e) => {
                log::warn!("listing sessions failed: {}", e);
                self.state.set_notice(format!("Could not load sessions: {}", e));
                None
            }
        }
    }

    /// Refresh the session list, auto-selecting the first session or creating one.
    pub async fn refresh_sessions(&mut self) {
        match self.fetch_sessions().await {
            Some(SessionPlan::Switch(id)) => self.switch_session(&id).await,
            Some(SessionPlan::Create) => self.new_session().await,
            Some(SessionPlan::Keep) | None => {}
        }
    }

    /// Select a session and render its history from scratch.
    pub async fn switch_session(&mut self, session_id: &str) {
        let ticket = self.state.begin_switch(session_id);
        let result = self.backend.session_history(session_id).await;
        self.state.finish_switch(&ticket, result);
    }

    /// Create a session, select it, and reload the list.
    pub async fn new_session(&mut self) {
        if self.state.mode() == ChatMode::Local {
            self.clear_chat();
            return;
        }
        match self.backend.create_session().await {
            Ok(id) => {
                log::info!("created session {}", id);
                self.switch_session(&id).await;
                self.fetch_sessions().await;
            }
            Err(e) => {
                log::warn!("creating session failed: {}", e);
                self.state.set_notice(format!("Could not create a session: {}", e));
            }
        }
    }

    /// Delete a session after confirmation. Returns true if the backend deleted it.
    pub async fn delete_session(&mut self, session_id: &str, confirm: &mut dyn Confirm) -> bool {
        let title = self
            .state
            .sessions()
            .iter()
            .find(|s| s.id == session_id)
            .map(|s| s.title.clone())
            .unwrap_or_else(|| session_id.to_string());
        if !confirm.confirm(&delete_session_prompt(&title)) {
            return false;
        }
        match self.backend.delete_session(session_id).await {
            Ok(()) => {
                self.state.session_deleted(session_id);
                self.refresh_sessions().await;
                true
            }
            Err(e) => {
                log::warn!("deleting session {} failed: {}", session_id, e);
                self.state.set_notice(format!("Could not delete the conversation: {}", e));
                false
            }
        }
    }

    pub async fn refresh_models(&mut self) {
        match self.backend.list_models().await {
            Ok(list) => self.state.apply_models(list),
            Err(e) => {
                log::warn!("listing models failed: {}", e);
                self.state.set_notice(format!("Could not load models: {}", e));
            }
        }
    }

    /// Ask the backend to switch models. Returns true when the badge changed.
    pub async fn change_model(&mut self, model_id: &str) -> bool {
        let result = self.backend.change_model(model_id).await;
        self.state.finish_change_model(model_id, result)
    }

    /// Record one utterance into the input box. No-op when voice is unsupported.
    pub async fn record_voice(&mut self, recognizer: &dyn SpeechRecognizer) {
        if !self.state.begin_recording() {
            return;
        }
        let result = recognizer.listen().await;
        self.state.finish_recording(result);
    }

    /// Clear the transcript (and the local snapshot).
    pub fn clear_chat(&mut self) {
        self.state.reset_transcript();
        if let Some(store) = &self.snapshot {
            if let Err(e) = store.clear_transcript() {
                log::warn!("clearing chat snapshot failed: {}", e);
            }
        }
    }
}
