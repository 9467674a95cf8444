//! Explicit UI state for the chat client.
//!
//! `ChatState` owns everything the front ends draw: transcript, session pointer, lists,
//! upload/voice status. Every operation that waits on the backend is split into a `begin_*`
//! step that updates the view and returns a ticket, and a `finish_*` step that applies the
//! settled result. Tickets carry the view generation they were issued for; a result whose
//! generation no longer matches (the user switched or deleted the session meanwhile) is
//! dropped instead of written into the wrong transcript.

use crate::api::BackendError;
use crate::config::ChatMode;
use crate::model::{ChatReply, Document, HistoryMessage, Model, ModelList, Role, Session, SessionId};
use crate::transcript::{EntryId, Transcript};
use crate::voice::VoiceError;

pub const CONNECTION_FAILED: &str = "Sorry, the connection failed.";
pub const UPLOAD_FAILED: &str = "Upload failed";
pub const CHAT_CLEARED: &str = "Chat history cleared. How can I help you?";
const SUMMARY_FAILED: &str = "Could not load summary.";

/// Issued when a chat message is sent; hand it back with the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTicket {
    pub placeholder: EntryId,
    pub session_id: Option<SessionId>,
    pub generation: u64,
    pub message: String,
}

/// Issued when a session history fetch starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTicket {
    pub session_id: SessionId,
    pub generation: u64,
}

/// Whether a settled result was applied or dropped as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    Applied,
    Stale,
}

/// What to do after a fresh session list arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPlan {
    /// Current selection is fine.
    Keep,
    /// Nothing selected yet: open this session.
    Switch(SessionId),
    /// No sessions exist: create one.
    Create,
}

/// Work left over once a chat reply has settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFollowUp {
    /// The server stored the exchange; its session list (titles, order) may have changed.
    RefreshSessions,
    SaveSnapshot,
    Nothing,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UploadStatus {
    #[default]
    Idle,
    InProgress(String),
    Succeeded(String),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SummaryState {
    #[default]
    NotLoaded,
    Loading,
    Loaded(String),
    Failed(String),
}

/// A listed document with its lazily loaded summary panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub document: Document,
    pub summary: SummaryState,
    pub summary_visible: bool,
}

impl DocumentEntry {
    fn new(document: Document) -> Self {
        Self {
            document,
            summary: SummaryState::NotLoaded,
            summary_visible: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.document.filename
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceState {
    /// False hides the mic control entirely.
    pub supported: bool,
    pub recording: bool,
    pub error: Option<String>,
}

fn chat_error_text(e: &BackendError) -> String {
    match e.server_message() {
        Some(m) => format!("Sorry, I encountered an error: {}", m),
        None => CONNECTION_FAILED.to_string(),
    }
}

#[derive(Debug)]
pub struct ChatState {
    mode: ChatMode,
    transcript: Transcript,
    sessions: Vec<Session>,
    current_session: Option<SessionId>,
    /// Bumped whenever the transcript is swapped for another view.
    generation: u64,
    documents: Vec<DocumentEntry>,
    models: Vec<Model>,
    active_model: Option<Model>,
    upload: UploadStatus,
    voice: VoiceState,
    /// Last non-chat failure (sessions, documents, models) for a status line.
    notice: Option<String>,
    /// Text in the input box.
    pub input: String,
}

impl ChatState {
    pub fn new(mode: ChatMode, voice_supported: bool) -> Self {
        Self {
            mode,
            transcript: Transcript::new(),
            sessions: Vec::new(),
            current_session: None,
            generation: 0,
            documents: Vec::new(),
            models: Vec::new(),
            active_model: None,
            upload: UploadStatus::Idle,
            voice: VoiceState {
                supported: voice_supported,
                ..VoiceState::default()
            },
            notice: None,
            input: String::new(),
        }
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn current_session(&self) -> Option<&str> {
        self.current_session.as_deref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn documents(&self) -> &[DocumentEntry] {
        &self.documents
    }

    pub fn document(&self, name: &str) -> Option<&DocumentEntry> {
        self.documents.iter().find(|d| d.name() == name)
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    /// Name shown on the active-model badge.
    pub fn active_model(&self) -> Option<&Model> {
        self.active_model.as_ref()
    }

    pub fn upload(&self) -> &UploadStatus {
        &self.upload
    }

    pub fn voice(&self) -> &VoiceState {
        &self.voice
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    /// Swap the transcript for a new view; pending results for the old one become stale.
    fn new_view(&mut self) {
        self.generation += 1;
        self.transcript.clear();
    }

    // ---- chat ----

    /// Start sending `raw`. Empty or whitespace-only input changes nothing and returns None.
    pub fn begin_send(&mut self, raw: &str) -> Option<ChatTicket> {
        let message = raw.trim();
        if message.is_empty() {
            return None;
        }
        self.transcript.push(Role::User, message);
        let placeholder = self.transcript.push_thinking();
        Some(ChatTicket {
            placeholder,
            session_id: self.current_session.clone(),
            generation: self.generation,
            message: message.to_string(),
        })
    }

    /// Send whatever is in the input box, clearing it when a message goes out.
    pub fn submit_input(&mut self) -> Option<ChatTicket> {
        let raw = std::mem::take(&mut self.input);
        let ticket = self.begin_send(&raw);
        if ticket.is_none() {
            self.input = raw;
        }
        ticket
    }

    /// Replace the ticket's placeholder with the reply or an inline error.
    pub fn finish_send(
        &mut self,
        ticket: &ChatTicket,
        result: Result<ChatReply, BackendError>,
    ) -> Settled {
        if ticket.generation != self.generation {
            log::debug!(
                "dropping chat reply for stale view (session {:?})",
                ticket.session_id
            );
            return Settled::Stale;
        }
        match result {
            Ok(reply) => {
                self.transcript
                    .resolve(ticket.placeholder, reply.response, reply.sources);
            }
            Err(e) => {
                log::warn!("chat failed: {}", e);
                self.transcript.fail(ticket.placeholder, chat_error_text(&e));
            }
        }
        Settled::Applied
    }

    /// Follow-up for a settled chat. A stale reply was still recorded by the server, so the
    /// session list is refreshed either way; the local snapshot only changes when applied.
    pub fn after_chat(&self, settled: Settled) -> ChatFollowUp {
        match (self.mode, settled) {
            (ChatMode::Sessions, _) => ChatFollowUp::RefreshSessions,
            (ChatMode::Local, Settled::Applied) => ChatFollowUp::SaveSnapshot,
            (ChatMode::Local, Settled::Stale) => ChatFollowUp::Nothing,
        }
    }

    // ---- sessions ----

    /// Store the session list and decide whether to auto-select or create one.
    pub fn apply_sessions(&mut self, sessions: Vec<Session>) -> SessionPlan {
        self.sessions = sessions;
        if self.mode == ChatMode::Local {
            return SessionPlan::Keep;
        }
        if self.current_session.is_some() {
            return SessionPlan::Keep;
        }
        match self.sessions.first() {
            Some(s) => SessionPlan::Switch(s.id.clone()),
            None => SessionPlan::Create,
        }
    }

    /// Select a session and clear the transcript until its history arrives.
    pub fn begin_switch(&mut self, session_id: impl Into<SessionId>) -> HistoryTicket {
        let session_id = session_id.into();
        self.new_view();
        self.current_session = Some(session_id.clone());
        HistoryTicket {
            session_id,
            generation: self.generation,
        }
    }

    /// Render a fetched history from scratch. An empty history leaves the welcome placeholder.
    pub fn finish_switch(
        &mut self,
        ticket: &HistoryTicket,
        result: Result<Vec<HistoryMessage>, BackendError>,
    ) -> Settled {
        if ticket.generation != self.generation {
            log::debug!("dropping history for stale view (session {})", ticket.session_id);
            return Settled::Stale;
        }
        match result {
            Ok(history) => self.transcript.replace_with_history(&history),
            Err(e) => {
                log::warn!("loading session {} failed: {}", ticket.session_id, e);
                self.transcript.clear();
                self.transcript
                    .push_error(format!("Could not load this conversation: {}", e));
            }
        }
        Settled::Applied
    }

    /// Forget a deleted session. Returns true if it was the active one.
    pub fn session_deleted(&mut self, session_id: &str) -> bool {
        self.sessions.retain(|s| s.id != session_id);
        if self.current_session.as_deref() == Some(session_id) {
            self.current_session = None;
            self.new_view();
            true
        } else {
            false
        }
    }

    /// Local mode reset: drop the transcript and greet again.
    pub fn reset_transcript(&mut self) {
        self.new_view();
        self.transcript.push(Role::Assistant, CHAT_CLEARED);
    }

    /// Restore a locally saved transcript (local mode).
    pub fn restore_transcript(&mut self, transcript: Transcript) {
        self.generation += 1;
        self.transcript = transcript.without_placeholders();
    }

    // ---- uploads ----

    pub fn begin_upload(&mut self, file_name: &str) {
        self.upload = UploadStatus::InProgress(file_name.to_string());
    }

    /// Apply the upload result. Returns true when the document list should be refreshed.
    pub fn finish_upload(&mut self, file_name: &str, result: Result<String, BackendError>) -> bool {
        match result {
            Ok(message) => {
                self.upload = UploadStatus::Succeeded(message);
                self.transcript.push(
                    Role::Assistant,
                    format!("**{}** added to the knowledge base.", file_name),
                );
                true
            }
            Err(e) => {
                log::warn!("upload of {} failed: {}", file_name, e);
                let text = e
                    .server_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| UPLOAD_FAILED.to_string());
                self.upload = UploadStatus::Failed(text);
                false
            }
        }
    }

    /// The file could not be read locally, so nothing was sent.
    pub fn upload_unreadable(&mut self, file_name: &str, error: &std::io::Error) {
        log::warn!("reading {} failed: {}", file_name, error);
        self.upload = UploadStatus::Failed(format!("Could not read {}: {}", file_name, error));
    }

    // ---- documents ----

    /// Replace the document list, keeping loaded summaries for documents still present.
    pub fn apply_documents(&mut self, documents: Vec<Document>) {
        let mut previous = std::mem::take(&mut self.documents);
        self.documents = documents
            .into_iter()
            .map(|d| match previous.iter().position(|p| p.document == d) {
                Some(i) => previous.swap_remove(i),
                None => DocumentEntry::new(d),
            })
            .collect();
    }

    /// Open or close a summary panel. Returns true when the summary must be fetched first.
    pub fn toggle_summary(&mut self, name: &str) -> bool {
        let Some(entry) = self.documents.iter_mut().find(|d| d.name() == name) else {
            return false;
        };
        match entry.summary {
            SummaryState::Loaded(_) => {
                entry.summary_visible = !entry.summary_visible;
                false
            }
            SummaryState::Loading => false,
            SummaryState::NotLoaded | SummaryState::Failed(_) => {
                entry.summary = SummaryState::Loading;
                entry.summary_visible = true;
                true
            }
        }
    }

    pub fn finish_summary(&mut self, name: &str, result: Result<String, BackendError>) {
        let Some(entry) = self.documents.iter_mut().find(|d| d.name() == name) else {
            log::debug!("dropping summary for removed document {}", name);
            return;
        };
        entry.summary = match result {
            Ok(summary) => SummaryState::Loaded(summary),
            Err(e) => {
                log::warn!("summary of {} failed: {}", name, e);
                SummaryState::Failed(
                    e.server_message()
                        .map(str::to_string)
                        .unwrap_or_else(|| SUMMARY_FAILED.to_string()),
                )
            }
        };
    }

    // ---- models ----

    pub fn apply_models(&mut self, list: ModelList) {
        self.models = list.models;
        if let Some(current) = list.current {
            self.active_model = self.models.iter().find(|m| m.id == current).cloned();
        } else if let Some(active) = &self.active_model {
            let still_listed = self.models.iter().any(|m| m.id == active.id);
            if !still_listed {
                self.active_model = None;
            }
        }
    }

    /// Update the badge after a change request. Returns true on success.
    pub fn finish_change_model(&mut self, model_id: &str, result: Result<(), BackendError>) -> bool {
        match result {
            Ok(()) => {
                self.active_model = self
                    .models
                    .iter()
                    .find(|m| m.id == model_id)
                    .cloned()
                    .or_else(|| {
                        Some(Model {
                            id: model_id.to_string(),
                            name: model_id.to_string(),
                        })
                    });
                true
            }
            Err(e) => {
                log::warn!("changing model to {} failed: {}", model_id, e);
                self.notice = Some(format!("Could not change model: {}", e));
                false
            }
        }
    }

    // ---- voice ----

    /// Start recording. Returns false if voice is unsupported or already recording.
    pub fn begin_recording(&mut self) -> bool {
        if !self.voice.supported || self.voice.recording {
            return false;
        }
        self.voice.recording = true;
        self.voice.error = None;
        true
    }

    /// Stop recording; a final transcript replaces the input box.
    pub fn finish_recording(&mut self, result: Result<String, VoiceError>) {
        self.voice.recording = false;
        match result {
            Ok(text) => {
                self.input = text;
            }
            Err(e) => {
                log::warn!("voice input failed: {}", e);
                self.voice.error = Some(e.to_string());
            }
        }
    }
}
