//! VANT AI Desktop: egui app state and UI.

use anyhow::Context;
use eframe::egui;
use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock};
use vant::api::{Backend, BackendClient, BackendError};
use vant::config::{ChatMode, Config};
use vant::controller::{delete_document_prompt, delete_session_prompt};
use vant::model::{ChatReply, Document, HistoryMessage, ModelList, Role, Session, SessionId, UploadFile};
use vant::render;
use vant::snapshot::SnapshotStore;
use vant::state::{
    ChatFollowUp, ChatState, ChatTicket, HistoryTicket, SessionPlan, SummaryState, UploadStatus,
};
use vant::transcript::{Entry, EntryBody, WELCOME_TEXT};
use vant::voice::{CommandRecognizer, SpeechRecognizer, VoiceError};

const CHAT_INPUT_HEIGHT: f32 = 90.0;
const CHAT_MESSAGES_MIN_HEIGHT: f32 = 80.0;
const LOG_BUFFER_MAX_LINES: usize = 2000;

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, _: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let line = format!(
            "{} [{}] {}: {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        );
        push_log_line(line);
    }

    fn flush(&self) {}
}

static LOGGER: DesktopLogger = DesktopLogger;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    Chat,
    Logs,
}

/// Result of a background job, applied on the UI thread.
enum Outcome {
    Chat(ChatTicket, Result<ChatReply, BackendError>),
    History(HistoryTicket, Result<Vec<HistoryMessage>, BackendError>),
    Sessions(Result<Vec<Session>, BackendError>),
    SessionCreated(Result<SessionId, BackendError>),
    SessionDeleted(SessionId, Result<(), BackendError>),
    Documents(Result<Vec<Document>, BackendError>),
    Uploaded(String, Result<String, BackendError>),
    Unreadable(String, std::io::Error),
    DocumentDeleted(String, Result<(), BackendError>),
    Summary(String, Result<String, BackendError>),
    Models(Result<ModelList, BackendError>),
    ModelChanged(String, Result<(), BackendError>),
    Heard(Result<String, VoiceError>),
}

/// A destructive action waiting on the confirm dialog.
enum PendingDelete {
    Document(String),
    Session { id: SessionId, title: String },
}

impl PendingDelete {
    fn prompt(&self) -> String {
        match self {
            PendingDelete::Document(name) => delete_document_prompt(name),
            PendingDelete::Session { title, .. } => delete_session_prompt(title),
        }
    }
}

fn load_backend() -> anyhow::Result<(Config, PathBuf, BackendClient)> {
    let (config, path) = vant::config::load_config(None)?;
    let client = BackendClient::from_config(&config).context("creating backend client")?;
    Ok((config, path, client))
}

pub struct VantApp {
    /// None when the configured backend URL is unusable; the UI is then read-only.
    backend: Option<Arc<BackendClient>>,
    /// Why `backend` is None.
    backend_error: Option<String>,
    recognizer: Option<Arc<CommandRecognizer>>,
    /// Local mode only.
    snapshot: Option<SnapshotStore>,
    state: ChatState,
    outcome_tx: mpsc::Sender<Outcome>,
    outcome_rx: mpsc::Receiver<Outcome>,
    egui_ctx: egui::Context,
    current_screen: Screen,
    pending_delete: Option<PendingDelete>,
    /// Path typed into the upload field.
    upload_path: String,
    /// A create-session request is in flight; further list refreshes must not create another.
    creating_session: bool,
    /// Transcript revision last drawn, to scroll new entries into view.
    last_revision: u64,
}

impl VantApp {
    /// Space between the main screen title (Chat, Logs) and the content below.
    const SCREEN_TITLE_BOTTOM_SPACING: f32 = 18.0;
    /// Space between the bottom of the content and the window edge.
    const SCREEN_FOOTER_SPACING: f32 = 24.0;

    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let _ = LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()));
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Debug);
        log::info!("desktop started");

        let (outcome_tx, outcome_rx) = mpsc::channel();
        let app = match load_backend() {
            Ok((config, path, client)) => {
                log::info!("using backend {} ({:?} mode)", client.base_url(), config.chat.mode);
                let recognizer = CommandRecognizer::from_config(&config.voice).map(Arc::new);
                let mut state = ChatState::new(config.chat.mode, recognizer.is_some());
                let snapshot = (config.chat.mode == ChatMode::Local).then(|| {
                    SnapshotStore::new(vant::config::resolve_snapshot_path(&config, &path))
                });
                if let Some(t) = snapshot.as_ref().and_then(|s| s.load_transcript()) {
                    log::info!("restored {} messages", t.len());
                    state.restore_transcript(t);
                }
                Self {
                    backend: Some(Arc::new(client)),
                    backend_error: None,
                    recognizer,
                    snapshot,
                    state,
                    outcome_tx,
                    outcome_rx,
                    egui_ctx: cc.egui_ctx.clone(),
                    current_screen: Screen::default(),
                    pending_delete: None,
                    upload_path: String::new(),
                    creating_session: false,
                    last_revision: 0,
                }
            }
            Err(e) => {
                log::error!("backend unavailable: {:#}", e);
                Self {
                    backend: None,
                    backend_error: Some(format!("{:#}", e)),
                    recognizer: None,
                    snapshot: None,
                    state: ChatState::new(ChatMode::Sessions, false),
                    outcome_tx,
                    outcome_rx,
                    egui_ctx: cc.egui_ctx.clone(),
                    current_screen: Screen::default(),
                    pending_delete: None,
                    upload_path: String::new(),
                    creating_session: false,
                    last_revision: 0,
                }
            }
        };
        app.refresh_documents();
        app.refresh_models();
        if app.state.mode() == ChatMode::Sessions {
            app.refresh_sessions();
        }
        app
    }

    /// Run `task` on a worker thread with its own runtime; the outcome is picked up by
    /// `poll_outcomes` on a later frame.
    fn run_in_background(&self, task: impl Future<Output = Outcome> + Send + 'static) {
        let tx = self.outcome_tx.clone();
        let ctx = self.egui_ctx.clone();
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("failed to start worker runtime: {}", e);
                    return;
                }
            };
            let outcome = rt.block_on(task);
            if tx.send(outcome).is_ok() {
                ctx.request_repaint();
            }
        });
    }

    fn save_snapshot(&self) {
        if let Some(store) = &self.snapshot {
            if let Err(e) = store.save_transcript(self.state.transcript()) {
                log::warn!("saving chat snapshot failed: {}", e);
            }
        }
    }

    fn report(&mut self, what: &str, e: BackendError) {
        log::warn!("{}: {}", what, e);
        self.state.set_notice(format!("{}: {}", what, e));
    }

    // ---- jobs ----

    fn send_message(&mut self) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        let Some(ticket) = self.state.submit_input() else {
            return;
        };
        self.run_in_background(async move {
            let result = backend
                .chat(&ticket.message, ticket.session_id.as_deref())
                .await;
            Outcome::Chat(ticket, result)
        });
    }

    fn refresh_sessions(&self) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        self.run_in_background(async move { Outcome::Sessions(backend.list_sessions().await) });
    }

    fn switch_session(&mut self, session_id: SessionId) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        let ticket = self.state.begin_switch(session_id);
        self.run_in_background(async move {
            let result = backend.session_history(&ticket.session_id).await;
            Outcome::History(ticket, result)
        });
    }

    fn create_session(&mut self) {
        if self.creating_session {
            return;
        }
        let Some(backend) = self.backend.clone() else {
            return;
        };
        self.creating_session = true;
        self.run_in_background(async move { Outcome::SessionCreated(backend.create_session().await) });
    }

    /// "New chat": a fresh backend session, or a cleared transcript in local mode.
    fn new_chat(&mut self) {
        match self.state.mode() {
            ChatMode::Sessions => self.create_session(),
            ChatMode::Local => {
                self.state.reset_transcript();
                if let Some(store) = &self.snapshot {
                    if let Err(e) = store.clear_transcript() {
                        log::warn!("clearing chat snapshot failed: {}", e);
                    }
                }
            }
        }
    }

    fn delete_session(&self, session_id: SessionId) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        self.run_in_background(async move {
            let result = backend.delete_session(&session_id).await;
            Outcome::SessionDeleted(session_id, result)
        });
    }

    fn refresh_documents(&self) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        self.run_in_background(async move { Outcome::Documents(backend.list_documents().await) });
    }

    fn upload_path(&mut self, path: PathBuf) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.state.begin_upload(&name);
        self.run_in_background(async move {
            match UploadFile::read(&path).await {
                Ok(file) => Outcome::Uploaded(name, backend.process(file).await),
                Err(e) => Outcome::Unreadable(name, e),
            }
        });
    }

    fn upload_bytes(&mut self, file: UploadFile) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        let name = file.name.clone();
        self.state.begin_upload(&name);
        self.run_in_background(async move { Outcome::Uploaded(name, backend.process(file).await) });
    }

    fn delete_document(&self, name: String) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        self.run_in_background(async move {
            let result = backend.delete_document(&name).await;
            Outcome::DocumentDeleted(name, result)
        });
    }

    fn toggle_summary(&mut self, name: String) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        if self.state.toggle_summary(&name) {
            self.run_in_background(async move {
                let result = backend.summarize(&name).await;
                Outcome::Summary(name, result)
            });
        }
    }

    fn refresh_models(&self) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        self.run_in_background(async move { Outcome::Models(backend.list_models().await) });
    }

    fn change_model(&self, model_id: String) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        self.run_in_background(async move {
            let result = backend.change_model(&model_id).await;
            Outcome::ModelChanged(model_id, result)
        });
    }

    fn start_recording(&mut self) {
        let Some(recognizer) = self.recognizer.clone() else {
            return;
        };
        if self.state.begin_recording() {
            self.run_in_background(async move { Outcome::Heard(recognizer.listen().await) });
        }
    }

    // ---- results ----

    /// Apply finished jobs. Call each frame.
    fn poll_outcomes(&mut self) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.apply_outcome(outcome);
        }
    }

    fn apply_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Chat(ticket, result) => {
                let settled = self.state.finish_send(&ticket, result);
                match self.state.after_chat(settled) {
                    ChatFollowUp::RefreshSessions => self.refresh_sessions(),
                    ChatFollowUp::SaveSnapshot => self.save_snapshot(),
                    ChatFollowUp::Nothing => {}
                }
            }
            Outcome::History(ticket, result) => {
                self.state.finish_switch(&ticket, result);
            }
            Outcome::Sessions(Ok(sessions)) => match self.state.apply_sessions(sessions) {
                SessionPlan::Keep => {}
                SessionPlan::Switch(id) => self.switch_session(id),
                SessionPlan::Create => self.create_session(),
            },
            Outcome::Sessions(Err(e)) => self.report("Could not load sessions", e),
            Outcome::SessionCreated(result) => {
                self.creating_session = false;
                match result {
                    Ok(id) => {
                        log::info!("created session {}", id);
                        self.switch_session(id);
                        self.refresh_sessions();
                    }
                    Err(e) => self.report("Could not create a session", e),
                }
            }
            Outcome::SessionDeleted(id, Ok(())) => {
                self.state.session_deleted(&id);
                self.refresh_sessions();
            }
            Outcome::SessionDeleted(_, Err(e)) => {
                self.report("Could not delete the conversation", e)
            }
            Outcome::Documents(Ok(docs)) => self.state.apply_documents(docs),
            Outcome::Documents(Err(e)) => self.report("Could not load documents", e),
            Outcome::Uploaded(name, result) => {
                if self.state.finish_upload(&name, result) {
                    self.save_snapshot();
                    self.refresh_documents();
                }
            }
            Outcome::Unreadable(name, e) => self.state.upload_unreadable(&name, &e),
            Outcome::DocumentDeleted(name, result) => {
                if let Err(e) = result {
                    self.report(&format!("Could not delete {}", name), e);
                }
                self.refresh_documents();
            }
            Outcome::Summary(name, result) => self.state.finish_summary(&name, result),
            Outcome::Models(Ok(list)) => self.state.apply_models(list),
            Outcome::Models(Err(e)) => self.report("Could not load models", e),
            Outcome::ModelChanged(id, result) => {
                self.state.finish_change_model(&id, result);
            }
            Outcome::Heard(result) => self.state.finish_recording(result),
        }
    }

    /// Files dropped anywhere on the window are uploaded.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        for file in dropped {
            if let Some(path) = file.path {
                self.upload_path(path);
            } else if let Some(bytes) = file.bytes {
                self.upload_bytes(UploadFile::new(file.name, bytes.to_vec()));
            }
        }
    }

    // ---- ui ----

    /// One transcript entry: role-based frame, markdown body, source badges.
    fn render_entry(ui: &mut egui::Ui, entry: &Entry) {
        let is_user = entry.role == Role::User;
        let frame = egui::Frame::none()
            .fill(if is_user {
                ui.style().visuals.extreme_bg_color
            } else {
                ui.style().visuals.panel_fill
            })
            .stroke(egui::Stroke::new(
                1.0,
                ui.style()
                    .visuals
                    .widgets
                    .noninteractive
                    .bg_stroke
                    .color,
            ))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(8.0));

        frame.show(ui, |ui| {
            ui.set_width(ui.available_width());
            match &entry.body {
                EntryBody::Thinking => {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(render::THINKING_TEXT);
                    });
                }
                EntryBody::Error(text) => {
                    ui.colored_label(ui.visuals().error_fg_color, text);
                }
                EntryBody::Markdown(_) if is_user => {
                    ui.label(egui::RichText::new(render::entry_text(entry)).strong());
                }
                EntryBody::Markdown(_) => {
                    ui.label(render::entry_text(entry));
                }
            }
            if !entry.sources.is_empty() {
                ui.add_space(6.0);
                ui.horizontal_wrapped(|ui| {
                    ui.label(egui::RichText::new("Sources:").small().weak());
                    for source in &entry.sources {
                        egui::Frame::none()
                            .fill(ui.visuals().faint_bg_color)
                            .rounding(egui::Rounding::same(4.0))
                            .inner_margin(egui::Margin::symmetric(6.0, 2.0))
                            .show(ui, |ui| {
                                ui.label(egui::RichText::new(source).small());
                            });
                    }
                });
            }
            ui.label(
                egui::RichText::new(entry.at.format("%H:%M").to_string())
                    .small()
                    .weak(),
            );
        });
    }

    /// Chat screen: transcript (flexible, stick-to-bottom) above a fixed input row.
    fn ui_chat(&mut self, ui: &mut egui::Ui) {
        let enabled = self.backend.is_some();
        let row_height = ui.spacing().interact_size.y + 8.0;
        let bottom_section_height =
            CHAT_INPUT_HEIGHT + 8.0 + row_height + Self::SCREEN_FOOTER_SPACING;
        let available = ui.available_height();
        let messages_height = (available - bottom_section_height).max(CHAT_MESSAGES_MIN_HEIGHT);

        let revision = self.state.transcript().revision();
        let scroll_to_end = revision != self.last_revision;
        self.last_revision = revision;

        egui::ScrollArea::vertical()
            .max_height(messages_height)
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                let transcript = self.state.transcript();
                if transcript.is_empty() {
                    ui.add_space(24.0);
                    ui.label(egui::RichText::new(WELCOME_TEXT).weak());
                }
                for entry in transcript.entries() {
                    Self::render_entry(ui, entry);
                    ui.add_space(8.0);
                }
                if scroll_to_end {
                    ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                }
            });

        ui.add_space(8.0);
        let response = ui
            .add_enabled_ui(enabled, |ui| {
                ui.add_sized(
                    [ui.available_width(), CHAT_INPUT_HEIGHT],
                    egui::TextEdit::multiline(&mut self.state.input)
                        .hint_text("Ask about your documents (Ctrl+Enter to send)"),
                )
            })
            .inner;
        ui.add_space(8.0);

        let mut send_now = false;
        ui.horizontal(|ui| {
            if ui.add_enabled(enabled, egui::Button::new("Send")).clicked() {
                send_now = true;
            }
            let voice = self.state.voice();
            if voice.supported {
                if voice.recording {
                    ui.add_enabled(false, egui::Button::new("● Recording..."));
                } else if ui
                    .add_enabled(enabled, egui::Button::new("🎤"))
                    .on_hover_text("Dictate a message")
                    .clicked()
                {
                    self.start_recording();
                }
            }
            let new_label = match self.state.mode() {
                ChatMode::Sessions => "New chat",
                ChatMode::Local => "Clear chat",
            };
            if ui.add_enabled(enabled, egui::Button::new(new_label)).clicked() {
                self.new_chat();
            }
        });
        if enabled && response.has_focus() {
            let modifiers = ui.input(|i| i.modifiers);
            if (modifiers.command || modifiers.ctrl) && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                send_now = true;
            }
        }
        if send_now {
            self.send_message();
        }

        if let Some(err) = self.state.voice().error.clone() {
            ui.add_space(8.0);
            ui.colored_label(egui::Color32::RED, format!("Voice input failed: {}", err));
        }
        let mut dismiss = false;
        if let Some(notice) = self.state.notice() {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.colored_label(egui::Color32::RED, notice);
                dismiss = ui.small_button("✕").clicked();
            });
        }
        if dismiss {
            self.state.clear_notice();
        }
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_sessions(&mut self, ui: &mut egui::Ui) {
        ui.heading("Sessions");
        ui.add_space(8.0);
        if ui
            .add_enabled(self.backend.is_some(), egui::Button::new("New chat"))
            .clicked()
        {
            self.new_chat();
        }
        ui.add_space(8.0);

        let mut open = None;
        let mut delete = None;
        for session in self.state.sessions() {
            let selected = self.state.current_session() == Some(session.id.as_str());
            ui.horizontal(|ui| {
                if ui.small_button("✕").on_hover_text("Delete").clicked() {
                    delete = Some(PendingDelete::Session {
                        id: session.id.clone(),
                        title: session.title.clone(),
                    });
                }
                if ui.selectable_label(selected, &session.title).clicked() && !selected {
                    open = Some(session.id.clone());
                }
            });
        }
        if self.state.sessions().is_empty() {
            ui.label("No conversations yet.");
        }
        if let Some(id) = open {
            self.switch_session(id);
        }
        if delete.is_some() {
            self.pending_delete = delete;
        }
    }

    fn ui_upload(&mut self, ui: &mut egui::Ui) {
        let hovering = ui.ctx().input(|i| !i.raw.hovered_files.is_empty());
        let stroke_color = if hovering {
            ui.visuals().selection.stroke.color
        } else {
            ui.visuals().widgets.noninteractive.bg_stroke.color
        };
        egui::Frame::none()
            .stroke(egui::Stroke::new(1.0, stroke_color))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(12.0))
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                match self.state.upload() {
                    UploadStatus::InProgress(name) => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label(format!("Processing {}...", name));
                        });
                    }
                    _ => {
                        ui.label("Drop a file here to upload");
                    }
                }
            });
        ui.add_space(6.0);
        let mut submit = false;
        ui.horizontal(|ui| {
            let field = ui.add(
                egui::TextEdit::singleline(&mut self.upload_path)
                    .hint_text("Path to a file")
                    .desired_width(ui.available_width() - 64.0),
            );
            let pressed_enter = field.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            let clicked = ui
                .add_enabled(self.backend.is_some(), egui::Button::new("Upload"))
                .clicked();
            submit = clicked || pressed_enter;
        });
        if submit && !self.upload_path.trim().is_empty() {
            let path = PathBuf::from(self.upload_path.trim());
            self.upload_path.clear();
            self.upload_path(path);
        }
        match self.state.upload() {
            UploadStatus::Succeeded(message) => {
                ui.label(egui::RichText::new(message.as_str()).small());
            }
            UploadStatus::Failed(text) => {
                ui.colored_label(egui::Color32::RED, text);
            }
            _ => {}
        }
    }

    fn ui_documents(&mut self, ui: &mut egui::Ui) {
        ui.heading("Documents");
        ui.add_space(8.0);
        self.ui_upload(ui);
        ui.add_space(8.0);

        let mut toggle = None;
        let mut delete = None;
        for doc in self.state.documents() {
            ui.horizontal(|ui| {
                ui.label(doc.name());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.small_button("Delete").clicked() {
                        delete = Some(PendingDelete::Document(doc.name().to_string()));
                    }
                    let label = if doc.summary_visible { "Hide" } else { "Summary" };
                    if ui.small_button(label).clicked() {
                        toggle = Some(doc.name().to_string());
                    }
                });
            });
            if doc.summary_visible {
                egui::Frame::none()
                    .fill(ui.visuals().faint_bg_color)
                    .rounding(egui::Rounding::same(4.0))
                    .inner_margin(egui::Margin::same(6.0))
                    .show(ui, |ui| match &doc.summary {
                        SummaryState::Loading | SummaryState::NotLoaded => {
                            ui.spinner();
                        }
                        SummaryState::Loaded(summary) => {
                            ui.label(egui::RichText::new(render::markdown_to_text(summary)).small());
                        }
                        SummaryState::Failed(e) => {
                            ui.colored_label(egui::Color32::RED, e);
                        }
                    });
            }
            ui.add_space(4.0);
        }
        if self.state.documents().is_empty() {
            ui.label("No documents yet.");
        }
        if let Some(name) = toggle {
            self.toggle_summary(name);
        }
        if delete.is_some() {
            self.pending_delete = delete;
        }
    }

    /// Model picker and active-model badge.
    fn ui_model_select(&mut self, ui: &mut egui::Ui) {
        let badge = self
            .state
            .active_model()
            .map(|m| m.name.clone())
            .unwrap_or_else(|| "No model".to_string());
        let mut chosen = None;
        if !self.state.models().is_empty() {
            egui::ComboBox::from_id_source("model_select")
                .selected_text("Change model")
                .show_ui(ui, |ui| {
                    for m in self.state.models() {
                        let selected = self.state.active_model().map(|a| a.id == m.id).unwrap_or(false);
                        if ui.selectable_label(selected, &m.name).clicked() && !selected {
                            chosen = Some(m.id.clone());
                        }
                    }
                });
        }
        egui::Frame::none()
            .fill(ui.visuals().selection.bg_fill)
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::symmetric(8.0, 2.0))
            .show(ui, |ui| {
                ui.label(egui::RichText::new(badge).color(ui.visuals().selection.stroke.color));
            });
        if let Some(id) = chosen {
            self.change_model(id);
        }
    }

    /// Modal confirmation for deletes. Nothing is sent until the user confirms.
    fn ui_confirm_dialog(&mut self, ctx: &egui::Context) {
        let Some(pending) = &self.pending_delete else {
            return;
        };
        let prompt = pending.prompt();
        let mut decision = None;
        egui::Window::new("Confirm")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(prompt);
                ui.add_space(12.0);
                ui.horizontal(|ui| {
                    if ui.button("Delete").clicked() {
                        decision = Some(true);
                    }
                    if ui.button("Cancel").clicked() {
                        decision = Some(false);
                    }
                });
            });
        match decision {
            Some(true) => match self.pending_delete.take() {
                Some(PendingDelete::Document(name)) => self.delete_document(name),
                Some(PendingDelete::Session { id, .. }) => self.delete_session(id),
                None => {}
            },
            Some(false) => self.pending_delete = None,
            None => {}
        }
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        let available = ui.available_height();
        let scroll_height = (available - Self::SCREEN_FOOTER_SPACING).max(0.0);
        egui::ScrollArea::vertical()
            .max_height(scroll_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(
                        egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace),
                    );
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }
}

impl eframe::App for VantApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_outcomes();
        self.handle_dropped_files(ctx);

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    ui.add_space(16.0);
                    ui.horizontal(|ui| {
                        ui.heading("VANT AI");
                        if let Some(err) = &self.backend_error {
                            ui.colored_label(egui::Color32::RED, err);
                        }
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            self.ui_model_select(ui);
                        });
                    });
                    ui.add_space(16.0);
                });
        });

        let current_screen = &mut self.current_screen;
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(140.0)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                    .show(ui, |ui| {
                        ui.add_space(24.0);
                        if ui.selectable_label(*current_screen == Screen::Chat, "Chat").clicked() {
                            *current_screen = Screen::Chat;
                        }
                        ui.add_space(12.0);
                        if ui.selectable_label(*current_screen == Screen::Logs, "Logs").clicked() {
                            *current_screen = Screen::Logs;
                        }
                    });
            });

        // Right sidebar on Chat: conversations (session mode) and the knowledge base.
        if self.current_screen == Screen::Chat {
            egui::SidePanel::right("library_panel")
                .resizable(false)
                .exact_width(280.0)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| {
                        egui::Frame::none()
                            .inner_margin(egui::Margin::symmetric(16.0, 0.0))
                            .show(ui, |ui| {
                                ui.add_space(24.0);
                                if self.state.mode() == ChatMode::Sessions {
                                    self.ui_sessions(ui);
                                    ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
                                    ui.separator();
                                    ui.add_space(8.0);
                                }
                                self.ui_documents(ui);
                                ui.add_space(Self::SCREEN_FOOTER_SPACING);
                            });
                    });
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| match self.current_screen {
                    Screen::Chat => {
                        ui.add_space(24.0);
                        ui.heading("Chat");
                        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
                        self.ui_chat(ui);
                    }
                    Screen::Logs => self.ui_logs_screen(ui),
                });
        });

        self.ui_confirm_dialog(ctx);
    }
}
