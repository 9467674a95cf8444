use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use vant::api::{Backend, BackendClient};
use vant::config::ChatMode;
use vant::controller::Controller;
use vant::model::{Role, UploadFile};
use vant::render;
use vant::snapshot::SnapshotStore;
use vant::state::{ChatState, SummaryState, UploadStatus};
use vant::transcript::{Entry, WELCOME_TEXT};
use vant::voice::CommandRecognizer;

#[derive(Parser)]
#[command(name = "vant")]
#[command(about = "VANT AI CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config file.
    Init {
        /// Config file path (default: VANT_CONFIG_PATH or ~/.vant/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Chat with your documents (interactive). Type /help for commands.
    Chat {
        /// Config file path (default: VANT_CONFIG_PATH or ~/.vant/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Existing session id to continue.
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },

    /// Upload a document to the knowledge base.
    Upload {
        /// Config file path (default: VANT_CONFIG_PATH or ~/.vant/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// File to upload.
        path: PathBuf,
    },

    /// List documents in the knowledge base.
    Documents {
        /// Config file path (default: VANT_CONFIG_PATH or ~/.vant/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Print a document's summary.
    Summarize {
        /// Config file path (default: VANT_CONFIG_PATH or ~/.vant/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Document name as listed by `vant documents`.
        name: String,
    },

    /// List chat sessions.
    Sessions {
        /// Config file path (default: VANT_CONFIG_PATH or ~/.vant/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// List available models (the active one is marked with *).
    Models {
        /// Config file path (default: VANT_CONFIG_PATH or ~/.vant/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("vant {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, session }) => {
            if let Err(e) = run_chat(config, session).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Upload { config, path }) => {
            if let Err(e) = run_upload(config, &path).await {
                log::error!("upload failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Documents { config }) => {
            if let Err(e) = run_documents(config).await {
                log::error!("documents failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Summarize { config, name }) => {
            if let Err(e) = run_summarize(config, &name).await {
                log::error!("summarize failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Sessions { config }) => {
            if let Err(e) = run_sessions(config).await {
                log::error!("sessions failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Models { config }) => {
            if let Err(e) = run_models(config).await {
                log::error!("models failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(vant::config::default_config_path);
    let dir = vant::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn connect(config_path: Option<PathBuf>) -> anyhow::Result<BackendClient> {
    let (config, _) = vant::config::load_config(config_path)?;
    let client = BackendClient::from_config(&config)?;
    log::info!("using backend {}", client.base_url());
    Ok(client)
}

async fn run_upload(config_path: Option<PathBuf>, path: &Path) -> anyhow::Result<()> {
    let client = connect(config_path)?;
    let file = UploadFile::read(path).await?;
    let name = file.name.clone();
    println!("Processing {}...", name);
    let message = client.process(file).await?;
    println!("{}", message);
    println!("{} added to the knowledge base.", name);
    Ok(())
}

async fn run_documents(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let client = connect(config_path)?;
    let docs = client.list_documents().await?;
    if docs.is_empty() {
        println!("no documents");
    }
    for d in docs {
        println!("{}", d.filename);
    }
    Ok(())
}

async fn run_summarize(config_path: Option<PathBuf>, name: &str) -> anyhow::Result<()> {
    let client = connect(config_path)?;
    let summary = client.summarize(name).await?;
    println!("{}", render::markdown_to_text(&summary));
    Ok(())
}

async fn run_sessions(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let client = connect(config_path)?;
    let sessions = client.list_sessions().await?;
    if sessions.is_empty() {
        println!("no sessions");
    }
    for s in sessions {
        println!("{}  {}", s.id, s.title);
    }
    Ok(())
}

async fn run_models(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let client = connect(config_path)?;
    let list = client.list_models().await?;
    for m in &list.models {
        let marker = if list.current.as_deref() == Some(m.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}  {}", marker, m.id, m.name);
    }
    Ok(())
}

const HELP: &str = "\
/upload <path>    add a document to the knowledge base
/docs             list documents
/delete <name>    delete a document
/summary <name>   show a document's summary
/sessions         list conversations
/switch <id>      open a conversation
/new              start a new conversation
/close <id>       delete a conversation
/models           list models
/model <id>       switch model
/voice            dictate a message
/clear            clear the chat
/exit             quit";

/// Prints transcript entries as they appear, starting over when the view is replaced.
struct Printer {
    generation: Option<u64>,
    printed: usize,
}

impl Printer {
    fn new() -> Self {
        Self {
            generation: None,
            printed: 0,
        }
    }

    /// Print entries not yet shown. `echo_user` is false right after the user typed the message.
    fn flush(&mut self, state: &ChatState, echo_user: bool) {
        let transcript = state.transcript();
        if self.generation != Some(state.generation()) {
            self.generation = Some(state.generation());
            self.printed = 0;
            if transcript.is_empty() {
                println!("< {}", WELCOME_TEXT);
            }
        }
        let entries = transcript.entries();
        // Thinking placeholders are not printed; wait until they settle.
        let end = entries
            .iter()
            .position(|e| e.is_thinking())
            .unwrap_or(entries.len());
        for entry in entries.iter().take(end).skip(self.printed) {
            if entry.role == Role::User && !echo_user {
                continue;
            }
            print_entry(entry);
        }
        self.printed = end;
    }
}

fn print_entry(entry: &Entry) {
    let prefix = match entry.role {
        Role::User => "> ",
        Role::Assistant => "< ",
    };
    let text = render::entry_text(entry);
    let mut lines = text.lines();
    println!("{}{}", prefix, lines.next().unwrap_or(""));
    for line in lines {
        println!("  {}", line);
    }
    if let Some(sources) = render::sources_line(&entry.sources) {
        println!("  {}", sources);
    }
}

/// `y/N` prompt on the terminal.
fn confirm_on_terminal(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn report_status(state: &mut ChatState) {
    if let Some(notice) = state.notice() {
        eprintln!("! {}", notice);
    }
    state.clear_notice();
}

fn print_documents(state: &ChatState) {
    if state.documents().is_empty() {
        println!("no documents");
    }
    for d in state.documents() {
        println!("  {}", d.name());
    }
}

fn print_sessions(state: &ChatState) {
    if state.sessions().is_empty() {
        println!("no sessions");
    }
    for s in state.sessions() {
        let marker = if state.current_session() == Some(s.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {}  {}", marker, s.id, s.title);
    }
}

async fn run_chat(config_path: Option<PathBuf>, session: Option<String>) -> anyhow::Result<()> {
    let (config, path) = vant::config::load_config(config_path)?;
    let client = BackendClient::from_config(&config)?;
    let recognizer = CommandRecognizer::from_config(&config.voice);
    let mode = config.chat.mode;
    log::info!("chatting with {} ({:?} mode)", client.base_url(), mode);

    let mut controller = Controller::new(client, mode, recognizer.is_some());
    if mode == ChatMode::Local {
        let store = SnapshotStore::new(vant::config::resolve_snapshot_path(&config, &path));
        controller = controller.with_snapshot(store);
    }
    if let (Some(id), ChatMode::Sessions) = (session.as_deref(), mode) {
        controller.switch_session(id).await;
    }
    controller.start().await;

    if let Some(model) = controller.state().active_model() {
        println!("model: {}", model.name);
    }
    let mut printer = Printer::new();
    printer.flush(controller.state(), true);
    report_status(controller.state_mut());

    let mut confirm = confirm_on_terminal;
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        let (command, arg) = match input.split_once(char::is_whitespace) {
            Some((c, a)) => (c, a.trim()),
            None => (input, ""),
        };
        let mut echo_user = true;
        match command {
            "/help" => println!("{}", HELP),
            "/upload" if !arg.is_empty() => match UploadFile::read(Path::new(arg)).await {
                Ok(file) => {
                    println!("Processing {}...", file.name);
                    controller.upload(file).await;
                    match controller.state().upload() {
                        UploadStatus::Succeeded(message) => log::info!("upload: {}", message),
                        UploadStatus::Failed(text) => eprintln!("! {}", text),
                        _ => {}
                    }
                }
                Err(e) => {
                    controller.state_mut().upload_unreadable(arg, &e);
                    if let UploadStatus::Failed(text) = controller.state().upload() {
                        eprintln!("! {}", text);
                    }
                }
            },
            "/docs" => {
                controller.refresh_documents().await;
                print_documents(controller.state());
            }
            "/delete" if !arg.is_empty() => {
                if controller.delete_document(arg, &mut confirm).await {
                    println!("deleted {}", arg);
                }
            }
            "/summary" if !arg.is_empty() => {
                if controller.state().document(arg).is_none() {
                    controller.refresh_documents().await;
                }
                let shown = controller
                    .state()
                    .document(arg)
                    .map(|d| d.summary_visible && matches!(d.summary, SummaryState::Loaded(_)))
                    .unwrap_or(false);
                if !shown {
                    controller.toggle_summary(arg).await;
                }
                match controller.state().document(arg).map(|d| &d.summary) {
                    Some(SummaryState::Loaded(summary)) => {
                        println!("{}", render::markdown_to_text(summary))
                    }
                    Some(SummaryState::Failed(e)) => eprintln!("! {}", e),
                    Some(_) => {}
                    None => eprintln!("! no document named {}", arg),
                }
            }
            "/sessions" | "/switch" | "/close" if mode == ChatMode::Local => {
                println!("sessions are not used in local mode");
            }
            "/sessions" => {
                controller.refresh_sessions().await;
                print_sessions(controller.state());
            }
            "/switch" if !arg.is_empty() => controller.switch_session(arg).await,
            "/new" => controller.new_session().await,
            "/close" if !arg.is_empty() => {
                controller.delete_session(arg, &mut confirm).await;
            }
            "/models" => {
                controller.refresh_models().await;
                let state = controller.state();
                for m in state.models() {
                    let marker = if state.active_model().map(|a| a.id.as_str()) == Some(m.id.as_str())
                    {
                        "*"
                    } else {
                        " "
                    };
                    println!("{} {}  {}", marker, m.id, m.name);
                }
            }
            "/model" if !arg.is_empty() => {
                if controller.change_model(arg).await {
                    if let Some(model) = controller.state().active_model() {
                        println!("model: {}", model.name);
                    }
                }
            }
            "/voice" => match &recognizer {
                None => println!("voice input is not configured (set voice.command)"),
                Some(r) => {
                    println!("listening...");
                    controller.record_voice(r).await;
                    if let Some(e) = &controller.state().voice().error {
                        eprintln!("! voice: {}", e);
                    }
                    let text = std::mem::take(&mut controller.state_mut().input);
                    if !text.is_empty() {
                        println!("> {}", text);
                        echo_user = false;
                        controller.send(&text).await;
                    }
                }
            },
            "/clear" => controller.clear_chat(),
            c if c.starts_with('/') => {
                println!("unknown or incomplete command {}; type /help", c);
            }
            _ => {
                echo_user = false;
                controller.send(input).await;
            }
        }
        printer.flush(controller.state(), echo_user);
        report_status(controller.state_mut());
    }

    Ok(())
}
