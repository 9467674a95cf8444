//! Voice input through an external speech-to-text command.
//!
//! The command records, recognizes, and prints the final transcript on stdout. No shell is
//! used; arguments are passed as a list. Without a configured command voice input is
//! unsupported and front ends hide it.

use crate::config::VoiceConfig;
use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error("speech recognizer failed to start: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("speech recognizer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("no speech recognized")]
    Empty,
}

/// Produces one final transcript per call.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn listen(&self) -> Result<String, VoiceError>;
}

/// Runs `command args...` and takes its trimmed stdout as the transcript.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    command: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// None when no command is configured (voice unsupported).
    pub fn from_config(config: &VoiceConfig) -> Option<Self> {
        let command = config.command.as_deref()?.trim();
        if command.is_empty() {
            return None;
        }
        Some(Self::new(command, config.args.clone()))
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    async fn listen(&self) -> Result<String, VoiceError> {
        log::debug!("voice: running {} {:?}", self.command, self.args);
        let output = Command::new(&self.command)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(VoiceError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(VoiceError::Empty);
        }
        Ok(text)
    }
}
