//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.vant/config.json`) and environment.
//! Every section is optional; a missing file means defaults everywhere.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Backend HTTP settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Chat flow settings (sessions vs. local snapshot).
    #[serde(default)]
    pub chat: ChatConfig,

    /// Speech-to-text command for voice input.
    #[serde(default)]
    pub voice: VoiceConfig,
}

/// Where the VANT AI backend lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL (default "http://127.0.0.1:9000"). Overridden by VANT_BACKEND_URL env.
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Optional request timeout in seconds. Unset means requests wait for the backend indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_backend_url() -> String {
    "http://127.0.0.1:9000".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            timeout_secs: None,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

/// Which chat flow the client runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Backend-persisted sessions: list, switch, create, delete.
    #[default]
    Sessions,
    /// Legacy flow for backends without session endpoints: the transcript is kept in a local snapshot.
    Local,
}

/// Chat settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    #[serde(default)]
    pub mode: ChatMode,

    /// Snapshot file used in local mode. Relative paths are resolved against the config file's parent.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

/// Voice input: an external speech-to-text command whose stdout is the transcript.
/// When `command` is unset, voice input is unsupported and hidden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}

/// Resolve the backend URL: env VANT_BACKEND_URL overrides config. Trailing slashes are dropped.
pub fn resolve_backend_url(config: &Config) -> String {
    std::env::var("VANT_BACKEND_URL")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            Some(config.backend.url.trim().to_string()).filter(|s| !s.is_empty())
        })
        .unwrap_or_else(default_backend_url)
        .trim_end_matches('/')
        .to_string()
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("VANT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".vant").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the snapshot file: `chat.snapshotPath` if set (relative to the config file's parent),
/// otherwise `snapshot.json` next to the config file.
pub fn resolve_snapshot_path(config: &Config, config_path: &Path) -> PathBuf {
    let parent = config_parent(config_path);
    match &config.chat.snapshot_path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                parent.join(p)
            }
        }
        _ => parent.join("snapshot.json"),
    }
}

/// Load config from the given path, or the default path (or VANT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_backend() {
        let c = Config::default();
        assert_eq!(c.backend.url, "http://127.0.0.1:9000");
        assert_eq!(c.chat.mode, ChatMode::Sessions);
        assert!(c.voice.command.is_none());
        assert!(c.backend.timeout().is_none());
    }

    #[test]
    fn parses_camel_case_sections() {
        let c: Config = serde_json::from_str(
            r#"{
                "backend": { "url": "http://vant.local:8000/", "timeoutSecs": 30 },
                "chat": { "mode": "local", "snapshotPath": "chat.json" },
                "voice": { "command": "whisper-rec", "args": ["--lang", "en"] }
            }"#,
        )
        .unwrap();
        assert_eq!(c.backend.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(c.chat.mode, ChatMode::Local);
        assert_eq!(c.voice.command.as_deref(), Some("whisper-rec"));
        assert_eq!(c.voice.args, vec!["--lang", "en"]);
    }

    #[test]
    fn empty_object_is_default() {
        let c: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(c.backend.url, default_backend_url());
    }

    #[test]
    fn zero_timeout_means_none() {
        let mut c = Config::default();
        c.backend.timeout_secs = Some(0);
        assert!(c.backend.timeout().is_none());
    }

    #[test]
    fn resolve_snapshot_path_default() {
        let config = Config::default();
        let path = Path::new("/home/user/.vant/config.json");
        assert_eq!(
            resolve_snapshot_path(&config, path),
            PathBuf::from("/home/user/.vant/snapshot.json")
        );
    }

    #[test]
    fn resolve_snapshot_path_override_relative() {
        let mut config = Config::default();
        config.chat.snapshot_path = Some(PathBuf::from("state/chat.json"));
        let path = Path::new("/home/user/.vant/config.json");
        assert_eq!(
            resolve_snapshot_path(&config, path),
            PathBuf::from("/home/user/.vant/state/chat.json")
        );
    }

    #[test]
    fn resolve_snapshot_path_override_absolute() {
        let mut config = Config::default();
        config.chat.snapshot_path = Some(PathBuf::from("/var/lib/vant/chat.json"));
        let path = Path::new("/home/user/.vant/config.json");
        assert_eq!(
            resolve_snapshot_path(&config, path),
            PathBuf::from("/var/lib/vant/chat.json")
        );
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join(format!("vant-missing-{}.json", uuid::Uuid::new_v4()));
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.chat.mode, ChatMode::Sessions);
    }
}
