use std::fs;
use std::path::{Path, PathBuf};

use axiom_types::Actor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Trace configuration. Every key is optional in YAML.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub vault_dir: PathBuf,
    pub file_name: String,
    pub auto_flush: bool,
    pub default_actor: Actor,
    /// Session used by `record`; a fresh UUID when unset.
    pub default_session_id: Option<String>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            vault_dir: PathBuf::from("./axiom_vault"),
            file_name: "frames.jsonl".into(),
            auto_flush: true,
            default_actor: Actor::default(),
            default_session_id: None,
        }
    }
}

impl TraceConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// `AXIOM_CONFIG` (YAML) if set, then per-key env overrides:
    /// `AXIOM_VAULT_DIR`, `AXIOM_AUTO_FLUSH`, `AXIOM_AGENT_ID`, `AXIOM_SESSION_ID`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var("AXIOM_CONFIG") {
            Ok(path) if !path.is_empty() => Self::from_path(path)?,
            _ => Self::default(),
        };
        if let Ok(dir) = std::env::var("AXIOM_VAULT_DIR") {
            cfg.vault_dir = PathBuf::from(dir);
        }
        if let Ok(v) = std::env::var("AXIOM_AUTO_FLUSH") {
            cfg.auto_flush = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(id) = std::env::var("AXIOM_AGENT_ID") {
            if !id.is_empty() {
                cfg.default_actor = Actor::agent(id);
            }
        }
        if let Ok(session) = std::env::var("AXIOM_SESSION_ID") {
            if !session.is_empty() {
                cfg.default_session_id = Some(session);
            }
        }
        Ok(cfg)
    }

    pub fn with_vault_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.vault_dir = dir.into();
        self
    }

    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.default_session_id = Some(session_id.into());
        self
    }

    pub fn frames_path(&self) -> PathBuf {
        self.vault_dir.join(&self.file_name)
    }
}
