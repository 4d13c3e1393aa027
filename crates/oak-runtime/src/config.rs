use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Resolve the daemon data directory:
/// 1. Explicit path (with tilde expansion)
/// 2. OAK_PATH environment variable (with tilde expansion)
/// 3. `.oak/` under the project root
pub fn resolve_data_dir(explicit_path: Option<&str>, project_root: &Path) -> PathBuf {
    if let Some(path) = explicit_path {
        return expand_tilde(path);
    }
    if let Ok(env_path) = std::env::var("OAK_PATH") {
        if !env_path.is_empty() {
            return expand_tilde(&env_path);
        }
    }
    project_root.join(".oak")
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(stripped);
    }
    PathBuf::from(path)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Loopback only; anything else is refused at startup
    pub bind: String,
    /// 0 means "derive from the project path"
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dim: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dim: 768,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "qwen2.5-coder:7b".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub tool_output_budget: usize,
    pub tool_input_budget: usize,
    pub flush_threshold: usize,
    pub dedup_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            tool_output_budget: 4096,
            tool_input_budget: 8192,
            flush_threshold: 10,
            dedup_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub confidence_floor: f64,
    pub max_attempts: i64,
    pub workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.7,
            max_attempts: 3,
            workers: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    pub interval_secs: u64,
    pub batch_stale_secs: i64,
    pub session_stale_secs: i64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            batch_stale_secs: 300,
            session_stale_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub max_code_chunks: usize,
    pub max_code_lines: usize,
    pub max_memories: usize,
    pub max_session_summaries: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_code_chunks: 3,
            max_code_lines: 50,
            max_memories: 10,
            max_session_summaries: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Rotated log files kept on disk
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { max_files: 5 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub embedding: EmbeddingConfig,
    pub summarizer: SummarizerConfig,
    pub limits: LimitsConfig,
    pub processing: ProcessingConfig,
    pub recovery: RecoveryConfig,
    pub retrieval: RetrievalConfig,
    pub log: LogConfig,
}

impl DaemonConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let loopback = self.server.bind == "127.0.0.1"
            || self.server.bind == "localhost"
            || self.server.bind == "::1";
        if !loopback {
            return Err(Error::Config(format!(
                "server.bind must be loopback, got '{}'",
                self.server.bind
            )));
        }
        if self.embedding.dim == 0 {
            return Err(Error::Config("embedding.dim must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.processing.confidence_floor) {
            return Err(Error::Config(
                "processing.confidence_floor must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> oak_engine::EngineConfig {
        oak_engine::EngineConfig {
            limits: oak_hooks::HookLimits {
                tool_output_budget: self.limits.tool_output_budget,
                tool_input_budget: self.limits.tool_input_budget,
            },
            flush_threshold: self.limits.flush_threshold,
            dedup_capacity: self.limits.dedup_capacity,
            confidence_floor: self.processing.confidence_floor,
            max_attempts: self.processing.max_attempts,
            max_code_chunks: self.retrieval.max_code_chunks,
            max_code_lines: self.retrieval.max_code_lines,
            max_memories: self.retrieval.max_memories,
            max_session_summaries: self.retrieval.max_session_summaries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        DaemonConfig::default().validate().unwrap();
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = DaemonConfig::load_from(&temp_dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.recovery.interval_secs, 60);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = DaemonConfig::default();
        config.limits.flush_threshold = 25;
        config.recovery.session_stale_secs = 7200;
        config.save_to(&path).unwrap();

        let loaded = DaemonConfig::load_from(&path).unwrap();
        assert_eq!(loaded.limits.flush_threshold, 25);
        assert_eq!(loaded.recovery.session_stale_secs, 7200);
    }

    #[test]
    fn test_non_loopback_bind_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nbind = \"0.0.0.0\"\n").unwrap();

        assert!(DaemonConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[processing]\nworkers = 4\n").unwrap();

        let config = DaemonConfig::load_from(&path).unwrap();
        assert_eq!(config.processing.workers, 4);
        assert_eq!(config.limits.flush_threshold, 10);
    }

    #[test]
    fn test_resolve_data_dir_prefers_explicit() {
        let resolved = resolve_data_dir(Some("/tmp/custom"), Path::new("/repo"));
        assert_eq!(resolved, PathBuf::from("/tmp/custom"));

        let resolved = resolve_data_dir(None, Path::new("/repo"));
        assert_eq!(resolved, PathBuf::from("/repo/.oak"));
    }
}
