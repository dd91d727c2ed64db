//! Configuration management for redraft.
//!
//! Loads configuration from ${REDRAFT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Returns the default config template with comments.
///
/// Embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

/// Default instruction used when none is configured.
fn default_instruction() -> String {
    Config::DEFAULT_INSTRUCTION.to_string()
}

fn default_temperature() -> f32 {
    Config::DEFAULT_TEMPERATURE
}

fn default_n_predict() -> u32 {
    Config::DEFAULT_N_PREDICT
}

fn default_port() -> u16 {
    Config::DEFAULT_PORT
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model to serve, in llama-server `-hf` form (HuggingFace repo id).
    pub model: String,

    /// Default instruction prepended to submitted text.
    #[serde(default = "default_instruction")]
    pub instruction: String,

    /// TCP port for the local llama-server.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Sampling temperature for completions.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate per completion.
    #[serde(default = "default_n_predict")]
    pub n_predict: u32,
}

impl Config {
    const DEFAULT_MODEL: &str = "unsloth/gemma-3-1b-it-GGUF";
    const DEFAULT_INSTRUCTION: &str = "Fix grammar and improve clarity of this text";
    const DEFAULT_PORT: u16 = 8091;
    const DEFAULT_TEMPERATURE: f32 = 0.3;
    const DEFAULT_N_PREDICT: u32 = 512;

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Saves only the model field to the config file.
    ///
    /// Creates the file from the default template if it doesn't exist.
    pub fn save_model(model: &str) -> Result<()> {
        Self::save_model_to(&paths::config_path(), model)
    }

    /// Saves only the model field to a specific config file path.
    ///
    /// Preserves existing fields and comments using toml_edit.
    pub fn save_model_to(path: &Path, model: &str) -> Result<()> {
        use toml_edit::{DocumentMut, value};

        let contents = if path.exists() {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?
        } else {
            default_config_template().to_string()
        };

        let mut doc: DocumentMut = contents
            .parse()
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        doc["model"] = value(model);

        Self::write_config(path, &doc.to_string())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }
        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            instruction: Self::DEFAULT_INSTRUCTION.to_string(),
            port: Self::DEFAULT_PORT,
            temperature: Self::DEFAULT_TEMPERATURE,
            n_predict: Self::DEFAULT_N_PREDICT,
        }
    }
}

pub mod paths {
    //! Path resolution for redraft configuration and log directories.
    //!
    //! REDRAFT_HOME resolution order:
    //! 1. REDRAFT_HOME environment variable (if set)
    //! 2. ~/.config/redraft (default)

    use std::path::PathBuf;

    /// Returns the redraft home directory.
    pub fn redraft_home() -> PathBuf {
        if let Ok(home) = std::env::var("REDRAFT_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("redraft"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        redraft_home().join("config.toml")
    }

    /// Returns the directory used for log files.
    pub fn log_dir() -> PathBuf {
        redraft_home().join("logs")
    }
}
