//! gosh configuration
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. CLI arguments (-I, -A, -q, ...)
//! 2. Environment variables (GOSH_LOAD_PATH)
//! 3. User-level (~/.config/gosh/config.toml)
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```rust
//! use gosh::util::config::load_user_config;
//!
//! let config = load_user_config().unwrap_or_default();
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable holding extra load path directories
pub const LOAD_PATH_ENV: &str = "GOSH_LOAD_PATH";

/// Name of the init file loaded before the script or session
pub const DEFAULT_INIT_FILE: &str = "gosh-init.scm";

/// User-level configuration for gosh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// REPL settings
    #[serde(default)]
    pub repl: ReplConfig,
    /// Load path settings
    #[serde(default)]
    pub load: LoadConfig,
    /// Init file name, searched on the load path
    #[serde(default = "default_init_file")]
    pub init_file: String,
}

fn default_init_file() -> String {
    DEFAULT_INIT_FILE.to_string()
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            repl: ReplConfig::default(),
            load: LoadConfig::default(),
            init_file: default_init_file(),
        }
    }
}

/// REPL configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplConfig {
    /// Prompt string
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Prompt for continuation lines of an unbalanced form
    #[serde(default = "default_continuation_prompt")]
    pub continuation_prompt: String,
    /// History file path
    #[serde(default)]
    pub history_file: Option<PathBuf>,
    /// History size
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

fn default_prompt() -> String {
    "gosh> ".to_string()
}

fn default_continuation_prompt() -> String {
    "  ... ".to_string()
}

fn default_history_size() -> usize {
    1000
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            continuation_prompt: default_continuation_prompt(),
            history_file: None,
            history_size: default_history_size(),
        }
    }
}

/// Load path configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadConfig {
    /// Directories appended to the load path
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    if let Some(xdg_config) = std::env::var_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("gosh"));
    }

    if let Some(home) = std::env::var_os("HOME") {
        return Some(PathBuf::from(home).join(".config").join("gosh"));
    }

    // On Windows, try %APPDATA%
    if let Some(appdata) = std::env::var_os("APPDATA") {
        return Some(PathBuf::from(appdata).join("gosh"));
    }

    None
}

/// Get the user config file path (~/.config/gosh/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Parse a configuration document
pub fn parse_config(content: &str) -> anyhow::Result<LauncherConfig> {
    toml::from_str(content).context("invalid configuration")
}

/// Load user-level configuration
/// Returns default config if file doesn't exist
pub fn load_user_config() -> anyhow::Result<LauncherConfig> {
    let path = match get_config_path() {
        Some(p) => p,
        None => return Ok(LauncherConfig::default()),
    };

    if !path.exists() {
        return Ok(LauncherConfig::default());
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    parse_config(&content).with_context(|| format!("in {}", path.display()))
}

/// Directories from `GOSH_LOAD_PATH`, in order
pub fn env_load_paths() -> Vec<PathBuf> {
    match std::env::var_os(LOAD_PATH_ENV) {
        Some(value) => split_load_path(&value.to_string_lossy()),
        None => Vec::new(),
    }
}

/// Split a `:`-separated directory list, dropping empty entries
pub fn split_load_path(value: &str) -> Vec<PathBuf> {
    value
        .split(':')
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config, LauncherConfig::default());
        assert_eq!(config.repl.prompt, "gosh> ");
        assert_eq!(config.init_file, "gosh-init.scm");
    }

    #[test]
    fn test_partial_sections() {
        let config = parse_config(
            r#"
            init_file = "my-init.scm"

            [repl]
            prompt = "> "
            history_size = 50

            [load]
            paths = ["/opt/scheme", "lib"]
            "#,
        )
        .unwrap();
        assert_eq!(config.init_file, "my-init.scm");
        assert_eq!(config.repl.prompt, "> ");
        assert_eq!(config.repl.continuation_prompt, "  ... ");
        assert_eq!(config.repl.history_size, 50);
        assert_eq!(config.load.paths, vec![PathBuf::from("/opt/scheme"), PathBuf::from("lib")]);
    }

    #[test]
    fn test_invalid_document_is_error() {
        assert!(parse_config("[repl\nprompt=").is_err());
    }

    #[test]
    fn test_split_load_path() {
        assert_eq!(
            split_load_path("/a::/b:"),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert!(split_load_path("").is_empty());
    }
}
