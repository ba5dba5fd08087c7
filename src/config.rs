//! Session configuration.
//!
//! [`AgentConfig`] is assembled once at startup from, lowest to highest
//! precedence: built-in defaults, an optional JSON file, `DECKHAND_*`
//! environment variables and command-line overrides. It is then shared
//! read-only with the agent loop, the registry and every tool.

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const PROVIDER_CHAT_API: &str = "chat-api";
pub const PROVIDER_MOCK: &str = "mock";
pub const KNOWN_PROVIDERS: &[&str] = &[PROVIDER_CHAT_API, PROVIDER_MOCK];

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MAX_HISTORY: usize = 50;
/// System prompt, earliest context and at least one recent message.
pub const MIN_MAX_HISTORY: usize = 3;
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 25;

pub const CONFIG_DIR_NAME: &str = "deckhand";
pub const CONFIG_FILE_NAME: &str = "config.json";

const ENV_API_KEY: &str = "DECKHAND_API_KEY";
const ENV_API_KEY_FALLBACK: &str = "OPENAI_API_KEY";
const ENV_MODEL: &str = "DECKHAND_MODEL";
const ENV_BASE_URL: &str = "DECKHAND_BASE_URL";
const ENV_PROVIDER: &str = "DECKHAND_PROVIDER";
const ENV_WORKSPACE: &str = "DECKHAND_WORKSPACE";
const ENV_MAX_HISTORY: &str = "DECKHAND_MAX_HISTORY";
const ENV_AUTO_EXECUTE: &str = "DECKHAND_AUTO_EXECUTE";
const ENV_SAVE_HISTORY: &str = "DECKHAND_SAVE_HISTORY";
const ENV_VERBOSE: &str = "DECKHAND_VERBOSE";
const ENV_SYSTEM_PROMPT: &str = "DECKHAND_SYSTEM_PROMPT";

const REDACTED: &str = "[redacted]";

/// Commands that may run without confirmation when auto-execution is on.
/// Multi-word entries match the leading tokens of the command.
pub const DEFAULT_SAFE_COMMANDS: &[&str] = &[
    "ls",
    "pwd",
    "cat",
    "head",
    "tail",
    "wc",
    "echo",
    "which",
    "tree",
    "find",
    "grep",
    "rg",
    "git status",
    "git diff",
    "git log",
    "git show",
    "git branch",
    "cargo test",
    "cargo check",
    "cargo build",
    "npm test",
    "pytest",
    "rspec",
    "bundle exec rspec",
    "go test",
    "make test",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value '{value}' for {key}: expected {expected}")]
    InvalidEnv {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("workspace {} does not exist", .0.display())]
    WorkspaceMissing(PathBuf),
    #[error("workspace {} is not a directory", .0.display())]
    WorkspaceNotDirectory(PathBuf),
    #[error("max_history must be at least 3, got {0}")]
    HistoryTooSmall(usize),
    #[error("model must not be empty")]
    EmptyModel,
    #[error("search.max_results must be greater than zero")]
    ZeroSearchCap,
    #[error("max_tool_rounds must be greater than zero")]
    ZeroToolRounds,
    #[error("unknown provider '{0}' (expected one of: chat-api, mock)")]
    UnknownProvider(String),
    #[error("provider '{0}' requires an API key (set DECKHAND_API_KEY or OPENAI_API_KEY)")]
    MissingApiKey(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub max_results: usize,
    /// Files with a NUL byte within this prefix are treated as binary.
    pub binary_sniff_bytes: usize,
    pub context_lines: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_results: 100,
            binary_sniff_bytes: 1000,
            context_lines: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShellConfig {
    /// `None` lets commands run to completion.
    pub timeout_secs: Option<u64>,
    pub max_output_bytes: usize,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            max_output_bytes: 100 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReadConfig {
    pub max_bytes: u64,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub request_timeout_secs: Option<u64>,
    pub workspace: PathBuf,
    pub max_history: usize,
    pub auto_execute_safe_commands: bool,
    pub safe_commands: Vec<String>,
    pub save_history: bool,
    pub history_path: Option<PathBuf>,
    pub verbose: bool,
    pub system_prompt: Option<String>,
    pub search: SearchConfig,
    pub shell: ShellConfig,
    pub read: ReadConfig,
    pub max_tool_rounds: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: PROVIDER_CHAT_API.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
            workspace: PathBuf::from("."),
            max_history: DEFAULT_MAX_HISTORY,
            auto_execute_safe_commands: false,
            safe_commands: DEFAULT_SAFE_COMMANDS
                .iter()
                .map(ToString::to_string)
                .collect(),
            save_history: false,
            history_path: None,
            verbose: false,
            system_prompt: None,
            search: SearchConfig::default(),
            shell: ShellConfig::default(),
            read: ReadConfig::default(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

impl fmt::Debug for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentConfig")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("workspace", &self.workspace)
            .field("max_history", &self.max_history)
            .field("auto_execute_safe_commands", &self.auto_execute_safe_commands)
            .field("save_history", &self.save_history)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

/// Command-line layer. `None` leaves the lower layers untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub workspace: Option<PathBuf>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub auto_execute_safe_commands: Option<bool>,
    pub save_history: Option<bool>,
    pub verbose: Option<bool>,
}

impl AgentConfig {
    /// Builds the effective configuration from every layer using the process
    /// environment.
    pub fn load(
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigError> {
        Self::load_with_env(config_path, overrides, |key| env::var(key).ok())
    }

    /// Same as [`AgentConfig::load`] with an injectable environment lookup.
    ///
    /// An explicit `config_path` must exist; the default location is optional.
    pub fn load_with_env(
        config_path: Option<&Path>,
        overrides: &ConfigOverrides,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|path| path.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(lookup)?;
        config.apply_overrides(overrides);
        tracing::debug!(config = ?config, "configuration loaded");
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(key) = read(ENV_API_KEY).or_else(|| read(ENV_API_KEY_FALLBACK)) {
            self.api_key = Some(key);
        }
        if let Some(model) = read(ENV_MODEL) {
            self.model = model;
        }
        if let Some(base_url) = read(ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(provider) = read(ENV_PROVIDER) {
            self.provider = provider;
        }
        if let Some(workspace) = read(ENV_WORKSPACE) {
            self.workspace = PathBuf::from(workspace);
        }
        if let Some(value) = read(ENV_MAX_HISTORY) {
            self.max_history = value.parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_MAX_HISTORY,
                value,
                expected: "a positive integer",
            })?;
        }
        if let Some(value) = read(ENV_AUTO_EXECUTE) {
            self.auto_execute_safe_commands = parse_flag(ENV_AUTO_EXECUTE, value)?;
        }
        if let Some(value) = read(ENV_SAVE_HISTORY) {
            self.save_history = parse_flag(ENV_SAVE_HISTORY, value)?;
        }
        if let Some(value) = read(ENV_VERBOSE) {
            self.verbose = parse_flag(ENV_VERBOSE, value)?;
        }
        if let Some(prompt) = read(ENV_SYSTEM_PROMPT) {
            self.system_prompt = Some(prompt);
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(workspace) = &overrides.workspace {
            self.workspace = workspace.clone();
        }
        if let Some(model) = &overrides.model {
            self.model = model.clone();
        }
        if let Some(provider) = &overrides.provider {
            self.provider = provider.clone();
        }
        if let Some(flag) = overrides.auto_execute_safe_commands {
            self.auto_execute_safe_commands = flag;
        }
        if let Some(flag) = overrides.save_history {
            self.save_history = flag;
        }
        if let Some(flag) = overrides.verbose {
            self.verbose = flag;
        }
    }

    /// Checks the invariants the session relies on. Called once before the
    /// loop starts; a failure here is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.workspace.exists() {
            return Err(ConfigError::WorkspaceMissing(self.workspace.clone()));
        }
        if !self.workspace.is_dir() {
            return Err(ConfigError::WorkspaceNotDirectory(self.workspace.clone()));
        }
        if self.max_history < MIN_MAX_HISTORY {
            return Err(ConfigError::HistoryTooSmall(self.max_history));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::ZeroSearchCap);
        }
        if self.max_tool_rounds == 0 {
            return Err(ConfigError::ZeroToolRounds);
        }
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(ConfigError::UnknownProvider(self.provider.clone()));
        }
        let has_key = self
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if self.provider == PROVIDER_CHAT_API && !has_key {
            return Err(ConfigError::MissingApiKey(self.provider.clone()));
        }
        Ok(())
    }

    /// Snapshot location, defaulting to `<workspace>/.deckhand/history.json`.
    pub fn resolved_history_path(&self) -> PathBuf {
        self.history_path
            .clone()
            .unwrap_or_else(|| session_store::default_history_path(&self.workspace))
    }

    /// Effective configuration as JSON with the API key masked.
    pub fn redacted_json(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Some(object) = value.as_object_mut() {
            if self.api_key.is_some() {
                object.insert("api_key".to_string(), Value::String(REDACTED.to_string()));
            }
            object.insert(
                "history_path".to_string(),
                Value::String(self.resolved_history_path().display().to_string()),
            );
        }
        value
    }
}

/// `$XDG_CONFIG_HOME/deckhand/config.json` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            key,
            value,
            expected: "a boolean (1/0, true/false, yes/no, on/off)",
        }),
    }
}
