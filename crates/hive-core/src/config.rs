//! Configuration management
//!
//! Settings are resolved in this order of precedence:
//! 1. Environment variables (`HIVE_*`)
//! 2. `hive.toml` in the working directory
//! 3. Built-in defaults
//!
//! `${VAR_NAME}` references inside the TOML file are expanded from the
//! environment before parsing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default config file looked up by [`Config::load`]
pub const DEFAULT_CONFIG_FILE: &str = "hive.toml";

/// What a parallel transfer does when one of its targets fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BatchFailurePolicy {
    /// Record the failure for that target and let every other target run
    #[default]
    Isolate,
    /// Stop starting new targets once one has failed; targets already
    /// running finish normally, the rest are recorded as skipped
    Abort,
}

impl FromStr for BatchFailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "isolate" => Ok(Self::Isolate),
            "abort" => Ok(Self::Abort),
            other => Err(Error::Configuration(format!(
                "Unknown batch failure policy '{}' (expected 'isolate' or 'abort')",
                other
            ))),
        }
    }
}

/// Settings of the agent runtime itself
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directory under which every agent gets `<name>-<id>/`
    pub output_root: PathBuf,

    /// Model calls allowed per invocation before the loop gives up
    pub max_steps: usize,

    /// Upper bound on parallel transfer workers, on top of the host's
    /// available parallelism
    pub max_parallelism: Option<usize>,

    pub batch_failure_policy: BatchFailurePolicy,

    /// Append the current work plan and memory to every tool result
    pub attach_interaction_records: bool,

    /// Default `tracing` filter directive
    pub log: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            max_steps: default_max_steps(),
            max_parallelism: None,
            batch_failure_policy: BatchFailurePolicy::Isolate,
            attach_interaction_records: true,
            log: default_log(),
        }
    }
}

fn default_output_root() -> PathBuf {
    PathBuf::from("output")
}

fn default_max_steps() -> usize {
    50
}

fn default_log() -> String {
    "info".to_string()
}

/// Hosted model service, authenticated either by API key or by a cloud
/// project (`vertex = true`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedConfig {
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub vertex: bool,

    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub system_instruction: Option<String>,
}

impl HostedConfig {
    /// Hosted backend authenticated with an API key
    pub fn with_api_key(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: Some(api_key.into()),
            vertex: false,
            project: None,
            location: None,
            system_instruction: None,
        }
    }

    /// Hosted backend authenticated through a cloud project
    pub fn with_project(
        model: impl Into<String>,
        project: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            api_key: None,
            vertex: true,
            project: Some(project.into()),
            location: Some(location.into()),
            system_instruction: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::Configuration("Hosted backend requires a model".to_string()));
        }
        if self.vertex {
            if is_blank(&self.project) || is_blank(&self.location) {
                return Err(Error::Configuration(
                    "project and location must be provided when vertex is enabled".to_string(),
                ));
            }
        } else if is_blank(&self.api_key) {
            return Err(Error::Configuration(
                "api_key must be provided when vertex is disabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locally served model (e.g. a model server on the same host)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    pub model: String,

    /// Server address; the backend's own default when absent
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub system_instruction: Option<String>,
}

impl LocalConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            host: None,
            system_instruction: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(Error::Configuration("Local backend requires a model".to_string()));
        }
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

/// Backend configuration: exactly one of the two shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum BackendConfig {
    Hosted(HostedConfig),
    Local(LocalConfig),
}

impl BackendConfig {
    /// Build from the two optional shapes, rejecting none or both
    pub fn from_parts(hosted: Option<HostedConfig>, local: Option<LocalConfig>) -> Result<Self> {
        let config = Self::select(hosted, local)?;
        config.validate()?;
        Ok(config)
    }

    /// Pick the single configured shape without validating its contents
    fn select(hosted: Option<HostedConfig>, local: Option<LocalConfig>) -> Result<Self> {
        Ok(match (hosted, local) {
            (Some(hosted), None) => Self::Hosted(hosted),
            (None, Some(local)) => Self::Local(local),
            (None, None) => {
                return Err(Error::Configuration(
                    "Either a hosted or a local backend configuration must be provided".to_string(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::Configuration(
                    "Hosted and local backend configurations cannot be provided at the same time"
                        .to_string(),
                ));
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Hosted(hosted) => hosted.validate(),
            Self::Local(local) => local.validate(),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Hosted(hosted) => &hosted.model,
            Self::Local(local) => &local.model,
        }
    }

    pub fn system_instruction(&self) -> Option<&str> {
        match self {
            Self::Hosted(hosted) => hosted.system_instruction.as_deref(),
            Self::Local(local) => local.system_instruction.as_deref(),
        }
    }

    /// Short label of the active shape
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Hosted(_) => "hosted",
            Self::Local(_) => "local",
        }
    }
}

/// Main configuration for hive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,

    pub backend: BackendConfig,
}

impl Config {
    pub fn new(backend: BackendConfig) -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            backend,
        }
    }

    /// Expand `${VAR_NAME}` references from the environment.
    ///
    /// Unset variables expand to the empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_toml_with(&Self::expand_env_vars(&toml_content), |key| std::env::var(key).ok())
    }

    /// Parse TOML text, apply overrides from `lookup`, then validate
    fn from_toml_with(content: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::parse_toml(content)?;
        cfg.apply_overrides(lookup)?;
        Ok(cfg)
    }

    /// Load from `hive.toml` when present, otherwise from the environment.
    ///
    /// A `.env` file in the working directory is loaded first.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let model = get("HIVE_MODEL")
            .ok_or_else(|| Error::Configuration("HIVE_MODEL not set".to_string()))?;

        let hosted_requested = get("HIVE_API_KEY").is_some() || get("HIVE_VERTEX").is_some();
        let local_requested = get("HIVE_LOCAL_HOST").is_some();

        let (want_hosted, want_local) = match get("HIVE_BACKEND").as_deref() {
            Some("hosted") => (true, false),
            Some("local") => (false, true),
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "Unknown HIVE_BACKEND '{}' (expected 'hosted' or 'local')",
                    other
                )));
            }
            None => (hosted_requested, local_requested),
        };

        let hosted = want_hosted.then(|| HostedConfig {
            model: model.clone(),
            api_key: get("HIVE_API_KEY"),
            vertex: get("HIVE_VERTEX").is_some_and(|v| parse_flag(&v)),
            project: get("HIVE_VERTEX_PROJECT"),
            location: get("HIVE_VERTEX_LOCATION"),
            system_instruction: None,
        });
        let local = want_local.then(|| LocalConfig {
            model: model.clone(),
            host: get("HIVE_LOCAL_HOST"),
            system_instruction: None,
        });

        let mut cfg = Self::new(BackendConfig::from_parts(hosted, local)?);
        cfg.apply_runtime_overrides(&get)?;
        Ok(cfg)
    }

    /// Parse TOML text (already env-expanded)
    ///
    /// Only the backend shape is checked here; its contents are validated
    /// once environment overrides have been applied.
    fn parse_toml(content: &str) -> Result<Self> {
        let toml: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Configuration(format!("Failed to parse TOML: {}", e)))?;

        let backend = toml.backend.unwrap_or_default();

        Ok(Self {
            runtime: toml.runtime.unwrap_or_default(),
            backend: BackendConfig::select(backend.hosted, backend.local)?,
        })
    }

    /// Override settings from `HIVE_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        match get("HIVE_BACKEND").as_deref() {
            None => {}
            Some("hosted") => {
                if let BackendConfig::Local(local) = &self.backend {
                    self.backend = BackendConfig::Hosted(HostedConfig {
                        model: local.model.clone(),
                        api_key: None,
                        vertex: false,
                        project: None,
                        location: None,
                        system_instruction: local.system_instruction.clone(),
                    });
                }
            }
            Some("local") => {
                if let BackendConfig::Hosted(hosted) = &self.backend {
                    self.backend = BackendConfig::Local(LocalConfig {
                        model: hosted.model.clone(),
                        host: None,
                        system_instruction: hosted.system_instruction.clone(),
                    });
                }
            }
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "Unknown HIVE_BACKEND '{}' (expected 'hosted' or 'local')",
                    other
                )));
            }
        }

        match &mut self.backend {
            BackendConfig::Hosted(hosted) => {
                if let Some(model) = get("HIVE_MODEL") {
                    hosted.model = model;
                }
                if let Some(key) = get("HIVE_API_KEY") {
                    hosted.api_key = Some(key);
                }
                if let Some(vertex) = get("HIVE_VERTEX") {
                    hosted.vertex = parse_flag(&vertex);
                }
                if let Some(project) = get("HIVE_VERTEX_PROJECT") {
                    hosted.project = Some(project);
                }
                if let Some(location) = get("HIVE_VERTEX_LOCATION") {
                    hosted.location = Some(location);
                }
            }
            BackendConfig::Local(local) => {
                if let Some(model) = get("HIVE_MODEL") {
                    local.model = model;
                }
                if let Some(host) = get("HIVE_LOCAL_HOST") {
                    local.host = Some(host);
                }
            }
        }
        self.backend.validate()?;

        self.apply_runtime_overrides(&get)
    }

    fn apply_runtime_overrides(&mut self, get: &impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(root) = get("HIVE_OUTPUT_ROOT") {
            self.runtime.output_root = PathBuf::from(root);
        }
        if let Some(steps) = get("HIVE_MAX_STEPS") {
            self.runtime.max_steps = steps.trim().parse().map_err(|_| {
                Error::Configuration(format!("HIVE_MAX_STEPS must be a positive integer, got '{}'", steps))
            })?;
        }
        if let Some(parallelism) = get("HIVE_MAX_PARALLELISM") {
            let value: usize = parallelism.trim().parse().map_err(|_| {
                Error::Configuration(format!(
                    "HIVE_MAX_PARALLELISM must be a positive integer, got '{}'",
                    parallelism
                ))
            })?;
            self.runtime.max_parallelism = Some(value);
        }
        if let Some(policy) = get("HIVE_BATCH_FAILURE_POLICY") {
            self.runtime.batch_failure_policy = policy.parse()?;
        }
        if let Some(log) = get("HIVE_LOG") {
            self.runtime.log = log;
        }
        self.runtime.validate()
    }
}

impl RuntimeConfig {
    /// Reject settings the runtime cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.output_root.as_os_str().is_empty() {
            return Err(Error::Configuration("output_root must not be empty".to_string()));
        }
        if self.max_steps == 0 {
            return Err(Error::Configuration("max_steps must be at least 1".to_string()));
        }
        if self.max_parallelism == Some(0) {
            return Err(Error::Configuration("max_parallelism must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

// ============================================================================
// TOML file layout
// ============================================================================

#[derive(Debug, Deserialize)]
struct TomlConfig {
    runtime: Option<RuntimeConfig>,
    backend: Option<TomlBackendConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlBackendConfig {
    hosted: Option<HostedConfig>,
    local: Option<LocalConfig>,
}
