//! Engine configuration
//!
//! Loaded from environment variables (after `.env`), optionally layered over
//! a YAML file:
//!   PIPE_CONFIG             - path to a YAML file with the same fields
//!   PIPE_LOOKUP_TIMEOUT_MS  - deadline for one run's cluster lookups (default: none)
//!   PIPE_NAMESPACE_LABEL    - label namespaces for sink binding (default: true)
//!   PIPE_DEFAULT_PROFILE    - profile when nothing else decides (default: kubernetes)
//!   PIPE_LOG_FILTER         - tracing filter when RUST_LOG is unset

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::cluster::RunContext;
use crate::model::Profile;

const DEFAULT_LOG_FILTER: &str = "info,pipe_integration=debug";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub lookup_timeout_ms: Option<u64>,
    pub namespace_label: bool,
    pub default_profile: Profile,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: None,
            namespace_label: true,
            default_profile: Profile::Kubernetes,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match get("PIPE_CONFIG") {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(raw) = get("PIPE_LOOKUP_TIMEOUT_MS") {
            let ms = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("PIPE_LOOKUP_TIMEOUT_MS is not a number: {raw}"))?;
            config.lookup_timeout_ms = Some(ms);
        }
        if let Some(raw) = get("PIPE_NAMESPACE_LABEL") {
            config.namespace_label = parse_bool(&raw)
                .ok_or_else(|| anyhow!("PIPE_NAMESPACE_LABEL must be true or false, got {raw}"))?;
        }
        if let Some(raw) = get("PIPE_DEFAULT_PROFILE") {
            config.default_profile = Profile::parse(&raw)
                .ok_or_else(|| anyhow!("PIPE_DEFAULT_PROFILE is not a known profile: {raw}"))?;
        }
        if let Some(raw) = get("PIPE_LOG_FILTER") {
            config.log_filter = raw;
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn lookup_timeout(&self) -> Option<Duration> {
        self.lookup_timeout_ms.map(Duration::from_millis)
    }

    /// Fresh run context honouring the configured lookup deadline.
    pub fn run_context(&self) -> RunContext {
        match self.lookup_timeout() {
            Some(timeout) => RunContext::new().with_timeout(timeout),
            None => RunContext::new(),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
