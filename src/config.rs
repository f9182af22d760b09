//! Layered configuration.
//!
//! Defaults, then the global file (`<config dir>/asset-miner/config.toml`),
//! then an explicit file (`--config` or `ASSET_MINER_CONFIG`), then
//! `ASSET_MINER_*` environment overrides. Each file layer is a sparse patch.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MinerError, Result};
use crate::models::ComplexityTier;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub delays: DelayConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global) = Self::load_global()? {
            config.merge_patch(global);
        }

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("ASSET_MINER_CONFIG").ok().map(PathBuf::from));
        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(MinerError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("asset-miner/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| MinerError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| MinerError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.workspace {
            self.workspace.merge(patch);
        }
        if let Some(patch) = patch.llm {
            self.llm.merge(patch);
        }
        if let Some(patch) = patch.pipeline {
            self.pipeline.merge(patch);
        }
        if let Some(patch) = patch.execution {
            self.execution.merge(patch);
        }
        if let Some(patch) = patch.delays {
            self.delays.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(&|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = env("ASSET_MINER_HOST").or_else(|| env("DATABRICKS_HOST")) {
            self.workspace.host = value;
        }
        if let Some(value) = env("ASSET_MINER_TOKEN_ENV") {
            self.workspace.token_env = value;
        }
        if let Some(value) = env("ASSET_MINER_LLM_ENDPOINT") {
            self.llm.endpoint = value;
        }
        if let Some(value) = env("ASSET_MINER_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = env("ASSET_MINER_THRESHOLD") {
            self.pipeline.threshold = value
                .parse()
                .map_err(|err| MinerError::Config(format!("invalid ASSET_MINER_THRESHOLD: {err}")))?;
        }
        if let Some(value) = env_usize(env, "ASSET_MINER_WORKERS")? {
            self.pipeline.workers = value;
        }
        if let Some(value) = env_u32(env, "ASSET_MINER_MAX_RETRIES")? {
            self.pipeline.max_retries = value;
        }
        if let Some(value) = env_duration(env, "ASSET_MINER_WAIT_TIMEOUT")? {
            self.execution.wait_timeout = value;
        }
        if let Some(value) = env_duration(env, "ASSET_MINER_POLL_INTERVAL")? {
            self.execution.poll_interval = value;
        }
        if let Some(value) = env_u32(env, "ASSET_MINER_MAX_POLLS")? {
            self.execution.max_polls = value;
        }
        if let Some(value) = env_duration(env, "ASSET_MINER_PROPAGATION_DELAY")? {
            self.delays.propagation = value;
        }
        if let Some(value) = env_duration(env, "ASSET_MINER_SETTLE_DELAY")? {
            self.delays.settle = value;
        }
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.workers == 0 {
            return Err(MinerError::Config(
                "pipeline.workers must be greater than 0".to_string(),
            ));
        }
        if self.execution.max_polls == 0 || self.execution.smoke_max_polls == 0 {
            return Err(MinerError::Config(
                "execution poll ceilings must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Chat endpoint, derived from the workspace host when not set.
    #[must_use]
    pub fn llm_endpoint(&self) -> String {
        if !self.llm.endpoint.trim().is_empty() {
            return self.llm.endpoint.clone();
        }
        if self.workspace.host.trim().is_empty() {
            return String::new();
        }
        format!(
            "{}/serving-endpoints/{}/invocations",
            self.workspace.host.trim_end_matches('/'),
            self.llm.model
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub host: String,
    /// Name of the environment variable holding the bearer token.
    #[serde(default)]
    pub token_env: String,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token_env: "DATABRICKS_TOKEN".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl WorkspaceConfig {
    fn merge(&mut self, patch: WorkspacePatch) {
        if let Some(value) = patch.host {
            self.host = value;
        }
        if let Some(value) = patch.token_env {
            self.token_env = value;
        }
        if let Some(value) = patch.request_timeout {
            self.request_timeout = value;
        }
    }

    /// Bearer token read from the configured environment variable.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}

/// Sampling settings for one kind of model call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl SamplingConfig {
    #[must_use]
    pub const fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Full chat endpoint URL; empty means derive from the workspace host.
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Duration,
    pub classification: SamplingConfig,
    pub extraction: SamplingConfig,
    pub usage_guidance: SamplingConfig,
    pub function_description: SamplingConfig,
    pub sql_correction: SamplingConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            model: "databricks-claude-sonnet-4".to_string(),
            request_timeout: Duration::from_secs(120),
            classification: SamplingConfig::new(0.0, 1000),
            extraction: SamplingConfig::new(0.0, 1000),
            usage_guidance: SamplingConfig::new(0.0, 500),
            function_description: SamplingConfig::new(0.3, 150),
            sql_correction: SamplingConfig::new(0.0, 2000),
        }
    }
}

impl LlmConfig {
    fn merge(&mut self, patch: LlmPatch) {
        if let Some(value) = patch.endpoint {
            self.endpoint = value;
        }
        if let Some(value) = patch.model {
            self.model = value;
        }
        if let Some(value) = patch.request_timeout {
            self.request_timeout = value;
        }
        merge_sampling(&mut self.classification, patch.classification);
        merge_sampling(&mut self.extraction, patch.extraction);
        merge_sampling(&mut self.usage_guidance, patch.usage_guidance);
        merge_sampling(&mut self.function_description, patch.function_description);
        merge_sampling(&mut self.sql_correction, patch.sql_correction);
    }
}

fn merge_sampling(target: &mut SamplingConfig, patch: Option<SamplingPatch>) {
    let Some(patch) = patch else {
        return;
    };
    if let Some(value) = patch.temperature {
        target.temperature = value;
    }
    if let Some(value) = patch.max_tokens {
        target.max_tokens = value;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub threshold: ComplexityTier,
    pub workers: usize,
    /// Retries after the first create attempt.
    pub max_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: ComplexityTier::Complex,
            workers: 4,
            max_retries: 2,
        }
    }
}

impl PipelineConfig {
    fn merge(&mut self, patch: PipelinePatch) {
        if let Some(value) = patch.threshold {
            self.threshold = value;
        }
        if let Some(value) = patch.workers {
            self.workers = value;
        }
        if let Some(value) = patch.max_retries {
            self.max_retries = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Server-side wait requested on submit.
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    pub max_polls: u32,
    #[serde(with = "humantime_serde")]
    pub smoke_poll_interval: Duration,
    pub smoke_max_polls: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            max_polls: 30,
            smoke_poll_interval: Duration::from_secs(1),
            smoke_max_polls: 10,
        }
    }
}

impl ExecutionConfig {
    fn merge(&mut self, patch: ExecutionPatch) {
        if let Some(value) = patch.wait_timeout {
            self.wait_timeout = value;
        }
        if let Some(value) = patch.poll_interval {
            self.poll_interval = value;
        }
        if let Some(value) = patch.max_polls {
            self.max_polls = value;
        }
        if let Some(value) = patch.smoke_poll_interval {
            self.smoke_poll_interval = value;
        }
        if let Some(value) = patch.smoke_max_polls {
            self.smoke_max_polls = value;
        }
    }
}

/// Fixed waits for catalog propagation. Heuristics, not guarantees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Wait between creating a function and smoke-testing it.
    #[serde(with = "humantime_serde")]
    pub propagation: Duration,
    /// Wait between function creation and registering the functions.
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            propagation: Duration::from_secs(1),
            settle: Duration::from_secs(3),
        }
    }
}

impl DelayConfig {
    /// No waiting at all; used by tests and dry runs.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            propagation: Duration::ZERO,
            settle: Duration::ZERO,
        }
    }

    fn merge(&mut self, patch: DelayPatch) {
        if let Some(value) = patch.propagation {
            self.propagation = value;
        }
        if let Some(value) = patch.settle {
            self.settle = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub workspace: Option<WorkspacePatch>,
    pub llm: Option<LlmPatch>,
    pub pipeline: Option<PipelinePatch>,
    pub execution: Option<ExecutionPatch>,
    pub delays: Option<DelayPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WorkspacePatch {
    pub host: Option<String>,
    pub token_env: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SamplingPatch {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LlmPatch {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,
    pub classification: Option<SamplingPatch>,
    pub extraction: Option<SamplingPatch>,
    pub usage_guidance: Option<SamplingPatch>,
    pub function_description: Option<SamplingPatch>,
    pub sql_correction: Option<SamplingPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PipelinePatch {
    pub threshold: Option<ComplexityTier>,
    pub workers: Option<usize>,
    pub max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ExecutionPatch {
    #[serde(default, with = "humantime_serde")]
    pub wait_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub poll_interval: Option<Duration>,
    pub max_polls: Option<u32>,
    #[serde(default, with = "humantime_serde")]
    pub smoke_poll_interval: Option<Duration>,
    pub smoke_max_polls: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DelayPatch {
    #[serde(default, with = "humantime_serde")]
    pub propagation: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub settle: Option<Duration>,
}

fn env_u32(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<u32>> {
    match env(key) {
        Some(value) => value.trim().parse::<u32>().map(Some).map_err(|err| {
            MinerError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        None => Ok(None),
    }
}

fn env_usize(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<usize>> {
    match env(key) {
        Some(value) => value.trim().parse::<usize>().map(Some).map_err(|err| {
            MinerError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        None => Ok(None),
    }
}

fn env_duration(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Result<Option<Duration>> {
    match env(key) {
        Some(value) => humantime_serde::re::humantime::parse_duration(value.trim())
            .map(Some)
            .map_err(|err| MinerError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}
