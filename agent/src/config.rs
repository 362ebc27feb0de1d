//! Agent configuration: a TOML file, then environment overrides

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use pokellm_client::{
    ClientConfig, Credentials, DEFAULT_LOGIN_URL, DEFAULT_SERVER_URL, ReconnectPolicy,
};
use serde::Deserialize;

use crate::battle_task::BattleConfig;
use crate::engine::EngineConfig;
use crate::ollama::OllamaConfig;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub showdown: ShowdownConfig,
    pub inference: InferenceConfig,
    pub decision: DecisionConfig,
    pub tracker: TrackerConfig,
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShowdownConfig {
    pub server_url: String,
    pub login_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub format: String,
    /// Ladder battles to play before exiting
    pub battles: u32,
    /// Accept challenges from this user instead of searching the ladder
    pub accept_from: Option<String>,
}

impl Default for ShowdownConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            username: None,
            password: None,
            format: "gen9randombattle".to_string(),
            battles: 1,
            accept_from: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Ollama generate endpoint
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_concurrent: usize,
    pub request_timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434/api/generate".to_string(),
            model: "llama3.1:8b".to_string(),
            temperature: 0.2,
            max_concurrent: 2,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub max_attempts: u32,
    pub turn_timer_secs: u64,
    pub safety_margin_secs: u64,
    pub submit_grace_ms: u64,
    pub history_len: usize,
    pub hold_after_switch: bool,
    pub settle_ms: u64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            turn_timer_secs: 90,
            safety_margin_secs: 5,
            submit_grace_ms: 2000,
            history_len: 10,
            hold_after_switch: true,
            settle_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub max_resyncs: u32,
    /// Events buffered per battle before the transport drops them
    pub channel_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_resyncs: 3,
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// 0 retries forever
    pub max_attempts: usize,
    pub initial_delay_ms: u64,
    pub max_delay_secs: u64,
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            max_delay_secs: 60,
            multiplier: 2.0,
        }
    }
}

impl AgentConfig {
    /// Read `path`, apply environment overrides and validate
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let mut config = Self::parse(&text)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults, environment overrides, validation; for running without a file
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("Failed to parse TOML")
    }

    /// Override secrets and common knobs from the environment
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(username) = get("SHOWDOWN_USERNAME") {
            self.showdown.username = Some(username);
        }
        if let Some(password) = get("SHOWDOWN_PASSWORD") {
            self.showdown.password = Some(password);
        }
        if let Some(format) = get("BATTLE_FORMAT") {
            self.showdown.format = format;
        }
        if let Some(model) = get("MODEL") {
            self.inference.model = model;
        }
        if let Some(endpoint) = get("OLLAMA_URL") {
            self.inference.endpoint = endpoint;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.decision.max_attempts == 0 {
            bail!("decision.max_attempts must be at least 1");
        }
        if self.inference.max_concurrent == 0 {
            bail!("inference.max_concurrent must be at least 1");
        }
        if self.decision.safety_margin_secs >= self.decision.turn_timer_secs {
            bail!(
                "decision.safety_margin_secs ({}) must be smaller than decision.turn_timer_secs ({})",
                self.decision.safety_margin_secs,
                self.decision.turn_timer_secs
            );
        }
        let multiplier = self.reconnect.multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            bail!(
                "reconnect.multiplier must be a finite number of at least 1.0, got {}",
                multiplier
            );
        }
        if self.tracker.channel_capacity == 0 {
            bail!("tracker.channel_capacity must be at least 1");
        }
        if self.showdown.username.is_some() != self.showdown.password.is_some() {
            bail!("showdown.username and showdown.password must be set together");
        }
        Ok(())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.showdown.username, &self.showdown.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }

    pub fn client(&self) -> ClientConfig {
        ClientConfig {
            server_url: self.showdown.server_url.clone(),
            login_url: self.showdown.login_url.clone(),
            credentials: self.credentials(),
            reconnect: self.reconnect_policy(),
            channel_capacity: self.tracker.channel_capacity,
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: (self.reconnect.max_attempts > 0).then_some(self.reconnect.max_attempts),
            initial_delay: Duration::from_millis(self.reconnect.initial_delay_ms),
            max_delay: Duration::from_secs(self.reconnect.max_delay_secs),
            backoff_multiplier: self.reconnect.multiplier,
            ..ReconnectPolicy::default()
        }
    }

    pub fn ollama(&self) -> OllamaConfig {
        OllamaConfig {
            endpoint: self.inference.endpoint.clone(),
            model: self.inference.model.clone(),
            temperature: self.inference.temperature,
            request_timeout: Duration::from_secs(self.inference.request_timeout_secs),
        }
    }

    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            max_attempts: self.decision.max_attempts,
            hold_after_switch: self.decision.hold_after_switch,
        }
    }

    pub fn battle(&self) -> BattleConfig {
        BattleConfig {
            turn_timer: Duration::from_secs(self.decision.turn_timer_secs),
            safety_margin: Duration::from_secs(self.decision.safety_margin_secs),
            submit_grace: Duration::from_millis(self.decision.submit_grace_ms),
            settle: Duration::from_millis(self.decision.settle_ms),
            history_len: self.decision.history_len,
            max_resyncs: self.tracker.max_resyncs,
        }
    }
}
