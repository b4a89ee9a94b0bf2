use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RendError, Result};

/// Environment variable holding the backend name (`auto`, empty, or a registered name).
pub const ENV_BACKEND: &str = "SWIRL_PVR_BACKEND";
/// Environment variable selecting the tile accelerator timing model (`lle` or `hle`).
pub const ENV_TA_TIMING: &str = "SWIRL_TA_TIMING";
/// Environment variable for the bounded `end_render` wait used while the host is idle.
pub const ENV_IDLE_WAIT_MS: &str = "SWIRL_IDLE_WAIT_MS";

const DEFAULT_IDLE_WAIT_MS: u64 = 17;

/// How the producer's tile accelerator is timed, which changes when frames are acknowledged on
/// vblank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaTiming {
    /// Low-level timing: every vblank presents the framebuffer under the pending-render protocol.
    #[default]
    Lle,
    /// High-level timing: the framebuffer is only presented on intervals without a render, and
    /// vblank presentation never blocks the producer.
    Hle,
}

impl TaTiming {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lle" => Ok(TaTiming::Lle),
            "hle" => Ok(TaTiming::Hle),
            other => Err(RendError::InvalidConfig(format!(
                "unknown TA timing `{other}` (expected `lle` or `hle`)"
            ))),
        }
    }
}

/// Which backend the selector should construct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BackendChoice {
    /// Highest priority backend, with the runner-up as fallback.
    #[default]
    Auto,
    /// A specific backend; falls back to `Auto` if the name is not registered.
    Named(String),
}

impl BackendChoice {
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() || name.eq_ignore_ascii_case("auto") {
            BackendChoice::Auto
        } else {
            BackendChoice::Named(name.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendConfig {
    /// Backend name; empty or `auto` selects by priority.
    pub backend: String,
    pub timing: TaTiming,
    /// Upper bound for `end_render` while the host reports it is idle (UI open, emulation
    /// paused).
    pub idle_wait_ms: u64,
}

impl Default for RendConfig {
    fn default() -> Self {
        Self {
            backend: String::new(),
            timing: TaTiming::default(),
            idle_wait_ms: DEFAULT_IDLE_WAIT_MS,
        }
    }
}

impl RendConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Missing keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(backend) = lookup(ENV_BACKEND) {
            config.backend = backend.trim().to_string();
        }
        if let Some(timing) = lookup(ENV_TA_TIMING) {
            config.timing = TaTiming::parse(&timing)?;
        }
        if let Some(ms) = lookup(ENV_IDLE_WAIT_MS) {
            config.idle_wait_ms = ms.trim().parse().map_err(|err| {
                RendError::InvalidConfig(format!("{ENV_IDLE_WAIT_MS}={ms:?}: {err}"))
            })?;
        }

        Ok(config)
    }

    pub fn backend_choice(&self) -> BackendChoice {
        BackendChoice::parse(&self.backend)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}
