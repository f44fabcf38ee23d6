//! Run configuration.
//!
//! Settings come from three layers, highest precedence first: command-line
//! flags, `PAGES2PDF_*` environment variables, and an optional JSON file.
//! Anything left unset falls back to built-in defaults, except credentials,
//! which must be supplied explicitly.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::fs;
use tracing::warn;

use crate::address::{Endpoint, Tier, DEFAULT_HOST};
use crate::auth::Credentials;
use crate::discovery::{DiscoveryTuning, DEFAULT_DIVISOR, DEFAULT_INITIAL_STEP};
use crate::error::{Error, Result};
use crate::transport::DEFAULT_TIMEOUT;

pub const ENV_USERNAME: &str = "PAGES2PDF_USERNAME";
pub const ENV_PASSWORD: &str = "PAGES2PDF_PASSWORD";
pub const ENV_HOST: &str = "PAGES2PDF_HOST";

/// One source of settings. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tier: Option<Tier>,
    pub timeout_secs: Option<f64>,
    pub probe_step: Option<u32>,
    pub probe_divisor: Option<u32>,
    pub scratch_dir: Option<PathBuf>,
}

impl ConfigLayer {
    /// Fills every unset field of `self` from `lower`.
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            host: self.host.or(lower.host),
            username: self.username.or(lower.username),
            password: self.password.or(lower.password),
            tier: self.tier.or(lower.tier),
            timeout_secs: self.timeout_secs.or(lower.timeout_secs),
            probe_step: self.probe_step.or(lower.probe_step),
            probe_divisor: self.probe_divisor.or(lower.probe_divisor),
            scratch_dir: self.scratch_dir.or(lower.scratch_dir),
        }
    }

    /// Reads the `PAGES2PDF_*` variables through `lookup`.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> ConfigLayer {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        ConfigLayer {
            host: read(ENV_HOST),
            username: read(ENV_USERNAME),
            password: lookup(ENV_PASSWORD).filter(|value| !value.is_empty()),
            ..ConfigLayer::default()
        }
    }

    pub fn from_env() -> ConfigLayer {
        Self::from_env_with(|key| std::env::var(key).ok())
    }
}

pub async fn load_file(path: &Path) -> Result<ConfigLayer> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: Endpoint,
    pub credentials: Credentials,
    pub tier: Tier,
    pub timeout: Duration,
    pub tuning: DiscoveryTuning,
    pub scratch_dir: Option<PathBuf>,
}

impl Settings {
    pub fn resolve(layer: ConfigLayer) -> Result<Self> {
        let endpoint = Endpoint::new(layer.host.as_deref().unwrap_or(DEFAULT_HOST))?;

        let username = layer.username.filter(|u| !u.trim().is_empty()).ok_or_else(|| {
            Error::Config(format!(
                "no username given (use --username, {ENV_USERNAME} or the config file)"
            ))
        })?;
        let password = layer.password.ok_or_else(|| {
            Error::Config(format!(
                "no password given (use --password, {ENV_PASSWORD} or the config file)"
            ))
        })?;

        let timeout = match layer.timeout_secs {
            Some(secs) => parse_timeout(secs)?,
            None => DEFAULT_TIMEOUT,
        };

        let tuning = DiscoveryTuning::new(
            layer.probe_step.unwrap_or(DEFAULT_INITIAL_STEP),
            layer.probe_divisor.unwrap_or(DEFAULT_DIVISOR),
        )?;

        if let Some(dir) = layer.scratch_dir.as_deref().filter(|d| !d.is_dir()) {
            warn!("Scratch directory {} does not exist yet", dir.display());
        }

        Ok(Self {
            endpoint,
            credentials: Credentials::new(username.trim(), password),
            tier: layer.tier.unwrap_or_default(),
            timeout,
            tuning,
            scratch_dir: layer.scratch_dir,
        })
    }
}

fn parse_timeout(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(Error::Config(format!(
            "timeout must be a positive number of seconds (got {secs})"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}
