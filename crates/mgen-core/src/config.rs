use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::SpacingPolicy;
use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per remote call (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.5 = 500ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0).min(3600.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Remote generation provider endpoints and the domain family artifacts must come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub video_submit_url: String,
    pub image_submit_url: String,
    /// Async-status endpoint, shared by the poll loop and the verifier.
    pub status_url: String,
    /// Sent as `origin` (and `referer` with a trailing slash).
    pub origin: String,
    /// Host suffixes accepted for delivery URLs (e.g. "googleusercontent.com").
    pub domain_family: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            video_submit_url:
                "https://aisandbox-pa.googleapis.com/v1/video:batchAsyncGenerateVideoText"
                    .to_string(),
            image_submit_url:
                "https://aisandbox-pa.googleapis.com/v1/image:batchAsyncGenerateImage".to_string(),
            status_url:
                "https://aisandbox-pa.googleapis.com/v1/video:batchCheckAsyncVideoGenerationStatus"
                    .to_string(),
            origin: "https://labs.google".to_string(),
            domain_family: vec![
                "google.com".to_string(),
                "googleapis.com".to_string(),
                "googleusercontent.com".to_string(),
            ],
        }
    }
}

/// Global configuration loaded from `~/.config/mgen/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MgenConfig {
    /// Provider credentials (bearer tokens), rotated least-recently-used first.
    #[serde(default)]
    pub credentials: Vec<String>,
    /// Minimum time between consecutive request starts across the whole pool.
    pub min_spacing_secs: u64,
    /// When true every request waits the full spacing, even the first of a run.
    #[serde(default)]
    pub strict_spacing: bool,
    pub default_model: String,
    pub default_aspect_ratio: String,
    /// Provider project the operations are expected to belong to.
    #[serde(default)]
    pub default_project_id: Option<String>,
    /// Root under which `<project>/<stage>/` directories are created. None = current dir.
    #[serde(default)]
    pub download_root: Option<PathBuf>,
    pub poll_interval_secs: u64,
    /// Poll delay grows by this factor per iteration (1.0 = fixed interval).
    #[serde(default = "default_backoff_factor")]
    pub poll_backoff_factor: f64,
    pub max_poll_interval_secs: u64,
    /// Overall wall-clock cap on the poll loop for one job.
    pub poll_timeout_secs: u64,
    /// Total timeout for a single submit/poll/status request.
    pub request_timeout_secs: u64,
    /// Total timeout for a single artifact download.
    pub download_timeout_secs: u64,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

fn default_backoff_factor() -> f64 {
    1.0
}

impl Default for MgenConfig {
    fn default() -> Self {
        Self {
            credentials: Vec::new(),
            min_spacing_secs: 20,
            strict_spacing: false,
            default_model: "veo_3_fast".to_string(),
            default_aspect_ratio: "16:9".to_string(),
            default_project_id: None,
            download_root: None,
            poll_interval_secs: 10,
            poll_backoff_factor: 1.0,
            max_poll_interval_secs: 60,
            poll_timeout_secs: 900,
            request_timeout_secs: 30,
            download_timeout_secs: 300,
            retry: None,
            provider: ProviderConfig::default(),
        }
    }
}

impl MgenConfig {
    pub fn min_spacing(&self) -> Duration {
        Duration::from_secs(self.min_spacing_secs)
    }

    pub fn spacing_policy(&self) -> SpacingPolicy {
        if self.strict_spacing {
            SpacingPolicy::AlwaysWait
        } else {
            SpacingPolicy::ExemptFirst
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().unwrap_or_default().to_policy()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mgen")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<MgenConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = MgenConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: MgenConfig = toml::from_str(&data)?;
    Ok(cfg)
}
