//! Runtime configuration
//!
//! Nothing is persisted. Defaults describe Music.app; the poll interval can be
//! overridden from the environment for debugging.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Bundle identifier of the target application
pub const MUSIC_BUNDLE_ID: &str = "com.apple.Music";

/// Where Music.app lives
pub const MUSIC_APP_PATH: &str = "/System/Applications/Music.app";

/// Distributed notification posted on playback changes
pub const PLAYER_INFO_NOTIFICATION: &str = "com.apple.Music.playerInfo";

/// Default playlist/device poll period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Environment variable overriding the poll period (whole seconds)
pub const POLL_INTERVAL_ENV: &str = "MUSIC_CON_MENU_POLL_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bundle_id: String,
    pub app_path: PathBuf,
    pub player_info_notification: String,
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bundle_id: MUSIC_BUNDLE_ID.to_string(),
            app_path: PathBuf::from(MUSIC_APP_PATH),
            player_info_notification: PLAYER_INFO_NOTIFICATION.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Config {
    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults plus overrides read through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(POLL_INTERVAL_ENV) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| {
                    format!("{POLL_INTERVAL_ENV} must be whole seconds, got {raw:?}")
                })?;
            if secs == 0 {
                anyhow::bail!("{POLL_INTERVAL_ENV} must be at least 1");
            }
            config.poll_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
