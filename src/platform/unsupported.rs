//! Fallback for hosts other than macOS
//!
//! Music.app only exists on macOS. Elsewhere the target is never running and
//! no notifications arrive, which keeps the core logic buildable and testable.

use super::{Platform, PlayerInfoHandler};
use anyhow::Result;
use log::debug;
use std::path::Path;

pub struct UnsupportedPlatform;

impl Platform for UnsupportedPlatform {
    fn is_running(_bundle_id: &str) -> bool {
        false
    }

    fn launch(path: &Path) -> Result<()> {
        anyhow::bail!(
            "Cannot launch {} on {}",
            path.display(),
            Self::name()
        )
    }

    fn name() -> &'static str {
        std::env::consts::OS
    }
}

/// No-op registration; nothing is ever delivered.
pub struct PlayerInfoObserver;

impl PlayerInfoObserver {
    pub fn register(notification: &str, _handler: PlayerInfoHandler) -> Result<Self> {
        debug!("Notification {notification} is not available on this platform");
        Ok(Self)
    }
}
