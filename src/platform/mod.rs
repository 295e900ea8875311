//! Platform abstraction layer
//!
//! This module provides platform-specific implementations for:
//! - Detecting if the target application is running
//! - Launching the target application
//! - Observing the target's player-info notifications

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod unsupported;

use anyhow::Result;
use std::path::Path;

use crate::events::PlayerInfoEvent;

/// Platform-specific operations
pub trait Platform {
    /// Check if an application with this bundle identifier is running
    fn is_running(bundle_id: &str) -> bool;

    /// Launch the application bundle at `path`
    fn launch(path: &Path) -> Result<()>;

    /// Get the platform name for logging
    fn name() -> &'static str;
}

/// Get the current platform implementation
#[cfg(target_os = "macos")]
pub use macos::MacOSPlatform as CurrentPlatform;

#[cfg(not(target_os = "macos"))]
pub use unsupported::UnsupportedPlatform as CurrentPlatform;

#[cfg(target_os = "macos")]
pub use macos::PlayerInfoObserver;

#[cfg(not(target_os = "macos"))]
pub use unsupported::PlayerInfoObserver;

/// Process registry seen by the music facade.
///
/// Instance methods so tests can substitute a fake.
pub trait ProcessProbe: Send + Sync {
    fn is_running(&self, bundle_id: &str) -> bool;
    fn launch(&self, path: &Path) -> Result<()>;
}

/// [`ProcessProbe`] backed by the current platform
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn is_running(&self, bundle_id: &str) -> bool {
        CurrentPlatform::is_running(bundle_id)
    }

    fn launch(&self, path: &Path) -> Result<()> {
        CurrentPlatform::launch(path)
    }
}

/// Callback invoked for every player-info notification
pub type PlayerInfoHandler = Box<dyn Fn(PlayerInfoEvent) + Send + 'static>;

/// Name of the platform for logging
pub fn name() -> &'static str {
    CurrentPlatform::name()
}
