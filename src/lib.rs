//! Apple Music menu bar controller
//!
//! This crate polls Music.app through its scripting interface for the current
//! track, playlists and AirPlay devices, and drives a status bar menu with
//! playback controls and per-device volume/selection toggles.

use serde::Serialize;
use std::fmt;
use std::hash::{Hash, Hasher};

pub mod artwork;
pub mod config;
pub mod events;
pub mod menu;
pub mod music;
pub mod platform;
pub mod poll;
pub mod script_bridge;
pub mod script_value;
pub mod util;
pub mod views;
pub mod worker;

#[cfg(target_os = "macos")]
pub mod app;
#[cfg(target_os = "macos")]
pub mod tray;

/// Kind of an AirPlay output, as reported by Music.app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceKind {
    Computer,
    AirPortExpress,
    AppleTV,
    AirPlayDevice,
    BluetoothDevice,
    HomePod,
    TV,
    Unknown,
}

impl DeviceKind {
    pub const ALL: [DeviceKind; 8] = [
        Self::Computer,
        Self::AirPortExpress,
        Self::AppleTV,
        Self::AirPlayDevice,
        Self::BluetoothDevice,
        Self::HomePod,
        Self::TV,
        Self::Unknown,
    ];

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            Self::Computer => "Computer",
            Self::AirPortExpress => "AirPort Express",
            Self::AppleTV => "Apple TV",
            Self::AirPlayDevice => "AirPlay Device",
            Self::BluetoothDevice => "Bluetooth Device",
            Self::HomePod => "HomePod",
            Self::TV => "TV",
            Self::Unknown => "Unknown",
        }
    }

    /// Glyph shown in front of the device name in the menu
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Computer => "💻",
            Self::AirPortExpress => "📶",
            Self::AppleTV | Self::TV => "📺",
            Self::AirPlayDevice => "🔊",
            Self::BluetoothDevice => "🎧",
            Self::HomePod => "🏠",
            Self::Unknown => "🔈",
        }
    }

    /// Map the text form of Music's `kind` property (case-insensitive).
    ///
    /// `kind as text` yields e.g. "computer", "AirPlay device", "HomePod".
    pub fn from_script_label(label: &str) -> Self {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(label))
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An AirPlay output as listed in the menu
#[derive(Debug, Clone, Serialize)]
pub struct AirPlayDeviceInfo {
    pub name: String,
    pub kind: DeviceKind,
}

impl AirPlayDeviceInfo {
    pub fn new(name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Menu title, e.g. "🏠 Living Room"
    pub fn title(&self) -> String {
        format!("{} {}", self.kind.glyph(), self.name)
    }
}

// Identity is (name, kind label)
impl PartialEq for AirPlayDeviceInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.kind.label() == other.kind.label()
    }
}

impl Eq for AirPlayDeviceInfo {}

impl Hash for AirPlayDeviceInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.kind.label().hash(state);
    }
}

/// Music.app player state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PlayerState {
    Playing,
    Paused,
    /// stopped, fast forwarding, rewinding...
    Other(String),
}

impl PlayerState {
    pub fn from_script_label(label: &str) -> Self {
        match label.trim() {
            s if s.eq_ignore_ascii_case("playing") => Self::Playing,
            s if s.eq_ignore_ascii_case("paused") => Self::Paused,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Point-in-time read of what Music.app is playing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NowPlayingSnapshot {
    pub title: String,
    pub artist: String,
    pub playlist_name: String,
    /// 0..=100
    pub volume: u8,
    pub player_state: PlayerState,
    /// Raw artwork bytes (PNG or JPEG)
    #[serde(skip)]
    pub artwork: Option<Vec<u8>>,
}

/// Live selection/volume of one AirPlay device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    pub selected: bool,
    /// 0..=100
    pub volume: u8,
}

/// Transport commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    PlayPause,
    Next,
    Previous,
}

impl Transport {
    /// AppleScript verb
    pub fn command(self) -> &'static str {
        match self {
            Self::PlayPause => "playpause",
            Self::Next => "next track",
            Self::Previous => "previous track",
        }
    }
}

/// Clamp a raw volume into 0..=100.
pub fn clamp_volume(raw: i64) -> u8 {
    u8::try_from(raw.clamp(0, 100)).unwrap_or(100)
}
