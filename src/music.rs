//! Music.app facade
//!
//! Typed queries and commands on top of a [`ScriptBridge`]. Every scripting
//! failure stops here: it is logged and turned into an absent result (empty
//! list, `None`, or a skipped command) so callers never see an error.

use log::{debug, info, warn};
use std::path::PathBuf;

use crate::config::Config;
use crate::platform::{ProcessProbe, SystemProbe};
use crate::script_bridge::{quote, OsascriptBridge, ScriptBridge, ScriptError};
use crate::{
    clamp_volume, AirPlayDeviceInfo, DeviceKind, DeviceState, NowPlayingSnapshot, PlayerState,
    Transport,
};

const PLAYLISTS_SCRIPT: &str = r#"tell application "Music" to get name of every playlist"#;

const DEVICES_SCRIPT: &str = r#"
tell application "Music"
    set deviceList to {}
    repeat with d in AirPlay devices
        set end of deviceList to {name of d, (kind of d) as text}
    end repeat
    return deviceList
end tell
"#;

const NOW_PLAYING_SCRIPT: &str = r#"
tell application "Music"
    return {sound volume, name of current track, artist of current track, name of current playlist, (player state as text)}
end tell
"#;

const ARTWORK_SCRIPT: &str =
    r#"tell application "Music" to get raw data of artwork 1 of current track"#;

/// Everything the menu needs from the target application.
///
/// Implementations never fail: absence stands in for errors.
pub trait MusicControl: Send + Sync {
    /// Process-list membership test, no scripting involved
    fn is_target_running(&self) -> bool;
    fn list_playlists(&self) -> Vec<String>;
    fn list_airplay_devices(&self) -> Vec<AirPlayDeviceInfo>;
    /// No-op unless a playlist with exactly this name exists
    fn play_playlist(&self, name: &str);
    /// `None` unless volume, title, artist, playlist and state are all known
    fn now_playing(&self) -> Option<NowPlayingSnapshot>;
    fn device_state(&self, name: &str) -> Option<DeviceState>;
    fn set_device_selected(&self, name: &str, selected: bool);
    fn set_device_volume(&self, name: &str, volume: u8);
    fn set_master_volume(&self, volume: u8);
    fn transport(&self, command: Transport);
    fn launch_target(&self);
}

/// [`MusicControl`] over a scripting bridge and the process registry
pub struct MusicFacade<B = OsascriptBridge, P = SystemProbe> {
    bridge: B,
    probe: P,
    bundle_id: String,
    app_path: PathBuf,
}

impl MusicFacade {
    /// Facade talking to the real Music.app through `osascript`
    pub fn from_config(config: &Config) -> Self {
        Self::new(OsascriptBridge::new(), SystemProbe, config)
    }
}

impl<B: ScriptBridge, P: ProcessProbe> MusicFacade<B, P> {
    pub fn new(bridge: B, probe: P, config: &Config) -> Self {
        Self {
            bridge,
            probe,
            bundle_id: config.bundle_id.clone(),
            app_path: config.app_path.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn bridge(&self) -> &B {
        &self.bridge
    }

    fn fetch_playlists(&self) -> Result<Vec<String>, ScriptError> {
        self.bridge.execute_list(PLAYLISTS_SCRIPT)
    }

    fn fetch_devices(&self) -> Result<Vec<AirPlayDeviceInfo>, ScriptError> {
        let pairs: Vec<(String, String)> = self.bridge.execute_list(DEVICES_SCRIPT)?;
        Ok(pairs
            .into_iter()
            .map(|(name, kind)| AirPlayDeviceInfo::new(name, DeviceKind::from_script_label(&kind)))
            .collect())
    }

    fn fetch_now_playing(&self) -> Result<NowPlayingSnapshot, ScriptError> {
        let (volume, title, artist, playlist_name, state): (i64, String, String, String, String) =
            self.bridge.execute(NOW_PLAYING_SCRIPT)?;

        Ok(NowPlayingSnapshot {
            title,
            artist,
            playlist_name,
            volume: clamp_volume(volume),
            player_state: PlayerState::from_script_label(&state),
            artwork: self.fetch_artwork(),
        })
    }

    /// Tracks without artwork are normal, so failures only go to debug
    fn fetch_artwork(&self) -> Option<Vec<u8>> {
        match self.bridge.execute::<Vec<u8>>(ARTWORK_SCRIPT) {
            Ok(bytes) if !bytes.is_empty() => Some(bytes),
            Ok(_) => None,
            Err(e) => {
                debug!("No artwork: {e}");
                None
            }
        }
    }

    /// Resolve a device against a freshly fetched list, never the poll cache
    fn find_device(&self, name: &str) -> Option<AirPlayDeviceInfo> {
        let devices = absorb("list AirPlay devices", self.fetch_devices())?;
        let found = devices.into_iter().find(|d| d.name == name);
        if found.is_none() {
            debug!("AirPlay device {name:?} not found");
        }
        found
    }

    /// Issue a command whose result is ignored
    fn run(&self, what: &str, source: &str) {
        if absorb(what, self.bridge.call(source)).is_some() {
            debug!("{what}: ok");
        }
    }
}

impl<B: ScriptBridge, P: ProcessProbe> MusicControl for MusicFacade<B, P> {
    fn is_target_running(&self) -> bool {
        self.probe.is_running(&self.bundle_id)
    }

    fn list_playlists(&self) -> Vec<String> {
        if !self.is_target_running() {
            return Vec::new();
        }
        absorb("list playlists", self.fetch_playlists()).unwrap_or_default()
    }

    fn list_airplay_devices(&self) -> Vec<AirPlayDeviceInfo> {
        if !self.is_target_running() {
            return Vec::new();
        }
        absorb("list AirPlay devices", self.fetch_devices()).unwrap_or_default()
    }

    fn play_playlist(&self, name: &str) {
        if !self.list_playlists().iter().any(|p| p == name) {
            debug!("Playlist {name:?} not found, not playing");
            return;
        }
        info!("▶️  Playing playlist {name:?}");
        self.run(
            "play playlist",
            &format!("tell application \"Music\" to play the playlist named {}", quote(name)),
        );
    }

    fn now_playing(&self) -> Option<NowPlayingSnapshot> {
        if !self.is_target_running() {
            return None;
        }
        absorb("read now playing", self.fetch_now_playing())
    }

    fn device_state(&self, name: &str) -> Option<DeviceState> {
        if !self.is_target_running() {
            return None;
        }
        let source = format!(
            "tell application \"Music\" to get {{selected, sound volume}} of AirPlay device {}",
            quote(name)
        );
        let (selected, volume): (bool, i64) =
            absorb("read AirPlay device", self.bridge.execute(&source))?;
        Some(DeviceState {
            selected,
            volume: clamp_volume(volume),
        })
    }

    fn set_device_selected(&self, name: &str, selected: bool) {
        if !self.is_target_running() {
            return;
        }
        let Some(device) = self.find_device(name) else {
            return;
        };
        self.run(
            "select AirPlay device",
            &format!(
                "tell application \"Music\" to set selected of AirPlay device {} to {selected}",
                quote(&device.name)
            ),
        );
    }

    fn set_device_volume(&self, name: &str, volume: u8) {
        if !self.is_target_running() {
            return;
        }
        let Some(device) = self.find_device(name) else {
            return;
        };
        self.run(
            "set AirPlay device volume",
            &format!(
                "tell application \"Music\" to set sound volume of AirPlay device {} to {}",
                quote(&device.name),
                volume.min(100)
            ),
        );
    }

    fn set_master_volume(&self, volume: u8) {
        if !self.is_target_running() {
            return;
        }
        self.run(
            "set volume",
            &format!("tell application \"Music\" to set sound volume to {}", volume.min(100)),
        );
    }

    fn transport(&self, command: Transport) {
        if !self.is_target_running() {
            return;
        }
        self.run(
            command.command(),
            &format!("tell application \"Music\" to {}", command.command()),
        );
    }

    fn launch_target(&self) {
        info!("🚀 Launching {}", self.app_path.display());
        if let Err(e) = self.probe.launch(&self.app_path) {
            warn!("Could not launch Music: {e:#}");
        }
    }
}

/// Log a scripting failure and turn it into `None`.
fn absorb<T>(what: &str, result: Result<T, ScriptError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        // The player rejecting a query (nothing playing, device gone) is routine
        Err(e @ ScriptError::ExecutionError(_)) => {
            debug!("{what}: {e}");
            None
        }
        Err(e) => {
            warn!("{what}: {e}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::fakes::{FakeBridge, FakeProbe};
    use super::*;

    const DEVICES: &str = r#"{{"Computer", "computer"}, {"Living Room", "HomePod"}}"#;

    fn facade(bridge: FakeBridge, running: bool) -> MusicFacade<FakeBridge, FakeProbe> {
        MusicFacade::new(bridge, FakeProbe::running(running), &Config::default())
    }

    #[test]
    fn test_list_playlists() {
        let music = facade(
            FakeBridge::default().reply("every playlist", r#"{"Library", "Workout", "Chill"}"#),
            true,
        );
        assert_eq!(music.list_playlists(), vec!["Library", "Workout", "Chill"]);
    }

    #[test]
    fn test_list_playlists_failure_is_empty() {
        let music = facade(FakeBridge::default().fail("every playlist"), true);
        assert!(music.list_playlists().is_empty());
    }

    #[test]
    fn test_list_playlists_type_mismatch_is_empty() {
        let music = facade(FakeBridge::default().reply("every playlist", "42"), true);
        assert!(music.list_playlists().is_empty());
    }

    #[test]
    fn test_list_airplay_devices() {
        let music = facade(FakeBridge::default().reply("AirPlay devices", DEVICES), true);
        assert_eq!(
            music.list_airplay_devices(),
            vec![
                AirPlayDeviceInfo::new("Computer", DeviceKind::Computer),
                AirPlayDeviceInfo::new("Living Room", DeviceKind::HomePod),
            ]
        );
    }

    #[test]
    fn test_not_running_makes_no_script_calls() {
        let music = facade(
            FakeBridge::default()
                .reply("every playlist", r#"{"Library"}"#)
                .reply("AirPlay devices", DEVICES),
            false,
        );

        assert!(music.list_playlists().is_empty());
        assert!(music.list_airplay_devices().is_empty());
        assert!(music.now_playing().is_none());
        assert!(music.device_state("Computer").is_none());
        music.play_playlist("Library");
        music.transport(Transport::PlayPause);
        music.set_master_volume(10);
        music.set_device_selected("Computer", true);
        music.set_device_volume("Computer", 10);

        assert!(music.bridge.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_play_playlist_requires_existing_name() {
        let music = facade(
            FakeBridge::default()
                .reply("every playlist", r#"{"Workout", "Chill"}"#)
                .reply("play", ""),
            true,
        );

        music.play_playlist("Gym");
        assert_eq!(music.bridge.calls_containing("play the playlist"), 0);

        music.play_playlist("Chill");
        assert_eq!(
            music.bridge.calls_containing(r#"play the playlist named "Chill""#),
            1
        );
    }

    #[test]
    fn test_play_playlist_quotes_name() {
        let music = facade(
            FakeBridge::default()
                .reply("every playlist", r#"{"My \"Best\" Mix"}"#)
                .reply("play", ""),
            true,
        );
        music.play_playlist(r#"My "Best" Mix"#);
        assert_eq!(
            music.bridge.calls_containing(r#"playlist named "My \"Best\" Mix""#),
            1
        );
    }

    #[test]
    fn test_device_commands_resolve_fresh_list() {
        let music = facade(
            FakeBridge::default()
                .reply("AirPlay devices", DEVICES)
                .reply("set ", ""),
            true,
        );

        music.set_device_volume("Bedroom", 40);
        music.set_device_selected("Bedroom", true);
        assert_eq!(music.bridge.calls_containing(r#"AirPlay device "Bedroom""#), 0);

        music.set_device_volume("Living Room", 150);
        music.set_device_selected("Living Room", false);
        assert_eq!(
            music.bridge.calls_containing(
                r#"set sound volume of AirPlay device "Living Room" to 100"#
            ),
            1
        );
        assert_eq!(
            music.bridge.calls_containing(
                r#"set selected of AirPlay device "Living Room" to false"#
            ),
            1
        );
        // one fresh fetch per command
        assert_eq!(music.bridge.calls_containing("repeat with d in AirPlay devices"), 4);
    }

    #[test]
    fn test_device_state() {
        let bridge = FakeBridge::default().reply("{selected, sound volume}", "{true, 35}");
        let music = facade(bridge, true);
        assert_eq!(
            music.device_state("Kitchen"),
            Some(DeviceState {
                selected: true,
                volume: 35
            })
        );
    }

    #[test]
    fn test_now_playing() {
        let music = facade(
            FakeBridge::default()
                .reply(
                    "current playlist",
                    r#"{64, "Nocturne", "Chopin", "Chill", "playing"}"#,
                )
                .reply("artwork 1", "«data JPEGFFD8FFE0»"),
            true,
        );
        let snapshot = music.now_playing().unwrap();
        assert_eq!(snapshot.title, "Nocturne");
        assert_eq!(snapshot.artist, "Chopin");
        assert_eq!(snapshot.playlist_name, "Chill");
        assert_eq!(snapshot.volume, 64);
        assert_eq!(snapshot.player_state, PlayerState::Playing);
        assert_eq!(snapshot.artwork, Some(vec![0xFF, 0xD8, 0xFF, 0xE0]));
    }

    #[test]
    fn test_now_playing_without_artwork() {
        let music = facade(
            FakeBridge::default()
                .reply(
                    "current playlist",
                    r#"{10, "Song", "Artist", "Library", "paused"}"#,
                )
                .fail("artwork 1"),
            true,
        );
        let snapshot = music.now_playing().unwrap();
        assert_eq!(snapshot.player_state, PlayerState::Paused);
        assert!(snapshot.artwork.is_none());
    }

    #[test]
    fn test_now_playing_missing_field_is_none() {
        let music = facade(
            FakeBridge::default().reply(
                "current playlist",
                r#"{10, missing value, "Artist", "Library", "paused"}"#,
            ),
            true,
        );
        assert!(music.now_playing().is_none());
    }

    #[test]
    fn test_now_playing_stopped_is_none() {
        let music = facade(FakeBridge::default().fail("current playlist"), true);
        assert!(music.now_playing().is_none());
    }

    #[test]
    fn test_transport_failure_is_absorbed() {
        let music = facade(FakeBridge::default().fail("playpause"), true);
        music.transport(Transport::PlayPause);
        assert_eq!(music.bridge.calls_containing(r#"tell application "Music" to playpause"#), 1);
    }

    #[test]
    fn test_master_volume_clamped() {
        let music = facade(FakeBridge::default().reply("set sound volume", ""), true);
        music.set_master_volume(200);
        assert_eq!(music.bridge.calls_containing("set sound volume to 100"), 1);
    }

    #[test]
    fn test_launch_target() {
        let music = facade(FakeBridge::default(), false);
        music.launch_target();
        assert_eq!(
            *music.probe.launched.lock().unwrap(),
            vec![PathBuf::from(crate::config::MUSIC_APP_PATH)]
        );
    }
}
