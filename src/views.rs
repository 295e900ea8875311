//! Live view-models for the now-playing panel and AirPlay device rows
//!
//! Each view-model asks for a refresh when it is attached and whenever a
//! player-info event reports "Playing" or "Paused". The refresh itself is
//! performed by whoever owns the [`RefreshRequester`] (the app dispatches it
//! to a worker and feeds the result back through `apply`), so nothing here
//! blocks on the scripting bridge. These never touch the poll cache.

use log::debug;
use serde::Serialize;
use std::rc::Rc;

use crate::events::{PlayerInfoBus, Subscription};
use crate::{AirPlayDeviceInfo, DeviceState, NowPlayingSnapshot, PlayerState};

/// Speaker glyph for a volume level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolumeGlyph {
    Muted,
    Low,
    Medium,
    Loud,
}

impl VolumeGlyph {
    pub fn for_level(volume: u8) -> Self {
        match volume {
            0 => Self::Muted,
            1..=32 => Self::Low,
            33..=65 => Self::Medium,
            _ => Self::Loud,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Muted => "🔇",
            Self::Low => "🔈",
            Self::Medium => "🔉",
            Self::Loud => "🔊",
        }
    }
}

/// What a view-model wants re-queried
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefreshTarget {
    NowPlaying,
    Device(AirPlayDeviceInfo),
}

/// Callback that schedules a refresh for a [`RefreshTarget`]
pub type RefreshRequester = Rc<dyn Fn(RefreshTarget)>;

fn subscribe_refresh(
    bus: &PlayerInfoBus,
    request: &RefreshRequester,
    target: RefreshTarget,
) -> Subscription {
    let request = Rc::clone(request);
    bus.subscribe(move |event| {
        if event.triggers_refresh() {
            debug!("Player state {} -> refresh {target:?}", event.value);
            request(target.clone());
        }
    })
}

// ---------------------------------------------------------------------------
// Now-playing panel
// ---------------------------------------------------------------------------

/// Label of the play/pause control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlayButton {
    Play,
    Pause,
}

impl PlayButton {
    pub fn label(self) -> &'static str {
        match self {
            Self::Play => "Play",
            Self::Pause => "Pause",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelDisplay {
    pub title: String,
    pub artist: String,
    pub playlist: String,
    pub play_button: PlayButton,
    pub volume: u8,
    pub glyph: VolumeGlyph,
    /// Encoded artwork; `None` shows the placeholder
    #[serde(skip)]
    pub artwork: Option<Vec<u8>>,
}

impl Default for PanelDisplay {
    fn default() -> Self {
        Self {
            title: String::new(),
            artist: String::new(),
            playlist: String::new(),
            play_button: PlayButton::Play,
            volume: 0,
            glyph: VolumeGlyph::Muted,
            artwork: None,
        }
    }
}

pub struct NowPlayingPanel {
    display: PanelDisplay,
    _subscription: Subscription,
}

impl NowPlayingPanel {
    /// Subscribe to `bus` and request the first refresh
    pub fn attach(bus: &PlayerInfoBus, request: RefreshRequester) -> Self {
        let subscription = subscribe_refresh(bus, &request, RefreshTarget::NowPlaying);
        request(RefreshTarget::NowPlaying);
        Self {
            display: PanelDisplay::default(),
            _subscription: subscription,
        }
    }

    pub fn display(&self) -> &PanelDisplay {
        &self.display
    }

    /// Fold in a refresh result. `None` keeps the last good snapshot.
    ///
    /// Returns whether the display changed.
    pub fn apply(&mut self, snapshot: Option<NowPlayingSnapshot>) -> bool {
        let Some(snapshot) = snapshot else {
            debug!("Now playing unavailable, keeping last snapshot");
            return false;
        };

        let previous = self.display.clone();
        self.display.title = snapshot.title;
        self.display.artist = snapshot.artist;
        self.display.playlist = snapshot.playlist_name;
        match snapshot.player_state {
            PlayerState::Playing => self.display.play_button = PlayButton::Pause,
            PlayerState::Paused => self.display.play_button = PlayButton::Play,
            PlayerState::Other(_) => {}
        }
        self.display.volume = snapshot.volume;
        self.display.glyph = VolumeGlyph::for_level(snapshot.volume);
        self.display.artwork = snapshot.artwork;

        self.display != previous
    }

    /// Reflect a user volume change before the command completes
    pub fn set_volume(&mut self, volume: u8) {
        self.display.volume = volume.min(100);
        self.display.glyph = VolumeGlyph::for_level(self.display.volume);
    }
}

// ---------------------------------------------------------------------------
// Device row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDisplay {
    pub title: String,
    pub selected: bool,
    pub volume: u8,
    pub glyph: VolumeGlyph,
    /// Volume controls are only shown for selected devices
    pub volume_visible: bool,
}

pub struct DeviceRow {
    device: AirPlayDeviceInfo,
    display: RowDisplay,
    _subscription: Subscription,
}

impl DeviceRow {
    pub fn attach(
        device: AirPlayDeviceInfo,
        bus: &PlayerInfoBus,
        request: RefreshRequester,
    ) -> Self {
        let target = RefreshTarget::Device(device.clone());
        let subscription = subscribe_refresh(bus, &request, target.clone());
        request(target);
        Self {
            display: RowDisplay {
                title: device.title(),
                selected: false,
                volume: 0,
                glyph: VolumeGlyph::Muted,
                volume_visible: false,
            },
            device,
            _subscription: subscription,
        }
    }

    pub fn display(&self) -> &RowDisplay {
        &self.display
    }

    /// Fold in a refresh result. `None` (device gone, query failed) keeps the
    /// current display. Returns whether the display changed.
    pub fn apply(&mut self, state: Option<DeviceState>) -> bool {
        let Some(state) = state else {
            debug!("No state for {}, keeping row", self.device.name);
            return false;
        };

        let previous = self.display.clone();
        self.display.selected = state.selected;
        self.display.volume_visible = state.selected;
        self.display.volume = state.volume;
        self.display.glyph = VolumeGlyph::for_level(state.volume);
        self.display != previous
    }

    /// Flip the enabled toggle locally and return the requested selection
    pub fn toggle(&mut self) -> bool {
        self.display.selected = !self.display.selected;
        self.display.volume_visible = self.display.selected;
        self.display.selected
    }

    /// Reflect a user volume change before the command completes
    pub fn set_volume(&mut self, volume: u8) {
        self.display.volume = volume.min(100);
        self.display.glyph = VolumeGlyph::for_level(self.display.volume);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::events::{PlayerInfoEvent, PLAYER_STATE_KEY, TRACK_NAME_KEY};
    use crate::music::fakes::{FakeBridge, FakeProbe};
    use crate::music::{MusicControl, MusicFacade};
    use crate::poll::{PollFetch, PollingController};
    use crate::{DeviceKind, Transport};
    use std::cell::RefCell;

    fn recorder() -> (RefreshRequester, Rc<RefCell<Vec<RefreshTarget>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let request: RefreshRequester = Rc::new(move |target| sink.borrow_mut().push(target));
        (request, log)
    }

    fn snapshot(state: PlayerState, volume: u8) -> NowPlayingSnapshot {
        NowPlayingSnapshot {
            title: "Song".into(),
            artist: "Band".into(),
            playlist_name: "Mix".into(),
            volume,
            player_state: state,
            artwork: None,
        }
    }

    #[test]
    fn test_volume_glyph_thresholds() {
        assert_eq!(VolumeGlyph::for_level(0), VolumeGlyph::Muted);
        assert_eq!(VolumeGlyph::for_level(1), VolumeGlyph::Low);
        assert_eq!(VolumeGlyph::for_level(32), VolumeGlyph::Low);
        assert_eq!(VolumeGlyph::for_level(33), VolumeGlyph::Medium);
        assert_eq!(VolumeGlyph::for_level(50), VolumeGlyph::Medium);
        assert_eq!(VolumeGlyph::for_level(65), VolumeGlyph::Medium);
        assert_eq!(VolumeGlyph::for_level(66), VolumeGlyph::Loud);
        assert_eq!(VolumeGlyph::for_level(90), VolumeGlyph::Loud);
        assert_eq!(VolumeGlyph::for_level(100), VolumeGlyph::Loud);
    }

    #[test]
    fn test_panel_refreshes_on_attach_and_play_state() {
        let bus = PlayerInfoBus::new();
        let (request, log) = recorder();
        let _panel = NowPlayingPanel::attach(&bus, request);
        assert_eq!(*log.borrow(), vec![RefreshTarget::NowPlaying]);

        bus.publish(&PlayerInfoEvent::new(PLAYER_STATE_KEY, "Stopped"));
        bus.publish(&PlayerInfoEvent::new(TRACK_NAME_KEY, "Paused"));
        assert_eq!(log.borrow().len(), 1);

        bus.publish(&PlayerInfoEvent::new(PLAYER_STATE_KEY, "Paused"));
        bus.publish(&PlayerInfoEvent::new(PLAYER_STATE_KEY, "Playing"));
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn test_dropped_panel_stops_listening() {
        let bus = PlayerInfoBus::new();
        let (request, log) = recorder();
        let panel = NowPlayingPanel::attach(&bus, request);
        drop(panel);

        assert_eq!(bus.listener_count(), 0);
        bus.publish(&PlayerInfoEvent::new(PLAYER_STATE_KEY, "Playing"));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_panel_apply() {
        let bus = PlayerInfoBus::new();
        let (request, _) = recorder();
        let mut panel = NowPlayingPanel::attach(&bus, request);

        assert!(panel.apply(Some(snapshot(PlayerState::Playing, 50))));
        let display = panel.display();
        assert_eq!(display.title, "Song");
        assert_eq!(display.artist, "Band");
        assert_eq!(display.playlist, "Mix");
        assert_eq!(display.play_button, PlayButton::Pause);
        assert_eq!(display.glyph, VolumeGlyph::Medium);

        assert!(panel.apply(Some(snapshot(PlayerState::Paused, 50))));
        assert_eq!(panel.display().play_button.label(), "Play");

        // unknown states leave the button alone
        panel.apply(Some(snapshot(PlayerState::Other("stopped".into()), 50)));
        assert_eq!(panel.display().play_button, PlayButton::Play);

        assert!(!panel.apply(Some(snapshot(PlayerState::Other("stopped".into()), 50))));
    }

    #[test]
    fn test_failed_play_pause_keeps_last_snapshot() {
        let bridge = FakeBridge::default()
            .fail("playpause")
            .fail("current track");
        let music = MusicFacade::new(bridge, FakeProbe::running(true), &Config::default());
        let poll = PollingController::new(
            true,
            Some(PollFetch {
                playlists: vec!["Mix".into()],
                devices: vec![AirPlayDeviceInfo::new("Kitchen", DeviceKind::HomePod)],
            }),
        );
        let cached = poll.state().clone();

        let bus = PlayerInfoBus::new();
        let (request, _) = recorder();
        let mut panel = NowPlayingPanel::attach(&bus, request);
        panel.apply(Some(snapshot(PlayerState::Playing, 70)));
        let before = panel.display().clone();

        music.transport(Transport::PlayPause);
        assert!(!panel.apply(music.now_playing()));
        assert_eq!(panel.display(), &before);

        assert_eq!(poll.state().is_dirty, cached.is_dirty);
        assert_eq!(poll.state().playlists, cached.playlists);
        assert_eq!(poll.state().devices, cached.devices);
    }

    #[test]
    fn test_panel_set_volume_updates_glyph_immediately() {
        let bus = PlayerInfoBus::new();
        let (request, _) = recorder();
        let mut panel = NowPlayingPanel::attach(&bus, request);

        panel.set_volume(0);
        assert_eq!(panel.display().glyph, VolumeGlyph::Muted);
        panel.set_volume(90);
        assert_eq!(panel.display().glyph, VolumeGlyph::Loud);
        assert_eq!(panel.display().volume, 90);
    }

    #[test]
    fn test_device_row_refresh_targets() {
        let bus = PlayerInfoBus::new();
        let (request, log) = recorder();
        let kitchen = AirPlayDeviceInfo::new("Kitchen", DeviceKind::HomePod);
        let _row = DeviceRow::attach(kitchen.clone(), &bus, request);

        bus.publish(&PlayerInfoEvent::new(PLAYER_STATE_KEY, "Playing"));
        assert_eq!(
            *log.borrow(),
            vec![
                RefreshTarget::Device(kitchen.clone()),
                RefreshTarget::Device(kitchen)
            ]
        );
    }

    #[test]
    fn test_device_row_hides_volume_when_unselected() {
        let bus = PlayerInfoBus::new();
        let (request, _) = recorder();
        let kitchen = AirPlayDeviceInfo::new("Kitchen", DeviceKind::HomePod);
        let mut row = DeviceRow::attach(kitchen, &bus, request);
        assert!(row.display().title.ends_with("Kitchen"));

        assert!(row.apply(Some(DeviceState { selected: true, volume: 20 })));
        assert!(row.display().volume_visible);
        assert_eq!(row.display().glyph, VolumeGlyph::Low);

        assert!(row.apply(Some(DeviceState { selected: false, volume: 20 })));
        assert!(!row.display().volume_visible);

        assert!(!row.apply(None));
        assert!(!row.display().selected);
    }

    #[test]
    fn test_device_row_toggle_and_volume() {
        let bus = PlayerInfoBus::new();
        let (request, _) = recorder();
        let den = AirPlayDeviceInfo::new("Den", DeviceKind::AppleTV);
        let mut row = DeviceRow::attach(den, &bus, request);

        assert!(row.toggle());
        assert!(row.display().volume_visible);
        row.set_volume(40);
        assert_eq!(row.display().glyph, VolumeGlyph::Medium);
        assert!(!row.toggle());
        assert!(!row.display().volume_visible);
    }
}
