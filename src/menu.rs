//! Menu layout and the open/close presenter
//!
//! The presenter decides *when* the status menu is rebuilt; [`MenuLayout`]
//! describes *what* it contains. Rendering into real menu items is left to
//! the tray layer, so everything here is plain data.
//!
//! [`run_menu_session`] fixes the order of one open/close cycle: the tree is
//! brought up to date before the native menu is shown, and the menu counts
//! as closed only once the blocking popup returns.

use log::{debug, info};
use std::cell::RefCell;

use crate::poll::{PollState, PollingController};
use crate::{AirPlayDeviceInfo, DeviceKind, Transport};

/// Title of the only item shown while Music.app is not running
pub const LAUNCH_TITLE: &str = "Run Music.app";
pub const PLAYLISTS_TITLE: &str = "Playlists";
pub const AIRPLAY_TITLE: &str = "AirPlay";
pub const QUIT_TITLE: &str = "Quit";

/// Volume steps offered for master and per-device volume
pub const VOLUME_PRESETS: [u8; 5] = [0, 25, 50, 75, 100];

/// Something the user can trigger from the menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    LaunchTarget,
    Quit,
    PlayPlaylist(String),
    Transport(Transport),
    SetMasterVolume(u8),
    ToggleDevice(AirPlayDeviceInfo),
    SetDeviceVolume { device: AirPlayDeviceInfo, volume: u8 },
}

impl MenuAction {
    /// Stable menu item id
    pub fn id(&self) -> String {
        match self {
            Self::LaunchTarget => "launch".to_string(),
            Self::Quit => "quit".to_string(),
            Self::PlayPlaylist(name) => format!("playlist:{name}"),
            Self::Transport(Transport::PlayPause) => "transport:playpause".to_string(),
            Self::Transport(Transport::Next) => "transport:next".to_string(),
            Self::Transport(Transport::Previous) => "transport:previous".to_string(),
            Self::SetMasterVolume(volume) => format!("volume:{volume}"),
            // name last: device names may contain ':'
            Self::ToggleDevice(device) => format!("device-toggle:{}", device_key(device)),
            Self::SetDeviceVolume { device, volume } => {
                format!("device-volume:{volume}:{}", device_key(device))
            }
        }
    }

    /// Inverse of [`MenuAction::id`]
    pub fn parse(id: &str) -> Option<Self> {
        let (kind, rest) = id.split_once(':').unwrap_or((id, ""));
        match kind {
            "launch" => Some(Self::LaunchTarget),
            "quit" => Some(Self::Quit),
            "playlist" => Some(Self::PlayPlaylist(rest.to_string())),
            "transport" => match rest {
                "playpause" => Some(Self::Transport(Transport::PlayPause)),
                "next" => Some(Self::Transport(Transport::Next)),
                "previous" => Some(Self::Transport(Transport::Previous)),
                _ => None,
            },
            "volume" => rest.parse().ok().map(Self::SetMasterVolume),
            "device-toggle" => parse_device_key(rest).map(Self::ToggleDevice),
            "device-volume" => {
                let (volume, device) = rest.split_once(':')?;
                Some(Self::SetDeviceVolume {
                    device: parse_device_key(device)?,
                    volume: volume.parse().ok()?,
                })
            }
            _ => None,
        }
    }
}

fn device_key(device: &AirPlayDeviceInfo) -> String {
    format!("{}:{}", device.kind.label(), device.name)
}

fn parse_device_key(key: &str) -> Option<AirPlayDeviceInfo> {
    let (label, name) = key.split_once(':')?;
    let kind = DeviceKind::ALL.into_iter().find(|kind| kind.label() == label)?;
    Some(AirPlayDeviceInfo::new(name, kind))
}

/// One node of the menu tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Action { title: String, action: MenuAction },
    /// Now-playing info, transport and master volume
    NowPlayingPanel,
    Submenu { title: String, items: Vec<MenuEntry> },
    /// Live selection/volume controls for one device
    DeviceRow(AirPlayDeviceInfo),
    Separator,
}

/// What the status menu shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuLayout {
    NotRunning,
    Running {
        playlists: Vec<String>,
        devices: Vec<AirPlayDeviceInfo>,
    },
}

impl MenuLayout {
    pub fn from_state(state: &PollState) -> Self {
        if state.is_app_running {
            Self::Running {
                playlists: state.playlists.clone(),
                devices: state.devices.clone(),
            }
        } else {
            Self::NotRunning
        }
    }

    pub fn entries(&self) -> Vec<MenuEntry> {
        match self {
            Self::NotRunning => vec![MenuEntry::Action {
                title: LAUNCH_TITLE.to_string(),
                action: MenuAction::LaunchTarget,
            }],
            Self::Running { playlists, devices } => vec![
                MenuEntry::NowPlayingPanel,
                MenuEntry::Submenu {
                    title: PLAYLISTS_TITLE.to_string(),
                    items: playlists
                        .iter()
                        .map(|name| MenuEntry::Action {
                            title: name.clone(),
                            action: MenuAction::PlayPlaylist(name.clone()),
                        })
                        .collect(),
                },
                MenuEntry::Submenu {
                    title: AIRPLAY_TITLE.to_string(),
                    items: devices.iter().cloned().map(MenuEntry::DeviceRow).collect(),
                },
                MenuEntry::Separator,
                MenuEntry::Action {
                    title: QUIT_TITLE.to_string(),
                    action: MenuAction::Quit,
                },
            ],
        }
    }

    /// Devices that get a live row
    pub fn devices(&self) -> &[AirPlayDeviceInfo] {
        match self {
            Self::NotRunning => &[],
            Self::Running { devices, .. } => devices,
        }
    }
}

/// Decides on open whether the menu tree must be rebuilt
#[derive(Debug)]
pub struct MenuPresenter {
    current: MenuLayout,
}

impl MenuPresenter {
    /// Build the launch-time menu from the initial poll state
    pub fn new(poll: &PollingController) -> Self {
        Self {
            current: MenuLayout::from_state(poll.state()),
        }
    }

    /// Layout currently shown
    pub fn current(&self) -> &MenuLayout {
        &self.current
    }

    /// Menu-open handler. Returns the new layout when a rebuild happened.
    ///
    /// A second open without an intervening close does nothing: the menu is
    /// never rebuilt while it is open.
    pub fn menu_will_open(
        &mut self,
        poll: &mut PollingController,
        is_target_running: bool,
    ) -> Option<&MenuLayout> {
        if poll.state().is_menu_open {
            debug!("Menu already open");
            return None;
        }

        if !poll.open_menu(is_target_running) {
            debug!("Menu unchanged");
            return None;
        }

        self.current = MenuLayout::from_state(poll.state());
        info!(
            "🔄 Rebuilt menu ({} playlists, {} devices, running={is_target_running})",
            poll.state().playlists.len(),
            poll.state().devices.len()
        );
        Some(&self.current)
    }

    /// Menu-close handler. Never rebuilds.
    pub fn menu_did_close(&mut self, poll: &mut PollingController) {
        poll.close_menu();
    }
}

/// UI-thread owner of the status menu
pub trait MenuHost {
    /// Shows the menu and blocks until it is dismissed
    type Popup;

    /// Bring the menu tree up to date. `None` means nothing is shown and
    /// the menu stays closed.
    fn menu_will_open(&mut self) -> Option<Self::Popup>;

    fn menu_did_close(&mut self);
}

/// One open/close cycle of the status menu.
///
/// `host` is not borrowed while `show` runs, so events dispatched during
/// menu tracking can still reach it.
pub fn run_menu_session<H: MenuHost>(host: &RefCell<H>, show: impl FnOnce(&H::Popup)) {
    let Some(popup) = host.borrow_mut().menu_will_open() else {
        return;
    };
    show(&popup);
    host.borrow_mut().menu_did_close();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
