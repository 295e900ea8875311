//! Event-loop application: owns all UI-thread state
//!
//! Architecture:
//! - Main thread: winit event loop, poll state, view-models, menu handles
//! - Ticker thread: emits `PollTick` every poll interval
//! - Worker threads: scripted fetches and commands, results come back as
//!   user events through the event loop proxy
//!
//! Tray clicks do not go through the proxy. The click handler runs inside
//! the status item's mouse event, rebuilds the menu if needed and pops it up
//! itself, so the tree is always current before it is displayed.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tray_icon::menu::MenuEvent;
use tray_icon::{MouseButton, MouseButtonState, TrayIconEvent};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoopProxy};
use winit::window::WindowId;

use crate::config::Config;
use crate::events::{PlayerInfoBus, PlayerInfoEvent};
use crate::menu::{run_menu_session, MenuAction, MenuHost, MenuLayout, MenuPresenter};
use crate::music::MusicControl;
use crate::platform::PlayerInfoObserver;
use crate::poll::{PollFetch, PollingController};
use crate::tray::{MenuPopup, TrayMenu};
use crate::views::{DeviceRow, NowPlayingPanel, RefreshRequester, RefreshTarget};
use crate::worker::{spawn_worker, Ticker};
use crate::{AirPlayDeviceInfo, DeviceState, NowPlayingSnapshot};

thread_local! {
    static MENU_STATE: RefCell<Weak<RefCell<MenuState>>> = RefCell::new(Weak::new());
}

/// Events delivered to the UI thread
#[derive(Debug)]
pub enum UserEvent {
    Menu(MenuEvent),
    PollTick,
    PollFetched(PollFetch),
    PlayerInfo(PlayerInfoEvent),
    NowPlaying(Option<NowPlayingSnapshot>),
    DeviceState {
        device: AirPlayDeviceInfo,
        state: Option<DeviceState>,
    },
}

/// Tray icon callback. Must be called on the main thread.
///
/// A click release opens the menu: it is rebuilt if stale, shown, and
/// marked closed once the popup returns.
pub fn on_tray_event(event: &TrayIconEvent) {
    let TrayIconEvent::Click {
        button: MouseButton::Left | MouseButton::Right,
        button_state: MouseButtonState::Up,
        ..
    } = event
    else {
        return;
    };

    let Some(state) = MENU_STATE.with(|slot| slot.borrow().upgrade()) else {
        debug!("Tray click before the menu was ready");
        return;
    };
    run_menu_session(&*state, MenuPopup::show);
}

/// Everything the open menu reads or renders into
struct MenuState {
    music: Arc<dyn MusicControl>,
    poll: PollingController,
    presenter: MenuPresenter,
    tray: TrayMenu,
    bus: PlayerInfoBus,
    request: RefreshRequester,
    panel: Option<NowPlayingPanel>,
    rows: HashMap<AirPlayDeviceInfo, DeviceRow>,
}

impl MenuState {
    /// Recreate view-models for `layout`; old ones unsubscribe on drop
    fn attach_views(&mut self, layout: &MenuLayout) {
        self.rows.clear();
        self.panel = match layout {
            MenuLayout::NotRunning => None,
            MenuLayout::Running { .. } => {
                Some(NowPlayingPanel::attach(&self.bus, Rc::clone(&self.request)))
            }
        };
        for device in layout.devices() {
            let row = DeviceRow::attach(device.clone(), &self.bus, Rc::clone(&self.request));
            self.tray.render_row(device, row.display());
            self.rows.insert(device.clone(), row);
        }
    }
}

impl MenuHost for MenuState {
    type Popup = MenuPopup;

    fn menu_will_open(&mut self) -> Option<MenuPopup> {
        if self.poll.state().is_menu_open {
            debug!("Menu already open");
            return None;
        }

        let running = self.music.is_target_running();
        if let Some(layout) = self.presenter.menu_will_open(&mut self.poll, running).cloned() {
            match self.tray.rebuild(&layout) {
                Ok(()) => self.attach_views(&layout),
                Err(e) => error!("Failed to rebuild menu: {e:#}"),
            }
        }

        let popup = self.tray.popup();
        if popup.is_none() {
            warn!("Status item unavailable, menu not shown");
            self.menu_did_close();
        }
        popup
    }

    fn menu_did_close(&mut self) {
        if self.poll.state().is_menu_open {
            self.presenter.menu_did_close(&mut self.poll);
            debug!("Menu closed");
        }
    }
}

pub struct App {
    music: Arc<dyn MusicControl>,
    proxy: EventLoopProxy<UserEvent>,
    state: Rc<RefCell<MenuState>>,
    _ticker: Ticker,
    _observer: PlayerInfoObserver,
}

impl App {
    /// Probe the player, build the launch-time menu and start the
    /// background machinery. Must run on the main thread.
    pub fn new(
        config: &Config,
        music: Arc<dyn MusicControl>,
        proxy: EventLoopProxy<UserEvent>,
    ) -> Result<Self> {
        let poll = PollingController::launch(music.as_ref());
        let presenter = MenuPresenter::new(&poll);
        let tray = TrayMenu::new(presenter.current())?;
        info!(
            "✅ Menu initialized (running={}, {} playlists, {} devices)",
            poll.state().is_app_running,
            poll.state().playlists.len(),
            poll.state().devices.len()
        );

        let tick_proxy = proxy.clone();
        let ticker = Ticker::spawn(config.poll_interval, move || {
            tick_proxy.send_event(UserEvent::PollTick).is_ok()
        })?;

        let info_proxy = proxy.clone();
        let observer = PlayerInfoObserver::register(
            &config.player_info_notification,
            Box::new(move |event| {
                let _ = info_proxy.send_event(UserEvent::PlayerInfo(event));
            }),
        )?;

        let layout = presenter.current().clone();
        let mut state = MenuState {
            music: Arc::clone(&music),
            poll,
            presenter,
            tray,
            bus: PlayerInfoBus::new(),
            request: refresh_requester(Arc::clone(&music), proxy.clone()),
            panel: None,
            rows: HashMap::new(),
        };
        state.attach_views(&layout);

        let state = Rc::new(RefCell::new(state));
        MENU_STATE.with(|slot| *slot.borrow_mut() = Rc::downgrade(&state));

        Ok(Self {
            music,
            proxy,
            state,
            _ticker: ticker,
            _observer: observer,
        })
    }

    fn on_tick(&self) {
        let music = Arc::clone(&self.music);
        if !self.state.borrow().poll.should_poll(|| music.is_target_running()) {
            return;
        }

        let proxy = self.proxy.clone();
        // Overlapping fetches are harmless: results are applied in arrival order
        if let Err(e) = spawn_worker("poll-fetch", move || {
            let fetch = PollFetch::fetch(music.as_ref());
            let _ = proxy.send_event(UserEvent::PollFetched(fetch));
        }) {
            warn!("{e:#}");
        }
    }

    fn on_action(&self, event_loop: &ActiveEventLoop, action: MenuAction) {
        debug!("Menu action {action:?}");
        match action {
            MenuAction::Quit => {
                info!("Quit requested, shutting down...");
                event_loop.exit();
            }
            MenuAction::LaunchTarget => self.command("launch", |music| music.launch_target()),
            MenuAction::PlayPlaylist(name) => {
                self.command("play-playlist", move |music| music.play_playlist(&name));
            }
            MenuAction::Transport(transport) => {
                self.command("transport", move |music| music.transport(transport));
            }
            MenuAction::SetMasterVolume(volume) => {
                let mut state = self.state.borrow_mut();
                let state = &mut *state;
                if let Some(panel) = &mut state.panel {
                    panel.set_volume(volume);
                    state.tray.render_panel(panel.display());
                }
                self.command("master-volume", move |music| music.set_master_volume(volume));
            }
            MenuAction::ToggleDevice(device) => {
                let mut state = self.state.borrow_mut();
                let state = &mut *state;
                let Some(row) = state.rows.get_mut(&device) else {
                    debug!("No row for {}", device.title());
                    return;
                };
                let selected = row.toggle();
                state.tray.render_row(&device, row.display());
                self.command("device-select", move |music| {
                    music.set_device_selected(&device.name, selected);
                });
            }
            MenuAction::SetDeviceVolume { device, volume } => {
                let mut state = self.state.borrow_mut();
                let state = &mut *state;
                if let Some(row) = state.rows.get_mut(&device) {
                    row.set_volume(volume);
                    state.tray.render_row(&device, row.display());
                }
                self.command("device-volume", move |music| {
                    music.set_device_volume(&device.name, volume);
                });
            }
        }
    }

    /// Fire-and-forget scripted command on a worker
    fn command(&self, what: &str, run: impl FnOnce(&dyn MusicControl) + Send + 'static) {
        let music = Arc::clone(&self.music);
        if let Err(e) = spawn_worker(what, move || run(music.as_ref())) {
            warn!("{e:#}");
        }
    }
}

fn refresh_requester(
    music: Arc<dyn MusicControl>,
    proxy: EventLoopProxy<UserEvent>,
) -> RefreshRequester {
    Rc::new(move |target| {
        let music = Arc::clone(&music);
        let proxy = proxy.clone();
        let result = spawn_worker("refresh", move || {
            let event = match target {
                RefreshTarget::NowPlaying => UserEvent::NowPlaying(music.now_playing()),
                RefreshTarget::Device(device) => {
                    let state = music.device_state(&device.name);
                    UserEvent::DeviceState { device, state }
                }
            };
            let _ = proxy.send_event(event);
        });
        if let Err(e) = result {
            warn!("{e:#}");
        }
    })
}

impl ApplicationHandler<UserEvent> for App {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, _event: WindowEvent) {}

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::Menu(menu_event) => match MenuAction::parse(&menu_event.id.0) {
                Some(action) => self.on_action(event_loop, action),
                None => debug!("Ignoring menu item {}", menu_event.id.0),
            },
            UserEvent::PollTick => self.on_tick(),
            UserEvent::PollFetched(fetch) => {
                if self.state.borrow_mut().poll.apply_fetch(fetch) {
                    info!("📋 Playlists/devices changed, menu will rebuild on next open");
                }
            }
            UserEvent::PlayerInfo(event) => {
                debug!("Player info {} = {}", event.key, event.value);
                // listeners only queue refreshes; they never borrow `state` mutably
                self.state.borrow().bus.publish(&event);
            }
            UserEvent::NowPlaying(snapshot) => {
                let mut state = self.state.borrow_mut();
                let state = &mut *state;
                if let Some(panel) = &mut state.panel {
                    if panel.apply(snapshot) {
                        state.tray.render_panel(panel.display());
                    }
                }
            }
            UserEvent::DeviceState { device, state: update } => {
                let mut state = self.state.borrow_mut();
                let state = &mut *state;
                if let Some(row) = state.rows.get_mut(&device) {
                    if row.apply(update) {
                        state.tray.render_row(&device, row.display());
                    }
                }
            }
        }
    }
}
