//! Status bar icon and menu rendering
//!
//! Turns a [`MenuLayout`] into `tray-icon` menu items and keeps handles to
//! the live items so panel and row displays can be pushed into them without
//! rebuilding the tree.
//!
//! The menu is not attached to the status item. Clicks are handled by the
//! app, which pops the current tree up through [`MenuPopup`].

use anyhow::{Context, Result};
use log::{debug, warn};
use objc2::rc::Retained;
use objc2::MainThreadMarker;
use objc2_app_kit::NSStatusItem;
use std::collections::HashMap;
use tray_icon::{
    menu::{
        accelerator::{Accelerator, Code, Modifiers},
        dpi::LogicalPosition,
        CheckMenuItem, ContextMenu, Icon as MenuIcon, IconMenuItem, Menu, MenuItem,
        PredefinedMenuItem, Submenu,
    },
    Icon, TrayIcon, TrayIconBuilder,
};

use crate::artwork;
use crate::menu::{MenuAction, MenuEntry, MenuLayout, VOLUME_PRESETS};
use crate::util::menu_label;
use crate::views::{PanelDisplay, RowDisplay};
use crate::{AirPlayDeviceInfo, Transport};

const TOOLTIP: &str = "Music Con Menu";
const ICON_BYTES: &[u8] = include_bytes!("../assets/tray_icon.png");

/// Gap between the status item and the top of the menu, in points
const MENU_OFFSET: f64 = 4.0;

/// Volume preset checkboxes under one submenu
struct VolumeItems {
    submenu: Submenu,
    presets: Vec<(u8, CheckMenuItem)>,
}

impl VolumeItems {
    fn new(title: &str, action: impl Fn(u8) -> MenuAction) -> Result<Self> {
        let submenu = Submenu::new(title, true);
        let mut presets = Vec::with_capacity(VOLUME_PRESETS.len());
        for volume in VOLUME_PRESETS {
            let label = format!("{volume}%");
            let item = CheckMenuItem::with_id(action(volume).id(), label, true, false, None);
            submenu.append(&item)?;
            presets.push((volume, item));
        }
        Ok(Self { submenu, presets })
    }

    fn render(&self, title: String, volume: u8, enabled: bool) {
        self.submenu.set_text(title);
        for (preset, item) in &self.presets {
            item.set_checked(*preset == volume);
            item.set_enabled(enabled);
        }
    }
}

/// Live items of the now-playing panel
struct PanelItems {
    track: IconMenuItem,
    artist: MenuItem,
    playlist: MenuItem,
    play_pause: MenuItem,
    volume: VolumeItems,
}

/// Live items of one device row
struct RowItems {
    submenu: Submenu,
    enabled: CheckMenuItem,
    volume: VolumeItems,
}

/// The current menu tree, ready to be shown under the status item
pub struct MenuPopup {
    menu: Menu,
    status_item: Retained<NSStatusItem>,
}

impl MenuPopup {
    /// Show the menu below the status item. Blocks until it is dismissed.
    pub fn show(&self) {
        let Some(mtm) = MainThreadMarker::new() else {
            warn!("Menu can only be shown from the main thread");
            return;
        };
        let Some(button) = self.status_item.button(mtm) else {
            warn!("Status item has no button");
            return;
        };

        let height = button.frame().size.height;
        let position = LogicalPosition::new(0.0, height + MENU_OFFSET);
        button.highlight(true);
        // SAFETY: `button` is the status item's view, installed in its window
        // and retained for the whole call.
        unsafe {
            self.menu.show_context_menu_for_nsview(
                Retained::as_ptr(&button).cast(),
                Some(position.into()),
            );
        }
        button.highlight(false);
    }
}

pub struct TrayMenu {
    tray: TrayIcon,
    menu: Menu,
    placeholder: Option<MenuIcon>,
    panel: Option<PanelItems>,
    rows: HashMap<AirPlayDeviceInfo, RowItems>,
}

impl TrayMenu {
    /// Create the status item with an initial menu
    pub fn new(layout: &MenuLayout) -> Result<Self> {
        let (rgba, width, height) = icon_rgba()?;
        let icon = Icon::from_rgba(rgba.clone(), width, height)
            .context("Failed to create icon from RGBA data")?;
        let placeholder = MenuIcon::from_rgba(rgba, width, height).ok();

        let tray = TrayIconBuilder::new()
            .with_icon(icon)
            .with_icon_as_template(true)
            .with_tooltip(TOOLTIP)
            .with_menu_on_left_click(false)
            .build()
            .context("Failed to create tray icon")?;

        let mut menu = Self {
            tray,
            menu: Menu::new(),
            placeholder,
            panel: None,
            rows: HashMap::new(),
        };
        menu.rebuild(layout)?;
        Ok(menu)
    }

    /// Replace the whole menu tree
    pub fn rebuild(&mut self, layout: &MenuLayout) -> Result<()> {
        let menu = Menu::new();
        self.panel = None;
        self.rows.clear();

        for entry in layout.entries() {
            match entry {
                MenuEntry::NowPlayingPanel => {
                    let panel = self.build_panel(&menu)?;
                    self.panel = Some(panel);
                }
                MenuEntry::Submenu { title, items } => {
                    let submenu = Submenu::new(&title, true);
                    for item in items {
                        self.append_child(&submenu, item)?;
                    }
                    menu.append(&submenu)?;
                }
                MenuEntry::Action { title, action } => {
                    menu.append(&action_item(&title, &action))?;
                }
                MenuEntry::DeviceRow(device) => {
                    let row = build_row(&device)?;
                    menu.append(&row.submenu)?;
                    self.rows.insert(device, row);
                }
                MenuEntry::Separator => menu.append(&PredefinedMenuItem::separator())?,
            }
        }

        self.menu = menu;
        debug!("Menu tree replaced ({} device rows)", self.rows.len());
        Ok(())
    }

    /// Handle for showing the current tree; `None` without a status item
    pub fn popup(&self) -> Option<MenuPopup> {
        Some(MenuPopup {
            menu: self.menu.clone(),
            status_item: self.tray.ns_status_item()?,
        })
    }

    fn append_child(&mut self, parent: &Submenu, entry: MenuEntry) -> Result<()> {
        match entry {
            MenuEntry::Action { title, action } => parent.append(&action_item(&title, &action))?,
            MenuEntry::DeviceRow(device) => {
                let row = build_row(&device)?;
                parent.append(&row.submenu)?;
                self.rows.insert(device, row);
            }
            MenuEntry::Separator => parent.append(&PredefinedMenuItem::separator())?,
            MenuEntry::Submenu { title, items } => {
                let submenu = Submenu::new(&title, true);
                for item in items {
                    self.append_child(&submenu, item)?;
                }
                parent.append(&submenu)?;
            }
            MenuEntry::NowPlayingPanel => {
                warn!("Now playing panel is only supported at the top level");
            }
        }
        Ok(())
    }

    fn build_panel(&self, menu: &Menu) -> Result<PanelItems> {
        let track = IconMenuItem::new("", false, self.placeholder.clone(), None);
        let artist = MenuItem::new("", false, None);
        let playlist = MenuItem::new("", false, None);
        let play_pause = MenuItem::with_id(
            MenuAction::Transport(Transport::PlayPause).id(),
            "Play",
            true,
            None,
        );
        let next =
            MenuItem::with_id(MenuAction::Transport(Transport::Next).id(), "Next", true, None);
        let previous = MenuItem::with_id(
            MenuAction::Transport(Transport::Previous).id(),
            "Previous",
            true,
            None,
        );
        let volume = VolumeItems::new("Volume", MenuAction::SetMasterVolume)?;

        menu.append(&track)?;
        menu.append(&artist)?;
        menu.append(&playlist)?;
        menu.append(&PredefinedMenuItem::separator())?;
        menu.append(&play_pause)?;
        menu.append(&next)?;
        menu.append(&previous)?;
        menu.append(&volume.submenu)?;
        menu.append(&PredefinedMenuItem::separator())?;

        Ok(PanelItems {
            track,
            artist,
            playlist,
            play_pause,
            volume,
        })
    }

    /// Push a panel display into the menu items
    pub fn render_panel(&self, display: &PanelDisplay) {
        let Some(panel) = &self.panel else {
            return;
        };

        panel.track.set_text(menu_label(&display.title));
        panel.artist.set_text(menu_label(&display.artist));
        panel.playlist.set_text(menu_label(&display.playlist));
        panel.play_pause.set_text(display.play_button.label());
        let title = format!("{} Volume {}%", display.glyph.symbol(), display.volume);
        panel.volume.render(title, display.volume, true);

        let artwork = display
            .artwork
            .as_deref()
            .and_then(|bytes| match artwork::thumbnail(bytes) {
                Ok(thumb) => MenuIcon::from_rgba(thumb.rgba, thumb.width, thumb.height).ok(),
                Err(e) => {
                    debug!("Artwork unusable: {e:#}");
                    None
                }
            });
        panel.track.set_icon(artwork.or_else(|| self.placeholder.clone()));
    }

    /// Push a row display into the device's submenu
    pub fn render_row(&self, device: &AirPlayDeviceInfo, display: &RowDisplay) {
        let Some(row) = self.rows.get(device) else {
            return;
        };

        row.submenu.set_text(&display.title);
        row.enabled.set_checked(display.selected);
        let title = if display.volume_visible {
            format!("{} Volume {}%", display.glyph.symbol(), display.volume)
        } else {
            "Volume".to_string()
        };
        row.volume.render(title, display.volume, display.volume_visible);
    }
}

fn action_item(title: &str, action: &MenuAction) -> MenuItem {
    let accelerator = matches!(action, MenuAction::Quit)
        .then(|| Accelerator::new(Some(Modifiers::SUPER), Code::KeyQ));
    MenuItem::with_id(action.id(), menu_label(title), true, accelerator)
}

fn build_row(device: &AirPlayDeviceInfo) -> Result<RowItems> {
    let submenu = Submenu::new(device.title(), true);
    let toggle = MenuAction::ToggleDevice(device.clone()).id();
    let enabled = CheckMenuItem::with_id(toggle, "Enabled", true, false, None);
    let volume = VolumeItems::new("Volume", |volume| MenuAction::SetDeviceVolume {
        device: device.clone(),
        volume,
    })?;

    submenu.append(&enabled)?;
    submenu.append(&PredefinedMenuItem::separator())?;
    submenu.append(&volume.submenu)?;
    volume.render("Volume".to_string(), 0, false);

    Ok(RowItems {
        submenu,
        enabled,
        volume,
    })
}

fn icon_rgba() -> Result<(Vec<u8>, u32, u32)> {
    let image = image::load_from_memory(ICON_BYTES)
        .context("Failed to load tray icon image")?
        .into_rgba8();
    let (width, height) = image.dimensions();
    Ok((image.into_raw(), width, height))
}
