//! Music Con Menu - status bar agent
//!
//! Runs a winit event loop with no windows. The tray icon and menu live on
//! the main thread; polling and scripting happen on background threads.

#[cfg(target_os = "macos")]
fn main() {
    use log::{error, info};
    use music_con_menu::app::{self, App, UserEvent};
    use music_con_menu::config::Config;
    use music_con_menu::music::MusicFacade;
    use std::sync::Arc;
    use tray_icon::menu::MenuEvent;
    use tray_icon::TrayIconEvent;
    use winit::event_loop::{ControlFlow, EventLoop};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    info!("🎵 Music Con Menu starting on {}...", music_con_menu::platform::name());

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {e:#}");
            std::process::exit(2);
        }
    };

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Wait);

    // Menu selections go through the event loop; tray clicks are handled in
    // place so the menu is rebuilt before it is shown
    let menu_proxy = event_loop.create_proxy();
    MenuEvent::set_event_handler(Some(move |event| {
        let _ = menu_proxy.send_event(UserEvent::Menu(event));
    }));
    TrayIconEvent::set_event_handler(Some(|event: TrayIconEvent| app::on_tray_event(&event)));

    let music = Arc::new(MusicFacade::from_config(&config));
    let mut app = match App::new(&config, music, event_loop.create_proxy()) {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start: {e:#}");
            std::process::exit(1);
        }
    };

    info!("🔄 Running event loop...");
    if let Err(e) = event_loop.run_app(&mut app) {
        error!("Event loop failed: {e}");
    }
}

#[cfg(not(target_os = "macos"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    log::error!(
        "Music Con Menu controls Music.app and only runs on macOS (this is {})",
        music_con_menu::platform::name()
    );
    std::process::exit(1);
}
