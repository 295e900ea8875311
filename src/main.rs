//! Music Con Menu - debug probe
//!
//! One-shot dump of what the menu would show: running state, playlists,
//! AirPlay devices and the now-playing snapshot, as JSON on stdout.

use anyhow::{Context, Result};
use log::info;
use music_con_menu::config::Config;
use music_con_menu::music::{MusicControl, MusicFacade};
use music_con_menu::views::VolumeGlyph;
use serde_json::json;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let config = Config::from_env()?;
    let music = MusicFacade::from_config(&config);

    let running = music.is_target_running();
    if running {
        info!("✅ Music.app is running");
    } else {
        info!("⚠️  Music.app is not running, nothing to query");
    }

    let devices: Vec<_> = music
        .list_airplay_devices()
        .into_iter()
        .map(|device| {
            let state = music.device_state(&device.name);
            json!({
                "name": device.name,
                "kind": device.kind,
                "title": device.title(),
                "state": state,
            })
        })
        .collect();

    let now_playing = music.now_playing().map(|snapshot| {
        let has_artwork = snapshot.artwork.is_some();
        let glyph = VolumeGlyph::for_level(snapshot.volume);
        json!({
            "snapshot": snapshot,
            "has_artwork": has_artwork,
            "glyph": glyph,
        })
    });

    let report = json!({
        "platform": music_con_menu::platform::name(),
        "bundle_id": config.bundle_id,
        "poll_interval_secs": config.poll_interval.as_secs(),
        "running": running,
        "playlists": music.list_playlists(),
        "devices": devices,
        "now_playing": now_playing,
    });

    let text = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{text}");
    Ok(())
}
