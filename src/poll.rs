//! Playlist/device polling and change detection
//!
//! [`PollingController`] owns the single [`PollState`] of the process. A timer
//! asks it whether to poll ([`PollingController::should_poll`]); the fetch
//! runs on a worker and its [`PollFetch`] comes back to the UI thread through
//! [`PollingController::apply_fetch`], which compares the fetched collections
//! as sets against the cache and raises the dirty flag on any change.
//!
//! The flag is only cleared by the menu-open handler in [`crate::menu`].

use log::debug;
use std::collections::HashSet;
use std::hash::Hash;

use crate::music::MusicControl;
use crate::AirPlayDeviceInfo;

/// Result of one background fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollFetch {
    pub playlists: Vec<String>,
    pub devices: Vec<AirPlayDeviceInfo>,
}

impl PollFetch {
    /// Read both lists from the target application. Blocking; run off the UI thread.
    pub fn fetch(music: &dyn MusicControl) -> Self {
        let devices = music.list_airplay_devices();
        let playlists = music.list_playlists();
        Self { playlists, devices }
    }
}

/// Process-wide poll/menu state
#[derive(Debug, Clone, Default)]
pub struct PollState {
    /// Running state observed at the last menu open (or at launch)
    pub is_app_running: bool,
    /// Cached playlist names, fetched order, duplicates collapsed
    pub playlists: Vec<String>,
    /// Cached devices, fetched order, duplicates collapsed
    pub devices: Vec<AirPlayDeviceInfo>,
    pub is_dirty: bool,
    pub is_menu_open: bool,
}

/// Owner of [`PollState`] and its mutation entry points
#[derive(Debug)]
pub struct PollingController {
    state: PollState,
}

impl PollingController {
    /// Initialise from the launch-time probe and, when running, an initial fetch.
    pub fn new(is_app_running: bool, initial: Option<PollFetch>) -> Self {
        let initial = initial.unwrap_or_default();
        Self {
            state: PollState {
                is_app_running,
                playlists: dedup(initial.playlists),
                devices: dedup(initial.devices),
                is_dirty: false,
                is_menu_open: false,
            },
        }
    }

    /// Probe `music` synchronously and fetch the lists if it is running
    pub fn launch(music: &dyn MusicControl) -> Self {
        let running = music.is_target_running();
        let initial = running.then(|| PollFetch::fetch(music));
        Self::new(running, initial)
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Timer guard: poll only while the menu is closed and the target runs.
    ///
    /// `is_target_running` is not consulted while the menu is open.
    pub fn should_poll(&self, is_target_running: impl FnOnce() -> bool) -> bool {
        if self.state.is_menu_open {
            debug!("Menu open, skipping poll");
            return false;
        }
        is_target_running()
    }

    /// Fold a completed fetch into the cache. Returns whether anything changed.
    ///
    /// A fetch that completes after the menu opened still lands here; it only
    /// marks the cache dirty and the next open rebuilds.
    pub fn apply_fetch(&mut self, fetch: PollFetch) -> bool {
        let mut changed = false;

        if !same_set(&fetch.devices, &self.state.devices) {
            debug!(
                "AirPlay devices changed: {} -> {}",
                self.state.devices.len(),
                fetch.devices.len()
            );
            self.state.devices = dedup(fetch.devices);
            changed = true;
        }
        if !same_set(&fetch.playlists, &self.state.playlists) {
            debug!(
                "Playlists changed: {} -> {}",
                self.state.playlists.len(),
                fetch.playlists.len()
            );
            self.state.playlists = dedup(fetch.playlists);
            changed = true;
        }

        if changed {
            self.state.is_dirty = true;
        }
        changed
    }

    /// Record the menu opening and consume the dirty flag.
    ///
    /// Returns whether the menu must be rebuilt: the cache changed, or the
    /// target's running state differs from the last observation.
    pub fn open_menu(&mut self, is_target_running: bool) -> bool {
        self.state.is_menu_open = true;
        let dirty = self.state.is_dirty || is_target_running != self.state.is_app_running;
        self.state.is_dirty = false;
        self.state.is_app_running = is_target_running;
        dirty
    }

    pub fn close_menu(&mut self) {
        self.state.is_menu_open = false;
    }
}

fn same_set<T: Eq + Hash>(a: &[T], b: &[T]) -> bool {
    a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
}

fn dedup<T: Eq + Hash + Clone>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::music::fakes::{FakeBridge, FakeProbe};
    use crate::music::MusicFacade;
    use crate::DeviceKind;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn controller(playlists: &[&str], devices: Vec<AirPlayDeviceInfo>) -> PollingController {
        PollingController::new(
            true,
            Some(PollFetch {
                playlists: names(playlists),
                devices,
            }),
        )
    }

    fn facade(bridge: FakeBridge, running: bool) -> MusicFacade<FakeBridge, FakeProbe> {
        MusicFacade::new(bridge, FakeProbe::running(running), &Config::default())
    }

    #[test]
    fn test_launch_not_running_fetches_nothing() {
        let music = facade(FakeBridge::default(), false);
        let poll = PollingController::launch(&music);

        assert!(!poll.state().is_app_running);
        assert!(poll.state().playlists.is_empty());
        assert!(music.bridge().calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_launch_running_fetches_initial_lists() {
        let music = facade(
            FakeBridge::default()
                .reply("every playlist", r#"{"Library", "Chill", "Library"}"#)
                .reply("AirPlay devices", r#"{{"Kitchen", "HomePod"}}"#),
            true,
        );
        let poll = PollingController::launch(&music);

        assert!(poll.state().is_app_running);
        assert!(!poll.state().is_dirty);
        assert_eq!(poll.state().playlists, names(&["Library", "Chill"]));
        assert_eq!(
            poll.state().devices,
            vec![AirPlayDeviceInfo::new("Kitchen", DeviceKind::HomePod)]
        );
    }

    #[test]
    fn test_reordered_playlists_not_dirty() {
        let mut poll = controller(&["Workout", "Chill"], Vec::new());
        let changed = poll.apply_fetch(PollFetch {
            playlists: names(&["Chill", "Workout"]),
            devices: Vec::new(),
        });
        assert!(!changed);
        assert!(!poll.state().is_dirty);
        assert_eq!(poll.state().playlists, names(&["Workout", "Chill"]));
    }

    #[test]
    fn test_duplicate_playlists_not_dirty() {
        let mut poll = controller(&["Workout", "Chill"], Vec::new());
        assert!(!poll.apply_fetch(PollFetch {
            playlists: names(&["Chill", "Workout", "Chill"]),
            devices: Vec::new(),
        }));
    }

    #[test]
    fn test_added_device_is_dirty() {
        let living_room = AirPlayDeviceInfo::new("Living Room", DeviceKind::HomePod);
        let bedroom = AirPlayDeviceInfo::new("Bedroom", DeviceKind::AppleTV);
        let mut poll = controller(&[], vec![living_room.clone()]);

        assert!(poll.apply_fetch(PollFetch {
            playlists: Vec::new(),
            devices: vec![living_room.clone(), bedroom.clone()],
        }));
        assert!(poll.state().is_dirty);
        assert_eq!(poll.state().devices, vec![living_room, bedroom]);
    }

    #[test]
    fn test_device_kind_change_is_dirty() {
        let mut poll = controller(&[], vec![AirPlayDeviceInfo::new("Den", DeviceKind::AppleTV)]);
        assert!(poll.apply_fetch(PollFetch {
            playlists: Vec::new(),
            devices: vec![AirPlayDeviceInfo::new("Den", DeviceKind::TV)],
        }));
    }

    #[test]
    fn test_cache_keeps_first_occurrence_order() {
        let mut poll = PollingController::new(true, None);
        poll.apply_fetch(PollFetch {
            playlists: names(&["B", "A", "B", "C"]),
            devices: Vec::new(),
        });
        assert_eq!(poll.state().playlists, names(&["B", "A", "C"]));
    }

    #[test]
    fn test_should_poll_guards() {
        let mut poll = PollingController::new(false, None);
        assert!(!poll.should_poll(|| false));
        assert!(poll.should_poll(|| true));

        poll.open_menu(true);
        let mut probed = false;
        assert!(!poll.should_poll(|| {
            probed = true;
            true
        }));
        assert!(!probed, "running probe must not run while the menu is open");

        poll.close_menu();
        assert!(poll.should_poll(|| true));
    }

    #[test]
    fn test_open_clears_dirty() {
        let mut poll = controller(&["A"], Vec::new());
        poll.apply_fetch(PollFetch {
            playlists: names(&["A", "B"]),
            devices: Vec::new(),
        });

        assert!(poll.open_menu(true));
        assert!(!poll.state().is_dirty);
        assert!(poll.state().is_menu_open);

        poll.close_menu();
        assert!(!poll.open_menu(true), "nothing changed since last open");
    }

    #[test]
    fn test_running_transition_is_dirty() {
        let mut poll = PollingController::new(false, None);
        assert!(poll.open_menu(true));
        poll.close_menu();
        assert!(!poll.open_menu(true));
        poll.close_menu();
        assert!(poll.open_menu(false));
    }

    #[test]
    fn test_fetch_while_open_marks_dirty_for_next_open() {
        let mut poll = controller(&["A"], Vec::new());
        assert!(!poll.open_menu(true));

        // late completion of a tick started before the menu opened
        poll.apply_fetch(PollFetch {
            playlists: names(&["A", "B"]),
            devices: Vec::new(),
        });
        assert!(poll.state().is_dirty);
        assert!(poll.state().is_menu_open);

        poll.close_menu();
        assert!(poll.open_menu(true));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::DeviceKind;
    use proptest::prelude::*;

    fn device_strategy() -> impl Strategy<Value = AirPlayDeviceInfo> {
        ("[A-D]", 0usize..DeviceKind::ALL.len())
            .prop_map(|(name, kind)| AirPlayDeviceInfo::new(name, DeviceKind::ALL[kind]))
    }

    proptest! {
        #[test]
        fn prop_set_equal_playlists_never_dirty(
            cached in prop::collection::vec("[a-e]{1,3}", 0..8),
            extra in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
            seed in any::<u64>(),
        ) {
            let initial = PollFetch {
                playlists: cached.clone(),
                devices: Vec::new(),
            };
            let mut poll = PollingController::new(true, Some(initial));

            // same set: shuffled copy plus repeats of existing members
            let mut fetched = cached.clone();
            if !cached.is_empty() {
                fetched.extend(extra.iter().map(|i| cached[i.index(cached.len())].clone()));
            }
            let len = fetched.len();
            if len > 1 {
                fetched.rotate_left(usize::try_from(seed % len as u64).unwrap());
            }

            let changed = poll.apply_fetch(PollFetch {
                playlists: fetched,
                devices: Vec::new(),
            });
            prop_assert!(!changed);
            prop_assert!(!poll.state().is_dirty);
        }

        #[test]
        fn prop_device_difference_always_dirty(
            cached in prop::collection::vec(device_strategy(), 0..6),
            fetched in prop::collection::vec(device_strategy(), 0..6),
        ) {
            let cached_set: HashSet<_> = cached.iter().cloned().collect();
            let fetched_set: HashSet<_> = fetched.iter().cloned().collect();
            let initial = PollFetch {
                playlists: Vec::new(),
                devices: cached,
            };
            let mut poll = PollingController::new(true, Some(initial));

            let changed = poll.apply_fetch(PollFetch { playlists: Vec::new(), devices: fetched });
            prop_assert_eq!(changed, cached_set != fetched_set);
            prop_assert_eq!(poll.state().is_dirty, cached_set != fetched_set);
        }

        #[test]
        fn prop_never_dirty_after_open(
            fetches in prop::collection::vec(prop::collection::vec("[a-c]", 0..4), 0..6),
            running in any::<bool>(),
        ) {
            let mut poll = PollingController::new(true, None);
            for playlists in fetches {
                poll.apply_fetch(PollFetch { playlists, devices: Vec::new() });
            }
            poll.open_menu(running);
            prop_assert!(!poll.state().is_dirty);
        }
    }
}
