//! Background threads: the repeating poll ticker and one-shot workers
//!
//! The ticker only *signals*; it never touches poll state. Each tick is
//! forwarded to the UI thread, which decides whether to start a fetch.

use anyhow::{Context, Result};
use log::{debug, info};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Repeating timer thread. Stops when dropped.
pub struct Ticker {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Call `on_tick` every `interval` until it returns `false` or the
    /// ticker is dropped. The first tick fires one interval after spawn.
    pub fn spawn(
        interval: Duration,
        mut on_tick: impl FnMut() -> bool + Send + 'static,
    ) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("poll-ticker".into())
            .spawn(move || loop {
                match shutdown_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !on_tick() {
                            debug!("Tick receiver gone, ticker exiting");
                            break;
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        info!("Ticker shutting down...");
                        break;
                    }
                }
            })
            .context("Failed to spawn ticker thread")?;

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Run `job` on a short-lived named thread
pub fn spawn_worker(name: &str, job: impl FnOnce() + Send + 'static) -> Result<()> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(job)
        .with_context(|| format!("Failed to spawn {name} worker"))?;
    Ok(())
}
