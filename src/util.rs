//! Shared helpers: string truncation for menu labels and bounded
//! external-command execution.

use anyhow::{Context, Result};
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

/// Default timeout for short-lived helper commands (`open`)
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest menu label before truncation
pub const MAX_LABEL_CHARS: usize = 48;

// ---------------------------------------------------------------------------
// Unicode-safe string truncation
// ---------------------------------------------------------------------------

/// Truncate a string to at most `max_chars` Unicode characters.
///
/// If truncated, appends "..." so the total character count is ≤ `max_chars`.
/// Never panics on multi-byte characters (unlike byte-index slicing).
pub fn truncate(s: &str, max_chars: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Menu-safe label: single line, at most [`MAX_LABEL_CHARS`]
pub fn menu_label(s: &str) -> String {
    let single_line = s.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate(&single_line, MAX_LABEL_CHARS)
}

// ---------------------------------------------------------------------------
// Command execution with timeout
// ---------------------------------------------------------------------------

/// Run a command with a timeout. Kills the child if it exceeds the deadline.
///
/// Drains stdout/stderr in background threads to avoid pipe-buffer deadlocks.
pub fn run_command_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output> {
    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to spawn command")?;

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_handle {
            std::io::Read::read_to_end(&mut out, &mut buf).ok();
        }
        buf
    });
    let stderr_thread = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_handle {
            std::io::Read::read_to_end(&mut err, &mut buf).ok();
        }
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if Instant::now() >= deadline {
                    child.kill().ok();
                    child.wait().ok();
                    anyhow::bail!("Command timed out after {timeout:?}");
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
