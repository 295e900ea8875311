//! Scripting bridge to the target application
//!
//! Runs AppleScript through `osascript -s s` and decodes the source-form
//! result with [`crate::script_value`]. Failures are classified into
//! [`ScriptError`] so the facade can log them and carry on.

use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::process::Command;
use std::sync::LazyLock;
use thiserror::Error;

use crate::script_value::{self, FromScriptValue, ScriptValue};

/// Key/value diagnostics reported by the scripting engine
pub type ErrorDetails = BTreeMap<String, String>;

pub const ERROR_MESSAGE_KEY: &str = "NSAppleScriptErrorMessage";
pub const ERROR_NUMBER_KEY: &str = "NSAppleScriptErrorNumber";
pub const ERROR_RANGE_KEY: &str = "NSAppleScriptErrorRange";

/// Failures of a scripted call
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The scripting engine could not be started
    #[error("scripting bridge unavailable: {0}")]
    BridgeUnavailable(String),

    /// The target application rejected or failed the command
    #[error("script execution failed: {}", describe(.0))]
    ExecutionError(ErrorDetails),

    /// The result could not be coerced to the requested shape
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
}

fn describe(details: &ErrorDetails) -> String {
    match (details.get(ERROR_MESSAGE_KEY), details.get(ERROR_NUMBER_KEY)) {
        (Some(message), Some(number)) => format!("{message} ({number})"),
        (Some(message), None) => message.clone(),
        _ => "no details".to_string(),
    }
}

/// Something that can run script source against the target application.
pub trait ScriptBridge: Send + Sync {
    /// Run `source` and return the raw decoded result.
    fn call(&self, source: &str) -> Result<ScriptValue, ScriptError>;

    /// Run `source` and coerce the result to a single `T`.
    fn execute<T: FromScriptValue>(&self, source: &str) -> Result<T, ScriptError>
    where
        Self: Sized,
    {
        T::from_script_value(self.call(source)?)
    }

    /// Run `source` and coerce a list result to a sequence of `T`.
    fn execute_list<T: FromScriptValue>(&self, source: &str) -> Result<Vec<T>, ScriptError>
    where
        Self: Sized,
    {
        script_value::list_of(self.call(source)?)
    }
}

/// Bridge backed by the `osascript` command-line tool
#[derive(Debug, Clone)]
pub struct OsascriptBridge {
    program: String,
}

impl OsascriptBridge {
    pub fn new() -> Self {
        Self::with_program("osascript")
    }

    /// Use a different executable (tests point this at stand-ins)
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for OsascriptBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptBridge for OsascriptBridge {
    fn call(&self, source: &str) -> Result<ScriptValue, ScriptError> {
        // No timeout: a hung call only stalls the worker that issued it
        let output = Command::new(&self.program)
            .args(["-s", "s", "-e", source])
            .output()
            .map_err(|e| ScriptError::BridgeUnavailable(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("osascript failed: {}", stderr.trim());
            return Err(ScriptError::ExecutionError(parse_error_details(&stderr)));
        }

        script_value::parse(&String::from_utf8_lossy(&output.stdout))
    }
}

/// osascript diagnostics look like
/// `0:38: execution error: Music got an error: Can’t get playlist "X". (-1728)`
static OSASCRIPT_ERROR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+:\d+):\s*(?:(?:execution|syntax) error:\s*)?(.*?)(?:\s*\((-?\d+)\))?$")
        .unwrap()
});

/// Split an osascript stderr line into the engine's error dictionary keys.
pub fn parse_error_details(stderr: &str) -> ErrorDetails {
    let mut details = ErrorDetails::new();
    let line = stderr
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .unwrap_or_default();

    if let Some(caps) = OSASCRIPT_ERROR_RE.captures(line) {
        details.insert(ERROR_RANGE_KEY.to_string(), caps[1].to_string());
        details.insert(ERROR_MESSAGE_KEY.to_string(), caps[2].to_string());
        if let Some(number) = caps.get(3) {
            details.insert(ERROR_NUMBER_KEY.to_string(), number.as_str().to_string());
        }
    } else if !line.is_empty() {
        details.insert(ERROR_MESSAGE_KEY.to_string(), line.to_string());
    }

    details
}

/// Render `text` as an AppleScript string literal.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
