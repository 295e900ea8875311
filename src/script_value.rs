//! AppleScript value decoding
//!
//! `osascript -s s` prints script results in AppleScript source form, for
//! example `{"Workout", "Chill"}` or `{{"Kitchen", "HomePod"}, {"Mac", "computer"}}`.
//! This module parses that text into a [`ScriptValue`] tree and provides typed
//! extraction through [`FromScriptValue`].

use crate::script_bridge::ScriptError;
use crate::util::truncate;

/// A decoded AppleScript value
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    /// `missing value`
    Missing,
    /// Raw `«data XXXX…»` payload with the four-character type code stripped
    Data(Vec<u8>),
    /// Enumerated constants and object specifiers, kept as printed
    /// (e.g. `playing`, `AirPort Express`, `playlist id 42 of source id 64`)
    Constant(String),
    List(Vec<ScriptValue>),
    Record(Vec<(String, ScriptValue)>),
}

impl ScriptValue {
    /// Short name of the variant, used in mismatch diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Boolean(_) => "boolean",
            Self::Missing => "missing value",
            Self::Data(_) => "data",
            Self::Constant(_) => "constant",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }

    fn preview(&self) -> String {
        let detail = match self {
            Self::Text(s) => format!("{s:?}"),
            Self::Constant(s) => s.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Real(f) => f.to_string(),
            Self::Boolean(b) => b.to_string(),
            Self::List(items) => format!("{} items", items.len()),
            Self::Record(fields) => format!("{} fields", fields.len()),
            Self::Data(bytes) => format!("{} bytes", bytes.len()),
            Self::Missing => return self.kind_name().to_string(),
        };
        format!("{} {}", self.kind_name(), truncate(&detail, 40))
    }
}

fn mismatch(expected: &'static str, found: &ScriptValue) -> ScriptError {
    ScriptError::TypeMismatch {
        expected,
        found: found.preview(),
    }
}

fn malformed(found: &str) -> ScriptError {
    ScriptError::TypeMismatch {
        expected: "AppleScript value",
        found: truncate(found.trim(), 40),
    }
}

// ---------------------------------------------------------------------------
// Source-form parser
// ---------------------------------------------------------------------------

/// Parse the `-s s` output of `osascript`.
///
/// Empty output (a script that returns nothing) decodes to `Missing`.
pub fn parse(input: &str) -> Result<ScriptValue, ScriptError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(ScriptValue::Missing);
    }

    let mut parser = Parser { src: input, pos: 0 };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != input.len() {
        return Err(malformed(parser.rest()));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn value(&mut self) -> Result<ScriptValue, ScriptError> {
        self.skip_ws();
        match self.peek() {
            None => Err(malformed("end of input")),
            Some('"') => self.text().map(ScriptValue::Text),
            Some('{') => self.collection(),
            Some('«') => self.chevron(),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(_) => self.bare(),
        }
    }

    fn text(&mut self) -> Result<String, ScriptError> {
        let start = self.pos;
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(malformed(&self.src[start..])),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => out.push(c),
                    None => return Err(malformed(&self.src[start..])),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<ScriptValue, ScriptError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'E' | 'e'))
        {
            self.bump();
        }
        let token = &self.src[start..self.pos];
        let at_boundary = self
            .peek()
            .map_or(true, |c| c.is_whitespace() || c == ',' || c == '}');

        if at_boundary {
            if let Ok(n) = token.parse::<i64>() {
                return Ok(ScriptValue::Integer(n));
            }
            if let Ok(f) = token.parse::<f64>() {
                return Ok(ScriptValue::Real(f));
            }
        }

        // Something like `3D Touch` - not a number after all
        self.pos = start;
        self.bare()
    }

    /// Bare words: booleans, `missing value`, constants and object specifiers.
    /// Runs to the next top-level `,` or `}`.
    fn bare(&mut self) -> Result<ScriptValue, ScriptError> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut in_text = false;
        while let Some(c) = self.peek() {
            match c {
                '\\' if in_text => {
                    self.bump();
                }
                '"' => in_text = !in_text,
                '{' | '«' if !in_text => depth += 1,
                '»' if !in_text => depth = depth.saturating_sub(1),
                '}' if !in_text => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                }
                ',' if !in_text && depth == 0 => break,
                _ => {}
            }
            self.bump();
        }

        let word = self.src[start..self.pos].trim();
        match word {
            "" => Err(malformed(&self.src[start..])),
            "true" => Ok(ScriptValue::Boolean(true)),
            "false" => Ok(ScriptValue::Boolean(false)),
            "missing value" => Ok(ScriptValue::Missing),
            other => Ok(ScriptValue::Constant(other.to_string())),
        }
    }

    fn collection(&mut self) -> Result<ScriptValue, ScriptError> {
        self.bump(); // {
        self.skip_ws();
        if self.peek() == Some('}') {
            self.bump();
            return Ok(ScriptValue::List(Vec::new()));
        }

        let mut items = Vec::new();
        let mut fields = Vec::new();
        loop {
            self.skip_ws();
            match self.record_label() {
                Some(label) => fields.push((label, self.value()?)),
                None => items.push(self.value()?),
            }
            self.skip_ws();
            match self.bump() {
                Some(',') => {}
                Some('}') => break,
                _ => return Err(malformed(self.rest())),
            }
        }

        match (items.is_empty(), fields.is_empty()) {
            (_, true) => Ok(ScriptValue::List(items)),
            (true, false) => Ok(ScriptValue::Record(fields)),
            (false, false) => Err(malformed("list mixing labelled and unlabelled items")),
        }
    }

    /// Try to read `label:` at the current position; restores on failure.
    fn record_label(&mut self) -> Option<String> {
        let start = self.pos;
        let label = if self.peek() == Some('|') {
            self.bump();
            let inner = self.pos;
            while self.peek().is_some_and(|c| c != '|') {
                self.bump();
            }
            let label = self.src[inner..self.pos].to_string();
            if self.bump().is_none() {
                self.pos = start;
                return None;
            }
            label
        } else {
            if !self.peek().is_some_and(char::is_alphabetic) {
                return None;
            }
            while self
                .peek()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == ' ')
            {
                self.bump();
            }
            self.src[start..self.pos].trim().to_string()
        };

        self.skip_ws();
        if self.peek() == Some(':') && !label.is_empty() {
            self.bump();
            Some(label)
        } else {
            self.pos = start;
            None
        }
    }

    fn chevron(&mut self) -> Result<ScriptValue, ScriptError> {
        let start = self.pos;
        self.bump(); // «
        let inner = self.pos;
        while self.peek().is_some_and(|c| c != '»') {
            self.bump();
        }
        if self.bump().is_none() {
            return Err(malformed(&self.src[start..]));
        }
        let body = &self.src[inner..self.pos - '»'.len_utf8()];

        match body.strip_prefix("data ") {
            // Four-character type code (e.g. `PNGf`, `JPEG`) followed by hex
            Some(payload) if payload.len() >= 4 && payload.is_char_boundary(4) => {
                decode_hex(&payload[4..])
                    .map(ScriptValue::Data)
                    .ok_or_else(|| malformed(body))
            }
            _ => Ok(ScriptValue::Constant(self.src[start..self.pos].to_string())),
        }
    }
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Typed extraction
// ---------------------------------------------------------------------------

/// Types that can be coerced out of a [`ScriptValue`].
pub trait FromScriptValue: Sized {
    fn from_script_value(value: ScriptValue) -> Result<Self, ScriptError>;
}

impl FromScriptValue for ScriptValue {
    fn from_script_value(value: ScriptValue) -> Result<Self, ScriptError> {
        Ok(value)
    }
}

impl FromScriptValue for String {
    fn from_script_value(value: ScriptValue) -> Result<Self, ScriptError> {
        match value {
            ScriptValue::Text(s) | ScriptValue::Constant(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromScriptValue for i64 {
    #[allow(clippy::cast_possible_truncation)]
    fn from_script_value(value: ScriptValue) -> Result<Self, ScriptError> {
        match value {
            ScriptValue::Integer(n) => Ok(n),
            ScriptValue::Real(f) if f.is_finite() => Ok(f.trunc() as i64),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FromScriptValue for bool {
    fn from_script_value(value: ScriptValue) -> Result<Self, ScriptError> {
        match value {
            ScriptValue::Boolean(b) => Ok(b),
            ScriptValue::Integer(n) => Ok(n != 0),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl FromScriptValue for Vec<u8> {
    fn from_script_value(value: ScriptValue) -> Result<Self, ScriptError> {
        match value {
            ScriptValue::Data(bytes) => Ok(bytes),
            other => Err(mismatch("data", &other)),
        }
    }
}

impl<T: FromScriptValue> FromScriptValue for Option<T> {
    fn from_script_value(value: ScriptValue) -> Result<Self, ScriptError> {
        match value {
            ScriptValue::Missing => Ok(None),
            other => T::from_script_value(other).map(Some),
        }
    }
}

macro_rules! tuple_from_list {
    ($len:literal; $($name:ident),+) => {
        impl<$($name: FromScriptValue),+> FromScriptValue for ($($name,)+) {
            fn from_script_value(value: ScriptValue) -> Result<Self, ScriptError> {
                let mut items = match value {
                    ScriptValue::List(items) if items.len() == $len => items.into_iter(),
                    other => return Err(mismatch(concat!("list of ", $len, " items"), &other)),
                };
                Ok(($($name::from_script_value(items.next().unwrap_or(ScriptValue::Missing))?,)+))
            }
        }
    };
}

// device state is a pair, the now-playing row has five fields
tuple_from_list!(2; A, B);
tuple_from_list!(5; A, B, C, D, E);

/// Decode a list result into a sequence of `T`. `missing value` is an empty list.
pub fn list_of<T: FromScriptValue>(value: ScriptValue) -> Result<Vec<T>, ScriptError> {
    match value {
        ScriptValue::List(items) => items.into_iter().map(T::from_script_value).collect(),
        ScriptValue::Missing => Ok(Vec::new()),
        other => Err(mismatch("list", &other)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
