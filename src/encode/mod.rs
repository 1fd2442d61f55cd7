//! Size-bounded message encoding
//!
//! Turns any [`Payload`] into a string no longer than a byte budget:
//! - **Plain** mode: primitives render as text, composites as JSON
//! - **Json** mode: output is always a JSON object; primitives are wrapped
//!   under the default field and top-level arrays are keyed by index
//!
//! Oversized output enters a shrink loop that halves the working string
//! while the encoding is more than twice the budget and then trims one
//! character at a time. The loop is bounded by wall-clock time read from an
//! injectable [`Clock`], and the encoder never fails: every exit path yields
//! a string within budget.

pub mod payload;

pub use payload::{ErrorPayload, ObjectRef, Payload};

use crate::constants::{
    DEFAULT_FIELD, INVALID_MAX_LENGTH_MESSAGE, STRINGIFY_TIMEOUT, STRINGIFY_TIMEOUT_MESSAGE,
};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Output representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Plain,
    Json,
}

impl Mode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            Mode::Json
        } else {
            Mode::Plain
        }
    }
}

/// Source of monotonic time for the shrink deadline
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Clock backed by `Instant::now`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Bounded-size encoder for one output mode
#[derive(Debug, Clone)]
pub struct Encoder {
    mode: Mode,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl Encoder {
    /// Create an encoder with the default 100 ms shrink timeout
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            timeout: STRINGIFY_TIMEOUT,
            clock: Arc::new(SystemClock),
        }
    }

    /// Override the clock used for the shrink deadline
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Encode `value` within `limit` bytes (`None` = unbounded)
    ///
    /// A limit of zero or less yields the invalid-length placeholder.
    pub fn encode(&self, value: &Payload, limit: Option<i64>) -> String {
        let limit = match limit {
            None => return self.full(value),
            Some(l) if l <= 0 => return self.placeholder(INVALID_MAX_LENGTH_MESSAGE),
            Some(l) => usize::try_from(l).unwrap_or(usize::MAX),
        };

        let encoded = self.full(value);
        if encoded.len() <= limit {
            return encoded;
        }

        trace!(len = encoded.len(), limit, "message over budget, shrinking");
        let original = value.primitive_text().unwrap_or(encoded);
        self.shrink(original, limit)
    }

    /// Wrap `text` the way this mode wraps a bare string
    pub fn wrap(&self, text: &str) -> String {
        match self.mode {
            Mode::Plain => text.to_string(),
            Mode::Json => {
                let mut map = Map::new();
                map.insert(DEFAULT_FIELD.into(), Value::String(text.to_string()));
                Value::Object(map).to_string()
            }
        }
    }

    /// Unbounded encoding
    fn full(&self, value: &Payload) -> String {
        match self.mode {
            Mode::Plain => match value.primitive_text() {
                Some(text) => text,
                None => json_text(value.to_json()),
            },
            Mode::Json => {
                if value.is_primitive() {
                    let mut map = Map::new();
                    if let Some(v) = value.to_json() {
                        map.insert(DEFAULT_FIELD.into(), v);
                    }
                    return Value::Object(map).to_string();
                }
                match value.to_json() {
                    Some(Value::Array(items)) => Value::Object(
                        items
                            .into_iter()
                            .enumerate()
                            .map(|(i, v)| (i.to_string(), v))
                            .collect(),
                    )
                    .to_string(),
                    other => json_text(other),
                }
            }
        }
    }

    /// Encode an object of `fields` plus `key: text`, shortening only `text`
    ///
    /// Every key stays present in the output. Returns `None` when the object
    /// does not fit `limit` even with `text` empty.
    pub fn encode_object_field(
        &self,
        fields: &[(&str, &str)],
        key: &str,
        text: &str,
        limit: usize,
    ) -> Option<String> {
        let render = |value: &str| {
            let mut map = Map::new();
            for (k, v) in fields {
                map.insert((*k).to_string(), Value::String((*v).to_string()));
            }
            map.insert(key.to_string(), Value::String(value.to_string()));
            Value::Object(map).to_string()
        };

        if render("").len() > limit {
            return None;
        }
        Some(self.shrink_with(text.to_string(), limit, render))
    }

    fn shrink(&self, original: String, limit: usize) -> String {
        self.shrink_with(original, limit, |text| self.wrap(text))
    }

    /// Halve-then-trim `original` until `render` of it fits `limit`
    fn shrink_with(&self, original: String, limit: usize, render: impl Fn(&str) -> String) -> String {
        let deadline = self.clock.now() + self.timeout;
        let mut working = original;

        loop {
            let encoded = render(&working);
            if encoded.len() <= limit {
                return encoded;
            }
            if working.is_empty() {
                // Even the empty wrapper is over budget
                return self.fit(encoded, limit);
            }
            if self.clock.now() >= deadline {
                trace!(limit, "shrink loop timed out");
                return self.fit(self.placeholder(STRINGIFY_TIMEOUT_MESSAGE), limit);
            }

            if encoded.len() > limit.saturating_mul(2) {
                let half = working.chars().count() / 2;
                truncate_chars(&mut working, half);
            } else {
                working.pop();
            }
        }
    }

    /// Last resort for text that cannot fit: plain text is cut, JSON is
    /// dropped entirely rather than emitted as a broken fragment
    fn fit(&self, text: String, limit: usize) -> String {
        if text.len() <= limit {
            return text;
        }
        match self.mode {
            Mode::Plain => clamp(text, limit),
            Mode::Json => String::new(),
        }
    }

    fn placeholder(&self, text: &str) -> String {
        self.wrap(text)
    }
}

/// Encode `value` with a one-off encoder
pub fn encode(value: &Payload, mode: Mode, limit: Option<i64>) -> String {
    Encoder::new(mode).encode(value, limit)
}

fn json_text(value: Option<Value>) -> String {
    value.unwrap_or(Value::Null).to_string()
}

/// Keep the first `n` characters
fn truncate_chars(s: &mut String, n: usize) {
    if let Some((idx, _)) = s.char_indices().nth(n) {
        s.truncate(idx);
    }
}

/// Cut to at most `limit` bytes on a char boundary
fn clamp(mut s: String, limit: usize) -> String {
    if s.len() > limit {
        let mut idx = limit;
        while !s.is_char_boundary(idx) {
            idx -= 1;
        }
        s.truncate(idx);
    }
    s
}
