//! Connection configuration.
//!
//! [`HttpConfig`] carries the deadlines, buffer sizes and arena limits shared by
//! every connection of a server, plus the [`Diagnostics`] sink that receives
//! unexpected connection errors. It can be built in code or loaded from JSON:
//!
//! ```
//! use micro_h1::config::HttpConfig;
//! use std::time::Duration;
//!
//! let config = HttpConfig::from_json(r#"{ "read_timeout": "1m30s", "idle_timeout": 5000000000 }"#).unwrap();
//! assert_eq!(config.read_timeout, Duration::from_secs(90));
//! assert_eq!(config.idle_timeout, Duration::from_secs(5));
//! assert_eq!(config.write_timeout, Duration::from_secs(60));
//! ```
//!
//! Durations accept either an integer number of nanoseconds or a string made
//! of decimal numbers with a unit suffix (`ns`, `us`, `µs`, `ms`, `s`, `m`,
//! `h`), such as `"250ms"` or `"1h30m"`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::ensure;
use crate::protocol::HttpError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_BUFFER_SIZE: usize = 2 * 1024;
const DEFAULT_MAX_RETAINED_BUFFER: usize = 64 * 1024;
const DEFAULT_MAX_IDLE_STATES: usize = 1024;
const DEFAULT_MAX_DRAIN_BODY: u64 = 256 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid duration: {value:?}")]
    InvalidDuration { value: String },

    #[error("invalid config json: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl ConfigError {
    pub fn invalid_duration<S: ToString>(value: S) -> Self {
        Self::InvalidDuration { value: value.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Deadline for reading a request head and body, counted from the start
    /// of each request.
    #[serde(with = "duration")]
    pub read_timeout: Duration,

    /// Deadline for writing a response, counted from dispatch.
    #[serde(with = "duration")]
    pub write_timeout: Duration,

    /// How long an idle keep-alive connection waits for the next request.
    #[serde(with = "duration")]
    pub idle_timeout: Duration,

    /// Initial capacity of a connection's read buffer, and the minimum spare
    /// room reserved before each transport read.
    pub read_buffer_size: usize,

    /// Initial capacity of a connection's write buffer. Buffered response
    /// bytes are pushed to the transport once they reach this size.
    pub write_buffer_size: usize,

    /// Buffers larger than this are shrunk back when their state returns to
    /// the arena.
    pub max_retained_buffer: usize,

    /// Upper bound on idle states kept by the arena.
    pub max_idle_states: usize,

    /// Unread request body bytes drained after a response before the
    /// connection is given up instead of reused.
    pub max_drain_body: u64,

    #[serde(skip)]
    pub diagnostics: Diagnostics,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_TIMEOUT,
            write_timeout: DEFAULT_TIMEOUT,
            idle_timeout: DEFAULT_TIMEOUT,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            write_buffer_size: DEFAULT_BUFFER_SIZE,
            max_retained_buffer: DEFAULT_MAX_RETAINED_BUFFER,
            max_idle_states: DEFAULT_MAX_IDLE_STATES,
            max_drain_body: DEFAULT_MAX_DRAIN_BODY,
            diagnostics: Diagnostics::default(),
        }
    }
}

impl HttpConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_buffer_sizes(mut self, read_buffer_size: usize, write_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size;
        self.write_buffer_size = write_buffer_size;
        self
    }

    pub fn with_max_retained_buffer(mut self, size: usize) -> Self {
        self.max_retained_buffer = size;
        self
    }

    pub fn with_max_idle_states(mut self, count: usize) -> Self {
        self.max_idle_states = count;
        self
    }

    pub fn with_max_drain_body(mut self, size: u64) -> Self {
        self.max_drain_body = size;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

type DiagnosticFn = dyn Fn(&HttpError) + Send + Sync;

/// Sink for connection errors that are not part of a normal connection
/// lifecycle. Without a sink, errors are logged with `tracing::error!`.
#[derive(Clone, Default)]
pub struct Diagnostics {
    sink: Option<Arc<DiagnosticFn>>,
}

impl Diagnostics {
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(&HttpError) + Send + Sync + 'static,
    {
        Self { sink: Some(Arc::new(sink)) }
    }

    pub fn report(&self, e: &HttpError) {
        match &self.sink {
            Some(sink) => sink(e),
            None => error!(cause = %e, "http connection error"),
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics").field("custom_sink", &self.sink.is_some()).finish()
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parses a duration string such as `"300ms"`, `"1.5h"` or `"2h45m"`.
///
/// A bare `"0"` is accepted; every other number needs a unit.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let s = input.trim();
    ensure!(!s.is_empty(), ConfigError::invalid_duration(input));
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || ConfigError::invalid_duration(input);
    let mut total: u128 = 0;
    let mut rest = s;

    while !rest.is_empty() {
        let number_end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).ok_or_else(invalid)?;
        let (number, tail) = rest.split_at(number_end);

        let unit_end = tail.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3_600 * NANOS_PER_SEC,
            _ => return Err(invalid()),
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        ensure!(!whole.is_empty() || !fraction.is_empty(), invalid());
        ensure!(fraction.bytes().all(|b| b.is_ascii_digit()), invalid());

        let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
        let mut nanos = whole.checked_mul(scale).ok_or_else(invalid)?;

        // digits beyond nanosecond precision of the largest unit are dropped
        let mut numerator: u128 = 0;
        let mut denominator: u128 = 1;
        for digit in fraction.bytes().take(12) {
            numerator = numerator * 10 + u128::from(digit - b'0');
            denominator *= 10;
        }
        nanos += numerator * scale / denominator;

        total = total.checked_add(nanos).ok_or_else(invalid)?;
        rest = next;
    }

    let secs = u64::try_from(total / NANOS_PER_SEC).map_err(|_| invalid())?;
    let subsec = u32::try_from(total % NANOS_PER_SEC).map_err(|_| invalid())?;
    Ok(Duration::new(secs, subsec))
}

/// Formats a duration the way [`parse_duration`] reads it back.
pub fn format_duration(duration: Duration) -> String {
    if duration.is_zero() {
        return "0s".to_string();
    }
    if duration.subsec_nanos() == 0 {
        return format!("{}s", duration.as_secs());
    }
    if duration.subsec_nanos() % 1_000_000 == 0 {
        return format!("{}ms", duration.as_millis());
    }
    format!("{}ns", duration.as_nanos())
}

mod duration {
    use std::fmt;
    use std::time::Duration;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*duration))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        deserializer.deserialize_any(DurationVisitor)
    }

    struct DurationVisitor;

    impl Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("an integer number of nanoseconds or a duration string like \"60s\"")
        }

        fn visit_u64<E: de::Error>(self, nanos: u64) -> Result<Duration, E> {
            Ok(Duration::from_nanos(nanos))
        }

        fn visit_i64<E: de::Error>(self, nanos: i64) -> Result<Duration, E> {
            u64::try_from(nanos)
                .map(Duration::from_nanos)
                .map_err(|_| E::invalid_value(de::Unexpected::Signed(nanos), &self))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
            super::parse_duration(value).map_err(E::custom)
        }
    }
}
