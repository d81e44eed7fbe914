//! Process configuration (C8): a handful of environment variables, parsed
//! once at startup into an immutable `Config`. Grounded on the
//! raw-then-validated two-stage pattern used elsewhere in this workspace's
//! config loaders: read everything as optional strings first, then convert
//! and validate into the typed struct the rest of the crate depends on.

use broker_protocol::{Codec, CodecKind};
use std::env;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bind {
    Tcp { host: String, port: u16 },
    UnixSocket { path: String },
}

/// A fixed UTC offset. The distilled spec's `TIMEZONE` setting only ever
/// affects how a deployment *displays* timestamps elsewhere; the broker
/// itself always schedules and stamps events in epoch seconds (§4.8, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezoneOffset {
    pub offset_seconds: i32,
}

impl TimezoneOffset {
    pub const UTC: TimezoneOffset = TimezoneOffset { offset_seconds: 0 };
}

pub struct Config {
    pub bind: Bind,
    pub read_size: usize,
    pub max_clients: usize,
    pub codec: Arc<dyn Codec>,
    pub timezone: TimezoneOffset,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be a valid {expected}, got {value:?}")]
    InvalidValue {
        field: &'static str,
        expected: &'static str,
        value: Option<String>,
    },
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_env<T: std::str::FromStr>(field: &'static str, expected: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        field,
        expected,
        value: Some(raw),
    })
}

impl Config {
    /// Precedence, resolved once and fatally if inconsistent rather than
    /// falling through silently at bind time (§4.8, an improvement on the
    /// distilled spec's implicit runtime fallback):
    ///
    /// 1. `HOST` and `PORT` both set -> bind TCP.
    /// 2. Otherwise, `UNIX_SOCKET_PATH` set -> bind a Unix domain socket.
    /// 3. Otherwise -> TCP on the documented defaults (`127.0.0.1:9090`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_var("HOST");
        let port = env_var("PORT");
        let unix_socket_path = env_var("UNIX_SOCKET_PATH");

        let bind = match (host, port) {
            (Some(host), Some(port)) => Bind::Tcp {
                host,
                port: parse_env("PORT", "port number", port)?,
            },
            (host, port) => {
                if let Some(path) = unix_socket_path {
                    Bind::UnixSocket { path }
                } else {
                    let host = host.unwrap_or_else(|| "127.0.0.1".to_owned());
                    let port = match port {
                        Some(port) => parse_env("PORT", "port number", port)?,
                        None => 9090,
                    };
                    Bind::Tcp { host, port }
                }
            }
        };

        let read_size = match env_var("READ_SIZE") {
            Some(raw) => parse_env("READ_SIZE", "positive integer", raw)?,
            None => 10_240,
        };

        let max_clients = match env_var("MAX_CLIENTS") {
            Some(raw) => parse_env("MAX_CLIENTS", "positive integer", raw)?,
            None => 512,
        };

        let codec_kind = match env_var("MESSAGE_PARSER_CLASS") {
            Some(raw) if raw.eq_ignore_ascii_case("json") => CodecKind::Json,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    field: "MESSAGE_PARSER_CLASS",
                    expected: "json",
                    value: Some(other),
                })
            }
            None => CodecKind::Json,
        };

        let timezone = match env_var("TIMEZONE") {
            Some(raw) if raw.eq_ignore_ascii_case("utc") => TimezoneOffset::UTC,
            Some(raw) => parse_fixed_offset(&raw).ok_or_else(|| ConfigError::InvalidValue {
                field: "TIMEZONE",
                expected: "UTC or a ±HH:MM offset",
                value: Some(raw.clone()),
            })?,
            None => TimezoneOffset::UTC,
        };

        Ok(Self {
            bind,
            read_size,
            max_clients,
            codec: codec_kind.build(),
            timezone,
        })
    }
}

fn parse_fixed_offset(value: &str) -> Option<TimezoneOffset> {
    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    Some(TimezoneOffset {
        offset_seconds: sign * (hours * 3600 + minutes * 60),
    })
}
