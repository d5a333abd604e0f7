//! Pipe-delimited chat log records.
//!
//! A chat payload looks like
//! `00|2024-01-01T00:00:00.0000000+00:00|0039|System|The party has been disbanded.`
//! and is split into marker, timestamp, hex code, name and line text.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::LineError;

/// Marker field that identifies a chat log record.
pub const LOG_LINE_MARKER: &str = "00";

const FIELD_COUNT: usize = 5;

/// One decoded chat/log record.
///
/// `LogLine::default()` is the zero-value record: code `0`, empty strings.
/// It never classifies to a notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub time: DateTime<FixedOffset>,
    /// Event code, decoded from the hexadecimal code field.
    pub code: i64,
    pub name: String,
    pub line: String,
}

impl LogLine {
    /// Parse a raw chat payload.
    ///
    /// Fields beyond the fifth are ignored. The name and line fields are kept
    /// verbatim.
    pub fn parse(payload: &str) -> Result<Self, LineError> {
        let parts: Vec<&str> = payload.split('|').collect();

        if parts[0] != LOG_LINE_MARKER {
            return Err(LineError::UnrecognizedMarker {
                marker: parts[0].to_string(),
            });
        }
        if parts.len() < FIELD_COUNT {
            return Err(LineError::MissingFields {
                expected: FIELD_COUNT,
                got: parts.len(),
            });
        }

        let time = DateTime::parse_from_rfc3339(parts[1]).map_err(|e| {
            LineError::InvalidTimestamp {
                value: parts[1].to_string(),
                reason: e.to_string(),
            }
        })?;

        let code = parse_hex_code(parts[2]).unwrap_or_else(|| {
            debug!(field = parts[2], "code field has no hex digits, using 0");
            0
        });

        Ok(Self {
            time,
            code,
            name: parts[3].to_string(),
            line: parts[4].to_string(),
        })
    }
}

/// Parse a chat payload, logging and discarding anything that is not a
/// usable record.
pub fn read_log_line(payload: &str) -> Option<LogLine> {
    match LogLine::parse(payload) {
        Ok(line) => Some(line),
        Err(e) if e.is_unrecognized() => {
            trace!(error = %e, "skipping chat payload");
            None
        }
        Err(e) => {
            warn!(error = %e, "failed to parse log line");
            None
        }
    }
}

/// Parse an arbitrary-length hex integer and narrow it to `i64`.
///
/// Digits are read up to the first non-hex character, so `"3g"` is 3 and
/// `"0x39"` is 0. Only the low 64 bits of the magnitude are kept and
/// reinterpreted as two's complement; a leading `-` negates the result with
/// wrapping. Returns `None` when the field has no leading hex digit.
pub fn parse_hex_code(field: &str) -> Option<i64> {
    let (negative, rest) = match field.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, field.strip_prefix('+').unwrap_or(field)),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(rest.len());
    let digits = &rest[..end];
    if digits.is_empty() {
        return None;
    }

    let mut low: u64 = 0;
    for c in digits.chars() {
        let digit = c.to_digit(16)?;
        low = (low << 4) | u64::from(digit);
    }

    let value = low as i64;
    Some(if negative { value.wrapping_neg() } else { value })
}
