//! Telemetry decoding
//!
//! The bridge relays each device message as `{"type":"Buffer","data":[...]}`.
//! A snapshot message carries 13 positional byte fields:
//!
//! | Index | Field |
//! |-------|-------|
//! | 0 | reserved |
//! | 1 | digital input mask (bit 0 = A .. bit 3 = D) |
//! | 2 | distance |
//! | 3 | potentiometer |
//! | 4 | light |
//! | 5, 6 | servo 1, servo 2 (degrees) |
//! | 7..=9 | RGB 1 (r, g, b) |
//! | 10..=12 | RGB 2 (r, g, b) |
//!
//! Fields past index 12 are ignored. A message that is short, non-numeric or
//! out of range is dropped whole; the previous state stays in place.

use crate::constants::*;
use crate::state::{DeviceState, Rgb, Snapshot};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, trace};

/// Result of feeding one bridge message to [`decode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A snapshot was applied to the state
    Snapshot,
    /// Liveness reply; recorded as the last pong
    Pong,
    /// Not usable; state untouched
    Ignored,
}

/// Decode one raw bridge message into `state`
pub fn decode(state: &mut DeviceState, raw: &str) -> DecodeOutcome {
    decode_at(state, raw, Instant::now())
}

/// [`decode`] with an explicit receive time
pub fn decode_at(state: &mut DeviceState, raw: &str, now: Instant) -> DecodeOutcome {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            debug!("Ignoring non-JSON message: {}", e);
            return DecodeOutcome::Ignored;
        }
    };

    let fields = match &value {
        Value::String(s) if s == PONG_TOKEN => {
            state.record_pong(now);
            return DecodeOutcome::Pong;
        }
        Value::Array(fields) => fields,
        Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("Buffer") => {
            match map.get("data") {
                Some(Value::Array(fields)) => fields,
                _ => {
                    debug!("Ignoring envelope without data array");
                    return DecodeOutcome::Ignored;
                }
            }
        }
        _ => {
            debug!("Ignoring unrecognised message shape");
            return DecodeOutcome::Ignored;
        }
    };

    match parse_snapshot(fields) {
        Some(snapshot) => {
            trace!(?snapshot, "Snapshot applied");
            state.apply(snapshot, now);
            DecodeOutcome::Snapshot
        }
        None => {
            debug!("Ignoring malformed snapshot ({} fields)", fields.len());
            DecodeOutcome::Ignored
        }
    }
}

/// Validate the positional fields of a snapshot
pub fn parse_snapshot(fields: &[Value]) -> Option<Snapshot> {
    if fields.len() < SNAPSHOT_LEN {
        return None;
    }

    let mut bytes = [0u8; SNAPSHOT_LEN];
    for (slot, field) in bytes.iter_mut().zip(fields) {
        let value = field.as_u64()?;
        if value > BYTE_MAX as u64 {
            return None;
        }
        *slot = value as u8;
    }

    let servo1 = bytes[IDX_SERVO_1];
    let servo2 = bytes[IDX_SERVO_2];
    if servo1 as i64 > SERVO_MAX_DEGREES || servo2 as i64 > SERVO_MAX_DEGREES {
        return None;
    }

    let rgb_at = |i: usize| Rgb::new(bytes[i], bytes[i + 1], bytes[i + 2]);
    Some(Snapshot {
        digital_mask: bytes[IDX_DIGITAL_MASK],
        distance: bytes[IDX_DISTANCE],
        potentiometer: bytes[IDX_POTENTIOMETER],
        light: bytes[IDX_LIGHT],
        servo1,
        servo2,
        rgb1: rgb_at(IDX_RGB_1),
        rgb2: rgb_at(IDX_RGB_2),
    })
}
