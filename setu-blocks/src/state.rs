//! Consumer-side cache of the device state
//!
//! Written by the telemetry decoder whenever a complete snapshot arrives, and
//! by the command path after a servo or RGB frame was actually transmitted, so
//! repeated blocks see the value they just asked for before the next snapshot.

use crate::error::BlocksError;
use crate::menus::{AnalogChannel, Channel, DigitalInput, Level, RgbId, ServoId};
use std::str::FromStr;
use std::time::Instant;

/// Colour of one RGB output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn channel(&self, channel: Channel) -> u8 {
        match channel {
            Channel::Red => self.r,
            Channel::Green => self.g,
            Channel::Blue => self.b,
        }
    }

    pub fn with_channel(mut self, channel: Channel, value: u8) -> Self {
        match channel {
            Channel::Red => self.r = value,
            Channel::Green => self.g = value,
            Channel::Blue => self.b = value,
        }
        self
    }
}

impl FromStr for Rgb {
    type Err = BlocksError;

    /// Accepts `#rrggbb` or `r,g,b`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || BlocksError::InvalidArgument(format!("bad colour {:?}", s));

        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 {
                return Err(bad());
            }
            let value = u32::from_str_radix(hex, 16).map_err(|_| bad())?;
            let [_, r, g, b] = value.to_be_bytes();
            return Ok(Rgb::new(r, g, b));
        }

        let parts: Vec<u8> = s
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| bad())?;
        match parts[..] {
            [r, g, b] => Ok(Rgb::new(r, g, b)),
            _ => Err(bad()),
        }
    }
}

/// One validated telemetry snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Snapshot {
    pub digital_mask: u8,
    pub distance: u8,
    pub potentiometer: u8,
    pub light: u8,
    /// Degrees, 0..=180
    pub servo1: u8,
    /// Degrees, 0..=180
    pub servo2: u8,
    pub rgb1: Rgb,
    pub rgb2: Rgb,
}

/// Latest known device state plus link liveness
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    snapshot: Snapshot,
    snapshots_applied: u64,
    last_snapshot: Option<Instant>,
    last_pong: Option<Instant>,
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every telemetry field at once
    pub fn apply(&mut self, snapshot: Snapshot, now: Instant) {
        self.snapshot = snapshot;
        self.snapshots_applied += 1;
        self.last_snapshot = Some(now);
    }

    pub fn record_pong(&mut self, now: Instant) {
        self.last_pong = Some(now);
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied
    }

    pub fn last_snapshot(&self) -> Option<Instant> {
        self.last_snapshot
    }

    pub fn last_pong(&self) -> Option<Instant> {
        self.last_pong
    }

    /// Raw bit of `input` in the digital mask
    pub fn input_bit(&self, input: DigitalInput) -> bool {
        self.snapshot.digital_mask & (1 << input.bit()) != 0
    }

    /// Whether `input` is at `level`; inputs are active-low
    pub fn digital_read(&self, input: DigitalInput, level: Level) -> bool {
        let high = self.input_bit(input);
        match level {
            Level::Active => !high,
            Level::Inactive => high,
        }
    }

    pub fn analog(&self, channel: AnalogChannel) -> u8 {
        match channel {
            AnalogChannel::Potentiometer => self.snapshot.potentiometer,
            AnalogChannel::Light => self.snapshot.light,
        }
    }

    pub fn distance(&self) -> u8 {
        self.snapshot.distance
    }

    pub fn servo(&self, id: ServoId) -> u8 {
        match id {
            ServoId::One => self.snapshot.servo1,
            ServoId::Two => self.snapshot.servo2,
        }
    }

    pub fn set_servo(&mut self, id: ServoId, degrees: u8) {
        match id {
            ServoId::One => self.snapshot.servo1 = degrees,
            ServoId::Two => self.snapshot.servo2 = degrees,
        }
    }

    pub fn rgb(&self, id: RgbId) -> Rgb {
        match id {
            RgbId::One => self.snapshot.rgb1,
            RgbId::Two => self.snapshot.rgb2,
        }
    }

    pub fn set_rgb(&mut self, id: RgbId, rgb: Rgb) {
        match id {
            RgbId::One => self.snapshot.rgb1 = rgb,
            RgbId::Two => self.snapshot.rgb2 = rgb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_zeroed() {
        let state = DeviceState::new();
        assert_eq!(*state.snapshot(), Snapshot::default());
        assert_eq!(state.snapshots_applied(), 0);
        assert!(state.last_pong().is_none());
    }

    #[test]
    fn test_digital_inputs_are_active_low() {
        let mut state = DeviceState::new();
        state.apply(
            Snapshot {
                digital_mask: 0b0101,
                ..Snapshot::default()
            },
            Instant::now(),
        );

        assert!(state.input_bit(DigitalInput::A));
        assert!(!state.input_bit(DigitalInput::B));
        assert!(!state.digital_read(DigitalInput::A, Level::Active));
        assert!(state.digital_read(DigitalInput::A, Level::Inactive));
        assert!(state.digital_read(DigitalInput::B, Level::Active));
        assert!(state.digital_read(DigitalInput::D, Level::Active));
    }

    #[test]
    fn test_rgb_parse() {
        assert_eq!("#ff0080".parse::<Rgb>().unwrap(), Rgb::new(255, 0, 128));
        assert_eq!(" 1, 2 ,3".parse::<Rgb>().unwrap(), Rgb::new(1, 2, 3));
        assert!("#fff".parse::<Rgb>().is_err());
        assert!("1,2".parse::<Rgb>().is_err());
        assert!("1,2,256".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_with_channel() {
        let rgb = Rgb::new(1, 2, 3).with_channel(Channel::Green, 200);
        assert_eq!(rgb, Rgb::new(1, 200, 3));
        assert_eq!(rgb.channel(Channel::Green), 200);
    }
}
