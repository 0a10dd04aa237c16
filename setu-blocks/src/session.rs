//! Host-runtime operation set
//!
//! [`BlockSession`] owns the device state cache, the send gate and the link
//! to the bridge. Every command block maps to one method that builds a single
//! frame. Sensor blocks read the cache, which [`BlockSession::pump`] refreshes
//! from pending bridge messages; the host calls it between blocks, so a
//! command never observes a half-applied snapshot.

use crate::constants::*;
use crate::error::Result;
use crate::frame::{Command, Frame, encode};
use crate::link::BridgeLink;
use crate::menus::{
    AnalogChannel, Animation, Channel, DigitalInput, Direction, Level, LinkExpectation,
    PlayerControl, RgbId, ServoId,
};
use crate::rate_limit::{Clock, RateLimiter, SystemClock};
use crate::state::{DeviceState, Rgb};
use crate::telemetry::{self, DecodeOutcome};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, trace};

/// What happened to a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Frame handed to the bridge
    Sent,
    /// Dropped by the send gate
    RateLimited,
    /// Nothing to do, the device is already there
    Unchanged,
}

/// Map a 0..100 percentage onto a byte, rounded and clamped
pub fn percent_to_byte(percent: f64) -> u8 {
    let scaled = percent * 255.0 / 100.0;
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, 255.0).round() as u8
}

/// Add `delta` to a colour channel, wrapping into 0..=255
///
/// The remainder keeps the sign of the sum and is then made positive, so
/// `250 + 10` gives 4 and `10 - 20` gives 10.
pub fn wrap_channel(value: u8, delta: i64) -> u8 {
    ((value as i64).wrapping_add(delta) % 256).unsigned_abs() as u8
}

fn clamp_servo(degrees: i64) -> u8 {
    degrees.clamp(0, SERVO_MAX_DEGREES) as u8
}

/// One block program's view of the device
pub struct BlockSession<L: BridgeLink, C: Clock = SystemClock> {
    link: L,
    clock: C,
    limiter: RateLimiter,
    state: DeviceState,
}

impl<L: BridgeLink> BlockSession<L> {
    pub fn new(link: L, min_send_interval: Duration) -> Self {
        Self::with_clock(link, min_send_interval, SystemClock)
    }
}

impl<L: BridgeLink, C: Clock> BlockSession<L, C> {
    pub fn with_clock(link: L, min_send_interval: Duration, clock: C) -> Self {
        Self {
            link,
            clock,
            limiter: RateLimiter::new(min_send_interval),
            state: DeviceState::new(),
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Decode every message waiting on the link into the state cache
    ///
    /// Returns the number of snapshots applied.
    pub fn pump(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Some(raw) = self.link.try_recv()? {
            let now = self.clock.now();
            if telemetry::decode_at(&mut self.state, &raw, now) == DecodeOutcome::Snapshot {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Ask the bridge for a liveness reply; not subject to the send gate
    pub fn ping(&mut self) -> Result<()> {
        self.link.send_text(PING_TOKEN)
    }

    fn send(&mut self, frame: Frame) -> Result<SendOutcome> {
        if !self.limiter.try_acquire(self.clock.now()) {
            trace!("Frame dropped by send gate: {:?}", frame.as_bytes());
            return Ok(SendOutcome::RateLimited);
        }
        self.link.send_text(&frame.to_wire_text())?;
        debug!("Sent {:?}", frame.as_bytes());
        Ok(SendOutcome::Sent)
    }

    // ========================================================================
    // Sensor blocks
    // ========================================================================

    pub fn digital_read(&self, input: DigitalInput, level: Level) -> bool {
        self.state.digital_read(input, level)
    }

    pub fn input_bit(&self, input: DigitalInput) -> bool {
        self.state.input_bit(input)
    }

    pub fn analog_read(&self, channel: AnalogChannel) -> u8 {
        self.state.analog(channel)
    }

    pub fn distance(&self) -> u8 {
        self.state.distance()
    }

    /// Compare the link state against the block's expectation
    pub fn is_connected(&self, expect: LinkExpectation) -> bool {
        let open = self.link.is_open();
        match expect {
            LinkExpectation::Connected => open,
            LinkExpectation::Disconnected => !open,
        }
    }

    // ========================================================================
    // Servo blocks
    // ========================================================================

    /// Move a servo to an absolute angle, clamped to 0..=180
    pub fn servo_write(&mut self, servo: ServoId, degrees: i64) -> Result<SendOutcome> {
        self.servo_to(servo, clamp_servo(degrees))
    }

    /// Move a servo relative to its last known angle
    pub fn servo_move(&mut self, servo: ServoId, delta: i64) -> Result<SendOutcome> {
        let current = self.state.servo(servo) as i64;
        self.servo_to(servo, clamp_servo(current.saturating_add(delta)))
    }

    fn servo_to(&mut self, servo: ServoId, target: u8) -> Result<SendOutcome> {
        if self.state.servo(servo) == target {
            return Ok(SendOutcome::Unchanged);
        }
        let frame = encode(Command::SetServo, servo.sub_element(), &[target as i64]);
        let outcome = self.send(frame)?;
        if outcome == SendOutcome::Sent {
            self.state.set_servo(servo, target);
        }
        Ok(outcome)
    }

    // ========================================================================
    // RGB blocks
    // ========================================================================

    pub fn set_rgb_color(&mut self, output: RgbId, color: Rgb) -> Result<SendOutcome> {
        self.rgb_to(output, color)
    }

    /// Set one channel from a 0..100 percentage
    pub fn set_rgb_channel(&mut self, output: RgbId, channel: Channel, percent: f64) -> Result<SendOutcome> {
        let color = self
            .state
            .rgb(output)
            .with_channel(channel, percent_to_byte(percent));
        self.rgb_to(output, color)
    }

    pub fn add_to_rgb_channel(&mut self, output: RgbId, channel: Channel, delta: i64) -> Result<SendOutcome> {
        let current = self.state.rgb(output);
        let value = wrap_channel(current.channel(channel), delta);
        self.rgb_to(output, current.with_channel(channel, value))
    }

    pub fn random_rgb(&mut self, output: RgbId) -> Result<SendOutcome> {
        let mut rng = rand::thread_rng();
        let color = Rgb::new(rng.r#gen(), rng.r#gen(), rng.r#gen());
        self.rgb_to(output, color)
    }

    fn rgb_to(&mut self, output: RgbId, color: Rgb) -> Result<SendOutcome> {
        let frame = encode(
            Command::SetRgb,
            output.sub_element(),
            &[color.r as i64, color.g as i64, color.b as i64],
        );
        let outcome = self.send(frame)?;
        if outcome == SendOutcome::Sent {
            self.state.set_rgb(output, color);
        }
        Ok(outcome)
    }

    // ========================================================================
    // LED strip blocks
    // ========================================================================

    pub fn start_animation(&mut self, animation: Animation) -> Result<SendOutcome> {
        self.send(encode(Command::SetAnimation, ANIM_PLAY, &[animation.index() as i64]))
    }

    pub fn leds_on(&mut self, count: i64) -> Result<SendOutcome> {
        self.send(encode(Command::SetAnimation, ANIM_LEDS_ON, &[count]))
    }

    pub fn shift_leds(&mut self, count: i64, direction: Direction) -> Result<SendOutcome> {
        self.send(encode(
            Command::SetAnimation,
            ANIM_LEDS_SHIFT,
            &[count, direction.param() as i64],
        ))
    }

    // ========================================================================
    // Audio player blocks
    // ========================================================================

    pub fn set_volume(&mut self, volume: i64) -> Result<SendOutcome> {
        self.send(encode(Command::AudioPlayer, AUDIO_VOLUME, &[volume]))
    }

    pub fn play_track(&mut self, track: i64) -> Result<SendOutcome> {
        self.send(encode(Command::AudioPlayer, AUDIO_PLAY_TRACK, &[track]))
    }

    pub fn control_player(&mut self, control: PlayerControl) -> Result<SendOutcome> {
        self.send(encode(Command::AudioPlayer, control.sub_element(), &[0]))
    }

    // ========================================================================
    // PWM output
    // ========================================================================

    /// Drive a PWM pin from a 0..100 percentage
    pub fn analog_write(&mut self, pin: u8, percent: f64) -> Result<SendOutcome> {
        self.send(encode(
            Command::SetPwm,
            pin,
            &[percent_to_byte(percent) as i64],
        ))
    }
}
