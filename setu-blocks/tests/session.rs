//! Operation-set behavior against an in-memory bridge link

use setu_blocks::constants::*;
use setu_blocks::frame::{Command, crc16_xmodem, encode};
use setu_blocks::link::BridgeLink;
use setu_blocks::menus::{
    AnalogChannel, Animation, Channel, DigitalInput, Direction, Level, LinkExpectation,
    PlayerControl, RgbId, ServoId,
};
use setu_blocks::rate_limit::Clock;
use setu_blocks::{BlockSession, BlocksError, Result, Rgb, SendOutcome};
use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct FakeLink {
    sent: Vec<String>,
    inbox: VecDeque<String>,
    closed: bool,
}

impl FakeLink {
    fn frames(&self) -> Vec<Vec<u8>> {
        self.sent
            .iter()
            .filter(|s| s.as_str() != PING_TOKEN)
            .map(|s| s.split(',').map(|b| b.parse().unwrap()).collect())
            .collect()
    }
}

impl BridgeLink for FakeLink {
    fn send_text(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(BlocksError::NotConnected);
        }
        self.sent.push(text.to_string());
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<String>> {
        Ok(self.inbox.pop_front())
    }

    fn is_open(&self) -> bool {
        !self.closed
    }
}

#[derive(Clone)]
struct ManualClock(Rc<Cell<Instant>>);

impl ManualClock {
    fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + Duration::from_millis(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.0.get()
    }
}

fn session() -> (BlockSession<FakeLink, ManualClock>, ManualClock) {
    let clock = ManualClock(Rc::new(Cell::new(Instant::now())));
    let session = BlockSession::with_clock(
        FakeLink::default(),
        Duration::from_millis(5),
        clock.clone(),
    );
    (session, clock)
}

fn feed_snapshot(session: &mut BlockSession<FakeLink, ManualClock>, fields: &[u8]) {
    let data: Vec<String> = fields.iter().map(|b| b.to_string()).collect();
    session
        .link_mut()
        .inbox
        .push_back(format!(r#"{{"type":"Buffer","data":[{}]}}"#, data.join(",")));
}

#[test]
fn sends_inside_window_are_dropped() {
    let (mut session, clock) = session();

    assert_eq!(session.start_animation(Animation::Fire).unwrap(), SendOutcome::Sent);
    clock.advance(3);
    assert_eq!(session.leds_on(4).unwrap(), SendOutcome::RateLimited);
    assert_eq!(session.link().frames().len(), 1);

    clock.advance(3);
    assert_eq!(session.leds_on(4).unwrap(), SendOutcome::Sent);
    assert_eq!(session.link().frames().len(), 2);
}

#[test]
fn sends_at_zero_and_six_ms_both_go_out() {
    let (mut session, clock) = session();
    session.set_volume(10).unwrap();
    clock.advance(6);
    session.set_volume(20).unwrap();

    let frames = session.link().frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[1][3], 20);
}

#[test]
fn every_frame_carries_a_valid_checksum() {
    let (mut session, clock) = session();
    session.servo_write(ServoId::Two, 45).unwrap();
    clock.advance(10);
    session.set_rgb_color(RgbId::One, Rgb::new(1, 2, 3)).unwrap();
    clock.advance(10);
    session.shift_leds(2, Direction::Left).unwrap();
    clock.advance(10);
    session.play_track(7).unwrap();
    clock.advance(10);
    session.control_player(PlayerControl::Pause).unwrap();
    clock.advance(10);
    session.analog_write(3, 50.0).unwrap();

    let frames = session.link().frames();
    assert_eq!(frames.len(), 6);
    for frame in frames {
        assert_eq!(frame.len(), 10);
        assert_eq!(frame[0], START_SYSEX);
        assert_eq!(frame[7], END_SYSEX);
        let crc = u16::from_be_bytes([frame[8], frame[9]]);
        assert_eq!(crc, crc16_xmodem(&frame[..=7]));
    }
}

#[test]
fn servo_frame_wire_text() {
    let (mut session, _) = session();
    session.servo_write(ServoId::One, 90).unwrap();
    assert_eq!(session.link().sent, vec!["240,242,1,90,0,0,0,247,139,50"]);
}

#[test]
fn relative_servo_move_clamps_and_suppresses() {
    let (mut session, clock) = session();
    feed_snapshot(&mut session, &[0, 0, 0, 0, 0, 170, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(session.pump().unwrap(), 1);

    assert_eq!(session.servo_move(ServoId::One, 20).unwrap(), SendOutcome::Sent);
    assert_eq!(session.state().servo(ServoId::One), 180);
    assert_eq!(
        session.link().frames(),
        vec![encode(Command::SetServo, 1, &[180]).as_bytes().to_vec()]
    );

    clock.advance(10);
    assert_eq!(session.servo_move(ServoId::One, 20).unwrap(), SendOutcome::Unchanged);
    assert_eq!(session.link().frames().len(), 1);
}

#[test]
fn servo_write_clamps_negative_and_skips_current_angle() {
    let (mut session, clock) = session();

    assert_eq!(session.servo_write(ServoId::Two, 0).unwrap(), SendOutcome::Unchanged);
    assert_eq!(session.servo_write(ServoId::Two, 500).unwrap(), SendOutcome::Sent);
    clock.advance(10);
    assert_eq!(session.servo_move(ServoId::Two, -400).unwrap(), SendOutcome::Sent);
    assert_eq!(session.state().servo(ServoId::Two), 0);

    let frames = session.link().frames();
    assert_eq!(frames[0][2], 2);
    assert_eq!(frames[0][3], 180);
    assert_eq!(frames[1][3], 0);
}

#[test]
fn rate_limited_servo_keeps_cache() {
    let (mut session, clock) = session();
    session.servo_write(ServoId::One, 10).unwrap();
    clock.advance(1);
    assert_eq!(session.servo_write(ServoId::One, 20).unwrap(), SendOutcome::RateLimited);
    assert_eq!(session.state().servo(ServoId::One), 10);
}

#[test]
fn rgb_increment_wraps() {
    let (mut session, clock) = session();
    feed_snapshot(&mut session, &[0, 0, 0, 0, 0, 0, 0, 250, 100, 5, 0, 0, 0]);
    session.pump().unwrap();

    session.add_to_rgb_channel(RgbId::One, Channel::Red, 10).unwrap();
    assert_eq!(session.state().rgb(RgbId::One), Rgb::new(4, 100, 5));

    clock.advance(10);
    session.add_to_rgb_channel(RgbId::One, Channel::Blue, -20).unwrap();
    assert_eq!(session.state().rgb(RgbId::One), Rgb::new(4, 100, 15));

    let frames = session.link().frames();
    assert_eq!(&frames[0][1..7], &[CMD_SET_RGB, 1, 4, 100, 5, 0]);
    assert_eq!(&frames[1][3..6], &[4, 100, 15]);
}

#[test]
fn rgb_channel_percent_mapping() {
    let (mut session, clock) = session();
    session.set_rgb_channel(RgbId::Two, Channel::Green, 50.0).unwrap();
    clock.advance(10);
    session.set_rgb_channel(RgbId::Two, Channel::Red, 140.0).unwrap();

    assert_eq!(session.state().rgb(RgbId::Two), Rgb::new(255, 128, 0));
    let frames = session.link().frames();
    assert_eq!(&frames[1][2..6], &[2, 255, 128, 0]);
}

#[test]
fn random_rgb_matches_sent_frame() {
    let (mut session, _) = session();
    assert_eq!(session.random_rgb(RgbId::One).unwrap(), SendOutcome::Sent);

    let color = session.state().rgb(RgbId::One);
    let frame = &session.link().frames()[0];
    assert_eq!(&frame[3..6], &[color.r, color.g, color.b]);
}

#[test]
fn led_and_audio_frames() {
    let (mut session, clock) = session();
    session.start_animation(Animation::Glitter).unwrap();
    clock.advance(10);
    session.leds_on(12).unwrap();
    clock.advance(10);
    session.shift_leds(3, Direction::Right).unwrap();
    clock.advance(10);
    session.control_player(PlayerControl::Previous).unwrap();
    clock.advance(10);
    session.play_track(4).unwrap();
    clock.advance(10);
    session.analog_write(5, 100.0).unwrap();

    let frames = session.link().frames();
    assert_eq!(&frames[0][1..4], &[CMD_SET_ANIMATION, ANIM_PLAY, 7]);
    assert_eq!(&frames[1][1..4], &[CMD_SET_ANIMATION, ANIM_LEDS_ON, 12]);
    assert_eq!(&frames[2][1..5], &[CMD_SET_ANIMATION, ANIM_LEDS_SHIFT, 3, 1]);
    assert_eq!(&frames[3][1..4], &[CMD_AUDIO_PLAYER, AUDIO_PREVIOUS, 0]);
    assert_eq!(&frames[4][1..4], &[CMD_AUDIO_PLAYER, AUDIO_PLAY_TRACK, 4]);
    assert_eq!(&frames[5][1..4], &[CMD_SET_PWM, 5, 255]);
}

#[test]
fn short_snapshot_keeps_previous_values() {
    let (mut session, _) = session();
    feed_snapshot(&mut session, &[0, 0b0010, 30, 60, 90, 120, 150, 1, 2, 3, 4, 5, 6]);
    feed_snapshot(&mut session, &[0, 0, 0, 0, 0]);
    assert_eq!(session.pump().unwrap(), 1);

    assert_eq!(session.distance(), 30);
    assert_eq!(session.analog_read(AnalogChannel::Potentiometer), 60);
    assert_eq!(session.analog_read(AnalogChannel::Light), 90);
    assert_eq!(session.state().servo(ServoId::One), 120);
    assert_eq!(session.state().servo(ServoId::Two), 150);
    assert_eq!(session.state().rgb(RgbId::Two), Rgb::new(4, 5, 6));
    assert!(session.input_bit(DigitalInput::B));
    assert!(session.digital_read(DigitalInput::A, Level::Active));
    assert!(!session.digital_read(DigitalInput::B, Level::Active));
}

#[test]
fn ping_and_pong() {
    let (mut session, _) = session();
    session.ping().unwrap();
    session.ping().unwrap();
    assert_eq!(session.link().sent, vec![PING_TOKEN, PING_TOKEN]);

    session.link_mut().inbox.push_back("\"__pong__\"".to_string());
    assert_eq!(session.pump().unwrap(), 0);
    assert!(session.state().last_pong().is_some());
}

#[test]
fn connection_checks_and_closed_link() {
    let (mut session, _) = session();
    assert!(session.is_connected(LinkExpectation::Connected));
    assert!(!session.is_connected(LinkExpectation::Disconnected));

    session.link_mut().closed = true;
    assert!(session.is_connected(LinkExpectation::Disconnected));
    assert!(matches!(
        session.set_volume(5),
        Err(BlocksError::NotConnected)
    ));
}

#[test]
fn console_lines_drive_the_session() {
    use setu_blocks::console::{execute, parse_line};

    let (mut session, clock) = session();
    let mut run = |line: &str| {
        let command = parse_line(line).unwrap().unwrap();
        let text = execute(&mut session, &command).unwrap();
        clock.advance(10);
        text
    };

    assert_eq!(run("servo servo1 90"), "sent");
    assert_eq!(run("servo servo1 90"), "unchanged");
    assert_eq!(run("rgb rgb2 10, 20, 30"), "sent");
    assert_eq!(run("connected connected"), "true");
    assert_eq!(run("read a active"), "true");
    assert_eq!(run("ping"), "ping sent");
    assert!(run("state").ends_with("last: never)"));

    assert_eq!(session.state().rgb(RgbId::Two), Rgb::new(10, 20, 30));
    assert_eq!(session.link().sent.len(), 3);
    assert_eq!(session.link().sent[0], "240,242,1,90,0,0,0,247,139,50");
}

#[test]
fn rgb_same_colour_is_sent_again() {
    let (mut session, clock) = session();
    let color = Rgb::new(10, 20, 30);
    assert_eq!(session.set_rgb_color(RgbId::One, color).unwrap(), SendOutcome::Sent);
    clock.advance(10);
    assert_eq!(session.set_rgb_color(RgbId::One, color).unwrap(), SendOutcome::Sent);
    assert_eq!(session.link().frames().len(), 2);
}
