//! Line-oriented driver for the operation set
//!
//! Lets the device be exercised without the visual host. One command per
//! line, e.g. `servo servo1 90`, `rgb rgb2 #00ff00`, `anim fire`.

use crate::error::{BlocksError, Result};
use crate::link::BridgeLink;
use crate::menus::{
    AnalogChannel, Animation, Channel, DigitalInput, Direction, Level, LinkExpectation,
    PlayerControl, RgbId, ServoId,
};
use crate::rate_limit::Clock;
use crate::session::{BlockSession, SendOutcome};
use crate::state::Rgb;
use std::str::FromStr;

pub const HELP: &str = "\
commands:
  servo <servo1|servo2> <degrees>        move servo to an angle
  move <servo1|servo2> <delta>           move servo relative to its angle
  rgb <rgb1|rgb2> <#rrggbb|r,g,b>        set RGB colour
  channel <rgb1|rgb2> <red|green|blue> <percent>
  add <rgb1|rgb2> <red|green|blue> <delta>
  random <rgb1|rgb2>                     random colour
  anim <none|fire|heartbeat|gradient|sinelon|bpm|confetti|glitter>
  leds <count>                           turn on the first N LEDs
  shift <count> <left|right>             shift the LED pattern
  volume <0-30>
  track <n>
  player <play|pause|next|previous>
  pwm <pin> <percent>
  read <a|b|c|d> <active|inactive>
  bit <a|b|c|d>
  analog <pot|light>
  distance
  connected <connected|disconnected>
  state                                  print the cached snapshot
  ping
  help
  quit";

/// One parsed console line
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    ServoWrite(ServoId, i64),
    ServoMove(ServoId, i64),
    SetRgb(RgbId, Rgb),
    SetChannel(RgbId, Channel, f64),
    AddChannel(RgbId, Channel, i64),
    RandomRgb(RgbId),
    Animation(Animation),
    LedsOn(i64),
    ShiftLeds(i64, Direction),
    Volume(i64),
    Track(i64),
    Player(PlayerControl),
    AnalogWrite(u8, f64),
    DigitalRead(DigitalInput, Level),
    InputBit(DigitalInput),
    AnalogRead(AnalogChannel),
    Distance,
    Connected(LinkExpectation),
    State,
    Ping,
    Help,
    Quit,
}

fn arg<T: FromStr>(args: &[&str], index: usize, what: &str) -> Result<T> {
    let raw = args
        .get(index)
        .ok_or_else(|| BlocksError::InvalidArgument(format!("missing {}", what)))?;
    raw.parse()
        .map_err(|_| BlocksError::InvalidArgument(format!("bad {} {:?}", what, raw)))
}

/// Parse one input line; blank lines yield `None`
pub fn parse_line(line: &str) -> Result<Option<ConsoleCommand>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Ok(None);
    };

    use ConsoleCommand as C;
    let command = match verb.to_ascii_lowercase().as_str() {
        "servo" => C::ServoWrite(arg(args, 0, "servo")?, arg(args, 1, "degrees")?),
        "move" => C::ServoMove(arg(args, 0, "servo")?, arg(args, 1, "delta")?),
        "rgb" => {
            // Colour may contain spaces after commas, so take the rest of the line
            let colour = args.get(1..).unwrap_or_default().join("");
            C::SetRgb(arg(args, 0, "output")?, arg(&[colour.as_str()], 0, "colour")?)
        }
        "channel" => C::SetChannel(
            arg(args, 0, "output")?,
            arg(args, 1, "channel")?,
            arg(args, 2, "percent")?,
        ),
        "add" => C::AddChannel(
            arg(args, 0, "output")?,
            arg(args, 1, "channel")?,
            arg(args, 2, "delta")?,
        ),
        "random" => C::RandomRgb(arg(args, 0, "output")?),
        "anim" => C::Animation(arg(args, 0, "animation")?),
        "leds" => C::LedsOn(arg(args, 0, "count")?),
        "shift" => C::ShiftLeds(arg(args, 0, "count")?, arg(args, 1, "direction")?),
        "volume" => C::Volume(arg(args, 0, "volume")?),
        "track" => C::Track(arg(args, 0, "track")?),
        "player" => C::Player(arg(args, 0, "control")?),
        "pwm" => C::AnalogWrite(arg(args, 0, "pin")?, arg(args, 1, "percent")?),
        "read" => C::DigitalRead(arg(args, 0, "input")?, arg(args, 1, "level")?),
        "bit" => C::InputBit(arg(args, 0, "input")?),
        "analog" => C::AnalogRead(arg(args, 0, "channel")?),
        "distance" => C::Distance,
        "connected" => C::Connected(arg(args, 0, "state")?),
        "state" => C::State,
        "ping" => C::Ping,
        "help" | "?" => C::Help,
        "quit" | "exit" => C::Quit,
        other => {
            return Err(BlocksError::InvalidArgument(format!(
                "unknown command {:?} (try `help`)",
                other
            )));
        }
    };
    Ok(Some(command))
}

fn outcome_text(outcome: SendOutcome) -> String {
    match outcome {
        SendOutcome::Sent => "sent".to_string(),
        SendOutcome::RateLimited => "dropped (rate limited)".to_string(),
        SendOutcome::Unchanged => "unchanged".to_string(),
    }
}

/// Run `command` against the session and describe the result
pub fn execute<L: BridgeLink, C: Clock>(
    session: &mut BlockSession<L, C>,
    command: &ConsoleCommand,
) -> Result<String> {
    use ConsoleCommand as Cmd;
    let text = match *command {
        Cmd::ServoWrite(servo, degrees) => outcome_text(session.servo_write(servo, degrees)?),
        Cmd::ServoMove(servo, delta) => outcome_text(session.servo_move(servo, delta)?),
        Cmd::SetRgb(output, color) => outcome_text(session.set_rgb_color(output, color)?),
        Cmd::SetChannel(output, channel, percent) => {
            outcome_text(session.set_rgb_channel(output, channel, percent)?)
        }
        Cmd::AddChannel(output, channel, delta) => {
            outcome_text(session.add_to_rgb_channel(output, channel, delta)?)
        }
        Cmd::RandomRgb(output) => outcome_text(session.random_rgb(output)?),
        Cmd::Animation(animation) => outcome_text(session.start_animation(animation)?),
        Cmd::LedsOn(count) => outcome_text(session.leds_on(count)?),
        Cmd::ShiftLeds(count, direction) => outcome_text(session.shift_leds(count, direction)?),
        Cmd::Volume(volume) => outcome_text(session.set_volume(volume)?),
        Cmd::Track(track) => outcome_text(session.play_track(track)?),
        Cmd::Player(control) => outcome_text(session.control_player(control)?),
        Cmd::AnalogWrite(pin, percent) => outcome_text(session.analog_write(pin, percent)?),
        Cmd::DigitalRead(input, level) => session.digital_read(input, level).to_string(),
        Cmd::InputBit(input) => session.input_bit(input).to_string(),
        Cmd::AnalogRead(channel) => session.analog_read(channel).to_string(),
        Cmd::Distance => session.distance().to_string(),
        Cmd::Connected(expect) => session.is_connected(expect).to_string(),
        Cmd::State => {
            let state = session.state();
            let age = match state.last_snapshot() {
                Some(at) => format!("{} ms ago", at.elapsed().as_millis()),
                None => "never".to_string(),
            };
            format!(
                "{:?} (snapshots: {}, last: {})",
                state.snapshot(),
                state.snapshots_applied(),
                age
            )
        }
        Cmd::Ping => {
            session.ping()?;
            "ping sent".to_string()
        }
        Cmd::Help => HELP.to_string(),
        Cmd::Quit => String::new(),
    };
    Ok(text)
}
