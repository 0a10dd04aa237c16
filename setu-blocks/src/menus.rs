//! Selector values offered by the block menus
//!
//! Each selector maps to the byte (or bit) the firmware expects. `FromStr`
//! accepts the lower-case names used by the console, e.g. `servo1`, `fire`.

use crate::constants::*;
use crate::error::BlocksError;
use std::str::FromStr;

macro_rules! menu_from_str {
    ($ty:ident { $($name:literal => $variant:ident),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = BlocksError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    other => Err(BlocksError::InvalidArgument(format!(
                        "unknown {} {:?}",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

/// One of the two servo outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoId {
    One,
    Two,
}

impl ServoId {
    pub const fn sub_element(self) -> u8 {
        match self {
            ServoId::One => 1,
            ServoId::Two => 2,
        }
    }
}

menu_from_str!(ServoId { "servo1" => One, "1" => One, "servo2" => Two, "2" => Two });

/// One of the two RGB outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RgbId {
    One,
    Two,
}

impl RgbId {
    pub const fn sub_element(self) -> u8 {
        match self {
            RgbId::One => 1,
            RgbId::Two => 2,
        }
    }
}

menu_from_str!(RgbId { "rgb1" => One, "1" => One, "rgb2" => Two, "2" => Two });

/// Colour channel of an RGB output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

menu_from_str!(Channel { "red" => Red, "r" => Red, "green" => Green, "g" => Green, "blue" => Blue, "b" => Blue });

/// Digital inputs, bits 0..=3 of the snapshot's digital mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitalInput {
    A,
    B,
    C,
    D,
}

impl DigitalInput {
    pub const fn bit(self) -> u8 {
        match self {
            DigitalInput::A => 0,
            DigitalInput::B => 1,
            DigitalInput::C => 2,
            DigitalInput::D => 3,
        }
    }
}

menu_from_str!(DigitalInput { "a" => A, "b" => B, "c" => C, "d" => D });

/// Expected level in a digital-read block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Active,
    Inactive,
}

menu_from_str!(Level { "active" => Active, "on" => Active, "inactive" => Inactive, "off" => Inactive });

/// Analog inputs carried in the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogChannel {
    Potentiometer,
    Light,
}

menu_from_str!(AnalogChannel { "potentiometer" => Potentiometer, "pot" => Potentiometer, "light" => Light });

/// LED strip animations, in firmware index order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Animation {
    None,
    Fire,
    Heartbeat,
    Gradient,
    Sinelon,
    Bpm,
    Confetti,
    Glitter,
}

impl Animation {
    pub const ALL: [Animation; 8] = [
        Animation::None,
        Animation::Fire,
        Animation::Heartbeat,
        Animation::Gradient,
        Animation::Sinelon,
        Animation::Bpm,
        Animation::Confetti,
        Animation::Glitter,
    ];

    /// Parameter sent with the play-animation sub-element
    pub const fn index(self) -> u8 {
        self as u8
    }
}

menu_from_str!(Animation {
    "none" => None,
    "fire" => Fire,
    "heartbeat" => Heartbeat,
    "gradient" => Gradient,
    "sinelon" => Sinelon,
    "bpm" => Bpm,
    "confetti" => Confetti,
    "glitter" => Glitter,
});

/// Shift direction of the LED strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub const fn param(self) -> u8 {
        match self {
            Direction::Left => 0,
            Direction::Right => 1,
        }
    }
}

menu_from_str!(Direction { "left" => Left, "right" => Right });

/// Audio player transport controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerControl {
    Play,
    Pause,
    Next,
    Previous,
}

impl PlayerControl {
    pub const fn sub_element(self) -> u8 {
        match self {
            PlayerControl::Play => AUDIO_PLAY,
            PlayerControl::Pause => AUDIO_PAUSE,
            PlayerControl::Next => AUDIO_NEXT,
            PlayerControl::Previous => AUDIO_PREVIOUS,
        }
    }
}

menu_from_str!(PlayerControl { "play" => Play, "pause" => Pause, "next" => Next, "previous" => Previous, "prev" => Previous });

/// Expected state in a connection-check block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkExpectation {
    Connected,
    Disconnected,
}

menu_from_str!(LinkExpectation { "connected" => Connected, "disconnected" => Disconnected });
