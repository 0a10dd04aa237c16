//! Command frame encoding
//!
//! Every command travels as one fixed 10-byte frame:
//!
//! ```text
//! ┌──────┬─────┬─────┬────┬────┬────┬────┬──────┬────────┬────────┐
//! │ 0xF0 │ CMD │ SUB │ P1 │ P2 │ P3 │ P4 │ 0xF7 │ CRC_HI │ CRC_LO │
//! └──────┴─────┴─────┴────┴────┴────┴────┴──────┴────────┴────────┘
//! └──────────── CRC-16/XMODEM ──────────────┘
//! ```
//!
//! The checksum covers the start marker through the end marker. Parameters are single
//! bytes; values outside `0..=255` wrap (two's complement truncation), so
//! callers range-check what the firmware cannot tolerate.

use crate::constants::*;

/// Total frame length in bytes
pub const FRAME_LEN: usize = 10;

/// Number of parameter slots in a frame
pub const PARAM_SLOTS: usize = 4;

/// Commands understood by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    SetOutput,
    SetServo,
    SetPwm,
    SetAnimation,
    SetRgb,
    AudioPlayer,
}

impl Command {
    /// Wire value of the command byte
    pub const fn byte(self) -> u8 {
        match self {
            Command::SetOutput => CMD_SET_OUTPUT,
            Command::SetServo => CMD_SET_SERVO,
            Command::SetPwm => CMD_SET_PWM,
            Command::SetAnimation => CMD_SET_ANIMATION,
            Command::SetRgb => CMD_SET_RGB,
            Command::AudioPlayer => CMD_AUDIO_PLAYER,
        }
    }
}

/// CRC-16/XMODEM (poly 0x1021, init 0, no reflection, no final XOR)
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// An encoded, checksummed command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    data: [u8; FRAME_LEN],
}

impl Frame {
    #[inline]
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.data
    }

    /// Checksum carried in the last two bytes
    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.data[8], self.data[9]])
    }

    /// Render as the bridge payload: decimal bytes, comma separated
    pub fn to_wire_text(&self) -> String {
        self.data
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Build a frame from a command, sub-element and up to four parameters
///
/// Missing parameters are sent as 0; parameters beyond the fourth are dropped.
pub fn encode(command: Command, sub_element: u8, params: &[i64]) -> Frame {
    let mut data = [0u8; FRAME_LEN];
    data[0] = START_SYSEX;
    data[1] = command.byte();
    data[2] = sub_element;
    for (slot, &value) in data[3..3 + PARAM_SLOTS].iter_mut().zip(params) {
        *slot = value as u8;
    }
    data[7] = END_SYSEX;

    let crc = crc16_xmodem(&data[..8]);
    data[8..10].copy_from_slice(&crc.to_be_bytes());
    Frame { data }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_check_value() {
        assert_eq!(crc16_xmodem(b"123456789"), 0x31C3);
        assert_eq!(crc16_xmodem(&[]), 0);
    }

    #[test]
    fn test_servo_frame() {
        let frame = encode(Command::SetServo, 1, &[90]);
        assert_eq!(
            frame.as_bytes(),
            &[0xF0, 0xF2, 0x01, 90, 0, 0, 0, 0xF7, 0x8B, 0x32]
        );
        assert_eq!(frame.to_wire_text(), "240,242,1,90,0,0,0,247,139,50");
    }

    #[test]
    fn test_known_frames() {
        let rgb = encode(Command::SetRgb, 2, &[255, 0, 128]);
        assert_eq!(rgb.checksum(), 0x6EFF);

        let volume = encode(Command::AudioPlayer, AUDIO_VOLUME, &[20]);
        assert_eq!(volume.checksum(), 0x5C75);

        let fire = encode(Command::SetAnimation, ANIM_PLAY, &[1]);
        assert_eq!(fire.checksum(), 0x1D42);
    }

    #[test]
    fn test_checksum_property_over_inputs() {
        let commands = [
            Command::SetOutput,
            Command::SetServo,
            Command::SetPwm,
            Command::SetAnimation,
            Command::SetRgb,
            Command::AudioPlayer,
        ];
        let param_sets: [&[i64]; 5] = [&[], &[7], &[1, 2, 3, 4], &[300, -1], &[1, 2, 3, 4, 5, 6]];

        for command in commands {
            for sub in [0u8, 1, 2, 0xE2, 0xFF] {
                for params in param_sets {
                    let frame = encode(command, sub, params);
                    let bytes = frame.as_bytes();
                    assert_eq!(bytes.len(), FRAME_LEN);
                    assert_eq!(bytes[0], START_SYSEX);
                    assert_eq!(bytes[7], END_SYSEX);
                    assert_eq!(frame.checksum(), crc16_xmodem(&bytes[..=7]));
                }
            }
        }
    }

    #[test]
    fn test_params_padded_truncated_and_wrapped() {
        let frame = encode(Command::SetOutput, 0, &[300, -1, 5, 6, 7]);
        assert_eq!(&frame.as_bytes()[3..7], &[44, 255, 5, 6]);

        let frame = encode(Command::SetOutput, 0, &[9]);
        assert_eq!(&frame.as_bytes()[3..7], &[9, 0, 0, 0]);
    }
}
