//! Protocol constants for the kit firmware

// Frame delimiters
pub const START_SYSEX: u8 = 0xF0;
pub const END_SYSEX: u8 = 0xF7;

// Command IDs
pub const CMD_SET_OUTPUT: u8 = 0xF1;
pub const CMD_SET_SERVO: u8 = 0xF2;
pub const CMD_SET_PWM: u8 = 0xF3;
pub const CMD_SET_ANIMATION: u8 = 0xF4;
pub const CMD_SET_RGB: u8 = 0xF5;
pub const CMD_AUDIO_PLAYER: u8 = 0xF6;

// Animation sub-elements
pub const ANIM_PLAY: u8 = 0xE0; // param: animation index
pub const ANIM_LEDS_ON: u8 = 0xE1; // param: LED count
pub const ANIM_LEDS_SHIFT: u8 = 0xE2; // params: count, direction

// Audio player sub-elements (DFPlayer command codes)
pub const AUDIO_NEXT: u8 = 0x01;
pub const AUDIO_PREVIOUS: u8 = 0x02;
pub const AUDIO_PLAY_TRACK: u8 = 0x03;
pub const AUDIO_VOLUME: u8 = 0x06;
pub const AUDIO_PLAY: u8 = 0x0D;
pub const AUDIO_PAUSE: u8 = 0x0E;

// Snapshot layout (positional fields of a telemetry array)
pub const SNAPSHOT_LEN: usize = 13;
pub const IDX_DIGITAL_MASK: usize = 1;
pub const IDX_DISTANCE: usize = 2;
pub const IDX_POTENTIOMETER: usize = 3;
pub const IDX_LIGHT: usize = 4;
pub const IDX_SERVO_1: usize = 5;
pub const IDX_SERVO_2: usize = 6;
pub const IDX_RGB_1: usize = 7; // r, g, b
pub const IDX_RGB_2: usize = 10; // r, g, b

// Value ranges
pub const SERVO_MAX_DEGREES: i64 = 180;
pub const BYTE_MAX: i64 = 255;

/// Liveness reply relayed by the bridge
pub const PONG_TOKEN: &str = "__pong__";
/// Liveness probe understood by the bridge
pub const PING_TOKEN: &str = "__ping__";
