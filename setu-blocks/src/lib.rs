//! Setu blocks - block-runtime side of the Setu kit
//!
//! Encodes block operations into checksummed command frames, sends them to
//! the bridge, and keeps a cache of the device state decoded from the
//! telemetry the bridge relays back.
//!
//! ```no_run
//! use setu_blocks::{BlockSession, BlocksConfig, WsLink};
//! use setu_blocks::menus::ServoId;
//!
//! let config = BlocksConfig::default();
//! let link = WsLink::connect(&config.connection)?;
//! let mut session = BlockSession::new(link, config.session.min_send_interval());
//! session.pump()?;
//! session.servo_write(ServoId::One, 90)?;
//! # Ok::<(), setu_blocks::BlocksError>(())
//! ```

pub mod config;
pub mod console;
pub mod constants;
pub mod error;
pub mod frame;
pub mod link;
pub mod menus;
pub mod rate_limit;
pub mod session;
pub mod state;
pub mod telemetry;

pub use config::BlocksConfig;
pub use error::{BlocksError, Result};
pub use frame::{Command, Frame, encode};
pub use link::{BridgeLink, WsLink};
pub use session::{BlockSession, SendOutcome};
pub use state::{DeviceState, Rgb};
pub use telemetry::{DecodeOutcome, decode};
