//! WebSocket serving for the bridge

pub mod server;
pub mod wire;

pub use server::{WsServer, WsSink};
pub use wire::{ClientRequest, Envelope, parse_client_payload, pong_message};
