//! **btc-net**: a synchronous, blocking Bitcoin P2P client — envelope
//! framing, message encoding, and a single-peer connection state machine
//! built on top of [`btc_core`]'s consensus types.

pub mod envelope;
pub mod error;
pub mod messages;
pub mod peer;

pub use envelope::{Command, Envelope};
pub use error::{Error, Result};
pub use peer::{Peer, PeerState};
