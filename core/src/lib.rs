//! **btc-core**: the consensus-critical layers of a Bitcoin protocol
//! implementation, from binary codec primitives up through transaction
//! signing/verification and block-header/Merkle validation.
//!
//! Layers, low to high: [`codec`] and [`bigint`] (L0), [`field`] (L1),
//! [`curve`] and [`keys`] (L2), [`script`], [`tx`], [`block`], and
//! [`merkle`] (L3). [`bloom`] and [`fetch`] are collaborators used by the
//! peer and transaction layers respectively; [`config`] holds per-network
//! constants.

pub mod bigint;
pub mod block;
pub mod bloom;
pub mod codec;
pub mod config;
pub mod curve;
pub mod error;
pub mod fetch;
pub mod field;
pub mod keys;
pub mod merkle;
pub mod script;
pub mod tx;

pub use error::{Error, Result};
