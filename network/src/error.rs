//! Error types for the **btc-net** crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A consensus-layer error surfaced while decoding a message payload
    /// (a malformed header inside `headers`, a bad varint, and so on).
    #[error(transparent)]
    Core(#[from] btc_core::Error),

    #[error("unrecognized network magic: {0:#010x}")]
    WrongMagic(u32),

    #[error("envelope checksum mismatch")]
    BadChecksum,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("headers message tx count must be zero")]
    HeadersTxsCount,

    #[error("proof of work check failed for header {0}")]
    BadProofOfWork(String),

    #[error("discontinuous header chain at {0}")]
    DiscontinuousChain(String),

    #[error("peer is closed")]
    Closed,
}

pub type Result<T> = core::result::Result<T, Error>;
