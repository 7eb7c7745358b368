//! Error types for the **btc-core** crate.
//!
//! All fallible parsing, codec, and cryptographic-precondition paths return
//! [`crate::Result`], an alias for `core::result::Result<T, Error>`. Script
//! evaluation, proof-of-work checks, and Merkle-block validation return a
//! plain `bool` verdict instead — a failed verdict is an expected outcome,
//! not an error.

use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Short read, connection error, or other I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed varint, truncated push, bad envelope checksum, or other
    /// structurally invalid wire data.
    #[error("parse error: {0}")]
    Parse(String),

    /// Base58Check checksum did not match the decoded payload.
    #[error("bad address: checksum mismatch")]
    BadAddress,

    /// DER signature violates the SEQUENCE/INTEGER tag structure.
    #[error("bad signature encoding")]
    BadSignature,

    /// DER signature total length did not match its declared length.
    #[error("bad signature length")]
    BadSignatureLength,

    /// A point did not satisfy the curve equation.
    #[error("point not on curve")]
    PointNotOnCurve,

    /// Two points were combined but belong to different (a, b) curves.
    #[error("points on different curves")]
    PointsOnDifferentCurves,

    /// A field element's `num` was outside `[0, prime)`.
    #[error("field element out of range")]
    FieldOutOfRange,

    /// Two field elements were combined but have different moduli.
    #[error("field elements have different moduli")]
    FieldDifferentModulus,

    /// Signing produced a signature that fails immediate reverification.
    #[error("signature produced by signing does not verify")]
    WrongSignature,

    /// Merkle-block partial-tree reconstruction left hashes unconsumed.
    #[error("merkle block: not all hashes were consumed")]
    HashesNotConsumed,

    /// Merkle-block partial-tree reconstruction left a nonzero flag bit
    /// unconsumed.
    #[error("merkle block: not all flag bits were consumed")]
    FlagBitsNotConsumed,

    /// HTTP transaction fetch failed.
    #[error("tx fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Hex decoding failed.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
