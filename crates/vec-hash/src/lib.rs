//! Hash computation and object identity for vec.
//!
//! Every stored object is addressed by the SHA-256 of its framed payload
//! `"<kind> <len>\0<body>"`. This crate provides the core `ObjectId` type,
//! streaming hash computation, and hex encoding/decoding.

mod error;
pub mod hasher;
pub mod hex;
mod oid;

pub use error::HashError;
pub use hasher::Hasher;
pub use oid::ObjectId;

/// Length of a raw digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Length of the hex representation.
pub const HEX_LEN: usize = DIGEST_LEN * 2;

/// Minimum hex prefix length accepted for partial-hash lookup.
pub const MIN_PREFIX_LEN: usize = 4;
