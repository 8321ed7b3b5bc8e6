//! blockwrap is the wire-encoding and authentication-envelope layer of a
//! decentralized identity protocol. Everything on the wire is a Block: an
//! immutable byte range tagged with a semantic type, sliced without copying
//! and interpreted by a family of codecs.
//!
//! The crate provides:
//!
//! - A canonical form for all encoded data. A given value always encodes to
//!   the same bytes, and wrapper equality is defined over those bytes.
//! - A lazy encode/decode contract ([`Wrapper`]) that separates length
//!   determination from writing, so nested structures are sized once and
//!   filled in place.
//! - A tuple codec ([`TupleWrapper`]) for ordered records with optional and
//!   omittable fields.
//! - A transparent compression codec ([`CompressionWrapper`]) storing its
//!   element as a raw deflate stream.
//! - A signature-envelope codec ([`SignatureWrapper`]) wrapping an arbitrary
//!   block with one of a closed set of authentication schemes: unsigned,
//!   host-signed (modular exponentiation over the content digest), or
//!   client-signed (a non-interactive commitment proof), with a reserved
//!   slot for credential signatures.
//!
//! The semantic type registry, the key directory, and persistent storage are
//! external collaborators reached through the [`TypeSystem`] and
//! [`crypto::KeyDirectory`] interfaces; this crate never loads types, fetches
//! keys, or performs I/O of its own.

mod block;
mod compress;
mod error;
mod signature;
mod timestamp;
mod tuple;
mod types;
mod varint;
mod wrapper;

pub mod crypto;

pub use self::block::Block;
pub use self::compress::CompressionWrapper;
pub use self::error::{Error, Result};
pub use self::signature::{
    ClientSignature, CredentialsSignature, HostSignature, SignatureKind, SignatureWrapper,
    CLIENT_SIGNATURE_MAX_AGE, HOST_SIGNATURE_MAX_AGE, RECENT_SIGNATURE_MAX_AGE,
    SECONDS_PER_YEAR,
};
pub use self::timestamp::{Timestamp, TIMESTAMP_LEN};
pub use self::tuple::TupleWrapper;
pub use self::types::{MapTypeSystem, TypeRef, TypeSystem};
pub use self::wrapper::Wrapper;

/// The maximum size a compressed block may inflate to. Streams that expand
/// past this are rejected as malformed rather than buffered.
pub const MAX_INFLATED_SIZE: usize = 1 << 20; // 1 MiB
