//! Cryptographic primitives consumed by the signature envelope codec: hashing,
//! modular group arithmetic, key and commitment objects, and the external key
//! directory interface. Nothing here touches the wire format; byte-level
//! encoding of these values lives with the signature codec.

pub mod group;
pub mod hash;
pub mod keys;

pub use group::Group;
pub use hash::{Hash, HASH_LEN};
pub use keys::{
    random_exponent, ClientSecret, Commitment, HostId, HostPrivateKey, HostPublicKey,
    KeyDirectory, SubjectId,
};

/// Upper bound, in bits, on the random exponent drawn for each client
/// signature. The verifier rejects any response exponent wider than this.
/// Must comfortably exceed the combined width of the challenge digest and the
/// secret exponent so that responses stay inside the bound.
pub const RANDOM_EXPONENT_BITS: u64 = 736;
