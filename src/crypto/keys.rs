use std::fmt;

use base64::Engine;
use num_bigint::{BigUint, RandBigInt};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::crypto::group::Group;
use crate::crypto::hash::Hash;
use crate::crypto::RANDOM_EXPONENT_BITS;
use crate::error::Result;
use crate::timestamp::Timestamp;

/// Identifier of a signing host in the external key directory.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(Vec<u8>);

impl HostId {
    pub fn new(id: impl Into<Vec<u8>>) -> Self {
        HostId(id.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&base64::engine::general_purpose::STANDARD_NO_PAD.encode(&self.0))
    }
}

impl fmt::Debug for HostId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HostId({})", self)
    }
}

/// Identifier of the entity a signed statement is about. Opaque to this layer;
/// the external directory gives it meaning.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(Vec<u8>);

impl SubjectId {
    pub fn new(id: impl Into<Vec<u8>>) -> Self {
        SubjectId(id.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&base64::engine::general_purpose::STANDARD_NO_PAD.encode(&self.0))
    }
}

impl fmt::Debug for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SubjectId({})", self)
    }
}

/// Host verification key: public exponent and modulus for the raw modular
/// exponentiation the host protocol uses. No padding scheme is involved; the
/// signed value is the content digest itself.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct HostPublicKey {
    exponent: BigUint,
    modulus: BigUint,
}

impl HostPublicKey {
    pub fn new(exponent: BigUint, modulus: BigUint) -> Self {
        HostPublicKey { exponent, modulus }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    /// Check a host signature value against a content digest. The digest is
    /// reduced modulo the key's modulus before comparison, since that is all
    /// the signing side can ever reproduce.
    pub fn verify_digest(&self, digest: &Hash, value: &BigUint) -> bool {
        if value >= &self.modulus {
            return false;
        }
        value.modpow(&self.exponent, &self.modulus) == digest.to_biguint() % &self.modulus
    }
}

/// Host signing key. Holds the private exponent; kept separate from
/// [`HostPublicKey`] so signing material never travels with verification
/// material.
#[derive(Clone, Serialize, Deserialize)]
pub struct HostPrivateKey {
    exponent: BigUint,
    modulus: BigUint,
}

impl HostPrivateKey {
    pub fn new(exponent: BigUint, modulus: BigUint) -> Self {
        HostPrivateKey { exponent, modulus }
    }

    /// `digest ^ d mod n`.
    pub fn sign_digest(&self, digest: &Hash) -> BigUint {
        digest.to_biguint().modpow(&self.exponent, &self.modulus)
    }
}

impl fmt::Debug for HostPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HostPrivateKey({} bit modulus)", self.modulus.bits())
    }
}

/// Public commitment to a hidden client secret: the group parameters together
/// with the element `C = g^secret`. Knowledge of the secret exponent is what
/// the client signature protocol proves.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Commitment {
    group: Group,
    value: BigUint,
}

impl Commitment {
    /// Derive the commitment for a secret exponent.
    pub fn from_secret(group: Group, secret: &ClientSecret) -> Self {
        let value = group.pow_generator(&secret.0);
        Commitment { group, value }
    }

    /// Reassemble a commitment from its public parts (the decode path).
    pub fn from_parts(group: Group, value: BigUint) -> Self {
        Commitment { group, value }
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn value(&self) -> &BigUint {
        &self.value
    }
}

/// The secret exponent underlying a [`Commitment`].
#[derive(Clone)]
pub struct ClientSecret(BigUint);

impl ClientSecret {
    pub fn new(secret: BigUint) -> Self {
        ClientSecret(secret)
    }

    pub fn exponent(&self) -> &BigUint {
        &self.0
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("ClientSecret(..)")
    }
}

/// Draw a fresh random exponent of at most [`RANDOM_EXPONENT_BITS`] bits.
/// Every client signature consumes exactly one.
pub fn random_exponent<R: Rng + ?Sized>(rng: &mut R) -> BigUint {
    rng.gen_biguint(RANDOM_EXPONENT_BITS)
}

/// The external key directory consulted during verification. Lookup may block;
/// the signature codec performs exactly one call per verify and never retries,
/// caches, or rate-limits it.
pub trait KeyDirectory {
    /// The public key of `signer` that was valid at `at`.
    fn host_public_key(&self, signer: &HostId, at: Timestamp) -> Result<HostPublicKey>;

    /// Confirm that a commitment's public key belongs to the directory.
    fn validate_commitment(&self, commitment: &Commitment) -> Result<()>;
}
