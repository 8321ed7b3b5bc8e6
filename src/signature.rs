//! Signature envelopes around arbitrary blocks.
//!
//! Every envelope shares one content layout: a 4-slot tuple
//! `(subject, time, element, audit)` nested as slot 0 of an outer 4-slot tuple
//! whose remaining slots hold, in order, the host, client, and credentials
//! signature sub-blocks. At most one signature slot is ever present, and it is
//! present exactly when the content names a subject.
//!
//! A wrapper constructed for signing is trusted by construction and starts
//! verified; a decoded wrapper starts unverified and stays that way until
//! [`verify`](SignatureWrapper::verify) is explicitly called.

use std::fmt;
use std::hash;
use std::sync::atomic::{AtomicBool, Ordering};

use num_bigint::{BigInt, BigUint};
use rand::Rng;

use crate::block::Block;
use crate::crypto::group::{bigint_from_be, bigint_to_be, biguint_from_be, biguint_to_be, Group};
use crate::crypto::{
    random_exponent, ClientSecret, Commitment, Hash, HostId, HostPrivateKey, KeyDirectory,
    SubjectId, RANDOM_EXPONENT_BITS,
};
use crate::error::{Error, Result};
use crate::timestamp::{Timestamp, TIMESTAMP_LEN};
use crate::tuple::TupleWrapper;
use crate::types::{TypeRef, TypeSystem};
use crate::wrapper::Wrapper;

/// Seconds in one tropical year. Staleness windows below are measured in these.
pub const SECONDS_PER_YEAR: i64 = 31_556_925;

/// A host signature older than this fails verification as stale.
pub const HOST_SIGNATURE_MAX_AGE: i64 = 2 * SECONDS_PER_YEAR;

/// A client signature older than this fails verification as stale.
pub const CLIENT_SIGNATURE_MAX_AGE: i64 = SECONDS_PER_YEAR;

/// Operations that demand a fresh signature reject anything older than this,
/// independent of the per-variant staleness windows.
pub const RECENT_SIGNATURE_MAX_AGE: i64 = 30 * 60;

/// Discriminant of the closed signature-variant set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    Unsigned,
    Host,
    Client,
    Credentials,
}

/// Host signature payload: who signed, and the content digest raised to the
/// signer's private exponent.
#[derive(Clone, Debug)]
pub struct HostSignature {
    signer: HostId,
    value: BigUint,
}

impl HostSignature {
    pub fn signer(&self) -> &HostId {
        &self.signer
    }
}

/// Client signature payload: the commitment being proven, the transcript hash
/// `t = Hash(g^r)`, and the response exponent `s = r - secret * h`.
#[derive(Clone, Debug)]
pub struct ClientSignature {
    commitment: Commitment,
    transcript: Hash,
    response: BigInt,
}

impl ClientSignature {
    pub fn commitment(&self) -> &Commitment {
        &self.commitment
    }

    pub fn transcript(&self) -> &Hash {
        &self.transcript
    }
}

/// Credentials signature payload. The variant is part of the closed wire
/// format - its slot is reserved and its bytes round-trip opaquely - but its
/// algebra is not available here, so it can be decoded and re-encoded, never
/// produced or verified.
#[derive(Clone, Debug)]
pub struct CredentialsSignature {
    raw: Block,
}

impl CredentialsSignature {
    pub fn raw(&self) -> &Block {
        &self.raw
    }
}

#[derive(Clone, Debug)]
enum SignatureVariant {
    Unsigned,
    Host(HostSignature),
    Client(ClientSignature),
    Credentials(CredentialsSignature),
}

impl SignatureVariant {
    fn kind(&self) -> SignatureKind {
        match self {
            SignatureVariant::Unsigned => SignatureKind::Unsigned,
            SignatureVariant::Host(_) => SignatureKind::Host,
            SignatureVariant::Client(_) => SignatureKind::Client,
            SignatureVariant::Credentials(_) => SignatureKind::Credentials,
        }
    }
}

// Outer tuple slots
const SLOT_CONTENT: usize = 0;
const SLOT_HOST: usize = 1;
const SLOT_CLIENT: usize = 2;
const SLOT_CREDENTIALS: usize = 3;

// Content tuple slots
const SLOT_SUBJECT: usize = 0;
const SLOT_TIME: usize = 1;
const SLOT_ELEMENT: usize = 2;
const SLOT_AUDIT: usize = 3;

/// An envelope wrapping an arbitrary payload block with one of the closed set
/// of authentication schemes.
pub struct SignatureWrapper {
    outer: TupleWrapper,
    subject: Option<SubjectId>,
    time: Option<Timestamp>,
    element: Option<Block>,
    audit: Option<Block>,
    variant: SignatureVariant,
    content_digest: Hash,
    verified: AtomicBool,
    verify_called: AtomicBool,
}

/// Everything that goes into the content sub-tuple of an envelope.
struct Content {
    subject: Option<SubjectId>,
    time: Option<Timestamp>,
    element: Option<Block>,
    audit: Option<Block>,
}

impl SignatureWrapper {
    /// An envelope carrying no signature and naming no subject. `verify`
    /// trivially succeeds.
    pub fn unsigned(
        kind: TypeRef,
        element: Option<Block>,
        audit: Option<Block>,
        types: &dyn TypeSystem,
    ) -> Result<Self> {
        let content = Content {
            subject: None,
            time: None,
            element,
            audit,
        };
        let content_block = encode_content(&kind, &content, types)?;
        Self::construct(kind, content, content_block, SignatureVariant::Unsigned, types)
    }

    /// Sign content as a host: `value = Hash(content) ^ d mod n`.
    #[allow(clippy::too_many_arguments)]
    pub fn host_signed(
        kind: TypeRef,
        subject: SubjectId,
        time: Timestamp,
        element: Option<Block>,
        audit: Option<Block>,
        signer: HostId,
        key: &HostPrivateKey,
        types: &dyn TypeSystem,
    ) -> Result<Self> {
        let content = Content {
            subject: Some(subject),
            time: Some(time),
            element,
            audit,
        };
        let content_block = encode_content(&kind, &content, types)?;
        let digest = Hash::of(content_block.as_bytes());
        let value = key.sign_digest(&digest);
        let variant = SignatureVariant::Host(HostSignature { signer, value });
        Self::construct(kind, content, content_block, variant, types)
    }

    /// Sign content as a client holding the secret exponent behind
    /// `commitment`. Draws one fresh random exponent `r`, computes
    /// `t = Hash(g^r)`, the challenge `h = t XOR Hash(content)`, and the
    /// response `s = r - secret * h` over the integers.
    #[allow(clippy::too_many_arguments)]
    pub fn client_signed<R: Rng + ?Sized>(
        kind: TypeRef,
        subject: SubjectId,
        time: Timestamp,
        element: Option<Block>,
        audit: Option<Block>,
        commitment: Commitment,
        secret: &ClientSecret,
        rng: &mut R,
        types: &dyn TypeSystem,
    ) -> Result<Self> {
        let content = Content {
            subject: Some(subject),
            time: Some(time),
            element,
            audit,
        };
        let content_block = encode_content(&kind, &content, types)?;
        let digest = Hash::of(content_block.as_bytes());

        let r = random_exponent(rng);
        let group = commitment.group();
        let transcript = Hash::of(&biguint_to_be(&group.pow_generator(&r)));
        let challenge = transcript.xor(&digest).to_biguint();
        let response = BigInt::from(r) - BigInt::from(secret.exponent() * challenge);

        let variant = SignatureVariant::Client(ClientSignature {
            commitment,
            transcript,
            response,
        });
        Self::construct(kind, content, content_block, variant, types)
    }

    /// Decode an envelope. The result is unverified regardless of what the
    /// producer claimed; only [`verify`](Self::verify) can change that.
    pub fn decode(source: Block, types: &dyn TypeSystem) -> Result<Self> {
        let outer = TupleWrapper::decode(source, types)?;
        if outer.len() != 4 {
            return Err(Error::TypeSystem(format!(
                "signature type {} declares {} parameter slots, envelopes require 4",
                outer.block_type(),
                outer.len()
            )));
        }
        // An all-absent content tuple encodes to zero bytes, which the outer
        // tuple can only represent as an absent slot
        let content = match outer.element(SLOT_CONTENT) {
            Some(block) => Some(TupleWrapper::decode(block.clone(), types)?),
            None => None,
        };
        if let Some(content) = &content {
            if content.len() != 4 {
                return Err(Error::TypeSystem(format!(
                    "content type {} declares {} parameter slots, envelopes require 4",
                    content.block_type(),
                    content.len()
                )));
            }
        }
        let content_digest = match &content {
            Some(content) => Hash::of(content.block().as_bytes()),
            None => Hash::of(&[]),
        };

        let subject = content
            .as_ref()
            .and_then(|content| content.element(SLOT_SUBJECT))
            .map(|block| SubjectId::new(block.as_bytes().to_vec()));
        let time = content
            .as_ref()
            .and_then(|content| content.element(SLOT_TIME))
            .map(|block| Timestamp::read(block.as_bytes()))
            .transpose()?;
        let element = content
            .as_ref()
            .and_then(|content| content.element(SLOT_ELEMENT))
            .cloned();
        let audit = content
            .as_ref()
            .and_then(|content| content.element(SLOT_AUDIT))
            .cloned();

        let host = outer.element(SLOT_HOST);
        let client = outer.element(SLOT_CLIENT);
        let credentials = outer.element(SLOT_CREDENTIALS);
        let present = host.is_some() as usize
            + client.is_some() as usize
            + credentials.is_some() as usize;
        if present > 1 {
            return Err(Error::bad_encoding(
                "signature slots",
                format!("{} signature sub-blocks present, at most one allowed", present),
            ));
        }

        let variant = if let Some(block) = host {
            SignatureVariant::Host(decode_host_signature(block.clone(), types)?)
        } else if let Some(block) = client {
            SignatureVariant::Client(decode_client_signature(block.clone(), types)?)
        } else if let Some(block) = credentials {
            SignatureVariant::Credentials(CredentialsSignature { raw: block.clone() })
        } else {
            SignatureVariant::Unsigned
        };

        let signed = !matches!(variant, SignatureVariant::Unsigned);
        if subject.is_some() != signed {
            return Err(Error::bad_encoding(
                "signature content",
                "a subject is named exactly when a signature is present",
            ));
        }
        if time.is_some() != subject.is_some() {
            return Err(Error::bad_encoding(
                "signature content",
                "a time is present exactly when a subject is named",
            ));
        }

        Ok(SignatureWrapper {
            outer,
            subject,
            time,
            element,
            audit,
            variant,
            content_digest,
            verified: AtomicBool::new(false),
            verify_called: AtomicBool::new(false),
        })
    }

    fn construct(
        kind: TypeRef,
        content: Content,
        content_block: Block,
        variant: SignatureVariant,
        types: &dyn TypeSystem,
    ) -> Result<Self> {
        let content_digest = Hash::of(content_block.as_bytes());

        // Zero-byte content is represented as an absent outer slot
        let content_slot = if content_block.is_empty() {
            None
        } else {
            Some(content_block)
        };
        let mut slots: Vec<Option<Block>> = vec![content_slot, None, None, None];
        match &variant {
            SignatureVariant::Unsigned => {}
            SignatureVariant::Host(sig) => {
                slots[SLOT_HOST] = Some(encode_host_signature(&kind, sig, types)?);
            }
            SignatureVariant::Client(sig) => {
                slots[SLOT_CLIENT] = Some(encode_client_signature(&kind, sig, types)?);
            }
            SignatureVariant::Credentials(_) => {
                return Err(Error::UnsupportedVariant("credentials"));
            }
        }
        let outer = TupleWrapper::new(kind, slots, types)?;

        Ok(SignatureWrapper {
            outer,
            subject: content.subject,
            time: content.time,
            element: content.element,
            audit: content.audit,
            variant,
            content_digest,
            // Signing is trusted by construction
            verified: AtomicBool::new(true),
            verify_called: AtomicBool::new(false),
        })
    }

    /// Run the variant's verification algorithm, consulting the external key
    /// directory where the variant requires it. On success the wrapper is
    /// permanently verified; on failure the error is surfaced and the wrapper
    /// stays unverified.
    ///
    /// # Panics
    ///
    /// Panics if called twice on the same wrapper, whichever way the first
    /// call went. One wrapper gets one verification.
    pub fn verify(&self, keys: &dyn KeyDirectory, now: Timestamp) -> Result<()> {
        if self.verify_called.swap(true, Ordering::SeqCst) {
            panic!("verify() called twice on the same signature wrapper");
        }
        match &self.variant {
            SignatureVariant::Unsigned => {}
            SignatureVariant::Host(sig) => self.verify_host(sig, keys, now)?,
            SignatureVariant::Client(sig) => self.verify_client(sig, keys, now)?,
            SignatureVariant::Credentials(_) => {
                return Err(Error::UnsupportedVariant("credentials"));
            }
        }
        self.verified.store(true, Ordering::SeqCst);
        tracing::debug!(kind = ?self.variant.kind(), "signature verified");
        Ok(())
    }

    fn verify_host(
        &self,
        sig: &HostSignature,
        keys: &dyn KeyDirectory,
        now: Timestamp,
    ) -> Result<()> {
        let time = self.time.unwrap(); // Signed wrappers always carry a time
        let age = time.age_seconds(now);
        if age > HOST_SIGNATURE_MAX_AGE {
            return Err(Error::StaleSignature {
                age,
                max_age: HOST_SIGNATURE_MAX_AGE,
            });
        }
        let key = keys.host_public_key(&sig.signer, time)?;
        if !key.verify_digest(&self.content_digest, &sig.value) {
            tracing::debug!(signer = %sig.signer, "host signature rejected");
            return Err(Error::InvalidSignature(
                "host exponentiation result does not match content",
            ));
        }
        Ok(())
    }

    fn verify_client(
        &self,
        sig: &ClientSignature,
        keys: &dyn KeyDirectory,
        now: Timestamp,
    ) -> Result<()> {
        let time = self.time.unwrap(); // Signed wrappers always carry a time
        let age = time.age_seconds(now);
        if age > CLIENT_SIGNATURE_MAX_AGE {
            return Err(Error::StaleSignature {
                age,
                max_age: CLIENT_SIGNATURE_MAX_AGE,
            });
        }
        keys.validate_commitment(&sig.commitment)?;
        if sig.response.bits() > RANDOM_EXPONENT_BITS {
            return Err(Error::InvalidSignature(
                "response exponent exceeds the random exponent bound",
            ));
        }
        // h = t XOR Hash(content); the combination is XOR on the wire, not
        // modular addition
        let challenge = sig.transcript.xor(&self.content_digest).to_biguint();
        let group = sig.commitment.group();
        let Some(base) = group.pow_signed(group.generator(), &sig.response) else {
            return Err(Error::InvalidSignature(
                "generator is not invertible for a negative response",
            ));
        };
        let value = group.mul(&base, &group.pow(sig.commitment.value(), &challenge));
        if Hash::of(&biguint_to_be(&value)) != sig.transcript {
            tracing::debug!("client signature rejected");
            return Err(Error::InvalidSignature(
                "challenge-response does not reproduce the transcript hash",
            ));
        }
        Ok(())
    }

    /// Whether this wrapper and `other` carry the same variant over the same
    /// subject. Payloads are not compared; the authorization layer uses this
    /// to spot repeated or conflicting statements.
    pub fn is_signed_like(&self, other: &SignatureWrapper) -> bool {
        self.variant.kind() == other.variant.kind() && self.subject == other.subject
    }

    /// Enforce the 30-minute freshness window for operations that require it.
    /// Unsigned envelopes carry no time and pass trivially.
    pub fn check_recency(&self, now: Timestamp) -> Result<()> {
        let Some(time) = self.time else { return Ok(()) };
        let age = time.age_seconds(now);
        if age > RECENT_SIGNATURE_MAX_AGE {
            return Err(Error::InactiveSignature {
                age,
                max_age: RECENT_SIGNATURE_MAX_AGE,
            });
        }
        Ok(())
    }

    pub fn kind(&self) -> SignatureKind {
        self.variant.kind()
    }

    pub fn subject(&self) -> Option<&SubjectId> {
        self.subject.as_ref()
    }

    pub fn time(&self) -> Option<Timestamp> {
        self.time
    }

    /// The signed payload, absent for subject-less unsigned-attribute use.
    pub fn element(&self) -> Option<&Block> {
        self.element.as_ref()
    }

    pub fn audit(&self) -> Option<&Block> {
        self.audit.as_ref()
    }

    /// The host signature payload, if this is a host-signed envelope.
    pub fn host_signature(&self) -> Option<&HostSignature> {
        match &self.variant {
            SignatureVariant::Host(sig) => Some(sig),
            _ => None,
        }
    }

    /// The client signature payload, if this is a client-signed envelope.
    pub fn client_signature(&self) -> Option<&ClientSignature> {
        match &self.variant {
            SignatureVariant::Client(sig) => Some(sig),
            _ => None,
        }
    }

    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::SeqCst)
    }
}

impl Wrapper for SignatureWrapper {
    fn block_type(&self) -> &TypeRef {
        self.outer.block_type()
    }

    fn determine_len(&self) -> usize {
        self.outer.determine_len()
    }

    fn encode(&self, target: &mut [u8]) {
        self.outer.encode(target)
    }

    fn block(&self) -> &Block {
        self.outer.block()
    }
}

impl PartialEq for SignatureWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.block() == other.block()
    }
}

impl Eq for SignatureWrapper {}

impl hash::Hash for SignatureWrapper {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.block().hash(state);
    }
}

impl Clone for SignatureWrapper {
    fn clone(&self) -> Self {
        SignatureWrapper {
            outer: self.outer.clone(),
            subject: self.subject.clone(),
            time: self.time,
            element: self.element.clone(),
            audit: self.audit.clone(),
            variant: self.variant.clone(),
            content_digest: self.content_digest,
            verified: AtomicBool::new(self.verified.load(Ordering::SeqCst)),
            verify_called: AtomicBool::new(self.verify_called.load(Ordering::SeqCst)),
        }
    }
}

impl fmt::Debug for SignatureWrapper {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SignatureWrapper")
            .field("kind", &self.variant.kind())
            .field("subject", &self.subject)
            .field("time", &self.time)
            .field("verified", &self.is_verified())
            .finish()
    }
}

fn encode_content(kind: &TypeRef, content: &Content, types: &dyn TypeSystem) -> Result<Block> {
    let content_type = types.parameter(kind, SLOT_CONTENT)?;
    let subject = content
        .subject
        .as_ref()
        .map(|subject| {
            types
                .parameter(&content_type, SLOT_SUBJECT)
                .map(|ty| Block::from_vec(ty, subject.as_bytes().to_vec()))
        })
        .transpose()?;
    let time = content
        .time
        .map(|time| {
            types.parameter(&content_type, SLOT_TIME).map(|ty| {
                let mut buf = vec![0u8; TIMESTAMP_LEN];
                time.write(&mut buf);
                Block::from_vec(ty, buf)
            })
        })
        .transpose()?;
    let tuple = TupleWrapper::new(
        content_type,
        vec![subject, time, content.element.clone(), content.audit.clone()],
        types,
    )?;
    Ok(tuple.block().clone())
}

fn encode_host_signature(
    kind: &TypeRef,
    sig: &HostSignature,
    types: &dyn TypeSystem,
) -> Result<Block> {
    let host_type = types.parameter(kind, SLOT_HOST)?;
    let signer = Block::from_vec(
        types.parameter(&host_type, 0)?,
        sig.signer.as_bytes().to_vec(),
    );
    let value = Block::from_vec(types.parameter(&host_type, 1)?, biguint_to_be(&sig.value));
    let tuple = TupleWrapper::new(host_type, vec![Some(signer), Some(value)], types)?;
    Ok(tuple.block().clone())
}

fn decode_host_signature(source: Block, types: &dyn TypeSystem) -> Result<HostSignature> {
    let tuple = TupleWrapper::decode(source, types)?;
    let signer = HostId::new(tuple.required_element(0)?.as_bytes().to_vec());
    let value = biguint_from_be("host signature value", tuple.required_element(1)?.as_bytes())?;
    Ok(HostSignature { signer, value })
}

fn encode_commitment(
    commitment_type: &TypeRef,
    commitment: &Commitment,
    types: &dyn TypeSystem,
) -> Result<Block> {
    let key_type = types.parameter(commitment_type, 0)?;
    let modulus = Block::from_vec(
        types.parameter(&key_type, 0)?,
        biguint_to_be(commitment.group().modulus()),
    );
    let generator = Block::from_vec(
        types.parameter(&key_type, 1)?,
        biguint_to_be(commitment.group().generator()),
    );
    let key = TupleWrapper::new(key_type, vec![Some(modulus), Some(generator)], types)?;
    let value = Block::from_vec(
        types.parameter(commitment_type, 1)?,
        biguint_to_be(commitment.value()),
    );
    let tuple = TupleWrapper::new(
        commitment_type.clone(),
        vec![Some(key.block().clone()), Some(value)],
        types,
    )?;
    Ok(tuple.block().clone())
}

fn decode_commitment(source: Block, types: &dyn TypeSystem) -> Result<Commitment> {
    let tuple = TupleWrapper::decode(source, types)?;
    let key = TupleWrapper::decode(tuple.required_element(0)?.clone(), types)?;
    let modulus = biguint_from_be("commitment modulus", key.required_element(0)?.as_bytes())?;
    let generator = biguint_from_be("commitment generator", key.required_element(1)?.as_bytes())?;
    let value = biguint_from_be("commitment value", tuple.required_element(1)?.as_bytes())?;
    Ok(Commitment::from_parts(Group::new(modulus, generator)?, value))
}

fn encode_client_signature(
    kind: &TypeRef,
    sig: &ClientSignature,
    types: &dyn TypeSystem,
) -> Result<Block> {
    let client_type = types.parameter(kind, SLOT_CLIENT)?;
    let commitment = encode_commitment(
        &types.parameter(&client_type, 0)?,
        &sig.commitment,
        types,
    )?;
    let transcript = Block::from_vec(
        types.parameter(&client_type, 1)?,
        sig.transcript.as_bytes().to_vec(),
    );
    let response = Block::from_vec(
        types.parameter(&client_type, 2)?,
        bigint_to_be(&sig.response),
    );
    let tuple = TupleWrapper::new(
        client_type,
        vec![Some(commitment), Some(transcript), Some(response)],
        types,
    )?;
    Ok(tuple.block().clone())
}

fn decode_client_signature(source: Block, types: &dyn TypeSystem) -> Result<ClientSignature> {
    let tuple = TupleWrapper::decode(source, types)?;
    let commitment = decode_commitment(tuple.required_element(0)?.clone(), types)?;
    let transcript = Hash::from_bytes(tuple.required_element(1)?.as_bytes())?;
    let response = bigint_from_be("client response", tuple.required_element(2)?.as_bytes())?;
    Ok(ClientSignature {
        commitment,
        transcript,
        response,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::HostPublicKey;
    use crate::types::MapTypeSystem;
    use num_traits::One;

    struct Fixture {
        types: MapTypeSystem,
        sig: TypeRef,
        raw: TypeRef,
        audit: TypeRef,
        client_sig: TypeRef,
        response: TypeRef,
    }

    fn fixture() -> Fixture {
        let mut types = MapTypeSystem::new();
        let raw = types.register("raw");
        let subject_t = types.register("subject");
        let time_t = types.register("time");
        let audit = types.register("audit");
        let signer_t = types.register("signer");
        let value_t = types.register("value");
        let hash_t = types.register("hash");
        let response = types.register("response");
        let modulus_t = types.register("modulus");
        let generator_t = types.register("generator");
        let key_t = types.register_parameterized("client-key", vec![modulus_t, generator_t]);
        let commitment_t =
            types.register_parameterized("commitment", vec![key_t, value_t.clone()]);
        let host_sig_t =
            types.register_parameterized("host-signature", vec![signer_t, value_t]);
        let client_sig = types.register_parameterized(
            "client-signature",
            vec![commitment_t, hash_t, response.clone()],
        );
        let cred_sig_t = types.register("credentials-signature");
        let content_t = types.register_parameterized(
            "signature-content",
            vec![subject_t, time_t, raw.clone(), audit.clone()],
        );
        let sig = types.register_parameterized(
            "signature",
            vec![content_t, host_sig_t, client_sig.clone(), cred_sig_t],
        );
        Fixture {
            types,
            sig,
            raw,
            audit,
            client_sig,
            response,
        }
    }

    struct Directory {
        known: Option<(HostId, HostPublicKey)>,
    }

    impl Directory {
        fn open() -> Self {
            Directory { known: None }
        }

        fn with_host(signer: HostId, key: HostPublicKey) -> Self {
            Directory {
                known: Some((signer, key)),
            }
        }
    }

    impl KeyDirectory for Directory {
        fn host_public_key(&self, signer: &HostId, _at: Timestamp) -> Result<HostPublicKey> {
            match &self.known {
                Some((known, key)) if known == signer => Ok(key.clone()),
                _ => Err(Error::KeyLookup(format!("no key on file for {}", signer))),
            }
        }

        fn validate_commitment(&self, _commitment: &Commitment) -> Result<()> {
            Ok(())
        }
    }

    // e = 3, n = 187 = 11 * 17, d = 107
    fn toy_host_keys() -> (HostPublicKey, HostPrivateKey) {
        let n = BigUint::from(187u32);
        (
            HostPublicKey::new(BigUint::from(3u32), n.clone()),
            HostPrivateKey::new(BigUint::from(107u32), n),
        )
    }

    fn toy_group() -> Group {
        Group::new(BigUint::from(467u32), BigUint::from(2u32)).unwrap()
    }

    fn ts(sec: i64) -> Timestamp {
        Timestamp::from_sec(sec)
    }

    const T0: i64 = 1_700_000_000;

    fn host_wrapper(f: &Fixture, subject: &[u8]) -> (SignatureWrapper, Directory) {
        let (public, private) = toy_host_keys();
        let signer = HostId::new(b"host-1".to_vec());
        let payload = Block::from_vec(f.raw.clone(), b"statement".to_vec());
        let wrapper = SignatureWrapper::host_signed(
            f.sig.clone(),
            SubjectId::new(subject.to_vec()),
            ts(T0),
            Some(payload),
            None,
            signer.clone(),
            &private,
            &f.types,
        )
        .unwrap();
        (wrapper, Directory::with_host(signer, public))
    }

    fn client_wrapper(
        f: &Fixture,
        commitment_secret: &ClientSecret,
        signing_secret: &ClientSecret,
    ) -> SignatureWrapper {
        let commitment = Commitment::from_secret(toy_group(), commitment_secret);
        let payload = Block::from_vec(f.raw.clone(), b"statement".to_vec());
        SignatureWrapper::client_signed(
            f.sig.clone(),
            SubjectId::new(b"alice".to_vec()),
            ts(T0),
            Some(payload),
            None,
            commitment,
            signing_secret,
            &mut rand::thread_rng(),
            &f.types,
        )
        .unwrap()
    }

    #[test]
    fn unsigned_roundtrip() {
        let f = fixture();
        let payload = Block::from_vec(f.raw.clone(), b"attribute".to_vec());
        let audit = Block::from_vec(f.audit.clone(), b"trail".to_vec());
        let wrapper =
            SignatureWrapper::unsigned(f.sig.clone(), Some(payload), Some(audit), &f.types)
                .unwrap();
        assert!(wrapper.is_verified());
        assert_eq!(wrapper.kind(), SignatureKind::Unsigned);

        let decoded = SignatureWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        assert!(!decoded.is_verified());
        assert!(decoded.subject().is_none());
        assert!(decoded.time().is_none());
        assert_eq!(decoded.element().unwrap().as_bytes(), b"attribute");
        assert_eq!(decoded.audit().unwrap().as_bytes(), b"trail");
        decoded.verify(&Directory::open(), ts(T0)).unwrap();
        assert!(decoded.is_verified());
        assert_eq!(decoded, wrapper);
    }

    #[test]
    fn unsigned_empty_envelope() {
        let f = fixture();
        let wrapper = SignatureWrapper::unsigned(f.sig.clone(), None, None, &f.types).unwrap();
        assert_eq!(wrapper.block().len(), 0);
        let decoded = SignatureWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        assert!(decoded.element().is_none());
        assert!(decoded.audit().is_none());
        decoded.verify(&Directory::open(), ts(T0)).unwrap();
        assert_eq!(decoded, wrapper);
    }

    #[test]
    fn host_sign_verify_roundtrip() {
        let f = fixture();
        let (wrapper, directory) = host_wrapper(&f, b"alice");
        assert!(wrapper.is_verified());

        let decoded = SignatureWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        assert!(!decoded.is_verified());
        assert_eq!(decoded.kind(), SignatureKind::Host);
        assert_eq!(decoded.subject().unwrap().as_bytes(), b"alice");
        assert_eq!(decoded.time().unwrap(), ts(T0));
        assert_eq!(decoded.element().unwrap().as_bytes(), b"statement");
        assert_eq!(
            decoded.host_signature().unwrap().signer().as_bytes(),
            b"host-1"
        );
        decoded.verify(&directory, ts(T0 + 3600)).unwrap();
        assert!(decoded.is_verified());
        // Re-encoding reproduces the signed bytes
        assert_eq!(decoded.block().as_bytes(), wrapper.block().as_bytes());
    }

    #[test]
    fn host_value_byte_flip_rejected() {
        let f = fixture();
        let (wrapper, directory) = host_wrapper(&f, b"alice");
        let mut bytes = wrapper.block().as_bytes().to_vec();
        // The exponentiation result is the final byte of the envelope
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let decoded =
            SignatureWrapper::decode(Block::from_vec(f.sig.clone(), bytes), &f.types).unwrap();
        match decoded.verify(&directory, ts(T0 + 3600)) {
            Err(Error::InvalidSignature(_)) => (),
            other => panic!("expected invalid signature, got {:?}", other),
        }
        assert!(!decoded.is_verified());
    }

    #[test]
    fn host_signer_corruption_rejected() {
        let f = fixture();
        let (wrapper, directory) = host_wrapper(&f, b"alice");
        let mut bytes = wrapper.block().as_bytes().to_vec();
        // Layout ends [..signer bytes][1-byte value prefix][1-byte value]; flip
        // the last signer byte
        let idx = bytes.len() - 3;
        bytes[idx] ^= 0xFF;
        let decoded =
            SignatureWrapper::decode(Block::from_vec(f.sig.clone(), bytes), &f.types).unwrap();
        match decoded.verify(&directory, ts(T0 + 3600)) {
            Err(Error::KeyLookup(_)) => (),
            other => panic!("expected key lookup failure, got {:?}", other),
        }
    }

    #[test]
    fn host_staleness_window() {
        let f = fixture();

        let (wrapper, directory) = host_wrapper(&f, b"alice");
        let decoded = SignatureWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        decoded
            .verify(&directory, ts(T0 + HOST_SIGNATURE_MAX_AGE))
            .unwrap();

        let (wrapper, directory) = host_wrapper(&f, b"alice");
        let decoded = SignatureWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        match decoded.verify(&directory, ts(T0 + HOST_SIGNATURE_MAX_AGE + 1)) {
            Err(Error::StaleSignature { .. }) => (),
            other => panic!("expected stale signature, got {:?}", other),
        }
    }

    #[test]
    fn client_sign_verify_roundtrip() {
        let f = fixture();
        let secret = ClientSecret::new(BigUint::from(153u32));
        let wrapper = client_wrapper(&f, &secret, &secret);
        assert!(wrapper.is_verified());

        let decoded = SignatureWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        assert!(!decoded.is_verified());
        assert_eq!(decoded.kind(), SignatureKind::Client);
        let sig = decoded.client_signature().unwrap();
        assert_eq!(sig.commitment().group().modulus(), toy_group().modulus());
        decoded.verify(&Directory::open(), ts(T0 + 3600)).unwrap();
        assert!(decoded.is_verified());
    }

    #[test]
    fn client_wrong_secret_rejected() {
        let f = fixture();
        let committed = ClientSecret::new(BigUint::from(153u32));
        let signing = ClientSecret::new(BigUint::from(99u32));
        let wrapper = client_wrapper(&f, &committed, &signing);
        let decoded = SignatureWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        match decoded.verify(&Directory::open(), ts(T0 + 3600)) {
            Err(Error::InvalidSignature(_)) => (),
            other => panic!("expected invalid signature, got {:?}", other),
        }
    }

    #[test]
    fn client_staleness_window() {
        let f = fixture();
        let secret = ClientSecret::new(BigUint::from(153u32));

        let wrapper = client_wrapper(&f, &secret, &secret);
        let decoded = SignatureWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        decoded
            .verify(&Directory::open(), ts(T0 + CLIENT_SIGNATURE_MAX_AGE))
            .unwrap();

        let wrapper = client_wrapper(&f, &secret, &secret);
        let decoded = SignatureWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        match decoded.verify(&Directory::open(), ts(T0 + CLIENT_SIGNATURE_MAX_AGE + 1)) {
            Err(Error::StaleSignature { .. }) => (),
            other => panic!("expected stale signature, got {:?}", other),
        }
    }

    #[test]
    fn client_response_bound_enforced() {
        let f = fixture();
        let secret = ClientSecret::new(BigUint::from(153u32));
        let wrapper = client_wrapper(&f, &secret, &secret);

        // Pull the envelope apart and widen the response by a multiple of the
        // group's order: the algebra still checks out, the bound must not
        let outer = TupleWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        let content = outer.element(SLOT_CONTENT).unwrap().clone();
        let client = TupleWrapper::decode(
            outer.element(SLOT_CLIENT).unwrap().clone(),
            &f.types,
        )
        .unwrap();
        let response =
            bigint_from_be("test", client.required_element(2).unwrap().as_bytes()).unwrap();
        let widened = &response + BigInt::from(466u32) * (BigInt::one() << 800u32);
        assert!(widened.bits() > RANDOM_EXPONENT_BITS);

        let forged_client = TupleWrapper::new(
            f.client_sig.clone(),
            vec![
                Some(client.required_element(0).unwrap().clone()),
                Some(client.required_element(1).unwrap().clone()),
                Some(Block::from_vec(f.response.clone(), bigint_to_be(&widened))),
            ],
            &f.types,
        )
        .unwrap();
        let forged = TupleWrapper::new(
            f.sig.clone(),
            vec![
                Some(content),
                None,
                Some(forged_client.block().clone()),
                None,
            ],
            &f.types,
        )
        .unwrap();

        let decoded = SignatureWrapper::decode(forged.block().clone(), &f.types).unwrap();
        match decoded.verify(&Directory::open(), ts(T0 + 3600)) {
            Err(Error::InvalidSignature(detail)) => {
                assert!(detail.contains("random exponent bound"))
            }
            other => panic!("expected bound violation, got {:?}", other),
        }
    }

    #[test]
    fn credentials_variant_is_opaque() {
        let f = fixture();
        let (host, _) = host_wrapper(&f, b"alice");
        let outer = TupleWrapper::decode(host.block().clone(), &f.types).unwrap();
        let content = outer.element(SLOT_CONTENT).unwrap().clone();
        let cred_type = f.types.parameter(&f.sig, SLOT_CREDENTIALS).unwrap();
        let cred = Block::from_vec(cred_type, b"opaque credential proof".to_vec());
        let envelope = TupleWrapper::new(
            f.sig.clone(),
            vec![Some(content), None, None, Some(cred)],
            &f.types,
        )
        .unwrap();

        let decoded = SignatureWrapper::decode(envelope.block().clone(), &f.types).unwrap();
        assert_eq!(decoded.kind(), SignatureKind::Credentials);
        assert_eq!(decoded.block().as_bytes(), envelope.block().as_bytes());
        match decoded.verify(&Directory::open(), ts(T0)) {
            Err(Error::UnsupportedVariant("credentials")) => (),
            other => panic!("expected unsupported variant, got {:?}", other),
        }
    }

    #[test]
    fn two_signature_slots_rejected() {
        let f = fixture();
        let (host, _) = host_wrapper(&f, b"alice");
        let secret = ClientSecret::new(BigUint::from(153u32));
        let client = client_wrapper(&f, &secret, &secret);

        let host_outer = TupleWrapper::decode(host.block().clone(), &f.types).unwrap();
        let client_outer = TupleWrapper::decode(client.block().clone(), &f.types).unwrap();
        let both = TupleWrapper::new(
            f.sig.clone(),
            vec![
                Some(host_outer.element(SLOT_CONTENT).unwrap().clone()),
                Some(host_outer.element(SLOT_HOST).unwrap().clone()),
                Some(client_outer.element(SLOT_CLIENT).unwrap().clone()),
                None,
            ],
            &f.types,
        )
        .unwrap();
        match SignatureWrapper::decode(both.block().clone(), &f.types) {
            Err(Error::BadEncoding { step, .. }) => assert_eq!(step, "signature slots"),
            other => panic!("expected malformed encoding, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn subject_without_signature_rejected() {
        let f = fixture();
        let (host, _) = host_wrapper(&f, b"alice");
        let outer = TupleWrapper::decode(host.block().clone(), &f.types).unwrap();
        // Signed content with the signature slot stripped
        let stripped = TupleWrapper::new(
            f.sig.clone(),
            vec![
                Some(outer.element(SLOT_CONTENT).unwrap().clone()),
                None,
                None,
                None,
            ],
            &f.types,
        )
        .unwrap();
        SignatureWrapper::decode(stripped.block().clone(), &f.types).unwrap_err();
    }

    #[test]
    fn signature_without_subject_rejected() {
        let f = fixture();
        let unsigned =
            SignatureWrapper::unsigned(f.sig.clone(), None, None, &f.types).unwrap();
        let (host, _) = host_wrapper(&f, b"alice");
        let host_outer = TupleWrapper::decode(host.block().clone(), &f.types).unwrap();
        let unsigned_outer =
            TupleWrapper::decode(unsigned.block().clone(), &f.types).unwrap();
        let grafted = TupleWrapper::new(
            f.sig.clone(),
            vec![
                unsigned_outer.element(SLOT_CONTENT).cloned(),
                Some(host_outer.element(SLOT_HOST).unwrap().clone()),
                None,
                None,
            ],
            &f.types,
        )
        .unwrap();
        SignatureWrapper::decode(grafted.block().clone(), &f.types).unwrap_err();
    }

    #[test]
    fn recency_window() {
        let f = fixture();
        let (wrapper, _) = host_wrapper(&f, b"alice");
        wrapper
            .check_recency(ts(T0 + RECENT_SIGNATURE_MAX_AGE))
            .unwrap();
        match wrapper.check_recency(ts(T0 + RECENT_SIGNATURE_MAX_AGE + 1)) {
            Err(Error::InactiveSignature { .. }) => (),
            other => panic!("expected inactive signature, got {:?}", other),
        }

        let unsigned =
            SignatureWrapper::unsigned(f.sig.clone(), None, None, &f.types).unwrap();
        unsigned.check_recency(ts(T0 + 10 * SECONDS_PER_YEAR)).unwrap();
    }

    #[test]
    fn signed_alike() {
        let f = fixture();
        let (alice_a, _) = host_wrapper(&f, b"alice");
        let (alice_b, _) = host_wrapper(&f, b"alice");
        let (bob, _) = host_wrapper(&f, b"bob");
        let secret = ClientSecret::new(BigUint::from(153u32));
        let client_alice = client_wrapper(&f, &secret, &secret);

        assert!(alice_a.is_signed_like(&alice_b));
        assert!(!alice_a.is_signed_like(&bob));
        assert!(!alice_a.is_signed_like(&client_alice));
    }

    #[test]
    #[should_panic(expected = "verify() called twice")]
    fn double_verify_panics() {
        let f = fixture();
        let (wrapper, directory) = host_wrapper(&f, b"alice");
        let decoded = SignatureWrapper::decode(wrapper.block().clone(), &f.types).unwrap();
        decoded.verify(&directory, ts(T0 + 3600)).unwrap();
        let _ = decoded.verify(&directory, ts(T0 + 3600));
    }

    #[test]
    fn canonical_block_is_cached() {
        let f = fixture();
        let (wrapper, _) = host_wrapper(&f, b"alice");
        assert!(std::ptr::eq(wrapper.block(), wrapper.block()));
    }
}
