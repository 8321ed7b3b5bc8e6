use std::fmt;

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Multiplicative group of integers modulo an odd modulus, with a fixed
/// generator. The client signature protocol computes its commitments and
/// proofs here; the host protocol only needs bare modular exponentiation and
/// carries its modulus inside its keys instead.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    modulus: BigUint,
    generator: BigUint,
}

impl Group {
    /// Build a group. The generator must be a proper element: greater than 1
    /// and less than the modulus.
    pub fn new(modulus: BigUint, generator: BigUint) -> Result<Group> {
        if modulus <= BigUint::one() {
            return Err(Error::bad_encoding(
                "group parameters",
                format!("modulus {} is too small", modulus),
            ));
        }
        if generator <= BigUint::one() || generator >= modulus {
            return Err(Error::bad_encoding(
                "group parameters",
                format!("generator {} is not a proper element mod {}", generator, modulus),
            ));
        }
        Ok(Group { modulus, generator })
    }

    pub fn modulus(&self) -> &BigUint {
        &self.modulus
    }

    pub fn generator(&self) -> &BigUint {
        &self.generator
    }

    /// `generator ^ exponent mod modulus`.
    pub fn pow_generator(&self, exponent: &BigUint) -> BigUint {
        self.generator.modpow(exponent, &self.modulus)
    }

    /// `base ^ exponent mod modulus`.
    pub fn pow(&self, base: &BigUint, exponent: &BigUint) -> BigUint {
        base.modpow(exponent, &self.modulus)
    }

    /// `base ^ exponent mod modulus` for a signed exponent. A negative
    /// exponent exponentiates the modular inverse; `None` if `base` has no
    /// inverse in this group.
    pub fn pow_signed(&self, base: &BigUint, exponent: &BigInt) -> Option<BigUint> {
        let magnitude = exponent.magnitude();
        match exponent.sign() {
            Sign::NoSign => Some(BigUint::one()),
            Sign::Plus => Some(base.modpow(magnitude, &self.modulus)),
            Sign::Minus => {
                let inverse = base.modinv(&self.modulus)?;
                Some(inverse.modpow(magnitude, &self.modulus))
            }
        }
    }

    /// `a * b mod modulus`.
    pub fn mul(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.modulus
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Group(mod {} bits, gen {} bits)",
            self.modulus.bits(),
            self.generator.bits()
        )
    }
}

/// Parse a minimal big-endian unsigned integer. Leading zero bytes are
/// rejected so that every integer has exactly one encoding.
pub(crate) fn biguint_from_be(step: &'static str, bytes: &[u8]) -> Result<BigUint> {
    if bytes.is_empty() {
        return Err(Error::bad_encoding(step, "empty integer"));
    }
    if bytes.len() > 1 && bytes[0] == 0 {
        return Err(Error::bad_encoding(step, "integer has leading zero bytes"));
    }
    Ok(BigUint::from_bytes_be(bytes))
}

/// Minimal big-endian encoding of an unsigned integer. Zero is one zero byte.
pub(crate) fn biguint_to_be(value: &BigUint) -> Vec<u8> {
    if value.is_zero() {
        vec![0]
    } else {
        value.to_bytes_be()
    }
}

/// Parse a minimal two's-complement big-endian signed integer.
pub(crate) fn bigint_from_be(step: &'static str, bytes: &[u8]) -> Result<BigInt> {
    if bytes.is_empty() {
        return Err(Error::bad_encoding(step, "empty integer"));
    }
    let value = BigInt::from_signed_bytes_be(bytes);
    if value.to_signed_bytes_be() != bytes {
        return Err(Error::bad_encoding(
            step,
            "integer is not minimally encoded",
        ));
    }
    Ok(value)
}

pub(crate) fn bigint_to_be(value: &BigInt) -> Vec<u8> {
    value.to_signed_bytes_be()
}
