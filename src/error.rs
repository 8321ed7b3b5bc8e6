use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// Occurs when a slice or length computation would run past the end of a parent
    /// block. This is always a caller bug, not a property of the data.
    Range {
        offset: usize,
        len: usize,
        parent_len: usize,
    },
    /// Occurs when decoded bytes are structurally inconsistent with the expected
    /// shape: truncated tuple elements, non-minimal length prefixes, corrupt
    /// compressed streams, or an illegal combination of signature slots.
    BadEncoding {
        step: &'static str,
        detail: String,
    },
    /// A tuple slot that the caller requires was absent.
    MissingElement { index: usize },
    /// A cryptographic check failed: the host exponentiation result or the client
    /// challenge-response didn't match the signed content.
    InvalidSignature(&'static str),
    /// Signature age exceeds the per-variant bound. The bytes may be otherwise
    /// cryptographically correct; this is distinct from `InvalidSignature`.
    StaleSignature { age: i64, max_age: i64 },
    /// Signature is older than the freshness window required by the requested
    /// operation, which is stricter than the per-variant staleness bounds.
    InactiveSignature { age: i64, max_age: i64 },
    /// The external key directory could not produce a key for the given signer
    /// and time. Lookup is delegated entirely to the directory; it is not retried.
    KeyLookup(String),
    /// The external type registry rejected a query, or a type was used with the
    /// wrong number of parameter slots.
    TypeSystem(String),
    /// The signature variant is recognized on the wire but its algorithm is not
    /// available in this build.
    UnsupportedVariant(&'static str),
}

impl Error {
    pub(crate) fn bad_encoding(step: &'static str, detail: impl Into<String>) -> Self {
        Error::BadEncoding {
            step,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Range {
                offset,
                len,
                parent_len,
            } => write!(
                f,
                "Slice of {} bytes at offset {} exceeds parent block of {} bytes",
                len, offset, parent_len
            ),
            Error::BadEncoding { step, ref detail } => {
                write!(f, "Malformed encoding at [{}]: {}", step, detail)
            }
            Error::MissingElement { index } => {
                write!(f, "Required tuple element {} is absent", index)
            }
            Error::InvalidSignature(detail) => write!(f, "Signature check failed: {}", detail),
            Error::StaleSignature { age, max_age } => write!(
                f,
                "Signature is {} seconds old, maximum allowed is {}",
                age, max_age
            ),
            Error::InactiveSignature { age, max_age } => write!(
                f,
                "Signature is {} seconds old, operation requires at most {}",
                age, max_age
            ),
            Error::KeyLookup(ref detail) => write!(f, "Key directory lookup failed: {}", detail),
            Error::TypeSystem(ref detail) => write!(f, "Type registry failure: {}", detail),
            Error::UnsupportedVariant(name) => {
                write!(f, "Signature variant [{}] is not supported", name)
            }
        }
    }
}

impl std::error::Error for Error {}
