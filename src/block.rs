use std::fmt;
use std::hash;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::types::TypeRef;

/// An immutable, typed view over a byte range.
///
/// Blocks are the universal currency between codecs: every codec encodes into a
/// fresh Block and decodes out of one. Slicing a Block never copies - sub-blocks
/// share the parent's underlying buffer - and a Block's bytes can never change
/// after construction. The one permitted mutation-shaped operation is
/// [`relabel`](Block::relabel), which produces a view of the same bytes under a
/// different type tag.
#[derive(Clone)]
pub struct Block {
    kind: TypeRef,
    bytes: Bytes,
}

impl Block {
    /// Create a block owning the given bytes. This is the terminal step of a
    /// codec's encode pass: the codec sizes the buffer with
    /// `determine_len`, fills it completely, and hands it over here.
    pub fn from_vec(kind: TypeRef, bytes: Vec<u8>) -> Self {
        Block {
            kind,
            bytes: Bytes::from(bytes),
        }
    }

    /// Create a block over an existing shared buffer without copying.
    pub fn from_bytes(kind: TypeRef, bytes: Bytes) -> Self {
        Block { kind, bytes }
    }

    /// A sub-view of `parent`, typed as `kind`. No bytes are copied. Fails with
    /// a range error if the requested range runs past the parent's own length.
    pub fn slice(kind: TypeRef, parent: &Block, offset: usize, len: usize) -> Result<Self> {
        let end = offset.checked_add(len).ok_or(Error::Range {
            offset,
            len,
            parent_len: parent.len(),
        })?;
        if end > parent.len() {
            return Err(Error::Range {
                offset,
                len,
                parent_len: parent.len(),
            });
        }
        Ok(Block {
            kind,
            bytes: parent.bytes.slice(offset..end),
        })
    }

    /// The same bytes under a new type tag. Used when a generic container's
    /// element is reinterpreted under a more specific type.
    pub fn relabel(self, kind: TypeRef) -> Self {
        Block {
            kind,
            bytes: self.bytes,
        }
    }

    /// The block's own byte range, never the whole underlying buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The shared handle to the block's byte range.
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn kind(&self) -> &TypeRef {
        &self.kind
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.bytes == other.bytes
    }
}

impl Eq for Block {}

impl hash::Hash for Block {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.bytes.hash(state);
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Block({}, {} bytes)", self.kind, self.bytes.len())
    }
}
