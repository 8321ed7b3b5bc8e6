use std::fmt;
use std::hash;

use crate::block::Block;
use crate::error::{Error, Result};
use crate::types::{TypeRef, TypeSystem};
use crate::varint;
use crate::wrapper::{Canonical, Wrapper};

/// Codec for ordered, optionally-absent, heterogeneous sub-blocks.
///
/// A tuple has one slot per parameter declared by its semantic type. Each
/// present slot encodes as a varint length prefix followed by the sub-block's
/// raw bytes; an absent slot in the interior encodes as the single byte 0. The
/// canonical encoder omits trailing absent slots entirely, and the decoder
/// treats a stream that ends early as having all remaining slots absent.
#[derive(Clone)]
pub struct TupleWrapper {
    kind: TypeRef,
    elements: Vec<Option<Block>>,
    encoded: Canonical,
}

impl TupleWrapper {
    /// Build a tuple from native sub-blocks. `elements` must have exactly one
    /// entry per parameter slot of `kind`, and every present element's type
    /// must be based on the corresponding declared parameter type.
    pub fn new(
        kind: TypeRef,
        elements: Vec<Option<Block>>,
        types: &dyn TypeSystem,
    ) -> Result<Self> {
        let slots = types.parameter_count(&kind)?;
        if elements.len() != slots {
            return Err(Error::TypeSystem(format!(
                "type {} declares {} parameter slots, got {} elements",
                kind,
                slots,
                elements.len()
            )));
        }
        for (index, element) in elements.iter().enumerate() {
            let Some(element) = element else { continue };
            if element.is_empty() {
                // A zero length prefix is the absent-slot marker, so a present
                // empty element cannot survive a round trip
                return Err(Error::bad_encoding(
                    "tuple element",
                    format!("element {} is present but empty", index),
                ));
            }
            let declared = types.parameter(&kind, index)?;
            if !types.is_based_on(element.kind(), &declared) {
                return Err(Error::bad_encoding(
                    "tuple element types",
                    format!(
                        "element {} has type {}, not based on declared {}",
                        index,
                        element.kind(),
                        declared
                    ),
                ));
            }
        }
        Ok(TupleWrapper {
            kind,
            elements,
            encoded: Canonical::empty(),
        })
    }

    /// Decode a tuple from its encoded block. Slots are read left to right;
    /// each sub-block is a zero-copy slice of `source` typed by the matching
    /// declared parameter. A length prefix that would read past the end of the
    /// tuple's own range is a malformed encoding, as are leftover bytes after
    /// the last declared slot.
    pub fn decode(source: Block, types: &dyn TypeSystem) -> Result<Self> {
        let slots = types.parameter_count(source.kind())?;
        let bytes = source.as_bytes();
        let mut elements = Vec::with_capacity(slots);
        let mut offset = 0;
        for index in 0..slots {
            if offset == bytes.len() {
                break;
            }
            let mut cursor = &bytes[offset..];
            let remaining = cursor.len();
            let len = varint::read(&mut cursor)?;
            offset += remaining - cursor.len();
            if len == 0 {
                elements.push(None);
                continue;
            }
            if len > (bytes.len() - offset) as u64 {
                return Err(Error::bad_encoding(
                    "tuple element",
                    format!(
                        "element {} claims {} bytes, only {} remain",
                        index,
                        len,
                        bytes.len() - offset
                    ),
                ));
            }
            let len = len as usize;
            let declared = types.parameter(source.kind(), index)?;
            elements.push(Some(Block::slice(declared, &source, offset, len)?));
            offset += len;
        }
        if offset != bytes.len() {
            return Err(Error::bad_encoding(
                "tuple end",
                format!("{} bytes left over after {} slots", bytes.len() - offset, slots),
            ));
        }
        elements.resize_with(slots, || None);
        Ok(TupleWrapper {
            kind: source.kind().clone(),
            elements,
            encoded: Canonical::decoded(source),
        })
    }

    /// Number of parameter slots.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The sub-block at `index`, if present.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the tuple's declared slots.
    pub fn element(&self, index: usize) -> Option<&Block> {
        self.elements[index].as_ref()
    }

    /// The sub-block at `index`; fails with a missing-element error if absent.
    pub fn required_element(&self, index: usize) -> Result<&Block> {
        self.elements[index]
            .as_ref()
            .ok_or(Error::MissingElement { index })
    }

    /// Index just past the last present slot; everything from here on is
    /// omitted from the canonical encoding.
    fn encoded_slots(&self) -> usize {
        self.elements
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last + 1)
    }
}

impl Wrapper for TupleWrapper {
    fn block_type(&self) -> &TypeRef {
        &self.kind
    }

    fn determine_len(&self) -> usize {
        self.elements[..self.encoded_slots()]
            .iter()
            .map(|element| match element {
                None => 1,
                Some(block) => varint::len(block.len() as u64) + block.len(),
            })
            .sum()
    }

    fn encode(&self, target: &mut [u8]) {
        assert_eq!(
            target.len(),
            self.determine_len(),
            "tuple encode target length mismatch"
        );
        let mut offset = 0;
        for element in &self.elements[..self.encoded_slots()] {
            match element {
                None => {
                    offset += varint::write(0, &mut target[offset..]);
                }
                Some(block) => {
                    offset += varint::write(block.len() as u64, &mut target[offset..]);
                    target[offset..offset + block.len()].copy_from_slice(block.as_bytes());
                    offset += block.len();
                }
            }
        }
    }

    fn block(&self) -> &Block {
        self.encoded.block(self)
    }
}

impl PartialEq for TupleWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.block() == other.block()
    }
}

impl Eq for TupleWrapper {}

impl hash::Hash for TupleWrapper {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.block().hash(state);
    }
}

impl fmt::Debug for TupleWrapper {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TupleWrapper")
            .field("kind", &self.kind)
            .field("elements", &self.elements)
            .finish()
    }
}
