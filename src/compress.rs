use std::fmt;
use std::hash;
use std::io::Read;
use std::sync::OnceLock;

use flate2::read::{DeflateDecoder, DeflateEncoder};
use flate2::Compression;

use crate::block::Block;
use crate::error::{Error, Result};
use crate::types::{TypeRef, TypeSystem};
use crate::wrapper::{Canonical, Wrapper};
use crate::MAX_INFLATED_SIZE;

// Canonical encoding requires one fixed level: the same element must always
// deflate to the same bytes.
const DEFLATE_LEVEL: u32 = 6;

/// Codec holding exactly one nested block, stored on the wire as the raw
/// deflate stream of the element's own encoding. There is no framing beyond
/// the deflate stream itself; the inflated length is governed by the stream's
/// end-of-stream marker.
#[derive(Clone)]
pub struct CompressionWrapper {
    kind: TypeRef,
    element: Block,
    deflated: OnceLock<Vec<u8>>,
    encoded: Canonical,
}

impl CompressionWrapper {
    /// Wrap an element for compression. The element's type must be based on
    /// the compression type's single declared parameter.
    pub fn new(kind: TypeRef, element: Block, types: &dyn TypeSystem) -> Result<Self> {
        let declared = types.parameter(&kind, 0)?;
        if !types.is_based_on(element.kind(), &declared) {
            return Err(Error::bad_encoding(
                "compression element type",
                format!(
                    "element has type {}, not based on declared {}",
                    element.kind(),
                    declared
                ),
            ));
        }
        Ok(CompressionWrapper {
            kind,
            element,
            deflated: OnceLock::new(),
            encoded: Canonical::empty(),
        })
    }

    /// Inflate a compressed block and reinterpret the result as a block of the
    /// compression type's declared parameter type. Stream corruption and
    /// inflated sizes beyond [`MAX_INFLATED_SIZE`] are malformed encodings.
    pub fn decode(source: Block, types: &dyn TypeSystem) -> Result<Self> {
        let declared = types.parameter(source.kind(), 0)?;
        let mut decoder = DeflateDecoder::new(source.as_bytes());
        let mut inflated = Vec::new();
        decoder
            .by_ref()
            .take(MAX_INFLATED_SIZE as u64 + 1)
            .read_to_end(&mut inflated)
            .map_err(|err| {
                Error::bad_encoding("inflate", format!("corrupt deflate stream: {}", err))
            })?;
        if inflated.len() > MAX_INFLATED_SIZE {
            return Err(Error::bad_encoding(
                "inflate",
                format!(
                    "inflated data exceeds maximum of {} bytes",
                    MAX_INFLATED_SIZE
                ),
            ));
        }
        if decoder.total_in() as usize != source.len() {
            return Err(Error::bad_encoding(
                "inflate",
                "trailing bytes after deflate stream",
            ));
        }
        tracing::trace!(
            compressed = source.len(),
            inflated = inflated.len(),
            "inflated block"
        );
        Ok(CompressionWrapper {
            kind: source.kind().clone(),
            element: Block::from_vec(declared, inflated),
            deflated: OnceLock::new(),
            encoded: Canonical::decoded(source),
        })
    }

    /// The nested element.
    pub fn element(&self) -> &Block {
        &self.element
    }

    fn deflated(&self) -> &[u8] {
        self.deflated.get_or_init(|| {
            let mut encoder =
                DeflateEncoder::new(self.element.as_bytes(), Compression::new(DEFLATE_LEVEL));
            let mut deflated = Vec::new();
            // Reading from a slice through the encoder cannot fail
            encoder
                .read_to_end(&mut deflated)
                .expect("deflate of an in-memory buffer failed");
            deflated
        })
    }
}

impl Wrapper for CompressionWrapper {
    fn block_type(&self) -> &TypeRef {
        &self.kind
    }

    fn determine_len(&self) -> usize {
        self.deflated().len()
    }

    fn encode(&self, target: &mut [u8]) {
        let deflated = self.deflated();
        assert_eq!(
            target.len(),
            deflated.len(),
            "compression encode target length mismatch"
        );
        target.copy_from_slice(deflated);
    }

    fn block(&self) -> &Block {
        self.encoded.block(self)
    }
}

impl PartialEq for CompressionWrapper {
    fn eq(&self, other: &Self) -> bool {
        self.block() == other.block()
    }
}

impl Eq for CompressionWrapper {}

impl hash::Hash for CompressionWrapper {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.block().hash(state);
    }
}

impl fmt::Debug for CompressionWrapper {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CompressionWrapper")
            .field("kind", &self.kind)
            .field("element", &self.element)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MapTypeSystem;

    fn compress_types() -> (MapTypeSystem, TypeRef, TypeRef) {
        let mut types = MapTypeSystem::new();
        let raw = types.register("raw");
        let compressed = types.register_parameterized("compressed", vec![raw.clone()]);
        (types, raw, compressed)
    }

    #[test]
    fn roundtrip() {
        let (types, raw, compressed) = compress_types();
        let payload = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let element = Block::from_vec(raw.clone(), payload.clone());
        let wrapper = CompressionWrapper::new(compressed, element, &types).unwrap();
        // Repetitive input must actually shrink
        assert!(wrapper.block().len() < payload.len());

        let decoded = CompressionWrapper::decode(wrapper.block().clone(), &types).unwrap();
        assert_eq!(decoded.element().as_bytes(), payload.as_slice());
        assert_eq!(decoded.element().kind(), &raw);
        assert_eq!(decoded, wrapper);
        // Re-encoding a decoded wrapper reproduces the source bytes
        assert_eq!(decoded.block().as_bytes(), wrapper.block().as_bytes());
    }

    #[test]
    fn roundtrip_empty_payload() {
        let (types, raw, compressed) = compress_types();
        let element = Block::from_vec(raw, Vec::new());
        let wrapper = CompressionWrapper::new(compressed, element, &types).unwrap();
        let decoded = CompressionWrapper::decode(wrapper.block().clone(), &types).unwrap();
        assert!(decoded.element().is_empty());
    }

    #[test]
    fn corrupt_stream_rejected() {
        let (types, raw, compressed) = compress_types();
        let element = Block::from_vec(raw, b"payload bytes".to_vec());
        let wrapper = CompressionWrapper::new(compressed.clone(), element, &types).unwrap();
        let mut bytes = wrapper.block().as_bytes().to_vec();
        // Truncating the stream removes the end-of-stream marker
        bytes.truncate(bytes.len() / 2);
        CompressionWrapper::decode(Block::from_vec(compressed, bytes), &types).unwrap_err();
    }

    #[test]
    fn trailing_garbage_rejected() {
        let (types, raw, compressed) = compress_types();
        let element = Block::from_vec(raw, b"payload".to_vec());
        let wrapper = CompressionWrapper::new(compressed.clone(), element, &types).unwrap();
        let mut bytes = wrapper.block().as_bytes().to_vec();
        bytes.extend_from_slice(&[0xAA, 0xBB]);
        CompressionWrapper::decode(Block::from_vec(compressed, bytes), &types).unwrap_err();
    }

    #[test]
    fn element_type_enforced() {
        let (mut types, _, compressed) = compress_types();
        let other = types.register("other");
        let element = Block::from_vec(other, b"x".to_vec());
        CompressionWrapper::new(compressed, element, &types).unwrap_err();
    }
}
