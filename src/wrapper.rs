use std::fmt;
use std::sync::OnceLock;

use crate::block::Block;
use crate::types::TypeRef;

/// The codec contract every wrapper implements.
///
/// A wrapper is a decoded in-memory value together with the semantic type it
/// was (or will be) encoded under. Encoding is split in two so parent codecs
/// can size a whole nested structure before a single byte is written:
/// [`determine_len`](Wrapper::determine_len) computes the exact canonical
/// length, and [`encode`](Wrapper::encode) fills a buffer of exactly that
/// length. Blocks are immutable after construction, so growing a buffer
/// mid-encode is never an option.
///
/// The canonical encoding is computed at most once per wrapper and cached;
/// [`block`](Wrapper::block) returns the cached form. Equality and hashing of
/// concrete wrappers delegate to that block, which is what makes canonical
/// (deterministic) encoding a correctness requirement rather than an
/// optimization.
pub trait Wrapper {
    /// The semantic type this wrapper encodes under.
    fn block_type(&self) -> &TypeRef;

    /// Exact number of bytes the canonical encoding occupies. Pure; must be
    /// called (directly or via a parent codec) before [`encode`](Wrapper::encode).
    fn determine_len(&self) -> usize;

    /// Fill `target` with the canonical encoding.
    ///
    /// # Panics
    ///
    /// Panics if `target.len()` differs from [`determine_len`](Wrapper::determine_len).
    /// A mismatch is a programmer error in the calling codec, not a recoverable
    /// condition.
    fn encode(&self, target: &mut [u8]);

    /// The canonical encoded block, computed on first call and cached for the
    /// wrapper's lifetime.
    fn block(&self) -> &Block;
}

/// Allocate and fill a fresh block for `wrapper`. Used by [`Canonical`] on the
/// first call to [`Wrapper::block`].
pub(crate) fn encode_block<W: Wrapper + ?Sized>(wrapper: &W) -> Block {
    let len = wrapper.determine_len();
    let mut buf = vec![0u8; len];
    wrapper.encode(&mut buf);
    Block::from_vec(wrapper.block_type().clone(), buf)
}

/// Write-once cell holding a wrapper's canonical encoded block.
///
/// Wrappers constructed from native data start with an empty cell, filled on
/// first use. Wrappers produced by a decode step preset the cell with the
/// source block, so re-encoding a decoded value reproduces its input bytes
/// without another encode pass.
pub struct Canonical(OnceLock<Block>);

impl Canonical {
    pub fn empty() -> Self {
        Canonical(OnceLock::new())
    }

    pub fn decoded(source: Block) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(source);
        Canonical(cell)
    }

    pub fn block<W: Wrapper + ?Sized>(&self, wrapper: &W) -> &Block {
        self.0.get_or_init(|| encode_block(wrapper))
    }
}

impl Clone for Canonical {
    fn clone(&self) -> Self {
        match self.0.get() {
            Some(block) => Canonical::decoded(block.clone()),
            None => Canonical::empty(),
        }
    }
}

impl fmt::Debug for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0.get() {
            Some(block) => write!(f, "Canonical({:?})", block),
            None => f.write_str("Canonical(pending)"),
        }
    }
}
