//! Interned identifiers.

use std::fmt;

/// An identifier, member name, string literal or class-path segment after
/// interning.
///
/// The top [`Name::SHARD_BITS`] bits select the interner shard that owns the
/// string; the rest index into that shard's table. Comparing two names is a
/// `u32` comparison, so scope lookups and sandbox segment matching never
/// touch string data.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    pub const SHARD_BITS: u32 = 4;

    /// Shard count of every [`StringInterner`](crate::StringInterner).
    pub const NUM_SHARDS: usize = 1 << Self::SHARD_BITS;

    /// Largest slot index a shard can hand out.
    pub const MAX_LOCAL: u32 = u32::MAX >> Self::SHARD_BITS;

    /// The empty string, present in every interner.
    pub const EMPTY: Name = Name(0);

    const SLOT_BITS: u32 = u32::BITS - Self::SHARD_BITS;

    #[inline]
    pub const fn new(shard: u32, local: u32) -> Self {
        debug_assert!((shard as usize) < Self::NUM_SHARDS);
        debug_assert!(local <= Self::MAX_LOCAL);
        Name((shard << Self::SLOT_BITS) | local)
    }

    /// Owning shard.
    #[inline]
    pub const fn shard(self) -> usize {
        (self.0 >> Self::SLOT_BITS) as usize
    }

    /// Slot within the owning shard.
    #[inline]
    pub const fn local(self) -> usize {
        (self.0 & Self::MAX_LOCAL) as usize
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl Default for Name {
    fn default() -> Self {
        Name::EMPTY
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({}:{})", self.shard(), self.local())
    }
}
