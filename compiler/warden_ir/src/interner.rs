//! Sharded string interner.
//!
//! Every identifier, member name, string literal and class-path segment a
//! program uses is interned once and referred to by [`Name`] afterwards.
//! Interning takes one shard's write lock only when the string is new;
//! lookups take a read lock. A [`SharedInterner`] lets programs evaluated on
//! several threads agree on what each `Name` means.

use std::fmt;
use std::hash::BuildHasher;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxBuildHasher, FxHashMap};

use super::Name;

/// Interning failed because a shard has no free slots left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternError {
    ShardOverflow { shard_idx: usize, count: usize },
}

impl fmt::Display for InternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternError::ShardOverflow { shard_idx, count } => write!(
                f,
                "interner shard {shard_idx} is full ({count} strings, limit {})",
                Name::MAX_LOCAL
            ),
        }
    }
}

impl std::error::Error for InternError {}

/// One shard: slot table plus reverse index.
#[derive(Default)]
struct Shard {
    slots: Vec<&'static str>,
    index: FxHashMap<&'static str, u32>,
}

impl Shard {
    fn find(&self, text: &str) -> Option<u32> {
        self.index.get(text).copied()
    }

    fn insert(&mut self, text: &str, shard_idx: usize) -> Result<u32, InternError> {
        let count = self.slots.len();
        let slot = u32::try_from(count)
            .ok()
            .filter(|slot| *slot <= Name::MAX_LOCAL)
            .ok_or(InternError::ShardOverflow { shard_idx, count })?;
        // Interned strings live as long as the process; `Name`s hand out
        // `&'static str` without holding a lock.
        let stored: &'static str = Box::leak(Box::<str>::from(text));
        self.slots.push(stored);
        self.index.insert(stored, slot);
        Ok(slot)
    }
}

/// Strings interned for the runtime's keywords and built-in members.
const WELL_KNOWN: &[&str] = &[
    "do", "while", "foreach", "if", "else", "return", "break", "this", "null", "true", "false",
    // refused by the sandbox on every receiver
    "getClass", "getClassLoader", "getModule",
    // collections
    "size", "length", "isEmpty", "get", "set", "put", "remove", "contains", "keys", "values",
    "push", "pop", "shift", "unshift", "slice", "splice", "sort", "toSorted", "reverse",
    "toReversed", "fill", "with", "join", "invert", "toUnmodifiable",
];

/// Sharded string interner.
///
/// Interned strings are never freed. Untrusted names that only need to be
/// *checked* (class names a script asks the sandbox about) go through
/// [`StringInterner::get`], which never adds anything.
pub struct StringInterner {
    shards: [RwLock<Shard>; Name::NUM_SHARDS],
    count: AtomicUsize,
}

impl StringInterner {
    pub fn new() -> Self {
        let interner = StringInterner {
            shards: std::array::from_fn(|_| RwLock::new(Shard::default())),
            count: AtomicUsize::new(0),
        };
        // Slot 0 of shard 0 must be the empty string so `Name::EMPTY` holds.
        {
            let mut first = interner.shards[0].write();
            first.slots.push("");
            first.index.insert("", 0);
        }
        interner.count.store(1, Ordering::Relaxed);
        for text in WELL_KNOWN {
            interner.intern(text);
        }
        interner
    }

    fn shard_of(text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "reduced modulo NUM_SHARDS right away"
        )]
        let hash = FxBuildHasher.hash_one(text) as usize;
        hash % Name::NUM_SHARDS
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "shard indices are below NUM_SHARDS"
    )]
    fn name_at(shard_idx: usize, slot: u32) -> Name {
        Name::new(shard_idx as u32, slot)
    }

    /// Intern `text`, failing only when its shard is full.
    pub fn try_intern(&self, text: &str) -> Result<Name, InternError> {
        let shard_idx = Self::shard_of(text);
        let shard = &self.shards[shard_idx];

        if let Some(slot) = shard.read().find(text) {
            return Ok(Self::name_at(shard_idx, slot));
        }

        let mut guard = shard.write();
        // Another thread may have won the race for the write lock.
        if let Some(slot) = guard.find(text) {
            return Ok(Self::name_at(shard_idx, slot));
        }
        let slot = guard.insert(text, shard_idx)?;
        self.count.fetch_add(1, Ordering::Relaxed);
        Ok(Self::name_at(shard_idx, slot))
    }

    /// Intern `text`.
    ///
    /// # Panics
    /// Panics when the shard is full; see [`try_intern`](Self::try_intern).
    #[inline]
    pub fn intern(&self, text: &str) -> Name {
        self.try_intern(text).unwrap_or_else(|err| panic!("{err}"))
    }

    /// The name of `text` if it was interned before.
    pub fn get(&self, text: &str) -> Option<Name> {
        let shard_idx = Self::shard_of(text);
        self.shards[shard_idx]
            .read()
            .find(text)
            .map(|slot| Self::name_at(shard_idx, slot))
    }

    /// The string behind `name`; a name from another interner yields `""`.
    pub fn lookup(&self, name: Name) -> &'static str {
        self.shards[name.shard()]
            .read()
            .slots
            .get(name.local())
            .copied()
            .unwrap_or_default()
    }

    /// Number of distinct strings, the empty string included.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Whether only the empty string is interned.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

/// Read access to interned strings, for code that renders names without
/// owning an interner.
pub trait StringLookup {
    fn lookup(&self, name: Name) -> &str;
}

impl StringLookup for StringInterner {
    fn lookup(&self, name: Name) -> &str {
        StringInterner::lookup(self, name)
    }
}

/// Cloneable handle to one interner.
///
/// The parser configuration, the sandbox and host scopes of one engine all
/// hold clones of the same handle.
#[derive(Clone, Default)]
pub struct SharedInterner(Arc<StringInterner>);

impl SharedInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both handles refer to the same interner, so their `Name`s
    /// can be compared.
    pub fn ptr_eq(&self, other: &SharedInterner) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for SharedInterner {
    type Target = StringInterner;

    fn deref(&self) -> &StringInterner {
        &self.0
    }
}

impl fmt::Debug for SharedInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedInterner")
            .field("len", &self.0.len())
            .finish()
    }
}
