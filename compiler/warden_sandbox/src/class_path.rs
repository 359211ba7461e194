//! Interned fully-qualified type names.

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};

use smallvec::SmallVec;
use warden_ir::{Name, StringInterner, StringLookup};

/// Segments stored inline before spilling to the heap; covers
/// `org.example.pkg.sub.Type`.
const INLINE_SEGMENTS: usize = 6;

/// A dotted type or package name as a sequence of interned segments.
///
/// Hashes and compares like `[Name]`, so rule sets keyed by `ClassPath` can
/// be probed with a borrowed prefix slice.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ClassPath {
    segments: SmallVec<[Name; INLINE_SEGMENTS]>,
}

impl ClassPath {
    /// Intern every segment of `name`.
    ///
    /// Returns `None` for empty names and names with empty segments
    /// (`""`, `".a"`, `"a..b"`, `"a."`).
    pub fn intern(name: &str, interner: &StringInterner) -> Option<Self> {
        let mut segments = SmallVec::new();
        for segment in name.split('.') {
            if segment.is_empty() {
                return None;
            }
            segments.push(interner.intern(segment));
        }
        Some(ClassPath { segments })
    }

    /// Resolve segments without interning anything new.
    ///
    /// A segment nobody interned comes back as `None`; no rule can mention
    /// it, so rule matching stops at the first unknown segment.
    pub(crate) fn query(
        name: &str,
        interner: &StringInterner,
    ) -> Option<SmallVec<[Option<Name>; INLINE_SEGMENTS]>> {
        let mut segments = SmallVec::new();
        for segment in name.split('.') {
            if segment.is_empty() {
                return None;
            }
            segments.push(interner.get(segment));
        }
        Some(segments)
    }

    pub(crate) fn from_segments(segments: &[Name]) -> Self {
        ClassPath {
            segments: SmallVec::from_slice(segments),
        }
    }

    pub fn segments(&self) -> &[Name] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The last segment (`Map` for `java.util.Map`).
    pub fn simple_name(&self) -> Option<Name> {
        self.segments.last().copied()
    }

    /// Whether `self` is a segment-wise prefix of (or equal to) `other`.
    pub fn is_prefix_of(&self, other: &ClassPath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Render back to dotted form.
    pub fn display(&self, names: &dyn StringLookup) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(names.lookup(*segment));
        }
        out
    }
}

impl Hash for ClassPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.as_slice().hash(state);
    }
}

impl Borrow<[Name]> for ClassPath {
    fn borrow(&self) -> &[Name] {
        &self.segments
    }
}

impl fmt::Debug for ClassPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassPath").field(&self.segments).finish()
    }
}
