/*!
 * Provenance Tags
 * Opaque origin markers attached to byte buffers by an external tagging service
 */

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
use mockall::automock;

/// Opaque provenance marker for data crossing the boundary.
///
/// [`Tag::CLEAR`] (zero) means untagged. Non-zero values are bit vectors owned
/// by whatever tagging service populated the resolver; this crate never
/// interprets individual bits, only combines and renders them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(u32);

impl Tag {
    /// The untagged marker.
    pub const CLEAR: Tag = Tag(0);

    #[inline]
    #[must_use]
    pub const fn new(marker: u32) -> Self {
        Tag(marker)
    }

    #[inline]
    #[must_use]
    pub const fn is_clear(self) -> bool {
        self.0 == 0
    }

    /// Bitwise-OR combination of two tags.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Tag) -> Tag {
        Tag(self.0 | other.0)
    }

    /// Render as a `0x`-prefixed lowercase hex string.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Reads the provenance tag already associated with data.
///
/// Implementations are external tagging services. The boundary layer only
/// reads tags; it never creates or mutates them.
#[cfg_attr(test, automock)]
pub trait TagResolver: Send + Sync {
    /// Tag covering an entire buffer.
    fn tag_of(&self, data: &[u8]) -> Tag;

    /// Tag of a single byte.
    fn tag_of_byte(&self, value: u8) -> Tag;
}

/// Resolver that reports every buffer as clear.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClearResolver;

impl TagResolver for ClearResolver {
    fn tag_of(&self, _data: &[u8]) -> Tag {
        Tag::CLEAR
    }

    fn tag_of_byte(&self, _value: u8) -> Tag {
        Tag::CLEAR
    }
}

/// Resolver that tags buffers containing registered sensitive byte patterns.
///
/// Tags of all matching patterns are OR-combined, so a buffer touching two
/// sources carries both markers. Empty patterns never match.
#[derive(Debug, Clone, Default)]
pub struct PatternResolver {
    patterns: Vec<(Vec<u8>, Tag)>,
}

impl PatternResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sensitive byte pattern and the marker to attach.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<Vec<u8>>, tag: Tag) -> Self {
        self.patterns.push((pattern.into(), tag));
        self
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        !needle.is_empty()
            && haystack.len() >= needle.len()
            && haystack.windows(needle.len()).any(|window| window == needle)
    }
}

impl TagResolver for PatternResolver {
    fn tag_of(&self, data: &[u8]) -> Tag {
        self.patterns
            .iter()
            .filter(|(pattern, _)| Self::contains(data, pattern))
            .fold(Tag::CLEAR, |acc, (_, tag)| acc.union(*tag))
    }

    fn tag_of_byte(&self, value: u8) -> Tag {
        self.tag_of(&[value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_is_union_identity() {
        let tag = Tag::new(0x41);
        assert_eq!(tag.union(Tag::CLEAR), tag);
        assert_eq!(Tag::CLEAR.union(tag), tag);
        assert!(Tag::CLEAR.is_clear());
        assert!(!tag.is_clear());
    }

    #[test]
    fn test_union_commutative_and_idempotent() {
        let a = Tag::new(0x1);
        let b = Tag::new(0x8);
        assert_eq!(a.union(b), b.union(a));
        assert_eq!(a.union(a), a);
    }

    #[test]
    fn test_hex_rendering() {
        assert_eq!(Tag::new(0x400).to_hex(), "0x400");
        assert_eq!(Tag::new(0xdeadbeef).to_hex(), "0xdeadbeef");
        assert_eq!(Tag::CLEAR.to_hex(), "0x0");
        assert_eq!(format!("{}", Tag::new(0x2a)), "0x2a");
    }

    #[test]
    fn test_clear_resolver() {
        let resolver = ClearResolver;
        assert!(resolver.tag_of(b"anything").is_clear());
        assert!(resolver.tag_of_byte(0xff).is_clear());
    }

    #[test]
    fn test_pattern_resolver_matches_substring() {
        let resolver = PatternResolver::new().with_pattern(b"hunter2".to_vec(), Tag::new(0x400));
        assert_eq!(
            resolver.tag_of(b"password=hunter2\n"),
            Tag::new(0x400)
        );
        assert!(resolver.tag_of(b"nothing here").is_clear());
    }

    #[test]
    fn test_pattern_resolver_combines_tags() {
        let resolver = PatternResolver::new()
            .with_pattern(b"imei".to_vec(), Tag::new(0x1))
            .with_pattern(b"imsi".to_vec(), Tag::new(0x2));
        assert_eq!(resolver.tag_of(b"imei=1 imsi=2"), Tag::new(0x3));
    }

    #[test]
    fn test_pattern_resolver_single_byte() {
        let resolver = PatternResolver::new().with_pattern(vec![0x7f], Tag::new(0x10));
        assert_eq!(resolver.tag_of_byte(0x7f), Tag::new(0x10));
        assert!(resolver.tag_of_byte(0x00).is_clear());
    }

    #[test]
    fn test_empty_pattern_never_matches() {
        let resolver = PatternResolver::new().with_pattern(Vec::new(), Tag::new(0x1));
        assert!(resolver.tag_of(b"data").is_clear());
    }

    #[test]
    fn test_mock_resolver() {
        let mut mock = MockTagResolver::new();
        mock.expect_tag_of()
            .withf(|data: &[u8]| data == &b"secret"[..])
            .return_const(Tag::new(0x20));
        assert_eq!(mock.tag_of(b"secret"), Tag::new(0x20));
    }
}
