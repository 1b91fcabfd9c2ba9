//! Resource version tracking for mirrored objects.
//!
//! The authoritative source stamps every object state with a resource
//! version and promises the versions of one object only move forward. The
//! cache itself compares versions for equality only; delta sources use the
//! ordering here to recognize stale observations (a relisted object older
//! than what was already delivered) and to keep their
//! `last_sync_resource_version` high-water mark.

use std::cmp::Ordering;
use std::fmt;

/// Version stamp of one object state at the authoritative source.
///
/// The empty version is the absent/initial state and orders before every
/// real version. Real versions are almost always decimal counters; those
/// compare numerically (`"9"` is older than `"10"`). Anything else falls
/// back to byte order so the ordering stays total.
///
/// # Example
///
/// ```rust
/// use mirror_core::ResourceVersion;
///
/// let observed = ResourceVersion::new("1005");
/// let cached = ResourceVersion::new("998");
///
/// assert!(observed.newer_than(&cached));
/// assert!(ResourceVersion::empty().is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResourceVersion(String);

impl ResourceVersion {
    /// Create a version from the string the source reported.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// The absent/initial state: no version observed yet.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this is the absent/initial state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The version as reported by the source.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this version strictly supersedes `other`.
    #[must_use]
    pub fn newer_than(&self, other: &ResourceVersion) -> bool {
        self > other
    }
}

impl Ord for ResourceVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Absent state first, then decimal counters by magnitude. A counter
        // without leading zeros is larger exactly when it is longer, so
        // (length, bytes) is numeric order without parsing and without an
        // integer-width ceiling.
        let (a, b) = (self.0.as_bytes(), other.0.as_bytes());
        let numeric = |s: &[u8]| !s.is_empty() && s.iter().all(u8::is_ascii_digit);
        match (numeric(a), numeric(b)) {
            (true, true) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            _ => a.cmp(b),
        }
    }
}

impl PartialOrd for ResourceVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
