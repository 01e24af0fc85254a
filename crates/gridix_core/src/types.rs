//! Core type definitions for Gridix.

use std::fmt;
use std::sync::Arc;

/// Size returned by `size` when the type is not registered.
pub const UNKNOWN_TYPE_SIZE: i64 = -1;

/// Expiration time meaning "never expires".
pub const NEVER_EXPIRES: u64 = 0;

/// Name of a cache space.
///
/// A space is the namespace of one distributed cache. The unnamed
/// default space is represented by [`SpaceName::DEFAULT`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SpaceName(Option<Arc<str>>);

impl SpaceName {
    /// The default (unnamed) space.
    pub const DEFAULT: SpaceName = SpaceName(None);

    /// Creates a named space.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(Some(Arc::from(name)))
    }

    /// Returns the space name, or `None` for the default space.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Returns true for the default space.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0.is_none()
    }
}

impl From<&str> for SpaceName {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<Option<&str>> for SpaceName {
    fn from(name: Option<&str>) -> Self {
        name.map_or(Self::DEFAULT, Self::named)
    }
}

impl fmt::Display for SpaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(name) => write!(f, "space:{name}"),
            None => write!(f, "space:<default>"),
        }
    }
}

/// Opaque per-key version token.
///
/// Tokens compare bytewise. Producers must use one encoding per key so that
/// later updates compare greater; [`Version::from_u64`] gives a fixed-width
/// big-endian encoding whose byte order matches numeric order.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(Arc<[u8]>);

impl Version {
    /// Creates a version token from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }

    /// Creates a version token from a counter.
    #[must_use]
    pub fn from_u64(counter: u64) -> Self {
        Self::from_bytes(&counter.to_be_bytes())
    }

    /// Returns the raw token bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<u64> for Version {
    fn from(counter: u64) -> Self {
        Self::from_u64(counter)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ver:")?;
        for byte in self.0.iter() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_versions_order_numerically() {
        assert!(Version::from_u64(2) > Version::from_u64(1));
        assert!(Version::from_u64(256) > Version::from_u64(255));
        assert_eq!(Version::from(7).as_bytes(), &[0, 0, 0, 0, 0, 0, 0, 7]);
    }

    #[test]
    fn space_display() {
        assert_eq!(SpaceName::DEFAULT.to_string(), "space:<default>");
        assert_eq!(SpaceName::named("people").to_string(), "space:people");
        assert_eq!(SpaceName::from(None), SpaceName::DEFAULT);
        assert!(SpaceName::default().is_default());
    }

    #[test]
    fn version_display() {
        assert_eq!(Version::from_bytes(&[0xab, 0x01]).to_string(), "ver:ab01");
    }
}
