//! Newtype wrappers for string identifiers, providing compile-time type safety.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Number of hex characters kept from the content digest.
pub const CHECKSUM_LEN: usize = 16;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance from a string.
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Return the inner string as a slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl PartialEq<String> for $name {
            fn eq(&self, other: &String) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Dotted, hierarchical module identity such as `app.util`.
    ModuleName
);

string_newtype!(
    /// Truncated hex digest over an archive's content entries.
    Checksum
);

impl ModuleName {
    /// Iterate the dot-separated segments.
    pub fn segments(&self) -> std::str::Split<'_, char> {
        self.0.split('.')
    }

    /// The final segment (`util` for `app.util`).
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// The enclosing package, or `None` for a top-level name.
    pub fn parent(&self) -> Option<ModuleName> {
        self.0
            .rsplit_once('.')
            .map(|(parent, _)| ModuleName::new(parent))
    }

    /// Every strict dot-separated prefix, outermost first.
    ///
    /// `a.b.c` yields `a` then `a.b`.
    pub fn strict_prefixes(&self) -> Vec<ModuleName> {
        self.0
            .match_indices('.')
            .map(|(idx, _)| ModuleName::new(&self.0[..idx]))
            .collect()
    }

    /// Append a child segment.
    #[must_use]
    pub fn child(&self, segment: &str) -> ModuleName {
        if self.0.is_empty() {
            ModuleName::new(segment)
        } else {
            ModuleName::new(format!("{}.{segment}", self.0))
        }
    }
}

impl Checksum {
    /// Keep the first [`CHECKSUM_LEN`] characters of a full hex digest.
    pub fn from_digest_hex(hex: &str) -> Self {
        Self(hex.chars().take(CHECKSUM_LEN).collect())
    }

    /// True when the value has the expected length and is lowercase hex.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == CHECKSUM_LEN
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }
}
