//! Object key generation and key-set comparison

use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Suffix appended to every generated key
pub const KEY_SUFFIX: &str = ".txt";

/// `prefix` + random UUIDv4 + `.txt`
pub fn generate_key(prefix: &str) -> String {
    format!("{}{}{}", prefix, Uuid::new_v4(), KEY_SUFFIX)
}

/// Difference between an expected and an actual key set.
///
/// Ordering and duplicates are ignored. Renders as a `-`/`+` diff: `-` for
/// expected keys that were not listed, `+` for listed keys nobody expected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySetDiff {
    pub missing: BTreeSet<String>,
    pub unexpected: BTreeSet<String>,
}

impl KeySetDiff {
    pub fn between<E, A>(expected: E, actual: A) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        A: IntoIterator,
        A::Item: Into<String>,
    {
        let expected: BTreeSet<String> = expected.into_iter().map(Into::into).collect();
        let actual: BTreeSet<String> = actual.into_iter().map(Into::into).collect();

        Self {
            missing: expected.difference(&actual).cloned().collect(),
            unexpected: actual.difference(&expected).cloned().collect(),
        }
    }

    /// Every expected key was listed
    pub fn is_superset(&self) -> bool {
        self.missing.is_empty()
    }

    /// Both sets are equal
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl fmt::Display for KeySetDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- expected")?;
        writeln!(f, "+++ listed")?;
        for key in &self.missing {
            writeln!(f, "- {}", key)?;
        }
        for key in &self.unexpected {
            writeln!(f, "+ {}", key)?;
        }
        Ok(())
    }
}
