//! Caller-supplied passphrases, keyed by key identifier.
//!
//! Identifiers are normalised to upper-case hex without a `0x` prefix or
//! spaces. A lookup matches when either side is a suffix of the other, so a
//! passphrase registered under a 40-character fingerprint answers prompts
//! that name the 16-character long key id, and vice versa.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use secrecy::SecretString;

/// Mapping from key identifier to passphrase.
///
/// Read-only for the lifetime of an invocation: the interpreter only ever
/// holds a shared reference.
#[derive(Clone, Default)]
pub struct PassphraseSource {
    entries: BTreeMap<String, Arc<SecretString>>,
}

impl fmt::Debug for PassphraseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassphraseSource")
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PassphraseSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `passphrase` with `key_id`.
    pub fn insert(&mut self, key_id: &str, passphrase: impl Into<SecretString>) {
        self.insert_shared(key_id, Arc::new(passphrase.into()));
    }

    pub(crate) fn insert_shared(&mut self, key_id: &str, passphrase: Arc<SecretString>) {
        let key = normalize_key_id(key_id);
        if !key.is_empty() {
            self.entries.insert(key, passphrase);
        }
    }

    /// Returns the passphrase for the first of `candidates` that matches.
    #[must_use]
    pub fn lookup<'a, I>(&self, candidates: I) -> Option<(String, Arc<SecretString>)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for candidate in candidates {
            let wanted = normalize_key_id(candidate);
            if wanted.is_empty() {
                continue;
            }
            if let Some(secret) = self.entries.get(&wanted) {
                return Some((wanted, Arc::clone(secret)));
            }
            let found = self
                .entries
                .iter()
                .find(|(known, _)| known.ends_with(&wanted) || wanted.ends_with(known.as_str()));
            if let Some((_, secret)) = found {
                return Some((wanted, Arc::clone(secret)));
            }
        }
        None
    }

    /// Number of registered identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Normalises a key identifier for comparison.
///
/// Strips whitespace and a leading `0x`, and upper-cases the rest. Non-hex
/// identifiers (user ids, e-mail addresses) pass through upper-cased; they
/// simply never match a key id gpg reports.
#[must_use]
pub fn normalize_key_id(key_id: &str) -> String {
    let compact: String = key_id.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);
    compact.to_ascii_uppercase()
}

/// Returns `true` if `key_id` looks like a short id, long id or fingerprint.
#[must_use]
pub fn is_hex_key_id(key_id: &str) -> bool {
    let normalized = normalize_key_id(key_id);
    matches!(normalized.len(), 8 | 16 | 32 | 40 | 64)
        && normalized.bytes().all(|b| b.is_ascii_hexdigit())
}
