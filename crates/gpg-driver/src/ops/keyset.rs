//! The caller-owned key-set builder.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::keys::Key;
use crate::passphrase::{PassphraseSource, is_hex_key_id};

/// The keys one operation should use.
///
/// Owned by the caller: build one, pass it to an operation, drop it or
/// clear parts of it for the next call. Identifiers may be anything gpg
/// resolves (fingerprint, key id, e-mail address, user id); they are
/// resolved to fingerprints when the operation runs.
///
/// # Example
///
/// ```
/// use gpg_driver::KeySet;
///
/// let mut keys = KeySet::new();
/// keys.add_encrypt_key("alice@example.com")
///     .add_encrypt_key("bob@example.com")
///     .add_sign_key("carol@example.com", "secret");
/// assert_eq!(keys.encrypt_keys().count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    encrypt: Vec<String>,
    sign: Vec<(String, Option<Arc<SecretString>>)>,
    decrypt: Vec<(String, Option<Arc<SecretString>>)>,
}

fn shared(passphrase: SecretString) -> Option<Arc<SecretString>> {
    if passphrase.expose_secret().is_empty() {
        None
    } else {
        Some(Arc::new(passphrase))
    }
}

impl KeySet {
    /// Creates an empty key set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a recipient.
    pub fn add_encrypt_key(&mut self, key_id: impl Into<String>) -> &mut Self {
        self.encrypt.push(key_id.into());
        self
    }

    /// Adds a signer and the passphrase of its secret key (empty for an
    /// unprotected key).
    pub fn add_sign_key(
        &mut self,
        key_id: impl Into<String>,
        passphrase: impl Into<SecretString>,
    ) -> &mut Self {
        self.sign.push((key_id.into(), shared(passphrase.into())));
        self
    }

    /// Adds a decryption key and its passphrase (empty for an unprotected
    /// key).
    pub fn add_decrypt_key(
        &mut self,
        key_id: impl Into<String>,
        passphrase: impl Into<SecretString>,
    ) -> &mut Self {
        self.decrypt.push((key_id.into(), shared(passphrase.into())));
        self
    }

    /// Removes every recipient.
    pub fn clear_encrypt_keys(&mut self) -> &mut Self {
        self.encrypt.clear();
        self
    }

    /// Removes every signer.
    pub fn clear_sign_keys(&mut self) -> &mut Self {
        self.sign.clear();
        self
    }

    /// Removes every decryption key.
    pub fn clear_decrypt_keys(&mut self) -> &mut Self {
        self.decrypt.clear();
        self
    }

    /// Recipients, in insertion order.
    pub fn encrypt_keys(&self) -> impl Iterator<Item = &str> {
        self.encrypt.iter().map(String::as_str)
    }

    /// Signers, in insertion order.
    pub fn sign_keys(&self) -> impl Iterator<Item = &str> {
        self.sign.iter().map(|(id, _)| id.as_str())
    }

    /// Decryption keys, in insertion order.
    pub fn decrypt_keys(&self) -> impl Iterator<Item = &str> {
        self.decrypt.iter().map(|(id, _)| id.as_str())
    }

    pub(super) fn sign_entries(&self) -> &[(String, Option<Arc<SecretString>>)] {
        &self.sign
    }

    pub(super) fn decrypt_entries(&self) -> &[(String, Option<Arc<SecretString>>)] {
        &self.decrypt
    }
}

/// Registers `passphrase` under every identifier gpg may use for `keys`
/// (primary and sub-key ids and fingerprints), and under `key_id` itself
/// when it is a hex id.
pub(super) fn register(
    source: &mut PassphraseSource,
    key_id: &str,
    keys: &[Key],
    passphrase: &Arc<SecretString>,
) {
    if is_hex_key_id(key_id) {
        source.insert_shared(key_id, Arc::clone(passphrase));
    }
    for sub in keys.iter().flat_map(Key::all_keys) {
        source.insert_shared(&sub.id, Arc::clone(passphrase));
        if let Some(fpr) = &sub.fingerprint {
            source.insert_shared(fpr, Arc::clone(passphrase));
        }
    }
}
