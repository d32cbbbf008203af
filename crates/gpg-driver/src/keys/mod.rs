//! Key, user-id and signature records.
//!
//! Plain values: built by the colon-listing parser or by the interpreter,
//! never mutated by this crate afterwards.

mod colons;
mod params;

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use colons::{merge_secret, parse_colons};
pub use params::{KeyAlgorithm, KeyParams, KeyParamsError};

use crate::passphrase::normalize_key_id;

/// OpenPGP public-key algorithm, by its RFC 4880 identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicKeyAlgorithm {
    /// RSA (ids 1-3).
    Rsa,
    /// Elgamal (ids 16 and 20).
    Elgamal,
    /// DSA (id 17).
    Dsa,
    /// ECDH (id 18).
    Ecdh,
    /// ECDSA (id 19).
    Ecdsa,
    /// EdDSA (id 22).
    EdDsa,
    /// Anything else.
    Other(u8),
}

impl PublicKeyAlgorithm {
    /// Maps an algorithm id.
    #[must_use]
    pub const fn from_id(id: u8) -> Self {
        match id {
            1..=3 => Self::Rsa,
            16 | 20 => Self::Elgamal,
            17 => Self::Dsa,
            18 => Self::Ecdh,
            19 => Self::Ecdsa,
            22 => Self::EdDsa,
            other => Self::Other(other),
        }
    }
}

/// A primary key or a sub-key.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubKey {
    /// The 16-character long key id.
    pub id: String,
    /// The full fingerprint, when listed.
    pub fingerprint: Option<String>,
    /// Public-key algorithm.
    pub algorithm: PublicKeyAlgorithm,
    /// Key length in bits.
    pub length: u32,
    /// Creation time.
    pub creation: Option<DateTime<Utc>>,
    /// Expiration time, if the key expires.
    pub expiration: Option<DateTime<Utc>>,
    /// May sign.
    pub can_sign: bool,
    /// May encrypt.
    pub can_encrypt: bool,
    /// The secret part is in the keyring.
    pub has_private: bool,
    /// Revoked.
    pub is_revoked: bool,
}

impl SubKey {
    /// Returns `true` if `key_id` names this key by fingerprint, long id
    /// or short id.
    #[must_use]
    pub fn matches(&self, key_id: &str) -> bool {
        let wanted = normalize_key_id(key_id);
        if wanted.is_empty() {
            return false;
        }
        self.fingerprint
            .as_deref()
            .is_some_and(|fpr| fpr.ends_with(&wanted))
            || self.id.ends_with(&wanted)
    }
}

/// A user id: `Name (Comment) <email>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserId {
    /// The full user id string.
    pub uid: String,
    /// The name part.
    pub name: Option<String>,
    /// The comment part, without parentheses.
    pub comment: Option<String>,
    /// The e-mail part, without angle brackets.
    pub email: Option<String>,
    /// Revoked.
    pub is_revoked: bool,
    /// Not revoked, expired or otherwise invalid.
    pub is_valid: bool,
}

static USER_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>.*?)(?:\s*\((?P<comment>[^)]*)\))?(?:\s*<(?P<email>[^>]*)>)?\s*$")
        .expect("invalid user id pattern")
});

impl UserId {
    /// Splits a user id string into its parts.
    #[must_use]
    pub fn parse(uid: &str) -> Self {
        let part = |caps: &regex::Captures<'_>, name: &str| {
            caps.name(name)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let (name, comment, email) = USER_ID.captures(uid).map_or_else(
            || (Some(uid.trim().to_string()), None, None),
            |caps| {
                (
                    part(&caps, "name"),
                    part(&caps, "comment"),
                    part(&caps, "email"),
                )
            },
        );

        Self {
            uid: uid.to_string(),
            name,
            comment,
            email,
            is_revoked: false,
            is_valid: true,
        }
    }
}

/// A key with its sub-keys and user ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    /// The primary key.
    pub primary: SubKey,
    /// Sub-keys, in listing order.
    pub subkeys: Vec<SubKey>,
    /// User ids, in listing order.
    pub user_ids: Vec<UserId>,
}

impl Key {
    /// The primary key's long id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.primary.id
    }

    /// The primary key's fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.primary.fingerprint.as_deref()
    }

    /// The primary key followed by every sub-key.
    pub fn all_keys(&self) -> impl Iterator<Item = &SubKey> {
        std::iter::once(&self.primary).chain(&self.subkeys)
    }

    /// Returns `true` if `key_id` names the primary key or a sub-key.
    #[must_use]
    pub fn matches(&self, key_id: &str) -> bool {
        self.all_keys().any(|k| k.matches(key_id))
    }

    /// Returns `true` if any usable part of the key can encrypt.
    #[must_use]
    pub fn can_encrypt(&self) -> bool {
        self.all_keys().any(|k| k.can_encrypt && !k.is_revoked)
    }

    /// Returns `true` if any usable part of the key can sign.
    #[must_use]
    pub fn can_sign(&self) -> bool {
        self.all_keys().any(|k| k.can_sign && !k.is_revoked)
    }

    /// Returns `true` if the secret part of the primary key is present.
    #[must_use]
    pub fn has_private(&self) -> bool {
        self.primary.has_private
    }
}

/// How gpg judged a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureStatus {
    /// `GOODSIG`.
    Good,
    /// `EXPSIG`: good, but the signature has expired.
    ExpiredSignature,
    /// `EXPKEYSIG`: good, but the key has expired.
    ExpiredKey,
    /// `REVKEYSIG`: good, but the key has been revoked.
    RevokedKey,
    /// `BADSIG`.
    Bad,
    /// `ERRSIG`: could not be checked.
    Error,
}

/// The trust gpg assigned to a signature's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// `TRUST_UNDEFINED`.
    Undefined,
    /// `TRUST_NEVER`.
    Never,
    /// `TRUST_MARGINAL`.
    Marginal,
    /// `TRUST_FULLY`.
    Full,
    /// `TRUST_ULTIMATE`.
    Ultimate,
}

/// One signature seen while verifying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// The unique signature id (`SIG_ID`).
    pub id: Option<String>,
    /// The signing key's long id.
    pub key_id: Option<String>,
    /// The signing key's fingerprint (`VALIDSIG`).
    pub key_fingerprint: Option<String>,
    /// The user id gpg reported.
    pub user_id: Option<String>,
    /// Signature creation time.
    pub creation: Option<DateTime<Utc>>,
    /// Signature expiration time.
    pub expiration: Option<DateTime<Utc>>,
    /// gpg's verdict.
    pub status: Option<SignatureStatus>,
    /// Trust of the signing key.
    pub trust: Option<TrustLevel>,
    /// The signature is cryptographically valid.
    pub valid: bool,
}

impl Signature {
    pub(crate) const fn empty() -> Self {
        Self {
            id: None,
            key_id: None,
            key_fingerprint: None,
            user_id: None,
            creation: None,
            expiration: None,
            status: None,
            trust: None,
            valid: false,
        }
    }
}

/// Parses a gpg timestamp: seconds since the epoch, or ISO 8601 basic
/// form (`20240131T235959`). Zero and empty mean "none".
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() || value == "0" {
        return None;
    }
    if value.bytes().all(|b| b.is_ascii_digit()) {
        return value
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
    }
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}
