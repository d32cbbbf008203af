//! Parser for `gpg --with-colons --fixed-list-mode` key listings.
//!
//! Only `pub`, `sec`, `sub`, `ssb`, `fpr` and `uid` records are used; all
//! other record types are skipped.

use tracing::trace;

use super::{Key, PublicKeyAlgorithm, SubKey, UserId, parse_timestamp};

// Field positions (0-based) in a colon record.
const F_TYPE: usize = 0;
const F_VALIDITY: usize = 1;
const F_LENGTH: usize = 2;
const F_ALGO: usize = 3;
const F_KEYID: usize = 4;
const F_CREATED: usize = 5;
const F_EXPIRES: usize = 6;
const F_USER_ID: usize = 9;
const F_CAPS: usize = 11;
const F_TOKEN: usize = 14;

/// Parses a complete listing into keys.
///
/// Malformed records are skipped; a `sub` or `uid` before any `pub` is
/// ignored.
#[must_use]
pub fn parse_colons(listing: &str) -> Vec<Key> {
    let mut keys: Vec<Key> = Vec::new();
    // Whether the last key record was a primary (fpr goes to it) or a
    // sub-key.
    let mut last_is_primary = true;

    for line in listing.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        let field = |i: usize| fields.get(i).copied().unwrap_or("");

        match field(F_TYPE) {
            kind @ ("pub" | "sec") => {
                let Some(primary) = parse_key_record(&fields, kind == "sec") else {
                    trace!(line, "skipping malformed key record");
                    continue;
                };
                keys.push(Key {
                    primary,
                    subkeys: Vec::new(),
                    user_ids: Vec::new(),
                });
                last_is_primary = true;
            },
            kind @ ("sub" | "ssb") => {
                let (Some(key), Some(sub)) = (keys.last_mut(), parse_key_record(&fields, kind == "ssb"))
                else {
                    continue;
                };
                key.subkeys.push(sub);
                last_is_primary = false;
            },
            "fpr" => {
                let Some(key) = keys.last_mut() else {
                    continue;
                };
                let target = if last_is_primary {
                    &mut key.primary
                } else {
                    match key.subkeys.last_mut() {
                        Some(sub) => sub,
                        None => &mut key.primary,
                    }
                };
                if target.fingerprint.is_none() {
                    target.fingerprint = Some(field(F_USER_ID).to_ascii_uppercase());
                }
            },
            "uid" => {
                let Some(key) = keys.last_mut() else {
                    continue;
                };
                let mut uid = UserId::parse(&unescape_colons(field(F_USER_ID)));
                let validity = field(F_VALIDITY);
                uid.is_revoked = validity == "r";
                uid.is_valid = !matches!(validity, "r" | "e" | "i" | "n" | "d");
                key.user_ids.push(uid);
            },
            _ => {},
        }
    }

    keys
}

fn parse_key_record(fields: &[&str], secret_listing: bool) -> Option<SubKey> {
    let field = |i: usize| fields.get(i).copied().unwrap_or("");

    let id = field(F_KEYID);
    if id.is_empty() {
        return None;
    }
    let caps = field(F_CAPS);
    let validity = field(F_VALIDITY);
    // '#' marks a stub (secret part offline); anything else in a secret
    // listing means the secret is present.
    let token = field(F_TOKEN);

    Some(SubKey {
        id: id.to_ascii_uppercase(),
        fingerprint: None,
        algorithm: PublicKeyAlgorithm::from_id(field(F_ALGO).parse().unwrap_or(0)),
        length: field(F_LENGTH).parse().unwrap_or(0),
        creation: parse_timestamp(field(F_CREATED)),
        expiration: parse_timestamp(field(F_EXPIRES)),
        can_sign: caps.contains('s'),
        can_encrypt: caps.contains('e'),
        has_private: secret_listing && token != "#",
        is_revoked: validity == "r",
    })
}

/// Copies secret-key presence from a `--list-secret-keys` listing into the
/// matching public keys.
pub fn merge_secret(public: &mut [Key], secret: &[Key]) {
    for key in public {
        let Some(fpr) = key.fingerprint().map(str::to_string) else {
            continue;
        };
        let Some(sec) = secret.iter().find(|s| s.fingerprint() == Some(fpr.as_str())) else {
            continue;
        };
        key.primary.has_private = sec.primary.has_private;
        for sub in &mut key.subkeys {
            if let Some(sec_sub) = sec
                .subkeys
                .iter()
                .find(|s| s.fingerprint.is_some() && s.fingerprint == sub.fingerprint)
            {
                sub.has_private = sec_sub.has_private;
            }
        }
    }
}

/// Reverses the `\xHH` escaping gpg applies to colon-listing fields.
fn unescape_colons(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && bytes[i + 1] == b'x' {
            if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 2]), hex_digit(bytes[i + 3])) {
                out.push((hi << 4) | lo);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
tru::1:1700000000:0:3:1:5
pub:u:3072:1:8B4A6C150F2D6C7E:1700000000:1800000000::u:::scESC:::+:::23::0:
fpr:::::::::C3C8E4A1D0F2A6B3E9C1D5F78B4A6C150F2D6C7E:
uid:u::::1700000000::2CB5E0E1C71E5D9B0E1F3A2C5D6E7F8091A2B3C4::Alice Example (work) <alice@example.com>::::::::::0:
uid:r::::1700000000::1111111111111111111111111111111111111111::Alice Old <alice\\x3aold@example.com>::::::::::0:
sub:u:3072:1:A2B4C6D8E0F21234:1700000000::::::e:::+:::23:
fpr:::::::::D1D2D3D4D5D6D7D8D9D0E1E2A2B4C6D8E0F21234:
pub:u:255:22:1234567890ABCDEF:1700000001:::u:::scSC:::::ed25519:::0:
fpr:::::::::00000000000000000000000000001234567890ABCDEF:
uid:u::::1700000001::3333333333333333333333333333333333333333::Bob <bob@example.com>::::::::::0:
";

    #[test]
    fn test_parse_listing() {
        let keys = parse_colons(LISTING);
        assert_eq!(keys.len(), 2);

        let alice = &keys[0];
        assert_eq!(alice.id(), "8B4A6C150F2D6C7E");
        assert_eq!(
            alice.fingerprint(),
            Some("C3C8E4A1D0F2A6B3E9C1D5F78B4A6C150F2D6C7E")
        );
        assert_eq!(alice.primary.algorithm, PublicKeyAlgorithm::Rsa);
        assert_eq!(alice.primary.length, 3072);
        assert!(alice.primary.can_sign);
        assert!(!alice.primary.can_encrypt);
        assert!(!alice.primary.has_private);
        assert_eq!(alice.primary.creation.unwrap().timestamp(), 1_700_000_000);
        assert_eq!(alice.primary.expiration.unwrap().timestamp(), 1_800_000_000);

        assert_eq!(alice.subkeys.len(), 1);
        assert!(alice.subkeys[0].can_encrypt);
        assert_eq!(
            alice.subkeys[0].fingerprint.as_deref(),
            Some("D1D2D3D4D5D6D7D8D9D0E1E2A2B4C6D8E0F21234")
        );

        assert_eq!(alice.user_ids.len(), 2);
        assert_eq!(alice.user_ids[0].email.as_deref(), Some("alice@example.com"));
        assert!(alice.user_ids[1].is_revoked);
        assert!(!alice.user_ids[1].is_valid);
        assert_eq!(
            alice.user_ids[1].email.as_deref(),
            Some("alice:old@example.com")
        );

        let bob = &keys[1];
        assert_eq!(bob.primary.algorithm, PublicKeyAlgorithm::EdDsa);
        assert!(bob.subkeys.is_empty());
        assert!(!bob.matches("bob"));
        assert!(bob.matches("1234567890abcdef"));
    }

    #[test]
    fn test_merge_secret() {
        let mut public = parse_colons(LISTING);
        let secret = parse_colons(
            "\
sec:u:3072:1:8B4A6C150F2D6C7E:1700000000:1800000000::u:::scESC:::+:::23::0:
fpr:::::::::C3C8E4A1D0F2A6B3E9C1D5F78B4A6C150F2D6C7E:
ssb:u:3072:1:A2B4C6D8E0F21234:1700000000::::::e:::#:::23:
fpr:::::::::D1D2D3D4D5D6D7D8D9D0E1E2A2B4C6D8E0F21234:
",
        );
        merge_secret(&mut public, &secret);
        assert!(public[0].has_private());
        assert!(!public[0].subkeys[0].has_private);
        assert!(!public[1].has_private());
    }

    #[test]
    fn test_garbage_is_ignored() {
        assert!(parse_colons("").is_empty());
        assert!(parse_colons("sub:u:1:1:AAAA\nuid:u:::\nnonsense").is_empty());
        assert!(parse_colons("pub:u:1:1::").is_empty());
    }

    #[test]
    fn test_unescape_colons() {
        assert_eq!(unescape_colons("a\\x3ab"), "a:b");
        assert_eq!(unescape_colons("a\\x3"), "a\\x3");
        assert_eq!(unescape_colons("plain"), "plain");
    }
}
