//! Unattended key-generation parameters (`gpg --gen-key --batch`).

use std::fmt::Write as _;

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

/// Key algorithm and size for a new key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    /// RSA signing key with an RSA encryption sub-key.
    Rsa(u32),
    /// DSA signing key with an Elgamal encryption sub-key.
    Dsa(u32),
    /// Ed25519 signing key with a Curve25519 encryption sub-key.
    Ed25519,
}

impl Default for KeyAlgorithm {
    fn default() -> Self {
        Self::Rsa(3072)
    }
}

/// Invalid key-generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParamsError {
    /// A required field is empty.
    #[error("{0} must not be empty")]
    Empty(&'static str),

    /// A field contains a line break or control character, which would
    /// inject extra parameters.
    #[error("{0} must not contain control characters")]
    ControlCharacter(&'static str),

    /// The e-mail address has no `@`.
    #[error("invalid e-mail address: {0}")]
    InvalidEmail(String),

    /// The key length is outside what gpg accepts for the algorithm.
    #[error("unsupported key length {bits} for {algorithm}")]
    InvalidLength {
        /// Algorithm name.
        algorithm: &'static str,
        /// Requested length.
        bits: u32,
    },
}

/// Parameters for a new key pair.
///
/// # Example
///
/// ```
/// use gpg_driver::{KeyAlgorithm, KeyParams};
///
/// let params = KeyParams::new("Alice", "alice@example.com")
///     .with_algorithm(KeyAlgorithm::Ed25519)
///     .with_passphrase("test1");
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug)]
pub struct KeyParams {
    name: String,
    email: String,
    comment: Option<String>,
    algorithm: KeyAlgorithm,
    expire_date: Option<String>,
    passphrase: Option<SecretString>,
}

impl KeyParams {
    /// Starts parameters for `Name <email>`, RSA 3072, no expiry, no
    /// passphrase.
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            comment: None,
            algorithm: KeyAlgorithm::default(),
            expire_date: None,
            passphrase: None,
        }
    }

    /// Sets the user-id comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Sets the algorithm.
    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: KeyAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the expiry in any form gpg accepts (`0`, `2y`, `2030-01-01`).
    #[must_use]
    pub fn with_expire_date(mut self, expire: impl Into<String>) -> Self {
        self.expire_date = Some(expire.into());
        self
    }

    /// Protects the secret key with `passphrase`.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<SecretString>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// The real name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The e-mail address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// The passphrase, if any.
    #[must_use]
    pub const fn passphrase(&self) -> Option<&SecretString> {
        self.passphrase.as_ref()
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), KeyParamsError> {
        if self.name.trim().is_empty() {
            return Err(KeyParamsError::Empty("name"));
        }
        if self.email.trim().is_empty() {
            return Err(KeyParamsError::Empty("email"));
        }
        check_line("name", &self.name)?;
        check_line("email", &self.email)?;
        if let Some(comment) = &self.comment {
            check_line("comment", comment)?;
        }
        if let Some(expire) = &self.expire_date {
            check_line("expire date", expire)?;
        }
        if let Some(passphrase) = &self.passphrase {
            check_line("passphrase", passphrase.expose_secret())?;
        }
        if !self.email.contains('@') {
            return Err(KeyParamsError::InvalidEmail(self.email.clone()));
        }

        match self.algorithm {
            KeyAlgorithm::Rsa(bits) if !(1024..=4096).contains(&bits) => {
                Err(KeyParamsError::InvalidLength {
                    algorithm: "RSA",
                    bits,
                })
            },
            KeyAlgorithm::Dsa(bits) if !(1024..=3072).contains(&bits) => {
                Err(KeyParamsError::InvalidLength {
                    algorithm: "DSA",
                    bits,
                })
            },
            _ => Ok(()),
        }
    }

    /// Renders the batch parameter file gpg reads on stdin.
    ///
    /// `handle` is echoed back in `KEY_CREATED`, tying the status line to
    /// this request.
    ///
    /// # Errors
    ///
    /// Returns an error if [`validate`](Self::validate) fails.
    pub fn render(&self, handle: &str) -> Result<Zeroizing<String>, KeyParamsError> {
        self.validate()?;
        check_line("handle", handle)?;

        let mut out = Zeroizing::new(String::new());
        match self.algorithm {
            KeyAlgorithm::Rsa(bits) => {
                let _ = writeln!(out, "Key-Type: RSA\nKey-Length: {bits}\nKey-Usage: sign");
                let _ = writeln!(
                    out,
                    "Subkey-Type: RSA\nSubkey-Length: {bits}\nSubkey-Usage: encrypt"
                );
            },
            KeyAlgorithm::Dsa(bits) => {
                let _ = writeln!(out, "Key-Type: DSA\nKey-Length: {bits}\nKey-Usage: sign");
                let _ = writeln!(
                    out,
                    "Subkey-Type: ELG-E\nSubkey-Length: {bits}\nSubkey-Usage: encrypt"
                );
            },
            KeyAlgorithm::Ed25519 => {
                out.push_str("Key-Type: EDDSA\nKey-Curve: ed25519\nKey-Usage: sign\n");
                out.push_str("Subkey-Type: ECDH\nSubkey-Curve: cv25519\nSubkey-Usage: encrypt\n");
            },
        }

        let _ = writeln!(out, "Name-Real: {}", self.name.trim());
        if let Some(comment) = self.comment.as_deref().filter(|c| !c.trim().is_empty()) {
            let _ = writeln!(out, "Name-Comment: {}", comment.trim());
        }
        let _ = writeln!(out, "Name-Email: {}", self.email.trim());
        let _ = writeln!(
            out,
            "Expire-Date: {}",
            self.expire_date.as_deref().unwrap_or("0")
        );
        match &self.passphrase {
            Some(passphrase) if !passphrase.expose_secret().is_empty() => {
                out.push_str("Passphrase: ");
                out.push_str(passphrase.expose_secret());
                out.push('\n');
            },
            _ => out.push_str("%no-protection\n"),
        }
        let _ = writeln!(out, "Handle: {handle}");
        out.push_str("%commit\n");

        Ok(out)
    }
}

fn check_line(field: &'static str, value: &str) -> Result<(), KeyParamsError> {
    if value.chars().any(char::is_control) {
        return Err(KeyParamsError::ControlCharacter(field));
    }
    Ok(())
}
