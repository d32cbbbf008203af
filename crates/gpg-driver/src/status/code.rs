//! Status keywords consumed by the interpreter.

use std::fmt;

macro_rules! status_codes {
    ($($(#[$meta:meta])* $variant:ident => $name:literal,)+) => {
        /// A status keyword, as emitted after the `[GNUPG:]` marker.
        ///
        /// Only the keywords this crate acts on get a variant. The protocol
        /// is append-only, so every other keyword decodes to
        /// [`StatusCode::Other`] instead of failing.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum StatusCode {
            $($(#[$meta])* $variant,)+
            /// Any keyword not listed above.
            Other(String),
        }

        impl StatusCode {
            /// Decodes a keyword. Never fails.
            #[must_use]
            pub fn from_keyword(keyword: &str) -> Self {
                match keyword {
                    $($name => Self::$variant,)+
                    other => Self::Other(other.to_string()),
                }
            }

            /// The keyword as it appears on the wire.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $name,)+
                    Self::Other(other) => other,
                }
            }
        }
    };
}

status_codes! {
    /// A new signature block starts.
    NewSig => "NEWSIG",
    /// Good signature.
    GoodSig => "GOODSIG",
    /// Good signature that has expired.
    ExpSig => "EXPSIG",
    /// Good signature made by an expired key.
    ExpKeySig => "EXPKEYSIG",
    /// Good signature made by a revoked key.
    RevKeySig => "REVKEYSIG",
    /// Bad signature.
    BadSig => "BADSIG",
    /// The signature could not be checked.
    ErrSig => "ERRSIG",
    /// Fingerprint and timestamps of a valid signature.
    ValidSig => "VALIDSIG",
    /// Unique signature id.
    SigId => "SIG_ID",
    /// Trust level: undefined.
    TrustUndefined => "TRUST_UNDEFINED",
    /// Trust level: never.
    TrustNever => "TRUST_NEVER",
    /// Trust level: marginal.
    TrustMarginal => "TRUST_MARGINAL",
    /// Trust level: full.
    TrustFully => "TRUST_FULLY",
    /// Trust level: ultimate.
    TrustUltimate => "TRUST_ULTIMATE",
    /// The message is encrypted to this key id.
    EncTo => "ENC_TO",
    /// Decryption starts.
    BeginDecryption => "BEGIN_DECRYPTION",
    /// Decryption ends.
    EndDecryption => "END_DECRYPTION",
    /// Decryption succeeded and the integrity check passed.
    DecryptionOkay => "DECRYPTION_OKAY",
    /// Decryption failed.
    DecryptionFailed => "DECRYPTION_FAILED",
    /// Literal data packet header.
    Plaintext => "PLAINTEXT",
    /// The public key is not available.
    NoPubkey => "NO_PUBKEY",
    /// The secret key is not available.
    NoSeckey => "NO_SECKEY",
    /// A passphrase is needed for a key.
    NeedPassphrase => "NEED_PASSPHRASE",
    /// A symmetric passphrase is needed.
    NeedPassphraseSym => "NEED_PASSPHRASE_SYM",
    /// The supplied passphrase was wrong.
    BadPassphrase => "BAD_PASSPHRASE",
    /// The supplied passphrase was accepted.
    GoodPassphrase => "GOOD_PASSPHRASE",
    /// No passphrase was supplied.
    MissingPassphrase => "MISSING_PASSPHRASE",
    /// gpg waits for a hidden line on the command channel.
    GetHidden => "GET_HIDDEN",
    /// gpg waits for a yes/no answer on the command channel.
    GetBool => "GET_BOOL",
    /// gpg waits for a free-form line on the command channel.
    GetLine => "GET_LINE",
    /// gpg acknowledged a command-channel answer.
    GotIt => "GOT_IT",
    /// A recipient is invalid.
    InvRecp => "INV_RECP",
    /// A signer is invalid.
    InvSgnr => "INV_SGNR",
    /// No recipients are usable.
    NoRecp => "NO_RECP",
    /// No signers are usable.
    NoSgnr => "NO_SGNR",
    /// Encryption starts.
    BeginEncryption => "BEGIN_ENCRYPTION",
    /// Encryption finished.
    EndEncryption => "END_ENCRYPTION",
    /// Signing starts.
    BeginSigning => "BEGIN_SIGNING",
    /// A signature was created.
    SigCreated => "SIG_CREATED",
    /// A key was considered for an operation.
    KeyConsidered => "KEY_CONSIDERED",
    /// A key has expired.
    KeyExpired => "KEYEXPIRED",
    /// A key has been revoked.
    KeyRevoked => "KEYREVOKED",
    /// A key was imported.
    Imported => "IMPORTED",
    /// A key was processed by import.
    ImportOk => "IMPORT_OK",
    /// A key could not be imported.
    ImportProblem => "IMPORT_PROBLEM",
    /// Final import statistics.
    ImportRes => "IMPORT_RES",
    /// A key was exported.
    Exported => "EXPORTED",
    /// Final export statistics.
    ExportRes => "EXPORT_RES",
    /// A key was generated.
    KeyCreated => "KEY_CREATED",
    /// Key generation failed.
    KeyNotCreated => "KEY_NOT_CREATED",
    /// A key could not be deleted.
    DeleteProblem => "DELETE_PROBLEM",
    /// No OpenPGP data was found.
    NoData => "NODATA",
    /// Unexpected data was found.
    Unexpected => "UNEXPECTED",
    /// A generic error with a location and an error code.
    Error => "ERROR",
    /// The operation failed with a location and an error code.
    Failure => "FAILURE",
    /// The operation succeeded.
    Success => "SUCCESS",
    /// A pinentry was launched (should not happen in loopback mode).
    PinentryLaunched => "PINENTRY_LAUNCHED",
    /// Progress report.
    Progress => "PROGRESS",
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
