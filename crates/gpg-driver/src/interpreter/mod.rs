//! Event interpreter and prompt responder.
//!
//! An [`Interpreter`] is the [`StatusHandler`] for one invocation. It folds
//! the status stream into an [`OperationState`] and answers the prompts gpg
//! raises on the command channel. It never decides whether the operation
//! succeeded; [`crate::classify`] does that from the final state.
//!
//! Each [`OperationKind`] only looks at the events that matter to it. The
//! passphrase dialog and the prompt answers are shared by every kind.


use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace, warn};

use crate::keys::{Signature, SignatureStatus, TrustLevel, parse_timestamp};
use crate::passphrase::{PassphraseSource, normalize_key_id};
use crate::process::{Control, Reply, StatusHandler};
use crate::status::{StatusCode, StatusEvent};

/// Prompts one key may raise: the first is answered, a retry closes the
/// command channel.
const MAX_PROMPTS_PER_KEY: u32 = 2;

/// libgpg-error codes that mean "no such key".
const GPG_ERR_NO_PUBKEY: u32 = 9;
const GPG_ERR_NO_SECKEY: u32 = 17;

/// libgpg-error codes reported for a failed passphrase dialog.
const GPG_ERR_BAD_PASSPHRASE: u32 = 11;
const GPG_ERR_CANCELED: u32 = 99;
const GPG_ERR_NO_PASSPHRASE: u32 = 177;

/// `ERRSIG` return code for a missing public key.
const ERRSIG_NO_PUBKEY: &str = "9";

/// The operation an invocation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// `--encrypt`, optionally with `--sign`.
    Encrypt {
        /// Also signing.
        sign: bool,
    },
    /// `--decrypt`, optionally collecting signatures.
    Decrypt {
        /// Also verifying embedded signatures.
        verify: bool,
    },
    /// `--verify`.
    Verify,
    /// `--sign`, `--clearsign` or `--detach-sign`.
    Sign,
    /// `--import`.
    Import,
    /// `--export` or `--export-secret-keys`.
    Export,
    /// `--delete-key` or `--delete-secret-keys`.
    Delete,
    /// `--gen-key`.
    Generate,
    /// `--list-keys` or `--list-secret-keys`.
    List,
}

/// Events that signal (partial) success of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Marker {
    /// `DECRYPTION_OKAY`.
    DecryptionOkay,
    /// `DECRYPTION_FAILED`.
    DecryptionFailed,
    /// `BEGIN_DECRYPTION`.
    BeginDecryption,
    /// `END_ENCRYPTION`.
    EndEncryption,
    /// `SIG_CREATED`.
    SigCreated,
    /// `IMPORT_OK`, `IMPORTED` or `IMPORT_RES`.
    Imported,
    /// `EXPORTED`.
    Exported,
    /// `KEY_CREATED` for our handle.
    KeyCreated,
    /// `KEY_NOT_CREATED`.
    KeyNotCreated,
    /// `GOOD_PASSPHRASE`.
    GoodPassphrase,
}

/// Failures that end the invocation as soon as they are seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminal {
    /// `NODATA`: the input is not OpenPGP data.
    NoData,
    /// gpg asked for a free-form answer this crate cannot give.
    UnsupportedPrompt(String),
}

/// Totals from `IMPORT_RES`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportCounts {
    /// Keys processed.
    pub considered: u64,
    /// Public keys newly imported.
    pub imported: u64,
    /// Public keys already present and unchanged.
    pub unchanged: u64,
    /// Secret keys read.
    pub secret_read: u64,
    /// Secret keys newly imported.
    pub secret_imported: u64,
    /// Secret keys already present.
    pub secret_unchanged: u64,
    /// Keys not imported at all.
    pub not_imported: u64,
}

/// Everything learned from the status stream of one invocation.
#[derive(Debug, Clone, Default)]
pub struct OperationState {
    /// The key the caller named, for list, export and delete.
    pub subject: Option<String>,
    /// Signatures, in stream order.
    pub signatures: Vec<Signature>,
    /// Passphrase prompts answered, per key.
    pub attempts: BTreeMap<String, u32>,
    /// Keys whose supplied passphrase was rejected.
    pub bad_passphrase: BTreeSet<String>,
    /// Keys that needed a passphrase none was supplied for.
    pub missing_passphrase: BTreeSet<String>,
    /// Keys gpg could not find.
    pub missing_keys: BTreeSet<String>,
    /// Keys the input refers to (`ENC_TO`).
    pub referenced_keys: BTreeSet<String>,
    /// Totals from `IMPORT_RES`.
    pub import: Option<ImportCounts>,
    /// Fingerprints from `IMPORT_OK`, in order, without duplicates.
    pub imported_fingerprints: Vec<String>,
    /// Fingerprints from `EXPORTED`.
    pub exported_fingerprints: Vec<String>,
    /// Fingerprint from `KEY_CREATED`.
    pub created_fingerprint: Option<String>,
    /// Reason code from `DELETE_PROBLEM`.
    pub delete_problem: Option<u32>,
    /// Success and failure markers seen.
    pub markers: BTreeSet<Marker>,
    /// Non-fatal conditions worth reporting (`ERROR`, `KEYEXPIRED`, ...).
    pub warnings: Vec<String>,
    /// Set when the stream ended in a terminal failure.
    pub terminal: Option<Terminal>,
}

impl OperationState {
    /// Returns `true` if `marker` was seen.
    #[must_use]
    pub fn has(&self, marker: Marker) -> bool {
        self.markers.contains(&marker)
    }

    /// Returns `true` if a passphrase dialog involved `key_id`.
    #[must_use]
    pub fn passphrase_involved(&self, key_id: &str) -> bool {
        self.attempts
            .keys()
            .chain(&self.bad_passphrase)
            .chain(&self.missing_passphrase)
            .any(|known| same_key(known, key_id))
    }
}

/// Whether two normalised key ids name the same key (one is a suffix of
/// the other).
pub(crate) fn same_key(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.ends_with(b) || b.ends_with(a))
}

/// The status handler for one invocation.
#[derive(Debug)]
pub struct Interpreter {
    kind: OperationKind,
    passphrases: PassphraseSource,
    state: OperationState,
    /// Candidates from the last `NEED_PASSPHRASE`: the key being unlocked
    /// and its primary.
    pending_key: Option<(String, String)>,
    prompts: BTreeMap<String, u32>,
    handle: Option<String>,
}

impl Interpreter {
    /// Creates an interpreter answering passphrase prompts from
    /// `passphrases`.
    #[must_use]
    pub fn new(kind: OperationKind, passphrases: PassphraseSource) -> Self {
        Self {
            kind,
            passphrases,
            state: OperationState::default(),
            pending_key: None,
            prompts: BTreeMap::new(),
            handle: None,
        }
    }

    /// Names the key the operation is about (list, export, delete).
    #[must_use]
    pub fn with_subject(mut self, key_id: impl Into<String>) -> Self {
        self.state.subject = Some(key_id.into());
        self
    }

    /// Only accept `KEY_CREATED` lines carrying this handle.
    #[must_use]
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    /// The operation kind.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    /// The state so far.
    #[must_use]
    pub const fn state(&self) -> &OperationState {
        &self.state
    }

    /// Consumes the interpreter, returning its final state.
    #[must_use]
    pub fn into_state(self) -> OperationState {
        self.state
    }

    /// Prompts, passphrases and events every kind cares about. Returns
    /// `Some` if the event was fully handled.
    fn common(&mut self, event: &StatusEvent) -> Option<Control> {
        let control = match &event.code {
            StatusCode::NeedPassphrase => {
                let main = event.arg(0).map(normalize_key_id).unwrap_or_default();
                let alt = event.arg(1).map(normalize_key_id).unwrap_or_default();
                debug!(key_id = %main, "passphrase needed");
                self.pending_key = Some((main, alt));
                Control::Continue
            },
            StatusCode::NeedPassphraseSym => {
                debug!("symmetric passphrase requested, will decline");
                self.pending_key = None;
                Control::Continue
            },
            StatusCode::GetHidden => self.answer_hidden(event.arg(0).unwrap_or_default()),
            StatusCode::GetBool => answer_bool(event.arg(0).unwrap_or_default()),
            StatusCode::GetLine => {
                let keyword = event.arg(0).unwrap_or_default().to_string();
                warn!(prompt = %keyword, "unsupported interactive prompt");
                self.state.terminal = Some(Terminal::UnsupportedPrompt(keyword));
                Control::Fatal
            },
            StatusCode::GotIt => Control::Continue,
            StatusCode::BadPassphrase => {
                let key = event.arg(0).map(normalize_key_id).unwrap_or_default();
                if !key.is_empty()
                    && !self
                        .state
                        .missing_passphrase
                        .iter()
                        .any(|k| same_key(k, &key))
                {
                    self.state.bad_passphrase.insert(key);
                }
                Control::Continue
            },
            StatusCode::MissingPassphrase => {
                if let Some((key, _)) = &self.pending_key {
                    if !self.state.bad_passphrase.contains(key) {
                        self.state.missing_passphrase.insert(key.clone());
                    }
                }
                Control::Continue
            },
            StatusCode::GoodPassphrase => {
                self.state.markers.insert(Marker::GoodPassphrase);
                Control::Continue
            },
            StatusCode::NoData => {
                debug!(reason = event.arg(0).unwrap_or_default(), "no OpenPGP data");
                self.state.terminal = Some(Terminal::NoData);
                Control::Fatal
            },
            StatusCode::NoPubkey | StatusCode::NoSeckey => {
                self.missing_key(event.arg(0));
                Control::Continue
            },
            StatusCode::InvRecp | StatusCode::InvSgnr => {
                self.missing_key(event.arg(1));
                Control::Continue
            },
            StatusCode::KeyExpired | StatusCode::KeyRevoked | StatusCode::Failure => {
                self.state.warnings.push(event.to_string());
                Control::Continue
            },
            StatusCode::PinentryLaunched => {
                warn!("gpg launched a pinentry despite loopback mode");
                self.state.warnings.push(event.to_string());
                Control::Continue
            },
            _ => return None,
        };
        Some(control)
    }

    /// Answers `GET_HIDDEN`. Only `passphrase.enter` for a known key ever
    /// gets a secret, and only once per key. A second prompt for the same
    /// key closes the command channel so gpg gives up.
    fn answer_hidden(&mut self, keyword: &str) -> Control {
        if keyword != "passphrase.enter" {
            debug!(prompt = keyword, "declining hidden prompt");
            return Control::Reply(Reply::Decline);
        }
        let Some((main, alt)) = self.pending_key.clone() else {
            debug!("passphrase prompt without a key, declining");
            return Control::Reply(Reply::Decline);
        };

        let prompts = self.prompts.entry(main.clone()).or_insert(0);
        *prompts += 1;
        let retry = *prompts >= MAX_PROMPTS_PER_KEY;

        let attempts = self.state.attempts.entry(main.clone()).or_insert(0);
        match self.passphrases.lookup([main.as_str(), alt.as_str()]) {
            Some((_, secret)) if *attempts == 0 => {
                *attempts += 1;
                debug!(key_id = %main, passphrase = crate::log::REDACTED, "answering passphrase prompt");
                Control::Reply(Reply::Hidden(secret))
            },
            Some(_) => {
                debug!(key_id = %main, "passphrase rejected, closing command channel");
                self.mark_bad_passphrase(main);
                Control::CloseCommand
            },
            None => {
                if !self.state.bad_passphrase.contains(&main) {
                    self.state.missing_passphrase.insert(main.clone());
                }
                if retry {
                    debug!(key_id = %main, "repeated prompt without a passphrase, closing command channel");
                    Control::CloseCommand
                } else {
                    debug!(key_id = %main, "no passphrase for key, declining");
                    Control::Reply(Reply::Decline)
                }
            },
        }
    }

    fn mark_bad_passphrase(&mut self, key: String) {
        self.state.missing_passphrase.remove(&key);
        self.state.bad_passphrase.insert(key);
    }

    /// `ERROR <location> <code>` and `FAILURE <location> <code>` carry the
    /// outcome of a passphrase dialog when gpg sends no `BAD_PASSPHRASE`
    /// (loopback pinentry). The verdict applies to the key of the last
    /// `NEED_PASSPHRASE`.
    fn passphrase_failure(&mut self, event: &StatusEvent) {
        if !matches!(event.code, StatusCode::Error | StatusCode::Failure) {
            return;
        }
        let Some(code) = event
            .arg(1)
            .and_then(|c| c.parse::<u32>().ok())
            .map(|c| c & 0xFFFF)
        else {
            return;
        };
        let Some((key, _)) = self.pending_key.clone() else {
            return;
        };
        let answered = self.state.attempts.get(&key).is_some_and(|n| *n > 0);

        match code {
            GPG_ERR_BAD_PASSPHRASE if answered => {
                debug!(key_id = %key, location = event.arg(0).unwrap_or_default(), "passphrase rejected");
                self.mark_bad_passphrase(key);
            },
            GPG_ERR_BAD_PASSPHRASE | GPG_ERR_NO_PASSPHRASE | GPG_ERR_CANCELED => {
                if !self.state.bad_passphrase.contains(&key) {
                    self.state.missing_passphrase.insert(key);
                }
            },
            _ => {},
        }
    }

    fn missing_key(&mut self, key_id: Option<&str>) {
        let key = key_id.map(normalize_key_id).unwrap_or_default();
        if !key.is_empty() {
            debug!(key_id = %key, "key not available");
            self.state.missing_keys.insert(key);
        }
    }

    fn decrypt_event(&mut self, event: &StatusEvent) {
        match &event.code {
            StatusCode::EncTo => {
                if let Some(key) = event.arg(0) {
                    self.state.referenced_keys.insert(normalize_key_id(key));
                }
            },
            StatusCode::BeginDecryption => {
                self.state.markers.insert(Marker::BeginDecryption);
            },
            StatusCode::DecryptionOkay => {
                self.state.markers.insert(Marker::DecryptionOkay);
            },
            StatusCode::DecryptionFailed => {
                self.state.markers.insert(Marker::DecryptionFailed);
            },
            StatusCode::Error => self.state.warnings.push(event.to_string()),
            _ => trace!(code = %event.code, "ignored"),
        }
    }

    fn encrypt_event(&mut self, event: &StatusEvent) {
        match &event.code {
            StatusCode::EndEncryption => {
                self.state.markers.insert(Marker::EndEncryption);
            },
            StatusCode::SigCreated => {
                self.state.markers.insert(Marker::SigCreated);
            },
            StatusCode::Error => self.state.warnings.push(event.to_string()),
            _ => trace!(code = %event.code, "ignored"),
        }
    }

    fn sign_event(&mut self, event: &StatusEvent) {
        match &event.code {
            StatusCode::SigCreated => {
                self.state.markers.insert(Marker::SigCreated);
            },
            StatusCode::Error => self.state.warnings.push(event.to_string()),
            _ => trace!(code = %event.code, "ignored"),
        }
    }

    /// Builds signature records. Used by verify and decrypt-and-verify.
    fn signature_event(&mut self, event: &StatusEvent) {
        let status = match &event.code {
            StatusCode::NewSig => {
                self.state.signatures.push(Signature::empty());
                return;
            },
            StatusCode::GoodSig => SignatureStatus::Good,
            StatusCode::ExpSig => SignatureStatus::ExpiredSignature,
            StatusCode::ExpKeySig => SignatureStatus::ExpiredKey,
            StatusCode::RevKeySig => SignatureStatus::RevokedKey,
            StatusCode::BadSig => SignatureStatus::Bad,
            StatusCode::ErrSig => SignatureStatus::Error,
            StatusCode::ValidSig => {
                let sig = self.current_signature();
                sig.key_fingerprint = event.arg(0).map(normalize_key_id);
                if let Some(created) = event.arg(2).and_then(parse_timestamp) {
                    sig.creation = Some(created);
                }
                sig.expiration = event.arg(3).and_then(parse_timestamp);
                sig.valid = true;
                return;
            },
            StatusCode::SigId => {
                let sig = self.current_signature();
                sig.id = event.arg(0).map(str::to_string);
                if sig.creation.is_none() {
                    sig.creation = event.arg(2).and_then(parse_timestamp);
                }
                return;
            },
            code => {
                let trust = match code {
                    StatusCode::TrustUndefined => TrustLevel::Undefined,
                    StatusCode::TrustNever => TrustLevel::Never,
                    StatusCode::TrustMarginal => TrustLevel::Marginal,
                    StatusCode::TrustFully => TrustLevel::Full,
                    StatusCode::TrustUltimate => TrustLevel::Ultimate,
                    _ => return,
                };
                if let Some(sig) = self.state.signatures.last_mut() {
                    sig.trust = Some(trust);
                }
                return;
            },
        };

        // A verdict line without a preceding NEWSIG (older gpg) still
        // describes one signature.
        let needs_new = self
            .state
            .signatures
            .last()
            .is_none_or(|sig| sig.status.is_some());
        if needs_new {
            self.state.signatures.push(Signature::empty());
        }
        let key_id = event.arg(0).map(normalize_key_id);
        if status == SignatureStatus::Error && event.arg(5) == Some(ERRSIG_NO_PUBKEY) {
            if let Some(key) = &key_id {
                self.state.missing_keys.insert(key.clone());
            }
        }

        let user_id = if status == SignatureStatus::Error {
            None
        } else {
            event.rest(1)
        };
        let sig = self.current_signature();
        sig.status = Some(status);
        sig.key_id = key_id;
        if user_id.is_some() {
            sig.user_id = user_id;
        }
        if matches!(status, SignatureStatus::Bad | SignatureStatus::Error) {
            sig.valid = false;
        }
    }

    fn current_signature(&mut self) -> &mut Signature {
        if self.state.signatures.is_empty() {
            self.state.signatures.push(Signature::empty());
        }
        let last = self.state.signatures.len() - 1;
        &mut self.state.signatures[last]
    }

    fn import_event(&mut self, event: &StatusEvent) {
        match &event.code {
            StatusCode::ImportOk => {
                self.state.markers.insert(Marker::Imported);
                if let Some(fpr) = event.arg(1).map(normalize_key_id) {
                    if !self.state.imported_fingerprints.contains(&fpr) {
                        self.state.imported_fingerprints.push(fpr);
                    }
                }
            },
            StatusCode::Imported => {
                self.state.markers.insert(Marker::Imported);
            },
            StatusCode::ImportRes => {
                self.state.markers.insert(Marker::Imported);
                let count = |i: usize| event.arg(i).and_then(|v| v.parse().ok()).unwrap_or(0);
                self.state.import = Some(ImportCounts {
                    considered: count(0),
                    imported: count(2),
                    unchanged: count(4),
                    secret_read: count(9),
                    secret_imported: count(10),
                    secret_unchanged: count(11),
                    not_imported: count(13),
                });
            },
            StatusCode::ImportProblem | StatusCode::Error => {
                self.state.warnings.push(event.to_string());
            },
            _ => trace!(code = %event.code, "ignored"),
        }
    }

    fn export_event(&mut self, event: &StatusEvent) {
        match &event.code {
            StatusCode::Exported => {
                self.state.markers.insert(Marker::Exported);
                if let Some(fpr) = event.arg(0) {
                    self.state.exported_fingerprints.push(normalize_key_id(fpr));
                }
            },
            StatusCode::Error => self.keylist_error(event),
            _ => trace!(code = %event.code, "ignored"),
        }
    }

    fn delete_event(&mut self, event: &StatusEvent) {
        match &event.code {
            StatusCode::DeleteProblem => {
                let code = event.arg(0).and_then(|c| c.parse().ok()).unwrap_or(0);
                debug!(code, "delete problem");
                self.state.delete_problem = Some(code);
            },
            StatusCode::Error => self.keylist_error(event),
            _ => trace!(code = %event.code, "ignored"),
        }
    }

    fn generate_event(&mut self, event: &StatusEvent) {
        match &event.code {
            StatusCode::KeyCreated => {
                let handle = event.arg(2);
                if self.handle.is_some() && handle != self.handle.as_deref() {
                    debug!(?handle, "KEY_CREATED for another request");
                    return;
                }
                self.state.markers.insert(Marker::KeyCreated);
                self.state.created_fingerprint = event.arg(1).map(normalize_key_id);
            },
            StatusCode::KeyNotCreated => {
                self.state.markers.insert(Marker::KeyNotCreated);
            },
            StatusCode::Error => self.state.warnings.push(event.to_string()),
            _ => trace!(code = %event.code, "ignored"),
        }
    }

    fn list_event(&mut self, event: &StatusEvent) {
        match &event.code {
            StatusCode::Error => self.keylist_error(event),
            _ => trace!(code = %event.code, "ignored"),
        }
    }

    /// `ERROR <location> <code>` naming a key lookup failure marks the
    /// subject missing.
    fn keylist_error(&mut self, event: &StatusEvent) {
        self.state.warnings.push(event.to_string());
        let code = event
            .arg(1)
            .and_then(|c| c.parse::<u32>().ok())
            .map(|c| c & 0xFFFF);
        if matches!(code, Some(GPG_ERR_NO_PUBKEY | GPG_ERR_NO_SECKEY)) {
            let subject = self.state.subject.clone();
            self.missing_key(subject.as_deref());
        }
    }
}

fn answer_bool(keyword: &str) -> Control {
    let yes = matches!(
        keyword,
        "delete_key.okay" | "delete_key.secret.okay" | "untrusted_key.override"
    );
    debug!(prompt = keyword, yes, "answering confirmation");
    Control::Reply(Reply::Line(if yes { "Y" } else { "N" }.to_string()))
}

impl StatusHandler for Interpreter {
    fn on_status(&mut self, event: &StatusEvent) -> Control {
        if self.state.terminal.is_some() {
            return Control::Fatal;
        }
        self.passphrase_failure(event);
        if let Some(control) = self.common(event) {
            return control;
        }

        match self.kind {
            OperationKind::Decrypt { verify } => {
                self.decrypt_event(event);
                if verify {
                    self.signature_event(event);
                }
            },
            OperationKind::Encrypt { .. } => self.encrypt_event(event),
            OperationKind::Sign => self.sign_event(event),
            OperationKind::Verify => self.signature_event(event),
            OperationKind::Import => self.import_event(event),
            OperationKind::Export => self.export_event(event),
            OperationKind::Delete => self.delete_event(event),
            OperationKind::Generate => self.generate_event(event),
            OperationKind::List => self.list_event(event),
        }
        Control::Continue
    }
}
