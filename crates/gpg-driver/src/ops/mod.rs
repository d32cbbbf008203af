//! The public operations.
//!
//! [`Gpg`] turns each call into an [`InvocationSpec`], runs it through one
//! [`Pump`] with an [`Interpreter`] as status handler, asks
//! [`classify`](crate::classify::classify) for the verdict and shapes the
//! result. Nothing here interprets status lines or touches a pipe.
//!
//! Configuration is fixed when the [`Gpg`] is built; the keys for one call
//! come from a [`KeySet`] the caller owns.

mod args;
mod keyset;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroize;

pub use self::keyset::KeySet;
use crate::classify::classify;
use crate::config::{ConfigError, GpgConfig};
use crate::error::GpgError;
use crate::interpreter::{Interpreter, OperationKind, OperationState};
use crate::keys::{Key, KeyParams, Signature, merge_secret, parse_colons};
use crate::passphrase::PassphraseSource;
use crate::process::{
    AbortHandle, AbortSignal, Input, InvocationSpec, Output, Pump, PumpOutput, spawn,
};

/// Distinguishes concurrent key-generation requests in `KEY_CREATED`.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// How [`Gpg::sign`] wraps the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignMode {
    /// Signature and data in one OpenPGP message.
    #[default]
    Normal,
    /// Cleartext signature: readable data followed by an armored signature.
    Clear,
    /// Only the signature.
    Detached,
}

/// What [`Gpg::import_key`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Fingerprints of the keys processed, in order.
    pub fingerprints: Vec<String>,
    /// Public keys newly added.
    pub public_imported: u64,
    /// Public keys already present and unchanged.
    pub public_unchanged: u64,
    /// Secret keys newly added.
    pub private_imported: u64,
    /// Secret keys already present.
    pub private_unchanged: u64,
}

impl ImportResult {
    fn from_state(state: OperationState) -> Self {
        let counts = state.import.unwrap_or_default();
        Self {
            fingerprints: state.imported_fingerprints,
            public_imported: counts.imported,
            public_unchanged: counts.unchanged,
            private_imported: counts.secret_imported,
            private_unchanged: counts.secret_unchanged,
        }
    }

    /// The first fingerprint, for single-key imports.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprints.first().map(String::as_str)
    }
}

/// Output of [`Gpg::decrypt_and_verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptAndVerify {
    /// The decrypted data.
    pub plaintext: Vec<u8>,
    /// Signatures found on the data, possibly none.
    pub signatures: Vec<Signature>,
}

/// One prepared invocation.
struct Invocation {
    spec: InvocationSpec,
    interpreter: Interpreter,
    stdin: Option<Input>,
    extra: Option<Input>,
    output: Output,
}

impl Invocation {
    fn new(spec: InvocationSpec, interpreter: Interpreter) -> Self {
        Self {
            spec,
            interpreter,
            stdin: None,
            extra: None,
            output: Output::Memory,
        }
    }

    fn with_stdin(mut self, input: Input) -> Self {
        self.stdin = Some(input);
        self
    }

    fn with_extra_input(mut self, input: Input) -> Self {
        self.extra = Some(input);
        self
    }

    fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }
}

/// A finished, successful invocation.
struct Completed {
    state: OperationState,
    output: PumpOutput,
}

/// Handle to a gpg installation and keyring.
///
/// Cheap to clone, `Send + Sync`; every call spawns its own gpg process,
/// so calls may run concurrently.
#[derive(Debug, Clone)]
pub struct Gpg {
    config: Arc<GpgConfig>,
    abort: Option<AbortSignal>,
}

impl Gpg {
    /// Creates a handle after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the configuration is unusable.
    pub fn new(config: GpgConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            abort: None,
        })
    }

    /// Makes every operation on the returned handle abort when `handle`
    /// fires.
    #[must_use]
    pub fn with_abort(mut self, handle: &AbortHandle) -> Self {
        self.abort = Some(handle.signal());
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &GpgConfig {
        &self.config
    }

    fn base(&self) -> InvocationSpec {
        args::base(&self.config)
    }

    /// Runs one invocation to completion and classifies it.
    async fn execute(&self, invocation: Invocation) -> Result<Completed, GpgError> {
        let Invocation {
            spec,
            mut interpreter,
            stdin,
            extra,
            output,
        } = invocation;
        let kind = interpreter.kind();

        let spawned = spawn(&spec)?;
        debug!(?kind, pid = spawned.pid, command = %spawned.command_line, "running gpg");

        let mut pump = Pump::new(spawned)
            .with_output(output)
            .with_abort(self.abort.clone())
            .with_timeout(self.config.timeout())
            .with_grace(self.config.abort_grace());
        if let Some(input) = stdin {
            pump = pump.with_stdin(input);
        }
        if let Some(input) = extra {
            pump = pump.with_extra_input(input);
        }

        let mut output = pump.run(&mut interpreter).await?;
        let state = interpreter.into_state();
        if let Err(e) = classify(kind, &state, &output) {
            output.stdout.zeroize();
            return Err(e);
        }
        Ok(Completed { state, output })
    }

    /// Runs an invocation whose stdout goes to `path`, removing the file
    /// again if the operation fails.
    async fn execute_to_file(
        &self,
        invocation: Invocation,
        path: &Path,
    ) -> Result<Completed, GpgError> {
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|e| GpgError::file_access(path, &e))?;
        let invocation = invocation.with_output(Output::Writer {
            writer: Box::new(file),
            path: path.to_path_buf(),
        });

        let result = self.execute(invocation).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!(path = %path.display(), error = %e, "could not remove partial output");
            }
        }
        result
    }

    /// Resolves each identifier to one key satisfying `usable`.
    async fn resolve(
        &self,
        key_ids: &[&str],
        usable: fn(&Key) -> bool,
    ) -> Result<Vec<(String, Key)>, GpgError> {
        let mut found = Vec::with_capacity(key_ids.len());
        let mut missing = Vec::new();
        for key_id in key_ids {
            let key_id = args::check_key_id(key_id)?;
            match self.get_keys(Some(key_id)).await?.into_iter().find(usable) {
                Some(key) => found.push((key_id.to_string(), key)),
                None => missing.push(key_id.to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(GpgError::KeyNotFound { key_ids: missing });
        }
        Ok(found)
    }

    /// Resolves the recipients of `keys`.
    async fn recipients(&self, keys: &KeySet) -> Result<Vec<String>, GpgError> {
        let ids: Vec<&str> = keys.encrypt_keys().collect();
        if ids.is_empty() {
            return Err(GpgError::InvalidArgument(
                "no encryption keys specified".into(),
            ));
        }
        let resolved = self.resolve(&ids, Key::can_encrypt).await?;
        Ok(resolved.iter().map(|(_, key)| selector(key)).collect())
    }

    /// Resolves the signers of `keys`, registering their passphrases.
    async fn signers(
        &self,
        keys: &KeySet,
        passphrases: &mut PassphraseSource,
    ) -> Result<Vec<String>, GpgError> {
        let entries = keys.sign_entries();
        if entries.is_empty() {
            return Err(GpgError::InvalidArgument("no signing keys specified".into()));
        }
        let ids: Vec<&str> = entries.iter().map(|(id, _)| id.as_str()).collect();
        let resolved = self
            .resolve(&ids, |k| k.can_sign() && k.has_private())
            .await?;

        for ((key_id, key), (_, passphrase)) in resolved.iter().zip(entries) {
            if let Some(passphrase) = passphrase {
                keyset::register(passphrases, key_id, std::slice::from_ref(key), passphrase);
            }
        }
        Ok(resolved.iter().map(|(_, key)| selector(key)).collect())
    }

    /// Registers the passphrases of the decryption keys of `keys`. Keys
    /// that are not in the keyring are registered by id only.
    async fn decrypt_passphrases(&self, keys: &KeySet) -> Result<PassphraseSource, GpgError> {
        let mut passphrases = PassphraseSource::new();
        for (key_id, passphrase) in keys.decrypt_entries() {
            let Some(passphrase) = passphrase else {
                continue;
            };
            let key_id = args::check_key_id(key_id)?;
            let found = self.get_keys(Some(key_id)).await?;
            keyset::register(&mut passphrases, key_id, &found, passphrase);
        }
        Ok(passphrases)
    }

    async fn encrypt_invocation(
        &self,
        keys: &KeySet,
        sign: bool,
        armor: bool,
    ) -> Result<Invocation, GpgError> {
        let recipients = self.recipients(keys).await?;
        let mut passphrases = PassphraseSource::new();
        let signers = if sign {
            self.signers(keys, &mut passphrases).await?
        } else {
            Vec::new()
        };
        let spec = args::encrypt(self.base(), &recipients, &signers, armor);
        Ok(Invocation::new(
            spec,
            Interpreter::new(OperationKind::Encrypt { sign }, passphrases),
        ))
    }

    async fn decrypt_invocation(&self, keys: &KeySet, verify: bool) -> Result<Invocation, GpgError> {
        let passphrases = self.decrypt_passphrases(keys).await?;
        Ok(Invocation::new(
            args::decrypt(self.base()),
            Interpreter::new(OperationKind::Decrypt { verify }, passphrases),
        ))
    }

    async fn sign_invocation(
        &self,
        keys: &KeySet,
        mode: SignMode,
        armor: bool,
    ) -> Result<Invocation, GpgError> {
        let mut passphrases = PassphraseSource::new();
        let signers = self.signers(keys, &mut passphrases).await?;
        Ok(Invocation::new(
            args::sign(self.base(), &signers, mode, armor),
            Interpreter::new(OperationKind::Sign, passphrases),
        ))
    }

    fn verify_invocation(&self, detached: bool) -> Invocation {
        Invocation::new(
            args::verify(self.base(), detached),
            Interpreter::new(OperationKind::Verify, PassphraseSource::new()),
        )
    }

    /// Encrypts `data` to every recipient in `keys`.
    ///
    /// # Errors
    ///
    /// [`GpgError::InvalidArgument`] without recipients,
    /// [`GpgError::KeyNotFound`] for recipients with no usable key, or any
    /// failure of the gpg run.
    pub async fn encrypt(&self, data: &[u8], keys: &KeySet, armor: bool) -> Result<Vec<u8>, GpgError> {
        let invocation = self
            .encrypt_invocation(keys, false, armor)
            .await?
            .with_stdin(Input::Bytes(data.to_vec()));
        Ok(self.execute(invocation).await?.output.stdout)
    }

    /// Encrypts `data` to every recipient in `keys` and signs it with every
    /// signer.
    ///
    /// # Errors
    ///
    /// As [`encrypt`](Self::encrypt), plus [`GpgError::BadPassphrase`] for
    /// a signer whose passphrase is wrong or missing.
    pub async fn encrypt_and_sign(
        &self,
        data: &[u8],
        keys: &KeySet,
        armor: bool,
    ) -> Result<Vec<u8>, GpgError> {
        let invocation = self
            .encrypt_invocation(keys, true, armor)
            .await?
            .with_stdin(Input::Bytes(data.to_vec()));
        Ok(self.execute(invocation).await?.output.stdout)
    }

    /// Encrypts the file at `input` into `output`.
    ///
    /// # Errors
    ///
    /// As [`encrypt`](Self::encrypt), plus [`GpgError::FileAccess`] for
    /// either path.
    pub async fn encrypt_file(
        &self,
        input: &Path,
        output: &Path,
        keys: &KeySet,
        armor: bool,
    ) -> Result<(), GpgError> {
        let source = open_input(input).await?;
        let invocation = self
            .encrypt_invocation(keys, false, armor)
            .await?
            .with_stdin(source);
        self.execute_to_file(invocation, output).await?;
        Ok(())
    }

    /// Decrypts `data`.
    ///
    /// # Errors
    ///
    /// [`GpgError::NoData`] for input that is not OpenPGP data,
    /// [`GpgError::KeyNotFound`] when no secret key for any recipient is
    /// present, [`GpgError::BadPassphrase`] when the passphrase is wrong or
    /// missing. No plaintext is returned on failure.
    pub async fn decrypt(&self, data: &[u8], keys: &KeySet) -> Result<Vec<u8>, GpgError> {
        if data.is_empty() {
            return Err(GpgError::NoData);
        }
        let invocation = self
            .decrypt_invocation(keys, false)
            .await?
            .with_stdin(Input::Bytes(data.to_vec()));
        Ok(self.execute(invocation).await?.output.stdout)
    }

    /// Decrypts `data` and collects the signatures on it. Signed but
    /// unencrypted input is accepted too.
    ///
    /// # Errors
    ///
    /// As [`decrypt`](Self::decrypt).
    pub async fn decrypt_and_verify(
        &self,
        data: &[u8],
        keys: &KeySet,
    ) -> Result<DecryptAndVerify, GpgError> {
        if data.is_empty() {
            return Err(GpgError::NoData);
        }
        let invocation = self
            .decrypt_invocation(keys, true)
            .await?
            .with_stdin(Input::Bytes(data.to_vec()));
        let completed = self.execute(invocation).await?;
        Ok(DecryptAndVerify {
            plaintext: completed.output.stdout,
            signatures: completed.state.signatures,
        })
    }

    /// Decrypts the file at `input` into `output`. The output file is
    /// removed if decryption fails.
    ///
    /// # Errors
    ///
    /// As [`decrypt`](Self::decrypt), plus [`GpgError::FileAccess`] for
    /// either path.
    pub async fn decrypt_file(&self, input: &Path, output: &Path, keys: &KeySet) -> Result<(), GpgError> {
        let source = open_nonempty_input(input).await?;
        let invocation = self.decrypt_invocation(keys, false).await?.with_stdin(source);
        self.execute_to_file(invocation, output).await?;
        Ok(())
    }

    /// Signs `data` with every signer in `keys`.
    ///
    /// `armor` is ignored for [`SignMode::Clear`], which is always text.
    ///
    /// # Errors
    ///
    /// [`GpgError::InvalidArgument`] without signers,
    /// [`GpgError::KeyNotFound`] for a signer without a usable secret key,
    /// [`GpgError::BadPassphrase`] for a wrong or missing passphrase.
    pub async fn sign(
        &self,
        data: &[u8],
        keys: &KeySet,
        mode: SignMode,
        armor: bool,
    ) -> Result<Vec<u8>, GpgError> {
        let invocation = self
            .sign_invocation(keys, mode, armor)
            .await?
            .with_stdin(Input::Bytes(data.to_vec()));
        Ok(self.execute(invocation).await?.output.stdout)
    }

    /// Signs the file at `input` into `output`.
    ///
    /// # Errors
    ///
    /// As [`sign`](Self::sign), plus [`GpgError::FileAccess`] for either
    /// path.
    pub async fn sign_file(
        &self,
        input: &Path,
        output: &Path,
        keys: &KeySet,
        mode: SignMode,
        armor: bool,
    ) -> Result<(), GpgError> {
        let source = open_input(input).await?;
        let invocation = self.sign_invocation(keys, mode, armor).await?.with_stdin(source);
        self.execute_to_file(invocation, output).await?;
        Ok(())
    }

    /// Verifies signed data.
    ///
    /// With `detached` set, `data` is the signed content and `detached` the
    /// signature; otherwise `data` is a signed or clear-signed message.
    /// Bad signatures are returned, marked invalid, not reported as errors.
    ///
    /// # Errors
    ///
    /// [`GpgError::NoData`] when there is no signature to check.
    pub async fn verify(&self, data: &[u8], detached: Option<&[u8]>) -> Result<Vec<Signature>, GpgError> {
        let invocation = match detached {
            Some(signature) => {
                if signature.is_empty() {
                    return Err(GpgError::NoData);
                }
                self.verify_invocation(true)
                    .with_stdin(Input::Bytes(signature.to_vec()))
                    .with_extra_input(Input::Bytes(data.to_vec()))
            },
            None => {
                if data.is_empty() {
                    return Err(GpgError::NoData);
                }
                self.verify_invocation(false)
                    .with_stdin(Input::Bytes(data.to_vec()))
            },
        };
        Ok(self.execute(invocation).await?.state.signatures)
    }

    /// Verifies the file at `input`, against the detached signature at
    /// `signature` when given.
    ///
    /// # Errors
    ///
    /// As [`verify`](Self::verify), plus [`GpgError::FileAccess`] for
    /// either path.
    pub async fn verify_file(&self, input: &Path, signature: Option<&Path>) -> Result<Vec<Signature>, GpgError> {
        let invocation = match signature {
            Some(signature) => {
                let signature = open_nonempty_input(signature).await?;
                let data = open_input(input).await?;
                self.verify_invocation(true)
                    .with_stdin(signature)
                    .with_extra_input(data)
            },
            None => {
                let data = open_nonempty_input(input).await?;
                self.verify_invocation(false).with_stdin(data)
            },
        };
        Ok(self.execute(invocation).await?.state.signatures)
    }

    /// Imports public or secret key material.
    ///
    /// Importing the same material again succeeds with zero imported and
    /// non-zero unchanged counts.
    ///
    /// # Errors
    ///
    /// [`GpgError::NoData`] when `data` contains no key material.
    pub async fn import_key(&self, data: &[u8]) -> Result<ImportResult, GpgError> {
        if data.is_empty() {
            return Err(GpgError::NoData);
        }
        let invocation = Invocation::new(
            args::import(self.base()),
            Interpreter::new(OperationKind::Import, PassphraseSource::new()),
        )
        .with_stdin(Input::Bytes(data.to_vec()));

        let result = ImportResult::from_state(self.execute(invocation).await?.state);
        info!(
            fingerprints = ?result.fingerprints,
            public_imported = result.public_imported,
            private_imported = result.private_imported,
            "keys imported"
        );
        Ok(result)
    }

    /// Exports a public key.
    ///
    /// # Errors
    ///
    /// [`GpgError::KeyNotFound`] when no key matches `key_id`.
    pub async fn export_public_key(&self, key_id: &str, armor: bool) -> Result<Vec<u8>, GpgError> {
        let key_id = args::check_key_id(key_id)?;
        let invocation = Invocation::new(
            args::export(self.base(), key_id, false, armor),
            Interpreter::new(OperationKind::Export, PassphraseSource::new()).with_subject(key_id),
        );
        Ok(self.execute(invocation).await?.output.stdout)
    }

    /// Exports a secret key. gpg asks for its passphrase, which is taken
    /// from the sign and decrypt entries of `keys`.
    ///
    /// # Errors
    ///
    /// [`GpgError::KeyNotFound`] when no secret key matches `key_id`,
    /// [`GpgError::BadPassphrase`] for a wrong or missing passphrase.
    pub async fn export_private_key(
        &self,
        key_id: &str,
        armor: bool,
        keys: &KeySet,
    ) -> Result<Vec<u8>, GpgError> {
        let key_id = args::check_key_id(key_id)?;
        let found: Vec<Key> = self
            .get_keys(Some(key_id))
            .await?
            .into_iter()
            .filter(Key::has_private)
            .collect();
        let Some(key) = found.first() else {
            return Err(GpgError::KeyNotFound {
                key_ids: vec![key_id.to_string()],
            });
        };

        let mut passphrases = PassphraseSource::new();
        for (id, passphrase) in keys.sign_entries().iter().chain(keys.decrypt_entries()) {
            if let Some(passphrase) = passphrase {
                if key.matches(id) || id == key_id {
                    keyset::register(&mut passphrases, id, &found, passphrase);
                }
            }
        }

        let invocation = Invocation::new(
            args::export(self.base(), &selector(key), true, armor),
            Interpreter::new(OperationKind::Export, passphrases).with_subject(key_id),
        );
        Ok(self.execute(invocation).await?.output.stdout)
    }

    /// Deletes a public key.
    ///
    /// # Errors
    ///
    /// [`GpgError::KeyNotFound`] when no key matches `key_id`,
    /// [`GpgError::DeletePrivateKeyRequired`] while its secret key is
    /// still present.
    pub async fn delete_public_key(&self, key_id: &str) -> Result<(), GpgError> {
        self.delete(key_id, false).await
    }

    /// Deletes a secret key, leaving the public key in place.
    ///
    /// # Errors
    ///
    /// [`GpgError::KeyNotFound`] when no secret key matches `key_id`.
    pub async fn delete_private_key(&self, key_id: &str) -> Result<(), GpgError> {
        self.delete(key_id, true).await
    }

    async fn delete(&self, key_id: &str, secret: bool) -> Result<(), GpgError> {
        let key_id = args::check_key_id(key_id)?;
        let key = self
            .get_keys(Some(key_id))
            .await?
            .into_iter()
            .find(|k| !secret || k.has_private())
            .ok_or_else(|| GpgError::KeyNotFound {
                key_ids: vec![key_id.to_string()],
            })?;

        let fingerprint = selector(&key);
        let invocation = Invocation::new(
            args::delete(self.base(), &fingerprint, secret),
            Interpreter::new(OperationKind::Delete, PassphraseSource::new()).with_subject(key_id),
        );
        self.execute(invocation).await?;
        info!(fingerprint = %fingerprint, secret, "key deleted");
        Ok(())
    }

    /// Lists keys, all of them or those matching `key_id`, with
    /// secret-key presence filled in. No match is an empty list, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Any failure of the gpg run other than the key not existing.
    pub async fn get_keys(&self, key_id: Option<&str>) -> Result<Vec<Key>, GpgError> {
        let key_id = key_id.map(args::check_key_id).transpose()?;

        let mut public = match self.list(key_id, false).await {
            Err(GpgError::KeyNotFound { .. }) => return Ok(Vec::new()),
            other => other?,
        };
        let secret = match self.list(key_id, true).await {
            Err(GpgError::KeyNotFound { .. }) => Vec::new(),
            other => other?,
        };
        merge_secret(&mut public, &secret);
        Ok(public)
    }

    async fn list(&self, key_id: Option<&str>, secret: bool) -> Result<Vec<Key>, GpgError> {
        let mut interpreter = Interpreter::new(OperationKind::List, PassphraseSource::new());
        if let Some(key_id) = key_id {
            interpreter = interpreter.with_subject(key_id);
        }
        let invocation = Invocation::new(args::list(self.base(), key_id, secret), interpreter);
        let completed = self.execute(invocation).await?;
        Ok(parse_colons(&String::from_utf8_lossy(&completed.output.stdout)))
    }

    /// The primary fingerprint of the first key matching `key_id`.
    ///
    /// # Errors
    ///
    /// As [`get_keys`](Self::get_keys).
    pub async fn get_fingerprint(&self, key_id: &str) -> Result<Option<String>, GpgError> {
        Ok(self
            .get_keys(Some(key_id))
            .await?
            .first()
            .and_then(|k| k.fingerprint().map(str::to_string)))
    }

    /// Generates a key pair and returns it as listed afterwards.
    ///
    /// # Errors
    ///
    /// [`GpgError::InvalidArgument`] for invalid parameters, or any failure
    /// of the gpg run.
    pub async fn generate_key(&self, params: &KeyParams) -> Result<Key, GpgError> {
        let handle = format!(
            "gpg-driver-{}-{}",
            std::process::id(),
            NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
        );
        let parameters = params
            .render(&handle)
            .map_err(|e| GpgError::InvalidArgument(e.to_string()))?;

        let invocation = Invocation::new(
            args::generate(self.base()),
            Interpreter::new(OperationKind::Generate, PassphraseSource::new()).with_handle(&handle),
        )
        .with_stdin(Input::Bytes(parameters.as_bytes().to_vec()));
        let completed = self.execute(invocation).await?;

        let fingerprint = completed.state.created_fingerprint.unwrap_or_default();
        info!(fingerprint = %fingerprint, email = params.email(), "key generated");
        self.get_keys(Some(fingerprint.as_str()))
            .await?
            .into_iter()
            .find(|k| k.fingerprint() == Some(fingerprint.as_str()))
            .ok_or_else(|| GpgError::KeyNotFound {
                key_ids: vec![fingerprint],
            })
    }
}

/// How a resolved key is named on the gpg command line.
fn selector(key: &Key) -> String {
    key.fingerprint().unwrap_or_else(|| key.id()).to_string()
}

async fn open_input(path: &Path) -> Result<Input, GpgError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| GpgError::file_access(path, &e))?;
    Ok(Input::Reader {
        reader: Box::new(file),
        path: PathBuf::from(path),
    })
}

/// Opens an input that must hold OpenPGP data; an empty file has none.
async fn open_nonempty_input(path: &Path) -> Result<Input, GpgError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| GpgError::file_access(path, &e))?;
    if metadata.is_file() && metadata.len() == 0 {
        return Err(GpgError::NoData);
    }
    open_input(path).await
}
