//! Encrypt, decrypt, sign and verify.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use gpg_driver::{Gpg, KeySet, Signature, SignMode};
use secrecy::ExposeSecret;

use super::{IoArgs, PassphraseArgs, print_json, require_keys};

/// Arguments for `encrypt`.
#[derive(Args, Debug)]
pub struct EncryptArgs {
    /// Recipient (repeatable)
    #[arg(short, long = "recipient", required = true)]
    pub recipients: Vec<String>,

    /// Also sign with this key (repeatable)
    #[arg(short = 'u', long = "local-user")]
    pub signers: Vec<String>,

    /// ASCII-armor the output
    #[arg(short, long)]
    pub armor: bool,

    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub passphrase: PassphraseArgs,
}

/// Arguments for `decrypt`.
#[derive(Args, Debug)]
pub struct DecryptArgs {
    /// Secret key to unlock with the passphrase (repeatable)
    #[arg(short, long = "key")]
    pub keys: Vec<String>,

    /// Also verify signatures and report them on stderr (or as JSON)
    #[arg(long)]
    pub verify: bool,

    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub passphrase: PassphraseArgs,
}

/// Signature style.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Mode {
    /// Signature and data in one message
    Normal,
    /// Cleartext signature
    Clear,
    /// Signature only
    Detached,
}

impl From<Mode> for SignMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Normal => Self::Normal,
            Mode::Clear => Self::Clear,
            Mode::Detached => Self::Detached,
        }
    }
}

/// Arguments for `sign`.
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Signing key (repeatable)
    #[arg(short = 'u', long = "local-user", required = true)]
    pub signers: Vec<String>,

    /// Signature style
    #[arg(long, value_enum, default_value = "normal")]
    pub mode: Mode,

    /// ASCII-armor the output
    #[arg(short, long)]
    pub armor: bool,

    #[command(flatten)]
    pub io: IoArgs,

    #[command(flatten)]
    pub passphrase: PassphraseArgs,
}

/// Arguments for `verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Signed data (stdin if omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Detached signature over the input
    #[arg(short, long)]
    pub signature: Option<PathBuf>,
}

/// `encrypt`
pub async fn encrypt(gpg: &Gpg, args: &EncryptArgs) -> Result<()> {
    require_keys(&args.recipients, "recipient")?;
    let mut keys = KeySet::new();
    for recipient in &args.recipients {
        keys.add_encrypt_key(recipient.as_str());
    }

    let sign = !args.signers.is_empty();
    if sign {
        let passphrase = args.passphrase.read()?;
        for signer in &args.signers {
            keys.add_sign_key(signer.as_str(), passphrase.expose_secret());
        }
    }

    // File streaming only covers plain encryption.
    if !sign {
        if let Some((input, output)) = args.io.files() {
            return gpg
                .encrypt_file(input, output, &keys, args.armor)
                .await
                .context("encryption failed");
        }
    }

    let data = args.io.read_input()?;
    let ciphertext = if sign {
        gpg.encrypt_and_sign(&data, &keys, args.armor).await
    } else {
        gpg.encrypt(&data, &keys, args.armor).await
    }
    .context("encryption failed")?;
    args.io.write_output(&ciphertext)
}

/// `decrypt`
pub async fn decrypt(gpg: &Gpg, args: &DecryptArgs, json: bool) -> Result<()> {
    let mut keys = KeySet::new();
    if !args.keys.is_empty() {
        let passphrase = args.passphrase.read()?;
        for key in &args.keys {
            keys.add_decrypt_key(key.as_str(), passphrase.expose_secret());
        }
    }

    if !args.verify {
        if let Some((input, output)) = args.io.files() {
            return gpg
                .decrypt_file(input, output, &keys)
                .await
                .context("decryption failed");
        }
        let data = args.io.read_input()?;
        let plaintext = gpg.decrypt(&data, &keys).await.context("decryption failed")?;
        return args.io.write_output(&plaintext);
    }

    let data = args.io.read_input()?;
    let result = gpg
        .decrypt_and_verify(&data, &keys)
        .await
        .context("decryption failed")?;
    args.io.write_output(&result.plaintext)?;
    report_signatures(&result.signatures, json)
}

/// `sign`
pub async fn sign(gpg: &Gpg, args: &SignArgs) -> Result<()> {
    require_keys(&args.signers, "signing key")?;
    let passphrase = args.passphrase.read()?;
    let mut keys = KeySet::new();
    for signer in &args.signers {
        keys.add_sign_key(signer.as_str(), passphrase.expose_secret());
    }

    if let Some((input, output)) = args.io.files() {
        return gpg
            .sign_file(input, output, &keys, args.mode.into(), args.armor)
            .await
            .context("signing failed");
    }
    let data = args.io.read_input()?;
    let signed = gpg
        .sign(&data, &keys, args.mode.into(), args.armor)
        .await
        .context("signing failed")?;
    args.io.write_output(&signed)
}

/// `verify`: exits non-zero unless every signature is valid.
pub async fn verify(gpg: &Gpg, args: &VerifyArgs, json: bool) -> Result<()> {
    let signatures = match (&args.input, &args.signature) {
        (Some(input), signature) => gpg.verify_file(input, signature.as_deref()).await,
        (None, Some(signature)) => {
            let data = super::read_source(None)?;
            let signature = super::read_source(Some(signature))?;
            gpg.verify(&data, Some(&signature)).await
        },
        (None, None) => gpg.verify(&super::read_source(None)?, None).await,
    }
    .context("verification failed")?;

    report_signatures(&signatures, json)?;
    if signatures.iter().any(|s| !s.valid) {
        bail!("bad signature");
    }
    Ok(())
}

fn report_signatures(signatures: &[Signature], json: bool) -> Result<()> {
    if json {
        return print_json(&signatures);
    }
    for sig in signatures {
        eprintln!(
            "{} signature from {} [{}]",
            if sig.valid { "Good" } else { "BAD" },
            sig.user_id.as_deref().unwrap_or("unknown user"),
            sig.key_fingerprint
                .as_deref()
                .or(sig.key_id.as_deref())
                .unwrap_or("unknown key"),
        );
    }
    Ok(())
}
