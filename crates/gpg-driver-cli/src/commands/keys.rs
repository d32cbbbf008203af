//! Key management: import, export, delete, list, generate.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use gpg_driver::{Gpg, Key, KeyAlgorithm, KeyParams, KeySet};
use secrecy::ExposeSecret;

use super::{PassphraseArgs, print_json, read_source, write_stdout};

/// Arguments for `import`.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Key file (stdin if omitted)
    pub file: Option<PathBuf>,
}

/// Arguments for `export`.
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Key id, fingerprint or user id
    pub key_id: String,

    /// Export the secret key
    #[arg(long)]
    pub secret: bool,

    /// ASCII-armor the output
    #[arg(short, long)]
    pub armor: bool,

    #[command(flatten)]
    pub passphrase: PassphraseArgs,
}

/// Arguments for `delete`.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Key id, fingerprint or user id
    pub key_id: String,

    /// Delete the secret key only
    #[arg(long)]
    pub secret: bool,
}

/// Arguments for `list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only keys matching this id
    pub key_id: Option<String>,

    /// Only keys with a secret part
    #[arg(long)]
    pub secret: bool,
}

/// Key type for `generate`.
#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Algorithm {
    /// RSA 3072
    Rsa,
    /// DSA 2048 with Elgamal
    Dsa,
    /// Ed25519 with Curve25519
    Ed25519,
}

impl From<Algorithm> for KeyAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Rsa => Self::Rsa(3072),
            Algorithm::Dsa => Self::Dsa(2048),
            Algorithm::Ed25519 => Self::Ed25519,
        }
    }
}

/// Arguments for `generate`.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Real name
    #[arg(long)]
    pub name: String,

    /// E-mail address
    #[arg(long)]
    pub email: String,

    /// User-id comment
    #[arg(long)]
    pub comment: Option<String>,

    /// Key type
    #[arg(long, value_enum, default_value = "rsa")]
    pub algorithm: Algorithm,

    /// Expiry (`0`, `2y`, `2030-01-01`)
    #[arg(long)]
    pub expire: Option<String>,

    #[command(flatten)]
    pub passphrase: PassphraseArgs,
}

/// `import`
pub async fn import(gpg: &Gpg, args: &ImportArgs, json: bool) -> Result<()> {
    let data = read_source(args.file.as_deref())?;
    let result = gpg.import_key(&data).await.context("import failed")?;
    if json {
        return print_json(&result);
    }
    println!(
        "public: {} imported, {} unchanged; secret: {} imported, {} unchanged",
        result.public_imported,
        result.public_unchanged,
        result.private_imported,
        result.private_unchanged
    );
    for fingerprint in &result.fingerprints {
        println!("{fingerprint}");
    }
    Ok(())
}

/// `export`
pub async fn export(gpg: &Gpg, args: &ExportArgs) -> Result<()> {
    let data = if args.secret {
        let passphrase = args.passphrase.read()?;
        let mut keys = KeySet::new();
        keys.add_sign_key(args.key_id.as_str(), passphrase.expose_secret());
        gpg.export_private_key(&args.key_id, args.armor, &keys).await
    } else {
        gpg.export_public_key(&args.key_id, args.armor).await
    }
    .with_context(|| format!("failed to export {}", args.key_id))?;
    write_stdout(&data)
}

/// `delete`
pub async fn delete(gpg: &Gpg, args: &DeleteArgs) -> Result<()> {
    if args.secret {
        gpg.delete_private_key(&args.key_id).await
    } else {
        gpg.delete_public_key(&args.key_id).await
    }
    .with_context(|| format!("failed to delete {}", args.key_id))
}

/// `list`
pub async fn list(gpg: &Gpg, args: &ListArgs, json: bool) -> Result<()> {
    let mut keys = gpg
        .get_keys(args.key_id.as_deref())
        .await
        .context("failed to list keys")?;
    if args.secret {
        keys.retain(Key::has_private);
    }

    if json {
        return print_json(&keys);
    }
    for key in &keys {
        print_key(key);
    }
    Ok(())
}

/// `fingerprint`
pub async fn fingerprint(gpg: &Gpg, key_id: &str) -> Result<()> {
    match gpg
        .get_fingerprint(key_id)
        .await
        .context("failed to look up key")?
    {
        Some(fingerprint) => {
            println!("{fingerprint}");
            Ok(())
        },
        None => bail!("key not found: {key_id}"),
    }
}

/// `generate`
pub async fn generate(gpg: &Gpg, args: &GenerateArgs, json: bool) -> Result<()> {
    let mut params = KeyParams::new(args.name.as_str(), args.email.as_str())
        .with_algorithm(args.algorithm.into())
        .with_passphrase(args.passphrase.read()?);
    if let Some(comment) = &args.comment {
        params = params.with_comment(comment.as_str());
    }
    if let Some(expire) = &args.expire {
        params = params.with_expire_date(expire.as_str());
    }

    let key = gpg
        .generate_key(&params)
        .await
        .context("key generation failed")?;
    if json {
        return print_json(&key);
    }
    print_key(&key);
    Ok(())
}

fn print_key(key: &Key) {
    let marker = if key.has_private() { "sec" } else { "pub" };
    println!(
        "{marker}  {:?}/{}  {}",
        key.primary.algorithm,
        key.primary.length,
        key.fingerprint().unwrap_or_else(|| key.id())
    );
    for uid in &key.user_ids {
        let state = if uid.is_revoked { " [revoked]" } else { "" };
        println!("uid  {}{state}", uid.uid);
    }
    for sub in &key.subkeys {
        println!(
            "sub  {:?}/{}  {}",
            sub.algorithm,
            sub.length,
            sub.fingerprint.as_deref().unwrap_or(&sub.id)
        );
    }
}
