//! gpg argument lists, one builder per operation.
//!
//! Every invocation starts from [`base`]: batch mode, status and command
//! pipes, loopback pinentry, then the configured keyrings and preferences,
//! then the raw extra arguments. Operation options and the command itself
//! come last so file operands always end the list.

use super::SignMode;
use crate::config::GpgConfig;
use crate::error::GpgError;
use crate::process::{Arg, Channels, FdRole, InvocationSpec};

/// Options every invocation carries.
pub(super) fn base(config: &GpgConfig) -> InvocationSpec {
    let mut spec = InvocationSpec::new(config.binary.clone())
        .with_channels(Channels::STATUS | Channels::COMMAND)
        .with_arg("--status-fd")
        .with_arg(Arg::Fd(FdRole::Status))
        .with_arg("--command-fd")
        .with_arg(Arg::Fd(FdRole::Command))
        .with_args([
            "--no-tty",
            "--batch",
            "--no-permission-warning",
            "--exit-on-status-write-error",
            "--trust-model",
            "always",
            "--pinentry-mode",
            "loopback",
        ]);

    if let Some(homedir) = &config.homedir {
        spec = spec
            .with_homedir(homedir.clone())
            .with_arg("--homedir")
            .with_arg(homedir.as_path());
    }
    if let Some(keyring) = &config.public_keyring {
        spec = spec
            .with_arg("--no-default-keyring")
            .with_arg("--keyring")
            .with_arg(keyring.as_path());
    }
    if let Some(keyring) = &config.private_keyring {
        spec = spec.with_arg("--secret-keyring").with_arg(keyring.as_path());
    }
    if let Some(trustdb) = &config.trustdb {
        spec = spec.with_arg("--trustdb-name").with_arg(trustdb.as_path());
    }
    if let Some(algo) = &config.digest_algo {
        spec = spec
            .with_arg("--personal-digest-preferences")
            .with_arg(algo.as_str());
    }
    if let Some(algo) = &config.cipher_algo {
        spec = spec
            .with_arg("--personal-cipher-preferences")
            .with_arg(algo.as_str());
    }
    spec.with_args(config.extra_args.iter().map(String::as_str))
}

/// Rejects identifiers gpg would read as something else.
pub(super) fn check_key_id(key_id: &str) -> Result<&str, GpgError> {
    let trimmed = key_id.trim();
    if trimmed.is_empty() {
        return Err(GpgError::InvalidArgument("key id must not be empty".into()));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(GpgError::InvalidArgument(format!(
            "key id contains control characters: {trimmed:?}"
        )));
    }
    Ok(trimmed)
}

fn armored(spec: InvocationSpec, armor: bool) -> InvocationSpec {
    if armor { spec.with_arg("--armor") } else { spec }
}

/// `--encrypt` to `recipients`, signing with `signers` when not empty.
pub(super) fn encrypt(
    spec: InvocationSpec,
    recipients: &[String],
    signers: &[String],
    armor: bool,
) -> InvocationSpec {
    let mut spec = armored(spec.with_channels(Channels::DATA_IN | Channels::DATA_OUT), armor);
    for recipient in recipients {
        spec = spec.with_arg("--recipient").with_arg(recipient.as_str());
    }
    for signer in signers {
        spec = spec.with_arg("--local-user").with_arg(signer.as_str());
    }
    if !signers.is_empty() {
        spec = spec.with_arg("--sign");
    }
    spec.with_arg("--encrypt")
}

/// `--decrypt` from stdin to stdout.
pub(super) fn decrypt(spec: InvocationSpec) -> InvocationSpec {
    spec.with_channels(Channels::DATA_IN | Channels::DATA_OUT)
        .with_arg("--decrypt")
}

/// `--sign`, `--clearsign` or `--detach-sign`.
pub(super) fn sign(
    spec: InvocationSpec,
    signers: &[String],
    mode: SignMode,
    armor: bool,
) -> InvocationSpec {
    let mut spec = spec.with_channels(Channels::DATA_IN | Channels::DATA_OUT);
    if mode != SignMode::Clear {
        spec = armored(spec, armor);
    }
    for signer in signers {
        spec = spec.with_arg("--local-user").with_arg(signer.as_str());
    }
    spec.with_arg(match mode {
        SignMode::Normal => "--sign",
        SignMode::Clear => "--clearsign",
        SignMode::Detached => "--detach-sign",
    })
}

/// `--verify`. A detached signature is read from stdin and the signed data
/// from the extra input pipe.
pub(super) fn verify(spec: InvocationSpec, detached: bool) -> InvocationSpec {
    let spec = spec.with_channels(Channels::DATA_IN);
    if detached {
        spec.with_channels(Channels::EXTRA_IN)
            .with_args(["--enable-special-filenames", "--verify", "-"])
            .with_arg(Arg::SpecialFile(FdRole::ExtraIn))
    } else {
        spec.with_arg("--verify")
    }
}

/// `--import` from stdin.
pub(super) fn import(spec: InvocationSpec) -> InvocationSpec {
    spec.with_channels(Channels::DATA_IN).with_arg("--import")
}

/// `--export` or `--export-secret-keys` of one key.
pub(super) fn export(spec: InvocationSpec, key_id: &str, secret: bool, armor: bool) -> InvocationSpec {
    armored(spec.with_channels(Channels::DATA_OUT), armor)
        .with_arg(if secret {
            "--export-secret-keys"
        } else {
            "--export"
        })
        .with_arg("--")
        .with_arg(key_id)
}

/// `--delete-key` or `--delete-secret-keys`. Batch mode only deletes by
/// fingerprint, and only with `--yes`.
pub(super) fn delete(spec: InvocationSpec, fingerprint: &str, secret: bool) -> InvocationSpec {
    spec.with_arg("--yes")
        .with_arg(if secret {
            "--delete-secret-keys"
        } else {
            "--delete-key"
        })
        .with_arg("--")
        .with_arg(fingerprint)
}

/// `--list-keys` or `--list-secret-keys` in colon format, with sub-key
/// fingerprints.
pub(super) fn list(spec: InvocationSpec, key_id: Option<&str>, secret: bool) -> InvocationSpec {
    let spec = spec
        .with_channels(Channels::DATA_OUT)
        .with_args([
            "--with-colons",
            "--fixed-list-mode",
            "--with-fingerprint",
            "--with-fingerprint",
        ])
        .with_arg(if secret {
            "--list-secret-keys"
        } else {
            "--list-keys"
        });
    match key_id {
        Some(key_id) => spec.with_arg("--").with_arg(key_id),
        None => spec,
    }
}

/// `--gen-key` reading the parameter file from stdin.
pub(super) fn generate(spec: InvocationSpec) -> InvocationSpec {
    spec.with_channels(Channels::DATA_IN).with_arg("--gen-key")
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use super::*;

    fn rendered(spec: &InvocationSpec) -> Vec<String> {
        spec.render_args(|role| match role {
            FdRole::Status => Some(3),
            FdRole::Command => Some(4),
            FdRole::ExtraIn => Some(5),
        })
        .unwrap()
        .into_iter()
        .map(|a: OsString| a.to_string_lossy().into_owned())
        .collect()
    }

    #[test]
    fn test_base_arguments() {
        let spec = base(&GpgConfig::default());
        let args = rendered(&spec);
        assert_eq!(&args[..4], ["--status-fd", "3", "--command-fd", "4"]);
        assert!(args.contains(&"--batch".to_string()));
        assert!(args.windows(2).any(|w| w == ["--pinentry-mode", "loopback"]));
        assert!(!args.contains(&"--homedir".to_string()));
        assert!(spec.channels.contains(Channels::STATUS | Channels::COMMAND));
        assert!(!spec.channels.contains(Channels::DATA_IN));
    }

    #[test]
    fn test_configured_paths_and_extra_args_come_before_command() {
        let config = GpgConfig::default()
            .with_homedir("/srv/keys")
            .with_public_keyring("/srv/keys/pub.kbx")
            .with_trustdb("/srv/keys/trustdb.gpg")
            .with_digest_algo("SHA512")
            .with_extra_arg("--compress-algo")
            .with_extra_arg("none");
        let spec = decrypt(base(&config));
        let args = rendered(&spec);

        assert_eq!(spec.homedir.as_deref(), Some(std::path::Path::new("/srv/keys")));
        assert!(args.windows(2).any(|w| w == ["--homedir", "/srv/keys"]));
        assert!(args.windows(3).any(|w| w == ["--no-default-keyring", "--keyring", "/srv/keys/pub.kbx"]));
        assert!(args.windows(2).any(|w| w == ["--trustdb-name", "/srv/keys/trustdb.gpg"]));
        assert!(args.windows(2).any(|w| w == ["--personal-digest-preferences", "SHA512"]));
        assert_eq!(&args[args.len() - 3..], ["--compress-algo", "none", "--decrypt"]);
    }

    #[test]
    fn test_encrypt_and_sign() {
        let spec = encrypt(
            base(&GpgConfig::default()),
            &["AAAA".to_string(), "BBBB".to_string()],
            &["CCCC".to_string()],
            true,
        );
        let args = rendered(&spec);
        assert!(args.contains(&"--armor".to_string()));
        assert!(args.windows(2).any(|w| w == ["--recipient", "AAAA"]));
        assert!(args.windows(2).any(|w| w == ["--recipient", "BBBB"]));
        assert!(args.windows(2).any(|w| w == ["--local-user", "CCCC"]));
        assert_eq!(&args[args.len() - 2..], ["--sign", "--encrypt"]);
        assert!(spec.channels.contains(Channels::DATA_IN | Channels::DATA_OUT));
    }

    #[test]
    fn test_clearsign_ignores_armor() {
        let args = rendered(&sign(
            base(&GpgConfig::default()),
            &["CCCC".to_string()],
            SignMode::Clear,
            true,
        ));
        assert!(!args.contains(&"--armor".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--clearsign"));
    }

    #[test]
    fn test_detached_verify_uses_special_filename() {
        let spec = verify(base(&GpgConfig::default()), true);
        let args = rendered(&spec);
        assert_eq!(
            &args[args.len() - 4..],
            ["--enable-special-filenames", "--verify", "-", "-&5"]
        );
        assert!(spec.channels.contains(Channels::EXTRA_IN));

        let spec = verify(base(&GpgConfig::default()), false);
        assert!(!spec.channels.contains(Channels::EXTRA_IN));
        assert_eq!(rendered(&spec).last().map(String::as_str), Some("--verify"));
    }

    #[test]
    fn test_key_operands_follow_double_dash() {
        let args = rendered(&export(base(&GpgConfig::default()), "-x", false, true));
        assert_eq!(&args[args.len() - 3..], ["--export", "--", "-x"]);

        let args = rendered(&delete(base(&GpgConfig::default()), "AAAA", true));
        assert_eq!(&args[args.len() - 4..], ["--yes", "--delete-secret-keys", "--", "AAAA"]);

        let args = rendered(&list(base(&GpgConfig::default()), None, true));
        assert_eq!(args.last().map(String::as_str), Some("--list-secret-keys"));
    }

    #[test]
    fn test_check_key_id() {
        assert_eq!(check_key_id("  alice@example.com ").unwrap(), "alice@example.com");
        assert!(check_key_id(" ").is_err());
        assert!(check_key_id("a\nb").is_err());
    }
}
