//! Command implementations.
//!
//! Data commands read stdin and write stdout unless both `--input` and
//! `--output` are given, in which case the file is streamed through gpg.
//! Passphrases never come from the command line: they are read from a file
//! or from an environment variable.

pub mod crypto;
pub mod keys;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use secrecy::SecretString;

/// Default variable holding a passphrase.
pub const PASSPHRASE_ENV: &str = "GPG_DRIVER_PASSPHRASE";

/// Where a passphrase comes from.
#[derive(Args, Debug, Clone)]
pub struct PassphraseArgs {
    /// File whose first line is the passphrase
    #[arg(long)]
    pub passphrase_file: Option<PathBuf>,

    /// Environment variable holding the passphrase
    #[arg(long, default_value = PASSPHRASE_ENV)]
    pub passphrase_env: String,
}

impl PassphraseArgs {
    /// Reads the passphrase; empty when none is configured.
    pub fn read(&self) -> Result<SecretString> {
        if let Some(path) = &self.passphrase_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read passphrase file {}", path.display()))?;
            let line = content.lines().next().unwrap_or_default();
            return Ok(SecretString::from(line));
        }
        Ok(std::env::var(&self.passphrase_env)
            .map(SecretString::from)
            .unwrap_or_else(|_| SecretString::from("")))
    }
}

/// Input and output locations.
#[derive(Args, Debug, Clone)]
pub struct IoArgs {
    /// Input file (stdin if omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl IoArgs {
    /// Both paths, when the operation can stream file to file.
    pub fn files(&self) -> Option<(&Path, &Path)> {
        match (&self.input, &self.output) {
            (Some(input), Some(output)) => Some((input, output)),
            _ => None,
        }
    }

    /// Reads the whole input.
    pub fn read_input(&self) -> Result<Vec<u8>> {
        read_source(self.input.as_deref())
    }

    /// Writes `data` to the output.
    pub fn write_output(&self, data: &[u8]) -> Result<()> {
        match &self.output {
            Some(path) => std::fs::write(path, data)
                .with_context(|| format!("failed to write {}", path.display())),
            None => write_stdout(data),
        }
    }
}

/// Reads a file, or stdin for `None`.
pub fn read_source(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
        },
        None => {
            let mut data = Vec::new();
            std::io::stdin()
                .read_to_end(&mut data)
                .context("failed to read stdin")?;
            Ok(data)
        },
    }
}

/// Writes to stdout and flushes.
pub fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(data).context("failed to write stdout")?;
    stdout.flush().context("failed to flush stdout")
}

/// Prints `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize output")?
    );
    Ok(())
}

/// Fails unless at least one key was named.
pub fn require_keys(keys: &[String], what: &str) -> Result<()> {
    if keys.is_empty() {
        bail!("at least one {what} is required");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_passphrase_from_file_uses_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pass");
        std::fs::write(&path, "test1\nignored\n").unwrap();
        let args = PassphraseArgs {
            passphrase_file: Some(path),
            passphrase_env: "GPG_DRIVER_TEST_UNSET_VARIABLE".to_string(),
        };
        assert_eq!(args.read().unwrap().expose_secret(), "test1");
    }

    #[test]
    fn test_passphrase_defaults_to_empty() {
        let args = PassphraseArgs {
            passphrase_file: None,
            passphrase_env: "GPG_DRIVER_TEST_UNSET_VARIABLE".to_string(),
        };
        assert_eq!(args.read().unwrap().expose_secret(), "");
    }

    #[test]
    fn test_files_requires_both_paths() {
        let mut io = IoArgs {
            input: Some(PathBuf::from("in")),
            output: None,
        };
        assert!(io.files().is_none());
        io.output = Some(PathBuf::from("out"));
        assert_eq!(io.files(), Some((Path::new("in"), Path::new("out"))));
    }

    #[test]
    fn test_require_keys() {
        assert!(require_keys(&[], "recipient").is_err());
        assert!(require_keys(&["a".to_string()], "recipient").is_ok());
    }
}
