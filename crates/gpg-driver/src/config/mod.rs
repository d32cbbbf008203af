//! Configuration parsing and management.
//!
//! A [`GpgConfig`] is fixed for the lifetime of a [`crate::Gpg`]; every
//! invocation reads it and none changes it. It can be built in code or
//! loaded from TOML:
//!
//! ```toml
//! binary = "/usr/bin/gpg"
//! homedir = "/srv/keys"
//! digest_algo = "SHA512"
//! extra_args = ["--compress-algo", "none"]
//! timeout_ms = 30000
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings shared by every invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GpgConfig {
    /// Path to, or name of, the gpg executable.
    #[serde(default = "default_binary")]
    pub binary: PathBuf,

    /// gpg home directory (`--homedir`, `GNUPGHOME`).
    #[serde(default)]
    pub homedir: Option<PathBuf>,

    /// Public keyring file; disables the default keyring.
    #[serde(default)]
    pub public_keyring: Option<PathBuf>,

    /// Secret keyring file (ignored by gpg 2.1 and later).
    #[serde(default)]
    pub private_keyring: Option<PathBuf>,

    /// Trust database file.
    #[serde(default)]
    pub trustdb: Option<PathBuf>,

    /// Preferred digest algorithm, e.g. `SHA512`.
    #[serde(default)]
    pub digest_algo: Option<String>,

    /// Preferred cipher algorithm, e.g. `AES256`.
    #[serde(default)]
    pub cipher_algo: Option<String>,

    /// Raw arguments appended to every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Wall-clock limit per invocation, in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Delay between `SIGTERM` and `SIGKILL` on abort, in milliseconds.
    #[serde(default = "default_abort_grace_ms")]
    pub abort_grace_ms: u64,
}

fn default_binary() -> PathBuf {
    PathBuf::from("gpg")
}

const fn default_abort_grace_ms() -> u64 {
    2000
}

impl Default for GpgConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            homedir: None,
            public_keyring: None,
            private_keyring: None,
            trustdb: None,
            digest_algo: None,
            cipher_algo: None,
            extra_args: Vec::new(),
            timeout_ms: None,
            abort_grace_ms: default_abort_grace_ms(),
        }
    }
}

impl GpgConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid, has unknown keys, or fails
    /// [`validate`](Self::validate).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Checks the configuration for values gpg would misinterpret.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary.as_os_str().is_empty() {
            return Err(ConfigError::Validation("binary must not be empty".into()));
        }
        for (name, path) in [
            ("homedir", &self.homedir),
            ("public_keyring", &self.public_keyring),
            ("private_keyring", &self.private_keyring),
            ("trustdb", &self.trustdb),
        ] {
            if let Some(path) = path {
                check_path(name, path)?;
            }
        }
        for (name, algo) in [
            ("digest_algo", &self.digest_algo),
            ("cipher_algo", &self.cipher_algo),
        ] {
            if algo
                .as_deref()
                .is_some_and(|a| a.is_empty() || a.contains(char::is_whitespace))
            {
                return Err(ConfigError::Validation(format!(
                    "{name} must be a single algorithm name"
                )));
            }
        }
        if self.extra_args.iter().any(|a| a.contains('\0')) {
            return Err(ConfigError::Validation(
                "extra_args must not contain NUL bytes".into(),
            ));
        }
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::Validation(
                "timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The per-invocation timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// The delay between `SIGTERM` and `SIGKILL`.
    #[must_use]
    pub const fn abort_grace(&self) -> Duration {
        Duration::from_millis(self.abort_grace_ms)
    }

    /// Sets the executable.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Sets the home directory.
    #[must_use]
    pub fn with_homedir(mut self, homedir: impl Into<PathBuf>) -> Self {
        self.homedir = Some(homedir.into());
        self
    }

    /// Sets the public keyring file.
    #[must_use]
    pub fn with_public_keyring(mut self, path: impl Into<PathBuf>) -> Self {
        self.public_keyring = Some(path.into());
        self
    }

    /// Sets the secret keyring file.
    #[must_use]
    pub fn with_private_keyring(mut self, path: impl Into<PathBuf>) -> Self {
        self.private_keyring = Some(path.into());
        self
    }

    /// Sets the trust database file.
    #[must_use]
    pub fn with_trustdb(mut self, path: impl Into<PathBuf>) -> Self {
        self.trustdb = Some(path.into());
        self
    }

    /// Sets the preferred digest algorithm.
    #[must_use]
    pub fn with_digest_algo(mut self, algo: impl Into<String>) -> Self {
        self.digest_algo = Some(algo.into());
        self
    }

    /// Sets the preferred cipher algorithm.
    #[must_use]
    pub fn with_cipher_algo(mut self, algo: impl Into<String>) -> Self {
        self.cipher_algo = Some(algo.into());
        self
    }

    /// Appends a raw argument.
    #[must_use]
    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Sets the per-invocation timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Sets the delay between `SIGTERM` and `SIGKILL`.
    #[must_use]
    pub fn with_abort_grace(mut self, grace: Duration) -> Self {
        self.abort_grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

/// Relative paths must not climb out of the working directory.
fn check_path(name: &str, path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(format!("{name} must not be empty")));
    }
    if path.is_relative() && path.components().any(|c| c == Component::ParentDir) {
        return Err(ConfigError::Validation(format!(
            "{name} must not contain '..' when relative: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = GpgConfig::from_toml("").unwrap();
        assert_eq!(config, GpgConfig::default());
        assert_eq!(config.binary, PathBuf::from("gpg"));
        assert_eq!(config.timeout(), None);
        assert_eq!(config.abort_grace(), Duration::from_secs(2));
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            binary = "/usr/local/bin/gpg2"
            homedir = "/srv/keys"
            public_keyring = "/srv/keys/pub.kbx"
            private_keyring = "/srv/keys/sec.gpg"
            trustdb = "/srv/keys/trustdb.gpg"
            digest_algo = "SHA512"
            cipher_algo = "AES256"
            extra_args = ["--compress-algo", "none"]
            timeout_ms = 30000
            abort_grace_ms = 500
        "#;

        let config = GpgConfig::from_toml(toml).unwrap();
        assert_eq!(config.binary, PathBuf::from("/usr/local/bin/gpg2"));
        assert_eq!(config.homedir, Some(PathBuf::from("/srv/keys")));
        assert_eq!(config.digest_algo.as_deref(), Some("SHA512"));
        assert_eq!(config.extra_args, vec!["--compress-algo", "none"]);
        assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.abort_grace(), Duration::from_millis(500));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = GpgConfig::from_toml("home = \"/tmp\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_relative_parent_path_rejected() {
        let err = GpgConfig::from_toml("homedir = \"../keys\"").unwrap_err();
        match err {
            ConfigError::Validation(msg) => assert!(msg.contains("homedir"), "{msg}"),
            _ => panic!("Expected ConfigError::Validation, got {err:?}"),
        }
        assert!(GpgConfig::from_toml("homedir = \"/srv/../keys\"").is_ok());
        assert!(GpgConfig::from_toml("homedir = \"keys\"").is_ok());
    }

    #[test]
    fn test_empty_binary_rejected() {
        assert!(matches!(
            GpgConfig::from_toml("binary = \"\""),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_bad_algorithm_rejected() {
        assert!(matches!(
            GpgConfig::from_toml("digest_algo = \"SHA256 --foo\""),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(GpgConfig::default().with_extra_arg("ok").validate().is_ok());
        assert!(matches!(
            GpgConfig::from_toml("timeout_ms = 0"),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = GpgConfig::default()
            .with_homedir("/srv/keys")
            .with_cipher_algo("AES256")
            .with_timeout(Duration::from_secs(5));
        let text = config.to_toml().unwrap();
        assert_eq!(GpgConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpg.toml");
        std::fs::write(&path, "homedir = \"/srv/keys\"\n").unwrap();
        let config = GpgConfig::from_file(&path).unwrap();
        assert_eq!(config.homedir, Some(PathBuf::from("/srv/keys")));

        let missing = GpgConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io(_)));
    }
}
