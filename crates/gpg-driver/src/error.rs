//! Typed failures for gpg operations.
//!
//! Every public operation either returns a fully populated value or exactly
//! one [`GpgError`]. Only [`crate::classify`] produces the status-protocol
//! kinds (`NoData`, `KeyNotFound`, `BadPassphrase`, ...); the pump and the
//! parser never decide success or failure themselves.

use std::path::PathBuf;

/// Errors returned by [`crate::Gpg`] operations.
#[derive(Debug, thiserror::Error)]
pub enum GpgError {
    /// The input was not recognised as OpenPGP data at all.
    #[error("no OpenPGP data found in input")]
    NoData,

    /// One or more named keys are absent from the keyring.
    #[error("key not found: {}", .key_ids.join(", "))]
    KeyNotFound {
        /// The key ids (or user-supplied identifiers) that could not be found.
        key_ids: Vec<String>,
    },

    /// A passphrase was wrong, or was needed and never supplied.
    #[error("bad or missing passphrase (bad: [{}], missing: [{}])", .bad.join(", "), .missing.join(", "))]
    BadPassphrase {
        /// Key ids whose supplied passphrase was rejected.
        bad: Vec<String>,
        /// Key ids that needed a passphrase none was supplied for.
        missing: Vec<String>,
    },

    /// The public key still has a private counterpart in the keyring.
    #[error("private key must be deleted before public key {key_id}")]
    DeletePrivateKeyRequired {
        /// The key that could not be deleted.
        key_id: String,
    },

    /// An input or output file is missing, unreadable or unwritable.
    #[error("cannot access {path}: {reason}", path = .path.display())]
    FileAccess {
        /// The offending path.
        path: PathBuf,
        /// Why it could not be used.
        reason: String,
    },

    /// The gpg executable could not be started (or its pipes not created).
    #[error("failed to launch {binary}: {source}", binary = .binary.display())]
    SubprocessLaunch {
        /// The executable that was being launched.
        binary: PathBuf,
        /// The underlying OS error.
        source: std::io::Error,
    },

    /// The caller aborted the operation, or it exceeded its timeout.
    #[error("operation aborted: {command}")]
    OperationAborted {
        /// The (redacted) command line that was running.
        command: String,
    },

    /// gpg exited without any more specific failure being recognised.
    #[error("gpg operation failed (exit code {exit_code:?}): {command}: {stderr}")]
    OperationFailed {
        /// The (redacted) command line that was run.
        command: String,
        /// The exit code, if gpg exited normally.
        exit_code: Option<i32>,
        /// Captured stderr, for diagnostics.
        stderr: String,
    },

    /// Caller input was rejected before any subprocess was started.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Field-less discriminant of [`GpgError`], convenient for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`GpgError::NoData`].
    NoData,
    /// See [`GpgError::KeyNotFound`].
    KeyNotFound,
    /// See [`GpgError::BadPassphrase`].
    BadPassphrase,
    /// See [`GpgError::DeletePrivateKeyRequired`].
    DeletePrivateKeyRequired,
    /// See [`GpgError::FileAccess`].
    FileAccess,
    /// See [`GpgError::SubprocessLaunch`].
    SubprocessLaunch,
    /// See [`GpgError::OperationAborted`].
    OperationAborted,
    /// See [`GpgError::OperationFailed`].
    OperationFailed,
    /// See [`GpgError::InvalidArgument`].
    InvalidArgument,
}

impl GpgError {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NoData => ErrorKind::NoData,
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::BadPassphrase { .. } => ErrorKind::BadPassphrase,
            Self::DeletePrivateKeyRequired { .. } => ErrorKind::DeletePrivateKeyRequired,
            Self::FileAccess { .. } => ErrorKind::FileAccess,
            Self::SubprocessLaunch { .. } => ErrorKind::SubprocessLaunch,
            Self::OperationAborted { .. } => ErrorKind::OperationAborted,
            Self::OperationFailed { .. } => ErrorKind::OperationFailed,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    pub(crate) fn file_access(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_key_not_found_lists_ids() {
        let err = GpgError::KeyNotFound {
            key_ids: vec!["ABCDEF0123456789".to_string(), "bob@example.com".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "key not found: ABCDEF0123456789, bob@example.com"
        );
        assert_eq!(err.kind(), ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_display_bad_passphrase_separates_subsets() {
        let err = GpgError::BadPassphrase {
            bad: vec!["AAAA".to_string()],
            missing: vec!["BBBB".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("bad: [AAAA]"));
        assert!(text.contains("missing: [BBBB]"));
    }

    #[test]
    fn test_file_access_carries_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = GpgError::file_access("/nope/in.gpg", &io);
        assert_eq!(err.kind(), ErrorKind::FileAccess);
        assert!(err.to_string().contains("/nope/in.gpg"));
    }
}
