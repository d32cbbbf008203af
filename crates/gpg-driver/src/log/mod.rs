//! Log hygiene.
//!
//! Nothing secret may reach `tracing` or an error: passphrases travel only
//! over the command channel or inside key-generation parameters. Argument
//! vectors are scrubbed before they are logged, and captured stderr before
//! it becomes part of [`crate::GpgError::OperationFailed`].

mod redact;

pub use redact::{REDACTED, SecretRedactor, redact, redact_args};
