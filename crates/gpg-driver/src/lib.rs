//! # gpg-driver
//!
//! Drive the GnuPG command-line tool (`gpg`) as a subprocess.
//!
//! `gpg` performs all of the cryptography. This crate owns everything around
//! it: spawning the subprocess with the right pipe topology, pumping every
//! pipe without deadlock, interpreting GnuPG's machine-readable status
//! protocol, answering passphrase prompts on the command channel, and
//! turning the resulting event stream into typed values or typed errors.
//!
//! ## Architecture
//!
//! ```text
//!  Gpg (ops)  ── InvocationSpec ──▶  process::spawn
//!     ▲                                   │
//!     │                                   ▼
//!  classify ◀── OperationState ──  process::Pump (one select! loop)
//!                   ▲                │   │   │   │   │
//!                   │          status│ cmd│ in│ out│ err│
//!                   │                ▼   ▲
//!               interpreter ◀── status::parse_line
//! ```
//!
//! - [`process`]: invocation specs, pipe creation, the readiness-driven
//!   pump loop and abort handles
//! - [`status`]: the `[GNUPG:]` status-line parser
//! - [`interpreter`]: per-operation state machines and the prompt responder
//! - [`classify`]: the single decision point from state to success/failure
//! - [`ops`]: the public operations ([`Gpg`]) and the [`KeySet`] builder
//! - [`keys`]: key, sub-key, user-id and signature records
//!
//! ## Example
//!
//! ```rust,no_run
//! use gpg_driver::{Gpg, GpgConfig, KeySet};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let gpg = Gpg::new(GpgConfig::default().with_homedir("/tmp/keys"))?;
//!
//! let mut keys = KeySet::new();
//! keys.add_encrypt_key("alice@example.com");
//! let ciphertext = gpg.encrypt(b"hi", &keys, true).await?;
//!
//! let mut keys = KeySet::new();
//! keys.add_decrypt_key("alice@example.com", "test1");
//! let plaintext = gpg.decrypt(&ciphertext, &keys).await?;
//! assert_eq!(plaintext, b"hi");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod classify;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod keys;
pub mod log;
pub mod ops;
pub mod passphrase;
pub mod process;
pub mod status;

// Re-export main types at crate root for convenience
pub use config::{ConfigError, GpgConfig};
pub use error::{ErrorKind, GpgError};
pub use keys::{Key, KeyAlgorithm, KeyParams, PublicKeyAlgorithm, Signature, SubKey, UserId};
pub use ops::{DecryptAndVerify, Gpg, ImportResult, KeySet, SignMode};
pub use passphrase::PassphraseSource;
pub use process::{AbortHandle, AbortSignal};
