//! Result/error classification.
//!
//! The single place that decides whether an invocation succeeded. It runs
//! once, after the pump has finished, over the complete event stream. gpg
//! can report a missing secret key for one recipient and then decrypt
//! with another, so no intermediate event is ever final on its own.
//!
//! Decision order, first match wins:
//!
//! 1. aborted (handle or timeout): [`GpgError::OperationAborted`]
//! 2. `NODATA`: [`GpgError::NoData`]
//! 3. key lookup failures with no success: [`GpgError::KeyNotFound`], or
//!    [`GpgError::DeletePrivateKeyRequired`] for a delete
//! 4. bad or missing passphrase with no success:
//!    [`GpgError::BadPassphrase`]. A key whose answered passphrase never
//!    got as far as `GOOD_PASSPHRASE` or `BEGIN_DECRYPTION` counts as bad.
//! 5. the kind's success marker: `Ok`
//! 6. anything else: [`GpgError::OperationFailed`]

use tracing::debug;

use crate::error::GpgError;
use crate::interpreter::{Marker, OperationKind, OperationState, Terminal, same_key};
use crate::log::redact;
use crate::process::PumpOutput;

/// `DELETE_PROBLEM` reason codes.
const DELETE_NO_SUCH_KEY: u32 = 1;
const DELETE_SECRET_FIRST: u32 = 2;

/// Classifies a finished invocation.
///
/// # Errors
///
/// Returns the one [`GpgError`] that describes why the invocation failed.
pub fn classify(
    kind: OperationKind,
    state: &OperationState,
    output: &PumpOutput,
) -> Result<(), GpgError> {
    let result = decide(kind, state, output);
    debug!(
        ?kind,
        exit_code = ?output.exit_code(),
        outcome = result.as_ref().map_or_else(|e| e.to_string(), |_| "ok".to_string()),
        "classified"
    );
    result
}

fn decide(kind: OperationKind, state: &OperationState, output: &PumpOutput) -> Result<(), GpgError> {
    if output.aborted {
        return Err(GpgError::OperationAborted {
            command: output.command.clone(),
        });
    }

    if state.terminal == Some(Terminal::NoData) {
        return Err(GpgError::NoData);
    }

    let succeeded = success_marker(kind, state, output);

    if kind == OperationKind::Delete {
        match state.delete_problem {
            Some(DELETE_SECRET_FIRST) => {
                return Err(GpgError::DeletePrivateKeyRequired {
                    key_id: state.subject.clone().unwrap_or_default(),
                });
            },
            Some(DELETE_NO_SUCH_KEY) => {
                return Err(GpgError::KeyNotFound {
                    key_ids: state.subject.iter().cloned().collect(),
                });
            },
            _ => {},
        }
    }

    if !succeeded {
        if let Some(key_ids) = unresolved_keys(kind, state) {
            return Err(GpgError::KeyNotFound { key_ids });
        }

        let bad = rejected_passphrases(state);
        if !bad.is_empty() || !state.missing_passphrase.is_empty() {
            return Err(GpgError::BadPassphrase {
                bad,
                missing: state.missing_passphrase.iter().cloned().collect(),
            });
        }

        // gpg writes nothing when asked to export or list an unknown key;
        // for export it even exits zero.
        if matches!(kind, OperationKind::Export | OperationKind::List) && output.stdout.is_empty() {
            if let Some(subject) = &state.subject {
                return Err(GpgError::KeyNotFound {
                    key_ids: vec![subject.clone()],
                });
            }
        }
    }

    if succeeded {
        return Ok(());
    }

    Err(GpgError::OperationFailed {
        command: output.command.clone(),
        exit_code: output.exit_code(),
        stderr: failure_text(state, output),
    })
}

/// Keys whose passphrase was rejected, including answered keys gpg never
/// confirmed before failing.
fn rejected_passphrases(state: &OperationState) -> Vec<String> {
    let mut bad = state.bad_passphrase.clone();
    if !state.has(Marker::GoodPassphrase) && !state.has(Marker::BeginDecryption) {
        bad.extend(
            state
                .attempts
                .iter()
                .filter(|(key, n)| **n > 0 && !state.missing_passphrase.contains(*key))
                .map(|(key, _)| key.clone()),
        );
    }
    bad.into_iter().collect()
}

/// The missing keys that explain a failure, if any.
///
/// Keys that went through a passphrase dialog exist, whatever gpg said
/// about them afterwards; a wrong passphrase is not a missing key. When the
/// input named its keys (`ENC_TO`), only a failure where every one of them
/// is missing counts.
fn unresolved_keys(kind: OperationKind, state: &OperationState) -> Option<Vec<String>> {
    let missing: Vec<String> = state
        .missing_keys
        .iter()
        .filter(|k| !state.passphrase_involved(k))
        .cloned()
        .collect();

    if missing.is_empty() {
        return None;
    }

    if matches!(kind, OperationKind::Decrypt { .. }) && !state.referenced_keys.is_empty() {
        let all_missing = state
            .referenced_keys
            .iter()
            .all(|r| missing.iter().any(|m| same_key(m, r)));
        if !all_missing {
            return None;
        }
    }

    Some(missing)
}

fn success_marker(kind: OperationKind, state: &OperationState, output: &PumpOutput) -> bool {
    if output.fatal {
        return false;
    }
    match kind {
        OperationKind::Decrypt { verify } => {
            if state.has(Marker::DecryptionFailed) {
                return false;
            }
            // Signed but not encrypted input passes through `--decrypt`
            // without a decryption phase.
            state.has(Marker::DecryptionOkay)
                || (verify && !state.has(Marker::BeginDecryption) && !state.signatures.is_empty())
        },
        OperationKind::Encrypt { sign } => {
            state.has(Marker::EndEncryption) && (!sign || state.has(Marker::SigCreated))
        },
        OperationKind::Sign => state.has(Marker::SigCreated),
        OperationKind::Verify => !state.signatures.is_empty(),
        OperationKind::Import => state.has(Marker::Imported),
        OperationKind::Export => {
            state.has(Marker::Exported) || (output.success() && !output.stdout.is_empty())
        },
        OperationKind::Delete => output.success() && state.delete_problem.is_none(),
        OperationKind::Generate => {
            state.has(Marker::KeyCreated) && state.created_fingerprint.is_some()
        },
        OperationKind::List => output.success(),
    }
}

fn failure_text(state: &OperationState, output: &PumpOutput) -> String {
    let mut text = redact(output.stderr.trim_end()).into_owned();
    if let Some(Terminal::UnsupportedPrompt(prompt)) = &state.terminal {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str("unsupported prompt: ");
        text.push_str(prompt);
    }
    if text.is_empty() {
        text = redact(&state.warnings.join("\n")).into_owned();
    }
    text
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    use super::*;
    use crate::error::ErrorKind;

    fn exited(code: i32) -> PumpOutput {
        PumpOutput {
            exit_status: Some(ExitStatus::from_raw(code << 8)),
            command: "gpg --decrypt".to_string(),
            ..PumpOutput::default()
        }
    }

    fn decrypt() -> OperationKind {
        OperationKind::Decrypt { verify: false }
    }

    fn state_with(f: impl FnOnce(&mut OperationState)) -> OperationState {
        let mut state = OperationState::default();
        f(&mut state);
        state
    }

    fn kind_of(result: Result<(), GpgError>) -> Option<ErrorKind> {
        result.err().map(|e| e.kind())
    }

    #[test]
    fn aborted_wins_over_everything() {
        let state = state_with(|s| {
            s.terminal = Some(Terminal::NoData);
            s.markers.insert(Marker::DecryptionOkay);
        });
        let mut output = exited(0);
        output.aborted = true;
        assert_eq!(
            kind_of(classify(decrypt(), &state, &output)),
            Some(ErrorKind::OperationAborted)
        );
    }

    #[test]
    fn nodata_wins_over_missing_keys() {
        let state = state_with(|s| {
            s.terminal = Some(Terminal::NoData);
            s.missing_keys.insert("AAAA".into());
        });
        let mut output = exited(2);
        output.fatal = true;
        assert_eq!(
            kind_of(classify(decrypt(), &state, &output)),
            Some(ErrorKind::NoData)
        );
    }

    #[test]
    fn one_missing_recipient_is_rescued() {
        let state = state_with(|s| {
            s.referenced_keys.extend(["AAAA".to_string(), "BBBB".to_string()]);
            s.missing_keys.insert("AAAA".into());
            s.markers.insert(Marker::DecryptionOkay);
        });
        assert!(classify(decrypt(), &state, &exited(0)).is_ok());
    }

    #[test]
    fn all_recipients_missing_is_key_not_found() {
        let state = state_with(|s| {
            s.referenced_keys.extend(["AAAA".to_string(), "BBBB".to_string()]);
            s.missing_keys.extend(["AAAA".to_string(), "BBBB".to_string()]);
            s.markers.insert(Marker::DecryptionFailed);
        });
        match classify(decrypt(), &state, &exited(2)) {
            Err(GpgError::KeyNotFound { key_ids }) => assert_eq!(key_ids, vec!["AAAA", "BBBB"]),
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }

    #[test]
    fn some_recipients_missing_without_success_is_not_key_not_found() {
        let state = state_with(|s| {
            s.referenced_keys.extend(["AAAA".to_string(), "BBBB".to_string()]);
            s.missing_keys.insert("AAAA".into());
        });
        assert_eq!(
            kind_of(classify(decrypt(), &state, &exited(2))),
            Some(ErrorKind::OperationFailed)
        );
    }

    #[test]
    fn wrong_passphrase_is_not_a_missing_key() {
        let state = state_with(|s| {
            s.referenced_keys.insert("AAAA".into());
            s.missing_keys.insert("AAAA".into());
            s.attempts.insert("AAAA".into(), 2);
            s.bad_passphrase.insert("AAAA".into());
            s.markers.insert(Marker::DecryptionFailed);
        });
        match classify(decrypt(), &state, &exited(2)) {
            Err(GpgError::BadPassphrase { bad, missing }) => {
                assert_eq!(bad, vec!["AAAA"]);
                assert!(missing.is_empty());
            },
            other => panic!("expected BadPassphrase, got {other:?}"),
        }
    }

    #[test]
    fn success_wins_over_passphrase_noise() {
        let state = state_with(|s| {
            s.missing_passphrase.insert("AAAA".into());
            s.markers.insert(Marker::DecryptionOkay);
        });
        assert!(classify(decrypt(), &state, &exited(0)).is_ok());
    }

    #[test]
    fn decryption_failed_overrides_okay() {
        let state = state_with(|s| {
            s.markers.insert(Marker::DecryptionOkay);
            s.markers.insert(Marker::DecryptionFailed);
        });
        assert_eq!(
            kind_of(classify(decrypt(), &state, &exited(2))),
            Some(ErrorKind::OperationFailed)
        );
    }

    #[test]
    fn signed_only_input_decrypts_when_verifying() {
        let state = state_with(|s| {
            let mut sig = crate::keys::Signature::empty();
            sig.status = Some(crate::keys::SignatureStatus::Good);
            s.signatures.push(sig);
        });
        assert!(classify(OperationKind::Decrypt { verify: true }, &state, &exited(0)).is_ok());
        assert!(classify(decrypt(), &state, &exited(0)).is_err());
    }

    #[test]
    fn delete_requires_secret_first() {
        let state = state_with(|s| {
            s.subject = Some("AAAA".into());
            s.delete_problem = Some(2);
        });
        match classify(OperationKind::Delete, &state, &exited(2)) {
            Err(GpgError::DeletePrivateKeyRequired { key_id }) => assert_eq!(key_id, "AAAA"),
            other => panic!("expected DeletePrivateKeyRequired, got {other:?}"),
        }
    }

    #[test]
    fn delete_missing_key() {
        let state = state_with(|s| {
            s.subject = Some("AAAA".into());
            s.delete_problem = Some(1);
        });
        assert_eq!(
            kind_of(classify(OperationKind::Delete, &state, &exited(2))),
            Some(ErrorKind::KeyNotFound)
        );
        assert!(classify(OperationKind::Delete, &OperationState::default(), &exited(0)).is_ok());
    }

    #[test]
    fn encrypt_and_sign_needs_both_markers() {
        let kind = OperationKind::Encrypt { sign: true };
        let state = state_with(|s| {
            s.markers.insert(Marker::EndEncryption);
        });
        assert!(classify(kind, &state, &exited(0)).is_err());
        let state = state_with(|s| {
            s.markers.insert(Marker::EndEncryption);
            s.markers.insert(Marker::SigCreated);
        });
        assert!(classify(kind, &state, &exited(0)).is_ok());
    }

    #[test]
    fn verify_with_bad_signature_still_succeeds() {
        let state = state_with(|s| {
            let mut sig = crate::keys::Signature::empty();
            sig.status = Some(crate::keys::SignatureStatus::Bad);
            s.signatures.push(sig);
        });
        assert!(classify(OperationKind::Verify, &state, &exited(1)).is_ok());
    }

    #[test]
    fn generic_failure_carries_stderr() {
        let mut output = exited(2);
        output.stderr = "gpg: something broke\n".to_string();
        match classify(OperationKind::Sign, &OperationState::default(), &output) {
            Err(GpgError::OperationFailed {
                command,
                exit_code,
                stderr,
            }) => {
                assert_eq!(command, "gpg --decrypt");
                assert_eq!(exit_code, Some(2));
                assert_eq!(stderr, "gpg: something broke");
            },
            other => panic!("expected OperationFailed, got {other:?}"),
        }
    }

    #[test]
    fn export_of_unknown_key_is_key_not_found() {
        let state = state_with(|s| s.subject = Some("nobody@example.com".into()));
        match classify(OperationKind::Export, &state, &exited(0)) {
            Err(GpgError::KeyNotFound { key_ids }) => {
                assert_eq!(key_ids, vec!["nobody@example.com"]);
            },
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }

    #[test]
    fn list_without_output_is_key_not_found() {
        let state = state_with(|s| s.subject = Some("nobody".into()));
        assert_eq!(
            kind_of(classify(OperationKind::List, &state, &exited(2))),
            Some(ErrorKind::KeyNotFound)
        );
        assert_eq!(
            kind_of(classify(OperationKind::List, &OperationState::default(), &exited(2))),
            Some(ErrorKind::OperationFailed)
        );
    }

    #[test]
    fn list_missing_subject_is_key_not_found() {
        let state = state_with(|s| {
            s.subject = Some("nobody".into());
            s.missing_keys.insert("NOBODY".into());
        });
        assert_eq!(
            kind_of(classify(OperationKind::List, &state, &exited(2))),
            Some(ErrorKind::KeyNotFound)
        );
    }

    #[test]
    fn answered_passphrase_without_confirmation_is_bad() {
        let state = state_with(|s| {
            s.attempts.insert("AAAA".into(), 1);
            s.warnings.push("ERROR pkdecrypt_failed 67108875".into());
            s.markers.insert(Marker::DecryptionFailed);
        });
        match classify(decrypt(), &state, &exited(2)) {
            Err(GpgError::BadPassphrase { bad, missing }) => {
                assert_eq!(bad, vec!["AAAA"]);
                assert!(missing.is_empty());
            },
            other => panic!("expected BadPassphrase, got {other:?}"),
        }
        assert_eq!(
            kind_of(classify(OperationKind::Sign, &state, &exited(2))),
            Some(ErrorKind::BadPassphrase)
        );
    }

    #[test]
    fn answered_passphrase_is_good_once_decryption_began() {
        let state = state_with(|s| {
            s.attempts.insert("AAAA".into(), 1);
            s.markers.insert(Marker::BeginDecryption);
            s.markers.insert(Marker::DecryptionFailed);
        });
        assert_eq!(
            kind_of(classify(decrypt(), &state, &exited(2))),
            Some(ErrorKind::OperationFailed)
        );
    }

    #[test]
    fn failure_text_is_redacted() {
        let mut output = exited(2);
        output.stderr = "gpg: invalid option \"--passphrase=hunter2\"\n".to_string();
        match classify(decrypt(), &OperationState::default(), &output) {
            Err(GpgError::OperationFailed { stderr, .. }) => {
                assert!(!stderr.contains("hunter2"), "{stderr}");
                assert!(stderr.contains(crate::log::REDACTED));
            },
            other => panic!("expected OperationFailed, got {other:?}"),
        }
    }
}
