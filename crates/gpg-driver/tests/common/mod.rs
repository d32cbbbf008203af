//! A scriptable stand-in for the gpg binary.
//!
//! One bash dispatcher is written per test binary. It finds the status and
//! command descriptors in its arguments, answers key listings from
//! `pubring.colons` / `secring.colons` in the home directory, and sources
//! `scenario.sh` from the home directory for everything else. Scenarios are
//! plain files, never executed directly, so tests can write them while
//! other tests are spawning processes.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use gpg_driver::{Gpg, GpgConfig};
use tempfile::TempDir;

const DISPATCHER: &str = r#"#!/bin/bash
set -u
status_fd=""
command_fd=""
op=""
last=""
ARGS="$*"
while [ $# -gt 0 ]; do
    case "$1" in
        --status-fd) status_fd="$2"; shift ;;
        --command-fd) command_fd="$2"; shift ;;
        --list-keys|--list-secret-keys|--encrypt|--decrypt|--sign|--clearsign|--detach-sign|--verify|--import|--export|--export-secret-keys|--delete-key|--delete-secret-keys|--gen-key)
            op="$op $1" ;;
    esac
    last="$1"
    shift
done

status() { printf '[GNUPG:] %s\n' "$*" >&"$status_fd"; }
answer() { IFS= read -r ANSWER <&"$command_fd" || ANSWER=""; }

case "$op" in
    " --list-keys")
        if [ -f "$GNUPGHOME/pubring.colons" ]; then cat "$GNUPGHOME/pubring.colons"; exit 0; fi
        exit 2 ;;
    " --list-secret-keys")
        if [ -f "$GNUPGHOME/secring.colons" ]; then cat "$GNUPGHOME/secring.colons"; exit 0; fi
        exit 2 ;;
esac

. "$GNUPGHOME/scenario.sh"
"#;

static BINARY: LazyLock<(TempDir, PathBuf)> = LazyLock::new(|| {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gpg");
    std::fs::write(&path, DISPATCHER).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    (dir, path)
});

/// Alice: RSA primary (sign, certify) with an encryption sub-key.
pub const ALICE_FPR: &str = "C3C8E4A1D0F2A6B3E9C1D5F78B4A6C150F2D6C7E";
pub const ALICE_ID: &str = "8B4A6C150F2D6C7E";
pub const ALICE_SUB_ID: &str = "A2B4C6D8E0F21234";

pub const ALICE_PUBLIC: &str = "\
tru::1:1700000000:0:3:1:5
pub:u:3072:1:8B4A6C150F2D6C7E:1700000000:::u:::scESC:::+:::23::0:
fpr:::::::::C3C8E4A1D0F2A6B3E9C1D5F78B4A6C150F2D6C7E:
uid:u::::1700000000::2CB5E0E1C71E5D9B0E1F3A2C5D6E7F8091A2B3C4::Alice <alice@example.com>::::::::::0:
sub:u:3072:1:A2B4C6D8E0F21234:1700000000::::::e:::+:::23:
fpr:::::::::D1D2D3D4D5D6D7D8D9D0E1E2A2B4C6D8E0F21234:
";

pub const ALICE_SECRET: &str = "\
sec:u:3072:1:8B4A6C150F2D6C7E:1700000000:::u:::scESC:::+:::23::0:
fpr:::::::::C3C8E4A1D0F2A6B3E9C1D5F78B4A6C150F2D6C7E:
uid:u::::1700000000::2CB5E0E1C71E5D9B0E1F3A2C5D6E7F8091A2B3C4::Alice <alice@example.com>::::::::::0:
ssb:u:3072:1:A2B4C6D8E0F21234:1700000000::::::e:::+:::23:
fpr:::::::::D1D2D3D4D5D6D7D8D9D0E1E2A2B4C6D8E0F21234:
";

/// A home directory for one test, wired to the fake binary.
pub struct FakeGpg {
    home: TempDir,
}

impl FakeGpg {
    /// A home directory whose non-listing invocations run `scenario`.
    pub fn new(scenario: &str) -> Self {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("scenario.sh"), scenario).unwrap();
        Self { home }
    }

    /// Sets the public keyring listing.
    pub fn with_public(self, listing: &str) -> Self {
        std::fs::write(self.home.path().join("pubring.colons"), listing).unwrap();
        self
    }

    /// Adds a secret keyring listing.
    pub fn with_secret(self, listing: &str) -> Self {
        std::fs::write(self.home.path().join("secring.colons"), listing).unwrap();
        self
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    pub fn config(&self) -> GpgConfig {
        GpgConfig::default()
            .with_binary(BINARY.1.clone())
            .with_homedir(self.home.path().to_path_buf())
            .with_abort_grace(Duration::from_millis(500))
    }

    pub fn gpg(&self) -> Gpg {
        Gpg::new(self.config()).unwrap()
    }
}
