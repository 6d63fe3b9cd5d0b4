//! Integration tests for the passkey-vault CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.  The
//! virtual authenticator's presence prompt is skipped with
//! `PASSKEY_VAULT_AUTO_APPROVE=1`; tests that leave it unset rely on the
//! prompt failing without a terminal, which counts as "declined".

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use passkey_vault::vault::{flags, FlagStore, SqliteStore};
use predicates::prelude::*;

/// Helper: get a Command pointing at the passkey-vault binary.
fn passkey_vault() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("passkey-vault").expect("binary should exist");
    cmd.env_remove("PASSKEY_VAULT_LOG");
    cmd
}

/// Helper: a command run inside `dir` that approves every passkey prompt.
fn approved(dir: &TempDir) -> Command {
    let mut cmd = passkey_vault();
    cmd.current_dir(dir.path())
        .env("PASSKEY_VAULT_AUTO_APPROVE", "1");
    cmd
}

fn public_key_line(stdout: &[u8]) -> String {
    let text = String::from_utf8_lossy(stdout);
    text.lines()
        .find_map(|line| line.split("Public key: ").nth(1))
        .map(|s| s.trim().to_string())
        .expect("output should contain the public key")
}

#[test]
fn help_flag_shows_usage() {
    passkey_vault()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Signing keys sealed behind a passkey"))
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("unlock"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("delete"));
}

#[test]
fn version_flag_shows_version() {
    passkey_vault()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("passkey-vault"));
}

#[test]
fn no_args_shows_help() {
    passkey_vault()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn invalid_vault_id_rejected() {
    let tmp = TempDir::new().unwrap();
    passkey_vault()
        .current_dir(tmp.path())
        .args(["--vault-id", "UPPER", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn status_without_vault_reports_no_vault() {
    let tmp = TempDir::new().unwrap();
    passkey_vault()
        .current_dir(tmp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("no vault"));
}

#[test]
fn unlock_without_vault_fails() {
    let tmp = TempDir::new().unwrap();
    approved(&tmp)
        .arg("unlock")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn init_then_unlock_reports_same_public_key() {
    let tmp = TempDir::new().unwrap();

    let init = approved(&tmp).arg("init").assert().success();
    let created_key = public_key_line(&init.get_output().stdout);
    assert_eq!(created_key.len(), 64);

    tmp.child(".passkey-vault/vault.db").assert(predicate::path::exists());
    tmp.child(".passkey-vault/authenticator.json")
        .assert(predicate::path::exists());
    tmp.child(".gitignore")
        .assert(predicate::str::contains(".passkey-vault/"));

    let unlock = approved(&tmp).arg("unlock").assert().success();
    assert_eq!(public_key_line(&unlock.get_output().stdout), created_key);

    passkey_vault()
        .current_dir(tmp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("locked"))
        .stdout(predicate::str::contains(created_key.as_str()));
}

#[test]
fn init_twice_fails() {
    let tmp = TempDir::new().unwrap();
    approved(&tmp).arg("init").assert().success();
    approved(&tmp)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn declined_prompt_fails_unlock() {
    let tmp = TempDir::new().unwrap();
    approved(&tmp).arg("init").assert().success();

    passkey_vault()
        .current_dir(tmp.path())
        .env_remove("PASSKEY_VAULT_AUTO_APPROVE")
        .arg("unlock")
        .assert()
        .failure()
        .stderr(predicate::str::contains("declined"));
}

#[test]
fn delete_force_removes_vault() {
    let tmp = TempDir::new().unwrap();
    approved(&tmp).arg("init").assert().success();

    approved(&tmp)
        .args(["delete", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted vault"));

    approved(&tmp)
        .arg("unlock")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn delete_recovers_from_damaged_record() {
    let tmp = TempDir::new().unwrap();
    approved(&tmp).arg("init").assert().success();

    {
        let db = rusqlite::Connection::open(tmp.path().join(".passkey-vault/vault.db")).unwrap();
        let changed = db
            .execute(
                "UPDATE vault_records SET record = replace(record, '\"version\":1', '\"version\":2')",
                [],
            )
            .unwrap();
        assert_eq!(changed, 1);
    }

    approved(&tmp)
        .arg("unlock")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported vault schema"));
    approved(&tmp)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    approved(&tmp)
        .args(["delete", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted vault"));

    passkey_vault()
        .current_dir(tmp.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("no vault"));
}

#[test]
fn vault_ids_are_independent() {
    let tmp = TempDir::new().unwrap();
    approved(&tmp).args(["init", "--vault-id", "work"]).assert().success();

    approved(&tmp)
        .arg("unlock")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
    approved(&tmp)
        .args(["unlock", "--vault-id", "work"])
        .assert()
        .success();
}

#[test]
fn config_file_selects_vault_dir() {
    let tmp = TempDir::new().unwrap();
    tmp.child(".passkey-vault.toml")
        .write_str("vault_dir = \"secrets\"\n")
        .unwrap();

    approved(&tmp).arg("init").assert().success();
    tmp.child("secrets/vault.db").assert(predicate::path::exists());
}

#[test]
fn init_migrate_reuses_legacy_key() {
    let tmp = TempDir::new().unwrap();
    {
        let store = SqliteStore::open(&tmp.path().join(".passkey-vault")).unwrap();
        store
            .set_flag(
                flags::LEGACY_PRIVATE_KEY,
                "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
            )
            .unwrap();
    }

    approved(&tmp)
        .args(["init", "--migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
        ));

    let store = SqliteStore::open(&tmp.path().join(".passkey-vault")).unwrap();
    assert!(store.get_flag(flags::LEGACY_PRIVATE_KEY).unwrap().is_none());
}

#[test]
fn audit_lists_lifecycle_operations() {
    let tmp = TempDir::new().unwrap();
    approved(&tmp).arg("init").assert().success();
    approved(&tmp).arg("unlock").assert().success();

    passkey_vault()
        .current_dir(tmp.path())
        .args(["audit", "--last", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("unlock"));
}

#[test]
fn audit_records_failed_unlock_with_error_kind() {
    let tmp = TempDir::new().unwrap();
    approved(&tmp).arg("init").assert().success();

    passkey_vault()
        .current_dir(tmp.path())
        .env_remove("PASSKEY_VAULT_AUTO_APPROVE")
        .arg("unlock")
        .assert()
        .failure();

    passkey_vault()
        .current_dir(tmp.path())
        .args(["audit", "--failures"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unlock"))
        .stdout(predicate::str::contains("credential-rejected"))
        .stdout(predicate::str::contains("1 audit entries"));
}

#[test]
fn completions_generate_script() {
    passkey_vault()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("passkey-vault"));
}

#[test]
fn completions_unknown_shell_fails() {
    passkey_vault()
        .args(["completions", "csh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown shell"));
}
