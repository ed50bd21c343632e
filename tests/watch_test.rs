#![cfg(unix)]

use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

struct Fixture {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    home: PathBuf,
    inbox: PathBuf,
    upload_log: PathBuf,
}

fn write_fake_uploader(bin_path: &Path, log: &Path, exit_code: i32) {
    let script = format!(
        "#!/bin/sh\nprintf '%s|%s|%s\\n' \"$1\" \"$2\" \"$(pwd)\" >> '{}'\nexit {exit_code}\n",
        log.display()
    );
    fs::write(bin_path, script).expect("write fake uploader");
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(bin_path).expect("metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(bin_path, perms).expect("chmod");
}

fn fixture(exit_code: i32) -> Fixture {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path().to_path_buf();
    let home = root.join("home");
    let inbox = root.join("inbox");
    fs::create_dir_all(&home).expect("mkdir home");
    fs::create_dir_all(&inbox).expect("mkdir inbox");

    let upload_log = root.join("uploads.log");
    let bin = root.join("fake-glupload");
    write_fake_uploader(&bin, &upload_log, exit_code);
    fs::write(
        home.join("coldsync.toml"),
        format!(
            "[uploader]\nprogram = \"{}\"\nargs = [\"{{vault}}\", \"{{archive}}\"]\n",
            bin.display()
        ),
    )
    .expect("write config");

    Fixture {
        _tmp: tmp,
        root,
        home,
        inbox,
        upload_log,
    }
}

fn coldsync(fx: &Fixture) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coldsync");
    cmd.current_dir(&fx.root)
        .env("COLDSYNC_HOME", &fx.home)
        .env("COLDSYNC_CONFIG_PATH", fx.home.join("coldsync.toml"))
        .env_remove("COLDSYNC_UPLOADER_BIN")
        .env_remove("COLDSYNC_WATCH_DIR");
    cmd
}

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), b"zip bytes").expect("write archive");
}

fn upload_log_lines(fx: &Fixture) -> Vec<String> {
    fs::read_to_string(&fx.upload_log)
        .unwrap_or_default()
        .lines()
        .map(ToOwned::to_owned)
        .collect()
}

#[test]
fn watch_once_uploads_complete_archives_and_marks_them_done() {
    let fx = fixture(0);
    touch(&fx.inbox, "Heat (1995).zip");
    touch(&fx.inbox, "Show - Season 2.zip");
    touch(&fx.inbox, "Show - Season 2.zip.part");
    touch(&fx.inbox, "done_Old (1980).zip");

    coldsync(&fx)
        .args(["watch", "--once", "--dir"])
        .arg(&fx.inbox)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 uploadable archives"))
        .stdout(predicate::str::contains("Uploaded Heat (1995).zip to Movies"));

    assert!(fx.inbox.join("done_Heat (1995).zip").exists());
    assert!(!fx.inbox.join("Heat (1995).zip").exists());
    assert!(fx.inbox.join("Show - Season 2.zip").exists());

    let lines = upload_log_lines(&fx);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("Movies|Heat (1995).zip|"));
    assert!(lines[0].ends_with("inbox"));

    let ledger = fs::read_to_string(fx.home.join("state/uploads.jsonl")).expect("ledger");
    assert!(ledger.contains("\"archive\":\"Heat (1995).zip\""));
    let audit = fs::read_to_string(fx.home.join("logs/audit.log")).expect("audit");
    assert!(audit.contains("\"phase\":\"upload\""));
    assert!(!fx.home.join("logs/watch.lock").exists());
}

#[test]
fn ledger_keeps_restarted_watcher_from_uploading_twice() {
    let fx = fixture(0);
    touch(&fx.inbox, "Heat (1995).zip");

    coldsync(&fx)
        .args(["watch", "--once", "--dir"])
        .arg(&fx.inbox)
        .assert()
        .success();

    // Same name shows up again, as if the rename had never happened.
    touch(&fx.inbox, "Heat (1995).zip");
    touch(&fx.inbox, "Show - Specials.zip");

    coldsync(&fx)
        .args(["watch", "--once", "--dir"])
        .arg(&fx.inbox)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 uploadable archives"))
        .stdout(predicate::str::contains("Uploaded Show - Specials.zip to TVShows"));

    let lines = upload_log_lines(&fx);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].starts_with("TVShows|Show - Specials.zip|"));
}

#[test]
fn empty_directory_reports_nothing_to_upload() {
    let fx = fixture(0);

    coldsync(&fx)
        .args(["watch", "--once", "--dir"])
        .arg(&fx.inbox)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to upload as of "))
        .stdout(predicate::str::contains(". Will check later"));
}

#[test]
fn failed_upload_leaves_archive_for_retry() {
    let fx = fixture(3);
    touch(&fx.inbox, "Heat (1995).zip");

    coldsync(&fx)
        .args(["watch", "--once", "--dir"])
        .arg(&fx.inbox)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[ERROR] Upload failed for Heat (1995).zip"))
        .stderr(predicate::str::contains("COLDSYNC_WARN code=W001_UPLOAD_FAILED"));

    assert!(fx.inbox.join("Heat (1995).zip").exists());
    assert!(!fx.inbox.join("done_Heat (1995).zip").exists());
    let ledger = fx.home.join("state/uploads.jsonl");
    assert!(!ledger.exists() || fs::read_to_string(ledger).expect("ledger").is_empty());
}

#[test]
fn unroutable_archive_is_skipped_with_naming_warning() {
    let fx = fixture(0);
    touch(&fx.inbox, "holiday photos.zip");

    coldsync(&fx)
        .args(["watch", "--once", "--dir"])
        .arg(&fx.inbox)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("[ERROR] Skipping holiday photos.zip"))
        .stderr(predicate::str::contains("W004_NAMING_REJECTED"));
    assert!(upload_log_lines(&fx).is_empty());

    coldsync(&fx)
        .args(["watch", "--once", "--vault", "Misc", "--dir"])
        .arg(&fx.inbox)
        .assert()
        .success();
    assert!(upload_log_lines(&fx)[0].starts_with("Misc|holiday photos.zip|"));
}

#[test]
fn watch_loop_stops_after_max_cycles() {
    let fx = fixture(0);
    touch(&fx.inbox, "Heat (1995).zip");

    coldsync(&fx)
        .args([
            "watch",
            "--interval-secs",
            "1",
            "--max-cycles",
            "2",
            "--dir",
        ])
        .arg(&fx.inbox)
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 1 uploadable archives"))
        .stdout(predicate::str::contains("Nothing to upload as of "))
        .stdout(predicate::str::contains("watcher stopped after 2 cycles"));
}

#[test]
fn upload_command_records_and_respects_ledger() {
    let fx = fixture(0);
    touch(&fx.inbox, "Heat (1995).zip");
    let archive = fx.inbox.join("Heat (1995).zip");

    coldsync(&fx)
        .arg("upload")
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Uploaded Heat (1995).zip to Movies"));
    assert!(fx.inbox.join("done_Heat (1995).zip").exists());

    touch(&fx.inbox, "Heat (1995).zip");
    coldsync(&fx)
        .arg("upload")
        .arg(&archive)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already in the upload ledger"));

    fs::remove_file(fx.inbox.join("done_Heat (1995).zip")).expect("clear done");
    coldsync(&fx)
        .args(["upload", "--force", "--vault", "Archive"])
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("to Archive"));
    assert_eq!(upload_log_lines(&fx).len(), 2);

    coldsync(&fx)
        .args(["ledger", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("records=2 archives=1"));
}

#[test]
fn missing_uploader_binary_is_reported() {
    let fx = fixture(0);
    touch(&fx.inbox, "Heat (1995).zip");

    coldsync(&fx)
        .env("COLDSYNC_UPLOADER_BIN", fx.root.join("no-such-uploader"))
        .args(["watch", "--once", "--dir"])
        .arg(&fx.inbox)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("uploader binary unavailable"));
    assert!(fx.inbox.join("Heat (1995).zip").exists());
}

fn hold_watch_lock(fx: &Fixture) -> fs::File {
    use fs2::FileExt;
    let logs = fx.home.join("logs");
    fs::create_dir_all(&logs).expect("mkdir logs");
    let file = fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(logs.join("watch.lock"))
        .expect("open lock");
    file.try_lock_exclusive().expect("lock");
    fs::write(logs.join("watch.lock"), format!("{}\ntest\n", std::process::id()))
        .expect("write lock");
    file
}

#[test]
fn upload_refuses_while_a_watcher_holds_the_lock() {
    let fx = fixture(0);
    touch(&fx.inbox, "Heat (1995).zip");
    let held = hold_watch_lock(&fx);

    coldsync(&fx)
        .arg("upload")
        .arg(fx.inbox.join("Heat (1995).zip"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("a watcher is already running"));
    assert!(upload_log_lines(&fx).is_empty());
    assert!(fx.inbox.join("Heat (1995).zip").exists());

    coldsync(&fx)
        .args(["ledger", "forget", "Heat (1995).zip"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("a watcher is already running"));

    drop(held);
    coldsync(&fx)
        .arg("upload")
        .arg(fx.inbox.join("Heat (1995).zip"))
        .assert()
        .success();
    assert_eq!(upload_log_lines(&fx).len(), 1);
}
