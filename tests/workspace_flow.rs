use assert_cmd::prelude::*;
use std::path::Path;
use std::process::Command;

fn billdue_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("billdue"))
}

fn run_ok(home: &tempfile::TempDir, args: &[&str]) {
    let mut cmd = billdue_cmd();
    cmd.env("BILLDUE_HOME", home.path());
    cmd.args(args);
    cmd.assert().success();
}

fn run_ok_out(home: &tempfile::TempDir, args: &[&str]) -> String {
    let mut cmd = billdue_cmd();
    cmd.env("BILLDUE_HOME", home.path());
    cmd.args(args);
    let out = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(out).expect("utf8 stdout")
}

fn workspace_db_path(billdue_home: &Path, slug: &str) -> std::path::PathBuf {
    billdue_home
        .join("data")
        .join("workspaces")
        .join(slug)
        .join("billdue.sqlite3")
}

#[test]
fn bills_are_scoped_to_the_current_workspace() {
    let home = tempfile::tempdir().expect("tempdir");

    run_ok(
        &home,
        &[
            "bill", "create", "Rent", "--match", "rent", "--min", "900", "--max", "1000",
            "--date", "2023-01-01", "--period", "monthly",
        ],
    );
    assert!(workspace_db_path(home.path(), "personal").exists());

    run_ok(&home, &["ws", "add", "Shared Flat"]);
    assert!(workspace_db_path(home.path(), "shared-flat").exists());

    run_ok(&home, &["ws", "checkout", "Shared Flat"]);
    let check = run_ok_out(&home, &["ws", "check"]);
    assert!(check.contains("workspace: Shared Flat"), "ws output: {check}");

    let list = run_ok_out(&home, &["bill", "list"]);
    assert_eq!(list, "(no bills)\n");

    run_ok(&home, &["ws", "checkout", "personal"]);
    let list = run_ok_out(&home, &["bill", "list"]);
    assert!(list.contains("Rent\tmonthly"), "list output: {list}");
}
