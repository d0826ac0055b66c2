//! End-to-end tests of the `docbatch` binary: exit codes, the summary file
//! and the run log.

#![cfg(unix)]

mod common;

use assert_cmd::Command;
use common::Sandbox;
use predicates::prelude::*;
use std::fs;

fn docbatch(sb: &Sandbox) -> Command {
    let mut cmd = Command::cargo_bin("docbatch").unwrap();
    cmd.current_dir(sb.root())
        .env_remove("RUST_LOG")
        .arg("--docling-bin")
        .arg(&sb.docling)
        .arg("--python-bin")
        .arg(&sb.python)
        .arg("--no-progress");
    cmd
}

#[test]
fn missing_target_exits_one() {
    let sb = Sandbox::new();
    docbatch(&sb)
        .args(["--format", "md", "--ocr=false", "no-such-folder"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
    assert!(!sb.output().join("conversion_summary.csv").exists());
}

#[test]
fn no_target_without_a_terminal_exits_one() {
    let sb = Sandbox::new();
    docbatch(&sb)
        .write_stdin("")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No file or folder given"));

    let log = fs::read_to_string(sb.root().join("conversion.log")).unwrap();
    assert!(log.contains("No file or folder given"), "log: {log}");
}

#[test]
fn fatal_errors_are_printed_once() {
    let sb = Sandbox::new();
    let out = docbatch(&sb)
        .args(["-f", "md", "--ocr=false", "missing"])
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(stderr.matches("does not exist").count(), 1, "stderr: {stderr}");
}

#[test]
fn all_success_exits_zero() {
    let sb = Sandbox::new();
    sb.write_pdf("a.pdf");
    sb.write_png("scans/b.png");

    docbatch(&sb)
        .args(["-f", "html", "--ocr", "docs"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Converted 2/2 file(s)"));

    assert!(sb.output().join("html/a.html").is_file());
    let b = fs::read_to_string(sb.output().join("html/scans/b.html")).unwrap();
    assert!(b.contains("ocr=cpu"), "got: {b}");
}

#[test]
fn json_summary_on_stdout() {
    let sb = Sandbox::new();
    sb.write_pdf("a.pdf");

    let out = docbatch(&sb)
        .args(["--json", "-f", "json", "--ocr=false", "docs"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(summary["succeeded"], 1);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["status"], "success");
    assert!(summary["results"][0]["output_path"]
        .as_str()
        .unwrap()
        .ends_with("json/a.json"));
}

#[test]
fn partial_failure_exits_two() {
    let sb = Sandbox::new();
    sb.write_pdf("good.pdf");
    sb.write("bad.pdf", b"");

    docbatch(&sb)
        .args(["-f", "md", "--ocr=false", "docs"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("1 file(s) failed"));

    let rows = sb.summary_rows();
    assert_eq!(rows.len(), 2);
    let bad = rows.iter().find(|r| r[0].ends_with("bad.pdf")).unwrap();
    assert_eq!(&bad[1], "failure");
    assert_eq!(&bad[3], "");
    assert!(bad[4].contains("Corrupt input"));
}

#[test]
fn total_failure_exits_three() {
    let sb = Sandbox::new();
    sb.write_pdf("reject-1.pdf");
    sb.write_pdf("reject-2.pdf");

    docbatch(&sb)
        .args(["-f", "md", "--ocr=false", "docs"])
        .assert()
        .code(3);
    assert!(sb.summary_rows().iter().all(|r| &r[1] == "failure"));
}

#[test]
fn empty_folder_exits_zero_with_a_notice() {
    let sb = Sandbox::new();
    docbatch(&sb)
        .args(["-f", "md", "--ocr=false", "docs"])
        .assert()
        .success()
        .stderr(predicate::str::contains("No supported input files were found."));
}

#[test]
fn summary_is_rewritten_and_log_grows() {
    let sb = Sandbox::new();
    sb.write_pdf("a.pdf");
    sb.write_pdf("b.pdf");
    let log = sb.root().join("conversion.log");

    docbatch(&sb)
        .args(["-f", "text", "--ocr=false", "docs"])
        .assert()
        .success();
    let first_log = fs::read_to_string(&log).unwrap();
    assert!(first_log.contains("Converted"), "log: {first_log}");

    docbatch(&sb)
        .args(["-f", "text", "--ocr=false", "docs"])
        .assert()
        .success();
    let second_log = fs::read_to_string(&log).unwrap();

    assert_eq!(sb.summary_rows().len(), 2);
    assert!(second_log.starts_with(&first_log));
    assert!(second_log.len() > first_log.len());
}

#[test]
fn invalid_format_is_rejected_by_the_parser() {
    let sb = Sandbox::new();
    docbatch(&sb)
        .args(["-f", "pdf", "docs"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pdf"));
}

#[test]
fn a_worker_process_refuses_to_start_a_batch() {
    let sb = Sandbox::new();
    sb.write_pdf("a.pdf");

    docbatch(&sb)
        .env("DOCBATCH_WORKER_PROCESS", "1")
        .args(["-f", "md", "--ocr=false", "docs"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("started as a worker"));
    assert!(!sb.output().join("markdown/a.md").exists());
}
