use std::io::Write;
use std::process::{Command, Output, Stdio};

const LOG: &str = "\
commit cccc (HEAD -> main)
parents aaaa bbbb
author Alice <alice@example.com>
date 2023-01-06T00:00:00Z

    Merge branch 'feature'

commit bbbb
parents aaaa
author Bob <bob@example.com>
date 2023-01-03T00:00:00Z

    fix: handle empty input

commit aaaa
author Alice <alice@example.com>
date 2023-01-01T00:00:00Z

    initial
";

fn gitdora(args: &[&str], dir: &std::path::Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gitdora"))
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
}

fn write_log(dir: &std::path::Path) -> String {
    let path = dir.join("history.log");
    std::fs::write(&path, LOG).unwrap();
    path.display().to_string()
}

#[test]
fn failures_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());

    let output = gitdora(&["failures", "--input", &log, "--format", "json"], dir.path());
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["month"], "2023-01");
    assert_eq!(rows[0]["total"], 3);
    assert_eq!(rows[0]["failureRate"], 33.3);
}

#[test]
fn ingestion_summary_goes_to_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());

    let output = gitdora(&["throughput", "--input", &log], dir.path());
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Ingested 3 commits (0 rejected"), "stderr: {stderr}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Throughput"));
    assert!(!stdout.contains("Ingested"));
}

#[test]
fn report_reads_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = Command::new(env!("CARGO_BIN_EXE_gitdora"))
        .args(["report", "--format", "markdown"])
        .current_dir(dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(LOG.as_bytes()).unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("# DORA Metrics"));
    assert!(stdout.contains("## Cycle Time by Branch (days)"));
    assert!(stdout.contains("**Merged branches:** 1"));
}

#[test]
fn branches_json_names_the_merged_branch() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());

    let output = gitdora(&["branches", "--input", &log, "--format", "json"], dir.path());
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["lifetimes"][0]["name"], "feature");
    assert_eq!(report["lifetimes"][0]["times"]["cycleSeconds"], 3 * 86_400);
    assert_eq!(report["openBranches"].as_array().unwrap().len(), 0);
}

#[test]
fn config_file_changes_keywords() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());
    std::fs::write(
        dir.path().join(".gitdora.toml"),
        "[change_failure]\nkeywords = [\"initial\"]\n",
    )
    .unwrap();

    let output = gitdora(&["failures", "--input", &log, "--format", "json"], dir.path());
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["failures"], 1);
}

#[test]
fn oversized_window_is_a_fatal_error() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());
    let config = dir.path().join("custom.toml");
    std::fs::write(&config, "[cycle_time]\nwindow_size = 9\n").unwrap();

    let output = gitdora(
        &["cycle-time", "--input", &log, "--config", &config.display().to_string()],
        dir.path(),
    );
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn missing_config_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());

    let output = gitdora(
        &["cycle-time", "--input", &log, "--config", "nope.toml"],
        dir.path(),
    );
    assert!(!output.status.success());
}

#[test]
fn empty_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.log");
    std::fs::write(&path, "").unwrap();

    let output = gitdora(&["report", "--input", &path.display().to_string()], dir.path());
    assert!(!output.status.success());
}

#[test]
fn authors_ranks_by_commit_count() {
    let dir = tempfile::tempdir().unwrap();
    let log = write_log(dir.path());

    let output = gitdora(&["authors", "--input", &log, "--format", "json"], dir.path());
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["author"], "alice@example.com");
    assert_eq!(rows[0]["totalCommits"], 2);
    assert_eq!(rows[0]["percentileRank"], 100.0);
    assert_eq!(rows[1]["author"], "bob@example.com");
    assert_eq!(rows[1]["percentileRank"], 50.0);
    assert_eq!(rows[1]["weeks"][0]["commits"], 1);
}

#[test]
fn full_hash_git_log_reports_the_merged_branch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("git.log");
    let merge = "5".repeat(40);
    let main = "1".repeat(40);
    let feature = "4".repeat(40);
    let log = format!(
        "commit {merge} {main} {feature} (HEAD -> main)\n\
         Merge: 1111111 4444444\n\
         Author: Alice <alice@example.com>\n\
         Date:   2023-01-06T00:00:00+00:00\n\n    Merge branch 'feature'\n\n\
         commit {feature} {main}\n\
         Author: Bob <bob@example.com>\n\
         Date:   2023-01-03T00:00:00+00:00\n\n    work\n\n\
         commit {main}\n\
         Author: Alice <alice@example.com>\n\
         Date:   2023-01-01T00:00:00+00:00\n\n    initial\n"
    );
    std::fs::write(&path, log).unwrap();

    let output = gitdora(
        &["branches", "--input", &path.display().to_string(), "--format", "json"],
        dir.path(),
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stderr).contains("0 boundary parents"));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["lifetimes"][0]["name"], "feature");
    assert_eq!(report["weeks"].as_array().unwrap().len(), 1);
}
