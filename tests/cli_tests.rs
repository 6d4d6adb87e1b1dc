//! Tests that run the compiled binaries.
//!
//! None of these load a model: they cover argument validation and the
//! manifest converter, which never touch Python.

mod common;

use std::process::{Command, Output};

use common::SOUND_LIST;
use makesound::manifest::{read_batch, BatchItem};

fn makesound(dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_makesound"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("run makesound")
}

fn prepare_batch(dir: &std::path::Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_prepare-batch"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("run prepare-batch")
}

#[test]
fn makesound_without_prompt_or_batch_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = makesound(dir.path(), &[]);

    assert!(!out.status.success());
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--prompt"), "stderr: {stderr}");
    assert!(!dir.path().join("output.wav").exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn makesound_help_is_fast_and_lists_flags() {
    let dir = tempfile::tempdir().unwrap();
    let out = makesound(dir.path(), &["--help"]);

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    for flag in ["--prompt", "--output", "--duration", "--model", "--batch"] {
        assert!(stdout.contains(flag), "help lacks {flag}");
    }
    assert!(stdout.contains("facebook/audiogen-medium"));
}

#[test]
fn makesound_missing_batch_file_fails_before_model_load() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_makesound"))
        .args(["--batch", "missing.json"])
        .current_dir(dir.path())
        .env("MAKESOUND_PYTHON", "/nonexistent/python")
        .env_remove("RUST_LOG")
        .output()
        .expect("run makesound");

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("missing.json"), "stderr: {stderr}");
    assert!(!stderr.contains("/nonexistent/python"));
    // Reported once, not also as a log record at the default level
    assert_eq!(stderr.lines().filter(|l| l.contains("missing.json")).count(), 1, "stderr: {stderr}");
    assert!(!stderr.contains("makesound failed"), "stderr: {stderr}");
}

#[test]
fn makesound_reports_model_load_failure() {
    let dir = tempfile::tempdir().unwrap();
    let out = Command::new(env!("CARGO_BIN_EXE_makesound"))
        .args(["--prompt", "rain falling"])
        .current_dir(dir.path())
        .env("MAKESOUND_PYTHON", "/nonexistent/python")
        .output()
        .expect("run makesound");

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("facebook/audiogen-medium"), "stderr: {stderr}");
    assert!(!dir.path().join("output.wav").exists());
}

#[test]
fn prepare_batch_converts_default_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("toddler_sounds.json"), SOUND_LIST).unwrap();

    let out = prepare_batch(dir.path(), &[]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Created batch.json with 2 sounds"), "stdout: {stdout}");
    assert!(stdout.contains("makesound --batch batch.json"));

    // Durations keep the form they had in the sound list
    let written = std::fs::read_to_string(dir.path().join("batch.json")).unwrap();
    assert_eq!(
        written,
        r#"[
  {
    "prompt": "dog barking",
    "filename": "sounds/dog",
    "duration": 1
  },
  {
    "prompt": "cat meowing",
    "filename": "sounds/cat",
    "duration": 1.5
  }
]"#
    );

    let items = read_batch(&dir.path().join("batch.json")).unwrap();
    let durations: Vec<f32> = items.iter().map(|i| i.duration_or(5.0)).collect();
    assert_eq!(durations, vec![1.0, 1.5]);
    assert_eq!(items[1], BatchItem::new("cat meowing", "sounds/cat", Some(1.5)));
}

#[test]
fn prepare_batch_custom_paths() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("list.json"), SOUND_LIST).unwrap();

    let out = prepare_batch(dir.path(), &["--source", "list.json", "-o", "out.json"]);
    assert!(out.status.success());
    assert!(dir.path().join("out.json").exists());
    assert!(!dir.path().join("batch.json").exists());
}

#[test]
fn prepare_batch_missing_source_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = prepare_batch(dir.path(), &[]);

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert_eq!(stderr.lines().filter(|l| l.contains("toddler_sounds.json")).count(), 1, "stderr: {stderr}");
    assert!(!dir.path().join("batch.json").exists());
}

#[test]
fn prepare_batch_rejects_malformed_sources() {
    let cases = [
        "{ definitely not json",
        r#"{"items": []}"#,
        r#"{"sounds": [{"filename": "a", "duration": 1}]}"#,
        r#"{"sounds": [{"prompt": "a", "duration": 1}]}"#,
    ];
    for source in cases {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("toddler_sounds.json"), source).unwrap();
        let out = prepare_batch(dir.path(), &[]);
        assert!(!out.status.success(), "accepted: {source}");
        assert!(!dir.path().join("batch.json").exists(), "wrote output for: {source}");
    }
}
