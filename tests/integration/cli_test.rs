//! Runs the built `blocksum` binary.

use std::ffi::OsStr;
use std::fs;
use std::process::{Command, Output};

use tempfile::tempdir;

use crate::{expected_checksums, read_checksums};

fn blocksum<S: AsRef<OsStr>>(args: &[S]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_blocksum"));
    cmd.args(args);
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("Failed to run blocksum")
}

#[test]
fn test_checksums_file() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    let data: Vec<u8> = (0..100u8).collect();
    fs::write(&input, &data).unwrap();

    let result = run(blocksum(&[&input, &output]).arg("32"));
    assert!(result.status.success(), "{:?}", result);
    assert_eq!(fs::metadata(&output).unwrap().len(), 16);
    assert_eq!(read_checksums(&output), expected_checksums(&data, 32));
}

#[test]
fn test_ten_bytes_minimum_block_size() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    fs::write(&input, (1..=10u8).collect::<Vec<_>>()).unwrap();

    let result = run(blocksum(&[&input, &output]).arg("8").arg("--workers").arg("2"));
    assert!(result.status.success(), "{:?}", result);
    assert_eq!(read_checksums(&output).len(), 2);
}

#[test]
fn test_empty_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("empty.bin");
    let output = dir.path().join("out.bin");
    fs::write(&input, b"").unwrap();

    let result = run(&mut blocksum(&[&input, &output]));
    assert!(result.status.success(), "{:?}", result);
    assert_eq!(fs::metadata(&output).unwrap().len(), 0);
}

#[test]
fn test_block_size_three_rejected_before_io() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    fs::write(&input, b"0123456789").unwrap();

    let result = run(blocksum(&[&input, &output]).arg("3"));
    assert_eq!(result.status.code(), Some(2));
    assert!(!output.exists());
}

#[test]
fn test_non_numeric_block_size() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");

    let result = run(blocksum(&[&input, &output]).arg("lots"));
    assert_eq!(result.status.code(), Some(2));
}

#[test]
fn test_wrong_argument_count() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");

    let result = run(&mut blocksum(&[&input]));
    assert_eq!(result.status.code(), Some(2));
}

#[test]
fn test_missing_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("missing.bin");
    let output = dir.path().join("out.bin");

    let result = run(&mut blocksum(&[&input, &output]));
    assert_eq!(result.status.code(), Some(1));
    assert!(!output.exists());

    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("missing.bin"), "stderr was {}", stderr);
}

#[test]
fn test_highway_flag() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    fs::write(&input, vec![5u8; 40]).unwrap();

    let result = run(blocksum(&[&input, &output])
        .arg("16")
        .args(["--algorithm", "highway"]));
    assert!(result.status.success(), "{:?}", result);
    assert_eq!(read_checksums(&output).len(), 3);
    assert_ne!(read_checksums(&output), expected_checksums(&vec![5u8; 40], 16));
}

#[test]
fn test_oversized_block_reports_allocation_once() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    fs::write(&input, b"0123456789").unwrap();

    let huge = (1u64 << 60).to_string();
    let result = run(blocksum(&[&input, &output]).arg(&huge));
    assert_eq!(result.status.code(), Some(1), "{:?}", result);

    // The fault is reported by the binary alone, not echoed by the logger
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("Out of memory for blocks"), "stderr was {}", stderr);
    assert_eq!(stderr.matches("cannot reserve").count(), 1, "stderr was {}", stderr);
}

#[test]
fn test_zero_queue_capacity_is_usage_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    let output = dir.path().join("out.bin");
    fs::write(&input, b"0123456789").unwrap();

    let result = run(blocksum(&[&input, &output]).args(["--queue-capacity", "0"]));
    assert_eq!(result.status.code(), Some(2));
    assert!(!output.exists());

    let result = run(blocksum(&[&input, &output]).args(["--slots-per-super-block", "0"]));
    assert_eq!(result.status.code(), Some(2));
    assert!(!output.exists());
}
