//! The library pipeline driven through real files.

use std::fs;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::{tempdir, NamedTempFile};

use blocksum::error::Result;
use blocksum::{BlocksumError, ChecksumAlgorithm, Pipeline, PipelineConfig};

use crate::{expected_checksums, read_checksums};

#[test]
fn test_random_file_round_trip() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0xf11e);
    let mut data = vec![0u8; 1_000_003];
    rng.fill(&mut data[..]);

    let input = NamedTempFile::new()?;
    fs::write(input.path(), &data)?;
    let output = NamedTempFile::new()?;

    let config = PipelineConfig::default().with_block_size(4096)?;
    let report = Pipeline::new(config)?.run_files(input.path(), output.path())?;

    assert_eq!(report.bytes_read, data.len() as u64);
    assert_eq!(report.blocks_read, 245);
    assert_eq!(report.checksums_written, 245);
    assert_eq!(report.pool.in_use(), 0);
    assert_eq!(read_checksums(output.path()), expected_checksums(&data, 4096));
    Ok(())
}

#[test]
fn test_default_block_size() -> Result<()> {
    let data = vec![0xabu8; 2_500_000];
    let input = NamedTempFile::new()?;
    fs::write(input.path(), &data)?;
    let output = NamedTempFile::new()?;

    let report = Pipeline::new(PipelineConfig::default())?.run_files(input.path(), output.path())?;
    assert_eq!(report.block_size, 1_000_000);

    let checksums = read_checksums(output.path());
    assert_eq!(checksums.len(), 3);
    assert_eq!(checksums, expected_checksums(&data, 1_000_000));
    Ok(())
}

#[test]
fn test_output_is_truncated() -> Result<()> {
    let input = NamedTempFile::new()?;
    fs::write(input.path(), b"0123456789abcdef")?;
    let output = NamedTempFile::new()?;
    fs::write(output.path(), vec![0xffu8; 1000])?;

    let config = PipelineConfig::default().with_block_size(8)?;
    Pipeline::new(config)?.run_files(input.path(), output.path())?;
    assert_eq!(fs::metadata(output.path())?.len(), 8);
    Ok(())
}

#[test]
fn test_algorithms_differ() -> Result<()> {
    let input = NamedTempFile::new()?;
    fs::write(input.path(), b"some bytes worth checksumming")?;
    let crc_out = NamedTempFile::new()?;
    let highway_out = NamedTempFile::new()?;

    let base = PipelineConfig::default().with_block_size(16)?;
    Pipeline::new(base.clone())?.run_files(input.path(), crc_out.path())?;
    Pipeline::new(base.with_algorithm(ChecksumAlgorithm::Highway))?
        .run_files(input.path(), highway_out.path())?;

    let crc = read_checksums(crc_out.path());
    let highway = read_checksums(highway_out.path());
    assert_eq!(crc.len(), 2);
    assert_eq!(highway.len(), 2);
    assert_ne!(crc, highway);
    Ok(())
}

#[test]
fn test_uncreatable_output() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.bin");
    fs::write(&input, b"data").unwrap();
    let output = dir.path().join("no-such-dir").join("out.bin");

    let result = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .run_files(&input, &output);
    match result {
        Err(BlocksumError::Open { path, .. }) => assert_eq!(path, output),
        other => panic!("Expected Open error, got {:?}", other),
    }
}
