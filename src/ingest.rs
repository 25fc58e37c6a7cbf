//! Archive intake and per-job workspaces.
//!
//! Each ranking job gets its own directory under the uploads root. The
//! uploaded zip is validated against its central directory before any
//! entry is written to disk, so a hostile archive never touches the
//! filesystem. Any validation or extraction failure rolls the whole
//! workspace back.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::config::Config;
use crate::error::{RankError, Result};

/// Filesystem footprint of one ranking job.
///
/// Removes its directory tree when dropped, so every pipeline exit path
/// (success, error, timeout, cancellation) cleans up without explicit
/// handling.
#[derive(Debug)]
pub struct JobWorkspace {
    root: PathBuf,
    extracted: PathBuf,
}

impl JobWorkspace {
    /// Directory holding the extracted archive contents.
    pub fn extracted_dir(&self) -> &Path {
        &self.extracted
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.root.display(),
                    error = %e,
                    "Failed to remove job workspace"
                );
            }
        }
    }
}

/// Persist and unpack an uploaded archive into a fresh job workspace.
///
/// The raw upload is kept as `input.zip` next to the `extracted/` tree
/// for later inspection. Validation happens against archive metadata
/// before extraction starts.
pub fn ingest(config: &Config, job_id: &str, archive_bytes: &[u8]) -> Result<JobWorkspace> {
    let root = config.uploads_dir.join(job_id);
    fs::create_dir_all(&root)?;

    match ingest_into(config, &root, archive_bytes) {
        Ok(workspace) => Ok(workspace),
        Err(e) => {
            // Roll the half-built workspace back; the error wins.
            let _ = fs::remove_dir_all(&root);
            Err(e)
        }
    }
}

fn ingest_into(config: &Config, root: &Path, archive_bytes: &[u8]) -> Result<JobWorkspace> {
    fs::write(root.join("input.zip"), archive_bytes)?;

    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))
        .map_err(|e| RankError::InvalidArchive(e.to_string()))?;

    validate_archive(config, &mut archive)?;

    let extracted = root.join("extracted");
    fs::create_dir_all(&extracted)?;

    archive
        .extract(&extracted)
        .map_err(|e| RankError::InvalidArchive(e.to_string()))?;

    tracing::info!(
        entries = archive.len(),
        path = %extracted.display(),
        "Archive extracted"
    );

    Ok(JobWorkspace {
        root: root.to_path_buf(),
        extracted,
    })
}

/// Check the archive's declared metadata against the configured limits.
///
/// Entry count, cumulative uncompressed size, and per-entry compression
/// ratio all come from the central directory, so nothing is decompressed
/// here. The size check fails as soon as the running total crosses the
/// limit rather than summing everything first.
fn validate_archive(config: &Config, archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<()> {
    let count = archive.len();
    if count > config.max_archive_entries {
        return Err(RankError::TooManyEntries {
            count,
            limit: config.max_archive_entries,
        });
    }

    let mut total: u64 = 0;
    for i in 0..count {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| RankError::InvalidArchive(e.to_string()))?;

        total = total.saturating_add(entry.size());
        if total > config.max_extracted_bytes {
            return Err(RankError::ArchiveTooLarge {
                limit: config.max_extracted_bytes,
            });
        }

        if entry.compressed_size() > 0 {
            let ratio = entry.size() as f64 / entry.compressed_size() as f64;
            if ratio > config.max_compression_ratio {
                let name = entry.name().to_string();
                tracing::warn!(
                    entry = %name,
                    ratio = ratio,
                    "Rejecting archive with suspicious compression ratio"
                );
                return Err(RankError::SuspiciousCompressionRatio { entry: name, ratio });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn test_config(uploads_dir: &Path) -> Config {
        let mut config = Config::load_or_default();
        config.uploads_dir = uploads_dir.to_path_buf();
        config
    }

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_valid_archive_extracts() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let bytes = build_zip(&[
            ("alice.png", b"fake image data for alice"),
            ("nested/bob.png", b"fake image data for bob"),
        ]);

        let workspace = ingest(&config, "job-1", &bytes).unwrap();

        assert!(workspace.root().join("input.zip").exists());
        assert!(workspace.extracted_dir().join("alice.png").exists());
        assert!(workspace.extracted_dir().join("nested/bob.png").exists());
    }

    #[test]
    fn test_workspace_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let bytes = build_zip(&[("a.png", b"data")]);
        let workspace = ingest(&config, "job-2", &bytes).unwrap();
        let root = workspace.root().to_path_buf();
        assert!(root.exists());

        drop(workspace);
        assert!(!root.exists());
    }

    #[test]
    fn test_invalid_bytes_rejected_and_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let err = ingest(&config, "job-3", b"this is not a zip file").unwrap_err();
        assert!(matches!(err, RankError::InvalidArchive(_)));
        assert!(!dir.path().join("job-3").exists());
    }

    #[test]
    fn test_too_many_entries_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.max_archive_entries = 2;

        let bytes = build_zip(&[
            ("a.png", b"1"),
            ("b.png", b"2"),
            ("c.png", b"3"),
        ]);

        let err = ingest(&config, "job-4", &bytes).unwrap_err();
        assert!(matches!(
            err,
            RankError::TooManyEntries { count: 3, limit: 2 }
        ));
        assert!(!dir.path().join("job-4").exists());
    }

    #[test]
    fn test_oversized_archive_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.max_extracted_bytes = 16;
        // High-entropy payload so deflate cannot trip the ratio check first.
        let payload: Vec<u8> = (0..64u32).map(|i| (i * 37 % 251) as u8).collect();

        let bytes = build_zip(&[("big.bin", &payload)]);

        let err = ingest(&config, "job-5", &bytes).unwrap_err();
        assert!(matches!(err, RankError::ArchiveTooLarge { limit: 16 }));
        assert!(!dir.path().join("job-5").exists());
    }

    #[test]
    fn test_suspicious_ratio_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        // 1 MiB of zeros deflates to a few KiB, far past the 100x limit.
        let zeros = vec![0u8; 1024 * 1024];
        let bytes = build_zip(&[("bomb.bin", &zeros)]);

        let err = ingest(&config, "job-6", &bytes).unwrap_err();
        assert!(matches!(
            err,
            RankError::SuspiciousCompressionRatio { .. }
        ));
        assert!(!dir.path().join("job-6").exists());
    }
}
