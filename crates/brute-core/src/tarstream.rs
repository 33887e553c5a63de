use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use crossbeam_channel::Receiver;
use tracing::warn;

use crate::error::{BruteError, Result};
use crate::walk::FileEntry;

/// Stream walker entries into a single tar byte stream on `out`.
///
/// Member names are the walked paths with any leading `/` stripped, the
/// same normalization GNU tar applies. A file that cannot be opened is
/// logged and skipped; once its header has been written, any failure
/// leaves the stream corrupt for the declared size and is fatal.
///
/// Returns the number of files archived. Dropping `out` (on return or
/// error) is what signals EOF to the downstream chunker.
pub fn build_tar<W: Write>(rx: Receiver<FileEntry>, out: W) -> Result<u64> {
    let mut builder = tar::Builder::new(out);
    let mut files = 0u64;

    for entry in rx {
        let file = match File::open(&entry.path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %entry.path, error = %e, "unable to open file, skipping");
                continue;
            }
        };

        let mut header = tar::Header::new_gnu();
        header.set_size(entry.size);
        header.set_mode(entry.mode);
        header.set_mtime(entry.mtime);

        let name = entry.path.trim_start_matches('/');
        let mut body = file.take(entry.size);
        builder
            .append_data(&mut header, name, &mut body)
            .map_err(|e| BruteError::TarStream(format!("archiving {}: {e}", entry.path)))?;
        if body.limit() > 0 {
            return Err(BruteError::TarStream(format!(
                "{} shrank while being archived",
                entry.path
            )));
        }
        files += 1;
    }

    // Flushes the two zero-block terminator and hands the writer back to
    // be dropped.
    builder
        .into_inner()
        .map_err(|e| BruteError::TarStream(format!("closing archive: {e}")))?;
    Ok(files)
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub files: u64,
    pub bytes: u64,
}

/// Extract a reassembled tar stream under `dest`.
///
/// Parent directories are created as needed, existing files are truncated,
/// and the archived permission bits are applied after each file closes.
/// Any filesystem error is fatal; restore has no partial-success mode.
pub fn extract_tar<R: Read>(input: R, dest: &Path) -> Result<ExtractStats> {
    let mut archive = tar::Archive::new(input);
    let mut stats = ExtractStats::default();

    let entries = archive
        .entries()
        .map_err(|e| BruteError::TarStream(format!("reading archive: {e}")))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| BruteError::TarStream(format!("reading entry: {e}")))?;
        let rel = entry
            .path()
            .map_err(|e| BruteError::TarStream(format!("entry path: {e}")))?
            .into_owned();
        let target = dest.join(&rel);

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BruteError::Extraction(format!("creating {}: {e}", parent.display()))
            })?;
        }

        let declared = entry
            .header()
            .size()
            .map_err(|e| BruteError::TarStream(format!("entry size: {e}")))?;
        let mut file = File::create(&target)
            .map_err(|e| BruteError::Extraction(format!("creating {}: {e}", target.display())))?;
        let copied = io::copy(&mut entry, &mut file)
            .map_err(|e| BruteError::Extraction(format!("writing {}: {e}", target.display())))?;
        drop(file);
        if copied != declared {
            return Err(BruteError::TarStream(format!(
                "{} truncated: header declares {declared} bytes, stream held {copied}",
                target.display()
            )));
        }

        let mode = entry
            .header()
            .mode()
            .map_err(|e| BruteError::TarStream(format!("entry mode: {e}")))?;
        apply_mode(&target, mode)
            .map_err(|e| BruteError::Extraction(format!("chmod {}: {e}", target.display())))?;

        stats.files += 1;
        stats.bytes += copied;
    }

    Ok(stats)
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_for(path: &Path, mode: u32) -> FileEntry {
        let metadata = std::fs::metadata(path).unwrap();
        FileEntry {
            path: path.to_string_lossy().to_string(),
            mode,
            mtime: 1_700_000_000,
            size: metadata.len(),
        }
    }

    fn tar_bytes(entries: Vec<FileEntry>) -> (u64, Vec<u8>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        for e in entries {
            tx.send(e).unwrap();
        }
        drop(tx);
        let mut out = Vec::new();
        let files = build_tar(rx, &mut out).unwrap();
        (files, out)
    }

    #[test]
    fn build_and_extract_roundtrip() {
        let src = tempfile::tempdir().unwrap();
        let a = src.path().join("a.txt");
        let b = src.path().join("nested").join("b.bin");
        std::fs::write(&a, b"hello tar").unwrap();
        std::fs::create_dir_all(b.parent().unwrap()).unwrap();
        std::fs::write(&b, vec![0xCD; 2000]).unwrap();

        let (files, bytes) = tar_bytes(vec![entry_for(&a, 0o600), entry_for(&b, 0o755)]);
        assert_eq!(files, 2);

        let dest = tempfile::tempdir().unwrap();
        let stats = extract_tar(&bytes[..], dest.path()).unwrap();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.bytes, 9 + 2000);

        // Member names lost their leading slash, so the source tree
        // reappears under dest.
        let restored_a = dest
            .path()
            .join(a.to_string_lossy().trim_start_matches('/'));
        let restored_b = dest
            .path()
            .join(b.to_string_lossy().trim_start_matches('/'));
        assert_eq!(std::fs::read(&restored_a).unwrap(), b"hello tar");
        assert_eq!(std::fs::read(&restored_b).unwrap(), vec![0xCD; 2000]);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&restored_a).unwrap().permissions().mode();
            assert_eq!(mode & 0o7777, 0o600);
            let mode = std::fs::metadata(&restored_b).unwrap().permissions().mode();
            assert_eq!(mode & 0o7777, 0o755);
        }
    }

    #[test]
    fn unopenable_file_is_skipped() {
        let src = tempfile::tempdir().unwrap();
        let real = src.path().join("real.txt");
        std::fs::write(&real, b"present").unwrap();

        let ghost = FileEntry {
            path: src
                .path()
                .join("ghost.txt")
                .to_string_lossy()
                .to_string(),
            mode: 0o644,
            mtime: 0,
            size: 10,
        };

        let (files, bytes) = tar_bytes(vec![ghost, entry_for(&real, 0o644)]);
        assert_eq!(files, 1, "missing file must be skipped, not fatal");

        let dest = tempfile::tempdir().unwrap();
        let stats = extract_tar(&bytes[..], dest.path()).unwrap();
        assert_eq!(stats.files, 1);
    }

    #[test]
    fn shrunk_file_is_fatal() {
        let src = tempfile::tempdir().unwrap();
        let path = src.path().join("shrinking.txt");
        std::fs::write(&path, b"short").unwrap();

        let mut entry = entry_for(&path, 0o644);
        entry.size = 1000; // stat-time size no longer matches

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(entry).unwrap();
        drop(tx);
        let mut out = Vec::new();
        let err = build_tar(rx, &mut out).unwrap_err();
        assert!(matches!(err, BruteError::TarStream(_)));
    }

    #[test]
    fn empty_input_still_writes_terminator() {
        let (files, bytes) = tar_bytes(Vec::new());
        assert_eq!(files, 0);
        // Two 512-byte zero blocks.
        assert_eq!(bytes.len(), 1024);
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn truncated_stream_fails_extraction() {
        let src = tempfile::tempdir().unwrap();
        let path = src.path().join("x.txt");
        std::fs::write(&path, vec![1u8; 600]).unwrap();

        let (_, bytes) = tar_bytes(vec![entry_for(&path, 0o644)]);
        let dest = tempfile::tempdir().unwrap();
        // Cut the stream mid-body.
        assert!(extract_tar(&bytes[..700], dest.path()).is_err());
    }
}
