use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use tracing::warn;

use crate::error::{BruteError, Result};

/// A file selected for backup, as emitted by the walker. The path is the
/// tar member name and the path opened when the entry is archived.
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub path: String,
    pub mode: u32,
    pub mtime: u64,
    pub size: u64,
}

/// Gitignore-style exclude set, matched against the lowercased full path.
pub struct ExcludeMatcher {
    gitignore: Gitignore,
}

impl ExcludeMatcher {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let mut builder = GitignoreBuilder::new("");
        for pattern in patterns {
            builder.add_line(None, pattern).map_err(|e| {
                BruteError::Config(format!("invalid exclude pattern '{pattern}': {e}"))
            })?;
        }
        let gitignore = builder
            .build()
            .map_err(|e| BruteError::Config(format!("exclude matcher build failed: {e}")))?;
        Ok(Self { gitignore })
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        let lowered = path.to_lowercase();
        let rel = lowered.trim_start_matches('/');
        self.gitignore
            .matched_path_or_any_parents(Path::new(rel), false)
            .is_ignore()
    }
}

fn entry_mode(metadata: &std::fs::Metadata) -> u32 {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o7777
    }
    #[cfg(not(unix))]
    {
        let _ = metadata;
        0o644
    }
}

fn entry_mtime(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Walk one include root depth-first in sorted order, calling `emit` for
/// every regular, non-empty, non-excluded file. Per-entry I/O problems are
/// logged and skipped; a vanished root is logged and skipped too. `emit`
/// returning `false` stops the walk (the consumer went away).
pub fn walk_root(root: &str, matcher: &ExcludeMatcher, emit: &mut dyn FnMut(FileEntry) -> bool) {
    let mut builder = WalkBuilder::new(root);
    builder.follow_links(false);
    builder.hidden(false);
    builder.ignore(false);
    builder.git_global(false);
    builder.git_exclude(false);
    builder.git_ignore(false);
    builder.parents(false);
    builder.require_git(false);
    builder.sort_by_file_name(std::ffi::OsStr::cmp);

    for entry_result in builder.build() {
        let entry = match entry_result {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping entry (walk error)");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "skipping entry (stat error)");
                continue;
            }
        };

        if metadata.len() == 0 {
            continue;
        }

        let path = entry.path().to_string_lossy().to_string();
        if matcher.is_excluded(&path) {
            continue;
        }

        let keep_going = emit(FileEntry {
            mode: entry_mode(&metadata),
            mtime: entry_mtime(&metadata),
            size: metadata.len(),
            path,
        });
        if !keep_going {
            return;
        }
    }
}
