use std::path::Path;

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::{is_markdown, VaultError};

const SKIPPED_DIRS: &[&str] = &[".obsidian", ".git", ".trash", "node_modules"];

/// Copy `.md` files from an external directory into the vault, preserving
/// subdirectory structure. Files already present in the vault are left
/// alone. Returns the number of copied notes.
pub fn import_external(notes_root: &Path, source_dir: &Path) -> Result<usize, VaultError> {
    if !source_dir.is_dir() {
        return Err(VaultError::NotFound {
            path: source_dir.to_string_lossy().into_owned(),
        });
    }

    let canonical_root = std::fs::canonicalize(notes_root)
        .map_err(|e| VaultError::io(notes_root, e))?;
    let canonical_source = std::fs::canonicalize(source_dir)
        .map_err(|e| VaultError::io(source_dir, e))?;
    if canonical_source.starts_with(&canonical_root) || canonical_root.starts_with(&canonical_source)
    {
        return Err(VaultError::SourceOverlap {
            path: source_dir.to_string_lossy().into_owned(),
        });
    }

    let walker = WalkDir::new(source_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(should_descend);

    let mut copied = 0usize;
    for entry in walker {
        let entry = entry.map_err(|error| VaultError::Io {
            path: source_dir.to_string_lossy().into_owned(),
            source: error
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walk failed")),
        })?;
        if entry.file_type().is_dir() || !is_markdown(entry.path()) {
            continue;
        }

        let Ok(rel) = entry.path().strip_prefix(source_dir) else {
            continue;
        };
        let target = notes_root.join(rel);
        if target.exists() {
            debug!(path = %rel.display(), "skipping existing note during import");
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
        }
        std::fs::copy(entry.path(), &target).map_err(|e| VaultError::io(entry.path(), e))?;
        copied += 1;
    }

    Ok(copied)
}

fn should_descend(entry: &DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return true;
    }

    !entry
        .file_name()
        .to_str()
        .map(|name| SKIPPED_DIRS.contains(&name))
        .unwrap_or(false)
}
