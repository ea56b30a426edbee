use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use crate::{
    is_markdown, resolve_under_root, unique_suffix, VaultError, TRASH_DIR,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashedNote {
    /// Location of the note inside `.trash/`, notes-root relative.
    pub trash_rel_path: String,
    /// Where the note lived before deletion.
    pub original_rel_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashEntry {
    pub trash_rel_path: String,
    pub original_rel_path: String,
}

/// Move a note into `.trash/`, mirroring its folder structure. Collisions in
/// trash get a timestamp suffix instead of overwriting.
pub fn delete_note(notes_root: &Path, rel_path: &str) -> Result<TrashedNote, VaultError> {
    if is_in_trash(rel_path) {
        return Err(VaultError::PathEscape {
            path: rel_path.to_string(),
        });
    }

    let abs_path = resolve_under_root(notes_root, rel_path)?;
    if !abs_path.is_file() {
        return Err(VaultError::NotFound {
            path: rel_path.to_string(),
        });
    }

    let mut trash_rel = format!("{TRASH_DIR}/{rel_path}");
    let mut target = notes_root.join(&trash_rel);
    while target.exists() {
        trash_rel = format!("{TRASH_DIR}/{}", suffixed(rel_path, unique_suffix()));
        target = notes_root.join(&trash_rel);
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
    }
    std::fs::rename(&abs_path, &target).map_err(|e| VaultError::io(&abs_path, e))?;

    Ok(TrashedNote {
        trash_rel_path: trash_rel,
        original_rel_path: rel_path.to_string(),
    })
}

/// Enumerate notes currently in `.trash/`.
pub fn list_trash(notes_root: &Path) -> Result<Vec<TrashEntry>, VaultError> {
    let trash_root = notes_root.join(TRASH_DIR);
    if !trash_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in WalkDir::new(&trash_root).follow_links(false) {
        let entry = entry.map_err(|error| VaultError::Io {
            path: trash_root.to_string_lossy().into_owned(),
            source: error
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walk failed")),
        })?;
        if entry.file_type().is_dir() || !is_markdown(entry.path()) {
            continue;
        }

        let Ok(inside) = entry.path().strip_prefix(&trash_root) else {
            continue;
        };
        let original_rel_path = note_core::normalize_rel_path(inside);
        entries.push(TrashEntry {
            trash_rel_path: format!("{TRASH_DIR}/{original_rel_path}"),
            original_rel_path,
        });
    }

    entries.sort_by(|a, b| a.trash_rel_path.cmp(&b.trash_rel_path));
    Ok(entries)
}

/// Move a trashed note back to its original location. Fails rather than
/// overwriting an existing note at the target.
pub fn restore_note(notes_root: &Path, trash_rel_path: &str) -> Result<String, VaultError> {
    let inside = trash_rel_path
        .strip_prefix(&format!("{TRASH_DIR}/"))
        .ok_or_else(|| VaultError::NotFound {
            path: trash_rel_path.to_string(),
        })?;

    let source = resolve_under_root(notes_root, trash_rel_path)?;
    if !source.is_file() {
        return Err(VaultError::NotFound {
            path: trash_rel_path.to_string(),
        });
    }

    let target = resolve_under_root(notes_root, inside)?;
    if target.exists() {
        return Err(VaultError::RestoreConflict {
            path: inside.to_string(),
        });
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
    }
    std::fs::rename(&source, &target).map_err(|e| VaultError::io(&source, e))?;

    Ok(inside.to_string())
}

/// Permanently delete everything under `.trash/`. Returns the number of
/// removed note files.
pub fn empty_trash(notes_root: &Path) -> Result<usize, VaultError> {
    let trash_root = notes_root.join(TRASH_DIR);
    if !trash_root.is_dir() {
        return Ok(0);
    }

    let removed = list_trash(notes_root)?.len();
    std::fs::remove_dir_all(&trash_root).map_err(|e| VaultError::io(&trash_root, e))?;
    Ok(removed)
}

fn is_in_trash(rel_path: &str) -> bool {
    rel_path == TRASH_DIR || rel_path.starts_with(&format!("{TRASH_DIR}/"))
}

fn suffixed(rel_path: &str, stamp: u128) -> String {
    match rel_path.strip_suffix(".md") {
        Some(stem) => format!("{stem}-{stamp}.md"),
        None => format!("{rel_path}-{stamp}"),
    }
}

#[cfg(test)]
mod tests {
    use super::{delete_note, empty_trash, list_trash, restore_note};
    use crate::{test_support::VaultHarness, VaultError};

    #[test]
    fn delete_then_restore_roundtrips_to_original_location() {
        let harness = VaultHarness::new("trash-roundtrip");
        harness.write("sub/Note.md", "# body");

        let trashed = delete_note(harness.root(), "sub/Note.md").expect("delete should succeed");
        assert_eq!(trashed.trash_rel_path, ".trash/sub/Note.md");
        assert!(!harness.exists("sub/Note.md"));
        assert!(harness.exists(".trash/sub/Note.md"));

        let restored =
            restore_note(harness.root(), &trashed.trash_rel_path).expect("restore should succeed");
        assert_eq!(restored, "sub/Note.md");
        assert_eq!(harness.read("sub/Note.md"), "# body");
        assert!(!harness.exists(".trash/sub/Note.md"));
    }

    #[test]
    fn trash_collision_gets_timestamp_suffix() {
        let harness = VaultHarness::new("trash-collision");
        harness.write("Dup.md", "first");
        delete_note(harness.root(), "Dup.md").expect("first delete should succeed");

        harness.write("Dup.md", "second");
        let second = delete_note(harness.root(), "Dup.md").expect("second delete should succeed");

        assert_ne!(second.trash_rel_path, ".trash/Dup.md");
        assert!(second.trash_rel_path.starts_with(".trash/Dup-"));
        assert_eq!(list_trash(harness.root()).expect("list should succeed").len(), 2);
    }

    #[test]
    fn restore_refuses_to_overwrite_existing_note() {
        let harness = VaultHarness::new("trash-restore-conflict");
        harness.write("Busy.md", "old");
        let trashed = delete_note(harness.root(), "Busy.md").expect("delete should succeed");
        harness.write("Busy.md", "new occupant");

        let result = restore_note(harness.root(), &trashed.trash_rel_path);
        assert!(matches!(result, Err(VaultError::RestoreConflict { .. })));
        assert_eq!(harness.read("Busy.md"), "new occupant");
    }

    #[test]
    fn empty_trash_removes_everything() {
        let harness = VaultHarness::new("trash-empty");
        harness.write("A.md", "a");
        harness.write("deep/B.md", "b");
        delete_note(harness.root(), "A.md").expect("delete should succeed");
        delete_note(harness.root(), "deep/B.md").expect("delete should succeed");

        let removed = empty_trash(harness.root()).expect("empty should succeed");
        assert_eq!(removed, 2);
        assert!(list_trash(harness.root()).expect("list should succeed").is_empty());
        assert!(!harness.exists(".trash"));
    }

    #[test]
    fn deleting_inside_trash_is_rejected() {
        let harness = VaultHarness::new("trash-no-nesting");
        harness.write(".trash/Gone.md", "x");
        let result = delete_note(harness.root(), ".trash/Gone.md");
        assert!(matches!(result, Err(VaultError::PathEscape { .. })));
    }
}
