//! Filesystem operations for a notes vault.
//!
//! Every operation takes the notes root explicitly and enforces the
//! containment invariant: a resolved path must stay under the root or the
//! call fails with [`VaultError::PathEscape`]. Writes go through a temp file
//! and an atomic rename so readers and the watcher never observe torn
//! content. Deletion is a move into the `.trash/` subdirectory; permanent
//! removal only happens through [`empty_trash`].

mod import;
mod rename;
mod trash;

use std::{
    ffi::OsStr,
    path::{Component, Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

pub use import::import_external;
pub use note_core::ParsedNote;
pub use rename::{rename_note, RenamedNote};
pub use trash::{delete_note, empty_trash, list_trash, restore_note, TrashEntry, TrashedNote};

pub const TRASH_DIR: &str = ".trash";

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("path escapes the notes root: {path}")]
    PathEscape { path: String },
    #[error("invalid note title: {title:?}")]
    InvalidTitle { title: String },
    #[error("note already exists: {path}")]
    AlreadyExists { path: String },
    #[error("note not found: {path}")]
    NotFound { path: String },
    #[error("a note already exists at the restore target: {path}")]
    RestoreConflict { path: String },
    #[error("import source overlaps the notes root: {path}")]
    SourceOverlap { path: String },
    #[error(transparent)]
    Parse(#[from] note_core::ParseError),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl VaultError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string_lossy().into_owned(),
            source,
        }
    }
}

/// Absolute and root-relative location of one markdown note.
#[derive(Debug, Clone)]
pub struct NoteFile {
    pub abs_path: PathBuf,
    pub rel_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedNote {
    pub rel_path: String,
    pub title: String,
}

#[derive(Debug, Clone, Default)]
pub struct WriteNoteInput {
    pub title: String,
    pub content: String,
    pub tags: Option<Vec<String>>,
    pub folder: Option<String>,
    pub metadata: Option<Map<String, JsonValue>>,
}

/// Enumerate every `.md` file under the root, excluding `.trash/` and other
/// dot-directories.
pub fn list_notes(notes_root: &Path) -> Result<Vec<NoteFile>, VaultError> {
    let walker = WalkDir::new(notes_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| should_descend(entry, notes_root));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|error| VaultError::Io {
            path: notes_root.to_string_lossy().into_owned(),
            source: error
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("walk failed")),
        })?;
        if entry.file_type().is_dir() || !is_markdown(entry.path()) {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(notes_root)
            .map(note_core::normalize_rel_path)
            .unwrap_or_default();
        if rel_path.is_empty() {
            continue;
        }

        files.push(NoteFile {
            abs_path: entry.path().to_path_buf(),
            rel_path,
        });
    }

    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

/// Create a new note at `folder/title.md`. Fails when the target exists.
pub fn write_note(notes_root: &Path, input: WriteNoteInput) -> Result<CreatedNote, VaultError> {
    let title = validate_title(&input.title)?;
    let folder = input.folder.as_deref().unwrap_or("").trim();
    let rel_path = if folder.is_empty() {
        format!("{title}.md")
    } else {
        format!("{}/{title}.md", folder.trim_matches('/'))
    };

    let abs_path = resolve_under_root(notes_root, &rel_path)?;
    if abs_path.exists() {
        return Err(VaultError::AlreadyExists {
            path: rel_path.clone(),
        });
    }

    if let Some(parent) = abs_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
    }

    let source = render_note(&input.metadata, &input.tags, &input.content);
    write_atomic(&abs_path, source.as_bytes())?;

    Ok(CreatedNote { rel_path, title })
}

/// Read and parse the note at `rel_path`.
pub fn read_note(notes_root: &Path, rel_path: &str) -> Result<ParsedNote, VaultError> {
    let abs_path = resolve_under_root(notes_root, rel_path)?;
    if !abs_path.is_file() {
        return Err(VaultError::NotFound {
            path: rel_path.to_string(),
        });
    }
    Ok(note_core::parse_note_file(&abs_path, notes_root)?)
}

/// Replace a note's body, preserving its frontmatter and merging tags found
/// in the new body into the frontmatter `tags` list.
pub fn rewrite_note(
    notes_root: &Path,
    rel_path: &str,
    new_content: &str,
) -> Result<(), VaultError> {
    let abs_path = resolve_under_root(notes_root, rel_path)?;
    if !abs_path.is_file() {
        return Err(VaultError::NotFound {
            path: rel_path.to_string(),
        });
    }

    let existing = note_core::parse_note_file(&abs_path, notes_root)?;
    let new_note = note_core::parse_note_source(rel_path, new_content)?;

    let mut tags = existing.tags.clone();
    for tag in &new_note.tags {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }

    let metadata = if existing.metadata.is_empty() && tags.is_empty() {
        None
    } else {
        Some(existing.metadata)
    };
    let tags = if tags.is_empty() { None } else { Some(tags) };

    let source = render_note(&metadata, &tags, new_content);
    write_atomic(&abs_path, source.as_bytes())
}

/// Resolve a root-relative path, rejecting absolute paths and any parent
/// traversal.
pub fn resolve_under_root(notes_root: &Path, rel_path: &str) -> Result<PathBuf, VaultError> {
    let normalized = rel_path.trim().replace('\\', "/");
    if normalized.is_empty() {
        return Err(VaultError::PathEscape {
            path: rel_path.to_string(),
        });
    }

    let candidate = Path::new(&normalized);
    if candidate.is_absolute() {
        return Err(VaultError::PathEscape {
            path: rel_path.to_string(),
        });
    }

    for component in candidate.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(VaultError::PathEscape {
                    path: rel_path.to_string(),
                })
            }
        }
    }

    Ok(notes_root.join(candidate))
}

/// Write bytes to a sibling temp file, then rename into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), VaultError> {
    let file_name = path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("note.md");
    let tmp = path.with_file_name(format!(".{file_name}.tmp-{}", unique_suffix()));

    std::fs::write(&tmp, bytes).map_err(|e| VaultError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        VaultError::io(path, e)
    })
}

pub(crate) fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos())
        .unwrap_or_default()
}

fn validate_title(title: &str) -> Result<String, VaultError> {
    let trimmed = title.trim();
    if trimmed.is_empty() || trimmed.contains('/') || trimmed.contains('\\') {
        return Err(VaultError::InvalidTitle {
            title: title.to_string(),
        });
    }
    Ok(trimmed.to_string())
}

/// Assemble note source from optional frontmatter metadata, tags, and body.
fn render_note(
    metadata: &Option<Map<String, JsonValue>>,
    tags: &Option<Vec<String>>,
    content: &str,
) -> String {
    let mut map = metadata.clone().unwrap_or_default();
    if let Some(tags) = tags {
        let normalized: Vec<JsonValue> = tags
            .iter()
            .filter_map(|tag| note_core::normalize_tag(tag))
            .map(JsonValue::String)
            .collect();
        if !normalized.is_empty() {
            map.insert("tags".to_string(), JsonValue::Array(normalized));
        }
    }

    if map.is_empty() {
        return content.to_string();
    }

    let yaml = serde_yaml::to_string(&map).unwrap_or_else(|_| String::from("{}\n"));
    format!("---\n{yaml}---\n{content}")
}

fn should_descend(entry: &DirEntry, notes_root: &Path) -> bool {
    if entry.path() == notes_root {
        return true;
    }

    if !entry.file_type().is_dir() {
        return true;
    }

    // Dot-directories hold trash, editor state, or store files, never notes.
    !entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

pub(crate) fn is_markdown(path: &Path) -> bool {
    matches!(path.extension().and_then(OsStr::to_str), Some(ext) if ext.eq_ignore_ascii_case("md"))
}
