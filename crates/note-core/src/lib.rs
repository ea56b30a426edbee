//! Pure markdown parsing for vault notes.
//!
//! Turns a markdown source into a structured record: frontmatter metadata,
//! body without frontmatter, deduplicated wikilink targets, normalized tags,
//! and a hex SHA-256 hash over the body bytes. Parsing never touches the
//! store or the filesystem beyond the initial read.

mod fences;
mod frontmatter;
mod tags;
mod wikilinks;

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use fences::FenceTracker;
pub use frontmatter::split_frontmatter;
pub use tags::normalize_tag;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read note {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed frontmatter in {path}: {message}")]
    Frontmatter { path: String, message: String },
    #[error("note path {path} is not relative to the notes root")]
    OutsideRoot { path: String },
}

/// Structured record extracted from a single markdown note.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedNote {
    /// Notes-root-relative path with forward slashes.
    pub path: String,
    /// File name without the `.md` extension.
    pub title: String,
    /// Body after stripping leading YAML frontmatter.
    pub content: String,
    /// Parsed frontmatter map; empty when the note has none.
    pub metadata: Map<String, JsonValue>,
    /// Wikilink targets, deduplicated preserving first-seen order.
    pub links: Vec<String>,
    /// Lowercased tags from frontmatter and inline `#tag` markers.
    pub tags: Vec<String>,
    /// Hex SHA-256 over the exact body bytes.
    pub content_hash: String,
}

/// Read and parse the note at `abs_path`, resolving its path relative to
/// `notes_root`.
pub fn parse_note_file(abs_path: &Path, notes_root: &Path) -> Result<ParsedNote, ParseError> {
    let rel_path = abs_path
        .strip_prefix(notes_root)
        .map_err(|_| ParseError::OutsideRoot {
            path: abs_path.to_string_lossy().into_owned(),
        })?;
    let rel_path = normalize_rel_path(rel_path);

    let bytes = std::fs::read(abs_path).map_err(|source| ParseError::Read {
        path: rel_path.clone(),
        source,
    })?;
    let source = String::from_utf8_lossy(&bytes);

    parse_note_source(&rel_path, &source)
}

/// Parse note source text. `rel_path` must already be notes-root relative
/// with forward slashes.
pub fn parse_note_source(rel_path: &str, source: &str) -> Result<ParsedNote, ParseError> {
    let title = title_from_rel_path(rel_path);
    let (frontmatter_yaml, body) = frontmatter::split_frontmatter(source);

    let metadata = match frontmatter_yaml {
        Some(yaml) => {
            frontmatter::parse_frontmatter(&yaml).map_err(|message| ParseError::Frontmatter {
                path: rel_path.to_string(),
                message,
            })?
        }
        None => Map::new(),
    };

    let links = wikilinks::extract_wikilinks(body);

    let mut tag_set = tags::frontmatter_tags(&metadata);
    for tag in tags::extract_inline_tags(body) {
        if !tag_set.contains(&tag) {
            tag_set.push(tag);
        }
    }

    Ok(ParsedNote {
        path: rel_path.to_string(),
        title,
        content: body.to_string(),
        metadata,
        links,
        tags: tag_set,
        content_hash: hash_content(body),
    })
}

/// Hex SHA-256 over the given content bytes.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// File name without the `.md` extension.
pub fn title_from_rel_path(rel_path: &str) -> String {
    let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
    file_name
        .strip_suffix(".md")
        .unwrap_or(file_name)
        .to_string()
}

pub fn normalize_rel_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
