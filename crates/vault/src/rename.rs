use std::path::Path;

use note_core::FenceTracker;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::{
    list_notes, resolve_under_root, write_atomic, VaultError,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenamedNote {
    pub rel_path: String,
    pub title: String,
    pub old_title: String,
    /// Wikilink occurrences rewritten across the rest of the corpus.
    pub links_updated: usize,
}

/// Rename a note on disk, then rewrite `[[old]]` and `[[old|alias]]`
/// wikilinks across every other note. Occurrences inside fenced code blocks
/// are left untouched.
pub fn rename_note(
    notes_root: &Path,
    rel_path: &str,
    new_title: &str,
) -> Result<RenamedNote, VaultError> {
    let new_title = new_title.trim();
    if new_title.is_empty() || new_title.contains('/') || new_title.contains('\\') {
        return Err(VaultError::InvalidTitle {
            title: new_title.to_string(),
        });
    }

    let abs_path = resolve_under_root(notes_root, rel_path)?;
    if !abs_path.is_file() {
        return Err(VaultError::NotFound {
            path: rel_path.to_string(),
        });
    }

    let old_title = note_core::title_from_rel_path(rel_path);
    let new_rel_path = match rel_path.rsplit_once('/') {
        Some((folder, _)) => format!("{folder}/{new_title}.md"),
        None => format!("{new_title}.md"),
    };
    let new_abs_path = resolve_under_root(notes_root, &new_rel_path)?;
    if new_abs_path.exists() {
        return Err(VaultError::AlreadyExists {
            path: new_rel_path.clone(),
        });
    }

    std::fs::rename(&abs_path, &new_abs_path).map_err(|e| VaultError::io(&abs_path, e))?;

    let mut links_updated = 0usize;
    let pattern = wikilink_pattern(&old_title);
    for note in list_notes(notes_root)? {
        if note.rel_path == new_rel_path {
            continue;
        }

        match rewrite_links_in_file(&note.abs_path, &pattern, new_title) {
            Ok(count) => links_updated += count,
            Err(error) => {
                // One unreadable note must not abort the rename.
                warn!(path = %note.rel_path, %error, "skipping wikilink rewrite");
            }
        }
    }

    Ok(RenamedNote {
        rel_path: new_rel_path,
        title: new_title.to_string(),
        old_title,
        links_updated,
    })
}

fn wikilink_pattern(old_title: &str) -> Regex {
    let escaped = regex::escape(old_title);
    Regex::new(&format!(r"\[\[\s*{escaped}\s*(\|[^\]]*)?\]\]")).expect("valid rename pattern")
}

fn rewrite_links_in_file(
    abs_path: &Path,
    pattern: &Regex,
    new_title: &str,
) -> Result<usize, VaultError> {
    let bytes = std::fs::read(abs_path).map_err(|e| VaultError::io(abs_path, e))?;
    let source = String::from_utf8_lossy(&bytes).into_owned();

    let mut tracker = FenceTracker::new();
    let mut rewritten = String::with_capacity(source.len());
    let mut count = 0usize;

    for line in source.split_inclusive('\n') {
        let is_prose = tracker.observe(line.trim_end_matches('\n'));
        if is_prose && pattern.is_match(line) {
            count += pattern.find_iter(line).count();
            // `$` in a replacement string is a capture reference; titles
            // containing one must be escaped as `$$`.
            let replacement = format!("[[{}${{1}}]]", new_title.replace('$', "$$"));
            let replaced = pattern.replace_all(line, replacement.as_str());
            rewritten.push_str(&replaced);
        } else {
            rewritten.push_str(line);
        }
    }

    if count > 0 {
        write_atomic(abs_path, rewritten.as_bytes())?;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::rename_note;
    use crate::{test_support::VaultHarness, VaultError};

    #[test]
    fn rename_rewrites_links_preserving_alias_form() {
        let harness = VaultHarness::new("rename-links");
        harness.write("Old Name.md", "# body");
        harness.write(
            "Refers.md",
            "plain [[Old Name]] aliased [[Old Name|shown]] other [[Unrelated]]\n",
        );

        let renamed =
            rename_note(harness.root(), "Old Name.md", "New Name").expect("rename should succeed");

        assert_eq!(renamed.rel_path, "New Name.md");
        assert_eq!(renamed.old_title, "Old Name");
        assert_eq!(renamed.links_updated, 2);
        assert_eq!(
            harness.read("Refers.md"),
            "plain [[New Name]] aliased [[New Name|shown]] other [[Unrelated]]\n"
        );
    }

    #[test]
    fn rename_skips_links_inside_code_fences() {
        let harness = VaultHarness::new("rename-fences");
        harness.write("Target.md", "# t");
        harness.write(
            "Doc.md",
            "before [[Target]]\n```\nliteral [[Target]]\n```\nafter [[Target]]\n",
        );

        let renamed =
            rename_note(harness.root(), "Target.md", "Moved").expect("rename should succeed");

        assert_eq!(renamed.links_updated, 2);
        assert_eq!(
            harness.read("Doc.md"),
            "before [[Moved]]\n```\nliteral [[Target]]\n```\nafter [[Moved]]\n"
        );
    }

    #[test]
    fn rename_roundtrip_restores_original_contents() {
        let harness = VaultHarness::new("rename-roundtrip");
        harness.write("sub/A.md", "# a");
        harness.write("B.md", "see [[A]] and [[A|alias]]\n");

        rename_note(harness.root(), "sub/A.md", "A2").expect("first rename should succeed");
        rename_note(harness.root(), "sub/A2.md", "A").expect("second rename should succeed");

        assert!(harness.exists("sub/A.md"));
        assert_eq!(harness.read("B.md"), "see [[A]] and [[A|alias]]\n");
    }

    #[test]
    fn rename_rejects_existing_target_and_separators() {
        let harness = VaultHarness::new("rename-reject");
        harness.write("A.md", "a");
        harness.write("B.md", "b");

        assert!(matches!(
            rename_note(harness.root(), "A.md", "B"),
            Err(VaultError::AlreadyExists { .. })
        ));
        assert!(matches!(
            rename_note(harness.root(), "A.md", "x/y"),
            Err(VaultError::InvalidTitle { .. })
        ));
    }

    #[test]
    fn regex_metacharacters_in_titles_are_escaped() {
        let harness = VaultHarness::new("rename-escape");
        harness.write("What (v1).md", "# v1");
        harness.write("Ref.md", "link [[What (v1)]] and not [[What Xv1Y]]\n");

        let renamed =
            rename_note(harness.root(), "What (v1).md", "What (v2)").expect("rename should work");

        assert_eq!(renamed.links_updated, 1);
        assert_eq!(
            harness.read("Ref.md"),
            "link [[What (v2)]] and not [[What Xv1Y]]\n"
        );
    }
}
