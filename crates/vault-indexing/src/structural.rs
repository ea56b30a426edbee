use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use graph_store::{GraphStore, StoreError};
use note_core::ParsedNote;
use serde_json::json;
use tracing::{debug, warn};

use crate::{file_modified_ms, now_unix_ms, SyncReport};

const NOTE_UPSERT: &str = "\
UPSERT type::thing('note', $path) SET \
    path = $path, \
    title = $title, \
    content = $content, \
    modified_at = $modified_at, \
    created_at = IF created_at != NONE THEN created_at ELSE $created_at END;";

/// Mirror the whole vault into the structural layer.
///
/// Pass one upserts every note record so that each potential wikilink target
/// exists before any edge is created. Pass two replaces each note's
/// `tagged_with` and `links_to` out-edges from its current tag set and
/// resolved wikilinks. Unresolvable wikilinks are dropped silently; no
/// placeholder notes are ever created. Running the pass twice with no
/// filesystem changes leaves the store unchanged.
pub async fn structural_sync(store: &GraphStore, notes_root: &Path) -> Result<SyncReport> {
    let files = vault::list_notes(notes_root).context("failed to enumerate notes")?;

    let mut report = SyncReport::default();
    let mut parsed_notes = Vec::with_capacity(files.len());
    for file in &files {
        match note_core::parse_note_file(&file.abs_path, notes_root) {
            Ok(parsed) => {
                let modified_at = file_modified_ms(&file.abs_path);
                parsed_notes.push((parsed, modified_at));
            }
            Err(error) => {
                warn!(path = %file.rel_path, %error, "skipping unparseable note");
                report.errored += 1;
            }
        }
    }

    // Files are sorted by path, so the first title occurrence wins
    // deterministically when two notes share a title.
    let mut titles: BTreeMap<String, String> = BTreeMap::new();
    for (parsed, _) in &parsed_notes {
        titles
            .entry(parsed.title.clone())
            .or_insert_with(|| parsed.path.clone());
    }

    let mut upserted = Vec::with_capacity(parsed_notes.len());
    for (parsed, modified_at) in parsed_notes {
        match upsert_note_record(store, &parsed, modified_at).await {
            Ok(()) => upserted.push(parsed),
            Err(error) => {
                if fatal(&error) {
                    return Err(error.into());
                }
                warn!(path = %parsed.path, %error, "failed to upsert note record");
                report.errored += 1;
            }
        }
    }

    for parsed in &upserted {
        let links: Vec<String> = parsed
            .links
            .iter()
            .filter_map(|target| titles.get(target).cloned())
            .collect();
        match replace_structural_edges(store, parsed, &links).await {
            Ok(()) => report.processed += 1,
            Err(error) => {
                if fatal(&error) {
                    return Err(error.into());
                }
                warn!(path = %parsed.path, %error, "failed to rebuild structural edges");
                report.errored += 1;
            }
        }
    }

    debug!(
        processed = report.processed,
        errored = report.errored,
        "structural sync finished"
    );
    Ok(report)
}

/// Structural sync for a single note, used after surface-level writes. Link
/// targets resolve against the store's current title index.
pub async fn structural_sync_note(
    store: &GraphStore,
    notes_root: &Path,
    rel_path: &str,
) -> Result<(), StoreError> {
    let abs_path = notes_root.join(rel_path);
    let parsed = match note_core::parse_note_file(&abs_path, notes_root) {
        Ok(parsed) => parsed,
        Err(error) => {
            return Err(StoreError::Query {
                message: error.to_string(),
            })
        }
    };

    upsert_note_record(store, &parsed, file_modified_ms(&abs_path)).await?;

    let mut links = Vec::new();
    for target in &parsed.links {
        let resolved: Vec<String> = store
            .query_rows(
                "SELECT VALUE path FROM note WHERE title = $title ORDER BY path ASC LIMIT 1;",
                vec![("title".to_string(), json!(target))],
            )
            .await?;
        if let Some(path) = resolved.into_iter().next() {
            links.push(path);
        }
    }

    replace_structural_edges(store, &parsed, &links).await
}

async fn upsert_note_record(
    store: &GraphStore,
    parsed: &ParsedNote,
    modified_at: i64,
) -> Result<(), StoreError> {
    store
        .execute(
            NOTE_UPSERT,
            vec![
                ("path".to_string(), json!(parsed.path)),
                ("title".to_string(), json!(parsed.title)),
                ("content".to_string(), json!(parsed.content)),
                ("modified_at".to_string(), json!(modified_at)),
                ("created_at".to_string(), json!(now_unix_ms())),
            ],
        )
        .await
}

/// Replace a note's structural out-edges in one atomic unit.
async fn replace_structural_edges(
    store: &GraphStore,
    parsed: &ParsedNote,
    link_paths: &[String],
) -> Result<(), StoreError> {
    let mut script = String::from(
        "BEGIN TRANSACTION;\n\
         DELETE tagged_with WHERE in = type::thing('note', $path);\n\
         DELETE links_to WHERE in = type::thing('note', $path);\n",
    );
    let mut binds = vec![("path".to_string(), json!(parsed.path))];

    for (index, tag) in parsed.tags.iter().enumerate() {
        let key = format!("tag{index}");
        let _ = writeln!(
            script,
            "UPSERT type::thing('tag', ${key}) SET name = ${key};\n\
             RELATE (type::thing('note', $path))->tagged_with->(type::thing('tag', ${key}));"
        );
        binds.push((key, json!(tag)));
    }

    let mut seen = Vec::new();
    for target_path in link_paths {
        if seen.contains(target_path) {
            continue;
        }
        seen.push(target_path.clone());

        let key = format!("link{}", seen.len() - 1);
        let _ = writeln!(
            script,
            "RELATE (type::thing('note', $path))->links_to->(type::thing('note', ${key}));"
        );
        binds.push((key, json!(target_path)));
    }

    script.push_str("COMMIT TRANSACTION;");
    store.execute(&script, binds).await
}

fn fatal(error: &StoreError) -> bool {
    matches!(error, StoreError::Unavailable { .. })
}
