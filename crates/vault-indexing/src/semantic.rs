use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use embedding::TextEncoder;
use graph_store::{GraphStore, StoreError};
use note_core::ParsedNote;
use serde_json::json;
use tracing::{debug, warn};

use crate::{chunk_text, file_modified_ms, now_unix_ms, SyncReport, CHUNK_CHARS, CHUNK_OVERLAP};

/// Re-embed every note whose content hash no longer matches the stored one.
///
/// Per note, the write protocol is: delete the note's chunks and
/// `from_document` edges, create fresh chunks with embeddings, then record
/// the new content hash — all as one atomic unit, with the embeddings
/// computed up front so the store is never blocked on the model.
pub async fn semantic_sync(
    store: &GraphStore,
    notes_root: &Path,
    encoder: Arc<dyn TextEncoder>,
) -> Result<SyncReport> {
    if encoder.dimension() != store.dimension() {
        return Err(StoreError::DimensionMismatch {
            expected: store.dimension(),
            actual: encoder.dimension(),
        }
        .into());
    }

    let files = vault::list_notes(notes_root).context("failed to enumerate notes")?;
    let mut report = SyncReport::default();

    for file in files {
        let parsed = match note_core::parse_note_file(&file.abs_path, notes_root) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(path = %file.rel_path, %error, "skipping unparseable note");
                report.errored += 1;
                continue;
            }
        };
        let modified_at = file_modified_ms(&file.abs_path);

        match embed_note(store, &parsed, modified_at, encoder.clone()).await {
            Ok(Some(chunks)) => {
                report.processed += 1;
                report.chunks_written += chunks;
            }
            Ok(None) => report.skipped += 1,
            Err(error) => {
                if error.downcast_ref::<StoreError>().is_some_and(fatal) {
                    return Err(error);
                }
                warn!(path = %parsed.path, %error, "failed to embed note");
                report.errored += 1;
            }
        }
    }

    debug!(
        processed = report.processed,
        skipped = report.skipped,
        errored = report.errored,
        chunks = report.chunks_written,
        "semantic sync finished"
    );
    Ok(report)
}

/// Run the chunk write protocol for one parsed note. Returns the number of
/// chunks written, or `None` when the stored hash already matches.
async fn embed_note(
    store: &GraphStore,
    parsed: &ParsedNote,
    modified_at: i64,
    encoder: Arc<dyn TextEncoder>,
) -> Result<Option<usize>> {
    let stored: Vec<Option<String>> = store
        .query_rows(
            "SELECT VALUE content_hash FROM type::thing('note', $path);",
            vec![("path".to_string(), json!(parsed.path))],
        )
        .await?;
    let stored_hash = stored.into_iter().next().flatten();

    if stored_hash.as_deref() == Some(parsed.content_hash.as_str()) {
        return Ok(None);
    }

    let chunks = chunk_text(&parsed.content, CHUNK_CHARS, CHUNK_OVERLAP);

    // Embeddings are model-bound and potentially slow; compute them all
    // before opening the write transaction.
    let embeddings = {
        let texts = chunks.clone();
        let encoder = encoder.clone();
        tokio::task::spawn_blocking(move || encoder.embed_batch(&texts))
            .await
            .context("embedding task panicked")??
    };

    for vector in &embeddings {
        if vector.len() != store.dimension() {
            return Err(StoreError::DimensionMismatch {
                expected: store.dimension(),
                actual: vector.len(),
            }
            .into());
        }
    }

    let mut script = String::from(
        "BEGIN TRANSACTION;\n\
         UPSERT type::thing('note', $path) SET \
             path = $path, \
             title = $title, \
             modified_at = $modified_at, \
             created_at = IF created_at != NONE THEN created_at ELSE $created_at END;\n\
         DELETE chunk WHERE id IN (SELECT VALUE in FROM from_document WHERE out = type::thing('note', $path));\n\
         DELETE from_document WHERE out = type::thing('note', $path);\n",
    );
    let mut binds = vec![
        ("path".to_string(), json!(parsed.path)),
        ("title".to_string(), json!(parsed.title)),
        ("modified_at".to_string(), json!(modified_at)),
        ("created_at".to_string(), json!(now_unix_ms())),
        ("hash".to_string(), json!(parsed.content_hash)),
    ];

    for (index, (text, vector)) in chunks.iter().zip(&embeddings).enumerate() {
        let _ = writeln!(
            script,
            "CREATE type::thing('chunk', $cid{index}) SET \
                 text = $text{index}, idx = {index}, embedding = $vec{index};\n\
             RELATE (type::thing('chunk', $cid{index}))->from_document->(type::thing('note', $path));"
        );
        binds.push((
            format!("cid{index}"),
            json!(format!("{}#{index}", parsed.path)),
        ));
        binds.push((format!("text{index}"), json!(text)));
        binds.push((format!("vec{index}"), json!(vector)));
    }

    script.push_str(
        "UPDATE type::thing('note', $path) SET content_hash = $hash;\n\
         COMMIT TRANSACTION;",
    );
    store.execute(&script, binds).await?;

    Ok(Some(chunks.len()))
}

fn fatal(error: &StoreError) -> bool {
    matches!(
        error,
        StoreError::Unavailable { .. } | StoreError::DimensionMismatch { .. }
    )
}
