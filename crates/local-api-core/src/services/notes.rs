use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use tracing::warn;

use crate::{with_deadline, ApiContext, ApiError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadNoteInput {
    pub title: String,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteInput {
    pub title: String,
    pub content: String,
    pub tags: Option<Vec<String>>,
    pub folder: Option<String>,
    pub metadata: Option<Map<String, JsonValue>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditNoteInput {
    pub title: String,
    pub new_content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteHandle {
    pub path: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummary {
    pub title: String,
    pub path: String,
    pub modified_at: Option<i64>,
}

/// Look up a note by exact title and return its freshly-parsed record.
/// Substring fallback is deliberately not offered here: reading (and even
/// more so editing) the wrong note is worse than a miss.
pub async fn read_note(
    ctx: &ApiContext,
    input: ReadNoteInput,
) -> Result<note_core::ParsedNote, ApiError> {
    let timeout_ms = input.timeout_ms;
    with_deadline(timeout_ms, async move {
        let path = resolve_exact_title(ctx, &input.title).await?;
        Ok(vault::read_note(ctx.notes_root(), &path)?)
    })
    .await
}

/// Create a note on disk and index it structurally before returning, so a
/// follow-up retrieval sees it.
pub async fn create_note(
    ctx: &ApiContext,
    input: CreateNoteInput,
) -> Result<NoteHandle, ApiError> {
    let created = vault::write_note(
        ctx.notes_root(),
        vault::WriteNoteInput {
            title: input.title,
            content: input.content,
            tags: input.tags,
            folder: input.folder,
            metadata: input.metadata,
        },
    )?;

    match ctx.try_store() {
        Some(store) => {
            vault_indexing::structural_sync_note(store, ctx.notes_root(), &created.rel_path)
                .await
                .map_err(ApiError::from)?;
        }
        None => warn!(path = %created.rel_path, "store degraded, created note is unindexed"),
    }

    Ok(NoteHandle {
        path: created.rel_path,
        title: created.title,
    })
}

/// Replace a note's body. The note is found by exact title only.
pub async fn edit_note(ctx: &ApiContext, input: EditNoteInput) -> Result<NoteHandle, ApiError> {
    let path = resolve_exact_title(ctx, &input.title).await?;
    vault::rewrite_note(ctx.notes_root(), &path, &input.new_content)?;

    if let Some(store) = ctx.try_store() {
        vault_indexing::structural_sync_note(store, ctx.notes_root(), &path)
            .await
            .map_err(ApiError::from)?;
    }

    Ok(NoteHandle {
        path,
        title: input.title,
    })
}

/// Every indexed note, ordered by path.
pub async fn list_notes(ctx: &ApiContext) -> Result<Vec<NoteSummary>, ApiError> {
    let store = ctx.store()?;
    let rows: Vec<NoteSummary> = store
        .query_rows(
            "SELECT title, path, modified_at FROM note ORDER BY path ASC;",
            vec![],
        )
        .await?;
    Ok(rows)
}

/// Notes whose `links_to` edges point at the given note.
pub async fn backlinks(ctx: &ApiContext, rel_path: &str) -> Result<Vec<NoteHandle>, ApiError> {
    let store = ctx.store()?;

    #[derive(Debug, Deserialize)]
    struct Row {
        title: String,
        path: String,
    }

    let rows: Vec<Row> = store
        .query_rows(
            "SELECT in.title AS title, record::id(in) AS path FROM links_to \
             WHERE out = type::thing('note', $path) ORDER BY in ASC;",
            vec![("path".to_string(), json!(rel_path))],
        )
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| NoteHandle {
            path: row.path,
            title: row.title,
        })
        .collect())
}

pub(crate) async fn resolve_exact_title(
    ctx: &ApiContext,
    title: &str,
) -> Result<String, ApiError> {
    let store = ctx.store()?;
    let paths: Vec<String> = store
        .query_rows(
            "SELECT VALUE path FROM note WHERE title = $title ORDER BY path ASC LIMIT 1;",
            vec![("title".to_string(), json!(title))],
        )
        .await?;

    paths.into_iter().next().ok_or_else(|| ApiError::NotFound {
        what: format!("note titled '{title}'"),
    })
}
