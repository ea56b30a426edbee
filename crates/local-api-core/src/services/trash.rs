use serde_json::json;
use tracing::warn;

use crate::{ApiContext, ApiError};

pub use vault::{TrashEntry, TrashedNote};

/// Move a note to `.trash/` and remove its record, edges, and chunks from
/// the store. Restoring the file and re-syncing recreates the record.
pub async fn delete_note(ctx: &ApiContext, rel_path: &str) -> Result<TrashedNote, ApiError> {
    let trashed = vault::delete_note(ctx.notes_root(), rel_path)?;

    match ctx.try_store() {
        Some(_) => prune_note_record(ctx, rel_path).await?,
        None => warn!(path = rel_path, "store degraded, stale note record remains"),
    }

    Ok(trashed)
}

pub fn list_trash(ctx: &ApiContext) -> Result<Vec<TrashEntry>, ApiError> {
    Ok(vault::list_trash(ctx.notes_root())?)
}

/// Move a trashed note back and re-index it.
pub async fn restore_note(ctx: &ApiContext, trash_rel_path: &str) -> Result<String, ApiError> {
    let restored = vault::restore_note(ctx.notes_root(), trash_rel_path)?;

    if let Some(store) = ctx.try_store() {
        vault_indexing::structural_sync_note(store, ctx.notes_root(), &restored)
            .await
            .map_err(ApiError::from)?;
    }

    Ok(restored)
}

/// Permanently delete trashed files, then prune any note records whose file
/// no longer exists anywhere under the root.
pub async fn empty_trash(ctx: &ApiContext) -> Result<usize, ApiError> {
    let removed = vault::empty_trash(ctx.notes_root())?;

    if ctx.try_store().is_some() {
        let paths: Vec<String> = ctx
            .store()?
            .query_rows("SELECT VALUE path FROM note;", vec![])
            .await?;
        for path in paths {
            if !ctx.notes_root().join(&path).is_file() {
                prune_note_record(ctx, &path).await?;
            }
        }
    }

    Ok(removed)
}

/// Delete one note record along with its structural edges, chunks, and
/// document edges, as a single unit.
pub(crate) async fn prune_note_record(ctx: &ApiContext, rel_path: &str) -> Result<(), ApiError> {
    let store = ctx.store()?;
    store
        .execute(
            "BEGIN TRANSACTION;\n\
             DELETE tagged_with WHERE in = type::thing('note', $path);\n\
             DELETE links_to WHERE in = type::thing('note', $path) OR out = type::thing('note', $path);\n\
             DELETE chunk WHERE id IN (SELECT VALUE in FROM from_document WHERE out = type::thing('note', $path));\n\
             DELETE from_document WHERE out = type::thing('note', $path);\n\
             DELETE type::thing('note', $path);\n\
             COMMIT TRANSACTION;",
            vec![("path".to_string(), json!(rel_path))],
        )
        .await?;
    Ok(())
}
