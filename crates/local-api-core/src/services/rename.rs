use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::services::trash::prune_note_record;
use crate::{ApiContext, ApiError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameNoteInput {
    pub path: String,
    pub new_title: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameNoteOutput {
    pub path: String,
    pub title: String,
    pub old_title: String,
    pub links_updated: usize,
}

/// Rename a note on disk, rewrite wikilinks across the corpus, then bring
/// the graph back in line: the record under the old path is pruned and a
/// full structural pass re-resolves every link against the new title.
pub async fn rename_note(
    ctx: &ApiContext,
    input: RenameNoteInput,
) -> Result<RenameNoteOutput, ApiError> {
    let renamed = vault::rename_note(ctx.notes_root(), &input.path, &input.new_title)?;

    match ctx.try_store() {
        Some(store) => {
            prune_note_record(ctx, &input.path).await?;
            vault_indexing::structural_sync(store, ctx.notes_root())
                .await
                .map_err(ApiError::from)?;
        }
        None => warn!(path = %input.path, "store degraded, rename is unindexed"),
    }

    Ok(RenameNoteOutput {
        path: renamed.rel_path,
        title: renamed.title,
        old_title: renamed.old_title,
        links_updated: renamed.links_updated,
    })
}
