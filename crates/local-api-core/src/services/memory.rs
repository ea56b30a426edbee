use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{ApiContext, ApiError};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMemoryInput {
    /// Free-form small string: `preference`, `fact`, `goal`, ...
    pub memory_type: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMemory {
    pub mid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    pub mid: String,
    #[serde(rename = "type")]
    pub memory_type: String,
    pub content: String,
    pub created_at: i64,
}

/// Persist a memory with a fresh UUID.
pub async fn store_memory(
    ctx: &ApiContext,
    input: StoreMemoryInput,
) -> Result<StoredMemory, ApiError> {
    let store = ctx.store()?;
    let mid = Uuid::new_v4().to_string();

    store
        .execute(
            "CREATE type::thing('memory', $mid) SET \
                 mid = $mid, type = $memory_type, content = $content, created_at = $created_at;",
            vec![
                ("mid".to_string(), json!(mid)),
                ("memory_type".to_string(), json!(input.memory_type)),
                ("content".to_string(), json!(input.content)),
                ("created_at".to_string(), json!(now_unix_ms())),
            ],
        )
        .await?;

    Ok(StoredMemory { mid })
}

/// All memories, optionally filtered by type, oldest first.
pub async fn list_memories(
    ctx: &ApiContext,
    memory_type: Option<&str>,
) -> Result<Vec<MemoryRecord>, ApiError> {
    let store = ctx.store()?;

    let rows: Vec<MemoryRecord> = match memory_type {
        Some(kind) => {
            store
                .query_rows(
                    "SELECT mid, type, content, created_at FROM memory \
                     WHERE type = $memory_type ORDER BY created_at ASC;",
                    vec![("memory_type".to_string(), json!(kind))],
                )
                .await?
        }
        None => {
            store
                .query_rows(
                    "SELECT mid, type, content, created_at FROM memory ORDER BY created_at ASC;",
                    vec![],
                )
                .await?
        }
    };

    Ok(rows)
}

pub async fn delete_memory(ctx: &ApiContext, mid: &str) -> Result<(), ApiError> {
    let store = ctx.store()?;

    let existing: Vec<String> = store
        .query_rows(
            "SELECT VALUE mid FROM memory WHERE mid = $mid;",
            vec![("mid".to_string(), json!(mid))],
        )
        .await?;
    if existing.is_empty() {
        return Err(ApiError::NotFound {
            what: format!("memory '{mid}'"),
        });
    }

    store
        .execute(
            "DELETE memory WHERE mid = $mid;",
            vec![("mid".to_string(), json!(mid))],
        )
        .await?;
    Ok(())
}

fn now_unix_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|duration| i64::try_from(duration.as_millis()).ok())
        .unwrap_or(0)
}
