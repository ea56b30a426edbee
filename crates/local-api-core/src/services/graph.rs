use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::{with_deadline, ApiContext, ApiError};

const QUERY_ROW_LIMIT: usize = 20;
const RELATED_LIMIT: usize = 50;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryGraphInput {
    pub raw: String,
    pub timeout_ms: Option<u64>,
}

/// Raw-query escape hatch: the statement goes to the store untouched and up
/// to 20 rows of the final statement come back. Errors are returned
/// verbatim; safety comes from the store being local and trivially
/// rebuildable, not from sanitizing.
pub async fn query_graph(
    ctx: &ApiContext,
    input: QueryGraphInput,
) -> Result<Vec<JsonValue>, ApiError> {
    let timeout_ms = input.timeout_ms;
    with_deadline(timeout_ms, async move {
        let mut rows = ctx.store()?.query(&input.raw, vec![]).await?;
        rows.truncate(QUERY_ROW_LIMIT);
        Ok(rows)
    })
    .await
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindRelatedInput {
    pub title: String,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RelatedEntry {
    /// `out` for edges leaving the note, `in` for edges pointing at it.
    pub direction: String,
    pub relation: String,
    pub other_label: String,
    pub other_key: String,
}

/// Depth-1 neighborhood of a note across every relation table known to the
/// store at call time, agent-created relations included. The note is found
/// by exact title first, then by case-insensitive substring, ties broken by
/// ascending path.
pub async fn find_related(
    ctx: &ApiContext,
    input: FindRelatedInput,
) -> Result<Vec<RelatedEntry>, ApiError> {
    let timeout_ms = input.timeout_ms;
    with_deadline(timeout_ms, find_related_inner(ctx, input)).await
}

async fn find_related_inner(
    ctx: &ApiContext,
    input: FindRelatedInput,
) -> Result<Vec<RelatedEntry>, ApiError> {
    let store = ctx.store()?;
    let path = resolve_title_with_fallback(ctx, &input.title).await?;

    #[derive(Debug, Deserialize)]
    struct NeighborRow {
        label: String,
        key: JsonValue,
    }

    let mut entries = Vec::new();
    for relation in store.relation_tables().await? {
        let out_rows: Vec<NeighborRow> = store
            .query_rows(
                "SELECT record::tb(out) AS label, record::id(out) AS key \
                 FROM type::table($table) \
                 WHERE in = type::thing('note', $path) ORDER BY out ASC;",
                vec![
                    ("table".to_string(), json!(relation)),
                    ("path".to_string(), json!(path)),
                ],
            )
            .await?;
        for row in out_rows {
            entries.push(RelatedEntry {
                direction: "out".to_string(),
                relation: relation.clone(),
                other_label: row.label,
                other_key: key_to_string(row.key),
            });
            if entries.len() == RELATED_LIMIT {
                return Ok(entries);
            }
        }

        let in_rows: Vec<NeighborRow> = store
            .query_rows(
                "SELECT record::tb(in) AS label, record::id(in) AS key \
                 FROM type::table($table) \
                 WHERE out = type::thing('note', $path) ORDER BY in ASC;",
                vec![
                    ("table".to_string(), json!(relation)),
                    ("path".to_string(), json!(path)),
                ],
            )
            .await?;
        for row in in_rows {
            entries.push(RelatedEntry {
                direction: "in".to_string(),
                relation: relation.clone(),
                other_label: row.label,
                other_key: key_to_string(row.key),
            });
            if entries.len() == RELATED_LIMIT {
                return Ok(entries);
            }
        }
    }

    Ok(entries)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionInput {
    pub source_type: String,
    pub source_name: String,
    pub relation: String,
    pub target_type: String,
    pub target_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectionOutput {
    pub edge_id: Option<String>,
    pub duplicate: bool,
}

/// The only guarded entity/edge creation path. Identifiers are sanitized,
/// reserved table names rejected, `note` and `memory` endpoints resolved
/// against existing records, custom entity tables defined idempotently, and
/// an identical existing edge short-circuits as a duplicate.
pub async fn create_connection(
    ctx: &ApiContext,
    input: CreateConnectionInput,
) -> Result<CreateConnectionOutput, ApiError> {
    let store = ctx.store()?;

    let source_type = sanitize_identifier(&input.source_type)?;
    let relation = sanitize_identifier(&input.relation)?;
    let target_type = sanitize_identifier(&input.target_type)?;

    if graph_store::is_reserved(&relation) {
        return Err(ApiError::ReservedName { name: relation });
    }

    let (source_table, source_key) = resolve_endpoint(ctx, &source_type, &input.source_name).await?;
    let (target_table, target_key) = resolve_endpoint(ctx, &target_type, &input.target_name).await?;

    store
        .execute(&format!("DEFINE TABLE IF NOT EXISTS {relation} TYPE RELATION;"), vec![])
        .await?;

    let endpoint_binds = vec![
        ("ft".to_string(), json!(source_table)),
        ("fk".to_string(), json!(source_key)),
        ("tt".to_string(), json!(target_table)),
        ("tk".to_string(), json!(target_key)),
    ];

    let existing: Vec<String> = store
        .query_rows(
            &format!(
                "SELECT VALUE type::string(id) FROM {relation} \
                 WHERE in = type::thing($ft, $fk) AND out = type::thing($tt, $tk);"
            ),
            endpoint_binds.clone(),
        )
        .await?;
    if !existing.is_empty() {
        return Ok(CreateConnectionOutput {
            edge_id: None,
            duplicate: true,
        });
    }

    store
        .execute(
            &format!(
                "RELATE (type::thing($ft, $fk))->{relation}->(type::thing($tt, $tk));"
            ),
            endpoint_binds.clone(),
        )
        .await?;

    let created: Vec<String> = store
        .query_rows(
            &format!(
                "SELECT VALUE type::string(id) FROM {relation} \
                 WHERE in = type::thing($ft, $fk) AND out = type::thing($tt, $tk);"
            ),
            endpoint_binds,
        )
        .await?;

    Ok(CreateConnectionOutput {
        edge_id: created.into_iter().next(),
        duplicate: false,
    })
}

/// Lowercase, trim, and verify `^[a-z][a-z0-9_]*$`.
fn sanitize_identifier(raw: &str) -> Result<String, ApiError> {
    let identifier = raw.trim().to_lowercase();
    let mut chars = identifier.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(identifier)
    } else {
        Err(ApiError::InvalidIdentifier {
            identifier: raw.to_string(),
        })
    }
}

/// Resolve one endpoint to `(table, record key)`. `note` and `memory` must
/// already exist; any other non-reserved type is defined and upserted.
async fn resolve_endpoint(
    ctx: &ApiContext,
    entity_type: &str,
    name: &str,
) -> Result<(String, String), ApiError> {
    let store = ctx.store()?;

    match entity_type {
        "note" => {
            let paths: Vec<String> = store
                .query_rows(
                    "SELECT VALUE path FROM note WHERE title = $title ORDER BY path ASC LIMIT 1;",
                    vec![("title".to_string(), json!(name))],
                )
                .await?;
            let path = paths.into_iter().next().ok_or_else(|| ApiError::NotFound {
                what: format!("note titled '{name}'"),
            })?;
            Ok(("note".to_string(), path))
        }
        "memory" => {
            let mids: Vec<String> = store
                .query_rows(
                    "SELECT VALUE mid FROM memory WHERE content = $content LIMIT 1;",
                    vec![("content".to_string(), json!(name))],
                )
                .await?;
            let mid = mids.into_iter().next().ok_or_else(|| ApiError::NotFound {
                what: format!("memory with content '{name}'"),
            })?;
            Ok(("memory".to_string(), mid))
        }
        other if graph_store::is_reserved(other) => Err(ApiError::ReservedName {
            name: other.to_string(),
        }),
        other => {
            // "Overwrite" semantics for the schemaless entity table keep the
            // definition idempotent even if a prior run defined it.
            store
                .execute(&format!("DEFINE TABLE OVERWRITE {other} SCHEMALESS;"), vec![])
                .await?;
            store
                .execute(
                    "UPSERT type::thing($table, $name) SET name = $name;",
                    vec![
                        ("table".to_string(), json!(other)),
                        ("name".to_string(), json!(name)),
                    ],
                )
                .await?;
            Ok((other.to_string(), name.to_string()))
        }
    }
}

async fn resolve_title_with_fallback(ctx: &ApiContext, title: &str) -> Result<String, ApiError> {
    let store = ctx.store()?;

    let exact: Vec<String> = store
        .query_rows(
            "SELECT VALUE path FROM note WHERE title = $title ORDER BY path ASC LIMIT 1;",
            vec![("title".to_string(), json!(title))],
        )
        .await?;
    if let Some(path) = exact.into_iter().next() {
        return Ok(path);
    }

    let fuzzy: Vec<String> = store
        .query_rows(
            "SELECT VALUE path FROM note \
             WHERE string::contains(string::lowercase(title), $needle) \
             ORDER BY path ASC LIMIT 1;",
            vec![("needle".to_string(), json!(title.to_lowercase()))],
        )
        .await?;
    fuzzy.into_iter().next().ok_or_else(|| ApiError::NotFound {
        what: format!("note titled '{title}'"),
    })
}

fn key_to_string(key: JsonValue) -> String {
    match key {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}
