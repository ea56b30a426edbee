use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{with_deadline, ApiContext, ApiError};

const RESULT_LIMIT: usize = 10;
const SNIPPET_CHARS: usize = 240;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordSearchInput {
    pub query: String,
    pub tag: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordSearchResult {
    pub title: String,
    pub path: String,
    pub snippet: String,
    pub score: f32,
}

/// BM25 search over note content and titles, optionally restricted to notes
/// carrying a tag.
pub async fn keyword_search(
    ctx: &ApiContext,
    input: KeywordSearchInput,
) -> Result<Vec<KeywordSearchResult>, ApiError> {
    let timeout_ms = input.timeout_ms;
    with_deadline(timeout_ms, keyword_search_inner(ctx, input)).await
}

async fn keyword_search_inner(
    ctx: &ApiContext,
    input: KeywordSearchInput,
) -> Result<Vec<KeywordSearchResult>, ApiError> {
    let store = ctx.store()?;
    let query = input.query.trim().to_string();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let tag = input.tag.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let mut surql = String::from(
        "SELECT title, path, content, \
             search::highlight('**', '**', 0) AS snippet, \
             (IF search::score(0) != NONE THEN search::score(0) ELSE 0 END) \
           + (IF search::score(1) != NONE THEN search::score(1) ELSE 0 END) AS score \
         FROM note \
         WHERE (content @0@ $query OR title @1@ $query)",
    );
    let mut binds = vec![("query".to_string(), json!(query))];
    if let Some(tag) = tag {
        surql.push_str(" AND ->tagged_with->tag.name CONTAINS $tag");
        binds.push(("tag".to_string(), json!(tag.to_lowercase())));
    }
    surql.push_str(&format!(" ORDER BY score DESC LIMIT {RESULT_LIMIT};"));

    #[derive(Debug, Deserialize)]
    struct Row {
        title: String,
        path: String,
        content: Option<String>,
        snippet: Option<String>,
        score: f32,
    }

    let rows: Vec<Row> = store.query_rows(&surql, binds).await?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let snippet = row
                .snippet
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| row.content.unwrap_or_default());
            KeywordSearchResult {
                title: row.title,
                path: row.path,
                snippet: truncate_chars(&snippet, SNIPPET_CHARS),
                score: row.score,
            }
        })
        .collect())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSearchInput {
    pub query: String,
    pub tag: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSearchResult {
    pub title: String,
    pub path: String,
    pub chunk_text: String,
    /// Cosine similarity clamped into [0, 1].
    pub score: f32,
}

/// Embed the query and run a cosine k-NN over the chunk index, joining each
/// hit back to its note. The tag filter applies after the k-NN.
pub async fn semantic_search(
    ctx: &ApiContext,
    input: SemanticSearchInput,
) -> Result<Vec<SemanticSearchResult>, ApiError> {
    let timeout_ms = input.timeout_ms;
    with_deadline(timeout_ms, semantic_search_inner(ctx, input)).await
}

async fn semantic_search_inner(
    ctx: &ApiContext,
    input: SemanticSearchInput,
) -> Result<Vec<SemanticSearchResult>, ApiError> {
    let store = ctx.store()?;
    let query = input.query.trim().to_string();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let encoder = ctx.encoder();
    let vector = tokio::task::spawn_blocking(move || encoder.embed(&query))
        .await
        .map_err(|error| ApiError::Internal {
            message: format!("embedding task panicked: {error}"),
        })?
        .map_err(ApiError::from)?;

    let surql = format!(
        "SELECT text AS chunk_text, \
             (->from_document->note.path)[0] AS path, \
             (->from_document->note.title)[0] AS title, \
             ->from_document->note->tagged_with->tag.name AS tags, \
             vector::similarity::cosine(embedding, $vector) AS score \
         FROM chunk \
         WHERE embedding <|{RESULT_LIMIT},40|> $vector \
         ORDER BY score DESC;"
    );

    #[derive(Debug, Deserialize)]
    struct Row {
        chunk_text: String,
        path: Option<String>,
        title: Option<String>,
        // Graph traversal can nest arrays depending on fan-out; flattened
        // below rather than typed strictly.
        #[serde(default)]
        tags: serde_json::Value,
        score: f32,
    }

    let rows: Vec<Row> = store
        .query_rows(&surql, vec![("vector".to_string(), json!(vector))])
        .await?;

    let tag = input
        .tag
        .as_deref()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty());

    let mut results = Vec::new();
    for row in rows {
        let (Some(path), Some(title)) = (row.path, row.title) else {
            continue;
        };
        if let Some(tag) = &tag {
            let mut names = Vec::new();
            collect_strings(&row.tags, &mut names);
            if !names.iter().any(|t| t == tag) {
                continue;
            }
        }

        results.push(SemanticSearchResult {
            title,
            path,
            chunk_text: row.chunk_text,
            score: row.score.clamp(0.0, 1.0),
        });
        if results.len() == RESULT_LIMIT {
            break;
        }
    }

    Ok(results)
}

fn collect_strings(value: &serde_json::Value, out: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => out.push(s.clone()),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}
