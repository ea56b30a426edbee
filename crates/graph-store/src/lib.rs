//! Embedded graph-plus-vector store.
//!
//! Wraps an embedded SurrealDB instance and owns all persisted state: note
//! and tag records, chunk embeddings, agent memories, and both built-in and
//! agent-created relation tables. Exposes a single parameterized query
//! primitive plus schema discovery, so callers never touch the engine
//! directly. Bootstrap is idempotent; a change of embedding model or
//! dimension between runs is detected here and handled as a model rotation.

mod schema;

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use surrealdb::engine::local::{Db, Mem, SurrealKv};
use surrealdb::Surreal;
use thiserror::Error;
use tracing::{info, warn};

pub use schema::{is_reserved, RESERVED_TABLES};

const NAMESPACE: &str = "brainshape";
const DATABASE: &str = "main";
const META_QUERY: &str = "SELECT model, dimension FROM store_meta:config;";
const META_UPSERT: &str =
    "UPSERT store_meta:config SET model = $model, dimension = $dimension;";

#[derive(Debug, Error)]
pub enum StoreError {
    /// Bootstrap failed or the connection is gone; the process runs degraded.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
    /// A query failed; the engine's message is passed through verbatim.
    #[error("{message}")]
    Query { message: String },
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl StoreError {
    fn query(error: surrealdb::Error) -> Self {
        Self::Query {
            message: error.to_string(),
        }
    }

    fn unavailable(error: surrealdb::Error) -> Self {
        Self::Unavailable {
            message: error.to_string(),
        }
    }
}

#[derive(Debug)]
struct StoreMeta {
    model: String,
    dimension: usize,
}

#[derive(Debug, Default, Deserialize)]
struct DatabaseInfo {
    #[serde(default)]
    tables: BTreeMap<String, String>,
}

/// Handle to the embedded store. Cheap to clone; all methods take `&self`
/// and may run concurrently, with the engine serializing writes.
#[derive(Debug, Clone)]
pub struct GraphStore {
    db: Surreal<Db>,
    model: String,
    dimension: usize,
}

impl GraphStore {
    /// Open (or create) the persistent store under `store_root` and run the
    /// idempotent bootstrap, including model-rotation detection.
    pub async fn open(
        store_root: &Path,
        model: &str,
        dimension: usize,
    ) -> Result<Self, StoreError> {
        let path = store_root.to_string_lossy().into_owned();
        let db = Surreal::new::<SurrealKv>(path.as_str())
            .await
            .map_err(StoreError::unavailable)?;
        Self::initialize(db, model, dimension).await
    }

    /// In-memory store for tests.
    pub async fn open_in_memory(model: &str, dimension: usize) -> Result<Self, StoreError> {
        let db = Surreal::new::<Mem>(())
            .await
            .map_err(StoreError::unavailable)?;
        Self::initialize(db, model, dimension).await
    }

    async fn initialize(db: Surreal<Db>, model: &str, dimension: usize) -> Result<Self, StoreError> {
        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(StoreError::unavailable)?;

        let store = Self {
            db,
            model: model.to_string(),
            dimension,
        };
        store.bootstrap().await?;
        Ok(store)
    }

    /// The embedding dimension the vector index is currently defined at.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn bootstrap(&self) -> Result<(), StoreError> {
        self.db
            .query(schema::BOOTSTRAP_DDL)
            .await
            .map_err(StoreError::unavailable)?
            .check()
            .map_err(StoreError::unavailable)?;

        let stored = self.read_meta().await?;
        match stored {
            Some(meta) if meta.model == self.model && meta.dimension == self.dimension => {
                self.run_script(&schema::vector_index_ddl(self.dimension))
                    .await?;
            }
            Some(meta) => {
                warn!(
                    old_model = %meta.model,
                    old_dimension = meta.dimension,
                    new_model = %self.model,
                    new_dimension = self.dimension,
                    "embedding model changed, rotating vector index"
                );
                self.rotate_model().await?;
            }
            None => {
                self.run_script(&schema::vector_index_ddl(self.dimension))
                    .await?;
                self.write_meta().await?;
            }
        }

        info!(dimension = self.dimension, "store bootstrap complete");
        Ok(())
    }

    /// Drop and recreate the vector index at the configured dimension, wipe
    /// all chunks, and clear every note's content hash. Runs during
    /// bootstrap, before any other task can use the store.
    async fn rotate_model(&self) -> Result<(), StoreError> {
        self.run_script(&schema::rotation_script(self.dimension))
            .await?;
        self.write_meta().await
    }

    async fn read_meta(&self) -> Result<Option<StoreMeta>, StoreError> {
        let mut response = self
            .db
            .query(META_QUERY)
            .await
            .map_err(StoreError::unavailable)?
            .check()
            .map_err(StoreError::unavailable)?;
        let rows: Vec<JsonValue> = response.take(0).map_err(StoreError::unavailable)?;

        // A fresh store has no meta record; a partially-written one is
        // treated the same and rewritten.
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let model = row.get("model").and_then(|v| v.as_str());
        let dimension = row.get("dimension").and_then(|v| v.as_u64());
        Ok(match (model, dimension) {
            (Some(model), Some(dimension)) => Some(StoreMeta {
                model: model.to_string(),
                dimension: dimension as usize,
            }),
            _ => None,
        })
    }

    async fn write_meta(&self) -> Result<(), StoreError> {
        self.db
            .query(META_UPSERT)
            .bind(("model", self.model.clone()))
            .bind(("dimension", self.dimension))
            .await
            .map_err(StoreError::unavailable)?
            .check()
            .map_err(StoreError::unavailable)?;
        Ok(())
    }

    async fn run_script(&self, script: &str) -> Result<(), StoreError> {
        self.db
            .query(script)
            .await
            .map_err(StoreError::unavailable)?
            .check()
            .map_err(StoreError::unavailable)?;
        Ok(())
    }

    /// Run a SurrealQL query with named bindings, returning the final
    /// statement's rows as JSON values.
    pub async fn query(
        &self,
        surql: &str,
        binds: Vec<(String, JsonValue)>,
    ) -> Result<Vec<JsonValue>, StoreError> {
        self.query_rows(surql, binds).await
    }

    /// Typed variant of [`GraphStore::query`]: deserialize the final
    /// statement's rows into `T`.
    pub async fn query_rows<T: DeserializeOwned>(
        &self,
        surql: &str,
        binds: Vec<(String, JsonValue)>,
    ) -> Result<Vec<T>, StoreError> {
        let mut request = self.db.query(surql);
        for (key, value) in binds {
            request = request.bind((key, value));
        }

        let mut response = request
            .await
            .map_err(StoreError::query)?
            .check()
            .map_err(StoreError::query)?;
        let last = response.num_statements().saturating_sub(1);
        response.take(last).map_err(StoreError::query)
    }

    /// Run a query for its side effects; results are discarded but errors
    /// from any statement are surfaced.
    pub async fn execute(
        &self,
        surql: &str,
        binds: Vec<(String, JsonValue)>,
    ) -> Result<(), StoreError> {
        let mut request = self.db.query(surql);
        for (key, value) in binds {
            request = request.bind((key, value));
        }

        request
            .await
            .map_err(StoreError::query)?
            .check()
            .map_err(StoreError::query)?;
        Ok(())
    }

    /// All relation tables except `from_document`, so callers can traverse
    /// built-in and agent-created edges alike.
    pub async fn relation_tables(&self) -> Result<Vec<String>, StoreError> {
        let info = self.database_info().await?;
        let mut tables: Vec<String> = info
            .tables
            .iter()
            .filter(|(name, ddl)| is_relation_ddl(ddl) && name.as_str() != "from_document")
            .map(|(name, _)| name.clone())
            .collect();
        tables.sort();
        Ok(tables)
    }

    /// All non-reserved, non-relation tables: the agent-created entity types.
    pub async fn custom_entity_tables(&self) -> Result<Vec<String>, StoreError> {
        let info = self.database_info().await?;
        let mut tables: Vec<String> = info
            .tables
            .iter()
            .filter(|(name, ddl)| {
                !is_relation_ddl(ddl)
                    && !schema::is_reserved(name)
                    && !schema::INTERNAL_TABLES.contains(&name.as_str())
            })
            .map(|(name, _)| name.clone())
            .collect();
        tables.sort();
        Ok(tables)
    }

    async fn database_info(&self) -> Result<DatabaseInfo, StoreError> {
        let mut response = self
            .db
            .query("INFO FOR DB")
            .await
            .map_err(StoreError::query)?
            .check()
            .map_err(StoreError::query)?;
        let info: Option<DatabaseInfo> = response.take(0).map_err(StoreError::query)?;
        Ok(info.unwrap_or_default())
    }
}

fn is_relation_ddl(ddl: &str) -> bool {
    ddl.contains("TYPE RELATION")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store(dimension: usize) -> GraphStore {
        GraphStore::open_in_memory("test-model", dimension)
            .await
            .expect("in-memory store should open")
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let store = memory_store(4).await;
        // A second bootstrap over the same connection must not fail or wipe.
        store
            .execute(
                "CREATE type::thing('note', 'a.md') SET path = 'a.md', title = 'a';",
                vec![],
            )
            .await
            .expect("seed note");

        let again = GraphStore::initialize(store.db.clone(), "test-model", 4)
            .await
            .expect("re-bootstrap should succeed");
        let rows = again
            .query("SELECT path FROM note;", vec![])
            .await
            .expect("query should succeed");
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn unique_note_path_is_enforced() {
        let store = memory_store(4).await;
        store
            .execute("CREATE note SET path = 'x.md', title = 'x';", vec![])
            .await
            .expect("first insert");
        let duplicate = store
            .execute("CREATE note SET path = 'x.md', title = 'x2';", vec![])
            .await;
        assert!(matches!(duplicate, Err(StoreError::Query { .. })));
    }

    #[tokio::test]
    async fn discovery_lists_builtin_and_custom_relations() {
        let store = memory_store(4).await;
        let relations = store.relation_tables().await.expect("discovery");
        assert!(relations.contains(&"tagged_with".to_string()));
        assert!(relations.contains(&"links_to".to_string()));
        assert!(!relations.contains(&"from_document".to_string()));

        store
            .execute("DEFINE TABLE works_on TYPE RELATION;", vec![])
            .await
            .expect("define custom relation");
        let relations = store.relation_tables().await.expect("discovery");
        assert!(relations.contains(&"works_on".to_string()));
    }

    #[tokio::test]
    async fn custom_entity_tables_exclude_reserved_and_internal() {
        let store = memory_store(4).await;
        store
            .execute("DEFINE TABLE person SCHEMALESS;", vec![])
            .await
            .expect("define entity table");

        let tables = store.custom_entity_tables().await.expect("discovery");
        assert!(tables.contains(&"person".to_string()));
        for reserved in RESERVED_TABLES {
            assert!(!tables.contains(&reserved.to_string()));
        }
        assert!(!tables.contains(&"store_meta".to_string()));
    }

    #[tokio::test]
    async fn model_rotation_wipes_chunks_and_clears_hashes() {
        let store = memory_store(3).await;
        store
            .execute(
                "CREATE type::thing('note', 'n.md') SET path = 'n.md', title = 'n', content_hash = 'abc';\n\
                 CREATE type::thing('chunk', 'n.md#0') SET text = 'body', idx = 0, embedding = [0.1, 0.2, 0.3];\n\
                 RELATE (type::thing('chunk', 'n.md#0'))->from_document->(type::thing('note', 'n.md'));",
                vec![],
            )
            .await
            .expect("seed semantic layer");

        let rotated = GraphStore::initialize(store.db.clone(), "test-model", 2)
            .await
            .expect("rotation should succeed");

        let chunks = rotated
            .query("SELECT idx FROM chunk;", vec![])
            .await
            .expect("chunk query");
        assert!(chunks.is_empty());

        let edges = rotated
            .query("SELECT idx FROM from_document;", vec![])
            .await
            .expect("edge query");
        assert!(edges.is_empty());

        let hashes = rotated
            .query(
                "SELECT path FROM note WHERE content_hash != NONE;",
                vec![],
            )
            .await
            .expect("hash query");
        assert!(hashes.is_empty(), "content hashes should be cleared");
        assert_eq!(rotated.dimension(), 2);
    }

    #[tokio::test]
    async fn query_errors_pass_through_verbatim() {
        let store = memory_store(4).await;
        let result = store.query("SELEKT nope FROM note;", vec![]).await;
        match result {
            Err(StoreError::Query { message }) => assert!(!message.is_empty()),
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn bindings_reach_the_engine() {
        let store = memory_store(4).await;
        store
            .execute(
                "CREATE note SET path = $path, title = $title;",
                vec![
                    ("path".to_string(), serde_json::json!("bound.md")),
                    ("title".to_string(), serde_json::json!("bound")),
                ],
            )
            .await
            .expect("parameterized insert");

        let rows = store
            .query(
                "SELECT title FROM note WHERE path = $path;",
                vec![("path".to_string(), serde_json::json!("bound.md"))],
            )
            .await
            .expect("parameterized select");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "bound");
    }
}
