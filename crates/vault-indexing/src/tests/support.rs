use std::path::{Path, PathBuf};
use std::sync::Arc;

use embedding::HashedEncoder;
use graph_store::GraphStore;
use serde_json::json;

pub(crate) const TEST_DIMENSION: usize = 16;

pub(crate) struct SyncHarness {
    root: PathBuf,
    pub(crate) store: GraphStore,
    pub(crate) encoder: Arc<HashedEncoder>,
}

impl SyncHarness {
    pub(crate) async fn new(prefix: &str) -> Self {
        let mut root = std::env::temp_dir();
        root.push(format!("{prefix}-{}", unique_id()));
        std::fs::create_dir_all(&root).expect("failed to create temp vault");

        let store = GraphStore::open_in_memory("hashed-test-encoder", TEST_DIMENSION)
            .await
            .expect("in-memory store should open");

        Self {
            root,
            store,
            encoder: Arc::new(HashedEncoder::new(TEST_DIMENSION)),
        }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn write(&self, rel_path: &str, contents: &str) {
        let path = self.root.join(rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(path, contents).expect("failed to write note");
    }

    pub(crate) async fn note_paths(&self) -> Vec<String> {
        self.store
            .query_rows(
                "SELECT VALUE path FROM note ORDER BY path ASC;",
                vec![],
            )
            .await
            .expect("note path query")
    }

    pub(crate) async fn tag_names(&self) -> Vec<String> {
        self.store
            .query_rows("SELECT VALUE name FROM tag ORDER BY name ASC;", vec![])
            .await
            .expect("tag name query")
    }

    pub(crate) async fn out_links(&self, path: &str) -> Vec<String> {
        self.store
            .query_rows(
                "SELECT VALUE record::id(out) FROM links_to \
                 WHERE in = type::thing('note', $path) ORDER BY out ASC;",
                vec![("path".to_string(), json!(path))],
            )
            .await
            .expect("links query")
    }

    pub(crate) async fn note_tags(&self, path: &str) -> Vec<String> {
        self.store
            .query_rows(
                "SELECT VALUE record::id(out) FROM tagged_with \
                 WHERE in = type::thing('note', $path) ORDER BY out ASC;",
                vec![("path".to_string(), json!(path))],
            )
            .await
            .expect("tagged query")
    }

    pub(crate) async fn chunk_count(&self, path: &str) -> usize {
        let rows: Vec<i64> = self
            .store
            .query_rows(
                "SELECT VALUE count() FROM from_document \
                 WHERE out = type::thing('note', $path) GROUP ALL;",
                vec![("path".to_string(), json!(path))],
            )
            .await
            .expect("chunk count query");
        rows.into_iter().next().unwrap_or(0) as usize
    }

    pub(crate) async fn content_hash(&self, path: &str) -> Option<String> {
        let rows: Vec<Option<String>> = self
            .store
            .query_rows(
                "SELECT VALUE content_hash FROM type::thing('note', $path);",
                vec![("path".to_string(), json!(path))],
            )
            .await
            .expect("hash query");
        rows.into_iter().next().flatten()
    }
}

impl Drop for SyncHarness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn unique_id() -> u128 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock error")
        .as_nanos()
}
