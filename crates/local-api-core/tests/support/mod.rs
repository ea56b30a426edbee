use std::path::PathBuf;
use std::sync::Arc;

use embedding::HashedEncoder;
use graph_store::GraphStore;
use local_api_core::ApiContext;

pub const TEST_DIMENSION: usize = 16;

pub struct SurfaceHarness {
    root: PathBuf,
    pub ctx: ApiContext,
}

impl SurfaceHarness {
    pub async fn new(prefix: &str) -> Self {
        let root = temp_root(prefix);
        let store = GraphStore::open_in_memory("hashed-test-encoder", TEST_DIMENSION)
            .await
            .expect("in-memory store should open");
        let ctx = ApiContext::new(
            root.clone(),
            Some(store),
            Arc::new(HashedEncoder::new(TEST_DIMENSION)),
        );

        Self { root, ctx }
    }

    #[allow(dead_code)]
    pub fn degraded(prefix: &str) -> Self {
        let root = temp_root(prefix);
        let ctx = ApiContext::new(
            root.clone(),
            None,
            Arc::new(HashedEncoder::new(TEST_DIMENSION)),
        );
        Self { root, ctx }
    }

    pub fn write(&self, rel_path: &str, contents: &str) {
        let path = self.root.join(rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(path, contents).expect("failed to write note");
    }

    #[allow(dead_code)]
    pub fn exists(&self, rel_path: &str) -> bool {
        self.root.join(rel_path).exists()
    }
}

impl Drop for SurfaceHarness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn temp_root(prefix: &str) -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock error")
        .as_nanos();
    let root = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
    std::fs::create_dir_all(&root).expect("failed to create temp root");
    root
}
