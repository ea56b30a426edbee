/// Core table names the agent must never reuse for custom entities or
/// relations.
pub const RESERVED_TABLES: &[&str] = &[
    "note",
    "tag",
    "chunk",
    "memory",
    "tagged_with",
    "links_to",
    "from_document",
];

/// Internal bookkeeping tables, hidden from schema discovery.
pub(crate) const INTERNAL_TABLES: &[&str] = &["store_meta"];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_TABLES.contains(&name)
}

/// Schema statements applied on every start. All definitions are `IF NOT
/// EXISTS` so the bootstrap is idempotent; the vector index is handled
/// separately because its dimension can change between runs.
pub(crate) const BOOTSTRAP_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS note SCHEMALESS;
DEFINE TABLE IF NOT EXISTS tag SCHEMALESS;
DEFINE TABLE IF NOT EXISTS chunk SCHEMALESS;
DEFINE TABLE IF NOT EXISTS memory SCHEMALESS;
DEFINE TABLE IF NOT EXISTS store_meta SCHEMALESS;
DEFINE TABLE IF NOT EXISTS tagged_with TYPE RELATION IN note OUT tag;
DEFINE TABLE IF NOT EXISTS links_to TYPE RELATION IN note OUT note;
DEFINE TABLE IF NOT EXISTS from_document TYPE RELATION IN chunk OUT note;
DEFINE INDEX IF NOT EXISTS note_path_idx ON TABLE note FIELDS path UNIQUE;
DEFINE INDEX IF NOT EXISTS tag_name_idx ON TABLE tag FIELDS name UNIQUE;
DEFINE INDEX IF NOT EXISTS memory_mid_idx ON TABLE memory FIELDS mid UNIQUE;
DEFINE INDEX IF NOT EXISTS note_title_idx ON TABLE note FIELDS title;
DEFINE INDEX IF NOT EXISTS note_hash_idx ON TABLE note FIELDS content_hash;
DEFINE ANALYZER IF NOT EXISTS note_analyzer TOKENIZERS class FILTERS lowercase, ascii;
DEFINE INDEX IF NOT EXISTS note_content_search ON TABLE note FIELDS content SEARCH ANALYZER note_analyzer BM25 HIGHLIGHTS;
DEFINE INDEX IF NOT EXISTS note_title_search ON TABLE note FIELDS title SEARCH ANALYZER note_analyzer BM25 HIGHLIGHTS;
";

/// The HNSW vector index over chunk embeddings at a concrete dimension.
pub(crate) fn vector_index_ddl(dimension: usize) -> String {
    format!(
        "DEFINE INDEX IF NOT EXISTS chunk_embeddings ON TABLE chunk \
         FIELDS embedding HNSW DIMENSION {dimension} DIST COSINE;"
    )
}

/// Statements for a model rotation: drop and redefine the vector index at
/// the new dimension, wipe all chunks and their document edges, and clear
/// every note's content hash so the next semantic sync re-embeds the corpus.
pub(crate) fn rotation_script(dimension: usize) -> String {
    format!(
        "REMOVE INDEX IF EXISTS chunk_embeddings ON TABLE chunk;\n\
         DELETE from_document;\n\
         DELETE chunk;\n\
         UPDATE note SET content_hash = NONE;\n\
         DEFINE INDEX chunk_embeddings ON TABLE chunk \
         FIELDS embedding HNSW DIMENSION {dimension} DIST COSINE;"
    )
}
