pub mod graph;
pub mod memory;
pub mod notes;
pub mod rename;
pub mod search;
pub mod sync;
pub mod trash;

pub use graph::{
    create_connection, find_related, query_graph, CreateConnectionInput, CreateConnectionOutput,
    FindRelatedInput, QueryGraphInput, RelatedEntry,
};
pub use memory::{
    delete_memory, list_memories, store_memory, MemoryRecord, StoreMemoryInput, StoredMemory,
};
pub use notes::{
    backlinks, create_note, edit_note, list_notes, read_note, CreateNoteInput, EditNoteInput,
    NoteHandle, NoteSummary, ReadNoteInput,
};
pub use rename::{rename_note, RenameNoteInput, RenameNoteOutput};
pub use search::{
    keyword_search, semantic_search, KeywordSearchInput, KeywordSearchResult, SemanticSearchInput,
    SemanticSearchResult,
};
pub use sync::{start_auto_sync, sync_semantic, sync_structural, AutoSyncHandle};
pub use trash::{delete_note, empty_trash, list_trash, restore_note};
