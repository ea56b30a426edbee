use super::support::SyncHarness;
use crate::{structural_sync, structural_sync_note};

#[tokio::test]
async fn links_tags_and_notes_land_in_the_graph() {
    let harness = SyncHarness::new("structural-basic").await;
    harness.write(
        "A.md",
        "---\ntags: [x]\n---\n# A\nsee [[B]] and [[B|bee]] and #topic and #TOPIC",
    );
    harness.write("B.md", "# B");

    let report = structural_sync(&harness.store, harness.root())
        .await
        .expect("sync should succeed");

    assert_eq!(report.processed, 2);
    assert_eq!(report.errored, 0);
    assert_eq!(harness.note_paths().await, vec!["A.md", "B.md"]);
    assert_eq!(harness.tag_names().await, vec!["topic", "x"]);
    assert_eq!(harness.out_links("A.md").await, vec!["B.md"]);

    let mut tags = harness.note_tags("A.md").await;
    tags.sort();
    assert_eq!(tags, vec!["topic", "x"]);
}

#[tokio::test]
async fn edits_replace_edges_without_deleting_notes() {
    let harness = SyncHarness::new("structural-edit").await;
    harness.write("A.md", "see [[B]] #keep");
    harness.write("B.md", "# B");
    structural_sync(&harness.store, harness.root())
        .await
        .expect("first sync");

    harness.write("A.md", "# A\n\nno more links");
    structural_sync(&harness.store, harness.root())
        .await
        .expect("second sync");

    assert!(harness.out_links("A.md").await.is_empty());
    assert!(harness.note_tags("A.md").await.is_empty());
    // The link target survives; only the edges were replaced.
    assert_eq!(harness.note_paths().await, vec!["A.md", "B.md"]);
}

#[tokio::test]
async fn structural_sync_is_idempotent() {
    let harness = SyncHarness::new("structural-idempotent").await;
    harness.write("A.md", "[[B]] #alpha");
    harness.write("B.md", "[[A]]");

    structural_sync(&harness.store, harness.root())
        .await
        .expect("first sync");
    let notes_before = harness.note_paths().await;
    let tags_before = harness.tag_names().await;
    let links_before = harness.out_links("A.md").await;

    structural_sync(&harness.store, harness.root())
        .await
        .expect("second sync");

    assert_eq!(harness.note_paths().await, notes_before);
    assert_eq!(harness.tag_names().await, tags_before);
    assert_eq!(harness.out_links("A.md").await, links_before);
}

#[tokio::test]
async fn unresolved_wikilinks_do_not_create_placeholder_notes() {
    let harness = SyncHarness::new("structural-unresolved").await;
    harness.write("A.md", "see [[Missing Note]]");

    structural_sync(&harness.store, harness.root())
        .await
        .expect("sync should succeed");

    assert_eq!(harness.note_paths().await, vec!["A.md"]);
    assert!(harness.out_links("A.md").await.is_empty());
}

#[tokio::test]
async fn duplicate_wikilinks_produce_one_edge() {
    let harness = SyncHarness::new("structural-duplicate").await;
    harness.write("A.md", "[[B]] then [[B]] then [[B|alias]] then [[B#section]]");
    harness.write("B.md", "# B");

    structural_sync(&harness.store, harness.root())
        .await
        .expect("sync should succeed");

    assert_eq!(harness.out_links("A.md").await, vec!["B.md"]);
}

#[tokio::test]
async fn single_note_sync_resolves_targets_through_the_store() {
    let harness = SyncHarness::new("structural-single").await;
    harness.write("B.md", "# B");
    structural_sync(&harness.store, harness.root())
        .await
        .expect("initial sync");

    harness.write("A.md", "late link to [[B]] #fresh");
    structural_sync_note(&harness.store, harness.root(), "A.md")
        .await
        .expect("single-note sync should succeed");

    assert_eq!(harness.out_links("A.md").await, vec!["B.md"]);
    assert_eq!(harness.note_tags("A.md").await, vec!["fresh"]);
}

#[tokio::test]
async fn unparseable_notes_are_counted_not_fatal() {
    let harness = SyncHarness::new("structural-badnote").await;
    harness.write("Good.md", "# fine");
    harness.write("Bad.md", "---\ntags: [broken\n---\nbody");

    let report = structural_sync(&harness.store, harness.root())
        .await
        .expect("sync should survive bad notes");

    assert_eq!(report.processed, 1);
    assert_eq!(report.errored, 1);
    assert_eq!(harness.note_paths().await, vec!["Good.md"]);
}

#[tokio::test]
async fn notes_in_trash_are_not_indexed() {
    let harness = SyncHarness::new("structural-trash").await;
    harness.write("Live.md", "# live");
    harness.write(".trash/Dead.md", "# dead");

    structural_sync(&harness.store, harness.root())
        .await
        .expect("sync should succeed");

    assert_eq!(harness.note_paths().await, vec!["Live.md"]);
}
