use crate::helpers::*;
use clipstash::backend::{Change, TagRef};
use clipstash::{Error, NewEntry};

#[test]
fn test_atomicop_commit_applies_everything() {
    for (label, store) in all_stores() {
        let mut op = store.new_operation().unwrap();
        op.stage(Change::InsertEntry(NewEntry::new("https://a", "a", "YouTube")));
        let science = op.stage_tag("Science", None);
        let physics = op.stage_tag("Physics", Some("Matter".into()));
        op.stage(Change::LinkTags {
            parent: science,
            child: physics,
        });
        assert_eq!(op.changes().len(), 4, "{label}");

        let applied = op.commit().unwrap();
        assert_eq!(applied.entries.len(), 1, "{label}");
        assert_eq!(applied.tags.len(), 2, "{label}");
        let physics_id = applied.resolve(physics).unwrap();

        let hierarchy = store.hierarchy().unwrap();
        assert_eq!(
            hierarchy.parent(physics_id),
            Some(applied.resolve(science).unwrap()),
            "{label}"
        );
    }
}

#[test]
fn test_atomicop_stage_reports_tag_refs() {
    let store = setup_store();
    let mut op = store.new_operation().unwrap();
    let first = op.stage(Change::InsertTag {
        name: "A".into(),
        description: None,
    });
    let none = op.stage(Change::IncrementWatchCount(1));
    let second = op.stage_tag("B", None);
    assert_eq!(first, Some(TagRef::Staged(0)));
    assert_eq!(none, None);
    assert_eq!(second, TagRef::Staged(1));
}

#[test]
fn test_atomicop_drop_discards() {
    for (label, store) in all_stores() {
        {
            let mut op = store.new_operation().unwrap();
            op.stage_tag("Ghost", None);
            assert!(!op.is_empty(), "{label}");
        }
        assert!(store.tags().list().unwrap().is_empty(), "{label}");
    }
}

#[test]
fn test_atomicop_failed_commit_rolls_back() {
    for (label, store) in all_stores() {
        let entry = add_entry(&store, "clip", 0);

        let mut op = store.new_operation().unwrap();
        let tag = op.stage_tag("Partial", None);
        op.stage(Change::Attach { entry, tag });
        op.stage(Change::DeleteEntry(entry + 1));
        assert!(matches!(op.commit(), Err(Error::EntryNotFound(_))), "{label}");

        assert!(store.tags().list().unwrap().is_empty(), "{label}");
        assert!(store.tags().for_entry(entry).unwrap().is_empty(), "{label}");
    }
}

#[test]
fn test_atomicop_sees_committed_state_only() {
    let store = setup_store();
    store.tags().create("Existing", None, None).unwrap();

    let mut op = store.new_operation().unwrap();
    op.stage_tag("Staged", None);
    let hierarchy = op.hierarchy().unwrap();
    assert!(hierarchy.tag_by_name("Existing").is_some());
    assert!(hierarchy.tag_by_name("Staged").is_none());
    assert!(op.backend().find_tag("Staged").unwrap().is_none());
}

#[test]
fn test_atomicop_empty_commit() {
    let store = setup_store();
    let op = store.new_operation().unwrap();
    assert!(op.is_empty());
    let applied = op.commit().unwrap();
    assert!(applied.entries.is_empty());
    assert!(applied.tags.is_empty());
}
