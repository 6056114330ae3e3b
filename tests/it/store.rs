use crate::helpers::*;
use clipstash::query::Criteria;
use clipstash::{Error, NewEntry};
use std::thread;

#[test]
fn test_create_and_get_entry() {
    for (label, store) in all_stores() {
        let id = store
            .create_entry("https://youtu.be/abc", "A talk", "YouTube")
            .unwrap();
        let entry = store.get_entry(id).unwrap();
        assert_eq!(entry.url, "https://youtu.be/abc", "{label}");
        assert_eq!(entry.title, "A talk", "{label}");
        assert!(entry.is_unwatched(), "{label}");

        assert!(
            matches!(store.create_entry("", "t", "p"), Err(Error::InvalidOperation(_))),
            "{label}"
        );
        let missing = store.get_entry(id + 1).unwrap_err();
        assert!(missing.is_not_found(), "{label}");
    }
}

#[test]
fn test_find_entry_by_url_returns_latest() {
    for (label, store) in all_stores() {
        add_entry_at(&store, "https://a", "first", 0);
        let latest = add_entry_at(&store, "https://a", "second", 5);
        add_entry_at(&store, "https://b", "other", 10);

        let found = store.find_entry_by_url("https://a").unwrap().unwrap();
        assert_eq!(found.id, latest, "{label}");
        assert!(store.find_entry_by_url("https://c").unwrap().is_none(), "{label}");
    }
}

#[test]
fn test_increment_watch_count() {
    for (label, store) in all_stores() {
        let id = add_entry(&store, "clip", 0);
        assert_eq!(store.increment_watch_count(id).unwrap(), 1, "{label}");
        assert_eq!(store.increment_watch_count(id).unwrap(), 2, "{label}");
        assert_eq!(store.get_entry(id).unwrap().watch_count, 2, "{label}");
        assert!(
            matches!(store.increment_watch_count(id + 1), Err(Error::EntryNotFound(_))),
            "{label}"
        );
    }
}

#[test]
fn test_delete_entry_cascades_associations() {
    for (label, store) in all_stores() {
        store.tags().create("Science", None, None).unwrap();
        let id = add_entry(&store, "clip", 0);
        store.tags().attach(id, "Science").unwrap();

        store.delete_entry(id).unwrap();
        assert!(matches!(store.get_entry(id), Err(Error::EntryNotFound(_))), "{label}");
        assert!(
            store.with_backend(|b| b.all_associations()).unwrap().unwrap().is_empty(),
            "{label}"
        );
        assert!(
            matches!(store.delete_entry(id), Err(Error::EntryNotFound(_))),
            "{label}"
        );
    }
}

#[test]
fn test_platforms_are_distinct_and_sorted() {
    let store = setup_store();
    for (i, platform) in ["YouTube", "Vimeo", "YouTube", "", "Instagram"].iter().enumerate() {
        store
            .create_entry(&format!("https://example.com/{i}"), "", platform)
            .unwrap();
    }
    assert_eq!(
        store.platforms().unwrap(),
        vec!["Instagram", "Vimeo", "YouTube"]
    );
}

#[test]
fn test_concurrent_writers_keep_the_forest() {
    for (label, store) in all_stores() {
        store.tags().create("Root", None, None).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..10 {
                        let entry = store
                            .create_entry_at(NewEntry::new(
                                format!("https://example.com/{t}/{i}"),
                                "clip",
                                "YouTube",
                            ))
                            .unwrap();
                        // Every thread files under the same shared prefix.
                        store
                            .tags()
                            .assign_path(entry, &format!("Root/Shared/T{t}"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let hierarchy = store.hierarchy().unwrap();
        assert_eq!(hierarchy.len(), 2 + 8, "{label}");
        let shared = hierarchy.tag_by_name("Shared").unwrap().id;
        assert_eq!(hierarchy.children(shared).len(), 8, "{label}");

        let all = store
            .history()
            .query(&Criteria::new().tag("Root").no_limit())
            .unwrap();
        assert_eq!(all.len(), 80, "{label}");
    }
}
