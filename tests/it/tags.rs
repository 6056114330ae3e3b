use crate::helpers::*;
use clipstash::Error;

#[test]
fn test_create_tag_with_parent() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        let science = tags.create("Science", None, None).unwrap();
        let physics = tags
            .create("Physics", Some("Science"), Some("Matter and energy"))
            .unwrap();

        let hierarchy = store.hierarchy().unwrap();
        assert_eq!(hierarchy.parent(physics), Some(science), "{label}");
        assert_eq!(hierarchy.parent(science), None, "{label}");
        assert_eq!(
            tags.get("Physics").unwrap().description.as_deref(),
            Some("Matter and energy"),
            "{label}"
        );
    }
}

#[test]
fn test_create_duplicate_name() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        tags.create("Science", None, None).unwrap();
        let result = tags.create("Science", None, None);
        assert!(
            matches!(result, Err(Error::DuplicateName(ref name)) if name == "Science"),
            "{label}"
        );
        // Names are case-sensitive as stored.
        tags.create("science", None, None).unwrap();
        assert_eq!(tags.list().unwrap().len(), 2, "{label}");
    }
}

#[test]
fn test_create_with_missing_parent_creates_nothing() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        let result = tags.create("Physics", Some("Science"), None);
        assert!(
            matches!(result, Err(Error::ParentNotFound(ref name)) if name == "Science"),
            "{label}"
        );
        assert!(tags.list().unwrap().is_empty(), "{label}");
        assert!(matches!(tags.get("Physics"), Err(Error::TagNotFound(_))), "{label}");
    }
}

#[test]
fn test_tag_names_are_validated() {
    let store = setup_store();
    let tags = store.tags();
    assert!(matches!(tags.create("   ", None, None), Err(Error::InvalidOperation(_))));
    assert!(matches!(tags.create("A/B", None, None), Err(Error::InvalidOperation(_))));

    let id = tags.create("  Padded  ", None, None).unwrap();
    assert_eq!(tags.get("Padded").unwrap().id, id);
}

#[test]
fn test_rename_tag() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        create_chain(&store, &["Science", "Physics"]);
        tags.create("Music", None, None).unwrap();

        tags.rename("Science", "Sciences").unwrap();
        assert_eq!(
            tags.path("Physics").unwrap(),
            vec!["Sciences", "Physics"],
            "{label}"
        );

        assert!(
            matches!(tags.rename("Music", "Physics"), Err(Error::DuplicateName(_))),
            "{label}"
        );
        assert!(
            matches!(tags.rename("Nothing", "Else"), Err(Error::TagNotFound(_))),
            "{label}"
        );
        // Renaming to the current name is allowed.
        tags.rename("Music", "Music").unwrap();
    }
}

#[test]
fn test_describe_tag() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        tags.create("Science", None, None).unwrap();

        tags.describe("Science", Some("Empirical knowledge")).unwrap();
        assert_eq!(
            tags.get("Science").unwrap().description.as_deref(),
            Some("Empirical knowledge"),
            "{label}"
        );
        tags.describe("Science", None).unwrap();
        assert_eq!(tags.get("Science").unwrap().description, None, "{label}");

        assert!(
            matches!(tags.describe("Nothing", Some("x")), Err(Error::TagNotFound(_))),
            "{label}"
        );
    }
}

#[test]
fn test_delete_tag_orphans_children() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        tags.create("Science", None, None).unwrap();
        let physics = tags.create("Physics", Some("Science"), None).unwrap();
        let entry = add_entry(&store, "Lecture", 0);
        tags.attach(entry, "Science").unwrap();

        tags.delete("Science").unwrap();

        let hierarchy = store.hierarchy().unwrap();
        assert!(hierarchy.tag_by_name("Science").is_none(), "{label}");
        assert_eq!(hierarchy.tag(physics).unwrap().name, "Physics", "{label}");
        assert_eq!(hierarchy.parent(physics), None, "{label}");
        assert_eq!(hierarchy.roots(), vec![physics], "{label}");
        assert!(tags.for_entry(entry).unwrap().is_empty(), "{label}");

        assert!(matches!(tags.delete("Science"), Err(Error::TagNotFound(_))), "{label}");
    }
}

#[test]
fn test_attach_detach_round() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        tags.create("Science", None, None).unwrap();
        let entry = add_entry(&store, "Lecture", 0);

        tags.attach(entry, "Science").unwrap();
        let second = tags.attach(entry, "Science");
        assert!(
            matches!(
                second,
                Err(Error::DuplicateAssociation { entry: e, ref tag }) if e == entry && tag == "Science"
            ),
            "{label}: {second:?}"
        );

        tags.detach(entry, "Science").unwrap();
        let second = tags.detach(entry, "Science");
        assert!(
            matches!(second, Err(Error::AssociationNotFound { .. })),
            "{label}: {second:?}"
        );
    }
}

#[test]
fn test_attach_missing_sides() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        tags.create("Science", None, None).unwrap();
        let entry = add_entry(&store, "Lecture", 0);

        assert!(matches!(tags.attach(entry, "Nope"), Err(Error::TagNotFound(_))), "{label}");
        assert!(
            matches!(tags.attach(entry + 1, "Science"), Err(Error::EntryNotFound(_))),
            "{label}"
        );
        assert!(matches!(tags.detach(entry, "Nope"), Err(Error::TagNotFound(_))), "{label}");
        assert!(
            matches!(tags.detach(entry + 1, "Science"), Err(Error::EntryNotFound(_))),
            "{label}"
        );
    }
}

#[test]
fn test_assign_path_is_idempotent() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        let entry = add_entry(&store, "Bones of the Bronze Age", 0);

        let first = tags.assign_path(entry, "A/B/C").unwrap();
        let second = tags.assign_path(entry, "A/B/C").unwrap();
        assert_eq!(first, second, "{label}");

        let names: Vec<String> = tags.list().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["A", "B", "C"], "{label}");

        let hierarchy = store.hierarchy().unwrap();
        let id = |name: &str| hierarchy.tag_by_name(name).unwrap().id;
        assert_eq!(hierarchy.parent(id("B")), Some(id("A")), "{label}");
        assert_eq!(hierarchy.parent(id("C")), Some(id("B")), "{label}");
        assert_eq!(
            store.with_backend(|b| b.tags_of_entry(entry)).unwrap().unwrap(),
            vec![id("C")],
            "{label}"
        );
        assert_eq!(tags.for_entry(entry).unwrap(), vec!["A/B/C"], "{label}");
    }
}

#[test]
fn test_assign_path_reuses_existing_prefix() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        create_chain(&store, &["Science"]);
        let first = add_entry(&store, "Dig", 0);
        let second = add_entry(&store, "Pottery", 1);

        tags.assign_path(first, "Science/Archaeology").unwrap();
        tags.assign_path(second, " Science // Archaeology / Ceramics ").unwrap();

        assert_eq!(tags.list().unwrap().len(), 3, "{label}");
        assert_eq!(
            tags.path("Ceramics").unwrap(),
            vec!["Science", "Archaeology", "Ceramics"],
            "{label}"
        );
        assert_eq!(tags.for_entry(first).unwrap(), vec!["Science/Archaeology"], "{label}");
        assert_eq!(
            tags.for_entry(second).unwrap(),
            vec!["Science/Archaeology/Ceramics"],
            "{label}"
        );
    }
}

#[test]
fn test_assign_path_reuses_tag_under_other_parent() {
    let store = setup_store();
    let tags = store.tags();
    create_chain(&store, &["History", "Archaeology"]);
    let entry = add_entry(&store, "Dig", 0);

    // Names are global, so the existing Archaeology is reused where it lives.
    tags.assign_path(entry, "Science/Archaeology").unwrap();
    assert_eq!(tags.path("Archaeology").unwrap(), vec!["History", "Archaeology"]);
    assert_eq!(tags.path("Science").unwrap(), vec!["Science"]);
    assert_eq!(tags.for_entry(entry).unwrap(), vec!["History/Archaeology"]);
}

#[test]
fn test_assign_path_links_existing_roots() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        let a = tags.create("A", None, None).unwrap();
        let b = tags.create("B", None, None).unwrap();
        let entry = add_entry(&store, "Layered", 0);

        let c = tags.assign_path(entry, "A/B/C").unwrap();
        let hierarchy = store.hierarchy().unwrap();
        assert_eq!(hierarchy.parent(b), Some(a), "{label}");
        assert_eq!(hierarchy.parent(c), Some(b), "{label}");
        assert_eq!(tags.path("C").unwrap(), vec!["A", "B", "C"], "{label}");
        assert_eq!(tags.for_entry(entry).unwrap(), vec!["A/B/C"], "{label}");
    }
}

#[test]
fn test_assign_path_never_links_into_a_cycle() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        create_chain(&store, &["A", "B"]);
        let entry = add_entry(&store, "Loop", 0);

        // A is the root above B, so it stays a root.
        tags.assign_path(entry, "B/A").unwrap();
        assert_eq!(tags.path("A").unwrap(), vec!["A"], "{label}");
        assert_eq!(tags.path("B").unwrap(), vec!["A", "B"], "{label}");

        // Same when the loop goes through a tag created by this call.
        tags.assign_path(entry, "A/X/A").unwrap();
        assert_eq!(tags.path("A").unwrap(), vec!["A"], "{label}");
        assert_eq!(tags.path("X").unwrap(), vec!["A", "X"], "{label}");
        assert_eq!(tags.for_entry(entry).unwrap(), vec!["A"], "{label}");
    }
}

#[test]
fn test_assign_path_repeated_segment() {
    let store = setup_store();
    let entry = add_entry(&store, "Echo", 0);
    store.tags().assign_path(entry, "Echo/Echo").unwrap();
    assert_eq!(store.tags().list().unwrap().len(), 1);
    assert_eq!(store.tags().for_entry(entry).unwrap(), vec!["Echo"]);
}

#[test]
fn test_assign_path_failure_rolls_back() {
    for (label, store) in all_stores() {
        let tags = store.tags();

        assert!(
            matches!(tags.assign_path(42, "A/B"), Err(Error::EntryNotFound(42))),
            "{label}"
        );
        assert!(tags.list().unwrap().is_empty(), "{label}");

        let entry = add_entry(&store, "x", 0);
        assert!(
            matches!(tags.assign_path(entry, " / / "), Err(Error::InvalidOperation(_))),
            "{label}"
        );
        assert!(tags.list().unwrap().is_empty(), "{label}");
    }
}

#[test]
fn test_lookups_trim_names_like_create() {
    for (label, store) in all_stores() {
        let tags = store.tags();
        tags.create(" Science ", None, None).unwrap();
        let entry = add_entry(&store, "Lecture", 0);

        tags.attach(entry, " Science ").unwrap();
        assert_eq!(tags.for_entry(entry).unwrap(), vec!["Science"], "{label}");
        tags.detach(entry, "Science  ").unwrap();
        tags.describe("  Science", Some("Facts")).unwrap();
        assert_eq!(
            tags.get(" Science ").unwrap().description.as_deref(),
            Some("Facts"),
            "{label}"
        );
        assert_eq!(tags.path(" Science ").unwrap(), vec!["Science"], "{label}");
        tags.rename(" Science ", "Sciences").unwrap();
        tags.delete(" Sciences ").unwrap();
        assert!(tags.list().unwrap().is_empty(), "{label}");
    }
}
