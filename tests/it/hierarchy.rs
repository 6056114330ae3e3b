use crate::helpers::*;
use clipstash::Error;
use std::collections::HashSet;

#[test]
fn test_ancestor_path_follows_stored_edges() {
    for (label, store) in all_stores() {
        create_chain(&store, &["Science", "Physics", "Optics"]);
        store.tags().create("Music", None, None).unwrap();

        let hierarchy = store.hierarchy().unwrap();
        let path = hierarchy.ancestor_path("Optics").unwrap();
        assert_eq!(path, vec!["Science", "Physics", "Optics"], "{label}");

        // Every consecutive pair is a real parent -> child edge.
        for pair in path.windows(2) {
            let parent = hierarchy.tag_by_name(&pair[0]).unwrap().id;
            let child = hierarchy.tag_by_name(&pair[1]).unwrap().id;
            assert_eq!(hierarchy.parent(child), Some(parent), "{label}");
        }

        assert_eq!(hierarchy.ancestor_path("Music").unwrap(), vec!["Music"], "{label}");
        assert!(matches!(
            hierarchy.ancestor_path("Chemistry"),
            Err(Error::TagNotFound(_))
        ));
    }
}

#[test]
fn test_closures_never_contain_self() {
    for (label, store) in all_stores() {
        create_chain(&store, &["A", "B", "C"]);
        let tags = store.tags();
        tags.create("B2", Some("A"), None).unwrap();
        tags.create("Lone", None, None).unwrap();

        let hierarchy = store.hierarchy().unwrap();
        for tag in hierarchy.tags() {
            assert!(!hierarchy.descendant_closure(tag.id).contains(&tag.id), "{label}");
            assert!(!hierarchy.ancestor_closure(tag.id).contains(&tag.id), "{label}");
        }

        let id = |name: &str| hierarchy.tag_by_name(name).unwrap().id;
        assert_eq!(
            hierarchy.descendant_closure(id("A")),
            HashSet::from([id("B"), id("C"), id("B2")]),
            "{label}"
        );
        assert_eq!(
            hierarchy.ancestor_closure(id("C")),
            HashSet::from([id("A"), id("B")]),
            "{label}"
        );
        assert!(hierarchy.descendant_closure(id("Lone")).is_empty(), "{label}");
    }
}

#[test]
fn test_forest_reflects_store() {
    let store = setup_store();
    let tags = store.tags();
    tags.create("Science", None, Some("Everything empirical")).unwrap();
    tags.create("Physics", Some("Science"), None).unwrap();
    tags.create("Archaeology", Some("Science"), None).unwrap();
    tags.create("Art", None, None).unwrap();

    let forest = tags.forest().unwrap();
    let roots: Vec<&str> = forest.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(roots, vec!["Art", "Science"]);

    let science = &forest[1];
    assert_eq!(science.description.as_deref(), Some("Everything empirical"));
    let children: Vec<(&str, usize)> = science
        .children
        .iter()
        .map(|n| (n.name.as_str(), n.depth))
        .collect();
    assert_eq!(children, vec![("Archaeology", 1), ("Physics", 1)]);
}

#[test]
fn test_wide_forest_closure() {
    let store = setup_store();
    let tags = store.tags();
    tags.create("Root", None, None).unwrap();
    for i in 0..200 {
        tags.create(&format!("Child{i}"), Some("Root"), None).unwrap();
    }
    let hierarchy = store.hierarchy().unwrap();
    let root = hierarchy.tag_by_name("Root").unwrap().id;
    assert_eq!(hierarchy.descendant_closure(root).len(), 200);
    assert_eq!(hierarchy.roots(), vec![root]);
}
