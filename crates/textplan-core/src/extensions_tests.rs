use crate::extensions::{Anchor, AnchorError, ExtensionName, ExtensionRegistry};

#[test]
fn anchors_are_dense_and_reused() {
    let mut registry = ExtensionRegistry::new();
    let add = registry.register_function("urn:arith", "add:i64_i64");
    let sum = registry.register_function("urn:agg", "sum:i64");
    let add_again = registry.register_function("urn:arith", "add:i64_i64");

    assert_eq!(add.get(), 1);
    assert_eq!(sum.get(), 2);
    assert_eq!(add_again, add);
    assert_eq!(registry.uri_count(), 2);
    assert_eq!(registry.resolve_function(sum), Ok(("urn:agg", "sum:i64")));
}

#[test]
fn same_name_under_different_uris_gets_distinct_anchors() {
    let mut registry = ExtensionRegistry::new();
    let a = registry.register_function("urn:a", "f:i32");
    let b = registry.register_function("urn:b", "f:i32");
    assert_ne!(a, b);
}

#[test]
fn zero_anchor_is_absent() {
    assert_eq!(Anchor::new(0), None);
    let registry = ExtensionRegistry::new();
    let one = Anchor::new(1).unwrap();
    assert_eq!(
        registry.resolve_function(one),
        Err(AnchorError::DanglingFunction(one))
    );
}

#[test]
fn push_rejects_duplicates_and_dangling_uris() {
    let mut registry = ExtensionRegistry::new();
    let uri = registry.push_uri("urn:x".to_owned()).unwrap();
    assert_eq!(registry.push_uri("urn:x".to_owned()), None);

    let entry = ExtensionName {
        uri,
        name: "f".to_owned(),
    };
    assert!(registry.push_function(entry.clone()).unwrap().is_some());
    assert_eq!(registry.push_function(entry).unwrap(), None);

    let dangling = ExtensionName {
        uri: Anchor::new(9).unwrap(),
        name: "g".to_owned(),
    };
    assert!(matches!(
        registry.push_type(dangling),
        Err(AnchorError::DanglingUri(_))
    ));
}

#[test]
fn base_name_strips_signature() {
    let entry = ExtensionName {
        uri: Anchor::new(1).unwrap(),
        name: "substring:vchar_i32_i32".to_owned(),
    };
    assert_eq!(entry.base_name(), "substring");
}
