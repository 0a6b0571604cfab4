use textplan_core::{Column, Type, TypeKind};

use super::BuildErrorKind;
use super::expressions::lookup_column;
use super::types::scaled_decimal;

fn column(qualifier: &str, name: &str) -> Column {
    Column {
        qualifier: Some(qualifier.to_owned()),
        name: name.to_owned(),
        ty: Type::new(TypeKind::I64),
    }
}

#[test]
fn lookup_by_name_and_qualifier() {
    let scope = vec![column("a", "id"), column("a", "x"), column("b", "id")];

    assert_eq!(lookup_column(&scope, None, "x"), Ok(1));
    assert_eq!(lookup_column(&scope, Some("b"), "id"), Ok(2));
    assert_eq!(
        lookup_column(&scope, None, "id"),
        Err(BuildErrorKind::AmbiguousColumn("id".to_owned()))
    );
    assert_eq!(
        lookup_column(&scope, Some("c"), "id"),
        Err(BuildErrorKind::UnknownColumn("c.id".to_owned()))
    );
}

#[test]
fn same_qualified_name_twice_is_ambiguous() {
    let scope = vec![column("a", "id"), column("a", "id")];

    assert_eq!(
        lookup_column(&scope, Some("a"), "id"),
        Err(BuildErrorKind::AmbiguousColumn("a.id".to_owned()))
    );
}

#[test]
fn decimal_scaling() {
    assert_eq!(scaled_decimal("12", 2), Some(1200));
    assert_eq!(scaled_decimal("1.5", 2), Some(150));
    assert_eq!(scaled_decimal("-0.25", 2), Some(-25));
    assert_eq!(scaled_decimal("1.5e2", 0), Some(150));
    assert_eq!(scaled_decimal("125e-2", 2), Some(125));
    assert_eq!(scaled_decimal("1.234", 2), None);
    assert_eq!(scaled_decimal("1e40", 0), None);
}
