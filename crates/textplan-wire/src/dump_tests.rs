use indoc::indoc;
use textplan_core::{Colors, Expr, SetPredicateOp, Subquery};

use crate::test_utils::{orders_plan, read, root_condition};
use crate::{DecodeErrorKind, dump, encode};

fn dump_lines() -> Vec<String> {
    let bytes = encode(&orders_plan()).unwrap();
    dump(&bytes, Colors::OFF)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

fn line_starting(lines: &[String], prefix: &str) -> String {
    lines
        .iter()
        .find(|l| l.starts_with(prefix))
        .cloned()
        .unwrap_or_default()
}

#[test]
fn dump_lists_sections_in_order() {
    let lines = dump_lines();
    let sections: Vec<_> = lines.iter().filter(|l| l.starts_with('[')).collect();
    assert_eq!(
        sections,
        ["[header]", "[strings]", "[extensions]", "[schemas]", "[sources]", "[relations]"]
    );
}

#[test]
fn dump_strings_and_extensions() {
    let lines = dump_lines();
    insta::assert_snapshot!(line_starting(&lines, "S00"), @r#"S00 """#);
    insta::assert_snapshot!(line_starting(&lines, "S02"), @r#"S02 "gt:any_any""#);
    insta::assert_snapshot!(line_starting(&lines, "F1"), @"F1 U1 gt:any_any");
    insta::assert_snapshot!(line_starting(&lines, "#0 orders_table"), @"#0 orders_table named_table sales.orders");
}

#[test]
fn dump_schema_types() {
    let lines = dump_lines();
    assert!(lines.contains(&"  amount decimal?<10,2>".to_owned()));
}

#[test]
fn dump_relation_tree_is_indented() {
    let lines = dump_lines();
    let relations: Vec<_> = lines
        .iter()
        .skip_while(|l| *l != "[relations]")
        .skip(1)
        .map(|l| l.split_once(' ').map_or("", |(_, rest)| rest))
        .collect();
    assert_eq!(relations, ["filter big (3 cols)", "  read o (3 cols)"]);
}

#[test]
fn dump_schema_section() {
    let lines = dump_lines();
    let schemas: Vec<_> = lines
        .iter()
        .skip_while(|l| *l != "[schemas]")
        .take_while(|l| !l.is_empty())
        .map(String::as_str)
        .collect();
    assert_eq!(
        schemas.join("\n") + "\n",
        indoc! {"
            [schemas]
            #0 orders
              id i64
              amount decimal?<10,2>
              region string
        "}
    );
}

#[test]
fn dump_nests_subqueries_under_their_relation() {
    let mut plan = orders_plan();
    plan.roots[0].emit = Some(vec![0]);
    *root_condition(&mut plan) = Expr::Subquery(Subquery::SetPredicate {
        op: SetPredicateOp::Exists,
        rel: Box::new(read("e", 0)),
    });
    let text = dump(&encode(&plan).unwrap(), Colors::OFF).unwrap();
    let relations: Vec<_> = text
        .lines()
        .skip_while(|l| *l != "[relations]")
        .skip(1)
        .map(|l| l.split_once(' ').map_or("", |(_, rest)| rest))
        .collect();
    assert_eq!(
        relations.join("\n") + "\n",
        indoc! {"
            filter big (1 cols)
              read o (3 cols)
                read e (3 cols)
        "}
    );
}

#[test]
fn dump_rejects_invalid_buffers() {
    let err = dump(b"TPLN", Colors::OFF).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::Truncated);
}
