use crate::Error;
use crate::diagnostics::DiagnosticKind;
use crate::parser::{parse, parse_with_fuel};

use super::expect_invalid;

fn kinds(source: &str) -> Vec<DiagnosticKind> {
    expect_invalid(source).iter().map(|d| d.kind()).collect()
}

#[test]
fn unknown_property() {
    let res = expect_invalid("read relation r {\n  frobnicate 1;\n}\n");

    insta::assert_snapshot!(res.render_plain(), @"error at 20..30: unknown property: `frobnicate`");
}

#[test]
fn missing_semicolon_before_next_property() {
    let res = expect_invalid("read relation r {\n  base_schema s\n  source t;\n}\n");

    insta::assert_snapshot!(res.render_plain(), @"error at 33..33: unexpected token: expected `;` (fix: add `;`)");
}

#[test]
fn unclosed_block_at_eof() {
    let res = expect_invalid("schema s {\n  a i64;\n");

    insta::assert_snapshot!(res.render_plain(), @"error at 9..20: missing closing `}` in the schema (related: schema starts here at 9..10)");
}

#[test]
fn missing_field_type() {
    let res = expect_invalid("schema s {\n  a;\n}\n");

    insta::assert_snapshot!(res.render_plain(), @"error at 14..15: expected a type");
}

#[test]
fn missing_schema_name_recovers() {
    let source = "schema {\n}\nschema t {\n  a i64;\n}\n";
    let res = expect_invalid(source);

    insta::assert_snapshot!(res.render_plain(), @"error at 7..8: expected a schema name");

    let (parsed, _) = parse(source).unwrap();
    assert_eq!(parsed.root().decls().count(), 2);
}

#[test]
fn unrecognized_characters() {
    let res = expect_invalid("schema s { a i64; } %%");

    insta::assert_snapshot!(res.render_plain(), @"error at 20..22: unrecognized characters: `%%`");
}

#[test]
fn unknown_relation_kind() {
    let res = expect_invalid("scan relation r {\n}\n");
    let diag = res.iter().next().unwrap();

    assert_eq!(diag.kind(), DiagnosticKind::UnknownRelationKind);
    assert_eq!(u32::from(diag.range().start()), 0);
    assert_eq!(u32::from(diag.range().end()), 4);
    assert_eq!(diag.message(), "`scan` is not a relation kind");
}

#[test]
fn unknown_source_kind() {
    let res = expect_invalid("source parquet_files t {\n}\n");
    let diag = res.iter().next().unwrap();

    assert_eq!(diag.kind(), DiagnosticKind::UnknownSourceKind);
    assert_eq!(diag.message(), "`parquet_files` is not a source kind");
    assert!(res.render_plain().contains("hint: kinds are named_table"));
}

#[test]
fn unclosed_argument_list() {
    assert_eq!(
        kinds("filter relation f {\n  filter eq(a, b;\n}\n"),
        vec![DiagnosticKind::UnclosedParen]
    );
}

#[test]
fn unclosed_relation_stops_at_next_header() {
    let source = "read relation a {\n  base_schema s;\nfilter relation b {\n  input a;\n}\n";

    assert_eq!(kinds(source), vec![DiagnosticKind::UnclosedBlock]);

    let (parsed, _) = parse(source).unwrap();
    assert_eq!(parsed.root().decls().count(), 2);
}

#[test]
fn reports_every_error_in_one_run() {
    let source = indoc::indoc! {r#"
    schema s {
      a i64;
    }
    bogus relation r {
    }
    read relation q {
      frobnicate 1;
    }
    "#};

    assert_eq!(
        kinds(source),
        vec![
            DiagnosticKind::UnknownRelationKind,
            DiagnosticKind::UnknownProperty
        ]
    );
}

#[test]
fn recursion_fuel_is_fatal() {
    let source = "filter relation f {\n  filter ((((((x))))));\n}\n";

    let err = parse_with_fuel(source, None, Some(4)).unwrap_err();

    assert!(matches!(err, Error::RecursionLimitExceeded));
}

#[test]
fn exec_fuel_is_fatal() {
    let err = parse_with_fuel("schema s { a i64; }", Some(3), None).unwrap_err();

    assert!(matches!(err, Error::ExecFuelExhausted));
}

#[test]
fn generous_fuel_parses() {
    let (_, diagnostics) = parse_with_fuel("schema s { a i64; }", Some(100), Some(16)).unwrap();

    assert!(diagnostics.is_empty());
}
