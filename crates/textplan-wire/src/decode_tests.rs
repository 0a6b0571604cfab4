use textplan_core::depth::rel_depth;
use textplan_core::derive::output_columns;
use textplan_core::{
    ComparisonOp, DEFAULT_MAX_DEPTH, Expr, Literal, LiteralValue, Plan, ReductionOp, Rel, RelKind,
    SchemaDecl, SchemaError, SetOp, SetPredicateOp, SetRel, Subquery, Type, TypeError, TypeKind,
};

use crate::decode::{decode_body, read_layout};
use crate::test_utils::{
    field, filter_chain, int_literal, orders_plan, read, reseal, root_condition,
};
use crate::{DecodeError, DecodeErrorKind, Decoder, EncodeError, Encoder, decode, encode};

fn decode_err(bytes: &[u8]) -> DecodeErrorKind {
    decode(bytes).unwrap_err().kind
}

/// Body offset of the first root's tag byte.
fn first_root_offset(bytes: &[u8]) -> usize {
    let layout = read_layout(bytes).unwrap();
    decode_body(&layout, DEFAULT_MAX_DEPTH, true).unwrap().nodes[0].offset
}

#[test]
fn roundtrip_preserves_plan() {
    let plan = orders_plan();
    let decoded = decode(&encode(&plan).unwrap()).unwrap();
    assert_eq!(decoded, plan);
}

#[test]
fn roundtrip_empty_plan() {
    let decoded = decode(&encode(&Plan::new()).unwrap()).unwrap();
    assert_eq!(decoded, Plan::new());
}

#[test]
fn truncated_header() {
    let bytes = encode(&orders_plan()).unwrap();
    let err = decode(&bytes[..10]).unwrap_err();
    assert_eq!(err, DecodeError::new(DecodeErrorKind::Truncated, 10));
}

#[test]
fn bad_magic() {
    let mut bytes = encode(&orders_plan()).unwrap();
    bytes[0] = b'X';
    assert_eq!(decode_err(&bytes), DecodeErrorKind::BadMagic);
}

#[test]
fn unsupported_version() {
    let mut bytes = encode(&orders_plan()).unwrap();
    bytes[4..8].copy_from_slice(&9u32.to_le_bytes());
    assert_eq!(decode_err(&bytes), DecodeErrorKind::UnsupportedVersion(9));
}

#[test]
fn size_mismatch() {
    let mut bytes = encode(&orders_plan()).unwrap();
    let len = bytes.len();
    bytes.push(0);
    assert_eq!(
        decode_err(&bytes),
        DecodeErrorKind::SizeMismatch {
            header: len as u32,
            actual: len + 1,
        }
    );
}

#[test]
fn corrupted_body_fails_checksum() {
    let mut bytes = encode(&orders_plan()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;

    let err = decode(&bytes).unwrap_err();
    assert_eq!(err.offset, 8);
    assert!(matches!(err.kind, DecodeErrorKind::ChecksumMismatch { .. }));
}

#[test]
fn trailing_bytes_after_body() {
    let mut bytes = encode(&orders_plan()).unwrap();
    bytes.push(0);
    reseal(&mut bytes);

    let err = decode(&bytes).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::TrailingBytes);
    assert_eq!(err.offset, bytes.len() - 1);
}

#[test]
fn truncated_body() {
    let mut bytes = encode(&orders_plan()).unwrap();
    bytes.pop();
    reseal(&mut bytes);
    assert_eq!(decode_err(&bytes), DecodeErrorKind::Truncated);
}

#[test]
fn unknown_relation_tag() {
    let mut bytes = encode(&orders_plan()).unwrap();
    let at = first_root_offset(&bytes);
    bytes[at] = 99;
    reseal(&mut bytes);

    let err = decode(&bytes).unwrap_err();
    assert_eq!(
        err,
        DecodeError::new(
            DecodeErrorKind::UnknownTag {
                what: "relation",
                tag: 99,
            },
            at,
        )
    );
}

#[test]
fn absent_relation_is_rejected() {
    let mut bytes = encode(&orders_plan()).unwrap();
    let at = first_root_offset(&bytes);
    bytes[at] = 0;
    reseal(&mut bytes);
    assert_eq!(
        decode_err(&bytes),
        DecodeErrorKind::MissingRequired("relation")
    );
}

#[test]
fn string_id_out_of_range() {
    let mut bytes = encode(&orders_plan()).unwrap();
    // the root's name id follows its tag byte
    let at = first_root_offset(&bytes) + 1;
    bytes[at..at + 4].copy_from_slice(&500u32.to_le_bytes());
    reseal(&mut bytes);

    let err = decode(&bytes).unwrap_err();
    assert_eq!(err, DecodeError::new(DecodeErrorKind::StringOutOfRange(500), at));
}

#[test]
fn field_reference_out_of_range() {
    let mut plan = orders_plan();
    *root_condition(&mut plan) = Expr::field(7);
    let bytes = encode(&plan).unwrap();

    assert_eq!(
        decode_err(&bytes),
        DecodeErrorKind::Schema(SchemaError::FieldOutOfRange { index: 7, len: 3 })
    );
}

#[test]
fn literal_must_match_its_type() {
    let mut plan = orders_plan();
    *root_condition(&mut plan) = Expr::Literal(Literal {
        value: LiteralValue::Integer(1),
        ty: Type::new(TypeKind::String),
    });
    let bytes = encode(&plan).unwrap();

    assert_eq!(
        decode_err(&bytes),
        DecodeErrorKind::Type(TypeError::LiteralMismatch {
            literal: "integer",
            ty: "string".into(),
        })
    );
}

#[test]
fn set_inputs_must_agree_on_arity() {
    let mut plan = orders_plan();
    plan.schemas.push(SchemaDecl {
        name: Some("ids".into()),
        fields: vec![field("id", Type::new(TypeKind::I64))],
    });
    plan.roots = vec![Rel::new(
        None,
        RelKind::Set(SetRel {
            inputs: vec![read("a", 0), read("b", 1)],
            op: SetOp::UnionAll,
        }),
    )];
    let bytes = encode(&plan).unwrap();

    assert_eq!(
        decode_err(&bytes),
        DecodeErrorKind::Schema(SchemaError::SetArity {
            input: 1,
            expected: 3,
            found: 1,
        })
    );
}

#[test]
fn root_names_must_match_columns() {
    let mut plan = orders_plan();
    plan.root_names = vec!["a".into(), "b".into()];
    let bytes = encode(&plan).unwrap();

    assert_eq!(
        decode_err(&bytes),
        DecodeErrorKind::RootNames {
            names: 2,
            columns: 3,
        }
    );

    plan.root_names.push("c".into());
    let decoded = decode(&encode(&plan).unwrap()).unwrap();
    assert_eq!(decoded.root_names, ["a", "b", "c"]);
}

#[test]
fn depth_limit() {
    let bytes = encode(&orders_plan()).unwrap();

    let err = Decoder::new().with_max_depth(1).decode(&bytes).unwrap_err();
    assert_eq!(err.kind, DecodeErrorKind::TooDeep(1));

    assert!(Decoder::new().with_max_depth(8).decode(&bytes).is_ok());
}

fn chain_plan(len: usize) -> Plan {
    let mut plan = orders_plan();
    plan.roots = vec![filter_chain(len)];
    plan
}

#[test]
fn chains_up_to_the_limit_decode() {
    // 255 filters and the read make 256 levels.
    let plan = chain_plan(255);
    let decoded = decode(&encode(&plan).unwrap()).unwrap();
    assert_eq!(rel_depth(&decoded.roots[0]), DEFAULT_MAX_DEPTH);
}

#[test]
fn chains_over_the_limit_fail_on_both_sides() {
    let plan = chain_plan(256);
    assert!(matches!(encode(&plan), Err(EncodeError::TooDeep(_))));

    let bytes = Encoder::new().with_max_depth(300).encode(&plan).unwrap();
    assert_eq!(decode_err(&bytes), DecodeErrorKind::TooDeep(DEFAULT_MAX_DEPTH));
}

#[test]
fn long_chains_decode_without_native_recursion() {
    let plan = chain_plan(2_000);
    let bytes = Encoder::new().with_max_depth(u32::MAX).encode(&plan).unwrap();
    let decoded = Decoder::new().with_max_depth(u32::MAX).decode(&bytes).unwrap();
    assert_eq!(rel_depth(&decoded.roots[0]), 2_001);
}

#[test]
fn emit_and_best_effort_filter_roundtrip() {
    let mut plan = orders_plan();
    let RelKind::Filter(filter) = &mut plan.roots[0].kind else {
        panic!("expected a filter root");
    };
    let RelKind::Read(read) = &mut filter.input.kind else {
        panic!("expected a read input");
    };
    read.best_effort_filter = Some(Expr::field(2));
    plan.roots[0].emit = Some(vec![2, 0]);

    let decoded = decode(&encode(&plan).unwrap()).unwrap();
    assert_eq!(decoded, plan);
    let columns = output_columns(&decoded.roots[0], &decoded.schemas).unwrap();
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["region", "id"]);
}

#[test]
fn emit_out_of_range_is_rejected() {
    let mut plan = orders_plan();
    plan.roots[0].emit = Some(vec![3]);
    let bytes = encode(&plan).unwrap();
    assert_eq!(
        decode_err(&bytes),
        DecodeErrorKind::Schema(SchemaError::EmitOutOfRange { index: 3, len: 3 })
    );
}

#[test]
fn subquery_forms_roundtrip() {
    let mut plan = orders_plan();
    let ids = || {
        Box::new(Rel::new(
            Some("ids".into()),
            RelKind::Project(textplan_core::ProjectRel {
                input: Box::new(read("inner", 0)),
                expressions: vec![textplan_core::NamedExpr {
                    expr: Expr::field(0),
                    name: None,
                }],
            }),
        ))
    };
    let forms = [
        Subquery::InPredicate {
            needles: vec![Expr::field(0)],
            haystack: ids(),
        },
        Subquery::SetPredicate {
            op: SetPredicateOp::Unique,
            rel: Box::new(read("any", 0)),
        },
        Subquery::SetComparison {
            left: Box::new(int_literal(5)),
            comparison: ComparisonOp::Ge,
            reduction: ReductionOp::Any,
            right: ids(),
        },
        Subquery::Scalar(ids()),
    ];
    for subquery in forms {
        *root_condition(&mut plan) = Expr::Subquery(subquery);
        let decoded = decode(&encode(&plan).unwrap()).unwrap();
        assert_eq!(decoded, plan);
    }
}

#[test]
fn in_predicate_arity_is_checked() {
    let mut plan = orders_plan();
    *root_condition(&mut plan) = Expr::Subquery(Subquery::InPredicate {
        needles: vec![Expr::field(0)],
        haystack: Box::new(read("all", 0)),
    });
    let bytes = encode(&plan).unwrap();
    assert_eq!(
        decode_err(&bytes),
        DecodeErrorKind::Schema(SchemaError::InPredicateArity {
            needles: 1,
            columns: 3
        })
    );
}

#[test]
fn composite_literals_roundtrip() {
    let mut plan = orders_plan();
    let ty = Type::new(TypeKind::Map(
        Box::new(Type::new(TypeKind::String)),
        Box::new(Type::new(TypeKind::Struct(vec![
            Type::new(TypeKind::I32),
            Type::nullable(TypeKind::Boolean),
        ]))),
    ));
    let value = LiteralValue::Map(vec![(
        LiteralValue::String("k".into()),
        LiteralValue::Struct(vec![LiteralValue::Integer(1), LiteralValue::Null]),
    )]);
    *root_condition(&mut plan) = Expr::Literal(Literal { value, ty });

    let decoded = decode(&encode(&plan).unwrap()).unwrap();
    assert_eq!(decoded, plan);
}

#[test]
fn decoded_columns_are_qualified() {
    let plan = decode(&encode(&orders_plan()).unwrap()).unwrap();
    let columns = output_columns(&plan.roots[0], &plan.schemas).unwrap();
    let names: Vec<_> = columns
        .iter()
        .map(|c| format!("{}.{}", c.qualifier.as_deref().unwrap_or("_"), c.name))
        .collect();
    assert_eq!(names, ["o.id", "o.amount", "o.region"]);
}

#[test]
fn error_display_includes_offset() {
    let err = DecodeError::new(DecodeErrorKind::TrailingBytes, 120);
    insta::assert_snapshot!(err, @"trailing bytes after the plan body at byte 120");
}
