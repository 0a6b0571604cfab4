use crate::depth::{DepthError, check_rel, expr_depth, rel_depth, type_depth};
use crate::expr::{Cast, Expr, Literal, LiteralValue, Subquery};
use crate::plan::{Plan, SchemaDecl, SchemaField};
use crate::rel::{FilterRel, ReadRel, Rel, RelKind};
use crate::types::{Type, TypeKind};

fn read() -> Rel {
    Rel::new(
        None,
        RelKind::Read(ReadRel {
            schema: 0,
            source: 0,
            filter: None,
            best_effort_filter: None,
        }),
    )
}

fn filter(input: Rel, condition: Expr) -> Rel {
    Rel::new(
        None,
        RelKind::Filter(FilterRel {
            input: Box::new(input),
            condition,
        }),
    )
}

fn chain(len: usize) -> Rel {
    (0..len).fold(read(), |rel, _| filter(rel, Expr::field(0)))
}

fn nested_list(levels: usize) -> Type {
    (0..levels).fold(Type::new(TypeKind::I64), |ty, _| {
        Type::new(TypeKind::List(Box::new(ty)))
    })
}

#[test]
fn relations_expressions_and_types_each_count() {
    assert_eq!(rel_depth(&read()), 1);
    // filter -> field, filter -> read
    assert_eq!(rel_depth(&chain(1)), 2);
    assert_eq!(type_depth(&nested_list(2)), 3);

    let cast = Expr::Cast(Cast {
        input: Box::new(Expr::field(0)),
        ty: nested_list(3),
    });
    assert_eq!(expr_depth(&cast), 5);
}

#[test]
fn subquery_relations_nest_under_their_expression() {
    let inner = chain(3);
    let rel = filter(read(), Expr::Subquery(Subquery::Scalar(Box::new(inner))));
    assert_eq!(rel_depth(&rel), 1 + 1 + 4);
}

#[test]
fn composite_values_count_below_their_literal() {
    let ty = Type::new(TypeKind::Struct(vec![Type::new(TypeKind::Struct(vec![Type::new(
        TypeKind::I64,
    )]))]));
    let lit = Expr::Literal(Literal {
        value: LiteralValue::Struct(vec![LiteralValue::Struct(vec![LiteralValue::Integer(1)])]),
        ty,
    });
    assert_eq!(expr_depth(&lit), 4);
}

#[test]
fn check_stops_at_the_limit() {
    assert_eq!(check_rel(&chain(9), 10), Ok(()));
    assert_eq!(check_rel(&chain(10), 10), Err(DepthError { limit: 10 }));
}

#[test]
fn very_long_chains_are_measured_without_recursion() {
    let rel = chain(100_000);
    assert_eq!(rel_depth(&rel), 100_001);
    assert!(check_rel(&rel, 256).is_err());
    // `Rel` drops recursively, so keep the tree alive past the test body.
    std::mem::forget(rel);
}

#[test]
fn plan_check_covers_schema_types() {
    let plan = Plan {
        schemas: vec![SchemaDecl {
            name: None,
            fields: vec![SchemaField {
                name: "deep".to_owned(),
                ty: nested_list(8),
            }],
        }],
        ..Plan::default()
    };
    assert_eq!(plan.check_depth(9), Ok(()));
    assert_eq!(plan.check_depth(8), Err(DepthError { limit: 8 }));
}
