//! Plan fixtures and buffer surgery for wire tests.

use textplan_core::{
    Expr, FilterRel, FunctionCall, Literal, LiteralValue, Plan, ReadRel, Rel, RelKind, SchemaDecl,
    SchemaField, SourceDecl, SourceKind, Type, TypeKind,
};

use crate::header::{HEADER_SIZE, Header};

/// `big = filter(o = read(orders), gt($0, 10))` over a three-column schema.
pub fn orders_plan() -> Plan {
    let mut plan = Plan::new();
    let gt = plan.extensions.register_function("urn:cmp", "gt:any_any");
    plan.schemas.push(SchemaDecl {
        name: Some("orders".into()),
        fields: vec![
            field("id", Type::new(TypeKind::I64)),
            field(
                "amount",
                Type::nullable(TypeKind::Decimal {
                    precision: 10,
                    scale: 2,
                }),
            ),
            field("region", Type::new(TypeKind::String)),
        ],
    });
    plan.sources.push(SourceDecl {
        name: Some("orders_table".into()),
        kind: SourceKind::NamedTable {
            names: vec!["sales".into(), "orders".into()],
        },
    });

    let condition = Expr::Function(FunctionCall {
        anchor: gt,
        args: vec![Expr::field(0), int_literal(10)],
        output: Type::boolean(),
    });
    plan.roots.push(Rel::new(
        Some("big".into()),
        RelKind::Filter(FilterRel {
            input: Box::new(read("o", 0)),
            condition,
        }),
    ));
    plan
}

pub fn field(name: &str, ty: Type) -> SchemaField {
    SchemaField {
        name: name.into(),
        ty,
    }
}

pub fn read(name: &str, schema: u32) -> Rel {
    Rel::new(
        Some(name.into()),
        RelKind::Read(ReadRel {
            schema,
            source: 0,
            filter: None,
            best_effort_filter: None,
        }),
    )
}

pub fn int_literal(value: i64) -> Expr {
    Expr::Literal(Literal {
        value: LiteralValue::Integer(value),
        ty: Type::new(TypeKind::I64),
    })
}

/// `len` filters stacked on `read(o, 0)`, each testing the first column.
pub fn filter_chain(len: usize) -> Rel {
    (0..len).fold(read("o", 0), |input, _| {
        Rel::new(
            None,
            RelKind::Filter(FilterRel {
                input: Box::new(input),
                condition: Expr::field(0),
            }),
        )
    })
}

/// The filter condition of the first root.
pub fn root_condition(plan: &mut Plan) -> &mut Expr {
    match &mut plan.roots[0].kind {
        RelKind::Filter(filter) => &mut filter.condition,
        other => panic!("expected a filter root, got {other:?}"),
    }
}

/// Rewrites sizes and checksum after the buffer was edited, so the decoder
/// gets past the integrity checks.
pub fn reseal(bytes: &mut [u8]) {
    let head: [u8; HEADER_SIZE] = bytes[..HEADER_SIZE].try_into().unwrap();
    let mut header = Header::from_bytes(&head);
    let body = header.compute_offsets().body as usize;
    header.body_size = (bytes.len() - body) as u32;
    header.total_size = bytes.len() as u32;
    header.checksum = crc32fast::hash(&bytes[HEADER_SIZE..]);
    bytes[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
}
