use crate::expr::{Expr, FunctionCall};
use crate::extensions::ExtensionRegistry;
use crate::plan::{Plan, SchemaDecl, SchemaField, SourceDecl, SourceKind};
use crate::rel::{FilterRel, ProjectRel, NamedExpr, ReadRel, Rel, RelKind};
use crate::types::{Type, TypeKind};

fn read(name: &str) -> Rel {
    Rel::new(
        Some(name.to_owned()),
        RelKind::Read(ReadRel {
            schema: 0,
            source: 0,
            filter: None,
            best_effort_filter: None,
        }),
    )
}

fn call(anchor: crate::Anchor, args: Vec<Expr>) -> Expr {
    Expr::Function(FunctionCall {
        anchor,
        args,
        output: Type::boolean(),
    })
}

#[test]
fn canonicalize_follows_pre_order_and_drops_unused() {
    let mut registry = ExtensionRegistry::new();
    let unused = registry.register_function("urn:x", "unused");
    let inner = registry.register_function("urn:x", "inner");
    let outer = registry.register_function("urn:y", "outer");
    let point = registry.register_type("urn:geo", "point");
    assert_eq!(unused.get(), 1);

    let filter = Rel::new(
        None,
        RelKind::Filter(FilterRel {
            input: Box::new(read("r")),
            condition: call(inner, vec![Expr::field(0)]),
        }),
    );
    let project = Rel::new(
        None,
        RelKind::Project(ProjectRel {
            input: Box::new(filter),
            expressions: vec![NamedExpr {
                expr: call(outer, vec![call(inner, Vec::new())]),
                name: None,
            }],
        }),
    );

    let mut plan = Plan {
        extensions: registry,
        schemas: vec![SchemaDecl {
            name: Some("s".to_owned()),
            fields: vec![SchemaField {
                name: "p".to_owned(),
                ty: Type::new(TypeKind::UserDefined(point)),
            }],
        }],
        sources: vec![SourceDecl {
            name: None,
            kind: SourceKind::VirtualTable,
        }],
        roots: vec![project],
        root_names: Vec::new(),
    };
    plan.canonicalize_anchors().unwrap();

    let names: Vec<&str> = plan
        .extensions
        .functions()
        .map(|(_, f)| f.name.as_str())
        .collect();
    assert_eq!(names, ["outer", "inner"]);
    let uris: Vec<&str> = plan.extensions.uris().map(|(_, u)| u).collect();
    assert_eq!(uris, ["urn:geo", "urn:y", "urn:x"]);

    let RelKind::Project(project) = &plan.roots[0].kind else {
        panic!("expected project");
    };
    let Expr::Function(top) = &project.expressions[0].expr else {
        panic!("expected call");
    };
    assert_eq!(top.anchor.get(), 1);
}

#[test]
fn canonicalize_is_idempotent() {
    let mut registry = ExtensionRegistry::new();
    let f = registry.register_function("urn:x", "f");
    let mut plan = Plan {
        extensions: registry,
        schemas: vec![SchemaDecl {
            name: None,
            fields: Vec::new(),
        }],
        sources: Vec::new(),
        roots: vec![Rel::new(
            None,
            RelKind::Read(ReadRel {
                schema: 0,
                source: 0,
                filter: Some(call(f, Vec::new())),
                best_effort_filter: None,
            }),
        )],
        root_names: Vec::new(),
    };
    plan.canonicalize_anchors().unwrap();
    let once = plan.clone();
    plan.canonicalize_anchors().unwrap();
    assert_eq!(plan, once);
    assert_eq!(plan.relation_count(), 1);
}

#[test]
fn json_round_trip_keeps_emit_and_omits_absent_fields() {
    let plan = Plan {
        schemas: vec![SchemaDecl {
            name: Some("s".to_owned()),
            fields: vec![SchemaField {
                name: "a".to_owned(),
                ty: Type::new(TypeKind::I64),
            }],
        }],
        sources: vec![SourceDecl {
            name: None,
            kind: SourceKind::VirtualTable,
        }],
        roots: vec![read("r").with_emit(vec![0, 0])],
        ..Plan::default()
    };

    let text = serde_json::to_string(&plan).unwrap();
    assert!(text.contains(r#""emit":[0,0]"#));
    assert!(!text.contains("best_effort_filter"));

    let back: Plan = serde_json::from_str(&text).unwrap();
    assert_eq!(back, plan);
}
