use indoc::indoc;
use textplan_core::{
    ComparisonOp, DepthError, Expr, FieldRef, JoinType, LiteralValue, Plan, ReductionOp, RelKind,
    RelTag, SchemaError, SetOp, SetPredicateOp, SortDirection, SourceKind, Subquery, TypeKind,
    derive,
};

use crate::analyze::resolve_names;
use crate::build::{BuildErrorKind, BuildResult, build, build_with_max_depth};
use crate::diagnostics::Diagnostics;
use crate::parser::parse;

const PRELUDE: &str = indoc! {r#"
    extension_space "urn:functions" {
      function equal:any_any;
      function add:i64_i64;
      function sum:i64;
    }
    schema orders { id i64; customer i64; amount i64; }
    schema customers { id i64; name string; }
    source named_table orders_t { names = ["orders"]; }
    source named_table customers_t { names = ["customers"]; }
    read relation o { base_schema orders; source orders_t; }
    read relation c { base_schema customers; source customers_t; }
"#};

fn try_build(body: &str) -> BuildResult<Plan> {
    try_build_with_max_depth(body, textplan_core::DEFAULT_MAX_DEPTH)
}

fn try_build_with_max_depth(body: &str, max_depth: u32) -> BuildResult<Plan> {
    let source = format!("{PRELUDE}{body}");
    let (parsed, diagnostics) = parse(&source).unwrap();
    assert!(diagnostics.is_empty(), "{}", diagnostics.render_plain());
    let mut diagnostics = Diagnostics::new();
    let table = resolve_names(&parsed.root(), &mut diagnostics);
    assert!(diagnostics.is_empty(), "{}", diagnostics.render_plain());
    build_with_max_depth(&table, max_depth)
}

fn build_ok(body: &str) -> Plan {
    match try_build(body) {
        Ok(plan) => plan,
        Err(err) => panic!("build failed: {err}"),
    }
}

fn build_err(body: &str) -> BuildErrorKind {
    match try_build(body) {
        Ok(_) => panic!("expected a build error"),
        Err(err) => err.kind,
    }
}

#[test]
fn simple_read() {
    let input = indoc! {r#"
    schema simple_schema { id i32; name string; }
    source named_table simple_source { names = ["test_table"]; }
    read relation data { base_schema simple_schema; source simple_source; }
    "#};

    let (parsed, _) = parse(input).unwrap();
    let mut diagnostics = Diagnostics::new();
    let table = resolve_names(&parsed.root(), &mut diagnostics);
    let plan = build(&table).unwrap();

    assert_eq!(plan.roots.len(), 1);
    assert_eq!(plan.roots[0].name.as_deref(), Some("data"));
    let RelKind::Read(read) = &plan.roots[0].kind else {
        panic!("expected a read");
    };
    assert_eq!((read.schema, read.source), (0, 0));
    assert_eq!(
        plan.sources[0].kind,
        SourceKind::NamedTable {
            names: vec!["test_table".to_owned()]
        }
    );
    assert!(plan.extensions.is_empty());
}

#[test]
fn unconsumed_relations_become_roots() {
    let plan = build_ok("filter relation keep { input o; filter true; }\n");

    let names: Vec<_> = plan.roots.iter().map(|r| r.name.as_deref()).collect();
    assert_eq!(names, vec![Some("c"), Some("keep")]);
}

#[test]
fn pipeline_root_selects_roots() {
    let input = indoc! {r#"
    filter relation keep { filter true; }
    pipelines {
      o -> keep -> root;
    }
    "#};

    let plan = build_ok(input);

    assert_eq!(plan.roots.len(), 1);
    assert_eq!(plan.roots[0].tag(), RelTag::Filter);
    assert_eq!(plan.roots[0].inputs()[0].name.as_deref(), Some("o"));
}

#[test]
fn column_names_resolve_positionally() {
    let input = indoc! {r#"
    project relation p {
      input o;
      expression amount;
      expression add(o.id, $1) -> i64 named total;
    }
    "#};

    let plan = build_ok(input);
    let root = plan.roots.iter().find(|r| r.name.as_deref() == Some("p")).unwrap();
    let RelKind::Project(project) = &root.kind else {
        panic!("expected a project");
    };

    assert_eq!(project.expressions[0].expr, Expr::field(2));
    let Expr::Function(call) = &project.expressions[1].expr else {
        panic!("expected a call");
    };
    assert_eq!(call.args, vec![Expr::field(0), Expr::field(1)]);
    assert_eq!(project.expressions[1].name.as_deref(), Some("total"));

    let columns = derive::output_columns(root, &plan.schemas).unwrap();
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["amount", "total"]);
}

#[test]
fn join_scope_and_ambiguity() {
    let input = indoc! {r#"
    join relation j {
      input o;
      input c;
      type left;
      expression equal(o.customer, c.id);
      filter name;
    }
    "#};

    let plan = build_ok(input);
    let root = plan.roots.iter().find(|r| r.name.as_deref() == Some("j")).unwrap();
    let RelKind::Join(join) = &root.kind else {
        panic!("expected a join");
    };
    assert_eq!(join.join_type, JoinType::Left);
    let Expr::Function(call) = &join.condition else {
        panic!("expected a call");
    };
    assert_eq!(call.args, vec![Expr::field(1), Expr::field(3)]);
    assert_eq!(join.post_filter, Some(Expr::field(4)));

    let ambiguous = build_err("join relation j { input o; input c; expression equal(id, id); }\n");
    assert_eq!(ambiguous, BuildErrorKind::AmbiguousColumn("id".to_owned()));
}

#[test]
fn join_type_accepts_long_prefix() {
    let plan = build_ok(
        "join relation j { input o; input c; type JOIN_TYPE_LEFT_ANTI; expression true; }\n",
    );
    let RelKind::Join(join) = &plan.roots[0].kind else {
        panic!("expected a join");
    };
    assert_eq!(join.join_type, JoinType::LeftAnti);
}

#[test]
fn unknown_column() {
    let err = build_err("filter relation f { input o; filter missing; }\n");

    assert_eq!(err, BuildErrorKind::UnknownColumn("missing".to_owned()));
}

#[test]
fn consumer_copies_shared_input() {
    let input = indoc! {r#"
    cross relation x { input o; input o; }
    "#};

    let plan = build_ok(input);
    let root = plan.roots.iter().find(|r| r.name.as_deref() == Some("x")).unwrap();

    let inputs = root.inputs();
    assert_eq!(inputs[0], inputs[1]);
    assert_eq!(root.node_count(), 3);
}

#[test]
fn cycle_is_reported_before_building() {
    let input = indoc! {r#"
    filter relation a { input b; filter true; }
    filter relation b { input a; filter true; }
    "#};

    let err = try_build(input).unwrap_err();

    assert_eq!(
        err.kind,
        BuildErrorKind::Cycle {
            relations: vec!["a".to_owned(), "b".to_owned(), "a".to_owned()]
        }
    );
    assert!(err.range.is_some());
    insta::assert_snapshot!(err.to_string(), @"relations form a cycle: a -> b -> a");
}

#[test]
fn input_arity_is_checked() {
    let err = try_build("filter relation f { filter true; }\n").unwrap_err();

    assert_eq!(err.relation.as_deref(), Some("f"));
    insta::assert_snapshot!(err.to_string(), @"relation `f`: `filter` takes 1 input(s), found 0");
}

#[test]
fn property_checks() {
    assert_eq!(
        build_err("filter relation f { input o; }\n"),
        BuildErrorKind::MissingProperty {
            property: "filter",
            kind: "filter"
        }
    );
    assert_eq!(
        build_err("filter relation f { input o; filter true; filter false; }\n"),
        BuildErrorKind::DuplicateProperty("filter".to_owned())
    );
    assert_eq!(
        build_err("filter relation f { input o; filter true; offset 3; }\n"),
        BuildErrorKind::UnexpectedProperty {
            property: "offset".to_owned(),
            kind: "filter"
        }
    );
    assert_eq!(
        build_err("set relation s { input o; input o; }\n"),
        BuildErrorKind::MissingProperty {
            property: "type",
            kind: "set"
        }
    );
}

#[test]
fn fetch_defaults_and_bounds() {
    let plan = build_ok("fetch relation f { input o; offset 5; }\n");
    let root = plan.roots.iter().find(|r| r.tag() == RelTag::Fetch).unwrap();
    let RelKind::Fetch(fetch) = &root.kind else {
        panic!("expected a fetch");
    };
    assert_eq!((fetch.offset, fetch.count), (5, -1));

    assert_eq!(
        build_err("fetch relation f { input o; count -2; }\n"),
        BuildErrorKind::InvalidFetch {
            offset: 0,
            count: -2
        }
    );
}

#[test]
fn aggregate_measures() {
    let input = indoc! {r#"
    aggregate relation totals {
      input o;
      grouping customer;
      measure {
        measure sum(amount) -> i64? @ AGGREGATION_PHASE_INITIAL_TO_INTERMEDIATE named total;
        invocation distinct;
        filter true;
      }
    }
    "#};

    let plan = build_ok(input);
    let root = plan.roots.iter().find(|r| r.tag() == RelTag::Aggregate).unwrap();
    let RelKind::Aggregate(agg) = &root.kind else {
        panic!("expected an aggregate");
    };

    let measure = &agg.measures[0];
    assert_eq!(measure.args, vec![Expr::field(2)]);
    assert!(measure.output.nullable);
    assert_eq!(measure.phase.name(), "initial_to_intermediate");
    assert_eq!(measure.invocation.name(), "distinct");
    assert!(measure.filter.is_some());

    let columns = derive::output_columns(root, &plan.schemas).unwrap();
    let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["customer", "total"]);
}

#[test]
fn sort_and_set() {
    let input = indoc! {r#"
    sort relation s { input o; sort amount by desc_nulls_first; sort id; }
    set relation u { input o; input o; type union_all; }
    "#};

    let plan = build_ok(input);

    let sort = plan.roots.iter().find(|r| r.tag() == RelTag::Sort).unwrap();
    let RelKind::Sort(sort) = &sort.kind else {
        panic!("expected a sort");
    };
    let directions: Vec<_> = sort.fields.iter().map(|f| f.direction).collect();
    assert_eq!(
        directions,
        vec![SortDirection::DescNullsFirst, SortDirection::AscNullsLast]
    );

    let set = plan.roots.iter().find(|r| r.tag() == RelTag::Set).unwrap();
    let RelKind::Set(set) = &set.kind else {
        panic!("expected a set");
    };
    assert_eq!(set.op, SetOp::UnionAll);
    assert_eq!(set.inputs.len(), 2);
}

#[test]
fn subquery_is_embedded() {
    let input = indoc! {r#"
    project relation one { input c; expression name; }
    filter relation f { input o; filter equal(customer, subquery one); }
    "#};

    let plan = build_ok(input);

    let names: Vec<_> = plan.roots.iter().map(|r| r.name.as_deref()).collect();
    assert_eq!(names, vec![Some("f")]);
    assert_eq!(plan.roots[0].subqueries()[0].name.as_deref(), Some("one"));
}

#[test]
fn anchors_follow_first_use() {
    let input = indoc! {r#"
    project relation p {
      input o;
      expression add(id, amount) -> i64;
      expression equal(id, customer);
    }
    "#};

    let plan = build_ok(input);

    let functions: Vec<_> = plan
        .extensions
        .functions()
        .map(|(anchor, f)| (anchor.get(), f.name.as_str()))
        .collect();
    assert_eq!(functions, vec![(1, "add:i64_i64"), (2, "equal:any_any")]);
    assert_eq!(plan.extensions.uri_count(), 1);
}

#[test]
fn typed_literals() {
    let input = indoc! {r#"
    project relation p {
      input o;
      expression 1.25::decimal<5, 2>;
      expression null::string;
      expression 7::fp32;
      expression "x"::varchar<3>;
    }
    "#};

    let plan = build_ok(input);
    let root = plan.roots.iter().find(|r| r.tag() == RelTag::Project).unwrap();
    let RelKind::Project(project) = &root.kind else {
        panic!("expected a project");
    };
    let literals: Vec<_> = project
        .expressions
        .iter()
        .map(|e| match &e.expr {
            Expr::Literal(lit) => (lit.value.clone(), lit.ty.nullable),
            other => panic!("expected a literal, got {other:?}"),
        })
        .collect();
    assert_eq!(
        literals,
        vec![
            (LiteralValue::Decimal(125), false),
            (LiteralValue::Null, true),
            (LiteralValue::Float(7.0), false),
            (LiteralValue::String("x".to_owned()), false),
        ]
    );
}

#[test]
fn literal_type_mismatch() {
    let err = build_err("project relation p { input o; expression 1.5::i32; }\n");

    assert!(matches!(err, BuildErrorKind::Type(_)), "{err:?}");
}

#[test]
fn nested_field_path() {
    let input = indoc! {r#"
    schema nested { s struct<i32, struct<string, boolean>>; }
    read relation n { base_schema nested; source orders_t; }
    project relation p { input n; expression s[1][0]; }
    "#};

    let plan = build_ok(input);
    let root = plan.roots.iter().find(|r| r.tag() == RelTag::Project).unwrap();
    let RelKind::Project(project) = &root.kind else {
        panic!("expected a project");
    };
    assert_eq!(
        project.expressions[0].expr,
        Expr::Field(FieldRef {
            index: 0,
            path: vec![1, 0]
        })
    );
    let columns = derive::output_columns(root, &plan.schemas).unwrap();
    assert_eq!(columns[0].ty.kind, TypeKind::String);

    let err = build_err("project relation p { input o; expression id[0]; }\n");
    assert!(matches!(err, BuildErrorKind::Schema(_)), "{err:?}");
}

#[test]
fn local_files_source() {
    let input = indoc! {r#"
    source local_files files {
      items = [
        { uri_file: "/data/a.parquet", start: 0, length: 100, format: parquet },
        { uri_folder: "/data/more" },
      ];
    }
    "#};

    let plan = build_ok(input);
    let SourceKind::LocalFiles { items } = &plan.sources[2].kind else {
        panic!("expected local files");
    };
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].path, "/data/a.parquet");
    assert_eq!(items[0].length, Some(100));
    assert_eq!(items[1].path_kind.name(), "uri_folder");
    assert_eq!(items[1].format, None);
}

#[test]
fn root_names_must_match_columns() {
    let input = indoc! {r#"
    pipelines { c -> root; }
    root { names = [a]; }
    "#};

    assert_eq!(
        build_err(input),
        BuildErrorKind::RootNames {
            names: 1,
            columns: 2
        }
    );

    let plan = build_ok("pipelines { c -> root; }\nroot { names = [a, b]; }\n");
    assert_eq!(plan.root_names, vec!["a", "b"]);
}

/// Filter condition of the root named `name`.
fn condition<'p>(plan: &'p Plan, name: &str) -> &'p Expr {
    let rel = plan
        .roots
        .iter()
        .find(|r| r.name.as_deref() == Some(name))
        .unwrap();
    let RelKind::Filter(filter) = &rel.kind else {
        panic!("expected a filter");
    };
    &filter.condition
}

const IDS: &str = indoc! {r#"
    read relation ids { base_schema customers; source customers_t; emit id; }
"#};

#[test]
fn read_filters_and_emit() {
    let input = indoc! {r#"
    read relation r {
      base_schema orders;
      source orders_t;
      filter true;
      best effort filter equal(amount, 1);
      emit amount;
      emit id;
    }
    "#};

    let plan = build_ok(input);
    let rel = plan.roots.iter().find(|r| r.name.as_deref() == Some("r")).unwrap();
    let RelKind::Read(read) = &rel.kind else {
        panic!("expected a read");
    };
    assert!(read.filter.is_some());
    assert!(matches!(read.best_effort_filter, Some(Expr::Function(_))));
    assert_eq!(rel.emit, Some(vec![2, 0]));
}

#[test]
fn filter_behavior_checks() {
    let err = build_err("read relation r { base_schema orders; source orders_t; post_join filter true; }\n");
    assert_eq!(err, BuildErrorKind::UnknownFilterBehavior("post_join".to_owned()));

    let err = build_err("filter relation f { input o; best_effort filter true; }\n");
    assert!(
        matches!(&err, BuildErrorKind::UnexpectedProperty { property, .. } if property == "best_effort filter"),
        "{err:?}"
    );
}

#[test]
fn emit_names_own_columns() {
    let plan = build_ok("project relation p { input o; expression add(id, amount) -> i64; emit $3; }\n");
    let p = plan.roots.iter().find(|r| r.name.as_deref() == Some("p")).unwrap();
    assert_eq!(p.emit, Some(vec![3]));

    let err = build_err("project relation p { input o; emit add(id, amount) -> i64; }\n");
    assert_eq!(err, BuildErrorKind::EmitColumn);

    let err = build_err("filter relation f { input o; filter true; emit nope; }\n");
    assert_eq!(err, BuildErrorKind::UnknownColumn("nope".to_owned()));
}

#[test]
fn subquery_forms_lower() {
    let input = format!(
        "{IDS}{}",
        indoc! {r#"
        filter relation within { input o; filter (customer) in subquery ids; }
        filter relation any_match { input o; filter customer EQ any subquery ids; }
        filter relation present { input o; filter exists in subquery ids; }
        "#}
    );

    let plan = build_ok(&input);

    let Expr::Subquery(Subquery::InPredicate { needles, haystack }) = condition(&plan, "within")
    else {
        panic!("expected an in-predicate");
    };
    assert_eq!(needles, &vec![Expr::field(1)]);
    assert_eq!(haystack.name.as_deref(), Some("ids"));

    let Expr::Subquery(Subquery::SetComparison {
        left,
        comparison,
        reduction,
        ..
    }) = condition(&plan, "any_match")
    else {
        panic!("expected a set comparison");
    };
    assert_eq!(**left, Expr::field(1));
    assert_eq!((*comparison, *reduction), (ComparisonOp::Eq, ReductionOp::Any));

    assert!(matches!(
        condition(&plan, "present"),
        Expr::Subquery(Subquery::SetPredicate {
            op: SetPredicateOp::Exists,
            ..
        })
    ));
}

#[test]
fn subquery_needles_match_haystack_columns() {
    let err = build_err(&format!(
        "{IDS}filter relation f {{ input o; filter (id, customer) in subquery ids; }}\n"
    ));
    assert_eq!(
        err,
        BuildErrorKind::Schema(SchemaError::InPredicateArity {
            needles: 2,
            columns: 1
        })
    );

    let err = build_err("project relation p { input o; expression (id, amount); }\n");
    assert_eq!(err, BuildErrorKind::ExprList);
}

#[test]
fn composite_literals() {
    let input = indoc! {r#"
    project relation p {
      input o;
      expression {1, "x"}_struct<i64, string>;
      expression {"a": 1_i32, "b": 2};
      expression {}_map<string, i64>;
    }
    "#};

    let plan = build_ok(input);
    let root = plan.roots.iter().find(|r| r.tag() == RelTag::Project).unwrap();
    let RelKind::Project(project) = &root.kind else {
        panic!("expected a project");
    };
    let literals: Vec<_> = project
        .expressions
        .iter()
        .map(|e| match &e.expr {
            Expr::Literal(lit) => lit,
            other => panic!("expected a literal, got {other:?}"),
        })
        .collect();

    assert_eq!(
        literals[0].value,
        LiteralValue::Struct(vec![
            LiteralValue::Integer(1),
            LiteralValue::String("x".to_owned())
        ])
    );
    let TypeKind::Map(key, value) = &literals[1].ty.kind else {
        panic!("expected a map type, got {:?}", literals[1].ty);
    };
    assert_eq!((&key.kind, &value.kind), (&TypeKind::String, &TypeKind::I32));
    assert_eq!(literals[2].value, LiteralValue::Map(Vec::new()));
}

#[test]
fn composite_literal_errors() {
    let err = build_err("project relation p { input o; expression {}; }\n");
    assert_eq!(err, BuildErrorKind::UntypedComposite);

    let err = build_err("project relation p { input o; expression {1: 2, 3}; }\n");
    assert_eq!(err, BuildErrorKind::MixedComposite);
}

#[test]
fn relations_past_the_depth_limit_are_refused() {
    let body = "filter relation f { input o; filter true; }\n";
    assert!(try_build_with_max_depth(body, 3).is_ok());

    let err = try_build_with_max_depth(body, 2).unwrap_err();
    assert_eq!(err.kind, BuildErrorKind::TooDeep(DepthError { limit: 2 }));
    assert!(err.range.is_some());
}
