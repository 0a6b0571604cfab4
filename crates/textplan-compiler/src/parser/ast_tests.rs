use indoc::indoc;

use super::ast::{CompositeItem, Decl, EntryValue, Expr, Property, Stage, SubqueryForm, TypeParam};
use super::parse;

fn decls(source: &str) -> Vec<Decl> {
    let (parse, diagnostics) = parse(source).unwrap();
    assert!(diagnostics.is_empty(), "{}", diagnostics.render_plain());
    parse.root().decls().collect()
}

#[test]
fn schema_fields() {
    let input = indoc! {r#"
    schema `order lines` {
      id i64;
      tags list?<string>;
    }
    "#};

    let decls = decls(input);
    let Decl::Schema(schema) = &decls[0] else {
        panic!("expected a schema");
    };

    let name = schema.name().unwrap();
    assert_eq!(name.text(), "order lines");
    assert!(name.is_quoted());

    let fields: Vec<_> = schema.fields().collect();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].name().unwrap().text(), "id");

    let tags = fields[1].ty().unwrap();
    assert_eq!(tags.name().unwrap().text(), "list");
    assert!(tags.nullable());
    let params = tags.params();
    assert_eq!(params.len(), 1);
    let TypeParam::Type(inner) = &params[0] else {
        panic!("expected a nested type");
    };
    assert_eq!(inner.name().unwrap().text(), "string");
}

#[test]
fn extension_names() {
    let input = indoc! {r#"
    extension_space "urn:functions" {
      function add:i64_i64;
      function "sum:opt_i64" as total;
      type `my point`;
    }
    "#};

    let decls = decls(input);
    let Decl::ExtensionSpace(space) = &decls[0] else {
        panic!("expected an extension space");
    };

    assert_eq!(space.uri().unwrap().0, "urn:functions");
    let functions: Vec<_> = space.functions().collect();
    assert_eq!(functions[0].ext_name().unwrap().text(), "add:i64_i64");
    assert!(functions[0].alias().is_none());
    assert_eq!(functions[1].ext_name().unwrap().text(), "sum:opt_i64");
    assert_eq!(functions[1].alias().unwrap().text(), "total");

    let types: Vec<_> = space.types().collect();
    assert_eq!(types[0].name().unwrap().text(), "my point");
}

#[test]
fn pipeline_stages() {
    let decls = decls("pipelines { scan -> keep -> root; }");
    let Decl::Pipelines(block) = &decls[0] else {
        panic!("expected pipelines");
    };

    let stages = block.pipelines().next().unwrap().stages();
    assert_eq!(stages.len(), 3);
    assert!(matches!(&stages[0], Stage::Relation(n) if n.text() == "scan"));
    assert!(matches!(&stages[1], Stage::Relation(n) if n.text() == "keep"));
    assert!(matches!(&stages[2], Stage::Root(_)));
}

#[test]
fn root_names_mix_names_and_strings() {
    let decls = decls(r#"root { names = [a, `b c`, "d\te"]; }"#);
    let Decl::Root(root) = &decls[0] else {
        panic!("expected a root block");
    };

    let names: Vec<_> = root
        .name_lists()
        .flat_map(|l| l.entries())
        .map(|(text, _)| text)
        .collect();
    assert_eq!(names, vec!["a", "b c", "d\te"]);
}

#[test]
fn file_item_entries() {
    let input = indoc! {r#"
    source local_files files {
      items = [
        { uri_file: "/data/a.parquet", start: 0, length: 100, format: parquet },
      ];
    }
    "#};

    let decls = decls(input);
    let Decl::Source(source) = &decls[0] else {
        panic!("expected a source");
    };

    assert_eq!(source.kind_token().unwrap().text(), "local_files");
    let prop = source.props().next().unwrap();
    let items = prop.items();
    assert_eq!(items.len(), 1);

    let entries: Vec<_> = items[0]
        .entries()
        .map(|e| (e.key().unwrap().text(), e.value().unwrap()))
        .collect();
    assert_eq!(
        entries,
        vec![
            ("uri_file".to_owned(), EntryValue::String("/data/a.parquet".to_owned())),
            ("start".to_owned(), EntryValue::Number("0".to_owned())),
            ("length".to_owned(), EntryValue::Number("100".to_owned())),
            ("format".to_owned(), EntryValue::Name("parquet".to_owned())),
        ]
    );
}

#[test]
fn relation_properties() {
    let input = indoc! {r#"
    sort relation ordered {
      input scan;
      sort price by desc_nulls_first;
      sort f(x) -> i64;
    }
    "#};

    let decls = decls(input);
    let Decl::Relation(rel) = &decls[0] else {
        panic!("expected a relation");
    };

    assert_eq!(rel.kind_name().unwrap().text(), "sort");
    assert_eq!(rel.name().unwrap().text(), "ordered");

    let props: Vec<_> = rel.properties().collect();
    assert_eq!(props.len(), 3);
    assert_eq!(props[0].name().unwrap().text(), "scan");

    assert!(matches!(props[1].expr(), Some(Expr::Column(_))));
    assert_eq!(props[1].name().unwrap().text(), "desc_nulls_first");

    let Some(Expr::Call(call)) = props[2].expr() else {
        panic!("expected a call");
    };
    assert!(props[2].name().is_none());
    assert_eq!(call.name().unwrap().text(), "f");
    assert_eq!(call.args().len(), 1);
    assert_eq!(call.output().unwrap().name().unwrap().text(), "i64");
}

#[test]
fn column_ref_parts() {
    let decls = decls("filter relation f { filter t.s[0][2]; }");
    let Decl::Relation(rel) = &decls[0] else {
        panic!("expected a relation");
    };

    let Some(Expr::Column(col)) = rel.properties().next().unwrap().expr() else {
        panic!("expected a column reference");
    };
    let names: Vec<_> = col.names().iter().map(|n| n.text()).collect();
    assert_eq!(names, vec!["t", "s"]);
    let indices: Vec<_> = col
        .indices()
        .map(|i| i.number().unwrap().text().to_owned())
        .collect();
    assert_eq!(indices, vec!["0", "2"]);
}

fn properties(source: &str) -> Vec<Property> {
    let decls = decls(source);
    let Decl::Relation(rel) = &decls[0] else {
        panic!("expected a relation");
    };
    rel.properties().collect()
}

#[test]
fn subquery_forms() {
    let input = indoc! {r#"
    filter relation f {
      filter subquery s;
      filter (a, b) in subquery s;
      filter UNIQUE in subquery s;
      filter a le all subquery s;
    }
    "#};

    let forms: Vec<_> = properties(input)
        .iter()
        .map(|prop| {
            let Some(Expr::Subquery(subquery)) = prop.expr() else {
                panic!("expected a subquery");
            };
            assert_eq!(subquery.name().unwrap().text(), "s");
            (subquery.form(), subquery.operand())
        })
        .collect();

    assert!(matches!(forms[0], (SubqueryForm::Scalar, None)));
    let (SubqueryForm::In, Some(Expr::Paren(needles))) = &forms[1] else {
        panic!("expected an in-predicate over a list");
    };
    assert_eq!(needles.exprs().len(), 2);
    let (SubqueryForm::SetPredicate(op), None) = &forms[2] else {
        panic!("expected a set predicate");
    };
    assert_eq!(op.text(), "UNIQUE");
    let (SubqueryForm::SetComparison { comparison, reduction }, Some(Expr::Column(_))) = &forms[3]
    else {
        panic!("expected a set comparison");
    };
    assert_eq!((comparison.text(), reduction.text()), ("le".to_owned(), "all".to_owned()));
}

#[test]
fn composite_literal_items() {
    let input = indoc! {r#"
    project relation p {
      expression {"a": 1, "b": 2}_map<string, i64>;
      expression {1_i8, "x"}_struct<i8, string>;
    }
    "#};

    let props = properties(input);
    let Some(Expr::Literal(map)) = props[0].expr() else {
        panic!("expected a literal");
    };
    assert!(map.token().is_none());
    assert_eq!(map.ty().unwrap().name().unwrap().text(), "map");
    let entries = map.composite().unwrap().items();
    assert_eq!(entries.len(), 2);
    let CompositeItem::Entry(entry) = &entries[1] else {
        panic!("expected a map entry");
    };
    assert_eq!(entry.key().unwrap().token().unwrap().text(), "\"b\"");
    assert_eq!(entry.value().unwrap().token().unwrap().text(), "2");

    let Some(Expr::Literal(fields)) = props[1].expr() else {
        panic!("expected a literal");
    };
    let items = fields.composite().unwrap().items();
    let CompositeItem::Value(first) = &items[0] else {
        panic!("expected a struct field");
    };
    assert_eq!(first.token().unwrap().text(), "1");
    assert_eq!(first.ty().unwrap().name().unwrap().text(), "i8");
    assert!(matches!(&items[1], CompositeItem::Value(_)));
}

#[test]
fn filter_behavior_words() {
    let input = indoc! {r#"
    read relation r {
      best effort filter a;
      best_effort filter b;
      filter c;
    }
    "#};

    let behaviors: Vec<_> = properties(input)
        .iter()
        .map(|prop| prop.behavior().map(|(text, _)| text))
        .collect();
    assert_eq!(
        behaviors,
        vec![Some("best_effort".to_owned()), Some("best_effort".to_owned()), None]
    );
}
