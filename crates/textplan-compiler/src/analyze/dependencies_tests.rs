use indoc::indoc;

use crate::analyze::dependencies::{DependencyAnalysis, analyze_dependencies};
use crate::analyze::symbol_table::resolve_names;
use crate::diagnostics::Diagnostics;
use crate::parser::parse;

fn analyze(source: &str) -> DependencyAnalysis {
    let (parsed, _) = parse(source).unwrap();
    let mut diagnostics = Diagnostics::new();
    let table = resolve_names(&parsed.root(), &mut diagnostics);
    assert!(diagnostics.is_empty(), "{}", diagnostics.render_plain());
    analyze_dependencies(&table)
}

#[test]
fn leaves_come_first() {
    let input = indoc! {r#"
    filter relation keep { input scan; }
    project relation p { input keep; }
    read relation scan { }
    "#};

    let analysis = analyze(input);

    let order: Vec<_> = analysis.build_order().collect();
    assert_eq!(order, vec!["scan", "keep", "p"]);
    assert!(analysis.cycle().is_none());
}

#[test]
fn independent_relations_keep_declaration_order() {
    let analysis = analyze("read relation b { }\nread relation a { }\n");

    let order: Vec<_> = analysis.build_order().collect();
    assert_eq!(order, vec!["b", "a"]);
}

#[test]
fn subquery_is_a_dependency() {
    let input = indoc! {r#"
    filter relation f { input scan; filter subquery inner; }
    read relation scan { }
    read relation inner { }
    "#};

    let analysis = analyze(input);

    let order: Vec<_> = analysis.build_order().collect();
    assert_eq!(order, vec!["scan", "inner", "f"]);
}

#[test]
fn mutual_inputs_form_a_cycle() {
    let input = indoc! {r#"
    filter relation a { input b; }
    filter relation b { input a; }
    "#};

    let analysis = analyze(input);

    let mut cycle = analysis.cycle().unwrap().to_vec();
    cycle.sort();
    assert_eq!(cycle, vec!["a", "b"]);
}

#[test]
fn self_input_is_a_cycle() {
    let analysis = analyze("filter relation a { input a; }\n");

    assert_eq!(analysis.cycle().unwrap(), ["a"]);
}

#[test]
fn pipeline_cycle_is_detected() {
    let input = indoc! {r#"
    filter relation a { }
    filter relation b { }
    pipelines {
      a -> b -> a;
    }
    "#};

    let analysis = analyze(input);

    assert_eq!(analysis.cycle().map(<[String]>::len), Some(2));
}

#[test]
fn long_chains_are_ordered_without_recursion() {
    let mut input = String::from("read relation r0 { }\n");
    for i in 1..20_000 {
        input.push_str(&format!("filter relation r{i} {{ input r{}; }}\n", i - 1));
    }

    let analysis = analyze(&input);

    let order: Vec<_> = analysis.build_order().collect();
    assert_eq!(order.len(), 20_000);
    assert_eq!(order.first(), Some(&"r0"));
    assert_eq!(order.last(), Some(&"r19999"));
    assert!(analysis.cycle().is_none());
}
