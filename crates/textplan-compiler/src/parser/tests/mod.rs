mod recovery_tests;

use std::fmt::Write;

use crate::diagnostics::Diagnostics;
use crate::parser::{SyntaxNode, parse};

/// Indented `Kind "text"` dump of the CST, trivia skipped.
fn dump(node: &SyntaxNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    writeln!(out, "{indent}{:?}", node.kind()).expect("String write never fails");
    for child in node.children_with_tokens() {
        match child {
            rowan::NodeOrToken::Node(n) => dump(&n, depth + 1, out),
            rowan::NodeOrToken::Token(t) => {
                if t.kind().is_trivia() {
                    continue;
                }
                writeln!(out, "{indent}  {:?} {:?}", t.kind(), t.text())
                    .expect("String write never fails");
            }
        }
    }
}

/// Parses and dumps the tree; panics on any diagnostic.
pub(super) fn expect_valid_cst(source: &str) -> String {
    let (parse, diagnostics) = parse(source).expect("no fuel limits");
    assert!(
        diagnostics.is_empty(),
        "unexpected diagnostics:\n{}",
        diagnostics.render_plain()
    );
    let mut out = String::new();
    dump(&parse.syntax(), 0, &mut out);
    out
}

/// Parses and returns the filtered diagnostics; panics if there are none.
pub(super) fn expect_invalid(source: &str) -> Diagnostics {
    let (_, diagnostics) = parse(source).expect("no fuel limits");
    let filtered = diagnostics.filtered();
    assert!(!filtered.is_empty(), "expected diagnostics for:\n{source}");
    filtered
}
