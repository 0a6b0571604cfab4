//! Parser infrastructure for TextPlan.
//!
//! # Architecture
//!
//! The parser produces a lossless concrete syntax tree (CST) via Rowan's green
//! tree builder, in the style of rust-analyzer:
//!
//! - Zero-copy parsing: tokens carry spans, text is sliced only when building tree nodes
//! - Trivia buffering: whitespace and comments are attached as leading trivia
//! - Checkpoint-based wrapping: `expr as type` is wrapped retroactively into a cast
//! - Explicit recovery sets: per-production sets decide where skipping stops
//!
//! # Recovery Strategy
//!
//! The parser always produces a tree. Recovery follows these rules:
//!
//! 1. Unknown tokens get wrapped in `SyntaxKind::Error` nodes and consumed
//! 2. Missing expected tokens emit a diagnostic but are not consumed
//! 3. A broken property skips to the next property keyword or `}`
//! 4. A broken declaration skips to the next declaration keyword or `<kind> relation` header
//!
//! Fuel exhaustion (exec fuel, recursion fuel) is the only hard error.

pub mod ast;
pub mod cst;
pub mod lexer;

mod core;
mod grammar;

#[cfg(test)]
mod ast_tests;
#[cfg(test)]
mod tests;

pub use cst::{SyntaxKind, SyntaxNode, SyntaxToken};

pub use core::Parser;

use crate::{Error, PassResult};
use lexer::{check_source_len, lex};

/// Parse result containing the green tree.
///
/// The tree is always complete; diagnostics are returned separately.
#[derive(Debug, Clone)]
pub struct Parse {
    cst: rowan::GreenNode,
}

impl Parse {
    pub fn as_cst(&self) -> &rowan::GreenNode {
        &self.cst
    }

    pub fn syntax(&self) -> SyntaxNode {
        SyntaxNode::new_root(self.cst.clone())
    }

    pub fn root(&self) -> ast::Root {
        ast::Root::new(self.syntax())
    }
}

/// Parses without fuel limits.
pub fn parse(source: &str) -> PassResult<Parse> {
    parse_with_fuel(source, None, None)
}

/// Returns `Err` on fuel exhaustion or oversized input only; syntax errors
/// are diagnostics.
pub fn parse_with_fuel(
    source: &str,
    exec_fuel: Option<u32>,
    recursion_fuel: Option<u32>,
) -> PassResult<Parse> {
    check_source_len(source.len()).map_err(|len| Error::InputTooLarge { len })?;
    let parser = Parser::new(source, lex(source))
        .with_exec_fuel(exec_fuel)
        .with_recursion_fuel(recursion_fuel);
    let (cst, diagnostics) = parser.parse()?;
    tracing::debug!(errors = diagnostics.error_count(), "parsed");
    Ok((Parse { cst }, diagnostics))
}
