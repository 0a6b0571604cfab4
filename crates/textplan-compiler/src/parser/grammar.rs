//! Grammar productions for TextPlan.
//!
//! This module implements all `parse_*` methods as an extension of `Parser`.
//! Shared block and statement helpers live here; the productions are split
//! by area.

mod expressions;
mod items;
mod relations;
mod types;

use rowan::TextRange;

use super::core::Parser;
use super::cst::token_sets::{DECL_KEYWORDS, SOURCE_KINDS};
use super::cst::{SyntaxKind, TokenSet};
use crate::diagnostics::DiagnosticKind;

impl Parser<'_> {
    /// Loose declaration start, used at the top level: any declaration
    /// keyword or a `<kind> relation` header.
    pub(super) fn currently_at_decl_start(&mut self) -> bool {
        let current = self.current();
        DECL_KEYWORDS.contains(current)
            || (current.is_name() && self.next_is(SyntaxKind::KwRelation))
    }

    /// Strict declaration start, used inside blocks where declaration
    /// keywords are also valid names. Only fires when the following tokens
    /// can only be a declaration.
    pub(super) fn currently_at_block_escape(&mut self) -> bool {
        let current = self.current();
        if current.is_name() && self.next_is(SyntaxKind::KwRelation) {
            return true;
        }
        let next = self.peek_nth(1);
        match current {
            SyntaxKind::KwSchema => next.is_name() && self.peek_nth(2) == SyntaxKind::BraceOpen,
            SyntaxKind::KwSource => SOURCE_KINDS.contains(next),
            SyntaxKind::KwPipelines | SyntaxKind::KwRoot => next == SyntaxKind::BraceOpen,
            SyntaxKind::KwExtensionSpace => next == SyntaxKind::StringLit,
            _ => false,
        }
    }

    /// `NAME`: identifier, quoted identifier, or a keyword used as a name.
    pub(super) fn parse_name(&mut self, what: &str) -> bool {
        let kind = self.current();
        if !kind.is_name() {
            self.error_msg(DiagnosticKind::ExpectedName, what);
            return false;
        }
        if kind == SyntaxKind::QuotedId && self.current_text() == "``" {
            self.error(DiagnosticKind::EmptyQuotedName);
        }
        self.start_node(SyntaxKind::Name);
        self.bump_as(if kind.is_keyword() {
            SyntaxKind::Id
        } else {
            kind
        });
        self.finish_node();
        true
    }

    /// `named NAME`
    pub(super) fn parse_alias(&mut self) {
        if !self.currently_is(SyntaxKind::KwNamed) {
            return;
        }
        self.start_node(SyntaxKind::Alias);
        self.bump();
        self.parse_name("expected a name after `named`");
        self.finish_node();
    }

    pub(super) fn expect_string(&mut self, what: &str) -> bool {
        if self.eat_token(SyntaxKind::StringLit) {
            return true;
        }
        self.error_msg(DiagnosticKind::ExpectedString, what);
        false
    }

    pub(super) fn expect_number(&mut self, what: &str) -> bool {
        if self.eat_token(SyntaxKind::Number) {
            return true;
        }
        self.error_msg(DiagnosticKind::ExpectedNumber, what);
        false
    }

    /// Ends a `;`-terminated entry.
    ///
    /// A missing `;` right before the next entry gets a fix. Anything else up
    /// to the recovery set is wrapped in an `Error` node.
    pub(super) fn finish_statement(&mut self, next_entry: TokenSet) {
        if self.eat_token(SyntaxKind::Semicolon) {
            return;
        }
        if self.should_stop()
            || self.currently_is(SyntaxKind::BraceClose)
            || self.currently_is_one_of(next_entry)
        {
            let at = self.last_non_trivia_end().unwrap_or_else(|| self.eof_offset());
            self.error_with_fix(
                DiagnosticKind::UnexpectedToken,
                TextRange::empty(at),
                "expected `;`",
                "add `;`",
                ";",
            );
            return;
        }
        let recovery = next_entry.union(TokenSet::new(&[
            SyntaxKind::Semicolon,
            SyntaxKind::BraceClose,
        ]));
        self.error_recover(DiagnosticKind::UnexpectedToken, "expected `;`", recovery);
        self.eat_token(SyntaxKind::Semicolon);
    }

    /// `{ entry* }`. `entry` must consume at least one token when it does
    /// not recognize the current one; otherwise the token is skipped here.
    pub(super) fn parse_block(&mut self, construct: &str, entry: fn(&mut Self)) {
        if !self.currently_is(SyntaxKind::BraceOpen) {
            self.error_msg(
                DiagnosticKind::UnexpectedToken,
                format!("expected `{{` to open the {construct}"),
            );
            return;
        }
        if !self.enter_recursion() {
            return;
        }
        self.open_group();

        loop {
            if self.should_stop() || self.currently_is(SyntaxKind::BraceClose) {
                break;
            }
            if self.currently_at_block_escape() {
                break;
            }
            let before = self.pos;
            entry(self);
            if self.pos == before && !self.should_stop() {
                self.error_and_bump(
                    DiagnosticKind::UnexpectedToken,
                    format!("not valid inside the {construct}"),
                );
            }
        }

        self.close_group(SyntaxKind::BraceClose, construct);
        self.exit_recursion();
    }

    /// `[ item ("," item)* ","? ]` wrapped in a `node`.
    pub(super) fn parse_bracket_list(&mut self, node: SyntaxKind, construct: &str, item: fn(&mut Self) -> bool) {
        self.start_node(node);
        if !self.currently_is(SyntaxKind::BracketOpen) {
            self.error_msg(DiagnosticKind::UnexpectedToken, "expected `[`");
            self.finish_node();
            return;
        }
        self.open_group();

        while !self.should_stop() && !self.currently_is(SyntaxKind::BracketClose) {
            if !item(self) {
                let recovery = TokenSet::new(&[
                    SyntaxKind::Comma,
                    SyntaxKind::BracketClose,
                    SyntaxKind::Semicolon,
                    SyntaxKind::BraceClose,
                ]);
                self.error_recover(DiagnosticKind::UnexpectedToken, &format!("not valid in {construct}"), recovery);
                if !self.currently_is(SyntaxKind::Comma) {
                    break;
                }
            }
            if !self.eat_token(SyntaxKind::Comma) {
                break;
            }
        }

        self.close_group(SyntaxKind::BracketClose, construct);
        self.finish_node();
    }
}
