//! Expressions: literals, calls, column references, subqueries and casts.

use textplan_core::{ComparisonOp, ReductionOp};

use crate::diagnostics::DiagnosticKind;
use crate::parser::Parser;
use crate::parser::cst::SyntaxKind;
use crate::parser::cst::token_sets::LITERAL_FIRST;

impl Parser<'_> {
    /// `primary ("as" type | "in" "subquery" NAME | CMP (any|all) "subquery" NAME)*`
    ///
    /// Every postfix operator nests one level deeper, so a long cast chain
    /// spends recursion fuel like nested parentheses would.
    pub(crate) fn parse_expr(&mut self) {
        if !self.enter_recursion() {
            return;
        }

        self.buffer_trivia();
        let checkpoint = self.checkpoint();
        self.parse_primary();

        let mut postfix = 0;
        loop {
            let node = if self.currently_is(SyntaxKind::KwAs) {
                SyntaxKind::CastExpr
            } else if self.currently_is(SyntaxKind::KwIn)
                || self.at_set_comparison()
            {
                SyntaxKind::SubqueryExpr
            } else {
                break;
            };
            if !self.enter_recursion() {
                break;
            }
            postfix += 1;

            self.start_node_at(checkpoint, node);
            if node == SyntaxKind::CastExpr {
                self.bump();
                self.parse_type();
            } else if self.eat_token(SyntaxKind::KwIn) {
                self.parse_subquery_tail();
            } else {
                self.parse_name("expected a comparison");
                self.parse_name("expected `any` or `all`");
                self.parse_subquery_tail();
            }
            self.finish_node();
        }

        for _ in 0..=postfix {
            self.exit_recursion();
        }
    }

    /// `eq any subquery`, `ge all subquery`, ...
    fn at_set_comparison(&mut self) -> bool {
        self.current().is_name()
            && ComparisonOp::from_name(self.current_text()).is_some()
            && ReductionOp::from_name(self.peek_nth_text(1)).is_some()
            && self.peek_nth(2) == SyntaxKind::KwSubquery
    }

    /// `"subquery" NAME`
    fn parse_subquery_tail(&mut self) {
        self.expect(SyntaxKind::KwSubquery, "`subquery`");
        self.parse_name("expected a relation name after `subquery`");
    }

    fn parse_primary(&mut self) {
        let kind = self.current();
        match kind {
            _ if LITERAL_FIRST.contains(kind) => self.parse_literal(),
            SyntaxKind::KwSubquery => {
                self.start_node(SyntaxKind::SubqueryExpr);
                self.parse_subquery_tail();
                self.finish_node();
            }
            SyntaxKind::KwExists | SyntaxKind::KwUnique if self.next_is(SyntaxKind::KwIn) => {
                self.start_node(SyntaxKind::SubqueryExpr);
                self.bump();
                self.bump();
                self.parse_subquery_tail();
                self.finish_node();
            }
            SyntaxKind::ParenOpen => self.parse_paren_expr(),
            SyntaxKind::Positional => {
                self.start_node(SyntaxKind::ColumnRef);
                self.bump();
                self.parse_index_suffixes();
                self.finish_node();
            }
            _ if kind.is_name() => {
                if self.next_is(SyntaxKind::ParenOpen) {
                    self.parse_call();
                } else {
                    self.parse_column_ref();
                }
            }
            _ => self.error_msg(DiagnosticKind::ExpectedExpression, "expected an expression"),
        }
    }

    /// `(NUMBER | STRING | true | false | null | composite) (("_" | "::") type)?`
    fn parse_literal(&mut self) {
        self.start_node(SyntaxKind::LiteralExpr);
        if self.currently_is(SyntaxKind::BraceOpen) {
            self.parse_composite();
        } else {
            self.bump();
        }
        if self.eat_token(SyntaxKind::Underscore) || self.eat_token(SyntaxKind::DoubleColon) {
            self.parse_type();
        }
        self.finish_node();
    }

    /// `"{" (literal (":" literal)? ("," ...)*)? "}"`: a map when the
    /// elements are `key: value` pairs, a struct otherwise.
    fn parse_composite(&mut self) {
        if !self.enter_recursion() {
            return;
        }

        self.start_node(SyntaxKind::CompositeLiteral);
        self.open_group();

        while !self.should_stop() && !self.currently_is(SyntaxKind::BraceClose) {
            if !self.currently_is_one_of(LITERAL_FIRST) {
                self.error_msg(DiagnosticKind::ExpectedExpression, "expected a literal");
                break;
            }
            let entry = self.checkpoint();
            self.parse_literal();
            if self.currently_is(SyntaxKind::Colon) {
                self.start_node_at(entry, SyntaxKind::MapEntry);
                self.bump();
                if self.currently_is_one_of(LITERAL_FIRST) {
                    self.parse_literal();
                } else {
                    self.error_msg(DiagnosticKind::ExpectedExpression, "expected a map value");
                }
                self.finish_node();
            }
            if !self.eat_token(SyntaxKind::Comma) {
                break;
            }
        }

        self.close_group(SyntaxKind::BraceClose, "composite literal");
        self.finish_node();
        self.exit_recursion();
    }

    /// `NAME "(" args ")" ("->" type)?`
    fn parse_call(&mut self) {
        self.start_node(SyntaxKind::CallExpr);
        self.parse_name("expected a function name");
        self.parse_arg_list();
        if self.eat_token(SyntaxKind::Arrow) {
            self.parse_type();
        }
        self.finish_node();
    }

    fn parse_arg_list(&mut self) {
        self.start_node(SyntaxKind::ArgList);
        self.open_group();
        self.parse_expr_list(SyntaxKind::ParenClose);
        self.close_group(SyntaxKind::ParenClose, "argument list");
        self.finish_node();
    }

    fn parse_expr_list(&mut self, closer: SyntaxKind) {
        while !self.should_stop() && !self.currently_is(closer) {
            let before = self.pos;
            self.parse_expr();
            if self.pos == before {
                break;
            }
            if !self.eat_token(SyntaxKind::Comma) {
                break;
            }
        }
    }

    /// `NAME ("." NAME)? ("[" NUMBER "]")*`
    fn parse_column_ref(&mut self) {
        self.start_node(SyntaxKind::ColumnRef);
        self.parse_name("expected a column name");
        if self.eat_token(SyntaxKind::Dot) {
            self.parse_name("expected a column name after `.`");
        }
        self.parse_index_suffixes();
        self.finish_node();
    }

    fn parse_index_suffixes(&mut self) {
        while self.currently_is(SyntaxKind::BracketOpen) {
            self.start_node(SyntaxKind::IndexSuffix);
            self.bump();
            self.expect_number("expected a struct field index");
            self.expect(SyntaxKind::BracketClose, "`]`");
            self.finish_node();
        }
    }

    /// `"(" expr ("," expr)* ")"`; the list form only appears as the
    /// needles of `in subquery`.
    fn parse_paren_expr(&mut self) {
        self.start_node(SyntaxKind::ParenExpr);
        self.open_group();
        if self.currently_is(SyntaxKind::ParenClose) {
            self.error_msg(DiagnosticKind::ExpectedExpression, "expected an expression");
        }
        self.parse_expr_list(SyntaxKind::ParenClose);
        self.close_group(SyntaxKind::ParenClose, "parenthesized expression");
        self.finish_node();
    }
}
