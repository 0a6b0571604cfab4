//! Relation declarations and their property blocks.

use textplan_core::RelTag;

use crate::diagnostics::DiagnosticKind;
use crate::parser::Parser;
use crate::parser::cst::SyntaxKind;
use crate::parser::cst::token_sets::{
    MEASURE_ITEM_FIRST, MEASURE_RECOVERY, PROPERTY_FIRST, PROPERTY_RECOVERY,
};

impl Parser<'_> {
    /// `KIND relation NAME { property* }`
    pub(super) fn parse_relation(&mut self) {
        self.start_node(SyntaxKind::RelationDecl);

        let text = self.current_text();
        if RelTag::from_name(text).is_none() {
            let range = self.current_span();
            self.error_at(DiagnosticKind::UnknownRelationKind, range, text);
        }
        self.parse_name("expected a relation kind");
        self.expect(SyntaxKind::KwRelation, "`relation`");
        self.parse_name("expected a relation name");
        self.parse_block("relation", Self::parse_property);

        self.finish_node();
    }

    fn parse_property(&mut self) {
        match self.current() {
            SyntaxKind::KwBaseSchema | SyntaxKind::KwSource | SyntaxKind::KwInput => {
                self.start_node(SyntaxKind::Property);
                self.bump();
                self.parse_name("expected a declaration name");
                self.finish_statement(PROPERTY_FIRST);
                self.finish_node();
            }
            SyntaxKind::KwType => {
                self.start_node(SyntaxKind::Property);
                self.bump();
                self.parse_name("expected a join type or set operation");
                self.finish_statement(PROPERTY_FIRST);
                self.finish_node();
            }
            SyntaxKind::KwFilter | SyntaxKind::KwEmit => {
                self.start_node(SyntaxKind::Property);
                self.bump();
                self.parse_expr();
                self.finish_statement(PROPERTY_FIRST);
                self.finish_node();
            }
            SyntaxKind::KwExpression | SyntaxKind::KwGrouping => {
                self.start_node(SyntaxKind::Property);
                self.bump();
                self.parse_expr();
                self.parse_alias();
                self.finish_statement(PROPERTY_FIRST);
                self.finish_node();
            }
            SyntaxKind::KwSort => {
                self.start_node(SyntaxKind::Property);
                self.bump();
                self.parse_expr();
                if self.eat_token(SyntaxKind::KwBy) {
                    self.parse_name("expected a sort direction");
                }
                self.finish_statement(PROPERTY_FIRST);
                self.finish_node();
            }
            SyntaxKind::KwOffset | SyntaxKind::KwCount => {
                self.start_node(SyntaxKind::Property);
                self.bump();
                self.expect_number("expected a number");
                self.finish_statement(PROPERTY_FIRST);
                self.finish_node();
            }
            SyntaxKind::KwDetail => {
                self.start_node(SyntaxKind::Property);
                self.bump();
                self.expect(SyntaxKind::Equals, "`=`");
                self.expect_string("expected a detail string");
                self.finish_statement(PROPERTY_FIRST);
                self.finish_node();
            }
            SyntaxKind::KwMeasure => {
                self.start_node(SyntaxKind::MeasureBlock);
                self.bump();
                self.parse_block("measure block", Self::parse_measure_item);
                self.finish_node();
            }
            kind if kind.is_name() && self.at_filter_behavior() => {
                self.start_node(SyntaxKind::Property);
                while self.current().is_name() && !self.currently_is(SyntaxKind::KwFilter) {
                    self.parse_name("expected a filter behavior");
                }
                self.bump();
                self.parse_expr();
                self.finish_statement(PROPERTY_FIRST);
                self.finish_node();
            }
            _ => {
                let text = self.current_text();
                self.error_recover(
                    DiagnosticKind::UnknownProperty,
                    &format!("`{text}`"),
                    PROPERTY_RECOVERY,
                );
            }
        }
    }

    /// `best_effort filter` or `best effort filter`.
    fn at_filter_behavior(&mut self) -> bool {
        self.next_is(SyntaxKind::KwFilter)
            || (self.peek_nth(1).is_name() && self.peek_nth(2) == SyntaxKind::KwFilter)
    }

    /// `measure call (@ PHASE)? (named NAME)? ;`, `filter expr ;` or
    /// `invocation NAME ;`
    fn parse_measure_item(&mut self) {
        match self.current() {
            SyntaxKind::KwMeasure => {
                self.start_node(SyntaxKind::MeasureCall);
                self.bump();
                self.parse_expr();
                if self.eat_token(SyntaxKind::At) {
                    self.parse_name("expected an aggregation phase after `@`");
                }
                self.parse_alias();
                self.finish_statement(MEASURE_ITEM_FIRST);
                self.finish_node();
            }
            SyntaxKind::KwFilter => {
                self.start_node(SyntaxKind::Property);
                self.bump();
                self.parse_expr();
                self.finish_statement(MEASURE_ITEM_FIRST);
                self.finish_node();
            }
            SyntaxKind::KwInvocation => {
                self.start_node(SyntaxKind::Property);
                self.bump();
                self.parse_name("expected `all` or `distinct`");
                self.finish_statement(MEASURE_ITEM_FIRST);
                self.finish_node();
            }
            _ => {
                let text = self.current_text();
                self.error_recover(
                    DiagnosticKind::UnknownProperty,
                    &format!("`{text}` (measure blocks take `measure`, `filter` or `invocation`)"),
                    MEASURE_RECOVERY,
                );
            }
        }
    }
}
