use crate::diagnostics::DiagnosticKind;
use crate::parser::Parser;
use crate::parser::cst::SyntaxKind;

impl Parser<'_> {
    /// `NAME "?"? ("<" (NUMBER | type) ("," (NUMBER | type))* ">")?`
    ///
    /// Type names are plain names here; the resolver decides between
    /// builtins and user-defined types.
    pub(crate) fn parse_type(&mut self) {
        if !self.current().is_name() {
            self.error_msg(DiagnosticKind::ExpectedType, "expected a type");
            return;
        }
        if !self.enter_recursion() {
            return;
        }

        self.start_node(SyntaxKind::Type);
        self.parse_name("expected a type");
        self.eat_token(SyntaxKind::Question);

        if self.currently_is(SyntaxKind::AngleOpen) {
            self.open_group();
            loop {
                let kind = self.current();
                if kind == SyntaxKind::Number {
                    self.bump();
                } else if kind.is_name() {
                    self.parse_type();
                } else {
                    self.error_msg(DiagnosticKind::ExpectedType, "expected a type parameter");
                    break;
                }
                if !self.eat_token(SyntaxKind::Comma) {
                    break;
                }
            }
            self.close_group(SyntaxKind::AngleClose, "type parameter list");
        }

        self.finish_node();
        self.exit_recursion();
    }
}
