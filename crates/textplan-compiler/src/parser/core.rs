//! Token cursor, tree sink and error reporting shared by the grammar.

use std::cell::Cell;

use rowan::{Checkpoint, GreenNode, GreenNodeBuilder, TextRange, TextSize};

use super::cst::{SyntaxKind, TokenSet};
use super::lexer::{Token, token_text};
use crate::Error;
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Lookaheads allowed between two consumed tokens before the grammar is
/// considered stuck.
const LOOKAHEAD_LIMIT: u32 = 256;

/// Parser limits. Exhausting either one aborts the parse.
#[derive(Debug, Default)]
struct Fuel {
    tokens_left: Option<u32>,
    max_depth: Option<u32>,
    depth: u32,
}

impl Fuel {
    fn spend_token(&mut self) -> Result<(), Error> {
        match &mut self.tokens_left {
            Some(0) => Err(Error::ExecFuelExhausted),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn descend(&mut self) -> Result<(), Error> {
        if self.max_depth.is_some_and(|max| self.depth >= max) {
            return Err(Error::RecursionLimitExceeded);
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

/// An opened `(`, `[`, `<` or `{` awaiting its closer.
#[derive(Debug, Clone, Copy)]
struct OpenGroup {
    opener: SyntaxKind,
    at: TextRange,
}

/// Recursive-descent parser over a pre-lexed token stream.
///
/// Trivia is held back and attached to the tree right before the next
/// node or token, so comments stay inside the declaration that follows them.
pub struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pub(super) pos: usize,
    pending_trivia: Vec<Token>,
    builder: GreenNodeBuilder<'static>,
    diagnostics: Diagnostics,
    fuel: Fuel,
    fatal: Option<Error>,
    lookaheads_left: Cell<u32>,
    last_report_at: Option<TextSize>,
    groups: Vec<OpenGroup>,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            pending_trivia: Vec::new(),
            builder: GreenNodeBuilder::new(),
            diagnostics: Diagnostics::new(),
            fuel: Fuel::default(),
            fatal: None,
            lookaheads_left: Cell::new(LOOKAHEAD_LIMIT),
            last_report_at: None,
            groups: Vec::new(),
        }
    }

    /// Caps the number of consumed tokens. `None` removes the cap.
    pub fn with_exec_fuel(mut self, limit: Option<u32>) -> Self {
        self.fuel.tokens_left = limit;
        self
    }

    /// Caps block, expression and type nesting. `None` removes the cap.
    pub fn with_recursion_fuel(mut self, limit: Option<u32>) -> Self {
        self.fuel.max_depth = limit;
        self
    }

    /// Runs the grammar over the whole file.
    pub fn parse(mut self) -> Result<(GreenNode, Diagnostics), Error> {
        self.parse_root();
        self.flush_trivia();
        match self.fatal {
            Some(err) => Err(err),
            None => Ok((self.builder.finish(), self.diagnostics)),
        }
    }

    fn abort(&mut self, err: Error) {
        self.fatal.get_or_insert(err);
    }

    // Cursor

    fn stuck_check(&self) {
        let left = self.lookaheads_left.get();
        assert!(left != 0, "parser is stuck: too many lookaheads");
        self.lookaheads_left.set(left - 1);
    }

    fn made_progress(&self) {
        self.lookaheads_left.set(LOOKAHEAD_LIMIT);
    }

    /// Moves trivia at the cursor into the pending buffer.
    pub(super) fn buffer_trivia(&mut self) {
        while let Some(token) = self.tokens.get(self.pos)
            && token.kind.is_trivia()
        {
            self.pending_trivia.push(*token);
            self.pos += 1;
        }
    }

    fn token(&mut self) -> Option<Token> {
        self.buffer_trivia();
        self.tokens.get(self.pos).copied()
    }

    pub(super) fn current(&mut self) -> SyntaxKind {
        self.buffer_trivia();
        self.stuck_check();
        self.tokens.get(self.pos).map_or(SyntaxKind::Error, |t| t.kind)
    }

    pub(super) fn current_span(&mut self) -> TextRange {
        match self.token() {
            Some(token) => token.span,
            None => TextRange::empty(self.eof_offset()),
        }
    }

    pub(super) fn current_text(&mut self) -> &'src str {
        let source = self.source;
        self.token().map_or("", |t| token_text(source, &t))
    }

    /// Kind of the `n`th non-trivia token from the cursor.
    pub(super) fn peek_nth(&mut self, n: usize) -> SyntaxKind {
        self.buffer_trivia();
        self.stuck_check();
        self.tokens[self.pos..]
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .nth(n)
            .map_or(SyntaxKind::Error, |t| t.kind)
    }

    /// Text of the `n`th non-trivia token from the cursor.
    pub(super) fn peek_nth_text(&mut self, n: usize) -> &'src str {
        self.buffer_trivia();
        self.stuck_check();
        let source = self.source;
        self.tokens[self.pos..]
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .nth(n)
            .map_or("", |t| token_text(source, t))
    }

    pub(super) fn next_is(&mut self, kind: SyntaxKind) -> bool {
        self.peek_nth(1) == kind
    }

    pub(super) fn currently_is(&mut self, kind: SyntaxKind) -> bool {
        self.current() == kind
    }

    pub(super) fn currently_is_one_of(&mut self, set: TokenSet) -> bool {
        set.contains(self.current())
    }

    pub(super) fn eof_offset(&self) -> TextSize {
        TextSize::of(self.source)
    }

    /// End of input, or a limit ran out.
    pub(super) fn should_stop(&mut self) -> bool {
        self.buffer_trivia();
        self.pos >= self.tokens.len() || self.fatal.is_some()
    }

    pub(super) fn last_non_trivia_end(&self) -> Option<TextSize> {
        self.tokens[..self.pos]
            .iter()
            .rev()
            .find(|t| !t.kind.is_trivia())
            .map(|t| t.span.end())
    }

    // Tree

    pub(super) fn flush_trivia(&mut self) {
        for token in std::mem::take(&mut self.pending_trivia) {
            self.builder
                .token(token.kind.into(), token_text(self.source, &token));
        }
    }

    pub(super) fn start_node(&mut self, kind: SyntaxKind) {
        self.flush_trivia();
        self.builder.start_node(kind.into());
    }

    pub(super) fn start_node_at(&mut self, checkpoint: Checkpoint, kind: SyntaxKind) {
        self.builder.start_node_at(checkpoint, kind.into());
    }

    pub(super) fn finish_node(&mut self) {
        self.builder.finish_node();
    }

    pub(super) fn checkpoint(&mut self) -> Checkpoint {
        self.flush_trivia();
        self.builder.checkpoint()
    }

    pub(super) fn bump(&mut self) {
        let kind = self.current();
        self.bump_as(kind);
    }

    /// Consumes the current token, storing it as `kind` (keywords in name
    /// position become `Id`).
    pub(super) fn bump_as(&mut self, kind: SyntaxKind) {
        let Some(token) = self.token() else {
            panic!("bump past end of input");
        };
        self.made_progress();
        if let Err(err) = self.fuel.spend_token() {
            self.abort(err);
        }
        self.flush_trivia();
        self.builder
            .token(kind.into(), token_text(self.source, &token));
        self.pos += 1;
    }

    pub(super) fn eat_token(&mut self, kind: SyntaxKind) -> bool {
        let matched = self.currently_is(kind);
        if matched {
            self.bump();
        }
        matched
    }

    /// Reports `expected {what}` without consuming on mismatch.
    pub(super) fn expect(&mut self, kind: SyntaxKind, what: &str) -> bool {
        if self.eat_token(kind) {
            return true;
        }
        self.error_msg(DiagnosticKind::UnexpectedToken, format!("expected {what}"));
        false
    }

    // Nesting

    pub(super) fn enter_recursion(&mut self) -> bool {
        self.made_progress();
        match self.fuel.descend() {
            Ok(()) => true,
            Err(err) => {
                self.abort(err);
                false
            }
        }
    }

    pub(super) fn exit_recursion(&mut self) {
        self.made_progress();
        self.fuel.ascend();
    }

    /// Consumes the opener at the cursor and remembers where it was.
    pub(super) fn open_group(&mut self) {
        let opener = self.current();
        let at = self.current_span();
        self.groups.push(OpenGroup { opener, at });
        self.bump();
    }

    /// Consumes `closer`, or reports the group named `construct` as unclosed.
    pub(super) fn close_group(&mut self, closer: SyntaxKind, construct: &str) {
        let group = self.groups.pop();
        if self.eat_token(closer) {
            return;
        }
        let Some(OpenGroup { opener, at }) = group else {
            return;
        };
        let kind = match opener {
            SyntaxKind::ParenOpen => DiagnosticKind::UnclosedParen,
            SyntaxKind::BracketOpen => DiagnosticKind::UnclosedBracket,
            SyntaxKind::AngleOpen => DiagnosticKind::UnclosedAngle,
            _ => DiagnosticKind::UnclosedBlock,
        };
        let here = self.current_span();
        if !self.first_report_at(here.start()) {
            return;
        }
        // spans the whole group so errors inside it are suppressed
        self.diagnostics
            .report(kind, TextRange::new(at.start(), here.end()))
            .message(construct)
            .related_to(format!("{construct} starts here"), at)
            .emit();
    }

    // Diagnostics

    /// One diagnostic per source position; later reports there are cascades.
    fn first_report_at(&mut self, pos: TextSize) -> bool {
        if self.last_report_at == Some(pos) {
            return false;
        }
        self.last_report_at = Some(pos);
        true
    }

    /// Errors inside an open group are suppressed up to end of input.
    fn suppression_range(&mut self) -> TextRange {
        match self.groups.last() {
            Some(group) => TextRange::new(group.at.start(), self.eof_offset()),
            None => self.current_span(),
        }
    }

    fn report_here(&mut self, kind: DiagnosticKind, message: Option<String>) {
        let range = self.current_span();
        if !self.first_report_at(range.start()) {
            return;
        }
        let suppression = self.suppression_range();
        let (kind, message) = if self.current() == SyntaxKind::Garbage {
            (
                DiagnosticKind::UnrecognizedCharacter,
                Some(format!("`{}`", self.current_text())),
            )
        } else {
            (kind, message)
        };
        let mut report = self
            .diagnostics
            .report(kind, range)
            .suppression_range(suppression);
        if let Some(message) = message {
            report = report.message(message);
        }
        report.emit();
    }

    pub(super) fn error(&mut self, kind: DiagnosticKind) {
        self.report_here(kind, None);
    }

    pub(super) fn error_msg(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.report_here(kind, Some(message.into()));
    }

    pub(super) fn error_at(&mut self, kind: DiagnosticKind, range: TextRange, message: impl Into<String>) {
        if self.first_report_at(range.start()) {
            self.diagnostics.report(kind, range).message(message).emit();
        }
    }

    pub(super) fn error_with_fix(
        &mut self,
        kind: DiagnosticKind,
        range: TextRange,
        message: impl Into<String>,
        fix_description: impl Into<String>,
        fix_replacement: impl Into<String>,
    ) {
        if self.first_report_at(range.start()) {
            self.diagnostics
                .report(kind, range)
                .message(message)
                .fix(fix_description, fix_replacement)
                .emit();
        }
    }

    /// Reports, then wraps the offending token in an `Error` node.
    pub(super) fn error_and_bump(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.error_msg(kind, message);
        if !self.should_stop() {
            self.start_node(SyntaxKind::Error);
            self.bump();
            self.finish_node();
        }
    }

    /// Reports, then wraps everything up to `recovery` in an `Error` node.
    pub(super) fn error_recover(&mut self, kind: DiagnosticKind, message: &str, recovery: TokenSet) {
        if self.should_stop() || self.currently_is_one_of(recovery) {
            self.error_msg(kind, message);
            return;
        }
        self.start_node(SyntaxKind::Error);
        self.error_msg(kind, message);
        while !self.should_stop() && !self.currently_is_one_of(recovery) {
            self.bump();
        }
        self.finish_node();
    }
}
