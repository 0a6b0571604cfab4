//! Top-level declarations: schemas, sources, pipelines, the root block and
//! extension spaces. Relations live in `relations.rs`.

use crate::diagnostics::DiagnosticKind;
use crate::parser::Parser;
use crate::parser::cst::token_sets::{SOURCE_KINDS, SOURCE_PROP_FIRST, SOURCE_RECOVERY};
use crate::parser::cst::{SyntaxKind, TokenSet};

const EXT_ITEM_FIRST: TokenSet = TokenSet::new(&[SyntaxKind::KwFunction, SyntaxKind::KwType]);

impl Parser<'_> {
    pub fn parse_root(&mut self) {
        self.start_node(SyntaxKind::Root);

        while !self.should_stop() {
            if self.currently_at_decl_start() {
                self.parse_decl();
            } else {
                self.error_until_next_decl();
            }
        }

        self.buffer_trivia();
        self.flush_trivia();
        self.finish_node();
    }

    fn parse_decl(&mut self) {
        if self.current().is_name() && self.next_is(SyntaxKind::KwRelation) {
            self.parse_relation();
            return;
        }
        match self.current() {
            SyntaxKind::KwSchema => self.parse_schema(),
            SyntaxKind::KwSource => self.parse_source(),
            SyntaxKind::KwPipelines => self.parse_pipelines(),
            SyntaxKind::KwRoot => self.parse_root_decl(),
            SyntaxKind::KwExtensionSpace => self.parse_extension_space(),
            _ => self.error_until_next_decl(),
        }
    }

    pub(crate) fn error_until_next_decl(&mut self) {
        if self.should_stop() {
            return;
        }
        self.start_node(SyntaxKind::Error);
        self.error_msg(
            DiagnosticKind::UnexpectedToken,
            "expected a declaration (`schema`, `source`, `pipelines`, `root`, `extension_space` or `<kind> relation`)",
        );
        self.bump();
        while !self.should_stop() && !self.currently_at_decl_start() {
            self.bump();
        }
        self.finish_node();
    }

    /// `schema NAME { (NAME type ;)* }`
    fn parse_schema(&mut self) {
        self.start_node(SyntaxKind::SchemaDecl);
        self.bump();
        self.parse_name("expected a schema name");
        self.parse_block("schema", Self::parse_field_decl);
        self.finish_node();
    }

    fn parse_field_decl(&mut self) {
        if !self.current().is_name() {
            self.error_recover(
                DiagnosticKind::UnexpectedToken,
                "expected a field name",
                TokenSet::new(&[SyntaxKind::Semicolon, SyntaxKind::BraceClose]),
            );
            self.eat_token(SyntaxKind::Semicolon);
            return;
        }
        self.start_node(SyntaxKind::FieldDecl);
        self.parse_name("expected a field name");
        self.parse_type();
        self.finish_statement(TokenSet::EMPTY);
        self.finish_node();
    }

    /// `source KIND NAME { prop* }`
    fn parse_source(&mut self) {
        self.start_node(SyntaxKind::SourceDecl);
        self.bump();

        let kind = self.current();
        if SOURCE_KINDS.contains(kind) {
            self.bump();
        } else if kind.is_name() && self.peek_nth(1).is_name() {
            let text = self.current_text().to_owned();
            let range = self.current_span();
            self.error_at(DiagnosticKind::UnknownSourceKind, range, text);
            self.bump_as(SyntaxKind::Id);
        } else {
            self.error_msg(
                DiagnosticKind::UnexpectedToken,
                "expected a source kind",
            );
        }

        self.parse_name("expected a source name");
        self.parse_block("source", Self::parse_source_prop);
        self.finish_node();
    }

    fn parse_source_prop(&mut self) {
        match self.current() {
            SyntaxKind::KwNames => {
                self.start_node(SyntaxKind::SourceProp);
                self.bump();
                self.expect(SyntaxKind::Equals, "`=`");
                self.parse_bracket_list(SyntaxKind::StringList, "name list", |p| {
                    p.expect_string("expected a table name string")
                });
                self.eat_token(SyntaxKind::Semicolon);
                self.finish_node();
            }
            SyntaxKind::KwItems => {
                self.start_node(SyntaxKind::SourceProp);
                self.bump();
                self.expect(SyntaxKind::Equals, "`=`");
                self.parse_bracket_list(SyntaxKind::ItemList, "item list", Self::parse_file_item);
                self.eat_token(SyntaxKind::Semicolon);
                self.finish_node();
            }
            SyntaxKind::KwDetail => {
                self.start_node(SyntaxKind::SourceProp);
                self.bump();
                self.expect(SyntaxKind::Equals, "`=`");
                self.expect_string("expected a detail string");
                self.finish_statement(SOURCE_PROP_FIRST);
                self.finish_node();
            }
            _ => {
                let text = self.current_text().to_owned();
                self.error_recover(
                    DiagnosticKind::UnknownProperty,
                    &format!("`{text}` (sources take `names`, `items` or `detail`)"),
                    SOURCE_RECOVERY,
                );
            }
        }
    }

    /// `{ (NAME ":" (STRING | NUMBER | NAME) ","?)* }`
    fn parse_file_item(&mut self) -> bool {
        if !self.currently_is(SyntaxKind::BraceOpen) {
            self.error_msg(DiagnosticKind::UnexpectedToken, "expected `{` to open a file item");
            return false;
        }
        self.start_node(SyntaxKind::FileItem);
        self.open_group();

        while !self.should_stop() && !self.currently_is(SyntaxKind::BraceClose) {
            if !self.current().is_name() {
                self.error_recover(
                    DiagnosticKind::UnexpectedToken,
                    "expected a file item key",
                    TokenSet::new(&[SyntaxKind::Comma, SyntaxKind::BraceClose, SyntaxKind::BracketClose]),
                );
                if !self.eat_token(SyntaxKind::Comma) {
                    break;
                }
                continue;
            }
            self.start_node(SyntaxKind::FileEntry);
            self.parse_name("expected a file item key");
            self.expect(SyntaxKind::Colon, "`:`");
            match self.current() {
                SyntaxKind::StringLit | SyntaxKind::Number => self.bump(),
                kind if kind.is_name() => {
                    self.parse_name("expected a value");
                }
                _ => {
                    self.error_msg(DiagnosticKind::ExpectedExpression, "expected a string, number or name");
                }
            }
            self.finish_node();
            self.eat_token(SyntaxKind::Comma);
        }

        self.close_group(SyntaxKind::BraceClose, "file item");
        self.finish_node();
        true
    }

    /// `pipelines { (stage ("->" stage)* ;)* }`
    fn parse_pipelines(&mut self) {
        self.start_node(SyntaxKind::PipelinesDecl);
        self.bump();
        self.parse_block("pipelines block", Self::parse_pipeline);
        self.finish_node();
    }

    fn parse_pipeline(&mut self) {
        if !self.current().is_name() {
            self.error_recover(
                DiagnosticKind::UnexpectedToken,
                "expected a relation name",
                TokenSet::new(&[SyntaxKind::Semicolon, SyntaxKind::BraceClose]),
            );
            self.eat_token(SyntaxKind::Semicolon);
            return;
        }
        self.start_node(SyntaxKind::Pipeline);
        self.parse_stage();
        while self.eat_token(SyntaxKind::Arrow) {
            if !self.current().is_name() {
                self.error_msg(DiagnosticKind::ExpectedName, "expected a relation name after `->`");
                break;
            }
            self.parse_stage();
        }
        self.finish_statement(TokenSet::EMPTY);
        self.finish_node();
    }

    /// `root` stays a keyword token; anything else becomes a `Name`.
    fn parse_stage(&mut self) {
        if self.currently_is(SyntaxKind::KwRoot) {
            self.bump();
        } else {
            self.parse_name("expected a relation name");
        }
    }

    /// `root { names = [ (NAME | STRING), ... ] }`
    fn parse_root_decl(&mut self) {
        self.start_node(SyntaxKind::RootDecl);
        self.bump();
        self.parse_block("root block", Self::parse_root_names);
        self.finish_node();
    }

    fn parse_root_names(&mut self) {
        if !self.currently_is(SyntaxKind::KwNames) {
            let text = self.current_text().to_owned();
            self.error_recover(
                DiagnosticKind::UnknownProperty,
                &format!("`{text}` (the root block takes `names`)"),
                TokenSet::new(&[SyntaxKind::KwNames, SyntaxKind::BraceClose]),
            );
            return;
        }
        self.bump();
        self.expect(SyntaxKind::Equals, "`=`");
        self.parse_bracket_list(SyntaxKind::NameList, "name list", |p| {
            if p.currently_is(SyntaxKind::StringLit) {
                p.bump();
                true
            } else {
                p.parse_name("expected a column name")
            }
        });
        self.eat_token(SyntaxKind::Semicolon);
    }

    /// `extension_space STRING { item* }`
    fn parse_extension_space(&mut self) {
        self.start_node(SyntaxKind::ExtensionSpace);
        self.bump();
        self.expect_string("expected the extension URI string");
        self.parse_block("extension space", Self::parse_ext_item);
        self.finish_node();
    }

    fn parse_ext_item(&mut self) {
        match self.current() {
            SyntaxKind::KwFunction => {
                self.start_node(SyntaxKind::ExtFunction);
                self.bump();
                self.parse_ext_name();
                if self.eat_token(SyntaxKind::KwAs) {
                    self.parse_name("expected an alias after `as`");
                }
                self.finish_statement(EXT_ITEM_FIRST);
                self.finish_node();
            }
            SyntaxKind::KwType => {
                self.start_node(SyntaxKind::ExtType);
                self.bump();
                self.parse_name("expected a type name");
                self.finish_statement(EXT_ITEM_FIRST);
                self.finish_node();
            }
            _ => {
                let text = self.current_text().to_owned();
                self.error_recover(
                    DiagnosticKind::UnknownProperty,
                    &format!("`{text}` (extension spaces declare `function` or `type`)"),
                    EXT_ITEM_FIRST.union(TokenSet::single(SyntaxKind::BraceClose)),
                );
            }
        }
    }

    /// `STRING | NAME (":" NAME?)?`
    fn parse_ext_name(&mut self) {
        self.start_node(SyntaxKind::ExtName);
        let kind = self.current();
        if kind == SyntaxKind::StringLit {
            self.bump();
        } else if kind.is_name() {
            self.bump_as(if kind.is_keyword() { SyntaxKind::Id } else { kind });
            if self.eat_token(SyntaxKind::Colon) {
                let kind = self.current();
                if kind.is_name() && kind != SyntaxKind::KwAs {
                    self.bump_as(if kind.is_keyword() { SyntaxKind::Id } else { kind });
                }
            }
        } else {
            self.error_msg(DiagnosticKind::ExpectedName, "expected a function name");
        }
        self.finish_node();
    }
}
