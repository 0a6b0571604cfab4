//! Typed AST wrappers over CST nodes.
//!
//! Each struct wraps a `SyntaxNode` and provides typed accessors.
//! Accessors return `None` for parts lost to error recovery; validation
//! happens in the resolver and the builder.

use rowan::TextRange;

use super::cst::{SyntaxKind, SyntaxNode, SyntaxToken};
use super::lexer::{name_text, unescape_string};

macro_rules! ast_node {
    ($name:ident, $kind:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(SyntaxNode);

        impl $name {
            pub fn cast(node: SyntaxNode) -> Option<Self> {
                (node.kind() == SyntaxKind::$kind).then(|| Self(node))
            }

            pub fn as_cst(&self) -> &SyntaxNode {
                &self.0
            }

            pub fn range(&self) -> TextRange {
                self.0.text_range()
            }
        }
    };
}

ast_node!(Root, Root);
ast_node!(Name, Name);
ast_node!(SchemaDecl, SchemaDecl);
ast_node!(FieldDecl, FieldDecl);
ast_node!(SourceDecl, SourceDecl);
ast_node!(SourceProp, SourceProp);
ast_node!(FileItem, FileItem);
ast_node!(FileEntry, FileEntry);
ast_node!(RelationDecl, RelationDecl);
ast_node!(Property, Property);
ast_node!(MeasureBlock, MeasureBlock);
ast_node!(MeasureCall, MeasureCall);
ast_node!(PipelinesDecl, PipelinesDecl);
ast_node!(Pipeline, Pipeline);
ast_node!(RootDecl, RootDecl);
ast_node!(NameList, NameList);
ast_node!(ExtensionSpace, ExtensionSpace);
ast_node!(ExtFunction, ExtFunction);
ast_node!(ExtType, ExtType);
ast_node!(ExtName, ExtName);
ast_node!(Type, Type);
ast_node!(LiteralExpr, LiteralExpr);
ast_node!(CallExpr, CallExpr);
ast_node!(ColumnRef, ColumnRef);
ast_node!(IndexSuffix, IndexSuffix);
ast_node!(SubqueryExpr, SubqueryExpr);
ast_node!(ParenExpr, ParenExpr);
ast_node!(CastExpr, CastExpr);
ast_node!(CompositeLiteral, CompositeLiteral);
ast_node!(MapEntry, MapEntry);

fn tokens(node: &SyntaxNode) -> impl Iterator<Item = SyntaxToken> + '_ {
    node.children_with_tokens()
        .filter_map(|it| it.into_token())
        .filter(|t| !t.kind().is_trivia())
}

fn token_of(node: &SyntaxNode, kind: SyntaxKind) -> Option<SyntaxToken> {
    tokens(node).find(|t| t.kind() == kind)
}

fn child<N>(node: &SyntaxNode, cast: fn(SyntaxNode) -> Option<N>) -> Option<N> {
    node.children().find_map(cast)
}

fn children<'a, N: 'a>(
    node: &'a SyntaxNode,
    cast: fn(SyntaxNode) -> Option<N>,
) -> impl Iterator<Item = N> + 'a {
    node.children().filter_map(cast)
}

fn string_value(token: &SyntaxToken) -> (String, TextRange) {
    (unescape_string(token.text()), token.text_range())
}

/// Top-level declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Decl {
    Schema(SchemaDecl),
    Source(SourceDecl),
    Relation(RelationDecl),
    Pipelines(PipelinesDecl),
    Root(RootDecl),
    ExtensionSpace(ExtensionSpace),
}

impl Decl {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            SyntaxKind::SchemaDecl => SchemaDecl::cast(node).map(Decl::Schema),
            SyntaxKind::SourceDecl => SourceDecl::cast(node).map(Decl::Source),
            SyntaxKind::RelationDecl => RelationDecl::cast(node).map(Decl::Relation),
            SyntaxKind::PipelinesDecl => PipelinesDecl::cast(node).map(Decl::Pipelines),
            SyntaxKind::RootDecl => RootDecl::cast(node).map(Decl::Root),
            SyntaxKind::ExtensionSpace => ExtensionSpace::cast(node).map(Decl::ExtensionSpace),
            _ => None,
        }
    }
}

impl Root {
    pub(crate) fn new(node: SyntaxNode) -> Self {
        debug_assert_eq!(node.kind(), SyntaxKind::Root);
        Self(node)
    }

    pub fn decls(&self) -> impl Iterator<Item = Decl> + '_ {
        children(&self.0, Decl::cast)
    }
}

impl Name {
    pub fn token(&self) -> Option<SyntaxToken> {
        tokens(&self.0).next()
    }

    /// Name text with backticks stripped.
    pub fn text(&self) -> String {
        self.token()
            .map(|t| name_text(t.text()).to_owned())
            .unwrap_or_default()
    }

    pub fn is_quoted(&self) -> bool {
        self.token().is_some_and(|t| t.kind() == SyntaxKind::QuotedId)
    }
}

impl SchemaDecl {
    pub fn name(&self) -> Option<Name> {
        child(&self.0, Name::cast)
    }

    pub fn fields(&self) -> impl Iterator<Item = FieldDecl> + '_ {
        children(&self.0, FieldDecl::cast)
    }
}

impl FieldDecl {
    pub fn name(&self) -> Option<Name> {
        child(&self.0, Name::cast)
    }

    pub fn ty(&self) -> Option<Type> {
        child(&self.0, Type::cast)
    }
}

impl SourceDecl {
    /// The token after `source`: a source kind keyword, or an `Id` when
    /// the kind was not recognized.
    pub fn kind_token(&self) -> Option<SyntaxToken> {
        tokens(&self.0)
            .nth(1)
            .filter(|t| t.kind() != SyntaxKind::BraceOpen)
    }

    pub fn name(&self) -> Option<Name> {
        child(&self.0, Name::cast)
    }

    pub fn props(&self) -> impl Iterator<Item = SourceProp> + '_ {
        children(&self.0, SourceProp::cast)
    }
}

impl SourceProp {
    pub fn keyword(&self) -> Option<SyntaxToken> {
        tokens(&self.0).next()
    }

    /// Strings of a `names = [...]` list.
    pub fn strings(&self) -> Vec<(String, TextRange)> {
        self.0
            .children()
            .filter(|n| n.kind() == SyntaxKind::StringList)
            .flat_map(|list| {
                tokens(&list)
                    .filter(|t| t.kind() == SyntaxKind::StringLit)
                    .map(|t| string_value(&t))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// File items of an `items = [...]` list.
    pub fn items(&self) -> Vec<FileItem> {
        self.0
            .children()
            .filter(|n| n.kind() == SyntaxKind::ItemList)
            .flat_map(|list| list.children().filter_map(FileItem::cast).collect::<Vec<_>>())
            .collect()
    }

    /// The string of `detail = "..."`.
    pub fn string(&self) -> Option<(String, TextRange)> {
        token_of(&self.0, SyntaxKind::StringLit).map(|t| string_value(&t))
    }
}

impl FileItem {
    pub fn entries(&self) -> impl Iterator<Item = FileEntry> + '_ {
        children(&self.0, FileEntry::cast)
    }
}

/// Value of a file item entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValue {
    String(String),
    Number(String),
    Name(String),
}

impl FileEntry {
    pub fn key(&self) -> Option<Name> {
        child(&self.0, Name::cast)
    }

    pub fn value(&self) -> Option<EntryValue> {
        if let Some(name) = children(&self.0, Name::cast).nth(1) {
            return Some(EntryValue::Name(name.text()));
        }
        tokens(&self.0).find_map(|t| match t.kind() {
            SyntaxKind::StringLit => Some(EntryValue::String(unescape_string(t.text()))),
            SyntaxKind::Number => Some(EntryValue::Number(t.text().to_owned())),
            _ => None,
        })
    }
}

impl RelationDecl {
    pub fn kind_name(&self) -> Option<Name> {
        children(&self.0, Name::cast).next()
    }

    pub fn name(&self) -> Option<Name> {
        children(&self.0, Name::cast).nth(1)
    }

    pub fn properties(&self) -> impl Iterator<Item = Property> + '_ {
        children(&self.0, Property::cast)
    }

    pub fn measures(&self) -> impl Iterator<Item = MeasureBlock> + '_ {
        children(&self.0, MeasureBlock::cast)
    }
}

impl Property {
    pub fn keyword(&self) -> Option<SyntaxToken> {
        tokens(&self.0).next()
    }

    pub fn keyword_kind(&self) -> Option<SyntaxKind> {
        self.keyword().map(|t| t.kind())
    }

    /// Name operand: the referenced declaration, the join type, the sort
    /// direction or the invocation.
    pub fn name(&self) -> Option<Name> {
        child(&self.0, Name::cast)
    }

    pub fn expr(&self) -> Option<Expr> {
        child(&self.0, Expr::cast)
    }

    /// Words before `filter`, joined with `_`: `best effort filter` and
    /// `best_effort filter` both give `best_effort`.
    pub fn behavior(&self) -> Option<(String, TextRange)> {
        let keyword = self.keyword()?;
        if keyword.kind() != SyntaxKind::KwFilter {
            return None;
        }
        let words: Vec<Name> = children(&self.0, Name::cast)
            .take_while(|name| name.range().end() <= keyword.text_range().start())
            .collect();
        let (first, last) = (words.first()?, words.last()?);
        let text = words.iter().map(Name::text).collect::<Vec<_>>().join("_");
        Some((text, first.range().cover(last.range())))
    }

    pub fn alias(&self) -> Option<Name> {
        self.0
            .children()
            .find(|n| n.kind() == SyntaxKind::Alias)
            .and_then(|alias| child(&alias, Name::cast))
    }

    pub fn number(&self) -> Option<SyntaxToken> {
        token_of(&self.0, SyntaxKind::Number)
    }

    pub fn string(&self) -> Option<(String, TextRange)> {
        token_of(&self.0, SyntaxKind::StringLit).map(|t| string_value(&t))
    }
}

impl MeasureBlock {
    pub fn calls(&self) -> impl Iterator<Item = MeasureCall> + '_ {
        children(&self.0, MeasureCall::cast)
    }

    pub fn properties(&self) -> impl Iterator<Item = Property> + '_ {
        children(&self.0, Property::cast)
    }
}

impl MeasureCall {
    pub fn call(&self) -> Option<Expr> {
        child(&self.0, Expr::cast)
    }

    pub fn phase(&self) -> Option<Name> {
        child(&self.0, Name::cast)
    }

    pub fn alias(&self) -> Option<Name> {
        self.0
            .children()
            .find(|n| n.kind() == SyntaxKind::Alias)
            .and_then(|alias| child(&alias, Name::cast))
    }
}

impl PipelinesDecl {
    pub fn pipelines(&self) -> impl Iterator<Item = Pipeline> + '_ {
        children(&self.0, Pipeline::cast)
    }
}

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    Relation(Name),
    Root(SyntaxToken),
}

impl Stage {
    pub fn range(&self) -> TextRange {
        match self {
            Stage::Relation(name) => name.range(),
            Stage::Root(token) => token.text_range(),
        }
    }
}

impl Pipeline {
    pub fn stages(&self) -> Vec<Stage> {
        self.0
            .children_with_tokens()
            .filter_map(|it| match it {
                rowan::NodeOrToken::Node(node) => Name::cast(node).map(Stage::Relation),
                rowan::NodeOrToken::Token(token) => {
                    (token.kind() == SyntaxKind::KwRoot).then_some(Stage::Root(token))
                }
            })
            .collect()
    }
}

impl RootDecl {
    pub fn name_lists(&self) -> impl Iterator<Item = NameList> + '_ {
        children(&self.0, NameList::cast)
    }
}

impl NameList {
    /// Names and strings in order, unquoted.
    pub fn entries(&self) -> Vec<(String, TextRange)> {
        self.0
            .children_with_tokens()
            .filter_map(|it| match it {
                rowan::NodeOrToken::Node(node) => {
                    Name::cast(node).map(|name| (name.text(), name.range()))
                }
                rowan::NodeOrToken::Token(token) => {
                    (token.kind() == SyntaxKind::StringLit).then(|| string_value(&token))
                }
            })
            .collect()
    }
}

impl ExtensionSpace {
    pub fn uri(&self) -> Option<(String, TextRange)> {
        token_of(&self.0, SyntaxKind::StringLit).map(|t| string_value(&t))
    }

    pub fn functions(&self) -> impl Iterator<Item = ExtFunction> + '_ {
        children(&self.0, ExtFunction::cast)
    }

    pub fn types(&self) -> impl Iterator<Item = ExtType> + '_ {
        children(&self.0, ExtType::cast)
    }
}

impl ExtFunction {
    pub fn ext_name(&self) -> Option<ExtName> {
        child(&self.0, ExtName::cast)
    }

    pub fn alias(&self) -> Option<Name> {
        child(&self.0, Name::cast)
    }
}

impl ExtType {
    pub fn name(&self) -> Option<Name> {
        child(&self.0, Name::cast)
    }
}

impl ExtName {
    /// The full extension name, e.g. `add:i64_i64`.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for token in tokens(&self.0) {
            match token.kind() {
                SyntaxKind::StringLit => return unescape_string(token.text()),
                SyntaxKind::QuotedId => out.push_str(name_text(token.text())),
                _ => out.push_str(token.text()),
            }
        }
        out
    }
}

/// Parameter inside `<...>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeParam {
    Number(SyntaxToken),
    Type(Type),
}

impl Type {
    pub fn name(&self) -> Option<Name> {
        child(&self.0, Name::cast)
    }

    pub fn nullable(&self) -> bool {
        token_of(&self.0, SyntaxKind::Question).is_some()
    }

    pub fn has_params(&self) -> bool {
        token_of(&self.0, SyntaxKind::AngleOpen).is_some()
    }

    pub fn params(&self) -> Vec<TypeParam> {
        self.0
            .children_with_tokens()
            .filter_map(|it| match it {
                rowan::NodeOrToken::Node(node) => Type::cast(node).map(TypeParam::Type),
                rowan::NodeOrToken::Token(token) => {
                    (token.kind() == SyntaxKind::Number).then_some(TypeParam::Number(token))
                }
            })
            .collect()
    }
}

/// Expression node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(LiteralExpr),
    Call(CallExpr),
    Column(ColumnRef),
    Subquery(SubqueryExpr),
    Paren(ParenExpr),
    Cast(CastExpr),
}

impl Expr {
    pub fn cast(node: SyntaxNode) -> Option<Self> {
        match node.kind() {
            SyntaxKind::LiteralExpr => LiteralExpr::cast(node).map(Expr::Literal),
            SyntaxKind::CallExpr => CallExpr::cast(node).map(Expr::Call),
            SyntaxKind::ColumnRef => ColumnRef::cast(node).map(Expr::Column),
            SyntaxKind::SubqueryExpr => SubqueryExpr::cast(node).map(Expr::Subquery),
            SyntaxKind::ParenExpr => ParenExpr::cast(node).map(Expr::Paren),
            SyntaxKind::CastExpr => CastExpr::cast(node).map(Expr::Cast),
            _ => None,
        }
    }

    pub fn as_cst(&self) -> &SyntaxNode {
        match self {
            Expr::Literal(n) => n.as_cst(),
            Expr::Call(n) => n.as_cst(),
            Expr::Column(n) => n.as_cst(),
            Expr::Subquery(n) => n.as_cst(),
            Expr::Paren(n) => n.as_cst(),
            Expr::Cast(n) => n.as_cst(),
        }
    }

    pub fn range(&self) -> TextRange {
        self.as_cst().text_range()
    }
}

impl LiteralExpr {
    /// The scalar value token; `None` for `{...}` literals.
    pub fn token(&self) -> Option<SyntaxToken> {
        tokens(&self.0).find(|t| {
            matches!(
                t.kind(),
                SyntaxKind::Number
                    | SyntaxKind::StringLit
                    | SyntaxKind::KwTrue
                    | SyntaxKind::KwFalse
                    | SyntaxKind::KwNull
            )
        })
    }

    pub fn composite(&self) -> Option<CompositeLiteral> {
        child(&self.0, CompositeLiteral::cast)
    }

    pub fn ty(&self) -> Option<Type> {
        child(&self.0, Type::cast)
    }
}

impl CallExpr {
    pub fn name(&self) -> Option<Name> {
        child(&self.0, Name::cast)
    }

    pub fn args(&self) -> Vec<Expr> {
        self.0
            .children()
            .find(|n| n.kind() == SyntaxKind::ArgList)
            .map(|list| list.children().filter_map(Expr::cast).collect())
            .unwrap_or_default()
    }

    pub fn output(&self) -> Option<Type> {
        child(&self.0, Type::cast)
    }
}

impl ColumnRef {
    pub fn positional(&self) -> Option<SyntaxToken> {
        token_of(&self.0, SyntaxKind::Positional)
    }

    /// `name` or `qualifier.name`.
    pub fn names(&self) -> Vec<Name> {
        children(&self.0, Name::cast).collect()
    }

    pub fn indices(&self) -> impl Iterator<Item = IndexSuffix> + '_ {
        children(&self.0, IndexSuffix::cast)
    }
}

impl IndexSuffix {
    pub fn number(&self) -> Option<SyntaxToken> {
        token_of(&self.0, SyntaxKind::Number)
    }
}

/// Element of a `{...}` literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompositeItem {
    Value(LiteralExpr),
    Entry(MapEntry),
}

impl CompositeLiteral {
    pub fn items(&self) -> Vec<CompositeItem> {
        self.0
            .children()
            .filter_map(|node| match node.kind() {
                SyntaxKind::LiteralExpr => LiteralExpr::cast(node).map(CompositeItem::Value),
                SyntaxKind::MapEntry => MapEntry::cast(node).map(CompositeItem::Entry),
                _ => None,
            })
            .collect()
    }
}

impl MapEntry {
    pub fn key(&self) -> Option<LiteralExpr> {
        child(&self.0, LiteralExpr::cast)
    }

    pub fn value(&self) -> Option<LiteralExpr> {
        children(&self.0, LiteralExpr::cast).nth(1)
    }
}

/// The shape of a `subquery` expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubqueryForm {
    /// `subquery r`
    Scalar,
    /// `expr in subquery r`, `(a, b) in subquery r`
    In,
    /// `exists in subquery r`, `unique in subquery r`
    SetPredicate(SyntaxToken),
    /// `expr lt any subquery r`
    SetComparison { comparison: Name, reduction: Name },
}

impl SubqueryExpr {
    /// The relation after `subquery`.
    pub fn name(&self) -> Option<Name> {
        let keyword = token_of(&self.0, SyntaxKind::KwSubquery)?;
        let after = keyword.text_range().end();
        children(&self.0, Name::cast).find(|name| name.range().start() >= after)
    }

    /// Left-hand side of `in` or of a set comparison.
    pub fn operand(&self) -> Option<Expr> {
        child(&self.0, Expr::cast)
    }

    pub fn form(&self) -> SubqueryForm {
        if let Some(op) = tokens(&self.0)
            .find(|t| matches!(t.kind(), SyntaxKind::KwExists | SyntaxKind::KwUnique))
        {
            return SubqueryForm::SetPredicate(op);
        }
        if token_of(&self.0, SyntaxKind::KwIn).is_some() {
            return SubqueryForm::In;
        }
        let mut names = children(&self.0, Name::cast);
        match (self.operand(), names.next(), names.next()) {
            (Some(_), Some(comparison), Some(reduction)) => SubqueryForm::SetComparison {
                comparison,
                reduction,
            },
            _ => SubqueryForm::Scalar,
        }
    }
}

impl ParenExpr {
    pub fn exprs(&self) -> Vec<Expr> {
        children(&self.0, Expr::cast).collect()
    }
}

impl CastExpr {
    pub fn expr(&self) -> Option<Expr> {
        child(&self.0, Expr::cast)
    }

    pub fn ty(&self) -> Option<Type> {
        child(&self.0, Type::cast)
    }
}
