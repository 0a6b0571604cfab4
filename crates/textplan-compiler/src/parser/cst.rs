//! Syntax kinds for TextPlan.
//!
//! `SyntaxKind` serves dual roles: token kinds (from the lexer) and node
//! kinds (from the parser). Logos derives token recognition; node kinds have
//! no token/regex attributes. `PlanLang` implements Rowan's `Language` trait.

use logos::Logos;
use rowan::Language;

/// All token and node kinds. Tokens first, then nodes, then `__LAST`.
/// `#[repr(u16)]` enables the transmute in `kind_from_raw`.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum SyntaxKind {
    #[token("{")]
    BraceOpen = 0,

    #[token("}")]
    BraceClose,

    #[token("(")]
    ParenOpen,

    #[token(")")]
    ParenClose,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token("<")]
    AngleOpen,

    #[token(">")]
    AngleClose,

    #[token(";")]
    Semicolon,

    #[token(",")]
    Comma,

    #[token("=")]
    Equals,

    /// `::` for literal types. Defined before `Colon` for precedence.
    #[token("::")]
    DoubleColon,

    #[token(":")]
    Colon,

    #[token(".")]
    Dot,

    #[token("->")]
    Arrow,

    #[token("?")]
    Question,

    #[token("@")]
    At,

    /// Type suffix of a literal: `1_i32`.
    #[token("_")]
    Underscore,

    /// Keywords are defined separately and take precedence.
    #[regex(r"[A-Za-z][A-Za-z0-9_$]*")]
    Id,

    #[regex(r"`[^`\n]*`")]
    QuotedId,

    /// `$0`, `$12`: positional column reference.
    #[regex(r"\$[0-9]+")]
    Positional,

    #[regex(r"-?[0-9]+(\.[0-9]+)?([eE][-+]?[0-9]+)?")]
    Number,

    #[regex(r#""(?:[^"\\\n]|\\.)*""#)]
    StringLit,

    #[token("schema", ignore(case))]
    KwSchema,
    #[token("source", ignore(case))]
    KwSource,
    #[token("relation", ignore(case))]
    KwRelation,
    #[token("root", ignore(case))]
    KwRoot,
    #[token("pipelines", ignore(case))]
    KwPipelines,
    #[token("extension_space", ignore(case))]
    KwExtensionSpace,
    #[token("function", ignore(case))]
    KwFunction,
    #[token("type", ignore(case))]
    KwType,
    #[token("as", ignore(case))]
    KwAs,
    #[token("named", ignore(case))]
    KwNamed,
    #[token("base_schema", ignore(case))]
    KwBaseSchema,
    #[token("input", ignore(case))]
    KwInput,
    #[token("filter", ignore(case))]
    KwFilter,
    #[token("expression", ignore(case))]
    KwExpression,
    #[token("grouping", ignore(case))]
    KwGrouping,
    #[token("measure", ignore(case))]
    KwMeasure,
    #[token("invocation", ignore(case))]
    KwInvocation,
    #[token("sort", ignore(case))]
    KwSort,
    #[token("by", ignore(case))]
    KwBy,
    #[token("offset", ignore(case))]
    KwOffset,
    #[token("count", ignore(case))]
    KwCount,
    #[token("detail", ignore(case))]
    KwDetail,
    #[token("names", ignore(case))]
    KwNames,
    #[token("items", ignore(case))]
    KwItems,
    #[token("subquery", ignore(case))]
    KwSubquery,
    #[token("null", ignore(case))]
    KwNull,
    #[token("true", ignore(case))]
    KwTrue,
    #[token("false", ignore(case))]
    KwFalse,
    #[token("exists", ignore(case))]
    KwExists,
    #[token("unique", ignore(case))]
    KwUnique,
    #[token("in", ignore(case))]
    KwIn,
    #[token("emit", ignore(case))]
    KwEmit,
    #[token("named_table", ignore(case))]
    KwNamedTable,
    #[token("local_files", ignore(case))]
    KwLocalFiles,
    #[token("virtual_table", ignore(case))]
    KwVirtualTable,
    #[token("extension_table", ignore(case))]
    KwExtensionTable,

    #[regex(r"[ \t]+")]
    Whitespace,

    #[token("\n")]
    #[token("\r\n")]
    Newline,

    #[regex(r"//[^\n]*", allow_greedy = true)]
    LineComment,

    #[regex(r"/\*[^*]*\*+(?:[^/*][^*]*\*+)*/")]
    BlockComment,

    /// Coalesced unrecognized characters
    Garbage,
    Error,

    // --- Node kinds (non-terminals) ---
    Root,
    Name,
    SchemaDecl,
    FieldDecl,
    SourceDecl,
    SourceProp,
    StringList,
    ItemList,
    FileItem,
    FileEntry,
    RelationDecl,
    Property,
    MeasureBlock,
    MeasureCall,
    Alias,
    PipelinesDecl,
    Pipeline,
    RootDecl,
    NameList,
    ExtensionSpace,
    ExtFunction,
    ExtType,
    ExtName,
    Type,
    LiteralExpr,
    CallExpr,
    ArgList,
    ColumnRef,
    IndexSuffix,
    SubqueryExpr,
    ParenExpr,
    CastExpr,
    CompositeLiteral,
    MapEntry,

    // Must be last - used for bounds checking in `kind_from_raw`
    #[doc(hidden)]
    __LAST,
}

use SyntaxKind::*;

impl SyntaxKind {
    #[inline]
    pub fn is_trivia(self) -> bool {
        matches!(self, Whitespace | Newline | LineComment | BlockComment)
    }

    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, Error | Garbage)
    }

    #[inline]
    pub fn is_keyword(self) -> bool {
        (KwSchema as u16..=KwExtensionTable as u16).contains(&(self as u16))
    }

    /// Tokens usable as a name: identifiers, quoted identifiers, keywords.
    #[inline]
    pub fn is_name(self) -> bool {
        matches!(self, Id | QuotedId) || self.is_keyword()
    }
}

impl From<SyntaxKind> for rowan::SyntaxKind {
    #[inline]
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

/// Language tag for Rowan's tree types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlanLang {}

impl Language for PlanLang {
    type Kind = SyntaxKind;

    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        assert!(raw.0 < __LAST as u16);
        // SAFETY: the value is in bounds and SyntaxKind is repr(u16)
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }

    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

pub type SyntaxNode = rowan::SyntaxNode<PlanLang>;
pub type SyntaxToken = rowan::SyntaxToken<PlanLang>;
pub type SyntaxElement = rowan::NodeOrToken<SyntaxNode, SyntaxToken>;

/// 128-bit bitset of token kinds for O(1) membership testing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TokenSet(u128);

impl TokenSet {
    pub const EMPTY: TokenSet = TokenSet(0);

    /// Panics at compile time if any kind's discriminant >= 128.
    #[inline]
    pub const fn new(kinds: &[SyntaxKind]) -> Self {
        let mut bits = 0u128;
        let mut i = 0;
        while i < kinds.len() {
            let kind = kinds[i] as u16;
            assert!(kind < 128, "SyntaxKind value exceeds TokenSet capacity");
            bits |= 1 << kind;
            i += 1;
        }
        TokenSet(bits)
    }

    #[inline]
    pub const fn single(kind: SyntaxKind) -> Self {
        let kind = kind as u16;
        assert!(kind < 128, "SyntaxKind value exceeds TokenSet capacity");
        TokenSet(1 << kind)
    }

    #[inline]
    pub const fn contains(&self, kind: SyntaxKind) -> bool {
        let kind = kind as u16;
        if kind >= 128 {
            return false;
        }
        self.0 & (1 << kind) != 0
    }

    #[inline]
    pub const fn union(self, other: TokenSet) -> TokenSet {
        TokenSet(self.0 | other.0)
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut list = f.debug_set();
        for i in 0..128u16 {
            if self.0 & (1 << i) != 0 && i < __LAST as u16 {
                let kind: SyntaxKind = PlanLang::kind_from_raw(rowan::SyntaxKind(i));
                list.entry(&kind);
            }
        }
        list.finish()
    }
}

pub mod token_sets {
    use super::*;

    /// Keywords that open a top-level declaration. Relation headers
    /// (`<kind> relation`) are detected by lookahead instead.
    pub const DECL_KEYWORDS: TokenSet = TokenSet::new(&[
        KwSchema,
        KwSource,
        KwPipelines,
        KwRoot,
        KwExtensionSpace,
    ]);

    /// Keywords that open a relation property.
    pub const PROPERTY_FIRST: TokenSet = TokenSet::new(&[
        KwBaseSchema,
        KwSource,
        KwInput,
        KwFilter,
        KwExpression,
        KwGrouping,
        KwSort,
        KwMeasure,
        KwType,
        KwOffset,
        KwCount,
        KwDetail,
        KwEmit,
    ]);

    pub const MEASURE_ITEM_FIRST: TokenSet = TokenSet::new(&[KwMeasure, KwFilter, KwInvocation]);

    pub const SOURCE_PROP_FIRST: TokenSet = TokenSet::new(&[KwNames, KwItems, KwDetail]);

    pub const SOURCE_KINDS: TokenSet =
        TokenSet::new(&[KwNamedTable, KwLocalFiles, KwVirtualTable, KwExtensionTable]);

    pub const LITERAL_FIRST: TokenSet =
        TokenSet::new(&[Number, StringLit, KwTrue, KwFalse, KwNull, BraceOpen]);

    /// Where a broken property stops skipping: the next property or the end
    /// of the block.
    pub const PROPERTY_RECOVERY: TokenSet = PROPERTY_FIRST.union(TokenSet::single(BraceClose));

    pub const MEASURE_RECOVERY: TokenSet = MEASURE_ITEM_FIRST.union(TokenSet::single(BraceClose));

    pub const SOURCE_RECOVERY: TokenSet = SOURCE_PROP_FIRST.union(TokenSet::single(BraceClose));

    /// Statement-level recovery inside blocks whose entries end with `;`.
    pub const STATEMENT_RECOVERY: TokenSet = TokenSet::new(&[Semicolon, BraceClose]);
}
