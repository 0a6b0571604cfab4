use rowan::TextRange;

/// Diagnostic kinds ordered by priority (highest priority first).
///
/// When two diagnostics overlap, the higher-priority one suppresses the
/// lower-priority one so a single mistake does not produce a cascade.
///
/// - Unclosed blocks swallow the rest of the file and come first
/// - Expected-token errors are the root causes the user should fix
/// - Misplaced tokens and unknown keywords are local mistakes
/// - Name resolution errors assume the syntax is valid
/// - Plan errors are reported by the builder after resolution succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticKind {
    // Cascading structure errors
    UnclosedBlock,
    UnclosedParen,
    UnclosedBracket,
    UnclosedAngle,

    // User omitted something required
    ExpectedName,
    ExpectedType,
    ExpectedExpression,
    ExpectedString,
    ExpectedNumber,

    // User wrote something that doesn't belong
    UnrecognizedCharacter,
    EmptyQuotedName,
    UnexpectedToken,
    UnknownRelationKind,
    UnknownProperty,
    UnknownSourceKind,

    // Valid syntax, invalid names
    DuplicateDefinition,
    UndefinedReference,
    RootNotLast,

    // Builder failures
    InvalidPlan,
}

impl DiagnosticKind {
    pub fn default_severity(&self) -> Severity {
        Severity::Error
    }

    /// Lower discriminant wins.
    pub fn suppresses(&self, other: &DiagnosticKind) -> bool {
        self < other
    }

    /// Unclosed blocks: suppressed by root-cause errors at the same position.
    pub fn is_structural_error(&self) -> bool {
        matches!(
            self,
            Self::UnclosedBlock | Self::UnclosedParen | Self::UnclosedBracket | Self::UnclosedAngle
        )
    }

    pub fn is_root_cause_error(&self) -> bool {
        matches!(
            self,
            Self::ExpectedName
                | Self::ExpectedType
                | Self::ExpectedExpression
                | Self::ExpectedString
                | Self::ExpectedNumber
        )
    }

    pub fn default_hint(&self) -> Option<&'static str> {
        match self {
            Self::RootNotLast => Some("`root` ends a pipeline, e.g. `scan -> keep -> root`"),
            Self::UnknownRelationKind => Some(
                "kinds are read, filter, project, join, cross, fetch, aggregate, sort, set, \
                 extension_leaf, extension_single, extension_multi",
            ),
            Self::UnknownSourceKind => {
                Some("kinds are named_table, local_files, virtual_table, extension_table")
            }
            Self::EmptyQuotedName => Some("quoted names need at least one character"),
            _ => None,
        }
    }

    /// Base message, used when no custom detail is provided.
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Self::UnclosedBlock => "missing closing `}`",
            Self::UnclosedParen => "missing closing `)`",
            Self::UnclosedBracket => "missing closing `]`",
            Self::UnclosedAngle => "missing closing `>`",

            Self::ExpectedName => "expected a name",
            Self::ExpectedType => "expected a type",
            Self::ExpectedExpression => "expected an expression",
            Self::ExpectedString => "expected a string",
            Self::ExpectedNumber => "expected a number",

            Self::UnrecognizedCharacter => "unrecognized characters",
            Self::EmptyQuotedName => "empty quoted name",
            Self::UnexpectedToken => "unexpected token",
            Self::UnknownRelationKind => "unknown relation kind",
            Self::UnknownProperty => "unknown property",
            Self::UnknownSourceKind => "unknown source kind",

            Self::DuplicateDefinition => "duplicate definition",
            Self::UndefinedReference => "undefined reference",
            Self::RootNotLast => "`root` must be the last pipeline stage",

            Self::InvalidPlan => "invalid plan",
        }
    }

    /// Template for custom messages; `{}` is replaced by the caller's detail.
    pub fn custom_message(&self) -> String {
        match self {
            Self::DuplicateDefinition => "`{}` is already defined".to_string(),
            Self::UndefinedReference => "`{}` is not defined".to_string(),
            Self::UnknownRelationKind => "`{}` is not a relation kind".to_string(),
            Self::UnknownSourceKind => "`{}` is not a source kind".to_string(),
            Self::InvalidPlan
            | Self::ExpectedName
            | Self::ExpectedType
            | Self::ExpectedExpression
            | Self::ExpectedString
            | Self::ExpectedNumber => "{}".to_string(),

            Self::UnclosedBlock | Self::UnclosedParen | Self::UnclosedBracket | Self::UnclosedAngle => {
                format!("{} in the {{}}", self.fallback_message())
            }

            _ => format!("{}: {{}}", self.fallback_message()),
        }
    }

    /// `None` gives the fallback message, `Some(detail)` fills the template.
    pub fn message(&self, msg: Option<&str>) -> String {
        match msg {
            None => self.fallback_message().to_string(),
            Some(detail) => self.custom_message().replace("{}", detail),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fix {
    pub(crate) replacement: String,
    pub(crate) description: String,
}

impl Fix {
    pub fn new(replacement: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            replacement: replacement.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedInfo {
    pub(crate) range: TextRange,
    pub(crate) message: String,
}

impl RelatedInfo {
    pub fn new(range: TextRange, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub(crate) kind: DiagnosticKind,
    /// The range shown to the user.
    pub(crate) range: TextRange,
    /// The range used for suppression. Defaults to `range`; the parser widens
    /// it to the enclosing block so errors inside an unclosed block collapse.
    pub(crate) suppression_range: TextRange,
    pub(crate) message: String,
    pub(crate) fix: Option<Fix>,
    pub(crate) related: Vec<RelatedInfo>,
    pub(crate) hints: Vec<String>,
}

impl DiagnosticMessage {
    pub(crate) fn new(kind: DiagnosticKind, range: TextRange, message: impl Into<String>) -> Self {
        Self {
            kind,
            range,
            suppression_range: range,
            message: message.into(),
            fix: None,
            related: Vec::new(),
            hints: kind.default_hint().map(str::to_owned).into_iter().collect(),
        }
    }

    pub(crate) fn with_default_message(kind: DiagnosticKind, range: TextRange) -> Self {
        Self::new(kind, range, kind.fallback_message())
    }

    pub fn kind(&self) -> DiagnosticKind {
        self.kind
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.kind.default_severity()
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }
}

impl std::fmt::Display for DiagnosticMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}..{}: {}",
            self.severity(),
            u32::from(self.range.start()),
            u32::from(self.range.end()),
            self.message
        )?;
        if let Some(fix) = &self.fix {
            write!(f, " (fix: {})", fix.description)?;
        }
        for related in &self.related {
            write!(
                f,
                " (related: {} at {}..{})",
                related.message,
                u32::from(related.range.start()),
                u32::from(related.range.end())
            )?;
        }
        for hint in &self.hints {
            write!(f, " (hint: {})", hint)?;
        }
        Ok(())
    }
}
