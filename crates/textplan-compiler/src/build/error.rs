use rowan::TextRange;
use textplan_core::{AnchorError, DepthError, SchemaError, TypeError};

use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// First failure while lowering a resolved plan.
///
/// The builder stops here: later relations may consume the one that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildError {
    pub kind: BuildErrorKind,
    /// The relation being built, if the failure belongs to one.
    pub relation: Option<String>,
    pub range: Option<TextRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildErrorKind {
    #[error("relations form a cycle: {}", relations.join(" -> "))]
    Cycle { relations: Vec<String> },
    #[error("`{kind}` takes {expected} input(s), found {found}")]
    InputArity {
        kind: &'static str,
        expected: String,
        found: usize,
    },
    #[error("`{0}` is given more than once")]
    DuplicateProperty(String),
    #[error("`{property}` is not valid for `{kind}`")]
    UnexpectedProperty {
        property: String,
        kind: &'static str,
    },
    #[error("`{kind}` requires `{property}`")]
    MissingProperty {
        property: &'static str,
        kind: &'static str,
    },
    #[error("fetch needs offset >= 0 and count >= -1, found offset {offset} and count {count}")]
    InvalidFetch { offset: i64, count: i64 },
    #[error("root has {columns} columns but {names} names")]
    RootNames { names: usize, columns: usize },
    #[error("no input column matches `{0}`")]
    UnknownColumn(String),
    #[error("`{0}` matches more than one input column")]
    AmbiguousColumn(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Anchor(#[from] AnchorError),
    #[error("`{0}` is not a valid number here")]
    InvalidNumber(String),
    #[error("`{found}` is not a valid {what}")]
    UnknownKeyword { what: &'static str, found: String },
    #[error("invalid file item: {0}")]
    InvalidFileItem(String),
    #[error("`{name}` takes {expected}")]
    TypeParameters {
        name: &'static str,
        expected: &'static str,
    },
    #[error("measure must be a function call")]
    NotACall,
    #[error("`{0}` was not resolved")]
    Unresolved(String),
    #[error("an empty `{{}}` literal needs a type suffix")]
    UntypedComposite,
    #[error("a `{{...}}` literal mixes `key: value` entries with plain values")]
    MixedComposite,
    #[error("`{0}` is not a filter behavior")]
    UnknownFilterBehavior(String),
    #[error("a parenthesized list is only valid before `in subquery`")]
    ExprList,
    #[error("`emit` takes a column of the relation's own output")]
    EmitColumn,
    #[error(transparent)]
    TooDeep(#[from] DepthError),
}

pub type BuildResult<T> = Result<T, BuildError>;

impl BuildError {
    pub fn new(kind: BuildErrorKind) -> Self {
        Self {
            kind,
            relation: None,
            range: None,
        }
    }

    pub fn at(kind: BuildErrorKind, range: TextRange) -> Self {
        Self {
            kind,
            relation: None,
            range: Some(range),
        }
    }

    /// Attaches the relation name unless an inner call already did.
    pub fn in_relation(mut self, name: &str) -> Self {
        if self.relation.is_none() {
            self.relation = Some(name.to_owned());
        }
        self
    }

    /// Renders as a diagnostic when the error has a source position.
    pub fn to_diagnostics(&self) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        if let Some(range) = self.range {
            diagnostics
                .report(DiagnosticKind::InvalidPlan, range)
                .message(self.to_string())
                .emit();
        }
        diagnostics
    }
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(relation) = &self.relation {
            write!(f, "relation `{relation}`: ")?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for BuildError {}

impl From<BuildErrorKind> for BuildError {
    fn from(kind: BuildErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<SchemaError> for BuildError {
    fn from(err: SchemaError) -> Self {
        Self::new(err.into())
    }
}

impl From<TypeError> for BuildError {
    fn from(err: TypeError) -> Self {
        Self::new(err.into())
    }
}

impl From<DepthError> for BuildError {
    fn from(err: DepthError) -> Self {
        Self::new(err.into())
    }
}

impl From<AnchorError> for BuildError {
    fn from(err: AnchorError) -> Self {
        Self::new(err.into())
    }
}
