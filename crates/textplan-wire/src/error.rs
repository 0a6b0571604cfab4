use textplan_core::{AnchorError, DepthError, SchemaError, TypeError};

use crate::VERSION;

/// Failure while serializing a plan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("too many {what}: {count} does not fit in u32")]
    TooMany { what: &'static str, count: usize },
    #[error(transparent)]
    Anchor(#[from] AnchorError),
    #[error("schema index {0} does not exist")]
    SchemaOutOfRange(u32),
    #[error("source index {0} does not exist")]
    SourceOutOfRange(u32),
    #[error(transparent)]
    TooDeep(#[from] DepthError),
}

/// Failure while reading a plan buffer, with the byte offset where the
/// problem was detected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at byte {offset}")]
pub struct DecodeError {
    pub kind: DecodeErrorKind,
    pub offset: usize,
}

impl DecodeError {
    pub fn new(kind: DecodeErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeErrorKind {
    #[error("unexpected end of input")]
    Truncated,
    #[error("invalid magic: expected TPLN")]
    BadMagic,
    #[error("unsupported version {0} (expected {VERSION})")]
    UnsupportedVersion(u32),
    #[error("size mismatch: header says {header} bytes, got {actual}")]
    SizeMismatch { header: u32, actual: usize },
    #[error("checksum mismatch: header has {expected:#010x}, content hashes to {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("section layout is inconsistent with the header counts")]
    BadLayout,
    #[error("malformed string table")]
    BadStringTable,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("string id {0} is out of range")]
    StringOutOfRange(u32),
    #[error("unknown {what} tag {tag}")]
    UnknownTag { what: &'static str, tag: u8 },
    #[error("missing required {0}")]
    MissingRequired(&'static str),
    #[error("{what} anchor {anchor} is out of range")]
    AnchorOutOfRange { what: &'static str, anchor: u32 },
    #[error("duplicate extension entry")]
    DuplicateExtension,
    #[error("schema index {0} is out of range")]
    SchemaOutOfRange(u32),
    #[error("source index {0} is out of range")]
    SourceOutOfRange(u32),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error("nesting exceeds the depth limit of {0}")]
    TooDeep(u32),
    #[error("trailing bytes after the plan body")]
    TrailingBytes,
    #[error("invalid flag bits")]
    InvalidFlag,
    #[error("fetch offset {offset} and count {count} are out of range")]
    InvalidFetch { offset: i64, count: i64 },
    #[error("root has {columns} columns but {names} names")]
    RootNames { names: usize, columns: usize },
}
