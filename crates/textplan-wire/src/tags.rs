//! Wire tags for body elements. Tag 0 always means "absent".
//!
//! Relation tags are [`RelTag`](textplan_core::RelTag) discriminants and the
//! small enums (join type, set op, ...) use their own `repr(u8)` values.

use textplan_core::TypeKind;

pub(crate) const ABSENT: u8 = 0;

pub(crate) mod ty {
    pub const BOOLEAN: u8 = 1;
    pub const I8: u8 = 2;
    pub const I16: u8 = 3;
    pub const I32: u8 = 4;
    pub const I64: u8 = 5;
    pub const FP32: u8 = 6;
    pub const FP64: u8 = 7;
    pub const STRING: u8 = 8;
    pub const BINARY: u8 = 9;
    pub const TIMESTAMP: u8 = 10;
    pub const TIMESTAMP_TZ: u8 = 11;
    pub const DATE: u8 = 12;
    pub const TIME: u8 = 13;
    pub const INTERVAL_YEAR: u8 = 14;
    pub const INTERVAL_DAY: u8 = 15;
    pub const UUID: u8 = 16;
    pub const FIXED_CHAR: u8 = 17;
    pub const VAR_CHAR: u8 = 18;
    pub const FIXED_BINARY: u8 = 19;
    pub const DECIMAL: u8 = 20;
    pub const LIST: u8 = 21;
    pub const MAP: u8 = 22;
    pub const STRUCT: u8 = 23;
    pub const USER_DEFINED: u8 = 24;
}

pub(crate) mod expr {
    pub const FIELD: u8 = 1;
    pub const LITERAL: u8 = 2;
    pub const FUNCTION: u8 = 3;
    pub const CAST: u8 = 4;
    pub const SUBQUERY: u8 = 5;
}

pub(crate) mod value {
    pub const NULL: u8 = 1;
    pub const BOOLEAN: u8 = 2;
    pub const INTEGER: u8 = 3;
    pub const FLOAT: u8 = 4;
    pub const DECIMAL: u8 = 5;
    pub const STRING: u8 = 6;
    pub const MAP: u8 = 7;
    pub const STRUCT: u8 = 8;
}

/// Follows [`expr::SUBQUERY`].
pub(crate) mod subquery {
    pub const SCALAR: u8 = 1;
    pub const IN_PREDICATE: u8 = 2;
    pub const SET_PREDICATE: u8 = 3;
    pub const SET_COMPARISON: u8 = 4;
}

pub(crate) mod source {
    pub const NAMED_TABLE: u8 = 1;
    pub const LOCAL_FILES: u8 = 2;
    pub const VIRTUAL_TABLE: u8 = 3;
    pub const EXTENSION_TABLE: u8 = 4;
}

/// Presence bits for optional file item fields.
pub(crate) mod file_flags {
    pub const PARTITION: u8 = 1 << 0;
    pub const START: u8 = 1 << 1;
    pub const LENGTH: u8 = 1 << 2;
    pub const ALL: u8 = PARTITION | START | LENGTH;
}

/// Tag of a parameterless kind, `None` for parameterized ones.
pub(crate) fn primitive_tag(kind: &TypeKind) -> Option<u8> {
    let tag = match kind {
        TypeKind::Boolean => ty::BOOLEAN,
        TypeKind::I8 => ty::I8,
        TypeKind::I16 => ty::I16,
        TypeKind::I32 => ty::I32,
        TypeKind::I64 => ty::I64,
        TypeKind::Fp32 => ty::FP32,
        TypeKind::Fp64 => ty::FP64,
        TypeKind::String => ty::STRING,
        TypeKind::Binary => ty::BINARY,
        TypeKind::Timestamp => ty::TIMESTAMP,
        TypeKind::TimestampTz => ty::TIMESTAMP_TZ,
        TypeKind::Date => ty::DATE,
        TypeKind::Time => ty::TIME,
        TypeKind::IntervalYear => ty::INTERVAL_YEAR,
        TypeKind::IntervalDay => ty::INTERVAL_DAY,
        TypeKind::Uuid => ty::UUID,
        _ => return None,
    };
    Some(tag)
}

pub(crate) fn primitive_kind(tag: u8) -> Option<TypeKind> {
    let kind = match tag {
        ty::BOOLEAN => TypeKind::Boolean,
        ty::I8 => TypeKind::I8,
        ty::I16 => TypeKind::I16,
        ty::I32 => TypeKind::I32,
        ty::I64 => TypeKind::I64,
        ty::FP32 => TypeKind::Fp32,
        ty::FP64 => TypeKind::Fp64,
        ty::STRING => TypeKind::String,
        ty::BINARY => TypeKind::Binary,
        ty::TIMESTAMP => TypeKind::Timestamp,
        ty::TIMESTAMP_TZ => TypeKind::TimestampTz,
        ty::DATE => TypeKind::Date,
        ty::TIME => TypeKind::Time,
        ty::INTERVAL_YEAR => TypeKind::IntervalYear,
        ty::INTERVAL_DAY => TypeKind::IntervalDay,
        ty::UUID => TypeKind::Uuid,
        _ => return None,
    };
    Some(kind)
}
