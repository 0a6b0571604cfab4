//! Column and expression types.
//!
//! Nullability is a flag on every type rather than a wrapper, matching the
//! text syntax where `?` follows the type name: `i32?`, `decimal?<18,2>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extensions::{Anchor, ExtensionRegistry};

pub const MAX_DECIMAL_PRECISION: u8 = 38;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Type {
    pub kind: TypeKind,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Boolean,
    I8,
    I16,
    I32,
    I64,
    Fp32,
    Fp64,
    String,
    Binary,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    IntervalYear,
    IntervalDay,
    Uuid,
    FixedChar(u32),
    VarChar(u32),
    FixedBinary(u32),
    Decimal { precision: u8, scale: u8 },
    List(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Struct(Vec<Type>),
    UserDefined(Anchor),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("decimal precision {0} is outside 1..={MAX_DECIMAL_PRECISION}")]
    DecimalPrecision(u8),
    #[error("decimal scale {scale} exceeds precision {precision}")]
    DecimalScale { precision: u8, scale: u8 },
    #[error("`{0}` length must be positive")]
    ZeroLength(&'static str),
    #[error("{literal} literal cannot have type `{ty}`")]
    LiteralMismatch { literal: &'static str, ty: String },
    #[error("`null` literal needs an explicit type")]
    UntypedNull,
    #[error("decimal literal `{0}` does not fit the declared precision and scale")]
    DecimalDigits(String),
}

/// Primitive (parameterless) kinds with their text names.
const PRIMITIVES: &[(&str, TypeKind)] = &[
    ("boolean", TypeKind::Boolean),
    ("i8", TypeKind::I8),
    ("i16", TypeKind::I16),
    ("i32", TypeKind::I32),
    ("i64", TypeKind::I64),
    ("fp32", TypeKind::Fp32),
    ("fp64", TypeKind::Fp64),
    ("string", TypeKind::String),
    ("binary", TypeKind::Binary),
    ("timestamp", TypeKind::Timestamp),
    ("timestamp_tz", TypeKind::TimestampTz),
    ("date", TypeKind::Date),
    ("time", TypeKind::Time),
    ("interval_year", TypeKind::IntervalYear),
    ("interval_day", TypeKind::IntervalDay),
    ("uuid", TypeKind::Uuid),
];

const PARAMETRIC: &[&str] = &[
    "fixedchar",
    "varchar",
    "fixedbinary",
    "decimal",
    "list",
    "map",
    "struct",
];

impl TypeKind {
    /// Looks up a parameterless kind by name (ASCII case-insensitive).
    pub fn primitive(name: &str) -> Option<TypeKind> {
        if name.eq_ignore_ascii_case("bool") {
            return Some(TypeKind::Boolean);
        }
        PRIMITIVES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, k)| k.clone())
    }

    /// Whether `name` spells a builtin kind, primitive or parametric.
    /// Any other name in type position is a user-defined type.
    pub fn is_builtin_name(name: &str) -> bool {
        Self::primitive(name).is_some() || PARAMETRIC.iter().any(|p| p.eq_ignore_ascii_case(name))
    }

    /// Text name without parameters. User-defined types have no fixed name.
    pub fn keyword(&self) -> Option<&'static str> {
        let name = match self {
            TypeKind::FixedChar(_) => "fixedchar",
            TypeKind::VarChar(_) => "varchar",
            TypeKind::FixedBinary(_) => "fixedbinary",
            TypeKind::Decimal { .. } => "decimal",
            TypeKind::List(_) => "list",
            TypeKind::Map(..) => "map",
            TypeKind::Struct(_) => "struct",
            TypeKind::UserDefined(_) => return None,
            primitive => {
                return PRIMITIVES
                    .iter()
                    .find(|(_, k)| k == primitive)
                    .map(|(n, _)| *n);
            }
        };
        Some(name)
    }
}

impl Type {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    pub fn nullable(kind: TypeKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    pub fn boolean() -> Self {
        Self::new(TypeKind::Boolean)
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::I8 | TypeKind::I16 | TypeKind::I32 | TypeKind::I64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self.kind, TypeKind::Fp32 | TypeKind::Fp64)
    }

    pub fn is_decimal(&self) -> bool {
        matches!(self.kind, TypeKind::Decimal { .. })
    }

    pub fn is_textual(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::String
                | TypeKind::VarChar(_)
                | TypeKind::FixedChar(_)
                | TypeKind::Binary
                | TypeKind::FixedBinary(_)
        )
    }

    /// Child type of a struct at `index`, if this is a struct.
    pub fn struct_field(&self, index: u32) -> Option<&Type> {
        match &self.kind {
            TypeKind::Struct(fields) => fields.get(index as usize),
            _ => None,
        }
    }

    /// Structural well-formedness, recursing into nested types.
    pub fn validate(&self) -> Result<(), TypeError> {
        match &self.kind {
            TypeKind::Decimal { precision, scale } => {
                if *precision == 0 || *precision > MAX_DECIMAL_PRECISION {
                    return Err(TypeError::DecimalPrecision(*precision));
                }
                if scale > precision {
                    return Err(TypeError::DecimalScale {
                        precision: *precision,
                        scale: *scale,
                    });
                }
                Ok(())
            }
            TypeKind::FixedChar(0) => Err(TypeError::ZeroLength("fixedchar")),
            TypeKind::VarChar(0) => Err(TypeError::ZeroLength("varchar")),
            TypeKind::FixedBinary(0) => Err(TypeError::ZeroLength("fixedbinary")),
            TypeKind::List(item) => item.validate(),
            TypeKind::Map(key, value) => {
                key.validate()?;
                value.validate()
            }
            TypeKind::Struct(fields) => fields.iter().try_for_each(Type::validate),
            _ => Ok(()),
        }
    }

    /// Renders the type in text syntax, naming user-defined types through
    /// the registry.
    pub fn display<'a>(&'a self, registry: &'a ExtensionRegistry) -> TypeDisplay<'a> {
        TypeDisplay { ty: self, registry }
    }
}

pub struct TypeDisplay<'a> {
    ty: &'a Type,
    registry: &'a ExtensionRegistry,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = self.ty;
        match &ty.kind {
            TypeKind::UserDefined(anchor) => match self.registry.type_ext(*anchor) {
                Some(ext) => f.write_str(&ext.name)?,
                None => write!(f, "type#{}", anchor.get())?,
            },
            kind => {
                // keyword() only fails for user-defined types
                f.write_str(kind.keyword().unwrap_or_default())?;
            }
        }
        if ty.nullable {
            f.write_str("?")?;
        }
        match &ty.kind {
            TypeKind::FixedChar(n) | TypeKind::VarChar(n) | TypeKind::FixedBinary(n) => {
                write!(f, "<{n}>")
            }
            TypeKind::Decimal { precision, scale } => write!(f, "<{precision},{scale}>"),
            TypeKind::List(item) => write!(f, "<{}>", item.display(self.registry)),
            TypeKind::Map(key, value) => write!(
                f,
                "<{}, {}>",
                key.display(self.registry),
                value.display(self.registry)
            ),
            TypeKind::Struct(fields) => {
                f.write_str("<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", field.display(self.registry))?;
                }
                f.write_str(">")
            }
            _ => Ok(()),
        }
    }
}
