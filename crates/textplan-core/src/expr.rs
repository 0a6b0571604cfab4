//! Scalar expressions owned by relation nodes.

use serde::{Deserialize, Serialize};

use crate::extensions::Anchor;
use crate::rel::Rel;
use crate::types::{Type, TypeError, TypeKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Field(FieldRef),
    Literal(Literal),
    Function(FunctionCall),
    Cast(Cast),
    Subquery(Subquery),
}

keyword_enum! {
    pub enum SetPredicateOp {
        Exists = 1 => "exists",
        Unique = 2 => "unique",
    }
}

keyword_enum! {
    pub enum ComparisonOp {
        Eq = 1 => "eq",
        Ne = 2 => "ne",
        Lt = 3 => "lt",
        Gt = 4 => "gt",
        Le = 5 => "le",
        Ge = 6 => "ge",
    }
}

keyword_enum! {
    pub enum ReductionOp {
        Any = 1 => "any",
        All = 2 => "all",
    }
}

/// Relation evaluated inside an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Subquery {
    /// Produces exactly one column; the value of its single row.
    Scalar(Box<Rel>),
    /// `(a, b) IN (...)`: one needle per haystack column.
    InPredicate { needles: Vec<Expr>, haystack: Box<Rel> },
    /// `EXISTS (...)` or `UNIQUE (...)`.
    SetPredicate { op: SetPredicateOp, rel: Box<Rel> },
    /// `left <comparison> ANY|ALL (...)` against a one-column relation.
    SetComparison {
        left: Box<Expr>,
        comparison: ComparisonOp,
        reduction: ReductionOp,
        right: Box<Rel>,
    },
}

/// Positional reference into the input columns of the owning relation.
///
/// `path` walks into nested structs, one child index per step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub index: u32,
    pub path: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub value: LiteralValue,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    /// Unscaled value; the scale comes from the literal's decimal type.
    Decimal(i128),
    String(String),
    /// Key-value pairs of a `map<K, V>` literal.
    Map(Vec<(LiteralValue, LiteralValue)>),
    /// One value per field of a `struct<...>` literal.
    Struct(Vec<LiteralValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub anchor: Anchor,
    pub args: Vec<Expr>,
    pub output: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cast {
    pub input: Box<Expr>,
    pub ty: Type,
}

impl Expr {
    pub fn field(index: u32) -> Self {
        Expr::Field(FieldRef {
            index,
            path: Vec::new(),
        })
    }

    /// Plain field reference without a nested path.
    pub fn as_plain_field(&self) -> Option<u32> {
        match self {
            Expr::Field(FieldRef { index, path }) if path.is_empty() => Some(*index),
            _ => None,
        }
    }

    /// Visits this expression and its sub-expressions in pre-order.
    /// Subquery relations are not entered, but the needles and left
    /// operand of a subquery predicate are.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Function(call) => call.args.iter().for_each(|a| a.walk(f)),
            Expr::Cast(cast) => cast.input.walk(f),
            Expr::Subquery(Subquery::InPredicate { needles, .. }) => {
                needles.iter().for_each(|n| n.walk(f))
            }
            Expr::Subquery(Subquery::SetComparison { left, .. }) => left.walk(f),
            Expr::Field(_) | Expr::Literal(_) | Expr::Subquery(_) => {}
        }
    }
}

impl Subquery {
    /// The relation the subquery evaluates.
    pub fn rel(&self) -> &Rel {
        match self {
            Subquery::Scalar(rel) => rel,
            Subquery::InPredicate { haystack, .. } => haystack,
            Subquery::SetPredicate { rel, .. } => rel,
            Subquery::SetComparison { right, .. } => right,
        }
    }

    pub fn rel_mut(&mut self) -> &mut Rel {
        match self {
            Subquery::Scalar(rel) => rel,
            Subquery::InPredicate { haystack, .. } => haystack,
            Subquery::SetPredicate { rel, .. } => rel,
            Subquery::SetComparison { right, .. } => right,
        }
    }
}

impl LiteralValue {
    pub fn is_composite(&self) -> bool {
        matches!(self, LiteralValue::Map(_) | LiteralValue::Struct(_))
    }

    fn describe(&self) -> &'static str {
        match self {
            LiteralValue::Null => "null",
            LiteralValue::Boolean(_) => "boolean",
            LiteralValue::Integer(_) => "integer",
            LiteralValue::Float(_) => "float",
            LiteralValue::Decimal(_) => "decimal",
            LiteralValue::String(_) => "string",
            LiteralValue::Map(_) => "map",
            LiteralValue::Struct(_) => "struct",
        }
    }

    /// Whether this value's form fits `ty`, element types included.
    fn fits(&self, ty: &Type) -> bool {
        match self {
            LiteralValue::Null => ty.nullable,
            LiteralValue::Boolean(_) => ty.kind == TypeKind::Boolean,
            LiteralValue::Integer(v) => integer_fits(*v, &ty.kind),
            LiteralValue::Float(_) => ty.is_float(),
            LiteralValue::Decimal(_) => ty.is_decimal(),
            LiteralValue::String(_) => ty.is_textual(),
            LiteralValue::Map(entries) => match &ty.kind {
                TypeKind::Map(key, value) => entries.iter().all(|(k, v)| k.fits(key) && v.fits(value)),
                _ => false,
            },
            LiteralValue::Struct(values) => match &ty.kind {
                TypeKind::Struct(fields) => {
                    values.len() == fields.len()
                        && values.iter().zip(fields).all(|(v, f)| v.fits(f))
                }
                _ => false,
            },
        }
    }

    /// First decimal whose digits overflow the precision of its type.
    fn overflowing_decimal(&self, ty: &Type) -> Option<i128> {
        match (self, &ty.kind) {
            (LiteralValue::Decimal(v), TypeKind::Decimal { precision, .. }) => {
                (!decimal_fits(*v, *precision)).then_some(*v)
            }
            (LiteralValue::Map(entries), TypeKind::Map(key, value)) => entries
                .iter()
                .find_map(|(k, v)| k.overflowing_decimal(key).or_else(|| v.overflowing_decimal(value))),
            (LiteralValue::Struct(values), TypeKind::Struct(fields)) => values
                .iter()
                .zip(fields)
                .find_map(|(v, f)| v.overflowing_decimal(f)),
            _ => None,
        }
    }
}

impl Literal {
    /// Checks that the value's form fits the declared type.
    pub fn check(&self) -> Result<(), TypeError> {
        self.ty.validate()?;
        if let Some(v) = self.value.overflowing_decimal(&self.ty) {
            return Err(TypeError::DecimalDigits(v.to_string()));
        }
        if self.value.fits(&self.ty) {
            return Ok(());
        }
        Err(TypeError::LiteralMismatch {
            literal: self.value.describe(),
            ty: self.ty.kind.keyword().unwrap_or("user-defined").to_owned(),
        })
    }
}

fn decimal_fits(v: i128, precision: u8) -> bool {
    v.unsigned_abs() < 10u128.pow(u32::from(precision))
}

fn integer_fits(v: i64, kind: &TypeKind) -> bool {
    match kind {
        TypeKind::I8 => i8::try_from(v).is_ok(),
        TypeKind::I16 => i16::try_from(v).is_ok(),
        TypeKind::I32 => i32::try_from(v).is_ok(),
        TypeKind::I64 => true,
        _ => false,
    }
}
