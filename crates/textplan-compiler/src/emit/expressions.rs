//! Types, literals and scalar expressions as text.

use std::collections::VecDeque;

use textplan_core::{AnchorError, Column, Expr, Literal, LiteralValue, Subquery, Type, TypeKind};

use super::names::quote;
use super::{EmitError, Emitter};
use crate::build::lookup_column;
use crate::parser::lexer::escape_string;

impl Emitter<'_> {
    pub(super) fn type_text(&self, ty: &Type) -> Result<String, EmitError> {
        let mut out = match &ty.kind {
            TypeKind::UserDefined(anchor) => self
                .types
                .get(anchor)
                .cloned()
                .ok_or(AnchorError::DanglingType(*anchor))?,
            kind => kind.keyword().unwrap_or_default().to_owned(),
        };
        if ty.nullable {
            out.push('?');
        }

        let params = match &ty.kind {
            TypeKind::FixedChar(n) | TypeKind::VarChar(n) | TypeKind::FixedBinary(n) => {
                vec![n.to_string()]
            }
            TypeKind::Decimal { precision, scale } => {
                vec![precision.to_string(), scale.to_string()]
            }
            TypeKind::List(item) => vec![self.type_text(item)?],
            TypeKind::Map(key, value) => vec![self.type_text(key)?, self.type_text(value)?],
            TypeKind::Struct(fields) => {
                let mut params = Vec::with_capacity(fields.len());
                for field in fields {
                    params.push(self.type_text(field)?);
                }
                params
            }
            _ => return Ok(out),
        };
        out.push('<');
        out.push_str(&params.join(", "));
        out.push('>');
        Ok(out)
    }

    /// Expression text against `scope`. Subquery names are taken from the
    /// front of `subqueries`, which holds them in expression walk order.
    pub(super) fn expr_text(
        &self,
        expr: &Expr,
        scope: &[Column],
        subqueries: &mut VecDeque<String>,
    ) -> Result<String, EmitError> {
        match expr {
            Expr::Field(field) => {
                let mut out = column_ref(field.index, scope);
                for step in &field.path {
                    out.push_str(&format!("[{step}]"));
                }
                Ok(out)
            }
            Expr::Literal(lit) => self.literal_text(lit),
            Expr::Function(call) => {
                let name = self
                    .functions
                    .get(&call.anchor)
                    .ok_or(AnchorError::DanglingFunction(call.anchor))?;
                let mut args = Vec::with_capacity(call.args.len());
                for arg in &call.args {
                    args.push(self.expr_text(arg, scope, subqueries)?);
                }
                Ok(format!(
                    "{name}({}) -> {}",
                    args.join(", "),
                    self.type_text(&call.output)?
                ))
            }
            Expr::Cast(cast) => {
                let input = self.expr_text(&cast.input, scope, subqueries)?;
                Ok(format!("{input} as {}", self.type_text(&cast.ty)?))
            }
            Expr::Subquery(subquery) => {
                // names are queued in walk order, which visits this
                // subquery before the ones nested in its operands
                let name = subqueries.pop_front().unwrap_or_default();
                let tail = format!("subquery {}", quote(&name)?);
                match subquery {
                    Subquery::Scalar(_) => Ok(tail),
                    Subquery::InPredicate { needles, .. } => {
                        let mut texts = Vec::with_capacity(needles.len());
                        for needle in needles {
                            texts.push(self.expr_text(needle, scope, subqueries)?);
                        }
                        Ok(format!("({}) in {tail}", texts.join(", ")))
                    }
                    Subquery::SetPredicate { op, .. } => Ok(format!("{op} in {tail}")),
                    Subquery::SetComparison {
                        left,
                        comparison,
                        reduction,
                        ..
                    } => {
                        let left = self.expr_text(left, scope, subqueries)?;
                        Ok(format!("{left} {comparison} {reduction} {tail}"))
                    }
                }
            }
        }
    }

    /// Scalars at their default type are bare; anything else carries a
    /// `_type` suffix, or `::type` for user-defined types.
    fn literal_text(&self, lit: &Literal) -> Result<String, EmitError> {
        let default = match &lit.value {
            LiteralValue::Boolean(_) => Some(TypeKind::Boolean),
            LiteralValue::Integer(_) => Some(TypeKind::I64),
            LiteralValue::Float(_) => Some(TypeKind::Fp64),
            LiteralValue::String(_) => Some(TypeKind::String),
            LiteralValue::Null
            | LiteralValue::Decimal(_)
            | LiteralValue::Map(_)
            | LiteralValue::Struct(_) => None,
        };
        let text = value_text(&lit.value, &lit.ty)?;
        if default.is_some_and(|kind| lit.ty == Type::new(kind)) {
            return Ok(text);
        }
        let separator = match lit.ty.kind {
            TypeKind::UserDefined(_) => "::",
            _ => "_",
        };
        Ok(format!("{text}{separator}{}", self.type_text(&lit.ty)?))
    }
}

/// The value alone. Elements of a composite take their type from the
/// enclosing literal's type, so they are written without a suffix.
fn value_text(value: &LiteralValue, ty: &Type) -> Result<String, EmitError> {
    let text = match value {
        LiteralValue::Null => "null".to_owned(),
        LiteralValue::Boolean(b) => b.to_string(),
        LiteralValue::Integer(v) => v.to_string(),
        LiteralValue::Float(v) => {
            if !v.is_finite() {
                return Err(EmitError::NonFiniteFloat(v.to_string()));
            }
            // Debug keeps a `.` or exponent, so the text re-lexes as a float
            format!("{v:?}")
        }
        LiteralValue::Decimal(v) => {
            let scale = match ty.kind {
                TypeKind::Decimal { scale, .. } => scale,
                _ => 0,
            };
            decimal_text(*v, scale)
        }
        LiteralValue::String(s) => escape_string(s),
        LiteralValue::Map(entries) => {
            let TypeKind::Map(key_ty, value_ty) = &ty.kind else {
                return Err(EmitError::CompositeType("map"));
            };
            let mut items = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                items.push(format!(
                    "{}: {}",
                    value_text(key, key_ty)?,
                    value_text(value, value_ty)?
                ));
            }
            format!("{{{}}}", items.join(", "))
        }
        LiteralValue::Struct(values) => {
            let fields = match &ty.kind {
                TypeKind::Struct(fields) if fields.len() == values.len() => fields,
                _ => return Err(EmitError::CompositeType("struct")),
            };
            let mut items = Vec::with_capacity(values.len());
            for (value, field) in values.iter().zip(fields) {
                items.push(value_text(value, field)?);
            }
            format!("{{{}}}", items.join(", "))
        }
    };
    Ok(text)
}

/// Shortest reference that resolves back to `index`: bare name, then
/// `qualifier.name`, then `$index`.
pub(super) fn column_ref(index: u32, scope: &[Column]) -> String {
    let positional = format!("${index}");
    let Some(column) = scope.get(index as usize) else {
        return positional;
    };
    let Ok(name) = quote(&column.name) else {
        return positional;
    };
    if lookup_column(scope, None, &column.name) == Ok(index) {
        return name;
    }
    if let Some(qualifier) = column.qualifier.as_deref()
        && let Ok(prefix) = quote(qualifier)
        && lookup_column(scope, Some(qualifier), &column.name) == Ok(index)
    {
        return format!("{prefix}.{name}");
    }
    positional
}

/// Unscaled decimal as plain digits with `scale` fractional places.
pub(crate) fn decimal_text(unscaled: i128, scale: u8) -> String {
    let sign = if unscaled < 0 { "-" } else { "" };
    let digits = unscaled.unsigned_abs().to_string();
    let scale = usize::from(scale);
    if scale == 0 {
        return format!("{sign}{digits}");
    }
    let padded = format!("{digits:0>width$}", width = scale + 1);
    let (int, frac) = padded.split_at(padded.len() - scale);
    format!("{sign}{int}.{frac}")
}
