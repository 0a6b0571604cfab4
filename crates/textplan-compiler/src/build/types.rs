//! Type names and literal values.

use textplan_core::{Literal, LiteralValue, Type, TypeError, TypeKind};

use super::error::{BuildError, BuildErrorKind, BuildResult};
use super::Builder;
use crate::analyze::symbol_table::is_user_type;
use crate::parser::SyntaxKind;
use crate::parser::ast::{self, CompositeItem, TypeParam};
use crate::parser::lexer::unescape_string;

impl Builder<'_> {
    pub(super) fn lower_type(&mut self, ty: &ast::Type) -> BuildResult<Type> {
        let range = ty.range();
        let at = |kind: BuildErrorKind| BuildError::at(kind, range);
        let name = ty
            .name()
            .ok_or_else(|| at(BuildErrorKind::Unresolved("type".to_owned())))?;

        let kind = if is_user_type(&name) {
            if ty.has_params() {
                return Err(at(BuildErrorKind::TypeParameters {
                    name: "user-defined type",
                    expected: "no parameters",
                }));
            }
            let text = name.text();
            let entry = self
                .table
                .type_entry(&text)
                .ok_or_else(|| at(BuildErrorKind::Unresolved(text.clone())))?;
            TypeKind::UserDefined(self.plan.extensions.register_type(&entry.uri, &entry.name))
        } else {
            self.builtin_kind(&name.text(), ty).map_err(at)?
        };

        let lowered = Type {
            kind,
            nullable: ty.nullable(),
        };
        lowered.validate().map_err(|e| at(e.into()))?;
        Ok(lowered)
    }

    fn builtin_kind(&mut self, name: &str, ty: &ast::Type) -> Result<TypeKind, BuildErrorKind> {
        if let Some(kind) = TypeKind::primitive(name) {
            if ty.has_params() {
                return Err(BuildErrorKind::TypeParameters {
                    name: kind.keyword().unwrap_or("type"),
                    expected: "no parameters",
                });
            }
            return Ok(kind);
        }

        let params = ty.params();
        let lower = name.to_ascii_lowercase();
        let kind = match (lower.as_str(), params.as_slice()) {
            ("fixedchar", [TypeParam::Number(n)]) => TypeKind::FixedChar(parse_number(n.text())?),
            ("varchar", [TypeParam::Number(n)]) => TypeKind::VarChar(parse_number(n.text())?),
            ("fixedbinary", [TypeParam::Number(n)]) => {
                TypeKind::FixedBinary(parse_number(n.text())?)
            }
            ("decimal", [TypeParam::Number(p), TypeParam::Number(s)]) => TypeKind::Decimal {
                precision: parse_number(p.text())?,
                scale: parse_number(s.text())?,
            },
            ("list", [TypeParam::Type(item)]) => {
                TypeKind::List(Box::new(self.lower_type(item).map_err(|e| e.kind)?))
            }
            ("map", [TypeParam::Type(key), TypeParam::Type(value)]) => TypeKind::Map(
                Box::new(self.lower_type(key).map_err(|e| e.kind)?),
                Box::new(self.lower_type(value).map_err(|e| e.kind)?),
            ),
            ("struct", fields) => {
                let mut children = Vec::with_capacity(fields.len());
                for field in fields {
                    let TypeParam::Type(field) = field else {
                        return Err(struct_params());
                    };
                    children.push(self.lower_type(field).map_err(|e| e.kind)?);
                }
                TypeKind::Struct(children)
            }
            (other, _) => return Err(parameter_error(other)),
        };
        Ok(kind)
    }

    /// Literal with its declared or default type, checked for fit.
    pub(super) fn lower_literal(&mut self, lit: &ast::LiteralExpr) -> BuildResult<Literal> {
        let literal = self.literal_as(lit, None)?;
        literal
            .check()
            .map_err(|e| BuildError::at(e.into(), lit.range()))?;
        Ok(literal)
    }

    /// Types `lit` by its own suffix, else by the slot it fills in an
    /// enclosing composite, else by its value.
    fn literal_as(&mut self, lit: &ast::LiteralExpr, slot: Option<&Type>) -> BuildResult<Literal> {
        let range = lit.range();
        let declared = match lit.ty() {
            Some(ty) => Some(self.lower_type(&ty)?),
            None => slot.cloned(),
        };
        if let Some(composite) = lit.composite() {
            return self.composite_literal(&composite, declared);
        }
        let token = lit
            .token()
            .ok_or_else(|| BuildError::at(BuildErrorKind::Unresolved("literal".to_owned()), range))?;
        literal_value(token.kind(), token.text(), declared).map_err(|kind| BuildError::at(kind, range))
    }

    /// `{k: v, ...}` is a map, `{a, b, ...}` a struct. Without a type, the
    /// first entry fixes the map's key and value types and each element
    /// fixes its struct field.
    fn composite_literal(
        &mut self,
        composite: &ast::CompositeLiteral,
        declared: Option<Type>,
    ) -> BuildResult<Literal> {
        let range = composite.range();
        let at = |kind: BuildErrorKind| BuildError::at(kind, range);
        let items = composite.items();
        if items.is_empty() && declared.is_none() {
            return Err(at(BuildErrorKind::UntypedComposite));
        }

        let entries: Vec<&ast::MapEntry> = items
            .iter()
            .filter_map(|item| match item {
                CompositeItem::Entry(entry) => Some(entry),
                CompositeItem::Value(_) => None,
            })
            .collect();
        let is_map = match &declared {
            Some(ty) => matches!(ty.kind, TypeKind::Map(..)),
            None => !entries.is_empty(),
        };
        if !entries.is_empty() && entries.len() != items.len() {
            return Err(at(BuildErrorKind::MixedComposite));
        }

        if is_map {
            if entries.len() != items.len() {
                return Err(at(BuildErrorKind::Type(TypeError::LiteralMismatch {
                    literal: "struct",
                    ty: "map".to_owned(),
                })));
            }
            let mut slots = match declared.as_ref().map(|ty| &ty.kind) {
                Some(TypeKind::Map(key, value)) => Some(((**key).clone(), (**value).clone())),
                _ => None,
            };
            let mut pairs = Vec::with_capacity(entries.len());
            for entry in entries {
                let (Some(key), Some(value)) = (entry.key(), entry.value()) else {
                    return Err(BuildError::at(
                        BuildErrorKind::Unresolved("map entry".to_owned()),
                        entry.range(),
                    ));
                };
                let key = self.literal_as(&key, slots.as_ref().map(|s| &s.0))?;
                let value = self.literal_as(&value, slots.as_ref().map(|s| &s.1))?;
                if slots.is_none() {
                    slots = Some((key.ty.clone(), value.ty.clone()));
                }
                pairs.push((key.value, value.value));
            }
            let ty = match (declared, slots) {
                (Some(ty), _) => ty,
                (None, Some((key, value))) => Type::new(TypeKind::Map(Box::new(key), Box::new(value))),
                (None, None) => return Err(at(BuildErrorKind::UntypedComposite)),
            };
            return Ok(Literal {
                value: LiteralValue::Map(pairs),
                ty,
            });
        }

        if !entries.is_empty() {
            let ty = declared
                .as_ref()
                .and_then(|ty| ty.kind.keyword())
                .unwrap_or("user-defined");
            return Err(at(BuildErrorKind::Type(TypeError::LiteralMismatch {
                literal: "map",
                ty: ty.to_owned(),
            })));
        }
        let fields = match declared.as_ref().map(|ty| &ty.kind) {
            Some(TypeKind::Struct(fields)) => fields.clone(),
            _ => Vec::new(),
        };
        let mut values = Vec::with_capacity(items.len());
        let mut types = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let CompositeItem::Value(element) = item else {
                continue;
            };
            let element = self.literal_as(element, fields.get(i))?;
            values.push(element.value);
            types.push(element.ty);
        }
        Ok(Literal {
            value: LiteralValue::Struct(values),
            ty: declared.unwrap_or_else(|| Type::new(TypeKind::Struct(types))),
        })
    }
}

fn literal_value(
    kind: SyntaxKind,
    text: &str,
    declared: Option<Type>,
) -> Result<Literal, BuildErrorKind> {
    let with_default = |value: LiteralValue, default: TypeKind, declared: Option<Type>| Literal {
        value,
        ty: declared.unwrap_or_else(|| Type::new(default)),
    };

    let literal = match kind {
        SyntaxKind::KwNull => {
            let ty = declared.ok_or(BuildErrorKind::Type(TypeError::UntypedNull))?;
            Literal {
                value: LiteralValue::Null,
                ty: ty.with_nullable(true),
            }
        }
        SyntaxKind::KwTrue => with_default(LiteralValue::Boolean(true), TypeKind::Boolean, declared),
        SyntaxKind::KwFalse => {
            with_default(LiteralValue::Boolean(false), TypeKind::Boolean, declared)
        }
        SyntaxKind::StringLit => with_default(
            LiteralValue::String(unescape_string(text)),
            TypeKind::String,
            declared,
        ),
        SyntaxKind::Number => number_literal(text, declared)?,
        _ => return Err(BuildErrorKind::InvalidNumber(text.to_owned())),
    };
    Ok(literal)
}

fn is_float_text(text: &str) -> bool {
    text.contains(['.', 'e', 'E'])
}

fn number_literal(text: &str, declared: Option<Type>) -> Result<Literal, BuildErrorKind> {
    let invalid = || BuildErrorKind::InvalidNumber(text.to_owned());

    let Some(ty) = declared else {
        return Ok(if is_float_text(text) {
            Literal {
                value: LiteralValue::Float(text.parse().map_err(|_| invalid())?),
                ty: Type::new(TypeKind::Fp64),
            }
        } else {
            Literal {
                value: LiteralValue::Integer(text.parse().map_err(|_| invalid())?),
                ty: Type::new(TypeKind::I64),
            }
        });
    };

    let value = match &ty.kind {
        TypeKind::Decimal { scale, .. } => LiteralValue::Decimal(
            scaled_decimal(text, *scale)
                .ok_or_else(|| BuildErrorKind::Type(TypeError::DecimalDigits(text.to_owned())))?,
        ),
        _ if ty.is_float() => LiteralValue::Float(text.parse().map_err(|_| invalid())?),
        _ if is_float_text(text) => LiteralValue::Float(text.parse().map_err(|_| invalid())?),
        _ => LiteralValue::Integer(text.parse().map_err(|_| invalid())?),
    };
    Ok(Literal { value, ty })
}

/// Exact unscaled value of `text` at `scale`, or `None` when digits would
/// be lost or the value overflows.
pub(crate) fn scaled_decimal(text: &str, scale: u8) -> Option<i128> {
    let (mantissa, exponent) = match text.find(['e', 'E']) {
        Some(at) => (&text[..at], text[at + 1..].parse::<i32>().ok()?),
        None => (text, 0),
    };
    let (negative, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, mantissa),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut digits = String::with_capacity(int_part.len() + frac_part.len());
    digits.push_str(int_part);
    digits.push_str(frac_part);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    // value = digits * 10^(exponent - frac_len), rescaled to 10^-scale
    let shift = exponent - frac_part.len() as i32 + i32::from(scale);
    let mut value: i128 = digits.parse().ok()?;
    if shift >= 0 {
        value = value.checked_mul(10i128.checked_pow(shift as u32)?)?;
    } else {
        let divisor = 10i128.checked_pow(shift.unsigned_abs())?;
        if value % divisor != 0 {
            return None;
        }
        value /= divisor;
    }
    Some(if negative { -value } else { value })
}

fn parse_number<T: std::str::FromStr>(text: &str) -> Result<T, BuildErrorKind> {
    text.parse()
        .map_err(|_| BuildErrorKind::InvalidNumber(text.to_owned()))
}

fn struct_params() -> BuildErrorKind {
    BuildErrorKind::TypeParameters {
        name: "struct",
        expected: "field types",
    }
}

fn parameter_error(name: &str) -> BuildErrorKind {
    let (name, expected) = match name {
        "fixedchar" => ("fixedchar", "one length"),
        "varchar" => ("varchar", "one length"),
        "fixedbinary" => ("fixedbinary", "one length"),
        "decimal" => ("decimal", "a precision and a scale"),
        "list" => ("list", "one element type"),
        "map" => ("map", "a key type and a value type"),
        _ => ("type", "known parameters"),
    };
    BuildErrorKind::TypeParameters { name, expected }
}
