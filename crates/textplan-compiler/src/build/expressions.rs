//! Scalar expression lowering.
//!
//! Column references become positional [`FieldRef`]s against the scope the
//! caller passes in: the input columns for most properties, the join scope
//! for join conditions, the join output for post-join filters.

use textplan_core::{
    Cast, Column, ComparisonOp, Expr, FieldRef, FunctionCall, ReductionOp, SetPredicateOp,
    Subquery, Type, derive,
};

use super::Builder;
use super::error::{BuildError, BuildErrorKind, BuildResult};
use crate::parser::ast::{self, SubqueryForm};

fn name_keyword<T>(
    name: &ast::Name,
    what: &'static str,
    from_name: fn(&str) -> Option<T>,
) -> BuildResult<T> {
    from_name(&name.text()).ok_or_else(|| {
        BuildError::at(
            BuildErrorKind::UnknownKeyword {
                what,
                found: name.text(),
            },
            name.range(),
        )
    })
}

/// Index of the single column matching a reference, by name or by
/// `qualifier.name`.
pub(crate) fn lookup_column(
    scope: &[Column],
    qualifier: Option<&str>,
    name: &str,
) -> Result<u32, BuildErrorKind> {
    let display = || match qualifier {
        Some(q) => format!("{q}.{name}"),
        None => name.to_owned(),
    };
    let mut matches = scope.iter().enumerate().filter(|(_, c)| {
        c.name == name && qualifier.is_none_or(|q| c.qualifier.as_deref() == Some(q))
    });
    let Some((index, _)) = matches.next() else {
        return Err(BuildErrorKind::UnknownColumn(display()));
    };
    if matches.next().is_some() {
        return Err(BuildErrorKind::AmbiguousColumn(display()));
    }
    Ok(index as u32)
}

impl Builder<'_> {
    /// Lowers a top-level expression and checks it against `scope`.
    pub(super) fn lower_expr(&mut self, expr: &ast::Expr, scope: &[Column]) -> BuildResult<Expr> {
        let lowered = self.lower_expr_inner(expr, scope)?;
        derive::expr_type(&lowered, scope, &self.plan.schemas)
            .map_err(|e| BuildError::at(e.into(), expr.range()))?;
        Ok(lowered)
    }

    fn lower_expr_inner(&mut self, expr: &ast::Expr, scope: &[Column]) -> BuildResult<Expr> {
        match expr {
            ast::Expr::Literal(lit) => self.lower_literal(lit).map(Expr::Literal),
            ast::Expr::Call(call) => self.lower_call(call, scope).map(Expr::Function),
            ast::Expr::Column(col) => self.lower_column(col, scope).map(Expr::Field),
            ast::Expr::Subquery(subquery) => self.lower_subquery(subquery, scope).map(Expr::Subquery),
            ast::Expr::Paren(paren) => match paren.exprs().as_slice() {
                [inner] => self.lower_expr_inner(inner, scope),
                [] => Err(BuildError::at(
                    BuildErrorKind::Unresolved("expression".to_owned()),
                    paren.range(),
                )),
                _ => Err(BuildError::at(BuildErrorKind::ExprList, paren.range())),
            },
            ast::Expr::Cast(cast) => {
                let (Some(input), Some(ty)) = (cast.expr(), cast.ty()) else {
                    return Err(BuildError::at(
                        BuildErrorKind::Unresolved("cast".to_owned()),
                        cast.range(),
                    ));
                };
                let input = self.lower_expr_inner(&input, scope)?;
                let ty = self.lower_type(&ty)?;
                Ok(Expr::Cast(Cast {
                    input: Box::new(input),
                    ty,
                }))
            }
        }
    }

    fn lower_subquery(
        &mut self,
        subquery: &ast::SubqueryExpr,
        scope: &[Column],
    ) -> BuildResult<Subquery> {
        let range = subquery.range();
        let at = |kind: BuildErrorKind| BuildError::at(kind, range);
        let name = subquery.name().map(|n| n.text()).unwrap_or_default();
        let rel = Box::new(
            self.built(&name)
                .map_err(|e| BuildError { range: Some(range), ..e })?
                .rel
                .clone(),
        );

        let lowered = match subquery.form() {
            SubqueryForm::Scalar => Subquery::Scalar(rel),
            SubqueryForm::In => {
                let operand = subquery
                    .operand()
                    .ok_or_else(|| at(BuildErrorKind::Unresolved("`in` operand".to_owned())))?;
                let operands = match &operand {
                    ast::Expr::Paren(paren) => paren.exprs(),
                    _ => vec![operand],
                };
                let mut needles = Vec::with_capacity(operands.len());
                for needle in &operands {
                    needles.push(self.lower_expr_inner(needle, scope)?);
                }
                Subquery::InPredicate {
                    needles,
                    haystack: rel,
                }
            }
            SubqueryForm::SetPredicate(op) => {
                let op = SetPredicateOp::from_name(op.text()).ok_or_else(|| {
                    at(BuildErrorKind::UnknownKeyword {
                        what: "set predicate",
                        found: op.text().to_owned(),
                    })
                })?;
                Subquery::SetPredicate { op, rel }
            }
            SubqueryForm::SetComparison {
                comparison,
                reduction,
            } => {
                let operand = subquery
                    .operand()
                    .ok_or_else(|| at(BuildErrorKind::Unresolved("comparison operand".to_owned())))?;
                let left = self.lower_expr_inner(&operand, scope)?;
                Subquery::SetComparison {
                    left: Box::new(left),
                    comparison: name_keyword(&comparison, "comparison", ComparisonOp::from_name)?,
                    reduction: name_keyword(&reduction, "reduction", ReductionOp::from_name)?,
                    right: rel,
                }
            }
        };
        Ok(lowered)
    }

    pub(super) fn lower_call(
        &mut self,
        call: &ast::CallExpr,
        scope: &[Column],
    ) -> BuildResult<FunctionCall> {
        let name = call.name().map(|n| n.text()).unwrap_or_default();
        let entry = self
            .table
            .function(&name)
            .ok_or_else(|| BuildError::at(BuildErrorKind::Unresolved(name.clone()), call.range()))?;
        let anchor = self.plan.extensions.register_function(&entry.uri, &entry.name);

        let mut args = Vec::new();
        for arg in call.args() {
            args.push(self.lower_expr_inner(&arg, scope)?);
        }
        let output = match call.output() {
            Some(ty) => self.lower_type(&ty)?,
            None => Type::boolean(),
        };
        Ok(FunctionCall {
            anchor,
            args,
            output,
        })
    }

    fn lower_column(&self, col: &ast::ColumnRef, scope: &[Column]) -> BuildResult<FieldRef> {
        let at = |kind| BuildError::at(kind, col.range());

        let index = if let Some(token) = col.positional() {
            let text = token.text();
            let index: u32 = text[1..]
                .parse()
                .map_err(|_| at(BuildErrorKind::InvalidNumber(text.to_owned())))?;
            if index as usize >= scope.len() {
                return Err(at(BuildErrorKind::UnknownColumn(text.to_owned())));
            }
            index
        } else {
            match col.names().as_slice() {
                [name] => lookup_column(scope, None, &name.text()).map_err(at)?,
                [qualifier, name] => {
                    lookup_column(scope, Some(&qualifier.text()), &name.text()).map_err(at)?
                }
                _ => return Err(at(BuildErrorKind::Unresolved("column".to_owned()))),
            }
        };

        let mut path = Vec::new();
        for suffix in col.indices() {
            let Some(number) = suffix.number() else {
                continue;
            };
            let step = number
                .text()
                .parse()
                .map_err(|_| at(BuildErrorKind::InvalidNumber(number.text().to_owned())))?;
            path.push(step);
        }
        Ok(FieldRef { index, path })
    }
}
