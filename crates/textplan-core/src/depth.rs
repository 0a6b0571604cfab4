//! Nesting depth of plan trees.
//!
//! Depth counts every relation, expression, type and composite literal
//! value on the deepest path, the way the wire decoder counts them while
//! reading. The builder, the encoder and the emitter check against the
//! same limit, so no side produces a plan another side refuses.
//!
//! The walk keeps its own stack, so arbitrarily deep trees are measured
//! without recursion.

use crate::expr::{Expr, LiteralValue, Subquery};
use crate::plan::Plan;
use crate::rel::{Rel, RelKind};
use crate::types::{Type, TypeKind};

/// Default bound on relation, expression and type nesting.
pub const DEFAULT_MAX_DEPTH: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("plan nesting exceeds the depth limit of {limit}")]
pub struct DepthError {
    pub limit: u32,
}

#[derive(Clone, Copy)]
enum Node<'a> {
    Rel(&'a Rel),
    Expr(&'a Expr),
    Type(&'a Type),
    Value(&'a LiteralValue),
}

pub fn rel_depth(rel: &Rel) -> u32 {
    measure(Node::Rel(rel))
}

pub fn expr_depth(expr: &Expr) -> u32 {
    measure(Node::Expr(expr))
}

pub fn type_depth(ty: &Type) -> u32 {
    measure(Node::Type(ty))
}

/// Fails as soon as a path through `rel` is longer than `limit`.
pub fn check_rel(rel: &Rel, limit: u32) -> Result<(), DepthError> {
    deepest(Node::Rel(rel), Some(limit)).map(drop)
}

pub fn check_type(ty: &Type, limit: u32) -> Result<(), DepthError> {
    deepest(Node::Type(ty), Some(limit)).map(drop)
}

impl Plan {
    /// Checks schema field types and every root against `limit`.
    pub fn check_depth(&self, limit: u32) -> Result<(), DepthError> {
        for field in self.schemas.iter().flat_map(|s| &s.fields) {
            check_type(&field.ty, limit)?;
        }
        self.roots.iter().try_for_each(|root| check_rel(root, limit))
    }
}

fn measure(root: Node<'_>) -> u32 {
    deepest(root, None).unwrap_or(u32::MAX)
}

fn deepest(root: Node<'_>, limit: Option<u32>) -> Result<u32, DepthError> {
    let mut stack = vec![(root, 1u32)];
    let mut max = 0;
    while let Some((node, depth)) = stack.pop() {
        if let Some(limit) = limit.filter(|limit| depth > *limit) {
            return Err(DepthError { limit });
        }
        max = max.max(depth);
        let mut push = |child| stack.push((child, depth + 1));
        match node {
            Node::Rel(rel) => {
                rel.inputs().into_iter().for_each(|r| push(Node::Rel(r)));
                rel.expressions().into_iter().for_each(|e| push(Node::Expr(e)));
                if let RelKind::Aggregate(agg) = &rel.kind {
                    agg.measures.iter().for_each(|m| push(Node::Type(&m.output)));
                }
            }
            Node::Expr(expr) => match expr {
                Expr::Field(_) => {}
                Expr::Literal(lit) => {
                    push(Node::Type(&lit.ty));
                    if lit.value.is_composite() {
                        push(Node::Value(&lit.value));
                    }
                }
                Expr::Function(call) => {
                    push(Node::Type(&call.output));
                    call.args.iter().for_each(|a| push(Node::Expr(a)));
                }
                Expr::Cast(cast) => {
                    push(Node::Type(&cast.ty));
                    push(Node::Expr(&cast.input));
                }
                Expr::Subquery(subquery) => {
                    match subquery {
                        Subquery::InPredicate { needles, .. } => {
                            needles.iter().for_each(|n| push(Node::Expr(n)))
                        }
                        Subquery::SetComparison { left, .. } => push(Node::Expr(left)),
                        Subquery::Scalar(_) | Subquery::SetPredicate { .. } => {}
                    }
                    push(Node::Rel(subquery.rel()));
                }
            },
            Node::Type(ty) => match &ty.kind {
                TypeKind::List(item) => push(Node::Type(item)),
                TypeKind::Map(key, value) => {
                    push(Node::Type(key));
                    push(Node::Type(value));
                }
                TypeKind::Struct(fields) => fields.iter().for_each(|f| push(Node::Type(f))),
                _ => {}
            },
            Node::Value(value) => {
                let children: Vec<&LiteralValue> = match value {
                    LiteralValue::Map(entries) => entries.iter().flat_map(|(k, v)| [k, v]).collect(),
                    LiteralValue::Struct(values) => values.iter().collect(),
                    _ => Vec::new(),
                };
                children
                    .into_iter()
                    .filter(|v| v.is_composite())
                    .for_each(|v| push(Node::Value(v)));
            }
        }
    }
    Ok(max)
}
