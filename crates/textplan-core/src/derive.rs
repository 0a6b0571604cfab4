//! Structural output-schema derivation.
//!
//! A relation's columns follow from its operator and its inputs' columns.
//! The builder, the decoder and the emitter all call into this module, so
//! column positions and names agree in both directions.

use crate::expr::{Expr, Subquery};
use crate::plan::SchemaDecl;
use crate::rel::{JoinType, NamedExpr, Rel, RelKind};
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Name of the relation that introduced the column.
    pub qualifier: Option<String>,
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("field index {index} is out of range for {len} input columns")]
    FieldOutOfRange { index: u32, len: usize },
    #[error("nested field {index} is out of range for a struct of {len} fields")]
    NestedOutOfRange { index: u32, len: usize },
    #[error("nested field access into a non-struct column")]
    NotAStruct,
    #[error("schema index {0} does not exist")]
    UnknownSchema(u32),
    #[error("set input {input} has {found} columns, expected {expected}")]
    SetArity {
        input: usize,
        expected: usize,
        found: usize,
    },
    #[error("relation needs {expected} inputs, found {found}")]
    InputCount { expected: usize, found: usize },
    #[error("scalar subquery must produce exactly one column, found {0}")]
    SubqueryArity(usize),
    #[error("in predicate has {needles} needles but its subquery produces {columns} columns")]
    InPredicateArity { needles: usize, columns: usize },
    #[error("emit index {index} is out of range for {len} columns")]
    EmitOutOfRange { index: u32, len: usize },
}

/// Columns visible to a join condition: left then right, unadjusted.
pub fn join_scope(left: &[Column], right: &[Column]) -> Vec<Column> {
    left.iter().chain(right).cloned().collect()
}

/// Type of an expression evaluated against `scope`.
pub fn expr_type(expr: &Expr, scope: &[Column], schemas: &[SchemaDecl]) -> Result<Type, SchemaError> {
    match expr {
        Expr::Field(field) => {
            let column = scope
                .get(field.index as usize)
                .ok_or(SchemaError::FieldOutOfRange {
                    index: field.index,
                    len: scope.len(),
                })?;
            let mut ty = &column.ty;
            for &step in &field.path {
                let crate::types::TypeKind::Struct(children) = &ty.kind else {
                    return Err(SchemaError::NotAStruct);
                };
                ty = children.get(step as usize).ok_or(SchemaError::NestedOutOfRange {
                    index: step,
                    len: children.len(),
                })?;
            }
            Ok(ty.clone())
        }
        Expr::Literal(lit) => Ok(lit.ty.clone()),
        Expr::Function(call) => {
            for arg in &call.args {
                expr_type(arg, scope, schemas)?;
            }
            Ok(call.output.clone())
        }
        Expr::Cast(cast) => {
            expr_type(&cast.input, scope, schemas)?;
            Ok(cast.ty.clone())
        }
        Expr::Subquery(subquery) => subquery_type(subquery, scope, schemas),
    }
}

fn subquery_type(subquery: &Subquery, scope: &[Column], schemas: &[SchemaDecl]) -> Result<Type, SchemaError> {
    let columns = output_columns(subquery.rel(), schemas)?;
    let single = || match columns.as_slice() {
        [only] => Ok(only.ty.clone()),
        _ => Err(SchemaError::SubqueryArity(columns.len())),
    };
    match subquery {
        Subquery::Scalar(_) => single(),
        Subquery::InPredicate { needles, .. } => {
            for needle in needles {
                expr_type(needle, scope, schemas)?;
            }
            if needles.len() != columns.len() {
                return Err(SchemaError::InPredicateArity {
                    needles: needles.len(),
                    columns: columns.len(),
                });
            }
            Ok(Type::boolean())
        }
        Subquery::SetPredicate { .. } => Ok(Type::boolean()),
        Subquery::SetComparison { left, .. } => {
            expr_type(left, scope, schemas)?;
            single()?;
            Ok(Type::boolean())
        }
    }
}

/// Output columns of a whole subtree, qualified by each node's own name.
pub fn output_columns(rel: &Rel, schemas: &[SchemaDecl]) -> Result<Vec<Column>, SchemaError> {
    let inputs = rel
        .inputs()
        .into_iter()
        .map(|input| output_columns(input, schemas))
        .collect::<Result<Vec<_>, _>>()?;
    let refs: Vec<&[Column]> = inputs.iter().map(Vec::as_slice).collect();
    node_columns(rel, &refs, schemas, rel.name.as_deref())
}

/// Output columns of one node given its inputs' columns, after its emit
/// remap.
///
/// `qualifier` names columns the node introduces; callers pass either the
/// declared name or a synthesized one.
pub fn node_columns(
    rel: &Rel,
    inputs: &[&[Column]],
    schemas: &[SchemaDecl],
    qualifier: Option<&str>,
) -> Result<Vec<Column>, SchemaError> {
    let direct = direct_columns(rel, inputs, schemas, qualifier)?;
    match &rel.emit {
        Some(emit) => apply_emit(emit, &direct),
        None => Ok(direct),
    }
}

/// Picks `emit` positions out of `columns`; repeats are allowed.
pub fn apply_emit(emit: &[u32], columns: &[Column]) -> Result<Vec<Column>, SchemaError> {
    emit.iter()
        .map(|&index| {
            columns
                .get(index as usize)
                .cloned()
                .ok_or(SchemaError::EmitOutOfRange {
                    index,
                    len: columns.len(),
                })
        })
        .collect()
}

/// Columns the node produces before its emit remap. A read's filters and
/// the `emit` property itself resolve against these.
pub fn direct_columns(
    rel: &Rel,
    inputs: &[&[Column]],
    schemas: &[SchemaDecl],
    qualifier: Option<&str>,
) -> Result<Vec<Column>, SchemaError> {
    let (min, max) = rel.tag().input_arity();
    if inputs.len() < min || max.is_some_and(|m| inputs.len() > m) {
        return Err(SchemaError::InputCount {
            expected: min,
            found: inputs.len(),
        });
    }

    match &rel.kind {
        RelKind::Read(r) => schema_columns(r.schema, schemas, qualifier),
        RelKind::ExtensionLeaf(r) => schema_columns(r.schema, schemas, qualifier),
        RelKind::Filter(_) | RelKind::Sort(_) | RelKind::Fetch(_) => Ok(inputs[0].to_vec()),
        RelKind::Project(r) => named_columns(&r.expressions, inputs[0], schemas, qualifier, "expr"),
        RelKind::Aggregate(r) => {
            let mut columns = named_columns(&r.groupings, inputs[0], schemas, qualifier, "group")?;
            for (i, m) in r.measures.iter().enumerate() {
                for arg in &m.args {
                    expr_type(arg, inputs[0], schemas)?;
                }
                columns.push(Column {
                    qualifier: qualifier.map(str::to_owned),
                    name: m.name.clone().unwrap_or_else(|| format!("measure{i}")),
                    ty: m.output.clone(),
                });
            }
            Ok(columns)
        }
        RelKind::Join(r) => Ok(join_columns(r.join_type, inputs[0], inputs[1])),
        RelKind::Cross(_) => Ok(join_scope(inputs[0], inputs[1])),
        RelKind::Set(_) => {
            let expected = inputs[0].len();
            for (i, input) in inputs.iter().enumerate().skip(1) {
                if input.len() != expected {
                    return Err(SchemaError::SetArity {
                        input: i,
                        expected,
                        found: input.len(),
                    });
                }
            }
            Ok(inputs[0].to_vec())
        }
        RelKind::ExtensionSingle(r) => match r.schema {
            Some(index) => schema_columns(index, schemas, qualifier),
            None => Ok(inputs[0].to_vec()),
        },
        RelKind::ExtensionMulti(r) => match r.schema {
            Some(index) => schema_columns(index, schemas, qualifier),
            None => Ok(inputs[0].to_vec()),
        },
    }
}

fn schema_columns(
    index: u32,
    schemas: &[SchemaDecl],
    qualifier: Option<&str>,
) -> Result<Vec<Column>, SchemaError> {
    let schema = schemas
        .get(index as usize)
        .ok_or(SchemaError::UnknownSchema(index))?;
    Ok(schema
        .fields
        .iter()
        .map(|f| Column {
            qualifier: qualifier.map(str::to_owned),
            name: f.name.clone(),
            ty: f.ty.clone(),
        })
        .collect())
}

/// Naming rule shared by projections and groupings: explicit name, else
/// the referenced column's identity, else `<fallback><position>`.
fn named_columns(
    exprs: &[NamedExpr],
    scope: &[Column],
    schemas: &[SchemaDecl],
    qualifier: Option<&str>,
    fallback: &str,
) -> Result<Vec<Column>, SchemaError> {
    exprs
        .iter()
        .enumerate()
        .map(|(i, named)| {
            let ty = expr_type(&named.expr, scope, schemas)?;
            let column = match (&named.name, named.expr.as_plain_field()) {
                (Some(name), _) => Column {
                    qualifier: qualifier.map(str::to_owned),
                    name: name.clone(),
                    ty,
                },
                (None, Some(index)) => Column {
                    ty,
                    ..scope[index as usize].clone()
                },
                (None, None) => Column {
                    qualifier: qualifier.map(str::to_owned),
                    name: format!("{fallback}{i}"),
                    ty,
                },
            };
            Ok(column)
        })
        .collect()
}

/// Output columns of a join of the given type.
pub fn join_columns(join_type: JoinType, left: &[Column], right: &[Column]) -> Vec<Column> {
    let nullable = |cols: &[Column]| -> Vec<Column> {
        cols.iter()
            .map(|c| Column {
                ty: c.ty.clone().with_nullable(true),
                ..c.clone()
            })
            .collect()
    };
    let mark = || Column {
        qualifier: None,
        name: "mark".to_owned(),
        ty: Type::boolean(),
    };

    match join_type {
        JoinType::Inner => join_scope(left, right),
        JoinType::Left | JoinType::LeftSingle => join_scope(left, &nullable(right)),
        JoinType::Right | JoinType::RightSingle => join_scope(&nullable(left), right),
        JoinType::Outer => join_scope(&nullable(left), &nullable(right)),
        JoinType::LeftSemi | JoinType::LeftAnti => left.to_vec(),
        JoinType::RightSemi | JoinType::RightAnti => right.to_vec(),
        JoinType::LeftMark => left.iter().cloned().chain([mark()]).collect(),
        JoinType::RightMark => right.iter().cloned().chain([mark()]).collect(),
    }
}
