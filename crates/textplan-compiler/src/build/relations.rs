//! Relation nodes: property checks and per-kind lowering.

use indexmap::IndexMap;
use rowan::TextRange;
use textplan_core::{
    AggregateRel, AggregationPhase, Column, CrossRel, Expr, ExtensionLeafRel, ExtensionMultiRel,
    ExtensionSingleRel, FetchRel, FilterRel, Invocation, JoinRel, JoinType, Measure, NamedExpr,
    ProjectRel, ReadRel, Rel, RelKind, RelTag, SetOp, SetRel, SortDirection, SortField, SortRel,
    Type, depth, derive,
};

use super::error::{BuildError, BuildErrorKind, BuildResult};
use super::{Builder, Built};
use crate::analyze::RelationEntry;
use crate::parser::SyntaxKind;
use crate::parser::ast::{self, Expr as AstExpr};

/// Properties allowed per kind. `input` is checked through arity instead.
fn allowed(tag: RelTag) -> &'static [&'static str] {
    match tag {
        RelTag::Read => &["base_schema", "source", "filter", "best_effort filter"],
        RelTag::Filter => &["input", "filter"],
        RelTag::Project => &["input", "expression"],
        RelTag::Join => &["input", "expression", "filter", "type"],
        RelTag::Cross => &["input"],
        RelTag::Fetch => &["input", "offset", "count"],
        RelTag::Aggregate => &["input", "grouping", "measure"],
        RelTag::Sort => &["input", "sort"],
        RelTag::Set => &["input", "type"],
        RelTag::ExtensionLeaf => &["base_schema", "detail"],
        RelTag::ExtensionSingle | RelTag::ExtensionMulti => &["input", "base_schema", "detail"],
    }
}

/// Properties that may appear more than once.
const REPEATED: &[&str] = &["input", "grouping", "measure", "sort", "emit"];

/// Filter behaviors accepted before `filter`.
const FILTER_BEHAVIORS: &[&str] = &["best_effort"];

/// Keyword of a property, with its filter behavior in front: `best_effort filter`.
fn property_name(prop: &ast::Property) -> String {
    let keyword = prop
        .keyword()
        .map(|k| k.text().to_ascii_lowercase())
        .unwrap_or_default();
    match prop.behavior() {
        Some((behavior, _)) => format!("{} {keyword}", behavior.to_ascii_lowercase()),
        None => keyword,
    }
}

/// Properties of one relation grouped by keyword, in source order.
struct Properties {
    tag: RelTag,
    by_name: IndexMap<String, Vec<ast::Property>>,
}

impl Properties {
    fn collect(tag: RelTag, decl: &ast::RelationDecl) -> BuildResult<Self> {
        let allowed = allowed(tag);
        let mut by_name: IndexMap<String, Vec<ast::Property>> = IndexMap::new();

        for prop in decl.properties() {
            if let Some((behavior, range)) = prop.behavior()
                && !FILTER_BEHAVIORS.contains(&behavior.to_ascii_lowercase().as_str())
            {
                return Err(BuildError::at(
                    BuildErrorKind::UnknownFilterBehavior(behavior),
                    range,
                ));
            }
            let name = property_name(&prop);
            // `expression` repeats in a projection but is the single join condition
            let repeats = REPEATED.contains(&name.as_str())
                || (name == "expression" && tag == RelTag::Project);
            if name != "emit" && !allowed.contains(&name.as_str()) {
                return Err(BuildError::at(
                    BuildErrorKind::UnexpectedProperty {
                        property: name,
                        kind: tag.name(),
                    },
                    prop.range(),
                ));
            }
            let entries = by_name.entry(name.clone()).or_default();
            if !repeats && !entries.is_empty() {
                return Err(BuildError::at(
                    BuildErrorKind::DuplicateProperty(name),
                    prop.range(),
                ));
            }
            entries.push(prop);
        }

        if let Some(block) = decl.measures().next()
            && !allowed.contains(&"measure")
        {
            return Err(BuildError::at(
                BuildErrorKind::UnexpectedProperty {
                    property: "measure".to_owned(),
                    kind: tag.name(),
                },
                block.range(),
            ));
        }

        Ok(Self { tag, by_name })
    }

    fn all(&self, name: &str) -> &[ast::Property] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    fn get(&self, name: &str) -> Option<&ast::Property> {
        self.all(name).first()
    }

    fn require(&self, name: &'static str, range: TextRange) -> BuildResult<&ast::Property> {
        self.get(name).ok_or_else(|| {
            BuildError::at(
                BuildErrorKind::MissingProperty {
                    property: name,
                    kind: self.tag.name(),
                },
                range,
            )
        })
    }
}

/// Parses a keyword operand such as a join type, accepting the long
/// `PREFIX_` spelling as well.
fn keyword<T>(
    name: &ast::Name,
    what: &'static str,
    prefix: &str,
    from_name: fn(&str) -> Option<T>,
) -> BuildResult<T> {
    let text = name.text();
    let short = match text.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &text[prefix.len()..],
        _ => text.as_str(),
    };
    from_name(short).ok_or_else(|| {
        BuildError::at(
            BuildErrorKind::UnknownKeyword {
                what,
                found: text.clone(),
            },
            name.range(),
        )
    })
}

fn number(prop: &ast::Property) -> BuildResult<i64> {
    let token = prop.number().ok_or_else(|| {
        BuildError::at(BuildErrorKind::InvalidNumber(String::new()), prop.range())
    })?;
    token.text().parse().map_err(|_| {
        BuildError::at(
            BuildErrorKind::InvalidNumber(token.text().to_owned()),
            token.text_range(),
        )
    })
}

fn operand_name(prop: &ast::Property) -> BuildResult<ast::Name> {
    prop.name().ok_or_else(|| {
        BuildError::at(BuildErrorKind::Unresolved(property_name(prop)), prop.range())
    })
}

fn operand_expr(prop: &ast::Property) -> BuildResult<AstExpr> {
    prop.expr().ok_or_else(|| {
        BuildError::at(BuildErrorKind::Unresolved(property_name(prop)), prop.range())
    })
}

impl Builder<'_> {
    pub(super) fn build_relation(&mut self, name: &str) -> BuildResult<Built> {
        let table = self.table;
        let entry = table
            .relation(name)
            .ok_or_else(|| BuildError::new(BuildErrorKind::Unresolved(name.to_owned())))?;
        self.build_entry(name, entry)
            .map_err(|e| e.in_relation(name))
    }

    fn build_entry(&mut self, name: &str, entry: &RelationEntry) -> BuildResult<Built> {
        let Some(tag) = entry.tag else {
            return Err(BuildError::at(
                BuildErrorKind::Unresolved(name.to_owned()),
                entry.name_range,
            ));
        };
        let props = Properties::collect(tag, &entry.decl)?;

        let (min, max) = tag.input_arity();
        let found = entry.inputs.len();
        if found < min || max.is_some_and(|m| found > m) {
            let expected = match max {
                Some(m) if m == min => min.to_string(),
                Some(m) => format!("{min} to {m}"),
                None => format!("at least {min}"),
            };
            return Err(BuildError::at(
                BuildErrorKind::InputArity {
                    kind: tag.name(),
                    expected,
                    found,
                },
                entry.name_range,
            ));
        }

        let inputs: Vec<Built> = entry
            .inputs
            .iter()
            .map(|input| self.built(input).cloned())
            .collect::<BuildResult<_>>()?;
        let range = entry.name_range;
        let owned = Some(name.to_owned());

        let kind = match tag {
            RelTag::Read => {
                let schema = self.schema_ref(props.require("base_schema", range)?)?;
                let source = self.source_ref(props.require("source", range)?)?;
                let scope = self.schema_scope(schema, name);
                let filter = match props.get("filter") {
                    Some(prop) => Some(self.lower_expr(&operand_expr(prop)?, &scope)?),
                    None => None,
                };
                let best_effort_filter = match props.get("best_effort filter") {
                    Some(prop) => Some(self.lower_expr(&operand_expr(prop)?, &scope)?),
                    None => None,
                };
                RelKind::Read(ReadRel {
                    schema,
                    source,
                    filter,
                    best_effort_filter,
                })
            }
            RelTag::Filter => {
                let condition = operand_expr(props.require("filter", range)?)?;
                let condition = self.lower_expr(&condition, &inputs[0].columns)?;
                RelKind::Filter(FilterRel {
                    input: Box::new(inputs[0].rel.clone()),
                    condition,
                })
            }
            RelTag::Project => {
                let expressions = self.named_exprs(props.all("expression"), &inputs[0].columns)?;
                RelKind::Project(ProjectRel {
                    input: Box::new(inputs[0].rel.clone()),
                    expressions,
                })
            }
            RelTag::Join => {
                let join_type = match props.get("type") {
                    Some(prop) => {
                        keyword(&operand_name(prop)?, "join type", "JOIN_TYPE_", JoinType::from_name)?
                    }
                    None => JoinType::Inner,
                };
                let (left, right) = (&inputs[0], &inputs[1]);
                let scope = derive::join_scope(&left.columns, &right.columns);
                let condition = operand_expr(props.require("expression", range)?)?;
                let condition = self.lower_expr(&condition, &scope)?;
                let post_filter = match props.get("filter") {
                    Some(prop) => {
                        let output = derive::join_columns(join_type, &left.columns, &right.columns);
                        Some(self.lower_expr(&operand_expr(prop)?, &output)?)
                    }
                    None => None,
                };
                RelKind::Join(JoinRel {
                    left: Box::new(left.rel.clone()),
                    right: Box::new(right.rel.clone()),
                    join_type,
                    condition,
                    post_filter,
                })
            }
            RelTag::Cross => RelKind::Cross(CrossRel {
                left: Box::new(inputs[0].rel.clone()),
                right: Box::new(inputs[1].rel.clone()),
            }),
            RelTag::Fetch => {
                let offset = props.get("offset").map(number).transpose()?.unwrap_or(0);
                let count = props.get("count").map(number).transpose()?.unwrap_or(-1);
                if offset < 0 || count < -1 {
                    return Err(BuildError::at(
                        BuildErrorKind::InvalidFetch { offset, count },
                        range,
                    ));
                }
                RelKind::Fetch(FetchRel {
                    input: Box::new(inputs[0].rel.clone()),
                    offset,
                    count,
                })
            }
            RelTag::Aggregate => {
                let scope = &inputs[0].columns;
                let groupings = self.named_exprs(props.all("grouping"), scope)?;
                let mut measures = Vec::new();
                for block in entry.decl.measures() {
                    measures.push(self.measure(&block, scope)?);
                }
                RelKind::Aggregate(AggregateRel {
                    input: Box::new(inputs[0].rel.clone()),
                    groupings,
                    measures,
                })
            }
            RelTag::Sort => {
                let mut fields = Vec::new();
                for prop in props.all("sort") {
                    let expr = self.lower_expr(&operand_expr(prop)?, &inputs[0].columns)?;
                    let direction = match prop.name() {
                        Some(by) => keyword(
                            &by,
                            "sort direction",
                            "SORT_DIRECTION_",
                            SortDirection::from_name,
                        )?,
                        None => SortDirection::default(),
                    };
                    fields.push(SortField { expr, direction });
                }
                RelKind::Sort(SortRel {
                    input: Box::new(inputs[0].rel.clone()),
                    fields,
                })
            }
            RelTag::Set => {
                let prop = props.require("type", range)?;
                let op = keyword(&operand_name(prop)?, "set operation", "SET_OP_", SetOp::from_name)?;
                RelKind::Set(SetRel {
                    inputs: inputs.iter().map(|b| b.rel.clone()).collect(),
                    op,
                })
            }
            RelTag::ExtensionLeaf => RelKind::ExtensionLeaf(ExtensionLeafRel {
                schema: self.schema_ref(props.require("base_schema", range)?)?,
                detail: detail(&props),
            }),
            RelTag::ExtensionSingle => RelKind::ExtensionSingle(ExtensionSingleRel {
                input: Box::new(inputs[0].rel.clone()),
                schema: props.get("base_schema").map(|p| self.schema_ref(p)).transpose()?,
                detail: detail(&props),
            }),
            RelTag::ExtensionMulti => RelKind::ExtensionMulti(ExtensionMultiRel {
                inputs: inputs.iter().map(|b| b.rel.clone()).collect(),
                schema: props.get("base_schema").map(|p| self.schema_ref(p)).transpose()?,
                detail: detail(&props),
            }),
        };

        let mut rel = Rel::new(owned, kind);
        let emit = props.all("emit");
        if !emit.is_empty() {
            let direct = self
                .direct_columns(&rel, &inputs, name)
                .map_err(|e| BuildError { range: Some(range), ..e })?;
            let mut indices = Vec::with_capacity(emit.len());
            for prop in emit {
                indices.push(self.emit_index(prop, &direct)?);
            }
            rel = rel.with_emit(indices);
        }
        depth::check_rel(&rel, self.max_depth).map_err(|e| BuildError::at(e.into(), range))?;

        let refs: Vec<&Built> = inputs.iter().collect();
        let columns = self
            .node_columns(&rel, &refs, name)
            .map_err(|e| BuildError { range: Some(range), ..e })?;
        Ok(Built { rel, columns })
    }

    /// `emit` names one column of the relation's own output, before any
    /// emit is applied.
    fn emit_index(&mut self, prop: &ast::Property, direct: &[Column]) -> BuildResult<u32> {
        let expr = operand_expr(prop)?;
        match self.lower_expr(&expr, direct)? {
            Expr::Field(field) if field.path.is_empty() => Ok(field.index),
            _ => Err(BuildError::at(BuildErrorKind::EmitColumn, expr.range())),
        }
    }

    fn named_exprs(
        &mut self,
        props: &[ast::Property],
        scope: &[Column],
    ) -> BuildResult<Vec<NamedExpr>> {
        let mut out = Vec::with_capacity(props.len());
        for prop in props {
            let expr = self.lower_expr(&operand_expr(prop)?, scope)?;
            out.push(NamedExpr {
                expr,
                name: prop.alias().map(|a| a.text()),
            });
        }
        Ok(out)
    }

    fn measure(&mut self, block: &ast::MeasureBlock, scope: &[Column]) -> BuildResult<Measure> {
        let mut calls = block.calls();
        let Some(call) = calls.next() else {
            return Err(BuildError::at(
                BuildErrorKind::MissingProperty {
                    property: "measure",
                    kind: "measure block",
                },
                block.range(),
            ));
        };
        if let Some(extra) = calls.next() {
            return Err(BuildError::at(
                BuildErrorKind::DuplicateProperty("measure".to_owned()),
                extra.range(),
            ));
        }

        let Some(AstExpr::Call(call_expr)) = call.call() else {
            return Err(BuildError::at(BuildErrorKind::NotACall, call.range()));
        };
        let function = self.lower_call(&call_expr, scope)?;
        let output: Type = function.output.clone();
        // Argument paths are checked the same way as top-level expressions
        for arg in &function.args {
            derive::expr_type(arg, scope, &self.plan.schemas)
                .map_err(|e| BuildError::at(e.into(), call_expr.range()))?;
        }

        let phase = match call.phase() {
            Some(phase) => keyword(
                &phase,
                "aggregation phase",
                "AGGREGATION_PHASE_",
                AggregationPhase::from_name,
            )?,
            None => AggregationPhase::default(),
        };

        let mut filter = None;
        let mut invocation = None;
        for prop in block.properties() {
            match prop.keyword_kind() {
                Some(SyntaxKind::KwFilter) => {
                    if filter.is_some() {
                        return Err(BuildError::at(
                            BuildErrorKind::DuplicateProperty("filter".to_owned()),
                            prop.range(),
                        ));
                    }
                    filter = Some(self.lower_expr(&operand_expr(&prop)?, scope)?);
                }
                Some(SyntaxKind::KwInvocation) => {
                    if invocation.is_some() {
                        return Err(BuildError::at(
                            BuildErrorKind::DuplicateProperty("invocation".to_owned()),
                            prop.range(),
                        ));
                    }
                    invocation = Some(keyword(
                        &operand_name(&prop)?,
                        "invocation",
                        "AGGREGATION_INVOCATION_",
                        Invocation::from_name,
                    )?);
                }
                _ => {
                    return Err(BuildError::at(
                        BuildErrorKind::UnexpectedProperty {
                            property: property_name(&prop),
                            kind: "measure block",
                        },
                        prop.range(),
                    ));
                }
            }
        }

        Ok(Measure {
            function: function.anchor,
            args: function.args,
            output,
            phase,
            invocation: invocation.unwrap_or_default(),
            filter,
            name: call.alias().map(|a| a.text()),
        })
    }

    fn schema_ref(&self, prop: &ast::Property) -> BuildResult<u32> {
        let name = operand_name(prop)?;
        self.table
            .schema_index(&name.text())
            .map(|i| i as u32)
            .ok_or_else(|| BuildError::at(BuildErrorKind::Unresolved(name.text()), name.range()))
    }

    fn source_ref(&self, prop: &ast::Property) -> BuildResult<u32> {
        let name = operand_name(prop)?;
        self.table
            .source_index(&name.text())
            .map(|i| i as u32)
            .ok_or_else(|| BuildError::at(BuildErrorKind::Unresolved(name.text()), name.range()))
    }

    /// Columns of a base schema qualified by the reading relation.
    fn schema_scope(&self, schema: u32, qualifier: &str) -> Vec<Column> {
        self.plan
            .schemas
            .get(schema as usize)
            .map(|decl| {
                decl.fields
                    .iter()
                    .map(|f| Column {
                        qualifier: Some(qualifier.to_owned()),
                        name: f.name.clone(),
                        ty: f.ty.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn detail(props: &Properties) -> Option<String> {
    props.get("detail").and_then(|p| p.string()).map(|(s, _)| s)
}
