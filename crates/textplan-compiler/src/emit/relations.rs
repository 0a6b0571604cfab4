//! Relation declarations.

use std::collections::VecDeque;

use textplan_core::{
    AggregationPhase, AnchorError, Column, Invocation, JoinType, NamedExpr, Rel, RelKind,
    SchemaError, SortDirection, derive,
};

use super::expressions::column_ref;
use super::names::quote;
use super::{Block, EmitError, Emitter, Visited};
use crate::parser::lexer::escape_string;

impl Emitter<'_> {
    /// Writes `rel` after its inputs and subqueries, returning the name it
    /// was written under.
    ///
    /// A root never reuses a relation that is already a root: the text
    /// would collapse the two into one.
    pub(super) fn visit(&mut self, rel: &Rel, root: bool) -> Result<Visited, EmitError> {
        if let Some(seen) = self.reuse(rel, root) {
            return Ok(seen);
        }

        let mut parents: Vec<Pending<'_>> = Vec::new();
        let mut current = Pending::new(rel, root);
        loop {
            if let Some(child) = current.children.get(current.next).copied() {
                current.next += 1;
                match self.reuse(child, false) {
                    Some(seen) => current.accept(seen),
                    None => parents.push(std::mem::replace(&mut current, Pending::new(child, false))),
                }
                continue;
            }

            let visited = self.write(current)?;
            match parents.pop() {
                Some(mut parent) => {
                    parent.accept(visited);
                    current = parent;
                }
                None => return Ok(visited),
            }
        }
    }

    /// An identical copy written earlier under the same declared name.
    fn reuse(&mut self, rel: &Rel, root: bool) -> Option<Visited> {
        let declared = rel.name.as_deref()?;
        let (_, seen) = self
            .written
            .get(declared)?
            .iter()
            .find(|(written, _)| written == rel)?;
        if root && self.roots.contains(&seen.name) {
            return None;
        }
        let seen = seen.clone();
        if root {
            self.roots.push(seen.name.clone());
        }
        Some(seen)
    }

    fn write(&mut self, pending: Pending<'_>) -> Result<Visited, EmitError> {
        let Pending {
            rel,
            root,
            inputs,
            mut subqueries,
            ..
        } = pending;

        let name = self.names.name(rel.name.as_deref(), rel.tag().name());
        let input_columns: Vec<&[Column]> = inputs.iter().map(|v| v.columns.as_slice()).collect();
        let columns = derive::node_columns(rel, &input_columns, &self.plan.schemas, Some(&name))?;

        let block = self.relation_block(rel, &name, &inputs, &mut subqueries)?;
        self.relations.push(block);
        if let [input] = inputs.as_slice() {
            self.edges.push((input.name.clone(), name.clone()));
        }

        let visited = Visited { name, columns };
        if let Some(declared) = rel.name.clone() {
            self.written
                .entry(declared)
                .or_default()
                .push((rel.clone(), visited.clone()));
        }
        if root {
            self.roots.push(visited.name.clone());
        }
        tracing::trace!(relation = %visited.name, kind = %rel.tag(), "emitted relation");
        Ok(visited)
    }

    fn relation_block(
        &self,
        rel: &Rel,
        name: &str,
        inputs: &[Visited],
        subqueries: &mut VecDeque<String>,
    ) -> Result<Block, EmitError> {
        let mut block = Block::new(format!("{} relation {}", rel.tag(), quote(name)?));
        // a single input travels through the pipelines block
        if inputs.len() != 1 {
            for input in inputs {
                block.push(format!("input {}", quote(&input.name)?));
            }
        }
        let input = inputs.first().map(|v| v.columns.as_slice()).unwrap_or_default();

        match &rel.kind {
            RelKind::Read(r) => {
                block.push(format!("base_schema {}", self.schema_name(r.schema)?));
                block.push(format!("source {}", self.source_name(r.source)?));
                let scope = derive::direct_columns(rel, &[], &self.plan.schemas, Some(name))?;
                if let Some(filter) = &r.filter {
                    block.push(format!("filter {}", self.expr_text(filter, &scope, subqueries)?));
                }
                if let Some(filter) = &r.best_effort_filter {
                    block.push(format!(
                        "best_effort filter {}",
                        self.expr_text(filter, &scope, subqueries)?
                    ));
                }
            }
            RelKind::Filter(r) => {
                block.push(format!("filter {}", self.expr_text(&r.condition, input, subqueries)?));
            }
            RelKind::Project(r) => {
                for expr in &r.expressions {
                    block.push(format!("expression {}", self.named_expr(expr, input, subqueries)?));
                }
            }
            RelKind::Join(r) => {
                if r.join_type != JoinType::Inner {
                    block.push(format!("type {}", r.join_type));
                }
                let left = &inputs[0].columns;
                let right = &inputs[1].columns;
                let scope = derive::join_scope(left, right);
                block.push(format!(
                    "expression {}",
                    self.expr_text(&r.condition, &scope, subqueries)?
                ));
                if let Some(filter) = &r.post_filter {
                    let scope = derive::join_columns(r.join_type, left, right);
                    block.push(format!("filter {}", self.expr_text(filter, &scope, subqueries)?));
                }
            }
            RelKind::Cross(_) => {}
            RelKind::Fetch(r) => {
                if r.offset != 0 {
                    block.push(format!("offset {}", r.offset));
                }
                if r.count != -1 {
                    block.push(format!("count {}", r.count));
                }
            }
            RelKind::Aggregate(r) => {
                for grouping in &r.groupings {
                    block.push(format!("grouping {}", self.named_expr(grouping, input, subqueries)?));
                }
                for measure in &r.measures {
                    let function = self
                        .functions
                        .get(&measure.function)
                        .ok_or(AnchorError::DanglingFunction(measure.function))?;
                    let mut args = Vec::with_capacity(measure.args.len());
                    for arg in &measure.args {
                        args.push(self.expr_text(arg, input, subqueries)?);
                    }
                    let mut call = format!(
                        "measure {function}({}) -> {}",
                        args.join(", "),
                        self.type_text(&measure.output)?
                    );
                    if measure.phase != AggregationPhase::default() {
                        call.push_str(&format!(" @ {}", measure.phase));
                    }
                    if let Some(alias) = &measure.name {
                        call.push_str(&format!(" named {}", quote(alias)?));
                    }
                    call.push(';');

                    let mut lines = vec![call];
                    if measure.invocation != Invocation::default() {
                        lines.push(format!("invocation {};", measure.invocation));
                    }
                    if let Some(filter) = &measure.filter {
                        lines.push(format!("filter {};", self.expr_text(filter, input, subqueries)?));
                    }
                    block.push_nested("measure {", lines, "}");
                }
            }
            RelKind::Sort(r) => {
                for field in &r.fields {
                    let mut line = format!("sort {}", self.expr_text(&field.expr, input, subqueries)?);
                    if field.direction != SortDirection::default() {
                        line.push_str(&format!(" by {}", field.direction));
                    }
                    block.push(line);
                }
            }
            RelKind::Set(r) => block.push(format!("type {}", r.op)),
            RelKind::ExtensionLeaf(r) => {
                block.push(format!("base_schema {}", self.schema_name(r.schema)?));
                push_detail(&mut block, r.detail.as_deref());
            }
            RelKind::ExtensionSingle(r) => {
                if let Some(schema) = r.schema {
                    block.push(format!("base_schema {}", self.schema_name(schema)?));
                }
                push_detail(&mut block, r.detail.as_deref());
            }
            RelKind::ExtensionMulti(r) => {
                if let Some(schema) = r.schema {
                    block.push(format!("base_schema {}", self.schema_name(schema)?));
                }
                push_detail(&mut block, r.detail.as_deref());
            }
        }

        if let Some(emit) = &rel.emit {
            let refs: Vec<&[Column]> = inputs.iter().map(|v| v.columns.as_slice()).collect();
            let direct = derive::direct_columns(rel, &refs, &self.plan.schemas, Some(name))?;
            for &index in emit {
                if index as usize >= direct.len() {
                    return Err(SchemaError::EmitOutOfRange {
                        index,
                        len: direct.len(),
                    }
                    .into());
                }
                block.push(format!("emit {}", column_ref(index, &direct)));
            }
        }
        Ok(block)
    }

    fn named_expr(
        &self,
        named: &NamedExpr,
        scope: &[Column],
        subqueries: &mut VecDeque<String>,
    ) -> Result<String, EmitError> {
        let mut text = self.expr_text(&named.expr, scope, subqueries)?;
        if let Some(alias) = &named.name {
            text.push_str(&format!(" named {}", quote(alias)?));
        }
        Ok(text)
    }
}

/// A relation waiting for its inputs and subqueries to be written.
struct Pending<'r> {
    rel: &'r Rel,
    root: bool,
    /// Inputs, then subquery relations in expression walk order.
    children: Vec<&'r Rel>,
    next: usize,
    input_count: usize,
    inputs: Vec<Visited>,
    subqueries: VecDeque<String>,
}

impl<'r> Pending<'r> {
    fn new(rel: &'r Rel, root: bool) -> Self {
        let mut children = rel.inputs();
        let input_count = children.len();
        children.extend(rel.subqueries());
        Self {
            rel,
            root,
            children,
            next: 0,
            input_count,
            inputs: Vec::with_capacity(input_count),
            subqueries: VecDeque::new(),
        }
    }

    fn accept(&mut self, visited: Visited) {
        if self.inputs.len() < self.input_count {
            self.inputs.push(visited);
        } else {
            self.subqueries.push_back(visited.name);
        }
    }
}

fn push_detail(block: &mut Block, detail: Option<&str>) {
    if let Some(detail) = detail {
        block.push(format!("detail = {}", escape_string(detail)));
    }
}
