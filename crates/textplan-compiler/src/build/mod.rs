//! Plan builder: lowers a resolved source file into a [`Plan`].
//!
//! Relations are built leaves first in dependency order. Each consumer
//! clones its inputs, so a relation consumed twice appears twice in the
//! tree. Column references are resolved against the derived input columns
//! and stored positionally.
//!
//! # Module Organization
//!
//! - `declarations`: schemas and sources
//! - `types`: type names and literal values
//! - `expressions`: scalar expressions and column lookup
//! - `relations`: per-kind property checks and relation nodes

mod declarations;
mod error;
mod expressions;
mod relations;
mod types;

#[cfg(test)]
mod build_tests;
#[cfg(test)]
mod expressions_tests;

use indexmap::{IndexMap, IndexSet};
use textplan_core::{Column, DEFAULT_MAX_DEPTH, Plan, Rel, derive};

use crate::analyze::{SymbolTable, analyze_dependencies};

pub use error::{BuildError, BuildErrorKind, BuildResult};
pub(crate) use expressions::lookup_column;

/// A finished relation and its output columns.
#[derive(Debug, Clone)]
struct Built {
    rel: Rel,
    columns: Vec<Column>,
}

pub(crate) struct Builder<'t> {
    table: &'t SymbolTable,
    plan: Plan,
    built: IndexMap<String, Built>,
    max_depth: u32,
}

/// Builds the plan. The symbol table must come from a source file without
/// parse or resolve diagnostics.
pub fn build(table: &SymbolTable) -> BuildResult<Plan> {
    build_with_max_depth(table, DEFAULT_MAX_DEPTH)
}

/// Like [`build`], failing on the first relation nested deeper than
/// `max_depth` (see [`textplan_core::depth`]).
pub fn build_with_max_depth(table: &SymbolTable, max_depth: u32) -> BuildResult<Plan> {
    let dependencies = analyze_dependencies(table);
    if let Some(cycle) = dependencies.cycle() {
        let range = cycle
            .first()
            .and_then(|name| table.relation(name))
            .map(|entry| entry.name_range);
        let mut relations = cycle.to_vec();
        if let Some(first) = cycle.first() {
            relations.push(first.clone());
        }
        return Err(BuildError {
            kind: BuildErrorKind::Cycle { relations },
            relation: None,
            range,
        });
    }

    let mut builder = Builder {
        table,
        plan: Plan::new(),
        built: IndexMap::new(),
        max_depth,
    };
    builder.build_schemas()?;
    builder.build_sources()?;

    for name in dependencies.build_order() {
        let built = builder.build_relation(name)?;
        tracing::trace!(
            relation = name,
            kind = %built.rel.tag(),
            columns = built.columns.len(),
            "built relation"
        );
        builder.built.insert(name.to_owned(), built);
    }

    builder.attach_roots()?;
    let mut plan = builder.plan;
    plan.canonicalize_anchors()?;

    tracing::debug!(
        schemas = plan.schemas.len(),
        sources = plan.sources.len(),
        roots = plan.roots.len(),
        relations = plan.relation_count(),
        "built plan"
    );
    Ok(plan)
}

impl Builder<'_> {
    fn built(&self, name: &str) -> BuildResult<&Built> {
        self.built
            .get(name)
            .ok_or_else(|| BuildErrorKind::Unresolved(name.to_owned()).into())
    }

    /// Explicit roots, or every relation nothing consumes.
    fn root_names(&self) -> Vec<String> {
        if !self.table.roots().is_empty() {
            return self.table.roots().to_vec();
        }
        let consumed: IndexSet<&str> = self
            .table
            .relations()
            .flat_map(|(_, entry)| entry.inputs.iter().chain(&entry.subqueries))
            .map(String::as_str)
            .collect();
        self.table
            .relation_names()
            .filter(|name| !consumed.contains(name))
            .map(str::to_owned)
            .collect()
    }

    fn attach_roots(&mut self) -> BuildResult<()> {
        let table = self.table;
        let roots = self.root_names();

        let mut reachable: IndexSet<&str> = IndexSet::new();
        let mut stack: Vec<&str> = roots.iter().map(String::as_str).collect();
        while let Some(name) = stack.pop() {
            if !reachable.insert(name) {
                continue;
            }
            if let Some(entry) = table.relation(name) {
                stack.extend(entry.inputs.iter().chain(&entry.subqueries).map(String::as_str));
            }
        }
        for name in table.relation_names() {
            if !reachable.contains(name) {
                tracing::warn!(relation = name, "relation is not reachable from a root; dropped");
            }
        }

        for name in &roots {
            let rel = self.built(name)?.rel.clone();
            self.plan.roots.push(rel);
        }

        if let Some((names, range)) = table.root_names() {
            let columns = match roots.first() {
                Some(first) => self.built(first)?.columns.len(),
                None => 0,
            };
            if names.len() != columns {
                return Err(BuildError::at(
                    BuildErrorKind::RootNames {
                        names: names.len(),
                        columns,
                    },
                    *range,
                ));
            }
            self.plan.root_names = names.clone();
        }
        Ok(())
    }

    fn direct_columns(&self, rel: &Rel, inputs: &[Built], name: &str) -> BuildResult<Vec<Column>> {
        let refs: Vec<&[Column]> = inputs.iter().map(|b| b.columns.as_slice()).collect();
        Ok(derive::direct_columns(rel, &refs, &self.plan.schemas, Some(name))?)
    }

    fn node_columns(&self, rel: &Rel, inputs: &[&Built], name: &str) -> BuildResult<Vec<Column>> {
        let refs: Vec<&[Column]> = inputs.iter().map(|b| b.columns.as_slice()).collect();
        Ok(derive::node_columns(rel, &refs, &self.plan.schemas, Some(name))?)
    }
}
