//! Dependency analysis for relations.
//!
//! A relation depends on its inputs and on the relations it embeds as
//! subqueries. The SCCs are exposed in reverse topological order (leaves
//! first), which is the order the builder constructs relations in.

use indexmap::{IndexMap, IndexSet};

use super::symbol_table::SymbolTable;

/// Result of dependency analysis.
#[derive(Clone, Debug, Default)]
pub struct DependencyAnalysis {
    /// Strongly connected components in reverse topological order.
    ///
    /// - `sccs[0]` has no dependencies
    /// - Every relation in the symbol table appears exactly once
    /// - Members of an SCC with more than one entry form a cycle
    pub sccs: Vec<Vec<String>>,

    cycle: Option<Vec<String>>,
}

impl DependencyAnalysis {
    /// The first cycle found, in build order. A relation that feeds itself
    /// is a cycle of one.
    pub fn cycle(&self) -> Option<&[String]> {
        self.cycle.as_deref()
    }

    /// Relations in build order, valid only when there is no cycle.
    pub fn build_order(&self) -> impl Iterator<Item = &str> {
        self.sccs.iter().flatten().map(String::as_str)
    }
}

pub fn analyze_dependencies(symbol_table: &SymbolTable) -> DependencyAnalysis {
    let sccs = SccFinder::find(symbol_table);

    let cycle = sccs
        .iter()
        .find(|scc| match scc.as_slice() {
            [single] => edges(symbol_table, single).any(|dep| dep == single.as_str()),
            members => members.len() > 1,
        })
        .cloned();

    if let Some(members) = &cycle {
        tracing::debug!(?members, "relation cycle");
    }
    DependencyAnalysis { sccs, cycle }
}

fn edges<'a>(symbol_table: &'a SymbolTable, name: &str) -> impl Iterator<Item = &'a str> {
    symbol_table
        .relation(name)
        .into_iter()
        .flat_map(|entry| entry.inputs.iter().chain(&entry.subqueries))
        .map(String::as_str)
}

struct SccFinder<'a> {
    symbol_table: &'a SymbolTable,
    index: usize,
    stack: Vec<&'a str>,
    on_stack: IndexSet<&'a str>,
    indices: IndexMap<&'a str, usize>,
    lowlinks: IndexMap<&'a str, usize>,
    sccs: Vec<Vec<&'a str>>,
}

impl<'a> SccFinder<'a> {
    fn find(symbol_table: &'a SymbolTable) -> Vec<Vec<String>> {
        let mut finder = Self {
            symbol_table,
            index: 0,
            stack: Vec::new(),
            on_stack: IndexSet::new(),
            indices: IndexMap::new(),
            lowlinks: IndexMap::new(),
            sccs: Vec::new(),
        };

        for name in symbol_table.relation_names() {
            if !finder.indices.contains_key(name) {
                finder.strongconnect(name);
            }
        }

        finder
            .sccs
            .into_iter()
            .map(|scc| scc.into_iter().rev().map(String::from).collect())
            .collect()
    }

    fn lower(&mut self, name: &'a str, value: usize) {
        if let Some(lowlink) = self.lowlinks.get_mut(name) {
            *lowlink = (*lowlink).min(value);
        }
    }

    /// Tarjan's algorithm with an explicit frame stack, so a long chain of
    /// relations does not recurse.
    fn strongconnect(&mut self, root: &'a str) {
        let mut frames = vec![self.visit(root)];
        while let Some((name, deps)) = frames.last_mut() {
            let name = *name;
            if let Some(dep) = deps.next() {
                if !self.indices.contains_key(dep) {
                    let frame = self.visit(dep);
                    frames.push(frame);
                } else if self.on_stack.contains(dep) {
                    let dep_index = self.indices[dep];
                    self.lower(name, dep_index);
                }
                continue;
            }

            frames.pop();
            if let Some(parent) = frames.last().map(|(parent, _)| *parent) {
                let lowlink = self.lowlinks[name];
                self.lower(parent, lowlink);
            }
            if self.lowlinks[name] == self.indices[name] {
                let mut scc = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack.swap_remove(w);
                    scc.push(w);
                    if w == name {
                        break;
                    }
                }
                self.sccs.push(scc);
            }
        }
    }

    fn visit(&mut self, name: &'a str) -> (&'a str, indexmap::set::IntoIter<&'a str>) {
        self.indices.insert(name, self.index);
        self.lowlinks.insert(name, self.index);
        self.index += 1;
        self.stack.push(name);
        self.on_stack.insert(name);

        let deps: IndexSet<&'a str> = edges(self.symbol_table, name).collect();
        (name, deps.into_iter())
    }
}
