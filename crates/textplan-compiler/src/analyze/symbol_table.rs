//! Symbol table: name resolution and reference checking.
//!
//! Two-pass approach:
//! 1. Declare every schema, source, relation, function and type name
//! 2. Check every reference and record relation inputs and plan roots
//!
//! Namespaces are separate: a schema and a relation may share a name.

use indexmap::IndexMap;
use rowan::TextRange;
use textplan_core::{RelTag, TypeKind};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::parser::ast::{self, Decl, Stage};

/// A relation declaration with its resolved edges.
#[derive(Debug, Clone)]
pub struct RelationEntry {
    pub decl: ast::RelationDecl,
    /// `None` when the kind was not recognized (already diagnosed by the parser).
    pub tag: Option<RelTag>,
    pub name_range: TextRange,
    /// Explicit `input` properties in order, then pipeline producers.
    pub inputs: Vec<String>,
    /// Relations referenced through `subquery NAME`.
    pub subqueries: Vec<String>,
}

/// An extension function, keyed in the table by its alias or base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub uri: String,
    /// Full compound name, e.g. `add:i64_i64`.
    pub name: String,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeEntry {
    pub uri: String,
    pub name: String,
    pub range: TextRange,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    schemas: IndexMap<String, ast::SchemaDecl>,
    sources: IndexMap<String, ast::SourceDecl>,
    relations: IndexMap<String, RelationEntry>,
    functions: IndexMap<String, FunctionEntry>,
    types: IndexMap<String, TypeEntry>,
    roots: Vec<String>,
    root_names: Option<(Vec<String>, TextRange)>,
}

impl SymbolTable {
    pub fn schema(&self, name: &str) -> Option<&ast::SchemaDecl> {
        self.schemas.get(name)
    }

    pub fn schema_index(&self, name: &str) -> Option<usize> {
        self.schemas.get_index_of(name)
    }

    pub fn schemas(&self) -> impl Iterator<Item = (&str, &ast::SchemaDecl)> {
        self.schemas.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn source_index(&self, name: &str) -> Option<usize> {
        self.sources.get_index_of(name)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&str, &ast::SourceDecl)> {
        self.sources.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn relation(&self, name: &str) -> Option<&RelationEntry> {
        self.relations.get(name)
    }

    /// Relations in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelationEntry)> {
        self.relations.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.get(name)
    }

    pub fn type_entry(&self, name: &str) -> Option<&TypeEntry> {
        self.types.get(name)
    }

    /// Relations piped into `root`, in order of first appearance.
    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn root_names(&self) -> Option<&(Vec<String>, TextRange)> {
        self.root_names.as_ref()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
            + self.sources.len()
            + self.relations.len()
            + self.functions.len()
            + self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether a type name written in the text refers to an extension type.
pub fn is_user_type(name: &ast::Name) -> bool {
    name.is_quoted() || !TypeKind::is_builtin_name(&name.text())
}

pub fn resolve_names(root: &ast::Root, diag: &mut Diagnostics) -> SymbolTable {
    let mut table = SymbolTable::default();

    let mut declarer = Declarer {
        diag,
        table: &mut table,
        first_ranges: IndexMap::new(),
    };
    for decl in root.decls() {
        declarer.declare(&decl);
    }

    let mut validator = ReferenceValidator {
        diag,
        table: &mut table,
        producers: IndexMap::new(),
    };
    for decl in root.decls() {
        validator.validate(&decl);
    }
    validator.link_pipeline_inputs();

    tracing::debug!(
        schemas = table.schemas.len(),
        sources = table.sources.len(),
        relations = table.relations.len(),
        functions = table.functions.len(),
        types = table.types.len(),
        roots = table.roots.len(),
        "resolved names"
    );
    table
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Namespace {
    Schema,
    Source,
    Relation,
    Function,
    Type,
    RootBlock,
}

struct Declarer<'d, 't> {
    diag: &'d mut Diagnostics,
    table: &'t mut SymbolTable,
    first_ranges: IndexMap<(Namespace, String), TextRange>,
}

impl Declarer<'_, '_> {
    /// Records a declaration; returns `false` for duplicates.
    fn claim(&mut self, ns: Namespace, name: &str, range: TextRange) -> bool {
        let key = (ns, name.to_owned());
        if let Some(first) = self.first_ranges.get(&key) {
            self.diag
                .report(DiagnosticKind::DuplicateDefinition, range)
                .message(name)
                .related_to("first defined here", *first)
                .emit();
            return false;
        }
        self.first_ranges.insert(key, range);
        true
    }

    fn declare(&mut self, decl: &Decl) {
        match decl {
            Decl::Schema(schema) => {
                let Some(name) = schema.name() else { return };
                let text = name.text();
                if self.claim(Namespace::Schema, &text, name.range()) {
                    self.table.schemas.insert(text, schema.clone());
                }
            }
            Decl::Source(source) => {
                let Some(name) = source.name() else { return };
                let text = name.text();
                if self.claim(Namespace::Source, &text, name.range()) {
                    self.table.sources.insert(text, source.clone());
                }
            }
            Decl::Relation(rel) => {
                let Some(name) = rel.name() else { return };
                let text = name.text();
                if !self.claim(Namespace::Relation, &text, name.range()) {
                    return;
                }
                let tag = rel.kind_name().and_then(|k| RelTag::from_name(&k.text()));
                self.table.relations.insert(
                    text,
                    RelationEntry {
                        decl: rel.clone(),
                        tag,
                        name_range: name.range(),
                        inputs: Vec::new(),
                        subqueries: Vec::new(),
                    },
                );
            }
            Decl::ExtensionSpace(space) => {
                let Some((uri, _)) = space.uri() else { return };
                for function in space.functions() {
                    let Some(ext_name) = function.ext_name() else {
                        continue;
                    };
                    let full = ext_name.text();
                    let (key, range) = match function.alias() {
                        Some(alias) => (alias.text(), alias.range()),
                        None => {
                            let base = full.split(':').next().unwrap_or_default().to_owned();
                            (base, ext_name.range())
                        }
                    };
                    if self.claim(Namespace::Function, &key, range) {
                        self.table.functions.insert(
                            key,
                            FunctionEntry {
                                uri: uri.clone(),
                                name: full,
                                range,
                            },
                        );
                    }
                }
                for ty in space.types() {
                    let Some(name) = ty.name() else { continue };
                    let text = name.text();
                    if self.claim(Namespace::Type, &text, name.range()) {
                        self.table.types.insert(
                            text.clone(),
                            TypeEntry {
                                uri: uri.clone(),
                                name: text,
                                range: name.range(),
                            },
                        );
                    }
                }
            }
            Decl::Root(block) => {
                for list in block.name_lists() {
                    if !self.claim(Namespace::RootBlock, "root names", list.range()) {
                        continue;
                    }
                    let names = list.entries().into_iter().map(|(text, _)| text).collect();
                    self.table.root_names = Some((names, list.range()));
                }
            }
            Decl::Pipelines(_) => {}
        }
    }
}

struct ReferenceValidator<'d, 't> {
    diag: &'d mut Diagnostics,
    table: &'t mut SymbolTable,
    /// Consumer relation -> producers from pipelines, in first-appearance order.
    producers: IndexMap<String, Vec<String>>,
}

impl ReferenceValidator<'_, '_> {
    fn undefined(&mut self, name: &ast::Name) {
        self.diag
            .report(DiagnosticKind::UndefinedReference, name.range())
            .message(name.text())
            .emit();
    }

    fn validate(&mut self, decl: &Decl) {
        match decl {
            Decl::Schema(schema) => self.check_types(schema.as_cst()),
            Decl::Relation(rel) => self.validate_relation(rel),
            Decl::Pipelines(block) => {
                for pipeline in block.pipelines() {
                    self.validate_pipeline(&pipeline);
                }
            }
            Decl::Source(_) | Decl::Root(_) | Decl::ExtensionSpace(_) => {}
        }
    }

    fn check_types(&mut self, node: &crate::parser::SyntaxNode) {
        for ty in node.descendants().filter_map(ast::Type::cast) {
            let Some(name) = ty.name() else { continue };
            if is_user_type(&name) && self.table.type_entry(&name.text()).is_none() {
                self.undefined(&name);
            }
        }
    }

    fn validate_relation(&mut self, rel: &ast::RelationDecl) {
        let Some(rel_name) = rel.name().map(|n| n.text()) else {
            return;
        };
        // Duplicates keep the first declaration only.
        let is_declared = self
            .table
            .relation(&rel_name)
            .is_some_and(|entry| &entry.decl == rel);

        let mut inputs = Vec::new();
        let mut subqueries = Vec::new();

        for prop in rel.properties() {
            let Some(name) = prop.name() else { continue };
            match prop.keyword_kind() {
                Some(crate::parser::SyntaxKind::KwBaseSchema) => {
                    if self.table.schema(&name.text()).is_none() {
                        self.undefined(&name);
                    }
                }
                Some(crate::parser::SyntaxKind::KwSource) => {
                    if self.table.source_index(&name.text()).is_none() {
                        self.undefined(&name);
                    }
                }
                Some(crate::parser::SyntaxKind::KwInput) => {
                    if self.table.relation(&name.text()).is_none() {
                        self.undefined(&name);
                    } else {
                        inputs.push(name.text());
                    }
                }
                _ => {}
            }
        }

        for node in rel.as_cst().descendants() {
            if let Some(call) = ast::CallExpr::cast(node.clone()) {
                if let Some(name) = call.name()
                    && self.table.function(&name.text()).is_none()
                {
                    self.undefined(&name);
                }
            } else if let Some(subquery) = ast::SubqueryExpr::cast(node) {
                let Some(name) = subquery.name() else { continue };
                if self.table.relation(&name.text()).is_none() {
                    self.undefined(&name);
                } else if !subqueries.contains(&name.text()) {
                    subqueries.push(name.text());
                }
            }
        }
        self.check_types(rel.as_cst());

        if is_declared && let Some(entry) = self.table.relations.get_mut(&rel_name) {
            entry.inputs = inputs;
            entry.subqueries = subqueries;
        }
    }

    fn validate_pipeline(&mut self, pipeline: &ast::Pipeline) {
        let stages = pipeline.stages();
        let last = stages.len().saturating_sub(1);
        let mut previous: Option<String> = None;

        for (i, stage) in stages.iter().enumerate() {
            match stage {
                Stage::Relation(name) => {
                    let text = name.text();
                    if self.table.relation(&text).is_none() {
                        self.undefined(name);
                        previous = None;
                        continue;
                    }
                    if let Some(producer) = previous.take() {
                        let producers = self.producers.entry(text.clone()).or_default();
                        if !producers.contains(&producer) {
                            producers.push(producer);
                        }
                    }
                    previous = Some(text);
                }
                Stage::Root(token) => {
                    if i != last {
                        self.diag
                            .report(DiagnosticKind::RootNotLast, token.text_range())
                            .emit();
                        previous = None;
                        continue;
                    }
                    if let Some(producer) = previous.take()
                        && !self.table.roots.contains(&producer)
                    {
                        self.table.roots.push(producer);
                    }
                }
            }
        }
    }

    /// Appends pipeline producers after the explicit inputs, skipping edges
    /// already present.
    fn link_pipeline_inputs(&mut self) {
        for (consumer, producers) in std::mem::take(&mut self.producers) {
            let Some(entry) = self.table.relations.get_mut(&consumer) else {
                continue;
            };
            for producer in producers {
                if !entry.inputs.contains(&producer) {
                    entry.inputs.push(producer);
                }
            }
        }
    }
}
