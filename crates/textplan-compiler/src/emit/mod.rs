//! Text emission: renders a [`Plan`] back into TextPlan source.
//!
//! Output order is fixed: extension spaces, schemas, sources, the pipelines
//! block, relations (inputs before consumers), then the root block. The text
//! re-parses into a plan equal to the input up to synthesized names.
//!
//! Relation copies with the same declared name and identical structure are
//! written once and referenced by name; differing copies are renamed apart.

mod expressions;
mod names;
mod relations;

#[cfg(test)]
mod names_tests;

use std::fmt::Write as _;

use indexmap::IndexMap;
use textplan_core::{
    Anchor, AnchorError, Column, DEFAULT_MAX_DEPTH, DepthError, FileItem, Plan, Rel, SchemaError,
    SourceKind, TypeKind,
};

use crate::parser::lexer::escape_string;
use names::{Namer, is_plain, quote, quote_always};

/// Layout of emitted text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextFormat {
    /// One property per line, blank line between declarations.
    #[default]
    Standard,
    /// One declaration per line.
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmitOptions {
    pub format: TextFormat,
    /// Plans nested deeper than this are refused before any text is written.
    pub max_depth: u32,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            format: TextFormat::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("name `{0}` cannot be written as text")]
    UnrepresentableName(String),
    #[error("float literal `{0}` has no text form")]
    NonFiniteFloat(String),
    #[error("user type `{0}` is declared more than once")]
    DuplicateTypeName(String),
    #[error("schema index {0} is out of range")]
    SchemaOutOfRange(u32),
    #[error("source index {0} is out of range")]
    SourceOutOfRange(u32),
    #[error(transparent)]
    Anchor(#[from] AnchorError),
    #[error("{0} literal does not match its type")]
    CompositeType(&'static str),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    TooDeep(#[from] DepthError),
}

/// Renders `plan` as TextPlan source.
pub fn emit(plan: &Plan, options: EmitOptions) -> Result<String, EmitError> {
    plan.check_depth(options.max_depth)?;
    let mut emitter = Emitter::new(plan);
    let mut blocks = emitter.extension_spaces()?;
    blocks.extend(emitter.schemas()?);
    blocks.extend(emitter.sources()?);

    emitter.collect_relation_names();
    let mut roots = Vec::with_capacity(plan.roots.len());
    for root in &plan.roots {
        let name = emitter.visit(root, true)?.name;
        roots.push(name);
    }
    if let Some(pipelines) = emitter.pipelines(&roots)? {
        blocks.push(pipelines);
    }
    blocks.append(&mut emitter.relations);
    if !plan.root_names.is_empty() {
        let mut names = Vec::with_capacity(plan.root_names.len());
        for name in &plan.root_names {
            names.push(match quote(name) {
                Ok(quoted) => quoted,
                Err(_) => escape_string(name),
            });
        }
        blocks.push(Block::new("root").item(format!("names = [{}]", names.join(", "))));
    }

    tracing::debug!(
        blocks = blocks.len(),
        relations = plan.relation_count(),
        "emitted plan text"
    );
    Ok(render(&blocks, options.format))
}

/// One braced declaration.
#[derive(Debug, Clone)]
pub(crate) struct Block {
    header: String,
    items: Vec<Item>,
}

/// A statement inside a block, optionally opening a nested group
/// (`measure { .. }`, `items = [ .. ];`).
#[derive(Debug, Clone)]
struct Item {
    line: String,
    nested: Option<(Vec<String>, &'static str)>,
}

impl Block {
    fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            items: Vec::new(),
        }
    }

    /// Adds a `;`-terminated statement.
    fn item(mut self, line: impl Into<String>) -> Self {
        self.push(line);
        self
    }

    fn push(&mut self, line: impl Into<String>) {
        let mut line = line.into();
        line.push(';');
        self.items.push(Item { line, nested: None });
    }

    fn push_nested(&mut self, open: impl Into<String>, lines: Vec<String>, close: &'static str) {
        self.items.push(Item {
            line: open.into(),
            nested: Some((lines, close)),
        });
    }
}

fn render(blocks: &[Block], format: TextFormat) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        match format {
            TextFormat::Standard => {
                if i > 0 {
                    out.push('\n');
                }
                writeln!(out, "{} {{", block.header).expect("String write never fails");
                for item in &block.items {
                    writeln!(out, "  {}", item.line).expect("String write never fails");
                    if let Some((lines, close)) = &item.nested {
                        for line in lines {
                            writeln!(out, "    {line}").expect("String write never fails");
                        }
                        writeln!(out, "  {close}").expect("String write never fails");
                    }
                }
                out.push_str("}\n");
            }
            TextFormat::Compact => {
                out.push_str(&block.header);
                out.push_str(" {");
                for item in &block.items {
                    out.push(' ');
                    out.push_str(&item.line);
                    if let Some((lines, close)) = &item.nested {
                        for line in lines {
                            out.push(' ');
                            out.push_str(line);
                        }
                        out.push(' ');
                        out.push_str(close);
                    }
                }
                out.push_str(if block.items.is_empty() { "}\n" } else { " }\n" });
            }
        }
    }
    out
}

/// A relation already written, with the columns it produces.
#[derive(Debug, Clone)]
pub(crate) struct Visited {
    pub name: String,
    pub columns: Vec<Column>,
}

pub(crate) struct Emitter<'p> {
    plan: &'p Plan,
    /// Call text per function anchor.
    functions: IndexMap<Anchor, String>,
    /// Type-position text per user type anchor.
    types: IndexMap<Anchor, String>,
    schemas: Vec<String>,
    sources: Vec<String>,
    names: Namer,
    /// Written relations by declared name.
    written: IndexMap<String, Vec<(Rel, Visited)>>,
    relations: Vec<Block>,
    /// Single-input edges, producer first.
    edges: Vec<(String, String)>,
    roots: Vec<String>,
}

impl<'p> Emitter<'p> {
    fn new(plan: &'p Plan) -> Self {
        Self {
            plan,
            functions: IndexMap::new(),
            types: IndexMap::new(),
            schemas: Vec::new(),
            sources: Vec::new(),
            names: Namer::new(),
            written: IndexMap::new(),
            relations: Vec::new(),
            edges: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn extension_spaces(&mut self) -> Result<Vec<Block>, EmitError> {
        let plan = self.plan;
        let registry = &plan.extensions;
        let mut aliases = Namer::new();
        let mut items: IndexMap<Anchor, Vec<String>> = IndexMap::new();

        for (anchor, ext) in registry.functions() {
            if registry.uri(ext.uri).is_none() {
                return Err(AnchorError::DanglingUri(ext.uri).into());
            }
            let base = ext.base_name();
            let alias = aliases.name(Some(base), "function");
            let bare = match ext.name.split_once(':') {
                Some((name, signature)) => is_plain(name) && is_plain(signature),
                None => is_plain(&ext.name),
            };
            let mut line = if bare {
                format!("function {}", ext.name)
            } else {
                format!("function {}", escape_string(&ext.name))
            };
            if !bare || alias != base {
                line.push_str(&format!(" as {}", quote(&alias)?));
            }
            items.entry(ext.uri).or_default().push(line);
            self.functions.insert(anchor, quote(&alias)?);
        }

        let mut type_names = Namer::new();
        for (anchor, ext) in registry.types() {
            if registry.uri(ext.uri).is_none() {
                return Err(AnchorError::DanglingUri(ext.uri).into());
            }
            if type_names.is_taken(&ext.name) {
                return Err(EmitError::DuplicateTypeName(ext.name.clone()));
            }
            type_names.reserve(&ext.name);
            let text = if TypeKind::is_builtin_name(&ext.name) {
                quote_always(&ext.name)?
            } else {
                quote(&ext.name)?
            };
            items.entry(ext.uri).or_default().push(format!("type {text}"));
            self.types.insert(anchor, text);
        }

        let mut blocks = Vec::new();
        for (anchor, uri) in registry.uris() {
            let Some(lines) = items.swap_remove(&anchor) else {
                continue;
            };
            let mut block = Block::new(format!("extension_space {}", escape_string(uri)));
            for line in lines {
                block.push(line);
            }
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn schemas(&mut self) -> Result<Vec<Block>, EmitError> {
        let plan = self.plan;
        let mut namer = Namer::new();
        for schema in &plan.schemas {
            if let Some(name) = schema.name.as_deref() {
                namer.avoid(name);
            }
        }

        let mut blocks = Vec::with_capacity(plan.schemas.len());
        for schema in &plan.schemas {
            let name = namer.name(schema.name.as_deref(), "schema");
            let mut block = Block::new(format!("schema {}", quote(&name)?));
            for field in &schema.fields {
                block.push(format!("{} {}", quote(&field.name)?, self.type_text(&field.ty)?));
            }
            self.schemas.push(name);
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn sources(&mut self) -> Result<Vec<Block>, EmitError> {
        let plan = self.plan;
        let mut namer = Namer::new();
        for source in &plan.sources {
            if let Some(name) = source.name.as_deref() {
                namer.avoid(name);
            }
        }

        let mut blocks = Vec::with_capacity(plan.sources.len());
        for source in &plan.sources {
            let name = namer.name(source.name.as_deref(), "source");
            let mut block = Block::new(format!(
                "source {} {}",
                source.kind.keyword(),
                quote(&name)?
            ));
            match &source.kind {
                SourceKind::NamedTable { names } => {
                    let names: Vec<String> = names.iter().map(|n| escape_string(n)).collect();
                    block.push(format!("names = [{}]", names.join(", ")));
                }
                SourceKind::LocalFiles { items } => {
                    let lines = items.iter().map(|item| format!("{},", file_item(item))).collect();
                    block.push_nested("items = [", lines, "];");
                }
                SourceKind::ExtensionTable { detail: Some(detail) } => {
                    block.push(format!("detail = {}", escape_string(detail)));
                }
                SourceKind::ExtensionTable { detail: None } | SourceKind::VirtualTable => {}
            }
            self.sources.push(name);
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn schema_name(&self, index: u32) -> Result<String, EmitError> {
        let name = self
            .schemas
            .get(index as usize)
            .ok_or(EmitError::SchemaOutOfRange(index))?;
        quote(name)
    }

    fn source_name(&self, index: u32) -> Result<String, EmitError> {
        let name = self
            .sources
            .get(index as usize)
            .ok_or(EmitError::SourceOutOfRange(index))?;
        quote(name)
    }

    /// Declared relation names are kept for the relations carrying them;
    /// `root` is never a relation name.
    fn collect_relation_names(&mut self) {
        self.names.reserve("root");
        let plan = self.plan;
        let mut pending: Vec<&Rel> = plan.roots.iter().rev().collect();
        while let Some(rel) = pending.pop() {
            if let Some(name) = rel.name.as_deref() {
                self.names.avoid(name);
            }
            let mut children = rel.inputs();
            children.extend(rel.subqueries());
            pending.extend(children.into_iter().rev());
        }
    }

    /// The pipelines block: single-input edges chained where they line up,
    /// then every root in plan order.
    fn pipelines(&self, roots: &[String]) -> Result<Option<Block>, EmitError> {
        let mut chains: Vec<Vec<&str>> = Vec::new();
        for (from, to) in &self.edges {
            match chains.iter_mut().find(|c| c.last() == Some(&from.as_str())) {
                Some(chain) => chain.push(to.as_str()),
                None => chains.push(vec![from.as_str(), to.as_str()]),
            }
        }

        // Root order is the order of `-> root` stages in the text, so a root
        // only ends a chain placed after the previous root's chain.
        let mut last_root: Option<usize> = None;
        for root in roots {
            let candidate = (0..chains.len()).find(|&i| {
                last_root.is_none_or(|last| i > last) && chains[i].last() == Some(&root.as_str())
            });
            let at = candidate.unwrap_or_else(|| {
                chains.push(vec![root.as_str()]);
                chains.len() - 1
            });
            chains[at].push("root");
            last_root = Some(at);
        }

        if chains.is_empty() {
            return Ok(None);
        }
        let mut block = Block::new("pipelines");
        for chain in chains {
            let mut stages = Vec::with_capacity(chain.len());
            for stage in chain {
                // relation names never spell `root`
                stages.push(if stage == "root" { stage.to_owned() } else { quote(stage)? });
            }
            block.push(stages.join(" -> "));
        }
        Ok(Some(block))
    }
}

fn file_item(item: &FileItem) -> String {
    let mut entries = vec![format!("{}: {}", item.path_kind.name(), escape_string(&item.path))];
    if let Some(n) = item.partition_index {
        entries.push(format!("partition_index: {n}"));
    }
    if let Some(n) = item.start {
        entries.push(format!("start: {n}"));
    }
    if let Some(n) = item.length {
        entries.push(format!("length: {n}"));
    }
    if let Some(format) = item.format {
        entries.push(format!("format: {}", format.name()));
    }
    format!("{{ {} }}", entries.join(", "))
}
