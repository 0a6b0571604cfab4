//! Top-level plan: declarations, root relations and the extension registry.

use serde::{Deserialize, Serialize};

use crate::expr::{Expr, Subquery};
use crate::extensions::{Anchor, AnchorError, ExtensionRegistry};
use crate::rel::{Rel, RelKind};
use crate::types::{Type, TypeKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDecl {
    pub name: Option<String>,
    pub fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDecl {
    pub name: Option<String>,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    NamedTable { names: Vec<String> },
    LocalFiles { items: Vec<FileItem> },
    VirtualTable,
    ExtensionTable { detail: Option<String> },
}

impl SourceKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            SourceKind::NamedTable { .. } => "named_table",
            SourceKind::LocalFiles { .. } => "local_files",
            SourceKind::VirtualTable => "virtual_table",
            SourceKind::ExtensionTable { .. } => "extension_table",
        }
    }
}

keyword_enum! {
    pub enum PathKind {
        UriFile = 1 => "uri_file",
        UriPath = 2 => "uri_path",
        UriPathGlob = 3 => "uri_path_glob",
        UriFolder = 4 => "uri_folder",
    }
}

keyword_enum! {
    pub enum FileFormat {
        Parquet = 1 => "parquet",
        Orc = 2 => "orc",
        Arrow = 3 => "arrow",
        Dwrf = 4 => "dwrf",
        Text = 5 => "text",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileItem {
    pub path_kind: PathKind,
    pub path: String,
    pub partition_index: Option<u64>,
    pub start: Option<u64>,
    pub length: Option<u64>,
    pub format: Option<FileFormat>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub extensions: ExtensionRegistry,
    pub schemas: Vec<SchemaDecl>,
    pub sources: Vec<SourceDecl>,
    pub roots: Vec<Rel>,
    /// Output column names of the first root, if given.
    pub root_names: Vec<String>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relation_count(&self) -> usize {
        self.roots.iter().map(Rel::node_count).sum()
    }

    /// Renumbers every extension anchor in order of first use.
    ///
    /// Traversal: schema field types in declaration order, then each root in
    /// pre-order. Within a node, expressions and types are visited in field
    /// order before the node's inputs. Unused registry entries are dropped.
    pub fn canonicalize_anchors(&mut self) -> Result<(), AnchorError> {
        let mut canon = Canonicalizer {
            old: std::mem::take(&mut self.extensions),
            new: ExtensionRegistry::new(),
        };
        for schema in &mut self.schemas {
            for field in &mut schema.fields {
                canon.ty(&mut field.ty)?;
            }
        }
        for root in &mut self.roots {
            canon.rel(root)?;
        }
        self.extensions = canon.new;
        Ok(())
    }
}

struct Canonicalizer {
    old: ExtensionRegistry,
    new: ExtensionRegistry,
}

impl Canonicalizer {
    fn function(&mut self, anchor: &mut Anchor) -> Result<(), AnchorError> {
        let (uri, name) = self.old.resolve_function(*anchor)?;
        *anchor = self.new.register_function(uri, name);
        Ok(())
    }

    fn ty(&mut self, ty: &mut Type) -> Result<(), AnchorError> {
        match &mut ty.kind {
            TypeKind::UserDefined(anchor) => {
                let (uri, name) = self.old.resolve_type(*anchor)?;
                *anchor = self.new.register_type(uri, name);
                Ok(())
            }
            TypeKind::List(item) => self.ty(item),
            TypeKind::Map(key, value) => {
                self.ty(key)?;
                self.ty(value)
            }
            TypeKind::Struct(fields) => fields.iter_mut().try_for_each(|f| self.ty(f)),
            _ => Ok(()),
        }
    }

    fn expr(&mut self, expr: &mut Expr) -> Result<(), AnchorError> {
        match expr {
            Expr::Field(_) => Ok(()),
            Expr::Literal(lit) => self.ty(&mut lit.ty),
            Expr::Function(call) => {
                self.function(&mut call.anchor)?;
                for arg in &mut call.args {
                    self.expr(arg)?;
                }
                self.ty(&mut call.output)
            }
            Expr::Cast(cast) => {
                self.expr(&mut cast.input)?;
                self.ty(&mut cast.ty)
            }
            Expr::Subquery(subquery) => {
                match subquery {
                    Subquery::InPredicate { needles, .. } => {
                        needles.iter_mut().try_for_each(|n| self.expr(n))?
                    }
                    Subquery::SetComparison { left, .. } => self.expr(left)?,
                    Subquery::Scalar(_) | Subquery::SetPredicate { .. } => {}
                }
                self.rel(subquery.rel_mut())
            }
        }
    }

    fn opt_expr(&mut self, expr: &mut Option<Expr>) -> Result<(), AnchorError> {
        match expr {
            Some(e) => self.expr(e),
            None => Ok(()),
        }
    }

    fn rel(&mut self, rel: &mut Rel) -> Result<(), AnchorError> {
        match &mut rel.kind {
            RelKind::Read(r) => {
                self.opt_expr(&mut r.filter)?;
                self.opt_expr(&mut r.best_effort_filter)
            }
            RelKind::Filter(r) => {
                self.expr(&mut r.condition)?;
                self.rel(&mut r.input)
            }
            RelKind::Project(r) => {
                for e in &mut r.expressions {
                    self.expr(&mut e.expr)?;
                }
                self.rel(&mut r.input)
            }
            RelKind::Join(r) => {
                self.expr(&mut r.condition)?;
                self.opt_expr(&mut r.post_filter)?;
                self.rel(&mut r.left)?;
                self.rel(&mut r.right)
            }
            RelKind::Cross(r) => {
                self.rel(&mut r.left)?;
                self.rel(&mut r.right)
            }
            RelKind::Fetch(r) => self.rel(&mut r.input),
            RelKind::Aggregate(r) => {
                for g in &mut r.groupings {
                    self.expr(&mut g.expr)?;
                }
                for m in &mut r.measures {
                    self.function(&mut m.function)?;
                    for arg in &mut m.args {
                        self.expr(arg)?;
                    }
                    self.ty(&mut m.output)?;
                    self.opt_expr(&mut m.filter)?;
                }
                self.rel(&mut r.input)
            }
            RelKind::Sort(r) => {
                for f in &mut r.fields {
                    self.expr(&mut f.expr)?;
                }
                self.rel(&mut r.input)
            }
            RelKind::Set(r) => r.inputs.iter_mut().try_for_each(|i| self.rel(i)),
            RelKind::ExtensionLeaf(_) => Ok(()),
            RelKind::ExtensionSingle(r) => self.rel(&mut r.input),
            RelKind::ExtensionMulti(r) => r.inputs.iter_mut().try_for_each(|i| self.rel(i)),
        }
    }
}
