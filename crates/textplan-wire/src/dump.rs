//! Human-readable plan buffer dump for debugging.

use std::fmt::{self, Write as _};

use textplan_core::{Colors, DEFAULT_MAX_DEPTH, Plan, SourceKind};

use crate::decode::{Layout, NodeEntry, decode_body, read_layout};
use crate::error::DecodeError;

/// Renders header, string table, extension tables, declarations and the
/// relation tree (with body offsets) of a plan buffer.
pub fn dump(bytes: &[u8], colors: Colors) -> Result<String, DecodeError> {
    let layout = read_layout(bytes)?;
    let body = decode_body(&layout, DEFAULT_MAX_DEPTH, true)?;

    let mut out = String::new();
    let ctx = DumpContext {
        layout: &layout,
        plan: &body.plan,
        colors,
    };
    ctx.write(&mut out, &body.nodes)
        .expect("String write never fails");
    Ok(out)
}

struct DumpContext<'a> {
    layout: &'a Layout<'a>,
    plan: &'a Plan,
    colors: Colors,
}

fn width_for_count(count: usize) -> usize {
    count.saturating_sub(1).max(1).to_string().len()
}

impl DumpContext<'_> {
    fn write(&self, out: &mut String, nodes: &[NodeEntry]) -> fmt::Result {
        self.header(out)?;
        self.strings(out)?;
        self.extensions(out)?;
        self.schemas(out)?;
        self.sources(out)?;
        self.roots(out, nodes)
    }

    fn section(&self, out: &mut String, name: &str) -> fmt::Result {
        let c = &self.colors;
        writeln!(out, "{}[{name}]{}", c.blue, c.reset)
    }

    fn header(&self, out: &mut String) -> fmt::Result {
        let h = &self.layout.header;
        let o = &self.layout.offsets;
        let c = &self.colors;
        self.section(out, "header")?;
        writeln!(out, "version   {}", h.version)?;
        writeln!(out, "size      {}", h.total_size)?;
        writeln!(out, "checksum  {:#010x}", h.checksum)?;
        writeln!(
            out,
            "sections  {}strings@{} table@{} uris@{} functions@{} types@{} body@{}{}",
            c.dim, o.str_blob, o.str_table, o.uris, o.functions, o.types, o.body, c.reset
        )?;
        out.push('\n');
        Ok(())
    }

    fn strings(&self, out: &mut String) -> fmt::Result {
        let c = &self.colors;
        let w = width_for_count(self.layout.strings.len());
        self.section(out, "strings")?;
        for (i, s) in self.layout.strings.iter().enumerate() {
            writeln!(out, "S{i:0w$} {}{s:?}{}", c.green, c.reset)?;
        }
        out.push('\n');
        Ok(())
    }

    fn extensions(&self, out: &mut String) -> fmt::Result {
        let c = &self.colors;
        let ext = &self.plan.extensions;
        if ext.is_empty() {
            return Ok(());
        }
        self.section(out, "extensions")?;
        for (anchor, uri) in ext.uris() {
            writeln!(out, "U{} {}{uri:?}{}", anchor.get(), c.green, c.reset)?;
        }
        for (anchor, f) in ext.functions() {
            writeln!(out, "F{} U{} {}", anchor.get(), f.uri.get(), f.name)?;
        }
        for (anchor, t) in ext.types() {
            writeln!(out, "T{} U{} {}", anchor.get(), t.uri.get(), t.name)?;
        }
        out.push('\n');
        Ok(())
    }

    fn schemas(&self, out: &mut String) -> fmt::Result {
        let c = &self.colors;
        if self.plan.schemas.is_empty() {
            return Ok(());
        }
        self.section(out, "schemas")?;
        for (i, schema) in self.plan.schemas.iter().enumerate() {
            writeln!(out, "#{i} {}", schema.name.as_deref().unwrap_or("_"))?;
            for field in &schema.fields {
                writeln!(
                    out,
                    "  {} {}{}{}",
                    field.name,
                    c.yellow,
                    field.ty.display(&self.plan.extensions),
                    c.reset
                )?;
            }
        }
        out.push('\n');
        Ok(())
    }

    fn sources(&self, out: &mut String) -> fmt::Result {
        if self.plan.sources.is_empty() {
            return Ok(());
        }
        self.section(out, "sources")?;
        for (i, source) in self.plan.sources.iter().enumerate() {
            write!(
                out,
                "#{i} {} {}",
                source.name.as_deref().unwrap_or("_"),
                source.kind.keyword()
            )?;
            match &source.kind {
                SourceKind::NamedTable { names } => write!(out, " {}", names.join("."))?,
                SourceKind::LocalFiles { items } => write!(out, " ({} items)", items.len())?,
                SourceKind::ExtensionTable {
                    detail: Some(detail),
                } => write!(out, " {detail:?}")?,
                SourceKind::VirtualTable | SourceKind::ExtensionTable { detail: None } => {}
            }
            out.push('\n');
        }
        out.push('\n');
        Ok(())
    }

    fn roots(&self, out: &mut String, nodes: &[NodeEntry]) -> fmt::Result {
        let c = &self.colors;
        self.section(out, "relations")?;
        for node in nodes {
            let indent = "  ".repeat(node.depth as usize);
            write!(out, "{}{:06}{} {indent}{}", c.dim, node.offset, c.reset, node.tag)?;
            if let Some(name) = &node.name {
                write!(out, " {name}")?;
            }
            writeln!(out, " {}({} cols){}", c.dim, node.columns, c.reset)?;
        }
        if !self.plan.root_names.is_empty() {
            writeln!(out, "names {}", self.plan.root_names.join(", "))?;
        }
        Ok(())
    }
}
