//! Schema and source declarations.
//!
//! Both keep their symbol-table order, so table indices are plan indices.

use textplan_core::{
    FileFormat, FileItem, PathKind, SchemaDecl, SchemaField, SourceDecl, SourceKind, depth,
};

use super::Builder;
use super::error::{BuildError, BuildErrorKind, BuildResult};
use crate::parser::SyntaxKind;
use crate::parser::ast::{self, EntryValue};

impl Builder<'_> {
    pub(super) fn build_schemas(&mut self) -> BuildResult<()> {
        let table = self.table;
        for (name, decl) in table.schemas() {
            let mut fields = Vec::new();
            for field in decl.fields() {
                let (Some(field_name), Some(ty)) = (field.name(), field.ty()) else {
                    continue;
                };
                let range = ty.range();
                let ty = self.lower_type(&ty)?;
                depth::check_type(&ty, self.max_depth).map_err(|e| BuildError::at(e.into(), range))?;
                fields.push(SchemaField {
                    name: field_name.text(),
                    ty,
                });
            }
            self.plan.schemas.push(SchemaDecl {
                name: Some(name.to_owned()),
                fields,
            });
        }
        Ok(())
    }

    pub(super) fn build_sources(&mut self) -> BuildResult<()> {
        let table = self.table;
        for (name, decl) in table.sources() {
            let kind = source_kind(decl)?;
            self.plan.sources.push(SourceDecl {
                name: Some(name.to_owned()),
                kind,
            });
        }
        Ok(())
    }
}

fn source_kind(decl: &ast::SourceDecl) -> BuildResult<SourceKind> {
    let keyword = decl.kind_token().map(|t| t.kind());
    let (kind_name, allowed) = match keyword {
        Some(SyntaxKind::KwNamedTable) => ("named_table", Some(SyntaxKind::KwNames)),
        Some(SyntaxKind::KwLocalFiles) => ("local_files", Some(SyntaxKind::KwItems)),
        Some(SyntaxKind::KwExtensionTable) => ("extension_table", Some(SyntaxKind::KwDetail)),
        Some(SyntaxKind::KwVirtualTable) => ("virtual_table", None),
        _ => {
            return Err(BuildError::at(
                BuildErrorKind::Unresolved("source kind".to_owned()),
                decl.range(),
            ));
        }
    };

    let mut seen = false;
    for prop in decl.props() {
        let Some(token) = prop.keyword() else { continue };
        if Some(token.kind()) != allowed {
            return Err(BuildError::at(
                BuildErrorKind::UnexpectedProperty {
                    property: token.text().to_ascii_lowercase(),
                    kind: kind_name,
                },
                prop.range(),
            ));
        }
        if seen {
            return Err(BuildError::at(
                BuildErrorKind::DuplicateProperty(token.text().to_ascii_lowercase()),
                prop.range(),
            ));
        }
        seen = true;
    }

    let prop = decl.props().next();
    let kind = match keyword {
        Some(SyntaxKind::KwNamedTable) => SourceKind::NamedTable {
            names: prop
                .map(|p| p.strings().into_iter().map(|(s, _)| s).collect())
                .unwrap_or_default(),
        },
        Some(SyntaxKind::KwLocalFiles) => {
            let mut items = Vec::new();
            for item in prop.map(|p| p.items()).unwrap_or_default() {
                items.push(file_item(&item)?);
            }
            SourceKind::LocalFiles { items }
        }
        Some(SyntaxKind::KwExtensionTable) => SourceKind::ExtensionTable {
            detail: prop.and_then(|p| p.string()).map(|(s, _)| s),
        },
        _ => SourceKind::VirtualTable,
    };
    Ok(kind)
}

fn file_item(item: &ast::FileItem) -> BuildResult<FileItem> {
    let invalid = |msg: String| BuildError::at(BuildErrorKind::InvalidFileItem(msg), item.range());

    let mut path: Option<(PathKind, String)> = None;
    let mut partition_index = None;
    let mut start = None;
    let mut length = None;
    let mut format = None;

    for entry in item.entries() {
        let (Some(key), Some(value)) = (entry.key(), entry.value()) else {
            continue;
        };
        let key = key.text();
        if let Some(kind) = PathKind::from_name(&key) {
            if path.is_some() {
                return Err(invalid("more than one path".to_owned()));
            }
            let EntryValue::String(text) = value else {
                return Err(invalid(format!("`{key}` needs a string")));
            };
            path = Some((kind, text));
            continue;
        }

        let number = |value: &EntryValue| match value {
            EntryValue::Number(text) => text
                .parse::<u64>()
                .map_err(|_| invalid(format!("`{key}` needs a non-negative integer"))),
            _ => Err(invalid(format!("`{key}` needs a number"))),
        };
        match key.to_ascii_lowercase().as_str() {
            "partition_index" => partition_index = Some(number(&value)?),
            "start" => start = Some(number(&value)?),
            "length" => length = Some(number(&value)?),
            "format" => {
                let (EntryValue::Name(text) | EntryValue::String(text)) = &value else {
                    return Err(invalid("`format` needs a name".to_owned()));
                };
                format = Some(
                    FileFormat::from_name(text)
                        .ok_or_else(|| invalid(format!("unknown format `{text}`")))?,
                );
            }
            _ => return Err(invalid(format!("unknown key `{key}`"))),
        }
    }

    let (path_kind, path) = path.ok_or_else(|| {
        invalid("needs one of uri_file, uri_path, uri_path_glob, uri_folder".to_owned())
    })?;
    Ok(FileItem {
        path_kind,
        path,
        partition_index,
        start,
        length,
        format,
    })
}
