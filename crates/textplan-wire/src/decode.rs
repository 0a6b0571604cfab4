//! Bytes → Plan.
//!
//! Nothing in the buffer is trusted: every count, tag, string id, anchor
//! and index is checked, and field references are validated against
//! columns derived from the already-decoded inputs.

use textplan_core::derive::{self, Column};
use textplan_core::{
    AggregateRel, AggregationPhase, Anchor, Cast, ComparisonOp, CrossRel, DEFAULT_MAX_DEPTH, Expr,
    ExtensionLeafRel, ExtensionMultiRel, ExtensionName, ExtensionRegistry, ExtensionSingleRel,
    FetchRel, FieldRef, FileFormat, FileItem, FilterRel, FunctionCall, Invocation, JoinRel,
    JoinType, Literal, LiteralValue, Measure, NamedExpr, PathKind, Plan, ProjectRel, ReadRel,
    ReductionOp, Rel, RelKind, RelTag, SchemaDecl, SchemaError, SchemaField, SetOp,
    SetPredicateOp, SetRel, SortDirection, SortField, SortRel, SourceDecl, SourceKind, Subquery,
    Type, TypeKind,
};

use crate::error::{DecodeError, DecodeErrorKind};
use crate::header::{HEADER_SIZE, Header, SectionOffsets};
use crate::strings::StringTable;
use crate::tags::{self, file_flags};

#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    max_depth: u32,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Plan, DecodeError> {
        let layout = read_layout(bytes)?;
        let body = decode_body(&layout, self.max_depth, false)?;
        tracing::debug!(
            bytes = bytes.len(),
            roots = body.plan.roots.len(),
            relations = body.plan.relation_count(),
            "decoded plan"
        );
        Ok(body.plan)
    }
}

/// Decodes with the default depth limit.
pub fn decode(bytes: &[u8]) -> Result<Plan, DecodeError> {
    Decoder::new().decode(bytes)
}

/// Header, strings and extension tables of a validated buffer.
pub(crate) struct Layout<'a> {
    pub(crate) header: Header,
    pub(crate) offsets: SectionOffsets,
    pub(crate) strings: StringTable<'a>,
    pub(crate) extensions: ExtensionRegistry,
    pub(crate) body: &'a [u8],
}

/// A relation node seen while decoding, for the dump.
pub(crate) struct NodeEntry {
    pub(crate) offset: usize,
    pub(crate) depth: u32,
    pub(crate) tag: RelTag,
    pub(crate) name: Option<String>,
    pub(crate) columns: usize,
}

pub(crate) struct DecodedBody {
    pub(crate) plan: Plan,
    pub(crate) nodes: Vec<NodeEntry>,
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn fail<T>(kind: DecodeErrorKind, offset: usize) -> Result<T, DecodeError> {
    Err(DecodeError::new(kind, offset))
}

pub(crate) fn read_layout(bytes: &[u8]) -> Result<Layout<'_>, DecodeError> {
    let Some(head) = bytes.first_chunk::<HEADER_SIZE>() else {
        return fail(DecodeErrorKind::Truncated, bytes.len());
    };
    let header = Header::from_bytes(head);

    if !header.validate_magic() {
        return fail(DecodeErrorKind::BadMagic, 0);
    }
    if !header.validate_version() {
        return fail(DecodeErrorKind::UnsupportedVersion(header.version), 4);
    }
    if header.total_size as usize != bytes.len() {
        return fail(
            DecodeErrorKind::SizeMismatch {
                header: header.total_size,
                actual: bytes.len(),
            },
            12,
        );
    }
    let actual = crc32fast::hash(&bytes[HEADER_SIZE..]);
    if actual != header.checksum {
        return fail(
            DecodeErrorKind::ChecksumMismatch {
                expected: header.checksum,
                actual,
            },
            8,
        );
    }

    // Every section ends before `end`, so once `end` matches the buffer
    // length all slices below are in bounds.
    let offsets = header.compute_offsets();
    if offsets.end != bytes.len() as u64 {
        return fail(DecodeErrorKind::BadLayout, 12);
    }
    if header.str_count == 0 {
        return fail(DecodeErrorKind::BadStringTable, offsets.str_table as usize);
    }

    let blob_start = offsets.str_blob as usize;
    let blob = &bytes[blob_start..blob_start + header.str_blob_size as usize];
    let table_start = offsets.str_table as usize;
    let table_len = (header.str_count as usize + 1) * 4;
    let strings = StringTable::read(
        blob,
        &bytes[table_start..table_start + table_len],
        header.str_count as usize,
        table_start,
    )?;

    let string_at = |at: usize| {
        let id = read_u32(bytes, at);
        strings
            .get(id)
            .ok_or(DecodeError::new(DecodeErrorKind::StringOutOfRange(id), at))
    };

    let mut extensions = ExtensionRegistry::new();
    for i in 0..header.uri_count as usize {
        let at = offsets.uris as usize + i * 4;
        let uri = string_at(at)?;
        if extensions.push_uri(uri.to_owned()).is_none() {
            return fail(DecodeErrorKind::DuplicateExtension, at);
        }
    }

    let entry_at = |at: usize, extensions: &ExtensionRegistry| -> Result<ExtensionName, DecodeError> {
        let raw = read_u32(bytes, at);
        let uri = Anchor::new(raw)
            .filter(|a| extensions.uri(*a).is_some())
            .ok_or(DecodeError::new(
                DecodeErrorKind::AnchorOutOfRange {
                    what: "uri",
                    anchor: raw,
                },
                at,
            ))?;
        let name = string_at(at + 4)?.to_owned();
        Ok(ExtensionName { uri, name })
    };

    for i in 0..header.function_count as usize {
        let at = offsets.functions as usize + i * 8;
        let entry = entry_at(at, &extensions)?;
        if !matches!(extensions.push_function(entry), Ok(Some(_))) {
            return fail(DecodeErrorKind::DuplicateExtension, at);
        }
    }
    for i in 0..header.type_count as usize {
        let at = offsets.types as usize + i * 8;
        let entry = entry_at(at, &extensions)?;
        if !matches!(extensions.push_type(entry), Ok(Some(_))) {
            return fail(DecodeErrorKind::DuplicateExtension, at);
        }
    }

    Ok(Layout {
        header,
        offsets,
        strings,
        extensions,
        body: &bytes[offsets.body as usize..],
    })
}

pub(crate) fn decode_body(
    layout: &Layout<'_>,
    max_depth: u32,
    record_nodes: bool,
) -> Result<DecodedBody, DecodeError> {
    let mut reader = BodyReader {
        layout,
        bytes: layout.body,
        base: layout.offsets.body as usize,
        pos: 0,
        depth: 0,
        max_depth,
        schemas: Vec::new(),
        sources: Vec::new(),
        nodes: record_nodes.then(Vec::new),
    };
    let header = &layout.header;

    for _ in 0..header.schema_count {
        let schema = reader.schema()?;
        reader.schemas.push(schema);
    }
    for _ in 0..header.source_count {
        let source = reader.source()?;
        reader.sources.push(source);
    }

    let mut roots = Vec::new();
    let mut first_columns = None;
    for _ in 0..header.root_count {
        let (root, columns) = reader.rel()?;
        first_columns.get_or_insert(columns.len());
        roots.push(root);
    }

    let names_at = reader.offset();
    let mut root_names = Vec::new();
    for _ in 0..header.root_name_count {
        root_names.push(reader.string()?.to_owned());
    }
    if !root_names.is_empty() {
        let columns = first_columns.unwrap_or(0);
        if columns != root_names.len() {
            return fail(
                DecodeErrorKind::RootNames {
                    names: root_names.len(),
                    columns,
                },
                names_at,
            );
        }
    }

    if reader.pos != reader.bytes.len() {
        return fail(DecodeErrorKind::TrailingBytes, reader.offset());
    }

    Ok(DecodedBody {
        plan: Plan {
            extensions: layout.extensions.clone(),
            schemas: reader.schemas,
            sources: reader.sources,
            roots,
            root_names,
        },
        nodes: reader.nodes.unwrap_or_default(),
    })
}

struct BodyReader<'a, 'l> {
    layout: &'l Layout<'a>,
    bytes: &'a [u8],
    /// Absolute offset of `bytes` in the buffer.
    base: usize,
    pos: usize,
    depth: u32,
    max_depth: u32,
    schemas: Vec<SchemaDecl>,
    sources: Vec<SourceDecl>,
    nodes: Option<Vec<NodeEntry>>,
}

impl<'a> BodyReader<'a, '_> {
    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn err(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError::new(kind, self.offset())
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + N)
            .ok_or(self.err(DecodeErrorKind::Truncated))?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos += N;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    fn i128(&mut self) -> Result<i128, DecodeError> {
        Ok(i128::from_le_bytes(self.take()?))
    }

    /// A 0/1 byte.
    fn flag(&mut self) -> Result<bool, DecodeError> {
        let at = self.offset();
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => fail(DecodeErrorKind::InvalidFlag, at),
        }
    }

    fn string(&mut self) -> Result<&'a str, DecodeError> {
        let at = self.offset();
        let id = self.u32()?;
        self.layout
            .strings
            .get(id)
            .ok_or(DecodeError::new(DecodeErrorKind::StringOutOfRange(id), at))
    }

    fn opt_string(&mut self) -> Result<Option<String>, DecodeError> {
        let s = self.string()?;
        Ok((!s.is_empty()).then(|| s.to_owned()))
    }

    fn enter(&mut self) -> Result<(), DecodeError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.err(DecodeErrorKind::TooDeep(self.max_depth)));
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.depth -= 1;
    }

    fn schema(&mut self) -> Result<SchemaDecl, DecodeError> {
        let name = self.opt_string()?;
        let count = self.u32()?;
        let mut fields = Vec::new();
        for _ in 0..count {
            let name = self.string()?.to_owned();
            let ty = self.ty()?;
            fields.push(SchemaField { name, ty });
        }
        Ok(SchemaDecl { name, fields })
    }

    fn source(&mut self) -> Result<SourceDecl, DecodeError> {
        let name = self.opt_string()?;
        let at = self.offset();
        let kind = match self.u8()? {
            tags::ABSENT => return fail(DecodeErrorKind::MissingRequired("source kind"), at),
            tags::source::NAMED_TABLE => {
                let count = self.u32()?;
                let mut names = Vec::new();
                for _ in 0..count {
                    names.push(self.string()?.to_owned());
                }
                SourceKind::NamedTable { names }
            }
            tags::source::LOCAL_FILES => {
                let count = self.u32()?;
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(self.file_item()?);
                }
                SourceKind::LocalFiles { items }
            }
            tags::source::VIRTUAL_TABLE => SourceKind::VirtualTable,
            tags::source::EXTENSION_TABLE => SourceKind::ExtensionTable {
                detail: self.opt_string()?,
            },
            tag => return fail(DecodeErrorKind::UnknownTag { what: "source", tag }, at),
        };
        Ok(SourceDecl { name, kind })
    }

    fn file_item(&mut self) -> Result<FileItem, DecodeError> {
        let at = self.offset();
        let raw = self.u8()?;
        let path_kind = PathKind::from_u8(raw).ok_or(DecodeError::new(
            DecodeErrorKind::UnknownTag {
                what: "path kind",
                tag: raw,
            },
            at,
        ))?;
        let path = self.string()?.to_owned();

        let at = self.offset();
        let flags = self.u8()?;
        if flags & !file_flags::ALL != 0 {
            return fail(DecodeErrorKind::InvalidFlag, at);
        }
        let partition_index = self.opt_u64(flags & file_flags::PARTITION != 0)?;
        let start = self.opt_u64(flags & file_flags::START != 0)?;
        let length = self.opt_u64(flags & file_flags::LENGTH != 0)?;

        let at = self.offset();
        let format = match self.u8()? {
            tags::ABSENT => None,
            raw => Some(FileFormat::from_u8(raw).ok_or(DecodeError::new(
                DecodeErrorKind::UnknownTag {
                    what: "file format",
                    tag: raw,
                },
                at,
            ))?),
        };

        Ok(FileItem {
            path_kind,
            path,
            partition_index,
            start,
            length,
            format,
        })
    }

    fn opt_u64(&mut self, present: bool) -> Result<Option<u64>, DecodeError> {
        if present { self.u64().map(Some) } else { Ok(None) }
    }

    fn ty(&mut self) -> Result<Type, DecodeError> {
        let at = self.offset();
        self.enter()?;
        let tag = self.u8()?;
        let nullable = self.flag()?;
        let kind = match tag {
            tags::ABSENT => return fail(DecodeErrorKind::MissingRequired("type"), at),
            tags::ty::FIXED_CHAR => TypeKind::FixedChar(self.u32()?),
            tags::ty::VAR_CHAR => TypeKind::VarChar(self.u32()?),
            tags::ty::FIXED_BINARY => TypeKind::FixedBinary(self.u32()?),
            tags::ty::DECIMAL => {
                let precision = self.u8()?;
                let scale = self.u8()?;
                TypeKind::Decimal { precision, scale }
            }
            tags::ty::LIST => TypeKind::List(Box::new(self.ty()?)),
            tags::ty::MAP => {
                let key = self.ty()?;
                let value = self.ty()?;
                TypeKind::Map(Box::new(key), Box::new(value))
            }
            tags::ty::STRUCT => {
                let count = self.u32()?;
                let mut fields = Vec::new();
                for _ in 0..count {
                    fields.push(self.ty()?);
                }
                TypeKind::Struct(fields)
            }
            tags::ty::USER_DEFINED => {
                let anchor_at = self.offset();
                let raw = self.u32()?;
                let anchor = Anchor::new(raw)
                    .filter(|a| self.layout.extensions.type_ext(*a).is_some())
                    .ok_or(DecodeError::new(
                        DecodeErrorKind::AnchorOutOfRange {
                            what: "type",
                            anchor: raw,
                        },
                        anchor_at,
                    ))?;
                TypeKind::UserDefined(anchor)
            }
            tag => tags::primitive_kind(tag).ok_or(DecodeError::new(
                DecodeErrorKind::UnknownTag { what: "type", tag },
                at,
            ))?,
        };
        self.exit();

        let ty = Type { kind, nullable };
        ty.validate().map_err(|e| DecodeError::new(e.into(), at))?;
        Ok(ty)
    }

    fn function_anchor(&mut self) -> Result<Anchor, DecodeError> {
        let at = self.offset();
        let raw = self.u32()?;
        Anchor::new(raw)
            .filter(|a| self.layout.extensions.function(*a).is_some())
            .ok_or(DecodeError::new(
                DecodeErrorKind::AnchorOutOfRange {
                    what: "function",
                    anchor: raw,
                },
                at,
            ))
    }

    /// Reads an expression and checks its field references against `scope`.
    fn expr(&mut self, scope: &[Column]) -> Result<Expr, DecodeError> {
        let at = self.offset();
        let expr = self.raw_expr()?;
        derive::expr_type(&expr, scope, &self.schemas).map_err(|e| DecodeError::new(e.into(), at))?;
        Ok(expr)
    }

    fn opt_expr(&mut self, scope: &[Column]) -> Result<Option<Expr>, DecodeError> {
        if self.bytes.get(self.pos) == Some(&tags::ABSENT) {
            self.pos += 1;
            return Ok(None);
        }
        self.expr(scope).map(Some)
    }

    fn raw_expr(&mut self) -> Result<Expr, DecodeError> {
        let at = self.offset();
        self.enter()?;
        let expr = match self.u8()? {
            tags::ABSENT => return fail(DecodeErrorKind::MissingRequired("expression"), at),
            tags::expr::FIELD => {
                let index = self.u32()?;
                let steps = self.u32()?;
                let mut path = Vec::new();
                for _ in 0..steps {
                    path.push(self.u32()?);
                }
                Expr::Field(FieldRef { index, path })
            }
            tags::expr::LITERAL => {
                let ty = self.ty()?;
                let value = self.literal_value()?;
                let literal = Literal { value, ty };
                literal.check().map_err(|e| DecodeError::new(e.into(), at))?;
                Expr::Literal(literal)
            }
            tags::expr::FUNCTION => {
                let anchor = self.function_anchor()?;
                let output = self.ty()?;
                let args = self.raw_exprs()?;
                Expr::Function(FunctionCall {
                    anchor,
                    args,
                    output,
                })
            }
            tags::expr::CAST => {
                let ty = self.ty()?;
                let input = self.raw_expr()?;
                Expr::Cast(Cast {
                    input: Box::new(input),
                    ty,
                })
            }
            tags::expr::SUBQUERY => Expr::Subquery(self.subquery()?),
            tag => return fail(DecodeErrorKind::UnknownTag { what: "expression", tag }, at),
        };
        self.exit();
        Ok(expr)
    }

    fn subquery(&mut self) -> Result<Subquery, DecodeError> {
        let at = self.offset();
        let subquery = match self.u8()? {
            tags::subquery::SCALAR => Subquery::Scalar(Box::new(self.rel()?.0)),
            tags::subquery::IN_PREDICATE => {
                let needles = self.raw_exprs()?;
                let haystack = Box::new(self.rel()?.0);
                Subquery::InPredicate { needles, haystack }
            }
            tags::subquery::SET_PREDICATE => {
                let op = self.small_enum("set predicate", SetPredicateOp::from_u8)?;
                let rel = Box::new(self.rel()?.0);
                Subquery::SetPredicate { op, rel }
            }
            tags::subquery::SET_COMPARISON => {
                let comparison = self.small_enum("comparison", ComparisonOp::from_u8)?;
                let reduction = self.small_enum("reduction", ReductionOp::from_u8)?;
                let left = Box::new(self.raw_expr()?);
                let right = Box::new(self.rel()?.0);
                Subquery::SetComparison {
                    left,
                    comparison,
                    reduction,
                    right,
                }
            }
            tag => return fail(DecodeErrorKind::UnknownTag { what: "subquery", tag }, at),
        };
        Ok(subquery)
    }

    fn raw_exprs(&mut self) -> Result<Vec<Expr>, DecodeError> {
        let count = self.u32()?;
        let mut out = Vec::new();
        for _ in 0..count {
            out.push(self.raw_expr()?);
        }
        Ok(out)
    }

    fn literal_value(&mut self) -> Result<LiteralValue, DecodeError> {
        let at = self.offset();
        let value = match self.u8()? {
            tags::ABSENT => return fail(DecodeErrorKind::MissingRequired("literal value"), at),
            tags::value::NULL => LiteralValue::Null,
            tags::value::BOOLEAN => LiteralValue::Boolean(self.flag()?),
            tags::value::INTEGER => LiteralValue::Integer(self.i64()?),
            tags::value::FLOAT => LiteralValue::Float(f64::from_bits(self.u64()?)),
            tags::value::DECIMAL => LiteralValue::Decimal(self.i128()?),
            tags::value::STRING => LiteralValue::String(self.string()?.to_owned()),
            tags::value::MAP => {
                self.enter()?;
                let count = self.u32()?;
                let mut entries = Vec::new();
                for _ in 0..count {
                    let key = self.literal_value()?;
                    let value = self.literal_value()?;
                    entries.push((key, value));
                }
                self.exit();
                LiteralValue::Map(entries)
            }
            tags::value::STRUCT => {
                self.enter()?;
                let count = self.u32()?;
                let mut values = Vec::new();
                for _ in 0..count {
                    values.push(self.literal_value()?);
                }
                self.exit();
                LiteralValue::Struct(values)
            }
            tag => return fail(DecodeErrorKind::UnknownTag { what: "literal", tag }, at),
        };
        Ok(value)
    }

    fn small_enum<T>(
        &mut self,
        what: &'static str,
        from_u8: fn(u8) -> Option<T>,
    ) -> Result<T, DecodeError> {
        let at = self.offset();
        let tag = self.u8()?;
        from_u8(tag).ok_or(DecodeError::new(DecodeErrorKind::UnknownTag { what, tag }, at))
    }

    fn schema_index(&mut self) -> Result<u32, DecodeError> {
        let at = self.offset();
        let index = self.u32()?;
        if index as usize >= self.schemas.len() {
            return fail(DecodeErrorKind::SchemaOutOfRange(index), at);
        }
        Ok(index)
    }

    /// Stored as `index + 1`, 0 for none.
    fn opt_schema_index(&mut self) -> Result<Option<u32>, DecodeError> {
        let at = self.offset();
        match self.u32()? {
            0 => Ok(None),
            raw if (raw - 1) as usize >= self.schemas.len() => {
                fail(DecodeErrorKind::SchemaOutOfRange(raw - 1), at)
            }
            raw => Ok(Some(raw - 1)),
        }
    }

    fn named_exprs(&mut self, scope: &[Column]) -> Result<Vec<NamedExpr>, DecodeError> {
        let count = self.u32()?;
        let mut out = Vec::new();
        for _ in 0..count {
            let expr = self.expr(scope)?;
            let name = self.opt_string()?;
            out.push(NamedExpr { expr, name });
        }
        Ok(out)
    }

    /// Stored as `len + 1`, 0 for none.
    fn emit(&mut self) -> Result<Option<Vec<u32>>, DecodeError> {
        let count = match self.u32()? {
            0 => return Ok(None),
            n => n - 1,
        };
        let mut emit = Vec::new();
        for _ in 0..count {
            emit.push(self.u32()?);
        }
        Ok(Some(emit))
    }

    /// Reads one relation subtree and returns it with its output columns.
    ///
    /// Inputs precede the rest of a node's payload, so nodes wait on an
    /// explicit stack until their inputs are read. Input chains of any
    /// length cost heap, not native stack.
    fn rel(&mut self) -> Result<(Rel, Vec<Column>), DecodeError> {
        let mut waiting: Vec<OpenRel> = Vec::new();
        let mut node = self.open_rel()?;
        loop {
            if node.inputs.len() < node.expected {
                waiting.push(node);
                node = self.open_rel()?;
                continue;
            }
            let finished = self.close_rel(node)?;
            match waiting.pop() {
                Some(mut parent) => {
                    parent.inputs.push(finished);
                    node = parent;
                }
                None => return Ok(finished),
            }
        }
    }

    /// Reads a node's tag, name and input count.
    fn open_rel(&mut self) -> Result<OpenRel, DecodeError> {
        let at = self.offset();
        self.enter()?;
        let raw = self.u8()?;
        if raw == tags::ABSENT {
            return fail(DecodeErrorKind::MissingRequired("relation"), at);
        }
        let tag = RelTag::from_u8(raw).ok_or(DecodeError::new(
            DecodeErrorKind::UnknownTag {
                what: "relation",
                tag: raw,
            },
            at,
        ))?;
        let name = self.opt_string()?;
        tracing::trace!(offset = at, %tag, name = name.as_deref(), "decoding relation");

        let depth = self.depth - 1;
        let entry = self.nodes.as_mut().map(|nodes| {
            nodes.push(NodeEntry {
                offset: at,
                depth,
                tag,
                name: name.clone(),
                columns: 0,
            });
            nodes.len() - 1
        });

        let (set_op, expected) = match tag {
            RelTag::Set => {
                let op = self.small_enum("set operation", SetOp::from_u8)?;
                (Some(op), self.u32()? as usize)
            }
            RelTag::ExtensionMulti => (None, self.u32()? as usize),
            tag => (None, tag.input_arity().0),
        };

        Ok(OpenRel {
            at,
            tag,
            name,
            entry,
            set_op,
            expected,
            inputs: Vec::new(),
        })
    }

    /// Reads the rest of a node once its inputs are done.
    fn close_rel(&mut self, node: OpenRel) -> Result<(Rel, Vec<Column>), DecodeError> {
        let OpenRel {
            at,
            tag,
            name,
            entry,
            set_op,
            inputs,
            ..
        } = node;

        let (kind, inputs) = self.rel_kind(tag, name.as_deref(), set_op, inputs, at)?;
        let emit = self.emit()?;

        let rel = Rel { name, kind, emit };
        let refs: Vec<&[Column]> = inputs.iter().map(Vec::as_slice).collect();
        let columns = derive::node_columns(&rel, &refs, &self.schemas, rel.name.as_deref())
            .map_err(|e| DecodeError::new(e.into(), at))?;

        if let (Some(nodes), Some(index)) = (self.nodes.as_mut(), entry) {
            nodes[index].columns = columns.len();
        }
        self.exit();
        Ok((rel, columns))
    }

    fn rel_kind(
        &mut self,
        tag: RelTag,
        name: Option<&str>,
        set_op: Option<SetOp>,
        inputs: Vec<(Rel, Vec<Column>)>,
        at: usize,
    ) -> Result<(RelKind, Vec<Vec<Column>>), DecodeError> {
        let decoded = match tag {
            RelTag::Read => {
                let schema = self.schema_index()?;
                let source_at = self.offset();
                let source = self.u32()?;
                if source as usize >= self.sources.len() {
                    return fail(DecodeErrorKind::SourceOutOfRange(source), source_at);
                }
                let scope = self.schema_scope(schema, name);
                let filter = self.opt_expr(&scope)?;
                let best_effort_filter = self.opt_expr(&scope)?;
                (
                    RelKind::Read(ReadRel {
                        schema,
                        source,
                        filter,
                        best_effort_filter,
                    }),
                    Vec::new(),
                )
            }
            RelTag::Filter => {
                let [(input, cols)] = fixed(inputs, at)?;
                let condition = self.expr(&cols)?;
                (
                    RelKind::Filter(FilterRel {
                        input: Box::new(input),
                        condition,
                    }),
                    vec![cols],
                )
            }
            RelTag::Project => {
                let [(input, cols)] = fixed(inputs, at)?;
                let expressions = self.named_exprs(&cols)?;
                (
                    RelKind::Project(ProjectRel {
                        input: Box::new(input),
                        expressions,
                    }),
                    vec![cols],
                )
            }
            RelTag::Join => {
                let [(left, left_cols), (right, right_cols)] = fixed(inputs, at)?;
                let join_type = self.small_enum("join type", JoinType::from_u8)?;
                let condition = self.expr(&derive::join_scope(&left_cols, &right_cols))?;
                let output = derive::join_columns(join_type, &left_cols, &right_cols);
                let post_filter = self.opt_expr(&output)?;
                (
                    RelKind::Join(JoinRel {
                        left: Box::new(left),
                        right: Box::new(right),
                        join_type,
                        condition,
                        post_filter,
                    }),
                    vec![left_cols, right_cols],
                )
            }
            RelTag::Cross => {
                let [(left, left_cols), (right, right_cols)] = fixed(inputs, at)?;
                (
                    RelKind::Cross(CrossRel {
                        left: Box::new(left),
                        right: Box::new(right),
                    }),
                    vec![left_cols, right_cols],
                )
            }
            RelTag::Fetch => {
                let [(input, cols)] = fixed(inputs, at)?;
                let fetch_at = self.offset();
                let offset = self.i64()?;
                let count = self.i64()?;
                if offset < 0 || count < -1 {
                    return fail(DecodeErrorKind::InvalidFetch { offset, count }, fetch_at);
                }
                (
                    RelKind::Fetch(FetchRel {
                        input: Box::new(input),
                        offset,
                        count,
                    }),
                    vec![cols],
                )
            }
            RelTag::Aggregate => {
                let [(input, cols)] = fixed(inputs, at)?;
                let groupings = self.named_exprs(&cols)?;
                let count = self.u32()?;
                let mut measures = Vec::new();
                for _ in 0..count {
                    measures.push(self.measure(&cols)?);
                }
                (
                    RelKind::Aggregate(AggregateRel {
                        input: Box::new(input),
                        groupings,
                        measures,
                    }),
                    vec![cols],
                )
            }
            RelTag::Sort => {
                let [(input, cols)] = fixed(inputs, at)?;
                let count = self.u32()?;
                let mut fields = Vec::new();
                for _ in 0..count {
                    let expr = self.expr(&cols)?;
                    let direction = self.small_enum("sort direction", SortDirection::from_u8)?;
                    fields.push(SortField { expr, direction });
                }
                (
                    RelKind::Sort(SortRel {
                        input: Box::new(input),
                        fields,
                    }),
                    vec![cols],
                )
            }
            RelTag::Set => {
                let Some(op) = set_op else {
                    return fail(DecodeErrorKind::MissingRequired("set operation"), at);
                };
                let (inputs, cols): (Vec<Rel>, Vec<Vec<Column>>) = inputs.into_iter().unzip();
                (RelKind::Set(SetRel { inputs, op }), cols)
            }
            RelTag::ExtensionLeaf => {
                let schema = self.schema_index()?;
                let detail = self.opt_string()?;
                (
                    RelKind::ExtensionLeaf(ExtensionLeafRel { schema, detail }),
                    Vec::new(),
                )
            }
            RelTag::ExtensionSingle => {
                let [(input, cols)] = fixed(inputs, at)?;
                let schema = self.opt_schema_index()?;
                let detail = self.opt_string()?;
                (
                    RelKind::ExtensionSingle(ExtensionSingleRel {
                        input: Box::new(input),
                        schema,
                        detail,
                    }),
                    vec![cols],
                )
            }
            RelTag::ExtensionMulti => {
                let (inputs, cols): (Vec<Rel>, Vec<Vec<Column>>) = inputs.into_iter().unzip();
                let schema = self.opt_schema_index()?;
                let detail = self.opt_string()?;
                (
                    RelKind::ExtensionMulti(ExtensionMultiRel {
                        inputs,
                        schema,
                        detail,
                    }),
                    cols,
                )
            }
        };
        Ok(decoded)
    }

    fn measure(&mut self, scope: &[Column]) -> Result<Measure, DecodeError> {
        let function = self.function_anchor()?;
        let phase = self.small_enum("aggregation phase", AggregationPhase::from_u8)?;
        let invocation = self.small_enum("invocation", Invocation::from_u8)?;
        let output = self.ty()?;
        let count = self.u32()?;
        let mut args = Vec::new();
        for _ in 0..count {
            args.push(self.expr(scope)?);
        }
        let filter = self.opt_expr(scope)?;
        let name = self.opt_string()?;
        Ok(Measure {
            function,
            args,
            output,
            phase,
            invocation,
            filter,
            name,
        })
    }

    /// Columns of a base schema as seen by a read's own filter.
    fn schema_scope(&self, index: u32, qualifier: Option<&str>) -> Vec<Column> {
        self.schemas[index as usize]
            .fields
            .iter()
            .map(|f| Column {
                qualifier: qualifier.map(str::to_owned),
                name: f.name.clone(),
                ty: f.ty.clone(),
            })
            .collect()
    }
}

/// A relation whose inputs are still being read.
struct OpenRel {
    at: usize,
    tag: RelTag,
    name: Option<String>,
    /// Index into the recorded nodes, when recording.
    entry: Option<usize>,
    set_op: Option<SetOp>,
    expected: usize,
    inputs: Vec<(Rel, Vec<Column>)>,
}

/// Inputs of a node with fixed arity.
fn fixed<const N: usize>(
    inputs: Vec<(Rel, Vec<Column>)>,
    at: usize,
) -> Result<[(Rel, Vec<Column>); N], DecodeError> {
    let found = inputs.len();
    inputs.try_into().map_err(|_| {
        DecodeError::new(
            SchemaError::InputCount { expected: N, found }.into(),
            at,
        )
    })
}
