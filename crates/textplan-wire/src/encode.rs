//! Plan → bytes.
//!
//! Strings are interned in a fixed order (extension tables first, then the
//! body in traversal order), so equal plans always produce identical bytes.

use textplan_core::{
    AnchorError, DEFAULT_MAX_DEPTH, Expr, FileItem, LiteralValue, Plan, Rel, RelKind, SchemaDecl,
    SourceDecl, SourceKind, Subquery, Type, TypeKind,
};

use crate::error::EncodeError;
use crate::header::{HEADER_SIZE, Header, align_up};
use crate::strings::{StringId, StringTableBuilder};
use crate::tags::{self, file_flags};
use crate::SECTION_ALIGN;

/// Serializes plans, refusing any the decoder would reject as too deep.
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    max_depth: u32,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn encode(&self, plan: &Plan) -> Result<Vec<u8>, EncodeError> {
        plan.check_depth(self.max_depth)?;
        encode_checked(plan)
    }
}

/// Serializes a plan into a self-contained buffer, with the default depth
/// limit.
pub fn encode(plan: &Plan) -> Result<Vec<u8>, EncodeError> {
    Encoder::new().encode(plan)
}

fn encode_checked(plan: &Plan) -> Result<Vec<u8>, EncodeError> {
    let mut enc = BodyWriter {
        plan,
        strings: StringTableBuilder::new(),
        body: Vec::new(),
    };

    let mut uris = Vec::new();
    for (_, uri) in plan.extensions.uris() {
        let id = enc.strings.intern(uri);
        uris.extend_from_slice(&id.get().to_le_bytes());
    }
    let mut functions = Vec::new();
    for (_, f) in plan.extensions.functions() {
        let id = enc.strings.intern(&f.name);
        functions.extend_from_slice(&f.uri.get().to_le_bytes());
        functions.extend_from_slice(&id.get().to_le_bytes());
    }
    let mut types = Vec::new();
    for (_, t) in plan.extensions.types() {
        let id = enc.strings.intern(&t.name);
        types.extend_from_slice(&t.uri.get().to_le_bytes());
        types.extend_from_slice(&id.get().to_le_bytes());
    }

    for schema in &plan.schemas {
        enc.schema(schema)?;
    }
    for source in &plan.sources {
        enc.source(source)?;
    }
    for root in &plan.roots {
        enc.rel(root)?;
    }
    for name in &plan.root_names {
        let id = enc.strings.intern(name);
        enc.u32(id.get());
    }

    let (blob, table) = enc.strings.emit();

    let mut header = Header {
        str_blob_size: count_u32("string bytes", blob.len())?,
        body_size: count_u32("body bytes", enc.body.len())?,
        str_count: count_u32("strings", enc.strings.len())?,
        uri_count: count_u32("uris", plan.extensions.uri_count())?,
        function_count: count_u32("functions", plan.extensions.function_count())?,
        type_count: count_u32("types", plan.extensions.type_count())?,
        schema_count: count_u32("schemas", plan.schemas.len())?,
        source_count: count_u32("sources", plan.sources.len())?,
        root_count: count_u32("roots", plan.roots.len())?,
        root_name_count: count_u32("root names", plan.root_names.len())?,
        ..Header::default()
    };

    let offsets = header.compute_offsets();
    let total = usize::try_from(offsets.end).map_err(|_| EncodeError::TooMany {
        what: "bytes",
        count: usize::MAX,
    })?;
    header.total_size = count_u32("bytes", total)?;

    let mut out = vec![0u8; HEADER_SIZE];
    out.extend_from_slice(&blob);
    pad_to_section(&mut out);
    out.extend_from_slice(&table);
    pad_to_section(&mut out);
    out.extend_from_slice(&uris);
    pad_to_section(&mut out);
    out.extend_from_slice(&functions);
    pad_to_section(&mut out);
    out.extend_from_slice(&types);
    pad_to_section(&mut out);
    debug_assert_eq!(out.len() as u64, offsets.body);
    out.extend_from_slice(&enc.body);

    header.checksum = crc32fast::hash(&out[HEADER_SIZE..]);
    out[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

    tracing::debug!(
        bytes = out.len(),
        strings = header.str_count,
        roots = header.root_count,
        "encoded plan"
    );

    Ok(out)
}

fn count_u32(what: &'static str, count: usize) -> Result<u32, EncodeError> {
    u32::try_from(count).map_err(|_| EncodeError::TooMany { what, count })
}

fn pad_to_section(out: &mut Vec<u8>) {
    let aligned = align_up(out.len() as u64, SECTION_ALIGN as u64) as usize;
    out.resize(aligned, 0);
}

struct BodyWriter<'p> {
    plan: &'p Plan,
    strings: StringTableBuilder,
    body: Vec<u8>,
}

impl BodyWriter<'_> {
    fn u8(&mut self, v: u8) {
        self.body.push(v);
    }

    fn u32(&mut self, v: u32) {
        self.body.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.body.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.body.extend_from_slice(&v.to_le_bytes());
    }

    fn len(&mut self, what: &'static str, n: usize) -> Result<(), EncodeError> {
        let n = count_u32(what, n)?;
        self.u32(n);
        Ok(())
    }

    fn str(&mut self, s: &str) {
        let id = self.strings.intern(s);
        self.u32(id.get());
    }

    fn opt_str(&mut self, s: Option<&str>) {
        let id: StringId = self.strings.intern_opt(s);
        self.u32(id.get());
    }

    fn schema_index(&mut self, index: u32) -> Result<(), EncodeError> {
        if index as usize >= self.plan.schemas.len() {
            return Err(EncodeError::SchemaOutOfRange(index));
        }
        self.u32(index);
        Ok(())
    }

    fn schema(&mut self, schema: &SchemaDecl) -> Result<(), EncodeError> {
        self.opt_str(schema.name.as_deref());
        self.len("schema fields", schema.fields.len())?;
        for field in &schema.fields {
            self.str(&field.name);
            self.ty(&field.ty)?;
        }
        Ok(())
    }

    fn source(&mut self, source: &SourceDecl) -> Result<(), EncodeError> {
        self.opt_str(source.name.as_deref());
        match &source.kind {
            SourceKind::NamedTable { names } => {
                self.u8(tags::source::NAMED_TABLE);
                self.len("table name parts", names.len())?;
                for name in names {
                    self.str(name);
                }
            }
            SourceKind::LocalFiles { items } => {
                self.u8(tags::source::LOCAL_FILES);
                self.len("file items", items.len())?;
                for item in items {
                    self.file_item(item);
                }
            }
            SourceKind::VirtualTable => self.u8(tags::source::VIRTUAL_TABLE),
            SourceKind::ExtensionTable { detail } => {
                self.u8(tags::source::EXTENSION_TABLE);
                self.opt_str(detail.as_deref());
            }
        }
        Ok(())
    }

    fn file_item(&mut self, item: &FileItem) {
        self.u8(item.path_kind as u8);
        self.str(&item.path);

        let mut flags = 0;
        if item.partition_index.is_some() {
            flags |= file_flags::PARTITION;
        }
        if item.start.is_some() {
            flags |= file_flags::START;
        }
        if item.length.is_some() {
            flags |= file_flags::LENGTH;
        }
        self.u8(flags);
        for v in [item.partition_index, item.start, item.length].into_iter().flatten() {
            self.u64(v);
        }
        self.u8(item.format.map_or(tags::ABSENT, |f| f as u8));
    }

    fn ty(&mut self, ty: &Type) -> Result<(), EncodeError> {
        let tag = match &ty.kind {
            TypeKind::FixedChar(_) => tags::ty::FIXED_CHAR,
            TypeKind::VarChar(_) => tags::ty::VAR_CHAR,
            TypeKind::FixedBinary(_) => tags::ty::FIXED_BINARY,
            TypeKind::Decimal { .. } => tags::ty::DECIMAL,
            TypeKind::List(_) => tags::ty::LIST,
            TypeKind::Map(..) => tags::ty::MAP,
            TypeKind::Struct(_) => tags::ty::STRUCT,
            TypeKind::UserDefined(_) => tags::ty::USER_DEFINED,
            kind => tags::primitive_tag(kind).unwrap_or(tags::ABSENT),
        };
        self.u8(tag);
        self.u8(ty.nullable as u8);

        match &ty.kind {
            TypeKind::FixedChar(n) | TypeKind::VarChar(n) | TypeKind::FixedBinary(n) => {
                self.u32(*n)
            }
            TypeKind::Decimal { precision, scale } => {
                self.u8(*precision);
                self.u8(*scale);
            }
            TypeKind::List(item) => self.ty(item)?,
            TypeKind::Map(key, value) => {
                self.ty(key)?;
                self.ty(value)?;
            }
            TypeKind::Struct(fields) => {
                self.len("struct fields", fields.len())?;
                for field in fields {
                    self.ty(field)?;
                }
            }
            TypeKind::UserDefined(anchor) => {
                if self.plan.extensions.type_ext(*anchor).is_none() {
                    return Err(AnchorError::DanglingType(*anchor).into());
                }
                self.u32(anchor.get());
            }
            _ => {}
        }
        Ok(())
    }

    fn expr(&mut self, expr: &Expr) -> Result<(), EncodeError> {
        match expr {
            Expr::Field(field) => {
                self.u8(tags::expr::FIELD);
                self.u32(field.index);
                self.len("field path steps", field.path.len())?;
                for &step in &field.path {
                    self.u32(step);
                }
            }
            Expr::Literal(lit) => {
                self.u8(tags::expr::LITERAL);
                self.ty(&lit.ty)?;
                self.value(&lit.value)?;
            }
            Expr::Function(call) => {
                if self.plan.extensions.function(call.anchor).is_none() {
                    return Err(AnchorError::DanglingFunction(call.anchor).into());
                }
                self.u8(tags::expr::FUNCTION);
                self.u32(call.anchor.get());
                self.ty(&call.output)?;
                self.exprs(&call.args)?;
            }
            Expr::Cast(cast) => {
                self.u8(tags::expr::CAST);
                self.ty(&cast.ty)?;
                self.expr(&cast.input)?;
            }
            Expr::Subquery(subquery) => {
                self.u8(tags::expr::SUBQUERY);
                self.subquery(subquery)?;
            }
        }
        Ok(())
    }

    fn subquery(&mut self, subquery: &Subquery) -> Result<(), EncodeError> {
        match subquery {
            Subquery::Scalar(_) => self.u8(tags::subquery::SCALAR),
            Subquery::InPredicate { needles, .. } => {
                self.u8(tags::subquery::IN_PREDICATE);
                self.exprs(needles)?;
            }
            Subquery::SetPredicate { op, .. } => {
                self.u8(tags::subquery::SET_PREDICATE);
                self.u8(*op as u8);
            }
            Subquery::SetComparison {
                left,
                comparison,
                reduction,
                ..
            } => {
                self.u8(tags::subquery::SET_COMPARISON);
                self.u8(*comparison as u8);
                self.u8(*reduction as u8);
                self.expr(left)?;
            }
        }
        self.rel(subquery.rel())
    }

    fn value(&mut self, value: &LiteralValue) -> Result<(), EncodeError> {
        match value {
            LiteralValue::Null => self.u8(tags::value::NULL),
            LiteralValue::Boolean(b) => {
                self.u8(tags::value::BOOLEAN);
                self.u8(*b as u8);
            }
            LiteralValue::Integer(v) => {
                self.u8(tags::value::INTEGER);
                self.i64(*v);
            }
            LiteralValue::Float(v) => {
                self.u8(tags::value::FLOAT);
                self.u64(v.to_bits());
            }
            LiteralValue::Decimal(v) => {
                self.u8(tags::value::DECIMAL);
                self.body.extend_from_slice(&v.to_le_bytes());
            }
            LiteralValue::String(s) => {
                self.u8(tags::value::STRING);
                self.str(s);
            }
            LiteralValue::Map(entries) => {
                self.u8(tags::value::MAP);
                self.len("map entries", entries.len())?;
                for (key, value) in entries {
                    self.value(key)?;
                    self.value(value)?;
                }
            }
            LiteralValue::Struct(values) => {
                self.u8(tags::value::STRUCT);
                self.len("struct values", values.len())?;
                for value in values {
                    self.value(value)?;
                }
            }
        }
        Ok(())
    }

    fn exprs(&mut self, exprs: &[Expr]) -> Result<(), EncodeError> {
        self.len("expressions", exprs.len())?;
        exprs.iter().try_for_each(|e| self.expr(e))
    }

    fn opt_expr(&mut self, expr: Option<&Expr>) -> Result<(), EncodeError> {
        match expr {
            Some(e) => self.expr(e),
            None => {
                self.u8(tags::ABSENT);
                Ok(())
            }
        }
    }

    /// Optional schema index, stored as `index + 1` with 0 for none.
    fn opt_schema(&mut self, schema: Option<u32>) -> Result<(), EncodeError> {
        match schema {
            Some(index) if index as usize >= self.plan.schemas.len() => {
                Err(EncodeError::SchemaOutOfRange(index))
            }
            Some(index) => {
                self.u32(index + 1);
                Ok(())
            }
            None => {
                self.u32(0);
                Ok(())
            }
        }
    }

    /// Writes a relation subtree in pre-order. Inputs sit between a node's
    /// header and the rest of its payload; pending nodes wait on an explicit
    /// stack.
    fn rel(&mut self, root: &Rel) -> Result<(), EncodeError> {
        let mut pending = vec![(root, self.open_rel(root)?)];
        while let Some((rel, inputs)) = pending.last_mut() {
            match inputs.next() {
                Some(input) => {
                    let inputs = self.open_rel(input)?;
                    pending.push((input, inputs));
                }
                None => {
                    let rel = *rel;
                    pending.pop();
                    self.close_rel(rel)?;
                }
            }
        }
        Ok(())
    }

    /// Tag, name and input count; returns the inputs to write next.
    fn open_rel<'r>(&mut self, rel: &'r Rel) -> Result<std::vec::IntoIter<&'r Rel>, EncodeError> {
        self.u8(rel.tag() as u8);
        self.opt_str(rel.name.as_deref());
        match &rel.kind {
            RelKind::Set(r) => {
                self.u8(r.op as u8);
                self.len("relation inputs", r.inputs.len())?;
            }
            RelKind::ExtensionMulti(r) => self.len("relation inputs", r.inputs.len())?,
            _ => {}
        }
        Ok(rel.inputs().into_iter())
    }

    /// Everything after the inputs, then the emit remap.
    fn close_rel(&mut self, rel: &Rel) -> Result<(), EncodeError> {
        match &rel.kind {
            RelKind::Read(r) => {
                self.schema_index(r.schema)?;
                if r.source as usize >= self.plan.sources.len() {
                    return Err(EncodeError::SourceOutOfRange(r.source));
                }
                self.u32(r.source);
                self.opt_expr(r.filter.as_ref())?;
                self.opt_expr(r.best_effort_filter.as_ref())?;
            }
            RelKind::Filter(r) => self.expr(&r.condition)?,
            RelKind::Project(r) => {
                self.len("projections", r.expressions.len())?;
                for named in &r.expressions {
                    self.expr(&named.expr)?;
                    self.opt_str(named.name.as_deref());
                }
            }
            RelKind::Join(r) => {
                self.u8(r.join_type as u8);
                self.expr(&r.condition)?;
                self.opt_expr(r.post_filter.as_ref())?;
            }
            RelKind::Cross(_) | RelKind::Set(_) => {}
            RelKind::Fetch(r) => {
                self.i64(r.offset);
                self.i64(r.count);
            }
            RelKind::Aggregate(r) => {
                self.len("groupings", r.groupings.len())?;
                for named in &r.groupings {
                    self.expr(&named.expr)?;
                    self.opt_str(named.name.as_deref());
                }
                self.len("measures", r.measures.len())?;
                for m in &r.measures {
                    if self.plan.extensions.function(m.function).is_none() {
                        return Err(AnchorError::DanglingFunction(m.function).into());
                    }
                    self.u32(m.function.get());
                    self.u8(m.phase as u8);
                    self.u8(m.invocation as u8);
                    self.ty(&m.output)?;
                    self.exprs(&m.args)?;
                    self.opt_expr(m.filter.as_ref())?;
                    self.opt_str(m.name.as_deref());
                }
            }
            RelKind::Sort(r) => {
                self.len("sort fields", r.fields.len())?;
                for field in &r.fields {
                    self.expr(&field.expr)?;
                    self.u8(field.direction as u8);
                }
            }
            RelKind::ExtensionLeaf(r) => {
                self.schema_index(r.schema)?;
                self.opt_str(r.detail.as_deref());
            }
            RelKind::ExtensionSingle(r) => {
                self.opt_schema(r.schema)?;
                self.opt_str(r.detail.as_deref());
            }
            RelKind::ExtensionMulti(r) => {
                self.opt_schema(r.schema)?;
                self.opt_str(r.detail.as_deref());
            }
        }
        self.emit(rel.emit.as_deref())
    }

    /// Stored as `len + 1`, 0 for none.
    fn emit(&mut self, emit: Option<&[u32]>) -> Result<(), EncodeError> {
        let Some(emit) = emit else {
            self.u32(0);
            return Ok(());
        };
        self.len("emit indices", emit.len() + 1)?;
        emit.iter().for_each(|&index| self.u32(index));
        Ok(())
    }
}
