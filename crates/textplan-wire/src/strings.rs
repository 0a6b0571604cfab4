//! String table: a UTF-8 blob plus `count + 1` u32 offsets.
//!
//! StringId(0) is the empty string and doubles as "absent" for optional
//! names, so every real string starts at index 1.

use std::collections::HashMap;

use crate::error::{DecodeError, DecodeErrorKind};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);

impl StringId {
    pub const EMPTY: StringId = StringId(0);

    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Collects strings in first-use order and assigns dense ids.
#[derive(Debug)]
pub struct StringTableBuilder {
    lookup: HashMap<String, StringId>,
    strings: Vec<String>,
}

impl Default for StringTableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTableBuilder {
    pub fn new() -> Self {
        let mut lookup = HashMap::new();
        lookup.insert(String::new(), StringId::EMPTY);
        Self {
            lookup,
            strings: vec![String::new()],
        }
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = StringId(self.strings.len() as u32);
        self.strings.push(s.to_owned());
        self.lookup.insert(s.to_owned(), id);
        id
    }

    /// `None` maps to the reserved empty id.
    pub fn intern_opt(&mut self, s: Option<&str>) -> StringId {
        s.map_or(StringId::EMPTY, |s| self.intern(s))
    }

    /// Number of strings, the reserved empty string included.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.len() <= 1
    }

    pub fn get(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(String::as_str)
    }

    /// Emits the string blob and the offset table (with trailing sentinel).
    pub fn emit(&self) -> (Vec<u8>, Vec<u8>) {
        let mut blob = Vec::new();
        let mut table = Vec::with_capacity((self.strings.len() + 1) * 4);

        for s in &self.strings {
            table.extend_from_slice(&(blob.len() as u32).to_le_bytes());
            blob.extend_from_slice(s.as_bytes());
        }
        table.extend_from_slice(&(blob.len() as u32).to_le_bytes());

        (blob, table)
    }
}

/// Decoded string table. Every entry is checked once up front so lookups
/// never fail on content, only on range.
#[derive(Debug)]
pub(crate) struct StringTable<'a> {
    strings: Vec<&'a str>,
}

impl<'a> StringTable<'a> {
    /// `table_offset` is the absolute offset of `table`, used for errors.
    pub(crate) fn read(
        blob: &'a [u8],
        table: &[u8],
        count: usize,
        table_offset: usize,
    ) -> Result<Self, DecodeError> {
        let offset_at = |i: usize| {
            let at = i * 4;
            u32::from_le_bytes([table[at], table[at + 1], table[at + 2], table[at + 3]]) as usize
        };

        let mut strings = Vec::with_capacity(count);
        for i in 0..count {
            let (start, end) = (offset_at(i), offset_at(i + 1));
            if start > end || end > blob.len() {
                return Err(DecodeError::new(
                    DecodeErrorKind::BadStringTable,
                    table_offset + i * 4,
                ));
            }
            let s = std::str::from_utf8(&blob[start..end])
                .map_err(|_| DecodeError::new(DecodeErrorKind::InvalidUtf8, table_offset + i * 4))?;
            strings.push(s);
        }

        if strings.first().is_some_and(|s| !s.is_empty()) {
            return Err(DecodeError::new(DecodeErrorKind::BadStringTable, table_offset));
        }

        Ok(Self { strings })
    }

    pub(crate) fn len(&self) -> usize {
        self.strings.len()
    }

    pub(crate) fn get(&self, id: u32) -> Option<&'a str> {
        self.strings.get(id as usize).copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.strings.iter().copied()
    }
}
