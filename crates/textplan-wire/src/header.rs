//! Plan buffer header (64 bytes).
//!
//! Offsets are not stored: they follow from the counts and blob sizes.
//! Section order: Header → StringBlob → StringTable → Uris → Functions →
//! Types → Body

use super::{MAGIC, SECTION_ALIGN, VERSION};

pub const HEADER_SIZE: usize = 64;

/// First 64 bytes of every plan buffer.
///
/// - 0-23: identity and sizes (magic, version, checksum, total_size, str_blob_size, body_size)
/// - 24-55: element counts (8 × u32), in section order then body order
/// - 56-63: reserved
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Magic bytes: b"TPLN"
    pub magic: [u8; 4],
    pub version: u32,
    /// CRC32 of everything after the header.
    pub checksum: u32,
    /// Total buffer size in bytes.
    pub total_size: u32,
    pub str_blob_size: u32,
    pub body_size: u32,

    pub str_count: u32,
    pub uri_count: u32,
    pub function_count: u32,
    pub type_count: u32,
    pub schema_count: u32,
    pub source_count: u32,
    pub root_count: u32,
    pub root_name_count: u32,

    pub _reserved: [u8; 8],
}

impl Default for Header {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            checksum: 0,
            total_size: 0,
            str_blob_size: 0,
            body_size: 0,
            str_count: 0,
            uri_count: 0,
            function_count: 0,
            type_count: 0,
            schema_count: 0,
            source_count: 0,
            root_count: 0,
            root_name_count: 0,
            _reserved: [0; 8],
        }
    }
}

/// Section offsets derived from header counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionOffsets {
    pub str_blob: u64,
    pub str_table: u64,
    pub uris: u64,
    pub functions: u64,
    pub types: u64,
    pub body: u64,
    /// One past the body; equals `total_size` for a well-formed buffer.
    pub end: u64,
}

fn read_u32(bytes: &[u8; HEADER_SIZE], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl Header {
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&bytes[56..64]);

        Self {
            magic: [bytes[0], bytes[1], bytes[2], bytes[3]],
            version: read_u32(bytes, 4),
            checksum: read_u32(bytes, 8),
            total_size: read_u32(bytes, 12),
            str_blob_size: read_u32(bytes, 16),
            body_size: read_u32(bytes, 20),
            str_count: read_u32(bytes, 24),
            uri_count: read_u32(bytes, 28),
            function_count: read_u32(bytes, 32),
            type_count: read_u32(bytes, 36),
            schema_count: read_u32(bytes, 40),
            source_count: read_u32(bytes, 44),
            root_count: read_u32(bytes, 48),
            root_name_count: read_u32(bytes, 52),
            _reserved: reserved,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        let words = [
            self.version,
            self.checksum,
            self.total_size,
            self.str_blob_size,
            self.body_size,
            self.str_count,
            self.uri_count,
            self.function_count,
            self.type_count,
            self.schema_count,
            self.source_count,
            self.root_count,
            self.root_name_count,
        ];
        for (i, word) in words.iter().enumerate() {
            let at = 4 + i * 4;
            bytes[at..at + 4].copy_from_slice(&word.to_le_bytes());
        }
        bytes[56..64].copy_from_slice(&self._reserved);
        bytes
    }

    pub fn validate_magic(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn validate_version(&self) -> bool {
        self.version == VERSION
    }

    /// Computes section offsets. Arithmetic is done in u64 so corrupted
    /// counts cannot wrap around.
    pub fn compute_offsets(&self) -> SectionOffsets {
        let align = SECTION_ALIGN as u64;

        let str_blob = HEADER_SIZE as u64;
        let str_table = align_up(str_blob + self.str_blob_size as u64, align);
        let str_table_size = (self.str_count as u64 + 1) * 4;

        let uris = align_up(str_table + str_table_size, align);
        let functions = align_up(uris + self.uri_count as u64 * 4, align);
        let types = align_up(functions + self.function_count as u64 * 8, align);
        let body = align_up(types + self.type_count as u64 * 8, align);
        let end = body + self.body_size as u64;

        SectionOffsets {
            str_blob,
            str_table,
            uris,
            functions,
            types,
            body,
            end,
        }
    }
}

/// Round up to the next multiple of `align` (a power of two).
pub(crate) fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) & !(align - 1)
}
