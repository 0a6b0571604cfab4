#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Binary wire format for TextPlan plans.
//!
//! Layout: a 64-byte [`Header`] followed by 8-byte aligned sections
//! (string blob, string table, extension tables, plan body). The body is a
//! tagged pre-order stream of schemas, sources and relation trees.

mod decode;
mod dump;
mod encode;
mod error;
mod header;
mod strings;
mod tags;

#[cfg(test)]
mod decode_tests;
#[cfg(test)]
mod dump_tests;
#[cfg(test)]
mod header_tests;
#[cfg(test)]
mod test_utils;

pub use decode::{Decoder, decode};
pub use dump::dump;
pub use encode::{Encoder, encode};
pub use error::{DecodeError, DecodeErrorKind, EncodeError};
pub use header::{HEADER_SIZE, Header, SectionOffsets};
pub use strings::{StringId, StringTableBuilder};
pub use textplan_core::DEFAULT_MAX_DEPTH;

/// Magic bytes at the start of every plan buffer.
pub const MAGIC: [u8; 4] = *b"TPLN";

/// Current format version.
pub const VERSION: u32 = 1;

/// Alignment of every section after the header.
pub const SECTION_ALIGN: usize = 8;
