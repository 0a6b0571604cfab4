use crate::header::{HEADER_SIZE, Header, align_up};
use crate::{MAGIC, SECTION_ALIGN, VERSION};

#[test]
fn header_size() {
    assert_eq!(Header::default().to_bytes().len(), HEADER_SIZE);
}

#[test]
fn header_bytes_roundtrip() {
    let header = Header {
        checksum: 0xdead_beef,
        total_size: 512,
        str_blob_size: 40,
        body_size: 200,
        str_count: 7,
        uri_count: 1,
        function_count: 2,
        type_count: 3,
        schema_count: 4,
        source_count: 5,
        root_count: 6,
        root_name_count: 8,
        ..Header::default()
    };

    let bytes = header.to_bytes();
    assert_eq!(&bytes[0..4], b"TPLN");
    assert_eq!(&bytes[8..12], &0xdead_beef_u32.to_le_bytes());
    assert_eq!(&bytes[52..56], &8u32.to_le_bytes());
    assert_eq!(Header::from_bytes(&bytes), header);
}

#[test]
fn default_header_is_valid() {
    let header = Header::default();
    assert_eq!(header.magic, MAGIC);
    assert_eq!(header.version, VERSION);
    assert!(header.validate_magic());
    assert!(header.validate_version());
}

#[test]
fn offsets_are_section_aligned() {
    let header = Header {
        str_blob_size: 13,
        str_count: 3,
        uri_count: 1,
        function_count: 1,
        type_count: 0,
        body_size: 10,
        ..Header::default()
    };

    let offsets = header.compute_offsets();
    assert_eq!(offsets.str_blob, 64);
    // 64 + 13 rounds up to 80
    assert_eq!(offsets.str_table, 80);
    // 4 table entries
    assert_eq!(offsets.uris, 96);
    assert_eq!(offsets.functions, 104);
    assert_eq!(offsets.types, 112);
    assert_eq!(offsets.body, 112);
    assert_eq!(offsets.end, 122);

    for offset in [offsets.str_table, offsets.uris, offsets.functions, offsets.types, offsets.body] {
        assert_eq!(offset % SECTION_ALIGN as u64, 0);
    }
}

#[test]
fn huge_counts_do_not_wrap() {
    let header = Header {
        str_count: u32::MAX,
        body_size: u32::MAX,
        ..Header::default()
    };
    assert!(header.compute_offsets().end > u32::MAX as u64);
}

#[test]
fn align_up_rounds_to_power_of_two() {
    assert_eq!(align_up(0, 8), 0);
    assert_eq!(align_up(1, 8), 8);
    assert_eq!(align_up(8, 8), 8);
    assert_eq!(align_up(65, 8), 72);
}
