//! Synthetic record builders shared by the unit tests.

use byteorder::{ByteOrder, LittleEndian};

/// Pad an attribute to the 8-byte alignment real records use and stamp its
/// total length into the header.
fn seal_attr(mut attr: Vec<u8>) -> Vec<u8> {
    while attr.len() % 8 != 0 {
        attr.push(0);
    }
    let len = attr.len() as u32;
    LittleEndian::write_u32(&mut attr[4..8], len);
    attr
}

/// Common 24-byte resident attribute header followed by the value.
pub(crate) fn resident_attr(type_code: u32, value: &[u8]) -> Vec<u8> {
    let mut attr = vec![0u8; 24];
    LittleEndian::write_u32(&mut attr[0..4], type_code);
    // length written by seal_attr
    attr[8] = 0; // resident
    LittleEndian::write_u32(&mut attr[16..20], value.len() as u32);
    LittleEndian::write_u16(&mut attr[20..22], 24);
    attr.extend_from_slice(value);
    seal_attr(attr)
}

/// $FILE_NAME attribute. `parent` may carry a sequence number in its top
/// 16 bits.
pub(crate) fn file_name_attr(parent: u64, name: &str) -> Vec<u8> {
    let encoded: Vec<u8> = name
        .encode_utf16()
        .flat_map(|u| u.to_le_bytes())
        .collect();
    let mut value = vec![0u8; 66];
    LittleEndian::write_u64(&mut value[0..8], parent);
    LittleEndian::write_u64(&mut value[40..48], 4096); // logical size
    LittleEndian::write_u64(&mut value[48..56], 8192); // physical size
    value[64] = name.encode_utf16().count() as u8;
    value[65] = 1; // Win32 namespace
    value.extend_from_slice(&encoded);
    resident_attr(0x30, &value)
}

/// $STANDARD_INFORMATION attribute with all four timestamps set to
/// `filetime` and the given file-attribute flags.
pub(crate) fn standard_info_attr(filetime: u64, flags: u32) -> Vec<u8> {
    let mut value = vec![0u8; 0x30];
    for i in 0..4 {
        LittleEndian::write_u64(&mut value[i * 8..i * 8 + 8], filetime);
    }
    LittleEndian::write_u32(&mut value[32..36], flags);
    resident_attr(0x10, &value)
}

/// Unnamed resident $DATA attribute carrying `content`.
pub(crate) fn data_resident_attr(content: &[u8]) -> Vec<u8> {
    resident_attr(0x80, content)
}

/// Unnamed non-resident $DATA attribute with the given run list bytes.
pub(crate) fn data_non_resident_attr(run_list: &[u8], real_size: u64) -> Vec<u8> {
    let mut attr = vec![0u8; 64];
    LittleEndian::write_u32(&mut attr[0..4], 0x80);
    attr[8] = 1; // non-resident
    LittleEndian::write_u64(&mut attr[16..24], 0); // start VCN
    LittleEndian::write_u64(&mut attr[24..32], 3); // end VCN
    LittleEndian::write_u16(&mut attr[32..34], 64);
    LittleEndian::write_u64(&mut attr[40..48], real_size);
    LittleEndian::write_u64(&mut attr[48..56], real_size.next_multiple_of(4096));
    LittleEndian::write_u64(&mut attr[56..64], real_size);
    attr.extend_from_slice(run_list);
    seal_attr(attr)
}

/// An attribute with an arbitrary (possibly unknown) type code and opaque
/// payload bytes.
pub(crate) fn raw_attr(type_code: u32, payload: &[u8]) -> Vec<u8> {
    let mut attr = vec![0u8; 16];
    LittleEndian::write_u32(&mut attr[0..4], type_code);
    attr.extend_from_slice(payload);
    seal_attr(attr)
}

/// The all-ones end-of-attributes sentinel.
pub(crate) fn end_marker() -> Vec<u8> {
    vec![0xFF, 0xFF, 0xFF, 0xFF]
}

/// Assemble a full record: 56-byte header, the given attributes, the end
/// sentinel. The logical size is exact; the allocated size is the usual
/// 1 KiB unit.
pub(crate) fn record_bytes(entry: u32, attrs: &[Vec<u8>]) -> Vec<u8> {
    let mut raw = vec![0u8; 56];
    raw[0..4].copy_from_slice(b"FILE");
    LittleEndian::write_u16(&mut raw[4..6], 48);
    LittleEndian::write_u64(&mut raw[8..16], 0x10);
    LittleEndian::write_u16(&mut raw[16..18], 1); // sequence
    LittleEndian::write_u16(&mut raw[18..20], 1); // hard links
    LittleEndian::write_u16(&mut raw[20..22], 56);
    LittleEndian::write_u16(&mut raw[22..24], 0x0001); // in use
    LittleEndian::write_u32(&mut raw[44..48], entry);
    for attr in attrs {
        raw.extend_from_slice(attr);
    }
    if !attrs.last().is_some_and(|a| a[0..4] == [0xFF; 4]) {
        raw.extend_from_slice(&end_marker());
    }
    let logical = raw.len() as u32;
    LittleEndian::write_u32(&mut raw[24..28], logical);
    LittleEndian::write_u32(&mut raw[28..32], logical.max(1024));
    raw
}
