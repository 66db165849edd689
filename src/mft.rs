// Sources:
// - https://dubeyko.com/development/FileSystems/NTFS/ntfsdoc.pdf
// - https://en.wikipedia.org/wiki/NTFS

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use chrono::{TimeZone, Utc};
use log::{debug, warn};
use prettytable::{Table, row};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{Cursor, Read, Seek, SeekFrom};
use thiserror::Error;

/// The ASCII magic opening every MFT **FILE** record.
pub const FILE_SIGNATURE: [u8; 4] = *b"FILE";

/// Fixed record header size; the first attribute normally starts right after.
pub const RECORD_HEADER_LEN: usize = 56;

/// All-ones attribute type code terminating the attribute list.
const END_OF_ATTRIBUTES: u32 = 0xFFFF_FFFF;

/// Smallest byte count that can hold the common attribute header.
const ATTR_HEADER_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum MftError {
    #[error("record signature is not 'FILE' (found {found:02X?})")]
    BadSignature { found: [u8; 4] },
    #[error("record is {len} bytes, shorter than the 56-byte header")]
    TruncatedHeader { len: usize },
    #[error("record header decode failed: {0}")]
    HeaderRead(#[from] std::io::Error),
}

/// Header found at the very beginning of every **FILE** record (offset 0).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRecordHeader {
    pub signature: [u8; 4],
    pub usa_offset: u16,
    pub usa_size: u16,
    pub lsn: u64,
    pub sequence_number: u16,
    pub hard_link_count: u16,
    pub attrs_offset: u16,
    pub flags: u16,
    pub logical_size: u32,
    pub allocated_size: u32,
    pub base_record: u64,
    pub next_attr_id: u16,
    pub entry_number: u32,
}

impl FileRecordHeader {
    /// Pure fixed-offset decode of the record header.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, MftError> {
        if raw.len() < RECORD_HEADER_LEN {
            return Err(MftError::TruncatedHeader { len: raw.len() });
        }
        let mut cursor = Cursor::new(raw);
        let mut signature = [0u8; 4];
        cursor.read_exact(&mut signature)?;
        if signature != FILE_SIGNATURE {
            return Err(MftError::BadSignature { found: signature });
        }
        let usa_offset = cursor.read_u16::<LittleEndian>()?;
        let usa_size = cursor.read_u16::<LittleEndian>()?;
        let lsn = cursor.read_u64::<LittleEndian>()?;
        let sequence_number = cursor.read_u16::<LittleEndian>()?;
        let hard_link_count = cursor.read_u16::<LittleEndian>()?;
        let attrs_offset = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let logical_size = cursor.read_u32::<LittleEndian>()?;
        let allocated_size = cursor.read_u32::<LittleEndian>()?;
        let base_record = cursor.read_u64::<LittleEndian>()?;
        let next_attr_id = cursor.read_u16::<LittleEndian>()?;
        cursor.seek(SeekFrom::Current(2))?;
        let entry_number = cursor.read_u32::<LittleEndian>()?;
        Ok(FileRecordHeader {
            signature,
            usa_offset,
            usa_size,
            lsn,
            sequence_number,
            hard_link_count,
            attrs_offset,
            flags,
            logical_size,
            allocated_size,
            base_record,
            next_attr_id,
            entry_number,
        })
    }
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum AttributeType {
    StandardInformation = 0x10,
    AttributeList = 0x20,
    FileName = 0x30,
    ObjectId = 0x40,
    SecurityDescriptor = 0x50,
    VolumeName = 0x60,
    VolumeInformation = 0x70,
    Data = 0x80,
    IndexRoot = 0x90,
    IndexAllocation = 0xA0,
    Bitmap = 0xB0,
    ReparsePoint = 0xC0,
    EaInformation = 0xD0,
    Ea = 0xE0,
    PropertySet = 0xF0,
    LoggedUtilityStream = 0x100,
}

impl AttributeType {
    pub fn from_code(value: u32) -> Option<Self> {
        use AttributeType::*;
        Some(match value {
            0x10 => StandardInformation,
            0x20 => AttributeList,
            0x30 => FileName,
            0x40 => ObjectId,
            0x50 => SecurityDescriptor,
            0x60 => VolumeName,
            0x70 => VolumeInformation,
            0x80 => Data,
            0x90 => IndexRoot,
            0xA0 => IndexAllocation,
            0xB0 => Bitmap,
            0xC0 => ReparsePoint,
            0xD0 => EaInformation,
            0xE0 => Ea,
            0xF0 => PropertySet,
            0x100 => LoggedUtilityStream,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        use AttributeType::*;
        match self {
            StandardInformation => "$STANDARD_INFORMATION",
            AttributeList => "$ATTRIBUTE_LIST",
            FileName => "$FILE_NAME",
            ObjectId => "$OBJECT_ID",
            SecurityDescriptor => "$SECURITY_DESCRIPTOR",
            VolumeName => "$VOLUME_NAME",
            VolumeInformation => "$VOLUME_INFORMATION",
            Data => "$DATA",
            IndexRoot => "$INDEX_ROOT",
            IndexAllocation => "$INDEX_ALLOCATION",
            Bitmap => "$BITMAP",
            ReparsePoint => "$REPARSE_POINT",
            EaInformation => "$EA_INFORMATION",
            Ea => "$EA",
            PropertySet => "$PROPERTY_SET",
            LoggedUtilityStream => "$LOGGED_UTILITY_STREAM",
        }
    }
}

/// Common header part shared by resident and non-resident attributes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttributeHeaderCommon {
    pub attr_type: AttributeType,
    pub length: u32,
    pub non_resident: bool,
    pub name_length: u8,
    pub name_offset: u16,
    pub flags: u16,
    pub id: u16,
    pub name: Option<String>,
}

/// Additional header present only when the attribute value is stored in place.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResidentHeader {
    pub value_length: u32,
    pub value_offset: u16,
    pub resident_flags: u8,
}

/// Additional header present only when the attribute value lives in clusters.
///
/// The sizes at +40/+48/+56 are reported as real / allocated / initialized,
/// matching the record layout this tool targets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NonResidentHeader {
    pub start_vcn: u64,
    pub end_vcn: u64,
    pub run_list_offset: u16,
    pub real_size: u64,
    pub allocated_size: u64,
    pub initialized_size: u64,
}

/// One extent of a non-resident attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataRun {
    pub start_cluster: i64,
    pub length_clusters: u64,
    pub sparse: bool,
}

/// A single walked attribute. Types without a dedicated decoder keep their
/// payload as raw bytes so a decoder can be added without touching the walker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub enum Attribute {
    Resident {
        header: AttributeHeaderCommon,
        resident: ResidentHeader,
        value: Vec<u8>,
    },
    NonResident {
        header: AttributeHeaderCommon,
        non_resident: NonResidentHeader,
        runs: Vec<DataRun>,
    },
    Unrecognized {
        type_code: u32,
        length: u32,
        raw: Vec<u8>,
    },
}

impl Attribute {
    pub fn attr_type(&self) -> Option<AttributeType> {
        match self {
            Attribute::Resident { header, .. } | Attribute::NonResident { header, .. } => {
                Some(header.attr_type)
            }
            Attribute::Unrecognized { .. } => None,
        }
    }
}

/// One carved MFT entry: the raw slice (exactly `logical_size` bytes) plus
/// its decoded header. Attribute values are recomputed on demand by
/// re-walking the slice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MftRecord {
    pub header: FileRecordHeader,
    pub raw: Vec<u8>,
}

impl MftRecord {
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, MftError> {
        let header = FileRecordHeader::from_bytes(&raw)?;
        Ok(MftRecord { header, raw })
    }

    /// Walk the attribute list. Corruption inside this record stops its own
    /// walk only; everything decoded so far is returned.
    pub fn attributes(&self) -> Vec<Attribute> {
        let mut attrs = Vec::new();
        let end = (self.header.logical_size as usize).min(self.raw.len());
        let mut cursor = self.header.attrs_offset as usize;

        while cursor + 4 <= end {
            let type_code = LittleEndian::read_u32(&self.raw[cursor..cursor + 4]);
            if type_code == END_OF_ATTRIBUTES {
                break;
            }
            if cursor + 8 > end {
                break;
            }
            let length = LittleEndian::read_u32(&self.raw[cursor + 4..cursor + 8]) as usize;
            if length == 0 || cursor + length > end {
                warn!(
                    "entry {}: attribute at offset {} has length {} - stopping walk",
                    self.header.entry_number, cursor, length
                );
                break;
            }
            let slice = &self.raw[cursor..cursor + length];
            match AttributeType::from_code(type_code) {
                Some(attr_type) if length >= ATTR_HEADER_LEN => {
                    attrs.push(parse_attribute(slice, attr_type, self.header.entry_number));
                }
                Some(attr_type) => {
                    warn!(
                        "entry {}: {} attribute shorter than its own header - stopping walk",
                        self.header.entry_number,
                        attr_type.name()
                    );
                    break;
                }
                None => {
                    debug!(
                        "entry {}: skipping unknown attribute type 0x{:X}",
                        self.header.entry_number, type_code
                    );
                    attrs.push(Attribute::Unrecognized {
                        type_code,
                        length: length as u32,
                        raw: slice.to_vec(),
                    });
                }
            }
            cursor += length;
        }
        attrs
    }

    /// Every $FILE_NAME attribute found (there may be 2 - long & DOS).
    pub fn file_names(&self) -> Vec<FileNameAttr> {
        self.attributes()
            .iter()
            .filter_map(|a| {
                if let Attribute::Resident { value, header, .. } = a {
                    (header.attr_type == AttributeType::FileName)
                        .then(|| FileNameAttr::parse(value))
                } else {
                    None
                }
            })
            .flatten()
            .collect()
    }

    /// First (usually long) name, if present.
    pub fn primary_name(&self) -> Option<String> {
        self.file_names().into_iter().next().map(|f| f.name)
    }

    pub fn standard_information(&self) -> Option<StandardInformation> {
        self.attributes().iter().find_map(|a| {
            if let Attribute::Resident { value, header, .. } = a {
                (header.attr_type == AttributeType::StandardInformation)
                    .then(|| StandardInformation::from_bytes(value))
                    .flatten()
            } else {
                None
            }
        })
    }

    /// The unnamed $DATA attribute if there is one, otherwise the first
    /// named stream.
    pub fn data_attribute(&self) -> Option<Attribute> {
        let attrs = self.attributes();
        let is_data = |a: &&Attribute| a.attr_type() == Some(AttributeType::Data);
        attrs
            .iter()
            .filter(is_data)
            .find(|a| match a {
                Attribute::Resident { header, .. } | Attribute::NonResident { header, .. } => {
                    header.name_length == 0
                }
                Attribute::Unrecognized { .. } => false,
            })
            .or_else(|| attrs.iter().find(is_data))
            .cloned()
    }

    /// Render the record as Title / Raw Data / Value field tables, one table
    /// for the header and one per attribute.
    pub fn to_string(&self) -> String {
        let mut out = String::new();

        let mut hdr = Table::new();
        hdr.add_row(row!["Title", "Raw Data", "Value"]);
        hdr.add_row(row![b -> "Signature", hex_join(&self.raw[0..4]),
            String::from_utf8_lossy(&self.header.signature).to_string()]);
        hdr.add_row(row![b -> "Update Sequence Offset", hex_join(&self.raw[4..6]), self.header.usa_offset]);
        hdr.add_row(row![b -> "Update Sequence Size", hex_join(&self.raw[6..8]), self.header.usa_size]);
        hdr.add_row(row![b -> "Logfile Sequence Number", hex_join(&self.raw[8..16]), self.header.lsn]);
        hdr.add_row(row![b -> "Use/Deletion Count", hex_join(&self.raw[16..18]), self.header.sequence_number]);
        hdr.add_row(row![b -> "Hard-link Count", hex_join(&self.raw[18..20]), self.header.hard_link_count]);
        hdr.add_row(row![b -> "Offset to First Attribute", hex_join(&self.raw[20..22]), self.header.attrs_offset]);
        hdr.add_row(row![b -> "Flags", hex_join(&self.raw[22..24]), record_flags_to_string(self.header.flags)]);
        hdr.add_row(row![b -> "Logical Size of Record", hex_join(&self.raw[24..28]), self.header.logical_size]);
        hdr.add_row(row![b -> "Physical Size of Record", hex_join(&self.raw[28..32]), self.header.allocated_size]);
        hdr.add_row(row![b -> "Base Record", hex_join(&self.raw[32..40]), self.header.base_record]);
        hdr.add_row(row![b -> "MFT Entry Number", hex_join(&self.raw[44..48]), self.header.entry_number]);
        out.push_str(&hdr.to_string());

        for attr in self.attributes() {
            out.push('\n');
            out.push_str(&attribute_to_string(&attr));
        }
        out
    }

    /// Serialize to JSON (uses `serde`).
    pub fn to_json(&self) -> Value {
        json!({
            "header": &self.header,
            "attributes": &self.attributes(),
            "file_names": self.file_names(),
            "standard_information": self.standard_information(),
        })
    }
}

/// Decode one attribute slice. The slice spans exactly the attribute's
/// declared length and holds at least the common header. Field-level bounds
/// problems degrade to empty values; they never abort the caller's walk.
fn parse_attribute(raw: &[u8], attr_type: AttributeType, entry: u32) -> Attribute {
    let length = LittleEndian::read_u32(&raw[4..8]);
    let non_resident = raw[8] != 0;
    let name_length = raw[9];
    let name_offset = LittleEndian::read_u16(&raw[10..12]);
    let flags = LittleEndian::read_u16(&raw[12..14]);
    let id = LittleEndian::read_u16(&raw[14..16]);

    let name = if name_length > 0 {
        let start = name_offset as usize;
        let end = start + name_length as usize * 2;
        raw.get(start..end).and_then(utf16le_to_string)
    } else {
        None
    };

    let header = AttributeHeaderCommon {
        attr_type,
        length,
        non_resident,
        name_length,
        name_offset,
        flags,
        id,
        name,
    };

    if !non_resident {
        if raw.len() < 24 {
            return Attribute::Resident {
                header,
                resident: ResidentHeader {
                    value_length: 0,
                    value_offset: 0,
                    resident_flags: 0,
                },
                value: Vec::new(),
            };
        }
        let value_length = LittleEndian::read_u32(&raw[16..20]);
        let value_offset = LittleEndian::read_u16(&raw[20..22]);
        let resident_flags = raw[22];
        let start = value_offset as usize;
        let end = start + value_length as usize;
        let value = match raw.get(start..end) {
            Some(v) => v.to_vec(),
            None => {
                warn!(
                    "entry {}: resident {} value ({} bytes at +{}) exceeds the attribute bounds",
                    entry,
                    attr_type.name(),
                    value_length,
                    value_offset
                );
                Vec::new()
            }
        };
        Attribute::Resident {
            header,
            resident: ResidentHeader {
                value_length,
                value_offset,
                resident_flags,
            },
            value,
        }
    } else {
        if raw.len() < 64 {
            return Attribute::NonResident {
                header,
                non_resident: NonResidentHeader {
                    start_vcn: 0,
                    end_vcn: 0,
                    run_list_offset: 0,
                    real_size: 0,
                    allocated_size: 0,
                    initialized_size: 0,
                },
                runs: Vec::new(),
            };
        }
        let start_vcn = LittleEndian::read_u64(&raw[16..24]);
        let end_vcn = LittleEndian::read_u64(&raw[24..32]);
        let run_list_offset = LittleEndian::read_u16(&raw[32..34]);
        let real_size = LittleEndian::read_u64(&raw[40..48]);
        let allocated_size = LittleEndian::read_u64(&raw[48..56]);
        let initialized_size = LittleEndian::read_u64(&raw[56..64]);
        let runs = raw
            .get(run_list_offset as usize..)
            .map(decode_run_list)
            .unwrap_or_default();
        Attribute::NonResident {
            header,
            non_resident: NonResidentHeader {
                start_vcn,
                end_vcn,
                run_list_offset,
                real_size,
                allocated_size,
                initialized_size,
            },
            runs,
        }
    }
}

/// Decode a data-run list into ordered extents.
///
/// Each entry opens with a header byte: low nibble = byte width of the run
/// length, high nibble = byte width of the signed cluster offset, which is
/// relative to the previous run's absolute start (the first run is relative
/// to cluster 0). A zero offset width marks a sparse run. Decoding stops at
/// the 0x00 terminator or as soon as an entry would run past the slice; the
/// partial list is returned.
pub fn decode_run_list(raw: &[u8]) -> Vec<DataRun> {
    let mut out = Vec::new();
    let mut pos = 0usize;
    let mut cur_lcn: i64 = 0;
    while pos < raw.len() && raw[pos] != 0 {
        let hdr = raw[pos];
        pos += 1;
        let len_sz = (hdr & 0x0F) as usize;
        let ofs_sz = (hdr >> 4) as usize;
        if len_sz == 0 || pos + len_sz + ofs_sz > raw.len() {
            warn!("run list truncated at byte {}", pos - 1);
            break;
        }

        let mut run_len = 0u64;
        for i in 0..len_sz {
            run_len |= (raw[pos + i] as u64) << (8 * i);
        }
        pos += len_sz;

        let mut ofs = 0i64;
        for i in 0..ofs_sz {
            ofs |= (raw[pos + i] as i64) << (8 * i);
        }
        // sign-extend negative offsets
        if ofs_sz > 0 && ofs_sz < 8 && (raw[pos + ofs_sz - 1] & 0x80) != 0 {
            ofs |= !0 << (ofs_sz * 8);
        }
        pos += ofs_sz;

        cur_lcn += ofs;
        out.push(DataRun {
            start_cluster: cur_lcn,
            length_clusters: run_len,
            sparse: ofs_sz == 0,
        });
    }
    out
}

/// Parsed $STANDARD_INFORMATION (covers v0 & v1, optionally v2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardInformation {
    pub created: String,
    pub modified: String,
    pub mft_modified: String,
    pub accessed: String,
    pub file_attrs: u32,
    pub max_versions: u32,
    pub version_number: u32,
    pub class_id: u32,
    pub owner_id: Option<u32>,
    pub security_id: Option<u32>,
    pub quota_charged: Option<u64>,
    pub usn: Option<u64>,
}

impl StandardInformation {
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() < 0x30 {
            return None;
        }
        let mut cur = Cursor::new(raw);
        let created = filetime_to_datetime(cur.read_u64::<LittleEndian>().ok()?);
        let modified = filetime_to_datetime(cur.read_u64::<LittleEndian>().ok()?);
        let mft_modified = filetime_to_datetime(cur.read_u64::<LittleEndian>().ok()?);
        let accessed = filetime_to_datetime(cur.read_u64::<LittleEndian>().ok()?);
        let file_attrs = cur.read_u32::<LittleEndian>().ok()?;
        let max_versions = cur.read_u32::<LittleEndian>().ok()?;
        let version_number = cur.read_u32::<LittleEndian>().ok()?;
        let class_id = cur.read_u32::<LittleEndian>().ok()?;
        let owner_id = if raw.len() >= 0x34 {
            Some(cur.read_u32::<LittleEndian>().ok()?)
        } else {
            None
        };
        let security_id = if raw.len() >= 0x38 {
            Some(cur.read_u32::<LittleEndian>().ok()?)
        } else {
            None
        };
        let quota_charged = if raw.len() >= 0x40 {
            Some(cur.read_u64::<LittleEndian>().ok()?)
        } else {
            None
        };
        let usn = if raw.len() >= 0x48 {
            Some(cur.read_u64::<LittleEndian>().ok()?)
        } else {
            None
        };
        Some(Self {
            created,
            modified,
            mft_modified,
            accessed,
            file_attrs,
            max_versions,
            version_number,
            class_id,
            owner_id,
            security_id,
            quota_charged,
            usn,
        })
    }
}

/// Parsed $FILE_NAME attribute (first 66 bytes plus the name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNameAttr {
    pub parent_ref: u64,
    pub parent_seq: u16,
    pub created: String,
    pub modified: String,
    pub mft_modified: String,
    pub accessed: String,
    pub real_size: u64,
    pub allocated_size: u64,
    pub flags: u32,
    pub name: String,
}

impl FileNameAttr {
    /// NTFS file references pack a 48-bit entry number and a 16-bit sequence
    /// number into 8 bytes; both halves are kept.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < 66 {
            return None;
        }
        let mut cur = Cursor::new(raw);
        let parent_raw = cur.read_u64::<LittleEndian>().ok()?;
        let parent_ref = parent_raw & 0x0000_FFFF_FFFF_FFFF;
        let parent_seq = (parent_raw >> 48) as u16;
        let created = filetime_to_datetime(cur.read_u64::<LittleEndian>().ok()?);
        let modified = filetime_to_datetime(cur.read_u64::<LittleEndian>().ok()?);
        let mft_modified = filetime_to_datetime(cur.read_u64::<LittleEndian>().ok()?);
        let accessed = filetime_to_datetime(cur.read_u64::<LittleEndian>().ok()?);
        let real_size = cur.read_u64::<LittleEndian>().ok()?;
        let allocated_size = cur.read_u64::<LittleEndian>().ok()?;
        let flags = cur.read_u32::<LittleEndian>().ok()?;
        cur.read_u32::<LittleEndian>().ok()?; // reparse value
        let name_len = cur.read_u8().ok()? as usize;
        cur.read_u8().ok()?; // namespace
        let name_off = 66;
        if raw.len() < name_off + name_len * 2 {
            return None;
        }
        let name = utf16le_to_string(&raw[name_off..name_off + name_len * 2])?;
        Some(Self {
            parent_ref,
            parent_seq,
            created,
            modified,
            mft_modified,
            accessed,
            real_size,
            allocated_size,
            flags,
            name,
        })
    }
}

fn attribute_to_string(attr: &Attribute) -> String {
    let mut t = Table::new();
    match attr {
        Attribute::Resident {
            header,
            resident,
            value,
        } => {
            t.add_row(row![format!("Attribute: {}", header.attr_type.name()), "", ""]);
            common_header_rows(&mut t, header);
            t.add_row(row![b -> "Content Length", "", resident.value_length]);
            t.add_row(row![b -> "Content Offset", "", resident.value_offset]);
            match header.attr_type {
                AttributeType::StandardInformation => {
                    if let Some(si) = StandardInformation::from_bytes(value) {
                        t.add_row(row![b -> "File Creation", hex_join(&value[0..8]), si.created]);
                        t.add_row(row![b -> "File Modification", hex_join(&value[8..16]), si.modified]);
                        t.add_row(row![b -> "MFT Modification", hex_join(&value[16..24]), si.mft_modified]);
                        t.add_row(row![b -> "File Accessed", hex_join(&value[24..32]), si.accessed]);
                        t.add_row(row![b -> "Attribute Flags", hex_join(&value[32..36]),
                            file_attribute_flags_to_string(si.file_attrs)]);
                        if let Some(sid) = si.security_id {
                            t.add_row(row![b -> "Security Identifier", "", sid]);
                        }
                        if let Some(usn) = si.usn {
                            t.add_row(row![b -> "Update Sequence Number", "", usn]);
                        }
                    }
                }
                AttributeType::FileName => {
                    if let Some(fname) = FileNameAttr::parse(value) {
                        t.add_row(row![b -> "Parent MFT Reference", hex_join(&value[0..8]),
                            format!("{} (seq {})", fname.parent_ref, fname.parent_seq)]);
                        t.add_row(row![b -> "File Creation", hex_join(&value[8..16]), fname.created]);
                        t.add_row(row![b -> "File Modification", hex_join(&value[16..24]), fname.modified]);
                        t.add_row(row![b -> "MFT Modification", hex_join(&value[24..32]), fname.mft_modified]);
                        t.add_row(row![b -> "File Accessed", hex_join(&value[32..40]), fname.accessed]);
                        t.add_row(row![b -> "Logical File Size", hex_join(&value[40..48]), fname.real_size]);
                        t.add_row(row![b -> "Physical File Size", hex_join(&value[48..56]), fname.allocated_size]);
                        t.add_row(row![b -> "Attribute Flags", hex_join(&value[56..60]),
                            file_attribute_flags_to_string(fname.flags)]);
                        t.add_row(row![b -> "File Name", "", fname.name]);
                    }
                }
                AttributeType::Data => {
                    t.add_row(row![b -> "File Content", truncate(&hex_join(value), 48),
                        truncate(&String::from_utf8_lossy(value), 48)]);
                }
                _ => {
                    t.add_row(row![b -> "Payload", truncate(&hex_join(value), 48),
                        format!("{} bytes (undecoded)", value.len())]);
                }
            }
        }
        Attribute::NonResident {
            header,
            non_resident,
            runs,
        } => {
            t.add_row(row![format!("Attribute: {}", header.attr_type.name()), "", ""]);
            common_header_rows(&mut t, header);
            t.add_row(row![b -> "Starting Cluster Number", "", non_resident.start_vcn]);
            t.add_row(row![b -> "Ending Cluster Number", "", non_resident.end_vcn]);
            t.add_row(row![b -> "Datarun Offset", "", non_resident.run_list_offset]);
            t.add_row(row![b -> "Logical File Size", "", non_resident.real_size]);
            t.add_row(row![b -> "Physical File Size", "", non_resident.allocated_size]);
            t.add_row(row![b -> "Initialized Size", "", non_resident.initialized_size]);
            for (i, run) in runs.iter().enumerate() {
                let placement = if run.sparse {
                    "sparse".to_string()
                } else {
                    format!("start cluster {}", run.start_cluster)
                };
                t.add_row(row![format!("Run {}", i), "",
                    format!("{} clusters, {}", run.length_clusters, placement)]);
            }
        }
        Attribute::Unrecognized {
            type_code,
            length,
            raw,
        } => {
            t.add_row(row![format!("Attribute: unknown (0x{:X})", type_code), "", ""]);
            t.add_row(row![b -> "Attribute Size", "", length]);
            t.add_row(row![b -> "Payload", truncate(&hex_join(raw), 48),
                format!("{} bytes (undecoded)", raw.len())]);
        }
    }
    t.to_string()
}

fn common_header_rows(t: &mut Table, header: &AttributeHeaderCommon) {
    t.add_row(row![b -> "Attribute Size", "", header.length]);
    t.add_row(row![b -> "Attribute Residency",
        "", if header.non_resident { "Non-resident" } else { "Resident" }]);
    t.add_row(row![b -> "Name Size", "", header.name_length]);
    t.add_row(row![b -> "Attr. Data Flags", "", attr_data_flags_to_string(header.flags)]);
    t.add_row(row![b -> "Attr. ID", "", header.id]);
    if let Some(name) = &header.name {
        t.add_row(row![b -> "Attr. Name", "", name]);
    }
}

fn utf16le_to_string(raw: &[u8]) -> Option<String> {
    String::from_utf16(
        &raw.chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect::<Vec<_>>(),
    )
    .ok()
}

fn filetime_to_datetime(ft: u64) -> String {
    let micros_since_1601 = ft / 10;
    const DELTA_MICROS: i64 = 11_644_473_600_000_000;
    let unix_micros = micros_since_1601 as i64 - DELTA_MICROS;
    let secs = unix_micros.div_euclid(1_000_000);
    let nanos = unix_micros.rem_euclid(1_000_000) * 1_000;
    Utc.timestamp_opt(secs, nanos as u32)
        .single()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

/// Decode MFT record header flags.
pub fn record_flags_to_string(flags: u16) -> String {
    let mut v = Vec::new();
    if flags & 0x0001 != 0 {
        v.push("In use")
    }
    if flags & 0x0002 != 0 {
        v.push("Directory")
    }
    if flags & 0x0004 != 0 {
        v.push("Present in $Extend")
    }
    if flags & 0x0008 != 0 {
        v.push("Index file")
    }
    if v.is_empty() {
        "None".into()
    } else {
        v.join(" | ")
    }
}

/// Decode the FILE attribute bitmask found in $STANDARD_INFORMATION and
/// $FILE_NAME into the set of matching names.
pub fn file_attribute_flags_to_string(flags: u32) -> String {
    let mut v = Vec::new();
    if flags & 0x0001 != 0 {
        v.push("Read-only");
    }
    if flags & 0x0002 != 0 {
        v.push("Hidden");
    }
    if flags & 0x0004 != 0 {
        v.push("System");
    }
    if flags & 0x0020 != 0 {
        v.push("Archive");
    }
    if flags & 0x0040 != 0 {
        v.push("Device");
    }
    if flags & 0x0080 != 0 {
        v.push("Normal");
    }
    if flags & 0x0100 != 0 {
        v.push("Temporary");
    }
    if flags & 0x0200 != 0 {
        v.push("Sparse file");
    }
    if flags & 0x0400 != 0 {
        v.push("Reparse point");
    }
    if flags & 0x0800 != 0 {
        v.push("Compressed");
    }
    if flags & 0x1000 != 0 {
        v.push("Offline");
    }
    if flags & 0x2000 != 0 {
        v.push("Not content indexed");
    }
    if flags & 0x4000 != 0 {
        v.push("Encrypted");
    }
    if flags & 0x1000_0000 != 0 {
        v.push("Directory");
    }
    if flags & 0x2000_0000 != 0 {
        v.push("Index view");
    }
    if v.is_empty() {
        "None".to_string()
    } else {
        v.join(" | ")
    }
}

fn attr_data_flags_to_string(flags: u16) -> String {
    let mut v = Vec::new();
    if flags & 0x0001 != 0 {
        v.push("Compressed");
    }
    if flags & 0x4000 != 0 {
        v.push("Encrypted");
    }
    if flags & 0x8000 != 0 {
        v.push("Sparse");
    }
    if v.is_empty() {
        "-".to_string()
    } else {
        v.join(" | ")
    }
}

pub fn hex_join(raw: &[u8]) -> String {
    raw.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
