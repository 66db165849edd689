// Sources:
// - https://dubeyko.com/development/FileSystems/NTFS/ntfsdoc.pdf
// - https://en.wikipedia.org/wiki/NTFS

use log::{debug, info, warn};
use thiserror::Error;

use byteorder::{ByteOrder, LittleEndian};
use mft::{FILE_SIGNATURE, MftError, MftRecord};
use tree::FilesystemTree;

pub mod mft;
pub mod shell;
pub mod tree;

#[cfg(test)]
pub(crate) mod testutil;

/// Why the carve pass stopped before the end of the image. Records carved
/// up to that point are always kept (partial-result policy).
#[derive(Debug, Error)]
pub enum CarveStop {
    #[error("logical-size field of the record at offset {offset} lies outside the image")]
    SizeFieldOutOfBounds { offset: usize },
    #[error("record at offset {offset} declares a non-positive logical size ({size})")]
    NonPositiveSize { offset: usize, size: i32 },
    #[error("record at offset {offset} ({size} bytes) extends past the end of the image")]
    RecordOutOfBounds { offset: usize, size: u32 },
    #[error("record at offset {offset} could not be decoded: {source}")]
    RecordDecode { offset: usize, source: MftError },
}

/// Everything carved from one $MFT image: the record list and the
/// reconstructed directory tree. Built once, read-only afterwards.
#[derive(Debug)]
pub struct MftImage {
    pub records: Vec<MftRecord>,
    pub tree: FilesystemTree,
    pub stopped: Option<CarveStop>,
}

impl MftImage {
    /// Carve every FILE record out of `raw` and fold their $FILE_NAME
    /// attributes into the filesystem tree. Serving queries before this
    /// returns is impossible by construction.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let (records, stopped) = carve_records(raw);
        if let Some(stop) = &stopped {
            warn!("carving stopped early: {}", stop);
        }
        info!("carved {} MFT record(s)", records.len());
        let tree = FilesystemTree::build(&records);
        MftImage {
            records,
            tree,
            stopped,
        }
    }

    /// Record whose header entry number equals `entry`. Linear scan; the
    /// table sizes this tool meets do not justify an index.
    pub fn record_by_entry(&self, entry: u64) -> Option<&MftRecord> {
        self.records
            .iter()
            .find(|r| u64::from(r.header.entry_number) == entry)
    }
}

/// Scan `raw` for FILE signatures and slice out one record per hit, exactly
/// `logical_size` bytes each (deliberately supporting unaligned dumps).
/// Returns the ordered record list plus the reason carving stopped early,
/// if it did.
pub fn carve_records(raw: &[u8]) -> (Vec<MftRecord>, Option<CarveStop>) {
    let mut records = Vec::new();
    let mut cursor = 0usize;

    while let Some(offset) = find_signature(raw, cursor) {
        if offset + 28 > raw.len() {
            return (records, Some(CarveStop::SizeFieldOutOfBounds { offset }));
        }
        let size = LittleEndian::read_i32(&raw[offset + 24..offset + 28]);
        if size <= 0 {
            return (records, Some(CarveStop::NonPositiveSize { offset, size }));
        }
        let size = size as usize;
        if offset + size > raw.len() {
            return (
                records,
                Some(CarveStop::RecordOutOfBounds {
                    offset,
                    size: size as u32,
                }),
            );
        }
        match MftRecord::from_bytes(raw[offset..offset + size].to_vec()) {
            Ok(record) => {
                debug!(
                    "carved entry {} at offset {} ({} bytes)",
                    record.header.entry_number, offset, size
                );
                records.push(record);
            }
            Err(source) => {
                return (records, Some(CarveStop::RecordDecode { offset, source }));
            }
        }
        cursor = offset + size;
    }

    if records.is_empty() {
        info!("no MFT entries found in the image");
    }
    (records, None)
}

/// Naive forward search for the record signature; signatures are sparse
/// enough that nothing cleverer pays off.
fn find_signature(raw: &[u8], from: usize) -> Option<usize> {
    if from >= raw.len() {
        return None;
    }
    raw[from..]
        .windows(FILE_SIGNATURE.len())
        .position(|window| window == FILE_SIGNATURE)
        .map(|pos| from + pos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{file_name_attr, record_bytes};

    #[test]
    fn carves_back_to_back_records_byte_identically() {
        let rec_a = record_bytes(10, &[file_name_attr(5, "a.txt")]);
        let rec_b = record_bytes(11, &[file_name_attr(5, "b.txt")]);
        let mut image = rec_a.clone();
        image.extend_from_slice(&rec_b);

        let (records, stopped) = carve_records(&image);
        assert!(stopped.is_none());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].raw, rec_a);
        assert_eq!(records[1].raw, rec_b);
        assert_eq!(records[0].raw.len(), records[0].header.logical_size as usize);
        assert_eq!(records[0].header.entry_number, 10);
        assert_eq!(records[1].header.entry_number, 11);
    }

    #[test]
    fn carves_records_preceded_by_garbage() {
        let mut image = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00];
        image.extend_from_slice(&record_bytes(7, &[file_name_attr(5, "x.bin")]));
        let (records, stopped) = carve_records(&image);
        assert!(stopped.is_none());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].header.entry_number, 7);
    }

    #[test]
    fn truncated_final_record_keeps_earlier_records_and_signals() {
        let rec_a = record_bytes(10, &[file_name_attr(5, "a.txt")]);
        let mut rec_b = record_bytes(11, &[file_name_attr(5, "b.txt")]);
        // Size field promises more bytes than the image holds.
        LittleEndian::write_u32(&mut rec_b[24..28], 4096);
        let mut image = rec_a.clone();
        image.extend_from_slice(&rec_b);

        let (records, stopped) = carve_records(&image);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw, rec_a);
        assert!(matches!(stopped, Some(CarveStop::RecordOutOfBounds { .. })));
    }

    #[test]
    fn non_positive_logical_size_stops_carving() {
        let mut rec = record_bytes(10, &[file_name_attr(5, "a.txt")]);
        LittleEndian::write_i32(&mut rec[24..28], -5);
        let (records, stopped) = carve_records(&rec);
        assert!(records.is_empty());
        assert!(matches!(
            stopped,
            Some(CarveStop::NonPositiveSize { size: -5, .. })
        ));
    }

    #[test]
    fn size_field_outside_image_stops_carving() {
        // Signature at the very end with no room for the size field.
        let mut image = record_bytes(10, &[file_name_attr(5, "a.txt")]);
        image.extend_from_slice(b"FILE");
        let (records, stopped) = carve_records(&image);
        assert_eq!(records.len(), 1);
        assert!(matches!(
            stopped,
            Some(CarveStop::SizeFieldOutOfBounds { .. })
        ));
    }

    #[test]
    fn empty_image_carves_nothing() {
        let (records, stopped) = carve_records(&[0u8; 64]);
        assert!(records.is_empty());
        assert!(stopped.is_none());
    }

    #[test]
    fn image_builds_tree_and_looks_up_by_entry() {
        let mut image = record_bytes(10, &[file_name_attr(5, "readme.md")]);
        image.extend_from_slice(&record_bytes(11, &[file_name_attr(5, "notes.txt")]));
        let parsed = MftImage::from_bytes(&image);
        assert_eq!(parsed.records.len(), 2);
        assert!(parsed.record_by_entry(11).is_some());
        assert!(parsed.record_by_entry(99).is_none());
        let children = parsed.tree.children(5).unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].0, "readme.md");
    }

    #[test]
    fn same_parent_collects_both_children_in_discovery_order() {
        let mut image = record_bytes(20, &[file_name_attr(5, "first")]);
        image.extend_from_slice(&record_bytes(21, &[file_name_attr(5, "second")]));
        let parsed = MftImage::from_bytes(&image);
        let children = parsed.tree.children(5).unwrap();
        assert_eq!(
            children,
            &[("first".to_string(), 20), ("second".to_string(), 21)]
        );
    }
}
