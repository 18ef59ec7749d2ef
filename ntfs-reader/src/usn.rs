//! §4.12 USN change journal (L12): windowed reader over
//! `\$Extend\$UsnJrnl:$J`. Grounded on `examples/original_source`'s USN
//! record parsing for field layout (the teacher never touched the USN
//! journal); the 0x1000-block buffering and `RecordLength`-zero-skip
//! framing follow spec.md §4.12 directly.

use byteorder::{ByteOrder, LittleEndian};
use ntfs_core::{Error, FileReference};

use crate::cluster_stream::Stream;
use crate::timestamps::filetime_to_datetime;

const JOURNAL_BLOCK_SIZE: usize = 0x1000;

#[derive(Debug, Clone)]
pub struct UsnRecord {
    pub file_reference: FileReference,
    pub parent_file_reference: FileReference,
    pub usn: u64,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub reason: u32,
    pub source_info: u32,
    pub security_id: u32,
    pub file_attributes: u32,
    pub file_name: String,
}

/// Parses one USN_RECORD_V2 starting at `data[0]`; `data` must contain at
/// least `RecordLength` bytes.
fn parse_usn_record_v2(data: &[u8]) -> Result<UsnRecord, Error> {
    if data.len() < 60 {
        return Err(Error::InvalidData("USN record shorter than USN_RECORD_V2 header".into()));
    }
    let major_version = LittleEndian::read_u16(&data[4..6]);
    if major_version != 2 {
        return Err(Error::UnsupportedValue(format!(
            "USN record major version {major_version} is not supported (only V2)"
        )));
    }

    let file_reference = FileReference(LittleEndian::read_u64(&data[8..16]));
    let parent_file_reference = FileReference(LittleEndian::read_u64(&data[16..24]));
    let usn = LittleEndian::read_u64(&data[24..32]);
    let timestamp = filetime_to_datetime(LittleEndian::read_u64(&data[32..40]));
    let reason = LittleEndian::read_u32(&data[40..44]);
    let source_info = LittleEndian::read_u32(&data[44..48]);
    let security_id = LittleEndian::read_u32(&data[48..52]);
    let file_attributes = LittleEndian::read_u32(&data[52..56]);
    let file_name_length = LittleEndian::read_u16(&data[56..58]) as usize;
    let file_name_offset = LittleEndian::read_u16(&data[58..60]) as usize;

    let name_start = file_name_offset;
    let name_end = name_start + file_name_length;
    if name_end > data.len() {
        return Err(Error::InvalidData("USN record file name extends beyond record".into()));
    }
    let file_name = crate::strings::read_utf16le(&data[name_start..name_end])?;

    Ok(UsnRecord {
        file_reference,
        parent_file_reference,
        usn,
        timestamp,
        reason,
        source_info,
        security_id,
        file_attributes,
        file_name,
    })
}

/// Iterates `$UsnJrnl:$J`, buffering one journal block at a time and
/// skipping the sparse run at the front of the stream (the journal is
/// pre-allocated sparse; the first non-zero `RecordLength` is the first
/// live record).
pub struct UsnJournal<'a> {
    stream: Stream<'a>,
    block: Vec<u8>,
    block_start: u64,
    offset_in_block: usize,
    valid_in_block: usize,
}

impl<'a> UsnJournal<'a> {
    pub fn new(stream: Stream<'a>) -> Self {
        Self {
            stream,
            block: Vec::new(),
            block_start: 0,
            offset_in_block: 0,
            valid_in_block: 0,
        }
    }

    pub fn offset(&self) -> u64 {
        self.block_start + self.offset_in_block as u64
    }

    fn refill(&mut self) -> Result<bool, Error> {
        if self.block.is_empty() {
            self.block = vec![0u8; JOURNAL_BLOCK_SIZE];
        } else {
            self.block_start += JOURNAL_BLOCK_SIZE as u64;
        }
        self.offset_in_block = 0;

        if self.block_start >= self.stream.len() {
            self.valid_in_block = 0;
            return Ok(false);
        }

        self.stream.seek(self.block_start);
        self.valid_in_block = self.stream.read(&mut self.block)?;
        Ok(self.valid_in_block > 0)
    }

    /// Returns the next record, or `None` once `logical_size` is reached.
    pub fn next_record(&mut self) -> Result<Option<UsnRecord>, Error> {
        loop {
            if self.block.is_empty() && !self.refill()? {
                return Ok(None);
            }

            if self.offset_in_block + 4 > self.valid_in_block {
                if !self.refill()? {
                    return Ok(None);
                }
                continue;
            }

            let record_length =
                LittleEndian::read_u32(&self.block[self.offset_in_block..self.offset_in_block + 4]) as usize;

            if record_length == 0 {
                if !self.refill()? {
                    return Ok(None);
                }
                continue;
            }

            if self.offset_in_block + record_length > self.valid_in_block {
                return Err(Error::InvalidData(format!(
                    "USN record at offset {} (length {record_length}) extends beyond journal block",
                    self.offset()
                )));
            }

            let record_bytes = &self.block[self.offset_in_block..self.offset_in_block + record_length];
            let record = parse_usn_record_v2(record_bytes)?;
            self.offset_in_block += record_length;
            return Ok(Some(record));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{Attribute, AttributeBody, AttributeHeader};
    use ntfs_core::{LogSink, MemorySource};

    fn build_record(usn: u64, name: &str) -> Vec<u8> {
        let name_utf16: Vec<u8> = name.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
        let header_len = 60usize;
        let total = header_len + name_utf16.len();
        let mut data = vec![0u8; total];
        LittleEndian::write_u32(&mut data[0..4], total as u32);
        LittleEndian::write_u16(&mut data[4..6], 2); // major version
        LittleEndian::write_u64(&mut data[8..16], FileReference::new(5, 1).0);
        LittleEndian::write_u64(&mut data[16..24], FileReference::new(2, 1).0);
        LittleEndian::write_u64(&mut data[24..32], usn);
        LittleEndian::write_u16(&mut data[56..58], name_utf16.len() as u16);
        LittleEndian::write_u16(&mut data[58..60], header_len as u16);
        data[header_len..].copy_from_slice(&name_utf16);
        data
    }

    #[test]
    fn iterates_records_across_a_block() {
        let mut resident = Vec::new();
        resident.extend_from_slice(&build_record(100, "a.txt"));
        resident.extend_from_slice(&build_record(200, "b.txt"));
        // pad to beyond one journal block so a real image's multi-block
        // case is exercised by the refill path, zero-filled (RecordLength
        // 0 entries are skipped).
        resident.resize(JOURNAL_BLOCK_SIZE + 128, 0);

        let diagnostics = LogSink::default();
        let source = MemorySource::new(vec![0u8; 4096]);
        let attribute = Attribute {
            header: AttributeHeader {
                type_code: crate::constants::ATTR_TYPE_DATA,
                attribute_id: 0,
                name: Some("$J".to_string()),
                flags: 0,
            },
            body: AttributeBody::Resident { data: resident },
        };
        let inner = crate::cluster_stream::ClusterStream::from_attribute(&attribute, &source, &diagnostics, 4096, None).unwrap();
        let mut journal = UsnJournal::new(Stream::new(inner));

        let first = journal.next_record().unwrap().unwrap();
        assert_eq!(first.usn, 100);
        assert_eq!(first.file_name, "a.txt");

        let second = journal.next_record().unwrap().unwrap();
        assert_eq!(second.usn, 200);
        assert_eq!(second.file_name, "b.txt");

        assert!(journal.next_record().unwrap().is_none());
    }
}
