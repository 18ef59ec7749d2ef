//! `$ATTRIBUTE_LIST` entry decoding (§4.2 step 5 / L7 resolution). Grounded
//! on the teacher's `formatters/src/ntfs/attribute_list.rs`. An attribute
//! list entry just points at where the real attribute record lives - in
//! this MFT entry or an extension record - so it's decoded independently
//! of the generic [`crate::attribute::Attribute`] model.

use byteorder::{ByteOrder, LittleEndian};
use ntfs_core::{Error, FileReference};

use crate::strings::read_utf16le;

#[derive(Debug, Clone)]
pub struct AttributeListEntry {
    pub type_code: u32,
    pub starting_vcn: u64,
    pub base_record: FileReference,
    pub attribute_id: u16,
    pub name: Option<String>,
}

/// Decodes every entry in an `$ATTRIBUTE_LIST` attribute's value bytes.
/// Entries are fixed-header-plus-name records laid out back to back, with
/// no terminator; the list ends when `data` is exhausted.
pub fn parse_attribute_list(data: &[u8]) -> Result<Vec<AttributeListEntry>, Error> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset < data.len() {
        if offset + 26 > data.len() {
            return Err(Error::InvalidData(
                "$ATTRIBUTE_LIST entry header extends beyond value".into(),
            ));
        }

        let type_code = LittleEndian::read_u32(&data[offset..offset + 4]);
        let record_length = LittleEndian::read_u16(&data[offset + 4..offset + 6]) as usize;
        let name_length = data[offset + 6] as usize;
        let name_offset = data[offset + 7] as usize;
        let starting_vcn = LittleEndian::read_u64(&data[offset + 8..offset + 16]);
        let base_record = FileReference(LittleEndian::read_u64(&data[offset + 16..offset + 24]));
        let attribute_id = LittleEndian::read_u16(&data[offset + 24..offset + 26]);

        if record_length == 0 || offset + record_length > data.len() {
            return Err(Error::InvalidData(format!(
                "$ATTRIBUTE_LIST entry at offset {offset} has invalid length {record_length}"
            )));
        }

        let name = if name_length > 0 {
            let start = offset + name_offset;
            let end = start + name_length * 2;
            if end > offset + record_length {
                return Err(Error::InvalidData(
                    "$ATTRIBUTE_LIST entry name extends beyond entry".into(),
                ));
            }
            Some(read_utf16le(&data[start..end])?)
        } else {
            None
        };

        entries.push(AttributeListEntry {
            type_code,
            starting_vcn,
            base_record,
            attribute_id,
            name,
        });

        offset += record_length;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ATTR_TYPE_DATA;

    fn build_entry(type_code: u32, vcn: u64, reference: FileReference, attr_id: u16) -> Vec<u8> {
        let mut buf = vec![0u8; 26];
        LittleEndian::write_u32(&mut buf[0..4], type_code);
        LittleEndian::write_u16(&mut buf[4..6], 26);
        buf[6] = 0; // no name
        buf[7] = 26;
        LittleEndian::write_u64(&mut buf[8..16], vcn);
        LittleEndian::write_u64(&mut buf[16..24], reference.0);
        LittleEndian::write_u16(&mut buf[24..26], attr_id);
        buf
    }

    #[test]
    fn parses_single_entry() {
        let buf = build_entry(ATTR_TYPE_DATA, 0, FileReference::new(12, 2), 3);
        let entries = parse_attribute_list(&buf).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].type_code, ATTR_TYPE_DATA);
        assert_eq!(entries[0].base_record.entry_index(), 12);
        assert_eq!(entries[0].attribute_id, 3);
    }

    #[test]
    fn parses_multiple_entries_back_to_back() {
        let mut buf = build_entry(ATTR_TYPE_DATA, 0, FileReference::new(12, 2), 0);
        buf.extend(build_entry(ATTR_TYPE_DATA, 16, FileReference::new(99, 1), 1));
        let entries = parse_attribute_list(&buf).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].starting_vcn, 16);
        assert_eq!(entries[1].base_record.entry_index(), 99);
    }

    #[test]
    fn rejects_zero_length_entry() {
        let mut buf = vec![0u8; 26];
        LittleEndian::write_u16(&mut buf[4..6], 0);
        assert!(parse_attribute_list(&buf).is_err());
    }
}
