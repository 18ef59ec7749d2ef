//! §3 "Attribute" / §4.2 steps 3-4: the in-memory attribute model and the
//! parser that turns one attribute record's bytes into it. Grounded on the
//! teacher's `formatters/src/ntfs/attributes.rs`, reworked so that the
//! resident/non-resident split is structural (an enum) rather than a
//! `non_resident: bool` flag plus a grab-bag `AttributeData` enum that
//! conflated "is this attribute type recognized" with "is it resident" -
//! the spec's invariant ("resident/non-resident framing is mutually
//! exclusive") reads more directly as a Rust enum.

use byteorder::{ByteOrder, LittleEndian};
use ntfs_core::Error;

use crate::constants::ATTR_TYPE_END;
use crate::data_runs::{self, Extent};
use crate::strings::read_utf16le;

#[derive(Debug, Clone)]
pub struct AttributeHeader {
    pub type_code: u32,
    pub attribute_id: u16,
    pub name: Option<String>,
    pub flags: u16,
}

impl AttributeHeader {
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

#[derive(Debug, Clone)]
pub enum AttributeBody {
    Resident { data: Vec<u8> },
    NonResident {
        first_vcn: u64,
        last_vcn: u64,
        allocated_size: u64,
        data_size: u64,
        initialized_size: u64,
        /// 0 when the attribute is not compressed; otherwise the unit is
        /// `2^compression_unit_log2` clusters (spec.md §4.6).
        compression_unit_log2: u8,
        extents: Vec<Extent>,
    },
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub header: AttributeHeader,
    pub body: AttributeBody,
}

impl Attribute {
    pub fn is_resident(&self) -> bool {
        matches!(self.body, AttributeBody::Resident { .. })
    }

    pub fn is_compressed(&self) -> bool {
        matches!(
            self.body,
            AttributeBody::NonResident { compression_unit_log2, .. } if compression_unit_log2 > 0
        )
    }

    pub fn resident_data(&self) -> Option<&[u8]> {
        match &self.body {
            AttributeBody::Resident { data } => Some(data),
            AttributeBody::NonResident { .. } => None,
        }
    }

    pub fn logical_size(&self) -> u64 {
        match &self.body {
            AttributeBody::Resident { data } => data.len() as u64,
            AttributeBody::NonResident { data_size, .. } => *data_size,
        }
    }

    pub fn allocated_size(&self) -> u64 {
        match &self.body {
            AttributeBody::Resident { data } => data.len() as u64,
            AttributeBody::NonResident { allocated_size, .. } => *allocated_size,
        }
    }
}

/// Parses one attribute record starting at `offset` within `record_data`.
/// Returns the attribute and the offset of the next record
/// (`offset + record_length`), or `None` at the end sentinel
/// (`type_code == 0xFFFFFFFF`).
pub fn parse_attribute(
    record_data: &[u8],
    offset: usize,
) -> Result<Option<(Attribute, usize)>, Error> {
    if offset + 16 > record_data.len() {
        return Err(Error::InvalidData(
            "attribute header extends beyond MFT record".into(),
        ));
    }

    let type_code = LittleEndian::read_u32(&record_data[offset..offset + 4]);
    if type_code == ATTR_TYPE_END {
        return Ok(None);
    }

    let record_length = LittleEndian::read_u32(&record_data[offset + 4..offset + 8]) as usize;
    if record_length == 0 {
        return Err(Error::InvalidData("attribute record length is zero".into()));
    }
    if offset + record_length > record_data.len() {
        return Err(Error::InvalidData(format!(
            "attribute at offset {offset} (length {record_length}) extends beyond record"
        )));
    }

    let non_resident = record_data[offset + 8] != 0;
    let name_length = record_data[offset + 9] as usize;
    let name_offset = LittleEndian::read_u16(&record_data[offset + 10..offset + 12]) as usize;
    let flags = LittleEndian::read_u16(&record_data[offset + 12..offset + 14]);
    let attribute_id = LittleEndian::read_u16(&record_data[offset + 14..offset + 16]);

    let name = if name_length > 0 {
        let start = offset + name_offset;
        let end = start + name_length * 2;
        if end > record_data.len() {
            return Err(Error::InvalidData("attribute name extends beyond record".into()));
        }
        Some(read_utf16le(&record_data[start..end])?)
    } else {
        None
    };

    let header = AttributeHeader {
        type_code,
        attribute_id,
        name,
        flags,
    };

    let body = if !non_resident {
        parse_resident_body(record_data, offset)?
    } else {
        parse_non_resident_body(record_data, offset, record_length)?
    };

    Ok(Some((Attribute { header, body }, offset + record_length)))
}

fn parse_resident_body(record_data: &[u8], offset: usize) -> Result<AttributeBody, Error> {
    if offset + 0x18 > record_data.len() {
        return Err(Error::InvalidData("resident attribute header too short".into()));
    }
    let value_length = LittleEndian::read_u32(&record_data[offset + 0x10..offset + 0x14]) as usize;
    let value_offset = LittleEndian::read_u16(&record_data[offset + 0x14..offset + 0x16]) as usize;

    let start = offset + value_offset;
    let end = start + value_length;
    if end > record_data.len() {
        return Err(Error::InvalidData(
            "resident attribute value extends beyond record".into(),
        ));
    }

    Ok(AttributeBody::Resident {
        data: record_data[start..end].to_vec(),
    })
}

fn parse_non_resident_body(
    record_data: &[u8],
    offset: usize,
    record_length: usize,
) -> Result<AttributeBody, Error> {
    if offset + 0x40 > record_data.len() {
        return Err(Error::InvalidData(
            "non-resident attribute header too short".into(),
        ));
    }

    let first_vcn = LittleEndian::read_u64(&record_data[offset + 0x10..offset + 0x18]);
    let last_vcn = LittleEndian::read_u64(&record_data[offset + 0x18..offset + 0x20]);
    let runs_offset = LittleEndian::read_u16(&record_data[offset + 0x20..offset + 0x22]) as usize;
    let compression_unit = LittleEndian::read_u16(&record_data[offset + 0x22..offset + 0x24]);
    let allocated_size = LittleEndian::read_u64(&record_data[offset + 0x28..offset + 0x30]);
    let data_size = LittleEndian::read_u64(&record_data[offset + 0x30..offset + 0x38]);
    let initialized_size = LittleEndian::read_u64(&record_data[offset + 0x38..offset + 0x40]);

    let runs_start = offset + runs_offset;
    let runs_end = offset + record_length;
    if runs_start > runs_end || runs_end > record_data.len() {
        return Err(Error::InvalidData(
            "non-resident attribute mapping pairs extend beyond record".into(),
        ));
    }

    let extents = data_runs::decode_runs(&record_data[runs_start..runs_end])?;

    Ok(AttributeBody::NonResident {
        first_vcn,
        last_vcn,
        allocated_size,
        data_size,
        initialized_size,
        compression_unit_log2: compression_unit as u8,
        extents,
    })
}
