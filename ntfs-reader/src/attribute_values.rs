//! Typed decoders for the resident attribute value bytes the engine cares
//! about: `$STANDARD_INFORMATION` and `$FILE_NAME`. Grounded on the
//! teacher's `formatters/src/ntfs/attributes.rs::{parse_standard_information,
//! parse_file_name}`. The other attributes the spec names
//! (`$INDEX_ROOT`, `$REPARSE_POINT`, `$SECURITY_DESCRIPTOR`,
//! `$VOLUME_INFORMATION`) are consumed as raw bytes by their own modules
//! (index.rs, reparse.rs, security.rs) rather than duplicated here.

use byteorder::{ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};
use ntfs_core::{Error, FileReference};

use crate::strings::read_utf16le;
use crate::timestamps::filetime_to_datetime;

#[derive(Debug, Clone, Copy)]
pub struct StandardInformation {
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub mft_modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub file_attributes: u32,
    /// Per-directory case-sensitive-lookup flag (spec.md §4.9/§4.10).
    pub is_case_sensitive: bool,
    /// Present only when the attribute was extended with the NTFS 3.0
    /// quota/USN/security fields; `None` for the 48-byte legacy form.
    pub owner_id: Option<u32>,
    pub security_id: Option<u32>,
    pub usn: Option<u64>,
}

pub fn parse_standard_information(data: &[u8]) -> Result<StandardInformation, Error> {
    if data.len() < 48 {
        return Err(Error::InvalidData(format!(
            "$STANDARD_INFORMATION too short: {} bytes",
            data.len()
        )));
    }

    let created = filetime_to_datetime(LittleEndian::read_u64(&data[0..8]));
    let modified = filetime_to_datetime(LittleEndian::read_u64(&data[8..16]));
    let mft_modified = filetime_to_datetime(LittleEndian::read_u64(&data[16..24]));
    let accessed = filetime_to_datetime(LittleEndian::read_u64(&data[24..32]));
    let file_attributes = LittleEndian::read_u32(&data[32..36]);
    let reserved = LittleEndian::read_u32(&data[36..40]);
    let is_case_sensitive =
        reserved & crate::constants::STANDARD_INFO_FLAG_CASE_SENSITIVE_DIRECTORY != 0;

    let (owner_id, security_id, usn) = if data.len() >= 72 {
        (
            Some(LittleEndian::read_u32(&data[48..52])),
            Some(LittleEndian::read_u32(&data[52..56])),
            Some(LittleEndian::read_u64(&data[64..72])),
        )
    } else {
        (None, None, None)
    };

    Ok(StandardInformation {
        created,
        modified,
        mft_modified,
        accessed,
        file_attributes,
        is_case_sensitive,
        owner_id,
        security_id,
        usn,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileNamespace {
    Posix,
    Win32,
    Dos,
    Win32AndDos,
}

impl FileNamespace {
    fn from_raw(value: u8) -> Result<Self, Error> {
        match value {
            crate::constants::FILE_NAME_NAMESPACE_POSIX => Ok(FileNamespace::Posix),
            crate::constants::FILE_NAME_NAMESPACE_WIN32 => Ok(FileNamespace::Win32),
            crate::constants::FILE_NAME_NAMESPACE_DOS => Ok(FileNamespace::Dos),
            crate::constants::FILE_NAME_NAMESPACE_WIN32_AND_DOS => Ok(FileNamespace::Win32AndDos),
            other => Err(Error::InvalidData(format!(
                "unknown $FILE_NAME namespace: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileNameValues {
    pub parent_directory: FileReference,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub mft_modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub allocated_size: u64,
    pub logical_size: u64,
    pub file_attributes: u32,
    pub namespace: FileNamespace,
    pub name: String,
}

pub fn parse_file_name(data: &[u8]) -> Result<FileNameValues, Error> {
    if data.len() < 66 {
        return Err(Error::InvalidData(format!(
            "$FILE_NAME too short: {} bytes",
            data.len()
        )));
    }

    let parent_directory = FileReference(LittleEndian::read_u64(&data[0..8]));
    let created = filetime_to_datetime(LittleEndian::read_u64(&data[8..16]));
    let modified = filetime_to_datetime(LittleEndian::read_u64(&data[16..24]));
    let mft_modified = filetime_to_datetime(LittleEndian::read_u64(&data[24..32]));
    let accessed = filetime_to_datetime(LittleEndian::read_u64(&data[32..40]));
    let allocated_size = LittleEndian::read_u64(&data[40..48]);
    let logical_size = LittleEndian::read_u64(&data[48..56]);
    let file_attributes = LittleEndian::read_u32(&data[56..60]);
    let name_length_chars = data[64] as usize;
    let namespace = FileNamespace::from_raw(data[65])?;

    let name_start = 66;
    let name_end = name_start + name_length_chars * 2;
    if name_end > data.len() {
        return Err(Error::InvalidData(
            "$FILE_NAME name extends beyond attribute value".into(),
        ));
    }
    let name = read_utf16le(&data[name_start..name_end])?;

    Ok(FileNameValues {
        parent_directory,
        created,
        modified,
        mft_modified,
        accessed,
        allocated_size,
        logical_size,
        file_attributes,
        namespace,
        name,
    })
}
