//! `$REPARSE_POINT` parsing, including the WofCompressedData overlay this
//! engine's spec supplemented beyond the distilled feature list (Open
//! Question 1: the reparse payload only carries *which* algorithm was
//! used, the WOF-decompressed length comes from the named `$DATA`
//! stream's own logical size, read separately by `file_entry.rs`).
//! Grounded on `examples/original_source/libfsntfs`'s reparse point
//! handling for the tag layout; the teacher had no reparse point support
//! to draw from.

use byteorder::{ByteOrder, LittleEndian};
use ntfs_core::Error;

use crate::compression::CompressionAlgorithm;
use crate::constants::{IO_REPARSE_TAG_MOUNT_POINT, IO_REPARSE_TAG_SYMLINK, IO_REPARSE_TAG_WOF};
use crate::strings::read_utf16le;

#[derive(Debug, Clone)]
pub enum ReparsePayload {
    SymbolicLink {
        substitute_name: String,
        print_name: String,
        is_relative: bool,
    },
    MountPoint {
        substitute_name: String,
        print_name: String,
    },
    WofCompressed {
        algorithm: CompressionAlgorithm,
        unit_size: u32,
    },
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ReparsePoint {
    pub tag: u32,
    pub payload: ReparsePayload,
}

pub fn parse_reparse_point(data: &[u8]) -> Result<ReparsePoint, Error> {
    if data.len() < 8 {
        return Err(Error::InvalidData("$REPARSE_POINT value too short".into()));
    }
    let tag = LittleEndian::read_u32(&data[0..4]);
    let reparse_data_length = LittleEndian::read_u16(&data[4..6]) as usize;
    let body_start = 8;
    let body_end = body_start + reparse_data_length;
    if body_end > data.len() {
        return Err(Error::InvalidData(
            "$REPARSE_POINT data extends beyond attribute value".into(),
        ));
    }
    let body = &data[body_start..body_end];

    let payload = match tag {
        IO_REPARSE_TAG_SYMLINK => parse_symlink_body(body)?,
        IO_REPARSE_TAG_MOUNT_POINT => parse_mount_point_body(body)?,
        IO_REPARSE_TAG_WOF => parse_wof_body(body)?,
        _ => ReparsePayload::Unknown,
    };

    Ok(ReparsePoint { tag, payload })
}

fn parse_symlink_body(body: &[u8]) -> Result<ReparsePayload, Error> {
    if body.len() < 12 {
        return Err(Error::InvalidData("symlink reparse body too short".into()));
    }
    let substitute_offset = LittleEndian::read_u16(&body[0..2]) as usize;
    let substitute_length = LittleEndian::read_u16(&body[2..4]) as usize;
    let print_offset = LittleEndian::read_u16(&body[4..6]) as usize;
    let print_length = LittleEndian::read_u16(&body[6..8]) as usize;
    let flags = LittleEndian::read_u32(&body[8..12]);
    let path_buffer = &body[12..];

    let substitute_name = read_utf16le(slice_checked(path_buffer, substitute_offset, substitute_length)?)?;
    let print_name = read_utf16le(slice_checked(path_buffer, print_offset, print_length)?)?;

    Ok(ReparsePayload::SymbolicLink {
        substitute_name,
        print_name,
        is_relative: flags & 0x1 != 0,
    })
}

fn parse_mount_point_body(body: &[u8]) -> Result<ReparsePayload, Error> {
    if body.len() < 8 {
        return Err(Error::InvalidData("mount point reparse body too short".into()));
    }
    let substitute_offset = LittleEndian::read_u16(&body[0..2]) as usize;
    let substitute_length = LittleEndian::read_u16(&body[2..4]) as usize;
    let print_offset = LittleEndian::read_u16(&body[4..6]) as usize;
    let print_length = LittleEndian::read_u16(&body[6..8]) as usize;
    let path_buffer = &body[8..];

    let substitute_name = read_utf16le(slice_checked(path_buffer, substitute_offset, substitute_length)?)?;
    let print_name = read_utf16le(slice_checked(path_buffer, print_offset, print_length)?)?;

    Ok(ReparsePayload::MountPoint {
        substitute_name,
        print_name,
    })
}

fn slice_checked(buffer: &[u8], offset: usize, length: usize) -> Result<&[u8], Error> {
    let end = offset + length;
    buffer.get(offset..end).ok_or_else(|| {
        Error::InvalidData("reparse point path component extends beyond buffer".into())
    })
}

/// `WOF_EXTERNAL_INFO` followed by `FILE_PROVIDER_EXTERNAL_INFO_V1`: the
/// payload names the compression algorithm a WofCompressedData-tagged
/// `$DATA` stream was encoded with. WOF's provider field must be 1
/// (WOF_PROVIDER_FILE); any other provider (e.g. WOF_PROVIDER_WIM) isn't
/// a file-compression case this engine handles.
fn parse_wof_body(body: &[u8]) -> Result<ReparsePayload, Error> {
    if body.len() < 16 {
        return Err(Error::InvalidData("WOF reparse body too short".into()));
    }
    let provider = LittleEndian::read_u32(&body[4..8]);
    if provider != 1 {
        return Err(Error::UnsupportedValue(format!(
            "WOF provider {provider} is not WOF_PROVIDER_FILE"
        )));
    }
    let algorithm_id = LittleEndian::read_u32(&body[12..16]);

    let (algorithm, unit_size) = match algorithm_id {
        0 => (CompressionAlgorithm::LzxpressHuffman, 4096),
        1 => (CompressionAlgorithm::Lzx, 32768),
        2 => (CompressionAlgorithm::LzxpressHuffman, 8192),
        3 => (CompressionAlgorithm::LzxpressHuffman, 16384),
        other => {
            return Err(Error::UnsupportedValue(format!(
                "unknown WOF file-provider compression algorithm id {other}"
            )))
        }
    };

    Ok(ReparsePayload::WofCompressed { algorithm, unit_size })
}
