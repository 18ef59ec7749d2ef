//! LZNT1 decompression. Grounded on the teacher's
//! `formatters/src/ntfs/compression.rs`, with two corrections the
//! teacher's version got wrong against the real on-disk format:
//!
//! - the compressed-chunk header's bit 15 marks whether the chunk body is
//!   compressed at all; a chunk that didn't shrink is stored as `chunk_size`
//!   raw bytes with no token stream. The teacher's version always ran the
//!   token decoder and would corrupt any volume containing an
//!   incompressible 4096-byte chunk.
//! - the back-reference token's offset/length bit split depends on the
//!   decompressed position *within the current 4096-byte chunk*, not the
//!   cumulative position across the whole compression unit. The teacher's
//!   version used the cumulative position, which only happens to work for
//!   a unit's first chunk.

use ntfs_core::Error;

use super::Decompressor;

const CHUNK_SIGNATURE_MASK: u16 = 0x7000;
const CHUNK_SIGNATURE: u16 = 0x3000;
const CHUNK_COMPRESSED_FLAG: u16 = 0x8000;
const CHUNK_SIZE_MASK: u16 = 0x0FFF;

pub struct Lznt1Decompressor;

impl Decompressor for Lznt1Decompressor {
    fn decompress(&self, unit: &[u8], output_size: usize) -> Result<Vec<u8>, Error> {
        decompress_lznt1(unit, output_size)
    }
}

fn decompress_lznt1(compressed: &[u8], decompressed_size: usize) -> Result<Vec<u8>, Error> {
    let mut result = Vec::with_capacity(decompressed_size);
    let mut pos = 0;

    while pos < compressed.len() && result.len() < decompressed_size {
        if pos + 2 > compressed.len() {
            break;
        }

        let header = u16::from_le_bytes([compressed[pos], compressed[pos + 1]]);
        pos += 2;

        if header == 0 {
            break;
        }

        if header & CHUNK_SIGNATURE_MASK != CHUNK_SIGNATURE {
            return Err(Error::DecompressFailed(format!(
                "invalid LZNT1 chunk signature in header 0x{header:04X}"
            )));
        }

        let chunk_size = ((header & CHUNK_SIZE_MASK) + 1) as usize;
        if pos + chunk_size > compressed.len() {
            return Err(Error::DecompressFailed(
                "LZNT1 chunk extends beyond buffer".into(),
            ));
        }
        let chunk_data = &compressed[pos..pos + chunk_size];

        if header & CHUNK_COMPRESSED_FLAG == 0 {
            result.extend_from_slice(chunk_data);
        } else {
            decompress_chunk(chunk_data, &mut result)?;
        }

        pos += chunk_size;
    }

    Ok(result)
}

fn decompress_chunk(chunk: &[u8], output: &mut Vec<u8>) -> Result<(), Error> {
    let chunk_start = output.len();
    let mut pos = 0;

    while pos < chunk.len() {
        let flags = chunk[pos];
        pos += 1;

        for i in 0..8 {
            if pos >= chunk.len() {
                break;
            }

            if flags & (1 << i) != 0 {
                if pos + 1 >= chunk.len() {
                    break;
                }

                let token = u16::from_le_bytes([chunk[pos], chunk[pos + 1]]);
                pos += 2;

                let chunk_relative_pos = output.len() - chunk_start;
                let (offset, length) = decode_token(token, chunk_relative_pos);

                if offset == 0 || offset > output.len() {
                    return Err(Error::DecompressFailed(format!(
                        "invalid LZNT1 back reference: offset {offset} > output length {}",
                        output.len()
                    )));
                }

                let copy_start = output.len() - offset;
                for j in 0..length {
                    let byte = output[copy_start + (j % offset)];
                    output.push(byte);
                }
            } else {
                output.push(chunk[pos]);
                pos += 1;
            }
        }
    }

    Ok(())
}

/// Decode an LZNT1 back-reference token. `chunk_pos` is the number of
/// bytes already decompressed into the *current* 4096-byte chunk.
///
/// The length/offset field widths shrink as the chunk fills up: the
/// earlier in the chunk a token appears, the fewer bytes could possibly
/// be behind it, so fewer offset bits are needed and more are given to
/// length.
fn decode_token(token: u16, chunk_pos: usize) -> (usize, usize) {
    let mut length_bits = 4u32;
    let mut remaining = chunk_pos.saturating_sub(1);
    while remaining >= 0x10 {
        remaining >>= 1;
        length_bits += 1;
    }

    let length_mask = (1u16 << length_bits) - 1;
    let offset_mask = !length_mask;

    let length = ((token & length_mask) as usize) + 3;
    let offset = (((token & offset_mask) as usize) >> length_bits) + 1;

    (offset, length)
}
