//! Compression as a pluggable seam (L6), not a built-in monolith.
//!
//! Even the original NTFS forensic parser this engine is descended from
//! delegates every compression algorithm - including LZNT1 - to an
//! external routine rather than hard-wiring decode logic into its
//! attribute-data reader. This module keeps that shape: [`Decompressor`]
//! is the seam, [`resolve_decompressor`] supplies the engine's own
//! implementations, and a caller with a faster or hardware-backed codec
//! can substitute one without touching [`crate::cluster_stream`].

mod lznt1;

use ntfs_core::Error;

pub use lznt1::Lznt1Decompressor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionAlgorithm {
    Lznt1,
    Lzx,
    LzxpressHuffman,
}

/// One compression unit in, one decompressed unit out. Implementations
/// receive the whole on-disk unit (already fixup-free, already assembled
/// from its cluster run) and must produce exactly `output_size` bytes or
/// fail - short output is a caller bug, not a valid compressed stream.
pub trait Decompressor {
    fn decompress(&self, unit: &[u8], output_size: usize) -> Result<Vec<u8>, Error>;
}

/// Returns the engine's default decompressor for `algorithm`.
///
/// LZX and LZXPRESS-Huffman (used by WofCompressedData, see
/// `crate::reparse`) are recognized but not implemented here: both are
/// full Huffman/LZ77-with-repeat-offsets codecs, out of proportion to
/// what this engine needs for MFT/index/volume-metadata access, where
/// LZNT1 is the only algorithm the on-disk format itself ever applies
/// directly. A caller that needs WOF payload bodies decompressed can
/// implement [`Decompressor`] and pass it to `Volume`/`FileEntry`
/// instead of using this default.
pub fn resolve_decompressor(algorithm: CompressionAlgorithm) -> Result<Box<dyn Decompressor>, Error> {
    match algorithm {
        CompressionAlgorithm::Lznt1 => Ok(Box::new(Lznt1Decompressor)),
        CompressionAlgorithm::Lzx => Err(Error::UnsupportedValue(
            "LZX decompression has no built-in implementation; supply a Decompressor".into(),
        )),
        CompressionAlgorithm::LzxpressHuffman => Err(Error::UnsupportedValue(
            "LZXPRESS-Huffman decompression has no built-in implementation; supply a Decompressor"
                .into(),
        )),
    }
}
