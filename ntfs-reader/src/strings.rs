//! UTF-16LE helpers shared by attribute names, `$FILE_NAME` values, and the
//! `$VOLUME_NAME` attribute. NTFS strings are UTF-16LE code unit sequences
//! without a trailing NUL; lone/unpaired surrogates do occur on real
//! volumes (mangled encodings, deliberately hostile test images), so this
//! always uses the lossy decode rather than failing the whole entry over
//! one bad character.

use ntfs_core::Error;

/// Decodes a byte slice of even length as UTF-16LE, replacing unpaired
/// surrogates with U+FFFD.
pub fn read_utf16le(bytes: &[u8]) -> Result<String, Error> {
    if bytes.len() % 2 != 0 {
        return Err(Error::InvalidData(
            "UTF-16LE string has an odd byte length".into(),
        ));
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ascii_range() {
        let bytes = [b'h', 0, b'i', 0];
        assert_eq!(read_utf16le(&bytes).unwrap(), "hi");
    }

    #[test]
    fn rejects_odd_length() {
        assert!(read_utf16le(&[0x41]).is_err());
    }

    #[test]
    fn replaces_unpaired_surrogate() {
        let bytes = [0x00, 0xD8]; // lone high surrogate, little-endian
        let decoded = read_utf16le(&bytes).unwrap();
        assert_eq!(decoded, "\u{FFFD}");
    }
}
