//! §4.1 Fixup layer: validate and un-apply the update-sequence-array on MFT
//! and INDX records. Grounded on the teacher's `formatters/src/ntfs/mft.rs
//! ::apply_fixup`, generalized to report which sector failed rather than
//! bailing with a single message, since the parser needs to know how much
//! of the buffer is trustworthy.

use ntfs_core::Error;

pub const SECTOR_SIZE: usize = 512;

/// Applies the update-sequence-array fixup to `buffer` in place.
///
/// `usa_offset`/`usa_count` come straight from the record header. The
/// first USA slot is the update sequence number (USN); the remaining
/// `usa_count - 1` slots are the original per-sector trailing bytes.
///
/// On success every sector's last two bytes have been restored. On a
/// mismatch, sectors before the failing one have already been fixed in
/// place (the caller may still use that prefix), and `Err` identifies the
/// failure as a checksum mismatch.
pub fn apply_fixup(buffer: &mut [u8], usa_offset: u16, usa_count: u16) -> Result<(), Error> {
    let usa_offset = usa_offset as usize;
    let usa_count = usa_count as usize;

    if usa_count == 0 {
        return Ok(());
    }
    if usa_offset + usa_count * 2 > buffer.len() {
        return Err(Error::InvalidData(
            "update sequence array extends beyond record buffer".into(),
        ));
    }

    let usn = [buffer[usa_offset], buffer[usa_offset + 1]];

    // usa_count includes the USN slot itself; slots 1..usa_count are the
    // per-sector replacement bytes, one per hardware sector in the record.
    for sector_index in 1..usa_count {
        let slot_offset = usa_offset + sector_index * 2;
        let replacement = [buffer[slot_offset], buffer[slot_offset + 1]];

        let sector_end = sector_index * SECTOR_SIZE;
        if sector_end > buffer.len() {
            return Err(Error::InvalidData(format!(
                "fixup sector {sector_index} lies beyond record buffer"
            )));
        }
        let trailer_offset = sector_end - 2;

        if buffer[trailer_offset] != usn[0] || buffer[trailer_offset + 1] != usn[1] {
            return Err(Error::ChecksumMismatch(format!(
                "fixup mismatch at sector {sector_index}: expected {:02X}{:02X}, found {:02X}{:02X}",
                usn[0], usn[1], buffer[trailer_offset], buffer[trailer_offset + 1]
            )));
        }

        buffer[trailer_offset] = replacement[0];
        buffer[trailer_offset + 1] = replacement[1];
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_record(usa_offset: usize, sector_count: usize, usn: [u8; 2]) -> Vec<u8> {
        let mut data = vec![0u8; sector_count * SECTOR_SIZE];
        let usa_count = sector_count + 1;
        data[usa_offset] = usn[0];
        data[usa_offset + 1] = usn[1];
        for sector_index in 1..usa_count {
            let slot_offset = usa_offset + sector_index * 2;
            data[slot_offset] = 0xAA;
            data[slot_offset + 1] = 0xBB + sector_index as u8;
            let trailer_offset = sector_index * SECTOR_SIZE - 2;
            data[trailer_offset] = usn[0];
            data[trailer_offset + 1] = usn[1];
        }
        data
    }

    #[test]
    fn restores_every_sector_trailer() {
        let mut data = build_record(0x30, 2, [0x01, 0x00]);
        apply_fixup(&mut data, 0x30, 3).unwrap();
        assert_eq!(&data[510..512], &[0xAA, 0xBC]);
        assert_eq!(&data[1022..1024], &[0xAA, 0xBD]);
    }

    #[test]
    fn detects_torn_sector() {
        let mut data = build_record(0x30, 2, [0x01, 0x00]);
        data[510] = 0xFF; // corrupt the first sector's trailer
        let err = apply_fixup(&mut data, 0x30, 3).unwrap_err();
        assert_eq!(err.domain(), ntfs_core::Domain::Input);
    }

    #[test]
    fn rejects_usa_past_buffer() {
        let mut data = vec![0u8; 64];
        let err = apply_fixup(&mut data, 60, 10).unwrap_err();
        assert_eq!(err.domain(), ntfs_core::Domain::Input);
    }
}
