//! §4.10 step 1 / "Volume header" (L1): parse the boot sector and derive
//! the volume parameters every other layer treats as immutable. Grounded
//! on the teacher's `formatters/src/ntfs/structures.rs::NtfsBootSector`
//! and `boot_sector.rs`, reworked to parse fields explicitly with
//! `byteorder` instead of `#[repr(C, packed)]` + unaligned reads, since
//! this crate has no reason to keep the teacher's raw-pointer-cast style
//! once the struct is no longer shared with a C ABI.

use byteorder::{ByteOrder, LittleEndian};
use ntfs_core::Error;

use crate::constants::{BOOT_SECTOR_SIGNATURE, NTFS_OEM_ID};

pub const BOOT_SECTOR_SIZE: usize = 512;

/// Immutable volume parameters derived from the boot sector.
#[derive(Debug, Clone, Copy)]
pub struct VolumeParameters {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub total_sectors: u64,
    pub mft_start_cluster: u64,
    pub mft_mirror_start_cluster: u64,
    pub mft_record_size: u32,
    pub index_record_size: u32,
    pub volume_serial: u64,
}

impl VolumeParameters {
    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster as u32
    }

    pub fn cluster_count(&self) -> u64 {
        let total_bytes = self.total_sectors * self.bytes_per_sector as u64;
        total_bytes / self.bytes_per_cluster() as u64
    }

    pub fn mft_offset(&self) -> u64 {
        self.mft_start_cluster * self.bytes_per_cluster() as u64
    }

    pub fn mft_mirror_offset(&self) -> u64 {
        self.mft_mirror_start_cluster * self.bytes_per_cluster() as u64
    }

    /// `record_size_field` is the boot sector's signed
    /// clusters-per-record/-index byte: positive means "this many
    /// clusters", negative means `2^|n|` bytes directly.
    fn record_size_from_field(field: i8, bytes_per_cluster: u32) -> u32 {
        if field > 0 {
            field as u32 * bytes_per_cluster
        } else {
            1u32 << (-(field as i32) as u32)
        }
    }
}

/// Parses and validates the 512-byte NTFS boot sector.
///
/// Invariant checked here (spec.md §3): record sizes and cluster size are
/// powers of two, and `mft_start_cluster * cluster_size < image_size` is
/// left to the caller once it knows the image size (this function only
/// has the boot sector bytes).
pub fn parse_boot_sector(data: &[u8]) -> Result<VolumeParameters, Error> {
    if data.len() < BOOT_SECTOR_SIZE {
        return Err(Error::InvalidData(format!(
            "boot sector buffer too small: {} bytes",
            data.len()
        )));
    }

    let signature = LittleEndian::read_u16(&data[0x1FE..0x200]);
    if signature != BOOT_SECTOR_SIGNATURE {
        return Err(Error::SignatureMismatch(format!(
            "boot sector signature 0x{signature:04X} != 0xAA55"
        )));
    }

    let oem_id = &data[0x03..0x0B];
    if oem_id != NTFS_OEM_ID.as_slice() {
        return Err(Error::SignatureMismatch(format!(
            "OEM id {:?} is not \"NTFS    \"",
            String::from_utf8_lossy(oem_id)
        )));
    }

    let bytes_per_sector = LittleEndian::read_u16(&data[0x0B..0x0D]);
    if ![512u16, 1024, 2048, 4096].contains(&bytes_per_sector) {
        return Err(Error::InvalidData(format!(
            "invalid bytes per sector: {bytes_per_sector}"
        )));
    }

    let sectors_per_cluster = data[0x0D];
    if sectors_per_cluster == 0 || !sectors_per_cluster.is_power_of_two() {
        return Err(Error::InvalidData(format!(
            "invalid sectors per cluster: {sectors_per_cluster}"
        )));
    }

    let bytes_per_cluster = bytes_per_sector as u32 * sectors_per_cluster as u32;
    if bytes_per_cluster > 65536 {
        return Err(Error::InvalidData(format!(
            "cluster size {bytes_per_cluster} exceeds 64 KiB"
        )));
    }

    let total_sectors = LittleEndian::read_u64(&data[0x28..0x30]);
    let mft_start_cluster = LittleEndian::read_u64(&data[0x30..0x38]);
    let mft_mirror_start_cluster = LittleEndian::read_u64(&data[0x38..0x40]);
    let clusters_per_mft_record = data[0x40] as i8;
    let clusters_per_index_record = data[0x44] as i8;
    let volume_serial = LittleEndian::read_u64(&data[0x48..0x50]);

    let mft_record_size =
        VolumeParameters::record_size_from_field(clusters_per_mft_record, bytes_per_cluster);
    let index_record_size =
        VolumeParameters::record_size_from_field(clusters_per_index_record, bytes_per_cluster);

    if !mft_record_size.is_power_of_two() || !index_record_size.is_power_of_two() {
        return Err(Error::InvalidData(
            "MFT/index record size is not a power of two".into(),
        ));
    }

    let params = VolumeParameters {
        bytes_per_sector,
        sectors_per_cluster,
        total_sectors,
        mft_start_cluster,
        mft_mirror_start_cluster,
        mft_record_size,
        index_record_size,
        volume_serial,
    };

    let volume_size = total_sectors * bytes_per_sector as u64;
    if params.mft_offset() >= volume_size {
        return Err(Error::InvalidData(format!(
            "MFT offset {} exceeds volume size {}",
            params.mft_offset(),
            volume_size
        )));
    }

    Ok(params)
}
