//! Hand-built NTFS volume image for the integration tests in
//! `tests/volume_tests.rs`. Every MFT record here is assembled byte-by-byte
//! against the same offsets `src/attribute.rs`, `src/mft.rs`, `src/index.rs`
//! and `src/attribute_values.rs` parse, the same way those modules' own
//! `#[cfg(test)]` helpers (`resident_data_attribute`, `build_entry_header`,
//! `build_file_name`) build fixtures for their unit tests - this just does
//! it for a whole volume instead of one record.
//!
//! Every record sets `usa_count = 0`, which `fixup::apply_fixup` treats as
//! "no update sequence array to apply" - real NTFS never writes a zero
//! count, but nothing downstream requires one, so the fixture skips
//! stamping fake USA sentinel words into every sector.

use byteorder::{ByteOrder, LittleEndian};

use ntfs_core::FileReference;
use ntfs_reader::Extent;

pub const CLUSTER_SIZE: u64 = 4096;
pub const MFT_RECORD_SIZE: u32 = 4096;
pub const INDEX_RECORD_SIZE: u32 = 4096;

pub const MFT_START_CLUSTER: u64 = 4;
pub const MFT_CLUSTERS: u64 = 16;
pub const MFT_MIRROR_START_CLUSTER: u64 = 20;
pub const MFT_MIRROR_CLUSTERS: u64 = 4;
pub const SPARSE_DATA_CLUSTER: u64 = 24;
pub const COMPRESSED_DATA_START_CLUSTER: u64 = 25;
pub const COMPRESSED_DATA_CLUSTERS: u64 = 16;

pub const IMAGE_SIZE: u64 = 10 * 1024 * 1024;
pub const VOLUME_SERIAL: u64 = 0x1122_3344_5566_7788;

// Well-known record indices (mirrors constants.rs's MFT_RECORD_*).
pub const REC_MFT: u64 = 0;
pub const REC_MFTMIRR: u64 = 1;
pub const REC_LOGFILE: u64 = 2;
pub const REC_VOLUME: u64 = 3;
pub const REC_ATTRDEF: u64 = 4;
pub const REC_ROOT: u64 = 5;
pub const REC_BITMAP: u64 = 6;
pub const REC_BOOT: u64 = 7;
pub const REC_BADCLUS: u64 = 8;
pub const REC_SECURE: u64 = 9;
pub const REC_UPCASE: u64 = 10;
pub const REC_EXTEND: u64 = 11;
pub const REC_HELLO: u64 = 12;
pub const REC_SPARSE: u64 = 13;
pub const REC_COMPRESSED: u64 = 14;
pub const REC_DUAL_NAME: u64 = 15;

pub const TOTAL_RECORDS: u64 = 16;

pub const HELLO_NAME: &str = "hello.txt";
pub const HELLO_CONTENT: &[u8] = b"hello from a resident data run\n";

pub const SPARSE_NAME: &str = "sparse.bin";
pub const SPARSE_LOGICAL_SIZE: u64 = CLUSTER_SIZE * 3;
pub const SPARSE_FILL_BYTE: u8 = 0xAB;

pub const COMPRESSED_NAME: &str = "compressed.bin";
pub const COMPRESSED_LOGICAL_SIZE: u64 = CLUSTER_SIZE * 16;
pub const COMPRESSION_UNIT_LOG2: u8 = 4; // 2^4 = 16 clusters per unit

pub const DUAL_NAME_WIN32: &str = "longfilename.txt";
pub const DUAL_NAME_DOS: &str = "LONGFI~1.TXT";

const FILE_ATTRIBUTE_DIRECTORY: u32 = 0x10;
const FILE_ATTRIBUTE_ARCHIVE: u32 = 0x20;

/// The 64KiB "0,1,2,...,255" repeated 256 times pattern, stored as one
/// fully-mapped compression unit so it exercises the full-unit passthrough
/// in `cluster_stream.rs` rather than real LZNT1 chunk framing (this exact
/// period-256 payload cannot be encoded within a single unit's byte budget
/// - see DESIGN.md).
pub fn compressed_payload() -> Vec<u8> {
    (0..COMPRESSED_LOGICAL_SIZE as u32).map(|i| (i % 256) as u8).collect()
}

pub fn sparse_live_cluster() -> Vec<u8> {
    vec![SPARSE_FILL_BYTE; CLUSTER_SIZE as usize]
}

/// Builds the full 10 MiB volume image. Returns the raw bytes, ready for
/// `ntfs_core::MemorySource::new`.
pub fn build_fixture_image() -> Vec<u8> {
    let mut disk = vec![0u8; IMAGE_SIZE as usize];

    write_at(&mut disk, 0, &build_boot_sector());

    let records = build_all_records();

    for (index, record) in records.iter().enumerate() {
        let offset = MFT_START_CLUSTER * CLUSTER_SIZE + index as u64 * MFT_RECORD_SIZE as u64;
        write_at(&mut disk, offset, record);
    }

    // $MFTMirr backs up the first MFT_MIRROR_CLUSTERS records (>= 4, the
    // count check_mft_mirror reads) byte-for-byte.
    let mirror_offset = MFT_MIRROR_START_CLUSTER * CLUSTER_SIZE;
    let mirror_bytes = (MFT_MIRROR_CLUSTERS * CLUSTER_SIZE / MFT_RECORD_SIZE as u64) as usize;
    for i in 0..mirror_bytes.min(records.len()) {
        write_at(&mut disk, mirror_offset + i as u64 * MFT_RECORD_SIZE as u64, &records[i]);
    }

    write_at(&mut disk, SPARSE_DATA_CLUSTER * CLUSTER_SIZE, &sparse_live_cluster());
    write_at(&mut disk, COMPRESSED_DATA_START_CLUSTER * CLUSTER_SIZE, &compressed_payload());

    disk
}

fn write_at(disk: &mut [u8], offset: u64, data: &[u8]) {
    let start = offset as usize;
    disk[start..start + data.len()].copy_from_slice(data);
}

fn build_boot_sector() -> [u8; 512] {
    let mut data = [0u8; 512];
    data[0..3].copy_from_slice(&[0xEB, 0x52, 0x90]);
    data[0x03..0x0B].copy_from_slice(b"NTFS    ");
    LittleEndian::write_u16(&mut data[0x0B..0x0D], 512); // bytes_per_sector
    data[0x0D] = (CLUSTER_SIZE / 512) as u8; // sectors_per_cluster
    data[0x15] = 0xF8;
    LittleEndian::write_u64(&mut data[0x28..0x30], IMAGE_SIZE / 512); // total_sectors
    LittleEndian::write_u64(&mut data[0x30..0x38], MFT_START_CLUSTER);
    LittleEndian::write_u64(&mut data[0x38..0x40], MFT_MIRROR_START_CLUSTER);
    data[0x40] = 1; // clusters_per_mft_record: 1 cluster (4096 bytes)
    data[0x44] = 1; // clusters_per_index_record: 1 cluster (4096 bytes)
    LittleEndian::write_u64(&mut data[0x48..0x50], VOLUME_SERIAL);
    LittleEndian::write_u16(&mut data[0x1FE..0x200], 0xAA55);
    data
}

// --- attribute builders -----------------------------------------------

fn resident_attr(type_code: u32, name: Option<&str>, data: &[u8]) -> Vec<u8> {
    let name_utf16: Vec<u8> = name
        .map(|n| n.encode_utf16().flat_map(|c| c.to_le_bytes()).collect())
        .unwrap_or_default();
    let name_len_chars = name.map(|n| n.encode_utf16().count()).unwrap_or(0);

    let header_len = 0x18usize;
    let name_offset = header_len;
    let value_offset = header_len + name_utf16.len();
    let total = value_offset + data.len();

    let mut buf = vec![0u8; total];
    LittleEndian::write_u32(&mut buf[0..4], type_code);
    LittleEndian::write_u32(&mut buf[4..8], total as u32);
    buf[8] = 0; // resident
    buf[9] = name_len_chars as u8;
    LittleEndian::write_u16(&mut buf[10..12], name_offset as u16);
    LittleEndian::write_u16(&mut buf[12..14], 0); // flags
    LittleEndian::write_u16(&mut buf[14..16], 0); // attribute_id
    LittleEndian::write_u32(&mut buf[0x10..0x14], data.len() as u32);
    LittleEndian::write_u16(&mut buf[0x14..0x16], value_offset as u16);
    buf[name_offset..name_offset + name_utf16.len()].copy_from_slice(&name_utf16);
    buf[value_offset..].copy_from_slice(data);
    buf
}

#[allow(clippy::too_many_arguments)]
fn non_resident_attr(
    type_code: u32,
    name: Option<&str>,
    first_vcn: u64,
    last_vcn: u64,
    allocated_size: u64,
    data_size: u64,
    initialized_size: u64,
    compression_unit_log2: u8,
    extents: &[Extent],
) -> Vec<u8> {
    let name_utf16: Vec<u8> = name
        .map(|n| n.encode_utf16().flat_map(|c| c.to_le_bytes()).collect())
        .unwrap_or_default();
    let name_len_chars = name.map(|n| n.encode_utf16().count()).unwrap_or(0);

    let header_len = 0x40usize;
    let name_offset = header_len;
    let runs_offset = header_len + name_utf16.len();
    let runs = ntfs_reader::data_runs::encode_runs(extents);
    let total = runs_offset + runs.len();

    let mut buf = vec![0u8; total];
    LittleEndian::write_u32(&mut buf[0..4], type_code);
    LittleEndian::write_u32(&mut buf[4..8], total as u32);
    buf[8] = 1; // non-resident
    buf[9] = name_len_chars as u8;
    LittleEndian::write_u16(&mut buf[10..12], name_offset as u16);
    LittleEndian::write_u16(&mut buf[12..14], if compression_unit_log2 > 0 { 0x0001 } else { 0 });
    LittleEndian::write_u16(&mut buf[14..16], 0); // attribute_id
    LittleEndian::write_u64(&mut buf[0x10..0x18], first_vcn);
    LittleEndian::write_u64(&mut buf[0x18..0x20], last_vcn);
    LittleEndian::write_u16(&mut buf[0x20..0x22], runs_offset as u16);
    LittleEndian::write_u16(&mut buf[0x22..0x24], compression_unit_log2 as u16);
    LittleEndian::write_u64(&mut buf[0x28..0x30], allocated_size);
    LittleEndian::write_u64(&mut buf[0x30..0x38], data_size);
    LittleEndian::write_u64(&mut buf[0x38..0x40], initialized_size);
    buf[name_offset..name_offset + name_utf16.len()].copy_from_slice(&name_utf16);
    buf[runs_offset..].copy_from_slice(&runs);
    buf
}

fn standard_information(file_attributes: u32) -> Vec<u8> {
    let mut data = vec![0u8; 48];
    LittleEndian::write_u32(&mut data[32..36], file_attributes);
    data
}

#[allow(clippy::too_many_arguments)]
fn file_name_value(
    parent: FileReference,
    name: &str,
    namespace: u8,
    file_attributes: u32,
    allocated_size: u64,
    logical_size: u64,
) -> Vec<u8> {
    let name_utf16: Vec<u16> = name.encode_utf16().collect();
    let mut data = vec![0u8; 66 + name_utf16.len() * 2];
    LittleEndian::write_u64(&mut data[0..8], parent.0);
    LittleEndian::write_u64(&mut data[40..48], allocated_size);
    LittleEndian::write_u64(&mut data[48..56], logical_size);
    LittleEndian::write_u32(&mut data[56..60], file_attributes);
    data[64] = name_utf16.len() as u8;
    data[65] = namespace;
    for (i, unit) in name_utf16.iter().enumerate() {
        LittleEndian::write_u16(&mut data[66 + i * 2..66 + i * 2 + 2], *unit);
    }
    data
}

fn build_record(seq: u16, flags: u16, attrs: &[Vec<u8>]) -> Vec<u8> {
    let record_size = MFT_RECORD_SIZE as usize;
    let mut buf = vec![0u8; record_size];
    buf[0..4].copy_from_slice(b"FILE");
    LittleEndian::write_u16(&mut buf[4..6], 0x30); // usa_offset, unused: usa_count is 0
    LittleEndian::write_u16(&mut buf[6..8], 0); // usa_count
    LittleEndian::write_u16(&mut buf[16..18], seq);
    LittleEndian::write_u16(&mut buf[18..20], 1); // hard_link_count
    let first_attr_offset = 0x38usize;
    LittleEndian::write_u16(&mut buf[20..22], first_attr_offset as u16);
    LittleEndian::write_u16(&mut buf[22..24], flags);

    let mut offset = first_attr_offset;
    for attr in attrs {
        buf[offset..offset + attr.len()].copy_from_slice(attr);
        offset += attr.len();
    }
    LittleEndian::write_u32(&mut buf[offset..offset + 4], 0xFFFF_FFFF); // end sentinel
    let used_size = offset + 4;

    LittleEndian::write_u32(&mut buf[24..28], used_size as u32);
    LittleEndian::write_u32(&mut buf[28..32], record_size as u32);
    LittleEndian::write_u64(&mut buf[32..40], 0); // base_record
    LittleEndian::write_u16(&mut buf[40..42], attrs.len() as u16); // next_attribute_id

    buf
}

fn empty_system_record(seq: u16) -> Vec<u8> {
    build_record(seq, 0x0001, &[])
}

// --- directory index entries -------------------------------------------

fn directory_index_entry(reference: FileReference, key: &[u8], is_last: bool) -> Vec<u8> {
    let length = if is_last { 16 } else { 16 + key.len() };
    let mut entry = vec![0u8; length];
    LittleEndian::write_u64(&mut entry[0..8], reference.0);
    LittleEndian::write_u16(&mut entry[8..10], length as u16);
    LittleEndian::write_u16(&mut entry[10..12], if is_last { 0 } else { key.len() as u16 });
    LittleEndian::write_u16(&mut entry[12..14], if is_last { 0x0002 } else { 0 });
    if !is_last {
        entry[16..16 + key.len()].copy_from_slice(key);
    }
    entry
}

fn index_root(indexed_type: u32, entries: &[Vec<u8>]) -> Vec<u8> {
    let entries_bytes: usize = entries.iter().map(|e| e.len()).sum();
    let entries_offset = 16u32;
    let index_length = entries_offset + entries_bytes as u32;

    let mut value = vec![0u8; 16 + 16];
    LittleEndian::write_u32(&mut value[0..4], indexed_type);
    LittleEndian::write_u32(&mut value[4..8], 1); // collation_rule: COLLATION_FILE_NAME/ULONG
    LittleEndian::write_u32(&mut value[8..12], INDEX_RECORD_SIZE);
    LittleEndian::write_u32(&mut value[16..20], entries_offset);
    LittleEndian::write_u32(&mut value[20..24], index_length);

    for entry in entries {
        value.extend_from_slice(entry);
    }
    value
}

// --- the MFT records themselves -----------------------------------------

fn build_all_records() -> Vec<Vec<u8>> {
    let mut records = vec![Vec::new(); TOTAL_RECORDS as usize];

    let mft_extents = vec![Extent { lcn: Some(MFT_START_CLUSTER), length_clusters: MFT_CLUSTERS }];
    records[REC_MFT as usize] = build_record(
        1,
        0x0001,
        &[non_resident_attr(
            ntfs_reader::constants::ATTR_TYPE_DATA,
            None,
            0,
            MFT_CLUSTERS - 1,
            MFT_CLUSTERS * CLUSTER_SIZE,
            MFT_CLUSTERS * CLUSTER_SIZE,
            MFT_CLUSTERS * CLUSTER_SIZE,
            0,
            &mft_extents,
        )],
    );

    let mirror_extents = vec![Extent { lcn: Some(MFT_MIRROR_START_CLUSTER), length_clusters: MFT_MIRROR_CLUSTERS }];
    records[REC_MFTMIRR as usize] = build_record(
        1,
        0x0001,
        &[non_resident_attr(
            ntfs_reader::constants::ATTR_TYPE_DATA,
            None,
            0,
            MFT_MIRROR_CLUSTERS - 1,
            MFT_MIRROR_CLUSTERS * CLUSTER_SIZE,
            MFT_MIRROR_CLUSTERS * CLUSTER_SIZE,
            MFT_MIRROR_CLUSTERS * CLUSTER_SIZE,
            0,
            &mirror_extents,
        )],
    );

    records[REC_LOGFILE as usize] = empty_system_record(1);
    records[REC_ATTRDEF as usize] = empty_system_record(1);
    records[REC_BOOT as usize] = empty_system_record(1);
    records[REC_BADCLUS as usize] = empty_system_record(1);
    records[REC_UPCASE as usize] = empty_system_record(1);

    let volume_name: Vec<u8> = "FIXTURE".encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
    records[REC_VOLUME as usize] = build_record(
        1,
        0x0001,
        &[
            resident_attr(ntfs_reader::constants::ATTR_TYPE_STANDARD_INFORMATION, None, &standard_information(0)),
            resident_attr(ntfs_reader::constants::ATTR_TYPE_VOLUME_NAME, None, &volume_name),
        ],
    );

    let cluster_count = IMAGE_SIZE / CLUSTER_SIZE;
    let bitmap = build_bitmap(
        cluster_count,
        &[
            (MFT_START_CLUSTER, MFT_CLUSTERS),
            (MFT_MIRROR_START_CLUSTER, MFT_MIRROR_CLUSTERS),
            (SPARSE_DATA_CLUSTER, 1),
            (COMPRESSED_DATA_START_CLUSTER, COMPRESSED_DATA_CLUSTERS),
        ],
    );
    records[REC_BITMAP as usize] = build_record(
        1,
        0x0001,
        &[resident_attr(ntfs_reader::constants::ATTR_TYPE_DATA, None, &bitmap)],
    );

    records[REC_SECURE as usize] = build_record(1, 0x0001, &build_secure_attributes());

    records[REC_EXTEND as usize] = build_record(
        1,
        0x0001 | 0x0002, // in-use, directory
        &[
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_STANDARD_INFORMATION,
                None,
                &standard_information(FILE_ATTRIBUTE_DIRECTORY),
            ),
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_FILE_NAME,
                None,
                &file_name_value(
                    FileReference::new(REC_ROOT, 1),
                    "$Extend",
                    ntfs_reader::FileNamespace::Win32 as u8,
                    FILE_ATTRIBUTE_DIRECTORY,
                    0,
                    0,
                ),
            ),
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_INDEX_ROOT,
                Some("$I30"),
                &index_root(ntfs_reader::constants::ATTR_TYPE_FILE_NAME, &[directory_index_entry(FileReference(0), &[], true)]),
            ),
        ],
    );

    records[REC_HELLO as usize] = build_record(
        1,
        0x0001,
        &[
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_STANDARD_INFORMATION,
                None,
                &standard_information(FILE_ATTRIBUTE_ARCHIVE),
            ),
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_FILE_NAME,
                None,
                &file_name_value(
                    FileReference::new(REC_ROOT, 1),
                    HELLO_NAME,
                    win32_namespace(),
                    FILE_ATTRIBUTE_ARCHIVE,
                    CLUSTER_SIZE,
                    HELLO_CONTENT.len() as u64,
                ),
            ),
            resident_attr(ntfs_reader::constants::ATTR_TYPE_DATA, None, HELLO_CONTENT),
        ],
    );

    let sparse_extents = vec![
        Extent { lcn: None, length_clusters: 1 },
        Extent { lcn: Some(SPARSE_DATA_CLUSTER), length_clusters: 1 },
        Extent { lcn: None, length_clusters: 1 },
    ];
    records[REC_SPARSE as usize] = build_record(
        1,
        0x0001,
        &[
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_STANDARD_INFORMATION,
                None,
                &standard_information(FILE_ATTRIBUTE_ARCHIVE),
            ),
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_FILE_NAME,
                None,
                &file_name_value(
                    FileReference::new(REC_ROOT, 1),
                    SPARSE_NAME,
                    win32_namespace(),
                    FILE_ATTRIBUTE_ARCHIVE,
                    CLUSTER_SIZE * 3,
                    SPARSE_LOGICAL_SIZE,
                ),
            ),
            non_resident_attr(
                ntfs_reader::constants::ATTR_TYPE_DATA,
                None,
                0,
                2,
                CLUSTER_SIZE * 3,
                SPARSE_LOGICAL_SIZE,
                SPARSE_LOGICAL_SIZE,
                0,
                &sparse_extents,
            ),
        ],
    );

    let compressed_extents = vec![Extent { lcn: Some(COMPRESSED_DATA_START_CLUSTER), length_clusters: COMPRESSED_DATA_CLUSTERS }];
    records[REC_COMPRESSED as usize] = build_record(
        1,
        0x0001,
        &[
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_STANDARD_INFORMATION,
                None,
                &standard_information(FILE_ATTRIBUTE_ARCHIVE),
            ),
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_FILE_NAME,
                None,
                &file_name_value(
                    FileReference::new(REC_ROOT, 1),
                    COMPRESSED_NAME,
                    win32_namespace(),
                    FILE_ATTRIBUTE_ARCHIVE,
                    COMPRESSED_LOGICAL_SIZE,
                    COMPRESSED_LOGICAL_SIZE,
                ),
            ),
            non_resident_attr(
                ntfs_reader::constants::ATTR_TYPE_DATA,
                None,
                0,
                (COMPRESSED_DATA_CLUSTERS - 1) as u64,
                COMPRESSED_LOGICAL_SIZE,
                COMPRESSED_LOGICAL_SIZE,
                COMPRESSED_LOGICAL_SIZE,
                COMPRESSION_UNIT_LOG2,
                &compressed_extents,
            ),
        ],
    );

    records[REC_DUAL_NAME as usize] = build_record(
        1,
        0x0001,
        &[
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_STANDARD_INFORMATION,
                None,
                &standard_information(FILE_ATTRIBUTE_ARCHIVE),
            ),
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_FILE_NAME,
                None,
                &file_name_value(
                    FileReference::new(REC_ROOT, 1),
                    DUAL_NAME_WIN32,
                    win32_namespace(),
                    FILE_ATTRIBUTE_ARCHIVE,
                    0,
                    0,
                ),
            ),
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_FILE_NAME,
                None,
                &file_name_value(
                    FileReference::new(REC_ROOT, 1),
                    DUAL_NAME_DOS,
                    ntfs_reader::FileNamespace::Dos as u8,
                    FILE_ATTRIBUTE_ARCHIVE,
                    0,
                    0,
                ),
            ),
        ],
    );

    let mut root_entries = vec![
        directory_index_entry(
            FileReference::new(REC_HELLO, 1),
            &file_name_value(FileReference::new(REC_ROOT, 1), HELLO_NAME, win32_namespace(), FILE_ATTRIBUTE_ARCHIVE, CLUSTER_SIZE, HELLO_CONTENT.len() as u64),
            false,
        ),
        directory_index_entry(
            FileReference::new(REC_SPARSE, 1),
            &file_name_value(FileReference::new(REC_ROOT, 1), SPARSE_NAME, win32_namespace(), FILE_ATTRIBUTE_ARCHIVE, CLUSTER_SIZE * 3, SPARSE_LOGICAL_SIZE),
            false,
        ),
        directory_index_entry(
            FileReference::new(REC_COMPRESSED, 1),
            &file_name_value(FileReference::new(REC_ROOT, 1), COMPRESSED_NAME, win32_namespace(), FILE_ATTRIBUTE_ARCHIVE, COMPRESSED_LOGICAL_SIZE, COMPRESSED_LOGICAL_SIZE),
            false,
        ),
        directory_index_entry(
            FileReference::new(REC_DUAL_NAME, 1),
            &file_name_value(FileReference::new(REC_ROOT, 1), DUAL_NAME_WIN32, win32_namespace(), FILE_ATTRIBUTE_ARCHIVE, 0, 0),
            false,
        ),
        directory_index_entry(
            FileReference::new(REC_DUAL_NAME, 1),
            &file_name_value(FileReference::new(REC_ROOT, 1), DUAL_NAME_DOS, ntfs_reader::FileNamespace::Dos as u8, FILE_ATTRIBUTE_ARCHIVE, 0, 0),
            false,
        ),
    ];
    root_entries.push(directory_index_entry(FileReference(0), &[], true));

    records[REC_ROOT as usize] = build_record(
        1,
        0x0001 | 0x0002, // in-use, directory
        &[
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_STANDARD_INFORMATION,
                None,
                &standard_information(FILE_ATTRIBUTE_DIRECTORY),
            ),
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_FILE_NAME,
                None,
                &file_name_value(FileReference::new(REC_ROOT, 1), ".", win32_namespace(), FILE_ATTRIBUTE_DIRECTORY, 0, 0),
            ),
            resident_attr(
                ntfs_reader::constants::ATTR_TYPE_INDEX_ROOT,
                Some("$I30"),
                &index_root(ntfs_reader::constants::ATTR_TYPE_FILE_NAME, &root_entries),
            ),
        ],
    );

    records
}

fn win32_namespace() -> u8 {
    ntfs_reader::FileNamespace::Win32 as u8
}

fn build_bitmap(cluster_count: u64, allocated_ranges: &[(u64, u64)]) -> Vec<u8> {
    let mut bitmap = vec![0u8; ((cluster_count + 7) / 8) as usize];
    for &(start, len) in allocated_ranges {
        for lcn in start..start + len {
            let byte = (lcn / 8) as usize;
            let bit = (lcn % 8) as u8;
            bitmap[byte] |= 1 << bit;
        }
    }
    bitmap
}

/// $Secure: a minimal `$SII` index with a single entry (`security_id`
/// 256) resolving into `$SDS`, built the way `security.rs`'s own doc
/// comment describes the `$SII`/`$SDS` relationship.
fn build_secure_attributes() -> Vec<Vec<u8>> {
    const SECURITY_ID: u32 = 256;
    const DESCRIPTOR_BYTES: &[u8] = b"FAKESECDESC1234";

    // $SDS: 20-byte duplicated header + the descriptor bytes, at offset 0.
    let mut sds = Vec::new();
    sds.extend_from_slice(&0xAABB_CCDDu32.to_le_bytes()); // hash (unused by the resolver)
    sds.extend_from_slice(&SECURITY_ID.to_le_bytes());
    sds.extend_from_slice(&0u64.to_le_bytes()); // offset of this record within $SDS
    sds.extend_from_slice(&((20 + DESCRIPTOR_BYTES.len()) as u32).to_le_bytes()); // total length
    sds.extend_from_slice(DESCRIPTOR_BYTES);

    // One $SII entry: key = security_id, value = the same 20-byte header,
    // stored inline in the entry (data_offset/data_length packed into the
    // leading 8 bytes per index.rs's generic-index reading).
    let key = SECURITY_ID.to_le_bytes();
    let value = &sds[0..20];
    let data_offset = 16 + key.len();
    let entry_len = data_offset + value.len();
    let mut entry = vec![0u8; entry_len];
    LittleEndian::write_u16(&mut entry[0..2], data_offset as u16);
    LittleEndian::write_u16(&mut entry[2..4], value.len() as u16);
    LittleEndian::write_u16(&mut entry[8..10], entry_len as u16);
    LittleEndian::write_u16(&mut entry[10..12], key.len() as u16);
    entry[16..16 + key.len()].copy_from_slice(&key);
    entry[data_offset..].copy_from_slice(value);

    let mut terminator = vec![0u8; 16];
    LittleEndian::write_u16(&mut terminator[8..10], 16);
    LittleEndian::write_u16(&mut terminator[12..14], 0x0002); // LAST

    vec![
        resident_attr(
            ntfs_reader::constants::ATTR_TYPE_INDEX_ROOT,
            Some("$SII"),
            &index_root(0, &[entry, terminator]),
        ),
        resident_attr(ntfs_reader::constants::ATTR_TYPE_DATA, Some("$SDS"), &sds),
    ]
}
