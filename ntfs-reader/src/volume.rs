//! §4.10 Volume facade (L10): the single entry point a caller opens,
//! tying the boot sector, MFT, `$Bitmap`, and the per-call facades
//! (`FileEntry`, `SecurityDescriptorResolver`, `UsnJournal`) together.
//! Grounded on the teacher's `filesystems/src/families/ntfs/mod.rs`
//! (`NtfsFilesystem::open`'s boot-sector-then-MFT sequence), extended
//! with the free-space bitmap, security descriptor, MFT mirror
//! cross-check, and USN journal access the teacher's reader never
//! exposed.

use ntfs_core::{AbortSignal, BlockSource, DiagnosticSink, Error, FileReference, LogSink};

use crate::boot_sector::{parse_boot_sector, VolumeParameters};
use crate::constants::{
    ATTR_TYPE_DATA, ATTR_TYPE_VOLUME_NAME, DEFAULT_INDEX_NODE_CACHE_CAPACITY,
    DEFAULT_MFT_CACHE_CAPACITY, MAX_ATTRIBUTE_LIST_CHAIN, MAX_INDEX_DEPTH, MAX_PATH_DEPTH,
    MFT_RECORD_BITMAP, MFT_RECORD_EXTEND, MFT_RECORD_MFTMIRR, MFT_RECORD_ROOT, MFT_RECORD_SECURE,
    MFT_RECORD_VOLUME,
};
use crate::file_entry::FileEntry;
use crate::mft::{parse_mft_entry, Mft, MftEntry};
use crate::security::SecurityDescriptorResolver;
use crate::strings::read_utf16le;
use crate::usn::UsnJournal;

static DEFAULT_DIAGNOSTICS: LogSink = LogSink;

/// Construction-time limits a caller can tune away from the engine's
/// defaults; every field maps directly onto a lower layer's recursion or
/// cache-capacity parameter (spec.md §1/§5).
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    /// Byte offset of the volume within the underlying image. Exposed as
    /// metadata only - applying it to every read is the caller's
    /// responsibility, since the `BlockSource` it hands this engine is
    /// defined to already read relative to the volume (spec.md §6).
    pub volume_offset: u64,
    pub mft_cache_capacity: usize,
    pub index_node_cache_capacity: usize,
    pub attribute_list_chain_limit: usize,
    pub index_recursion_limit: usize,
    pub path_walk_depth_limit: usize,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            volume_offset: 0,
            mft_cache_capacity: DEFAULT_MFT_CACHE_CAPACITY,
            index_node_cache_capacity: DEFAULT_INDEX_NODE_CACHE_CAPACITY,
            attribute_list_chain_limit: MAX_ATTRIBUTE_LIST_CHAIN,
            index_recursion_limit: MAX_INDEX_DEPTH,
            path_walk_depth_limit: MAX_PATH_DEPTH,
        }
    }
}

impl<'a> std::fmt::Debug for Volume<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("params", &self.params)
            .field("options", &self.options)
            .field("volume_name", &self.volume_name)
            .field("mft_mirror_validated", &self.mft_mirror_validated)
            .finish_non_exhaustive()
    }
}

/// An open NTFS volume: the facade every other public type in this crate
/// is reached through.
pub struct Volume<'a> {
    diagnostics: &'a dyn DiagnosticSink,
    abort: AbortSignal,
    params: VolumeParameters,
    mft: Mft<'a>,
    options: OpenOptions,
    bitmap: Vec<u8>,
    volume_name: Option<String>,
    mft_mirror_validated: bool,
}

/// Opens `source` with default options and a `log`-backed diagnostic
/// sink, for callers who don't need to tune limits or route diagnostics
/// anywhere in particular.
pub fn open_volume(source: &dyn BlockSource) -> Result<Volume<'_>, Error> {
    open_volume_with(source, &DEFAULT_DIAGNOSTICS, OpenOptions::default())
}

/// Opens `source` per spec.md §4.10's sequence: boot sector, MFT vector,
/// `$Bitmap`, then an opportunistic, non-fatal `$MFTMirr` cross-check.
/// `$Secure` and the root directory are resolved lazily on first use
/// rather than eagerly here, since every caller of this engine pays for
/// them through `security_descriptor`/`root_directory` regardless of
/// whether they're ever opened.
pub fn open_volume_with<'a>(
    source: &'a dyn BlockSource,
    diagnostics: &'a dyn DiagnosticSink,
    options: OpenOptions,
) -> Result<Volume<'a>, Error> {
    let abort = AbortSignal::new();

    let mut boot_sector_buf = vec![0u8; crate::boot_sector::BOOT_SECTOR_SIZE];
    let n = source.read_at(0, &mut boot_sector_buf)?;
    if n < boot_sector_buf.len() {
        return Err(Error::read_failed(
            "boot sector",
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"),
        ));
    }
    let params = parse_boot_sector(&boot_sector_buf)?;

    let mft = Mft::open_with_limits(
        source,
        diagnostics,
        params.mft_offset(),
        params.mft_record_size,
        params.bytes_per_cluster() as u64,
        options.mft_cache_capacity,
        options.attribute_list_chain_limit,
    )?;

    let bitmap = load_bitmap(&mft, diagnostics)?;
    let volume_name = load_volume_name(&mft)?;

    let mut volume = Volume {
        diagnostics,
        abort,
        params,
        mft,
        options,
        bitmap,
        volume_name,
        mft_mirror_validated: false,
    };
    volume.mft_mirror_validated = volume.check_mft_mirror().unwrap_or_else(|e| {
        diagnostics.warn("volume", &format!("$MFTMirr cross-check failed: {e}"));
        false
    });

    Ok(volume)
}

fn load_bitmap(mft: &Mft<'_>, diagnostics: &dyn DiagnosticSink) -> Result<Vec<u8>, Error> {
    let entry = mft.entry_by_index(MFT_RECORD_BITMAP)?;
    let attributes = mft.resolve_attributes(&entry)?;
    let attr = attributes
        .iter()
        .find(|a| a.header.type_code == ATTR_TYPE_DATA && !a.header.is_named())
        .ok_or_else(|| Error::InvalidData("$Bitmap has no unnamed $DATA attribute".into()))?;
    let stream = mft.open_stream(attr)?;
    let mut buf = vec![0u8; stream.logical_size() as usize];
    stream.read_at(0, &mut buf)?;
    diagnostics.debug("volume", &format!("loaded {} bytes of cluster bitmap", buf.len()));
    Ok(buf)
}

fn load_volume_name(mft: &Mft<'_>) -> Result<Option<String>, Error> {
    let entry = mft.entry_by_index(MFT_RECORD_VOLUME)?;
    let attributes = mft.resolve_attributes(&entry)?;
    match attributes.iter().find(|a| a.header.type_code == ATTR_TYPE_VOLUME_NAME) {
        Some(attr) => {
            let data = attr
                .resident_data()
                .ok_or_else(|| Error::InvalidData("$VOLUME_NAME must be resident".into()))?;
            if data.is_empty() {
                Ok(None)
            } else {
                Ok(Some(read_utf16le(data)?))
            }
        }
        None => Ok(None),
    }
}

impl<'a> Volume<'a> {
    pub fn cluster_size(&self) -> u32 {
        self.params.bytes_per_cluster()
    }

    pub fn mft_entry_size(&self) -> u32 {
        self.params.mft_record_size
    }

    pub fn index_record_size(&self) -> u32 {
        self.params.index_record_size
    }

    pub fn serial_number(&self) -> u64 {
        self.params.volume_serial
    }

    pub fn utf8_name(&self) -> Option<&str> {
        self.volume_name.as_deref()
    }

    pub fn number_of_file_entries(&self) -> u64 {
        self.mft.entry_count()
    }

    /// `true` when `$MFTMirr`'s leading records matched the primary MFT
    /// at open time - a diagnostic signal, not something callers should
    /// gate correctness on (spec.md §4.10: non-fatal by design).
    pub fn mft_mirror_validated(&self) -> bool {
        self.mft_mirror_validated
    }

    pub fn is_cluster_allocated(&self, lcn: u64) -> bool {
        let byte = (lcn / 8) as usize;
        let bit = (lcn % 8) as u8;
        match self.bitmap.get(byte) {
            Some(b) => b & (1 << bit) != 0,
            None => false,
        }
    }

    /// Free cluster count derived from `$Bitmap`, assuming (as every real
    /// volume guarantees) that padding bits beyond the volume's actual
    /// cluster count are zero.
    pub fn free_cluster_count(&self) -> u64 {
        let allocated: u64 = self.bitmap.iter().map(|b| b.count_ones() as u64).sum();
        self.params.cluster_count().saturating_sub(allocated)
    }

    pub fn signal_abort(&self) {
        self.abort.signal();
    }

    fn mft_entry(&self, index: u64) -> Result<std::sync::Arc<MftEntry>, Error> {
        self.abort.check()?;
        self.mft.entry_by_index(index)
    }

    fn file_entry_from(&'a self, entry: std::sync::Arc<MftEntry>) -> Result<FileEntry<'a>, Error> {
        FileEntry::open_with_limits(
            &self.mft,
            self.diagnostics,
            entry,
            self.options.index_node_cache_capacity,
            self.options.index_recursion_limit,
        )
    }

    pub fn file_entry_by_index(&'a self, index: u64) -> Result<Option<FileEntry<'a>>, Error> {
        if index >= self.mft.entry_count() {
            return Ok(None);
        }
        match self.mft_entry(index) {
            Ok(entry) if entry.header.is_in_use() => Ok(Some(self.file_entry_from(entry)?)),
            Ok(_) => Ok(None),
            Err(e) if e.is_recoverable_input_error() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn file_entry_by_reference(&'a self, reference: FileReference) -> Result<Option<FileEntry<'a>>, Error> {
        self.abort.check()?;
        match self.mft.entry_by_reference(reference) {
            Ok(entry) => Ok(Some(self.file_entry_from(entry)?)),
            Err(e) if e.is_recoverable_input_error() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn root_directory(&'a self) -> Result<FileEntry<'a>, Error> {
        let entry = self.mft_entry(MFT_RECORD_ROOT)?;
        self.file_entry_from(entry)
    }

    /// Walks `path` (`\`-separated, as Windows paths are written) from
    /// the root directory, returning `None` as soon as a segment has no
    /// matching child.
    pub fn file_entry_by_path_utf8(&'a self, path: &str) -> Result<Option<FileEntry<'a>>, Error> {
        let segments: Vec<&str> = path.split('\\').filter(|s| !s.is_empty()).collect();
        if segments.len() > self.options.path_walk_depth_limit {
            return Err(Error::RuntimeOutOfBounds(format!(
                "path has {} segments, exceeding the {} limit",
                segments.len(),
                self.options.path_walk_depth_limit
            )));
        }

        let mut current = self.root_directory()?;
        for segment in segments {
            self.abort.check()?;
            let child = match current.child_by_name(segment)? {
                Some(c) => c,
                None => return Ok(None),
            };
            current = match self.file_entry_by_reference(child.file_reference)? {
                Some(f) => f,
                None => return Ok(None),
            };
        }
        Ok(Some(current))
    }

    /// Resolves `security_id` (as read from a `$STANDARD_INFORMATION`)
    /// to its raw `SECURITY_DESCRIPTOR_RELATIVE` bytes via `$Secure`,
    /// building the resolver fresh each call rather than caching it -
    /// `SecurityDescriptorResolver<'a>` borrows `&'a Mft<'a>`, which this
    /// struct can hand out per-call but can't itself store alongside
    /// `mft: Mft<'a>` as a field.
    pub fn security_descriptor(&'a self, security_id: u32) -> Result<Option<Vec<u8>>, Error> {
        let secure_entry = self.mft_entry(MFT_RECORD_SECURE)?;
        let resolver = SecurityDescriptorResolver::open_with_limits(
            &self.mft,
            &secure_entry,
            self.diagnostics,
            self.options.index_node_cache_capacity,
            self.options.index_recursion_limit,
        )?;
        resolver.resolve(security_id)
    }

    /// Opens `\$Extend\$UsnJrnl:$J`, or `None` if the volume has no USN
    /// change journal (not every NTFS volume enables one).
    pub fn usn_change_journal(&'a self) -> Result<Option<UsnJournal<'a>>, Error> {
        let extend_entry = match self.mft_entry(MFT_RECORD_EXTEND) {
            Ok(e) => e,
            Err(e) if e.is_recoverable_input_error() => return Ok(None),
            Err(e) => return Err(e),
        };
        let extend = self.file_entry_from(extend_entry)?;

        let usn_jrnl_child = match extend.child_by_name("$UsnJrnl")? {
            Some(c) => c,
            None => return Ok(None),
        };
        let usn_jrnl = match self.file_entry_by_reference(usn_jrnl_child.file_reference)? {
            Some(f) => f,
            None => return Ok(None),
        };

        match usn_jrnl.open_alternate_data_stream_by_name("$J") {
            Ok(stream) => Ok(Some(UsnJournal::new(stream))),
            Err(e) if e.is_recoverable_input_error() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reads `$MFTMirr`'s first few records directly (bypassing the MFT
    /// vector, since these are backup copies rather than live vector
    /// entries) and compares sequence numbers and flags against the live
    /// primary records. Never fatal: any mismatch or parse failure just
    /// means the caller gets `false` back from `mft_mirror_validated`.
    fn check_mft_mirror(&self) -> Result<bool, Error> {
        let mirror_entry = self.mft.entry_by_index(MFT_RECORD_MFTMIRR)?;
        let attributes = self.mft.resolve_attributes(&mirror_entry)?;
        let mirror_attr = attributes
            .iter()
            .find(|a| a.header.type_code == ATTR_TYPE_DATA && !a.header.is_named())
            .ok_or_else(|| Error::InvalidData("$MFTMirr has no unnamed $DATA attribute".into()))?;
        let mirror_stream = self.mft.open_stream(mirror_attr)?;

        let record_size = self.mft.record_size() as usize;
        let mirror_records = (mirror_stream.logical_size() as usize / record_size).min(4);

        for i in 0..mirror_records {
            let mut raw = vec![0u8; record_size];
            let n = mirror_stream.read_at(i as u64 * record_size as u64, &mut raw)?;
            if n < record_size {
                return Ok(false);
            }
            let mirrored = parse_mft_entry(i as u64, &mut raw)?;
            let primary = self.mft.entry_by_index(i as u64)?;
            if mirrored.header.sequence_number != primary.header.sequence_number
                || mirrored.header.flags != primary.header.flags
            {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
