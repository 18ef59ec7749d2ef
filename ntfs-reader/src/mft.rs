//! §4.2/§4.3 MFT entry parsing and the MFT vector (L7). Grounded on the
//! teacher's `formatters/src/ntfs/mft.rs` (`MftRecord`, `MftReader`,
//! attribute-offset walking, fixup-then-parse ordering), reworked around
//! this engine's `ClusterStream`/`Attribute` types and extended with the
//! `$ATTRIBUTE_LIST` resolution the teacher's reader never implemented
//! (it only stubbed `get_attribute_list_entries` and never called it).

use std::sync::Arc;
use std::sync::Mutex;

use byteorder::{ByteOrder, LittleEndian};
use ntfs_core::{BlockSource, DiagnosticSink, Error, FileReference};

use crate::attribute::{self, Attribute, AttributeBody};
use crate::attribute_list::{self, AttributeListEntry};
use crate::cache::LruCache;
use crate::cluster_stream::ClusterStream;
use crate::compression::{resolve_decompressor, Decompressor};
use crate::constants::{
    ATTR_TYPE_ATTRIBUTE_LIST, ATTR_TYPE_DATA, MAX_ATTRIBUTE_LIST_CHAIN, MFT_RECORD_BAD_SIGNATURE,
    MFT_RECORD_IN_USE, MFT_RECORD_IS_DIRECTORY, MFT_RECORD_MFT, MFT_RECORD_SIGNATURE,
};
use crate::data_runs::Extent;
use crate::fixup::apply_fixup;

#[derive(Debug, Clone, Copy)]
pub struct MftEntryHeader {
    pub sequence_number: u16,
    pub hard_link_count: u16,
    pub base_record: FileReference,
    pub flags: u16,
    pub used_size: u32,
    pub allocated_size: u32,
    pub next_attribute_id: u16,
}

impl MftEntryHeader {
    pub fn is_in_use(&self) -> bool {
        self.flags & MFT_RECORD_IN_USE != 0
    }

    pub fn is_directory(&self) -> bool {
        self.flags & MFT_RECORD_IS_DIRECTORY != 0
    }

    pub fn is_base_record(&self) -> bool {
        self.base_record.0 == 0
    }
}

#[derive(Debug, Clone)]
pub struct MftEntry {
    pub index: u64,
    pub header: MftEntryHeader,
    pub attributes: Vec<Attribute>,
    /// Set when attribute parsing stopped early because a record was
    /// truncated or malformed; attributes collected before the failure
    /// are still usable (spec's "keep already-parsed attributes" rule).
    pub corrupted: bool,
}

impl MftEntry {
    pub fn reference(&self) -> FileReference {
        FileReference::new(self.index, self.header.sequence_number)
    }

    pub fn attribute(&self, type_code: u32) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.header.type_code == type_code)
    }

    pub fn attributes_of(&self, type_code: u32) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(move |a| a.header.type_code == type_code)
    }
}

/// Parses one MFT record's raw bytes: applies the USA fixup, validates
/// the `FILE` signature, and walks attribute records until the end
/// sentinel, a used_size bound, or a parse failure.
pub fn parse_mft_entry(index: u64, raw: &mut [u8]) -> Result<MftEntry, Error> {
    if raw.len() < 48 {
        return Err(Error::InvalidData(format!(
            "MFT entry {index} buffer too small: {} bytes",
            raw.len()
        )));
    }

    if &raw[0..4] == MFT_RECORD_BAD_SIGNATURE.as_slice() {
        return Ok(MftEntry {
            index,
            header: MftEntryHeader {
                sequence_number: 0,
                hard_link_count: 0,
                base_record: FileReference(0),
                flags: 0,
                used_size: 0,
                allocated_size: 0,
                next_attribute_id: 0,
            },
            attributes: Vec::new(),
            corrupted: true,
        });
    }
    if &raw[0..4] != MFT_RECORD_SIGNATURE.as_slice() {
        return Err(Error::SignatureMismatch(format!(
            "MFT entry {index} has signature {:?}, expected FILE",
            &raw[0..4]
        )));
    }

    let usa_offset = LittleEndian::read_u16(&raw[4..6]);
    let usa_count = LittleEndian::read_u16(&raw[6..8]);
    apply_fixup(raw, usa_offset, usa_count)?;

    let sequence_number = LittleEndian::read_u16(&raw[16..18]);
    let hard_link_count = LittleEndian::read_u16(&raw[18..20]);
    let first_attribute_offset = LittleEndian::read_u16(&raw[20..22]) as usize;
    let flags = LittleEndian::read_u16(&raw[22..24]);
    let used_size = LittleEndian::read_u32(&raw[24..28]);
    let allocated_size = LittleEndian::read_u32(&raw[28..32]);
    let base_record = FileReference(LittleEndian::read_u64(&raw[32..40]));
    let next_attribute_id = LittleEndian::read_u16(&raw[40..42]);

    let header = MftEntryHeader {
        sequence_number,
        hard_link_count,
        base_record,
        flags,
        used_size,
        allocated_size,
        next_attribute_id,
    };

    let mut attributes = Vec::new();
    let mut offset = first_attribute_offset;
    let mut corrupted = false;

    loop {
        match attribute::parse_attribute(raw, offset) {
            Ok(Some((attr, next_offset))) => {
                offset = next_offset;
                attributes.push(attr);
            }
            Ok(None) => break,
            Err(_) => {
                corrupted = true;
                break;
            }
        }
    }

    Ok(MftEntry {
        index,
        header,
        attributes,
        corrupted,
    })
}

/// The MFT vector (L7): reads and caches entries, and resolves
/// `$ATTRIBUTE_LIST`-split attributes transparently.
pub struct Mft<'a> {
    source: &'a dyn BlockSource,
    diagnostics: &'a dyn DiagnosticSink,
    record_size: u32,
    bytes_per_cluster: u64,
    mft_extents: Vec<Extent>,
    entry_cache: Mutex<LruCache<u64, Arc<MftEntry>>>,
    attribute_list_chain_limit: usize,
}

impl<'a> Mft<'a> {
    /// Bootstraps the MFT: reads record 0 directly at `mft_offset` (no
    /// extent mapping exists yet, since record 0 describes its own
    /// extents), then switches to extent-mapped reads for everything
    /// else.
    pub fn open(
        source: &'a dyn BlockSource,
        diagnostics: &'a dyn DiagnosticSink,
        mft_offset: u64,
        record_size: u32,
        bytes_per_cluster: u64,
        entry_cache_capacity: usize,
    ) -> Result<Self, Error> {
        Self::open_with_limits(
            source,
            diagnostics,
            mft_offset,
            record_size,
            bytes_per_cluster,
            entry_cache_capacity,
            MAX_ATTRIBUTE_LIST_CHAIN,
        )
    }

    /// As [`Self::open`], but with an explicit attribute-list chain bound
    /// instead of `MAX_ATTRIBUTE_LIST_CHAIN` (wired from
    /// `OpenOptions::attribute_list_chain_limit`).
    pub fn open_with_limits(
        source: &'a dyn BlockSource,
        diagnostics: &'a dyn DiagnosticSink,
        mft_offset: u64,
        record_size: u32,
        bytes_per_cluster: u64,
        entry_cache_capacity: usize,
        attribute_list_chain_limit: usize,
    ) -> Result<Self, Error> {
        let mut raw = vec![0u8; record_size as usize];
        let n = source.read_at(mft_offset, &mut raw)?;
        if (n as u32) < record_size {
            return Err(Error::read_failed(
                "MFT record 0",
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"),
            ));
        }

        let record0 = parse_mft_entry(MFT_RECORD_MFT, &mut raw)?;
        let data_attr = record0.attribute(ATTR_TYPE_DATA).ok_or_else(|| {
            Error::InvalidData("MFT record 0 has no $DATA attribute".into())
        })?;
        let mft_extents = match &data_attr.body {
            AttributeBody::NonResident { extents, .. } => extents.clone(),
            AttributeBody::Resident { .. } => {
                return Err(Error::InvalidData(
                    "MFT $DATA attribute must not be resident".into(),
                ))
            }
        };

        let mft = Self {
            source,
            diagnostics,
            record_size,
            bytes_per_cluster,
            mft_extents,
            entry_cache: Mutex::new(LruCache::new(entry_cache_capacity)),
            attribute_list_chain_limit,
        };

        mft.entry_cache
            .lock()
            .unwrap()
            .insert(MFT_RECORD_MFT, Arc::new(record0));

        Ok(mft)
    }

    pub fn source(&self) -> &'a dyn BlockSource {
        self.source
    }

    pub fn diagnostics(&self) -> &'a dyn DiagnosticSink {
        self.diagnostics
    }

    pub fn bytes_per_cluster(&self) -> u64 {
        self.bytes_per_cluster
    }

    pub fn record_size(&self) -> u32 {
        self.record_size
    }

    /// Total number of MFT record slots, derived from the `$DATA`
    /// attribute's extent map rather than tracked separately.
    pub fn entry_count(&self) -> u64 {
        let total_bytes =
            self.mft_extents.iter().map(|e| e.length_clusters).sum::<u64>() * self.bytes_per_cluster;
        total_bytes / self.record_size as u64
    }

    fn data_stream(&self) -> Result<ClusterStream<'_>, Error> {
        let total_bytes =
            self.mft_extents.iter().map(|e| e.length_clusters).sum::<u64>() * self.bytes_per_cluster;
        let synthetic = Attribute {
            header: crate::attribute::AttributeHeader {
                type_code: ATTR_TYPE_DATA,
                attribute_id: 0,
                name: None,
                flags: 0,
            },
            body: AttributeBody::NonResident {
                first_vcn: 0,
                last_vcn: 0,
                allocated_size: total_bytes,
                data_size: total_bytes,
                initialized_size: 0,
                compression_unit_log2: 0,
                extents: self.mft_extents.clone(),
            },
        };
        ClusterStream::from_attribute(&synthetic, self.source, self.diagnostics, self.bytes_per_cluster, None)
    }

    /// Reads and parses the entry at `index`, without verifying its
    /// sequence number against any caller-supplied reference. Used both
    /// for direct lookups where the caller hasn't got a reference yet
    /// and, per this engine's design, for attribute-list extension
    /// records (spec's chokepoint carve-out: that walk never verifies).
    pub fn entry_by_index(&self, index: u64) -> Result<Arc<MftEntry>, Error> {
        if let Some(cached) = self.entry_cache.lock().unwrap().get(&index) {
            return Ok(cached.clone());
        }

        let offset = index * self.record_size as u64;
        let mut raw = vec![0u8; self.record_size as usize];
        let stream = self.data_stream()?;
        let n = stream.read_at(offset, &mut raw)?;
        if (n as u32) < self.record_size {
            return Err(Error::read_failed(
                format!("MFT entry {index}"),
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read"),
            ));
        }

        let entry = Arc::new(parse_mft_entry(index, &mut raw)?);
        self.entry_cache.lock().unwrap().insert(index, entry.clone());
        Ok(entry)
    }

    /// The single chokepoint for reference-validated entry access (spec's
    /// Open Question 3): verifies `reference.sequence_number()` matches
    /// the on-disk entry before returning it.
    pub fn entry_by_reference(&self, reference: FileReference) -> Result<Arc<MftEntry>, Error> {
        let entry = self.entry_by_index(reference.entry_index())?;
        if entry.header.sequence_number != reference.sequence_number() {
            return Err(Error::ValueMismatch(format!(
                "MFT entry {} sequence number {} does not match reference {}",
                reference.entry_index(),
                entry.header.sequence_number,
                reference.sequence_number()
            )));
        }
        Ok(entry)
    }

    /// Returns every attribute logically belonging to `entry`, resolving
    /// `$ATTRIBUTE_LIST` extension records and merging a non-resident
    /// attribute's extents back into stream order when it was split
    /// across multiple physical records.
    pub fn resolve_attributes(&self, entry: &MftEntry) -> Result<Vec<Attribute>, Error> {
        let list_attr = match entry.attribute(ATTR_TYPE_ATTRIBUTE_LIST) {
            Some(a) => a,
            None => return Ok(entry.attributes.clone()),
        };

        let list_bytes = self.attribute_bytes(list_attr)?;
        let mut list_entries = attribute_list::parse_attribute_list(&list_bytes)?;
        if list_entries.len() > self.attribute_list_chain_limit {
            return Err(Error::RuntimeOutOfBounds(format!(
                "entry {} has {} attribute list entries, exceeding the {} limit",
                entry.index,
                list_entries.len(),
                self.attribute_list_chain_limit
            )));
        }
        list_entries.sort_by_key(|e| e.starting_vcn);

        let mut resolved: Vec<Attribute> = Vec::new();
        for list_entry in &list_entries {
            if let Some(attr) = self.load_listed_attribute(entry, list_entry)? {
                merge_attribute(&mut resolved, attr);
            } else {
                self.diagnostics.warn(
                    "mft",
                    &format!(
                        "entry {}: attribute list entry for type {:#x} in record {} not found",
                        entry.index,
                        list_entry.type_code,
                        list_entry.base_record.entry_index()
                    ),
                );
            }
        }

        Ok(resolved)
    }

    fn load_listed_attribute(
        &self,
        owning_entry: &MftEntry,
        list_entry: &AttributeListEntry,
    ) -> Result<Option<Attribute>, Error> {
        let record = if list_entry.base_record.entry_index() == owning_entry.index {
            None
        } else {
            Some(self.entry_by_index(list_entry.base_record.entry_index())?)
        };
        let attrs = record.as_deref().unwrap_or(owning_entry);

        Ok(attrs
            .attributes
            .iter()
            .find(|a| {
                a.header.type_code == list_entry.type_code
                    && a.header.attribute_id == list_entry.attribute_id
            })
            .cloned())
    }

    /// Reads an attribute's full value bytes regardless of residency,
    /// without needing a cluster size context beyond what `self` already
    /// carries - used for `$ATTRIBUTE_LIST` itself, which is never
    /// compressed.
    fn attribute_bytes(&self, attr: &Attribute) -> Result<Vec<u8>, Error> {
        match &attr.body {
            AttributeBody::Resident { data } => Ok(data.clone()),
            AttributeBody::NonResident { .. } => {
                let stream = ClusterStream::from_attribute(
                    attr,
                    self.source,
                    self.diagnostics,
                    self.bytes_per_cluster,
                    None,
                )?;
                let mut buf = vec![0u8; stream.logical_size() as usize];
                stream.read_at(0, &mut buf)?;
                Ok(buf)
            }
        }
    }

    /// Opens a data stream for `attr`, wiring up the LZNT1 decompressor
    /// when the attribute carries NTFS's own compression flag.
    pub fn open_stream<'s>(&'s self, attr: &Attribute) -> Result<ClusterStream<'s>, Error> {
        let decompressor: Option<Box<dyn Decompressor>> = if attr.is_compressed() {
            Some(resolve_decompressor(crate::compression::CompressionAlgorithm::Lznt1)?)
        } else {
            None
        };
        ClusterStream::from_attribute(
            attr,
            self.source,
            self.diagnostics,
            self.bytes_per_cluster,
            decompressor,
        )
    }
}

/// Folds one physically-resolved attribute into `resolved`, concatenating
/// extents when a same-named non-resident attribute already has an entry
/// (the split-across-extension-records case).
fn merge_attribute(resolved: &mut Vec<Attribute>, attr: Attribute) {
    let key = (attr.header.type_code, attr.header.name.clone());
    if let Some(existing) = resolved.iter_mut().find(|a| {
        (a.header.type_code, a.header.name.clone()) == key
    }) {
        if let (
            AttributeBody::NonResident { extents: existing_extents, .. },
            AttributeBody::NonResident { extents: new_extents, first_vcn, .. },
        ) = (&mut existing.body, &attr.body)
        {
            if *first_vcn != 0 {
                existing_extents.extend(new_extents.clone());
            }
        }
        return;
    }
    resolved.push(attr);
}
