//! §4.11 Per-MFT-record file entry facade (L11). Grounded on the
//! teacher's `filesystems/src/families/ntfs/ntfs/mod.rs::NtfsEntry`
//! (name selection, timestamp fallback), extended with alternate data
//! stream selection, reparse payload access, WofCompressedData pairing,
//! the security descriptor lookup and `$OBJECT_ID` exposure this engine's
//! spec added beyond what the teacher ever surfaced.

use ntfs_core::{DiagnosticSink, Error, FileReference};

use crate::attribute::{Attribute, AttributeBody};
use crate::attribute_values::{parse_file_name, parse_standard_information, FileNameValues, FileNamespace, StandardInformation};
use crate::cluster_stream::{ClusterStream, Stream};
use crate::collation::names_equal;
use crate::compression::resolve_decompressor;
use crate::constants::{
    ATTR_TYPE_DATA, ATTR_TYPE_FILE_NAME, ATTR_TYPE_OBJECT_ID, ATTR_TYPE_REPARSE_POINT,
    ATTR_TYPE_STANDARD_INFORMATION,
};
use crate::directory::{directory_case_sensitivity, DirectoryEntry};
use crate::mft::{Mft, MftEntry};
use crate::reparse::{parse_reparse_point, ReparsePayload, ReparsePoint};

pub const WOF_COMPRESSED_DATA_STREAM_NAME: &str = "WofCompressedData";

/// A facade over one MFT record: the timestamps, name, children, and
/// data streams a caller actually wants, instead of the raw attribute
/// list.
pub struct FileEntry<'a> {
    mft: &'a Mft<'a>,
    diagnostics: &'a dyn DiagnosticSink,
    entry: std::sync::Arc<MftEntry>,
    attributes: Vec<Attribute>,
    index_node_cache_capacity: usize,
    index_recursion_limit: usize,
}

impl<'a> FileEntry<'a> {
    pub fn open(mft: &'a Mft<'a>, diagnostics: &'a dyn DiagnosticSink, entry: std::sync::Arc<MftEntry>) -> Result<Self, Error> {
        Self::open_with_limits(
            mft,
            diagnostics,
            entry,
            crate::constants::DEFAULT_INDEX_NODE_CACHE_CAPACITY,
            crate::constants::MAX_INDEX_DEPTH,
        )
    }

    /// As [`Self::open`], but with the index-node cache capacity and
    /// recursion bound a `Volume` resolved from its `OpenOptions`.
    pub fn open_with_limits(
        mft: &'a Mft<'a>,
        diagnostics: &'a dyn DiagnosticSink,
        entry: std::sync::Arc<MftEntry>,
        index_node_cache_capacity: usize,
        index_recursion_limit: usize,
    ) -> Result<Self, Error> {
        let attributes = mft.resolve_attributes(&entry)?;
        Ok(Self {
            mft,
            diagnostics,
            entry,
            attributes,
            index_node_cache_capacity,
            index_recursion_limit,
        })
    }

    pub fn file_reference(&self) -> FileReference {
        self.entry.reference()
    }

    pub fn is_directory(&self) -> bool {
        self.entry.header.is_directory()
    }

    pub fn flags(&self) -> u16 {
        self.entry.header.flags
    }

    fn attribute(&self, type_code: u32) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.header.type_code == type_code)
    }

    fn attributes_of(&self, type_code: u32) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(move |a| a.header.type_code == type_code)
    }

    fn file_names(&self) -> Result<Vec<FileNameValues>, Error> {
        self.attributes_of(ATTR_TYPE_FILE_NAME)
            .map(|a| {
                let data = a
                    .resident_data()
                    .ok_or_else(|| Error::InvalidData("$FILE_NAME must be resident".into()))?;
                parse_file_name(data)
            })
            .collect()
    }

    /// Long name: WIN32 namespace preferred, else POSIX, else DOS.
    pub fn name(&self) -> Result<Option<String>, Error> {
        let names = self.file_names()?;
        let preferred = names
            .iter()
            .find(|n| n.namespace == FileNamespace::Win32 || n.namespace == FileNamespace::Win32AndDos)
            .or_else(|| names.iter().find(|n| n.namespace == FileNamespace::Posix))
            .or_else(|| names.iter().find(|n| n.namespace == FileNamespace::Dos));
        Ok(preferred.map(|n| n.name.clone()))
    }

    pub fn parent_file_reference(&self) -> Result<Option<FileReference>, Error> {
        Ok(self.file_names()?.first().map(|n| n.parent_directory))
    }

    /// $STANDARD_INFORMATION, falling back to the first $FILE_NAME's
    /// timestamps when absent (per §4.11).
    pub fn standard_information(&self) -> Result<Option<StandardInformation>, Error> {
        match self.attribute(ATTR_TYPE_STANDARD_INFORMATION) {
            Some(attr) => {
                let data = attr
                    .resident_data()
                    .ok_or_else(|| Error::InvalidData("$STANDARD_INFORMATION must be resident".into()))?;
                Ok(Some(parse_standard_information(data)?))
            }
            None => Ok(None),
        }
    }

    pub fn created(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>, Error> {
        if let Some(info) = self.standard_information()? {
            return Ok(info.created);
        }
        Ok(self.file_names()?.first().and_then(|n| n.created))
    }

    pub fn modified(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>, Error> {
        if let Some(info) = self.standard_information()? {
            return Ok(info.modified);
        }
        Ok(self.file_names()?.first().and_then(|n| n.modified))
    }

    pub fn accessed(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>, Error> {
        if let Some(info) = self.standard_information()? {
            return Ok(info.accessed);
        }
        Ok(self.file_names()?.first().and_then(|n| n.accessed))
    }

    /// Logical size of the unnamed `$DATA` stream, or 0 for directories
    /// and entries with no `$DATA` attribute.
    pub fn size(&self) -> u64 {
        self.attributes_of(ATTR_TYPE_DATA)
            .find(|a| !a.header.is_named())
            .map(|a| a.logical_size())
            .unwrap_or(0)
    }

    pub fn children(&self) -> Result<Vec<DirectoryEntry>, Error> {
        crate::directory::list_directory_with_limits(
            self.mft,
            &self.entry,
            self.diagnostics,
            self.index_node_cache_capacity,
            self.index_recursion_limit,
        )
    }

    /// Looks up a child by name, honoring this directory's own
    /// `$STANDARD_INFORMATION.is_case_sensitive` flag (spec.md §4.9/§4.10)
    /// via the same collation the `$I30` index itself uses, rather than
    /// an ASCII-only fold.
    pub fn child_by_name(&self, name: &str) -> Result<Option<DirectoryEntry>, Error> {
        let case_sensitive = directory_case_sensitivity(&self.attributes);
        Ok(self
            .children()?
            .into_iter()
            .find(|c| names_equal(&c.name, name, case_sensitive)))
    }

    pub fn reparse_point(&self) -> Result<Option<ReparsePoint>, Error> {
        match self.attribute(ATTR_TYPE_REPARSE_POINT) {
            Some(attr) => {
                let data = attr
                    .resident_data()
                    .ok_or_else(|| Error::InvalidData("$REPARSE_POINT must be resident".into()))?;
                Ok(Some(parse_reparse_point(data)?))
            }
            None => Ok(None),
        }
    }

    pub fn object_id(&self) -> Option<[u8; 16]> {
        let attr = self.attribute(ATTR_TYPE_OBJECT_ID)?;
        let data = attr.resident_data()?;
        if data.len() < 16 {
            return None;
        }
        let mut id = [0u8; 16];
        id.copy_from_slice(&data[0..16]);
        Some(id)
    }

    /// Opens the unnamed `$DATA` stream, transparently decompressing a
    /// WofCompressedData-paired stream when the reparse point names it.
    pub fn open_data_stream(&self) -> Result<Stream<'a>, Error> {
        if let Some(ReparsePoint { payload: ReparsePayload::WofCompressed { algorithm, .. }, .. }) =
            self.reparse_point()?
        {
            if let Some(wof_attr) = self.attributes_of(ATTR_TYPE_DATA).find(|a| a.header.name.as_deref() == Some(WOF_COMPRESSED_DATA_STREAM_NAME))
            {
                let uncompressed_size = self
                    .attributes_of(ATTR_TYPE_DATA)
                    .find(|a| !a.header.is_named())
                    .map(|a| a.logical_size())
                    .unwrap_or(0);
                return self.open_wof_stream(wof_attr, algorithm, uncompressed_size);
            }
        }

        let attr = self
            .attributes_of(ATTR_TYPE_DATA)
            .find(|a| !a.header.is_named())
            .ok_or_else(|| Error::InvalidData(format!("entry {} has no unnamed $DATA attribute", self.entry.index)))?;
        Ok(Stream::new(self.mft.open_stream(attr)?))
    }

    pub fn open_alternate_data_stream_by_name(&self, name: &str) -> Result<Stream<'a>, Error> {
        let attr = self
            .attributes_of(ATTR_TYPE_DATA)
            .find(|a| a.header.name.as_deref() == Some(name))
            .ok_or_else(|| Error::InvalidData(format!("entry {} has no $DATA:{name} stream", self.entry.index)))?;
        Ok(Stream::new(self.mft.open_stream(attr)?))
    }

    pub fn alternate_data_stream_names(&self) -> Vec<String> {
        self.attributes_of(ATTR_TYPE_DATA)
            .filter_map(|a| a.header.name.clone())
            .filter(|n| n != WOF_COMPRESSED_DATA_STREAM_NAME)
            .collect()
    }

    fn open_wof_stream(
        &self,
        wof_attr: &Attribute,
        algorithm: crate::compression::CompressionAlgorithm,
        uncompressed_size: u64,
    ) -> Result<Stream<'a>, Error> {
        let decompressor = resolve_decompressor(algorithm)?;
        match &wof_attr.body {
            AttributeBody::Resident { .. } => {
                let stream = self.mft.open_stream(wof_attr)?;
                Ok(Stream::new(stream))
            }
            AttributeBody::NonResident { .. } => {
                self.diagnostics.debug(
                    "file_entry",
                    &format!(
                        "entry {}: decoding WofCompressedData stream ({uncompressed_size} bytes uncompressed)",
                        self.entry.index
                    ),
                );
                // WofCompressedData streams are stored with NTFS's own
                // compression flag unset; the WOF payload is one opaque
                // compressed blob, not a chunked NTFS compression unit
                // stream, so it is decoded whole rather than through
                // ClusterStream's per-unit machinery.
                let mut raw = Vec::new();
                let tmp = ClusterStream::from_attribute(wof_attr, self.mft.source(), self.diagnostics, self.mft.bytes_per_cluster(), None)?;
                raw.resize(tmp.logical_size() as usize, 0);
                tmp.read_at(0, &mut raw)?;
                let plain = decompressor.decompress(&raw, uncompressed_size as usize)?;
                Ok(Stream::new(ClusterStream::from_bytes(plain, self.mft.source(), self.diagnostics)))
            }
        }
    }
}
