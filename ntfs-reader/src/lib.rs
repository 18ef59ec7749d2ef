//! Read-only NTFS volume, MFT, and directory engine built on top of the
//! domain-agnostic plumbing in `ntfs-core`.

pub mod attribute;
pub mod attribute_list;
pub mod attribute_values;
pub mod boot_sector;
pub mod cache;
pub mod cluster_stream;
pub mod collation;
pub mod compression;
pub mod constants;
pub mod data_runs;
pub mod directory;
pub mod file_entry;
pub mod fixup;
pub mod index;
pub mod mft;
pub mod reparse;
pub mod security;
pub mod strings;
pub mod timestamps;
pub mod usn;
pub mod volume;

pub use attribute::{Attribute, AttributeBody, AttributeHeader};
pub use attribute_list::AttributeListEntry;
pub use attribute_values::{FileNameValues, FileNamespace, StandardInformation};
pub use boot_sector::VolumeParameters;
pub use cluster_stream::{ClusterStream, Stream};
pub use compression::{CompressionAlgorithm, Decompressor};
pub use data_runs::Extent;
pub use directory::{list_directory, DirectoryEntry};
pub use file_entry::FileEntry;
pub use index::{IndexEngine, RawIndexEntry};
pub use mft::{Mft, MftEntry, MftEntryHeader};
pub use reparse::{parse_reparse_point, ReparsePayload, ReparsePoint};
pub use security::SecurityDescriptorResolver;
pub use usn::{UsnJournal, UsnRecord};
pub use volume::{open_volume, open_volume_with, OpenOptions, Volume};
