//! Index key ordering (used by the B+-tree engine in `index.rs`).
//! Grounded on the teacher's index entry layout in
//! `filesystems/src/families/ntfs/ntfs/index.rs`, which parsed `$FILE_NAME`
//! keys but never actually compared them (it only ever scanned one level
//! of a node) - the collation logic itself is new, informed by how NTFS's
//! `COLLATION_FILENAME`/`COLLATION_ULONG` rules are described in
//! `examples/original_source/libfsntfs`.

use std::cmp::Ordering;

use crate::attribute_values::parse_file_name;

pub trait Collation {
    fn compare(&self, key: &[u8], needle: &[u8]) -> Ordering;
}

/// Upcases `name` the way `FileNameCollation`'s case-insensitive branch
/// does, so lookups outside the index engine (e.g. `FileEntry::child_by_name`)
/// can fold names the same way the on-disk key comparison would.
///
/// This upcases via `char::to_uppercase`, which does not reproduce
/// Windows' NLS upcase table exactly for every codepoint; see DESIGN.md.
pub fn fold_name(name: &str) -> String {
    name.chars().flat_map(char::to_uppercase).collect()
}

/// Compares two already-decoded `$FILE_NAME` names the way a directory's
/// `$I30` index would, honoring the owning directory's
/// `$STANDARD_INFORMATION.is_case_sensitive` flag (spec.md §4.9): Unicode
/// case-fold when the flag is clear, exact UTF-16 code-unit (here: `char`)
/// comparison when it is set.
pub fn names_equal(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        fold_name(a) == fold_name(b)
    }
}

/// `$I30`/filename collation: by default case-insensitive primary
/// comparison, falling back to an exact comparison to break ties between
/// names that differ only by case (both can coexist in POSIX namespace
/// entries); a case-sensitive directory (`$STANDARD_INFORMATION.is_case_sensitive`
/// set) skips the fold and compares names exactly.
pub struct FileNameCollation {
    pub case_sensitive: bool,
}

impl FileNameCollation {
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }
}

impl Collation for FileNameCollation {
    fn compare(&self, key: &[u8], needle: &[u8]) -> Ordering {
        let key_name = parse_file_name(key).map(|v| v.name);
        let needle_name = parse_file_name(needle).map(|v| v.name);
        match (key_name, needle_name) {
            (Ok(a), Ok(b)) => {
                if self.case_sensitive {
                    a.cmp(&b)
                } else {
                    match fold_name(&a).cmp(&fold_name(&b)) {
                        Ordering::Equal => a.cmp(&b),
                        other => other,
                    }
                }
            }
            _ => key.cmp(needle),
        }
    }
}

/// `$SII`/`$Q` style collation: compare the leading little-endian `u32`.
pub struct Ulong32Collation;

impl Collation for Ulong32Collation {
    fn compare(&self, key: &[u8], needle: &[u8]) -> Ordering {
        let a = key.get(0..4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        let b = needle.get(0..4).map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]));
        a.cmp(&b)
    }
}

/// `$O` style collation: 16-byte raw key (object id GUID), compared
/// byte-for-byte.
pub struct RawBytesCollation;

impl Collation for RawBytesCollation {
    fn compare(&self, key: &[u8], needle: &[u8]) -> Ordering {
        key.cmp(needle)
    }
}
