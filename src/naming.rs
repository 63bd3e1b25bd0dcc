//! Identifier and filename conventions shared by every stage.
//!
//! Catalogs are identified by a canonical UUID-v4 string. The same id shows up
//! in three places and must agree everywhere:
//!
//! - the archive file name: `3f2b…-….zip`
//! - the single root directory inside the archive
//! - the staging directory the archive is extracted into
//!
//! ## UUID-v4 Textual Form
//!
//! `xxxxxxxx-xxxx-4xxx-Vxxx-xxxxxxxxxxxx`, hex digits in either case, where the
//! version nibble is fixed to `4` and the variant nibble `V` is one of
//! `8`, `9`, `a`, `b`. Braced, URN and unhyphenated forms are rejected.

/// Extension that marks a file as a catalog archive.
pub const ARCHIVE_EXTENSION: &str = "zip";

const GROUP_LENGTHS: [usize; 5] = [8, 4, 4, 4, 12];

/// Check that `s` is a canonical, hyphenated UUID-v4 (case-insensitive).
///
/// - `"0f8fad5b-d9cb-469f-a165-70867728950e"` → true
/// - `"0F8FAD5B-D9CB-469F-A165-70867728950E"` → true
/// - `"0f8fad5b-d9cb-169f-a165-70867728950e"` → false (version 1)
/// - `"0f8fad5b-d9cb-469f-c165-70867728950e"` → false (variant `c`)
/// - `"{0f8fad5b-d9cb-469f-a165-70867728950e}"` → false
pub fn is_uuid_v4(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    if groups.len() != GROUP_LENGTHS.len() {
        return false;
    }
    let shape_ok = groups
        .iter()
        .zip(GROUP_LENGTHS)
        .all(|(g, len)| g.len() == len && g.bytes().all(|b| b.is_ascii_hexdigit()));
    if !shape_ok {
        return false;
    }
    let version = groups[2].as_bytes()[0];
    let variant = groups[3].as_bytes()[0].to_ascii_lowercase();
    version == b'4' && matches!(variant, b'8' | b'9' | b'a' | b'b')
}

/// Extract the catalog id from an archive file name like `<uuid>.zip`.
///
/// Returns `None` when the extension is not `.zip` (case-insensitive) or the
/// stem is not a UUID-v4.
pub fn catalog_id_from_archive_name(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION) {
        return None;
    }
    is_uuid_v4(stem).then_some(stem)
}

/// Two catalog ids name the same catalog when they match ignoring case.
pub fn same_catalog_id(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
