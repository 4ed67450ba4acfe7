//! The `_LOD` naming convention.
//!
//! Identity in a LOD chain is carried entirely by object names: variants are
//! `<base>_LOD<index>` and group anchors are `<base>_LOD_GROUP`. There is no
//! typed marker anywhere, so these helpers are the single source of truth
//! for both producing and recognizing chain members.

/// Token separating a base asset name from its LOD suffix.
pub const LOD_TOKEN: &str = "_LOD";
/// Suffix identifying group anchor objects.
pub const GROUP_SUFFIX: &str = "_LOD_GROUP";

/// Extracts the base asset name by truncating at the first `_LOD` occurrence.
///
/// Truncating at the first occurrence keeps re-runs idempotent (`Rock_LOD0`
/// maps back to `Rock`, never to `Rock_LOD0_LOD0`), at the cost of also
/// truncating names that merely contain the token mid-string.
pub fn base_name(name: &str) -> &str {
    match name.split_once(LOD_TOKEN) {
        Some((base, _)) => base,
        None => name,
    }
}

pub fn variant_name(base: &str, index: usize) -> String {
    format!("{base}{LOD_TOKEN}{index}")
}

pub fn group_name(base: &str) -> String {
    format!("{base}{GROUP_SUFFIX}")
}

/// Whether `name` follows the group anchor convention.
pub fn is_group_name(name: &str) -> bool {
    name.ends_with(GROUP_SUFFIX)
}
