//! Export operator options and capability probing.
//!
//! Serializers advertise the option keys they honor; callers intersect the
//! table they would like against that advertised set and pass only the
//! surviving entries. Options a serializer never heard of are dropped
//! silently instead of failing the call, so drivers keep working across
//! serializer revisions in either direction.

use std::collections::HashSet;

/// Recognized configuration keys for scene serializers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExportOptionKey {
    /// Export only currently selected objects.
    UseSelection,
    /// Skip objects hidden in the viewport or the render.
    VisibleOnly,
    /// Bake world transforms into vertex data instead of node transforms.
    ApplyTransforms,
    IncludeUvs,
    IncludeNormals,
    IncludeTangents,
    IncludeCameras,
    IncludeLights,
    /// Write object custom properties as glTF extras.
    IncludeExtras,
}

/// Every recognized key, in declaration order.
pub const ALL_OPTION_KEYS: [ExportOptionKey; 9] = [
    ExportOptionKey::UseSelection,
    ExportOptionKey::VisibleOnly,
    ExportOptionKey::ApplyTransforms,
    ExportOptionKey::IncludeUvs,
    ExportOptionKey::IncludeNormals,
    ExportOptionKey::IncludeTangents,
    ExportOptionKey::IncludeCameras,
    ExportOptionKey::IncludeLights,
    ExportOptionKey::IncludeExtras,
];

impl ExportOptionKey {
    /// Stable identifier used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ExportOptionKey::UseSelection => "use_selection",
            ExportOptionKey::VisibleOnly => "visible_only",
            ExportOptionKey::ApplyTransforms => "apply_transforms",
            ExportOptionKey::IncludeUvs => "include_uvs",
            ExportOptionKey::IncludeNormals => "include_normals",
            ExportOptionKey::IncludeTangents => "include_tangents",
            ExportOptionKey::IncludeCameras => "include_cameras",
            ExportOptionKey::IncludeLights => "include_lights",
            ExportOptionKey::IncludeExtras => "include_extras",
        }
    }
}

/// The option table a batch export run would like to apply: selection-scoped
/// geometry with UVs, normals, tangents, and custom properties, and with
/// cameras and lights left out.
pub(crate) fn desired_options(
    visible_only: bool,
    apply_transforms: bool,
) -> Vec<(ExportOptionKey, bool)> {
    vec![
        (ExportOptionKey::UseSelection, true),
        (ExportOptionKey::VisibleOnly, visible_only),
        (ExportOptionKey::ApplyTransforms, apply_transforms),
        (ExportOptionKey::IncludeUvs, true),
        (ExportOptionKey::IncludeNormals, true),
        (ExportOptionKey::IncludeTangents, true),
        (ExportOptionKey::IncludeCameras, false),
        (ExportOptionKey::IncludeLights, false),
        (ExportOptionKey::IncludeExtras, true),
    ]
}

/// Intersects a desired option table with a serializer's advertised set.
/// Supported keys keep their desired values and relative order; unsupported
/// keys are dropped, never substituted.
pub fn intersect_supported(
    desired: &[(ExportOptionKey, bool)],
    supported: &[ExportOptionKey],
) -> Vec<(ExportOptionKey, bool)> {
    let advertised = supported.iter().copied().collect::<HashSet<_>>();
    desired
        .iter()
        .copied()
        .filter(|(key, _)| advertised.contains(key))
        .collect()
}

/// Looks up `key` in an option table, falling back to `default` when absent.
pub fn option_value(
    options: &[(ExportOptionKey, bool)],
    key: ExportOptionKey,
    default: bool,
) -> bool {
    options
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map_or(default, |(_, value)| *value)
}
