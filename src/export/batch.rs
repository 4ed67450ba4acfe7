//! LOD group discovery and batch export.
//!
//! Groups are discovered by convention, not by tag: any anchor object whose
//! name ends in `_LOD_GROUP`. Selected groups win; with none selected every
//! group in the scene is exported. Each export temporarily forces its meshes
//! visible and selects exactly them, with the prior scene state restored by a
//! [`StateGuard`] no matter how the serializer call ends.

use std::path::{Path, PathBuf};

use bon::Builder;
use itertools::Itertools;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::export::gltf_writer::SceneSerializer;
use crate::export::options;
use crate::lod::naming;
use crate::scene::{ObjectId, Scene, SceneObject, StateGuard};

/// Directory batch exports default to, relative to the working directory.
pub const DEFAULT_EXPORT_DIR: &str = "lod_exports";

/// File stem used when every group lands in one combined file.
pub const COMBINED_FILE_STEM: &str = "combined_lod_groups";

/// Options for one batch export run.
#[derive(Builder, Debug, Clone)]
pub struct BatchOptions {
    /// Directory receiving the exported files; created if absent.
    #[builder(default = PathBuf::from(DEFAULT_EXPORT_DIR))]
    pub export_dir: PathBuf,
    /// One file per group when true, a single combined file otherwise.
    #[builder(default = true)]
    pub per_group_file: bool,
    /// Leave out meshes hidden at discovery time instead of forcing them
    /// visible for the export.
    #[builder(default = false)]
    pub visible_only: bool,
    /// Bake world transforms into the exported vertex data.
    #[builder(default = true)]
    pub apply_transforms: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Whether an object qualifies as a LOD group anchor: the name convention
/// plus the anchor kind, nothing more.
pub fn is_lod_group(object: &SceneObject) -> bool {
    object.kind.is_anchor() && naming::is_group_name(object.name())
}

/// Resolves the groups a run should export: the selected qualifying anchors,
/// or every qualifying anchor in the scene when none are selected.
pub fn find_target_groups(scene: &Scene) -> Vec<ObjectId> {
    let selected = scene
        .objects()
        .filter(|object| object.selected && is_lod_group(object))
        .map(SceneObject::id)
        .collect::<Vec<_>>();
    if !selected.is_empty() {
        return selected;
    }
    info!("no LOD groups selected; exporting every group in the scene");
    scene
        .objects()
        .filter(|object| is_lod_group(object))
        .map(SceneObject::id)
        .collect()
}

/// Collects every mesh in `group`'s subtree, walking depth first through
/// nested anchors and sub-rigs. With `visible_only` set, meshes hidden in
/// the viewport or the render are left out.
pub fn collect_group_meshes(scene: &Scene, group: ObjectId, visible_only: bool) -> Vec<ObjectId> {
    scene
        .descendants(group)
        .into_iter()
        .filter(|id| {
            let object = scene.object(*id);
            object.kind.is_mesh() && !(visible_only && object.is_hidden())
        })
        .collect()
}

/// Discovers and exports LOD groups, returning the written file paths.
///
/// A scene with no qualifying groups is terminal but clean: the condition is
/// reported and the run returns an empty path list rather than an error.
pub fn export_lod_groups(
    scene: &mut Scene,
    serializer: &dyn SceneSerializer,
    options: &BatchOptions,
) -> Result<Vec<PathBuf>> {
    let groups = find_target_groups(scene);
    if groups.is_empty() {
        error!("no *_LOD_GROUP anchors found in the scene; nothing to export");
        return Ok(Vec::new());
    }
    info!(
        groups = groups.len(),
        per_group_file = options.per_group_file,
        dir = %options.export_dir.display(),
        "starting batch export"
    );
    export_groups(scene, &groups, serializer, options)
}

/// Exports the given groups without running discovery.
pub fn export_groups(
    scene: &mut Scene,
    groups: &[ObjectId],
    serializer: &dyn SceneSerializer,
    options: &BatchOptions,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&options.export_dir)?;

    let mut written = Vec::new();
    if options.per_group_file {
        for group in groups {
            let meshes = collect_group_meshes(scene, *group, options.visible_only);
            if meshes.is_empty() {
                warn!(
                    group = scene.object(*group).name(),
                    "group has no exportable meshes; skipping"
                );
                continue;
            }
            let path = options
                .export_dir
                .join(format!("{}.glb", scene.object(*group).name()));
            export_meshes(scene, &meshes, serializer, &path, options)?;
            written.push(path);
        }
    } else {
        let meshes = groups
            .iter()
            .flat_map(|group| collect_group_meshes(scene, *group, options.visible_only))
            .unique()
            .collect::<Vec<_>>();
        if meshes.is_empty() {
            warn!("none of the chosen groups have exportable meshes");
            return Ok(written);
        }
        let path = options.export_dir.join(format!("{COMBINED_FILE_STEM}.glb"));
        export_meshes(scene, &meshes, serializer, &path, options)?;
        written.push(path);
    }
    Ok(written)
}

/// One serializer call: snapshot the scene, force the meshes visible, select
/// exactly them, export, restore. The guard runs the restore on success,
/// error, and panic alike.
fn export_meshes(
    scene: &mut Scene,
    meshes: &[ObjectId],
    serializer: &dyn SceneSerializer,
    path: &Path,
    options: &BatchOptions,
) -> Result<()> {
    let desired = options::desired_options(options.visible_only, options.apply_transforms);
    let safe = options::intersect_supported(&desired, serializer.supported_options());
    if safe.len() < desired.len() {
        info!(
            format = serializer.format(),
            dropped = desired.len() - safe.len(),
            "serializer does not support every requested option"
        );
    }

    let mut guard = StateGuard::capture(scene);
    for mesh in meshes {
        let object = guard.object_mut(*mesh);
        object.hide_viewport = false;
        object.hide_render = false;
    }
    guard.select_only(meshes);
    serializer.export(&guard, path, &safe)?;

    let applied = safe
        .iter()
        .map(|(key, _)| key.as_str())
        .sorted()
        .collect::<Vec<_>>();
    info!(
        path = %path.display(),
        meshes = meshes.len(),
        format = serializer.format(),
        options = ?applied,
        "exported"
    );
    Ok(())
}
