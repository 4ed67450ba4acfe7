//! LOD chain construction.
//!
//! For each source mesh the builder renames the source to `<base>_LOD0`,
//! creates reduced duplicates `<base>_LOD1..`, parents the whole chain under
//! a fresh `<base>_LOD_GROUP` anchor, and fills in native LOD switch
//! metadata where the scene supports it.

use std::collections::BTreeMap;

use bon::Builder;
use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::lod::naming;
use crate::lod::reduce::GeometryReducer;
use crate::scene::{LodLevel, ObjectId, Scene};

/// Default reduction ratios: LOD0 keeps the source geometry, LOD1 keeps 40%,
/// LOD2 keeps 15%.
pub const DEFAULT_LOD_RATIOS: [f32; 3] = [1.0, 0.4, 0.15];

/// Default switch distances paired with [`DEFAULT_LOD_RATIOS`].
pub const DEFAULT_LOD_DISTANCES: [f32; 3] = [0.0, 15.0, 30.0];

/// Ratios at or above this threshold mean "keep the source geometry" and
/// skip the reducer entirely.
pub const REDUCTION_SKIP_THRESHOLD: f32 = 0.999;

/// Options for one builder run.
#[derive(Builder, Debug, Clone)]
pub struct BuildOptions {
    /// Reduction ratio per variant, in `(0, 1]`. Index 0 is the source
    /// level and is conventionally 1.0; the list length fixes the number of
    /// variants per chain.
    #[builder(default = DEFAULT_LOD_RATIOS.to_vec())]
    pub ratios: Vec<f32>,
    /// Bake each source's object scale into its geometry before building.
    #[builder(default = true)]
    pub apply_scale: bool,
    /// Ask the reducer to preserve mesh symmetry.
    #[builder(default = false)]
    pub symmetric: bool,
    /// Switch distances for native LOD metadata, expected increasing. The
    /// last value is reused for any variants beyond the list.
    #[builder(default = DEFAULT_LOD_DISTANCES.to_vec())]
    pub lod_distances: Vec<f32>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// One generated chain: the group anchor plus its variants, LOD0 first.
#[derive(Debug, Clone)]
pub struct BuiltGroup {
    pub group: ObjectId,
    pub variants: Vec<ObjectId>,
}

/// Everything one builder run produced, keyed by base asset name.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub groups: BTreeMap<String, BuiltGroup>,
}

impl BuildReport {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Builds named, grouped LOD chains from source meshes.
pub struct LodBuilder<'a> {
    reducer: &'a dyn GeometryReducer,
}

impl<'a> LodBuilder<'a> {
    pub fn new(reducer: &'a dyn GeometryReducer) -> Self {
        Self { reducer }
    }

    /// Builds chains for the currently selected mesh objects. Non-mesh
    /// selections are filtered out here; an empty qualifying set builds
    /// nothing and leaves the scene untouched.
    pub fn build_selected(&self, scene: &mut Scene, options: &BuildOptions) -> BuildReport {
        let targets = scene
            .selected_objects()
            .into_iter()
            .filter(|id| scene.object(*id).kind.is_mesh())
            .collect::<Vec<_>>();
        if targets.is_empty() {
            info!("no mesh objects selected; nothing to build");
            return BuildReport::default();
        }
        self.build(scene, &targets, options)
    }

    /// Builds one chain per mesh in `targets`. Callers are expected to pass
    /// mesh objects (see [`LodBuilder::build_selected`]); other kinds are
    /// ignored.
    pub fn build(
        &self,
        scene: &mut Scene,
        targets: &[ObjectId],
        options: &BuildOptions,
    ) -> BuildReport {
        if !options
            .lod_distances
            .iter()
            .tuple_windows()
            .all(|(a, b)| a <= b)
        {
            warn!(distances = ?options.lod_distances, "LOD distances are not increasing");
        }

        let mut report = BuildReport::default();
        for target in targets {
            if !scene.object(*target).kind.is_mesh() {
                continue;
            }
            let (base, built) = self.build_chain(scene, *target, options);
            report.groups.insert(base, built);
        }
        report
    }

    fn build_chain(
        &self,
        scene: &mut Scene,
        source: ObjectId,
        options: &BuildOptions,
    ) -> (String, BuiltGroup) {
        // capture collection membership up front; the chain lands in the
        // same collections as the source, or the root one as a fallback
        let mut collections = scene.object(source).collections().to_vec();
        if collections.is_empty() {
            collections.push(scene.root_collection());
        }

        let base = naming::base_name(scene.object(source).name()).to_string();

        if options.apply_scale {
            scene.bake_scale(source);
        }

        scene.rename(source, &naming::variant_name(&base, 0));
        let group = scene.add_anchor(&naming::group_name(&base));
        for collection in &collections {
            scene.link_to_collection(group, *collection);
        }
        scene.set_parent(source, Some(group));

        let mut variants = vec![source];
        for (index, ratio) in options.ratios.iter().enumerate().skip(1) {
            let variant = scene.duplicate_object(source, &naming::variant_name(&base, index));
            for collection in &collections {
                scene.link_to_collection(variant, *collection);
            }
            scene.set_parent(variant, Some(group));
            // identical local pose to the source level
            scene.object_mut(variant).transform = scene.object(source).transform;

            if *ratio < REDUCTION_SKIP_THRESHOLD {
                let before = scene
                    .object(variant)
                    .kind
                    .mesh()
                    .map_or(0, |mesh| mesh.triangle_count());
                if let Some(mesh) = scene.object_mut(variant).kind.mesh_mut() {
                    self.reducer.reduce(mesh, *ratio, options.symmetric);
                    debug!(
                        variant = index,
                        ratio,
                        before,
                        after = mesh.triangle_count(),
                        backend = self.reducer.name(),
                        "reduced geometry"
                    );
                }
            }
            variants.push(variant);
        }

        self.assign_lod_metadata(scene, source, &variants, &options.lod_distances);

        let names = variants
            .iter()
            .map(|variant| scene.object(*variant).name())
            .collect::<Vec<_>>();
        info!(
            base = %base,
            variants = ?names,
            group = scene.object(group).name(),
            "generated LOD chain"
        );
        (base, BuiltGroup { group, variants })
    }

    /// Best effort: hosts without the native LOD facility skip this without
    /// failing the run.
    fn assign_lod_metadata(
        &self,
        scene: &mut Scene,
        controller: ObjectId,
        variants: &[ObjectId],
        distances: &[f32],
    ) {
        if distances.is_empty() {
            return;
        }
        let levels = variants
            .iter()
            .enumerate()
            .map(|(index, variant)| LodLevel {
                object: *variant,
                distance: distances[index.min(distances.len() - 1)],
            })
            .collect::<Vec<_>>();
        if let Err(err) = scene.set_lod_levels(controller, levels) {
            info!(%err, "skipped native LOD metadata");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;

    use glam::{Quat, Vec3};

    use crate::lod::reduce::StrideReducer;
    use crate::scene::mesh::unit_cube;
    use crate::scene::{MeshData, Transform};

    /// Records every reduction call instead of touching geometry.
    struct RecordingReducer {
        calls: RefCell<Vec<(f32, bool)>>,
    }

    impl RecordingReducer {
        fn new() -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl GeometryReducer for RecordingReducer {
        fn reduce(&self, _mesh: &mut MeshData, ratio: f32, symmetric: bool) {
            self.calls.borrow_mut().push((ratio, symmetric));
        }
    }

    fn scene_with_rock() -> (Scene, ObjectId) {
        let mut scene = Scene::new();
        let rock = scene.add_mesh("Rock", unit_cube());
        let root = scene.root_collection();
        scene.link_to_collection(rock, root);
        scene.select_set(rock, true);
        (scene, rock)
    }

    #[test]
    fn builds_the_expected_chain() {
        let (mut scene, rock) = scene_with_rock();
        let reducer = StrideReducer;
        let report = LodBuilder::new(&reducer)
            .build_selected(&mut scene, &BuildOptions::default());

        assert_eq!(report.len(), 1);
        let built = &report.groups["Rock"];
        assert_eq!(built.variants.len(), 3);
        assert_eq!(built.variants[0], rock);

        assert_eq!(scene.object(rock).name(), "Rock_LOD0");
        assert_eq!(scene.object(built.variants[1]).name(), "Rock_LOD1");
        assert_eq!(scene.object(built.variants[2]).name(), "Rock_LOD2");
        assert_eq!(scene.object(built.group).name(), "Rock_LOD_GROUP");
        assert!(scene.object(built.group).kind.is_anchor());

        for variant in &built.variants {
            assert_eq!(scene.object(*variant).parent(), Some(built.group));
        }
        let cube_triangles = unit_cube().triangle_count() as f32;
        let lod1 = scene.object(built.variants[1]).kind.mesh().unwrap();
        assert_eq!(
            lod1.triangle_count(),
            (cube_triangles * 0.4).round() as usize
        );
        let lod2 = scene.object(built.variants[2]).kind.mesh().unwrap();
        assert_eq!(
            lod2.triangle_count(),
            ((cube_triangles * 0.15).round() as usize).max(1)
        );
    }

    #[test]
    fn near_unity_ratios_skip_the_reducer() {
        let (mut scene, _) = scene_with_rock();
        let reducer = RecordingReducer::new();
        let options = BuildOptions::builder()
            .ratios(vec![1.0, 0.9995, 0.4])
            .build();

        LodBuilder::new(&reducer).build_selected(&mut scene, &options);

        // index 0 never reduces, 0.9995 is above the threshold
        assert_eq!(reducer.calls.borrow().as_slice(), &[(0.4, false)]);
    }

    #[test]
    fn symmetric_flag_reaches_the_reducer() {
        let (mut scene, _) = scene_with_rock();
        let reducer = RecordingReducer::new();
        let options = BuildOptions::builder()
            .ratios(vec![1.0, 0.5])
            .symmetric(true)
            .build();

        LodBuilder::new(&reducer).build_selected(&mut scene, &options);
        assert_eq!(reducer.calls.borrow().as_slice(), &[(0.5, true)]);
    }

    #[test]
    fn rerunning_on_a_variant_does_not_stack_suffixes() {
        let (mut scene, rock) = scene_with_rock();
        let reducer = RecordingReducer::new();
        let builder = LodBuilder::new(&reducer);
        builder.build_selected(&mut scene, &BuildOptions::default());

        // a second run over the LOD0 result keeps using the plain base name
        scene.select_only(&[rock]);
        builder.build_selected(&mut scene, &BuildOptions::default());

        assert_eq!(scene.object(rock).name(), "Rock_LOD0");
        assert!(scene.object_by_name("Rock_LOD0_LOD0").is_none());
    }

    #[test]
    fn variants_share_the_source_pose() {
        let (mut scene, rock) = scene_with_rock();
        scene.object_mut(rock).transform = Transform {
            position: Vec3::new(3.0, 1.0, -2.0),
            rotation: Quat::from_rotation_z(1.0),
            scale: Vec3::splat(2.0),
        };
        let reducer = StrideReducer;
        let report = LodBuilder::new(&reducer)
            .build_selected(&mut scene, &BuildOptions::default());

        let built = &report.groups["Rock"];
        let pose = scene.object(rock).transform;
        // apply-scale baked the source scale away before duplication
        assert_eq!(pose.scale, Vec3::ONE);
        assert_eq!(pose.position, Vec3::new(3.0, 1.0, -2.0));
        for variant in &built.variants {
            assert_eq!(scene.object(*variant).transform, pose);
        }
    }

    #[test]
    fn apply_scale_can_be_disabled() {
        let (mut scene, rock) = scene_with_rock();
        scene.object_mut(rock).transform.scale = Vec3::splat(3.0);
        let reducer = RecordingReducer::new();
        let options = BuildOptions::builder().apply_scale(false).build();

        LodBuilder::new(&reducer).build_selected(&mut scene, &options);
        assert_eq!(scene.object(rock).transform.scale, Vec3::splat(3.0));
    }

    #[test]
    fn lod_metadata_covers_every_variant() {
        let (mut scene, rock) = scene_with_rock();
        let reducer = StrideReducer;
        let options = BuildOptions::builder()
            .ratios(vec![1.0, 0.5, 0.25, 0.1])
            .build();
        let report = LodBuilder::new(&reducer).build_selected(&mut scene, &options);

        let built = &report.groups["Rock"];
        let levels = scene.object(rock).lod_levels();
        assert_eq!(levels.len(), 4);
        assert_eq!(levels[0].object, rock);
        assert_eq!(levels[0].distance, 0.0);
        assert_eq!(levels[1].distance, 15.0);
        assert_eq!(levels[2].distance, 30.0);
        // distances list is shorter than the chain; the last value repeats
        assert_eq!(levels[3].distance, 30.0);
        assert_eq!(levels[3].object, built.variants[3]);
    }

    #[test]
    fn missing_lod_facility_is_not_fatal() {
        let (mut scene, rock) = scene_with_rock();
        scene.set_lod_metadata_support(false);
        let reducer = StrideReducer;
        let report = LodBuilder::new(&reducer)
            .build_selected(&mut scene, &BuildOptions::default());

        assert_eq!(report.len(), 1);
        assert!(scene.object(rock).lod_levels().is_empty());
    }

    #[test]
    fn chain_lands_in_the_source_collections() {
        let mut scene = Scene::new();
        let props = scene.add_collection("Props");
        let rock = scene.add_mesh("Rock", unit_cube());
        scene.link_to_collection(rock, props);
        scene.select_set(rock, true);

        let reducer = StrideReducer;
        let report = LodBuilder::new(&reducer)
            .build_selected(&mut scene, &BuildOptions::default());

        let built = &report.groups["Rock"];
        assert_eq!(scene.object(built.group).collections(), &[props]);
        for variant in &built.variants {
            assert!(scene.object(*variant).collections().contains(&props));
        }
    }

    #[test]
    fn unlinked_sources_fall_back_to_the_root_collection() {
        let mut scene = Scene::new();
        let rock = scene.add_mesh("Rock", unit_cube());
        scene.select_set(rock, true);

        let reducer = StrideReducer;
        let report = LodBuilder::new(&reducer)
            .build_selected(&mut scene, &BuildOptions::default());

        let built = &report.groups["Rock"];
        let root = scene.root_collection();
        assert_eq!(scene.object(built.group).collections(), &[root]);
        assert_eq!(scene.object(built.variants[1]).collections(), &[root]);
    }

    #[test]
    fn non_mesh_selections_are_skipped() {
        let mut scene = Scene::new();
        let anchor = scene.add_anchor("Rig");
        let light = scene.add_light("Sun");
        scene.select_set(anchor, true);
        scene.select_set(light, true);

        let reducer = RecordingReducer::new();
        let report = LodBuilder::new(&reducer)
            .build_selected(&mut scene, &BuildOptions::default());

        assert!(report.is_empty());
        assert_eq!(scene.object(anchor).name(), "Rig");
        assert_eq!(scene.len(), 2);
    }

    #[test]
    fn builds_one_chain_per_selected_mesh() {
        let mut scene = Scene::new();
        let rock = scene.add_mesh("Rock", unit_cube());
        let tree = scene.add_mesh("Tree", unit_cube());
        scene.select_set(rock, true);
        scene.select_set(tree, true);

        let reducer = StrideReducer;
        let report = LodBuilder::new(&reducer)
            .build_selected(&mut scene, &BuildOptions::default());

        assert_eq!(report.len(), 2);
        assert!(scene.object_by_name("Rock_LOD_GROUP").is_some());
        assert!(scene.object_by_name("Tree_LOD_GROUP").is_some());
        assert!(scene.object_by_name("Tree_LOD2").is_some());
    }
}
