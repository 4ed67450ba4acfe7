//! Editor-style scene model.
//!
//! A [`Scene`] owns a flat table of [`SceneObject`]s tied together by parent
//! links, display collections, and selection state. It deliberately mirrors
//! the moving parts a DCC scene exposes to tooling scripts: stable handles,
//! unique object names, visibility flags, an active object, and an optional
//! native LOD metadata facility that not every host provides.

pub mod mesh;
pub mod snapshot;
pub mod transform;

pub use mesh::MeshData;
pub use snapshot::{SceneSnapshot, StateGuard};
pub use transform::Transform;

use std::collections::{BTreeMap, HashMap};

use glam::{Mat4, Vec3};
use thiserror::Error;
use tracing::debug;

/// Stable handle to an object in a [`Scene`]. Handles are never reused, so a
/// handle to a removed object simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

/// Handle to a named display collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CollectionId(u32);

/// What an object is. Only meshes carry geometry; anchors are non-rendering
/// organizational objects (a group "empty").
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Mesh(MeshData),
    Anchor,
    Camera,
    Light,
}

impl ObjectKind {
    pub fn is_mesh(&self) -> bool {
        matches!(self, ObjectKind::Mesh(_))
    }

    pub fn is_anchor(&self) -> bool {
        matches!(self, ObjectKind::Anchor)
    }

    pub fn mesh(&self) -> Option<&MeshData> {
        match self {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self) -> Option<&mut MeshData> {
        match self {
            ObjectKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// One entry of a native LOD switch table: show `object` once the viewer is
/// at least `distance` units away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodLevel {
    pub object: ObjectId,
    pub distance: f32,
}

/// Returned when a scene facility the host does not provide is exercised.
#[derive(Debug, Error)]
#[error("native LOD metadata is not supported by this scene")]
pub struct CapabilityError;

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// A single object in the scene.
///
/// Name, parent links, and collection membership are maintained through
/// [`Scene`] methods so the scene-wide indices stay consistent; flags with no
/// cross-object invariant are plain fields.
#[derive(Debug, Clone)]
pub struct SceneObject {
    id: ObjectId,
    name: String,
    pub kind: ObjectKind,
    pub transform: Transform,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
    collections: Vec<CollectionId>,
    pub hide_viewport: bool,
    pub hide_render: bool,
    pub selected: bool,
    /// Free-form custom properties, exported as glTF extras.
    pub extras: BTreeMap<String, String>,
    lod_levels: Vec<LodLevel>,
}

impl SceneObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    pub fn collections(&self) -> &[CollectionId] {
        &self.collections
    }

    /// Hidden in either the viewport or the render.
    pub fn is_hidden(&self) -> bool {
        self.hide_viewport || self.hide_render
    }

    pub fn lod_levels(&self) -> &[LodLevel] {
        &self.lod_levels
    }
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Scene {
    objects: BTreeMap<ObjectId, SceneObject>,
    name_index: HashMap<String, ObjectId>,
    collections: Vec<String>,
    active: Option<ObjectId>,
    next_id: u32,
    lod_metadata_supported: bool,
}

impl Scene {
    /// Empty scene with only the root collection.
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            name_index: HashMap::new(),
            collections: vec!["Scene Collection".to_string()],
            active: None,
            next_id: 0,
            lod_metadata_supported: true,
        }
    }

    /// Toggles the native LOD metadata facility. Hosts that lack a LOD panel
    /// are modeled by scenes with this turned off.
    pub fn set_lod_metadata_support(&mut self, supported: bool) {
        self.lod_metadata_supported = supported;
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // -- collections --------------------------------------------------------

    /// The collection every scene starts with.
    pub fn root_collection(&self) -> CollectionId {
        CollectionId(0)
    }

    pub fn add_collection(&mut self, name: &str) -> CollectionId {
        let id = CollectionId(self.collections.len() as u32);
        self.collections.push(name.to_string());
        id
    }

    pub fn collection_name(&self, collection: CollectionId) -> &str {
        &self.collections[collection.0 as usize]
    }

    /// Links `id` into `collection`; linking twice is a no-op.
    pub fn link_to_collection(&mut self, id: ObjectId, collection: CollectionId) {
        let object = self.object_mut(id);
        if !object.collections.contains(&collection) {
            object.collections.push(collection);
        }
    }

    // -- creation and lookup ------------------------------------------------

    pub fn add_mesh(&mut self, name: &str, mesh: MeshData) -> ObjectId {
        self.add_object(name, ObjectKind::Mesh(mesh))
    }

    pub fn add_anchor(&mut self, name: &str) -> ObjectId {
        self.add_object(name, ObjectKind::Anchor)
    }

    pub fn add_camera(&mut self, name: &str) -> ObjectId {
        self.add_object(name, ObjectKind::Camera)
    }

    pub fn add_light(&mut self, name: &str) -> ObjectId {
        self.add_object(name, ObjectKind::Light)
    }

    fn add_object(&mut self, name: &str, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;

        let name = self.unique_name(name);
        self.name_index.insert(name.clone(), id);
        self.objects.insert(
            id,
            SceneObject {
                id,
                name,
                kind,
                transform: Transform::IDENTITY,
                parent: None,
                children: Vec::new(),
                collections: Vec::new(),
                hide_viewport: false,
                hide_render: false,
                selected: false,
                extras: BTreeMap::new(),
                lod_levels: Vec::new(),
            },
        );
        id
    }

    /// Copies `source` under a new name. The copy shares geometry, transform,
    /// visibility, and custom properties, but starts unparented, unlinked
    /// from all collections, deselected, and with no LOD metadata.
    pub fn duplicate_object(&mut self, source: ObjectId, name: &str) -> ObjectId {
        let template = self.object(source).clone();
        let id = self.add_object(name, template.kind);
        let copy = self.object_mut(id);
        copy.transform = template.transform;
        copy.hide_viewport = template.hide_viewport;
        copy.hide_render = template.hide_render;
        copy.extras = template.extras;
        id
    }

    /// Unlinks `id` from the scene. Children are orphaned rather than
    /// removed; stale handles held elsewhere simply stop resolving.
    pub fn remove_object(&mut self, id: ObjectId) {
        let Some(object) = self.objects.remove(&id) else {
            return;
        };
        self.name_index.remove(&object.name);
        if let Some(parent) = object.parent
            && let Some(parent) = self.objects.get_mut(&parent)
        {
            parent.children.retain(|child| *child != id);
        }
        for child in object.children {
            if let Some(child) = self.objects.get_mut(&child) {
                child.parent = None;
            }
        }
        if self.active == Some(id) {
            self.active = None;
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    /// Panics if `id` does not resolve; use [`Scene::get`] for stale handles.
    pub fn object(&self, id: ObjectId) -> &SceneObject {
        &self.objects[&id]
    }

    /// Panics if `id` does not resolve; use [`Scene::get_mut`] for stale
    /// handles.
    pub fn object_mut(&mut self, id: ObjectId) -> &mut SceneObject {
        self.objects.get_mut(&id).unwrap_or_else(|| {
            panic!("object id {id:?} does not resolve");
        })
    }

    pub fn object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.name_index.get(name).copied()
    }

    /// All objects in creation order.
    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    /// Renames `id`, keeping scene-wide name uniqueness. Returns the name
    /// actually assigned, which gains a numeric suffix on collision.
    pub fn rename(&mut self, id: ObjectId, name: &str) -> String {
        let current = self.object(id).name.clone();
        if current == name {
            return current;
        }
        self.name_index.remove(&current);
        let assigned = self.unique_name(name);
        self.name_index.insert(assigned.clone(), id);
        self.object_mut(id).name = assigned.clone();
        assigned
    }

    fn unique_name(&self, desired: &str) -> String {
        if !self.name_index.contains_key(desired) {
            return desired.to_string();
        }
        for n in 1u32.. {
            let candidate = format!("{desired}.{n:03}");
            if !self.name_index.contains_key(&candidate) {
                debug!(desired, assigned = %candidate, "object name collision");
                return candidate;
            }
        }
        unreachable!("name suffix space exhausted");
    }

    // -- hierarchy ----------------------------------------------------------

    /// Reparents `child`, updating both ends of the link. The child keeps its
    /// local transform.
    pub fn set_parent(&mut self, child: ObjectId, parent: Option<ObjectId>) {
        let old = self.object(child).parent;
        if old == parent {
            return;
        }
        if let Some(old) = old {
            let old = self.object_mut(old);
            old.children.retain(|c| *c != child);
        }
        if let Some(parent) = parent {
            self.object_mut(parent).children.push(child);
        }
        self.object_mut(child).parent = parent;
    }

    /// Every object below `id`, depth first. `id` itself is not included.
    pub fn descendants(&self, id: ObjectId) -> Vec<ObjectId> {
        let mut found = Vec::new();
        let mut stack = self.object(id).children.clone();
        while let Some(current) = stack.pop() {
            stack.extend_from_slice(&self.object(current).children);
            found.push(current);
        }
        found
    }

    /// Matrix mapping `id`'s local space into world space.
    pub fn world_matrix(&self, id: ObjectId) -> Mat4 {
        let mut matrix = self.object(id).transform.local_matrix();
        let mut parent = self.object(id).parent;
        while let Some(current) = parent {
            let object = self.object(current);
            matrix = object.transform.local_matrix() * matrix;
            parent = object.parent;
        }
        matrix
    }

    // -- selection ----------------------------------------------------------

    pub fn active(&self) -> Option<ObjectId> {
        self.active
    }

    pub fn set_active(&mut self, id: Option<ObjectId>) {
        self.active = id;
    }

    pub fn select_set(&mut self, id: ObjectId, selected: bool) {
        self.object_mut(id).selected = selected;
    }

    pub fn deselect_all(&mut self) {
        for object in self.objects.values_mut() {
            object.selected = false;
        }
    }

    /// Replaces the selection with exactly `ids`; the first becomes the
    /// active object (or the active object clears when `ids` is empty).
    pub fn select_only(&mut self, ids: &[ObjectId]) {
        self.deselect_all();
        for id in ids {
            self.select_set(*id, true);
        }
        self.active = ids.first().copied();
    }

    /// Selected objects in creation order.
    pub fn selected_objects(&self) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|object| object.selected)
            .map(|object| object.id)
            .collect()
    }

    // -- operations ---------------------------------------------------------

    /// Bakes `id`'s local scale into its geometry and resets the scale to
    /// one, leaving the object's world-space appearance unchanged. Mirrors
    /// the editor operator, including its selection side effects: the object
    /// becomes active, and its selected flag is cleared afterwards.
    pub fn bake_scale(&mut self, id: ObjectId) {
        self.set_active(Some(id));
        self.select_set(id, true);

        let object = self.object_mut(id);
        let scale = object.transform.scale;
        if let ObjectKind::Mesh(mesh) = &mut object.kind {
            let inverse = Vec3::new(
                safe_recip(scale.x),
                safe_recip(scale.y),
                safe_recip(scale.z),
            );
            for position in &mut mesh.positions {
                *position *= scale;
            }
            // normals transform by the inverse transpose, which for a pure
            // scale is the componentwise reciprocal
            for normal in &mut mesh.normals {
                *normal = (*normal * inverse).normalize_or_zero();
            }
            for tangent in &mut mesh.tangents {
                let direction = (tangent.truncate() * scale).normalize_or_zero();
                *tangent = direction.extend(tangent.w);
            }
        }
        object.transform.scale = Vec3::ONE;

        self.select_set(id, false);
    }

    /// Replaces `id`'s native LOD switch table. Fails on scenes whose host
    /// does not expose the facility; callers treat that as optional.
    pub fn set_lod_levels(
        &mut self,
        id: ObjectId,
        levels: Vec<LodLevel>,
    ) -> Result<(), CapabilityError> {
        if !self.lod_metadata_supported {
            return Err(CapabilityError);
        }
        self.object_mut(id).lod_levels = levels;
        Ok(())
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

fn safe_recip(value: f32) -> f32 {
    if value.abs() <= f32::EPSILON {
        1.0
    } else {
        value.recip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use glam::Quat;

    #[test]
    fn names_stay_unique() {
        let mut scene = Scene::new();
        let first = scene.add_anchor("Rock");
        let second = scene.add_anchor("Rock");

        assert_eq!(scene.object(first).name(), "Rock");
        assert_eq!(scene.object(second).name(), "Rock.001");
        assert_eq!(scene.object_by_name("Rock"), Some(first));
        assert_eq!(scene.object_by_name("Rock.001"), Some(second));
    }

    #[test]
    fn rename_updates_the_index() {
        let mut scene = Scene::new();
        let id = scene.add_anchor("Rock");
        let assigned = scene.rename(id, "Boulder");

        assert_eq!(assigned, "Boulder");
        assert_eq!(scene.object_by_name("Boulder"), Some(id));
        assert_eq!(scene.object_by_name("Rock"), None);
        // renaming to the current name is a no-op, not a collision
        assert_eq!(scene.rename(id, "Boulder"), "Boulder");
    }

    #[test]
    fn parenting_updates_both_ends() {
        let mut scene = Scene::new();
        let group = scene.add_anchor("Group");
        let other = scene.add_anchor("Other");
        let child = scene.add_mesh("Child", MeshData::default());

        scene.set_parent(child, Some(group));
        assert_eq!(scene.object(child).parent(), Some(group));
        assert_eq!(scene.object(group).children(), &[child]);

        scene.set_parent(child, Some(other));
        assert!(scene.object(group).children().is_empty());
        assert_eq!(scene.object(other).children(), &[child]);

        scene.set_parent(child, None);
        assert!(scene.object(other).children().is_empty());
        assert_eq!(scene.object(child).parent(), None);
    }

    #[test]
    fn descendants_cover_nested_children() {
        let mut scene = Scene::new();
        let root = scene.add_anchor("Root");
        let limb = scene.add_anchor("Limb");
        let leaf = scene.add_mesh("Leaf", MeshData::default());
        let loose = scene.add_mesh("Loose", MeshData::default());

        scene.set_parent(limb, Some(root));
        scene.set_parent(leaf, Some(limb));

        let found = scene.descendants(root);
        assert!(found.contains(&limb));
        assert!(found.contains(&leaf));
        assert!(!found.contains(&loose));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn world_matrix_composes_parent_chain() {
        let mut scene = Scene::new();
        let parent = scene.add_anchor("Parent");
        let child = scene.add_anchor("Child");
        scene.set_parent(child, Some(parent));

        scene.object_mut(parent).transform.position = Vec3::new(0.0, 0.0, 10.0);
        scene.object_mut(child).transform.position = Vec3::new(1.0, 0.0, 0.0);

        let world = scene.world_matrix(child).transform_point3(Vec3::ZERO);
        assert!(world.abs_diff_eq(Vec3::new(1.0, 0.0, 10.0), 1e-6));
    }

    #[test]
    fn duplicate_is_independent() {
        let mut scene = Scene::new();
        let root = scene.root_collection();
        let source = scene.add_mesh("Rock", mesh::unit_cube());
        scene.link_to_collection(source, root);
        scene.object_mut(source).transform.position = Vec3::new(4.0, 0.0, 0.0);
        scene
            .object_mut(source)
            .extras
            .insert("kind".to_string(), "prop".to_string());
        scene.select_set(source, true);

        let copy = scene.duplicate_object(source, "Rock_copy");
        assert_eq!(scene.object(copy).name(), "Rock_copy");
        assert_eq!(scene.object(copy).transform, scene.object(source).transform);
        assert_eq!(scene.object(copy).extras, scene.object(source).extras);
        assert!(scene.object(copy).collections().is_empty());
        assert!(!scene.object(copy).selected);

        // geometry is a deep copy
        if let Some(mesh) = scene.object_mut(copy).kind.mesh_mut() {
            mesh.indices.truncate(3);
        }
        assert_eq!(
            scene.object(source).kind.mesh().map(MeshData::triangle_count),
            Some(12)
        );
    }

    #[test]
    fn select_only_replaces_selection_and_active() {
        let mut scene = Scene::new();
        let a = scene.add_mesh("A", MeshData::default());
        let b = scene.add_mesh("B", MeshData::default());
        let c = scene.add_mesh("C", MeshData::default());
        scene.select_set(a, true);
        scene.set_active(Some(a));

        scene.select_only(&[b, c]);
        assert_eq!(scene.selected_objects(), vec![b, c]);
        assert_eq!(scene.active(), Some(b));

        scene.select_only(&[]);
        assert!(scene.selected_objects().is_empty());
        assert_eq!(scene.active(), None);
    }

    #[test]
    fn bake_scale_preserves_world_appearance() {
        let mut scene = Scene::new();
        let id = scene.add_mesh("Rock", mesh::unit_cube());
        scene.object_mut(id).transform = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.5),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let corner = scene.object(id).kind.mesh().unwrap().positions[6];
        let before = scene.world_matrix(id).transform_point3(corner);

        scene.bake_scale(id);

        let object = scene.object(id);
        assert_eq!(object.transform.scale, Vec3::ONE);
        assert_eq!(object.transform.position, Vec3::new(1.0, 2.0, 3.0));
        let baked = object.kind.mesh().unwrap().positions[6];
        assert!(baked.abs_diff_eq(corner * 2.0, 1e-6));
        let after = scene.world_matrix(id).transform_point3(baked);
        assert!(after.abs_diff_eq(before, 1e-5));
        // normals stay unit length
        for normal in &object.kind.mesh().unwrap().normals {
            assert!((normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn bake_scale_selection_side_effects() {
        let mut scene = Scene::new();
        let id = scene.add_mesh("Rock", mesh::unit_cube());
        scene.bake_scale(id);

        assert_eq!(scene.active(), Some(id));
        assert!(!scene.object(id).selected);
    }

    #[test]
    fn lod_metadata_respects_capability() {
        let mut scene = Scene::new();
        let id = scene.add_mesh("Rock", MeshData::default());
        let levels = vec![LodLevel {
            object: id,
            distance: 0.0,
        }];

        assert!(scene.set_lod_levels(id, levels.clone()).is_ok());
        assert_eq!(scene.object(id).lod_levels(), levels.as_slice());

        scene.set_lod_metadata_support(false);
        assert!(scene.set_lod_levels(id, levels).is_err());
    }

    #[test]
    fn remove_object_orphans_children() {
        let mut scene = Scene::new();
        let group = scene.add_anchor("Group");
        let child = scene.add_mesh("Child", MeshData::default());
        scene.set_parent(child, Some(group));
        scene.set_active(Some(group));

        scene.remove_object(group);
        assert!(scene.get(group).is_none());
        assert_eq!(scene.object_by_name("Group"), None);
        assert_eq!(scene.object(child).parent(), None);
        assert_eq!(scene.active(), None);
    }
}
