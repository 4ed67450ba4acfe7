//! Saved visibility and selection state, and a guard that restores it.

use std::ops::{Deref, DerefMut};

use super::{ObjectId, Scene};

/// Visibility and selection state captured for every object in a scene,
/// along with the active object.
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    entries: Vec<SnapshotEntry>,
    active: Option<ObjectId>,
}

#[derive(Debug, Clone, Copy)]
struct SnapshotEntry {
    id: ObjectId,
    hide_viewport: bool,
    hide_render: bool,
    selected: bool,
}

impl SceneSnapshot {
    pub fn capture(scene: &Scene) -> Self {
        let entries = scene
            .objects()
            .map(|object| SnapshotEntry {
                id: object.id(),
                hide_viewport: object.hide_viewport,
                hide_render: object.hide_render,
                selected: object.selected,
            })
            .collect();
        Self {
            entries,
            active: scene.active(),
        }
    }

    /// Writes the captured state back. Objects removed since the capture are
    /// skipped; objects added since keep their current flags but leave the
    /// restored selection.
    pub fn restore(&self, scene: &mut Scene) {
        for entry in &self.entries {
            if let Some(object) = scene.get_mut(entry.id) {
                object.hide_viewport = entry.hide_viewport;
                object.hide_render = entry.hide_render;
            }
        }
        scene.deselect_all();
        for entry in &self.entries {
            if entry.selected && scene.get(entry.id).is_some() {
                scene.select_set(entry.id, true);
            }
        }
        scene.set_active(self.active.filter(|id| scene.get(*id).is_some()));
    }
}

/// Mutable scene access that restores visibility and selection when dropped.
///
/// The restore runs on every exit path out of the enclosing scope, early
/// error returns and panics included, so callers can mutate freely between
/// capture and drop.
#[derive(Debug)]
pub struct StateGuard<'a> {
    scene: &'a mut Scene,
    snapshot: SceneSnapshot,
}

impl<'a> StateGuard<'a> {
    pub fn capture(scene: &'a mut Scene) -> Self {
        let snapshot = SceneSnapshot::capture(scene);
        Self { scene, snapshot }
    }
}

impl Deref for StateGuard<'_> {
    type Target = Scene;

    fn deref(&self) -> &Scene {
        self.scene
    }
}

impl DerefMut for StateGuard<'_> {
    fn deref_mut(&mut self) -> &mut Scene {
        self.scene
    }
}

impl Drop for StateGuard<'_> {
    fn drop(&mut self) {
        self.snapshot.restore(self.scene);
    }
}
