//! Geometry reduction backends.

use crate::scene::MeshData;

/// Reduces mesh geometry in place toward a target triangle ratio.
///
/// The reduction is irreversible: implementations replace the geometry and
/// never report failure, falling back to leaving the mesh unchanged when a
/// ratio cannot be honored. Ratios are in `(0, 1]`; `symmetric` asks the
/// backend to preserve mesh symmetry where it can.
pub trait GeometryReducer {
    fn reduce(&self, mesh: &mut MeshData, ratio: f32, symmetric: bool);

    /// Short backend label for logs.
    fn name(&self) -> &'static str {
        "reducer"
    }
}

/// Uniform triangle subsampling.
///
/// Keeps an evenly spaced subset of triangles sized to the ratio, with no
/// regard for shape preservation. Deterministic and dependency-free, which
/// makes it the default; enable the `meshopt` feature and use
/// [`MeshoptReducer`] for quality-aware reduction.
///
/// [`MeshoptReducer`]: crate::lod::reduce::MeshoptReducer
#[derive(Debug, Default, Clone, Copy)]
pub struct StrideReducer;

impl GeometryReducer for StrideReducer {
    fn reduce(&self, mesh: &mut MeshData, ratio: f32, _symmetric: bool) {
        let total = mesh.triangle_count();
        if total == 0 {
            return;
        }
        let ratio = ratio.clamp(f32::EPSILON, 1.0);
        let target = ((total as f32 * ratio).round() as usize).clamp(1, total);
        if target == total {
            return;
        }

        let step = total as f32 / target as f32;
        let mut kept = Vec::with_capacity(target * 3);
        for slot in 0..target {
            let triangle = (slot as f32 * step) as usize;
            let base = triangle * 3;
            kept.extend_from_slice(&mesh.indices[base..base + 3]);
        }
        mesh.indices = kept;
        drop_unreferenced_vertices(mesh);
    }

    fn name(&self) -> &'static str {
        "stride"
    }
}

/// Rebuilds the vertex arrays to contain only vertices the index buffer still
/// references, remapping indices to match. Vertex order follows first use.
pub(crate) fn drop_unreferenced_vertices(mesh: &mut MeshData) {
    let mut remap = vec![u32::MAX; mesh.positions.len()];
    let mut kept = 0u32;
    for index in &mesh.indices {
        let slot = &mut remap[*index as usize];
        if *slot == u32::MAX {
            *slot = kept;
            kept += 1;
        }
    }
    if kept as usize == mesh.positions.len() {
        return;
    }

    mesh.positions = remap_attribute(&mesh.positions, &remap, kept as usize);
    mesh.normals = remap_attribute(&mesh.normals, &remap, kept as usize);
    mesh.uvs = remap_attribute(&mesh.uvs, &remap, kept as usize);
    mesh.tangents = remap_attribute(&mesh.tangents, &remap, kept as usize);
    for index in &mut mesh.indices {
        *index = remap[*index as usize];
    }
}

fn remap_attribute<T: Copy + Default>(attribute: &[T], remap: &[u32], kept: usize) -> Vec<T> {
    if attribute.is_empty() {
        return Vec::new();
    }
    let mut compacted = vec![T::default(); kept];
    for (old, new) in remap.iter().enumerate() {
        if *new != u32::MAX {
            compacted[*new as usize] = attribute[old];
        }
    }
    compacted
}

/// Quality-aware reduction backed by the meshoptimizer simplifier.
///
/// Collapses edges up to the permitted `target_error` while aiming for the
/// requested triangle ratio; symmetry preservation is not offered by the
/// backend and the flag is ignored.
#[cfg(feature = "meshopt")]
#[derive(Debug, Clone, Copy)]
pub struct MeshoptReducer {
    /// Maximum relative simplification error, as a fraction of mesh extents.
    pub target_error: f32,
}

#[cfg(feature = "meshopt")]
impl Default for MeshoptReducer {
    fn default() -> Self {
        Self { target_error: 0.01 }
    }
}

#[cfg(feature = "meshopt")]
impl GeometryReducer for MeshoptReducer {
    fn reduce(&self, mesh: &mut MeshData, ratio: f32, _symmetric: bool) {
        use meshopt_rs::vertex::Position;

        struct SimplifyVertex([f32; 3]);

        impl Position for SimplifyVertex {
            fn pos(&self) -> [f32; 3] {
                self.0
            }
        }

        if mesh.is_empty() {
            return;
        }
        let ratio = ratio.clamp(f32::EPSILON, 1.0);
        let target_index_count =
            (((mesh.indices.len() as f32 * ratio) as usize) / 3 * 3).max(3);
        if target_index_count >= mesh.indices.len() {
            return;
        }

        let vertices = mesh
            .positions
            .iter()
            .map(|p| SimplifyVertex(p.to_array()))
            .collect::<Vec<_>>();
        let mut destination = vec![0u32; mesh.indices.len()];
        let written = meshopt_rs::simplify::simplify(
            &mut destination,
            &mesh.indices,
            &vertices,
            target_index_count,
            self.target_error,
        );
        destination.truncate(written);
        if destination.is_empty() {
            return;
        }
        mesh.indices = destination;
        drop_unreferenced_vertices(mesh);
    }

    fn name(&self) -> &'static str {
        "meshopt"
    }
}
