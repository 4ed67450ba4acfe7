use glam::{Vec2, Vec3, Vec4};

/// Triangle geometry carried by a mesh object.
///
/// Attribute arrays are parallel and indexed by `indices` (three entries per
/// triangle). `normals`, `uvs`, and `tangents` are either empty or the same
/// length as `positions`; tangents are stored as xyzw with w holding the
/// bitangent sign.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub tangents: Vec<Vec4>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Axis-aligned unit cube used as a geometry fixture throughout the test
/// suite: 8 vertices, 12 triangles, with corner normals and planar UVs.
#[cfg(test)]
pub(crate) fn unit_cube() -> MeshData {
    let positions: Vec<Vec3> = [
        [-0.5, -0.5, -0.5],
        [0.5, -0.5, -0.5],
        [0.5, 0.5, -0.5],
        [-0.5, 0.5, -0.5],
        [-0.5, -0.5, 0.5],
        [0.5, -0.5, 0.5],
        [0.5, 0.5, 0.5],
        [-0.5, 0.5, 0.5],
    ]
    .into_iter()
    .map(Vec3::from_array)
    .collect();

    let normals = positions.iter().map(|p| p.normalize()).collect::<Vec<Vec3>>();
    let uvs = positions
        .iter()
        .map(|p| Vec2::new(p.x + 0.5, p.y + 0.5))
        .collect::<Vec<Vec2>>();
    let tangents = vec![Vec4::new(1.0, 0.0, 0.0, 1.0); positions.len()];

    let indices = vec![
        0, 2, 1, 0, 3, 2, // back
        4, 5, 6, 4, 6, 7, // front
        0, 1, 5, 0, 5, 4, // bottom
        2, 3, 7, 2, 7, 6, // top
        1, 2, 6, 1, 6, 5, // right
        3, 0, 4, 3, 4, 7, // left
    ];

    MeshData {
        positions,
        normals,
        uvs,
        tangents,
        indices,
    }
}
