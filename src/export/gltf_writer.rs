//! GLB serialization of scene objects.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use gltf_json as json;
use json::validation::Checked::Valid;
use json::validation::USize64;
use tracing::debug;

use crate::export::ExportError;
use crate::export::options::{ALL_OPTION_KEYS, ExportOptionKey, option_value};
use crate::scene::{MeshData, ObjectKind, Scene, SceneObject};

/// Serializes scene content to an interchange file.
///
/// `supported_options` advertises the option keys the serializer honors.
/// Callers are expected to probe it and intersect their desired table before
/// calling [`SceneSerializer::export`]; keys the serializer does not
/// advertise must not be passed.
pub trait SceneSerializer {
    /// Short format label for logs, e.g. `"GLB"`.
    fn format(&self) -> &'static str;

    fn supported_options(&self) -> &[ExportOptionKey];

    fn export(
        &self,
        scene: &Scene,
        path: &Path,
        options: &[(ExportOptionKey, bool)],
    ) -> Result<(), ExportError>;
}

/// Binary glTF serializer supporting the full recognized option set.
///
/// Objects are written as sibling root nodes: meshes always, cameras and
/// lights as bare placeholder nodes when their options ask for them, and
/// organizational anchors never. Without `ApplyTransforms` each node carries
/// its world pose as TRS; with it the pose is baked into the vertex data.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlbSerializer;

/// Writer behavior resolved from an option table. Absent keys fall back to
/// the serializer's own defaults.
struct WriterConfig {
    use_selection: bool,
    visible_only: bool,
    apply_transforms: bool,
    include_uvs: bool,
    include_normals: bool,
    include_tangents: bool,
    include_cameras: bool,
    include_lights: bool,
    include_extras: bool,
}

impl WriterConfig {
    fn from_options(options: &[(ExportOptionKey, bool)]) -> Self {
        Self {
            use_selection: option_value(options, ExportOptionKey::UseSelection, false),
            visible_only: option_value(options, ExportOptionKey::VisibleOnly, false),
            apply_transforms: option_value(options, ExportOptionKey::ApplyTransforms, false),
            include_uvs: option_value(options, ExportOptionKey::IncludeUvs, true),
            include_normals: option_value(options, ExportOptionKey::IncludeNormals, true),
            include_tangents: option_value(options, ExportOptionKey::IncludeTangents, false),
            include_cameras: option_value(options, ExportOptionKey::IncludeCameras, false),
            include_lights: option_value(options, ExportOptionKey::IncludeLights, false),
            include_extras: option_value(options, ExportOptionKey::IncludeExtras, false),
        }
    }

    fn wants(&self, object: &SceneObject) -> bool {
        if self.use_selection && !object.selected {
            return false;
        }
        if self.visible_only && object.is_hidden() {
            return false;
        }
        match object.kind {
            ObjectKind::Mesh(_) => true,
            ObjectKind::Camera => self.include_cameras,
            ObjectKind::Light => self.include_lights,
            ObjectKind::Anchor => false,
        }
    }
}

impl SceneSerializer for GlbSerializer {
    fn format(&self) -> &'static str {
        "GLB"
    }

    fn supported_options(&self) -> &[ExportOptionKey] {
        &ALL_OPTION_KEYS
    }

    fn export(
        &self,
        scene: &Scene,
        path: &Path,
        options: &[(ExportOptionKey, bool)],
    ) -> Result<(), ExportError> {
        let config = WriterConfig::from_options(options);

        let mut root = json::Root::default();
        root.asset = json::Asset {
            version: "2.0".to_string(),
            generator: Some("lodpack".to_string()),
            ..Default::default()
        };

        // All vertex and index data accumulates into a single binary buffer.
        let mut bin_data: Vec<u8> = Vec::new();
        let mut nodes = Vec::new();

        for object in scene.objects() {
            if !config.wants(object) {
                continue;
            }
            match object.kind.mesh() {
                Some(mesh) => {
                    if mesh.positions.is_empty() {
                        debug!(object = object.name(), "mesh has no vertices; skipping");
                        continue;
                    }
                    nodes.push(add_mesh_node(
                        &mut root,
                        &mut bin_data,
                        scene,
                        object,
                        mesh,
                        &config,
                    )?);
                }
                None => nodes.push(add_placeholder_node(&mut root, scene, object, &config)?),
            }
        }

        while bin_data.len() % 4 != 0 {
            bin_data.push(0);
        }

        // The buffer length is only known now; point every view at it.
        if !bin_data.is_empty() {
            let buffer = root.push(json::Buffer {
                byte_length: USize64::from(bin_data.len()),
                uri: None,
                name: None,
                extensions: Default::default(),
                extras: Default::default(),
            });
            for view in root.buffer_views.iter_mut() {
                view.buffer = buffer;
            }
        }

        let scene_index = root.push(json::Scene {
            nodes,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
        root.scene = Some(scene_index);

        let json_string = json::serialize::to_string(&root)
            .map_err(|e| ExportError::Serialize(e.to_string()))?;

        let glb = gltf::binary::Glb {
            header: gltf::binary::Header {
                magic: *b"glTF",
                version: 2,
                length: 0, // to_writer computes this
            },
            json: Cow::Owned(json_string.into_bytes()),
            bin: if bin_data.is_empty() {
                None
            } else {
                Some(Cow::Owned(bin_data))
            },
        };

        let mut file = File::create(path)?;
        glb.to_writer(&mut file)
            .map_err(|e| ExportError::Glb(e.to_string()))?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Node assembly
// ---------------------------------------------------------------------------

fn add_mesh_node(
    root: &mut json::Root,
    bin_data: &mut Vec<u8>,
    scene: &Scene,
    object: &SceneObject,
    mesh: &MeshData,
    config: &WriterConfig,
) -> Result<json::Index<json::Node>, ExportError> {
    let world = scene.world_matrix(object.id());
    let geometry = if config.apply_transforms {
        Cow::Owned(bake_world_transform(mesh, &world))
    } else {
        Cow::Borrowed(mesh)
    };

    let mut attributes = BTreeMap::new();

    let bounds = bounding_coords(&geometry.positions);
    let positions = push_float_accessor(
        root,
        bin_data,
        &flatten_vec3(&geometry.positions),
        json::accessor::Type::Vec3,
        geometry.positions.len(),
        Some(bounds),
    );
    attributes.insert(Valid(json::mesh::Semantic::Positions), positions);

    if config.include_normals && !geometry.normals.is_empty() {
        let normals = push_float_accessor(
            root,
            bin_data,
            &flatten_vec3(&geometry.normals),
            json::accessor::Type::Vec3,
            geometry.normals.len(),
            None,
        );
        attributes.insert(Valid(json::mesh::Semantic::Normals), normals);
    }

    if config.include_uvs && !geometry.uvs.is_empty() {
        let uvs = push_float_accessor(
            root,
            bin_data,
            &flatten_vec2(&geometry.uvs),
            json::accessor::Type::Vec2,
            geometry.uvs.len(),
            None,
        );
        attributes.insert(Valid(json::mesh::Semantic::TexCoords(0)), uvs);
    }

    if config.include_tangents && !geometry.tangents.is_empty() {
        let tangents = push_float_accessor(
            root,
            bin_data,
            &flatten_vec4(&geometry.tangents),
            json::accessor::Type::Vec4,
            geometry.tangents.len(),
            None,
        );
        attributes.insert(Valid(json::mesh::Semantic::Tangents), tangents);
    }

    let indices = if geometry.indices.is_empty() {
        None
    } else {
        Some(push_index_accessor(root, bin_data, &geometry.indices))
    };

    let primitive = json::mesh::Primitive {
        attributes,
        indices,
        material: None,
        mode: Valid(json::mesh::Mode::Triangles),
        targets: None,
        extensions: None,
        extras: Default::default(),
    };

    let mesh_index = root.push(json::Mesh {
        primitives: vec![primitive],
        weights: None,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    let mut node = json::Node {
        mesh: Some(mesh_index),
        name: Some(object.name().to_string()),
        extras: node_extras(object, config)?,
        ..Default::default()
    };
    if !config.apply_transforms {
        set_node_pose(&mut node, &world);
    }
    Ok(root.push(node))
}

/// Cameras and lights export as bare placeholder nodes carrying only a name
/// and a pose; the scene model does not hold their parameters.
fn add_placeholder_node(
    root: &mut json::Root,
    scene: &Scene,
    object: &SceneObject,
    config: &WriterConfig,
) -> Result<json::Index<json::Node>, ExportError> {
    let mut node = json::Node {
        name: Some(object.name().to_string()),
        extras: node_extras(object, config)?,
        ..Default::default()
    };
    set_node_pose(&mut node, &scene.world_matrix(object.id()));
    Ok(root.push(node))
}

fn set_node_pose(node: &mut json::Node, world: &Mat4) {
    let (scale, rotation, translation) = world.to_scale_rotation_translation();
    node.translation = Some(translation.to_array());
    node.rotation = Some(json::scene::UnitQuaternion([
        rotation.x, rotation.y, rotation.z, rotation.w,
    ]));
    node.scale = Some(scale.to_array());
}

fn node_extras(object: &SceneObject, config: &WriterConfig) -> Result<json::Extras, ExportError> {
    if !config.include_extras || object.extras.is_empty() {
        return Ok(Default::default());
    }
    let mut map = serde_json::Map::new();
    for (key, value) in &object.extras {
        map.insert(key.clone(), serde_json::Value::String(value.clone()));
    }
    let text = serde_json::to_string(&map).map_err(|e| ExportError::Serialize(e.to_string()))?;
    let raw = serde_json::value::RawValue::from_string(text)
        .map_err(|e| ExportError::Serialize(e.to_string()))?;
    Ok(Some(raw))
}

/// Returns a copy of `mesh` with the world pose baked into the vertex data.
/// Normals use the inverse-transpose so non-uniform scale keeps them
/// perpendicular; tangent directions transform covariantly.
fn bake_world_transform(mesh: &MeshData, world: &Mat4) -> MeshData {
    let linear = Mat3::from_mat4(*world);
    let normal_matrix = linear.inverse().transpose();

    let mut baked = mesh.clone();
    for position in &mut baked.positions {
        *position = world.transform_point3(*position);
    }
    for normal in &mut baked.normals {
        *normal = (normal_matrix * *normal).normalize_or_zero();
    }
    for tangent in &mut baked.tangents {
        let direction = (linear * tangent.truncate()).normalize_or_zero();
        *tangent = direction.extend(tangent.w);
    }
    baked
}

// ---------------------------------------------------------------------------
// Buffer assembly
// ---------------------------------------------------------------------------

/// Appends `floats` to the binary buffer and registers a view plus accessor.
/// The view points at buffer 0 until the final fix-up.
fn push_float_accessor(
    root: &mut json::Root,
    bin_data: &mut Vec<u8>,
    floats: &[f32],
    type_: json::accessor::Type,
    count: usize,
    bounds: Option<([f32; 3], [f32; 3])>,
) -> json::Index<json::Accessor> {
    let byte_offset = bin_data.len();
    for value in floats {
        bin_data.extend_from_slice(&value.to_le_bytes());
    }
    pad_to_4(bin_data);
    let byte_length = bin_data.len() - byte_offset;

    let view = root.push(json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64::from(byte_length),
        byte_offset: Some(USize64::from(byte_offset)),
        byte_stride: None,
        target: Some(Valid(json::buffer::Target::ArrayBuffer)),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    root.push(json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(count),
        component_type: Valid(json::accessor::GenericComponentType(
            json::accessor::ComponentType::F32,
        )),
        type_: Valid(type_),
        min: bounds.map(|(min, _)| json::Value::from(min.to_vec())),
        max: bounds.map(|(_, max)| json::Value::from(max.to_vec())),
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn push_index_accessor(
    root: &mut json::Root,
    bin_data: &mut Vec<u8>,
    indices: &[u32],
) -> json::Index<json::Accessor> {
    let byte_offset = bin_data.len();
    for index in indices {
        bin_data.extend_from_slice(&index.to_le_bytes());
    }
    pad_to_4(bin_data);
    let byte_length = bin_data.len() - byte_offset;

    let view = root.push(json::buffer::View {
        buffer: json::Index::new(0),
        byte_length: USize64::from(byte_length),
        byte_offset: Some(USize64::from(byte_offset)),
        byte_stride: None,
        target: Some(Valid(json::buffer::Target::ElementArrayBuffer)),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    root.push(json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(indices.len()),
        component_type: Valid(json::accessor::GenericComponentType(
            json::accessor::ComponentType::U32,
        )),
        type_: Valid(json::accessor::Type::Scalar),
        min: None,
        max: None,
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    })
}

fn pad_to_4(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

fn bounding_coords(points: &[Vec3]) -> ([f32; 3], [f32; 3]) {
    let mut min = Vec3::MAX;
    let mut max = Vec3::MIN;
    for point in points {
        min = min.min(*point);
        max = max.max(*point);
    }
    (min.to_array(), max.to_array())
}

fn flatten_vec3(values: &[Vec3]) -> Vec<f32> {
    values.iter().flat_map(|v| v.to_array()).collect()
}

fn flatten_vec2(values: &[Vec2]) -> Vec<f32> {
    values.iter().flat_map(|v| v.to_array()).collect()
}

fn flatten_vec4(values: &[Vec4]) -> Vec<f32> {
    values.iter().flat_map(|v| v.to_array()).collect()
}
