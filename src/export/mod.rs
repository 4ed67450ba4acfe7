//! Scene export: the serializer seam, the bundled GLB backend, and batch
//! orchestration over discovered LOD groups.

pub mod batch;
pub mod gltf_writer;
pub mod options;

use thiserror::Error;

pub use batch::{
    BatchOptions, COMBINED_FILE_STEM, DEFAULT_EXPORT_DIR, export_groups, export_lod_groups,
    find_target_groups,
};
pub use gltf_writer::{GlbSerializer, SceneSerializer};
pub use options::{ALL_OPTION_KEYS, ExportOptionKey, intersect_supported, option_value};

/// Errors raised while serializing a scene to disk.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("glTF serialization error: {0}")]
    Serialize(String),
    #[error("GLB container error: {0}")]
    Glb(String),
}
