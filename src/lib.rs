/// Error definitions
pub mod error;
/// Scene serialization and batch export of LOD groups
pub mod export;
/// LOD chain generation from source meshes
pub mod lod;
/// Editor-style scene model: objects, hierarchy, collections, selection state
pub mod scene;
