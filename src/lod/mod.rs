//! LOD chain generation: naming convention, reduction backends, and the
//! builder that ties them together.

pub mod builder;
pub mod naming;
pub mod reduce;

pub use builder::{
    BuildOptions, BuildReport, BuiltGroup, DEFAULT_LOD_DISTANCES, DEFAULT_LOD_RATIOS, LodBuilder,
    REDUCTION_SKIP_THRESHOLD,
};
#[cfg(feature = "meshopt")]
pub use reduce::MeshoptReducer;
pub use reduce::{GeometryReducer, StrideReducer};
