//! Data-driven city geometry: roads, intersections and terrain patches
//! described by JSON type descriptors full of small formulas, compiled
//! once and extruded into triangle meshes.
//!
//! The flow is: deserialize descriptors ([`types::defs`]), register
//! them in a [`TypeRegistry`] (which compiles every formula against a
//! [`calc`] variable container), build elements in a [`CityWorld`],
//! then call [`CityWorld::process_update`] after each edit. Updates
//! are lazy and ordered: road lines first, then intersection sizes,
//! then meshes, so every mesh sees its neighbors' final geometry.

#![allow(clippy::too_many_arguments)]

pub mod calc;
pub mod delaunay;
pub mod error;
pub mod extrude;
pub mod intersection;
pub mod mesh;
pub mod state;
pub mod subroad;
pub mod terrain;
pub mod types;
pub mod world;

pub use error::{CalcError, TypeError};
pub use mesh::{MaterialHandle, MaterialResolver, MaterialTable, Transform, TriangleMesh};
pub use state::{ObjectState, Value};
pub use types::TypeRegistry;
pub use world::{
    CityWorld, CitywideParams, CitywideTerrain, IntersectionElement, IntersectionId, PatchId,
    RebuildCounts, RoadElement, RoadId, StepProgress, TerrainPatchElement,
};
