//! Parallel compute kernels over caller-owned, strided 2D vertex buffers.
//!
//! Purpose
//! - Transform positions in place (translate, rotate, scale, skew, mirror).
//! - Measure polygons and triangle sets (signed area, centroid).
//! - Convert unindexed vertex streams into deduplicated indexed meshes.
//!
//! Layout
//! - `view`: typed access to strided records and index buffers.
//! - `partition`, `runner`: splitting work and running it concurrently.
//! - `topology`, `metrics`, `dedup`, `transform`: the kernels.
//! - `engine`: the owned context exposing every operation.
//!
//! API Policy
//! - The engine never allocates, frees, or retains the caller's buffers.
//! - Errors are values (`EngineError`); nothing on a non-test path panics on
//!   bad input except out-of-range accessors that document it.

pub mod cfg;
pub mod dedup;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod partition;
pub mod runner;
pub mod sample;
pub mod topology;
pub mod transform;
pub mod view;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use cfg::EngineCfg;
pub use engine::Engine;
pub use error::{EngineError, Result, TaskError};
pub use metrics::AreaCentroid;
pub use topology::Topology;
pub use transform::{Affine2, Line2};

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::dedup::{DedupCounts, IndexedMesh};
    pub use crate::runner::{Inline, ScopedThreads, TaskRunner, WorkerPool};
    pub use crate::sample::{radial_polygon, Phase, RadialCfg, ReplayToken, VertexCount};
    pub use crate::view::{
        IndexEncoding, IndexView, PositionEncoding, VertexLayout, VertexView, VertexViewMut,
    };
    pub use crate::{AreaCentroid, Affine2, Engine, EngineCfg, EngineError, Line2, Topology};
    pub use nalgebra::Vector2 as Vec2;
}
