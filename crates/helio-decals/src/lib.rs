//! Conformal decal projection.
//!
//! A decal projector casts a flat texture along its local +z axis onto every
//! nearby surface of the host's part graph. For each surface it touches it
//! keeps a [`ProjectionTarget`]: the decal-space transform, normal and tangent
//! the decal shader needs to draw the texture onto that surface's own mesh.
//! Targets are maintained incrementally from [`GraphEvent`]s and drawn once
//! per camera through a [`DrawSink`].

pub mod cache;
pub mod config;
pub mod decal_system;
pub mod events;
pub mod graph;
pub mod projection;
pub mod projector;
pub mod render;
pub mod resolver;
pub mod scene;
pub mod target;
pub mod texture_source;

mod queue;

pub use cache::{PartTarget, ProjectionCache};
pub use config::*;
pub use decal_system::DecalSystem;
pub use events::{EventSource, GraphEvent, Subscription};
pub use graph::*;
pub use projection::*;
pub use projector::{ConformalDecal, PreviewState};
pub use queue::{RenderQueueAllocator, DECAL_QUEUE_MAX, DECAL_QUEUE_MIN};
pub use render::*;
pub use resolver::{ResolvedSurface, TargetResolver};
pub use scene::{Scene, SceneNode, ScenePart};
pub use target::*;
pub use texture_source::*;

use helio_core::HelioError;
use helio_material::MaterialError;

/// Result type for decal operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed configuration or persisted data.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A persisted target no longer matches the graph.
    #[error("Resolution miss: {0}")]
    ResolutionMiss(String),

    /// The graph changed under a target without telling us.
    #[error("Graph inconsistency: {0}")]
    GraphInconsistency(String),

    #[error("Material error: {0}")]
    Material(#[from] MaterialError),

    #[error(transparent)]
    Core(#[from] HelioError),
}
