//! The host object graph as seen by the decal engine.
//!
//! Parts own a tree of nodes; nodes that carry a mesh and material are the
//! surfaces decals can land on. The engine never owns or mutates any of it.

use glam::{Mat4, Vec2, Vec4};
use helio_core::{Aabb, TextureId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable identifier of a part, persisted alongside projection records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartId(pub u32);

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "part#{}", self.0)
    }
}

/// A node inside a part's model tree. `node` is the preorder index, root = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SurfaceId {
    pub part: PartId,
    pub node: u32,
}

impl SurfaceId {
    pub fn new(part: PartId, node: u32) -> Self {
        Self { part, node }
    }
}

/// Renderable mesh data shared with the host. Only its local bounds matter here.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMesh {
    pub name: String,
    pub bounds: Aabb,
}

impl SurfaceMesh {
    pub fn new(name: impl Into<String>, bounds: Aabb) -> Self {
        Self {
            name: name.into(),
            bounds,
        }
    }
}

/// The part of a surface's material the decal reads: its shader and normal map.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMaterial {
    pub shader: String,
    pub normal_map: Option<TextureId>,
    pub normal_map_scale: Vec2,
    pub normal_map_offset: Vec2,
}

impl SurfaceMaterial {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            normal_map: None,
            normal_map_scale: Vec2::ONE,
            normal_map_offset: Vec2::ZERO,
        }
    }

    pub fn with_normal_map(mut self, texture: TextureId) -> Self {
        self.normal_map = Some(texture);
        self
    }
}

/// Snapshot of one surface at the time it was queried.
#[derive(Debug, Clone)]
pub struct SurfaceView {
    pub id: SurfaceId,
    pub name: String,
    /// Active in the hierarchy, i.e. the node and all its ancestors are enabled.
    pub active: bool,
    pub local_to_world: Mat4,
    pub mesh: Option<Arc<SurfaceMesh>>,
    pub material: Option<Arc<SurfaceMaterial>>,
}

impl SurfaceView {
    pub fn world_bounds(&self) -> Option<Aabb> {
        self.mesh
            .as_ref()
            .map(|mesh| mesh.bounds.transform(&self.local_to_world))
    }
}

/// Per-part rim lighting values, copied onto every decal draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RimState {
    pub falloff: f32,
    pub color: Vec4,
}

impl Default for RimState {
    fn default() -> Self {
        Self {
            falloff: 2.0,
            color: Vec4::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

/// Read-only queries the decal engine makes against the host's part graph.
pub trait ObjectGraph {
    fn contains(&self, part: PartId) -> bool;

    fn parent(&self, part: PartId) -> Option<PartId>;

    fn children(&self, part: PartId) -> Vec<PartId>;

    /// Every part connected to `part`, including itself.
    fn assembly(&self, part: PartId) -> Vec<PartId>;

    fn symmetry_counterparts(&self, part: PartId) -> Vec<PartId>;

    /// Whether the part carries a decal projector of its own.
    fn is_projector(&self, part: PartId) -> bool;

    fn part_transform(&self, part: PartId) -> Option<Mat4>;

    fn surfaces(&self, part: PartId) -> Vec<SurfaceView>;

    fn surface(&self, id: SurfaceId) -> Option<SurfaceView>;

    /// Child-index path from the part's root node down to the surface.
    fn surface_path(&self, id: SurfaceId) -> Option<Vec<u32>>;

    fn find_surface(&self, part: PartId, path: &[u32]) -> Option<SurfaceView>;

    fn rim(&self, part: PartId) -> RimState;
}
