//! Helio conformal decals
//!
//! Projects flat decal textures onto the surfaces of a part graph so they
//! follow the shape of whatever they land on. The engine is split into
//! independent crates that can be used on their own.

pub use helio_core as core;
pub use helio_decals as decals;
pub use helio_material as material;

pub mod prelude {
    pub use crate::core::{Aabb, ConfigNode, Rect, TextureId, TextureLibrary, Transform};
    pub use crate::decals::{
        CameraId, ConformalDecal, DecalConfig, DecalSettings, DecalSystem, DrawList, DrawSink,
        EventSource, GraphEvent, ObjectGraph, PartId, ProjectionTarget, ScaleMode, Scene,
        SceneNode, ScenePart, SurfaceMaterial, SurfaceMesh, TextureSource,
    };
    pub use crate::material::{Material, MaterialPropertyCollection, PropertyBlock};
    pub use glam;
}
