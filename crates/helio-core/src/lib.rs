//! Core types shared by the Helio decal crates: bounds, poses, texture
//! bookkeeping and configuration blocks.

pub mod bounds;
pub mod config;
pub mod error;
pub mod texture;
pub mod transform;

pub use bounds::{Aabb, Rect};
pub use config::{ConfigNode, ConfigValue};
pub use error::{HelioError, Result};
pub use texture::{TextureChannel, TextureId, TextureInfo, TextureLibrary};
pub use transform::Transform;
