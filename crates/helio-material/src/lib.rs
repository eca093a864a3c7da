//! Material property pipeline.
//!
//! Decal configuration describes a set of typed shader properties. A
//! [`MaterialPropertyCollection`] parses them, owns the decal and preview
//! [`Material`]s built from them, and keeps atlas tiling and texture scale in
//! step with the decal's footprint.

pub mod collection;
pub mod material;
pub mod property;
pub mod property_block;

pub use collection::*;
pub use material::*;
pub use property::*;
pub use property_block::*;

use helio_core::{HelioError, TextureChannel};

/// Result type for material operations
pub type Result<T> = std::result::Result<T, MaterialError>;

#[derive(Debug, thiserror::Error)]
pub enum MaterialError {
    #[error("Cannot find texture '{url}' for property '{property}'")]
    TextureNotFound { property: String, url: String },

    #[error("Texture '{url}' has no {channel:?} channel (property '{property}')")]
    MissingChannel {
        property: String,
        url: String,
        channel: TextureChannel,
    },

    #[error("Unknown material property type '{0}'")]
    UnknownPropertyType(String),

    #[error("Property '{name}' is a {actual} property, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid tile: {0}")]
    InvalidTile(String),

    #[error(transparent)]
    Config(#[from] HelioError),
}
