//! Typed material properties parsed from configuration.

use crate::{Material, MaterialError, Result};
use glam::{Vec2, Vec4};
use helio_core::{ConfigNode, Rect, TextureChannel, TextureId, TextureInfo, TextureLibrary};
use std::sync::Arc;

/// Config block names for each property type.
pub const TEXTURE_NODE: &str = "TEXTURE";
pub const FLOAT_NODE: &str = "FLOAT";
pub const COLOR_NODE: &str = "COLOR";
pub const KEYWORD_NODE: &str = "KEYWORD";

/// A named shader property and the value it writes.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialProperty {
    name: String,
    pub kind: PropertyKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKind {
    Texture(TextureProperty),
    Float(FloatProperty),
    Color(ColorProperty),
    Keyword(KeywordProperty),
}

impl PropertyKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            PropertyKind::Texture(_) => "texture",
            PropertyKind::Float(_) => "float",
            PropertyKind::Color(_) => "color",
            PropertyKind::Keyword(_) => "keyword",
        }
    }
}

impl MaterialProperty {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Builds a property from a `TEXTURE`, `FLOAT`, `COLOR` or `KEYWORD` block.
    pub fn load(node: &ConfigNode, textures: &TextureLibrary) -> Result<Self> {
        let name: String = node.parse("name")?;
        let kind = match node.name.as_str() {
            TEXTURE_NODE => PropertyKind::Texture(TextureProperty::load(&name, node, textures)?),
            FLOAT_NODE => PropertyKind::Float(FloatProperty {
                value: node.parse_or("value", 0.0)?,
            }),
            COLOR_NODE => PropertyKind::Color(ColorProperty {
                value: node.parse_or("color", Vec4::ONE)?,
            }),
            KEYWORD_NODE => PropertyKind::Keyword(KeywordProperty {
                value: node.parse_or("value", true)?,
            }),
            other => return Err(MaterialError::UnknownPropertyType(other.to_string())),
        };
        Ok(Self { name, kind })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes this property into `material`. Writing the same value twice
    /// leaves the material unchanged.
    pub fn apply(&self, material: &mut Material) {
        match &self.kind {
            PropertyKind::Texture(texture) => {
                material.set_texture(&self.name, texture.texture);
                material.set_texture_offset(&self.name, texture.offset);
                material.set_texture_scale(&self.name, texture.scale);
            }
            PropertyKind::Float(float) => material.set_float(&self.name, float.value),
            PropertyKind::Color(color) => material.set_color(&self.name, color.value),
            PropertyKind::Keyword(keyword) => material.set_keyword(&self.name, keyword.value),
        }
    }

    pub fn as_texture(&self) -> Option<&TextureProperty> {
        match &self.kind {
            PropertyKind::Texture(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn as_texture_mut(&mut self) -> Option<&mut TextureProperty> {
        match &mut self.kind {
            PropertyKind::Texture(texture) => Some(texture),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatProperty {
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorProperty {
    pub value: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordProperty {
    pub value: bool,
}

/// A texture slot with atlas tiling.
///
/// `tile_rect` is in the texture's own pixels; `offset` and `scale` are the
/// normalized values the shader reads.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureProperty {
    info: Arc<TextureInfo>,
    texture: TextureId,
    pub is_normal: bool,
    pub is_main: bool,
    pub auto_scale: bool,
    tile_rect: Rect,
    offset: Vec2,
    scale: Vec2,
}

impl TextureProperty {
    pub fn new(
        property: &str,
        url: &str,
        textures: &TextureLibrary,
        is_normal: bool,
    ) -> Result<Self> {
        let (info, texture) = lookup(property, url, textures, is_normal)?;
        let mut this = Self {
            tile_rect: Rect::new(0.0, 0.0, info.width as f32, info.height as f32),
            info,
            texture,
            is_normal,
            is_main: false,
            auto_scale: false,
            offset: Vec2::ZERO,
            scale: Vec2::ONE,
        };
        this.set_tile(this.tile_rect);
        Ok(this)
    }

    fn load(property: &str, node: &ConfigNode, textures: &TextureLibrary) -> Result<Self> {
        let url: String = node.parse("textureUrl")?;
        let is_normal = node.parse_or("isNormalMap", false)?;

        let mut this = Self::new(property, &url, textures, is_normal)?;
        this.is_main = node.parse_or("isMain", false)?;
        this.auto_scale = node.parse_or("autoScale", false)?;

        let tile_rect = node.parse_or("tileRect", this.tile_rect)?;
        if tile_rect.width <= 0.0 || tile_rect.height <= 0.0 {
            return Err(MaterialError::InvalidTile(format!(
                "tileRect for '{property}' must have a positive size, got {tile_rect:?}"
            )));
        }
        this.set_tile(tile_rect);
        Ok(this)
    }

    /// Swaps the texture asset, keeping the normalized tile selection.
    pub fn set_url(&mut self, property: &str, url: &str, textures: &TextureLibrary) -> Result<()> {
        if url == self.info.url {
            return Ok(());
        }
        let (info, texture) = lookup(property, url, textures, self.is_normal)?;
        self.tile_rect = Rect::new(
            self.offset.x * info.width as f32,
            self.offset.y * info.height as f32,
            self.scale.x * info.width as f32,
            self.scale.y * info.height as f32,
        );
        self.info = info;
        self.texture = texture;
        Ok(())
    }

    pub fn url(&self) -> &str {
        &self.info.url
    }

    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn texture_size(&self) -> Vec2 {
        Vec2::new(self.info.width as f32, self.info.height as f32)
    }

    pub fn tile_rect(&self) -> Rect {
        self.tile_rect
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    /// Selects a sub-rectangle of this texture, in its own pixels.
    pub fn set_tile(&mut self, rect: Rect) {
        let size = self.texture_size().max(Vec2::ONE);
        self.tile_rect = rect;
        self.offset = rect.origin() / size;
        self.scale = rect.size() / size;
    }

    /// Height over width of the active tile.
    pub fn aspect_ratio(&self) -> f32 {
        if self.tile_rect.width <= 0.0 {
            return 1.0;
        }
        self.tile_rect.height / self.tile_rect.width
    }

    /// Stretches the tile scale by the decal footprint so repeated tiles keep
    /// their physical size.
    pub fn update_scale(&self, material: &mut Material, property: &str, size: Vec2) {
        if self.auto_scale {
            material.set_texture_scale(property, self.scale * size);
        }
    }
}

fn lookup(
    property: &str,
    url: &str,
    textures: &TextureLibrary,
    is_normal: bool,
) -> Result<(Arc<TextureInfo>, TextureId)> {
    let info = textures
        .get(url)
        .ok_or_else(|| MaterialError::TextureNotFound {
            property: property.to_string(),
            url: url.to_string(),
        })?;

    let channel = if is_normal {
        TextureChannel::Normal
    } else {
        TextureChannel::Color
    };
    let texture = info
        .channel(channel)
        .ok_or_else(|| MaterialError::MissingChannel {
            property: property.to_string(),
            url: url.to_string(),
            channel,
        })?;

    Ok((info, texture))
}
