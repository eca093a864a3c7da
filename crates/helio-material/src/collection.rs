use crate::{
    ColorProperty, FloatProperty, KeywordProperty, Material, MaterialError, MaterialProperty,
    PropertyKind, Result, TextureProperty,
};
use glam::{Vec2, Vec4};
use helio_core::{ConfigNode, Rect, TextureLibrary};
use std::collections::BTreeMap;

/// Keyword enabled only on the preview material.
pub const DECAL_PREVIEW_KEYWORD: &str = "DECAL_PREVIEW";

/// Ordered, name-keyed set of material properties and the two materials built
/// from them.
///
/// The decal material is what projections render with; the preview material
/// is shown on the decal's own model while it is not attached to anything.
/// Both are owned here and never shared between collections.
#[derive(Debug, Clone)]
pub struct MaterialPropertyCollection {
    properties: BTreeMap<String, MaterialProperty>,
    main_texture: Option<String>,
    footprint: Vec2,
    decal_material: Material,
    preview_material: Material,
}

impl MaterialPropertyCollection {
    pub fn new(shader: &str) -> Self {
        let mut preview_material = Material::new("preview", shader);
        preview_material.enable_keyword(DECAL_PREVIEW_KEYWORD);

        Self {
            properties: BTreeMap::new(),
            main_texture: None,
            footprint: Vec2::ONE,
            decal_material: Material::new("decal", shader),
            preview_material,
        }
    }

    pub fn shader(&self) -> &str {
        self.decal_material.shader()
    }

    pub fn set_shader(&mut self, shader: &str) {
        self.decal_material.set_shader(shader);
        self.preview_material.set_shader(shader);
    }

    pub fn render_queue(&self) -> i32 {
        self.decal_material.render_queue()
    }

    pub fn set_render_queue(&mut self, queue: i32) {
        self.decal_material.set_render_queue(queue);
    }

    pub fn decal_material(&self) -> &Material {
        &self.decal_material
    }

    pub fn preview_material(&self) -> &Material {
        &self.preview_material
    }

    /// Loads every property block in `node`. A block that fails to load is
    /// skipped and its error returned; the rest still load.
    pub fn load(&mut self, node: &ConfigNode, textures: &TextureLibrary) -> Vec<MaterialError> {
        let mut errors = Vec::new();
        for child in &node.nodes {
            match MaterialProperty::load(child, textures) {
                Ok(property) => self.add_property(property),
                Err(MaterialError::UnknownPropertyType(_)) => {
                    log::trace!("Ignoring non-property block '{}'", child.name);
                }
                Err(err) => {
                    log::error!("Failed to load material property: {err}");
                    errors.push(err);
                }
            }
        }
        errors
    }

    /// Inserts or replaces a property. A main texture becomes the aspect-ratio source.
    pub fn add_property(&mut self, property: MaterialProperty) {
        let name = property.name().to_string();
        let is_main = property.as_texture().is_some_and(|t| t.is_main);
        self.properties.insert(name.clone(), property);
        self.update_main(&name, is_main);
    }

    /// At most one texture is main: promoting `name` demotes the others, and
    /// demoting the current main leaves the collection without one.
    fn update_main(&mut self, name: &str, is_main: bool) {
        if is_main {
            for (key, property) in self.properties.iter_mut() {
                if let Some(texture) = property.as_texture_mut() {
                    texture.is_main = key == name;
                }
            }
            self.main_texture = Some(name.to_string());
        } else if self.main_texture.as_deref() == Some(name) {
            self.main_texture = None;
        }
    }

    pub fn property(&self, name: &str) -> Option<&MaterialProperty> {
        self.properties.get(name)
    }

    pub fn remove_property(&mut self, name: &str) -> Option<MaterialProperty> {
        if self.main_texture.as_deref() == Some(name) {
            self.main_texture = None;
        }
        self.properties.remove(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = &MaterialProperty> {
        self.properties.values()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn float_mut(&mut self, name: &str) -> Result<&mut FloatProperty> {
        match &mut self.add_or_get(name, || PropertyKind::Float(FloatProperty { value: 0.0 })).kind {
            PropertyKind::Float(float) => Ok(float),
            other => Err(mismatch(name, "float", other)),
        }
    }

    pub fn color_mut(&mut self, name: &str) -> Result<&mut ColorProperty> {
        match &mut self.add_or_get(name, || PropertyKind::Color(ColorProperty { value: Vec4::ONE })).kind {
            PropertyKind::Color(color) => Ok(color),
            other => Err(mismatch(name, "color", other)),
        }
    }

    pub fn keyword_mut(&mut self, name: &str) -> Result<&mut KeywordProperty> {
        match &mut self.add_or_get(name, || PropertyKind::Keyword(KeywordProperty { value: false })).kind {
            PropertyKind::Keyword(keyword) => Ok(keyword),
            other => Err(mismatch(name, "keyword", other)),
        }
    }

    fn add_or_get(
        &mut self,
        name: &str,
        default: impl FnOnce() -> PropertyKind,
    ) -> &mut MaterialProperty {
        self.properties
            .entry(name.to_string())
            .or_insert_with(|| MaterialProperty::new(name, default()))
    }

    /// Points texture property `name` at `url`, creating it if needed. Used
    /// when the decal image is chosen at runtime rather than by config.
    pub fn set_texture_url(
        &mut self,
        name: &str,
        url: &str,
        textures: &TextureLibrary,
        is_main: bool,
    ) -> Result<()> {
        match self.properties.get_mut(name) {
            Some(property) => {
                let actual = property.kind.type_name();
                let texture = property
                    .as_texture_mut()
                    .ok_or_else(|| MaterialError::TypeMismatch {
                        name: name.to_string(),
                        expected: "texture",
                        actual,
                    })?;
                texture.set_url(name, url, textures)?;
                texture.is_main = is_main;
            }
            None => {
                let mut texture = TextureProperty::new(name, url, textures, false)?;
                texture.is_main = is_main;
                self.properties.insert(
                    name.to_string(),
                    MaterialProperty::new(name, PropertyKind::Texture(texture)),
                );
            }
        }
        self.update_main(name, is_main);
        Ok(())
    }

    pub fn main_texture(&self) -> Option<&TextureProperty> {
        self.main_texture
            .as_deref()
            .and_then(|name| self.properties.get(name))
            .and_then(MaterialProperty::as_texture)
    }

    /// Height over width of the main texture's active tile, or 1 without one.
    pub fn aspect_ratio(&self) -> f32 {
        self.main_texture().map_or(1.0, TextureProperty::aspect_ratio)
    }

    /// Selects an atlas region, in main-texture pixels, on every texture.
    pub fn update_tile_rect(&mut self, tile: Rect) -> Result<()> {
        if tile.width <= 0.0 || tile.height <= 0.0 {
            return Err(MaterialError::InvalidTile(format!(
                "tile must have a positive size, got {tile:?}"
            )));
        }
        let main_size = self
            .main_texture()
            .map(TextureProperty::texture_size)
            .ok_or_else(|| MaterialError::InvalidTile("no main texture to tile".into()))?;

        let offset = tile.origin() / main_size;
        let scale = tile.size() / main_size;
        for texture in self.properties.values_mut().filter_map(MaterialProperty::as_texture_mut) {
            let size = texture.texture_size();
            let origin = offset * size;
            let extent = scale * size;
            texture.set_tile(Rect::new(origin.x, origin.y, extent.x, extent.y));
        }
        log::debug!("Updated decal tile to {tile:?}");
        Ok(())
    }

    /// Selects atlas tile `index`, counting row-major from the top-left of the
    /// main texture. Row 0 is the top row, so its rect starts at
    /// `height - tile_size.y` in the bottom-left pixel space of [`Rect`].
    pub fn update_tile_index(&mut self, index: usize, tile_size: Vec2) -> Result<()> {
        let main_size = self
            .main_texture()
            .map(TextureProperty::texture_size)
            .ok_or_else(|| MaterialError::InvalidTile("no main texture to tile".into()))?;
        if tile_size.x <= 0.0 || tile_size.y <= 0.0 {
            return Err(MaterialError::InvalidTile(format!(
                "tile size must be positive, got {tile_size}"
            )));
        }

        let columns = (main_size.x / tile_size.x).floor() as usize;
        if columns == 0 {
            return Err(MaterialError::InvalidTile(format!(
                "tile size {tile_size} is wider than the texture"
            )));
        }
        let column = index % columns;
        let row = index / columns;
        let y = main_size.y - (row as f32 + 1.0) * tile_size.y;
        if y < 0.0 {
            return Err(MaterialError::InvalidTile(format!(
                "tile index {index} is outside the atlas"
            )));
        }

        self.update_tile_rect(Rect::new(
            column as f32 * tile_size.x,
            y,
            tile_size.x,
            tile_size.y,
        ))
    }

    /// Propagates the decal footprint to every auto-scaling texture.
    pub fn update_scale(&mut self, size: Vec2) {
        self.footprint = size;
        for property in self.properties.values() {
            if let Some(texture) = property.as_texture() {
                texture.update_scale(&mut self.decal_material, property.name(), size);
                texture.update_scale(&mut self.preview_material, property.name(), size);
            }
        }
    }

    /// Rewrites both materials from the current property values.
    pub fn update_materials(&mut self) {
        for property in self.properties.values() {
            property.apply(&mut self.decal_material);
            property.apply(&mut self.preview_material);
        }
        self.preview_material.enable_keyword(DECAL_PREVIEW_KEYWORD);
        let footprint = self.footprint;
        self.update_scale(footprint);
    }
}

fn mismatch(name: &str, expected: &'static str, actual: &PropertyKind) -> MaterialError {
    MaterialError::TypeMismatch {
        name: name.to_string(),
        expected,
        actual: actual.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FLOAT_NODE, KEYWORD_NODE, TEXTURE_NODE};

    fn library() -> TextureLibrary {
        let mut textures = TextureLibrary::new();
        textures.register("Decals/atlas", 1024, 512);
        textures.register("Decals/flag", 256, 160);
        textures
    }

    fn config() -> ConfigNode {
        ConfigNode::new("MODULE")
            .with_node(
                ConfigNode::new(TEXTURE_NODE)
                    .with_value("name", "_Decal")
                    .with_value("textureUrl", "Decals/atlas")
                    .with_value("isMain", true)
                    .with_value("autoScale", true),
            )
            .with_node(
                ConfigNode::new(TEXTURE_NODE)
                    .with_value("name", "_SpecMap")
                    .with_value("textureUrl", "Decals/missing"),
            )
            .with_node(
                ConfigNode::new(FLOAT_NODE)
                    .with_value("name", "_Shininess")
                    .with_value("value", 0.4f32),
            )
            .with_node(
                ConfigNode::new(KEYWORD_NODE)
                    .with_value("name", "DECAL_SPECMAP")
                    .with_value("value", false),
            )
    }

    #[test]
    fn failed_property_does_not_stop_the_rest() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut collection = MaterialPropertyCollection::new("Decal/Standard");
        let errors = collection.load(&config(), &library());

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Decals/missing"));
        assert_eq!(collection.len(), 3);
        assert!(collection.property("_SpecMap").is_none());
        assert!(collection.main_texture().is_some());
    }

    #[test]
    fn applying_twice_gives_identical_snapshots() {
        let mut collection = MaterialPropertyCollection::new("Decal/Standard");
        collection.load(&config(), &library());
        collection.update_scale(Vec2::new(0.5, 0.25));

        collection.update_materials();
        let decal = collection.decal_material().snapshot();
        let preview = collection.preview_material().snapshot();

        collection.update_materials();
        assert_eq!(collection.decal_material().snapshot(), decal);
        assert_eq!(collection.preview_material().snapshot(), preview);
    }

    #[test]
    fn preview_differs_only_by_keyword() {
        let mut collection = MaterialPropertyCollection::new("Decal/Standard");
        collection.load(&config(), &library());
        collection.update_materials();

        let decal = collection.decal_material();
        let preview = collection.preview_material();
        assert!(preview.is_keyword_enabled(DECAL_PREVIEW_KEYWORD));
        assert!(!decal.is_keyword_enabled(DECAL_PREVIEW_KEYWORD));
        assert_eq!(decal.snapshot().parameters, preview.snapshot().parameters);
    }

    #[test]
    fn tile_index_counts_from_top_left() {
        let mut collection = MaterialPropertyCollection::new("Decal/Standard");
        collection.load(&config(), &library());

        collection.update_tile_index(5, Vec2::new(256.0, 128.0)).unwrap();
        let main = collection.main_texture().unwrap();
        assert_eq!(main.tile_rect(), Rect::new(256.0, 256.0, 256.0, 128.0));
        assert_eq!(main.offset(), Vec2::new(0.25, 0.5));
        assert_eq!(main.scale(), Vec2::new(0.25, 0.25));
        assert_eq!(collection.aspect_ratio(), 0.5);

        assert!(collection.update_tile_index(16, Vec2::new(256.0, 128.0)).is_err());
    }

    #[test]
    fn auto_scale_survives_material_rebuild() {
        let mut collection = MaterialPropertyCollection::new("Decal/Standard");
        collection.load(&config(), &library());
        collection.update_tile_rect(Rect::new(0.0, 0.0, 512.0, 256.0)).unwrap();
        collection.update_materials();
        collection.update_scale(Vec2::new(2.0, 1.0));
        collection.update_materials();

        assert_eq!(
            collection.decal_material().texture_scale("_Decal"),
            Vec2::new(1.0, 0.5)
        );
    }

    #[test]
    fn type_mismatch_is_reported() {
        let mut collection = MaterialPropertyCollection::new("Decal/Standard");
        collection.float_mut("_Cutoff").unwrap().value = 0.5;

        assert!(collection.keyword_mut("_Cutoff").is_err());
        assert_eq!(collection.float_mut("_Cutoff").unwrap().value, 0.5);
    }

    #[test]
    fn runtime_texture_swap_keeps_it_main() {
        let textures = library();
        let mut collection = MaterialPropertyCollection::new("Decal/Flag");
        collection.set_texture_url("_Decal", "Decals/flag", &textures, true).unwrap();

        assert_eq!(collection.main_texture().unwrap().url(), "Decals/flag");
        assert!((collection.aspect_ratio() - 160.0 / 256.0).abs() < 1e-6);
        assert!(collection
            .set_texture_url("_Decal", "Decals/nowhere", &textures, true)
            .is_err());
        assert_eq!(collection.main_texture().unwrap().url(), "Decals/flag");
    }

    #[test]
    fn only_one_texture_stays_main() {
        let textures = library();
        let mut collection = MaterialPropertyCollection::new("Decal/Standard");
        collection.load(&config(), &textures);
        assert_eq!(collection.main_texture().unwrap().url(), "Decals/atlas");

        collection.set_texture_url("_Flag", "Decals/flag", &textures, true).unwrap();
        assert_eq!(collection.main_texture().unwrap().url(), "Decals/flag");
        let decal = collection.property("_Decal").and_then(MaterialProperty::as_texture).unwrap();
        assert!(!decal.is_main);

        collection.set_texture_url("_Flag", "Decals/flag", &textures, false).unwrap();
        assert!(collection.main_texture().is_none());
        assert_eq!(collection.aspect_ratio(), 1.0);
    }
}
