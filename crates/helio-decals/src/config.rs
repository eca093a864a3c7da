//! Projector configuration and engine-wide settings.

use crate::{Error, ScaleMode, TargetResolver};
use glam::Vec2;
use helio_core::{ConfigNode, ConfigValue, Rect};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DECAL_SHADER: &str = "ConformalDecals/Decal/Standard";

pub const OPACITY_PROPERTY: &str = "_DecalOpacity";
pub const CUTOFF_PROPERTY: &str = "_Cutoff";
pub const WEAR_PROPERTY: &str = "_EdgeWearStrength";
pub const BASE_NORMAL_KEYWORD: &str = "DECAL_BASE_NORMAL";

/// Node listing shaders decals must never land on.
pub const SHADER_DENYLIST_NODE: &str = "SHADER_DENYLIST";

/// A user-adjustable value: its starting value and allowed range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tunable {
    pub adjustable: bool,
    pub default: f32,
    pub range: Vec2,
}

impl Tunable {
    pub const fn new(default: f32, min: f32, max: f32) -> Self {
        Self {
            adjustable: true,
            default,
            range: Vec2::new(min, max),
        }
    }

    /// Never panics: a NaN bound is ignored rather than propagated.
    pub fn clamp(&self, value: f32) -> f32 {
        let min = self.range.x;
        let max = self.range.y.max(min);
        value.max(min).min(max)
    }

    fn load(&mut self, node: &ConfigNode, name: &str, errors: &mut Vec<Error>) {
        let capitalized = capitalize(name);
        self.adjustable = field(node, &format!("{name}Adjustable"), self.adjustable, errors);

        let key = format!("default{capitalized}");
        let default = field(node, &key, self.default, errors);
        if default.is_finite() {
            self.default = default;
        } else {
            errors.push(non_finite(node, &key));
        }

        let key = format!("{name}Range");
        let range = field(node, &key, self.range, errors);
        if range.is_finite() {
            self.range = range;
        } else {
            errors.push(non_finite(node, &key));
        }
    }
}

/// Atlas region selection for the decal's textures.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum TileSelection {
    #[default]
    Full,
    Rect(Rect),
    Index { index: usize, size: Vec2 },
}

/// Everything a projector reads from its configuration block.
#[derive(Debug, Clone, PartialEq)]
pub struct DecalConfig {
    pub shader: String,
    pub scale: Tunable,
    pub depth: Tunable,
    pub opacity: Tunable,
    pub cutoff: Tunable,
    pub wear: Tunable,
    pub scale_mode: ScaleMode,
    pub use_base_normal: bool,
    pub tile: TileSelection,
    pub update_back_scale: bool,
    pub back_texture_base_scale: Vec2,
    pub project_multiple: bool,
    /// The block itself, holding the material property sub-blocks.
    pub node: ConfigNode,
}

impl Default for DecalConfig {
    fn default() -> Self {
        Self {
            shader: DEFAULT_DECAL_SHADER.to_string(),
            scale: Tunable::new(1.0, 0.0, 5.0),
            depth: Tunable::new(0.1, 0.0, 2.0),
            opacity: Tunable::new(1.0, 0.0, 1.0),
            cutoff: Tunable::new(0.5, 0.0, 1.0),
            wear: Tunable::new(100.0, 0.0, 100.0),
            scale_mode: ScaleMode::Height,
            use_base_normal: true,
            tile: TileSelection::Full,
            update_back_scale: true,
            back_texture_base_scale: Vec2::ONE,
            project_multiple: true,
            node: ConfigNode::new("MODULE"),
        }
    }
}

impl DecalConfig {
    /// Reads a projector block. A malformed value keeps its default and is
    /// reported; it never stops the rest of the block from loading.
    pub fn load(node: &ConfigNode) -> (Self, Vec<Error>) {
        let mut errors = Vec::new();
        let mut config = Self {
            node: node.clone(),
            ..Self::default()
        };

        config.shader = field(node, "shader", config.shader, &mut errors);
        config.scale.load(node, "scale", &mut errors);
        config.depth.load(node, "depth", &mut errors);
        config.opacity.load(node, "opacity", &mut errors);
        config.cutoff.load(node, "cutoff", &mut errors);
        config.wear.load(node, "wear", &mut errors);
        config.scale_mode = field(node, "scaleMode", config.scale_mode, &mut errors);
        config.use_base_normal = field(node, "useBaseNormal", config.use_base_normal, &mut errors);
        config.update_back_scale = field(node, "updateBackScale", config.update_back_scale, &mut errors);
        config.back_texture_base_scale = field(
            node,
            "backTextureBaseScale",
            config.back_texture_base_scale,
            &mut errors,
        );
        config.project_multiple = field(node, "projectMultiple", config.project_multiple, &mut errors);
        config.tile = load_tile(node, &mut errors);

        for error in &errors {
            log::warn!("Decal config '{}': {error}", node.name);
        }
        (config, errors)
    }
}

/// `tile` (or `tileRect`) wins over `tileIndex` + `tileSize`. A rect with a
/// negative origin means "unset".
fn load_tile(node: &ConfigNode, errors: &mut Vec<Error>) -> TileSelection {
    let unset = Rect::new(-1.0, -1.0, 0.0, 0.0);
    let key = if node.has_value("tile") { "tile" } else { "tileRect" };
    let rect = field(node, key, unset, errors);
    if rect.x >= 0.0 && rect.y >= 0.0 {
        return TileSelection::Rect(rect);
    }

    let index: i32 = field(node, "tileIndex", -1, errors);
    if index >= 0 {
        let size = field(node, "tileSize", Vec2::ZERO, errors);
        return TileSelection::Index {
            index: index as usize,
            size,
        };
    }
    TileSelection::Full
}

fn field<T: ConfigValue>(node: &ConfigNode, key: &str, default: T, errors: &mut Vec<Error>) -> T {
    match node.get_value(key) {
        None => default,
        Some(raw) => T::parse_value(raw).unwrap_or_else(|| {
            errors.push(Error::Configuration(format!(
                "invalid value '{raw}' for {}.{key}",
                node.name
            )));
            default
        }),
    }
}

fn non_finite(node: &ConfigNode, key: &str) -> Error {
    Error::Configuration(format!(
        "{}.{key} must be finite, keeping the default",
        node.name
    ))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Engine-wide settings shared by every projector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecalSettings {
    pub shader_denylist: Vec<String>,
}

impl Default for DecalSettings {
    fn default() -> Self {
        Self {
            shader_denylist: vec![
                "KSP/Alpha/Translucent".to_string(),
                "KSP/Alpha/Translucent Specular".to_string(),
                "KSP/Alpha/Unlit Transparent".to_string(),
                "KSP/Particles/Alpha Blended".to_string(),
            ],
        }
    }
}

impl DecalSettings {
    /// Reads `shader = ...` entries from every `SHADER_DENYLIST` child of
    /// `node`. Without any such child the defaults stay in place.
    pub fn load(node: &ConfigNode) -> Self {
        let shaders: Vec<String> = node
            .get_nodes(SHADER_DENYLIST_NODE)
            .flat_map(|list| list.values.iter())
            .filter(|(key, _)| key == "shader")
            .map(|(_, value)| value.trim().to_string())
            .collect();

        if shaders.is_empty() {
            return Self::default();
        }
        log::info!("Loaded {} denylisted decal shader(s)", shaders.len());
        Self {
            shader_denylist: shaders,
        }
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|err| Error::Configuration(err.to_string()))
    }

    pub fn resolver(&self) -> TargetResolver {
        TargetResolver::new(self.shader_denylist.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_values() {
        let (config, errors) = DecalConfig::load(&ConfigNode::new("MODULE"));
        assert!(errors.is_empty());
        assert_eq!(config.shader, DEFAULT_DECAL_SHADER);
        assert_eq!(config.depth.default, 0.1);
        assert_eq!(config.wear.range, Vec2::new(0.0, 100.0));
        assert_eq!(config.tile, TileSelection::Full);
        assert!(config.project_multiple);
    }

    #[test]
    fn reads_ranges_and_modes() {
        let node = ConfigNode::new("MODULE")
            .with_value("defaultScale", 2.0f32)
            .with_value("scaleRange", Vec2::new(0.5, 3.0))
            .with_value("depthAdjustable", false)
            .with_value("scaleMode", "AREA")
            .with_value("useBaseNormal", false);
        let (config, errors) = DecalConfig::load(&node);

        assert!(errors.is_empty());
        assert_eq!(config.scale.default, 2.0);
        assert_eq!(config.scale.clamp(10.0), 3.0);
        assert!(!config.depth.adjustable);
        assert_eq!(config.scale_mode, ScaleMode::Area);
        assert!(!config.use_base_normal);
    }

    #[test]
    fn non_finite_ranges_keep_defaults() {
        let node = ConfigNode::new("MODULE")
            .with_value("scaleRange", "NaN, 5")
            .with_value("defaultDepth", "inf")
            .with_value("defaultWear", 50.0f32);
        let (config, errors) = DecalConfig::load(&node);

        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].to_string().contains("MODULE.scaleRange"));
        assert_eq!(config.scale.range, Vec2::new(0.0, 5.0));
        assert_eq!(config.depth.default, 0.1);
        assert_eq!(config.wear.default, 50.0);
        assert_eq!(config.scale.clamp(2.0), 2.0);
    }

    #[test]
    fn clamp_ignores_nan_bounds() {
        let tunable = Tunable {
            range: Vec2::new(f32::NAN, 5.0),
            ..Tunable::new(1.0, 0.0, 5.0)
        };
        assert_eq!(tunable.clamp(2.0), 2.0);
        assert_eq!(tunable.clamp(9.0), 5.0);
    }

    #[test]
    fn malformed_values_fall_back_per_field() {
        let node = ConfigNode::new("MODULE")
            .with_value("defaultOpacity", "lots")
            .with_value("scaleMode", "DIAGONAL")
            .with_value("defaultCutoff", 0.25f32);
        let (config, errors) = DecalConfig::load(&node);

        assert_eq!(errors.len(), 2);
        assert_eq!(config.opacity.default, 1.0);
        assert_eq!(config.scale_mode, ScaleMode::Height);
        assert_eq!(config.cutoff.default, 0.25);
    }

    #[test]
    fn tile_rect_wins_over_index() {
        let node = ConfigNode::new("MODULE")
            .with_value("tile", Rect::new(0.0, 0.0, 64.0, 32.0))
            .with_value("tileIndex", 3)
            .with_value("tileSize", Vec2::new(16.0, 16.0));
        let (config, _) = DecalConfig::load(&node);
        assert_eq!(config.tile, TileSelection::Rect(Rect::new(0.0, 0.0, 64.0, 32.0)));

        let node = ConfigNode::new("MODULE")
            .with_value("tileIndex", 3)
            .with_value("tileSize", Vec2::new(16.0, 16.0));
        let (config, _) = DecalConfig::load(&node);
        assert_eq!(
            config.tile,
            TileSelection::Index {
                index: 3,
                size: Vec2::new(16.0, 16.0)
            }
        );
    }

    #[test]
    fn malformed_tile_is_reported() {
        let node = ConfigNode::new("MODULE").with_value("tile", "0, 0, wide");
        let (config, errors) = DecalConfig::load(&node);
        assert_eq!(config.tile, TileSelection::Full);
        assert!(matches!(errors.as_slice(), [Error::Configuration(_)]));
    }

    #[test]
    fn settings_read_denylist_nodes() {
        let node = ConfigNode::new("CONFORMALDECALS").with_node(
            ConfigNode::new(SHADER_DENYLIST_NODE)
                .with_value("shader", "Custom/Glass")
                .with_value("shader", "Custom/Hologram"),
        );
        let settings = DecalSettings::load(&node);
        assert_eq!(settings.shader_denylist, ["Custom/Glass", "Custom/Hologram"]);
        assert!(settings.resolver().is_denylisted("Custom/Glass"));

        let defaults = DecalSettings::load(&ConfigNode::new("CONFORMALDECALS"));
        assert!(defaults.resolver().is_denylisted("KSP/Alpha/Translucent"));
    }

    #[test]
    fn settings_from_json() {
        let settings = DecalSettings::from_json(r#"{"shader_denylist":["A/B"]}"#).unwrap();
        assert_eq!(settings.shader_denylist, ["A/B"]);
        assert!(DecalSettings::from_json("{").is_err());
    }
}
