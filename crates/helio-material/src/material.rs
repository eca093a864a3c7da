use glam::{Mat4, Vec2, Vec3, Vec4};
use helio_core::TextureId;
use std::collections::{BTreeMap, BTreeSet};

/// A single shader parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MaterialParameter {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Color(Vec4),
    Matrix(Mat4),
    Texture(TextureId),
}

impl MaterialParameter {
    /// Raw bit pattern of the value, used for exact comparisons.
    pub fn bits(&self) -> Vec<u32> {
        fn floats(values: &[f32]) -> Vec<u32> {
            values.iter().map(|v| v.to_bits()).collect()
        }

        match self {
            MaterialParameter::Float(v) => vec![v.to_bits()],
            MaterialParameter::Vec2(v) => floats(&v.to_array()),
            MaterialParameter::Vec3(v) => floats(&v.to_array()),
            MaterialParameter::Vec4(v) | MaterialParameter::Color(v) => floats(&v.to_array()),
            MaterialParameter::Matrix(m) => floats(&m.to_cols_array()),
            MaterialParameter::Texture(id) => vec![id.raw()],
        }
    }
}

/// Suffix of the per-texture `(scale.x, scale.y, offset.x, offset.y)` vector.
pub const TEXTURE_ST_SUFFIX: &str = "_ST";

/// Runtime material: a shader id plus the parameter values and keywords fed to it.
///
/// Texture tiling is stored the way shaders consume it, as a `<name>_ST` vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    shader: String,
    render_queue: i32,
    parameters: BTreeMap<String, MaterialParameter>,
    keywords: BTreeSet<String>,
}

impl Material {
    pub fn new(name: impl Into<String>, shader: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shader: shader.into(),
            render_queue: 2000,
            parameters: BTreeMap::new(),
            keywords: BTreeSet::new(),
        }
    }

    pub fn shader(&self) -> &str {
        &self.shader
    }

    pub fn set_shader(&mut self, shader: impl Into<String>) {
        self.shader = shader.into();
    }

    pub fn render_queue(&self) -> i32 {
        self.render_queue
    }

    pub fn set_render_queue(&mut self, queue: i32) {
        self.render_queue = queue;
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MaterialParameter> {
        self.parameters.get(name)
    }

    pub fn set(&mut self, name: &str, value: MaterialParameter) {
        match self.parameters.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.parameters.insert(name.to_string(), value);
            }
        }
    }

    pub fn set_float(&mut self, name: &str, value: f32) {
        self.set(name, MaterialParameter::Float(value));
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            MaterialParameter::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn set_color(&mut self, name: &str, value: Vec4) {
        self.set(name, MaterialParameter::Color(value));
    }

    pub fn color(&self, name: &str) -> Option<Vec4> {
        match self.get(name)? {
            MaterialParameter::Color(v) => Some(*v),
            _ => None,
        }
    }

    pub fn set_texture(&mut self, name: &str, texture: TextureId) {
        self.set(name, MaterialParameter::Texture(texture));
    }

    pub fn texture(&self, name: &str) -> Option<TextureId> {
        match self.get(name)? {
            MaterialParameter::Texture(id) => Some(*id),
            _ => None,
        }
    }

    pub fn set_texture_scale(&mut self, name: &str, scale: Vec2) {
        let offset = self.texture_offset(name);
        self.set_texture_st(name, scale, offset);
    }

    pub fn set_texture_offset(&mut self, name: &str, offset: Vec2) {
        let scale = self.texture_scale(name);
        self.set_texture_st(name, scale, offset);
    }

    /// Defaults to `(1, 1)` when the texture has never been tiled.
    pub fn texture_scale(&self, name: &str) -> Vec2 {
        self.texture_st(name).map_or(Vec2::ONE, |st| Vec2::new(st.x, st.y))
    }

    pub fn texture_offset(&self, name: &str) -> Vec2 {
        self.texture_st(name).map_or(Vec2::ZERO, |st| Vec2::new(st.z, st.w))
    }

    fn texture_st(&self, name: &str) -> Option<Vec4> {
        match self.get(&format!("{name}{TEXTURE_ST_SUFFIX}"))? {
            MaterialParameter::Vec4(st) => Some(*st),
            _ => None,
        }
    }

    fn set_texture_st(&mut self, name: &str, scale: Vec2, offset: Vec2) {
        self.set(
            &format!("{name}{TEXTURE_ST_SUFFIX}"),
            MaterialParameter::Vec4(Vec4::new(scale.x, scale.y, offset.x, offset.y)),
        );
    }

    pub fn enable_keyword(&mut self, keyword: &str) {
        if !self.keywords.contains(keyword) {
            self.keywords.insert(keyword.to_string());
        }
    }

    pub fn disable_keyword(&mut self, keyword: &str) {
        self.keywords.remove(keyword);
    }

    pub fn set_keyword(&mut self, keyword: &str, enabled: bool) {
        if enabled {
            self.enable_keyword(keyword);
        } else {
            self.disable_keyword(keyword);
        }
    }

    pub fn is_keyword_enabled(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword)
    }

    /// Exact, ordered view of everything a shader would see.
    pub fn snapshot(&self) -> MaterialSnapshot {
        MaterialSnapshot {
            shader: self.shader.clone(),
            render_queue: self.render_queue,
            keywords: self.keywords.iter().cloned().collect(),
            parameters: self
                .parameters
                .iter()
                .map(|(name, value)| (name.clone(), value.bits()))
                .collect(),
        }
    }
}

/// Bit-exact capture of a material's state. Two snapshots compare equal only
/// if every parameter has the same bit pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialSnapshot {
    pub shader: String,
    pub render_queue: i32,
    pub keywords: Vec<String>,
    pub parameters: Vec<(String, Vec<u32>)>,
}
