use crate::MaterialParameter;
use glam::{Mat4, Vec4};
use helio_core::TextureId;
use std::collections::BTreeMap;

/// Per-draw parameter overrides layered on top of a shared [`crate::Material`].
///
/// Lets one material render onto many surfaces with different values without
/// mutating the material itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBlock {
    parameters: BTreeMap<String, MaterialParameter>,
}

impl PropertyBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: MaterialParameter) {
        match self.parameters.get_mut(name) {
            Some(slot) => *slot = value,
            None => {
                self.parameters.insert(name.to_string(), value);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&MaterialParameter> {
        self.parameters.get(name)
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

    pub fn set_vector(&mut self, name: &str, value: Vec4) {
        self.set(name, MaterialParameter::Vec4(value));
    }

    pub fn vector(&self, name: &str) -> Option<Vec4> {
        match self.get(name)? {
            MaterialParameter::Vec4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn set_matrix(&mut self, name: &str, value: Mat4) {
        self.set(name, MaterialParameter::Matrix(value));
    }

    pub fn matrix(&self, name: &str) -> Option<Mat4> {
        match self.get(name)? {
            MaterialParameter::Matrix(m) => Some(*m),
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

    pub fn remove(&mut self, name: &str) -> Option<MaterialParameter> {
        self.parameters.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MaterialParameter)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
