//! Hierarchical key/value configuration blocks.
//!
//! A [`ConfigNode`] is a named block holding ordered `key = value` pairs and
//! nested child blocks. Keys may repeat. Values stay as strings until a typed
//! accessor parses them through [`ConfigValue`], so a malformed value is only
//! an error for the consumer that asks for it.

use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::{HelioError, Rect, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigNode {
    pub name: String,
    #[serde(default)]
    pub values: Vec<(String, String)>,
    #[serde(default)]
    pub nodes: Vec<ConfigNode>,
}

impl ConfigNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builder form of [`ConfigNode::add_value`].
    pub fn with_value(mut self, key: &str, value: impl ConfigValue) -> Self {
        self.add_value(key, value);
        self
    }

    pub fn with_node(mut self, node: ConfigNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn add_value(&mut self, key: &str, value: impl ConfigValue) {
        self.values.push((key.to_string(), value.format_value()));
    }

    /// Replaces the first value under `key`, or appends one.
    pub fn set_value(&mut self, key: &str, value: impl ConfigValue) {
        let formatted = value.format_value();
        match self.values.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = formatted,
            None => self.values.push((key.to_string(), formatted)),
        }
    }

    pub fn add_node(&mut self, node: ConfigNode) {
        self.nodes.push(node);
    }

    pub fn get_value(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_value(&self, key: &str) -> bool {
        self.get_value(key).is_some()
    }

    pub fn get_node(&self, name: &str) -> Option<&ConfigNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn get_nodes<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ConfigNode> + 'a {
        self.nodes.iter().filter(move |n| n.name == name)
    }

    /// Parses a required value.
    pub fn parse<T: ConfigValue>(&self, key: &str) -> Result<T> {
        let raw = self.get_value(key).ok_or_else(|| HelioError::MissingValue {
            node: self.name.clone(),
            key: key.to_string(),
        })?;
        T::parse_value(raw).ok_or_else(|| self.malformed(key, raw))
    }

    /// Parses an optional value. A missing key yields `default`; a present but
    /// malformed value is still an error.
    pub fn parse_or<T: ConfigValue>(&self, key: &str, default: T) -> Result<T> {
        match self.get_value(key) {
            None => Ok(default),
            Some(raw) => T::parse_value(raw).ok_or_else(|| self.malformed(key, raw)),
        }
    }

    fn malformed(&self, key: &str, raw: &str) -> HelioError {
        HelioError::InvalidConfiguration(format!(
            "could not parse {}.{} from '{}'",
            self.name, key, raw
        ))
    }
}

/// A value that can be stored in a [`ConfigNode`].
pub trait ConfigValue: Sized {
    fn parse_value(raw: &str) -> Option<Self>;
    fn format_value(&self) -> String;
}

fn parse_floats<const N: usize>(raw: &str) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    let mut parts = raw.split(',').map(str::trim);
    for slot in out.iter_mut() {
        *slot = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

fn format_floats(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl ConfigValue for String {
    fn parse_value(raw: &str) -> Option<Self> {
        Some(raw.trim().to_string())
    }

    fn format_value(&self) -> String {
        self.clone()
    }
}

/// Write-only; read text back as `String`.
impl ConfigValue for &str {
    fn parse_value(_raw: &str) -> Option<Self> {
        None
    }

    fn format_value(&self) -> String {
        self.to_string()
    }
}

impl ConfigValue for bool {
    fn parse_value(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }

    fn format_value(&self) -> String {
        self.to_string()
    }
}

macro_rules! impl_config_value_from_str {
    ($($ty:ty),*) => {
        $(
            impl ConfigValue for $ty {
                fn parse_value(raw: &str) -> Option<Self> {
                    raw.trim().parse().ok()
                }

                fn format_value(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_config_value_from_str!(f32, i32, u32, usize);

impl ConfigValue for Vec2 {
    fn parse_value(raw: &str) -> Option<Self> {
        parse_floats::<2>(raw).map(Vec2::from_array)
    }

    fn format_value(&self) -> String {
        format_floats(&self.to_array())
    }
}

impl ConfigValue for Vec3 {
    fn parse_value(raw: &str) -> Option<Self> {
        parse_floats::<3>(raw).map(Vec3::from_array)
    }

    fn format_value(&self) -> String {
        format_floats(&self.to_array())
    }
}

/// Colors are `r, g, b` or `r, g, b, a`; alpha defaults to 1.
impl ConfigValue for Vec4 {
    fn parse_value(raw: &str) -> Option<Self> {
        parse_floats::<4>(raw)
            .map(Vec4::from_array)
            .or_else(|| parse_floats::<3>(raw).map(|rgb| Vec3::from_array(rgb).extend(1.0)))
    }

    fn format_value(&self) -> String {
        format_floats(&self.to_array())
    }
}

/// `x, y, width, height`.
impl ConfigValue for Rect {
    fn parse_value(raw: &str) -> Option<Self> {
        parse_floats::<4>(raw).map(|[x, y, w, h]| Rect::new(x, y, w, h))
    }

    fn format_value(&self) -> String {
        format_floats(&[self.x, self.y, self.width, self.height])
    }
}

/// Sixteen floats in column-major order.
impl ConfigValue for Mat4 {
    fn parse_value(raw: &str) -> Option<Self> {
        parse_floats::<16>(raw).map(|cols| Mat4::from_cols_array(&cols))
    }

    fn format_value(&self) -> String {
        format_floats(&self.to_cols_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_optional_value_uses_default() {
        let node = ConfigNode::new("MODULE");
        assert_eq!(node.parse_or("scale", 1.5f32).unwrap(), 1.5);
        assert!(node.parse::<f32>("scale").is_err());
    }

    #[test]
    fn malformed_optional_value_is_an_error() {
        let node = ConfigNode::new("MODULE").with_value("tile", "0, 0, wide");
        let err = node.parse_or("tile", Rect::default()).unwrap_err();
        assert!(err.to_string().contains("MODULE.tile"));
    }

    #[test]
    fn parses_typed_values() {
        let node = ConfigNode::new("MODULE")
            .with_value("useBaseNormal", "False")
            .with_value("tile", "0, 64, 128, 32")
            .with_value("rimColor", "0.5, 0.25, 1");

        assert!(!node.parse::<bool>("useBaseNormal").unwrap());
        assert_eq!(node.parse::<Rect>("tile").unwrap(), Rect::new(0.0, 64.0, 128.0, 32.0));
        assert_eq!(
            node.parse::<Vec4>("rimColor").unwrap(),
            Vec4::new(0.5, 0.25, 1.0, 1.0)
        );
    }

    #[test]
    fn matrix_survives_format_and_parse() {
        let m = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0, 0.5, 0.25, 0.125, 1.0,
        ]);
        let node = ConfigNode::new("TARGET").with_value("decalMatrix", m);

        assert_eq!(node.parse::<Mat4>("decalMatrix").unwrap(), m);
        assert!(Mat4::parse_value("1, 2, 3").is_none());
    }

    #[test]
    fn loads_nested_blocks_from_json() {
        let json = r#"{
            "name": "MODULE",
            "values": [["shader", "Decal/Standard"]],
            "nodes": [{ "name": "FLOAT", "values": [["name", "_Cutoff"], ["value", "0.25"]] }]
        }"#;
        let node = ConfigNode::from_json(json).unwrap();

        assert_eq!(node.get_value("shader"), Some("Decal/Standard"));
        let float = node.get_node("FLOAT").unwrap();
        assert_eq!(float.parse::<f32>("value").unwrap(), 0.25);
        assert!(float.nodes.is_empty());
    }
}
