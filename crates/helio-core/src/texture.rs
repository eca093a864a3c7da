use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Opaque handle to a texture in the TextureLibrary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureId(u32);

impl TextureId {
    /// Flat tangent-space normal (0.5, 0.5, 1.0), always present.
    pub const BLANK_NORMAL: TextureId = TextureId(0);

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Which variant of a texture asset a consumer wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureChannel {
    Color,
    Normal,
}

/// A texture asset known to the host, possibly with a normal-map conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub texture: Option<TextureId>,
    pub normal_map: Option<TextureId>,
}

impl TextureInfo {
    pub fn channel(&self, channel: TextureChannel) -> Option<TextureId> {
        match channel {
            TextureChannel::Color => self.texture,
            TextureChannel::Normal => self.normal_map,
        }
    }
}

/// Host texture database. Loading pixels is the host's job; the library only
/// tracks which urls exist, their dimensions and their channel handles.
pub struct TextureLibrary {
    textures: Vec<Arc<TextureInfo>>,
    id_map: HashMap<String, usize>,
    next_id: u32,
}

impl TextureLibrary {
    pub fn new() -> Self {
        Self {
            textures: Vec::new(),
            id_map: HashMap::new(),
            next_id: TextureId::BLANK_NORMAL.0 + 1,
        }
    }

    /// Registers a color texture. Re-registering a url returns the existing handle.
    pub fn register(&mut self, url: &str, width: u32, height: u32) -> TextureId {
        if let Some(id) = self.get(url).and_then(|info| info.texture) {
            return id;
        }
        let id = self.allocate();
        self.upsert(url, width, height, |info| info.texture = Some(id));
        id
    }

    /// Registers a texture together with its normal-map conversion.
    pub fn register_with_normal_map(&mut self, url: &str, width: u32, height: u32) -> (TextureId, TextureId) {
        let color = self.register(url, width, height);
        if let Some(normal) = self.get(url).and_then(|info| info.normal_map) {
            return (color, normal);
        }
        let normal = self.allocate();
        self.upsert(url, width, height, |info| info.normal_map = Some(normal));
        (color, normal)
    }

    pub fn get(&self, url: &str) -> Option<Arc<TextureInfo>> {
        self.id_map.get(url).map(|&index| self.textures[index].clone())
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    fn allocate(&mut self) -> TextureId {
        let id = TextureId(self.next_id);
        self.next_id += 1;
        id
    }

    fn upsert(&mut self, url: &str, width: u32, height: u32, apply: impl FnOnce(&mut TextureInfo)) {
        let index = match self.id_map.get(url) {
            Some(&index) => index,
            None => {
                self.textures.push(Arc::new(TextureInfo {
                    url: url.to_string(),
                    width,
                    height,
                    texture: None,
                    normal_map: None,
                }));
                self.id_map.insert(url.to_string(), self.textures.len() - 1);
                self.textures.len() - 1
            }
        };
        apply(Arc::make_mut(&mut self.textures[index]));
        log::trace!("Registered texture '{}' ({}x{})", url, width, height);
    }
}

impl Default for TextureLibrary {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_twice_reuses_handle() {
        let mut library = TextureLibrary::new();
        let a = library.register("Decals/stripe", 256, 64);
        let b = library.register("Decals/stripe", 256, 64);

        assert_eq!(a, b);
        assert_eq!(library.len(), 1);
        assert_ne!(a, TextureId::BLANK_NORMAL);
    }

    #[test]
    fn normal_channel_only_exists_when_registered() {
        let mut library = TextureLibrary::new();
        library.register("Decals/plain", 128, 128);
        let (_, normal) = library.register_with_normal_map("Decals/bumpy", 128, 128);

        let plain = library.get("Decals/plain").unwrap();
        let bumpy = library.get("Decals/bumpy").unwrap();
        assert_eq!(plain.channel(TextureChannel::Normal), None);
        assert_eq!(bumpy.channel(TextureChannel::Normal), Some(normal));
    }
}
