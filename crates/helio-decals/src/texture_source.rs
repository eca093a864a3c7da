//! Where a projector's decal image comes from.

use serde::{Deserialize, Serialize};

/// Flag shown when no mission flag has been chosen.
pub const DEFAULT_FLAG_URL: &str = "Squad/Flags/default";

/// Texture property a flag image is written to.
pub const FLAG_TEXTURE_PROPERTY: &str = "_Decal";

/// The decal image source of one projector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum TextureSource {
    /// Textures come from the projector's configuration and never change.
    #[default]
    Constant,
    /// The image follows the mission flag unless a custom flag is picked.
    Flag(FlagTexture),
}

impl TextureSource {
    pub fn flag() -> Self {
        TextureSource::Flag(FlagTexture::default())
    }

    /// The URL to bind to [`FLAG_TEXTURE_PROPERTY`], if this source drives one.
    pub fn texture_url(&self) -> Option<&str> {
        match self {
            TextureSource::Constant => None,
            TextureSource::Flag(flag) => Some(flag.active_url()),
        }
    }

    pub fn as_flag_mut(&mut self) -> Option<&mut FlagTexture> {
        match self {
            TextureSource::Constant => None,
            TextureSource::Flag(flag) => Some(flag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagTexture {
    /// Custom flag URL, persisted.
    pub flag_url: String,
    pub use_custom_flag: bool,
    mission_flag_url: String,
}

impl FlagTexture {
    pub fn new(mission_flag_url: impl Into<String>) -> Self {
        let mission_flag_url = mission_flag_url.into();
        Self {
            flag_url: mission_flag_url.clone(),
            use_custom_flag: false,
            mission_flag_url,
        }
    }

    pub fn mission_flag_url(&self) -> &str {
        &self.mission_flag_url
    }

    /// An empty URL falls back to [`DEFAULT_FLAG_URL`]. Returns whether the
    /// displayed image changes.
    pub fn set_mission_flag(&mut self, url: &str) -> bool {
        self.mission_flag_url = if url.is_empty() {
            DEFAULT_FLAG_URL.to_string()
        } else {
            url.to_string()
        };
        !self.use_custom_flag
    }

    pub fn select_custom(&mut self, url: &str) {
        self.flag_url = url.to_string();
        self.use_custom_flag = true;
    }

    /// Returns to the mission flag.
    pub fn reset(&mut self) {
        self.flag_url = self.mission_flag_url.clone();
        self.use_custom_flag = false;
    }

    pub fn active_url(&self) -> &str {
        if self.use_custom_flag {
            &self.flag_url
        } else {
            &self.mission_flag_url
        }
    }
}

impl Default for FlagTexture {
    fn default() -> Self {
        Self::new(DEFAULT_FLAG_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_flag_overrides_mission_flag_until_reset() {
        let mut flag = FlagTexture::default();
        assert_eq!(flag.active_url(), DEFAULT_FLAG_URL);

        flag.select_custom("Flags/rocket");
        assert!(!flag.set_mission_flag("Flags/agency"));
        assert_eq!(flag.active_url(), "Flags/rocket");

        flag.reset();
        assert_eq!(flag.active_url(), "Flags/agency");
        assert_eq!(flag.flag_url, "Flags/agency");
    }

    #[test]
    fn empty_mission_flag_falls_back_to_default() {
        let mut flag = FlagTexture::new("Flags/agency");
        assert!(flag.set_mission_flag(""));
        assert_eq!(flag.active_url(), DEFAULT_FLAG_URL);
    }

    #[test]
    fn constant_source_has_no_url() {
        assert_eq!(TextureSource::Constant.texture_url(), None);
        assert_eq!(TextureSource::flag().texture_url(), Some(DEFAULT_FLAG_URL));
    }
}
