//! Projection math: decal footprint from scale mode, and the decal-space
//! frame of a target surface.

use glam::{Mat4, Quat, Vec2, Vec3};
use helio_core::{Aabb, ConfigValue};
use serde::{Deserialize, Serialize};

/// Floor applied to scale, depth and aspect ratio.
pub const MIN_PROJECTION_SIZE: f32 = 0.01;

/// How the user-facing `scale` value maps onto the decal's width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScaleMode {
    #[default]
    Height,
    Width,
    Average,
    Area,
    Minimum,
    Maximum,
}

impl ConfigValue for ScaleMode {
    fn parse_value(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HEIGHT" => Some(ScaleMode::Height),
            "WIDTH" => Some(ScaleMode::Width),
            "AVERAGE" => Some(ScaleMode::Average),
            "AREA" => Some(ScaleMode::Area),
            "MINIMUM" => Some(ScaleMode::Minimum),
            "MAXIMUM" => Some(ScaleMode::Maximum),
            _ => None,
        }
    }

    fn format_value(&self) -> String {
        match self {
            ScaleMode::Height => "HEIGHT",
            ScaleMode::Width => "WIDTH",
            ScaleMode::Average => "AVERAGE",
            ScaleMode::Area => "AREA",
            ScaleMode::Minimum => "MINIMUM",
            ScaleMode::Maximum => "MAXIMUM",
        }
        .to_string()
    }
}

/// Decal width and height for `scale` under `mode`. `aspect_ratio` is height
/// over width of the decal image.
pub fn decal_size(scale: f32, aspect_ratio: f32, mode: ScaleMode) -> Vec2 {
    let scale = scale.max(MIN_PROJECTION_SIZE);
    let aspect = aspect_ratio.max(MIN_PROJECTION_SIZE);

    match mode {
        ScaleMode::Height => Vec2::new(scale / aspect, scale),
        ScaleMode::Width => Vec2::new(scale, scale * aspect),
        ScaleMode::Average => {
            let width = 2.0 * scale / (1.0 + aspect);
            Vec2::new(width, width * aspect)
        }
        ScaleMode::Area => {
            let width = (scale / aspect).sqrt();
            Vec2::new(width, width * aspect)
        }
        ScaleMode::Minimum if aspect > 1.0 => decal_size(scale, aspect, ScaleMode::Width),
        ScaleMode::Minimum => decal_size(scale, aspect, ScaleMode::Height),
        ScaleMode::Maximum if aspect > 1.0 => decal_size(scale, aspect, ScaleMode::Height),
        ScaleMode::Maximum => decal_size(scale, aspect, ScaleMode::Width),
    }
}

/// The projector volume: an oriented box relative to the decal part.
///
/// In local space the box spans `[-0.5, 0.5]` on x and y and `[0, 1]` on z,
/// projecting along +z, and is stretched by `size`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecalProjection {
    pub position: Vec3,
    pub rotation: Quat,
    pub size: Vec3,
}

impl DecalProjection {
    pub fn new(position: Vec3, size: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            size,
        }
    }

    /// Sets width and height from the footprint and z from `depth`, both floored.
    pub fn set_footprint(&mut self, size: Vec2, depth: f32) {
        self.size = size
            .max(Vec2::splat(MIN_PROJECTION_SIZE))
            .extend(depth.max(MIN_PROJECTION_SIZE));
    }

    /// Projector-to-part matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        let scale = Mat4::from_scale(self.size);
        let rotation = Mat4::from_quat(self.rotation);
        let translation = Mat4::from_translation(self.position);

        translation * rotation * scale
    }

    pub fn local_volume() -> Aabb {
        Aabb::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::new(0.5, 0.5, 1.0))
    }

    /// Projector-to-world matrix for a part placed at `part_world`.
    pub fn world_matrix(&self, part_world: Mat4) -> Mat4 {
        part_world * self.projection_matrix()
    }

    /// World-space bounds of the projector volume.
    pub fn world_bounds(&self, part_world: Mat4) -> Aabb {
        Self::local_volume().transform(&self.world_matrix(part_world))
    }
}

impl Default for DecalProjection {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ONE)
    }
}

/// Moves the projector's `[-0.5, 0.5]` x/y range into `[0, 1]` UV space.
pub fn ortho_bias() -> Mat4 {
    Mat4::from_translation(Vec3::new(0.5, 0.5, 0.0))
}

/// Decal-space data for one target surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionFrame {
    /// Target-local to decal UV space.
    pub decal_matrix: Mat4,
    /// Projector facing direction in target-local space.
    pub normal: Vec3,
    /// Projector right axis in target-local space.
    pub tangent: Vec3,
}

impl ProjectionFrame {
    pub fn new(projector_world: Mat4, target_world: Mat4) -> Self {
        let projector_to_target = target_world.inverse() * projector_world;

        Self {
            decal_matrix: ortho_bias() * projector_to_target.inverse(),
            normal: projector_to_target.transform_vector3(Vec3::NEG_Z).normalize_or_zero(),
            tangent: projector_to_target.transform_vector3(Vec3::X).normalize_or_zero(),
        }
    }
}
