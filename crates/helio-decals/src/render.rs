//! Draw submission: the boundary between the decal engine and the renderer.

use crate::{SurfaceId, SurfaceMesh};
use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};
use helio_material::{Material, PropertyBlock};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CameraId(pub u32);

bitflags! {
    /// Shadow behaviour of a draw.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DrawFlags: u32 {
        const CAST_SHADOWS = 1 << 0;
        const RECEIVE_SHADOWS = 1 << 1;
    }
}

impl DrawFlags {
    /// Decals receive shadows but never cast them.
    pub const DECAL: DrawFlags = DrawFlags::RECEIVE_SHADOWS;
}

/// Per-draw decal data in the layout the decal shader reads.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DecalUniforms {
    pub projection: [[f32; 4]; 4],
    pub normal: [f32; 4],  // w unused
    pub tangent: [f32; 4], // w unused
    pub rim_color: [f32; 4],
    pub rim_falloff: f32,
    pub _pad: [f32; 3],
}

impl DecalUniforms {
    pub fn new(projection: Mat4, normal: Vec3, tangent: Vec3, rim_falloff: f32, rim_color: Vec4) -> Self {
        Self {
            projection: projection.to_cols_array_2d(),
            normal: normal.extend(0.0).to_array(),
            tangent: tangent.extend(0.0).to_array(),
            rim_color: rim_color.to_array(),
            rim_falloff,
            _pad: [0.0; 3],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// One decal draw onto one target surface.
#[derive(Debug, Clone, Copy)]
pub struct DrawSubmission<'a> {
    pub surface: SurfaceId,
    pub mesh: &'a Arc<SurfaceMesh>,
    pub world_transform: Mat4,
    pub material: &'a Material,
    pub overrides: &'a PropertyBlock,
    pub uniforms: DecalUniforms,
    pub camera: CameraId,
    pub flags: DrawFlags,
}

/// Receives decal draws. The renderer implements this.
pub trait DrawSink {
    fn submit(&mut self, draw: DrawSubmission<'_>);
}

/// An owned copy of a [`DrawSubmission`].
#[derive(Debug, Clone)]
pub struct RecordedDraw {
    pub surface: SurfaceId,
    pub mesh: Arc<SurfaceMesh>,
    pub world_transform: Mat4,
    pub material: Material,
    pub overrides: PropertyBlock,
    pub uniforms: DecalUniforms,
    pub camera: CameraId,
    pub flags: DrawFlags,
}

/// A sink that records every submission, in order.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    draws: Vec<RecordedDraw>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn clear(&mut self) {
        self.draws.clear();
    }
}

impl DrawSink for DrawList {
    fn submit(&mut self, draw: DrawSubmission<'_>) {
        self.draws.push(RecordedDraw {
            surface: draw.surface,
            mesh: Arc::clone(draw.mesh),
            world_transform: draw.world_transform,
            material: draw.material.clone(),
            overrides: draw.overrides.clone(),
            uniforms: draw.uniforms,
            camera: draw.camera,
            flags: draw.flags,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<DecalUniforms>(), 128);

        let uniforms = DecalUniforms::new(Mat4::IDENTITY, Vec3::NEG_Z, Vec3::X, 2.0, Vec4::ONE);
        let bytes = uniforms.as_bytes();
        assert_eq!(bytes.len(), 128);
        let floats: &[f32] = bytemuck::cast_slice(bytes);
        assert_eq!(floats[16..20], [0.0, 0.0, -1.0, 0.0]);
        assert_eq!(floats[28], 2.0);
    }

    #[test]
    fn decal_flags_only_receive_shadows() {
        assert!(DrawFlags::DECAL.contains(DrawFlags::RECEIVE_SHADOWS));
        assert!(!DrawFlags::DECAL.contains(DrawFlags::CAST_SHADOWS));
    }
}
