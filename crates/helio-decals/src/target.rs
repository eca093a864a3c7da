//! One decal projection onto one surface, plus its persisted form.

use crate::{
    DecalUniforms, DrawFlags, DrawSink, DrawSubmission, CameraId, Error, ObjectGraph, PartId,
    ProjectionFrame, ResolvedSurface, Result, RimState, SurfaceId, SurfaceMaterial, SurfaceMesh,
    TargetResolver,
};
use glam::{Mat4, Vec3, Vec4};
use helio_core::{ConfigNode, ConfigValue, TextureId};
use helio_material::{Material, PropertyBlock, TEXTURE_ST_SUFFIX};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const PROJECTION_MATRIX_PROPERTY: &str = "_ProjectionMatrix";
pub const DECAL_NORMAL_PROPERTY: &str = "_DecalNormal";
pub const DECAL_TANGENT_PROPERTY: &str = "_DecalTangent";
pub const BUMP_MAP_PROPERTY: &str = "_BumpMap";
pub const RIM_FALLOFF_PROPERTY: &str = "_RimFalloff";
pub const RIM_COLOR_PROPERTY: &str = "_RimColor";

/// Config block name of a persisted target.
pub const TARGET_NODE: &str = "TARGET";

/// Decal render data for a single surface.
///
/// Holds the surface's mesh by shared reference only; the mesh and the
/// surface's own material are never modified.
#[derive(Debug, Clone)]
pub struct ProjectionTarget {
    surface: SurfaceId,
    name: String,
    mesh: Arc<SurfaceMesh>,
    frame: ProjectionFrame,
    use_base_normal: bool,
    overrides: PropertyBlock,
}

impl ProjectionTarget {
    pub fn new(surface: &ResolvedSurface, projector_world: Mat4, use_base_normal: bool) -> Self {
        let frame = ProjectionFrame::new(projector_world, surface.view.local_to_world);
        Self::with_frame(surface, frame, use_base_normal)
    }

    fn with_frame(surface: &ResolvedSurface, frame: ProjectionFrame, use_base_normal: bool) -> Self {
        let mut target = Self {
            surface: surface.view.id,
            name: surface.view.name.clone(),
            mesh: Arc::clone(&surface.mesh),
            frame,
            use_base_normal,
            overrides: PropertyBlock::new(),
        };
        target.write_frame();
        target.write_normal_source(&surface.material);
        target
    }

    /// Rebuilds the frame for new poses. Called on every pose change.
    pub fn reproject(&mut self, projector_world: Mat4, target_world: Mat4) {
        self.frame = ProjectionFrame::new(projector_world, target_world);
        self.write_frame();
    }

    fn write_frame(&mut self) {
        self.overrides
            .set_matrix(PROJECTION_MATRIX_PROPERTY, self.frame.decal_matrix);
        self.overrides
            .set_vector(DECAL_NORMAL_PROPERTY, self.frame.normal.extend(0.0));
        self.overrides
            .set_vector(DECAL_TANGENT_PROPERTY, self.frame.tangent.extend(0.0));
    }

    fn write_normal_source(&mut self, material: &SurfaceMaterial) {
        let st_name = format!("{BUMP_MAP_PROPERTY}{TEXTURE_ST_SUFFIX}");
        match material.normal_map.filter(|_| self.use_base_normal) {
            Some(normal_map) => {
                let scale = material.normal_map_scale;
                let offset = material.normal_map_offset;
                self.overrides.set_texture(BUMP_MAP_PROPERTY, normal_map);
                self.overrides
                    .set_vector(&st_name, Vec4::new(scale.x, scale.y, offset.x, offset.y));
            }
            None => {
                self.overrides
                    .set_texture(BUMP_MAP_PROPERTY, TextureId::BLANK_NORMAL);
                self.overrides.remove(&st_name);
            }
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn part(&self) -> PartId {
        self.surface.part
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> &Arc<SurfaceMesh> {
        &self.mesh
    }

    pub fn frame(&self) -> &ProjectionFrame {
        &self.frame
    }

    pub fn decal_matrix(&self) -> Mat4 {
        self.frame.decal_matrix
    }

    pub fn normal(&self) -> Vec3 {
        self.frame.normal
    }

    pub fn tangent(&self) -> Vec3 {
        self.frame.tangent
    }

    pub fn overrides(&self) -> &PropertyBlock {
        &self.overrides
    }

    pub fn uniforms(&self, rim: RimState) -> DecalUniforms {
        DecalUniforms::new(
            self.frame.decal_matrix,
            self.frame.normal,
            self.frame.tangent,
            rim.falloff,
            rim.color,
        )
    }

    /// Submits one draw of `material` onto this surface.
    ///
    /// Fails without drawing if the surface, its mesh, or its material has
    /// gone away since the target was built.
    pub fn render(
        &mut self,
        graph: &dyn ObjectGraph,
        material: &Material,
        camera: CameraId,
        sink: &mut dyn DrawSink,
    ) -> Result<()> {
        let view = graph.surface(self.surface).ok_or_else(|| {
            Error::GraphInconsistency(format!("surface '{}' on {} is gone", self.name, self.part()))
        })?;
        let live = view.mesh.is_some() && view.material.is_some() && view.name == self.name;
        if !live {
            return Err(Error::GraphInconsistency(format!(
                "surface '{}' on {} lost its mesh or material",
                self.name,
                self.part()
            )));
        }

        let rim = graph.rim(self.part());
        self.overrides.set_float(RIM_FALLOFF_PROPERTY, rim.falloff);
        self.overrides.set_color(RIM_COLOR_PROPERTY, rim.color);

        sink.submit(DrawSubmission {
            surface: self.surface,
            mesh: &self.mesh,
            world_transform: view.local_to_world,
            material,
            overrides: &self.overrides,
            uniforms: self.uniforms(rim),
            camera,
            flags: DrawFlags::DECAL,
        });
        Ok(())
    }

    pub fn save(&self, graph: &dyn ObjectGraph) -> Result<TargetRecord> {
        let target_path = graph.surface_path(self.surface).ok_or_else(|| {
            Error::GraphInconsistency(format!("no path to surface '{}' on {}", self.name, self.part()))
        })?;

        Ok(TargetRecord {
            part: self.part(),
            decal_matrix: self.frame.decal_matrix,
            decal_normal: self.frame.normal,
            decal_tangent: self.frame.tangent,
            target_path,
            target_name: self.name.clone(),
        })
    }

    /// Rebuilds a target from a record without recomputing its frame.
    ///
    /// The stored path is walked from the part's root and the leaf name must
    /// match; anything else is a [`Error::ResolutionMiss`].
    pub fn load(
        record: &TargetRecord,
        graph: &dyn ObjectGraph,
        resolver: &TargetResolver,
        use_base_normal: bool,
    ) -> Result<Self> {
        if !graph.contains(record.part) {
            return Err(Error::ResolutionMiss(format!("{} no longer exists", record.part)));
        }
        let view = graph
            .find_surface(record.part, &record.target_path)
            .ok_or_else(|| {
                Error::ResolutionMiss(format!(
                    "path {:?} not found on {}",
                    record.target_path, record.part
                ))
            })?;
        if view.name != record.target_name {
            return Err(Error::ResolutionMiss(format!(
                "expected surface '{}' on {}, found '{}'",
                record.target_name, record.part, view.name
            )));
        }
        if !resolver.is_valid_surface(&view) {
            return Err(Error::ResolutionMiss(format!(
                "surface '{}' on {} is not a valid target",
                view.name, record.part
            )));
        }
        let surface = ResolvedSurface::from_view(view).ok_or_else(|| {
            Error::ResolutionMiss(format!("surface '{}' has no mesh", record.target_name))
        })?;

        let frame = ProjectionFrame {
            decal_matrix: record.decal_matrix,
            normal: record.decal_normal,
            tangent: record.decal_tangent,
        };
        Ok(Self::with_frame(&surface, frame, use_base_normal))
    }
}

/// Persisted form of a [`ProjectionTarget`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub part: PartId,
    pub decal_matrix: Mat4,
    pub decal_normal: Vec3,
    pub decal_tangent: Vec3,
    /// Child indices from the part's root node to the surface.
    pub target_path: Vec<u32>,
    /// Leaf name, checked on load so a changed model is not mistaken for the old one.
    pub target_name: String,
}

impl TargetRecord {
    pub fn to_node(&self) -> ConfigNode {
        let path = self
            .target_path
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("/");

        ConfigNode::new(TARGET_NODE)
            .with_value("part", self.part.0)
            .with_value("decalMatrix", self.decal_matrix)
            .with_value("decalNormal", self.decal_normal)
            .with_value("decalTangent", self.decal_tangent)
            .with_value("targetPath", path)
            .with_value("targetName", self.target_name.as_str())
    }

    /// Any missing or malformed value is a [`Error::Configuration`].
    pub fn from_node(node: &ConfigNode) -> Result<Self> {
        let path: String = parse(node, "targetPath")?;
        let target_path = path
            .split('/')
            .filter(|segment| !segment.trim().is_empty())
            .map(|segment| {
                u32::parse_value(segment).ok_or_else(|| {
                    Error::Configuration(format!("invalid target path segment '{segment}' in '{path}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            part: PartId(parse(node, "part")?),
            decal_matrix: parse(node, "decalMatrix")?,
            decal_normal: parse(node, "decalNormal")?,
            decal_tangent: parse(node, "decalTangent")?,
            target_path,
            target_name: parse(node, "targetName")?,
        })
    }
}

fn parse<T: ConfigValue>(node: &ConfigNode, key: &str) -> Result<T> {
    node.parse(key)
        .map_err(|err| Error::Configuration(err.to_string()))
}
