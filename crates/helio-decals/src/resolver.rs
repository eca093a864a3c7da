use crate::{ObjectGraph, PartId, SurfaceMaterial, SurfaceMesh, SurfaceView};
use helio_core::Aabb;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A surface that passed validation, with its mesh and material pinned.
#[derive(Debug, Clone)]
pub struct ResolvedSurface {
    pub view: SurfaceView,
    pub mesh: Arc<SurfaceMesh>,
    pub material: Arc<SurfaceMaterial>,
}

impl ResolvedSurface {
    /// `None` unless the surface has both a mesh and a material.
    pub fn from_view(view: SurfaceView) -> Option<Self> {
        let mesh = view.mesh.clone()?;
        let material = view.material.clone()?;
        Some(Self {
            view,
            mesh,
            material,
        })
    }
}

/// Finds the surfaces a projector volume lands on.
#[derive(Debug, Clone, Default)]
pub struct TargetResolver {
    denylist: BTreeSet<String>,
}

impl TargetResolver {
    pub fn new<I, S>(denylist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            denylist: denylist.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_denylisted(&self, shader: &str) -> bool {
        self.denylist.contains(shader)
    }

    /// Active, has a mesh and a material, and the shader is not denylisted.
    pub fn is_valid_surface(&self, surface: &SurfaceView) -> bool {
        if !surface.active || surface.mesh.is_none() {
            return false;
        }
        match &surface.material {
            Some(material) => !self.is_denylisted(&material.shader),
            None => false,
        }
    }

    /// Parts a projector may land on: its parent, or the whole assembly.
    pub fn candidates(&self, graph: &dyn ObjectGraph, projector: PartId, multi: bool) -> Vec<PartId> {
        if multi {
            graph
                .assembly(projector)
                .into_iter()
                .filter(|part| *part != projector)
                .collect()
        } else {
            graph.parent(projector).into_iter().collect()
        }
    }

    /// Valid surfaces of `part` whose world bounds meet `bounds`. Projector
    /// parts never yield anything.
    pub fn resolve_part(
        &self,
        graph: &dyn ObjectGraph,
        part: PartId,
        bounds: &Aabb,
    ) -> Vec<ResolvedSurface> {
        if graph.is_projector(part) {
            return Vec::new();
        }

        graph
            .surfaces(part)
            .into_iter()
            .filter(|surface| {
                let valid = self.is_valid_surface(surface);
                if !valid && surface.mesh.is_some() {
                    log::trace!("Skipping surface '{}' on {part}", surface.name);
                }
                valid
            })
            .filter(|surface| {
                surface
                    .world_bounds()
                    .is_some_and(|surface_bounds| surface_bounds.intersects(bounds))
            })
            .filter_map(ResolvedSurface::from_view)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Scene, SceneNode, ScenePart};
    use glam::Vec3;

    fn unit_mesh() -> SurfaceMesh {
        SurfaceMesh::new("quad", Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)))
    }

    fn setup() -> (Scene, PartId, PartId, PartId) {
        let mut scene = Scene::new();
        let tank = scene.add_part(ScenePart::new(
            "tank",
            SceneNode::new("model")
                .with_child(SceneNode::surface("body", unit_mesh(), SurfaceMaterial::new("KSP/Bumped")))
                .with_child(SceneNode::surface(
                    "window",
                    unit_mesh(),
                    SurfaceMaterial::new("KSP/Alpha/Translucent"),
                ))
                .with_child(SceneNode::new("bare").with_mesh(unit_mesh()))
                .with_child(
                    SceneNode::surface("hidden", unit_mesh(), SurfaceMaterial::new("KSP/Bumped"))
                        .inactive(),
                ),
        ));
        let other = scene.add_part(ScenePart::new(
            "other",
            SceneNode::surface("body", unit_mesh(), SurfaceMaterial::new("KSP/Bumped")),
        ));
        let decal = scene.add_part(
            ScenePart::new(
                "decal",
                SceneNode::surface("front", unit_mesh(), SurfaceMaterial::new("KSP/Bumped")),
            )
            .projector(),
        );
        scene.attach(other, tank).unwrap();
        scene.attach(decal, tank).unwrap();
        (scene, tank, other, decal)
    }

    #[test]
    fn rejects_denylisted_bare_and_inactive_surfaces() {
        let (scene, tank, _, _) = setup();
        let resolver = TargetResolver::new(["KSP/Alpha/Translucent"]);
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));

        let names: Vec<_> = resolver
            .resolve_part(&scene, tank, &bounds)
            .into_iter()
            .map(|s| s.view.name)
            .collect();
        assert_eq!(names, ["body"]);
    }

    #[test]
    fn projector_parts_are_never_targets() {
        let (scene, _, _, decal) = setup();
        let resolver = TargetResolver::default();
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));

        assert!(resolver.resolve_part(&scene, decal, &bounds).is_empty());
    }

    #[test]
    fn surfaces_outside_the_volume_are_skipped() {
        let (scene, tank, _, _) = setup();
        let resolver = TargetResolver::default();
        let far = Aabb::new(Vec3::splat(10.0), Vec3::splat(11.0));

        assert!(resolver.resolve_part(&scene, tank, &far).is_empty());
    }

    #[test]
    fn candidates_follow_projection_mode() {
        let (scene, tank, other, decal) = setup();
        let resolver = TargetResolver::default();

        assert_eq!(resolver.candidates(&scene, decal, false), vec![tank]);
        assert_eq!(resolver.candidates(&scene, decal, true), vec![tank, other]);
        assert!(resolver.candidates(&scene, tank, false).is_empty());
    }
}
