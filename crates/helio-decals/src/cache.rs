use crate::{ObjectGraph, PartId, ProjectionTarget, TargetResolver};
use glam::Mat4;
use helio_core::Aabb;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The projection targets a projector holds on one part, one per accepted
/// surface.
#[derive(Debug, Clone)]
pub struct PartTarget {
    part: PartId,
    targets: Vec<ProjectionTarget>,
}

impl PartTarget {
    pub fn new(part: PartId) -> Self {
        Self {
            part,
            targets: Vec::new(),
        }
    }

    pub fn part(&self) -> PartId {
        self.part
    }

    pub fn targets(&self) -> &[ProjectionTarget] {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut [ProjectionTarget] {
        &mut self.targets
    }

    pub fn push(&mut self, target: ProjectionTarget) {
        self.targets.push(target);
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Re-resolves the part's surfaces against `bounds` and recomputes every
    /// frame. Surfaces whose mesh is unchanged keep their target; the rest are
    /// rebuilt or dropped. Returns whether anything is still hit.
    pub fn project(
        &mut self,
        graph: &dyn ObjectGraph,
        resolver: &TargetResolver,
        projector_world: Mat4,
        bounds: &Aabb,
        use_base_normal: bool,
    ) -> bool {
        let mut previous = std::mem::take(&mut self.targets);

        for surface in resolver.resolve_part(graph, self.part, bounds) {
            let reused = previous.iter().position(|target| {
                target.surface() == surface.view.id && Arc::ptr_eq(target.mesh(), &surface.mesh)
            });
            let target = match reused {
                Some(index) => {
                    let mut target = previous.swap_remove(index);
                    target.reproject(projector_world, surface.view.local_to_world);
                    target
                }
                None => ProjectionTarget::new(&surface, projector_world, use_base_normal),
            };
            self.targets.push(target);
        }

        !self.targets.is_empty()
    }
}

/// A projector's targets, keyed by part.
#[derive(Debug, Clone, Default)]
pub struct ProjectionCache {
    entries: BTreeMap<PartId, PartTarget>,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, part: PartId) -> Option<&PartTarget> {
        self.entries.get(&part)
    }

    pub fn contains(&self, part: PartId) -> bool {
        self.entries.contains_key(&part)
    }

    pub fn insert(&mut self, entry: PartTarget) -> Option<PartTarget> {
        self.entries.insert(entry.part, entry)
    }

    pub fn remove(&mut self, part: PartId) -> Option<PartTarget> {
        self.entries.remove(&part)
    }

    /// Takes the entry for `part` out of the cache, or a fresh empty one.
    pub fn take_or_new(&mut self, part: PartId) -> PartTarget {
        self.entries
            .remove(&part)
            .unwrap_or_else(|| PartTarget::new(part))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn parts(&self) -> impl Iterator<Item = PartId> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PartTarget> {
        self.entries.values()
    }

    pub fn targets(&self) -> impl Iterator<Item = &ProjectionTarget> {
        self.entries.values().flat_map(|entry| entry.targets.iter())
    }

    pub fn targets_mut(&mut self) -> impl Iterator<Item = &mut ProjectionTarget> {
        self.entries
            .values_mut()
            .flat_map(|entry| entry.targets.iter_mut())
    }

    pub fn target_count(&self) -> usize {
        self.entries.values().map(PartTarget::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Scene, SceneNode, ScenePart};
    use crate::{SurfaceMaterial, SurfaceMesh};
    use glam::Vec3;
    use helio_core::Transform;

    fn scene() -> (Scene, PartId) {
        let mesh = || SurfaceMesh::new("panel", Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5)));
        let mut scene = Scene::new();
        let part = scene.add_part(ScenePart::new(
            "panels",
            SceneNode::new("model")
                .with_child(SceneNode::surface("left", mesh(), SurfaceMaterial::new("KSP/Bumped")))
                .with_child(
                    SceneNode::surface("right", mesh(), SurfaceMaterial::new("KSP/Bumped"))
                        .with_transform(Transform::from_position(Vec3::new(3.0, 0.0, 0.0))),
                ),
        ));
        (scene, part)
    }

    #[test]
    fn project_keeps_only_intersecting_surfaces() {
        let (scene, part) = scene();
        let resolver = TargetResolver::default();
        let mut entry = PartTarget::new(part);

        let near_left = Aabb::new(Vec3::splat(-0.2), Vec3::splat(0.2));
        assert!(entry.project(&scene, &resolver, Mat4::IDENTITY, &near_left, false));
        assert_eq!(entry.len(), 1);
        assert_eq!(entry.targets()[0].name(), "left");

        let both = Aabb::new(Vec3::splat(-1.0), Vec3::new(4.0, 1.0, 1.0));
        assert!(entry.project(&scene, &resolver, Mat4::IDENTITY, &both, false));
        assert_eq!(entry.len(), 2);

        let nowhere = Aabb::new(Vec3::splat(20.0), Vec3::splat(21.0));
        assert!(!entry.project(&scene, &resolver, Mat4::IDENTITY, &nowhere, false));
        assert!(entry.is_empty());
    }

    #[test]
    fn reprojection_updates_reused_targets() {
        let (scene, part) = scene();
        let resolver = TargetResolver::default();
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let mut entry = PartTarget::new(part);
        entry.project(&scene, &resolver, Mat4::IDENTITY, &bounds, false);
        let before = entry.targets()[0].decal_matrix();

        let moved = Mat4::from_translation(Vec3::new(0.0, 0.0, -0.3));
        entry.project(&scene, &resolver, moved, &bounds, false);
        assert_ne!(entry.targets()[0].decal_matrix(), before);
    }

    #[test]
    fn cache_counts_parts_and_targets() {
        let (scene, part) = scene();
        let resolver = TargetResolver::default();
        let mut cache = ProjectionCache::new();
        let mut entry = cache.take_or_new(part);
        entry.project(
            &scene,
            &resolver,
            Mat4::IDENTITY,
            &Aabb::new(Vec3::splat(-1.0), Vec3::new(4.0, 1.0, 1.0)),
            false,
        );
        cache.insert(entry);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.target_count(), 2);
        assert!(cache.remove(part).is_some());
        assert!(cache.is_empty());
    }
}
