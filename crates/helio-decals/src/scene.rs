//! An in-memory part graph: the reference [`ObjectGraph`] host.
//!
//! Each mutation publishes the matching [`GraphEvent`] on the scene's
//! [`EventSource`], so a subscribed [`crate::DecalSystem`] sees the same event
//! stream a real editor would produce.

use crate::{
    Error, EventSource, GraphEvent, ObjectGraph, PartId, Result, RimState, SurfaceId,
    SurfaceMaterial, SurfaceMesh, SurfaceView,
};
use glam::Mat4;
use helio_core::Transform;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

/// One node of a part's model tree.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub local: Transform,
    pub active: bool,
    pub mesh: Option<Arc<SurfaceMesh>>,
    pub material: Option<Arc<SurfaceMaterial>>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local: Transform::default(),
            active: true,
            mesh: None,
            material: None,
            children: Vec::new(),
        }
    }

    /// A renderable node with both mesh and material.
    pub fn surface(name: impl Into<String>, mesh: SurfaceMesh, material: SurfaceMaterial) -> Self {
        Self::new(name)
            .with_mesh(mesh)
            .with_material(material)
    }

    pub fn with_mesh(mut self, mesh: SurfaceMesh) -> Self {
        self.mesh = Some(Arc::new(mesh));
        self
    }

    pub fn with_material(mut self, material: SurfaceMaterial) -> Self {
        self.material = Some(Arc::new(material));
        self
    }

    pub fn with_transform(mut self, local: Transform) -> Self {
        self.local = local;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// A part: a world pose, a model tree, and its place in the attachment tree.
#[derive(Debug, Clone)]
pub struct ScenePart {
    pub name: String,
    /// World pose of the part's root node.
    pub transform: Transform,
    pub projector: bool,
    pub rim: RimState,
    pub root: SceneNode,
    parent: Option<PartId>,
    children: Vec<PartId>,
    symmetry: Vec<PartId>,
}

impl ScenePart {
    pub fn new(name: impl Into<String>, root: SceneNode) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            projector: false,
            rim: RimState::default(),
            root,
            parent: None,
            children: Vec::new(),
            symmetry: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Marks the part as carrying its own decal projector.
    pub fn projector(mut self) -> Self {
        self.projector = true;
        self
    }
}

struct FlatNode {
    path: Vec<u32>,
    view: SurfaceView,
}

#[derive(Default)]
pub struct Scene {
    parts: BTreeMap<PartId, ScenePart>,
    next_id: u32,
    events: EventSource,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &EventSource {
        &self.events
    }

    /// Adds a free-floating part. No event is published until it is attached.
    pub fn add_part(&mut self, part: ScenePart) -> PartId {
        self.next_id += 1;
        let id = PartId(self.next_id);
        self.parts.insert(id, part);
        id
    }

    pub fn part(&self, id: PartId) -> Option<&ScenePart> {
        self.parts.get(&id)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn attach(&mut self, child: PartId, parent: PartId) -> Result<()> {
        if !self.parts.contains_key(&parent) {
            return Err(missing(parent));
        }
        let existing = self.parts.get(&child).ok_or_else(|| missing(child))?.parent;
        if let Some(existing) = existing {
            return Err(Error::GraphInconsistency(format!(
                "{child} is already attached to {existing}"
            )));
        }
        if child == parent || self.ancestors(parent).contains(&child) {
            return Err(Error::GraphInconsistency(format!(
                "attaching {child} to {parent} would create a cycle"
            )));
        }

        if let Some(part) = self.parts.get_mut(&child) {
            part.parent = Some(parent);
        }
        if let Some(part) = self.parts.get_mut(&parent) {
            part.children.push(child);
        }
        log::debug!("Attached {child} to {parent}");
        self.events.publish(GraphEvent::PartAttached(child));
        Ok(())
    }

    /// Detaches `child` and its subtree from their parent.
    pub fn detach(&mut self, child: PartId) -> Result<()> {
        let parent = self
            .parts
            .get_mut(&child)
            .ok_or_else(|| missing(child))?
            .parent
            .take()
            .ok_or_else(|| Error::GraphInconsistency(format!("{child} has no parent")))?;

        if let Some(part) = self.parts.get_mut(&parent) {
            part.children.retain(|c| *c != child);
        }
        log::debug!("Detached {child} from {parent}");
        self.events.publish(GraphEvent::PartDetached(child));
        Ok(())
    }

    pub fn set_transform(&mut self, id: PartId, transform: Transform) -> Result<()> {
        self.parts.get_mut(&id).ok_or_else(|| missing(id))?.transform = transform;
        self.events.publish(GraphEvent::PoseChanged(id));
        Ok(())
    }

    /// Replaces the part's model tree.
    pub fn apply_variant(&mut self, id: PartId, root: SceneNode) -> Result<()> {
        self.parts.get_mut(&id).ok_or_else(|| missing(id))?.root = root;
        self.events.publish(GraphEvent::VariantApplied(id));
        Ok(())
    }

    pub fn set_rim(&mut self, id: PartId, rim: RimState) -> Result<()> {
        self.parts.get_mut(&id).ok_or_else(|| missing(id))?.rim = rim;
        Ok(())
    }

    /// Links the parts as one symmetry group.
    pub fn set_symmetry(&mut self, group: &[PartId]) -> Result<()> {
        if let Some(id) = group.iter().find(|id| !self.parts.contains_key(id)) {
            return Err(missing(*id));
        }
        for id in group {
            if let Some(part) = self.parts.get_mut(id) {
                part.symmetry = group.iter().copied().filter(|other| other != id).collect();
            }
        }
        Ok(())
    }

    /// Destroys `id` and its subtree. `PartWillDie` is published for each part
    /// before it is removed.
    pub fn destroy(&mut self, id: PartId) -> Result<()> {
        if !self.parts.contains_key(&id) {
            return Err(missing(id));
        }
        if self.parts.get(&id).and_then(|p| p.parent).is_some() {
            self.detach_silently(id);
        }

        let mut doomed = vec![id];
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for child in self.children(current) {
                doomed.push(child);
                queue.push_back(child);
            }
        }

        for part in &doomed {
            self.events.publish(GraphEvent::PartWillDie(*part));
        }
        for part in doomed {
            self.parts.remove(&part);
            for other in self.parts.values_mut() {
                other.symmetry.retain(|s| *s != part);
            }
        }
        log::debug!("Destroyed {id}");
        Ok(())
    }

    /// Mutable access to a node by child-index path. Publishes nothing.
    pub fn node_mut(&mut self, id: PartId, path: &[u32]) -> Option<&mut SceneNode> {
        let mut node = &mut self.parts.get_mut(&id)?.root;
        for index in path {
            node = node.children.get_mut(*index as usize)?;
        }
        Some(node)
    }

    fn detach_silently(&mut self, child: PartId) {
        let parent = self.parts.get_mut(&child).and_then(|p| p.parent.take());
        if let Some(part) = parent.and_then(|parent| self.parts.get_mut(&parent)) {
            part.children.retain(|c| *c != child);
        }
    }

    fn ancestors(&self, id: PartId) -> Vec<PartId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);
        while let Some(part) = current {
            ancestors.push(part);
            current = self.parent(part);
        }
        ancestors
    }

    /// Preorder flattening of a part's model tree.
    fn flatten(&self, id: PartId) -> Vec<FlatNode> {
        let Some(part) = self.parts.get(&id) else {
            return Vec::new();
        };

        let mut nodes = Vec::new();
        let mut stack = vec![(&part.root, part.transform.to_matrix(), true, Vec::new())];
        while let Some((node, parent_world, parent_active, path)) = stack.pop() {
            let world = parent_world * node.local.to_matrix();
            let active = parent_active && node.active;
            for (index, child) in node.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(index as u32);
                stack.push((child, world, active, child_path));
            }

            let index = nodes.len() as u32;
            nodes.push(FlatNode {
                path,
                view: SurfaceView {
                    id: SurfaceId::new(id, index),
                    name: node.name.clone(),
                    active,
                    local_to_world: world,
                    mesh: node.mesh.clone(),
                    material: node.material.clone(),
                },
            });
        }
        nodes
    }
}

fn missing(id: PartId) -> Error {
    Error::GraphInconsistency(format!("{id} is not in the scene"))
}

impl ObjectGraph for Scene {
    fn contains(&self, part: PartId) -> bool {
        self.parts.contains_key(&part)
    }

    fn parent(&self, part: PartId) -> Option<PartId> {
        self.parts.get(&part)?.parent
    }

    fn children(&self, part: PartId) -> Vec<PartId> {
        self.parts
            .get(&part)
            .map(|p| p.children.clone())
            .unwrap_or_default()
    }

    fn assembly(&self, part: PartId) -> Vec<PartId> {
        if !self.contains(part) {
            return Vec::new();
        }
        let root = self.ancestors(part).last().copied().unwrap_or(part);

        let mut parts = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            parts.push(current);
            queue.extend(self.children(current));
        }
        parts
    }

    fn symmetry_counterparts(&self, part: PartId) -> Vec<PartId> {
        self.parts
            .get(&part)
            .map(|p| p.symmetry.clone())
            .unwrap_or_default()
    }

    fn is_projector(&self, part: PartId) -> bool {
        self.parts.get(&part).is_some_and(|p| p.projector)
    }

    fn part_transform(&self, part: PartId) -> Option<Mat4> {
        Some(self.parts.get(&part)?.transform.to_matrix())
    }

    fn surfaces(&self, part: PartId) -> Vec<SurfaceView> {
        self.flatten(part).into_iter().map(|node| node.view).collect()
    }

    fn surface(&self, id: SurfaceId) -> Option<SurfaceView> {
        self.flatten(id.part)
            .into_iter()
            .nth(id.node as usize)
            .map(|node| node.view)
    }

    fn surface_path(&self, id: SurfaceId) -> Option<Vec<u32>> {
        self.flatten(id.part)
            .into_iter()
            .nth(id.node as usize)
            .map(|node| node.path)
    }

    fn find_surface(&self, part: PartId, path: &[u32]) -> Option<SurfaceView> {
        self.flatten(part)
            .into_iter()
            .find(|node| node.path == path)
            .map(|node| node.view)
    }

    fn rim(&self, part: PartId) -> RimState {
        self.parts.get(&part).map(|p| p.rim).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use helio_core::Aabb;

    fn hull() -> SceneNode {
        let mesh = || SurfaceMesh::new("hull", Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)));
        SceneNode::new("model")
            .with_child(SceneNode::surface("body", mesh(), SurfaceMaterial::new("KSP/Bumped")))
            .with_child(
                SceneNode::new("fins")
                    .with_transform(Transform::from_position(Vec3::X))
                    .with_child(SceneNode::surface("fin", mesh(), SurfaceMaterial::new("KSP/Bumped")).inactive()),
            )
    }

    #[test]
    fn preorder_ids_and_paths() {
        let mut scene = Scene::new();
        let part = scene.add_part(ScenePart::new("tank", hull()));

        let names: Vec<_> = scene.surfaces(part).into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["model", "body", "fins", "fin"]);

        let fin = SurfaceId::new(part, 3);
        assert_eq!(scene.surface_path(fin), Some(vec![1, 0]));
        assert_eq!(scene.find_surface(part, &[1, 0]).map(|s| s.id), Some(fin));
        assert!(scene.find_surface(part, &[4]).is_none());
    }

    #[test]
    fn activity_and_transforms_inherit() {
        let mut scene = Scene::new();
        let part = scene.add_part(
            ScenePart::new("tank", hull()).with_transform(Transform::from_position(Vec3::Y)),
        );

        let fin = scene.surface(SurfaceId::new(part, 3)).unwrap();
        assert!(!fin.active);
        assert_eq!(fin.local_to_world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 1.0, 0.0));

        scene.node_mut(part, &[1, 0]).unwrap().active = true;
        assert!(scene.surface(SurfaceId::new(part, 3)).unwrap().active);
    }

    #[test]
    fn attach_detach_publish_and_update_assembly() {
        let mut scene = Scene::new();
        let events = scene.events().subscribe();
        let root = scene.add_part(ScenePart::new("pod", hull()));
        let tank = scene.add_part(ScenePart::new("tank", hull()));
        let decal = scene.add_part(ScenePart::new("decal", SceneNode::new("model")).projector());

        scene.attach(tank, root).unwrap();
        scene.attach(decal, tank).unwrap();
        assert_eq!(scene.assembly(decal), vec![root, tank, decal]);
        assert!(scene.attach(root, decal).is_err());

        scene.detach(tank).unwrap();
        assert_eq!(scene.assembly(root), vec![root]);
        assert_eq!(scene.assembly(decal), vec![tank, decal]);

        assert_eq!(
            events.drain(),
            vec![
                GraphEvent::PartAttached(tank),
                GraphEvent::PartAttached(decal),
                GraphEvent::PartDetached(tank),
            ]
        );
    }

    #[test]
    fn destroy_announces_whole_subtree() {
        let mut scene = Scene::new();
        let root = scene.add_part(ScenePart::new("pod", hull()));
        let tank = scene.add_part(ScenePart::new("tank", hull()));
        let decal = scene.add_part(ScenePart::new("decal", SceneNode::new("model")));
        scene.attach(tank, root).unwrap();
        scene.attach(decal, tank).unwrap();
        let events = scene.events().subscribe();

        scene.destroy(tank).unwrap();

        assert_eq!(
            events.drain(),
            vec![GraphEvent::PartWillDie(tank), GraphEvent::PartWillDie(decal)]
        );
        assert!(!scene.contains(decal));
        assert!(scene.children(root).is_empty());
    }

    #[test]
    fn symmetry_groups_exclude_self() {
        let mut scene = Scene::new();
        let a = scene.add_part(ScenePart::new("a", hull()));
        let b = scene.add_part(ScenePart::new("b", hull()));
        let c = scene.add_part(ScenePart::new("c", hull()));
        scene.set_symmetry(&[a, b, c]).unwrap();

        assert_eq!(scene.symmetry_counterparts(b), vec![a, c]);
        scene.destroy(c).unwrap();
        assert_eq!(scene.symmetry_counterparts(a), vec![b]);
    }
}
