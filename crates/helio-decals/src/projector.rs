//! A single decal projector and its attach/detach state machine.
//!
//! While detached the projector shows its preview material on its own model
//! and holds no targets. While attached it keeps a [`ProjectionCache`] of the
//! surfaces its volume touches and draws the decal material onto each.

use crate::{
    decal_size, CameraId, DecalConfig, DecalProjection, DrawSink, Error, GraphEvent, ObjectGraph,
    PartId, ProjectionCache, ProjectionTarget, ScaleMode, TargetRecord,
    TargetResolver, TextureSource, TileSelection, BASE_NORMAL_KEYWORD, CUTOFF_PROPERTY,
    FLAG_TEXTURE_PROPERTY, MIN_PROJECTION_SIZE, OPACITY_PROPERTY, TARGET_NODE, WEAR_PROPERTY,
};
use glam::{Mat4, Quat, Vec2, Vec3};
use helio_core::{ConfigNode, ConfigValue, TextureLibrary};
use helio_material::{Material, MaterialPropertyCollection};

/// What the detached projector shows on its own model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewState {
    /// Scale of the preview model: `(w, h, (w + h) / 2)`.
    pub model_scale: Vec3,
    /// Main texture scale of the back face.
    pub back_texture_scale: Vec2,
}

impl Default for PreviewState {
    fn default() -> Self {
        Self {
            model_scale: Vec3::ONE,
            back_texture_scale: Vec2::ONE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConformalDecal {
    part: PartId,
    config: DecalConfig,
    materials: MaterialPropertyCollection,
    texture_source: TextureSource,
    projection: DecalProjection,
    scale: f32,
    depth: f32,
    opacity: f32,
    cutoff: f32,
    wear: f32,
    project_multiple: bool,
    size: Vec2,
    preview: PreviewState,
    attached: bool,
    doomed: bool,
    cache: ProjectionCache,
}

impl ConformalDecal {
    /// Builds a detached projector. Problems in the configuration are
    /// returned; each one only disables the piece it affects.
    pub fn new(
        part: PartId,
        config: DecalConfig,
        textures: &TextureLibrary,
        texture_source: TextureSource,
        render_queue: i32,
    ) -> (Self, Vec<Error>) {
        let mut errors: Vec<Error> = Vec::new();
        let mut materials = MaterialPropertyCollection::new(&config.shader);
        materials.set_render_queue(render_queue);

        match materials.keyword_mut(BASE_NORMAL_KEYWORD) {
            Ok(keyword) => keyword.value = config.use_base_normal,
            Err(err) => errors.push(err.into()),
        }
        errors.extend(
            materials
                .load(&config.node, textures)
                .into_iter()
                .map(Error::from),
        );

        let mut decal = Self {
            part,
            materials,
            texture_source,
            projection: DecalProjection::default(),
            scale: config.scale.default,
            depth: config.depth.default,
            opacity: config.opacity.default,
            cutoff: config.cutoff.default,
            wear: config.wear.default,
            project_multiple: config.project_multiple,
            size: Vec2::ONE,
            preview: PreviewState::default(),
            attached: false,
            doomed: false,
            cache: ProjectionCache::new(),
            config,
        };

        if let Err(err) = decal.update_textures(textures) {
            errors.push(err);
        }
        let tiled = match decal.config.tile {
            TileSelection::Full => Ok(()),
            TileSelection::Rect(rect) => decal.materials.update_tile_rect(rect),
            TileSelection::Index { index, size } => decal.materials.update_tile_index(index, size),
        };
        if let Err(err) = tiled {
            log::error!("Could not apply decal tile on {part}: {err}");
            errors.push(err.into());
        }

        decal.update_materials();
        decal.update_scale();
        (decal, errors)
    }

    pub fn part(&self) -> PartId {
        self.part
    }

    pub fn config(&self) -> &DecalConfig {
        &self.config
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Set once the projector's part or its parent is about to be destroyed.
    pub fn is_doomed(&self) -> bool {
        self.doomed
    }

    pub fn cache(&self) -> &ProjectionCache {
        &self.cache
    }

    pub fn materials(&self) -> &MaterialPropertyCollection {
        &self.materials
    }

    pub fn decal_material(&self) -> &Material {
        self.materials.decal_material()
    }

    /// The material on the projector's own model; only shown while detached.
    pub fn preview_material(&self) -> Option<&Material> {
        (!self.attached).then(|| self.materials.preview_material())
    }

    pub fn preview(&self) -> PreviewState {
        self.preview
    }

    pub fn render_queue(&self) -> i32 {
        self.materials.render_queue()
    }

    pub fn texture_source(&self) -> &TextureSource {
        &self.texture_source
    }

    pub fn texture_source_mut(&mut self) -> &mut TextureSource {
        &mut self.texture_source
    }

    pub fn projection(&self) -> &DecalProjection {
        &self.projection
    }

    /// Current footprint `(width, height)`.
    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn wear(&self) -> f32 {
        self.wear
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.config.scale_mode
    }

    pub fn project_multiple(&self) -> bool {
        self.project_multiple
    }

    pub fn set_scale(&mut self, value: f32) {
        self.scale = self.config.scale.clamp(value).max(MIN_PROJECTION_SIZE);
    }

    pub fn set_depth(&mut self, value: f32) {
        self.depth = self.config.depth.clamp(value).max(MIN_PROJECTION_SIZE);
    }

    pub fn set_opacity(&mut self, value: f32) {
        self.opacity = self.config.opacity.clamp(value).clamp(0.0, 1.0);
    }

    pub fn set_cutoff(&mut self, value: f32) {
        self.cutoff = self.config.cutoff.clamp(value).clamp(0.0, 1.0);
    }

    pub fn set_wear(&mut self, value: f32) {
        self.wear = self.config.wear.clamp(value).max(0.0);
    }

    pub fn set_scale_mode(&mut self, mode: ScaleMode) {
        self.config.scale_mode = mode;
    }

    pub fn set_project_multiple(&mut self, multiple: bool) {
        self.project_multiple = multiple;
    }

    /// Moves the projector volume within its part.
    pub fn set_projector_pose(&mut self, position: Vec3, rotation: Quat) {
        self.projection.position = position;
        self.projection.rotation = rotation;
    }

    /// Projector-to-world matrix, if the part is still in the graph.
    pub fn projector_world(&self, graph: &dyn ObjectGraph) -> Option<Mat4> {
        graph
            .part_transform(self.part)
            .map(|part_world| self.projection.world_matrix(part_world))
    }

    // State transitions

    /// Detached -> Attached. A projector without a parent stays detached.
    pub fn on_attach(&mut self, graph: &dyn ObjectGraph, resolver: &TargetResolver) {
        if self.attached {
            return;
        }
        if graph.parent(self.part).is_none() {
            log::error!("Attach requested for decal on {} but it has no parent", self.part);
            self.attached = false;
            return;
        }

        log::debug!("Decal on {} attached", self.part);
        self.attached = true;
        self.cache.clear();
        self.update_materials();
        self.update_projection(graph, resolver);
    }

    /// Attached -> Detached. Every target is dropped at once.
    pub fn on_detach(&mut self) {
        if !self.attached {
            return;
        }

        log::debug!(
            "Decal on {} detached, dropping {} target part(s)",
            self.part,
            self.cache.len()
        );
        self.attached = false;
        self.cache.clear();
        self.update_materials();
        self.update_scale();
    }

    /// Reacts to one graph event.
    pub fn handle_event(
        &mut self,
        graph: &dyn ObjectGraph,
        resolver: &TargetResolver,
        event: GraphEvent,
    ) {
        match event {
            GraphEvent::PartAttached(part) => self.on_part_attached(graph, resolver, part, true),
            GraphEvent::PartDetached(part) => self.on_part_detached(graph, part, true),
            GraphEvent::PoseChanged(part) => self.on_part_transformed(graph, resolver, part, true),
            GraphEvent::VariantApplied(part) => self.on_variant_applied(graph, resolver, part),
            GraphEvent::PartWillDie(part) => self.on_part_will_die(graph, part),
        }
    }

    fn is_self(&self, graph: &dyn ObjectGraph, part: PartId, first_call: bool) -> bool {
        part == self.part
            || (first_call && graph.symmetry_counterparts(self.part).contains(&part))
    }

    fn on_part_attached(
        &mut self,
        graph: &dyn ObjectGraph,
        resolver: &TargetResolver,
        part: PartId,
        first_call: bool,
    ) {
        if self.is_self(graph, part, first_call) {
            // A counterpart landing somewhere says nothing about our own parent.
            if part == self.part || graph.parent(self.part).is_some() {
                self.on_attach(graph, resolver);
            }
        } else if self.attached {
            self.update_part_target(graph, resolver, part);
            for child in graph.children(part) {
                self.on_part_attached(graph, resolver, child, false);
            }
        }
    }

    fn on_part_detached(&mut self, graph: &dyn ObjectGraph, part: PartId, first_call: bool) {
        if self.is_self(graph, part, first_call) {
            if part == self.part || graph.parent(self.part).is_none() {
                self.on_detach();
            }
        } else if self.attached {
            self.cache.remove(part);
            for child in graph.children(part) {
                self.on_part_detached(graph, child, false);
            }
        }
    }

    fn on_part_transformed(
        &mut self,
        graph: &dyn ObjectGraph,
        resolver: &TargetResolver,
        part: PartId,
        first_call: bool,
    ) {
        if self.is_self(graph, part, first_call) {
            self.update_projection(graph, resolver);
        } else if self.attached {
            self.update_part_target(graph, resolver, part);
            for child in graph.children(part) {
                self.on_part_transformed(graph, resolver, child, false);
            }
        }
    }

    fn on_variant_applied(
        &mut self,
        graph: &dyn ObjectGraph,
        resolver: &TargetResolver,
        part: PartId,
    ) {
        if self.attached && (self.project_multiple || graph.parent(self.part) == Some(part)) {
            self.cache.remove(part);
            self.update_projection(graph, resolver);
        }
    }

    fn on_part_will_die(&mut self, graph: &dyn ObjectGraph, part: PartId) {
        if part == self.part || graph.parent(self.part) == Some(part) {
            log::info!("Parent of decal on {} is about to be destroyed, removing decal", self.part);
            self.doomed = true;
            self.on_detach();
        } else if self.attached && self.project_multiple {
            self.cache.remove(part);
        }
    }

    // Updates

    /// Recomputes the footprint, then every target if attached.
    pub fn update_projection(&mut self, graph: &dyn ObjectGraph, resolver: &TargetResolver) {
        self.update_scale();
        if !self.attached {
            return;
        }

        let candidates = resolver.candidates(graph, self.part, self.project_multiple);
        let stale: Vec<PartId> = self
            .cache
            .parts()
            .filter(|part| !candidates.contains(part))
            .collect();
        for part in stale {
            self.cache.remove(part);
        }
        for part in candidates {
            self.update_part_target(graph, resolver, part);
        }
        log::trace!(
            "Decal on {} projects onto {} surface(s) across {} part(s)",
            self.part,
            self.cache.target_count(),
            self.cache.len()
        );
    }

    /// Re-resolves one part. Single-target projectors only ever look at
    /// their parent, multi-target ones at their own assembly.
    pub fn update_part_target(
        &mut self,
        graph: &dyn ObjectGraph,
        resolver: &TargetResolver,
        part: PartId,
    ) {
        if !self.project_multiple && graph.parent(self.part) != Some(part) {
            return;
        }
        if part == self.part || graph.is_projector(part) {
            return;
        }
        if self.project_multiple && !graph.assembly(self.part).contains(&part) {
            return;
        }
        let (Some(projector_world), Some(part_world)) =
            (self.projector_world(graph), graph.part_transform(self.part))
        else {
            return;
        };

        let bounds = self.projection.world_bounds(part_world);
        let mut entry = self.cache.take_or_new(part);
        if entry.project(
            graph,
            resolver,
            projector_world,
            &bounds,
            self.config.use_base_normal,
        ) {
            self.cache.insert(entry);
        }
    }

    /// Pushes the tunables into the material properties and rebuilds both
    /// materials.
    pub fn update_materials(&mut self) {
        for (name, value) in [
            (OPACITY_PROPERTY, self.opacity),
            (CUTOFF_PROPERTY, self.cutoff),
            (WEAR_PROPERTY, self.wear),
        ] {
            match self.materials.float_mut(name) {
                Ok(property) => property.value = value,
                Err(err) => log::error!("Decal on {}: {err}", self.part),
            }
        }
        self.materials.update_materials();
    }

    /// Binds the texture source's image, if it provides one.
    pub fn update_textures(&mut self, textures: &TextureLibrary) -> Result<(), Error> {
        let Some(url) = self.texture_source.texture_url() else {
            return Ok(());
        };
        let url = url.to_string();
        self.materials
            .set_texture_url(FLAG_TEXTURE_PROPERTY, &url, textures, true)
            .map_err(|err| {
                log::error!("Decal on {}: could not bind '{url}': {err}", self.part);
                Error::from(err)
            })
    }

    /// Textures, then materials, then projection.
    pub fn update_all(
        &mut self,
        graph: &dyn ObjectGraph,
        resolver: &TargetResolver,
        textures: &TextureLibrary,
    ) {
        // logged inside
        let _ = self.update_textures(textures);
        self.update_materials();
        self.update_projection(graph, resolver);
    }

    fn update_scale(&mut self) {
        self.scale = self.scale.max(MIN_PROJECTION_SIZE);
        self.depth = self.depth.max(MIN_PROJECTION_SIZE);
        let aspect = self.materials.aspect_ratio().max(MIN_PROJECTION_SIZE);

        self.size = decal_size(self.scale, aspect, self.config.scale_mode);
        self.materials.update_scale(self.size);
        self.projection.set_footprint(self.size, self.depth);

        if !self.attached {
            self.preview.model_scale =
                Vec3::new(self.size.x, self.size.y, (self.size.x + self.size.y) / 2.0);
            if self.config.update_back_scale {
                self.preview.back_texture_scale = self.size * self.config.back_texture_base_scale;
            }
        }
    }

    // Rendering

    /// Draws onto every cached surface. Returns the number of draws issued.
    pub fn render(
        &mut self,
        graph: &dyn ObjectGraph,
        camera: CameraId,
        sink: &mut dyn DrawSink,
    ) -> usize {
        if !self.attached {
            return 0;
        }

        let material = self.materials.decal_material();
        let mut submitted = 0;
        for target in self.cache.targets_mut() {
            match target.render(graph, material, camera, sink) {
                Ok(()) => submitted += 1,
                Err(err) => log::warn!("Skipping decal target this frame: {err}"),
            }
        }
        submitted
    }

    // Persistence

    /// Records for every cached target that can still be located.
    pub fn save_targets(&self, graph: &dyn ObjectGraph) -> Vec<TargetRecord> {
        self.cache
            .targets()
            .filter_map(|target| match target.save(graph) {
                Ok(record) => Some(record),
                Err(err) => {
                    log::warn!("Not saving decal target: {err}");
                    None
                }
            })
            .collect()
    }

    /// Persistent state: tunables, flag choice and targets.
    pub fn save(&self, graph: &dyn ObjectGraph) -> ConfigNode {
        let mut node = ConfigNode::new("DECAL")
            .with_value("scale", self.scale)
            .with_value("depth", self.depth)
            .with_value("opacity", self.opacity)
            .with_value("cutoff", self.cutoff)
            .with_value("wear", self.wear)
            .with_value("projectMultiple", self.project_multiple);
        if let TextureSource::Flag(flag) = &self.texture_source {
            node.add_value("flagUrl", flag.flag_url.as_str());
            node.add_value("useCustomFlag", flag.use_custom_flag);
        }
        for record in self.save_targets(graph) {
            node.add_node(record.to_node());
        }
        node
    }

    /// Restores state written by [`ConformalDecal::save`].
    ///
    /// Saved targets are reused when they still resolve; if any does not, or
    /// none were saved, the projector resolves from scratch.
    pub fn restore(
        &mut self,
        node: &ConfigNode,
        graph: &dyn ObjectGraph,
        resolver: &TargetResolver,
        textures: &TextureLibrary,
    ) -> Vec<Error> {
        let mut errors = Vec::new();
        let mut read = |key: &str, value: &mut f32| {
            if let Some(raw) = node.get_value(key) {
                match f32::parse_value(raw) {
                    Some(parsed) => *value = parsed,
                    None => errors.push(Error::Configuration(format!("invalid {key} '{raw}'"))),
                }
            }
        };
        let (mut scale, mut depth, mut opacity, mut cutoff, mut wear) =
            (self.scale, self.depth, self.opacity, self.cutoff, self.wear);
        read("scale", &mut scale);
        read("depth", &mut depth);
        read("opacity", &mut opacity);
        read("cutoff", &mut cutoff);
        read("wear", &mut wear);
        self.set_scale(scale);
        self.set_depth(depth);
        self.set_opacity(opacity);
        self.set_cutoff(cutoff);
        self.set_wear(wear);

        match node.parse_or("projectMultiple", self.project_multiple) {
            Ok(multiple) => self.project_multiple = multiple,
            Err(err) => errors.push(Error::Configuration(err.to_string())),
        }
        if let TextureSource::Flag(flag) = &mut self.texture_source {
            let url = node.parse_or("flagUrl", flag.flag_url.clone());
            let custom = node.parse_or("useCustomFlag", flag.use_custom_flag);
            match (url, custom) {
                (Ok(url), Ok(true)) => flag.select_custom(&url),
                (Ok(_), Ok(false)) => flag.reset(),
                (Err(err), _) | (_, Err(err)) => errors.push(Error::Configuration(err.to_string())),
            }
        }
        if let Err(err) = self.update_textures(textures) {
            errors.push(err);
        }
        self.update_materials();

        let parent = graph.parent(self.part);
        if parent.is_none() {
            self.on_detach();
            self.update_scale();
            return errors;
        }

        self.attached = true;
        self.cache.clear();
        self.update_scale();

        let mut needs_resolve = false;
        let mut restored = 0;
        for child in node.get_nodes(TARGET_NODE) {
            let loaded = TargetRecord::from_node(child).and_then(|record| {
                if !self.project_multiple && Some(record.part) != parent {
                    return Err(Error::ResolutionMiss(format!(
                        "{} is not the parent of a single-target decal",
                        record.part
                    )));
                }
                ProjectionTarget::load(&record, graph, resolver, self.config.use_base_normal)
            });
            match loaded {
                Ok(target) => {
                    let mut entry = self.cache.take_or_new(target.part());
                    entry.push(target);
                    self.cache.insert(entry);
                    restored += 1;
                }
                Err(err @ Error::ResolutionMiss(_)) => {
                    log::info!("Saved decal target dropped: {err}");
                    needs_resolve = true;
                }
                Err(err) => {
                    log::error!("Could not load decal target: {err}");
                    errors.push(err);
                    needs_resolve = true;
                }
            }
        }

        if needs_resolve || restored == 0 {
            self.update_projection(graph, resolver);
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Scene, SceneNode, ScenePart};
    use crate::{DrawList, SurfaceMaterial, SurfaceMesh, DEFAULT_FLAG_URL};
    use helio_core::{Aabb, Transform};
    use helio_material::DECAL_PREVIEW_KEYWORD;

    fn textures() -> TextureLibrary {
        let mut textures = TextureLibrary::new();
        textures.register("Decals/logo", 512, 256);
        textures.register(DEFAULT_FLAG_URL, 256, 160);
        textures.register("Flags/custom", 200, 100);
        textures
    }

    fn config() -> DecalConfig {
        let node = ConfigNode::new("MODULE")
            .with_value("defaultScale", 1.0f32)
            .with_value("defaultDepth", 0.5f32)
            .with_node(
                ConfigNode::new("TEXTURE")
                    .with_value("name", "_Decal")
                    .with_value("textureUrl", "Decals/logo")
                    .with_value("isMain", true),
            );
        DecalConfig::load(&node).0
    }

    fn panel(name: &str, x: f32) -> SceneNode {
        SceneNode::surface(
            name,
            SurfaceMesh::new(name, Aabb::new(Vec3::new(-0.5, -0.5, 0.0), Vec3::new(0.5, 0.5, 0.2))),
            SurfaceMaterial::new("KSP/Bumped"),
        )
        .with_transform(Transform::from_position(Vec3::new(x, 0.0, 0.0)))
    }

    /// root <- tank <- decal, plus a neighbour attached to root.
    fn setup() -> (Scene, PartId, PartId, PartId, PartId) {
        let mut scene = Scene::new();
        let root = scene.add_part(ScenePart::new("root", SceneNode::new("model").with_child(panel("pod", 0.0))));
        let tank = scene.add_part(ScenePart::new("tank", SceneNode::new("model").with_child(panel("body", 0.0))));
        let neighbour = scene.add_part(ScenePart::new("neighbour", panel("plate", 0.3)));
        let decal = scene.add_part(ScenePart::new("decal", SceneNode::new("model")).projector());
        scene.attach(tank, root).unwrap();
        scene.attach(neighbour, root).unwrap();
        scene.attach(decal, tank).unwrap();
        (scene, root, tank, neighbour, decal)
    }

    fn projector(part: PartId) -> ConformalDecal {
        let (decal, errors) = ConformalDecal::new(part, config(), &textures(), TextureSource::Constant, 2100);
        assert!(errors.is_empty(), "{errors:?}");
        decal
    }

    #[test]
    fn new_projector_is_detached_with_preview() {
        let decal = projector(PartId(1));

        assert!(!decal.is_attached());
        assert!(decal.cache().is_empty());
        let preview = decal.preview_material().unwrap();
        assert!(preview.is_keyword_enabled(DECAL_PREVIEW_KEYWORD));
        assert!(decal.decal_material().is_keyword_enabled(BASE_NORMAL_KEYWORD));
        assert_eq!(decal.render_queue(), 2100);

        // 512x256 logo: aspect 0.5, HEIGHT mode at scale 1
        assert_eq!(decal.size(), Vec2::new(2.0, 1.0));
        assert_eq!(decal.preview().model_scale, Vec3::new(2.0, 1.0, 1.5));
        assert_eq!(decal.preview().back_texture_scale, Vec2::new(2.0, 1.0));
    }

    #[test]
    fn tunables_reach_both_materials() {
        let mut decal = projector(PartId(1));
        decal.set_opacity(0.25);
        decal.set_cutoff(2.0);
        decal.update_materials();

        for material in [decal.decal_material(), decal.materials().preview_material()] {
            assert_eq!(material.float(OPACITY_PROPERTY), Some(0.25));
            assert_eq!(material.float(CUTOFF_PROPERTY), Some(1.0));
            assert_eq!(material.float(WEAR_PROPERTY), Some(100.0));
        }
    }

    #[test]
    fn setters_clamp_into_configured_ranges() {
        let mut decal = projector(PartId(1));
        decal.set_scale(9.0);
        decal.set_depth(0.0);
        decal.set_wear(-5.0);
        assert_eq!(decal.scale(), 5.0);
        assert_eq!(decal.depth(), MIN_PROJECTION_SIZE);
        assert_eq!(decal.wear(), 0.0);
    }

    #[test]
    fn attach_without_parent_stays_detached() {
        let (scene, root, ..) = setup();
        let mut decal = projector(root);
        decal.on_attach(&scene, &TargetResolver::default());
        assert!(!decal.is_attached());
    }

    #[test]
    fn attach_resolves_targets_and_hides_preview() {
        let (scene, root, tank, neighbour, part) = setup();
        let mut decal = projector(part);
        decal.on_attach(&scene, &TargetResolver::default());

        assert!(decal.is_attached());
        assert!(decal.preview_material().is_none());
        let parts: Vec<_> = decal.cache().parts().collect();
        assert_eq!(parts, vec![root, tank, neighbour]);
    }

    #[test]
    fn single_target_projector_only_touches_parent() {
        let (scene, _, tank, neighbour, part) = setup();
        let resolver = TargetResolver::default();
        let mut decal = projector(part);
        decal.set_project_multiple(false);
        decal.on_attach(&scene, &resolver);
        assert_eq!(decal.cache().parts().collect::<Vec<_>>(), vec![tank]);

        decal.update_part_target(&scene, &resolver, neighbour);
        decal.handle_event(&scene, &resolver, GraphEvent::PoseChanged(neighbour));
        assert_eq!(decal.cache().len(), 1);
    }

    #[test]
    fn detach_clears_cache_and_restores_preview() {
        let (scene, _, _, _, part) = setup();
        let resolver = TargetResolver::default();
        let mut decal = projector(part);
        decal.on_attach(&scene, &resolver);
        assert_eq!(decal.cache().len(), 3);

        decal.handle_event(&scene, &resolver, GraphEvent::PartDetached(part));
        assert!(decal.cache().is_empty());
        assert!(decal.preview_material().is_some());

        let mut draws = DrawList::new();
        assert_eq!(decal.render(&scene, CameraId(0), &mut draws), 0);
    }

    #[test]
    fn moving_a_target_away_drops_it() {
        let (mut scene, _, _, neighbour, part) = setup();
        let resolver = TargetResolver::default();
        let mut decal = projector(part);
        decal.on_attach(&scene, &resolver);
        assert!(decal.cache().contains(neighbour));

        scene
            .set_transform(neighbour, Transform::from_position(Vec3::new(50.0, 0.0, 0.0)))
            .unwrap();
        decal.handle_event(&scene, &resolver, GraphEvent::PoseChanged(neighbour));
        assert!(!decal.cache().contains(neighbour));
    }

    #[test]
    fn dying_parent_dooms_the_projector() {
        let (scene, root, tank, _, part) = setup();
        let resolver = TargetResolver::default();
        let mut decal = projector(part);
        decal.on_attach(&scene, &resolver);

        decal.handle_event(&scene, &resolver, GraphEvent::PartWillDie(root));
        assert!(!decal.cache().contains(root));
        assert!(!decal.is_doomed());

        decal.handle_event(&scene, &resolver, GraphEvent::PartWillDie(tank));
        assert!(decal.is_doomed());
        assert!(!decal.is_attached());
    }

    #[test]
    fn flag_source_binds_main_texture() {
        let mut decal = projector(PartId(1));
        let textures = textures();
        *decal.texture_source_mut() = TextureSource::flag();
        decal.update_textures(&textures).unwrap();
        decal.update_materials();

        let flag = textures.get(DEFAULT_FLAG_URL).unwrap().texture;
        assert_eq!(decal.decal_material().texture(FLAG_TEXTURE_PROPERTY), flag);
        assert_eq!(decal.materials().aspect_ratio(), 160.0 / 256.0);
    }

    #[test]
    fn save_and_restore_round_trip() {
        let (scene, _, _, _, part) = setup();
        let resolver = TargetResolver::default();
        let mut decal = projector(part);
        decal.set_scale(1.5);
        decal.on_attach(&scene, &resolver);
        decal.update_projection(&scene, &resolver);
        let saved = decal.save(&scene);
        assert_eq!(saved.get_nodes(TARGET_NODE).count(), decal.cache().target_count());

        let mut restored = projector(part);
        let errors = restored.restore(&saved, &scene, &resolver, &textures());
        assert!(errors.is_empty(), "{errors:?}");
        assert!(restored.is_attached());
        assert_eq!(restored.scale(), 1.5);
        assert_eq!(restored.cache().target_count(), decal.cache().target_count());

        for (a, b) in decal.cache().targets().zip(restored.cache().targets()) {
            assert_eq!(a.surface(), b.surface());
            assert!(a.decal_matrix().abs_diff_eq(b.decal_matrix(), 1e-6));
            assert!(a.normal().abs_diff_eq(b.normal(), 1e-6));
        }
    }
}
