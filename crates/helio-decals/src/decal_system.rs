use crate::{
    CameraId, ConformalDecal, DecalConfig, DecalSettings, DrawSink, Error, EventSource,
    ObjectGraph, PartId, RenderQueueAllocator, ScaleMode, Subscription, TargetResolver,
    TextureSource,
};
use helio_core::{ConfigNode, TextureLibrary};
use std::collections::BTreeMap;

/// Owns every projector and drives them from graph events and frames.
///
/// Events are queued by the [`EventSource`] and applied in order by every
/// method that is handed the graph, before it does anything else. Rendering,
/// tweaks and persistence therefore always see the latest topology. The
/// plain accessors ([`DecalSystem::projector`] and friends) show the state as
/// of the last such call; use [`DecalSystem::pump_events`] to catch up
/// explicitly.
pub struct DecalSystem {
    settings: DecalSettings,
    resolver: TargetResolver,
    queues: RenderQueueAllocator,
    projectors: BTreeMap<PartId, ConformalDecal>,
    subscription: Option<Subscription>,
}

impl DecalSystem {
    pub fn new(settings: DecalSettings) -> Self {
        Self {
            resolver: settings.resolver(),
            settings,
            queues: RenderQueueAllocator::new(),
            projectors: BTreeMap::new(),
            subscription: None,
        }
    }

    pub fn settings(&self) -> &DecalSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    /// Starts listening to `events`, replacing any earlier source.
    pub fn connect(&mut self, events: &EventSource) {
        self.subscription = Some(events.subscribe());
    }

    /// Stops listening. Queued events are discarded.
    pub fn disconnect(&mut self) {
        self.subscription = None;
    }

    pub fn is_connected(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(Subscription::is_connected)
    }

    // Projectors

    /// Creates a projector on `part` and brings it into the right state for
    /// the current graph. Configuration problems are returned, not fatal.
    pub fn add_projector(
        &mut self,
        part: PartId,
        config: DecalConfig,
        texture_source: TextureSource,
        textures: &TextureLibrary,
        graph: &dyn ObjectGraph,
    ) -> Vec<Error> {
        self.pump_events(graph);
        let queue = self.queues.allocate();
        let (mut decal, errors) = ConformalDecal::new(part, config, textures, texture_source, queue);
        for error in &errors {
            log::error!("Decal on {part}: {error}");
        }

        if graph.parent(part).is_some() {
            decal.on_attach(graph, &self.resolver);
        }
        log::info!("Added decal projector on {part} (render queue {queue})");
        if self.projectors.insert(part, decal).is_some() {
            log::warn!("Replaced existing decal projector on {part}");
        }
        errors
    }

    /// Parses `node` as a projector block and adds it.
    pub fn load_projector(
        &mut self,
        part: PartId,
        node: &ConfigNode,
        texture_source: TextureSource,
        textures: &TextureLibrary,
        graph: &dyn ObjectGraph,
    ) -> Vec<Error> {
        let (config, mut errors) = DecalConfig::load(node);
        errors.extend(self.add_projector(part, config, texture_source, textures, graph));
        errors
    }

    pub fn remove_projector(&mut self, part: PartId) -> Option<ConformalDecal> {
        self.projectors.remove(&part)
    }

    pub fn projector(&self, part: PartId) -> Option<&ConformalDecal> {
        self.projectors.get(&part)
    }

    pub fn projector_mut(&mut self, part: PartId) -> Option<&mut ConformalDecal> {
        self.projectors.get_mut(&part)
    }

    pub fn projectors(&self) -> impl Iterator<Item = &ConformalDecal> {
        self.projectors.values()
    }

    pub fn len(&self) -> usize {
        self.projectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectors.is_empty()
    }

    // Frame loop

    /// Applies every queued event to every projector, oldest first, then
    /// drops projectors whose part is going away. Returns the event count.
    pub fn pump_events(&mut self, graph: &dyn ObjectGraph) -> usize {
        let events = match &self.subscription {
            Some(subscription) => subscription.drain(),
            None => return 0,
        };

        for event in &events {
            log::trace!("Applying {event:?}");
            for decal in self.projectors.values_mut() {
                decal.handle_event(graph, &self.resolver, *event);
            }
        }

        let doomed: Vec<PartId> = self
            .projectors
            .values()
            .filter(|decal| decal.is_doomed())
            .map(ConformalDecal::part)
            .collect();
        for part in doomed {
            log::info!("Removing decal projector on {part}");
            self.projectors.remove(&part);
        }
        events.len()
    }

    /// The per-camera render callback. Pending events are applied first.
    /// Returns the number of draws submitted.
    pub fn render(
        &mut self,
        camera: CameraId,
        graph: &dyn ObjectGraph,
        sink: &mut dyn DrawSink,
    ) -> usize {
        self.pump_events(graph);
        self.projectors
            .values_mut()
            .map(|decal| decal.render(graph, camera, sink))
            .sum()
    }

    // Tweaks, applied to the projector and its symmetry counterparts

    fn symmetry_group(&self, part: PartId, graph: &dyn ObjectGraph) -> Vec<PartId> {
        std::iter::once(part)
            .chain(graph.symmetry_counterparts(part))
            .filter(|p| self.projectors.contains_key(p))
            .collect()
    }

    fn tweak_projection(
        &mut self,
        part: PartId,
        graph: &dyn ObjectGraph,
        apply: impl Fn(&mut ConformalDecal),
    ) {
        self.pump_events(graph);
        for member in self.symmetry_group(part, graph) {
            if let Some(decal) = self.projectors.get_mut(&member) {
                apply(decal);
                decal.update_projection(graph, &self.resolver);
            }
        }
    }

    fn tweak_material(
        &mut self,
        part: PartId,
        graph: &dyn ObjectGraph,
        apply: impl Fn(&mut ConformalDecal),
    ) {
        self.pump_events(graph);
        for member in self.symmetry_group(part, graph) {
            if let Some(decal) = self.projectors.get_mut(&member) {
                apply(decal);
                decal.update_materials();
            }
        }
    }

    pub fn set_scale(&mut self, part: PartId, scale: f32, graph: &dyn ObjectGraph) {
        self.tweak_projection(part, graph, |decal| decal.set_scale(scale));
    }

    pub fn set_depth(&mut self, part: PartId, depth: f32, graph: &dyn ObjectGraph) {
        self.tweak_projection(part, graph, |decal| decal.set_depth(depth));
    }

    pub fn set_scale_mode(&mut self, part: PartId, mode: ScaleMode, graph: &dyn ObjectGraph) {
        self.tweak_projection(part, graph, |decal| decal.set_scale_mode(mode));
    }

    pub fn set_project_multiple(&mut self, part: PartId, multiple: bool, graph: &dyn ObjectGraph) {
        self.tweak_projection(part, graph, |decal| decal.set_project_multiple(multiple));
    }

    pub fn set_opacity(&mut self, part: PartId, opacity: f32, graph: &dyn ObjectGraph) {
        self.tweak_material(part, graph, |decal| decal.set_opacity(opacity));
    }

    pub fn set_cutoff(&mut self, part: PartId, cutoff: f32, graph: &dyn ObjectGraph) {
        self.tweak_material(part, graph, |decal| decal.set_cutoff(cutoff));
    }

    pub fn set_wear(&mut self, part: PartId, wear: f32, graph: &dyn ObjectGraph) {
        self.tweak_material(part, graph, |decal| decal.set_wear(wear));
    }

    // Flags

    /// Picks a custom flag for a flag projector and its counterparts.
    pub fn select_flag(
        &mut self,
        part: PartId,
        url: &str,
        textures: &TextureLibrary,
        graph: &dyn ObjectGraph,
    ) {
        self.update_flags(part, textures, graph, |decal| {
            if let Some(flag) = decal.texture_source_mut().as_flag_mut() {
                flag.select_custom(url);
            }
        });
    }

    /// Returns a flag projector and its counterparts to the mission flag.
    pub fn reset_flag(&mut self, part: PartId, textures: &TextureLibrary, graph: &dyn ObjectGraph) {
        self.update_flags(part, textures, graph, |decal| {
            if let Some(flag) = decal.texture_source_mut().as_flag_mut() {
                flag.reset();
            }
        });
    }

    fn update_flags(
        &mut self,
        part: PartId,
        textures: &TextureLibrary,
        graph: &dyn ObjectGraph,
        apply: impl Fn(&mut ConformalDecal),
    ) {
        self.pump_events(graph);
        for member in self.symmetry_group(part, graph) {
            if let Some(decal) = self.projectors.get_mut(&member) {
                apply(decal);
                decal.update_all(graph, &self.resolver, textures);
            }
        }
    }

    /// Sets the mission flag on every flag projector. Those showing a custom
    /// flag keep it.
    pub fn set_mission_flag(&mut self, url: &str, textures: &TextureLibrary, graph: &dyn ObjectGraph) {
        self.pump_events(graph);
        for decal in self.projectors.values_mut() {
            let changed = decal
                .texture_source_mut()
                .as_flag_mut()
                .is_some_and(|flag| flag.set_mission_flag(url));
            if changed {
                decal.update_all(graph, &self.resolver, textures);
            }
        }
    }

    // Persistence

    pub fn save(&mut self, part: PartId, graph: &dyn ObjectGraph) -> Option<ConfigNode> {
        self.pump_events(graph);
        self.projectors.get(&part).map(|decal| decal.save(graph))
    }

    pub fn restore(
        &mut self,
        part: PartId,
        node: &ConfigNode,
        textures: &TextureLibrary,
        graph: &dyn ObjectGraph,
    ) -> Vec<Error> {
        self.pump_events(graph);
        match self.projectors.get_mut(&part) {
            Some(decal) => decal.restore(node, graph, &self.resolver, textures),
            None => vec![Error::ResolutionMiss(format!("no decal projector on {part}"))],
        }
    }
}

impl Default for DecalSystem {
    fn default() -> Self {
        Self::new(DecalSettings::default())
    }
}
