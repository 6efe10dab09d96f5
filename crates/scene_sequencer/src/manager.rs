// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animation manager: runs sequences against a scene graph.
//!
//! The manager owns sequences, node bindings and base values, and is ticked
//! once per frame by an external scheduler through [`AnimationManager::update`].
//! It never owns nodes: every write goes through a [`NodeStore`] handed in
//! by the caller, and handles that stop resolving are skipped and pruned.
//!
//! Seeking, forward play and backward play all evaluate through
//! [`Sequence::evaluate_resolved_at`], so jumping to a time leaves nodes in
//! the same state as playing up to it.

use crate::base_values::BaseValueStore;
use crate::binding::{NodeId, NodeStore, Property, PropertyBinding};
use crate::config::ManagerConfig;
use crate::error::{AnimationError, AnimationWarning, Result};
use crate::keyframe::PropertyValue;
use crate::playback::{PlaybackRequest, PlaybackRequests, PlaybackState, Playhead, Step, Tween};
use crate::sequence::{Sequence, SequenceId, SequenceRef, SoundKeyframe, TimeWindow};
use crate::track::PropertyTrack;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Passed to the completion handler when a sequence finishes on its own
#[derive(Debug)]
pub struct CompletionEvent<'a, C> {
    /// Opaque owner context of the manager
    pub owner: &'a C,
    /// Completed sequence
    pub sequence_id: SequenceId,
    /// Name of the completed sequence
    pub sequence_name: &'a str,
}

/// Passed to a keyframe callback handler when its marker is crossed
#[derive(Debug)]
pub struct KeyframeEvent<'a, C> {
    /// Opaque owner context of the manager
    pub owner: &'a C,
    /// Sequence the marker belongs to
    pub sequence_id: SequenceId,
    /// Callback identifier of the marker
    pub callback_id: &'a str,
    /// Marker time
    pub time: f32,
}

/// Completion handler
pub type CompletedCallback<C> = Box<dyn FnMut(&CompletionEvent<'_, C>, &mut PlaybackRequests)>;

/// Keyframe callback handler
pub type KeyframeCallback<C> = Box<dyn FnMut(&KeyframeEvent<'_, C>, &mut PlaybackRequests)>;

/// Sound cue handler
pub type SoundHandler = Box<dyn FnMut(&SoundKeyframe)>;

/// What happened during one manager call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Absorbed data issues
    pub warnings: Vec<AnimationWarning>,
    /// Callback markers crossed, in firing order
    pub fired_callbacks: Vec<String>,
    /// Sequence that completed naturally, if any
    pub completed: Option<SequenceId>,
}

impl FrameReport {
    fn warn(&mut self, warning: AnimationWarning) {
        tracing::debug!("{:?}", warning);
        self.warnings.push(warning);
    }

    fn absorb(&mut self, other: FrameReport) {
        self.warnings.extend(other.warnings);
        self.fired_callbacks.extend(other.fired_callbacks);
        self.completed = self.completed.or(other.completed);
    }
}

/// Timeline-driven animation manager for one root node's subtree
pub struct AnimationManager<C = ()> {
    owner: C,
    root_node: Option<NodeId>,
    root_container_size: [f32; 2],
    sequences: IndexMap<SequenceId, Sequence>,
    names: HashMap<String, SequenceId>,
    node_sequences: HashMap<NodeId, BTreeSet<SequenceId>>,
    base_values: BaseValueStore,
    playhead: Option<Playhead>,
    playback_speed: f32,
    paused: bool,
    default_tween_duration: f32,
    auto_play: Option<SequenceRef>,
    last_completed: Option<SequenceId>,
    completed_callback: Option<CompletedCallback<C>>,
    keyframe_callbacks: HashMap<String, KeyframeCallback<C>>,
    sound_handler: Option<SoundHandler>,
    requests: PlaybackRequests,
}

impl Default for AnimationManager<()> {
    fn default() -> Self {
        Self::new(())
    }
}

impl<C> AnimationManager<C> {
    /// Create a manager with default settings
    pub fn new(owner: C) -> Self {
        Self {
            owner,
            root_node: None,
            root_container_size: [0.0, 0.0],
            sequences: IndexMap::new(),
            names: HashMap::new(),
            node_sequences: HashMap::new(),
            base_values: BaseValueStore::new(),
            playhead: None,
            playback_speed: 1.0,
            paused: false,
            default_tween_duration: 0.0,
            auto_play: None,
            last_completed: None,
            completed_callback: None,
            keyframe_callbacks: HashMap::new(),
            sound_handler: None,
            requests: PlaybackRequests::default(),
        }
    }

    /// Create a manager from a configuration
    pub fn with_config(owner: C, config: &ManagerConfig) -> Self {
        let mut manager = Self::new(owner);
        manager.apply_config(config);
        manager
    }

    /// Apply configuration values
    pub fn apply_config(&mut self, config: &ManagerConfig) {
        self.set_playback_speed(config.playback_speed);
        self.paused = config.paused;
        self.default_tween_duration = if config.default_tween_duration.is_finite() {
            config.default_tween_duration.max(0.0)
        } else {
            0.0
        };
        self.auto_play = config.auto_play_sequence.as_ref().map(SequenceRef::from);
        self.root_container_size = config.root_container_size;
    }

    // ------------------------------------------------------------------
    // Owner, root and container
    // ------------------------------------------------------------------

    /// Opaque owner context passed to handlers
    pub fn owner(&self) -> &C {
        &self.owner
    }

    /// Replace the owner context
    pub fn set_owner(&mut self, owner: C) {
        self.owner = owner;
    }

    /// Root node of the animated subtree
    pub fn root_node(&self) -> Option<NodeId> {
        self.root_node
    }

    /// Set the root node of the animated subtree
    pub fn set_root_node(&mut self, root: Option<NodeId>) {
        self.root_node = root;
    }

    /// Container size reported for the root node
    pub fn root_container_size(&self) -> [f32; 2] {
        self.root_container_size
    }

    /// Set the container size reported for the root node
    pub fn set_root_container_size(&mut self, size: [f32; 2]) {
        self.root_container_size = size;
    }

    /// Size that relative values of `node` are measured against.
    ///
    /// The root node and parentless nodes use the root container size; any
    /// other node uses its parent's content size.
    pub fn container_size<S: NodeStore + ?Sized>(&self, store: &S, node: NodeId) -> [f32; 2] {
        if self.root_node == Some(node) {
            return self.root_container_size;
        }
        store
            .parent(node)
            .and_then(|parent| store.node(parent))
            .map_or(self.root_container_size, |parent| parent.content_size())
    }

    // ------------------------------------------------------------------
    // Sequences
    // ------------------------------------------------------------------

    /// Register a sequence
    pub fn add_sequence(&mut self, sequence: Sequence) -> Result<SequenceId> {
        let id = sequence.id;
        if self.sequences.contains_key(&id) {
            return Err(AnimationError::DuplicateSequence(id));
        }
        if let Some(existing) = self.names.get(&sequence.name) {
            return Err(AnimationError::DuplicateSequence(*existing));
        }

        for (binding, _) in sequence.tracks() {
            self.node_sequences.entry(binding.node).or_default().insert(id);
        }
        self.names.insert(sequence.name.clone(), id);
        tracing::debug!("Registered sequence {} \"{}\"", id, sequence.name);
        self.sequences.insert(id, sequence);
        Ok(id)
    }

    /// Remove a sequence. Removing the running sequence stops it without
    /// a completion notification.
    pub fn remove_sequence(&mut self, target: impl Into<SequenceRef>) -> Result<Sequence> {
        let id = self.resolve(&target.into())?;
        let sequence = self
            .sequences
            .shift_remove(&id)
            .ok_or_else(|| AnimationError::SequenceNotFound(id.to_string()))?;
        self.names.remove(&sequence.name);
        for bound in self.node_sequences.values_mut() {
            bound.remove(&id);
        }
        self.node_sequences.retain(|_, bound| !bound.is_empty());
        if self.running_sequence_id() == Some(id) {
            self.playhead = None;
        }
        Ok(sequence)
    }

    /// Resolve a name or id to a registered sequence id
    pub fn resolve(&self, target: &SequenceRef) -> Result<SequenceId> {
        let id = match target {
            SequenceRef::Id(id) => Some(*id).filter(|id| self.sequences.contains_key(id)),
            SequenceRef::Name(name) => self.names.get(name).copied(),
        };
        id.ok_or_else(|| AnimationError::SequenceNotFound(target.to_string()))
    }

    /// Get a sequence by id
    pub fn sequence(&self, id: SequenceId) -> Option<&Sequence> {
        self.sequences.get(&id)
    }

    /// Get a sequence by name
    pub fn sequence_named(&self, name: &str) -> Option<&Sequence> {
        self.names.get(name).and_then(|id| self.sequences.get(id))
    }

    /// All sequences in registration order
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }

    // ------------------------------------------------------------------
    // Nodes and base values
    // ------------------------------------------------------------------

    /// Register a node's tracks across one or more sequences.
    ///
    /// The base value of every newly seen (node, property) pair is captured
    /// from the live node, or from the track's first keyframe when the node
    /// cannot report it. Nothing is registered if any sequence id is unknown.
    pub fn add_node<S: NodeStore + ?Sized>(
        &mut self,
        store: &S,
        node: NodeId,
        bindings: impl IntoIterator<Item = (SequenceId, Vec<PropertyTrack>)>,
    ) -> Result<()> {
        let bindings: Vec<(SequenceId, Vec<PropertyTrack>)> = bindings.into_iter().collect();
        if let Some((missing, _)) = bindings.iter().find(|(id, _)| !self.sequences.contains_key(id)) {
            return Err(AnimationError::SequenceNotFound(missing.to_string()));
        }

        let container = self.container_size(store, node);
        for (id, tracks) in bindings {
            for track in tracks {
                let property = track.property().clone();
                if !self.base_values.capture(store, node, &property) {
                    if let Some(first) = track.resolved_value_at(0.0, container) {
                        self.base_values.capture_value(node, &property, first);
                    }
                }
                if let Some(sequence) = self.sequences.get_mut(&id) {
                    sequence.add_track(node, track);
                }
            }
            self.node_sequences.entry(node).or_default().insert(id);
        }
        tracing::debug!("Bound node {:?} to {} sequence(s)", node, self.bound_sequences(node).len());
        Ok(())
    }

    /// Sequences with tracks bound to a node
    pub fn bound_sequences(&self, node: NodeId) -> Vec<SequenceId> {
        self.node_sequences
            .get(&node)
            .map(|bound| bound.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rebind every track and base value of `from` to `to`.
    ///
    /// Where `to` already has a track or base value for the same property,
    /// the one moved from `from` replaces it. Does nothing if `from` has no
    /// bindings.
    pub fn move_animations(&mut self, from: NodeId, to: NodeId) {
        let Some(bound) = self.node_sequences.remove(&from) else {
            tracing::debug!("move_animations: node {:?} has no bindings", from);
            return;
        };
        for id in &bound {
            if let Some(sequence) = self.sequences.get_mut(id) {
                sequence.retarget(from, to);
            }
        }
        self.node_sequences.entry(to).or_default().extend(bound);
        self.base_values.move_node(from, to);
        if let Some(tween) = self.playhead.as_mut().and_then(|p| p.tween.as_mut()) {
            tween.retarget(from, to);
        }
    }

    /// Override the captured base value of a property
    pub fn set_base_value(&mut self, value: PropertyValue, node: NodeId, property: impl Into<Property>) {
        self.base_values.set(node, &property.into(), value);
    }

    /// Captured base value of a property
    pub fn base_value(&self, node: NodeId, property: &Property) -> Result<&PropertyValue> {
        self.base_values.get(node, property)
    }

    /// Forget every captured base value
    pub fn reset_base_values(&mut self) {
        self.base_values.reset();
    }

    /// Drop bindings, tracks and base values of nodes that no longer resolve.
    /// Returns the pruned nodes.
    pub fn prune_orphans<S: NodeStore + ?Sized>(&mut self, store: &S) -> Vec<NodeId> {
        let stale: Vec<NodeId> = self
            .node_sequences
            .keys()
            .copied()
            .filter(|node| !store.contains(*node))
            .collect();
        for node in &stale {
            self.forget_node(*node);
        }
        stale
    }

    fn forget_node(&mut self, node: NodeId) {
        if let Some(bound) = self.node_sequences.remove(&node) {
            for id in bound {
                if let Some(sequence) = self.sequences.get_mut(&id) {
                    sequence.remove_node(node);
                }
            }
        }
        self.base_values.remove_node(node);
        if let Some(tween) = self.playhead.as_mut().and_then(|p| p.tween.as_mut()) {
            tween.from.retain(|b, _| b.node != node);
        }
        tracing::debug!("Pruned orphaned node {:?}", node);
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    /// Set the handler invoked whenever a sequence completes naturally.
    /// Replaces any previous handler.
    pub fn set_completed_callback(
        &mut self,
        handler: impl FnMut(&CompletionEvent<'_, C>, &mut PlaybackRequests) + 'static,
    ) {
        self.completed_callback = Some(Box::new(handler));
    }

    /// Remove the completion handler
    pub fn clear_completed_callback(&mut self) {
        self.completed_callback = None;
    }

    /// Set the handler for callback markers with this id
    pub fn register_keyframe_callback(
        &mut self,
        callback_id: impl Into<String>,
        handler: impl FnMut(&KeyframeEvent<'_, C>, &mut PlaybackRequests) + 'static,
    ) {
        self.keyframe_callbacks.insert(callback_id.into(), Box::new(handler));
    }

    /// Set the handler for sound cues
    pub fn set_sound_handler(&mut self, handler: impl FnMut(&SoundKeyframe) + 'static) {
        self.sound_handler = Some(Box::new(handler));
    }

    // ------------------------------------------------------------------
    // Playback settings and queries
    // ------------------------------------------------------------------

    /// Clock multiplier; negative plays backwards
    pub fn playback_speed(&self) -> f32 {
        self.playback_speed
    }

    /// Set the clock multiplier. Non-finite values are ignored.
    pub fn set_playback_speed(&mut self, speed: f32) {
        if !speed.is_finite() {
            tracing::warn!("Ignoring non-finite playback speed {}", speed);
            return;
        }
        self.playback_speed = speed;
    }

    /// Whether the clock is frozen
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Freeze or resume the clock without touching bindings
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Sequence started when a sequence without a chain completes
    pub fn set_auto_play_sequence(&mut self, target: impl Into<SequenceRef>) {
        self.auto_play = Some(target.into());
    }

    /// Stop auto-playing after completion
    pub fn clear_auto_play_sequence(&mut self) {
        self.auto_play = None;
    }

    /// Resolved auto-play sequence, if set and registered
    pub fn auto_play_sequence_id(&self) -> Option<SequenceId> {
        self.auto_play.as_ref().and_then(|target| self.resolve(target).ok())
    }

    /// Crossfade used by [`AnimationManager::run_sequence_default`]
    pub fn default_tween_duration(&self) -> f32 {
        self.default_tween_duration
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        match (&self.playhead, self.paused) {
            (None, _) => PlaybackState::Idle,
            (Some(_), true) => PlaybackState::Paused,
            (Some(_), false) => PlaybackState::Running,
        }
    }

    /// Whether a scheduler should keep ticking this manager
    pub fn wants_update(&self) -> bool {
        !self.paused && (self.playhead.is_some() || !self.requests.is_empty())
    }

    /// Id of the running sequence
    pub fn running_sequence_id(&self) -> Option<SequenceId> {
        self.playhead.as_ref().map(|p| p.sequence)
    }

    /// Name of the running sequence
    pub fn running_sequence_name(&self) -> Option<&str> {
        self.running_sequence_id()
            .and_then(|id| self.sequences.get(&id))
            .map(|s| s.name.as_str())
    }

    /// Name of the last sequence that completed naturally
    pub fn last_completed_sequence_name(&self) -> Option<&str> {
        self.last_completed
            .and_then(|id| self.sequences.get(&id))
            .map(|s| s.name.as_str())
    }

    /// Time of the running sequence's clock
    pub fn elapsed_time(&self) -> f32 {
        self.playhead.as_ref().map_or(0.0, |p| p.time)
    }

    /// Whether the running sequence is still inside its tween window
    pub fn is_tweening(&self) -> bool {
        self.playhead.as_ref().is_some_and(|p| p.tween.is_some())
    }

    /// Requests queued by handlers and not yet honored
    pub fn pending_requests(&self) -> &[PlaybackRequest] {
        self.requests.pending()
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Start a sequence with the configured default tween duration
    pub fn run_sequence_default<S: NodeStore + ?Sized>(
        &mut self,
        store: &mut S,
        target: impl Into<SequenceRef>,
    ) -> Result<FrameReport> {
        let tween = self.default_tween_duration;
        self.run_sequence(store, target, tween)
    }

    /// Start a sequence from time zero.
    ///
    /// Any running sequence is stopped. It only gets a completion
    /// notification if its clock was already resting on its end, e.g. after
    /// a seek to its duration.
    /// With a positive `tween_duration`, values crossfade from their base
    /// values to the sequence's first frame before the clock starts.
    pub fn run_sequence<S: NodeStore + ?Sized>(
        &mut self,
        store: &mut S,
        target: impl Into<SequenceRef>,
        tween_duration: f32,
    ) -> Result<FrameReport> {
        let id = self.resolve(&target.into())?;
        let mut report = FrameReport::default();
        let tween = self.sanitize_time(tween_duration, &mut report);
        self.start(store, id, tween, &mut report);
        Ok(report)
    }

    /// Jump to `time` in a sequence, making it the running sequence if needed.
    ///
    /// Evaluates and applies exactly once, and fires exactly the callbacks
    /// between the previous and the new time, in either direction.
    pub fn time_seek<S: NodeStore + ?Sized>(
        &mut self,
        store: &mut S,
        target: impl Into<SequenceRef>,
        time: f32,
    ) -> Result<FrameReport> {
        let id = self.resolve(&target.into())?;
        let mut report = FrameReport::default();
        let time = self.sanitize_time(time, &mut report);

        if self.running_sequence_id() != Some(id) {
            self.reset_unanimated_properties(store, id, &mut report);
            self.playhead = Some(Playhead::new(id));
        }

        let duration = self.sequences.get(&id).map_or(0.0, Sequence::duration);
        let Some(playhead) = self.playhead.as_mut() else {
            return Ok(report);
        };
        let window = playhead.seek(time.min(duration));

        self.apply_sequence(store, id, window.to, &mut report);
        self.fire_markers(id, window, &mut report);
        self.prune_reported(&report);
        Ok(report)
    }

    /// Advance the running sequence by one scheduler tick.
    ///
    /// Requests queued by handlers during earlier calls are honored first.
    /// Does nothing while paused.
    pub fn update<S: NodeStore + ?Sized>(&mut self, store: &mut S, delta_time: f32) -> FrameReport {
        let mut report = FrameReport::default();
        if self.paused {
            return report;
        }

        self.honor_requests(store, &mut report);

        let Some(id) = self.running_sequence_id() else {
            return report;
        };
        let delta = self.sanitize_time(delta_time, &mut report);
        let duration = self.sequences.get(&id).map_or(0.0, Sequence::duration);
        let speed = self.playback_speed;
        let Some(playhead) = self.playhead.as_mut() else {
            return report;
        };

        match playhead.advance(delta, speed, duration) {
            Step::Blending(alpha) => self.apply_blend(store, id, alpha, &mut report),
            Step::Moved { window, reached_end } => {
                self.apply_sequence(store, id, window.to, &mut report);
                self.fire_markers(id, window, &mut report);
                if reached_end {
                    self.complete(store, id, &mut report);
                }
            }
        }

        self.prune_reported(&report);
        report
    }

    fn honor_requests<S: NodeStore + ?Sized>(&mut self, store: &mut S, report: &mut FrameReport) {
        for request in self.requests.take() {
            let result = match request {
                PlaybackRequest::Run { target, tween_duration } => {
                    self.run_sequence(store, target, tween_duration)
                }
                PlaybackRequest::Seek { target, time } => self.time_seek(store, target, time),
            };
            match result {
                Ok(inner) => report.absorb(inner),
                Err(e) => tracing::warn!("Deferred playback request failed: {}", e),
            }
        }
    }

    fn start<S: NodeStore + ?Sized>(
        &mut self,
        store: &mut S,
        id: SequenceId,
        tween_duration: f32,
        report: &mut FrameReport,
    ) {
        if let Some(finished) = self.at_end() {
            self.notify_completed(finished, report);
        } else if let Some(previous) = self.running_sequence_id() {
            tracing::debug!("Stopping sequence {} for {}", previous, id);
        }
        self.reset_unanimated_properties(store, id, report);

        let mut playhead = Playhead::new(id);
        if tween_duration > 0.0 {
            let from: HashMap<PropertyBinding, PropertyValue> = self
                .sequences
                .get(&id)
                .map(|sequence| {
                    sequence
                        .tracks()
                        .filter_map(|(binding, _)| {
                            self.base_values.lookup(binding).map(|v| (binding.clone(), v.clone()))
                        })
                        .collect()
                })
                .unwrap_or_default();
            playhead.tween = Some(Tween {
                duration: tween_duration,
                elapsed: 0.0,
                from,
            });
        }
        let tweening = playhead.tween.is_some();
        self.playhead = Some(playhead);

        if tweening {
            self.apply_blend(store, id, 0.0, report);
        } else {
            self.apply_sequence(store, id, 0.0, report);
        }
        tracing::debug!("Running sequence {} (tween {}s)", id, tween_duration);
    }

    fn complete<S: NodeStore + ?Sized>(&mut self, store: &mut S, id: SequenceId, report: &mut FrameReport) {
        self.playhead = None;
        self.notify_completed(id, report);

        let next = self
            .sequences
            .get(&id)
            .and_then(|sequence| sequence.chained_sequence)
            .filter(|next| self.sequences.contains_key(next))
            .or_else(|| self.auto_play_sequence_id());
        if let Some(next) = next {
            self.start(store, next, 0.0, report);
        }
    }

    fn notify_completed(&mut self, id: SequenceId, report: &mut FrameReport) {
        self.last_completed = Some(id);
        report.completed = Some(id);

        let Some(sequence) = self.sequences.get(&id) else {
            return;
        };
        tracing::debug!("Sequence {} \"{}\" completed", id, sequence.name);

        if let Some(handler) = self.completed_callback.as_mut() {
            let event = CompletionEvent {
                owner: &self.owner,
                sequence_id: id,
                sequence_name: &sequence.name,
            };
            handler(&event, &mut self.requests);
        }
    }

    /// Whether the running clock rests on the end boundary of its sequence
    /// in the playing direction
    fn at_end(&self) -> Option<SequenceId> {
        let playhead = self.playhead.as_ref().filter(|p| p.started && p.tween.is_none())?;
        let duration = self.sequences.get(&playhead.sequence)?.duration();
        let at_end = if self.playback_speed < 0.0 {
            playhead.time <= 0.0
        } else {
            playhead.time >= duration
        };
        at_end.then_some(playhead.sequence)
    }

    /// Put properties animated by other sequences, but not by `id`, back
    /// to their base values.
    fn reset_unanimated_properties<S: NodeStore + ?Sized>(
        &mut self,
        store: &mut S,
        id: SequenceId,
        report: &mut FrameReport,
    ) {
        let Some(sequence) = self.sequences.get(&id) else {
            return;
        };
        let mut resets: Vec<(PropertyBinding, PropertyValue)> = Vec::new();
        let mut seen: HashSet<PropertyBinding> = HashSet::new();
        for (node, bound) in &self.node_sequences {
            for other in bound.iter().filter(|other| **other != id) {
                let Some(other) = self.sequences.get(other) else {
                    continue;
                };
                for (binding, _) in other.tracks().filter(|(b, _)| b.node == *node) {
                    if sequence.track(binding).is_some() || !seen.insert(binding.clone()) {
                        continue;
                    }
                    if let Some(base) = self.base_values.lookup(binding) {
                        resets.push((binding.clone(), base.clone()));
                    }
                }
            }
        }
        self.write_values(store, resets, report);
    }

    fn apply_sequence<S: NodeStore + ?Sized>(
        &mut self,
        store: &mut S,
        id: SequenceId,
        time: f32,
        report: &mut FrameReport,
    ) {
        let values = self.evaluate(store, id, time);
        self.write_values(store, values, report);
    }

    fn apply_blend<S: NodeStore + ?Sized>(
        &mut self,
        store: &mut S,
        id: SequenceId,
        alpha: f32,
        report: &mut FrameReport,
    ) {
        let targets = self.evaluate(store, id, 0.0);
        let Some(tween) = self.playhead.as_ref().and_then(|p| p.tween.as_ref()) else {
            self.write_values(store, targets, report);
            return;
        };
        let values = targets
            .into_iter()
            .map(|(binding, target)| {
                let value = match tween.from.get(&binding) {
                    Some(from) => from.blend(&target, alpha),
                    None => target,
                };
                (binding, value)
            })
            .collect();
        self.write_values(store, values, report);
    }

    fn evaluate<S: NodeStore + ?Sized>(
        &self,
        store: &S,
        id: SequenceId,
        time: f32,
    ) -> Vec<(PropertyBinding, PropertyValue)> {
        let Some(sequence) = self.sequences.get(&id) else {
            return Vec::new();
        };
        sequence
            .evaluate_resolved_at(time, |node| self.container_size(store, node))
            .into_iter()
            .map(|(binding, value)| (binding.clone(), value))
            .collect()
    }

    fn write_values<S: NodeStore + ?Sized>(
        &self,
        store: &mut S,
        values: Vec<(PropertyBinding, PropertyValue)>,
        report: &mut FrameReport,
    ) {
        for (binding, value) in values {
            match store.node_mut(binding.node) {
                Some(node) => {
                    if !node.apply(&binding.property, &value) {
                        tracing::debug!(
                            "Node {:?} does not accept {:?} for {}",
                            binding.node,
                            value,
                            binding.property
                        );
                    }
                }
                None => report.warn(AnimationWarning::OrphanedBinding {
                    node: binding.node,
                    property: binding.property,
                }),
            }
        }
    }

    fn fire_markers(&mut self, id: SequenceId, window: TimeWindow, report: &mut FrameReport) {
        let Some(sequence) = self.sequences.get(&id) else {
            return;
        };
        let callbacks: Vec<(String, f32)> = sequence
            .callbacks_crossed(window)
            .into_iter()
            .map(|c| (c.callback_id.clone(), c.time))
            .collect();
        let sounds: Vec<SoundKeyframe> = sequence.sounds_crossed(window).into_iter().cloned().collect();

        for (callback_id, time) in callbacks {
            match self.keyframe_callbacks.get_mut(&callback_id) {
                Some(handler) => {
                    let event = KeyframeEvent {
                        owner: &self.owner,
                        sequence_id: id,
                        callback_id: &callback_id,
                        time,
                    };
                    handler(&event, &mut self.requests);
                }
                None => tracing::debug!("No handler for keyframe callback \"{}\"", callback_id),
            }
            report.fired_callbacks.push(callback_id);
        }

        if let Some(handler) = self.sound_handler.as_mut() {
            for sound in &sounds {
                handler(sound);
            }
        }
    }

    fn prune_reported(&mut self, report: &FrameReport) {
        let orphaned: BTreeSet<NodeId> = report
            .warnings
            .iter()
            .filter_map(|w| match w {
                AnimationWarning::OrphanedBinding { node, .. } => Some(*node),
                AnimationWarning::InvalidTime { .. } => None,
            })
            .collect();
        for node in orphaned {
            self.forget_node(node);
        }
    }

    fn sanitize_time(&self, time: f32, report: &mut FrameReport) -> f32 {
        if time.is_finite() && time >= 0.0 {
            return time;
        }
        report.warn(AnimationWarning::InvalidTime { value: time });
        0.0
    }
}
