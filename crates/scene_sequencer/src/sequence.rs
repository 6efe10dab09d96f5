// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequence containing property tracks and timeline markers.

use crate::binding::{NodeId, PropertyBinding};
use crate::keyframe::PropertyValue;
use crate::track::PropertyTrack;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceId(pub u32);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lookup key for a sequence: its id or its name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SequenceRef {
    /// By stable id
    Id(SequenceId),
    /// By human name
    Name(String),
}

impl fmt::Display for SequenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => id.fmt(f),
            Self::Name(name) => write!(f, "\"{name}\""),
        }
    }
}

impl From<SequenceId> for SequenceRef {
    fn from(id: SequenceId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for SequenceRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for SequenceRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for SequenceRef {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

/// A named callback fired when playback crosses its time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackKeyframe {
    /// Trigger time in seconds
    pub time: f32,
    /// Callback identifier dispatched to the registered handler
    pub callback_id: String,
}

/// A sound cue fired when playback crosses its time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundKeyframe {
    /// Trigger time in seconds
    pub time: f32,
    /// Sound asset name
    pub sound: String,
    /// Playback pitch multiplier
    pub pitch: f32,
    /// Stereo pan, -1 to 1
    pub pan: f32,
    /// Volume multiplier
    pub gain: f32,
}

impl SoundKeyframe {
    /// Create a sound cue with neutral pitch, pan and gain
    pub fn new(time: f32, sound: impl Into<String>) -> Self {
        Self {
            time,
            sound: sound.into(),
            pitch: 1.0,
            pan: 0.0,
            gain: 1.0,
        }
    }
}

/// Anything placed on the timeline at a fixed time
trait Marker {
    fn time(&self) -> f32;
}

impl Marker for CallbackKeyframe {
    fn time(&self) -> f32 {
        self.time
    }
}

impl Marker for SoundKeyframe {
    fn time(&self) -> f32 {
        self.time
    }
}

/// Half-open window swept by the playhead between two evaluations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    /// Time before the move
    pub from: f32,
    /// Time after the move
    pub to: f32,
    /// Whether a marker sitting exactly on `from` counts as crossed
    pub include_start: bool,
}

impl TimeWindow {
    /// Window for a move from `from` to `to`, excluding `from`
    pub fn new(from: f32, to: f32) -> Self {
        Self {
            from,
            to,
            include_start: false,
        }
    }

    /// Count a marker sitting exactly on the start as crossed
    pub fn including_start(mut self) -> Self {
        self.include_start = true;
        self
    }

    /// Whether the window sweeps backwards in time
    pub fn is_backward(&self) -> bool {
        self.to < self.from
    }

    fn contains(&self, time: f32) -> bool {
        if time == self.from {
            return self.include_start;
        }
        if self.is_backward() {
            time >= self.to && time < self.from
        } else {
            time > self.from && time <= self.to
        }
    }
}

fn crossed<M: Marker>(markers: &[M], window: TimeWindow) -> Vec<&M> {
    let mut hits: Vec<&M> = markers.iter().filter(|m| window.contains(m.time())).collect();
    if window.is_backward() {
        hits.reverse();
    }
    hits
}

fn insert_sorted<M: Marker>(markers: &mut Vec<M>, marker: M) {
    let idx = markers.partition_point(|m| m.time() <= marker.time());
    markers.insert(idx, marker);
}

/// A named, fixed-duration collection of tracks
///
/// Deserialized sequences go through the same duration and marker
/// normalization as [`Sequence::new`] and [`Sequence::add_callback`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "SequenceData")]
pub struct Sequence {
    /// Stable sequence ID
    pub id: SequenceId,
    /// Sequence name
    pub name: String,
    duration: f32,
    tracks: IndexMap<PropertyBinding, PropertyTrack>,
    callbacks: Vec<CallbackKeyframe>,
    sounds: Vec<SoundKeyframe>,
    /// Sequence started when this one completes naturally
    pub chained_sequence: Option<SequenceId>,
}

/// Sequence as written in a document, before validation
#[derive(Deserialize)]
struct SequenceData {
    id: SequenceId,
    name: String,
    duration: f32,
    #[serde(default)]
    tracks: IndexMap<PropertyBinding, PropertyTrack>,
    #[serde(default)]
    callbacks: Vec<CallbackKeyframe>,
    #[serde(default)]
    sounds: Vec<SoundKeyframe>,
    #[serde(default)]
    chained_sequence: Option<SequenceId>,
}

impl From<SequenceData> for Sequence {
    fn from(data: SequenceData) -> Self {
        let mut sequence = Self::new(data.id, data.name, data.duration);
        sequence.tracks = data.tracks;
        sequence.chained_sequence = data.chained_sequence;
        for callback in data.callbacks {
            insert_sorted(&mut sequence.callbacks, callback);
        }
        for sound in data.sounds {
            insert_sorted(&mut sequence.sounds, sound);
        }
        sequence
    }
}

impl Sequence {
    /// Create a new sequence. Non-finite or negative durations become zero.
    pub fn new(id: SequenceId, name: impl Into<String>, duration: f32) -> Self {
        Self {
            id,
            name: name.into(),
            duration: sanitize_duration(duration),
            tracks: IndexMap::new(),
            callbacks: Vec::new(),
            sounds: Vec::new(),
            chained_sequence: None,
        }
    }

    /// Set the sequence to start after this one completes
    pub fn with_chained_sequence(mut self, next: SequenceId) -> Self {
        self.chained_sequence = Some(next);
        self
    }

    /// Sequence duration in seconds
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Change the sequence duration
    pub fn set_duration(&mut self, duration: f32) {
        self.duration = sanitize_duration(duration);
    }

    /// Clamp a time into `[0, duration]`; NaN maps to zero
    pub fn clamp_time(&self, time: f32) -> f32 {
        if time.is_nan() {
            return 0.0;
        }
        time.max(0.0).min(self.duration.max(0.0))
    }

    /// Bind a track to a node, returning any track it replaced
    pub fn add_track(&mut self, node: NodeId, track: PropertyTrack) -> Option<PropertyTrack> {
        let binding = PropertyBinding::new(node, track.property().clone());
        self.tracks.insert(binding, track)
    }

    /// Remove a track
    pub fn remove_track(&mut self, binding: &PropertyBinding) -> Option<PropertyTrack> {
        self.tracks.shift_remove(binding)
    }

    /// Get a track
    pub fn track(&self, binding: &PropertyBinding) -> Option<&PropertyTrack> {
        self.tracks.get(binding)
    }

    /// Get all tracks with their bindings
    pub fn tracks(&self) -> impl Iterator<Item = (&PropertyBinding, &PropertyTrack)> {
        self.tracks.iter()
    }

    /// Get track count
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Whether any track targets the node
    pub fn animates_node(&self, node: NodeId) -> bool {
        self.tracks.keys().any(|b| b.node == node)
    }

    /// Tracks targeting one node
    pub fn tracks_for_node(&self, node: NodeId) -> impl Iterator<Item = &PropertyTrack> {
        self.tracks
            .iter()
            .filter(move |(b, _)| b.node == node)
            .map(|(_, t)| t)
    }

    /// Rebind every track targeting `from` to `to`. Returns the number moved.
    ///
    /// A moved track replaces any track `to` already had for the same
    /// property, keeping the replaced track's position.
    pub fn retarget(&mut self, from: NodeId, to: NodeId) -> usize {
        if from == to {
            return 0;
        }
        let (moved, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tracks)
            .into_iter()
            .partition(|(binding, _)| binding.node == from);
        self.tracks = kept.into_iter().collect();
        let count = moved.len();
        for (binding, track) in moved {
            self.tracks.insert(PropertyBinding::new(to, binding.property), track);
        }
        count
    }

    /// Drop every track targeting the node
    pub fn remove_node(&mut self, node: NodeId) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|b, _| b.node != node);
        before - self.tracks.len()
    }

    /// Evaluate every track at `time`, clamped into the sequence.
    ///
    /// Values are in each track's own unit. Results follow track insertion
    /// order and are identical for identical inputs.
    pub fn evaluate_at(&self, time: f32) -> Vec<(&PropertyBinding, PropertyValue)> {
        let time = self.clamp_time(time);
        self.tracks
            .iter()
            .filter_map(|(binding, track)| track.value_at(time).map(|v| (binding, v)))
            .collect()
    }

    /// Evaluate every track and convert values to absolute units
    pub fn evaluate_resolved_at(
        &self,
        time: f32,
        mut container_size: impl FnMut(NodeId) -> [f32; 2],
    ) -> Vec<(&PropertyBinding, PropertyValue)> {
        let time = self.clamp_time(time);
        self.tracks
            .iter()
            .filter_map(|(binding, track)| {
                track
                    .resolved_value_at(time, container_size(binding.node))
                    .map(|v| (binding, v))
            })
            .collect()
    }

    /// Add a callback marker
    pub fn add_callback(&mut self, time: f32, callback_id: impl Into<String>) {
        insert_sorted(
            &mut self.callbacks,
            CallbackKeyframe {
                time,
                callback_id: callback_id.into(),
            },
        );
    }

    /// Get all callback markers
    pub fn callbacks(&self) -> &[CallbackKeyframe] {
        &self.callbacks
    }

    /// Callback markers crossed by a playhead move, in playing order
    pub fn callbacks_crossed(&self, window: TimeWindow) -> Vec<&CallbackKeyframe> {
        crossed(&self.callbacks, window)
    }

    /// Add a sound cue
    pub fn add_sound(&mut self, sound: SoundKeyframe) {
        insert_sorted(&mut self.sounds, sound);
    }

    /// Get all sound cues
    pub fn sounds(&self) -> &[SoundKeyframe] {
        &self.sounds
    }

    /// Sound cues crossed by a playhead move, in playing order
    pub fn sounds_crossed(&self, window: TimeWindow) -> Vec<&SoundKeyframe> {
        crossed(&self.sounds, window)
    }

    /// Get the duration based on track content
    pub fn content_duration(&self) -> f32 {
        self.tracks.values().map(PropertyTrack::duration).fold(0.0, f32::max)
    }
}

fn sanitize_duration(duration: f32) -> f32 {
    if duration.is_finite() {
        duration.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::Property;
    use crate::keyframe::Keyframe;
    use slotmap::SlotMap;

    fn nodes(n: usize) -> Vec<NodeId> {
        let mut map: SlotMap<NodeId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    fn callbacks_sequence() -> Sequence {
        let mut seq = Sequence::new(SequenceId(1), "intro", 3.0);
        seq.add_callback(2.0, "b");
        seq.add_callback(0.0, "start");
        seq.add_callback(1.0, "a");
        seq
    }

    fn ids(hits: Vec<&CallbackKeyframe>) -> Vec<&str> {
        hits.into_iter().map(|c| c.callback_id.as_str()).collect()
    }

    #[test]
    fn test_forward_crossing_is_half_open() {
        let seq = callbacks_sequence();
        assert_eq!(ids(seq.callbacks_crossed(TimeWindow::new(0.0, 1.0))), vec!["a"]);
        assert_eq!(ids(seq.callbacks_crossed(TimeWindow::new(1.0, 3.0))), vec!["b"]);
        assert_eq!(
            ids(seq.callbacks_crossed(TimeWindow::new(0.0, 3.0).including_start())),
            vec!["start", "a", "b"]
        );
    }

    #[test]
    fn test_backward_crossing_is_reversed() {
        let seq = callbacks_sequence();
        assert_eq!(ids(seq.callbacks_crossed(TimeWindow::new(3.0, 0.5))), vec!["b", "a"]);
        assert_eq!(ids(seq.callbacks_crossed(TimeWindow::new(2.0, 0.0))), vec!["a", "start"]);
    }

    #[test]
    fn test_zero_length_window() {
        let seq = callbacks_sequence();
        assert!(seq.callbacks_crossed(TimeWindow::new(1.0, 1.0)).is_empty());
        assert_eq!(
            ids(seq.callbacks_crossed(TimeWindow::new(1.0, 1.0).including_start())),
            vec!["a"]
        );
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let node = nodes(1)[0];
        let mut seq = Sequence::new(SequenceId(1), "fade", 2.0);
        seq.add_track(
            node,
            PropertyTrack::with_keyframes(
                Property::Opacity,
                [
                    Keyframe::new(0.0, PropertyValue::Number(0.0)),
                    Keyframe::new(2.0, PropertyValue::Number(1.0)),
                ],
            )
            .unwrap(),
        );
        let a = seq.evaluate_at(0.731);
        let b = seq.evaluate_at(0.731);
        assert_eq!(a, b);
        assert_eq!(seq.evaluate_at(9.0)[0].1, PropertyValue::Number(1.0));
    }

    #[test]
    fn test_retarget_moves_only_matching_tracks() {
        let n = nodes(3);
        let mut seq = Sequence::new(SequenceId(1), "move", 1.0);
        seq.add_track(n[0], PropertyTrack::new(Property::Opacity));
        seq.add_track(n[0], PropertyTrack::new(Property::Position));
        seq.add_track(n[1], PropertyTrack::new(Property::Opacity));

        assert_eq!(seq.retarget(n[0], n[2]), 2);
        assert!(!seq.animates_node(n[0]));
        assert_eq!(seq.tracks_for_node(n[2]).count(), 2);
        assert_eq!(seq.tracks_for_node(n[1]).count(), 1);
    }

    #[test]
    fn test_duration_is_sanitized() {
        assert_eq!(Sequence::new(SequenceId(1), "a", -1.0).duration(), 0.0);
        assert_eq!(Sequence::new(SequenceId(1), "a", f32::NAN).duration(), 0.0);
        let seq = Sequence::new(SequenceId(1), "a", 2.0);
        assert_eq!(seq.clamp_time(f32::NAN), 0.0);
        assert_eq!(seq.clamp_time(5.0), 2.0);
    }

    #[test]
    fn test_deserialized_duration_is_sanitized() {
        let seq: Sequence =
            ron::from_str(r#"(id: (9), name: "neg", duration: -1.0, tracks: {})"#).unwrap();
        assert_eq!(seq.duration(), 0.0);
        assert_eq!(seq.clamp_time(0.5), 0.0);
        assert_eq!(seq.clamp_time(-0.5), 0.0);

        let seq: Sequence = ron::from_str(
            r#"(
                id: (4),
                name: "markers",
                duration: 2.0,
                tracks: {},
                callbacks: [
                    (time: 1.5, callback_id: "late"),
                    (time: 0.5, callback_id: "early"),
                ],
            )"#,
        )
        .unwrap();
        let ids: Vec<_> = seq.callbacks().iter().map(|c| c.callback_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_retarget_replaces_existing_track() {
        let n = nodes(2);
        let mut seq = Sequence::new(SequenceId(1), "move", 1.0);
        let moved = PropertyTrack::with_keyframes(
            Property::Opacity,
            vec![Keyframe::new(0.0, PropertyValue::Number(0.25))],
        )
        .unwrap();
        let replaced = PropertyTrack::with_keyframes(
            Property::Opacity,
            vec![Keyframe::new(0.0, PropertyValue::Number(0.75))],
        )
        .unwrap();
        seq.add_track(n[1], replaced);
        seq.add_track(n[0], moved);

        assert_eq!(seq.retarget(n[0], n[1]), 1);
        assert_eq!(seq.track_count(), 1);
        let binding = PropertyBinding::new(n[1], Property::Opacity);
        assert_eq!(seq.evaluate_at(0.0), vec![(&binding, PropertyValue::Number(0.25))]);
        assert_eq!(seq.retarget(n[1], n[1]), 0);
    }
}
