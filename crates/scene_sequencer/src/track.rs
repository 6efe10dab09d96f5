// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tracks: ordered keyframes for one node property.

use crate::binding::Property;
use crate::error::{AnimationError, Result};
use crate::keyframe::{Interpolation, Keyframe, KeyframeId, PropertyValue};
use serde::{Deserialize, Serialize};

/// Unit of the values stored on a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ValueUnit {
    /// Absolute values
    #[default]
    Points,
    /// Fractions of the node's container size
    ContainerFraction,
}

impl ValueUnit {
    /// Convert a track value to absolute units.
    ///
    /// Vectors scale per axis, numbers by the container width. Other kinds
    /// pass through unchanged.
    pub fn resolve(&self, value: PropertyValue, container: [f32; 2]) -> PropertyValue {
        match (self, value) {
            (Self::Points, value) => value,
            (Self::ContainerFraction, PropertyValue::Vector([x, y])) => {
                PropertyValue::Vector([x * container[0], y * container[1]])
            }
            (Self::ContainerFraction, PropertyValue::Number(v)) => {
                PropertyValue::Number(v * container[0])
            }
            (Self::ContainerFraction, value) => value,
        }
    }
}

/// Keyframes driving one property of one node.
///
/// Keyframe times are kept strictly increasing: inserting at an occupied
/// time replaces the keyframe already there. Deserialized tracks are
/// rebuilt through [`PropertyTrack::with_keyframes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrackData")]
pub struct PropertyTrack {
    property: Property,
    #[serde(default)]
    unit: ValueUnit,
    keyframes: Vec<Keyframe>,
}

/// Track as written in a document, before ordering
#[derive(Deserialize)]
struct TrackData {
    property: Property,
    #[serde(default)]
    unit: ValueUnit,
    keyframes: Vec<Keyframe>,
}

impl TryFrom<TrackData> for PropertyTrack {
    type Error = AnimationError;

    fn try_from(data: TrackData) -> Result<Self> {
        Ok(Self::with_keyframes(data.property, data.keyframes)?.with_unit(data.unit))
    }
}

impl PropertyTrack {
    /// Create an empty track
    pub fn new(property: impl Into<Property>) -> Self {
        Self {
            property: property.into(),
            unit: ValueUnit::Points,
            keyframes: Vec::new(),
        }
    }

    /// Create a track from a list of keyframes in any order
    pub fn with_keyframes(
        property: impl Into<Property>,
        keyframes: impl IntoIterator<Item = Keyframe>,
    ) -> Result<Self> {
        let mut track = Self::new(property);
        for keyframe in keyframes {
            track.add_keyframe(keyframe)?;
        }
        Ok(track)
    }

    /// Set the unit of the track's values
    pub fn with_unit(mut self, unit: ValueUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Animated property
    pub fn property(&self) -> &Property {
        &self.property
    }

    /// Unit of the track's values
    pub fn unit(&self) -> ValueUnit {
        self.unit
    }

    /// Add a keyframe, replacing any keyframe at the same time
    pub fn add_keyframe(&mut self, keyframe: Keyframe) -> Result<KeyframeId> {
        let time = keyframe.time();
        if !time.is_finite() {
            return Err(AnimationError::InvalidKeyframeTime(time));
        }

        let id = keyframe.id();
        self.insert(keyframe);
        Ok(id)
    }

    /// Insert a keyframe with a finite time in order
    fn insert(&mut self, keyframe: Keyframe) {
        let time = keyframe.time();
        let idx = self.keyframes.partition_point(|k| k.time() < time);
        match self.keyframes.get(idx) {
            Some(existing) if existing.time() == time => self.keyframes[idx] = keyframe,
            _ => self.keyframes.insert(idx, keyframe),
        }
    }

    /// Remove a keyframe
    pub fn remove_keyframe(&mut self, keyframe_id: KeyframeId) -> Option<Keyframe> {
        let idx = self.keyframes.iter().position(|k| k.id() == keyframe_id)?;
        Some(self.keyframes.remove(idx))
    }

    /// Move keyframe to a new time
    pub fn move_keyframe(&mut self, keyframe_id: KeyframeId, new_time: f32) -> Result<()> {
        if !new_time.is_finite() {
            return Err(AnimationError::InvalidKeyframeTime(new_time));
        }
        if let Some(keyframe) = self.remove_keyframe(keyframe_id) {
            self.add_keyframe(keyframe.at_time(new_time))?;
        }
        Ok(())
    }

    /// Duplicate keyframe to new time
    pub fn duplicate_keyframe(
        &mut self,
        keyframe_id: KeyframeId,
        new_time: f32,
    ) -> Result<Option<KeyframeId>> {
        match self.keyframe(keyframe_id).map(|k| k.duplicate_at(new_time)) {
            Some(copy) => self.add_keyframe(copy).map(Some),
            None => Ok(None),
        }
    }

    /// Get keyframe by ID
    pub fn keyframe(&self, keyframe_id: KeyframeId) -> Option<&Keyframe> {
        self.keyframes.iter().find(|k| k.id() == keyframe_id)
    }

    /// Get keyframe at exactly this time
    pub fn keyframe_at(&self, time: f32) -> Option<&Keyframe> {
        self.keyframes.iter().find(|k| k.time() == time)
    }

    /// Get all keyframes
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Get keyframe count
    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Get the duration (time of last keyframe)
    pub fn duration(&self) -> f32 {
        self.keyframes.last().map_or(0.0, Keyframe::time)
    }

    /// Get keyframes in a time range
    pub fn keyframes_in_range(&self, start: f32, end: f32) -> &[Keyframe] {
        let lo = self.keyframes.partition_point(|k| k.time() < start);
        let hi = self.keyframes.partition_point(|k| k.time() <= end);
        &self.keyframes[lo..hi.max(lo)]
    }

    /// Offset all keyframes by a time delta
    pub fn offset_time(&mut self, delta: f32) {
        self.retime(|t| (t + delta).max(0.0));
    }

    /// Scale all keyframes by a time factor
    pub fn scale_time(&mut self, factor: f32) {
        self.retime(|t| t * factor);
    }

    /// Mirror all keyframes around the track's midpoint
    pub fn reverse(&mut self) {
        let duration = self.duration();
        self.retime(|t| duration - t);
    }

    fn retime(&mut self, f: impl Fn(f32) -> f32) {
        let old = std::mem::take(&mut self.keyframes);
        for keyframe in old {
            let time = f(keyframe.time());
            let time = if time.is_finite() { time } else { 0.0 };
            // Collisions collapse onto the later keyframe in original order
            self.insert(keyframe.at_time(time));
        }
    }

    /// Evaluate the track at `time`.
    ///
    /// Times before the first keyframe clamp to its value, times after the
    /// last clamp to the last value. Pure in `time` and the keyframe list.
    pub fn value_at(&self, time: f32) -> Option<PropertyValue> {
        let first = self.keyframes.first()?;
        if time.is_nan() || time <= first.time() {
            return Some(first.value().clone());
        }

        let next = self.keyframes.partition_point(|k| k.time() <= time);
        let Some(b) = self.keyframes.get(next) else {
            return self.keyframes.last().map(|k| k.value().clone());
        };
        let a = &self.keyframes[next - 1];

        let t = (time - a.time()) / (b.time() - a.time());
        if self.property.is_discrete() {
            return Some(a.value().clone());
        }
        Some(Interpolation::interpolate(a, b, t))
    }

    /// Evaluate the track and convert the result to absolute units
    pub fn resolved_value_at(&self, time: f32, container: [f32; 2]) -> Option<PropertyValue> {
        self.value_at(time).map(|v| self.unit.resolve(v, container))
    }

    /// Value of the first keyframe
    pub fn first_value(&self) -> Option<&PropertyValue> {
        self.keyframes.first().map(Keyframe::value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::EasingMode;

    fn opacity_track() -> PropertyTrack {
        PropertyTrack::with_keyframes(
            Property::Opacity,
            [
                Keyframe::new(2.0, PropertyValue::Number(1.0)),
                Keyframe::new(0.0, PropertyValue::Number(0.0)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_keyframes_sorted_on_insert() {
        let track = opacity_track();
        let times: Vec<f32> = track.keyframes().iter().map(Keyframe::time).collect();
        assert_eq!(times, vec![0.0, 2.0]);
    }

    #[test]
    fn test_insert_at_same_time_replaces() {
        let mut track = opacity_track();
        track.add_keyframe(Keyframe::new(2.0, PropertyValue::Number(0.5))).unwrap();
        assert_eq!(track.keyframe_count(), 2);
        assert_eq!(track.value_at(2.0), Some(PropertyValue::Number(0.5)));
    }

    #[test]
    fn test_invalid_time_rejected() {
        let mut track = opacity_track();
        assert!(track.add_keyframe(Keyframe::new(f32::NAN, PropertyValue::Number(0.0))).is_err());
        assert!(track.add_keyframe(Keyframe::new(f32::INFINITY, PropertyValue::Number(0.0))).is_err());
    }

    #[test]
    fn test_value_at_clamps_and_interpolates() {
        let track = opacity_track();
        assert_eq!(track.value_at(-1.0), Some(PropertyValue::Number(0.0)));
        assert_eq!(track.value_at(0.0), Some(PropertyValue::Number(0.0)));
        assert_eq!(track.value_at(1.0), Some(PropertyValue::Number(0.5)));
        assert_eq!(track.value_at(2.0), Some(PropertyValue::Number(1.0)));
        assert_eq!(track.value_at(5.0), Some(PropertyValue::Number(1.0)));
    }

    #[test]
    fn test_empty_track_has_no_value() {
        assert_eq!(PropertyTrack::new(Property::Opacity).value_at(0.0), None);
    }

    #[test]
    fn test_endpoints_exact_for_every_easing() {
        for easing in [
            EasingMode::Linear,
            EasingMode::ease_in(),
            EasingMode::BounceOut,
            EasingMode::ElasticOut { period: 0.3 },
            EasingMode::Instant,
        ] {
            let track = PropertyTrack::with_keyframes(
                Property::Rotation,
                [
                    Keyframe::new(0.0, PropertyValue::Number(0.3)).with_easing(easing),
                    Keyframe::new(1.7, PropertyValue::Number(91.1)),
                ],
            )
            .unwrap();
            assert_eq!(track.value_at(0.0), Some(PropertyValue::Number(0.3)));
            assert_eq!(track.value_at(1.7), Some(PropertyValue::Number(91.1)));
        }
    }

    #[test]
    fn test_discrete_property_steps_at_later_keyframe() {
        let track = PropertyTrack::with_keyframes(
            Property::SpriteFrame,
            [
                Keyframe::new(0.0, PropertyValue::Token("a".into())),
                Keyframe::new(1.0, PropertyValue::Token("b".into())),
            ],
        )
        .unwrap();
        assert_eq!(track.value_at(0.999), Some(PropertyValue::Token("a".into())));
        assert_eq!(track.value_at(1.0), Some(PropertyValue::Token("b".into())));
    }

    #[test]
    fn test_move_keyframe_keeps_order() {
        let mut track = opacity_track();
        let id = track.keyframes()[0].id();
        track.move_keyframe(id, 3.0).unwrap();
        assert_eq!(track.keyframes()[1].id(), id);
        assert_eq!(track.duration(), 3.0);
    }

    #[test]
    fn test_reverse_and_offset() {
        let mut track = opacity_track();
        track.reverse();
        assert_eq!(track.value_at(0.0), Some(PropertyValue::Number(1.0)));
        track.offset_time(1.0);
        assert_eq!(track.keyframes()[0].time(), 1.0);
        track.scale_time(0.5);
        assert_eq!(track.duration(), 1.5);
    }

    #[test]
    fn test_retime_collisions_keep_later_keyframe() {
        let mut track = opacity_track();
        track.scale_time(0.0);
        assert_eq!(track.keyframes().len(), 1);
        assert_eq!(track.keyframes()[0].time(), 0.0);
        assert_eq!(track.value_at(5.0), Some(PropertyValue::Number(1.0)));
    }

    #[test]
    fn test_fraction_unit_resolves_against_container() {
        let track = PropertyTrack::with_keyframes(
            Property::Position,
            [Keyframe::new(0.0, PropertyValue::Vector([0.5, 0.25]))],
        )
        .unwrap()
        .with_unit(ValueUnit::ContainerFraction);
        assert_eq!(
            track.resolved_value_at(0.0, [200.0, 100.0]),
            Some(PropertyValue::Vector([100.0, 25.0]))
        );
    }

    #[test]
    fn test_keyframes_in_range() {
        let track = opacity_track();
        assert_eq!(track.keyframes_in_range(0.0, 1.0).len(), 1);
        assert_eq!(track.keyframes_in_range(0.0, 2.0).len(), 2);
        assert!(track.keyframes_in_range(3.0, 4.0).is_empty());
    }

    #[test]
    fn test_deserialized_keyframes_are_ordered() {
        let track: PropertyTrack = ron::from_str(
            "(property: Opacity, keyframes: [
                (time: 2.0, value: Number(1.0)),
                (time: 0.0, value: Number(0.0)),
                (time: 2.0, value: Number(0.8)),
            ])",
        )
        .unwrap();
        let times: Vec<f32> = track.keyframes().iter().map(Keyframe::time).collect();
        assert_eq!(times, vec![0.0, 2.0]);
        assert_eq!(track.value_at(1.0), Some(PropertyValue::Number(0.4)));
        assert_eq!(track.value_at(2.0), Some(PropertyValue::Number(0.8)));

        let reloaded: PropertyTrack = ron::from_str(&ron::to_string(&track).unwrap()).unwrap();
        assert_eq!(reloaded, track);
    }
}
