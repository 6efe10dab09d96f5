// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pre-animation snapshots of animated properties.

use crate::binding::{NodeId, NodeStore, Property, PropertyBinding};
use crate::error::{AnimationError, Result};
use crate::keyframe::PropertyValue;
use std::collections::HashMap;

/// Base value of every (node, property) pair registered for animation.
///
/// An entry is captured once, the first time the pair is bound, and only
/// changes through [`BaseValueStore::set`], [`BaseValueStore::reset`] or a
/// node move. Playback never writes here.
#[derive(Debug, Clone, Default)]
pub struct BaseValueStore {
    values: HashMap<PropertyBinding, PropertyValue>,
}

impl BaseValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the live value of a property unless one is already stored.
    ///
    /// Returns `true` when a new entry was created. Nothing is recorded if
    /// the node no longer resolves or does not expose the property.
    pub fn capture<S: NodeStore + ?Sized>(
        &mut self,
        store: &S,
        node: NodeId,
        property: &Property,
    ) -> bool {
        let binding = PropertyBinding::new(node, property.clone());
        if self.values.contains_key(&binding) {
            return false;
        }
        let Some(value) = store.node(node).and_then(|n| n.value(property)) else {
            return false;
        };
        self.values.insert(binding, value);
        true
    }

    /// Record a value for a pair that has no entry yet
    pub fn capture_value(&mut self, node: NodeId, property: &Property, value: PropertyValue) -> bool {
        let binding = PropertyBinding::new(node, property.clone());
        if self.values.contains_key(&binding) {
            return false;
        }
        self.values.insert(binding, value);
        true
    }

    /// Overwrite the stored value
    pub fn set(&mut self, node: NodeId, property: &Property, value: PropertyValue) {
        self.values.insert(PropertyBinding::new(node, property.clone()), value);
    }

    /// Stored value for a pair
    pub fn get(&self, node: NodeId, property: &Property) -> Result<&PropertyValue> {
        self.values
            .get(&PropertyBinding::new(node, property.clone()))
            .ok_or_else(|| AnimationError::BaseValueNotFound {
                node,
                property: property.clone(),
            })
    }

    /// Stored value for a binding, if any
    pub fn lookup(&self, binding: &PropertyBinding) -> Option<&PropertyValue> {
        self.values.get(binding)
    }

    /// Whether a value is stored for the pair
    pub fn contains(&self, node: NodeId, property: &Property) -> bool {
        self.values.contains_key(&PropertyBinding::new(node, property.clone()))
    }

    /// Move every entry of `from` to `to`, replacing entries already on `to`
    pub fn move_node(&mut self, from: NodeId, to: NodeId) {
        let moved: Vec<(PropertyBinding, PropertyValue)> = self
            .values
            .iter()
            .filter(|(b, _)| b.node == from)
            .map(|(b, v)| (b.clone(), v.clone()))
            .collect();
        for (binding, value) in moved {
            self.values.remove(&binding);
            self.values.insert(PropertyBinding::new(to, binding.property), value);
        }
    }

    /// Drop every entry of a node
    pub fn remove_node(&mut self, node: NodeId) {
        self.values.retain(|b, _| b.node != node);
    }

    /// Clear all entries
    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{SceneGraph, SceneNode};

    #[test]
    fn test_capture_once() {
        let mut scene = SceneGraph::new();
        let node = scene.insert(SceneNode::new("sprite").with_opacity(0.25));
        let mut store = BaseValueStore::new();

        assert!(store.capture(&scene, node, &Property::Opacity));
        scene.get_mut(node).unwrap().opacity = 0.9;
        assert!(!store.capture(&scene, node, &Property::Opacity));
        assert_eq!(store.get(node, &Property::Opacity).unwrap(), &PropertyValue::Number(0.25));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let mut scene = SceneGraph::new();
        let node = scene.insert(SceneNode::new("sprite"));
        let store = BaseValueStore::new();
        assert!(matches!(
            store.get(node, &Property::Rotation),
            Err(AnimationError::BaseValueNotFound { .. })
        ));
    }

    #[test]
    fn test_capture_skips_destroyed_node() {
        let mut scene = SceneGraph::new();
        let node = scene.insert(SceneNode::new("sprite"));
        scene.remove(node);
        let mut store = BaseValueStore::new();
        assert!(!store.capture(&scene, node, &Property::Opacity));
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_overrides_and_reset_clears() {
        let mut scene = SceneGraph::new();
        let node = scene.insert(SceneNode::new("sprite"));
        let mut store = BaseValueStore::new();
        store.capture(&scene, node, &Property::Opacity);
        store.set(node, &Property::Opacity, PropertyValue::Number(0.0));
        assert_eq!(store.get(node, &Property::Opacity).unwrap(), &PropertyValue::Number(0.0));
        store.reset();
        assert!(!store.contains(node, &Property::Opacity));
    }

    #[test]
    fn test_move_node() {
        let mut scene = SceneGraph::new();
        let a = scene.insert(SceneNode::new("a").with_opacity(0.5));
        let b = scene.insert(SceneNode::new("b"));
        let mut store = BaseValueStore::new();
        store.capture(&scene, a, &Property::Opacity);
        store.move_node(a, b);
        assert!(!store.contains(a, &Property::Opacity));
        assert_eq!(store.get(b, &Property::Opacity).unwrap(), &PropertyValue::Number(0.5));
    }
}
