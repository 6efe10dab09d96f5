// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arena scene graph.
//!
//! A minimal retained-mode node tree addressed by [`NodeId`] handles. It is
//! the reference [`NodeStore`] used by the player and the tests; embedders
//! with their own scene graph implement [`NodeStore`] and [`AnimatedNode`]
//! instead.

use crate::binding::{AnimatedNode, NodeId, NodeStore, Property};
use crate::keyframe::PropertyValue;
use slotmap::SlotMap;
use std::collections::HashMap;

/// A node with the standard animatable properties
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    /// Node name
    pub name: String,
    /// Position in the parent's space
    pub position: [f32; 2],
    /// Rotation in degrees
    pub rotation: f32,
    /// Rotational skew (X, Y) in degrees
    pub rotational_skew: [f32; 2],
    /// Per-axis scale
    pub scale: [f32; 2],
    /// Per-axis skew in degrees
    pub skew: [f32; 2],
    /// Opacity in `[0, 1]`
    pub opacity: f32,
    /// Tint color
    pub color: [f32; 4],
    /// Visibility flag
    pub visible: bool,
    /// Displayed sprite frame
    pub sprite_frame: Option<String>,
    /// Size of the node's content
    pub content_size: [f32; 2],
    /// Custom properties
    pub custom: HashMap<String, PropertyValue>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    /// Create a node with identity transform, full opacity and white tint
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: [0.0, 0.0],
            rotation: 0.0,
            rotational_skew: [0.0, 0.0],
            scale: [1.0, 1.0],
            skew: [0.0, 0.0],
            opacity: 1.0,
            color: [1.0, 1.0, 1.0, 1.0],
            visible: true,
            sprite_frame: None,
            content_size: [0.0, 0.0],
            custom: HashMap::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, position: [f32; 2]) -> Self {
        self.position = position;
        self
    }

    /// Set the opacity
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set the content size
    pub fn with_content_size(mut self, size: [f32; 2]) -> Self {
        self.content_size = size;
        self
    }

    /// Set a custom property
    pub fn with_custom(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.custom.insert(name.into(), value);
        self
    }

    /// Parent node
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

impl AnimatedNode for SceneNode {
    fn set_number(&mut self, property: &Property, value: f32) -> bool {
        match property {
            Property::Rotation => self.rotation = value,
            Property::RotationalSkewX => self.rotational_skew[0] = value,
            Property::RotationalSkewY => self.rotational_skew[1] = value,
            Property::Opacity => self.opacity = value,
            // Uniform scale
            Property::Scale => self.scale = [value, value],
            Property::Custom(name) => {
                self.custom.insert(name.clone(), PropertyValue::Number(value));
            }
            _ => return false,
        }
        true
    }

    fn set_vector(&mut self, property: &Property, value: [f32; 2]) -> bool {
        match property {
            Property::Position => self.position = value,
            Property::Scale => self.scale = value,
            Property::Skew => self.skew = value,
            Property::Custom(name) => {
                self.custom.insert(name.clone(), PropertyValue::Vector(value));
            }
            _ => return false,
        }
        true
    }

    fn set_color(&mut self, property: &Property, value: [f32; 4]) -> bool {
        match property {
            Property::Color => self.color = value,
            Property::Custom(name) => {
                self.custom.insert(name.clone(), PropertyValue::Color(value));
            }
            _ => return false,
        }
        true
    }

    fn set_bool(&mut self, property: &Property, value: bool) -> bool {
        match property {
            Property::Visible => self.visible = value,
            Property::Custom(name) => {
                self.custom.insert(name.clone(), PropertyValue::Bool(value));
            }
            _ => return false,
        }
        true
    }

    fn set_token(&mut self, property: &Property, value: &str) -> bool {
        match property {
            Property::SpriteFrame => self.sprite_frame = Some(value.to_string()),
            Property::Custom(name) => {
                self.custom.insert(name.clone(), PropertyValue::Token(value.to_string()));
            }
            _ => return false,
        }
        true
    }

    fn value(&self, property: &Property) -> Option<PropertyValue> {
        let value = match property {
            Property::Position => PropertyValue::Vector(self.position),
            Property::Rotation => PropertyValue::Number(self.rotation),
            Property::RotationalSkewX => PropertyValue::Number(self.rotational_skew[0]),
            Property::RotationalSkewY => PropertyValue::Number(self.rotational_skew[1]),
            Property::Scale => PropertyValue::Vector(self.scale),
            Property::Skew => PropertyValue::Vector(self.skew),
            Property::Opacity => PropertyValue::Number(self.opacity),
            Property::Color => PropertyValue::Color(self.color),
            Property::Visible => PropertyValue::Bool(self.visible),
            Property::SpriteFrame => PropertyValue::Token(self.sprite_frame.clone()?),
            Property::Custom(name) => self.custom.get(name)?.clone(),
        };
        Some(value)
    }

    fn content_size(&self) -> [f32; 2] {
        self.content_size
    }
}

/// Node arena with parent/child links
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
}

impl SceneGraph {
    /// Create an empty scene graph
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
        }
    }

    /// Insert a parentless node
    pub fn insert(&mut self, node: SceneNode) -> NodeId {
        self.nodes.insert(node)
    }

    /// Insert a node under a parent. Falls back to parentless if the parent is gone.
    pub fn insert_child(&mut self, parent: NodeId, mut node: SceneNode) -> NodeId {
        let has_parent = self.nodes.contains_key(parent);
        node.parent = has_parent.then_some(parent);
        let id = self.nodes.insert(node);
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.push(id);
        }
        id
    }

    /// Remove a node and its whole subtree. Returns the removed node.
    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        let node = self.nodes.remove(id)?;
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
        let mut pending = node.children.clone();
        while let Some(child) = pending.pop() {
            if let Some(removed) = self.nodes.remove(child) {
                pending.extend(removed.children);
            }
        }
        Some(node)
    }

    /// Get a node
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    /// Get a mutable node
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    /// Find the first node with a name
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|(_, n)| n.name == name).map(|(id, _)| id)
    }

    /// Iterate all nodes
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeStore for SceneGraph {
    fn node(&self, id: NodeId) -> Option<&dyn AnimatedNode> {
        self.nodes.get(id).map(|n| n as &dyn AnimatedNode)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut dyn AnimatedNode> {
        self.nodes.get_mut(id).map(|n| n as &mut dyn AnimatedNode)
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }
}
