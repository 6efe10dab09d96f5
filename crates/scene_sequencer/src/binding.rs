// SPDX-License-Identifier: MIT OR Apache-2.0
//! Binding of tracks to scene-graph nodes.
//!
//! The animation core never holds node references. Nodes are addressed by
//! [`NodeId`] handles into a [`NodeStore`], so a destroyed node simply stops
//! resolving instead of dangling.

use crate::keyframe::PropertyValue;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Stable handle to a node in a [`NodeStore`]
    pub struct NodeId;
}

/// Animatable node property
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Property {
    /// Position in the parent's space
    Position,
    /// Rotation in degrees
    Rotation,
    /// Rotational skew around X in degrees
    RotationalSkewX,
    /// Rotational skew around Y in degrees
    RotationalSkewY,
    /// Per-axis scale
    Scale,
    /// Per-axis skew in degrees
    Skew,
    /// Opacity in `[0, 1]`
    Opacity,
    /// Tint color
    Color,
    /// Visibility flag
    Visible,
    /// Displayed sprite frame name
    SpriteFrame,
    /// Any other named property
    Custom(String),
}

impl Property {
    /// Resolve an authoring-tool property name
    pub fn from_name(name: &str) -> Self {
        match name {
            "position" => Self::Position,
            "rotation" => Self::Rotation,
            "rotationalSkewX" => Self::RotationalSkewX,
            "rotationalSkewY" => Self::RotationalSkewY,
            "scale" => Self::Scale,
            "skew" => Self::Skew,
            "opacity" => Self::Opacity,
            "color" => Self::Color,
            "visible" => Self::Visible,
            "spriteFrame" => Self::SpriteFrame,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Authoring-tool name of this property
    pub fn name(&self) -> &str {
        match self {
            Self::Position => "position",
            Self::Rotation => "rotation",
            Self::RotationalSkewX => "rotationalSkewX",
            Self::RotationalSkewY => "rotationalSkewY",
            Self::Scale => "scale",
            Self::Skew => "skew",
            Self::Opacity => "opacity",
            Self::Color => "color",
            Self::Visible => "visible",
            Self::SpriteFrame => "spriteFrame",
            Self::Custom(name) => name,
        }
    }

    /// Properties that always step, whatever their keyframe easing says
    pub fn is_discrete(&self) -> bool {
        matches!(self, Self::Visible | Self::SpriteFrame)
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for Property {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

/// A (node, property) pair targeted by a track
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyBinding {
    /// Target node
    pub node: NodeId,
    /// Target property
    pub property: Property,
}

impl PropertyBinding {
    /// Create a binding to a node property
    pub fn new(node: NodeId, property: impl Into<Property>) -> Self {
        Self {
            node,
            property: property.into(),
        }
    }
}

/// Typed setters a scene-graph node exposes to the animation core.
///
/// Each setter returns `false` when the node does not support the property
/// with that value kind; the write is then skipped.
pub trait AnimatedNode {
    /// Write a scalar property
    fn set_number(&mut self, property: &Property, value: f32) -> bool;

    /// Write a 2D vector property
    fn set_vector(&mut self, property: &Property, value: [f32; 2]) -> bool;

    /// Write a color property
    fn set_color(&mut self, property: &Property, value: [f32; 4]) -> bool;

    /// Write a boolean property
    fn set_bool(&mut self, property: &Property, value: bool) -> bool;

    /// Write a discrete token property
    fn set_token(&mut self, property: &Property, value: &str) -> bool;

    /// Read the live value of a property
    fn value(&self, property: &Property) -> Option<PropertyValue>;

    /// Size of the node's own content, used by its children for relative values
    fn content_size(&self) -> [f32; 2];

    /// Dispatch a value to the matching typed setter
    fn apply(&mut self, property: &Property, value: &PropertyValue) -> bool {
        match value {
            PropertyValue::Number(v) => self.set_number(property, *v),
            PropertyValue::Vector(v) => self.set_vector(property, *v),
            PropertyValue::Color(v) => self.set_color(property, *v),
            PropertyValue::Bool(v) => self.set_bool(property, *v),
            PropertyValue::Token(v) => self.set_token(property, v),
        }
    }
}

/// Indirection table resolving node handles.
///
/// Lookups for destroyed nodes return `None`; callers treat that as an
/// orphaned binding.
pub trait NodeStore {
    /// Resolve a node for reading
    fn node(&self, id: NodeId) -> Option<&dyn AnimatedNode>;

    /// Resolve a node for writing
    fn node_mut(&mut self, id: NodeId) -> Option<&mut dyn AnimatedNode>;

    /// Parent of a node, if it has one
    fn parent(&self, id: NodeId) -> Option<NodeId>;

    /// Whether the handle still resolves
    fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }
}
