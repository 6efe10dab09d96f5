// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene documents.
//!
//! A scene document is the authoring format the player reads: a flat list
//! of nodes (parents before children) and a list of sequences whose tracks
//! refer to nodes by name. Building a document produces a [`SceneGraph`]
//! and an [`AnimationManager`] with every node registered through
//! `add_node`.

use indexmap::IndexMap;
use scene_sequencer::{
    AnimationError, AnimationManager, CallbackKeyframe, Keyframe, ManagerConfig, NodeId, Property,
    PropertyTrack, PropertyValue, SceneGraph, SceneNode, Sequence, SequenceId, SoundKeyframe,
    ValueUnit,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Current scene document format version
pub const DOCUMENT_FORMAT_VERSION: u32 = 1;

/// Errors raised while loading or building a scene document
#[derive(Debug, Error)]
pub enum DocumentError {
    /// File could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid document
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Document was written by a newer version
    #[error("Document version {0} is newer than supported version {max}", max = DOCUMENT_FORMAT_VERSION)]
    UnsupportedVersion(u32),

    /// A node or track refers to a node name that was not declared earlier
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A chained sequence name does not match any sequence
    #[error("Unknown chained sequence: {0}")]
    UnknownSequence(String),

    /// The animation core rejected the document
    #[error(transparent)]
    Animation(#[from] AnimationError),
}

/// Result type for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// One node of the scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDocument {
    /// Unique node name
    pub name: String,
    /// Parent node name
    #[serde(default)]
    pub parent: Option<String>,
    /// Initial position
    #[serde(default)]
    pub position: Option<[f32; 2]>,
    /// Initial opacity
    #[serde(default)]
    pub opacity: Option<f32>,
    /// Content size used as the container of child nodes
    #[serde(default)]
    pub content_size: Option<[f32; 2]>,
    /// Custom properties with their initial values
    #[serde(default)]
    pub custom: IndexMap<String, PropertyValue>,
}

/// One animated property of one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDocument {
    /// Name of the animated node
    pub node: String,
    /// Authoring name of the property, e.g. `"position"` or `"opacity"`
    pub property: String,
    /// Unit of the keyframe values
    #[serde(default)]
    pub unit: ValueUnit,
    /// Keyframes in any order
    pub keyframes: Vec<Keyframe>,
}

/// One timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceDocument {
    /// Unique sequence id
    pub id: u32,
    /// Unique sequence name
    pub name: String,
    /// Length in seconds
    pub duration: f32,
    /// Name of the sequence started when this one completes
    #[serde(default)]
    pub chained: Option<String>,
    /// Property tracks
    #[serde(default)]
    pub tracks: Vec<TrackDocument>,
    /// Callback markers
    #[serde(default)]
    pub callbacks: Vec<CallbackKeyframe>,
    /// Sound cues
    #[serde(default)]
    pub sounds: Vec<SoundKeyframe>,
}

/// A complete scene document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Name of the root node of the animated subtree
    #[serde(default)]
    pub root: Option<String>,
    /// Nodes, parents before children
    pub nodes: Vec<NodeDocument>,
    /// Sequences
    #[serde(default)]
    pub sequences: Vec<SequenceDocument>,
}

fn default_version() -> u32 {
    DOCUMENT_FORMAT_VERSION
}

/// A scene ready to play
pub struct LoadedScene {
    /// Nodes of the scene
    pub graph: SceneGraph,
    /// Manager with every sequence and node registered
    pub manager: AnimationManager<String>,
    /// Node handles by name, in document order
    pub nodes: IndexMap<String, NodeId>,
}

impl SceneDocument {
    /// Parse from a RON string
    pub fn from_ron(source: &str) -> Result<Self> {
        let document: Self = ron::from_str(source)?;
        if document.version > DOCUMENT_FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion(document.version));
        }
        Ok(document)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let document = Self::from_ron(&content)?;
        tracing::info!(
            "Loaded scene {:?}: {} node(s), {} sequence(s)",
            path,
            document.nodes.len(),
            document.sequences.len()
        );
        Ok(document)
    }

    /// Build the scene graph and a manager owned by `owner`
    pub fn build(&self, owner: impl Into<String>, config: &ManagerConfig) -> Result<LoadedScene> {
        let mut graph = SceneGraph::new();
        let mut nodes = IndexMap::new();
        for node in &self.nodes {
            let id = match &node.parent {
                Some(parent) => {
                    let parent = *nodes
                        .get(parent)
                        .ok_or_else(|| DocumentError::UnknownNode(parent.clone()))?;
                    graph.insert_child(parent, scene_node(node))
                }
                None => graph.insert(scene_node(node)),
            };
            nodes.insert(node.name.clone(), id);
        }

        let mut manager = AnimationManager::with_config(owner.into(), config);
        if let Some(root) = &self.root {
            let root = *nodes
                .get(root)
                .ok_or_else(|| DocumentError::UnknownNode(root.clone()))?;
            manager.set_root_node(Some(root));
        }

        let ids: HashMap<&str, SequenceId> = self
            .sequences
            .iter()
            .map(|s| (s.name.as_str(), SequenceId(s.id)))
            .collect();

        // Tracks grouped per node so every node is registered in one call
        let mut per_node: IndexMap<NodeId, IndexMap<SequenceId, Vec<PropertyTrack>>> = IndexMap::new();
        for doc in &self.sequences {
            let id = SequenceId(doc.id);
            let mut sequence = Sequence::new(id, doc.name.clone(), doc.duration);
            if let Some(next) = &doc.chained {
                let next = ids
                    .get(next.as_str())
                    .ok_or_else(|| DocumentError::UnknownSequence(next.clone()))?;
                sequence = sequence.with_chained_sequence(*next);
            }
            for callback in &doc.callbacks {
                sequence.add_callback(callback.time, callback.callback_id.clone());
            }
            for sound in &doc.sounds {
                sequence.add_sound(sound.clone());
            }
            manager.add_sequence(sequence)?;

            for track in &doc.tracks {
                let node = *nodes
                    .get(&track.node)
                    .ok_or_else(|| DocumentError::UnknownNode(track.node.clone()))?;
                let built = PropertyTrack::with_keyframes(
                    Property::from_name(&track.property),
                    track.keyframes.iter().cloned(),
                )?
                .with_unit(track.unit);
                per_node.entry(node).or_default().entry(id).or_default().push(built);
            }
        }

        for (node, bindings) in per_node {
            manager.add_node(&graph, node, bindings)?;
        }

        Ok(LoadedScene { graph, manager, nodes })
    }
}

fn scene_node(doc: &NodeDocument) -> SceneNode {
    let mut node = SceneNode::new(doc.name.clone());
    if let Some(position) = doc.position {
        node = node.with_position(position);
    }
    if let Some(opacity) = doc.opacity {
        node = node.with_opacity(opacity);
    }
    if let Some(size) = doc.content_size {
        node = node.with_content_size(size);
    }
    for (name, value) in &doc.custom {
        node = node.with_custom(name.clone(), value.clone());
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"(
        root: Some("stage"),
        nodes: [
            (name: "stage", content_size: Some((800.0, 600.0))),
            (name: "logo", parent: Some("stage"), opacity: Some(0.5)),
        ],
        sequences: [
            (
                id: 1,
                name: "intro",
                duration: 2.0,
                chained: Some("idle"),
                tracks: [
                    (
                        node: "logo",
                        property: "opacity",
                        keyframes: [
                            (time: 0.0, value: Number(0.0)),
                            (time: 2.0, value: Number(1.0)),
                        ],
                    ),
                    (
                        node: "logo",
                        property: "position",
                        unit: ContainerFraction,
                        keyframes: [
                            (time: 0.0, value: Vector((0.0, 0.0))),
                            (time: 2.0, value: Vector((0.5, 0.5))),
                        ],
                    ),
                ],
                callbacks: [(time: 1.0, callback_id: "halfway")],
            ),
            (id: 2, name: "idle", duration: 1.0),
        ],
    )"#;

    #[test]
    fn test_build_document() {
        let document = SceneDocument::from_ron(DOCUMENT).unwrap();
        let mut scene = document.build("demo", &ManagerConfig::default()).unwrap();
        let logo = scene.nodes["logo"];

        assert_eq!(scene.manager.bound_sequences(logo), vec![SequenceId(1)]);
        assert_eq!(
            scene.manager.sequence_named("intro").unwrap().chained_sequence,
            Some(SequenceId(2))
        );
        assert_eq!(
            scene.manager.base_value(logo, &Property::Opacity).unwrap(),
            &PropertyValue::Number(0.5)
        );

        scene.manager.time_seek(&mut scene.graph, "intro", 2.0).unwrap();
        let node = scene.graph.get(logo).unwrap();
        assert_eq!(node.opacity, 1.0);
        assert_eq!(node.position, [400.0, 300.0]);
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let document = SceneDocument::from_ron(r#"(nodes: [(name: "a", parent: Some("b"))])"#).unwrap();
        assert!(matches!(
            document.build("demo", &ManagerConfig::default()),
            Err(DocumentError::UnknownNode(name)) if name == "b"
        ));
    }

    #[test]
    fn test_newer_version_rejected() {
        assert!(matches!(
            SceneDocument::from_ron("(version: 5, nodes: [])"),
            Err(DocumentError::UnsupportedVersion(5))
        ));
    }
}
