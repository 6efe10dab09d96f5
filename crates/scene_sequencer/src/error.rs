// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors and per-frame warnings raised by the animation core.

use crate::binding::{NodeId, Property};
use crate::sequence::SequenceId;
use thiserror::Error;

/// Errors surfaced to callers of the animation core
#[derive(Debug, Error)]
pub enum AnimationError {
    /// No sequence is registered under the given name or id
    #[error("Sequence not found: {0}")]
    SequenceNotFound(String),

    /// A sequence with the same id or name is already registered
    #[error("Sequence already registered: {0:?}")]
    DuplicateSequence(SequenceId),

    /// No base value was captured for the property
    #[error("No base value captured for {property} on node {node:?}")]
    BaseValueNotFound {
        /// Node the lookup was made for
        node: NodeId,
        /// Property the lookup was made for
        property: Property,
    },

    /// Keyframe time is NaN or infinite
    #[error("Invalid keyframe time: {0}")]
    InvalidKeyframeTime(f32),

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] ron::error::SpannedError),

    /// Configuration was written by a newer version
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },

    /// Configuration could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] ron::Error),

    /// I/O error while reading or writing configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;

/// Non-fatal data issue absorbed during evaluation.
///
/// Warnings never stop playback. They are logged through `tracing` and
/// returned in [`FrameReport`](crate::manager::FrameReport) so callers can
/// surface them however they like.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationWarning {
    /// The bound node no longer resolves; its write was skipped
    OrphanedBinding {
        /// Stale node handle
        node: NodeId,
        /// Property that could not be written
        property: Property,
    },
    /// A NaN, infinite or negative time was clamped
    InvalidTime {
        /// Value as supplied by the caller
        value: f32,
    },
}
