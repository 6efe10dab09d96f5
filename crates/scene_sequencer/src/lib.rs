// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline keyframe animation for scene graphs.
//!
//! This crate drives named animation sequences over the nodes of a scene:
//! - Property tracks with eased keyframes
//! - Base values captured before animation starts
//! - Crossfades when switching sequences
//! - Callback and sound markers fired as the playhead crosses them
//! - Completion notifications, chaining and auto-play
//!
//! ## Architecture
//!
//! The animation core is built on:
//! - [`NodeId`] handles that may outlive their nodes
//! - The [`AnimatedNode`] and [`NodeStore`] seams for writing values
//! - Pure keyframe interpolation in [`keyframe`] and [`track`]
//! - An [`AnimationManager`] ticked by an external scheduler

pub mod base_values;
pub mod binding;
pub mod config;
pub mod error;
pub mod keyframe;
pub mod manager;
pub mod playback;
pub mod scene;
pub mod sequence;
pub mod track;

pub use base_values::BaseValueStore;
pub use binding::{AnimatedNode, NodeId, NodeStore, Property, PropertyBinding};
pub use config::{ManagerConfig, CONFIG_FORMAT_VERSION};
pub use error::{AnimationError, AnimationWarning, Result};
pub use keyframe::{EasingMode, Interpolation, Keyframe, KeyframeId, PropertyValue};
pub use manager::{
    AnimationManager, CompletedCallback, CompletionEvent, FrameReport, KeyframeCallback,
    KeyframeEvent, SoundHandler,
};
pub use playback::{PlaybackRequest, PlaybackRequests, PlaybackState};
pub use scene::{SceneGraph, SceneNode};
pub use sequence::{
    CallbackKeyframe, Sequence, SequenceId, SequenceRef, SoundKeyframe, TimeWindow,
};
pub use track::{PropertyTrack, ValueUnit};
