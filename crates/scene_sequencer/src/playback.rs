// SPDX-License-Identifier: MIT OR Apache-2.0
//! Playback clock and deferred playback requests.

use crate::binding::{NodeId, PropertyBinding};
use crate::keyframe::PropertyValue;
use crate::sequence::{SequenceId, SequenceRef, TimeWindow};
use std::collections::HashMap;

/// Playback state of a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No sequence running
    #[default]
    Idle,
    /// A sequence is running
    Running,
    /// A sequence is running but the clock is frozen
    Paused,
}

/// A state transition queued from inside a handler
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackRequest {
    /// Start a sequence
    Run {
        /// Sequence to start
        target: SequenceRef,
        /// Crossfade window in seconds
        tween_duration: f32,
    },
    /// Jump to a time in a sequence
    Seek {
        /// Sequence to seek in
        target: SequenceRef,
        /// Absolute time in seconds
        time: f32,
    },
}

/// Queue handed to callbacks so they can change playback.
///
/// Requests are honored at the start of the next `update`, after the
/// evaluation pass that fired the callback has finished.
#[derive(Debug, Default)]
pub struct PlaybackRequests {
    queue: Vec<PlaybackRequest>,
}

impl PlaybackRequests {
    /// Queue a sequence start
    pub fn run_sequence(&mut self, target: impl Into<SequenceRef>, tween_duration: f32) {
        self.queue.push(PlaybackRequest::Run {
            target: target.into(),
            tween_duration,
        });
    }

    /// Queue a time seek
    pub fn time_seek(&mut self, target: impl Into<SequenceRef>, time: f32) {
        self.queue.push(PlaybackRequest::Seek {
            target: target.into(),
            time,
        });
    }

    /// Queued requests, oldest first
    pub fn pending(&self) -> &[PlaybackRequest] {
        &self.queue
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<PlaybackRequest> {
        std::mem::take(&mut self.queue)
    }
}

/// Crossfade from base values into a sequence's first frame
#[derive(Debug, Clone)]
pub(crate) struct Tween {
    pub duration: f32,
    pub elapsed: f32,
    pub from: HashMap<PropertyBinding, PropertyValue>,
}

impl Tween {
    pub fn alpha(&self) -> f32 {
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    /// Moved start values replace those already held for `to`
    pub fn retarget(&mut self, from: NodeId, to: NodeId) {
        if from == to {
            return;
        }
        let (moved, kept): (HashMap<_, _>, HashMap<_, _>) =
            std::mem::take(&mut self.from).into_iter().partition(|(b, _)| b.node == from);
        self.from = kept;
        for (binding, value) in moved {
            self.from.insert(PropertyBinding::new(to, binding.property), value);
        }
    }
}

/// Outcome of advancing the clock by one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Step {
    /// Still inside the tween window, at this blend factor
    Blending(f32),
    /// The sequence clock swept this window
    Moved {
        window: TimeWindow,
        reached_end: bool,
    },
}

/// Clock of the running sequence
#[derive(Debug, Clone)]
pub(crate) struct Playhead {
    pub sequence: SequenceId,
    pub time: f32,
    /// Whether markers at the starting time have been dispatched
    pub started: bool,
    pub tween: Option<Tween>,
}

impl Playhead {
    pub fn new(sequence: SequenceId) -> Self {
        Self {
            sequence,
            time: 0.0,
            started: false,
            tween: None,
        }
    }

    /// Advance by an already sanitized, non-negative delta.
    ///
    /// Tween time is consumed first; whatever is left moves the sequence
    /// clock in the direction of `speed`, clamped to `[0, duration]`.
    pub fn advance(&mut self, delta: f32, speed: f32, duration: f32) -> Step {
        let mut remaining = delta * speed.abs();

        if let Some(tween) = self.tween.as_mut() {
            tween.elapsed += remaining;
            if tween.elapsed < tween.duration {
                return Step::Blending(tween.alpha());
            }
            remaining = tween.elapsed - tween.duration;
            self.tween = None;
        }

        let from = self.time;
        let to = if speed > 0.0 {
            (from + remaining).min(duration)
        } else if speed < 0.0 {
            (from - remaining).max(0.0)
        } else {
            from
        };
        self.time = to;

        let reached_end = (speed > 0.0 && to >= duration) || (speed < 0.0 && to <= 0.0);
        Step::Moved {
            window: self.window_to(from, to),
            reached_end,
        }
    }

    /// Jump to an already clamped time
    pub fn seek(&mut self, time: f32) -> TimeWindow {
        let from = self.time;
        self.time = time;
        self.tween = None;
        self.window_to(from, time)
    }

    fn window_to(&mut self, from: f32, to: f32) -> TimeWindow {
        let window = TimeWindow::new(from, to);
        if self.started {
            window
        } else {
            self.started = true;
            window.including_start()
        }
    }
}
