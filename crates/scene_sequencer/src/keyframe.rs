// SPDX-License-Identifier: MIT OR Apache-2.0
//! Keyframe definitions and curve math.

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use uuid::Uuid;

/// Unique identifier for a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyframeId(pub Uuid);

impl KeyframeId {
    /// Create a new random keyframe ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KeyframeId {
    fn default() -> Self {
        Self::new()
    }
}

/// Default exponent for the power easing curves
pub const DEFAULT_EASE_RATE: f32 = 2.0;

/// Default period for the elastic curves
pub const DEFAULT_ELASTIC_PERIOD: f32 = 0.3;

const BACK_OVERSHOOT: f32 = 1.70158;

/// Easing applied over the segment that starts at a keyframe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum EasingMode {
    /// Hold the value until the next keyframe (step)
    Instant,
    /// Linear interpolation
    #[default]
    Linear,
    /// Accelerating power curve
    EaseIn {
        /// Curve exponent
        rate: f32,
    },
    /// Decelerating power curve
    EaseOut {
        /// Curve exponent
        rate: f32,
    },
    /// Accelerate then decelerate
    EaseInOut {
        /// Curve exponent
        rate: f32,
    },
    /// Pull back before moving forward
    BackIn,
    /// Overshoot then settle
    BackOut,
    /// Pull back and overshoot
    BackInOut,
    /// Bounce at the start
    BounceIn,
    /// Bounce at the end
    BounceOut,
    /// Bounce at both ends
    BounceInOut,
    /// Spring oscillation at the start
    ElasticIn {
        /// Oscillation period
        period: f32,
    },
    /// Spring oscillation at the end
    ElasticOut {
        /// Oscillation period
        period: f32,
    },
    /// Spring oscillation at both ends
    ElasticInOut {
        /// Oscillation period
        period: f32,
    },
}

impl EasingMode {
    /// Power ease-in with the default rate
    pub fn ease_in() -> Self {
        Self::EaseIn { rate: DEFAULT_EASE_RATE }
    }

    /// Power ease-out with the default rate
    pub fn ease_out() -> Self {
        Self::EaseOut { rate: DEFAULT_EASE_RATE }
    }

    /// Power ease-in-out with the default rate
    pub fn ease_in_out() -> Self {
        Self::EaseInOut { rate: DEFAULT_EASE_RATE }
    }

    /// Map linear progress to eased progress.
    ///
    /// The endpoints are pinned: `apply(0.0) == 0.0` and `apply(1.0) == 1.0`
    /// for every mode. Interior values may leave `[0, 1]` for the back and
    /// elastic curves. A rate or period that is not a positive finite number
    /// falls back to its default.
    pub fn apply(&self, t: f32) -> f32 {
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }

        let eased = match *self {
            Self::Instant => 0.0,
            Self::Linear => t,
            Self::EaseIn { rate } => t.powf(positive_or(rate, DEFAULT_EASE_RATE)),
            Self::EaseOut { rate } => 1.0 - (1.0 - t).powf(positive_or(rate, DEFAULT_EASE_RATE)),
            Self::EaseInOut { rate } => {
                let rate = positive_or(rate, DEFAULT_EASE_RATE);
                let t2 = t * 2.0;
                if t2 < 1.0 {
                    0.5 * t2.powf(rate)
                } else {
                    1.0 - 0.5 * (2.0 - t2).powf(rate)
                }
            }
            Self::BackIn => {
                let s = BACK_OVERSHOOT;
                t * t * ((s + 1.0) * t - s)
            }
            Self::BackOut => {
                let s = BACK_OVERSHOOT;
                let t = t - 1.0;
                t * t * ((s + 1.0) * t + s) + 1.0
            }
            Self::BackInOut => {
                let s = BACK_OVERSHOOT * 1.525;
                let t2 = t * 2.0;
                if t2 < 1.0 {
                    0.5 * (t2 * t2 * ((s + 1.0) * t2 - s))
                } else {
                    let t2 = t2 - 2.0;
                    0.5 * (t2 * t2 * ((s + 1.0) * t2 + s) + 2.0)
                }
            }
            Self::BounceIn => 1.0 - bounce_out(1.0 - t),
            Self::BounceOut => bounce_out(t),
            Self::BounceInOut => {
                if t < 0.5 {
                    (1.0 - bounce_out(1.0 - t * 2.0)) * 0.5
                } else {
                    bounce_out(t * 2.0 - 1.0) * 0.5 + 0.5
                }
            }
            Self::ElasticIn { period } => {
                let period = positive_or(period, DEFAULT_ELASTIC_PERIOD);
                let s = period / 4.0;
                let t = t - 1.0;
                -(2f32.powf(10.0 * t) * ((t - s) * PI * 2.0 / period).sin())
            }
            Self::ElasticOut { period } => {
                let period = positive_or(period, DEFAULT_ELASTIC_PERIOD);
                let s = period / 4.0;
                2f32.powf(-10.0 * t) * ((t - s) * PI * 2.0 / period).sin() + 1.0
            }
            Self::ElasticInOut { period } => {
                let period = positive_or(period, DEFAULT_ELASTIC_PERIOD);
                let s = period / 4.0;
                let t = t * 2.0 - 1.0;
                if t < 0.0 {
                    -0.5 * 2f32.powf(10.0 * t) * ((t - s) * PI * 2.0 / period).sin()
                } else {
                    2f32.powf(-10.0 * t) * ((t - s) * PI * 2.0 / period).sin() * 0.5 + 1.0
                }
            }
        };
        if eased.is_finite() {
            eased
        } else {
            t
        }
    }

    /// Whether the mode holds its start value for the whole segment
    pub fn is_stepped(&self) -> bool {
        matches!(self, Self::Instant)
    }
}

fn positive_or(value: f32, default: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        default
    }
}

fn bounce_out(t: f32) -> f32 {
    if t < 1.0 / 2.75 {
        7.5625 * t * t
    } else if t < 2.0 / 2.75 {
        let t = t - 1.5 / 2.75;
        7.5625 * t * t + 0.75
    } else if t < 2.5 / 2.75 {
        let t = t - 2.25 / 2.75;
        7.5625 * t * t + 0.9375
    } else {
        let t = t - 2.625 / 2.75;
        7.5625 * t * t + 0.984375
    }
}

/// Value stored in a keyframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// Scalar value
    Number(f32),
    /// 2D vector
    Vector([f32; 2]),
    /// Color (RGBA)
    Color([f32; 4]),
    /// Boolean
    Bool(bool),
    /// Discrete token such as a sprite frame name
    Token(String),
}

impl PropertyValue {
    /// Whether values of this kind blend continuously
    pub fn is_blendable(&self) -> bool {
        matches!(self, Self::Number(_) | Self::Vector(_) | Self::Color(_))
    }

    /// Blend towards `other` by `alpha`.
    ///
    /// Numeric kinds interpolate linearly (and may extrapolate when `alpha`
    /// leaves `[0, 1]`). Booleans, tokens and mismatched kinds step: `self`
    /// is returned until `alpha` reaches 1.
    pub fn blend(&self, other: &PropertyValue, alpha: f32) -> PropertyValue {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => Self::Number(Interpolation::lerp(*a, *b, alpha)),
            (Self::Vector(a), Self::Vector(b)) => {
                Self::Vector(Interpolation::lerp_vec2(*a, *b, alpha))
            }
            (Self::Color(a), Self::Color(b)) => {
                Self::Color(Interpolation::lerp_color(*a, *b, alpha))
            }
            _ if alpha >= 1.0 => other.clone(),
            _ => self.clone(),
        }
    }

    /// Get as float if possible
    pub fn as_number(&self) -> Option<f32> {
        match self {
            Self::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as vector if possible
    pub fn as_vector(&self) -> Option<[f32; 2]> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as color if possible
    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            Self::Color(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as bool if possible
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as token if possible
    pub fn as_token(&self) -> Option<&str> {
        match self {
            Self::Token(v) => Some(v),
            _ => None,
        }
    }
}

/// A timed value on a property track. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    #[serde(default)]
    id: KeyframeId,
    time: f32,
    value: PropertyValue,
    #[serde(default)]
    easing: EasingMode,
}

impl Keyframe {
    /// Create a new linear keyframe
    pub fn new(time: f32, value: PropertyValue) -> Self {
        Self {
            id: KeyframeId::new(),
            time,
            value,
            easing: EasingMode::Linear,
        }
    }

    /// Set the easing of the segment starting at this keyframe
    pub fn with_easing(mut self, easing: EasingMode) -> Self {
        self.easing = easing;
        self
    }

    /// Unique keyframe ID
    pub fn id(&self) -> KeyframeId {
        self.id
    }

    /// Time in seconds, relative to the owning track
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Value at this keyframe
    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// Easing towards the next keyframe
    pub fn easing(&self) -> EasingMode {
        self.easing
    }

    /// Same keyframe moved to another time
    pub(crate) fn at_time(&self, time: f32) -> Self {
        Self {
            time,
            ..self.clone()
        }
    }

    /// Copy of this keyframe at another time, with a fresh id
    pub(crate) fn duplicate_at(&self, time: f32) -> Self {
        Self {
            id: KeyframeId::new(),
            ..self.at_time(time)
        }
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two floats.
    ///
    /// Written as a weighted sum so that `t == 0` yields `a` and `t == 1`
    /// yields `b` bit for bit.
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a * (1.0 - t) + b * t
    }

    /// Interpolate Vec2
    pub fn lerp_vec2(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
        [Self::lerp(a[0], b[0], t), Self::lerp(a[1], b[1], t)]
    }

    /// Interpolate RGBA channels
    pub fn lerp_color(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
        [
            Self::lerp(a[0], b[0], t),
            Self::lerp(a[1], b[1], t),
            Self::lerp(a[2], b[2], t),
            Self::lerp(a[3], b[3], t),
        ]
    }

    /// Interpolate between two keyframes at normalized segment progress `t`.
    ///
    /// Returns `from`'s value exactly at `t <= 0` and `to`'s value exactly
    /// at `t >= 1`. Non-blendable kinds and [`EasingMode::Instant`] segments
    /// hold `from` until the segment ends.
    pub fn interpolate(from: &Keyframe, to: &Keyframe, t: f32) -> PropertyValue {
        if t.is_nan() || t <= 0.0 {
            return from.value.clone();
        }
        if t >= 1.0 {
            return to.value.clone();
        }
        if from.easing.is_stepped() || !from.value.is_blendable() {
            return from.value.clone();
        }
        from.value.blend(&to.value, from.easing.apply(t))
    }
}
