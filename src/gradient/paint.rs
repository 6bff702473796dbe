/// Paint policies: shape + repeat + cached ramp, with seam antialiasing
///
/// A policy is built once per fill and then queried for every pixel. It
/// holds no mutable state, so one instance can be shared by any number of
/// rasterization threads.

use std::f64::consts::TAU;
use std::sync::Arc;

use cgmath::Point2;

use super::cached::CachedRamp;
use super::repeat::{RepeatMode, RepeatStrategy};
use super::shape::{Axis, GradientShape, ShapeStrategy};
use crate::color::{mix_pair, Color, ColorMixer};

const EPSILON: f64 = f64::EPSILON;

/// Below this distance from the apex (in pixels) the conical blend width
/// shrinks with the distance
pub const CONICAL_SINGULARITY_PX: f64 = 8.0;

/// Blend zones never cover more than half the ramp
const MAX_NORMALIZED_THRESHOLD: f64 = 0.5;

/// Configuration of one gradient fill
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PaintSetup {
    pub shape: GradientShape,
    pub repeat: RepeatMode,
    /// Gradient vector in pixel space
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    /// Width of the seam blend in pixels; 0 disables antialiasing
    pub antialias_threshold: f64,
    pub reverse: bool,
}

impl PaintSetup {
    pub fn new(shape: GradientShape, start: Point2<f64>, end: Point2<f64>) -> Self {
        Self {
            shape,
            repeat: RepeatMode::None,
            start,
            end,
            antialias_threshold: 0.0,
            reverse: false,
        }
    }

    pub fn with_repeat(mut self, repeat: RepeatMode) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_antialias(mut self, threshold_px: f64) -> Self {
        self.antialias_threshold = threshold_px;
        self
    }

    pub fn reversed(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }
}

/// Which antialiasing a policy applies
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PaintPolicyKind {
    NoAntialias,
    RepeatForwards,
    Conical,
    Spiral,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Antialias {
    None,
    /// `threshold` is normalized to the vector length
    RepeatForwards { threshold: f64, has_center: bool },
    Conical { threshold_px: f64 },
    Spiral { threshold_px: f64, reverse_spiral: bool },
}

pub struct GradientPaintPolicy {
    shape: Box<dyn ShapeStrategy>,
    repeat: RepeatStrategy,
    reverse: bool,
    axis: Axis,
    antialias: Antialias,
    cached: Arc<CachedRamp>,
    mixer: Arc<dyn ColorMixer>,
}

impl GradientPaintPolicy {
    /// Pick the policy and repeat strategy for `setup`
    pub fn new(setup: &PaintSetup, cached: Arc<CachedRamp>, mixer: Arc<dyn ColorMixer>) -> Self {
        let axis = Axis::new(setup.start, setup.end);
        let px = setup.antialias_threshold;

        let antialias = if px <= EPSILON || axis.is_degenerate() {
            Antialias::None
        } else {
            match (setup.shape, setup.repeat) {
                (GradientShape::Conical, _) => Antialias::Conical { threshold_px: px },
                (shape, RepeatMode::Forwards) if shape != GradientShape::ConicalSymmetric => {
                    Antialias::RepeatForwards {
                        threshold: (px / axis.length).min(MAX_NORMALIZED_THRESHOLD),
                        has_center: shape.has_center(),
                    }
                }
                (shape, RepeatMode::None) if shape.is_spiral() => Antialias::Spiral {
                    threshold_px: px,
                    reverse_spiral: shape == GradientShape::ReverseSpiral,
                },
                _ => Antialias::None,
            }
        };

        Self {
            shape: setup.shape.strategy(setup.start, setup.end),
            repeat: RepeatStrategy::select(setup.shape, setup.repeat),
            reverse: setup.reverse,
            axis,
            antialias,
            cached,
            mixer,
        }
    }

    pub fn kind(&self) -> PaintPolicyKind {
        match self.antialias {
            Antialias::None => PaintPolicyKind::NoAntialias,
            Antialias::RepeatForwards { .. } => PaintPolicyKind::RepeatForwards,
            Antialias::Conical { .. } => PaintPolicyKind::Conical,
            Antialias::Spiral { .. } => PaintPolicyKind::Spiral,
        }
    }

    pub fn repeat_strategy(&self) -> RepeatStrategy {
        self.repeat
    }

    /// Color of the pixel at (x, y)
    pub fn color_at(&self, x: f64, y: f64) -> Color {
        let raw = self.shape.value_at(x, y);

        match self.antialias {
            Antialias::None => self.plain(raw),
            Antialias::RepeatForwards { threshold, has_center } => {
                // The middle of a radial fill is not a seam
                if has_center && raw <= threshold {
                    return self.cached.at(self.oriented(raw));
                }
                self.blend_seam(self.oriented(self.repeat.value_at(raw)), threshold)
            }
            Antialias::Conical { threshold_px } => {
                let distance = self.axis.distance(x, y);
                if distance <= EPSILON {
                    return self.plain(raw);
                }
                let threshold = if distance < CONICAL_SINGULARITY_PX {
                    threshold_px / (TAU * CONICAL_SINGULARITY_PX) * (distance / CONICAL_SINGULARITY_PX)
                } else {
                    threshold_px / (TAU * distance)
                };
                self.blend_seam(
                    self.oriented(self.repeat.value_at(raw)),
                    threshold.min(MAX_NORMALIZED_THRESHOLD),
                )
            }
            Antialias::Spiral { threshold_px, reverse_spiral } => {
                self.spiral(x, y, raw, threshold_px, reverse_spiral)
            }
        }
    }

    #[inline]
    fn oriented(&self, t: f64) -> f64 {
        if self.reverse {
            1.0 - t
        } else {
            t
        }
    }

    #[inline]
    fn plain(&self, raw: f64) -> Color {
        self.cached.at(self.oriented(self.repeat.value_at(raw)))
    }

    /// Blend the ramp ends when `t` is within `threshold` of the 0/1 seam
    fn blend_seam(&self, t: f64, threshold: f64) -> Color {
        if threshold <= EPSILON {
            return self.cached.at(t);
        }
        let start_weight = if t <= threshold {
            0.5 + t / (2.0 * threshold)
        } else if t >= 1.0 - threshold {
            (t - (1.0 - threshold)) / (2.0 * threshold)
        } else {
            return self.cached.at(t);
        };
        mix_pair(self.mixer.as_ref(), self.cached.at(0.0), self.cached.at(1.0), start_weight)
    }

    /// A spiral under no repeat has one seam: the ray where the turn wraps,
    /// inside the outer radius
    fn spiral(&self, x: f64, y: f64, raw: f64, threshold_px: f64, reverse_spiral: bool) -> Color {
        let radius = self.axis.length;
        let distance = self.axis.distance(x, y);
        if distance <= EPSILON || distance >= radius {
            return self.plain(raw);
        }

        let angular = (threshold_px / (TAU * distance)).min(MAX_NORMALIZED_THRESHOLD);
        let turn = self.axis.turn(x, y);

        // Weight of the side where the spiral starts over
        let (low_weight, plain_weight) = if turn <= angular {
            (0.5 + turn / (2.0 * angular), 1.0)
        } else if turn >= 1.0 - angular {
            ((turn - (1.0 - angular)) / (2.0 * angular), 0.0)
        } else {
            return self.plain(raw);
        };

        // Fade the blend out towards the outer edge, where both sides meet
        let radial_zone = threshold_px.min(radius);
        let strength = ((radius - distance) / radial_zone).min(1.0);
        let weight = plain_weight + (low_weight - plain_weight) * strength;

        let restart = self.cached.at(self.oriented(distance / radius));
        let end = self.cached.at(self.oriented(1.0));
        let (low, high) = if reverse_spiral { (end, restart) } else { (restart, end) };
        mix_pair(self.mixer.as_ref(), low, high, weight)
    }
}

impl std::fmt::Debug for GradientPaintPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradientPaintPolicy")
            .field("kind", &self.kind())
            .field("repeat", &self.repeat)
            .field("reverse", &self.reverse)
            .finish()
    }
}
