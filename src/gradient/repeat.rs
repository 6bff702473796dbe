/// Repeat strategies: fold a raw shape value into [0, 1]

use super::shape::GradientShape;

const EPSILON: f64 = f64::EPSILON;

/// User-facing repeat setting
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum RepeatMode {
    #[default]
    None,
    Forwards,
    Alternate,
}

/// Concrete folding applied to a shape value
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RepeatStrategy {
    /// Snap the ends to exactly 0 and 1, pass the rest through
    None,
    /// Sawtooth with period 1
    Forwards,
    /// Triangle wave with period 2
    Alternate,
    /// Triangle wave with period 1, used by spirals under `Alternate`
    ModuloHalf,
}

impl RepeatStrategy {
    /// Strategy for a shape and repeat mode
    pub fn select(shape: GradientShape, mode: RepeatMode) -> Self {
        match mode {
            RepeatMode::None => RepeatStrategy::None,
            RepeatMode::Forwards => RepeatStrategy::Forwards,
            RepeatMode::Alternate if shape.is_spiral() => RepeatStrategy::ModuloHalf,
            RepeatMode::Alternate => RepeatStrategy::Alternate,
        }
    }

    #[inline]
    pub fn value_at(self, t: f64) -> f64 {
        if t.is_nan() {
            return 0.0;
        }
        match self {
            RepeatStrategy::None => {
                if t < EPSILON {
                    0.0
                } else if t > 1.0 - EPSILON {
                    1.0
                } else {
                    t
                }
            }
            RepeatStrategy::Forwards => {
                if !t.is_finite() {
                    return 0.0;
                }
                let mut i = t.trunc();
                // 0 closes the previous cycle
                if t < EPSILON {
                    i -= 1.0;
                }
                (t - i).clamp(0.0, 1.0)
            }
            RepeatStrategy::Alternate => {
                if !t.is_finite() {
                    return 0.0;
                }
                let t = t.abs();
                let i = t.trunc();
                let value = t - i;
                if i % 2.0 == 1.0 {
                    1.0 - value
                } else {
                    value
                }
            }
            RepeatStrategy::ModuloHalf => {
                if !t.is_finite() {
                    return 0.0;
                }
                let t = t.abs();
                let i = (t * 2.0).floor();
                let mut value = t - i * 0.5;
                if i % 2.0 == 1.0 {
                    value = 0.5 - value;
                }
                (value * 2.0).clamp(0.0, 1.0)
            }
        }
    }
}
