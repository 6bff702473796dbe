/// Pre-sampled ramp for per-pixel lookups
///
/// Built once from a resolved ramp, then shared read-only by every paint
/// worker.

use super::ramp::GradientRamp;
use crate::color::{Color, ColorMixer};
use crate::error::{GradientError, GradientResult};

/// Sample count used when the caller has no better estimate
pub const DEFAULT_STEPS: usize = 256;

/// Upper bound for `steps_for_extent`
pub const MAX_STEPS: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedRamp {
    colors: Vec<Color>,
}

impl CachedRamp {
    /// Sample `ramp` at `steps` evenly spaced positions covering [0, 1]
    ///
    /// Fails if the ramp still has foreground/background stops.
    pub fn new(ramp: &GradientRamp, steps: usize, mixer: &dyn ColorMixer) -> GradientResult<Self> {
        if ramp.has_variable_stops() {
            return Err(GradientError::UnresolvedStops);
        }

        let steps = steps.max(2);
        let last = (steps - 1) as f64;
        let colors = (0..steps)
            .map(|i| ramp.color_at(i as f64 / last, mixer))
            .collect();

        Ok(Self { colors })
    }

    /// Nearest sample to `t`; out-of-range positions clamp to the ends
    #[inline]
    pub fn at(&self, t: f64) -> Color {
        let last = self.colors.len() - 1;
        let index = (t * last as f64 + 0.5).clamp(0.0, last as f64);
        // NaN casts to 0
        self.colors[index as usize]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }
}

/// Sample count for a gradient spanning `extent` pixels
pub fn steps_for_extent(extent: f64) -> usize {
    if !extent.is_finite() || extent <= 0.0 {
        return DEFAULT_STEPS;
    }
    (extent.ceil() as usize).clamp(DEFAULT_STEPS, MAX_STEPS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba8Mixer;
    use crate::gradient::ramp::GradientStop;

    fn black_to_white() -> GradientRamp {
        GradientRamp::with_stops(
            "bw",
            vec![
                GradientStop::new(0.0, Color::BLACK),
                GradientStop::new(1.0, Color::WHITE),
            ],
        )
    }

    #[test]
    fn test_ends_match_ramp() {
        let cached = CachedRamp::new(&black_to_white(), DEFAULT_STEPS, &Rgba8Mixer).unwrap();
        assert_eq!(cached.len(), DEFAULT_STEPS);
        assert_eq!(cached.at(0.0), Color::BLACK);
        assert_eq!(cached.at(1.0), Color::WHITE);
        assert_eq!(cached.at(-4.0), Color::BLACK);
        assert_eq!(cached.at(4.0), Color::WHITE);
        assert_eq!(cached.at(f64::NAN), Color::BLACK);
    }

    #[test]
    fn test_minimum_two_steps() {
        let cached = CachedRamp::new(&black_to_white(), 0, &Rgba8Mixer).unwrap();
        assert_eq!(cached.colors(), &[Color::BLACK, Color::WHITE]);
        assert_eq!(cached.at(0.49), Color::BLACK);
        assert_eq!(cached.at(0.51), Color::WHITE);
    }

    #[test]
    fn test_variable_stops_must_be_baked() {
        let mut ramp = black_to_white();
        ramp.insert_stop(GradientStop::foreground(0.5, Color::BLACK));
        assert!(matches!(
            CachedRamp::new(&ramp, 16, &Rgba8Mixer),
            Err(GradientError::UnresolvedStops)
        ));

        let baked = ramp.baked(Color::rgb(255, 0, 0), Color::WHITE);
        assert!(CachedRamp::new(&baked, 16, &Rgba8Mixer).is_ok());
    }

    #[test]
    fn test_steps_for_extent() {
        assert_eq!(steps_for_extent(10.0), DEFAULT_STEPS);
        assert_eq!(steps_for_extent(1000.2), 1001);
        assert_eq!(steps_for_extent(1e9), MAX_STEPS);
        assert_eq!(steps_for_extent(f64::NAN), DEFAULT_STEPS);
    }
}
