/// Color representation and mixing
///
/// This module defines the single working color representation used by the
/// gradient engine and the mixing operation that blends colors:
/// - `Color` is 8-bit-per-channel RGBA with straight (non-premultiplied) alpha
/// - `ColorMixer` is the seam for a color-managed mixing backend
/// - `Rgba8Mixer` is the default alpha-weighted integer mixer

use std::str::FromStr;

/// Total weight used for two-color blends
pub const MIX_WEIGHT_SUM: u32 = 255;

/// An 8-bit RGBA color with straight alpha
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Same color with a different 8-bit opacity
    #[inline]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Opacity in [0, 1]
    #[inline]
    pub fn opacity(self) -> f64 {
        self.a as f64 / 255.0
    }

    /// Sets opacity from a [0, 1] value, rounding to the nearest 8-bit step
    pub fn with_opacity(self, opacity: f64) -> Self {
        let a = (opacity.clamp(0.0, 1.0) * 255.0 + 0.5) as u8;
        self.with_alpha(a)
    }

    /// `#rrggbb` form used by the SVG exchange format (opacity is written separately)
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parses any SVG/CSS color (`#rgb`, `#rrggbb`, named colors, `rgb(...)`)
    pub fn parse(text: &str) -> Option<Self> {
        svgtypes::Color::from_str(text.trim())
            .ok()
            .map(|c| Self::rgba(c.red, c.green, c.blue, c.alpha))
    }

    #[inline]
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl From<[u8; 4]> for Color {
    fn from(c: [u8; 4]) -> Self {
        Self::rgba(c[0], c[1], c[2], c[3])
    }
}

/// Weighted color averaging
///
/// Given `colors` and integer `weights` summing to `weight_sum`, returns
/// the weighted average color. Implementations must be pure so the paint
/// policies can share one mixer across worker threads.
pub trait ColorMixer: Send + Sync {
    fn mix(&self, colors: &[Color], weights: &[u32], weight_sum: u32) -> Color;
}

/// Default mixer working directly on 8-bit RGBA
///
/// Color channels are weighted by `weight * alpha` so fully transparent
/// samples do not bleed their color into the result. When every sample is
/// transparent the channels fall back to a plain weighted average.
#[derive(Debug, Copy, Clone, Default)]
pub struct Rgba8Mixer;

impl ColorMixer for Rgba8Mixer {
    fn mix(&self, colors: &[Color], weights: &[u32], weight_sum: u32) -> Color {
        if weight_sum == 0 {
            return Color::TRANSPARENT;
        }

        let mut total_alpha: u64 = 0;
        let mut channels = [0u64; 3];
        let mut plain = [0u64; 3];
        let mut plain_weight: u64 = 0;

        for (color, &weight) in colors.iter().zip(weights) {
            let w = weight as u64;
            let alpha_weight = w * color.a as u64;
            total_alpha += alpha_weight;
            channels[0] += alpha_weight * color.r as u64;
            channels[1] += alpha_weight * color.g as u64;
            channels[2] += alpha_weight * color.b as u64;
            plain[0] += w * color.r as u64;
            plain[1] += w * color.g as u64;
            plain[2] += w * color.b as u64;
            plain_weight += w;
        }

        if total_alpha == 0 {
            if plain_weight == 0 {
                return Color::TRANSPARENT;
            }
            let avg = |sum: u64| ((sum + plain_weight / 2) / plain_weight).min(255) as u8;
            return Color::rgba(avg(plain[0]), avg(plain[1]), avg(plain[2]), 0);
        }

        let avg = |sum: u64| ((sum + total_alpha / 2) / total_alpha).min(255) as u8;
        let ws = weight_sum as u64;
        let alpha = ((total_alpha + ws / 2) / ws).min(255) as u8;

        Color::rgba(avg(channels[0]), avg(channels[1]), avg(channels[2]), alpha)
    }
}

/// Blends two colors with `left_weight` in [0, 1] applied to `left`
///
/// Weights are quantized to `round(left_weight * 255)` and `255 - that`.
pub fn mix_pair(mixer: &dyn ColorMixer, left: Color, right: Color, left_weight: f64) -> Color {
    let w = (left_weight.clamp(0.0, 1.0) * MIX_WEIGHT_SUM as f64).round() as u32;
    mixer.mix(&[left, right], &[w, MIX_WEIGHT_SUM - w], MIX_WEIGHT_SUM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_weight_is_exact() {
        let red = Color::rgba(200, 10, 30, 77);
        let blue = Color::rgb(0, 0, 255);
        assert_eq!(mix_pair(&Rgba8Mixer, red, blue, 1.0), red);
        assert_eq!(mix_pair(&Rgba8Mixer, red, blue, 0.0), blue);
    }

    #[test]
    fn test_half_mix() {
        let mixed = mix_pair(&Rgba8Mixer, Color::BLACK, Color::WHITE, 0.5);
        assert!(mixed.r > 120 && mixed.r < 135);
        assert_eq!(mixed.a, 255);
    }

    #[test]
    fn test_transparent_samples_do_not_tint() {
        let clear_red = Color::rgba(255, 0, 0, 0);
        let green = Color::rgb(0, 255, 0);
        let mixed = mix_pair(&Rgba8Mixer, clear_red, green, 0.5);
        assert_eq!((mixed.r, mixed.g, mixed.b), (0, 255, 0));
        assert!(mixed.a > 120 && mixed.a < 135);
    }

    #[test]
    fn test_hex_roundtrip() {
        let c = Color::rgb(18, 52, 171);
        assert_eq!(c.to_hex(), "#1234ab");
        assert_eq!(Color::parse(&c.to_hex()), Some(c));
        assert_eq!(Color::parse("red"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::parse("not a color"), None);
    }

    #[test]
    fn test_opacity_rounding() {
        for a in [0u8, 1, 127, 128, 254, 255] {
            let c = Color::WHITE.with_alpha(a);
            assert_eq!(Color::WHITE.with_opacity(c.opacity()).a, a);
        }
    }
}
