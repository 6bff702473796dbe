/// Gradient ramp: ordered color stops plus geometry
///
/// A ramp maps a position `t` to a color by interpolating between the two
/// stops that bracket it. Stops may track the current foreground or
/// background color; such a ramp has to be baked before it can be cached
/// for painting.

use std::io::Cursor;

use cgmath::Point2;
use image::{ImageFormat, RgbaImage};

use super::repeat::RepeatMode;
use crate::color::{mix_pair, Color, ColorMixer};
use crate::error::GradientResult;

/// Coincident stops closer than this blend 50/50
const STOP_EPSILON: f64 = 1e-8;

/// What a stop's color follows
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum StopKind {
    /// Fixed color
    #[default]
    Color,
    /// Tracks the painter's foreground color
    Foreground,
    /// Tracks the painter's background color
    Background,
}

impl StopKind {
    /// Marker written to the vendor `stop-type` attribute
    pub fn as_str(self) -> &'static str {
        match self {
            StopKind::Color => "color-stop",
            StopKind::Foreground => "foreground-stop",
            StopKind::Background => "background-stop",
        }
    }

    /// Unknown markers fall back to a fixed color
    pub fn from_marker(marker: &str) -> Self {
        match marker.trim() {
            "foreground-stop" => StopKind::Foreground,
            "background-stop" => StopKind::Background,
            _ => StopKind::Color,
        }
    }

    pub fn is_variable(self) -> bool {
        self != StopKind::Color
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GradientStop {
    pub position: f64,
    pub color: Color,
    pub kind: StopKind,
}

impl GradientStop {
    pub fn new(position: f64, color: Color) -> Self {
        Self {
            position,
            color,
            kind: StopKind::Color,
        }
    }

    /// Stop following the foreground color; `preview` is shown until baked
    pub fn foreground(position: f64, preview: Color) -> Self {
        Self {
            position,
            color: preview,
            kind: StopKind::Foreground,
        }
    }

    /// Stop following the background color; `preview` is shown until baked
    pub fn background(position: f64, preview: Color) -> Self {
        Self {
            position,
            color: preview,
            kind: StopKind::Background,
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum GradientKind {
    #[default]
    Linear,
    Radial,
}

/// Coordinate system of the geometry points
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum GradientUnits {
    /// Fractions of the painted object's bounding box
    #[default]
    ObjectBoundingBox,
    /// Absolute user-space coordinates
    UserSpaceOnUse,
}

/// SVG `spreadMethod`
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum SpreadMethod {
    #[default]
    Pad,
    Reflect,
    Repeat,
}

impl SpreadMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SpreadMethod::Pad => "pad",
            SpreadMethod::Reflect => "reflect",
            SpreadMethod::Repeat => "repeat",
        }
    }

    pub fn repeat_mode(self) -> RepeatMode {
        match self {
            SpreadMethod::Pad => RepeatMode::None,
            SpreadMethod::Reflect => RepeatMode::Alternate,
            SpreadMethod::Repeat => RepeatMode::Forwards,
        }
    }
}

/// Rectangle in pixel space
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Anchor points of a gradient
///
/// For linear gradients `start`/`end` are the vector. For radial ones
/// `start` is the center, `end` lies on the circle and `focal` is the
/// focal point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GradientGeometry {
    pub kind: GradientKind,
    pub units: GradientUnits,
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    pub focal: Point2<f64>,
}

impl Default for GradientGeometry {
    fn default() -> Self {
        Self {
            kind: GradientKind::Linear,
            units: GradientUnits::ObjectBoundingBox,
            start: Point2::new(0.0, 0.0),
            end: Point2::new(1.0, 0.0),
            focal: Point2::new(0.0, 0.0),
        }
    }
}

impl GradientGeometry {
    /// Start and end in pixel space for an object covering `bounds`
    pub fn resolve(&self, bounds: Bounds) -> (Point2<f64>, Point2<f64>) {
        match self.units {
            GradientUnits::UserSpaceOnUse => (self.start, self.end),
            GradientUnits::ObjectBoundingBox => {
                let map = |p: Point2<f64>| {
                    Point2::new(bounds.x + p.x * bounds.width, bounds.y + p.y * bounds.height)
                };
                (map(self.start), map(self.end))
            }
        }
    }
}

/// An ordered list of color stops
#[derive(Debug, Clone, PartialEq)]
pub struct GradientRamp {
    name: String,
    stops: Vec<GradientStop>,
    has_variable_stops: bool,
    pub geometry: GradientGeometry,
    pub spread: SpreadMethod,
}

impl Default for GradientRamp {
    fn default() -> Self {
        Self::new("")
    }
}

impl GradientRamp {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stops: Vec::new(),
            has_variable_stops: false,
            geometry: GradientGeometry::default(),
            spread: SpreadMethod::Pad,
        }
    }

    pub fn with_stops(name: impl Into<String>, stops: Vec<GradientStop>) -> Self {
        let mut ramp = Self::new(name);
        ramp.set_stops(stops);
        ramp
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn stops(&self) -> &[GradientStop] {
        &self.stops
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// True when some stop still follows the foreground/background color
    pub fn has_variable_stops(&self) -> bool {
        self.has_variable_stops
    }

    /// Replace all stops. They are kept ordered by position; stops at the
    /// same position keep their relative order.
    pub fn set_stops(&mut self, mut stops: Vec<GradientStop>) {
        stops.sort_by(|a, b| a.position.total_cmp(&b.position));
        self.stops = stops;
        self.refresh_variable_flag();
    }

    fn refresh_variable_flag(&mut self) {
        self.has_variable_stops = self.stops.iter().any(|s| s.kind.is_variable());
    }

    /// Color at position `t`
    ///
    /// Positions before the first stop take the first stop's color, after
    /// the last stop the last stop's color. An empty ramp is transparent.
    pub fn color_at(&self, t: f64, mixer: &dyn ColorMixer) -> Color {
        let (first, last) = match (self.stops.first(), self.stops.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Color::TRANSPARENT,
        };

        // NaN lands here too
        if self.stops.len() == 1 || !(t > first.position) {
            return first.color;
        }
        if t >= last.position {
            return last.color;
        }

        let index = self.stops.partition_point(|s| s.position < t);
        let left = &self.stops[index - 1];
        let right = &self.stops[index];

        let span = right.position - left.position;
        let local_t = if span.abs() < STOP_EPSILON {
            0.5
        } else {
            (t - left.position) / span
        };

        mix_pair(mixer, left.color, right.color, 1.0 - local_t)
    }

    /// Permanently turn foreground/background stops into fixed colors
    pub fn bake_variable_colors(&mut self, foreground: Color, background: Color) {
        for stop in &mut self.stops {
            match stop.kind {
                StopKind::Foreground => stop.color = foreground,
                StopKind::Background => stop.color = background,
                StopKind::Color => continue,
            }
            stop.kind = StopKind::Color;
        }
        self.has_variable_stops = false;
    }

    /// Refresh the preview colors of foreground/background stops, keeping
    /// them variable
    pub fn update_variable_colors(&mut self, foreground: Color, background: Color) {
        for stop in &mut self.stops {
            match stop.kind {
                StopKind::Foreground => stop.color = foreground,
                StopKind::Background => stop.color = background,
                StopKind::Color => {}
            }
        }
    }

    /// Baked copy; the ramp itself stays variable
    pub fn baked(&self, foreground: Color, background: Color) -> Self {
        let mut copy = self.clone();
        copy.bake_variable_colors(foreground, background);
        copy
    }

    // ========== Stop editing ==========

    /// Insert a stop in position order, after any stops at the same position.
    /// Returns its index.
    pub fn insert_stop(&mut self, stop: GradientStop) -> usize {
        let index = self.stops.partition_point(|s| s.position <= stop.position);
        self.stops.insert(index, stop);
        self.refresh_variable_flag();
        index
    }

    pub fn remove_stop(&mut self, index: usize) -> Option<GradientStop> {
        if index >= self.stops.len() {
            return None;
        }
        let stop = self.stops.remove(index);
        self.refresh_variable_flag();
        Some(stop)
    }

    /// Reposition a stop, keeping the list ordered. Returns the stop's new
    /// index, or `None` for an out-of-range index.
    pub fn move_stop(&mut self, index: usize, position: f64) -> Option<usize> {
        let mut stop = self.remove_stop(index)?;
        stop.position = position;
        Some(self.insert_stop(stop))
    }

    // ========== Thumbnails ==========

    /// Horizontal preview strip encoded as PNG
    pub fn thumbnail_png(&self, width: u32, height: u32, mixer: &dyn ColorMixer) -> GradientResult<Vec<u8>> {
        let width = width.max(1);
        let height = height.max(1);
        let span = (width - 1).max(1) as f64;

        let row: Vec<Color> = (0..width)
            .map(|x| self.color_at(x as f64 / span, mixer))
            .collect();
        let image = RgbaImage::from_fn(width, height, |x, _| image::Rgba(row[x as usize].to_array()));

        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba8Mixer;

    const RED: Color = Color::rgb(255, 0, 0);
    const GREEN: Color = Color::rgb(0, 255, 0);
    const BLUE: Color = Color::rgb(0, 0, 255);

    fn three_stops() -> GradientRamp {
        GradientRamp::with_stops(
            "rgb",
            vec![
                GradientStop::new(0.0, RED),
                GradientStop::new(0.5, GREEN),
                GradientStop::new(1.0, BLUE),
            ],
        )
    }

    #[test]
    fn test_color_at_boundaries_are_exact() {
        let ramp = three_stops();
        let m = Rgba8Mixer;
        assert_eq!(ramp.color_at(-1.0, &m), RED);
        assert_eq!(ramp.color_at(0.0, &m), RED);
        assert_eq!(ramp.color_at(0.5, &m), GREEN);
        assert_eq!(ramp.color_at(1.0, &m), BLUE);
        assert_eq!(ramp.color_at(2.0, &m), BLUE);
        assert_eq!(ramp.color_at(f64::NAN, &m), RED);
    }

    #[test]
    fn test_color_at_interpolates() {
        let ramp = three_stops();
        let c = ramp.color_at(0.25, &Rgba8Mixer);
        assert_eq!(c.b, 0);
        assert!((126..=129).contains(&c.r));
        assert!((126..=129).contains(&c.g));
        assert_eq!(c.a, 255);
    }

    #[test]
    fn test_empty_and_single_stop_ramps_are_constant() {
        let m = Rgba8Mixer;
        assert_eq!(GradientRamp::new("empty").color_at(0.3, &m), Color::TRANSPARENT);

        let single = GradientRamp::with_stops("one", vec![GradientStop::new(0.4, GREEN)]);
        for t in [-3.0, 0.0, 0.4, 0.9, 7.0] {
            assert_eq!(single.color_at(t, &m), GREEN);
        }
    }

    #[test]
    fn test_coincident_stops_do_not_divide_by_zero() {
        let ramp = GradientRamp::with_stops(
            "hard edge",
            vec![
                GradientStop::new(0.0, RED),
                GradientStop::new(0.5, RED),
                GradientStop::new(0.5, BLUE),
                GradientStop::new(1.0, BLUE),
            ],
        );
        let m = Rgba8Mixer;
        assert_eq!(ramp.color_at(0.49, &m), RED);
        assert_eq!(ramp.color_at(0.51, &m), BLUE);
    }

    #[test]
    fn test_set_stops_sorts_and_flags_variable() {
        let mut ramp = GradientRamp::new("fg-bg");
        ramp.set_stops(vec![
            GradientStop::background(1.0, Color::WHITE),
            GradientStop::foreground(0.0, Color::BLACK),
        ]);
        assert_eq!(ramp.stops()[0].kind, StopKind::Foreground);
        assert!(ramp.has_variable_stops());

        ramp.update_variable_colors(RED, BLUE);
        assert!(ramp.has_variable_stops());
        assert_eq!(ramp.stops()[0].color, RED);

        let baked = ramp.baked(GREEN, BLUE);
        assert!(!baked.has_variable_stops());
        assert_eq!(baked.stops()[0].color, GREEN);
        assert!(ramp.has_variable_stops());

        ramp.bake_variable_colors(GREEN, RED);
        assert!(!ramp.has_variable_stops());
        assert!(ramp.stops().iter().all(|s| s.kind == StopKind::Color));
        assert_eq!(ramp.stops()[1].color, RED);
    }

    #[test]
    fn test_stop_editing_keeps_order() {
        let mut ramp = three_stops();
        assert_eq!(ramp.insert_stop(GradientStop::foreground(0.75, Color::BLACK)), 2);
        assert!(ramp.has_variable_stops());

        assert_eq!(ramp.move_stop(2, 0.1), Some(1));
        let positions: Vec<f64> = ramp.stops().iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0.0, 0.1, 0.5, 1.0]);

        assert_eq!(ramp.remove_stop(1).map(|s| s.kind), Some(StopKind::Foreground));
        assert!(!ramp.has_variable_stops());
        assert_eq!(ramp.remove_stop(9), None);
        assert_eq!(ramp.move_stop(9, 0.5), None);
    }

    #[test]
    fn test_geometry_resolves_bounding_box() {
        let geometry = GradientGeometry::default();
        let bounds = Bounds { x: 10.0, y: 20.0, width: 100.0, height: 50.0 };
        let (start, end) = geometry.resolve(bounds);
        assert_eq!(start, Point2::new(10.0, 20.0));
        assert_eq!(end, Point2::new(110.0, 20.0));

        let user = GradientGeometry {
            units: GradientUnits::UserSpaceOnUse,
            start: Point2::new(3.0, 4.0),
            end: Point2::new(5.0, 6.0),
            ..GradientGeometry::default()
        };
        assert_eq!(user.resolve(bounds), (Point2::new(3.0, 4.0), Point2::new(5.0, 6.0)));
    }

    #[test]
    fn test_thumbnail_is_png() {
        let png = three_stops().thumbnail_png(64, 8, &Rgba8Mixer).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (64, 8));
        assert_eq!(decoded.get_pixel(0, 0).0, RED.to_array());
        assert_eq!(decoded.get_pixel(63, 7).0, BLUE.to_array());
    }
}
