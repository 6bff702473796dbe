/// Procedural gradient engine
///
/// - Color ramps with foreground/background stops (ramp.rs)
/// - SVG exchange format (svg.rs)
/// - Pre-sampled ramps for painting (cached.rs)
/// - Shape strategies mapping points to ramp positions (shape.rs)
/// - Repeat strategies folding positions into [0, 1] (repeat.rs)
/// - Paint policies with seam antialiasing (paint.rs)

pub mod cached;
pub mod paint;
pub mod ramp;
pub mod repeat;
pub mod shape;
pub mod svg;

pub use cached::{CachedRamp, DEFAULT_STEPS};
pub use paint::{GradientPaintPolicy, PaintPolicyKind, PaintSetup};
pub use ramp::{
    Bounds, GradientGeometry, GradientKind, GradientRamp, GradientStop, GradientUnits, SpreadMethod,
    StopKind,
};
pub use repeat::{RepeatMode, RepeatStrategy};
pub use shape::{GradientShape, ShapeStrategy};
