/// Gradient shapes: map a 2D point to a raw position along the ramp
///
/// Values are not clamped here; folding into [0, 1] belongs to the repeat
/// strategy. Every shape built from coincident start/end points returns 0
/// everywhere.

use std::f64::consts::{PI, TAU};

use cgmath::{InnerSpace, MetricSpace, Point2, Vector2};

const EPSILON: f64 = f64::EPSILON;

pub trait ShapeStrategy: Send + Sync {
    fn value_at(&self, x: f64, y: f64) -> f64;
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum GradientShape {
    #[default]
    Linear,
    BiLinear,
    Radial,
    Square,
    Conical,
    ConicalSymmetric,
    Spiral,
    ReverseSpiral,
}

impl GradientShape {
    pub const ALL: [GradientShape; 8] = [
        GradientShape::Linear,
        GradientShape::BiLinear,
        GradientShape::Radial,
        GradientShape::Square,
        GradientShape::Conical,
        GradientShape::ConicalSymmetric,
        GradientShape::Spiral,
        GradientShape::ReverseSpiral,
    ];

    pub fn strategy(self, start: Point2<f64>, end: Point2<f64>) -> Box<dyn ShapeStrategy> {
        let axis = Axis::new(start, end);
        match self {
            GradientShape::Linear => Box::new(LinearShape(axis)),
            GradientShape::BiLinear => Box::new(BiLinearShape(axis)),
            GradientShape::Radial => Box::new(RadialShape(axis)),
            GradientShape::Square => Box::new(SquareShape(axis)),
            GradientShape::Conical => Box::new(ConicalShape(axis)),
            GradientShape::ConicalSymmetric => Box::new(ConicalSymmetricShape(axis)),
            GradientShape::Spiral => Box::new(SpiralShape(axis)),
            GradientShape::ReverseSpiral => Box::new(ReverseSpiralShape(axis)),
        }
    }

    /// Shapes whose value starts at 0 in the middle of the fill rather than
    /// at a seam
    pub fn has_center(self) -> bool {
        matches!(
            self,
            GradientShape::BiLinear | GradientShape::Radial | GradientShape::Square
        )
    }

    pub fn is_spiral(self) -> bool {
        matches!(self, GradientShape::Spiral | GradientShape::ReverseSpiral)
    }
}

/// The gradient vector with the derived quantities every shape needs
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Axis {
    pub start: Point2<f64>,
    pub vector: Vector2<f64>,
    pub length: f64,
    /// `atan2` of the vector shifted into [0, 2π]
    pub angle: f64,
}

impl Axis {
    pub fn new(start: Point2<f64>, end: Point2<f64>) -> Self {
        let vector = end - start;
        Self {
            start,
            vector,
            length: vector.magnitude(),
            angle: vector.y.atan2(vector.x) + PI,
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.length < EPSILON
    }

    #[inline]
    pub fn distance(&self, x: f64, y: f64) -> f64 {
        self.start.distance(Point2::new(x, y))
    }

    /// Angle of the point around `start` measured from the vector, as a
    /// fraction of a full turn in [0, 1)
    #[inline]
    pub fn turn(&self, x: f64, y: f64) -> f64 {
        let angle = (y - self.start.y).atan2(x - self.start.x) + PI;
        let turn = (angle - self.angle).rem_euclid(TAU) / TAU;
        // rem_euclid may round up to the modulus itself
        if turn >= 1.0 {
            0.0
        } else {
            turn
        }
    }

    /// Signed projection onto the vector, in vector lengths
    #[inline]
    fn projection(&self, x: f64, y: f64) -> f64 {
        let offset = Point2::new(x, y) - self.start;
        offset.dot(self.vector) / (self.length * self.length)
    }
}

pub struct LinearShape(Axis);

impl ShapeStrategy for LinearShape {
    fn value_at(&self, x: f64, y: f64) -> f64 {
        if self.0.is_degenerate() {
            return 0.0;
        }
        self.0.projection(x, y)
    }
}

/// Linear mirrored around the start point
pub struct BiLinearShape(Axis);

impl ShapeStrategy for BiLinearShape {
    fn value_at(&self, x: f64, y: f64) -> f64 {
        if self.0.is_degenerate() {
            return 0.0;
        }
        let t = self.0.projection(x, y);
        if t < -EPSILON {
            -t
        } else {
            t
        }
    }
}

pub struct RadialShape(Axis);

impl ShapeStrategy for RadialShape {
    fn value_at(&self, x: f64, y: f64) -> f64 {
        if self.0.is_degenerate() {
            return 0.0;
        }
        self.0.distance(x, y) / self.0.length
    }
}

/// Larger of the distances along the vector and across it
pub struct SquareShape(Axis);

impl ShapeStrategy for SquareShape {
    fn value_at(&self, x: f64, y: f64) -> f64 {
        let axis = &self.0;
        if axis.is_degenerate() {
            return 0.0;
        }
        let offset = Point2::new(x, y) - axis.start;
        let along = offset.dot(axis.vector).abs() / axis.length;
        let across = axis.vector.perp_dot(offset).abs() / axis.length;
        along.max(across) / axis.length
    }
}

pub struct ConicalShape(Axis);

impl ShapeStrategy for ConicalShape {
    fn value_at(&self, x: f64, y: f64) -> f64 {
        if self.0.is_degenerate() {
            return 0.0;
        }
        self.0.turn(x, y)
    }
}

/// Conical folded at half a turn
pub struct ConicalSymmetricShape(Axis);

impl ShapeStrategy for ConicalSymmetricShape {
    fn value_at(&self, x: f64, y: f64) -> f64 {
        if self.0.is_degenerate() {
            return 0.0;
        }
        let turn = self.0.turn(x, y);
        if turn > 0.5 {
            (1.0 - turn) * 2.0
        } else {
            turn * 2.0
        }
    }
}

pub struct SpiralShape(Axis);

impl ShapeStrategy for SpiralShape {
    fn value_at(&self, x: f64, y: f64) -> f64 {
        if self.0.is_degenerate() {
            return 0.0;
        }
        self.0.distance(x, y) / self.0.length + self.0.turn(x, y)
    }
}

/// Spiral winding the other way
pub struct ReverseSpiralShape(Axis);

impl ShapeStrategy for ReverseSpiralShape {
    fn value_at(&self, x: f64, y: f64) -> f64 {
        if self.0.is_degenerate() {
            return 0.0;
        }
        self.0.distance(x, y) / self.0.length + 1.0 - self.0.turn(x, y)
    }
}
