//! Geometry types shared by the drawing interface and the backends
//!
//! Coordinates are top-down (y grows downwards), matching image space.

// ─────────────────────────────────────────────────────────────────────────────
// Points, Sizes, Rectangles
// ─────────────────────────────────────────────────────────────────────────────

/// 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// 2D rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn x(&self) -> f32 {
        self.origin.x
    }

    pub fn y(&self) -> f32 {
        self.origin.y
    }

    pub fn width(&self) -> f32 {
        self.size.width
    }

    pub fn height(&self) -> f32 {
        self.size.height
    }

    pub fn max_x(&self) -> f32 {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> f32 {
        self.origin.y + self.size.height
    }

    pub fn is_empty(&self) -> bool {
        self.size.width <= 0.0 || self.size.height <= 0.0
    }

    /// Corners in drawing order: top-left, top-right, bottom-right, bottom-left
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x(), self.y()),
            Point::new(self.max_x(), self.y()),
            Point::new(self.max_x(), self.max_y()),
            Point::new(self.x(), self.max_y()),
        ]
    }

    /// Offset the rect by a delta
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Rect {
            origin: Point::new(self.origin.x + dx, self.origin.y + dy),
            size: self.size,
        }
    }

    /// Smallest integer rectangle covering this one
    pub fn round_out(&self) -> IntRect {
        let x0 = self.x().floor() as i32;
        let y0 = self.y().floor() as i32;
        let x1 = self.max_x().ceil() as i32;
        let y1 = self.max_y().ceil() as i32;
        IntRect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Integer rectangle in device pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl IntRect {
    pub const EMPTY: IntRect = IntRect {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn max_x(&self) -> i32 {
        self.x + self.width
    }

    pub fn max_y(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// Intersection, or `None` when the rectangles do not overlap
    pub fn intersect(&self, other: &IntRect) -> Option<IntRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.max_x().min(other.max_x());
        let y1 = self.max_y().min(other.max_y());
        if x1 > x0 && y1 > y0 {
            Some(IntRect::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }

    pub fn union(&self, other: &IntRect) -> IntRect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.max_x().max(other.max_x());
        let y1 = self.max_y().max(other.max_y());
        IntRect::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn translate(&self, dx: i32, dy: i32) -> IntRect {
        IntRect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.max_x() && y >= self.y && y < self.max_y()
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Affine Transform
// ─────────────────────────────────────────────────────────────────────────────

const AFFINE_EPSILON: f32 = 1e-6;

/// 2D affine transformation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine2D {
    /// Matrix elements [a, b, c, d, tx, ty]
    /// | a  c  tx |
    /// | b  d  ty |
    /// | 0  0   1 |
    pub elements: [f32; 6],
}

impl Default for Affine2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2D {
    pub const IDENTITY: Affine2D = Affine2D {
        elements: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
    };

    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self {
            elements: [a, b, c, d, tx, ty],
        }
    }

    pub fn translation(x: f32, y: f32) -> Self {
        Self {
            elements: [1.0, 0.0, 0.0, 1.0, x, y],
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            elements: [sx, 0.0, 0.0, sy, 0.0, 0.0],
        }
    }

    pub fn rotation(angle: f32) -> Self {
        let c = angle.cos();
        let s = angle.sin();
        Self {
            elements: [c, s, -s, c, 0.0, 0.0],
        }
    }

    pub fn shear(shx: f32, shy: f32) -> Self {
        Self {
            elements: [1.0, shy, shx, 1.0, 0.0, 0.0],
        }
    }

    pub fn transform_point(&self, point: Point) -> Point {
        let [a, b, c, d, tx, ty] = self.elements;
        Point::new(a * point.x + c * point.y + tx, b * point.x + d * point.y + ty)
    }

    /// Transform a direction, ignoring translation
    pub fn transform_vector(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, _, _] = self.elements;
        (a * x + c * y, b * x + d * y)
    }

    /// Concatenate this transform with another (self * other)
    /// The resulting transform first applies `other`, then `self`.
    pub fn then(&self, other: &Affine2D) -> Affine2D {
        let [a1, b1, c1, d1, tx1, ty1] = self.elements;
        let [a2, b2, c2, d2, tx2, ty2] = other.elements;

        Affine2D {
            elements: [
                a1 * a2 + c1 * b2,
                b1 * a2 + d1 * b2,
                a1 * c2 + c1 * d2,
                b1 * c2 + d1 * d2,
                a1 * tx2 + c1 * ty2 + tx1,
                b1 * tx2 + d1 * ty2 + ty1,
            ],
        }
    }

    pub fn determinant(&self) -> f32 {
        let [a, b, c, d, _, _] = self.elements;
        a * d - b * c
    }

    pub fn inverse(&self) -> Option<Affine2D> {
        let det = self.determinant();
        if det.abs() < AFFINE_EPSILON {
            return None;
        }
        let [a, b, c, d, tx, ty] = self.elements;
        let inv = 1.0 / det;
        Some(Affine2D {
            elements: [
                d * inv,
                -b * inv,
                -c * inv,
                a * inv,
                (c * ty - d * tx) * inv,
                (b * tx - a * ty) * inv,
            ],
        })
    }

    pub fn translation_components(&self) -> (f32, f32) {
        (self.elements[4], self.elements[5])
    }

    pub fn is_identity(&self) -> bool {
        self.is_translation() && self.elements[4] == 0.0 && self.elements[5] == 0.0
    }

    /// True when the linear part is the identity
    pub fn is_translation(&self) -> bool {
        let [a, b, c, d, _, _] = self.elements;
        a == 1.0 && b == 0.0 && c == 0.0 && d == 1.0
    }

    /// Lengths of the transformed unit axes
    pub fn axis_scales(&self) -> (f32, f32) {
        let [a, b, c, d, _, _] = self.elements;
        ((a * a + b * b).sqrt(), (c * c + d * d).sqrt())
    }

    pub fn max_scale(&self) -> f32 {
        let (sx, sy) = self.axis_scales();
        sx.max(sy)
    }

    /// True when neither axis is stretched (rotation and translation allowed)
    pub fn has_unit_scale(&self) -> bool {
        let (sx, sy) = self.axis_scales();
        (sx - 1.0).abs() < AFFINE_EPSILON && (sy - 1.0).abs() < AFFINE_EPSILON
    }

    /// Column-major 4x4 matrix for the native model-view stack
    pub fn to_matrix4(&self) -> [f32; 16] {
        let [a, b, c, d, tx, ty] = self.elements;
        [
            a, b, 0.0, 0.0, //
            c, d, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            tx, ty, 0.0, 1.0,
        ]
    }

    /// Axis-aligned bounds of a transformed rectangle
    pub fn transform_rect_bounds(&self, rect: &Rect) -> Rect {
        let corners = rect.corners().map(|p| self.transform_point(p));
        let mut min_x = f32::MAX;
        let mut min_y = f32::MAX;
        let mut max_x = f32::MIN;
        let mut max_y = f32::MIN;
        for p in corners {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_rect_intersection() {
        let a = IntRect::new(10, 10, 50, 50);
        let b = IntRect::new(20, 20, 10, 10);
        assert_eq!(a.intersect(&b), Some(IntRect::new(20, 20, 10, 10)));
        assert_eq!(a.intersect(&IntRect::new(100, 100, 5, 5)), None);
    }

    #[test]
    fn test_affine_inverse_round_trip() {
        let t = Affine2D::translation(5.0, -3.0)
            .then(&Affine2D::rotation(0.7))
            .then(&Affine2D::scale(2.0, 0.5));
        let inv = t.inverse().unwrap();
        let p = Point::new(3.0, 4.0);
        let q = inv.transform_point(t.transform_point(p));
        assert!((q.x - p.x).abs() < 1e-4);
        assert!((q.y - p.y).abs() < 1e-4);
    }

    #[test]
    fn test_singular_transform_has_no_inverse() {
        assert!(Affine2D::scale(0.0, 1.0).inverse().is_none());
    }

    #[test]
    fn test_scale_classification() {
        assert!(Affine2D::rotation(1.2).has_unit_scale());
        assert!(!Affine2D::scale(2.0, 1.0).has_unit_scale());
        assert_eq!(Affine2D::scale(2.0, 3.0).max_scale(), 3.0);
        assert!(Affine2D::translation(4.0, 2.0).is_translation());
        assert!(!Affine2D::translation(4.0, 2.0).is_identity());
    }
}
