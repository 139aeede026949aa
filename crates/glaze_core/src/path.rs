//! Path building and representation

use crate::geometry::{Affine2D, Point, Rect};
use smallvec::SmallVec;

/// Cubic control-point distance for a quarter circle
const KAPPA: f32 = 0.552_284_8;

/// Path command
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Point),
    LineTo(Point),
    QuadTo {
        control: Point,
        end: Point,
    },
    CubicTo {
        control1: Point,
        control2: Point,
        end: Point,
    },
    Close,
}

impl PathCommand {
    fn map(&self, mut f: impl FnMut(Point) -> Point) -> PathCommand {
        match *self {
            PathCommand::MoveTo(p) => PathCommand::MoveTo(f(p)),
            PathCommand::LineTo(p) => PathCommand::LineTo(f(p)),
            PathCommand::QuadTo { control, end } => PathCommand::QuadTo {
                control: f(control),
                end: f(end),
            },
            PathCommand::CubicTo {
                control1,
                control2,
                end,
            } => PathCommand::CubicTo {
                control1: f(control1),
                control2: f(control2),
                end: f(end),
            },
            PathCommand::Close => PathCommand::Close,
        }
    }
}

/// A 2D path composed of commands
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    commands: SmallVec<[PathCommand; 16]>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn rect(rect: Rect) -> Self {
        PathBuilder::new()
            .move_to(rect.x(), rect.y())
            .line_to(rect.max_x(), rect.y())
            .line_to(rect.max_x(), rect.max_y())
            .line_to(rect.x(), rect.max_y())
            .close()
            .build()
    }

    pub fn line(from: Point, to: Point) -> Self {
        PathBuilder::new()
            .move_to(from.x, from.y)
            .line_to(to.x, to.y)
            .build()
    }

    /// Open polyline through `points`
    pub fn polyline(points: &[Point]) -> Self {
        let mut builder = PathBuilder::new();
        for (i, p) in points.iter().enumerate() {
            builder = if i == 0 {
                builder.move_to(p.x, p.y)
            } else {
                builder.line_to(p.x, p.y)
            };
        }
        builder.build()
    }

    /// Closed polygon through `points`
    pub fn polygon(points: &[Point]) -> Self {
        let mut path = Self::polyline(points);
        if !path.is_empty() {
            path.commands.push(PathCommand::Close);
        }
        path
    }

    /// Ellipse inscribed in `bounds`, built from four cubic arcs
    pub fn ellipse(bounds: Rect) -> Self {
        let rx = bounds.width() / 2.0;
        let ry = bounds.height() / 2.0;
        let cx = bounds.x() + rx;
        let cy = bounds.y() + ry;
        let (kx, ky) = (rx * KAPPA, ry * KAPPA);
        PathBuilder::new()
            .move_to(cx + rx, cy)
            .cubic_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry)
            .cubic_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy)
            .cubic_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry)
            .cubic_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy)
            .close()
            .build()
    }

    pub fn rounded_rect(rect: Rect, radius: f32) -> Self {
        let r = radius.min(rect.width() / 2.0).min(rect.height() / 2.0).max(0.0);
        if r == 0.0 {
            return Self::rect(rect);
        }
        let k = r * KAPPA;
        let (x0, y0, x1, y1) = (rect.x(), rect.y(), rect.max_x(), rect.max_y());
        PathBuilder::new()
            .move_to(x0 + r, y0)
            .line_to(x1 - r, y0)
            .cubic_to(x1 - r + k, y0, x1, y0 + r - k, x1, y0 + r)
            .line_to(x1, y1 - r)
            .cubic_to(x1, y1 - r + k, x1 - r + k, y1, x1 - r, y1)
            .line_to(x0 + r, y1)
            .cubic_to(x0 + r - k, y1, x0, y1 - r + k, x0, y1 - r)
            .line_to(x0, y0 + r)
            .cubic_to(x0, y0 + r - k, x0 + r - k, y0, x0 + r, y0)
            .close()
            .build()
    }

    /// Copy of this path with every point run through `transform`
    pub fn transformed(&self, transform: &Affine2D) -> Path {
        if transform.is_identity() {
            return self.clone();
        }
        Path {
            commands: self
                .commands
                .iter()
                .map(|c| c.map(|p| transform.transform_point(p)))
                .collect(),
        }
    }

    /// Add the subpaths of `other` after this path's
    pub fn append(&mut self, other: &Path) {
        self.commands.extend(other.commands.iter().copied());
    }

    /// Bounds of all points, including control points
    pub fn bounds(&self) -> Rect {
        let mut min = Point::new(f32::MAX, f32::MAX);
        let mut max = Point::new(f32::MIN, f32::MIN);
        let mut any = false;
        for cmd in &self.commands {
            cmd.map(|p| {
                any = true;
                min = Point::new(min.x.min(p.x), min.y.min(p.y));
                max = Point::new(max.x.max(p.x), max.y.max(p.y));
                p
            });
        }
        if !any {
            return Rect::ZERO;
        }
        Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }
}

/// Builder for constructing paths
pub struct PathBuilder {
    path: Path,
}

impl PathBuilder {
    pub fn new() -> Self {
        Self { path: Path::new() }
    }

    pub fn move_to(mut self, x: f32, y: f32) -> Self {
        self.path.commands.push(PathCommand::MoveTo(Point::new(x, y)));
        self
    }

    pub fn line_to(mut self, x: f32, y: f32) -> Self {
        self.path.commands.push(PathCommand::LineTo(Point::new(x, y)));
        self
    }

    pub fn quad_to(mut self, cx: f32, cy: f32, x: f32, y: f32) -> Self {
        self.path.commands.push(PathCommand::QuadTo {
            control: Point::new(cx, cy),
            end: Point::new(x, y),
        });
        self
    }

    pub fn cubic_to(mut self, c1x: f32, c1y: f32, c2x: f32, c2y: f32, x: f32, y: f32) -> Self {
        self.path.commands.push(PathCommand::CubicTo {
            control1: Point::new(c1x, c1y),
            control2: Point::new(c2x, c2y),
            end: Point::new(x, y),
        });
        self
    }

    pub fn close(mut self) -> Self {
        self.path.commands.push(PathCommand::Close);
        self
    }

    pub fn build(self) -> Path {
        self.path
    }
}

impl Default for PathBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_path_bounds() {
        let path = Path::rect(Rect::new(2.0, 3.0, 10.0, 5.0));
        assert_eq!(path.commands().len(), 5);
        assert_eq!(path.bounds(), Rect::new(2.0, 3.0, 10.0, 5.0));
    }

    #[test]
    fn test_ellipse_bounds() {
        let path = Path::ellipse(Rect::new(0.0, 0.0, 20.0, 10.0));
        let b = path.bounds();
        assert!((b.width() - 20.0).abs() < 1e-4);
        assert!((b.height() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_transformed_translates_points() {
        let path = Path::line(Point::ZERO, Point::new(1.0, 0.0))
            .transformed(&Affine2D::translation(5.0, 5.0));
        assert_eq!(path.commands()[0], PathCommand::MoveTo(Point::new(5.0, 5.0)));
    }
}
