//! Shape tessellation for the non-native drawing paths
//!
//! Converts paths into triangle meshes and flattened polylines using lyon.
//! Geometry stays in user space; the native model-view matrix applies the
//! transform at draw time.

use glaze_core::{Dash, LineCap, LineJoin, Path, PathCommand, Stroke};
use lyon::lyon_tessellation::{
    BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex, StrokeOptions,
    StrokeTessellator, StrokeVertex, VertexBuffers,
};
use lyon::math::point;
use lyon::path::iterator::PathIterator;
use lyon::path::PathEvent;

/// Indexed triangle geometry
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Non-indexed vertex list, three vertices per triangle
    pub fn triangles(&self) -> Vec<[f32; 2]> {
        self.indices
            .iter()
            .filter_map(|&i| self.vertices.get(i as usize).copied())
            .collect()
    }
}

/// A flattened subpath
#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    pub points: Vec<[f32; 2]>,
    pub closed: bool,
}

/// Convert a glaze path into a lyon path
fn to_lyon_path(path: &Path) -> lyon::path::Path {
    let mut builder = lyon::path::Path::builder();
    let mut open = false;
    let mut current = point(0.0, 0.0);

    for cmd in path.commands() {
        match *cmd {
            PathCommand::MoveTo(p) => {
                if open {
                    builder.end(false);
                }
                current = point(p.x, p.y);
                builder.begin(current);
                open = true;
            }
            PathCommand::LineTo(p) => {
                if !open {
                    builder.begin(current);
                    open = true;
                }
                current = point(p.x, p.y);
                builder.line_to(current);
            }
            PathCommand::QuadTo { control, end } => {
                if !open {
                    builder.begin(current);
                    open = true;
                }
                current = point(end.x, end.y);
                builder.quadratic_bezier_to(point(control.x, control.y), current);
            }
            PathCommand::CubicTo {
                control1,
                control2,
                end,
            } => {
                if !open {
                    builder.begin(current);
                    open = true;
                }
                current = point(end.x, end.y);
                builder.cubic_bezier_to(
                    point(control1.x, control1.y),
                    point(control2.x, control2.y),
                    current,
                );
            }
            PathCommand::Close => {
                if open {
                    builder.end(true);
                    open = false;
                }
            }
        }
    }

    if open {
        builder.end(false);
    }
    builder.build()
}

/// Flatten every subpath of `path` into line segments
pub fn flatten(path: &Path, tolerance: f32) -> Vec<Polyline> {
    let lyon_path = to_lyon_path(path);
    let mut polylines = Vec::new();
    let mut current: Vec<[f32; 2]> = Vec::new();

    for event in lyon_path.iter().flattened(tolerance) {
        match event {
            PathEvent::Begin { at } => {
                current = vec![at.to_array()];
            }
            PathEvent::Line { to, .. } => current.push(to.to_array()),
            PathEvent::End { close, .. } => {
                if current.len() > 1 {
                    polylines.push(Polyline {
                        points: std::mem::take(&mut current),
                        closed: close,
                    });
                }
            }
            // flattened iterators only yield lines
            PathEvent::Quadratic { .. } | PathEvent::Cubic { .. } => {}
        }
    }

    polylines
}

/// Tessellate the interior of a path (non-zero winding)
pub fn tessellate_fill(path: &Path, tolerance: f32) -> Mesh {
    if path.is_empty() {
        return Mesh::default();
    }
    let lyon_path = to_lyon_path(path);

    let mut geometry: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let mut tessellator = FillTessellator::new();
    let options = FillOptions::default()
        .with_tolerance(tolerance)
        .with_fill_rule(FillRule::NonZero);

    let result = tessellator.tessellate_path(
        &lyon_path,
        &options,
        &mut BuffersBuilder::new(&mut geometry, |vertex: FillVertex| {
            vertex.position().to_array()
        }),
    );

    if let Err(e) = result {
        tracing::warn!("Path fill tessellation failed: {:?}", e);
        return Mesh::default();
    }

    Mesh {
        vertices: geometry.vertices,
        indices: geometry.indices,
    }
}

/// Tessellate the outline of a path, applying the stroke's dash pattern
pub fn tessellate_stroke(path: &Path, stroke: &Stroke, tolerance: f32) -> Mesh {
    if path.is_empty() {
        return Mesh::default();
    }
    let lyon_path = match &stroke.dash {
        Some(dash) => {
            let dashed = apply_dash(&flatten(path, tolerance), dash);
            polylines_to_lyon(&dashed)
        }
        None => to_lyon_path(path),
    };

    let mut geometry: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
    let mut tessellator = StrokeTessellator::new();

    let options = StrokeOptions::default()
        .with_line_width(stroke.width)
        .with_tolerance(tolerance)
        .with_line_cap(match stroke.cap {
            LineCap::Butt => lyon::lyon_tessellation::LineCap::Butt,
            LineCap::Round => lyon::lyon_tessellation::LineCap::Round,
            LineCap::Square => lyon::lyon_tessellation::LineCap::Square,
        })
        .with_line_join(match stroke.join {
            LineJoin::Miter => lyon::lyon_tessellation::LineJoin::Miter,
            LineJoin::Round => lyon::lyon_tessellation::LineJoin::Round,
            LineJoin::Bevel => lyon::lyon_tessellation::LineJoin::Bevel,
        })
        .with_miter_limit(stroke.miter_limit.max(1.0));

    let result = tessellator.tessellate_path(
        &lyon_path,
        &options,
        &mut BuffersBuilder::new(&mut geometry, |vertex: StrokeVertex| {
            vertex.position().to_array()
        }),
    );

    if let Err(e) = result {
        tracing::warn!("Path stroke tessellation failed: {:?}", e);
        return Mesh::default();
    }

    Mesh {
        vertices: geometry.vertices,
        indices: geometry.indices,
    }
}

fn polylines_to_lyon(polylines: &[Polyline]) -> lyon::path::Path {
    let mut builder = lyon::path::Path::builder();
    for line in polylines {
        let Some((first, rest)) = line.points.split_first() else {
            continue;
        };
        builder.begin(point(first[0], first[1]));
        for p in rest {
            builder.line_to(point(p[0], p[1]));
        }
        builder.end(line.closed);
    }
    builder.build()
}

/// Split polylines into the "on" runs of `dash`
///
/// The pattern restarts at every subpath, offset by the phase.
pub fn apply_dash(polylines: &[Polyline], dash: &Dash) -> Vec<Polyline> {
    let mut pattern: Vec<f32> = dash.array.iter().map(|v| v.max(0.0)).collect();
    if pattern.len() % 2 == 1 {
        pattern.extend_from_within(..);
    }
    let period: f32 = pattern.iter().sum();
    if pattern.is_empty() || period <= 0.0 {
        return polylines.to_vec();
    }
    // zero-length segments would stall the walk below
    if pattern.iter().step_by(2).all(|&on| on <= 0.0) {
        return Vec::new();
    }

    let mut out = Vec::new();
    for line in polylines {
        if line.points.len() < 2 {
            continue;
        }
        let mut points = line.points.clone();
        if line.closed {
            if let Some(&first) = line.points.first() {
                points.push(first);
            }
        }

        // locate the phase inside the pattern
        let mut index = 0;
        let mut remaining = pattern[0];
        let mut skip = dash.phase.rem_euclid(period);
        while skip > 0.0 {
            if skip >= remaining {
                skip -= remaining;
                index = (index + 1) % pattern.len();
                remaining = pattern[index];
            } else {
                remaining -= skip;
                skip = 0.0;
            }
        }

        let mut run: Vec<[f32; 2]> = Vec::new();
        if index % 2 == 0 {
            run.push(points[0]);
        }
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let length = ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt();
            let mut travelled = 0.0;
            while length - travelled > remaining {
                travelled += remaining;
                let t = travelled / length;
                let p = [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t];
                if index % 2 == 0 {
                    run.push(p);
                    if run.len() > 1 {
                        out.push(Polyline {
                            points: std::mem::take(&mut run),
                            closed: false,
                        });
                    }
                    run.clear();
                } else {
                    run = vec![p];
                }
                index = (index + 1) % pattern.len();
                remaining = pattern[index];
            }
            remaining -= length - travelled;
            if index % 2 == 0 {
                run.push(b);
            }
        }
        if index % 2 == 0 && run.len() > 1 {
            out.push(Polyline {
                points: run,
                closed: false,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use glaze_core::{Point, Rect};

    #[test]
    fn test_tessellate_rect() {
        let path = Path::rect(Rect::new(0.0, 0.0, 100.0, 100.0));
        let result = tessellate_fill(&path, 0.1);

        assert!(!result.is_empty());
        assert_eq!(result.triangles().len() % 3, 0);
    }

    #[test]
    fn test_tessellate_ellipse() {
        let path = Path::ellipse(Rect::new(0.0, 0.0, 50.0, 50.0));
        assert!(!tessellate_fill(&path, 0.1).is_empty());
    }

    #[test]
    fn test_tessellate_stroke() {
        let path = Path::line(Point::new(0.0, 0.0), Point::new(100.0, 100.0));
        let result = tessellate_stroke(&path, &Stroke::new(3.0), 0.1);

        assert!(!result.is_empty());
    }

    #[test]
    fn test_flatten_closed_polygon() {
        let path = Path::polygon(&[Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)]);
        let lines = flatten(&path, 0.1);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].closed);
        assert_eq!(lines[0].points.len(), 3);
    }

    #[test]
    fn test_dash_splits_line() {
        let line = Polyline {
            points: vec![[0.0, 0.0], [20.0, 0.0]],
            closed: false,
        };
        let dashed = apply_dash(&[line], &Dash::new(&[5.0, 5.0], 0.0));
        assert_eq!(dashed.len(), 2);
        assert_eq!(dashed[0].points, vec![[0.0, 0.0], [5.0, 0.0]]);
        assert_eq!(dashed[1].points, vec![[10.0, 0.0], [15.0, 0.0]]);
    }

    #[test]
    fn test_dash_phase_offsets_start() {
        let line = Polyline {
            points: vec![[0.0, 0.0], [10.0, 0.0]],
            closed: false,
        };
        let dashed = apply_dash(&[line], &Dash::new(&[4.0, 4.0], 6.0));
        // phase 6 starts two units into the gap
        let first = &dashed[0].points;
        assert_eq!(first.len(), 2);
        assert!((first[0][0] - 2.0).abs() < 1e-4);
        assert!((first[1][0] - 6.0).abs() < 1e-4);
    }
}
