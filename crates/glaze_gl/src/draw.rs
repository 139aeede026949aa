//! Primitive submission for fills, strokes, text and clears
//!
//! Every routine here runs against an already validated target: the native
//! state matches the target's pieces on entry, and any piece a routine
//! perturbs is re-applied before it returns.

use crate::composite::translate;
use crate::error::Result;
use crate::gl::{Capability, PrimitiveMode, StateCall};
use crate::glyph::{strike_key, GlyphRequest, StrikeKey};
use crate::runtime::Frame;
use crate::state::{apply_blend, StatePiece};
use crate::stipple::dash_to_stipple;
use crate::tessellate::{flatten, tessellate_fill, tessellate_stroke};
use glaze_core::{Affine2D, GlyphProvider, Paint, Path, Point, PositionedGlyph, Rect};

/// Submit user-space vertices with the current paint
///
/// Custom paints are sampled at every vertex and carried as vertex colors.
fn submit(frame: &mut Frame<'_>, mode: PrimitiveMode, vertices: &[[f32; 2]]) {
    if vertices.is_empty() {
        return;
    }
    frame.invalidate_readback();
    let colors: Option<Vec<[f32; 4]>> = match &frame.state.paint {
        Paint::Custom(custom) => {
            let alpha = frame.state.composite.alpha;
            Some(
                vertices
                    .iter()
                    .map(|v| {
                        let c = custom.sample(Point::new(v[0], v[1]));
                        c.with_alpha(c.a * alpha).premultiplied()
                    })
                    .collect(),
            )
        }
        _ => None,
    };
    frame
        .manager
        .gl()
        .draw(mode, vertices, None, colors.as_deref());
}

pub(crate) fn fill_rect(frame: &mut Frame<'_>, rect: Rect) -> Result<()> {
    if rect.is_empty() {
        return Ok(());
    }
    let corners = rect.corners().map(|p| [p.x, p.y]);
    submit(frame, PrimitiveMode::Quads, &corners);
    Ok(())
}

pub(crate) fn fill_path(frame: &mut Frame<'_>, path: &Path) -> Result<()> {
    let mesh = tessellate_fill(path, frame.tolerance());
    if !mesh.is_empty() {
        submit(frame, PrimitiveMode::Triangles, &mesh.triangles());
    }
    Ok(())
}

/// Whether the native line rasterizer can draw the current stroke
fn native_stroke(frame: &Frame<'_>) -> bool {
    let state = &*frame.state;
    state.stroke.is_thin()
        && state
            .stroke
            .dash
            .as_ref()
            .map_or(true, |dash| dash_to_stipple(dash).is_some())
        && state.transform.has_unit_scale()
        && state.paint.is_native()
}

/// Stroke `path` with native lines when possible, as a tessellated outline otherwise
pub(crate) fn stroke_path(frame: &mut Frame<'_>, path: &Path) -> Result<()> {
    let tolerance = frame.tolerance();
    if native_stroke(frame) {
        for line in flatten(path, tolerance) {
            // line vertices sit on pixel centers
            let points: Vec<[f32; 2]> = line.points.iter().map(|p| [p[0] + 0.5, p[1] + 0.5]).collect();
            let mode = if line.closed {
                PrimitiveMode::LineLoop
            } else {
                PrimitiveMode::LineStrip
            };
            submit(frame, mode, &points);
        }
        return Ok(());
    }
    let mesh = tessellate_stroke(path, &frame.state.stroke, tolerance);
    if !mesh.is_empty() {
        submit(frame, PrimitiveMode::Triangles, &mesh.triangles());
    }
    Ok(())
}

/// Fill with the background color, bypassing paint, composite and XOR mode
pub(crate) fn clear_rect(frame: &mut Frame<'_>, rect: Rect) -> Result<()> {
    if rect.is_empty() {
        return Ok(());
    }
    frame.invalidate_readback();
    let background = frame.state.background.premultiplied();
    let gl = frame.manager.gl();
    for cap in [
        Capability::Blend,
        Capability::ColorLogicOp,
        Capability::TexGenS,
        Capability::TexGenT,
        Capability::Texture1D,
        Capability::Texture2D,
    ] {
        gl.apply(StateCall::Disable(cap));
    }
    gl.apply(StateCall::Color(background));
    let corners = rect.corners().map(|p| [p.x, p.y]);
    gl.draw(PrimitiveMode::Quads, &corners, None, None);
    frame.restore(&[StatePiece::Color, StatePiece::Composite, StatePiece::Paint])
}

/// Draw positioned glyphs with the target's font
///
/// Flat paints go through the glyph cache's display lists; other paints, XOR
/// mode and singular transforms fill the glyph outlines instead.
pub(crate) fn draw_glyphs(
    frame: &mut Frame<'_>,
    glyphs: &[PositionedGlyph],
    x: f32,
    y: f32,
) -> Result<()> {
    let Some(font) = frame.state.font.clone() else {
        return Ok(());
    };
    let transform = frame.state.transform;
    let cached = frame.state.flat_color().is_some()
        && frame.state.xor_color.is_none()
        && transform.inverse().is_some();

    if !cached {
        let mut outlines = Path::new();
        for glyph in glyphs {
            if let Some(outline) = font.glyph_outline(glyph.ch) {
                let at = Affine2D::translation(x + glyph.offset.x, y + glyph.offset.y);
                outlines.append(&outline.transformed(&at));
            }
        }
        return fill_path(frame, &outlines);
    }

    frame.invalidate_readback();
    let scale = transform.max_scale();
    let strike = strike_key(
        font.font_id(),
        scale,
        &frame.state.paint,
        frame.config.text_antialiasing,
    );
    let blend = translate(frame.state.composite, true, true).blend;
    let color = frame.state.draw_color();
    {
        let gl = frame.manager.gl();
        for cap in [Capability::TexGenS, Capability::TexGenT, Capability::Texture1D] {
            gl.apply(StateCall::Disable(cap));
        }
        apply_blend(gl, blend);
        gl.apply(StateCall::Color(color));
    }

    let drawn = call_glyph_lists(frame, font.as_ref(), strike, scale, glyphs, (x, y));
    frame.restore(&[StatePiece::Transform, StatePiece::Composite, StatePiece::Paint])?;
    drawn
}

fn call_glyph_lists(
    frame: &mut Frame<'_>,
    font: &dyn GlyphProvider,
    strike: StrikeKey,
    scale: f32,
    glyphs: &[PositionedGlyph],
    (x, y): (f32, f32),
) -> Result<()> {
    let transform = frame.state.transform;
    for glyph in glyphs {
        let request = GlyphRequest {
            font,
            strike,
            ch: glyph.ch,
            scale,
            antialias: frame.config.text_antialiasing,
            npot: frame.config.npot_textures,
            cleanup: frame.config.cleanup_after_insert,
        };
        let gl = frame.manager.gl();
        let Some(list) = frame.glyphs.glyph(gl, frame.textures, &request)? else {
            continue;
        };
        let at = transform.then(&Affine2D::translation(
            x + glyph.offset.x,
            y + glyph.offset.y,
        ));
        gl.apply(StateCall::Enable(Capability::Texture2D));
        gl.apply(StateCall::LoadModelview(at.to_matrix4()));
        gl.call_list(list);
    }
    Ok(())
}
