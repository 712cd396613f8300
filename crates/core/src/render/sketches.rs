use std::fmt;

use image::{Rgba, RgbaImage};
use vello_cpu::{
    kurbo::{BezPath, Stroke},
    peniko::Color,
    Pixmap, RenderContext,
};

use super::{
    color::{blend_pixel, lerp_rgba},
    Renderer,
};
use crate::{scene::BlendMode, AnimationState, CueCaptureError, Result};

const LOOP_STEPS: u32 = 720;
const Z_STEP: f32 = 0.005;
const RADIUS_GAIN: f32 = 1.5;
const FADE_AMOUNT: f32 = 0.5;
const CIRCLE_DIAMETER: f32 = 100.0;
const STROKE_WIDTH: f64 = 1.0;

/// Static black disc on white.
pub struct CircleRenderer {
    surface: RgbaImage,
}

impl CircleRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: RgbaImage::new(width, height),
        }
    }
}

impl Renderer for CircleRenderer {
    fn render(&mut self, state: &mut AnimationState) -> Result<()> {
        let (cx, cy) = (state.width as f32 / 2.0, state.height as f32 / 2.0);
        let radius_sq = (CIRCLE_DIAMETER / 2.0).powi(2);

        for (x, y, pixel) in self.surface.enumerate_pixels_mut() {
            let (dx, dy) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
            *pixel = if dx * dx + dy * dy <= radius_sq {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            };
        }
        Ok(())
    }

    fn surface(&self) -> &RgbaImage {
        &self.surface
    }
}

impl fmt::Debug for CircleRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircleRenderer")
            .field("size", &self.surface.dimensions())
            .finish()
    }
}

/// Noise-deformed closed loop stroked over an accumulating canvas. Nothing is
/// cleared between frames; cues fade the canvas instead.
///
/// Each frame's loop is rasterized into a coverage layer and then blended
/// onto the canvas with the state's blend mode.
pub struct StringsRenderer {
    surface: RgbaImage,
    strokes: Pixmap,
    size: (u16, u16),
    points: Vec<(f32, f32)>,
}

impl StringsRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let (Ok(w), Ok(h)) = (u16::try_from(width), u16::try_from(height)) else {
            return Err(CueCaptureError::InvalidInput(
                "strings surface is limited to 65535 pixels per side",
            ));
        };
        if w == 0 || h == 0 {
            return Err(CueCaptureError::InvalidInput("surface dimensions must be positive"));
        }

        Ok(Self {
            surface: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
            strokes: Pixmap::new(w, h),
            size: (w, h),
            points: Vec::with_capacity(LOOP_STEPS as usize),
        })
    }

    fn fade(&mut self) {
        for pixel in self.surface.pixels_mut() {
            blend_pixel(pixel, [0, 0, 0, (FADE_AMOUNT * 255.0) as u8], BlendMode::Normal);
        }
    }

    fn trace_loop(&mut self, state: &AnimationState) {
        let scale = 1.0 / state.scale_multiplier;
        let max_radius = state.height as f32 * RADIUS_GAIN;
        let (ox, oy) = state.origin;

        self.points.clear();
        for step in 0..LOOP_STEPS {
            let (sin, cos) = (step as f32).to_radians().sin_cos();
            let xoff = (cos + 1.0) / 2.0 * state.noise_max;
            let yoff = (sin + 1.0) / 2.0 * state.noise_max;
            let radius = value_noise(xoff, yoff, state.z_offset) * max_radius;
            self.points
                .push((ox + radius * cos * scale, oy + radius * sin * scale));
        }
    }

    fn loop_path(&self) -> Option<BezPath> {
        let mut points = self.points.iter();
        let &(x, y) = points.next()?;

        let mut path = BezPath::new();
        path.move_to((f64::from(x), f64::from(y)));
        for &(x, y) in points {
            path.line_to((f64::from(x), f64::from(y)));
        }
        path.close_path();
        Some(path)
    }

    fn stroke(&mut self, color: [u8; 4], mode: BlendMode) {
        let Some(path) = self.loop_path() else {
            return;
        };

        clear_pixmap(&mut self.strokes);
        let mut ctx = RenderContext::new(self.size.0, self.size.1);
        ctx.set_stroke(Stroke::new(STROKE_WIDTH));
        ctx.set_paint(Color::from_rgba8(255, 255, 255, 255));
        ctx.stroke_path(&path);
        ctx.flush();
        ctx.render_to_pixmap(&mut self.strokes);

        // only the coverage (alpha) of the layer is used, the color is ours
        let coverage = self.strokes.data_as_u8_slice().chunks_exact(4);
        for (pixel, texel) in self.surface.pixels_mut().zip(coverage) {
            let covered = texel[3];
            if covered == 0 {
                continue;
            }
            let alpha = (u16::from(covered) * u16::from(color[3]) / 255) as u8;
            blend_pixel(pixel, [color[0], color[1], color[2], alpha], mode);
        }
    }
}

impl Renderer for StringsRenderer {
    fn render(&mut self, state: &mut AnimationState) -> Result<()> {
        if state.fade_pending {
            self.fade();
            state.fade_pending = false;
        }

        let mix = (state.z_offset * 100.0).to_radians().sin().abs();
        let color = lerp_rgba(state.color_a, state.color_b, mix);

        self.trace_loop(state);
        self.stroke(color, state.blend);

        state.z_offset += Z_STEP;
        Ok(())
    }

    fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    fn reset(&mut self) {
        for pixel in self.surface.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 255]);
        }
    }
}

impl fmt::Debug for StringsRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringsRenderer")
            .field("size", &self.surface.dimensions())
            .finish()
    }
}

fn clear_pixmap(pixmap: &mut Pixmap) {
    pixmap.data_as_u8_slice_mut().fill(0);
}

/// Smooth 3D value noise in `0..=1`.
fn value_noise(x: f32, y: f32, z: f32) -> f32 {
    let (xi, yi, zi) = (x.floor(), y.floor(), z.floor());
    let (xf, yf, zf) = (smooth(x - xi), smooth(y - yi), smooth(z - zi));
    let (xi, yi, zi) = (xi as i32, yi as i32, zi as i32);

    let corner = |dx: i32, dy: i32, dz: i32| lattice(xi + dx, yi + dy, zi + dz);
    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

    let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), xf);
    let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), xf);
    let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), xf);
    let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), xf);
    lerp(lerp(x00, x10, yf), lerp(x01, x11, yf), zf)
}

fn smooth(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

fn lattice(x: i32, y: i32, z: i32) -> f32 {
    let mut h = (x as u32).wrapping_mul(0x8da6_b343)
        ^ (y as u32).wrapping_mul(0xd816_3841)
        ^ (z as u32).wrapping_mul(0xcb1a_b31f);
    h ^= h >> 13;
    h = h.wrapping_mul(0x5bd1_e995);
    h ^= h >> 15;
    (h & 0xffff) as f32 / 65_535.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_stays_in_unit_range() {
        for i in 0..200 {
            let v = value_noise(i as f32 * 0.37, i as f32 * 0.11, i as f32 * 0.005);
            assert!((0.0..=1.0).contains(&v));
        }
        assert_eq!(value_noise(0.3, 0.4, 0.5), value_noise(0.3, 0.4, 0.5));
    }

    #[test]
    fn strings_render_draws_and_advances_noise() {
        let mut state = AnimationState::new(64, 64, 3);
        let mut renderer = StringsRenderer::new(64, 64).unwrap();
        renderer.render(&mut state).unwrap();

        assert!((state.z_offset - Z_STEP).abs() < 1e-6);
        assert!(renderer.surface().pixels().any(|p| p.0 != [0, 0, 0, 255]));
    }

    #[test]
    fn reset_clears_accumulated_strokes() {
        let mut state = AnimationState::new(32, 32, 3);
        let mut renderer = StringsRenderer::new(32, 32).unwrap();
        renderer.render(&mut state).unwrap();
        renderer.reset();
        assert!(renderer.surface().pixels().all(|p| p.0 == [0, 0, 0, 255]));
    }

    #[test]
    fn pending_fade_is_consumed() {
        let mut state = AnimationState::new(16, 16, 3);
        let mut renderer = StringsRenderer::new(16, 16).unwrap();
        state.fade_pending = true;
        renderer.render(&mut state).unwrap();
        assert!(!state.fade_pending);
    }

    #[test]
    fn screen_blend_only_brightens() {
        let mut state = AnimationState::new(48, 48, 5);
        let mut renderer = StringsRenderer::new(48, 48).unwrap();
        renderer.render(&mut state).unwrap();
        let before = renderer.surface().clone();

        state.blend = BlendMode::Screen;
        renderer.render(&mut state).unwrap();
        for (old, new) in before.pixels().zip(renderer.surface().pixels()) {
            assert!((0..3).all(|i| new[i] >= old[i]));
        }
    }

    #[test]
    fn rejects_surfaces_the_rasterizer_cannot_hold() {
        assert!(StringsRenderer::new(70_000, 10).is_err());
        assert!(StringsRenderer::new(0, 10).is_err());
    }

    #[test]
    fn circle_sits_in_the_middle() {
        let mut state = AnimationState::new(200, 200, 0);
        let mut renderer = CircleRenderer::new(200, 200);
        renderer.render(&mut state).unwrap();

        assert_eq!(renderer.surface().get_pixel(100, 100).0, [0, 0, 0, 255]);
        assert_eq!(renderer.surface().get_pixel(5, 5).0, [255, 255, 255, 255]);
    }
}
