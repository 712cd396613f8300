use std::fmt;

use image::RgbaImage;

use crate::{scene::SketchKind, AnimationState, Result};

mod background;
pub mod color;
mod sketches;

pub use background::{GradientSpec, GradientStop};
pub use sketches::{CircleRenderer, StringsRenderer};

/// Rendering backend abstraction. A renderer owns its drawing surface and
/// draws one frame per call from the current animation state.
pub trait Renderer: fmt::Debug {
    fn render(&mut self, state: &mut AnimationState) -> Result<()>;

    fn surface(&self) -> &RgbaImage;

    /// Clears whatever the renderer accumulated across frames.
    fn reset(&mut self) {}
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&mut self, state: &mut AnimationState) -> Result<()> {
        (**self).render(state)
    }

    fn surface(&self) -> &RgbaImage {
        (**self).surface()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Maps a sketch tag to its drawing routine.
pub fn build_renderer(kind: SketchKind, width: u32, height: u32) -> Result<Box<dyn Renderer>> {
    let renderer: Box<dyn Renderer> = match kind {
        SketchKind::Circle => Box::new(CircleRenderer::new(width, height)),
        SketchKind::Strings => Box::new(StringsRenderer::new(width, height)?),
    };
    Ok(renderer)
}
