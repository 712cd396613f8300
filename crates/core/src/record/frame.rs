use std::{fmt, io::Cursor};

use async_trait::async_trait;
use image::{imageops, ImageFormat, RgbaImage};

use crate::{render::GradientSpec, CueCaptureError, Result};

/// One encoded frame, named so that lexical order matches frame order.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: u64,
    pub bitmap: Vec<u8>,
    pub filename: String,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("index", &self.index)
            .field("filename", &self.filename)
            .field("bytes", &self.bitmap.len())
            .finish()
    }
}

pub fn frame_filename(prefix: &str, index: u64, extension: &str) -> String {
    format!("{prefix}_{index:05}.{extension}")
}

/// Turns a rendered surface into image bytes. Encoding may suspend.
#[async_trait(?Send)]
pub trait FrameEncoder {
    /// File extension of the produced bitmaps.
    fn extension(&self) -> &str;

    async fn encode(&self, image: RgbaImage) -> Result<Vec<u8>>;
}

/// PNG encoder that runs the compression on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngEncoder;

#[async_trait(?Send)]
impl FrameEncoder for PngEncoder {
    fn extension(&self) -> &str {
        "png"
    }

    async fn encode(&self, image: RgbaImage) -> Result<Vec<u8>> {
        if image.width() == 0 || image.height() == 0 {
            return Err(CueCaptureError::Encoding("surface is empty".to_string()));
        }

        let bytes = tokio::task::spawn_blocking(move || encode_png(&image)).await??;
        if bytes.is_empty() {
            return Err(CueCaptureError::Encoding("encoder produced no bytes".to_string()));
        }
        Ok(bytes)
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| CueCaptureError::Encoding(err.to_string()))?;
    Ok(bytes)
}

/// Draws `surface` over a copy of `layer`, keeping the surface's alpha.
fn composite(layer: &RgbaImage, surface: &RgbaImage) -> RgbaImage {
    let mut composite = layer.clone();
    imageops::overlay(&mut composite, surface, 0, 0);
    composite
}

#[derive(Debug)]
struct Background {
    spec: GradientSpec,
    cached: Option<RgbaImage>,
}

impl Background {
    fn layer(&mut self, width: u32, height: u32) -> Result<&RgbaImage> {
        let stale = self
            .cached
            .as_ref()
            .map(|image| image.dimensions() != (width, height))
            .unwrap_or(true);
        if stale {
            self.cached = Some(self.spec.render(width, height)?);
        }
        self.cached
            .as_ref()
            .ok_or_else(|| CueCaptureError::msg("background layer missing"))
    }
}

/// Snapshots a renderer surface into a [`Frame`], optionally over a
/// generated background.
#[derive(Debug)]
pub struct FrameCapture<E> {
    prefix: String,
    background: Option<Background>,
    encoder: E,
}

impl<E: FrameEncoder> FrameCapture<E> {
    pub fn new(prefix: impl Into<String>, background: Option<GradientSpec>, encoder: E) -> Self {
        Self {
            prefix: prefix.into(),
            background: background.map(|spec| Background { spec, cached: None }),
            encoder,
        }
    }

    pub fn extension(&self) -> &str {
        self.encoder.extension()
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub async fn capture_frame(&mut self, surface: &RgbaImage, index: u64) -> Result<Frame> {
        let image = match self.background.as_mut() {
            None => surface.clone(),
            Some(background) => {
                composite(background.layer(surface.width(), surface.height())?, surface)
            }
        };

        let bitmap = self.encoder.encode(image).await?;
        Ok(Frame {
            index,
            bitmap,
            filename: frame_filename(&self.prefix, index, self.encoder.extension()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::GradientStop;
    use image::Rgba;

    fn solid_gradient(color: &str) -> GradientSpec {
        GradientSpec {
            angle_degrees: 0.0,
            stops: vec![GradientStop {
                color: color.to_string(),
                position: None,
            }],
        }
    }

    #[test]
    fn filenames_are_zero_padded() {
        assert_eq!(frame_filename("StringsNo2", 42, "png"), "StringsNo2_00042.png");
        assert_eq!(frame_filename("x", 123_456, "png"), "x_123456.png");
    }

    #[tokio::test]
    async fn png_frames_decode_back() {
        let surface = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        let mut capture = FrameCapture::new("cap", None, PngEncoder);

        let frame = capture.capture_frame(&surface, 7).await.unwrap();
        assert_eq!(frame.index, 7);
        assert_eq!(frame.filename, "cap_00007.png");

        let decoded = image::load_from_memory(&frame.bitmap).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }

    #[tokio::test]
    async fn empty_surface_is_an_encoding_error() {
        let mut capture = FrameCapture::new("cap", None, PngEncoder);
        let err = capture
            .capture_frame(&RgbaImage::new(0, 0), 0)
            .await
            .unwrap_err();
        assert!(err.is_encoding());
    }

    #[tokio::test]
    async fn transparent_pixels_show_the_background() {
        let mut surface = RgbaImage::new(2, 1);
        surface.put_pixel(1, 0, Rgba([255, 255, 255, 255]));
        let mut capture = FrameCapture::new("cap", Some(solid_gradient("#ff0000")), PngEncoder);

        let frame = capture.capture_frame(&surface, 0).await.unwrap();
        let decoded = image::load_from_memory(&frame.bitmap).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(decoded.get_pixel(1, 0).0, [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn background_follows_surface_size() {
        let mut capture = FrameCapture::new("cap", Some(solid_gradient("#00ff00")), PngEncoder);

        for (width, height) in [(4, 4), (6, 3)] {
            let frame = capture
                .capture_frame(&RgbaImage::new(width, height), 0)
                .await
                .unwrap();
            let decoded = image::load_from_memory(&frame.bitmap).unwrap().to_rgba8();
            assert_eq!(decoded.dimensions(), (width, height));
            assert_eq!(decoded.get_pixel(width - 1, height - 1).0, [0, 255, 0, 255]);
        }
    }
}
