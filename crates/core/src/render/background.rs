use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use super::color::{lerp_rgba, parse_hex_color};
use crate::{CueCaptureError, Result};

/// Declarative linear gradient, angled the way CSS angles gradients:
/// `0` points up, `90` points right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientSpec {
    #[serde(default = "default_angle")]
    pub angle_degrees: f32,
    pub stops: Vec<GradientStop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub color: String,
    /// Offset along the gradient line in `0..=1`. Missing offsets are spread
    /// evenly.
    #[serde(default)]
    pub position: Option<f32>,
}

fn default_angle() -> f32 {
    180.0
}

impl Default for GradientSpec {
    fn default() -> Self {
        Self {
            angle_degrees: 135.0,
            stops: vec![
                GradientStop {
                    color: "#1d2b64".to_string(),
                    position: None,
                },
                GradientStop {
                    color: "#f8cdda".to_string(),
                    position: None,
                },
            ],
        }
    }
}

impl GradientSpec {
    /// Rasterizes the gradient into a `width` x `height` image.
    pub fn render(&self, width: u32, height: u32) -> Result<RgbaImage> {
        let stops = self.resolve_stops()?;

        let angle = self.angle_degrees.to_radians();
        let (dx, dy) = (angle.sin(), -angle.cos());
        let (w, h) = (width as f32, height as f32);
        let line_length = (w * dx).abs() + (h * dy).abs();

        Ok(RgbaImage::from_fn(width, height, |x, y| {
            let px = x as f32 + 0.5 - w / 2.0;
            let py = y as f32 + 0.5 - h / 2.0;
            let t = if line_length > f32::EPSILON {
                (px * dx + py * dy) / line_length + 0.5
            } else {
                0.0
            };
            Rgba(sample(&stops, t))
        }))
    }

    fn resolve_stops(&self) -> Result<Vec<(f32, [u8; 4])>> {
        if self.stops.is_empty() {
            return Err(CueCaptureError::InvalidInput(
                "a gradient needs at least one color stop",
            ));
        }

        let last = (self.stops.len() - 1).max(1) as f32;
        let mut resolved = self
            .stops
            .iter()
            .enumerate()
            .map(|(i, stop)| {
                let position = stop.position.unwrap_or(i as f32 / last).clamp(0.0, 1.0);
                Ok((position, parse_hex_color(&stop.color)?))
            })
            .collect::<Result<Vec<_>>>()?;
        resolved.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(resolved)
    }
}

fn sample(stops: &[(f32, [u8; 4])], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let (first, last) = (stops[0], stops[stops.len() - 1]);
    if t <= first.0 {
        return first.1;
    }
    if t >= last.0 {
        return last.1;
    }

    for pair in stops.windows(2) {
        let ((start, from), (end, to)) = (pair[0], pair[1]);
        if t <= end {
            let span = end - start;
            let local = if span > f32::EPSILON { (t - start) / span } else { 1.0 };
            return lerp_rgba(from, to, local);
        }
    }
    last.1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(angle: f32, colors: &[&str]) -> GradientSpec {
        GradientSpec {
            angle_degrees: angle,
            stops: colors
                .iter()
                .map(|color| GradientStop {
                    color: color.to_string(),
                    position: None,
                })
                .collect(),
        }
    }

    #[test]
    fn horizontal_gradient_runs_left_to_right() {
        let image = spec(90.0, &["#000000", "#ffffff"]).render(100, 4).unwrap();
        let left = image.get_pixel(0, 2)[0];
        let middle = image.get_pixel(50, 2)[0];
        let right = image.get_pixel(99, 2)[0];

        assert!(left < 10);
        assert!((120..=136).contains(&middle));
        assert!(right > 245);
    }

    #[test]
    fn default_angle_runs_top_to_bottom() {
        let parsed: GradientSpec =
            serde_json::from_str(r##"{ "stops": [{ "color": "#ff0000" }, { "color": "#0000ff" }] }"##)
                .unwrap();
        let image = parsed.render(4, 50).unwrap();
        assert!(image.get_pixel(1, 0)[0] > 240);
        assert!(image.get_pixel(1, 49)[2] > 240);
    }

    #[test]
    fn single_stop_is_solid() {
        let image = spec(45.0, &["#336699"]).render(3, 3).unwrap();
        assert!(image.pixels().all(|p| p.0 == [0x33, 0x66, 0x99, 255]));
    }

    #[test]
    fn rejects_empty_or_bad_stops() {
        assert!(spec(0.0, &[]).render(2, 2).is_err());
        assert!(spec(0.0, &["#nothex"]).render(2, 2).is_err());
    }
}
