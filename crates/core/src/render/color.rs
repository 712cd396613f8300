use image::Rgba;

use crate::{scene::BlendMode, CueCaptureError, Result};

/// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
pub fn parse_hex_color(value: &str) -> Result<[u8; 4]> {
    let hex = value.trim().trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        hex.get(range)
            .and_then(|digits| u8::from_str_radix(digits, 16).ok())
            .ok_or_else(|| CueCaptureError::msg(format!("invalid hex color `{value}`")))
    };

    match hex.len() {
        3 => {
            let r = channel(0..1)?;
            let g = channel(1..2)?;
            let b = channel(2..3)?;
            Ok([r * 17, g * 17, b * 17, 255])
        }
        6 => Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255]),
        8 => Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?, channel(6..8)?]),
        _ => Err(CueCaptureError::msg(format!("invalid hex color `{value}`"))),
    }
}

/// HSB to RGBA. Hue in degrees, saturation and brightness in `0..=1`.
pub fn hsb_to_rgba(hue: f32, saturation: f32, brightness: f32, alpha: u8) -> [u8; 4] {
    let hue = hue.rem_euclid(360.0) / 60.0;
    let chroma = brightness * saturation;
    let x = chroma * (1.0 - (hue % 2.0 - 1.0).abs());
    let (r, g, b) = match hue as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = brightness - chroma;
    let to_byte = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [to_byte(r), to_byte(g), to_byte(b), alpha]
}

pub fn lerp_rgba(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let mut out = [0; 4];
    for (i, channel) in out.iter_mut().enumerate() {
        *channel = (a[i] as f32 + (b[i] as f32 - a[i] as f32) * t).round() as u8;
    }
    out
}

/// Blends a straight-alpha `src` color onto `dst`.
pub fn blend_pixel(dst: &mut Rgba<u8>, src: [u8; 4], mode: BlendMode) {
    let alpha = src[3] as f32 / 255.0;
    for i in 0..3 {
        let d = dst[i] as f32;
        let s = src[i] as f32;
        let target = match mode {
            BlendMode::Normal => s,
            BlendMode::Screen => 255.0 - (255.0 - s) * (255.0 - d) / 255.0,
        };
        dst[i] = (d + (target - d) * alpha).round() as u8;
    }
    let dst_alpha = dst[3] as f32 / 255.0;
    dst[3] = ((alpha + dst_alpha * (1.0 - alpha)) * 255.0).round() as u8;
}
