use anyhow::{Context, Result};
use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};

use super::Grid;

/// Map samples onto [0, 255], min to black and max to white.
fn normalize_to_u8(data: &[f32]) -> Vec<u8> {
    let min_val = data.iter().cloned().fold(f32::INFINITY, f32::min);
    let max_val = data.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let range = max_val - min_val;
    if !range.is_finite() || range < 1e-8 {
        return vec![0u8; data.len()];
    }
    data.iter()
        .map(|&v| ((v - min_val) / range * 255.0).round() as u8)
        .collect()
}

/// Grayscale PNG, one pixel per sample (width = columns).
pub fn encode_png(grid: &Grid) -> Result<Vec<u8>> {
    let pixels = normalize_to_u8(grid.data());
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            &pixels,
            grid.cols() as u32,
            grid.rows() as u32,
            ColorType::L8,
        )
        .context("failed to encode PNG")?;
    Ok(out)
}
