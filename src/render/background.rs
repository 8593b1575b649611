// ticket-forge: canvas colors and background images

use std::io::Read;

use ::image::{DynamicImage, Rgb, RgbImage, Rgba};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::debug;

use crate::error::RenderError;

/// Parse `#rrggbb` or `#rgb`.
pub fn parse_hex_color(color: &str) -> Result<[u8; 3], RenderError> {
    let invalid = || RenderError::PdfError(format!("Invalid color: {}", color));
    let hex = color.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match hex.len() {
        6 => Ok([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ]),
        3 => {
            let mut out = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = channel(&c.to_string())?;
                out[i] = v * 17;
            }
            Ok(out)
        }
        _ => Err(invalid()),
    }
}

/// Load a background image from a data URL, an http(s) URL or a file path.
pub fn load_image_source(source: &str) -> Result<DynamicImage, RenderError> {
    let image_bytes = if let Some(data) = source.strip_prefix("data:") {
        let (_, encoded) = data
            .split_once(";base64,")
            .ok_or_else(|| RenderError::BackgroundError("data URL is not base64".to_string()))?;
        STANDARD
            .decode(encoded.trim())
            .map_err(|e| RenderError::BackgroundError(format!("Invalid base64: {}", e)))?
    } else if source.starts_with("http://") || source.starts_with("https://") {
        debug!(url = source, "fetching background image");
        let response = ureq::get(source)
            .call()
            .map_err(|e| RenderError::BackgroundError(format!("Failed to fetch URL: {}", e)))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| RenderError::BackgroundError(format!("Failed to read response: {}", e)))?;
        bytes
    } else {
        std::fs::read(source)
            .map_err(|e| RenderError::BackgroundError(format!("{}: {}", source, e)))?
    };

    ::image::load_from_memory(&image_bytes)
        .map_err(|e| RenderError::BackgroundError(format!("Failed to decode image: {}", e)))
}

/// Build the canvas raster: a solid fill, with the background image (if
/// any) stretched over it and alpha-blended onto the fill color.
pub fn canvas_raster(
    width: u32,
    height: u32,
    color: [u8; 3],
    image: Option<&DynamicImage>,
) -> RgbImage {
    let mut raster = RgbImage::from_pixel(width, height, Rgb(color));
    let Some(image) = image else {
        return raster;
    };

    let scaled = image
        .resize_exact(width, height, ::image::imageops::FilterType::Triangle)
        .to_rgba8();
    for (x, y, pixel) in scaled.enumerate_pixels() {
        let Rgba([r, g, b, a]) = *pixel;
        let alpha = a as f32 / 255.0;
        let blend = |fg: u8, bg: u8| (fg as f32 * alpha + bg as f32 * (1.0 - alpha)) as u8;
        raster.put_pixel(
            x,
            y,
            Rgb([blend(r, color[0]), blend(g, color[1]), blend(b, color[2])]),
        );
    }
    raster
}
