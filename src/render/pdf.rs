// ticket-forge: rasterize a resolved ticket and wrap it in a one-page PDF

use std::io::BufWriter;

use ::image::{imageops, DynamicImage, Luma, RgbImage};
use printpdf::lopdf::Document as LoDocument;
use printpdf::{
    BuiltinFont, Color, ColorBits, ColorSpace, Image, ImageTransform, ImageXObject,
    IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference, Px, Rgb,
};
use qrcode::QrCode;
use tracing::debug;

use super::background::{canvas_raster, load_image_source, parse_hex_color};
use super::GeneratedTicket;
use crate::error::RenderError;
use crate::template::{Canvas, Element, FontWeight, QrElement, TextAlign, TextElement};

// ============================================================================
// Constants
// ============================================================================

/// Canvas units are CSS pixels
const CANVAS_DPI: f32 = 96.0;
const MM_PER_INCH: f32 = 25.4;

/// CSS px to PDF points
const PX_TO_PT: f32 = 0.75;

/// Largest canvas or QR edge accepted, in canvas px
pub const MAX_RASTER_PX: f32 = 10_000.0;

/// Encoding printpdf applies to text drawn in builtin fonts
const BUILTIN_FONT_ENCODING: &str = "WinAnsiEncoding";

/// Average glyph advance as a fraction of the font size, used to place
/// centered and right-aligned text
const AVG_GLYPH_WIDTH: f32 = 0.5;

fn px_to_mm(px: f32) -> f32 {
    px * MM_PER_INCH / CANVAS_DPI
}

// ============================================================================
// Renderer
// ============================================================================

/// Renders tickets that share one canvas. The background (fill color and
/// image) is rasterized once and reused for every ticket.
#[derive(Debug)]
pub struct TicketRenderer {
    canvas: Canvas,
    base: RgbImage,
}

impl TicketRenderer {
    pub fn new(canvas: &Canvas) -> Result<Self, RenderError> {
        let width = raster_extent("canvas width", canvas.width)?;
        let height = raster_extent("canvas height", canvas.height)?;
        let color = parse_hex_color(&canvas.background)?;
        let image = canvas
            .background_image
            .as_deref()
            .map(load_image_source)
            .transpose()?;

        Ok(Self {
            canvas: canvas.clone(),
            base: canvas_raster(width, height, color, image.as_ref()),
        })
    }

    /// Render one ticket to PDF bytes. Tickets resolved from a different
    /// canvas get a background of their own.
    pub fn render(&self, ticket: &GeneratedTicket) -> Result<Vec<u8>, RenderError> {
        if ticket.template.canvas != self.canvas {
            return TicketRenderer::new(&ticket.template.canvas)?.render(ticket);
        }

        check_encodable(ticket)?;
        let raster = self.rasterize(ticket)?;
        let bytes = write_pdf(ticket, &raster)?;
        debug!(ticket_id = %ticket.ticket_id, bytes = bytes.len(), "rendered ticket");
        Ok(bytes)
    }

    /// Background plus QR codes
    fn rasterize(&self, ticket: &GeneratedTicket) -> Result<RgbImage, RenderError> {
        let mut raster = self.base.clone();
        for element in &ticket.template.elements {
            if let Element::QrCode(qr) = element {
                let image = qr_image(qr)?;
                imageops::overlay(&mut raster, &image, qr.x.round() as i64, qr.y.round() as i64);
            }
        }
        Ok(raster)
    }
}

/// Render a single ticket without sharing a background.
pub fn render_ticket(ticket: &GeneratedTicket) -> Result<Vec<u8>, RenderError> {
    TicketRenderer::new(&ticket.template.canvas)?.render(ticket)
}

/// Round a template dimension to whole pixels, rejecting values outside
/// `1..=MAX_RASTER_PX` (NaN included).
fn raster_extent(what: &str, value: f32) -> Result<u32, RenderError> {
    let rounded = value.round();
    if !(1.0..=MAX_RASTER_PX).contains(&rounded) {
        return Err(RenderError::PdfError(format!(
            "{} {} is outside 1..={} px",
            what, value, MAX_RASTER_PX
        )));
    }
    Ok(rounded as u32)
}

/// Builtin fonts only cover WinAnsi; anything else would be dropped from the
/// page without a trace.
fn check_encodable(ticket: &GeneratedTicket) -> Result<(), RenderError> {
    for element in &ticket.template.elements {
        let Element::Text(text) = element else {
            continue;
        };
        if let Some(c) = text.content.chars().find(|&c| !is_win_ansi(c)) {
            return Err(RenderError::RenderFailure {
                attendee_id: ticket.ticket_id.clone(),
                reason: format!(
                    "text {:?} in element {} has {:?}, which builtin PDF fonts cannot encode",
                    text.content, text.id, c
                ),
            });
        }
    }
    Ok(())
}

fn is_win_ansi(c: char) -> bool {
    let mut buf = [0u8; 4];
    !LoDocument::encode_text(Some(BUILTIN_FONT_ENCODING), c.encode_utf8(&mut buf)).is_empty()
}

// ============================================================================
// QR Code Generation
// ============================================================================

fn qr_image(qr: &QrElement) -> Result<RgbImage, RenderError> {
    let code = QrCode::new(qr.content.as_bytes()).map_err(|e| RenderError::QrError(e.to_string()))?;
    let image = code.render::<Luma<u8>>().build();

    let width = raster_extent("QR code width", qr.width)?;
    let height = raster_extent("QR code height", qr.height)?;
    let scaled = imageops::resize(&image, width, height, imageops::FilterType::Nearest);
    Ok(DynamicImage::ImageLuma8(scaled).to_rgb8())
}

// ============================================================================
// PDF Generation
// ============================================================================

fn write_pdf(ticket: &GeneratedTicket, raster: &RgbImage) -> Result<Vec<u8>, RenderError> {
    let (width_px, height_px) = raster.dimensions();
    let page_width = px_to_mm(width_px as f32);
    let page_height = px_to_mm(height_px as f32);

    let (doc, page, layer) = PdfDocument::new(
        format!("Ticket {}", ticket.ticket_id),
        Mm(page_width),
        Mm(page_height),
        "Layer 1",
    );
    let layer = doc.get_page(page).get_layer(layer);

    embed_raster(&layer, raster);

    let mut fonts = FontCache::new(&doc);
    for element in &ticket.template.elements {
        if let Element::Text(text) = element {
            draw_text(&layer, &mut fonts, text, height_px as f32)?;
        }
    }

    let mut writer = BufWriter::new(Vec::new());
    doc.save(&mut writer)
        .map_err(|e| RenderError::PdfError(e.to_string()))?;
    writer
        .into_inner()
        .map_err(|e| RenderError::PdfError(e.to_string()))
}

/// Place the raster at the page origin, scaled so one pixel is one canvas px.
fn embed_raster(layer: &PdfLayerReference, raster: &RgbImage) {
    let (width, height) = raster.dimensions();

    let image = Image::from(ImageXObject {
        width: Px(width as usize),
        height: Px(height as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: false,
        image_data: raster.as_raw().clone(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    });

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(0.0)),
            translate_y: Some(Mm(0.0)),
            dpi: Some(CANVAS_DPI),
            ..Default::default()
        },
    );
}

/// Canvas y grows downward from the element's top edge; PDF y grows upward
/// from the baseline.
fn draw_text(
    layer: &PdfLayerReference,
    fonts: &mut FontCache<'_>,
    text: &TextElement,
    canvas_height: f32,
) -> Result<(), RenderError> {
    if text.content.is_empty() {
        return Ok(());
    }

    let font = fonts.get(&text.font_family, text.font_weight)?;
    let [r, g, b] = parse_hex_color(&text.color)?;
    layer.set_fill_color(Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    )));

    // Alignment anchors the text at x: left starts there, right ends there
    let approx_width = text.content.chars().count() as f32 * text.font_size * AVG_GLYPH_WIDTH;
    let x = match text.text_align.unwrap_or_default() {
        TextAlign::Left => text.x,
        TextAlign::Center => text.x - approx_width / 2.0,
        TextAlign::Right => text.x - approx_width,
    };
    let baseline = canvas_height - text.y - text.font_size;

    layer.use_text(
        text.content.as_str(),
        text.font_size * PX_TO_PT,
        Mm(px_to_mm(x.max(0.0))),
        Mm(px_to_mm(baseline)),
        &font,
    );
    Ok(())
}

// ============================================================================
// Fonts
// ============================================================================

/// Builtin PDF fonts, added to the document on first use
struct FontCache<'d> {
    doc: &'d PdfDocumentReference,
    loaded: Vec<(BuiltinFont, IndirectFontRef)>,
}

impl<'d> FontCache<'d> {
    fn new(doc: &'d PdfDocumentReference) -> Self {
        Self {
            doc,
            loaded: Vec::new(),
        }
    }

    fn get(&mut self, family: &str, weight: FontWeight) -> Result<IndirectFontRef, RenderError> {
        let builtin = builtin_font(family, weight);
        if let Some((_, font)) = self.loaded.iter().find(|(b, _)| *b == builtin) {
            return Ok(font.clone());
        }
        let font = self
            .doc
            .add_builtin_font(builtin)
            .map_err(|e| RenderError::PdfError(e.to_string()))?;
        self.loaded.push((builtin, font.clone()));
        Ok(font)
    }
}

/// Closest builtin PDF font for a designer font family
fn builtin_font(family: &str, weight: FontWeight) -> BuiltinFont {
    let bold = weight == FontWeight::Bold;
    match family {
        "Times New Roman" | "Georgia" => {
            if bold {
                BuiltinFont::TimesBold
            } else {
                BuiltinFont::TimesRoman
            }
        }
        "Courier New" => {
            if bold {
                BuiltinFont::CourierBold
            } else {
                BuiltinFont::Courier
            }
        }
        _ => {
            if bold {
                BuiltinFont::HelveticaBold
            } else {
                BuiltinFont::Helvetica
            }
        }
    }
}
