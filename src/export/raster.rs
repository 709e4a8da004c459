//! SVG → PNG rasterization using resvg/usvg.
//!
//! A [`RasterJob`] moves through two states. It starts
//! [`AwaitingDecode`] holding the serialized graphic as a base64 data URI,
//! and [`decode`](RasterJob::decode) turns it into a [`Decoded`] job whose
//! natural size is known. Only a decoded job can be drawn, so the single
//! point where the graphic is loaded sits between serialization and drawing.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};

use crate::error::ExportError;

const DATA_URI_PREFIX: &str = "data:image/svg+xml;base64,";

// ============================================================================
// Job states
// ============================================================================

/// The graphic is serialized but not yet loaded.
#[derive(Debug, Clone)]
pub struct AwaitingDecode {
    data_uri: String,
}

/// The graphic is loaded and its natural size is known.
#[derive(Debug)]
pub struct Decoded {
    tree: Tree,
    natural: (u32, u32),
}

/// One PNG export in flight.
#[derive(Debug)]
pub struct RasterJob<S> {
    state: S,
}

impl RasterJob<AwaitingDecode> {
    /// Starts a job for serialized SVG markup.
    pub fn new(svg_markup: &str) -> Self {
        Self {
            state: AwaitingDecode {
                data_uri: format!("{DATA_URI_PREFIX}{}", STANDARD.encode(svg_markup)),
            },
        }
    }

    pub fn data_uri(&self) -> &str {
        &self.state.data_uri
    }

    /// Loads the graphic from its data URI.
    pub fn decode(self) -> Result<RasterJob<Decoded>, ExportError> {
        let uri = self.state.data_uri.as_str();
        let payload = uri.split_once(',').map_or(uri, |(_, payload)| payload);
        let bytes = STANDARD.decode(payload)?;

        let mut options = Options::default();
        options.fontdb_mut().load_system_fonts();
        let tree = Tree::from_data(&bytes, &options)?;

        let size = tree.size();
        let natural = (size.width().ceil() as u32, size.height().ceil() as u32);
        tracing::debug!(width = natural.0, height = natural.1, "decoded svg");

        Ok(RasterJob {
            state: Decoded { tree, natural },
        })
    }
}

impl RasterJob<Decoded> {
    /// Width and height the graphic declares for itself.
    pub fn natural_size(&self) -> (u32, u32) {
        self.state.natural
    }

    /// Draws the graphic stretched onto a `width` × `height` canvas.
    pub fn draw(&self, width: u32, height: u32) -> Result<RgbaImage, ExportError> {
        let invalid = ExportError::InvalidDimensions { width, height };
        let mut pixmap = Pixmap::new(width, height).ok_or(invalid)?;

        let size = self.state.tree.size();
        let transform = Transform::from_scale(
            width as f32 / size.width(),
            height as f32 / size.height(),
        );
        resvg::render(&self.state.tree, transform, &mut pixmap.as_mut());

        pixmap_to_rgba_image(&pixmap).ok_or(ExportError::InvalidDimensions { width, height })
    }
}

/// Encodes an image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

// ============================================================================
// Dimension policy
// ============================================================================

/// Raster size for a graphic of `natural` size given optional hints.
///
/// A single hint keeps the aspect ratio, rounding the other side half away
/// from zero. Two hints are used as given, even if that distorts the image.
pub fn target_dimensions(natural: (u32, u32), width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let (iw, ih) = natural;
    match (width, height) {
        (None, None) => natural,
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) if iw > 0 => (w, scale_side(w, ih, iw)),
        (None, Some(h)) if ih > 0 => (scale_side(h, iw, ih), h),
        (Some(w), None) => (w, ih),
        (None, Some(h)) => (iw, h),
    }
}

fn scale_side(given: u32, numerator: u32, denominator: u32) -> u32 {
    (f64::from(given) * f64::from(numerator) / f64::from(denominator)).round() as u32
}

// ============================================================================
// Pixel conversion
// ============================================================================

/// Converts a premultiplied tiny_skia pixmap to a straight-alpha image.
fn pixmap_to_rgba_image(pixmap: &Pixmap) -> Option<RgbaImage> {
    let mut raw = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let (r, g, b, a) = unpremultiply(pixel.red(), pixel.green(), pixel.blue(), pixel.alpha());
        raw.extend_from_slice(&[r, g, b, a]);
    }
    RgbaImage::from_raw(pixmap.width(), pixmap.height(), raw)
}

fn unpremultiply(r: u8, g: u8, b: u8, a: u8) -> (u8, u8, u8, u8) {
    if a == 0 {
        return (0, 0, 0, 0);
    }
    let a_f = a as f32 / 255.0;
    (
        (r as f32 / a_f).round().min(255.0) as u8,
        (g as f32 / a_f).round().min(255.0) as u8,
        (b as f32 / a_f).round().min(255.0) as u8,
        a,
    )
}

// ============================================================================
// Tests
// ============================================================================
