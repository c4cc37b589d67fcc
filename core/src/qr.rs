//! QR code rendering.

use crate::error::EncodingError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};
use std::io::Cursor;

/// Default minimum width and height of rendered codes, in pixels.
pub const DEFAULT_MIN_DIMENSION: u32 = 256;

/// Renders text (a ticket URL) as a PNG QR code.
#[derive(Clone, Debug)]
pub struct QrRenderer {
    min_dimension: u32,
    ec_level: EcLevel,
}

impl Default for QrRenderer {
    fn default() -> Self {
        Self {
            min_dimension: DEFAULT_MIN_DIMENSION,
            ec_level: EcLevel::M,
        }
    }
}

impl QrRenderer {
    /// Renderer with the default size and medium error correction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum image dimension in pixels.
    #[must_use]
    pub const fn with_min_dimension(mut self, min_dimension: u32) -> Self {
        self.min_dimension = min_dimension;
        self
    }

    /// Set the error-correction level.
    #[must_use]
    pub const fn with_ec_level(mut self, ec_level: EcLevel) -> Self {
        self.ec_level = ec_level;
        self
    }

    /// Encode `data` and return the PNG bytes.
    ///
    /// # Errors
    ///
    /// [`EncodingError`] if the data does not fit in a QR code or the PNG
    /// encoder fails.
    pub fn render_png(&self, data: &str) -> Result<Vec<u8>, EncodingError> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), self.ec_level)
            .map_err(|e| EncodingError(e.to_string()))?;

        let image = code
            .render::<Luma<u8>>()
            .min_dimensions(self.min_dimension, self.min_dimension)
            .build();

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| EncodingError(e.to_string()))?;

        tracing::trace!(bytes = png.len(), width = image.width(), "Rendered QR code");
        Ok(png)
    }

    /// Encode `data` and return the PNG as standard base64.
    ///
    /// # Errors
    ///
    /// See [`render_png`](Self::render_png).
    pub fn render_base64(&self, data: &str) -> Result<String, EncodingError> {
        self.render_png(data).map(|png| STANDARD.encode(png))
    }
}
