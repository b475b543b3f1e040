use std::io::Cursor;

use image::{DynamicImage, GenericImageView};

use crate::config::ZoneConfig;
use crate::error::{ConfigError, ProcessError};

/// Fractional page rectangle. Always within `[0, 1]` with `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoneBounds {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl ZoneBounds {
    /// Upper-right block of the invoice template where RUT and folio are printed.
    pub const INVOICE_HEADER: ZoneBounds = ZoneBounds {
        x1: 0.58,
        y1: 0.0,
        x2: 0.98,
        y2: 0.25,
    };

    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, ConfigError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(in_unit(x1) && in_unit(y1) && in_unit(x2) && in_unit(y2)) {
            return Err(ConfigError::Validation {
                message: format!(
                    "zone bounds ({}, {}, {}, {}) must lie within [0, 1]",
                    x1, y1, x2, y2
                ),
            });
        }
        if x1 >= x2 || y1 >= y2 {
            return Err(ConfigError::Validation {
                message: format!(
                    "zone bounds must satisfy x1 < x2 and y1 < y2, got ({}, {}, {}, {})",
                    x1, y1, x2, y2
                ),
            });
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    /// Pixel rectangle `(x, y, width, height)` for a page of the given size.
    pub fn pixel_rect(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let scale = |fraction: f64, extent: u32| -> u32 {
            ((fraction * extent as f64).round() as u32).min(extent)
        };
        let left = scale(self.x1, width);
        let top = scale(self.y1, height);
        let right = scale(self.x2, width);
        let bottom = scale(self.y2, height);
        (
            left,
            top,
            right.saturating_sub(left),
            bottom.saturating_sub(top),
        )
    }
}

impl Default for ZoneBounds {
    fn default() -> Self {
        Self::INVOICE_HEADER
    }
}

impl TryFrom<ZoneConfig> for ZoneBounds {
    type Error = ConfigError;

    fn try_from(zone: ZoneConfig) -> Result<Self, Self::Error> {
        Self::new(zone.x1, zone.y1, zone.x2, zone.y2)
    }
}

/// Cropped sub-image of a rasterized page.
pub struct Zone {
    image: DynamicImage,
}

impl Zone {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// PNG encoding handed to the OCR engine and written as debug artifact.
    pub fn to_png(&self) -> Result<Vec<u8>, ProcessError> {
        let mut png = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| ProcessError::InvalidImage(format!("Failed to encode zone: {}", e)))?;
        Ok(png)
    }
}

pub struct ZoneCropper {
    bounds: ZoneBounds,
}

impl ZoneCropper {
    pub fn new(bounds: ZoneBounds) -> Self {
        Self { bounds }
    }

    /// Decodes an encoded page image and crops the configured zone out of it.
    ///
    /// A page that does not decode, or whose zone collapses to zero pixels,
    /// is an [`ProcessError::InvalidImage`].
    pub fn crop(&self, page_image: &[u8]) -> Result<Zone, ProcessError> {
        let page = image::load_from_memory(page_image)
            .map_err(|e| ProcessError::InvalidImage(format!("Failed to decode page: {}", e)))?;
        self.crop_image(&page)
    }

    fn crop_image(&self, page: &DynamicImage) -> Result<Zone, ProcessError> {
        let (width, height) = page.dimensions();
        let (x, y, w, h) = self.bounds.pixel_rect(width, height);
        if w == 0 || h == 0 {
            return Err(ProcessError::InvalidImage(format!(
                "Zone is empty on a {}x{} page",
                width, height
            )));
        }

        Ok(Zone {
            image: page.crop_imm(x, y, w, h),
        })
    }
}

impl Default for ZoneCropper {
    fn default() -> Self {
        Self::new(ZoneBounds::default())
    }
}
