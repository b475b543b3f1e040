use std::path::Path;
use std::process::Command;

use image::GenericImageView;
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::ProcessError;

/// Turns a PDF page into an encoded raster image (PNG).
pub trait Rasterizer: Send + Sync {
    fn render_page(&self, pdf_path: &Path, page: u32) -> Result<Vec<u8>, ProcessError>;

    /// Only the first page of a scanned invoice is identified.
    fn render_first_page(&self, pdf_path: &Path) -> Result<Vec<u8>, ProcessError> {
        self.render_page(pdf_path, 1)
    }
}

/// Renders through poppler's `pdftoppm`.
pub struct PdftoppmRasterizer {
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn render_page(&self, pdf_path: &Path, page: u32) -> Result<Vec<u8>, ProcessError> {
        let _span = tracing::debug_span!("processor.pdftoppm", page, dpi = self.dpi).entered();

        if !pdf_path.exists() {
            return Err(ProcessError::ReadDocument {
                path: pdf_path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "PDF not found"),
            });
        }

        let output_prefix =
            std::env::temp_dir().join(format!("facscan_page_{}", uuid::Uuid::new_v4()));

        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-singlefile")
            .args(["-r", &self.dpi.to_string()])
            .args(["-f", &page.to_string(), "-l", &page.to_string()])
            .arg(pdf_path)
            .arg(&output_prefix)
            .output()
            .map_err(|e| {
                ProcessError::PdfProcessing(format!(
                    "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ProcessError::PdfProcessing(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        // -singlefile writes exactly `<prefix>.png`
        let image_path = output_prefix.with_extension("png");
        let image_data = std::fs::read(&image_path).map_err(|e| {
            ProcessError::PdfProcessing(format!("Failed to read rendered page: {}", e))
        })?;
        let _ = std::fs::remove_file(&image_path);

        Ok(image_data)
    }
}

/// Wraps one encoded raster image into a single-page PDF sized to the image
/// at the given resolution.
pub fn image_to_pdf(image_data: &[u8], dpi: u32) -> Result<Vec<u8>, ProcessError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| ProcessError::InvalidImage(format!("Failed to load image: {}", e)))?;

    let (width, height) = img.dimensions();
    let rgb = img.to_rgb8();

    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    ));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im1" => image_id,
        },
    });

    // Points per pixel at the scan resolution
    let scale = 72.0 / dpi.max(1) as f64;
    let page_width = (width as f64 * scale).round() as i64;
    let page_height = (height as f64 * scale).round() as i64;

    let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im1 Do\nQ\n", page_width, page_height);
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        }),
    );

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ProcessError::PdfProcessing(e.to_string()))?;

    Ok(buffer)
}
