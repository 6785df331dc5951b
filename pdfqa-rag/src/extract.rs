//! Text extraction from uploaded PDFs.
//!
//! [`PdfExtractor`] makes two passes over every page: the native text layer,
//! then OCR over each raster image the page draws. A page contributes its
//! native text followed by the OCR text of its images, and pages are joined in
//! page order.

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Object, ObjectId, Stream};
use tracing::{debug, error, info, warn};

use crate::document::{Document, ExtractedBatch, UploadedFile};
use crate::error::{RagError, Result};
use crate::ocr::OcrEngine;

/// Form XObjects nested deeper than this are not searched for images.
const MAX_FORM_DEPTH: usize = 4;

/// Upper bound on `Parent` links followed when looking for inherited resources.
const MAX_TREE_DEPTH: usize = 32;

/// Largest decoded sample buffer accepted for one image, in bytes.
const MAX_IMAGE_BYTES: usize = 64 * 1024 * 1024;

/// Extracts per-document text from PDF uploads.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use pdfqa_rag::{PdfExtractor, TesseractOcr, UploadedFile};
///
/// let extractor = PdfExtractor::new(Arc::new(TesseractOcr::new()));
/// let batch = extractor.extract(&[UploadedFile::new("report.pdf", bytes)]).await?;
/// ```
pub struct PdfExtractor {
    ocr: Option<Arc<dyn OcrEngine>>,
}

/// Native text and encoded images of one page, collected before any OCR runs.
struct PageContent {
    number: u32,
    text: String,
    images: Vec<Vec<u8>>,
}

impl PdfExtractor {
    /// Create an extractor that runs `ocr` over embedded images.
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr: Some(ocr) }
    }

    /// Create an extractor that only reads the native text layer.
    pub fn text_only() -> Self {
        Self { ocr: None }
    }

    /// Extract every file, in upload order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ExtractionFailed`] for the first file that cannot be
    /// loaded as a PDF or whose images cannot be recognized. No partial batch
    /// is returned.
    pub async fn extract(&self, files: &[UploadedFile]) -> Result<ExtractedBatch> {
        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            let raw_text = self.extract_file(file).await?;
            documents.push(Document { filename: file.filename.clone(), raw_text });
        }

        let batch = ExtractedBatch::from_documents(documents);
        info!(documents = batch.documents().len(), chars = batch.char_len(), "extracted batch");
        Ok(batch)
    }

    async fn extract_file(&self, file: &UploadedFile) -> Result<String> {
        let filename = file.filename.clone();
        let bytes = file.bytes.clone();
        let with_images = self.ocr.is_some();
        let pages = tokio::task::spawn_blocking(move || read_pages(&filename, &bytes, with_images))
            .await
            .map_err(|e| {
                error!(filename = %file.filename, error = %e, "pdf parsing task failed");
                RagError::ExtractionFailed {
                    filename: file.filename.clone(),
                    message: format!("parsing task failed: {e}"),
                }
            })??;

        let mut text = String::new();
        let mut image_count = 0;
        for page in pages {
            text.push_str(&page.text);
            let Some(ocr) = &self.ocr else { continue };
            for image in &page.images {
                let recognized = ocr.recognize(image).await.map_err(|e| {
                    error!(filename = %file.filename, page = page.number, error = %e, "ocr failed");
                    RagError::ExtractionFailed {
                        filename: file.filename.clone(),
                        message: format!("OCR failed on page {}: {e}", page.number),
                    }
                })?;
                text.push_str(&recognized);
                image_count += 1;
            }
        }

        debug!(filename = %file.filename, chars = text.len(), images = image_count, "extracted file");
        Ok(text)
    }
}

/// Parse the PDF and collect each page's text and OCR-ready images.
///
/// CPU-bound; run it on the blocking pool.
fn read_pages(filename: &str, bytes: &[u8], with_images: bool) -> Result<Vec<PageContent>> {
    let pdf = lopdf::Document::load_mem(bytes).map_err(|e| {
        error!(filename, error = %e, "failed to load pdf");
        RagError::ExtractionFailed { filename: filename.to_string(), message: e.to_string() }
    })?;

    let mut pages = Vec::new();
    for (number, page_id) in pdf.get_pages() {
        let text = match pdf.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                warn!(filename, page = number, error = %e, "page has no readable text layer");
                String::new()
            }
        };

        let images = if with_images { page_images(filename, number, &pdf, page_id) } else { Vec::new() };
        pages.push(PageContent { number, text, images });
    }
    Ok(pages)
}

fn resolve<'a>(pdf: &'a lopdf::Document, object: &'a Object) -> lopdf::Result<&'a Object> {
    match object {
        Object::Reference(id) => pdf.get_object(*id),
        other => Ok(other),
    }
}

/// The page's resource dictionary, inherited from the page tree if needed.
fn page_resources(pdf: &lopdf::Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = pdf.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(pdf, resources).ok()?.as_dict().ok();
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = pdf.get_dictionary(parent).ok()?;
    }
    None
}

/// Encoded images drawn by a page, in resource order. Undecodable images are skipped.
fn page_images(filename: &str, page: u32, pdf: &lopdf::Document, page_id: ObjectId) -> Vec<Vec<u8>> {
    let mut streams = Vec::new();
    let mut seen = HashSet::new();
    if let Some(resources) = page_resources(pdf, page_id) {
        collect_image_streams(pdf, resources, 0, &mut seen, &mut streams);
    }

    streams
        .into_iter()
        .filter_map(|stream| match encode_for_ocr(pdf, stream) {
            Ok(encoded) => Some(encoded),
            Err(reason) => {
                warn!(filename, page, reason = %reason, "skipping image");
                None
            }
        })
        .collect()
}

fn collect_image_streams<'a>(
    pdf: &'a lopdf::Document,
    resources: &'a Dictionary,
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    out: &mut Vec<&'a Stream>,
) {
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve(pdf, o).ok())
        .and_then(|o| o.as_dict().ok())
    else {
        return;
    };

    for (_, entry) in xobjects.iter() {
        if let Object::Reference(id) = entry {
            if !seen.insert(*id) {
                continue;
            }
        }
        let Ok(stream) = resolve(pdf, entry).and_then(Object::as_stream) else { continue };
        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => out.push(stream),
            Ok(b"Form") if depth < MAX_FORM_DEPTH => {
                if let Some(inner) = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve(pdf, o).ok())
                    .and_then(|o| o.as_dict().ok())
                {
                    collect_image_streams(pdf, inner, depth + 1, seen, out);
                }
            }
            _ => {}
        }
    }
}

fn filters(pdf: &lopdf::Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter").and_then(|o| resolve(pdf, o)) {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => {
            items.iter().filter_map(|o| o.as_name().ok().map(<[u8]>::to_vec)).collect()
        }
        _ => Vec::new(),
    }
}

fn color_components(pdf: &lopdf::Document, dict: &Dictionary) -> Option<u8> {
    let space = resolve(pdf, dict.get(b"ColorSpace").ok()?).ok()?;
    let family = match space {
        Object::Name(name) => name.as_slice(),
        Object::Array(items) => items.first()?.as_name().ok()?,
        _ => return None,
    };
    match family {
        b"DeviceGray" | b"CalGray" | b"G" => Some(1),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
        b"DeviceCMYK" | b"CMYK" => Some(4),
        b"ICCBased" => {
            let Object::Array(items) = space else { return None };
            let profile = resolve(pdf, items.get(1)?).ok()?.as_stream().ok()?;
            let n = profile.dict.get(b"N").ok()?.as_i64().ok()?;
            u8::try_from(n).ok()
        }
        _ => None,
    }
}

/// Turn an image XObject into bytes an OCR engine can read.
///
/// JPEG and JPEG 2000 streams are passed through. Raw or Flate/LZW samples
/// are decoded and re-encoded as PNG.
fn encode_for_ocr(pdf: &lopdf::Document, stream: &Stream) -> std::result::Result<Vec<u8>, String> {
    let dict = &stream.dict;
    let filters = filters(pdf, dict);

    if let [only] = filters.as_slice() {
        if only == b"DCTDecode" || only == b"JPXDecode" {
            return Ok(stream.content.clone());
        }
    }

    let dimension = |key: &[u8]| {
        dict.get(key)
            .and_then(|o| resolve(pdf, o))
            .and_then(Object::as_i64)
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
    };
    let width = dimension(b"Width").ok_or("missing width")?;
    let height = dimension(b"Height").ok_or("missing height")?;

    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let bits = if is_mask {
        1
    } else {
        dict.get(b"BitsPerComponent").and_then(Object::as_i64).unwrap_or(8)
    };
    let components = if is_mask { 1 } else { color_components(pdf, dict).ok_or("unsupported color space")? };
    sample_len(width, height, bits, components)?;

    let samples = if filters.is_empty() {
        stream.content.clone()
    } else if filters.iter().all(|f| f == b"FlateDecode" || f == b"LZWDecode") {
        stream.decompressed_content().map_err(|e| format!("cannot decompress: {e}"))?
    } else {
        let names: Vec<String> = filters.iter().map(|f| String::from_utf8_lossy(f).into_owned()).collect();
        return Err(format!("unsupported filter {}", names.join("/")));
    };

    let image = decode_samples(width, height, bits, components, &samples)?;
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| format!("cannot encode png: {e}"))?;
    Ok(png)
}

/// Bytes of packed samples an image of this shape needs, rows padded to a byte.
fn sample_len(width: u32, height: u32, bits: i64, components: u8) -> std::result::Result<usize, String> {
    let bits = usize::try_from(bits).map_err(|_| format!("invalid bit depth {bits}"))?;
    let row_bits = (width as usize)
        .checked_mul(usize::from(components))
        .and_then(|n| n.checked_mul(bits))
        .ok_or("image too large")?;
    let len = row_bits.div_ceil(8).checked_mul(height as usize).ok_or("image too large")?;
    if len > MAX_IMAGE_BYTES {
        return Err(format!("image too large: {width}x{height} needs {len} bytes"));
    }
    Ok(len)
}

fn decode_samples(
    width: u32,
    height: u32,
    bits: i64,
    components: u8,
    samples: &[u8],
) -> std::result::Result<DynamicImage, String> {
    let len = sample_len(width, height, bits, components)?;
    let (w, h) = (width as usize, height as usize);
    match (bits, components) {
        (1, 1) => {
            let row_bytes = w.div_ceil(8);
            if samples.len() < len {
                return Err("truncated 1-bit image".to_string());
            }
            let pixels = (0..h)
                .flat_map(|y| (0..w).map(move |x| (y, x)))
                .map(|(y, x)| {
                    let byte = samples[y * row_bytes + x / 8];
                    if byte & (0x80 >> (x % 8)) != 0 { 255 } else { 0 }
                })
                .collect();
            GrayImage::from_raw(width, height, pixels)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| "invalid 1-bit image".to_string())
        }
        (8, 1) => {
            let pixels = samples.get(..len).ok_or("truncated gray image")?.to_vec();
            GrayImage::from_raw(width, height, pixels)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| "invalid gray image".to_string())
        }
        (8, 3) => {
            let pixels = samples.get(..len).ok_or("truncated rgb image")?.to_vec();
            RgbImage::from_raw(width, height, pixels)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| "invalid rgb image".to_string())
        }
        (8, 4) => {
            let cmyk = samples.get(..len).ok_or("truncated cmyk image")?;
            let pixels = cmyk
                .chunks_exact(4)
                .flat_map(|p| {
                    let k = 255 - u16::from(p[3]);
                    [0, 1, 2].map(|i| ((255 - u16::from(p[i])) * k / 255) as u8)
                })
                .collect();
            RgbImage::from_raw(width, height, pixels)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| "invalid cmyk image".to_string())
        }
        _ => Err(format!("unsupported sample format: {bits} bits x {components} components")),
    }
}
