//! PDFs and deterministic providers shared by the integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use pdfqa_rag::{EmbeddingProvider, GenerationProvider, OcrEngine, RagError, Result};

fn finish(mut doc: Document, pages_id: ObjectId, kids: Vec<Object>, resources: Object) -> Vec<u8> {
    let count = kids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// A PDF with one Courier text line per page. Fonts live on the `Pages` node.
pub fn text_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    finish(doc, pages_id, kids, resources_id.into())
}

/// A one-page PDF with no text layer, drawing a single 8-bit grayscale image.
///
/// The image is one row whose pixel values are the bytes of `label`, so
/// [`PixelOcr`] can read the label back after the image was re-encoded.
pub fn scanned_pdf(label: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => label.len() as i64,
            "Height" => 1,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        label.as_bytes().to_vec(),
    ));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im1" => image_id },
    });

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![500.into(), 0.into(), 0.into(), 50.into(), 50.into(), 700.into()],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });

    finish(doc, pages_id, vec![page_id.into()], resources_id.into())
}

/// Reads the first row of a grayscale image back as text.
pub struct PixelOcr;

#[async_trait]
impl OcrEngine for PixelOcr {
    async fn recognize(&self, image: &[u8]) -> Result<String> {
        let decoded = image::load_from_memory(image).map_err(|e| RagError::OcrFailed {
            engine: "pixel".into(),
            message: e.to_string(),
        })?;
        let gray = decoded.to_luma8();
        let row: Vec<u8> = (0..gray.width()).map(|x| gray.get_pixel(x, 0).0[0]).collect();
        Ok(String::from_utf8_lossy(&row).into_owned())
    }
}

/// An OCR engine that always fails.
pub struct BrokenOcr;

#[async_trait]
impl OcrEngine for BrokenOcr {
    async fn recognize(&self, _image: &[u8]) -> Result<String> {
        Err(RagError::OcrFailed { engine: "broken".into(), message: "engine crashed".into() })
    }
}

/// Letter-frequency embedding over `a..=z` plus a constant component.
pub struct LetterEmbedder;

pub const LETTER_DIMENSIONS: usize = 27;

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0; LETTER_DIMENSIONS];
        for c in text.chars().flat_map(char::to_lowercase) {
            if c.is_ascii_lowercase() {
                v[(c as u8 - b'a') as usize] += 1.0;
            }
        }
        v[26] = 0.5;
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        LETTER_DIMENSIONS
    }
}

/// Records every prompt and answers with a fixed string.
pub struct RecordingGenerator {
    reply: String,
    pub prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), prompts: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerationProvider for RecordingGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }
}
