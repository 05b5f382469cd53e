//! Document ingestion: text extraction and segmentation

mod extractor;
mod segmenter;

pub use extractor::{
    cleanup_pdf_text, AutoExtractor, ExtractedText, PdfExtractor, PlainTextExtractor,
    TextExtractor,
};
pub use segmenter::{segment, Segmenter};
