//! Text extraction from uploaded document bytes

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Blank line placed between consecutive pages
const PAGE_SEPARATOR: &str = "\n\n";

/// Extracted document text and where each page begins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    /// Char offset of each page's first character; empty for unpaged text
    pub page_starts: Vec<usize>,
}

impl ExtractedText {
    /// Text without page structure
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            page_starts: Vec::new(),
        }
    }

    /// Join pages with a blank line, recording each page's start offset
    ///
    /// An empty page shares its start with the next non-empty one, so
    /// offsets resolve to the page that actually holds the text.
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        let mut chars = 0usize;
        let mut page_starts = Vec::new();

        for page in pages {
            let page = page.as_ref();
            let separator = if text.is_empty() { 0 } else { PAGE_SEPARATOR.len() };
            if page.is_empty() {
                page_starts.push(chars + separator);
                continue;
            }
            if separator > 0 {
                text.push_str(PAGE_SEPARATOR);
                chars += separator;
            }
            page_starts.push(chars);
            text.push_str(page);
            chars += page.chars().count();
        }

        Self { text, page_starts }
    }

    pub fn page_count(&self) -> usize {
        self.page_starts.len()
    }

    /// 1-based page holding char `offset`, `None` for unpaged text
    pub fn page_at(&self, offset: usize) -> Option<u32> {
        let pages_started = self.page_starts.partition_point(|&start| start <= offset);
        (pages_started > 0).then_some(pages_started as u32)
    }
}

/// Converts raw document bytes into text
pub trait TextExtractor: Send + Sync {
    fn extract(&self, data: &[u8]) -> Result<ExtractedText>;

    /// Get extractor name for logging
    fn name(&self) -> &str;
}

/// PDF text via `pdf-extract`, page by page
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, data: &[u8]) -> Result<ExtractedText> {
        // pdf-extract panics on some malformed font tables
        let pages =
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(data))
                .map_err(|_| Error::Extraction("pdf: extractor panicked".to_string()))?
                .map_err(|e| Error::Extraction(format!("pdf: {}", e)))?;

        let extracted = ExtractedText::from_pages(pages.iter().map(|page| cleanup_pdf_text(page)));
        tracing::debug!(
            "Extracted {} PDF pages ({} chars)",
            extracted.page_count(),
            extracted.text.chars().count()
        );
        Ok(extracted)
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

/// Strict UTF-8 text
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, data: &[u8]) -> Result<ExtractedText> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::Extraction(format!("document is not valid UTF-8: {}", e)))?;
        Ok(ExtractedText::plain(
            text.strip_prefix('\u{feff}').unwrap_or(text).replace("\r\n", "\n"),
        ))
    }

    fn name(&self) -> &str {
        "text"
    }
}

/// Picks PDF or plain text from the leading bytes
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoExtractor;

impl AutoExtractor {
    pub fn is_pdf(data: &[u8]) -> bool {
        // The header may be preceded by a few junk bytes
        data.windows(5).take(1024).any(|w| w == b"%PDF-")
    }
}

impl TextExtractor for AutoExtractor {
    fn extract(&self, data: &[u8]) -> Result<ExtractedText> {
        if Self::is_pdf(data) {
            PdfExtractor.extract(data)
        } else {
            PlainTextExtractor.extract(data)
        }
    }

    fn name(&self) -> &str {
        "auto"
    }
}

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

/// Replace typographic glyphs pdf-extract leaves behind and drop blank runs
pub fn cleanup_pdf_text(text: &str) -> String {
    let replaced = text
        .replace('\0', "")
        .replace("\r\n", "\n")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"");

    let trimmed = replaced
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    blank_runs().replace_all(trimmed.trim(), "\n\n").into_owned()
}
