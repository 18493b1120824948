//! PDF extractor interface.
//!
//! Extraction itself is an external collaborator (a subprocess speaking
//! line-delimited JSON, or an in-process parser); the pipeline only depends
//! on this trait and the result shape. A subprocess implementation must
//! emit exactly one result object on stdout or one error object on stderr;
//! a non-zero exit code surfaces as [`crate::Error::Transient`].

use crate::models::{ChunkMetadata, TextChunk};
use crate::Result;
use serde::{Deserialize, Serialize};

/// One extracted page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfPage {
    /// 1-based page number.
    pub page_number: u32,
    /// Page text.
    pub text: String,
}

/// Document metadata read from the PDF.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfMetadata {
    /// Document title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Document author.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// A table rendered as markdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfTable {
    /// Markdown rendering of the table.
    pub markdown: String,
}

/// Extraction statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfStats {
    /// Characters extracted.
    pub chars: usize,
    /// Words extracted.
    pub words: usize,
    /// Extraction wall time in milliseconds.
    pub processing_ms: u64,
}

/// Complete result of a PDF extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfExtraction {
    /// Full document text.
    pub text: String,
    /// Page count.
    pub num_pages: u32,
    /// Per-page text.
    pub pages: Vec<PdfPage>,
    /// Document metadata.
    #[serde(default)]
    pub metadata: PdfMetadata,
    /// Extracted tables.
    #[serde(default)]
    pub tables: Vec<PdfTable>,
    /// Extraction statistics.
    #[serde(default)]
    pub stats: PdfStats,
}

/// Trait for PDF extractors.
pub trait PdfExtractor: Send + Sync {
    /// Extracts text, pages, metadata, and tables from a PDF buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transient`] for subprocess/transport
    /// failures and [`crate::Error::Validation`] for unparseable documents.
    fn extract_from_buffer(&self, bytes: &[u8]) -> Result<PdfExtraction>;
}

/// Turns an extraction into ingestion chunks, one per page.
///
/// Chunk IDs are `{document_id}-p{page}`; document title and author flow
/// into the chunk metadata.
#[must_use]
pub fn chunks_from_extraction(document_id: &str, extraction: &PdfExtraction) -> Vec<TextChunk> {
    let mut offset = 0usize;
    extraction
        .pages
        .iter()
        .filter(|page| !page.text.trim().is_empty())
        .map(|page| {
            let metadata = ChunkMetadata {
                document_id: Some(document_id.to_string()),
                title: extraction.metadata.title.clone(),
                authors: extraction
                    .metadata
                    .author
                    .clone()
                    .map(|a| vec![a])
                    .unwrap_or_default(),
                categories: Vec::new(),
                year: None,
                offset: Some(offset),
            };
            let chunk = TextChunk::new(
                format!("{document_id}-p{}", page.page_number),
                page.text.clone(),
            )
            .with_metadata(metadata);
            offset += page.text.len();
            chunk
        })
        .collect()
}
