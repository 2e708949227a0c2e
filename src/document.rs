//! Source document loading with per-page boundaries.

use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

/// Page separator used by plain-text documents.
pub const PAGE_BREAK: char = '\x0c';

/// One page of extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    /// Extracted page text.
    pub text: String,
}

/// Immutable source document, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Document {
    source: PathBuf,
    pages: Vec<Page>,
}

impl Document {
    /// Builds a document from already-extracted page texts.
    pub fn from_pages<I, S>(source: impl Into<PathBuf>, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = pages
            .into_iter()
            .enumerate()
            .map(|(idx, text)| Page {
                number: idx + 1,
                text: text.into(),
            })
            .collect();
        Self {
            source: source.into(),
            pages,
        }
    }

    /// Loads the document at `path`.
    ///
    /// PDFs are extracted page by page; every other file is read as UTF-8 text
    /// with form-feed page breaks. A missing file maps to
    /// [`RagError::DocumentMissing`] so callers can treat it as "not ready".
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(RagError::DocumentMissing(path.to_path_buf()));
            }
            Err(err) => {
                return Err(RagError::Document(format!(
                    "failed to read {}: {err}",
                    path.display()
                )))
            }
        };

        let pages = if is_pdf(path) {
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem_by_pages(&bytes))
                .await
                .map_err(|err| RagError::Document(format!("pdf extraction task failed: {err}")))?
                .map_err(|err| RagError::Document(format!("pdf extraction error: {err}")))?
        } else {
            let text = String::from_utf8(bytes).map_err(|err| {
                RagError::Document(format!("{} is not valid UTF-8: {err}", path.display()))
            })?;
            text.split(PAGE_BREAK).map(str::to_string).collect()
        };

        let document = Self::from_pages(path, pages);
        if document.is_blank() {
            return Err(RagError::Document(format!(
                "{} contains no extractable text",
                path.display()
            )));
        }
        Ok(document)
    }

    /// Path the document was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Total characters across all pages.
    pub fn char_len(&self) -> usize {
        self.pages.iter().map(|page| page.text.chars().count()).sum()
    }

    fn is_blank(&self) -> bool {
        self.pages.iter().all(|page| page.text.trim().is_empty())
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}
