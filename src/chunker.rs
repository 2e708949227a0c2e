//! Splits document pages into overlapping, character-bounded segments.

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Character budgets for segment construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum characters per segment.
    pub max_chars: usize,
    /// Characters shared between consecutive segments.
    pub overlap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chars: 500,
            overlap_chars: 100,
        }
    }
}

/// Contiguous slice of a page, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Sequence position across the whole document.
    pub chunk_id: usize,
    /// 1-based source page.
    pub page: usize,
    /// Inclusive start offset within the page, in characters.
    pub char_start: usize,
    /// Exclusive end offset within the page, in characters.
    pub char_end: usize,
    /// Segment text.
    pub text: String,
}

/// Chunks every page of `document`, numbering segments across pages.
pub fn chunk_document(document: &Document, config: &ChunkerConfig) -> Vec<Segment> {
    let mut segments = Vec::new();
    for page in document.pages() {
        let first_id = segments.len();
        segments.extend(
            chunk_text(&page.text, page.number, config)
                .into_iter()
                .enumerate()
                .map(|(offset, mut segment)| {
                    segment.chunk_id = first_id + offset;
                    segment
                }),
        );
    }
    segments
}

/// Chunks a single page of text.
///
/// Segments cover the text with no gaps and consecutive segments share exactly
/// `overlap_chars` characters. Cuts prefer to land just after whitespace when
/// one is available inside the window.
pub fn chunk_text(text: &str, page: usize, config: &ChunkerConfig) -> Vec<Segment> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let max = config.max_chars.max(1);
    let overlap = config.overlap_chars.min(max.saturating_sub(1));

    let mut segments = Vec::new();
    let mut start = 0usize;
    loop {
        let hard_end = (start + max).min(total);
        let end = if hard_end == total {
            total
        } else {
            preferred_cut(&chars, start + overlap, hard_end)
        };

        segments.push(Segment {
            chunk_id: segments.len(),
            page,
            char_start: start,
            char_end: end,
            text: chars[start..end].iter().collect(),
        });

        if end == total {
            break;
        }
        start = end - overlap;
    }
    segments
}

/// Latest cut in `(floor, hard_end]` that follows whitespace, else `hard_end`.
fn preferred_cut(chars: &[char], floor: usize, hard_end: usize) -> usize {
    (floor + 1..=hard_end)
        .rev()
        .find(|&cut| chars[cut - 1].is_whitespace())
        .unwrap_or(hard_end)
}
