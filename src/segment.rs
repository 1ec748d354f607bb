//! Page-text segmentation.
//!
//! Splits ordered page text into overlapping, length-bounded chunks.
//! Pages longer than `max_len` are pre-split, either at plain whitespace
//! boundaries or, when boundary-aware splitting is on, preferentially
//! immediately before structural-heading lines. Segments are then greedily
//! accumulated into chunks with a carried overlap window.
//!
//! Edge cases never raise: empty input yields an empty chunk list, and
//! whitespace-only pages are skipped. Length findings are advisory only
//! (see [`chunk_warnings`]).

use serde_json::json;

use crate::classify::is_section_boundary;
use crate::models::{Chunk, Finding, Page, Severity};

/// Segmentation parameters. Lengths are in bytes of UTF-8 text; cuts always
/// land on character boundaries.
#[derive(Debug, Clone)]
pub struct SegmenterOptions {
    pub min_len: usize,
    pub max_len: usize,
    pub overlap: usize,
    pub boundary_aware: bool,
}

impl Default for SegmenterOptions {
    fn default() -> Self {
        Self {
            min_len: 800,
            max_len: 1200,
            overlap: 200,
            boundary_aware: true,
        }
    }
}

/// Split a single over-long text into segments of at most `max_len`,
/// retreating to the last space when it lies past 60% of the window.
pub fn split_long_text(text: &str, max_len: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut start = 0;
    let total = text.len();

    while start < total {
        let mut end = floor_char_boundary(text, (start + max_len).min(total));
        if end < total {
            let slice = &text[start..end];
            if let Some(last_space) = slice.rfind(' ') {
                if last_space as f64 > max_len as f64 * 0.6 {
                    end = start + last_space;
                }
            }
        }
        if end <= start {
            // single oversized char run; force progress
            end = ceil_char_boundary(text, start + 1);
        }
        let segment = text[start..end].trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        start = end;
    }

    segments
}

/// Boundary-aware variant of [`split_long_text`]: within each `max_len`
/// window, prefer cutting immediately before the last structural-heading
/// line; fall back to the last whitespace past 60% of the window, then to
/// a hard cut.
pub fn split_boundary_aware(text: &str, max_len: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut start = 0;
    let total = text.len();

    while start < total {
        let window_end = floor_char_boundary(text, (start + max_len).min(total));
        if window_end >= total {
            let segment = text[start..].trim();
            if !segment.is_empty() {
                segments.push(segment.to_string());
            }
            break;
        }

        let window = &text[start..window_end];
        let mut cut = None;

        // last heading line starting inside the window
        for (offset, _) in window.match_indices('\n') {
            let line_start = start + offset + 1;
            if line_start >= total {
                break;
            }
            let line = text[line_start..].lines().next().unwrap_or("");
            if offset > 0 && is_section_boundary(line) {
                cut = Some(offset + 1);
            }
        }

        // fall back to trailing whitespace past 60% of the window
        if cut.is_none() {
            if let Some(ws) = window.rfind(|c: char| c.is_whitespace()) {
                if ws as f64 > max_len as f64 * 0.6 {
                    cut = Some(ws);
                }
            }
        }

        let cut = cut.unwrap_or(window.len()).max(1);
        let end = ceil_char_boundary(text, start + cut);
        let segment = text[start..end].trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
        }
        start = end;
    }

    segments
}

/// Segment ordered pages into chunks.
///
/// Greedy accumulation: a chunk is emitted once appending the next segment
/// would exceed `max_len` and the buffer has reached `min_len`; a trailing
/// window of up to `overlap` bytes is carried into the next buffer. The
/// final non-empty buffer is always emitted, even under `min_len`.
pub fn chunk_pages(pages: &[Page], opts: &SegmenterOptions) -> Vec<Chunk> {
    let mut segments: Vec<(i64, String)> = Vec::new();
    for page in pages {
        let text = page.text.trim();
        if text.is_empty() {
            continue;
        }
        if text.len() <= opts.max_len {
            segments.push((page.number, text.to_string()));
        } else {
            let pieces = if opts.boundary_aware {
                split_boundary_aware(text, opts.max_len)
            } else {
                split_long_text(text, opts.max_len)
            };
            for piece in pieces {
                segments.push((page.number, piece));
            }
        }
    }

    let mut chunks = Vec::new();
    let mut current_text = String::new();
    let mut current_pages: Vec<i64> = Vec::new();

    for (page_number, segment_text) in segments {
        if current_text.is_empty() {
            current_text = segment_text;
            current_pages = vec![page_number];
            continue;
        }

        let prospective = current_text.len() + 1 + segment_text.len();
        if prospective > opts.max_len && current_text.len() >= opts.min_len {
            chunks.push(make_chunk(&current_text, &current_pages));

            let mut overlap_text = if opts.overlap > 0 {
                tail(&current_text, opts.overlap).trim().to_string()
            } else {
                String::new()
            };
            if !overlap_text.is_empty() {
                let available = opts.max_len as i64 - segment_text.len() as i64 - 1;
                if available <= 0 {
                    overlap_text.clear();
                } else if (available as usize) < overlap_text.len() {
                    overlap_text = tail(&overlap_text, available as usize).to_string();
                }
            }

            let last_page = *current_pages.last().unwrap_or(&page_number);
            current_text = if overlap_text.is_empty() {
                segment_text
            } else {
                format!("{} {}", overlap_text, segment_text).trim().to_string()
            };
            current_pages = vec![last_page, page_number];
        } else {
            current_text = format!("{} {}", current_text, segment_text);
            if !current_pages.contains(&page_number) {
                current_pages.push(page_number);
            }
        }
    }

    if !current_text.is_empty() {
        chunks.push(make_chunk(&current_text, &current_pages));
    }

    chunks
}

/// Advisory length findings for segmented chunks. Warnings, not failures.
pub fn chunk_warnings(chunks: &[Chunk], min_warn: usize, max_warn: usize) -> Vec<Finding> {
    let mut warnings = Vec::new();
    for chunk in chunks {
        if chunk.length < min_warn {
            warnings.push(Finding::new(
                "CHUNK_TOO_SMALL",
                Severity::Warn,
                format!("Chunk length {} is below recommended minimum.", chunk.length),
                json!({ "length": chunk.length, "pageRange": chunk.page_range }),
                "Increase chunk size or adjust overlap for better context.",
            ));
        }
        if chunk.length > max_warn {
            warnings.push(Finding::new(
                "CHUNK_TOO_LARGE",
                Severity::Warn,
                format!("Chunk length {} exceeds recommended maximum.", chunk.length),
                json!({ "length": chunk.length, "pageRange": chunk.page_range }),
                "Reduce chunk size to avoid embedding truncation.",
            ));
        }
    }
    warnings
}

fn make_chunk(text: &str, pages: &[i64]) -> Chunk {
    let page_range = if pages.is_empty() {
        (0, 0)
    } else {
        (
            *pages.iter().min().unwrap(),
            *pages.iter().max().unwrap(),
        )
    };
    Chunk {
        text: text.to_string(),
        page_range,
        length: text.len(),
    }
}

/// Last `n` bytes of `s`, extended forward to a character boundary.
fn tail(s: &str, n: usize) -> &str {
    if n >= s.len() {
        return s;
    }
    &s[ceil_char_boundary(s, s.len() - n)..]
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    index = index.min(s.len());
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: i64, text: &str) -> Page {
        Page {
            number,
            text: text.to_string(),
        }
    }

    fn plain_opts() -> SegmenterOptions {
        SegmenterOptions {
            boundary_aware: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_short_page_single_chunk() {
        let chunks = chunk_pages(&[page(1, "Short page body.")], &plain_opts());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short page body.");
        assert_eq!(chunks[0].page_range, (1, 1));
    }

    #[test]
    fn test_empty_input_empty_output() {
        assert!(chunk_pages(&[], &plain_opts()).is_empty());
        assert!(chunk_pages(&[page(1, "   \n  ")], &plain_opts()).is_empty());
    }

    #[test]
    fn test_repeated_text_respects_limits() {
        // five pages of ~1,180 chars of repeated-word text
        let word = "lorem ipsum dolor sit amet consectetur adipiscing elit sed do ";
        let pages: Vec<Page> = (1..=5).map(|i| page(i, &word.repeat(19))).collect();
        let chunks = chunk_pages(&pages, &plain_opts());

        assert!(chunks.len() >= 3, "got {} chunks", chunks.len());
        for chunk in &chunks {
            assert!(chunk.length <= 1200, "chunk length {}", chunk.length);
        }
    }

    #[test]
    fn test_page_ranges_cover_contributing_pages() {
        let pages = vec![page(1, &"A".repeat(900)), page(2, &"B".repeat(900))];
        let chunks = chunk_pages(&pages, &plain_opts());
        for chunk in &chunks {
            let (start, end) = chunk.page_range;
            assert!(start >= 1);
            assert!(end <= 2);
            assert!(start <= end);
        }
    }

    #[test]
    fn test_overlap_carried_between_chunks() {
        let opts = SegmenterOptions {
            min_len: 300,
            max_len: 800,
            overlap: 200,
            boundary_aware: false,
        };
        let pages = vec![
            page(1, &"alpha beta gamma delta ".repeat(22)),
            page(2, &"epsilon zeta eta theta ".repeat(22)),
        ];
        let chunks = chunk_pages(&pages, &opts);
        assert_eq!(chunks.len(), 2);

        // the second chunk opens with the trailing window of the first
        // and spans both contributing pages
        assert!(chunks[1].text.starts_with("beta gamma delta"));
        assert!(chunks[1].text.contains("epsilon"));
        assert_eq!(chunks[0].page_range, (1, 1));
        assert_eq!(chunks[1].page_range, (1, 2));
    }

    #[test]
    fn test_final_buffer_emitted_under_min_len() {
        let chunks = chunk_pages(&[page(1, "tiny trailing text")], &plain_opts());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].length < 800);
    }

    #[test]
    fn test_split_long_text_prefers_space_boundary() {
        let text = "alpha ".repeat(400);
        let segments = split_long_text(&text, 1200);
        assert!(segments.len() >= 2);
        for segment in &segments {
            assert!(segment.len() <= 1200);
            // cuts land between words
            assert!(!segment.starts_with(' ') && !segment.ends_with(' '));
        }
    }

    #[test]
    fn test_boundary_aware_cuts_before_headings() {
        let body = "general requirements apply to all works on site. ".repeat(20);
        let text = format!("{}\nCLAUSE 2 CONCRETE WORKS\n{}", body, body);
        let segments = split_boundary_aware(&text, 1100);

        assert!(segments.len() >= 2);
        assert!(
            segments.iter().any(|s| s.starts_with("CLAUSE 2")),
            "expected a segment starting at the heading, got {:?}",
            segments.iter().map(|s| &s[..30.min(s.len())]).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_chunk_warnings_thresholds() {
        let chunks = vec![
            Chunk {
                text: "small".into(),
                page_range: (1, 1),
                length: 120,
            },
            Chunk {
                text: "ok".into(),
                page_range: (1, 2),
                length: 900,
            },
            Chunk {
                text: "big".into(),
                page_range: (2, 3),
                length: 1800,
            },
        ];
        let warnings = chunk_warnings(&chunks, 500, 1500);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].kind, "CHUNK_TOO_SMALL");
        assert_eq!(warnings[1].kind, "CHUNK_TOO_LARGE");
        assert!(warnings.iter().all(|w| w.severity == Severity::Warn));
    }
}
