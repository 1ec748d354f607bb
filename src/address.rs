//! Content addressing for chunks.
//!
//! `chunk_id` and `content_hash` are pure functions of their inputs (no
//! hidden state, no I/O), so recomputing them for identical input always
//! yields identical output. They are used both at chunk-creation time and
//! again at ingestion time to fill identifiers missing from legacy records.

use sha2::{Digest, Sha256};

/// Collapse all whitespace runs to single spaces and trim.
///
/// Two chunks that differ only in whitespace share a content hash; any
/// other text change produces a different hash.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic chunk identifier: `{doc_id}#p{page}#c{index}`.
///
/// A missing page defaults to 0.
pub fn chunk_id(doc_id: &str, page: Option<i64>, index: i64) -> String {
    format!("{}#p{}#c{}", doc_id, page.unwrap_or(0), index)
}

/// SHA-256 over the chunk's identity fields and normalized text, hex-encoded.
pub fn content_hash(doc_id: &str, page: Option<i64>, index: i64, text: &str) -> String {
    let base = format!(
        "{}|{}|{}|{}",
        doc_id,
        page.unwrap_or(0),
        index,
        normalize_text(text)
    );
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id("doc-1", Some(3), 2), "doc-1#p3#c2");
        assert_eq!(chunk_id("doc-1", None, 0), "doc-1#p0#c0");
    }

    #[test]
    fn test_content_hash_deterministic() {
        let first = content_hash("doc-1", Some(1), 0, "Text");
        let second = content_hash("doc-1", Some(1), 0, "Text");
        let different = content_hash("doc-1", Some(1), 1, "Text");

        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[test]
    fn test_content_hash_ignores_whitespace_runs() {
        let a = content_hash("doc-1", Some(1), 0, "alpha  beta\n\tgamma");
        let b = content_hash("doc-1", Some(1), 0, " alpha beta gamma ");
        assert_eq!(a, b);

        let c = content_hash("doc-1", Some(1), 0, "alpha beta gamma!");
        assert_ne!(a, c);
    }

    #[test]
    fn test_missing_page_hashes_like_page_zero() {
        let with_zero = content_hash("doc-1", Some(0), 4, "body");
        let without = content_hash("doc-1", None, 4, "body");
        assert_eq!(with_zero, without);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  a \n b\t\tc "), "a b c");
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   "), "");
    }
}
