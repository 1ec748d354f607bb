//! Domain metadata heuristics for construction documents.
//!
//! Everything here is best-effort pattern matching: document type,
//! discipline, standards references, section references, and revision
//! tokens. Regexes are compiled once and reused. The section-boundary
//! matcher is also consulted by the boundary-aware segmenter.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::ClassificationMetadata;

static SECTION_BOUNDARY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^CLAUSE\s+\d+",
        r"(?i)^SECTION\s+\d+",
        r"(?i)^PART\s+[A-Z0-9]+",
        r"(?i)^APPENDIX\s+[A-Z0-9]+",
        r"(?i)^SCHEDULE\s+[A-Z0-9]+",
        r"(?i)^ATTACHMENT\s+[A-Z0-9]+",
        r"^\d+\.\d+(?:\.\d+)*\s+[A-Z]",
        r"^[A-Z]\d+\.\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid pattern"))
    .collect()
});

static STANDARD_REFERENCE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)AS\s*/?NZS\s*\d{4}(?:\.\d+)*(?::\d{4})?",
        r"(?i)AS\s*\d{4}(?:\.\d+)*(?::\d{4})?",
        r"(?i)NCC\s*(?:20\d{2})?",
        r"(?i)BCA\s*(?:20\d{2})?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid pattern"))
    .collect()
});

static DOC_TYPE_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    fn compile(patterns: &[&str]) -> Vec<Regex> {
        patterns
            .iter()
            .map(|p| Regex::new(p).expect("valid pattern"))
            .collect()
    }
    vec![
        (
            "specification",
            compile(&[
                r"(?im)^specification",
                r"(?i)technical\s+specification",
                r"(?i)spec\s+section\s+\d+",
            ]),
        ),
        (
            "contract",
            compile(&[
                r"(?i)contract\s+(agreement|document)",
                r"(?i)conditions\s+of\s+contract",
                r"(?i)general\s+conditions",
            ]),
        ),
        (
            "swms",
            compile(&[
                r"(?i)safe\s+work\s+method\s+statement",
                r"(?i)\bSWMS\b",
                r"(?i)job\s+safety\s+analysis",
                r"(?i)risk\s+assessment",
            ]),
        ),
        (
            "itp",
            compile(&[
                r"(?i)inspection\s+(?:and\s+)?test\s+plan",
                r"(?i)\bITP\b",
                r"(?i)hold\s+points?",
            ]),
        ),
        (
            "rfi",
            compile(&[
                r"(?i)request\s+for\s+information",
                r"(?i)\bRFI[\s\-]?\d+",
                r"(?i)technical\s+query",
            ]),
        ),
        (
            "variation",
            compile(&[
                r"(?i)variation\s+(?:order|request|notice)",
                r"(?i)\bVO[\s\-]?\d+",
                r"(?i)change\s+order",
            ]),
        ),
        (
            "progress_claim",
            compile(&[r"(?i)progress\s+claim", r"(?i)payment\s+claim"]),
        ),
        (
            "meeting_minutes",
            compile(&[r"(?i)meeting\s+minutes", r"(?i)minutes\s+of\s+meeting"]),
        ),
    ]
});

static DISCIPLINE_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    fn compile(patterns: &[&str]) -> Vec<Regex> {
        patterns
            .iter()
            .map(|p| Regex::new(p).expect("valid pattern"))
            .collect()
    }
    vec![
        (
            "electrical",
            compile(&[
                r"(?i)electrical",
                r"(?i)switchboard",
                r"(?i)cabling",
                r"(?i)AS/?NZS\s*3000",
            ]),
        ),
        (
            "mechanical",
            compile(&[
                r"(?i)mechanical",
                r"(?i)\bHVAC\b",
                r"(?i)ductwork",
                r"(?i)ventilation",
            ]),
        ),
        (
            "structural",
            compile(&[
                r"(?i)structural",
                r"(?i)reinforcement",
                r"(?i)concrete",
                r"(?i)steelwork",
            ]),
        ),
        (
            "hydraulic",
            compile(&[
                r"(?i)hydraulic",
                r"(?i)plumbing",
                r"(?i)drainage",
                r"(?i)stormwater",
            ]),
        ),
        (
            "fire",
            compile(&[
                r"(?i)fire\s+(?:protection|services|systems)",
                r"(?i)sprinkler",
                r"(?i)hydrant",
            ]),
        ),
    ]
});

static SECTION_REFERENCE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?im)(?:CLAUSE|SECTION|PART)\s+\d+(?:\.\d+)*",
        r"(?m)^\d+\.\d+(?:\.\d+)*\s",
        r"(?im)APPENDIX\s+[A-Z]\b",
        r"(?im)SCHEDULE\s+\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid pattern"))
    .collect()
});

static REVISION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^a-z0-9])(rev(?:ision)?[\s._-]?(?:[a-z]|\d+)|v\d+(?:\.\d+)?)\b")
        .expect("valid pattern")
});

static DATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{2,4}|20\d{2})\b").expect("valid pattern")
});

/// Whether a line looks like a structural heading (clause, section, part,
/// appendix, schedule, attachment, or numbered-title markers).
pub fn is_section_boundary(line: &str) -> bool {
    let line = line.trim();
    SECTION_BOUNDARY.iter().any(|re| re.is_match(line))
}

/// Extract normalized domain-standard references, sorted and deduplicated.
pub fn extract_standards(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for re in STANDARD_REFERENCE.iter() {
        for m in re.find_iter(text) {
            let normalized = m
                .as_str()
                .trim()
                .to_uppercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .replace("/ ", "/");
            if !found.contains(&normalized) {
                found.push(normalized);
            }
        }
    }
    found.sort();
    found
}

/// Classify document type from the leading text. Returns `(type, confidence)`
/// where confidence is the winning type's share of all pattern matches.
pub fn classify_document(text: &str) -> (String, f64) {
    let sample = head(text, 5_000);
    let mut scores: Vec<(&str, usize)> = Vec::new();
    for (doc_type, patterns) in DOC_TYPE_PATTERNS.iter() {
        let score: usize = patterns.iter().map(|re| re.find_iter(sample).count()).sum();
        if score > 0 {
            scores.push((doc_type, score));
        }
    }

    if scores.is_empty() {
        return ("general".to_string(), 0.0);
    }

    let total: usize = scores.iter().map(|(_, s)| s).sum();
    let (best, best_score) = scores
        .iter()
        .max_by_key(|(_, s)| *s)
        .copied()
        .expect("scores is non-empty");
    let confidence = (best_score as f64 / total.max(1) as f64).min(1.0);
    (best.to_string(), (confidence * 1000.0).round() / 1000.0)
}

/// Detect the dominant discipline, if any pattern matches.
pub fn detect_discipline(text: &str) -> Option<String> {
    let sample = head(text, 10_000);
    DISCIPLINE_PATTERNS
        .iter()
        .map(|(discipline, patterns)| {
            let score: usize = patterns.iter().map(|re| re.find_iter(sample).count()).sum();
            (*discipline, score)
        })
        .filter(|(_, score)| *score > 0)
        .max_by_key(|(_, score)| *score)
        .map(|(discipline, _)| discipline.to_string())
}

/// Extract the primary section reference from the leading text.
pub fn extract_section_reference(text: &str) -> Option<String> {
    let sample = head(text, 500);
    SECTION_REFERENCE
        .iter()
        .find_map(|re| re.find(sample))
        .map(|m| m.as_str().trim().to_string())
}

/// Extract a revision token (`Rev B`, `rev2`, `v3.1`, …) if present.
pub fn extract_revision_token(text: &str) -> Option<String> {
    REVISION_TOKEN.captures(text).map(|caps| {
        caps[1]
            .to_uppercase()
            .replace([' ', '.', '_', '-'], "")
    })
}

/// Whether the text carries anything that looks like a date.
pub fn contains_date(text: &str) -> bool {
    DATE_TOKEN.is_match(text)
}

/// Filename with any extension and revision token stripped, for
/// superseded-version comparison.
pub fn base_filename(filename: &str) -> String {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    let stripped = REVISION_TOKEN.replace_all(stem, "");
    stripped
        .trim_matches(|c: char| c.is_whitespace() || "._-".contains(c))
        .to_lowercase()
}

/// Full classification pass over a chunk's text.
pub fn classify_chunk(text: &str) -> ClassificationMetadata {
    let (doc_type, doc_type_confidence) = classify_document(text);
    ClassificationMetadata {
        doc_type,
        doc_type_confidence,
        discipline: detect_discipline(text),
        section_reference: extract_section_reference(text),
        standards_referenced: extract_standards(text),
    }
}

/// First `limit` bytes of `text`, backed off to a char boundary.
fn head(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
