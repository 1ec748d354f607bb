//! Readiness scoring over quality findings.
//!
//! Two distinct deduction tables apply depending on which stage produced
//! the findings: [`compute_readiness`] scores the primary quality-check
//! findings, while [`adjust_readiness`] applies a smaller, WARN-only
//! deduction for segmentation warnings arriving from the later chunking
//! stage. The asymmetry is intentional; do not unify the tables.

use crate::models::{Finding, FindingSummary, Severity};

/// Primary deduction per finding, by severity.
pub const DEDUCTION_CRITICAL: i64 = 40;
pub const DEDUCTION_WARN: i64 = 15;
pub const DEDUCTION_INFO: i64 = 5;

/// Adjustment deduction per WARN finding from the segmentation stage.
pub const ADJUST_DEDUCTION_WARN: i64 = 3;

fn deduction(severity: Severity) -> i64 {
    match severity {
        Severity::Critical => DEDUCTION_CRITICAL,
        Severity::Warn => DEDUCTION_WARN,
        Severity::Info => DEDUCTION_INFO,
    }
}

/// Score a batch of primary findings: start at 100, subtract the
/// per-severity deduction for each finding, clamp to `[0, 100]`.
pub fn compute_readiness(findings: &[Finding]) -> i64 {
    let mut score = 100i64;
    for finding in findings {
        score -= deduction(finding.severity);
    }
    score.clamp(0, 100)
}

/// Apply the segmentation-stage adjustment to an already-computed score:
/// 3 points per WARN finding, other severities ignored, clamped again.
pub fn adjust_readiness(base_score: i64, extra_findings: &[Finding]) -> i64 {
    let mut score = base_score;
    for finding in extra_findings {
        if finding.severity == Severity::Warn {
            score -= ADJUST_DEDUCTION_WARN;
        }
    }
    score.clamp(0, 100)
}

/// Count findings per severity. All three keys are always present.
pub fn summarize(findings: &[Finding]) -> FindingSummary {
    let mut summary = FindingSummary::default();
    for finding in findings {
        match finding.severity {
            Severity::Critical => summary.critical += 1,
            Severity::Warn => summary.warn += 1,
            Severity::Info => summary.info += 1,
        }
    }
    summary
}
