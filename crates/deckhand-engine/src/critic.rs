use deckhand_core::issues::Issue;
use deckhand_core::report::{PenaltyBreakdown, QualityCounts, QualityReport, WarningCategoryCounts};
use deckhand_core::tools::ToolResult;

pub const MAX_CORRECTION_TARGETS: usize = 6;

// Penalty model. All weights live here so tuning stays one edit.
const CRITICAL_ISSUE_PENALTY: f64 = 10.0;
const WARNING_ISSUE_PENALTY: f64 = 4.0;
const WARNING_PENALTY_CAP: f64 = 35.0;
const REWRITE_PENALTY: f64 = 0.35;
const REWRITE_PENALTY_CAP: f64 = 10.0;
const CORRECTION_PASS_PENALTY: f64 = 1.5;
const CORRECTION_PASS_PENALTY_CAP: f64 = 6.0;

const TRIMMED_WARNING_PENALTY: f64 = 0.45;
const MISSING_SLOT_WARNING_PENALTY: f64 = 1.8;
const KEYWORD_ALIGNMENT_WARNING_PENALTY: f64 = 1.2;
const FALLBACK_WARNING_PENALTY: f64 = 2.8;
const OTHER_WARNING_PENALTY: f64 = 0.8;

const FAILURE_TOKENS: &[&str] = &["fallback", "failed", "invalid", "overflow", "error", "unknown"];

/// Pool issues from any number of QA tool results, in result order.
pub fn collect_issues(tool_results: &[&ToolResult]) -> Vec<Issue> {
    tool_results
        .iter()
        .flat_map(|result| result.issues())
        .collect()
}

/// Warning texts come from providers and fallbacks outside this crate's
/// control, so classification is substring-based. First match wins.
fn classify_warning(text: &str) -> (f64, fn(&mut WarningCategoryCounts)) {
    let lower = text.to_lowercase();
    if lower.contains("trimmed slot") {
        (TRIMMED_WARNING_PENALTY, |c| c.trimmed += 1)
    } else if lower.contains("filled missing slot") || lower.contains("missing slot") {
        (MISSING_SLOT_WARNING_PENALTY, |c| c.missing_slot += 1)
    } else if lower.contains("low title/body keyword alignment") {
        (KEYWORD_ALIGNMENT_WARNING_PENALTY, |c| c.keyword_alignment += 1)
    } else if FAILURE_TOKENS.iter().any(|token| lower.contains(token)) {
        (FALLBACK_WARNING_PENALTY, |c| c.fallback_or_failure += 1)
    } else {
        (OTHER_WARNING_PENALTY, |c| c.other += 1)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score a job's output: 100 minus additive penalties for issues,
/// warnings (capped), rewrites (capped), and correction passes (capped),
/// floored at zero.
pub fn score(
    issues: &[Issue],
    warnings: &[String],
    rewrites_applied: u32,
    correction_passes_used: u32,
) -> QualityReport {
    let mut critical_issues = 0u32;
    let mut warning_issues = 0u32;
    let mut issue_penalty = 0.0;
    for issue in issues {
        if issue.is_critical() {
            critical_issues += 1;
            issue_penalty += CRITICAL_ISSUE_PENALTY;
        } else {
            warning_issues += 1;
            issue_penalty += WARNING_ISSUE_PENALTY;
        }
    }

    let mut categories = WarningCategoryCounts::default();
    let mut warning_penalty = 0.0;
    let mut warnings_total = 0u32;
    for warning in warnings {
        if warning.trim().is_empty() {
            continue;
        }
        warnings_total += 1;
        let (penalty, bump) = classify_warning(warning);
        warning_penalty += penalty;
        bump(&mut categories);
    }
    let warning_penalty = warning_penalty.min(WARNING_PENALTY_CAP);

    let rewrite_penalty = (rewrites_applied as f64 * REWRITE_PENALTY).min(REWRITE_PENALTY_CAP);
    let correction_penalty =
        (correction_passes_used as f64 * CORRECTION_PASS_PENALTY).min(CORRECTION_PASS_PENALTY_CAP);

    let total = issue_penalty + warning_penalty + rewrite_penalty + correction_penalty;
    let score = ((100.0 - total).max(0.0) * 10.0).round() / 10.0;

    QualityReport {
        score,
        penalties: PenaltyBreakdown {
            issues: round2(issue_penalty),
            warnings: round2(warning_penalty),
            rewrites: round2(rewrite_penalty),
            correction_passes: round2(correction_penalty),
            total: round2(total),
        },
        counts: QualityCounts {
            critical_issues,
            warning_issues,
            warnings_total,
            rewrites_applied,
            correction_passes_used,
            warning_categories: categories,
        },
    }
}

/// Slides to regenerate this pass: critical issues take the pool when any
/// exist, otherwise all issues; first mention wins per slide, capped.
pub fn correction_targets(issues: &[Issue]) -> Vec<usize> {
    let has_critical = issues.iter().any(Issue::is_critical);
    let pool: Vec<&Issue> = if has_critical {
        issues.iter().filter(|i| i.is_critical()).collect()
    } else {
        issues.iter().collect()
    };

    let mut seen = std::collections::HashSet::new();
    let mut ordered = Vec::new();
    for issue in pool {
        if !seen.insert(issue.slide_index) {
            continue;
        }
        ordered.push(issue.slide_index);
        if ordered.len() >= MAX_CORRECTION_TARGETS {
            break;
        }
    }
    ordered
}

/// The pass budget is checked before criticality, so an exhausted budget
/// ends the loop even with critical issues outstanding.
pub fn should_continue(issues: &[Issue], passes_used: u32, max_passes: u32) -> bool {
    if passes_used >= max_passes {
        return false;
    }
    issues.iter().any(Issue::is_critical)
}
