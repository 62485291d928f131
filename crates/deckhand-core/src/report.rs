use serde::{Deserialize, Serialize};

/// Quality/latency trade-off requested for a job. Controls how many
/// correction passes are allowed and whether visual QA runs at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityProfile {
    Fast,
    #[default]
    Balanced,
    HighFidelity,
}

impl QualityProfile {
    /// Case-insensitive parse; unknown input falls back to balanced.
    pub fn parse_lenient(text: &str) -> Self {
        match text.to_ascii_lowercase().as_str() {
            "fast" => Self::Fast,
            "high_fidelity" | "high-fidelity" => Self::HighFidelity,
            _ => Self::Balanced,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Balanced => "balanced",
            Self::HighFidelity => "high_fidelity",
        }
    }

    pub fn default_correction_passes(&self) -> u32 {
        match self {
            Self::Fast => 0,
            Self::Balanced => 1,
            Self::HighFidelity => 2,
        }
    }

    /// Fast skips the visual QA stage entirely.
    pub fn runs_visual_qa(&self) -> bool {
        !matches!(self, Self::Fast)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationMode {
    #[default]
    Generate,
    Revise,
}

/// Warning counts bucketed by the classifier categories.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningCategoryCounts {
    pub trimmed: u32,
    pub missing_slot: u32,
    pub keyword_alignment: u32,
    pub fallback_or_failure: u32,
    pub other: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PenaltyBreakdown {
    pub issues: f64,
    pub warnings: f64,
    pub rewrites: f64,
    pub correction_passes: f64,
    pub total: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCounts {
    pub critical_issues: u32,
    pub warning_issues: u32,
    pub warnings_total: u32,
    pub rewrites_applied: u32,
    pub correction_passes_used: u32,
    pub warning_categories: WarningCategoryCounts,
}

/// Final quality verdict for a job: a 0–100 score plus the penalty
/// breakdown that produced it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub score: f64,
    pub penalties: PenaltyBreakdown,
    pub counts: QualityCounts,
}
