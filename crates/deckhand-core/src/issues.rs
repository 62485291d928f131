use serde::{Deserialize, Deserializer, Serialize};

/// How bad an issue is. Critical issues drive correction passes; warnings
/// only affect the score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    #[default]
    Warning,
}

impl Severity {
    /// Case-insensitive parse. Anything unrecognized is treated as a
    /// warning rather than rejected.
    pub fn parse_lenient(text: &str) -> Self {
        if text.eq_ignore_ascii_case("critical") {
            Self::Critical
        } else {
            Self::Warning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Warning => "warning",
        }
    }
}

// Issue rows come from tool payloads whose producers are not all in this
// workspace, so severity decoding goes through parse_lenient rather than
// the strict derive.
impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&text))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    #[default]
    MissingContent,
    OverflowRisk,
}

impl IssueKind {
    /// Case-insensitive parse; anything that is not an overflow risk is
    /// treated as missing content.
    pub fn parse_lenient(text: &str) -> Self {
        if text.eq_ignore_ascii_case("overflow_risk") {
            Self::OverflowRisk
        } else {
            Self::MissingContent
        }
    }
}

impl<'de> Deserialize<'de> for IssueKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&text))
    }
}

/// A QA finding tied to one slide. Detail fields are populated by whichever
/// check produced the issue and omitted otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub slide_index: usize,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub kind: IssueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_slots: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citation_format: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
}

impl Issue {
    pub fn new(slide_index: usize, severity: Severity, kind: IssueKind) -> Self {
        Self {
            slide_index,
            severity,
            kind,
            slot: None,
            missing_slots: Vec::new(),
            unresolved_tokens: Vec::new(),
            citation_format: Vec::new(),
            char_count: None,
            budget: None,
            ratio: None,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    /// Decode a list of issues from a tool payload, skipping rows that do
    /// not deserialize instead of failing the whole list.
    pub fn decode_list(value: &serde_json::Value) -> Vec<Issue> {
        value
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| serde_json::from_value(row.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_parse_lenient() {
        assert_eq!(Severity::parse_lenient("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::parse_lenient("Critical"), Severity::Critical);
        assert_eq!(Severity::parse_lenient("warning"), Severity::Warning);
        assert_eq!(Severity::parse_lenient("???"), Severity::Warning);
        assert_eq!(Severity::parse_lenient(""), Severity::Warning);
    }

    #[test]
    fn issue_serde_round_trip() {
        let issue = Issue {
            slot: Some("BODY".into()),
            char_count: Some(500),
            budget: Some(420),
            ratio: Some(1.19),
            ..Issue::new(4, Severity::Warning, IssueKind::OverflowRisk)
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["kind"], "overflow_risk");
        let back: Issue = serde_json::from_value(json).unwrap();
        assert_eq!(back, issue);
    }

    #[test]
    fn decode_list_skips_malformed_rows() {
        let payload = json!([
            {"slide_index": 0, "severity": "critical", "kind": "missing_content",
             "missing_slots": ["BODY"]},
            {"slide_index": "not a number"},
            42,
            {"slide_index": 1, "severity": "warning", "kind": "overflow_risk"}
        ]);
        let issues = Issue::decode_list(&payload);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].missing_slots, vec!["BODY"]);
        assert_eq!(issues[1].slide_index, 1);
    }

    #[test]
    fn decode_list_accepts_loose_severity_spellings() {
        let payload = json!([
            {"slide_index": 0, "severity": "Critical", "kind": "missing_content"},
            {"slide_index": 1, "severity": "blocker", "kind": "overflow_risk"},
            {"slide_index": 2, "kind": "missing_content"}
        ]);
        let issues = Issue::decode_list(&payload);
        assert_eq!(issues.len(), 3);
        assert!(issues[0].is_critical());
        assert_eq!(issues[1].severity, Severity::Warning);
        assert_eq!(issues[2].severity, Severity::Warning);
    }

    #[test]
    fn decode_list_defaults_kind_for_sparse_rows() {
        let payload = json!([
            {"slide_index": 3, "severity": "critical"},
            {"slide_index": 4, "severity": "warning", "kind": "layout_bleed"}
        ]);
        let issues = Issue::decode_list(&payload);
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].kind, IssueKind::MissingContent);
        assert_eq!(issues[1].kind, IssueKind::MissingContent);
    }

    #[test]
    fn decode_list_of_non_array_is_empty() {
        assert!(Issue::decode_list(&json!({"issues": []})).is_empty());
        assert!(Issue::decode_list(&json!(null)).is_empty());
    }
}
