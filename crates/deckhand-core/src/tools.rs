use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::issues::Issue;
use crate::report::QualityProfile;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(45);

/// Runtime types a tool input field may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether a JSON value satisfies this declared type. JSON booleans do
    /// not count as integers, and integers satisfy a number declaration.
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// Declarative input contract for a tool: flat named fields with runtime
/// types, a required subset, and a switch for rejecting extras.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub properties: BTreeMap<String, PropertyType>,
    pub required: Vec<String>,
    pub additional_properties: bool,
}

impl ToolSchema {
    pub fn object() -> Self {
        Self {
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: false,
        }
    }

    pub fn property(mut self, name: impl Into<String>, ty: PropertyType) -> Self {
        self.properties.insert(name.into(), ty);
        self
    }

    pub fn require(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    pub fn allow_additional(mut self) -> Self {
        self.additional_properties = true;
        self
    }

    /// JSON-schema-shaped rendering, used when listing tools.
    pub fn to_json(&self) -> serde_json::Value {
        let props: serde_json::Map<String, serde_json::Value> = self
            .properties
            .iter()
            .map(|(name, ty)| {
                (
                    name.clone(),
                    serde_json::json!({ "type": ty.as_str() }),
                )
            })
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": props,
            "required": self.required,
            "additionalProperties": self.additional_properties,
        })
    }
}

/// Context handed to tools for each invocation.
#[derive(Clone, Debug)]
pub struct ToolContext {
    pub job_id: Option<String>,
    pub quality_profile: QualityProfile,
    pub timeout: Duration,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            job_id: None,
            quality_profile: QualityProfile::default(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

/// A single metric datum attached to a tool result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// The one shape every tool outcome is normalized into. Callers branch on
/// `ok` and never need to handle tool-specific failure modes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub ok: bool,
    pub summary: String,
    #[serde(default)]
    pub metrics: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ToolResult {
    pub fn success(summary: impl Into<String>) -> Self {
        Self {
            ok: true,
            summary: summary.into(),
            metrics: BTreeMap::new(),
            warnings: Vec::new(),
            error: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn failure(summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            summary: summary.into(),
            metrics: BTreeMap::new(),
            warnings: Vec::new(),
            error: Some(error.into()),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: MetricValue) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Issues carried in `payload.issues`, decoded leniently.
    pub fn issues(&self) -> Vec<Issue> {
        Issue::decode_list(&self.payload["issues"])
    }
}

/// Trait implemented by each tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> ToolSchema;

    async fn run(
        &self,
        input: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}
