use serde::Serialize;
use serde_json::Value;

/// One normalized alert document. The shape is fixed regardless of which
/// fields the indexed document carried.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRow {
    pub id: Option<String>,
    pub timestamp: Option<String>,
    pub agent_id: String,
    pub agent_name: String,
    pub manager_name: String,
    pub rule_id: Value,
    pub rule_level: Value,
    pub rule_description: String,
    /// Passed through as indexed, entries need not be strings.
    pub groups: Vec<Value>,
    #[serde(flatten)]
    pub detail: RowDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowDetail {
    Hunting(HuntingDetail),
    Fim(FimDetail),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HuntingDetail {
    pub location: String,
    pub full_log: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FimDetail {
    pub username: String,
    pub syscheck_path: Option<String>,
    pub syscheck_event: Option<String>,
    pub file_diff: Option<String>,
}

impl ResultRow {
    pub fn fim(&self) -> Option<&FimDetail> {
        match &self.detail {
            RowDetail::Fim(detail) => Some(detail),
            RowDetail::Hunting(_) => None,
        }
    }

    /// Numeric severity, accepting both numeric and numeric-string levels.
    pub fn level(&self) -> Option<i64> {
        match &self.rule_level {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn rule_id_text(&self) -> String {
        plain_text(&self.rule_id)
    }

    pub fn rule_level_text(&self) -> String {
        plain_text(&self.rule_level)
    }
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HuntingResponse {
    pub success: bool,
    pub page: u64,
    pub size: u64,
    pub total: u64,
    pub data: Vec<ResultRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FimEventsResponse {
    pub success: bool,
    pub data: Vec<ResultRow>,
    pub total_hits: u64,
}
