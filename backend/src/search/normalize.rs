use serde_json::{Value, json};

use crate::models::events::{FimDetail, HuntingDetail, ResultRow, RowDetail};

pub const PLACEHOLDER: &str = "-";

/// Which extra columns a caller wants on top of the shared alert columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Threat hunting: location label and the raw log line.
    Hunting,
    /// File integrity monitoring: acting user and the file change.
    Fim,
}

impl Profile {
    fn missing_level(self) -> Value {
        match self {
            Profile::Hunting => json!(PLACEHOLDER),
            Profile::Fim => json!(0),
        }
    }
}

mod path {
    pub const TIMESTAMP: &str = "/@timestamp";
    pub const AGENT_ID: &str = "/agent/id";
    pub const AGENT_NAME: &str = "/agent/name";
    pub const MANAGER_NAME: &str = "/manager/name";
    pub const RULE_ID: &str = "/rule/id";
    pub const RULE_LEVEL: &str = "/rule/level";
    pub const RULE_DESCRIPTION: &str = "/rule/description";
    pub const RULE_GROUPS: &str = "/rule/groups";
    pub const LOCATION: &str = "/location";
    pub const DECODER_NAME: &str = "/decoder/name";
    pub const FULL_LOG: &str = "/full_log";
    pub const AUDIT_LOGIN_USER: &str = "/syscheck/audit/login_user/name";
    pub const OWNER_AFTER: &str = "/syscheck/uname_after";
    pub const OWNER: &str = "/syscheck/uname";
    pub const FILE_PATH: &str = "/syscheck/path";
    pub const FILE_EVENT: &str = "/syscheck/event";
    pub const FILE_DIFF: &str = "/syscheck/diff";
}

/// Flattens one `hits.hits[]` entry. Missing objects at any depth fall back to
/// the column placeholder.
pub fn normalize(hit: &Value, profile: Profile) -> ResultRow {
    let empty = Value::Null;
    let source = hit.get("_source").unwrap_or(&empty);

    let detail = match profile {
        Profile::Hunting => RowDetail::Hunting(HuntingDetail {
            location: first_text(source, &[path::LOCATION, path::DECODER_NAME])
                .unwrap_or_else(|| PLACEHOLDER.into()),
            full_log: text(source, path::FULL_LOG),
        }),
        // Login user first, then file owner after the change, then current
        // owner. Kept as an ordering policy.
        Profile::Fim => RowDetail::Fim(FimDetail {
            username: first_text(
                source,
                &[path::AUDIT_LOGIN_USER, path::OWNER_AFTER, path::OWNER],
            )
            .unwrap_or_else(|| PLACEHOLDER.into()),
            syscheck_path: text(source, path::FILE_PATH),
            syscheck_event: text(source, path::FILE_EVENT),
            file_diff: text(source, path::FILE_DIFF),
        }),
    };

    ResultRow {
        id: hit.get("_id").and_then(Value::as_str).map(str::to_string),
        timestamp: source
            .pointer(path::TIMESTAMP)
            .and_then(Value::as_str)
            .map(str::to_string),
        agent_id: text_or_placeholder(source, path::AGENT_ID),
        agent_name: text_or_placeholder(source, path::AGENT_NAME),
        manager_name: text_or_placeholder(source, path::MANAGER_NAME),
        rule_id: defined(source, path::RULE_ID).unwrap_or_else(|| json!(PLACEHOLDER)),
        rule_level: defined(source, path::RULE_LEVEL).unwrap_or_else(|| profile.missing_level()),
        rule_description: text_or_placeholder(source, path::RULE_DESCRIPTION),
        groups: source
            .pointer(path::RULE_GROUPS)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        detail,
    }
}

/// Non-empty strings and numbers count as present text.
fn text(source: &Value, pointer: &str) -> Option<String> {
    match source.pointer(pointer)? {
        Value::String(value) if !value.is_empty() => Some(value.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn first_text(source: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|pointer| text(source, pointer))
}

fn text_or_placeholder(source: &Value, pointer: &str) -> String {
    text(source, pointer).unwrap_or_else(|| PLACEHOLDER.into())
}

fn defined(source: &Value, pointer: &str) -> Option<Value> {
    source.pointer(pointer).filter(|value| !value.is_null()).cloned()
}
