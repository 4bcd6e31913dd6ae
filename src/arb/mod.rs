//! Sanity checks for ARB source documents before they are queued.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbValidation {
    pub valid: bool,
    pub issues: Vec<String>,
    pub key_count: usize,
}

/// Keys starting with `@` are metadata (`@@locale`, `@greeting`, ...).
pub fn is_metadata_key(key: &str) -> bool {
    key.starts_with('@')
}

pub fn validate(document: &Value) -> ArbValidation {
    let Some(entries) = document.as_object() else {
        return ArbValidation {
            valid: false,
            issues: vec!["Content must be a JSON object".to_string()],
            key_count: 0,
        };
    };

    let mut issues = Vec::new();
    if !entries.contains_key("@@locale") {
        issues.push("Missing @@locale metadata".to_string());
    }

    let mut key_count = 0;
    for (key, value) in entries {
        if is_metadata_key(key) {
            continue;
        }
        key_count += 1;
        let empty = match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        if empty {
            issues.push(format!("Empty value for key: {}", key));
        }
    }

    ArbValidation {
        valid: issues.is_empty(),
        issues,
        key_count,
    }
}
