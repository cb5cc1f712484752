use serde_json::{Map, Value};

use super::{Category, Classification, SchemaVariant, Signal};
use crate::error::{Result, SchemaIssue, TriageError};

const ENVELOPE_FIELD: &str = "classifications";

/// Strip at most one level of object wrapping around the result array: the
/// `classifications` field when present, or the only field of a single-field
/// object when that field holds an array. Anything else is returned unchanged.
pub fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            if let Some(inner) = map.remove(ENVELOPE_FIELD) {
                return inner;
            }
            if map.len() == 1 && map.values().all(Value::is_array) {
                return map.into_values().next().unwrap_or_default();
            }
            Value::Object(map)
        }
        other => other,
    }
}

/// Parse raw model output into validated classifications. The whole array
/// is accepted or rejected together.
pub fn parse_response(content: &str, variant: SchemaVariant) -> Result<Vec<Classification>> {
    if content.trim().is_empty() {
        return Err(TriageError::EmptyResponse);
    }
    let value: Value = serde_json::from_str(content).map_err(|e| TriageError::Schema {
        issues: vec![issue("", format!("response is not valid JSON: {e}"))],
    })?;
    validate(&unwrap_envelope(value), variant).map_err(|issues| {
        log::error!(
            "Classification response failed validation: {}",
            issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        );
        TriageError::Schema { issues }
    })
}

/// Check `value` against the schema variant, collecting every issue found.
pub fn validate(
    value: &Value,
    variant: SchemaVariant,
) -> std::result::Result<Vec<Classification>, Vec<SchemaIssue>> {
    let Some(items) = value.as_array() else {
        return Err(vec![issue("", format!("expected an array, found {}", kind(value)))]);
    };
    if items.is_empty() {
        return Err(vec![issue("", "expected at least one classification")]);
    }

    let mut issues = Vec::new();
    let mut out = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let path = format!("[{index}]");
        let parsed = match variant {
            SchemaVariant::Scored => validate_scored(item, &path, &mut issues),
            SchemaVariant::Actionable => validate_actionable(item, &path, &mut issues),
        };
        if let Some(classification) = parsed {
            out.push(classification);
        }
    }

    if issues.is_empty() {
        Ok(out)
    } else {
        Err(issues)
    }
}

fn validate_scored(item: &Value, path: &str, issues: &mut Vec<SchemaIssue>) -> Option<Classification> {
    let object = as_object(item, path, issues)?;
    let id = string_field(object, "id", path, issues);
    let category = category_field(object, path, SchemaVariant::Scored, issues);
    let confidence = match object.get("confidence") {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(c) if (0.0..=1.0).contains(&c) => Some(c),
            _ => {
                issues.push(issue(
                    format!("{path}.confidence"),
                    format!("must be between 0 and 1, found {n}"),
                ));
                None
            }
        },
        other => {
            issues.push(type_issue(path, "confidence", "number", other));
            None
        }
    };
    let reasoning = string_field(object, "reasoning", path, issues);

    Some(Classification {
        id: id?,
        category: category?,
        signal: Signal::Confidence {
            confidence: confidence?,
        },
        reasoning: reasoning?,
    })
}

fn validate_actionable(
    item: &Value,
    path: &str,
    issues: &mut Vec<SchemaIssue>,
) -> Option<Classification> {
    let object = as_object(item, path, issues)?;
    let id = string_field(object, "emailId", path, issues);

    let inner_path = format!("{path}.classification");
    let inner = match object.get("classification") {
        Some(value) => as_object(value, &inner_path, issues),
        None => {
            issues.push(issue(inner_path.clone(), "required"));
            None
        }
    };
    let inner = inner?;
    let category = category_field(inner, &inner_path, SchemaVariant::Actionable, issues);
    let summary = string_field(inner, "summary", &inner_path, issues);
    let actionable = match inner.get("actionable") {
        Some(Value::Bool(b)) => Some(*b),
        other => {
            issues.push(type_issue(&inner_path, "actionable", "boolean", other));
            None
        }
    };

    Some(Classification {
        id: id?,
        category: category?,
        signal: Signal::Actionable {
            actionable: actionable?,
        },
        reasoning: summary?,
    })
}

fn as_object<'a>(
    value: &'a Value,
    path: &str,
    issues: &mut Vec<SchemaIssue>,
) -> Option<&'a Map<String, Value>> {
    match value.as_object() {
        Some(object) => Some(object),
        None => {
            issues.push(issue(path, format!("expected an object, found {}", kind(value))));
            None
        }
    }
}

fn string_field(
    object: &Map<String, Value>,
    field: &str,
    path: &str,
    issues: &mut Vec<SchemaIssue>,
) -> Option<String> {
    match object.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        other => {
            issues.push(type_issue(path, field, "string", other));
            None
        }
    }
}

fn category_field(
    object: &Map<String, Value>,
    path: &str,
    variant: SchemaVariant,
    issues: &mut Vec<SchemaIssue>,
) -> Option<Category> {
    let name = string_field(object, "category", path, issues)?;
    match Category::parse(&name).filter(|c| variant.categories().contains(c)) {
        Some(category) => Some(category),
        None => {
            let allowed: Vec<&str> = variant.categories().iter().map(|c| c.as_str()).collect();
            issues.push(issue(
                format!("{path}.category"),
                format!("invalid value {name:?}, expected one of {}", allowed.join(" | ")),
            ));
            None
        }
    }
}

fn type_issue(path: &str, field: &str, expected: &str, found: Option<&Value>) -> SchemaIssue {
    let message = match found {
        None => "required".to_string(),
        Some(value) => format!("expected {expected}, found {}", kind(value)),
    };
    issue(format!("{path}.{field}"), message)
}

fn issue(path: impl Into<String>, message: impl Into<String>) -> SchemaIssue {
    SchemaIssue {
        path: path.into(),
        message: message.into(),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
