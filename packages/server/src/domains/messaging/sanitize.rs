use std::collections::HashMap;

/// Maximum length of a template variable value after sanitization
pub const MAX_VARIABLE_LEN: usize = 500;

/// Sanitize one template variable value: collapse internal whitespace and
/// newlines to single spaces, trim, cap at 500 characters. Returns None when
/// nothing remains.
///
/// Idempotent: sanitizing an already-sanitized value yields it unchanged.
pub fn sanitize_variable(value: &str) -> Option<String> {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut cleaned: String = collapsed.chars().take(MAX_VARIABLE_LEN).collect();
    // Truncation can land on a space; a trailing one would make a second
    // pass shrink the value again.
    let trimmed_len = cleaned.trim_end().len();
    cleaned.truncate(trimmed_len);

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Sanitize a message's template variable map, dropping entries whose value
/// is empty after sanitization. Non-string JSON values are stringified.
pub fn sanitize_variables(variables: Option<&serde_json::Value>) -> HashMap<String, String> {
    let Some(map) = variables.and_then(|v| v.as_object()) else {
        return HashMap::new();
    };

    map.iter()
        .filter_map(|(name, value)| {
            let raw = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            sanitize_variable(&raw).map(|clean| (name.clone(), clean))
        })
        .collect()
}
