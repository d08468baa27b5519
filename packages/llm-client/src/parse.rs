//! Tolerant JSON extraction from model output.
//!
//! Provider output is adversarial by accident: prose prefaces, markdown code
//! fences, trailing commentary, schema drift. These helpers recover the JSON
//! payload from the common failure shapes without ever panicking.

/// Strip a markdown code fence (```json ... ``` or ``` ... ```) wrapping the
/// content, if present. Returns the inner text trimmed; otherwise the input
/// trimmed.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the optional language tag on the fence line.
    let body = match rest.split_once('\n') {
        Some((_lang, body)) => body,
        None => rest,
    };

    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Extract the outermost `{...}` span by brace matching.
///
/// String literals and escapes are respected so braces inside JSON string
/// values do not unbalance the scan. Returns `None` when no complete object
/// is present.
pub fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let bytes = content.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Best-effort parse of model output into a JSON value.
///
/// Cascade: direct parse, then fence stripping, then outermost-brace
/// extraction. Returns `None` when nothing parseable remains.
pub fn parse_lenient(content: &str) -> Option<serde_json::Value> {
    if let Ok(value) = serde_json::from_str(content) {
        return Some(value);
    }

    let unfenced = strip_code_fences(content);
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Some(value);
    }

    let span = extract_json_object(unfenced)?;
    serde_json::from_str(span).ok()
}
