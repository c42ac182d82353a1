//! Pulls the trailing `{"x": .., "y": ..}` payload out of free-form model text.

use serde_json::Value;

use crate::errors::{WalkError, WalkResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedStep {
    pub x: f64,
    pub y: f64,
    /// Everything before the payload, trimmed.
    pub rationale: String,
}

/// Takes the text between the last `{` and the last `}` (inclusive) as the payload.
///
/// Nested objects therefore do not survive extraction; the payload is
/// expected to be a flat object at the very end of the reply.
pub fn extract_step(text: &str) -> WalkResult<ExtractedStep> {
    let (Some(start), Some(end)) = (text.rfind('{'), text.rfind('}')) else {
        return Err(WalkError::MissingStructuredOutput);
    };

    if end < start {
        return Err(WalkError::MalformedStructuredOutput {
            raw: String::new(),
            diagnostic: "closing brace precedes the last opening brace".into(),
        });
    }

    let raw = &text[start..=end];
    let malformed = |diagnostic: String| WalkError::MalformedStructuredOutput {
        raw: raw.to_string(),
        diagnostic,
    };

    let value: Value = serde_json::from_str(raw).map_err(|e| malformed(e.to_string()))?;
    let Value::Object(obj) = value else {
        return Err(malformed("expected a JSON object".into()));
    };

    let x = obj
        .get("x")
        .ok_or(WalkError::IncompleteStructuredOutput { missing: "x" })?;
    let y = obj
        .get("y")
        .ok_or(WalkError::IncompleteStructuredOutput { missing: "y" })?;

    Ok(ExtractedStep {
        x: as_coordinate(x).ok_or_else(|| malformed(format!("x is not a finite number: {x}")))?,
        y: as_coordinate(y).ok_or_else(|| malformed(format!("y is not a finite number: {y}")))?,
        rationale: text[..start].trim().to_string(),
    })
}

/// Numbers, or strings holding numbers.
fn as_coordinate(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}
