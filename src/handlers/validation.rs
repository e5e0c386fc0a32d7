use serde_json::Value;

use crate::error::{ValidationError, REQUIRED_FIELDS};
use crate::models::CreationRequest;

/// Parse a raw request body as JSON.
pub fn parse_body(raw: &str) -> Result<Value, ValidationError> {
    serde_json::from_str(raw).map_err(|e| ValidationError::InvalidJson(e.to_string()))
}

/// Check a creation request body and turn it into a typed request.
///
/// A field counts as missing when it is absent, `null`, `false`, `0` or an
/// empty string. `diet` must then be an array; an empty one is accepted.
pub fn validate_request(body: &Value) -> Result<CreationRequest, ValidationError> {
    let missing: Vec<&'static str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| !is_present(body.get(*field)))
        .collect();

    if !missing.is_empty() {
        log::warn!("⚠️ Rejected request, missing fields: {:?}", missing);
        return Err(ValidationError::MissingFields {
            missing,
            received: body.clone(),
        });
    }

    let diet = match &body["diet"] {
        Value::Array(items) => items.iter().map(as_text).collect(),
        other => {
            log::warn!("⚠️ Rejected request, diet is not an array: {}", other);
            return Err(ValidationError::DietNotArray {
                received: other.clone(),
            });
        }
    };

    Ok(CreationRequest {
        image_path: as_text(&body["imagePath"]),
        image_id: as_text(&body["imageId"]),
        user_id: as_text(&body["userId"]),
        language: as_text(&body["language"]),
        diet,
    })
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(_) => true,
    }
}

/// Strings as-is, anything else as its JSON text (ids may be numeric).
fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
