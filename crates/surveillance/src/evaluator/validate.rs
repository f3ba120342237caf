//! Killmail intake validation.

use killwatch_core::Killmail;
use serde::Deserialize;
use serde_json::Value;

/// A raw killmail that cannot be matched.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("killmail must be a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field 'victim' must be an object")]
    InvalidVictim,

    #[error("malformed killmail: {0}")]
    Malformed(#[from] serde_json::Error),
}

const REQUIRED_FIELDS: &[&str] = &["killmail_id", "killmail_time", "solar_system_id", "victim"];

/// Check the shape of a raw killmail and decode it into the normalized model.
pub fn validate_killmail(raw: &Value) -> Result<Killmail, ValidationError> {
    let obj = raw.as_object().ok_or(ValidationError::NotAnObject)?;

    for &field in REQUIRED_FIELDS {
        if obj.get(field).map_or(true, Value::is_null) {
            return Err(ValidationError::MissingField(field));
        }
    }
    if !obj.get("victim").is_some_and(Value::is_object) {
        return Err(ValidationError::InvalidVictim);
    }

    Ok(Killmail::deserialize(raw)?)
}
