//! Payload validation and normalisation for create/update.

use crate::error::AppError;
use serde_json::{Number, Value};

pub struct RequestValidator;

impl RequestValidator {
    /// Required fields must be present, non-null and not an empty string.
    pub fn validate_required<'f, 'v>(
        fields: impl IntoIterator<Item = &'f str>,
        lookup: impl Fn(&str) -> Option<&'v Value>,
    ) -> Result<(), AppError> {
        for field in fields {
            let missing = match lookup(field) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if missing {
                return Err(AppError::Validation(format!("Field '{}' is required", field)));
            }
        }
        Ok(())
    }

    /// Fields declared non-zero reject a value that is numerically zero.
    pub fn validate_no_zero(field: &str, value: &Value) -> Result<(), AppError> {
        let zero = match value {
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.trim().parse::<f64>().map(|f| f == 0.0).unwrap_or(false),
            _ => false,
        };
        if zero {
            return Err(AppError::Validation(format!("Field '{}' cannot be zero", field)));
        }
        Ok(())
    }

    /// Value bound for a numeric column. Numbers pass unchanged; strings may only carry
    /// surrounding whitespace and become numbers.
    pub fn sanitize_numeric(label: &str, value: &Value) -> Result<Value, AppError> {
        match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(AppError::Validation(format!("Field '{}' expects a numeric value", label)));
                }
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Ok(Value::Number(i.into()));
                }
                match trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
                    Some(n) => Ok(Value::Number(n)),
                    None => Err(AppError::Validation(format!(
                        "Field '{}' has invalid formatting (spaces or extra characters)",
                        label
                    ))),
                }
            }
            _ => Err(AppError::Validation(format!("Field '{}' expects a numeric value", label))),
        }
    }

    /// Switch values: on/1/true (any case) are set, anything else is clear. Native boolean
    /// columns get a JSON bool, everything else 1 or 0.
    pub fn normalize_toggle(value: &Value, boolean_column: bool) -> Value {
        let text = crate::db::display_value(value).trim().to_lowercase();
        let set = matches!(text.as_str(), "on" | "1" | "true");
        if boolean_column {
            Value::Bool(set)
        } else {
            Value::from(i64::from(set))
        }
    }
}
