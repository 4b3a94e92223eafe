use validator::Validate;

use crate::error::{AppError, AppResult};

/// Run the derived validators and fold every field error into one message
pub fn validate_request<T: Validate>(value: &T) -> AppResult<()> {
    value.validate().map_err(|e| {
        let mut errors = e
            .field_errors()
            .into_iter()
            .map(|(field, errors)| {
                let error_messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<String>>();
        errors.sort();

        AppError::InvalidInput(format!("Validation failed: {}", errors.join("; ")))
    })
}
