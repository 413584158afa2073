//! Error formatting utilities
//!
//! Renders errors together with their source chain for operator logs.

use crate::Error;
use std::error::Error as StdError;

/// Format any error with its nested causes.
///
/// Causes already contained in the rendered text are skipped, so
/// `thiserror` messages that embed their source are not repeated.
pub fn format_error(error: &(dyn StdError + 'static)) -> String {
    let mut result = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        let cause_str = cause.to_string();
        if !result.contains(&cause_str) {
            result = format!("{} (caused by {})", result, cause_str);
        }
        source = cause.source();
    }

    result
}

/// Format error for structured logging
pub fn format_error_for_logging(error: &Error) -> serde_json::Value {
    let mut log_data = serde_json::json!({
        "message": format_error(error),
        "category": error.category(),
    });

    match error {
        Error::Config { field, .. } => {
            log_data["field"] = serde_json::Value::String(field.clone());
        }
        Error::InvalidProxy { entry, .. } => {
            log_data["entry"] = serde_json::Value::String(entry.clone());
        }
        Error::NoActiveGroup { prefix } => {
            log_data["prefix"] = serde_json::Value::String(prefix.clone());
        }
        _ => {}
    }

    log_data
}
