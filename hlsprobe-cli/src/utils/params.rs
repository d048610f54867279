use crate::error::AppError;
use tracing::{debug, error};

/// Parses `key=value` strings into pairs.
///
/// Each string is split at its first `=`, so values may themselves contain `=`.
/// Surrounding whitespace around the key is dropped; an empty key is rejected.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` for any entry without `=` or with an empty key.
pub fn parse_params(params: &[String]) -> Result<Vec<(String, String)>, AppError> {
    debug!("Parsing {} parameters", params.len());

    let result: Result<Vec<(String, String)>, AppError> = params
        .iter()
        .map(|param| {
            let (key, value) = param.split_once('=').ok_or_else(|| {
                error!("Invalid param format: {param}");
                AppError::InvalidInput(format!("expected KEY=VALUE, got `{param}`"))
            })?;

            let key = key.trim();
            if key.is_empty() {
                return Err(AppError::InvalidInput(format!("empty key in `{param}`")));
            }
            debug!("Added parameter: key='{key}'");
            Ok((key.to_string(), value.to_string()))
        })
        .collect();

    if let Err(e) = &result {
        error!("Failed to parse parameters: {e}");
    }
    result
}
