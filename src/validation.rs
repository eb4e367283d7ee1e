use crate::error::AppError;

pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

pub fn require_at_least(field: &str, value: u64, min: u64) -> Result<(), AppError> {
    if value < min {
        return Err(AppError::Validation(format!(
            "{field} must be at least {min}, got {value}"
        )));
    }
    Ok(())
}

/// Trim, drop trailing slashes, and require an `http(s)://` URL with a host.
pub fn require_http_url(field: &str, value: &str) -> Result<String, AppError> {
    require_non_empty(field, value)?;
    let normalized = value.trim().trim_end_matches('/').to_string();
    let parsed = url::Url::parse(&normalized)
        .map_err(|e| AppError::Validation(format!("{field} is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "{field} must use http or https, got {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(AppError::Validation(format!("{field} must include a host")));
    }
    Ok(normalized)
}
