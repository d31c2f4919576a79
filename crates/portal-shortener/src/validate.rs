use portal_core::{ShortCode, ShortenerError};
use url::Url;

/// Default scheme allow-list.
pub const DEFAULT_SCHEMES: [&str; 2] = ["http", "https"];

/// Checks that `raw` is an absolute URL with a host and an allowed scheme.
///
/// An empty `allowed_schemes` accepts any scheme. Scheme comparison is
/// case-insensitive.
pub fn validate_url(raw: &str, allowed_schemes: &[String]) -> Result<(), ShortenerError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| ShortenerError::InvalidUrl(format!("{raw}: {e}")))?;

    if url.host_str().is_none_or(str::is_empty) {
        return Err(ShortenerError::InvalidUrl(format!(
            "URL must have a host: {raw}"
        )));
    }

    let scheme = url.scheme();
    if !allowed_schemes.is_empty()
        && !allowed_schemes
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(scheme))
    {
        return Err(ShortenerError::UnsupportedScheme(scheme.to_string()));
    }

    Ok(())
}

/// Parses a client-supplied code.
pub fn validate_code(raw: &str) -> Result<ShortCode, ShortenerError> {
    Ok(ShortCode::new(raw)?)
}
