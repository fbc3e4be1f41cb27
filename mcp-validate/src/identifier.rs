//! Identifier and path shape checks.

use once_cell::sync::Lazy;
use regex::Regex;

use mcp_core::error::AppError;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_:-]{0,127}$").expect("valid regex"));

/// `^[A-Za-z_][A-Za-z0-9_:-]{0,127}$`; used for graph node keys, labels, and
/// relationship types.
pub fn validate_identifier(s: &str) -> Result<(), AppError> {
    if IDENTIFIER.is_match(s) {
        Ok(())
    } else {
        Err(AppError::invalid_token(
            format!("'{s}' is not a valid identifier"),
            s.to_string(),
        ))
    }
}

/// Relative, `..`-free, non-absolute path of at most 1024 bytes.
pub fn validate_path(s: &str) -> Result<(), AppError> {
    if s.len() > 1024 {
        return Err(AppError::invalid("path exceeds maximum length of 1024 bytes"));
    }
    let path = std::path::Path::new(s);
    if path.is_absolute() {
        return Err(AppError::invalid("path must be relative"));
    }
    if s.starts_with('/') || s.starts_with('\\') {
        return Err(AppError::invalid("path must be relative"));
    }
    // Windows drive-qualified roots (`C:\...`) are absolute on that platform
    // but not recognized as such by `Path::is_absolute` when compiled for
    // unix; check explicitly so the behavior doesn't depend on target OS.
    if s.len() >= 2 && s.as_bytes()[1] == b':' && s.as_bytes()[0].is_ascii_alphabetic() {
        return Err(AppError::invalid("path must not be drive-qualified"));
    }
    for segment in path.components() {
        if segment.as_os_str() == ".." {
            return Err(AppError::invalid("path must not contain a '..' segment"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_identifiers() {
        assert!(validate_identifier("Svc").is_ok());
        assert!(validate_identifier("CALLS").is_ok());
        assert!(validate_identifier("a-b:c_1").is_ok());
    }

    #[test]
    fn rejects_invalid_identifiers() {
        assert!(validate_identifier("1abc").is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier(&"a".repeat(200)).is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn accepts_relative_paths() {
        assert!(validate_path("src/main.rs").is_ok());
        assert!(validate_path("a/b/c.txt").is_ok());
    }

    #[test]
    fn rejects_traversal_and_absolute_paths() {
        assert!(validate_path("../etc/passwd").is_err());
        assert!(validate_path("a/../b").is_err());
        assert!(validate_path("/etc/passwd").is_err());
        assert!(validate_path("C:\\Windows").is_err());
        assert!(validate_path(&"a".repeat(2000)).is_err());
    }
}
