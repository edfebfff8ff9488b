// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway credential loading.
//!
//! The token file holds one opaque token. A single trailing newline is
//! tolerated; anything else that is not a printable, non-space character
//! makes the token invalid.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use warden_core::types::GatewayToken;

use crate::error::{ConfigError, ConfigResult};

/// Reads and validates the token stored at `path`.
pub fn load_token(path: impl AsRef<Path>) -> ConfigResult<GatewayToken> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ConfigError::file_not_found(path),
        _ => ConfigError::io(path, e),
    })?;

    let token = raw
        .strip_suffix("\r\n")
        .or_else(|| raw.strip_suffix('\n'))
        .unwrap_or(&raw);

    validate_token(token).map_err(|message| ConfigError::invalid_token(path, message))?;
    tracing::debug!(path = %path.display(), length = token.len(), "Loaded gateway token");
    Ok(GatewayToken::new(token))
}

/// Checks the token format.
pub fn validate_token(token: &str) -> Result<(), &'static str> {
    if token.is_empty() {
        return Err("token is empty");
    }
    if token.chars().any(char::is_whitespace) {
        return Err("token contains whitespace");
    }
    if token.chars().any(char::is_control) {
        return Err("token contains control characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("token.txt");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_token_trims_one_newline() {
        let dir = TempDir::new().unwrap();
        let token = load_token(write(&dir, "abc.def-123\n")).unwrap();
        assert_eq!(token.expose(), "abc.def-123");
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        let dir = TempDir::new().unwrap();
        for bad in ["", "\n", "two words", "tab\there", "bell\u{7}", "x\n\n"] {
            let err = load_token(write(&dir, bad)).unwrap_err();
            assert!(err.is_credential_error(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_missing_token_file() {
        let dir = TempDir::new().unwrap();
        let err = load_token(dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}
