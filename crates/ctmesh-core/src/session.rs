//! Session identifiers.

use crate::error::{CtmeshError, Result};

/// Checks that a session id is usable as a single directory name.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    let valid = !session_id.is_empty()
        && session_id != "."
        && session_id != ".."
        && !session_id.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(CtmeshError::InvalidSession(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids() {
        assert!(validate_session_id("3f1c2a9e-0b7d-4c55-9d0e-2b4a8f6e1c11").is_ok());
        assert!(validate_session_id("study_42").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id("..").is_err());
        assert!(validate_session_id("a/b").is_err());
        assert!(validate_session_id("a\\b").is_err());
    }
}
