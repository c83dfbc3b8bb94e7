//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::coordinator::SESSION_CODE_LEN;

/// Validates a session code: exactly six characters from `[A-Z0-9]`.
///
/// ```ignore
/// validate_session_code("K3X9QZ") // Ok
/// validate_session_code("k3x9qz") // Err - lowercase
/// validate_session_code("K3X9Q")  // Err - too short
/// ```
pub fn validate_session_code(code: &str) -> Result<(), ValidationError> {
    if code.len() != SESSION_CODE_LEN {
        let mut err = ValidationError::new("session_code_length");
        err.message = Some(
            format!(
                "Session code must be exactly {SESSION_CODE_LEN} characters (got {})",
                code.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        let mut err = ValidationError::new("session_code_format");
        err.message = Some("Session code must contain only A-Z and 0-9".into());
        return Err(err);
    }

    Ok(())
}

/// Rejects names made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_generated_codes() {
        assert!(validate_session_code("K3X9QZ").is_ok());
        assert!(validate_session_code("000000").is_ok());
        for _ in 0..32 {
            let code = crate::state::coordinator::generate_session_code();
            assert!(validate_session_code(&code).is_ok(), "{code}");
        }
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(validate_session_code("K3X9Q").is_err());
        assert!(validate_session_code("K3X9QZZ").is_err());
        assert!(validate_session_code("").is_err());
    }

    #[test]
    fn rejects_wrong_alphabet() {
        assert!(validate_session_code("k3x9qz").is_err());
        assert!(validate_session_code("K3X-QZ").is_err());
        assert!(validate_session_code("K3X QZ").is_err());
    }

    #[test]
    fn rejects_blank_names() {
        assert!(validate_not_blank("  ").is_err());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("Mika").is_ok());
    }
}
