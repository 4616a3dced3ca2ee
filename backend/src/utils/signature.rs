use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("access token is missing")]
    MissingToken,
    #[error("access token does not match")]
    TokenMismatch,
}

/// Constant-time comparison of a shared webhook token.
pub fn verify_shared_token(provided: Option<&str>, expected: &str) -> Result<(), SignatureError> {
    let provided = provided.ok_or(SignatureError::MissingToken)?;
    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(SignatureError::TokenMismatch)
    }
}
