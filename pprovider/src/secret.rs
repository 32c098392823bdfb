//! Redacting wrapper for provider API keys.
//!
//! ```rust
//! use pprovider::SecretString;
//!
//! let key = SecretString::new("sk-live-123");
//! assert_eq!(key.expose(), "sk-live-123");
//! assert_eq!(format!("{key:?}"), "[REDACTED]");
//! ```

use crate::ProviderError;

#[derive(Clone, PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Reads a key from the named environment variable.
    pub fn from_env(variable: &str) -> Result<Self, ProviderError> {
        let value = std::env::var(variable).map_err(|_| {
            ProviderError::authentication(format!("environment variable '{variable}' is not set"))
        })?;

        if value.trim().is_empty() {
            return Err(ProviderError::authentication(format!(
                "environment variable '{variable}' is empty"
            )));
        }

        Ok(Self::new(value))
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // SAFETY: zero bytes are valid UTF-8.
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}
