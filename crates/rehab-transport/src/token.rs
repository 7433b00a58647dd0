//! Call token issuance.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use crate::server::ServerError;

/// API key and secret of the call provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderKeys {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderKeys")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Issues user tokens for the call provider.
pub trait TokenIssuer: Send + Sync {
    /// Create a token authenticating `user_id`.
    ///
    /// # Errors
    /// Returns error if the token cannot be signed.
    fn issue(&self, keys: &ProviderKeys, user_id: &str) -> Result<String, ServerError>;
}

/// HS256 JWT carrying `{"user_id": ...}`, signed with the API secret.
#[derive(Debug, Clone, Copy, Default)]
pub struct JwtIssuer;

impl TokenIssuer for JwtIssuer {
    fn issue(&self, keys: &ProviderKeys, user_id: &str) -> Result<String, ServerError> {
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
        let claims = URL_SAFE_NO_PAD.encode(json!({ "user_id": user_id }).to_string());
        let signing_input = format!("{header}.{claims}");

        let mut mac = Hmac::<Sha256>::new_from_slice(keys.api_secret.as_bytes())
            .map_err(|e| ServerError::Token(e.to_string()))?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{signature}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> ProviderKeys {
        ProviderKeys {
            api_key: "key".into(),
            api_secret: "secret".into(),
        }
    }

    #[test]
    fn test_jwt_claims_and_signature() {
        let token = JwtIssuer.issue(&keys(), "patient-001").unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims["user_id"], "patient-001");

        let mut mac = Hmac::<Sha256>::new_from_slice(b"secret").unwrap();
        mac.update(format!("{}.{}", parts[0], parts[1]).as_bytes());
        let signature = URL_SAFE_NO_PAD.decode(parts[2]).unwrap();
        assert!(mac.verify_slice(&signature).is_ok());
    }

    #[test]
    fn test_tokens_differ_per_user() {
        let a = JwtIssuer.issue(&keys(), "patient-001").unwrap();
        let b = JwtIssuer.issue(&keys(), "rehab-ai-agent").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_secret_redacted_in_debug() {
        assert!(!format!("{:?}", keys()).contains("\"secret\""));
    }
}
