use axum::http::HeaderMap;
use jsonwebtoken::{decode, DecodingKey, Validation};
use tracing::{debug, instrument, warn};

use super::types::GuestClaims;
use crate::shared::AppError;

/// Configuration for guest JWT operations
///
/// Tokens are issued by the guest login collaborator; this service only
/// verifies them on the self-service settlement path.
#[derive(Clone)]
pub struct TokenConfig {
    secret: String,
}

impl TokenConfig {
    pub fn new() -> Self {
        Self {
            secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "your-secret-key-change-in-production".to_string()),
        }
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Validates a JWT token and returns the claims if valid
    #[instrument(skip(self, token))]
    pub fn validate_token(&self, token: &str) -> Result<GuestClaims, AppError> {
        debug!("Decoding and validating JWT token");

        decode::<GuestClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_ref()),
            &Validation::default(),
        )
        .map(|data| {
            debug!(guest_id = data.claims.sub, exp = data.claims.exp, "JWT token decoded successfully");
            data.claims
        })
        .map_err(|e| {
            debug!(error = %e, "Failed to decode JWT token");
            AppError::Unauthorized("Invalid token".to_string())
        })
    }

    /// Resolves the guest id from an `Authorization: Bearer` header
    pub fn guest_id_from_headers(&self, headers: &HeaderMap) -> Result<i32, AppError> {
        let auth_header = headers
            .get("Authorization")
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| {
                warn!("Missing Authorization header in request");
                AppError::Unauthorized("Missing authorization header".to_string())
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            warn!("Invalid Authorization header format (expected Bearer token)");
            AppError::Unauthorized("Invalid authorization header format".to_string())
        })?;

        Ok(self.validate_token(token)?.sub)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl TokenConfig {
    /// Creates a guest token shaped like the ones the login collaborator issues
    pub fn create_token(&self, guest_id: i32, valid_for: chrono::Duration) -> String {
        let now = chrono::Utc::now();
        let claims = GuestClaims {
            sub: guest_id,
            exp: (now + valid_for).timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(self.secret.as_ref()),
        )
        .unwrap()
    }
}
