//! HS256 token issuance and verification

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::Claims;
use crate::domain::auth::UserTipo;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    Invalid,

    #[error("failed to sign token")]
    Signing,
}

/// Token handed to clients after login or registration
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub token_type: &'static str,
    /// Seconds until expiry
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl_minutes: i64) -> Self {
        Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding_key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, user_id: Uuid, tipo: UserTipo, email: &str) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let exp = now + self.ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            tipo,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!("Failed to encode JWT: {}", e);
                TokenError::Signing
            })?;

        Ok(IssuedToken {
            token,
            token_type: "Bearer",
            expires_in: self.ttl.num_seconds(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Invalid,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-characters-long";

    #[test]
    fn issued_token_verifies_with_same_secret() {
        let service = TokenService::new(SECRET, 60);
        let user_id = Uuid::new_v4();

        let issued = service
            .issue(user_id, UserTipo::Candidato, "ana@example.com")
            .unwrap();
        assert_eq!(issued.expires_in, 3600);

        let claims = service.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.tipo, UserTipo::Candidato);
        assert_eq!(claims.email, "ana@example.com");
    }

    #[test]
    fn every_token_gets_its_own_jti() {
        let service = TokenService::new(SECRET, 60);
        let user_id = Uuid::new_v4();
        let a = service.issue(user_id, UserTipo::Instituicao, "a@b.com").unwrap();
        let b = service.issue(user_id, UserTipo::Instituicao, "a@b.com").unwrap();

        let ja = service.verify(&a.token).unwrap().jti;
        let jb = service.verify(&b.token).unwrap().jti;
        assert_ne!(ja, jb);
    }

    #[test]
    fn rejects_foreign_and_expired_tokens() {
        let service = TokenService::new(SECRET, 60);
        let other = TokenService::new("another-secret-key-that-is-long-enough!!", 60);
        let issued = other
            .issue(Uuid::new_v4(), UserTipo::Candidato, "x@y.com")
            .unwrap();
        assert_eq!(service.verify(&issued.token), Err(TokenError::Invalid));

        let expired = TokenService::new(SECRET, -5)
            .issue(Uuid::new_v4(), UserTipo::Candidato, "x@y.com")
            .unwrap();
        assert_eq!(service.verify(&expired.token), Err(TokenError::Expired));

        assert_eq!(service.verify("not-a-jwt"), Err(TokenError::Invalid));
    }
}
