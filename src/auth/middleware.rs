use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use super::jwt::TokenError;
use super::{AuthContext, Claims};
use crate::app::AppState;
use crate::error::ErrorResponse;
use crate::services::cache::keys as cache_keys;

/// Extractor that requires a valid, non-revoked bearer token
///
/// ```ignore
/// async fn protected_route(auth: RequireAuth) -> impl IntoResponse {
///     format!("Hello, user {}", auth.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl std::ops::Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Like `RequireAuth`, but only for candidate accounts
#[derive(Debug, Clone)]
pub struct RequireCandidato(pub AuthContext);

impl std::ops::Deref for RequireCandidato {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Like `RequireAuth`, but only for institution accounts
#[derive(Debug, Clone)]
pub struct RequireInstituicao(pub AuthContext);

impl std::ops::Deref for RequireInstituicao {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Auth for public routes that show more to some callers. No header means
/// anonymous; a header with a bad token is still rejected.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<AuthContext>);

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
    ExpiredToken,
    Revoked,
    /// The denylist could not be read
    Unavailable,
    WrongAccountType(&'static str),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing authorization token",
            ),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid authorization format",
            ),
            AuthError::InvalidToken | AuthError::Revoked => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or expired token",
            ),
            AuthError::ExpiredToken => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", "Token expired"),
            AuthError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "Authentication is temporarily unavailable",
            ),
            AuthError::WrongAccountType(message) => (StatusCode::FORBIDDEN, "FORBIDDEN", *message),
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            errors: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Logged out (by `jti`) or issued before the user's sessions were cut off
async fn is_revoked(
    state: &AppState,
    claims: &Claims,
    context: &AuthContext,
) -> anyhow::Result<bool> {
    if state
        .cache
        .try_get::<bool>(&cache_keys::revoked_token(&claims.jti))
        .await?
        .unwrap_or(false)
    {
        return Ok(true);
    }

    let cutoff = state
        .cache
        .try_get::<i64>(&cache_keys::revoked_before(context.user_id))
        .await?;
    Ok(cutoff.is_some_and(|cutoff| claims.iat <= cutoff))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|rejection| {
                    if rejection.is_missing() {
                        AuthError::MissingToken
                    } else {
                        AuthError::InvalidFormat
                    }
                })?;

        let token = bearer.token();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = state.tokens.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "JWT verification failed");
            match e {
                TokenError::Expired => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            }
        })?;

        let context = AuthContext::from_claims(&claims).map_err(|e| {
            tracing::warn!(error = %e, "Failed to build auth context");
            AuthError::InvalidToken
        })?;

        match is_revoked(state, &claims, &context).await {
            Ok(false) => {}
            Ok(true) => return Err(AuthError::Revoked),
            Err(e) => {
                tracing::error!(error = %e, "Token denylist unreachable");
                return Err(AuthError::Unavailable);
            }
        }

        Ok(RequireAuth(context))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireCandidato {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(context) = RequireAuth::from_request_parts(parts, state).await?;
        if !context.is_candidato() {
            return Err(AuthError::WrongAccountType(
                "Esta ação é exclusiva para candidatos.",
            ));
        }
        Ok(RequireCandidato(context))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireInstituicao {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(context) = RequireAuth::from_request_parts(parts, state).await?;
        if !context.is_instituicao() {
            return Err(AuthError::WrongAccountType(
                "Esta ação é exclusiva para instituições.",
            ));
        }
        Ok(RequireInstituicao(context))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for OptionalAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(OptionalAuth(None));
        }
        let RequireAuth(context) = RequireAuth::from_request_parts(parts, state).await?;
        Ok(OptionalAuth(Some(context)))
    }
}
