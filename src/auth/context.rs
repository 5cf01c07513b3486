use super::Claims;
use crate::domain::auth::UserTipo;
use uuid::Uuid;

/// Authenticated user context extracted from JWT
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: Uuid,

    pub tipo: UserTipo,

    pub email: String,

    /// Token ID
    pub jti: String,

    /// Expiration (Unix timestamp)
    pub expires_at: i64,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;

        Ok(Self {
            user_id,
            tipo: claims.tipo,
            email: claims.email.clone(),
            jti: claims.jti.clone(),
            expires_at: claims.exp,
        })
    }

    pub fn is_candidato(&self) -> bool {
        self.tipo == UserTipo::Candidato
    }

    pub fn is_instituicao(&self) -> bool {
        self.tipo == UserTipo::Instituicao
    }
}
