use serde::{Deserialize, Serialize};

use crate::domain::auth::UserTipo;

/// JWT claims issued by this service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Account type, decides which profile routes are reachable
    pub tipo: UserTipo,

    pub email: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Token ID, used for revocation on logout
    pub jti: String,
}
