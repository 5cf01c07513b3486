//! Password hashing with Argon2id

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Argon2id hasher; hashing runs on the blocking pool so it never stalls the runtime
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl PasswordHasher {
    /// OWASP minimum: 19 MiB memory, 2 iterations, 1 lane
    const MEMORY_COST: u32 = 19_456;
    const TIME_COST: u32 = 2;
    const PARALLELISM: u32 = 1;

    pub fn new() -> Self {
        Self::with_params(Self::MEMORY_COST, Self::TIME_COST, Self::PARALLELISM)
    }

    pub fn with_params(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        let params = Params::new(memory_cost, time_cost, parallelism, None)
            .unwrap_or_else(|_| Params::default());
        Self { params }
    }

    pub async fn hash(&self, password: String) -> Result<String> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| anyhow!("Failed to hash password: {}", e))
        })
        .await
        .context("Password hash task panicked")?
    }

    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable
    pub async fn verify(&self, password: String, hash: String) -> Result<bool> {
        tokio::task::spawn_blocking(move || {
            let parsed =
                PasswordHash::new(&hash).map_err(|e| anyhow!("Malformed password hash: {}", e))?;
            Ok(Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .context("Password verify task panicked")?
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::with_params(4096, 1, 1)
    }

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("senha-segura-123".to_string()).await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher
            .verify("senha-segura-123".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!hasher.verify("outra-senha".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn salts_differ_between_hashes() {
        let hasher = fast_hasher();
        let a = hasher.hash("mesma".to_string()).await.unwrap();
        let b = hasher.hash("mesma".to_string()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        let hasher = fast_hasher();
        assert!(hasher
            .verify("x".to_string(), "not-a-phc-string".to_string())
            .await
            .is_err());
    }
}
