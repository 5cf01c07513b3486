//! Authentication routes
//!
//! Registration for both account types, login/logout with revocable JWTs
//! and password reset.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::{deficiencias, enderecos, non_blank, today};
use crate::api::{AppJson, MessageResponse, NoContent};
use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::db::unique_violation;
use crate::domain::auth::{
    AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse,
    LoginRequest, RegisterCandidatoRequest, RegisterInstituicaoRequest, ResetPasswordRequest,
    UserSummary, UserTipo,
};
use crate::error::ApiError;
use crate::services::cache::keys;
use crate::validation::{only_digits, ValidationErrors};

const EMAIL_EM_USO: &str = "Este e-mail já está cadastrado.";
const CPF_EM_USO: &str = "Este CPF já está cadastrado.";
const CNPJ_EM_USO: &str = "Este CNPJ já está cadastrado.";

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Registration races past the EXISTS checks end up here
pub(crate) fn unique_to_validation(err: sqlx::Error) -> ApiError {
    match unique_violation(&err).as_deref() {
        Some("users_email_active_key") => ApiError::field("email", EMAIL_EM_USO),
        Some("candidatos_cpf_active_key") => ApiError::field("cpf", CPF_EM_USO),
        Some("instituicoes_cnpj_active_key") => ApiError::field("cnpj", CNPJ_EM_USO),
        _ => ApiError::Database(err),
    }
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

async fn email_taken(db: &PgPool, email: &str) -> Result<bool, ApiError> {
    Ok(sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = $1 AND deleted_at IS NULL)",
    )
    .bind(email)
    .fetch_one(db)
    .await?)
}

async fn insert_user(
    conn: &mut PgConnection,
    email: &str,
    password_hash: &str,
    tipo: UserTipo,
) -> Result<Uuid, ApiError> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, password_hash, tipo) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind(email)
        .bind(password_hash)
        .bind(tipo.as_str())
        .execute(conn)
        .await
        .map_err(unique_to_validation)?;
    Ok(id)
}

/// Profile id and display name for the session payload
pub(crate) async fn user_summary(
    db: &PgPool,
    user_id: Uuid,
    tipo: UserTipo,
    email: &str,
) -> Result<UserSummary, ApiError> {
    let sql = match tipo {
        UserTipo::Candidato => {
            "SELECT id, nome FROM candidatos WHERE user_id = $1 AND deleted_at IS NULL"
        }
        UserTipo::Instituicao => {
            "SELECT id, nome_fantasia FROM instituicoes WHERE user_id = $1 AND deleted_at IS NULL"
        }
    };

    let (profile_id, nome): (Uuid, String) = sqlx::query_as(sql)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Conta não encontrada."))?;

    Ok(UserSummary {
        id: user_id,
        email: email.to_string(),
        tipo,
        profile_id,
        nome,
    })
}

fn issue(state: &AppState, user: UserSummary) -> Result<AuthResponse, ApiError> {
    let token = state
        .tokens
        .issue(user.id, user.tipo, &user.email)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(AuthResponse { token, user })
}

/// Deny-list the token until it would have expired anyway
pub(crate) async fn revoke(state: &AppState, auth: &AuthContext) -> Result<(), ApiError> {
    let remaining = (auth.expires_at - Utc::now().timestamp()).max(1) as u64;
    state
        .cache
        .try_set_with_ttl(
            &keys::revoked_token(&auth.jti),
            &true,
            Duration::from_secs(remaining),
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to revoke token");
            ApiError::unavailable("Não foi possível encerrar a sessão. Tente novamente.")
        })
}

/// Void every token issued to the user so far. Kept for one token lifetime,
/// after which all of them have expired on their own.
pub(crate) async fn revoke_sessions(state: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    let lifetime = (state.settings.jwt_ttl_minutes.max(1) * 60) as u64;
    state
        .cache
        .try_set_with_ttl(
            &keys::revoked_before(user_id),
            &Utc::now().timestamp(),
            Duration::from_secs(lifetime),
        )
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Failed to revoke sessions");
            ApiError::unavailable("Não foi possível encerrar as sessões. Tente novamente.")
        })
}

/// POST /api/auth/register/candidato
pub async fn register_candidato(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterCandidatoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate(today())?;

    let email = normalize_email(&req.email);
    let cpf = only_digits(&req.cpf);

    let mut conflicts = ValidationErrors::new();
    if email_taken(&state.db, &email).await? {
        conflicts.add("email", EMAIL_EM_USO);
    }
    let cpf_taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM candidatos WHERE cpf = $1 AND deleted_at IS NULL)",
    )
    .bind(&cpf)
    .fetch_one(&state.db)
    .await?;
    if cpf_taken {
        conflicts.add("cpf", CPF_EM_USO);
    }
    conflicts.finish()?;

    let deficiencia_ids =
        deficiencias::validate_ids(&state.db, "deficiencia_ids", &req.deficiencia_ids).await?;
    let password_hash = state.passwords.hash(req.password.clone()).await?;

    let mut tx = state.db.begin().await?;
    let user_id = insert_user(&mut tx, &email, &password_hash, UserTipo::Candidato).await?;
    let endereco_id = enderecos::insert(&mut tx, &req.endereco).await?;

    let candidato_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO candidatos (
            id, user_id, endereco_id, nome, cpf, data_nascimento, telefone,
            escolaridade, curso, instituicao_ensino, descricao
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(candidato_id)
    .bind(user_id)
    .bind(endereco_id)
    .bind(req.nome.trim())
    .bind(&cpf)
    .bind(req.data_nascimento)
    .bind(only_digits(&req.telefone))
    .bind(req.escolaridade.as_str())
    .bind(non_blank(&req.curso))
    .bind(non_blank(&req.instituicao_ensino))
    .bind(non_blank(&req.descricao))
    .execute(&mut *tx)
    .await
    .map_err(unique_to_validation)?;

    deficiencias::replace_for_candidato(&mut tx, candidato_id, &deficiencia_ids).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user_id, candidato_id = %candidato_id, "Candidate registered");

    let response = issue(
        &state,
        UserSummary {
            id: user_id,
            email,
            tipo: UserTipo::Candidato,
            profile_id: candidato_id,
            nome: req.nome.trim().to_string(),
        },
    )?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/register/instituicao
pub async fn register_instituicao(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegisterInstituicaoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let email = normalize_email(&req.email);
    let cnpj = only_digits(&req.cnpj);

    let mut conflicts = ValidationErrors::new();
    if email_taken(&state.db, &email).await? {
        conflicts.add("email", EMAIL_EM_USO);
    }
    let cnpj_taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM instituicoes WHERE cnpj = $1 AND deleted_at IS NULL)",
    )
    .bind(&cnpj)
    .fetch_one(&state.db)
    .await?;
    if cnpj_taken {
        conflicts.add("cnpj", CNPJ_EM_USO);
    }
    conflicts.finish()?;

    let password_hash = state.passwords.hash(req.password.clone()).await?;
    let niveis: Vec<&str> = req.niveis_ensino.iter().map(|n| n.as_str()).collect();

    let mut tx = state.db.begin().await?;
    let user_id = insert_user(&mut tx, &email, &password_hash, UserTipo::Instituicao).await?;
    let endereco_id = enderecos::insert(&mut tx, &req.endereco).await?;

    let instituicao_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO instituicoes (
            id, user_id, endereco_id, razao_social, nome_fantasia, cnpj, telefone,
            responsavel, tipo_instituicao, niveis_ensino, descricao
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(instituicao_id)
    .bind(user_id)
    .bind(endereco_id)
    .bind(req.razao_social.trim())
    .bind(req.nome_fantasia.trim())
    .bind(&cnpj)
    .bind(only_digits(&req.telefone))
    .bind(req.responsavel.trim())
    .bind(req.tipo_instituicao.as_str())
    .bind(&niveis)
    .bind(non_blank(&req.descricao))
    .execute(&mut *tx)
    .await
    .map_err(unique_to_validation)?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, instituicao_id = %instituicao_id, "Institution registered");

    let response = issue(
        &state,
        UserSummary {
            id: user_id,
            email,
            tipo: UserTipo::Instituicao,
            profile_id: instituicao_id,
            nome: req.nome_fantasia.trim().to_string(),
        },
    )?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[derive(sqlx::FromRow)]
struct LoginRow {
    id: Uuid,
    email: String,
    password_hash: String,
    tipo: String,
}

/// POST /api/auth/login
///
/// Unknown email, wrong password and deleted accounts all get the same 401.
pub async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invalid = || ApiError::unauthorized("E-mail ou senha inválidos.");

    let user = sqlx::query_as::<_, LoginRow>(
        r#"
        SELECT id, email, password_hash, tipo
        FROM users
        WHERE LOWER(email) = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(normalize_email(&req.email))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(invalid)?;

    if !state
        .passwords
        .verify(req.password, user.password_hash.clone())
        .await?
    {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(invalid());
    }

    let tipo: UserTipo = crate::domain::parse_column(&user.tipo)?;
    let summary = user_summary(&state.db, user.id, tipo, &user.email).await?;

    tracing::info!(user_id = %user.id, tipo = %tipo, "User logged in");
    Ok(Json(issue(&state, summary)?))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<NoContent, ApiError> {
    revoke(&state, &auth).await?;
    tracing::info!(user_id = %auth.user_id, "User logged out");
    Ok(NoContent)
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let summary = user_summary(&state.db, auth.user_id, auth.tipo, &auth.email).await?;
    Ok(Json(summary))
}

/// POST /api/auth/forgot-password
///
/// Same answer whether or not the email exists.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    let mut reset_token = None;

    if email_taken(&state.db, &email).await? {
        let raw: [u8; 32] = rand::random();
        let token = hex::encode(raw);
        let expires_at: DateTime<Utc> =
            Utc::now() + chrono::Duration::minutes(state.settings.password_reset_ttl_minutes);

        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (email, token_hash, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                expires_at = EXCLUDED.expires_at,
                created_at = NOW()
            "#,
        )
        .bind(&email)
        .bind(hash_token(&token))
        .bind(expires_at)
        .execute(&state.db)
        .await?;

        tracing::info!("Password reset token issued");
        if state.settings.env.is_dev() {
            reset_token = Some(token);
        }
    }

    Ok(Json(ForgotPasswordResponse {
        message: "Se o e-mail estiver cadastrado, enviaremos as instruções para redefinir a senha."
            .to_string(),
        reset_token,
    }))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let email = normalize_email(&req.email);

    let stored: Option<(String, DateTime<Utc>)> = sqlx::query_as(
        "SELECT token_hash, expires_at FROM password_reset_tokens WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await?;

    let presented = hash_token(req.token.trim());
    let valid = matches!(
        &stored,
        Some((hash, expires_at)) if *hash == presented && *expires_at > Utc::now()
    );
    if !valid {
        return Err(ApiError::field(
            "token",
            "O token de redefinição é inválido ou expirou.",
        ));
    }

    let password_hash = state.passwords.hash(req.password).await?;

    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        UPDATE users SET password_hash = $2, updated_at = NOW()
        WHERE LOWER(email) = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(&email)
    .bind(&password_hash)
    .execute(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM password_reset_tokens WHERE email = $1")
        .bind(&email)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("Password reset completed");
    Ok(MessageResponse::new("Senha redefinida com sucesso."))
}

/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    AppJson(req): AppJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let current: String = sqlx::query_scalar(
        "SELECT password_hash FROM users WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::unauthorized("Conta não encontrada."))?;

    if !state.passwords.verify(req.current_password, current).await? {
        return Err(ApiError::field(
            "current_password",
            "A senha atual está incorreta.",
        ));
    }

    let password_hash = state.passwords.hash(req.password).await?;
    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(auth.user_id)
        .bind(&password_hash)
        .execute(&state.db)
        .await?;

    tracing::info!(user_id = %auth.user_id, "Password changed");
    Ok(MessageResponse::new("Senha alterada com sucesso."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_tokens_are_stored_as_sha256_hex() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn emails_compare_case_insensitively() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }
}
