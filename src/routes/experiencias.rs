//! Candidate experience routes
//!
//! Every handler is scoped to the caller's own candidate profile; rows that
//! belong to someone else answer 404.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::{candidatos, deficiencias, non_blank, today};
use crate::api::{AppJson, Created, DataResponse, NoContent};
use crate::app::AppState;
use crate::auth::RequireCandidato;
use crate::domain::candidatos::{
    ExperienciaPessoal, ExperienciaPessoalInput, ExperienciaProfissional,
    ExperienciaProfissionalInput,
};
use crate::error::ApiError;

pub(crate) async fn profissionais_of(
    db: &PgPool,
    candidato_id: Uuid,
) -> Result<Vec<ExperienciaProfissional>, ApiError> {
    let rows = sqlx::query_as::<_, ExperienciaProfissional>(
        r#"
        SELECT id, candidato_id, instituicao, cargo, data_inicio, data_fim, atual, descricao,
               created_at, updated_at
        FROM experiencias_profissionais
        WHERE candidato_id = $1
        ORDER BY atual DESC, data_inicio DESC
        "#,
    )
    .bind(candidato_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

pub(crate) async fn pessoais_of(
    db: &PgPool,
    candidato_id: Uuid,
) -> Result<Vec<ExperienciaPessoal>, ApiError> {
    let rows = sqlx::query_as::<_, ExperienciaPessoal>(
        r#"
        SELECT id, candidato_id, titulo, descricao, deficiencia_id, created_at, updated_at
        FROM experiencias_pessoais
        WHERE candidato_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(candidato_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

fn not_found() -> ApiError {
    ApiError::not_found("Experiência não encontrada.")
}

async fn check_deficiencia(db: &PgPool, id: Option<i32>) -> Result<(), ApiError> {
    if let Some(id) = id {
        deficiencias::validate_ids(db, "deficiencia_id", &[id]).await?;
    }
    Ok(())
}

// ============================================================================
// Professional
// ============================================================================

/// GET /api/candidatos/me/experiencias-profissionais
pub async fn list_profissionais(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
) -> Result<impl IntoResponse, ApiError> {
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;
    Ok(DataResponse::new(profissionais_of(&state.db, candidato_id).await?))
}

/// POST /api/candidatos/me/experiencias-profissionais
pub async fn create_profissional(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    AppJson(req): AppJson<ExperienciaProfissionalInput>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate(today())?;
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;

    let experiencia = sqlx::query_as::<_, ExperienciaProfissional>(
        r#"
        INSERT INTO experiencias_profissionais
            (id, candidato_id, instituicao, cargo, data_inicio, data_fim, atual, descricao)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, candidato_id, instituicao, cargo, data_inicio, data_fim, atual, descricao,
                  created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(candidato_id)
    .bind(req.instituicao.trim())
    .bind(req.cargo.trim())
    .bind(req.data_inicio)
    .bind(req.data_fim)
    .bind(req.atual)
    .bind(non_blank(&req.descricao))
    .fetch_one(&state.db)
    .await?;

    candidatos::invalidate_profile(&state, auth.user_id).await;
    Ok(Created(experiencia))
}

/// PUT /api/candidatos/me/experiencias-profissionais/:id
pub async fn update_profissional(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<ExperienciaProfissionalInput>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate(today())?;
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;

    let experiencia = sqlx::query_as::<_, ExperienciaProfissional>(
        r#"
        UPDATE experiencias_profissionais
        SET instituicao = $3, cargo = $4, data_inicio = $5, data_fim = $6, atual = $7,
            descricao = $8, updated_at = NOW()
        WHERE id = $1 AND candidato_id = $2
        RETURNING id, candidato_id, instituicao, cargo, data_inicio, data_fim, atual, descricao,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(candidato_id)
    .bind(req.instituicao.trim())
    .bind(req.cargo.trim())
    .bind(req.data_inicio)
    .bind(req.data_fim)
    .bind(req.atual)
    .bind(non_blank(&req.descricao))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(not_found)?;

    candidatos::invalidate_profile(&state, auth.user_id).await;
    Ok(DataResponse::new(experiencia))
}

/// DELETE /api/candidatos/me/experiencias-profissionais/:id
pub async fn delete_profissional(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;

    let result =
        sqlx::query("DELETE FROM experiencias_profissionais WHERE id = $1 AND candidato_id = $2")
            .bind(id)
            .bind(candidato_id)
            .execute(&state.db)
            .await?;

    if result.rows_affected() == 0 {
        return Err(not_found());
    }

    candidatos::invalidate_profile(&state, auth.user_id).await;
    Ok(NoContent)
}

// ============================================================================
// Personal
// ============================================================================

/// GET /api/candidatos/me/experiencias-pessoais
pub async fn list_pessoais(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
) -> Result<impl IntoResponse, ApiError> {
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;
    Ok(DataResponse::new(pessoais_of(&state.db, candidato_id).await?))
}

/// POST /api/candidatos/me/experiencias-pessoais
pub async fn create_pessoal(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    AppJson(req): AppJson<ExperienciaPessoalInput>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    check_deficiencia(&state.db, req.deficiencia_id).await?;
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;

    let experiencia = sqlx::query_as::<_, ExperienciaPessoal>(
        r#"
        INSERT INTO experiencias_pessoais (id, candidato_id, titulo, descricao, deficiencia_id)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, candidato_id, titulo, descricao, deficiencia_id, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(candidato_id)
    .bind(req.titulo.trim())
    .bind(req.descricao.trim())
    .bind(req.deficiencia_id)
    .fetch_one(&state.db)
    .await?;

    candidatos::invalidate_profile(&state, auth.user_id).await;
    Ok(Created(experiencia))
}

/// PUT /api/candidatos/me/experiencias-pessoais/:id
pub async fn update_pessoal(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<ExperienciaPessoalInput>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    check_deficiencia(&state.db, req.deficiencia_id).await?;
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;

    let experiencia = sqlx::query_as::<_, ExperienciaPessoal>(
        r#"
        UPDATE experiencias_pessoais
        SET titulo = $3, descricao = $4, deficiencia_id = $5, updated_at = NOW()
        WHERE id = $1 AND candidato_id = $2
        RETURNING id, candidato_id, titulo, descricao, deficiencia_id, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(candidato_id)
    .bind(req.titulo.trim())
    .bind(req.descricao.trim())
    .bind(req.deficiencia_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(not_found)?;

    candidatos::invalidate_profile(&state, auth.user_id).await;
    Ok(DataResponse::new(experiencia))
}

/// DELETE /api/candidatos/me/experiencias-pessoais/:id
pub async fn delete_pessoal(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;

    let result = sqlx::query("DELETE FROM experiencias_pessoais WHERE id = $1 AND candidato_id = $2")
        .bind(id)
        .bind(candidato_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found());
    }

    candidatos::invalidate_profile(&state, auth.user_id).await;
    Ok(NoContent)
}
