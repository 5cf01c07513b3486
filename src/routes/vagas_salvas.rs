//! Bookmarked jobs

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{candidatos, vagas};
use crate::api::{AppQuery, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireCandidato;
use crate::domain::vagas::{VagaRow, VagaStatus};
use crate::error::ApiError;

/// POST /api/vagas/:id/salvar
///
/// Saving twice is a no-op.
pub async fn salvar(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    Path(vaga_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;
    let vaga = vagas::load(&state.db, vaga_id).await?;
    if vaga.status != VagaStatus::Ativa {
        return Err(ApiError::unprocessable("Apenas vagas ativas podem ser salvas."));
    }

    sqlx::query(
        r#"
        INSERT INTO vagas_salvas (candidato_id, vaga_id)
        VALUES ($1, $2)
        ON CONFLICT (candidato_id, vaga_id) DO NOTHING
        "#,
    )
    .bind(candidato_id)
    .bind(vaga_id)
    .execute(&state.db)
    .await?;

    Ok(NoContent)
}

/// DELETE /api/vagas/:id/salvar
pub async fn remover(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    Path(vaga_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;

    sqlx::query("DELETE FROM vagas_salvas WHERE candidato_id = $1 AND vaga_id = $2")
        .bind(candidato_id)
        .bind(vaga_id)
        .execute(&state.db)
        .await?;

    Ok(NoContent)
}

/// GET /api/candidatos/me/vagas-salvas
///
/// Most recently saved first. Jobs deleted since are left out; closed ones
/// stay so the candidate can see what happened.
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    AppQuery(pagination): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let candidato_id = candidatos::candidato_id(&state.db, auth.user_id).await?;

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM vagas_salvas s
        JOIN vagas v ON v.id = s.vaga_id
        WHERE s.candidato_id = $1 AND v.deleted_at IS NULL
        "#,
    )
    .bind(candidato_id)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, VagaRow>(
        r#"
        SELECT v.id, v.instituicao_id, i.nome_fantasia AS instituicao_nome, v.titulo, v.descricao,
               v.cidade, v.estado, v.modalidade, v.regime, v.carga_horaria, v.remuneracao,
               v.nivel_ensino, v.aluno_idade, v.status, v.created_at, v.updated_at
        FROM vagas_salvas s
        JOIN vagas v ON v.id = s.vaga_id
        JOIN instituicoes i ON i.id = v.instituicao_id
        WHERE s.candidato_id = $1 AND v.deleted_at IS NULL
        ORDER BY s.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(candidato_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data = vagas::hydrate(&state.db, rows).await?;
    Ok(Paginated::new(data, &pagination, total))
}
