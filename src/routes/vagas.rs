//! Job posting routes

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use super::{deficiencias, instituicoes, like_pattern, non_blank};
use crate::api::{AppJson, AppQuery, Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{OptionalAuth, RequireInstituicao};
use crate::domain::parse_column;
use crate::domain::vagas::{
    CreateVagaRequest, UpdateVagaRequest, UpdateVagaStatusRequest, Vaga, VagaQuery, VagaRow,
    VagaStatus,
};
use crate::error::ApiError;
use crate::services::notificacoes;

/// Owning institution's user id alongside the row, for ownership checks
#[derive(sqlx::FromRow)]
struct OwnedVaga {
    #[sqlx(flatten)]
    vaga: VagaRow,
    owner_user_id: Uuid,
}

async fn fetch_owned(db: &PgPool, id: Uuid) -> Result<OwnedVaga, ApiError> {
    sqlx::query_as::<_, OwnedVaga>(
        r#"
        SELECT v.id, v.instituicao_id, i.nome_fantasia AS instituicao_nome, v.titulo, v.descricao,
               v.cidade, v.estado, v.modalidade, v.regime, v.carga_horaria, v.remuneracao,
               v.nivel_ensino, v.aluno_idade, v.status, v.created_at, v.updated_at,
               i.user_id AS owner_user_id
        FROM vagas v
        JOIN instituicoes i ON i.id = v.instituicao_id
        WHERE v.id = $1 AND v.deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Vaga não encontrada."))
}

/// 404 when missing, 403 when another institution owns it
async fn fetch_for_owner(db: &PgPool, id: Uuid, user_id: Uuid) -> Result<VagaRow, ApiError> {
    let owned = fetch_owned(db, id).await?;
    if owned.owner_user_id != user_id {
        return Err(ApiError::forbidden("Esta vaga pertence a outra instituição."));
    }
    Ok(owned.vaga)
}

/// Attach each job's disability list, keeping the row order
pub(crate) async fn hydrate(db: &PgPool, rows: Vec<VagaRow>) -> Result<Vec<Vaga>, ApiError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut deficiencias = deficiencias::for_vagas(db, &ids).await?;

    rows.into_iter()
        .map(|row| {
            let lista = deficiencias.remove(&row.id).unwrap_or_default();
            Vaga::from_row(row, lista)
        })
        .collect()
}

pub(crate) async fn load(db: &PgPool, id: Uuid) -> Result<Vaga, ApiError> {
    let row = fetch_owned(db, id).await?.vaga;
    let deficiencias = deficiencias::for_vagas(db, &[row.id])
        .await?
        .remove(&row.id)
        .unwrap_or_default();
    Vaga::from_row(row, deficiencias)
}

/// GET /api/vagas
///
/// Public board of open jobs, newest first.
pub async fn list_vagas(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<VagaQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let estado = query.estado()?;
    let pagination = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    let cidade = non_blank(&query.cidade);
    let modalidade = query.modalidade.map(|m| m.as_str());
    let regime = query.regime.map(|r| r.as_str());
    let q = non_blank(&query.q).map(|q| like_pattern(&q));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM vagas v
        WHERE v.deleted_at IS NULL AND v.status = 'ATIVA'
          AND ($1::text IS NULL OR LOWER(v.cidade) = LOWER($1))
          AND ($2::text IS NULL OR v.estado = $2)
          AND ($3::text IS NULL OR v.modalidade = $3)
          AND ($4::text IS NULL OR v.regime = $4)
          AND ($5::int IS NULL OR EXISTS (
                SELECT 1 FROM vaga_deficiencia vd
                WHERE vd.vaga_id = v.id AND vd.deficiencia_id = $5))
          AND ($6::text IS NULL OR v.titulo ILIKE $6 OR v.descricao ILIKE $6)
        "#,
    )
    .bind(&cidade)
    .bind(&estado)
    .bind(modalidade)
    .bind(regime)
    .bind(query.deficiencia_id)
    .bind(&q)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, VagaRow>(
        r#"
        SELECT v.id, v.instituicao_id, i.nome_fantasia AS instituicao_nome, v.titulo, v.descricao,
               v.cidade, v.estado, v.modalidade, v.regime, v.carga_horaria, v.remuneracao,
               v.nivel_ensino, v.aluno_idade, v.status, v.created_at, v.updated_at
        FROM vagas v
        JOIN instituicoes i ON i.id = v.instituicao_id
        WHERE v.deleted_at IS NULL AND v.status = 'ATIVA'
          AND ($1::text IS NULL OR LOWER(v.cidade) = LOWER($1))
          AND ($2::text IS NULL OR v.estado = $2)
          AND ($3::text IS NULL OR v.modalidade = $3)
          AND ($4::text IS NULL OR v.regime = $4)
          AND ($5::int IS NULL OR EXISTS (
                SELECT 1 FROM vaga_deficiencia vd
                WHERE vd.vaga_id = v.id AND vd.deficiencia_id = $5))
          AND ($6::text IS NULL OR v.titulo ILIKE $6 OR v.descricao ILIKE $6)
        ORDER BY v.created_at DESC
        LIMIT $7 OFFSET $8
        "#,
    )
    .bind(&cidade)
    .bind(&estado)
    .bind(modalidade)
    .bind(regime)
    .bind(query.deficiencia_id)
    .bind(&q)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data = hydrate(&state.db, rows).await?;
    Ok(Paginated::new(data, &pagination, total))
}

/// GET /api/vagas/:id
///
/// Paused and closed jobs are only visible to the owning institution.
pub async fn get_vaga(
    State(state): State<Arc<AppState>>,
    OptionalAuth(auth): OptionalAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let owned = fetch_owned(&state.db, id).await?;
    let status: VagaStatus = parse_column(&owned.vaga.status)?;
    let is_owner = auth.is_some_and(|a| a.user_id == owned.owner_user_id);

    if status != VagaStatus::Ativa && !is_owner {
        return Err(ApiError::not_found("Vaga não encontrada."));
    }

    let deficiencias = deficiencias::for_vagas(&state.db, &[id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    Ok(DataResponse::new(Vaga::from_row(owned.vaga, deficiencias)?))
}

/// POST /api/vagas
pub async fn create_vaga(
    State(state): State<Arc<AppState>>,
    auth: RequireInstituicao,
    AppJson(req): AppJson<CreateVagaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let instituicao_id = instituicoes::instituicao_id(&state.db, auth.user_id).await?;
    let deficiencia_ids =
        deficiencias::validate_ids(&state.db, "deficiencia_ids", &req.deficiencia_ids).await?;

    let id = Uuid::new_v4();
    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO vagas (id, instituicao_id, titulo, descricao, cidade, estado, modalidade,
                           regime, carga_horaria, remuneracao, nivel_ensino, aluno_idade)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(id)
    .bind(instituicao_id)
    .bind(req.titulo.trim())
    .bind(req.descricao.trim())
    .bind(req.cidade.trim())
    .bind(req.estado.trim().to_uppercase())
    .bind(req.modalidade.as_str())
    .bind(req.regime.as_str())
    .bind(req.carga_horaria)
    .bind(req.remuneracao)
    .bind(req.nivel_ensino.as_str())
    .bind(req.aluno_idade)
    .execute(&mut *tx)
    .await?;

    deficiencias::replace_for_vaga(&mut tx, id, &deficiencia_ids).await?;
    tx.commit().await?;

    tracing::info!(vaga_id = %id, instituicao_id = %instituicao_id, "Job created");
    Ok(Created(load(&state.db, id).await?))
}

/// PUT /api/vagas/:id
///
/// Closed jobs can no longer be edited.
pub async fn update_vaga(
    State(state): State<Arc<AppState>>,
    auth: RequireInstituicao,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<UpdateVagaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = fetch_for_owner(&state.db, id, auth.user_id).await?;
    if parse_column::<VagaStatus>(&current.status)? == VagaStatus::Fechada {
        return Err(ApiError::unprocessable("Vagas fechadas não podem ser editadas."));
    }
    req.validate()?;

    let deficiencia_ids = match &req.deficiencia_ids {
        Some(ids) => Some(deficiencias::validate_ids(&state.db, "deficiencia_ids", ids).await?),
        None => None,
    };

    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        UPDATE vagas SET
            titulo = COALESCE($2, titulo),
            descricao = COALESCE($3, descricao),
            cidade = COALESCE($4, cidade),
            estado = COALESCE($5, estado),
            modalidade = COALESCE($6, modalidade),
            regime = COALESCE($7, regime),
            carga_horaria = COALESCE($8, carga_horaria),
            remuneracao = COALESCE($9, remuneracao),
            nivel_ensino = COALESCE($10, nivel_ensino),
            aluno_idade = COALESCE($11, aluno_idade),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(non_blank(&req.titulo))
    .bind(non_blank(&req.descricao))
    .bind(non_blank(&req.cidade))
    .bind(non_blank(&req.estado).map(|uf| uf.to_uppercase()))
    .bind(req.modalidade.map(|m| m.as_str()))
    .bind(req.regime.map(|r| r.as_str()))
    .bind(req.carga_horaria)
    .bind(req.remuneracao)
    .bind(req.nivel_ensino.map(|n| n.as_str()))
    .bind(req.aluno_idade)
    .execute(&mut *tx)
    .await?;

    if let Some(ids) = &deficiencia_ids {
        deficiencias::replace_for_vaga(&mut tx, id, ids).await?;
    }
    tx.commit().await?;

    tracing::info!(vaga_id = %id, "Job updated");
    Ok(DataResponse::new(load(&state.db, id).await?))
}

/// Close the job and notify candidates still waiting on an answer
async fn close(conn: &mut PgConnection, id: Uuid, titulo: &str) -> Result<u64, sqlx::Error> {
    sqlx::query("UPDATE vagas SET status = 'FECHADA', updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    notificacoes::vaga_fechada(&mut *conn, id, titulo).await
}

/// PATCH /api/vagas/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    auth: RequireInstituicao,
    Path(id): Path<Uuid>,
    AppJson(req): AppJson<UpdateVagaStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = fetch_for_owner(&state.db, id, auth.user_id).await?;
    let from: VagaStatus = parse_column(&current.status)?;
    let next = from.transition(req.status)?;

    let mut tx = state.db.begin().await?;
    if next == VagaStatus::Fechada {
        let notified = close(&mut tx, id, &current.titulo).await?;
        tracing::info!(vaga_id = %id, notified, "Job closed");
    } else {
        sqlx::query("UPDATE vagas SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(next.as_str())
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::info!(vaga_id = %id, from = %from, to = %next, "Job status changed");
    Ok(DataResponse::new(load(&state.db, id).await?))
}

/// DELETE /api/vagas/:id
///
/// Soft delete; an open job is closed first so pending candidates hear
/// about it.
pub async fn delete_vaga(
    State(state): State<Arc<AppState>>,
    auth: RequireInstituicao,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let current = fetch_for_owner(&state.db, id, auth.user_id).await?;
    let status: VagaStatus = parse_column(&current.status)?;

    let mut tx = state.db.begin().await?;
    if status != VagaStatus::Fechada {
        close(&mut tx, id, &current.titulo).await?;
    }
    sqlx::query("DELETE FROM propostas WHERE vaga_id = $1 AND status = 'ENVIADA'")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE vagas SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(vaga_id = %id, "Job deleted");
    Ok(NoContent)
}
