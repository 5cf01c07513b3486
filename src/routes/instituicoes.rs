//! Institution profile routes

use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{clearable, enderecos, non_blank, read_image, vagas};
use crate::api::{AppJson, AppQuery, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{RequireAuth, RequireInstituicao};
use crate::domain::auth::UserTipo;
use crate::domain::contato::Contato;
use crate::domain::instituicoes::{
    InstituicaoProfile, InstituicaoPublic, InstituicaoRow, MinhaVaga, PropostaContagem,
    UpdateInstituicaoRequest,
};
use crate::domain::parse_column;
use crate::domain::vagas::{VagaRow, VagaStatus};
use crate::error::ApiError;
use crate::services::cache::{keys, ttl};
use crate::services::notificacoes;
use crate::services::storage::Pasta;
use crate::validation::only_digits;

async fn fetch_row(db: &PgPool, column: &str, value: Uuid) -> Result<Option<InstituicaoRow>, ApiError> {
    let sql = format!(
        r#"
        SELECT i.id, i.user_id, i.endereco_id, u.email, i.razao_social, i.nome_fantasia, i.cnpj,
               i.telefone, i.responsavel, i.tipo_instituicao, i.niveis_ensino, i.descricao,
               i.logo_path, i.created_at, i.updated_at
        FROM instituicoes i
        JOIN users u ON u.id = i.user_id
        WHERE i.{} = $1 AND i.deleted_at IS NULL
        "#,
        column
    );
    let row = sqlx::query_as::<_, InstituicaoRow>(&sql)
        .bind(value)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

async fn fetch_by_user(db: &PgPool, user_id: Uuid) -> Result<InstituicaoRow, ApiError> {
    fetch_row(db, "user_id", user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Perfil de instituição não encontrado."))
}

/// Institution id owned by `user_id`
pub(crate) async fn instituicao_id(db: &PgPool, user_id: Uuid) -> Result<Uuid, ApiError> {
    sqlx::query_scalar("SELECT id FROM instituicoes WHERE user_id = $1 AND deleted_at IS NULL")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Perfil de instituição não encontrado."))
}

async fn load_profile(state: &AppState, user_id: Uuid) -> Result<InstituicaoProfile, ApiError> {
    let row = fetch_by_user(&state.db, user_id).await?;
    let endereco = enderecos::fetch(&state.db, row.endereco_id).await?;

    Ok(InstituicaoProfile {
        tipo_instituicao: parse_column(&row.tipo_instituicao)?,
        niveis_ensino: row.niveis()?,
        logo_url: state.storage.public_url_opt(row.logo_path.as_deref()),
        id: row.id,
        user_id: row.user_id,
        email: row.email,
        razao_social: row.razao_social,
        nome_fantasia: row.nome_fantasia,
        cnpj: row.cnpj,
        telefone: row.telefone,
        responsavel: row.responsavel,
        descricao: row.descricao,
        endereco,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

async fn invalidate_profile(state: &AppState, user_id: Uuid) {
    state.cache.delete(&keys::instituicao_profile(user_id)).await;
}

/// GET /api/instituicoes/me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: RequireInstituicao,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user_id;
    let loader = state.clone();
    let profile = state
        .cache
        .remember(&keys::instituicao_profile(user_id), ttl::PROFILE, || async move {
            load_profile(&loader, user_id).await
        })
        .await?;

    Ok(DataResponse::new(profile))
}

/// PUT /api/instituicoes/me
///
/// Partial update; a blank `descricao` clears it.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: RequireInstituicao,
    AppJson(req): AppJson<UpdateInstituicaoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let current = fetch_by_user(&state.db, auth.user_id).await?;

    let niveis: Option<Vec<&str>> = req
        .niveis_ensino
        .as_ref()
        .map(|niveis| niveis.iter().map(|n| n.as_str()).collect());

    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        UPDATE instituicoes SET
            razao_social = COALESCE($2, razao_social),
            nome_fantasia = COALESCE($3, nome_fantasia),
            telefone = COALESCE($4, telefone),
            responsavel = COALESCE($5, responsavel),
            tipo_instituicao = COALESCE($6, tipo_instituicao),
            niveis_ensino = COALESCE($7, niveis_ensino),
            descricao = CASE WHEN $8::text IS NULL THEN descricao ELSE NULLIF($8, '') END,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(current.id)
    .bind(non_blank(&req.razao_social))
    .bind(non_blank(&req.nome_fantasia))
    .bind(req.telefone.as_deref().map(only_digits))
    .bind(non_blank(&req.responsavel))
    .bind(req.tipo_instituicao.map(|t| t.as_str()))
    .bind(niveis)
    .bind(clearable(&req.descricao))
    .execute(&mut *tx)
    .await?;

    if let Some(endereco) = &req.endereco {
        enderecos::update(&mut tx, current.endereco_id, endereco).await?;
    }
    tx.commit().await?;

    invalidate_profile(&state, auth.user_id).await;
    tracing::info!(instituicao_id = %current.id, "Institution profile updated");

    Ok(DataResponse::new(load_profile(&state, auth.user_id).await?))
}

#[derive(Serialize)]
pub struct LogoResponse {
    pub logo_url: String,
}

/// POST /api/instituicoes/me/logo
pub async fn upload_logo(
    State(state): State<Arc<AppState>>,
    auth: RequireInstituicao,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (kind, bytes) = read_image(&state.storage, multipart, "logo").await?;
    let current = fetch_by_user(&state.db, auth.user_id).await?;

    let path = state.storage.save_image(Pasta::Logos, kind, &bytes).await?;
    sqlx::query("UPDATE instituicoes SET logo_path = $2, updated_at = NOW() WHERE id = $1")
        .bind(current.id)
        .bind(&path)
        .execute(&state.db)
        .await?;

    if let Some(previous) = current.logo_path.as_deref() {
        state.storage.delete(previous).await;
    }
    invalidate_profile(&state, auth.user_id).await;

    Ok(DataResponse::new(LogoResponse {
        logo_url: state.storage.public_url(&path),
    }))
}

/// DELETE /api/instituicoes/me
///
/// Soft delete. Open jobs are closed, candidates with pending proposals on
/// them are notified and those proposals dropped. Every session of the
/// account is revoked.
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    auth: RequireInstituicao,
) -> Result<impl IntoResponse, ApiError> {
    let id = instituicao_id(&state.db, auth.user_id).await?;

    let mut tx = state.db.begin().await?;
    let abertas: Vec<(Uuid, String)> = sqlx::query_as(
        r#"
        UPDATE vagas SET status = 'FECHADA', deleted_at = NOW(), updated_at = NOW()
        WHERE instituicao_id = $1 AND deleted_at IS NULL
        RETURNING id, titulo
        "#,
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    for (vaga_id, titulo) in &abertas {
        notificacoes::vaga_fechada(&mut *tx, *vaga_id, titulo).await?;
    }

    sqlx::query("DELETE FROM propostas WHERE instituicao_id = $1 AND status = 'ENVIADA'")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE instituicoes SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;

    super::auth::revoke_sessions(&state, auth.user_id).await?;
    tx.commit().await?;

    invalidate_profile(&state, auth.user_id).await;
    tracing::info!(instituicao_id = %id, vagas_fechadas = abertas.len(), "Institution account deleted");

    Ok(NoContent)
}

/// GET /api/instituicoes/:id
///
/// Email and phone are revealed to the institution itself and to candidates
/// with an accepted proposal on one of its jobs.
pub async fn get_instituicao(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = fetch_row(&state.db, "id", id)
        .await?
        .ok_or_else(|| ApiError::not_found("Instituição não encontrada."))?;

    let liberado = match auth.tipo {
        UserTipo::Instituicao => row.user_id == auth.user_id,
        UserTipo::Candidato => {
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM propostas p
                    JOIN candidatos c ON c.id = p.candidato_id
                    WHERE p.instituicao_id = $1 AND c.user_id = $2 AND p.status = 'ACEITA'
                )
                "#,
            )
            .bind(row.id)
            .bind(auth.user_id)
            .fetch_one(&state.db)
            .await?
        }
    };

    let vagas_ativas: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM vagas WHERE instituicao_id = $1 AND status = 'ATIVA' AND deleted_at IS NULL",
    )
    .bind(row.id)
    .fetch_one(&state.db)
    .await?;

    let endereco = enderecos::fetch(&state.db, row.endereco_id).await?;

    Ok(DataResponse::new(InstituicaoPublic {
        contato: Contato::new(&row.email, &row.telefone, None, liberado),
        tipo_instituicao: parse_column(&row.tipo_instituicao)?,
        niveis_ensino: row.niveis()?,
        logo_url: state.storage.public_url_opt(row.logo_path.as_deref()),
        id: row.id,
        nome_fantasia: row.nome_fantasia,
        razao_social: row.razao_social,
        cnpj: row.cnpj,
        descricao: row.descricao,
        cidade: endereco.cidade,
        estado: endereco.estado,
        vagas_ativas,
    }))
}

#[derive(sqlx::FromRow)]
struct ContagemPorVaga {
    vaga_id: Uuid,
    enviadas: i64,
    aceitas: i64,
    recusadas: i64,
}

#[derive(Debug, serde::Deserialize, Default)]
pub struct MinhasVagasQuery {
    pub status: Option<VagaStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// GET /api/instituicoes/me/vagas
pub async fn minhas_vagas(
    State(state): State<Arc<AppState>>,
    auth: RequireInstituicao,
    AppQuery(query): AppQuery<MinhasVagasQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let id = instituicao_id(&state.db, auth.user_id).await?;
    let pagination = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    let status = query.status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM vagas
        WHERE instituicao_id = $1 AND deleted_at IS NULL
          AND ($2::text IS NULL OR status = $2)
        "#,
    )
    .bind(id)
    .bind(status)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, VagaRow>(
        r#"
        SELECT v.id, v.instituicao_id, i.nome_fantasia AS instituicao_nome, v.titulo, v.descricao,
               v.cidade, v.estado, v.modalidade, v.regime, v.carga_horaria, v.remuneracao,
               v.nivel_ensino, v.aluno_idade, v.status, v.created_at, v.updated_at
        FROM vagas v
        JOIN instituicoes i ON i.id = v.instituicao_id
        WHERE v.instituicao_id = $1 AND v.deleted_at IS NULL
          AND ($2::text IS NULL OR v.status = $2)
        ORDER BY v.created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(id)
    .bind(status)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let contagens = sqlx::query_as::<_, ContagemPorVaga>(
        r#"
        SELECT vaga_id,
               COUNT(*) FILTER (WHERE status = 'ENVIADA') AS enviadas,
               COUNT(*) FILTER (WHERE status = 'ACEITA') AS aceitas,
               COUNT(*) FILTER (WHERE status = 'RECUSADA') AS recusadas
        FROM propostas
        WHERE vaga_id = ANY($1)
        GROUP BY vaga_id
        "#,
    )
    .bind(&ids)
    .fetch_all(&state.db)
    .await?;

    let mut contagens: HashMap<Uuid, PropostaContagem> = contagens
        .into_iter()
        .map(|c| {
            (
                c.vaga_id,
                PropostaContagem {
                    enviadas: c.enviadas,
                    aceitas: c.aceitas,
                    recusadas: c.recusadas,
                },
            )
        })
        .collect();

    let data = vagas::hydrate(&state.db, rows)
        .await?
        .into_iter()
        .map(|vaga| MinhaVaga {
            propostas: contagens.remove(&vaga.id).unwrap_or_default(),
            vaga,
        })
        .collect();

    Ok(Paginated::new(data, &pagination, total))
}
