//! Candidate profile routes

use axum::{
    extract::{Multipart, Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    clearable, deficiencias, enderecos, experiencias, like_pattern, non_blank, read_image, today,
};
use crate::api::{AppJson, AppQuery, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{RequireAuth, RequireCandidato, RequireInstituicao};
use crate::domain::auth::UserTipo;
use crate::domain::candidatos::{
    CandidatoProfile, CandidatoPublic, CandidatoResumo, CandidatoResumoRow, CandidatoRow,
    CandidatoSearchQuery, UpdateCandidatoRequest,
};
use crate::domain::contato::Contato;
use crate::domain::parse_column;
use crate::error::ApiError;
use crate::services::cache::{keys, ttl};
use crate::services::notificacoes;
use crate::services::storage::Pasta;
use crate::validation::{age_on, only_digits};

pub(crate) async fn fetch_by_user(db: &PgPool, user_id: Uuid) -> Result<CandidatoRow, ApiError> {
    sqlx::query_as::<_, CandidatoRow>(
        r#"
        SELECT c.id, c.user_id, c.endereco_id, u.email, c.nome, c.cpf, c.data_nascimento,
               c.telefone, c.escolaridade, c.curso, c.instituicao_ensino, c.descricao,
               c.foto_path, c.disponivel, c.created_at, c.updated_at
        FROM candidatos c
        JOIN users u ON u.id = c.user_id
        WHERE c.user_id = $1 AND c.deleted_at IS NULL
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Perfil de candidato não encontrado."))
}

async fn fetch_by_id(db: &PgPool, id: Uuid) -> Result<CandidatoRow, ApiError> {
    sqlx::query_as::<_, CandidatoRow>(
        r#"
        SELECT c.id, c.user_id, c.endereco_id, u.email, c.nome, c.cpf, c.data_nascimento,
               c.telefone, c.escolaridade, c.curso, c.instituicao_ensino, c.descricao,
               c.foto_path, c.disponivel, c.created_at, c.updated_at
        FROM candidatos c
        JOIN users u ON u.id = c.user_id
        WHERE c.id = $1 AND c.deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Candidato não encontrado."))
}

/// Candidate id owned by `user_id`
pub(crate) async fn candidato_id(db: &PgPool, user_id: Uuid) -> Result<Uuid, ApiError> {
    sqlx::query_scalar("SELECT id FROM candidatos WHERE user_id = $1 AND deleted_at IS NULL")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Perfil de candidato não encontrado."))
}

async fn load_profile(state: &AppState, user_id: Uuid) -> Result<CandidatoProfile, ApiError> {
    let row = fetch_by_user(&state.db, user_id).await?;
    let endereco = enderecos::fetch(&state.db, row.endereco_id).await?;
    let deficiencias = deficiencias::for_candidato(&state.db, row.id).await?;
    let experiencias_profissionais = experiencias::profissionais_of(&state.db, row.id).await?;
    let experiencias_pessoais = experiencias::pessoais_of(&state.db, row.id).await?;

    Ok(CandidatoProfile {
        escolaridade: parse_column(&row.escolaridade)?,
        foto_url: state.storage.public_url_opt(row.foto_path.as_deref()),
        id: row.id,
        user_id: row.user_id,
        email: row.email,
        nome: row.nome,
        cpf: row.cpf,
        data_nascimento: row.data_nascimento,
        telefone: row.telefone,
        curso: row.curso,
        instituicao_ensino: row.instituicao_ensino,
        descricao: row.descricao,
        disponivel: row.disponivel,
        endereco,
        deficiencias,
        experiencias_profissionais,
        experiencias_pessoais,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

pub(crate) async fn invalidate_profile(state: &AppState, user_id: Uuid) {
    state.cache.delete(&keys::candidato_profile(user_id)).await;
}

/// GET /api/candidatos/me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = auth.user_id;
    let loader = state.clone();
    let profile = state
        .cache
        .remember(&keys::candidato_profile(user_id), ttl::PROFILE, || async move {
            load_profile(&loader, user_id).await
        })
        .await?;

    Ok(DataResponse::new(profile))
}

/// PUT /api/candidatos/me
///
/// Partial update; `deficiencia_ids` replaces the whole set when present and
/// a blank `curso`, `instituicao_ensino` or `descricao` clears the field.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    AppJson(req): AppJson<UpdateCandidatoRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = fetch_by_user(&state.db, auth.user_id).await?;
    req.validate(&current, today())?;

    let deficiencia_ids = match &req.deficiencia_ids {
        Some(ids) => Some(deficiencias::validate_ids(&state.db, "deficiencia_ids", ids).await?),
        None => None,
    };

    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        UPDATE candidatos SET
            nome = COALESCE($2, nome),
            data_nascimento = COALESCE($3, data_nascimento),
            telefone = COALESCE($4, telefone),
            escolaridade = COALESCE($5, escolaridade),
            curso = CASE WHEN $6::text IS NULL THEN curso ELSE NULLIF($6, '') END,
            instituicao_ensino = CASE WHEN $7::text IS NULL THEN instituicao_ensino
                                      ELSE NULLIF($7, '') END,
            descricao = CASE WHEN $8::text IS NULL THEN descricao ELSE NULLIF($8, '') END,
            disponivel = COALESCE($9, disponivel),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(current.id)
    .bind(non_blank(&req.nome))
    .bind(req.data_nascimento)
    .bind(req.telefone.as_deref().map(only_digits))
    .bind(req.escolaridade.map(|e| e.as_str()))
    .bind(clearable(&req.curso))
    .bind(clearable(&req.instituicao_ensino))
    .bind(clearable(&req.descricao))
    .bind(req.disponivel)
    .execute(&mut *tx)
    .await?;

    if let Some(endereco) = &req.endereco {
        enderecos::update(&mut tx, current.endereco_id, endereco).await?;
    }
    if let Some(ids) = &deficiencia_ids {
        deficiencias::replace_for_candidato(&mut tx, current.id, ids).await?;
    }
    tx.commit().await?;

    invalidate_profile(&state, auth.user_id).await;
    tracing::info!(candidato_id = %current.id, "Candidate profile updated");

    Ok(DataResponse::new(load_profile(&state, auth.user_id).await?))
}

#[derive(Serialize)]
pub struct FotoResponse {
    pub foto_url: String,
}

/// POST /api/candidatos/me/foto
pub async fn upload_foto(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (kind, bytes) = read_image(&state.storage, multipart, "foto").await?;
    let current = fetch_by_user(&state.db, auth.user_id).await?;

    let path = state.storage.save_image(Pasta::Fotos, kind, &bytes).await?;
    sqlx::query("UPDATE candidatos SET foto_path = $2, updated_at = NOW() WHERE id = $1")
        .bind(current.id)
        .bind(&path)
        .execute(&state.db)
        .await?;

    if let Some(previous) = current.foto_path.as_deref() {
        state.storage.delete(previous).await;
    }
    invalidate_profile(&state, auth.user_id).await;

    Ok(DataResponse::new(FotoResponse {
        foto_url: state.storage.public_url(&path),
    }))
}

/// DELETE /api/candidatos/me
///
/// Soft delete. Pending proposals are dropped, with a notice to each
/// institution, and every session of the account is revoked.
pub async fn delete_me(
    State(state): State<Arc<AppState>>,
    auth: RequireCandidato,
) -> Result<impl IntoResponse, ApiError> {
    let id = candidato_id(&state.db, auth.user_id).await?;

    let mut tx = state.db.begin().await?;
    sqlx::query("UPDATE candidatos SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(auth.user_id)
        .execute(&mut *tx)
        .await?;
    notificacoes::candidato_encerrou_conta(&mut *tx, id).await?;
    sqlx::query("DELETE FROM propostas WHERE candidato_id = $1 AND status = 'ENVIADA'")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM vagas_salvas WHERE candidato_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    super::auth::revoke_sessions(&state, auth.user_id).await?;
    tx.commit().await?;

    invalidate_profile(&state, auth.user_id).await;
    tracing::info!(candidato_id = %id, "Candidate account deleted");

    Ok(NoContent)
}

/// GET /api/candidatos/:id
///
/// Contact details are only shown to the candidate and to institutions
/// holding an accepted proposal with them.
pub async fn get_candidato(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = fetch_by_id(&state.db, id).await?;

    let liberado = match auth.tipo {
        UserTipo::Candidato => row.user_id == auth.user_id,
        UserTipo::Instituicao => {
            sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM propostas p
                    JOIN instituicoes i ON i.id = p.instituicao_id
                    WHERE p.candidato_id = $1 AND i.user_id = $2 AND p.status = 'ACEITA'
                )
                "#,
            )
            .bind(row.id)
            .bind(auth.user_id)
            .fetch_one(&state.db)
            .await?
        }
    };

    let endereco = enderecos::fetch(&state.db, row.endereco_id).await?;
    let deficiencias = deficiencias::for_candidato(&state.db, row.id).await?;
    let experiencias_profissionais = experiencias::profissionais_of(&state.db, row.id).await?;

    Ok(DataResponse::new(CandidatoPublic {
        contato: Contato::new(&row.email, &row.telefone, Some(&row.cpf), liberado),
        idade: age_on(row.data_nascimento, today()),
        escolaridade: parse_column(&row.escolaridade)?,
        foto_url: state.storage.public_url_opt(row.foto_path.as_deref()),
        id: row.id,
        nome: row.nome,
        curso: row.curso,
        instituicao_ensino: row.instituicao_ensino,
        descricao: row.descricao,
        disponivel: row.disponivel,
        cidade: endereco.cidade,
        estado: endereco.estado,
        deficiencias,
        experiencias_profissionais,
    }))
}

/// GET /api/candidatos
///
/// Institution-only search over available candidates.
pub async fn search_candidatos(
    State(state): State<Arc<AppState>>,
    _auth: RequireInstituicao,
    AppQuery(query): AppQuery<CandidatoSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    let cidade = non_blank(&query.cidade);
    let estado = non_blank(&query.estado).map(|uf| uf.to_uppercase());
    let escolaridade = query.escolaridade.map(|e| e.as_str());
    let q = non_blank(&query.q).map(|q| like_pattern(&q));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM candidatos c
        JOIN enderecos e ON e.id = c.endereco_id
        WHERE c.deleted_at IS NULL AND c.disponivel
          AND ($1::text IS NULL OR LOWER(e.cidade) = LOWER($1))
          AND ($2::text IS NULL OR e.estado = $2)
          AND ($3::int IS NULL OR EXISTS (
                SELECT 1 FROM candidato_deficiencia cd
                WHERE cd.candidato_id = c.id AND cd.deficiencia_id = $3))
          AND ($4::text IS NULL OR c.escolaridade = $4)
          AND ($5::text IS NULL OR c.nome ILIKE $5 OR c.descricao ILIKE $5 OR c.curso ILIKE $5)
        "#,
    )
    .bind(&cidade)
    .bind(&estado)
    .bind(query.deficiencia_id)
    .bind(escolaridade)
    .bind(&q)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, CandidatoResumoRow>(
        r#"
        SELECT c.id, c.nome, c.data_nascimento, c.escolaridade, c.curso, c.foto_path,
               c.disponivel, e.cidade, e.estado
        FROM candidatos c
        JOIN enderecos e ON e.id = c.endereco_id
        WHERE c.deleted_at IS NULL AND c.disponivel
          AND ($1::text IS NULL OR LOWER(e.cidade) = LOWER($1))
          AND ($2::text IS NULL OR e.estado = $2)
          AND ($3::int IS NULL OR EXISTS (
                SELECT 1 FROM candidato_deficiencia cd
                WHERE cd.candidato_id = c.id AND cd.deficiencia_id = $3))
          AND ($4::text IS NULL OR c.escolaridade = $4)
          AND ($5::text IS NULL OR c.nome ILIKE $5 OR c.descricao ILIKE $5 OR c.curso ILIKE $5)
        ORDER BY c.updated_at DESC
        LIMIT $6 OFFSET $7
        "#,
    )
    .bind(&cidade)
    .bind(&estado)
    .bind(query.deficiencia_id)
    .bind(escolaridade)
    .bind(&q)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut deficiencias = deficiencias::for_candidatos(&state.db, &ids).await?;
    let hoje = today();

    let data = rows
        .into_iter()
        .map(|row| {
            Ok(CandidatoResumo {
                idade: age_on(row.data_nascimento, hoje),
                escolaridade: parse_column(&row.escolaridade)?,
                foto_url: state.storage.public_url_opt(row.foto_path.as_deref()),
                deficiencias: deficiencias.remove(&row.id).unwrap_or_default(),
                id: row.id,
                nome: row.nome,
                curso: row.curso,
                disponivel: row.disponivel,
                cidade: row.cidade,
                estado: row.estado,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(Paginated::new(data, &pagination, total))
}
