//! Proposal routes
//!
//! Candidates apply to jobs and institutions invite candidates; the other
//! side accepts or rejects. Each state change notifies the counterpart in
//! the same transaction.

use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use super::{candidatos, instituicoes, non_blank, vagas};
use crate::api::{AppJson, AppQuery, Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::db::unique_violation;
use crate::domain::auth::UserTipo;
use crate::domain::propostas::{
    CreatePropostaRequest, Direcao, Iniciador, Proposta, PropostaQuery, PropostaRow,
    PropostaStatus, ResponderPropostaRequest,
};
use crate::domain::vagas::VagaStatus;
use crate::error::ApiError;
use crate::services::notificacoes;

/// Proposal joined with the job title and both parties' contact columns
macro_rules! proposta_select {
    () => {
        r#"
        SELECT p.id, p.candidato_id, p.vaga_id, p.instituicao_id, p.iniciador, p.mensagem,
               p.resposta, p.status, p.respondida_em, p.created_at, p.updated_at,
               v.titulo AS vaga_titulo, v.status AS vaga_status,
               c.user_id AS candidato_user_id, c.nome AS candidato_nome,
               cu.email AS candidato_email, c.telefone AS candidato_telefone,
               c.cpf AS candidato_cpf,
               i.user_id AS instituicao_user_id, i.nome_fantasia AS instituicao_nome,
               iu.email AS instituicao_email, i.telefone AS instituicao_telefone
        FROM propostas p
        JOIN vagas v ON v.id = p.vaga_id
        JOIN candidatos c ON c.id = p.candidato_id
        JOIN users cu ON cu.id = c.user_id
        JOIN instituicoes i ON i.id = p.instituicao_id
        JOIN users iu ON iu.id = i.user_id
        "#
    };
}

fn not_found() -> ApiError {
    ApiError::not_found("Proposta não encontrada.")
}

async fn fetch(conn: &mut PgConnection, id: Uuid) -> Result<PropostaRow, ApiError> {
    sqlx::query_as::<_, PropostaRow>(concat!(proposta_select!(), "WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(not_found)
}

/// Same as `fetch` but locks the proposal row until the transaction ends
async fn fetch_for_update(conn: &mut PgConnection, id: Uuid) -> Result<PropostaRow, ApiError> {
    sqlx::query_as::<_, PropostaRow>(concat!(
        proposta_select!(),
        "WHERE p.id = $1 FOR UPDATE OF p"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(not_found)
}

/// Latest proposals an institution has received, for its dashboard
pub(crate) async fn recebidas_recentes(
    db: &PgPool,
    instituicao_user_id: Uuid,
    limit: i64,
) -> Result<Vec<Proposta>, ApiError> {
    let rows = sqlx::query_as::<_, PropostaRow>(concat!(
        proposta_select!(),
        r#"
        WHERE i.user_id = $1 AND p.iniciador = 'CANDIDATO'
        ORDER BY p.created_at DESC
        LIMIT $2
        "#
    ))
    .bind(instituicao_user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;

    rows.into_iter()
        .map(|row| Proposta::for_viewer(row, Iniciador::Instituicao))
        .collect()
}

fn duplicate() -> ApiError {
    ApiError::field("vaga_id", "Já existe uma proposta entre este candidato e esta vaga.")
}

/// POST /api/propostas
pub async fn create_proposta(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    AppJson(req): AppJson<CreatePropostaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate(auth.tipo)?;

    let vaga = vagas::load(&state.db, req.vaga_id).await?;
    if vaga.status != VagaStatus::Ativa {
        return Err(ApiError::field("vaga_id", "A vaga não está aceitando propostas."));
    }

    let candidato_id = match auth.tipo {
        UserTipo::Candidato => candidatos::candidato_id(&state.db, auth.user_id).await?,
        UserTipo::Instituicao => {
            let instituicao_id = instituicoes::instituicao_id(&state.db, auth.user_id).await?;
            if vaga.instituicao_id != instituicao_id {
                return Err(ApiError::forbidden("Esta vaga pertence a outra instituição."));
            }
            let candidato_id = req.candidato_id.ok_or_else(|| {
                ApiError::field("candidato_id", "Informe o candidato convidado.")
            })?;
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM candidatos WHERE id = $1 AND deleted_at IS NULL)",
            )
            .bind(candidato_id)
            .fetch_one(&state.db)
            .await?;
            if !exists {
                return Err(ApiError::not_found("Candidato não encontrado."));
            }
            candidato_id
        }
    };

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM propostas WHERE candidato_id = $1 AND vaga_id = $2)",
    )
    .bind(candidato_id)
    .bind(vaga.id)
    .fetch_one(&state.db)
    .await?;
    if exists {
        return Err(duplicate());
    }

    let iniciador = Iniciador::from(auth.tipo);
    let id = Uuid::new_v4();

    let mut tx = state.db.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO propostas (id, candidato_id, vaga_id, instituicao_id, iniciador, mensagem)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(candidato_id)
    .bind(vaga.id)
    .bind(vaga.instituicao_id)
    .bind(iniciador.as_str())
    .bind(non_blank(&req.mensagem))
    .execute(&mut *tx)
    .await
    .map_err(|e| match unique_violation(&e) {
        Some(_) => duplicate(),
        None => ApiError::from(e),
    })?;

    let row = fetch(&mut tx, id).await?;
    let remetente = match iniciador {
        Iniciador::Candidato => &row.candidato_nome,
        Iniciador::Instituicao => &row.instituicao_nome,
    };
    notificacoes::proposta_recebida(
        &mut *tx,
        row.destinatario_user_id()?,
        id,
        &row.vaga_titulo,
        remetente,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        proposta_id = %id,
        vaga_id = %vaga.id,
        candidato_id = %candidato_id,
        iniciador = %iniciador,
        "Proposal created"
    );

    Ok(Created(Proposta::for_viewer(row, iniciador)?))
}

/// GET /api/propostas
pub async fn list_propostas(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    AppQuery(query): AppQuery<PropostaQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    let lado = Iniciador::from(auth.tipo);
    let status = query.status.map(|s| s.as_str());
    let enviadas = query.direcao.map(|d| d == Direcao::Enviadas);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM propostas p
        JOIN candidatos c ON c.id = p.candidato_id
        JOIN instituicoes i ON i.id = p.instituicao_id
        WHERE (c.user_id = $1 OR i.user_id = $1)
          AND ($2::text IS NULL OR p.status = $2)
          AND ($3::bool IS NULL OR (p.iniciador = $4) = $3)
        "#,
    )
    .bind(auth.user_id)
    .bind(status)
    .bind(enviadas)
    .bind(lado.as_str())
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, PropostaRow>(concat!(
        proposta_select!(),
        r#"
        WHERE (c.user_id = $1 OR i.user_id = $1)
          AND ($2::text IS NULL OR p.status = $2)
          AND ($3::bool IS NULL OR (p.iniciador = $4) = $3)
        ORDER BY p.created_at DESC
        LIMIT $5 OFFSET $6
        "#
    ))
    .bind(auth.user_id)
    .bind(status)
    .bind(enviadas)
    .bind(lado.as_str())
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data = rows
        .into_iter()
        .map(|row| Proposta::for_viewer(row, lado))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paginated::new(data, &pagination, total))
}

/// GET /api/propostas/:id
pub async fn get_proposta(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = state.db.acquire().await?;
    let row = fetch(&mut conn, id).await?;
    let lado = row
        .lado(auth.user_id)
        .ok_or_else(|| ApiError::forbidden("Você não participa desta proposta."))?;

    Ok(DataResponse::new(Proposta::for_viewer(row, lado)?))
}

/// The answer body is optional; an empty body means no message
fn parse_resposta(body: &Bytes) -> Result<ResponderPropostaRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ResponderPropostaRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::unprocessable(e.to_string()))
}

async fn responder(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    next: PropostaStatus,
    body: Bytes,
) -> Result<Proposta, ApiError> {
    let req = parse_resposta(&body)?;
    req.validate()?;

    let mut tx = state.db.begin().await?;
    let row = fetch_for_update(&mut tx, id).await?;
    let status = row.responder(auth.user_id, next)?;

    sqlx::query(
        r#"
        UPDATE propostas
        SET status = $2, resposta = $3, respondida_em = NOW(), updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(non_blank(&req.resposta))
    .execute(&mut *tx)
    .await?;

    notificacoes::proposta_respondida(
        &mut *tx,
        row.iniciador_user_id()?,
        id,
        &row.vaga_titulo,
        status,
    )
    .await?;

    let updated = fetch(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!(proposta_id = %id, status = %status, "Proposal answered");

    let lado = Iniciador::from(auth.tipo);
    Proposta::for_viewer(updated, lado)
}

/// PATCH /api/propostas/:id/aceitar
pub async fn aceitar(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let proposta = responder(&state, &auth, id, PropostaStatus::Aceita, body).await?;
    Ok(DataResponse::new(proposta))
}

/// PATCH /api/propostas/:id/recusar
pub async fn recusar(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let proposta = responder(&state, &auth, id, PropostaStatus::Recusada, body).await?;
    Ok(DataResponse::new(proposta))
}

/// DELETE /api/propostas/:id
///
/// The initiator withdraws a pending proposal. The row is removed so the
/// pair can start over later.
pub async fn delete_proposta(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;
    let row = fetch_for_update(&mut tx, id).await?;
    row.retirar(auth.user_id)?;

    sqlx::query("DELETE FROM propostas WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    notificacoes::proposta_cancelada(
        &mut *tx,
        row.destinatario_user_id()?,
        row.vaga_id,
        &row.vaga_titulo,
    )
    .await?;
    tx.commit().await?;

    tracing::info!(proposta_id = %id, "Proposal withdrawn");
    Ok(NoContent)
}
