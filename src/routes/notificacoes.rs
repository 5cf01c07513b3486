//! Notification inbox routes

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{AppQuery, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::notificacoes::{
    ContagemNaoLidas, MarcadasComoLidas, Notificacao, NotificacaoQuery, NotificacaoRow,
};
use crate::error::ApiError;

fn not_found() -> ApiError {
    ApiError::not_found("Notificação não encontrada.")
}

/// GET /api/notificacoes
pub async fn list_notificacoes(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    AppQuery(query): AppQuery<NotificacaoQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    let unread_only = query.unread_only.unwrap_or(false);
    let tipo = query.tipo.map(|t| t.as_str());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM notificacoes
        WHERE user_id = $1
          AND (NOT $2 OR NOT lida)
          AND ($3::text IS NULL OR tipo = $3)
        "#,
    )
    .bind(auth.user_id)
    .bind(unread_only)
    .bind(tipo)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, NotificacaoRow>(
        r#"
        SELECT id, user_id, tipo, titulo, mensagem, dados, lida, lida_em, created_at
        FROM notificacoes
        WHERE user_id = $1
          AND (NOT $2 OR NOT lida)
          AND ($3::text IS NULL OR tipo = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(auth.user_id)
    .bind(unread_only)
    .bind(tipo)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data = rows
        .into_iter()
        .map(Notificacao::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paginated::new(data, &pagination, total))
}

pub(crate) async fn nao_lidas(db: &sqlx::PgPool, user_id: Uuid) -> Result<i64, ApiError> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM notificacoes WHERE user_id = $1 AND NOT lida")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// GET /api/notificacoes/nao-lidas/contagem
pub async fn contagem_nao_lidas(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let count = nao_lidas(&state.db, auth.user_id).await?;
    Ok(DataResponse::new(ContagemNaoLidas { count }))
}

/// GET /api/notificacoes/:id
pub async fn get_notificacao(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, NotificacaoRow>(
        r#"
        SELECT id, user_id, tipo, titulo, mensagem, dados, lida, lida_em, created_at
        FROM notificacoes
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(not_found)?;

    Ok(DataResponse::new(Notificacao::try_from(row)?))
}

/// PATCH /api/notificacoes/:id/lida
///
/// Marking an already read notification keeps its original `lida_em`.
pub async fn marcar_lida(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, NotificacaoRow>(
        r#"
        UPDATE notificacoes
        SET lida = TRUE, lida_em = COALESCE(lida_em, NOW())
        WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, tipo, titulo, mensagem, dados, lida, lida_em, created_at
        "#,
    )
    .bind(id)
    .bind(auth.user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(not_found)?;

    Ok(DataResponse::new(Notificacao::try_from(row)?))
}

/// PATCH /api/notificacoes/lidas
pub async fn marcar_todas_lidas(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query(
        "UPDATE notificacoes SET lida = TRUE, lida_em = NOW() WHERE user_id = $1 AND NOT lida",
    )
    .bind(auth.user_id)
    .execute(&state.db)
    .await?;

    Ok(DataResponse::new(MarcadasComoLidas {
        updated: result.rows_affected(),
    }))
}

/// DELETE /api/notificacoes/:id
pub async fn delete_notificacao(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query("DELETE FROM notificacoes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(not_found());
    }
    Ok(NoContent)
}
