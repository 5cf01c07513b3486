//! Disability taxonomy routes and the pivot-table helpers shared by
//! candidate and job handlers.

use axum::{extract::State, response::IntoResponse};
use sqlx::{PgConnection, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::domain::deficiencias::{normalize_ids, Deficiencia};
use crate::error::ApiError;
use crate::services::cache::{keys, ttl};

/// GET /api/deficiencias
pub async fn list_deficiencias(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let deficiencias = state
        .cache
        .remember(&keys::deficiencias(), ttl::DEFICIENCIAS, || async move {
            sqlx::query_as::<_, Deficiencia>(
                "SELECT id, nome, categoria FROM deficiencias ORDER BY categoria, nome",
            )
            .fetch_all(&db)
            .await
            .map_err(ApiError::from)
        })
        .await?;

    Ok(DataResponse::new(deficiencias))
}

/// Deduplicates `ids` and fails with a 422 on `field` if any is unknown
pub(crate) async fn validate_ids(
    db: &PgPool,
    field: &str,
    ids: &[i32],
) -> Result<Vec<i32>, ApiError> {
    let ids = normalize_ids(ids);
    if ids.is_empty() {
        return Ok(ids);
    }

    let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deficiencias WHERE id = ANY($1)")
        .bind(&ids)
        .fetch_one(db)
        .await?;

    if found as usize != ids.len() {
        return Err(ApiError::field(field, "Uma ou mais deficiências informadas não existem."));
    }
    Ok(ids)
}

pub(crate) async fn replace_for_candidato(
    conn: &mut PgConnection,
    candidato_id: Uuid,
    ids: &[i32],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM candidato_deficiencia WHERE candidato_id = $1")
        .bind(candidato_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO candidato_deficiencia (candidato_id, deficiencia_id)
        SELECT $1, UNNEST($2::int[])
        "#,
    )
    .bind(candidato_id)
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn replace_for_vaga(
    conn: &mut PgConnection,
    vaga_id: Uuid,
    ids: &[i32],
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM vaga_deficiencia WHERE vaga_id = $1")
        .bind(vaga_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO vaga_deficiencia (vaga_id, deficiencia_id)
        SELECT $1, UNNEST($2::int[])
        "#,
    )
    .bind(vaga_id)
    .bind(ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[derive(sqlx::FromRow)]
struct OwnedDeficiencia {
    owner_id: Uuid,
    id: i32,
    nome: String,
    categoria: String,
}

fn group(rows: Vec<OwnedDeficiencia>) -> HashMap<Uuid, Vec<Deficiencia>> {
    let mut map: HashMap<Uuid, Vec<Deficiencia>> = HashMap::new();
    for row in rows {
        map.entry(row.owner_id).or_default().push(Deficiencia {
            id: row.id,
            nome: row.nome,
            categoria: row.categoria,
        });
    }
    map
}

pub(crate) async fn for_candidatos(
    db: &PgPool,
    candidato_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Deficiencia>>, ApiError> {
    if candidato_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, OwnedDeficiencia>(
        r#"
        SELECT cd.candidato_id AS owner_id, d.id, d.nome, d.categoria
        FROM candidato_deficiencia cd
        JOIN deficiencias d ON d.id = cd.deficiencia_id
        WHERE cd.candidato_id = ANY($1)
        ORDER BY d.nome
        "#,
    )
    .bind(candidato_ids)
    .fetch_all(db)
    .await?;

    Ok(group(rows))
}

pub(crate) async fn for_candidato(
    db: &PgPool,
    candidato_id: Uuid,
) -> Result<Vec<Deficiencia>, ApiError> {
    Ok(for_candidatos(db, &[candidato_id])
        .await?
        .remove(&candidato_id)
        .unwrap_or_default())
}

pub(crate) async fn for_vagas(
    db: &PgPool,
    vaga_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Deficiencia>>, ApiError> {
    if vaga_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = sqlx::query_as::<_, OwnedDeficiencia>(
        r#"
        SELECT vd.vaga_id AS owner_id, d.id, d.nome, d.categoria
        FROM vaga_deficiencia vd
        JOIN deficiencias d ON d.id = vd.deficiencia_id
        WHERE vd.vaga_id = ANY($1)
        ORDER BY d.nome
        "#,
    )
    .bind(vaga_ids)
    .fetch_all(db)
    .await?;

    Ok(group(rows))
}
