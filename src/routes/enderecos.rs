//! Address persistence shared by the profile handlers

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::domain::enderecos::{Endereco, EnderecoInput};
use crate::error::ApiError;

pub(crate) async fn insert(
    conn: &mut PgConnection,
    input: &EnderecoInput,
) -> Result<Uuid, sqlx::Error> {
    let input = input.normalized();
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO enderecos (id, cep, logradouro, numero, complemento, bairro, cidade, estado)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(id)
    .bind(&input.cep)
    .bind(&input.logradouro)
    .bind(&input.numero)
    .bind(&input.complemento)
    .bind(&input.bairro)
    .bind(&input.cidade)
    .bind(&input.estado)
    .execute(conn)
    .await?;

    Ok(id)
}

pub(crate) async fn update(
    conn: &mut PgConnection,
    id: Uuid,
    input: &EnderecoInput,
) -> Result<(), sqlx::Error> {
    let input = input.normalized();

    sqlx::query(
        r#"
        UPDATE enderecos
        SET cep = $2, logradouro = $3, numero = $4, complemento = $5,
            bairro = $6, cidade = $7, estado = $8, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&input.cep)
    .bind(&input.logradouro)
    .bind(&input.numero)
    .bind(&input.complemento)
    .bind(&input.bairro)
    .bind(&input.cidade)
    .bind(&input.estado)
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) async fn fetch(db: &PgPool, id: Uuid) -> Result<Endereco, ApiError> {
    sqlx::query_as::<_, Endereco>(
        r#"
        SELECT id, cep, logradouro, numero, complemento, bairro, cidade, estado,
               created_at, updated_at
        FROM enderecos
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::internal(format!("endereco {} missing", id)))
}
