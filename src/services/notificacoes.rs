//! Notification service
//!
//! Creates notifications when proposals and jobs change. Every function
//! takes any Postgres executor so callers can write inside their own
//! transaction.

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::domain::notificacoes::NotificacaoTipo;
use crate::domain::propostas::PropostaStatus;

/// Create a notification for a user
pub async fn criar<'e, E>(
    db: E,
    user_id: Uuid,
    tipo: NotificacaoTipo,
    titulo: &str,
    mensagem: Option<&str>,
    dados: serde_json::Value,
) -> Result<Uuid, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO notificacoes (id, user_id, tipo, titulo, mensagem, dados)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(tipo.as_str())
    .bind(titulo)
    .bind(mensagem)
    .bind(&dados)
    .execute(db)
    .await?;

    tracing::info!(
        user_id = %user_id,
        tipo = %tipo,
        notificacao_id = %id,
        "Notification created"
    );

    Ok(id)
}

/// Tell the receiving side a proposal arrived
pub async fn proposta_recebida<'e, E>(
    db: E,
    destinatario_user_id: Uuid,
    proposta_id: Uuid,
    vaga_titulo: &str,
    remetente_nome: &str,
) -> Result<Uuid, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    criar(
        db,
        destinatario_user_id,
        NotificacaoTipo::PropostaRecebida,
        "Nova proposta recebida",
        Some(&format!(
            "{} enviou uma proposta para a vaga '{}'.",
            remetente_nome, vaga_titulo
        )),
        serde_json::json!({
            "proposta_id": proposta_id,
            "vaga_titulo": vaga_titulo,
        }),
    )
    .await
}

/// Tell the initiator their proposal was answered
pub async fn proposta_respondida<'e, E>(
    db: E,
    iniciador_user_id: Uuid,
    proposta_id: Uuid,
    vaga_titulo: &str,
    status: PropostaStatus,
) -> Result<Uuid, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let (tipo, titulo, mensagem) = match status {
        PropostaStatus::Aceita => (
            NotificacaoTipo::PropostaAceita,
            "Proposta aceita",
            format!(
                "Sua proposta para a vaga '{}' foi aceita. Os contatos foram liberados.",
                vaga_titulo
            ),
        ),
        _ => (
            NotificacaoTipo::PropostaRecusada,
            "Proposta recusada",
            format!("Sua proposta para a vaga '{}' foi recusada.", vaga_titulo),
        ),
    };

    criar(
        db,
        iniciador_user_id,
        tipo,
        titulo,
        Some(&mensagem),
        serde_json::json!({
            "proposta_id": proposta_id,
            "vaga_titulo": vaga_titulo,
            "status": status,
        }),
    )
    .await
}

/// Tell the receiver a pending proposal was withdrawn
pub async fn proposta_cancelada<'e, E>(
    db: E,
    destinatario_user_id: Uuid,
    vaga_id: Uuid,
    vaga_titulo: &str,
) -> Result<Uuid, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    criar(
        db,
        destinatario_user_id,
        NotificacaoTipo::PropostaCancelada,
        "Proposta cancelada",
        Some(&format!(
            "A proposta para a vaga '{}' foi cancelada por quem a enviou.",
            vaga_titulo
        )),
        serde_json::json!({
            "vaga_id": vaga_id,
            "vaga_titulo": vaga_titulo,
        }),
    )
    .await
}

/// Notify every candidate still waiting on a proposal for a job that closed.
/// Returns how many notifications were written.
pub async fn vaga_fechada<'e, E>(db: E, vaga_id: Uuid, vaga_titulo: &str) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO notificacoes (id, user_id, tipo, titulo, mensagem, dados)
        SELECT gen_random_uuid(), c.user_id, $2, $3, $4,
               jsonb_build_object('vaga_id', $1::uuid, 'proposta_id', p.id)
        FROM propostas p
        JOIN candidatos c ON c.id = p.candidato_id
        WHERE p.vaga_id = $1 AND p.status = 'ENVIADA'
        "#,
    )
    .bind(vaga_id)
    .bind(NotificacaoTipo::VagaFechada.as_str())
    .bind("Vaga encerrada")
    .bind(format!("A vaga '{}' foi encerrada pela instituição.", vaga_titulo))
    .execute(db)
    .await?;

    let count = result.rows_affected();
    tracing::info!(vaga_id = %vaga_id, count, "Closed-job notifications created");
    Ok(count)
}

/// Tell institutions their pending proposals with a candidate who closed the
/// account were dropped. Must run before those proposals are deleted.
pub async fn candidato_encerrou_conta<'e, E>(db: E, candidato_id: Uuid) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        INSERT INTO notificacoes (id, user_id, tipo, titulo, mensagem, dados)
        SELECT gen_random_uuid(), i.user_id, $2, $3, format($4::text, v.titulo),
               jsonb_build_object('vaga_id', v.id, 'vaga_titulo', v.titulo)
        FROM propostas p
        JOIN vagas v ON v.id = p.vaga_id
        JOIN instituicoes i ON i.id = p.instituicao_id
        WHERE p.candidato_id = $1 AND p.status = 'ENVIADA'
        "#,
    )
    .bind(candidato_id)
    .bind(NotificacaoTipo::PropostaCancelada.as_str())
    .bind("Proposta cancelada")
    .bind("A proposta para a vaga '%s' foi cancelada porque o candidato encerrou a conta.")
    .execute(db)
    .await?;

    let count = result.rows_affected();
    tracing::info!(candidato_id = %candidato_id, count, "Account-closed notifications created");
    Ok(count)
}
