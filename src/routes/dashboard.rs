//! Landing panel for both account types

use axum::{extract::State, response::IntoResponse};
use std::sync::Arc;
use uuid::Uuid;

use super::{candidatos, instituicoes, notificacoes, propostas, vagas};
use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::auth::UserTipo;
use crate::domain::dashboard::{
    CandidatoDashboard, ContagemPropostas, ContagemVagas, Dashboard, InstituicaoDashboard,
    PAINEL_LIMITE,
};
use crate::domain::vagas::VagaRow;
use crate::error::ApiError;

/// GET /api/dashboard
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let dashboard = match auth.tipo {
        UserTipo::Candidato => Dashboard::Candidato(candidato(&state, auth.user_id).await?),
        UserTipo::Instituicao => Dashboard::Instituicao(instituicao(&state, auth.user_id).await?),
    };
    Ok(DataResponse::new(dashboard))
}

async fn candidato(state: &AppState, user_id: Uuid) -> Result<CandidatoDashboard, ApiError> {
    let id = candidatos::candidato_id(&state.db, user_id).await?;

    let propostas = sqlx::query_as::<_, ContagemPropostas>(
        r#"
        SELECT COUNT(*) FILTER (WHERE status = 'ENVIADA') AS enviadas,
               COUNT(*) FILTER (WHERE status = 'ACEITA') AS aceitas,
               COUNT(*) FILTER (WHERE status = 'RECUSADA') AS recusadas
        FROM propostas
        WHERE candidato_id = $1
        "#,
    )
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    let vagas_salvas: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM vagas_salvas s
        JOIN vagas v ON v.id = s.vaga_id
        WHERE s.candidato_id = $1 AND v.deleted_at IS NULL
        "#,
    )
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    // Open jobs in the candidate's state sharing at least one disability with
    // their profile (any job when the profile lists none), minus jobs they
    // already have a proposal for.
    let rows = sqlx::query_as::<_, VagaRow>(
        r#"
        SELECT v.id, v.instituicao_id, i.nome_fantasia AS instituicao_nome, v.titulo, v.descricao,
               v.cidade, v.estado, v.modalidade, v.regime, v.carga_horaria, v.remuneracao,
               v.nivel_ensino, v.aluno_idade, v.status, v.created_at, v.updated_at
        FROM vagas v
        JOIN instituicoes i ON i.id = v.instituicao_id
        JOIN candidatos c ON c.id = $1
        JOIN enderecos e ON e.id = c.endereco_id
        WHERE v.deleted_at IS NULL AND v.status = 'ATIVA'
          AND v.estado = e.estado
          AND (
            NOT EXISTS (SELECT 1 FROM candidato_deficiencia cd WHERE cd.candidato_id = c.id)
            OR EXISTS (
                SELECT 1 FROM vaga_deficiencia vd
                JOIN candidato_deficiencia cd ON cd.deficiencia_id = vd.deficiencia_id
                WHERE vd.vaga_id = v.id AND cd.candidato_id = c.id
            )
          )
          AND NOT EXISTS (
            SELECT 1 FROM propostas p WHERE p.vaga_id = v.id AND p.candidato_id = c.id
          )
        ORDER BY v.created_at DESC
        LIMIT $2
        "#,
    )
    .bind(id)
    .bind(PAINEL_LIMITE)
    .fetch_all(&state.db)
    .await?;

    Ok(CandidatoDashboard {
        propostas,
        vagas_salvas,
        notificacoes_nao_lidas: notificacoes::nao_lidas(&state.db, user_id).await?,
        vagas_recomendadas: vagas::hydrate(&state.db, rows).await?,
    })
}

async fn instituicao(state: &AppState, user_id: Uuid) -> Result<InstituicaoDashboard, ApiError> {
    let id = instituicoes::instituicao_id(&state.db, user_id).await?;

    let (vagas, propostas_recebidas, propostas_enviadas, notificacoes_nao_lidas, ultimas_propostas) =
        futures::try_join!(
            contagem_vagas(state, id),
            contagem_por_iniciador(state, id, "CANDIDATO"),
            contagem_por_iniciador(state, id, "INSTITUICAO"),
            notificacoes::nao_lidas(&state.db, user_id),
            propostas::recebidas_recentes(&state.db, user_id, PAINEL_LIMITE),
        )?;

    Ok(InstituicaoDashboard {
        vagas,
        propostas_recebidas,
        propostas_enviadas,
        notificacoes_nao_lidas,
        ultimas_propostas,
    })
}

async fn contagem_vagas(state: &AppState, instituicao_id: Uuid) -> Result<ContagemVagas, ApiError> {
    let contagem = sqlx::query_as::<_, ContagemVagas>(
        r#"
        SELECT COUNT(*) FILTER (WHERE status = 'ATIVA') AS ativas,
               COUNT(*) FILTER (WHERE status = 'PAUSADA') AS pausadas,
               COUNT(*) FILTER (WHERE status = 'FECHADA') AS fechadas
        FROM vagas
        WHERE instituicao_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(instituicao_id)
    .fetch_one(&state.db)
    .await?;
    Ok(contagem)
}

async fn contagem_por_iniciador(
    state: &AppState,
    instituicao_id: Uuid,
    iniciador: &str,
) -> Result<ContagemPropostas, ApiError> {
    let contagem = sqlx::query_as::<_, ContagemPropostas>(
        r#"
        SELECT COUNT(*) FILTER (WHERE status = 'ENVIADA') AS enviadas,
               COUNT(*) FILTER (WHERE status = 'ACEITA') AS aceitas,
               COUNT(*) FILTER (WHERE status = 'RECUSADA') AS recusadas
        FROM propostas
        WHERE instituicao_id = $1 AND iniciador = $2
        "#,
    )
    .bind(instituicao_id)
    .bind(iniciador)
    .fetch_one(&state.db)
    .await?;
    Ok(contagem)
}
