//! Landing panel summaries, one shape per account type

use serde::Serialize;
use sqlx::FromRow;

use super::propostas::Proposta;
use super::vagas::Vaga;

#[derive(Debug, Clone, Default, Serialize, FromRow, PartialEq, Eq)]
pub struct ContagemPropostas {
    pub enviadas: i64,
    pub aceitas: i64,
    pub recusadas: i64,
}

#[derive(Debug, Clone, Default, Serialize, FromRow, PartialEq, Eq)]
pub struct ContagemVagas {
    pub ativas: i64,
    pub pausadas: i64,
    pub fechadas: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidatoDashboard {
    pub propostas: ContagemPropostas,
    pub vagas_salvas: i64,
    pub notificacoes_nao_lidas: i64,
    pub vagas_recomendadas: Vec<Vaga>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstituicaoDashboard {
    pub vagas: ContagemVagas,
    pub propostas_recebidas: ContagemPropostas,
    pub propostas_enviadas: ContagemPropostas,
    pub notificacoes_nao_lidas: i64,
    pub ultimas_propostas: Vec<Proposta>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "tipo", rename_all = "lowercase")]
pub enum Dashboard {
    Candidato(CandidatoDashboard),
    Instituicao(InstituicaoDashboard),
}

/// How many recommendations and recent proposals the panel shows
pub const PAINEL_LIMITE: i64 = 5;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tagged_by_account_type() {
        let dashboard = Dashboard::Candidato(CandidatoDashboard {
            propostas: ContagemPropostas {
                enviadas: 2,
                aceitas: 1,
                recusadas: 0,
            },
            vagas_salvas: 3,
            notificacoes_nao_lidas: 4,
            vagas_recomendadas: vec![],
        });
        let value = serde_json::to_value(dashboard).unwrap();
        assert_eq!(value["tipo"], json!("candidato"));
        assert_eq!(value["propostas"]["aceitas"], json!(1));
        assert_eq!(value["vagas_salvas"], json!(3));
    }
}
