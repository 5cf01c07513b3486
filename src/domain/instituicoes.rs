//! Institution (school) profile types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::contato::Contato;
use super::enderecos::{Endereco, EnderecoInput};
use super::vagas::Vaga;
use crate::error::ApiError;
use crate::validation::ValidationErrors;

text_enum! {
    TipoInstituicao {
        Publica => "PUBLICA",
        Privada => "PRIVADA",
        Filantropica => "FILANTROPICA",
    }
}

text_enum! {
    NivelEnsino {
        EducacaoInfantil => "EDUCACAO_INFANTIL",
        FundamentalI => "FUNDAMENTAL_I",
        FundamentalII => "FUNDAMENTAL_II",
        Medio => "MEDIO",
        Tecnico => "TECNICO",
        Superior => "SUPERIOR",
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct InstituicaoRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endereco_id: Uuid,
    pub email: String,
    pub razao_social: String,
    pub nome_fantasia: String,
    pub cnpj: String,
    pub telefone: String,
    pub responsavel: String,
    pub tipo_instituicao: String,
    pub niveis_ensino: Vec<String>,
    pub descricao: Option<String>,
    pub logo_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstituicaoRow {
    pub fn niveis(&self) -> Result<Vec<NivelEnsino>, ApiError> {
        self.niveis_ensino
            .iter()
            .map(|n| super::parse_column(n))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstituicaoProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub razao_social: String,
    pub nome_fantasia: String,
    pub cnpj: String,
    pub telefone: String,
    pub responsavel: String,
    pub tipo_instituicao: TipoInstituicao,
    pub niveis_ensino: Vec<NivelEnsino>,
    pub descricao: Option<String>,
    pub logo_url: Option<String>,
    pub endereco: Endereco,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Institution as shown to candidates; the CNPJ is public record
#[derive(Debug, Clone, Serialize)]
pub struct InstituicaoPublic {
    pub id: Uuid,
    pub nome_fantasia: String,
    pub razao_social: String,
    pub cnpj: String,
    pub tipo_instituicao: TipoInstituicao,
    pub niveis_ensino: Vec<NivelEnsino>,
    pub descricao: Option<String>,
    pub logo_url: Option<String>,
    pub cidade: String,
    pub estado: String,
    pub vagas_ativas: i64,
    pub contato: Contato,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateInstituicaoRequest {
    #[serde(default)]
    pub razao_social: Option<String>,
    #[serde(default)]
    pub nome_fantasia: Option<String>,
    #[serde(default)]
    pub telefone: Option<String>,
    #[serde(default)]
    pub responsavel: Option<String>,
    #[serde(default)]
    pub tipo_instituicao: Option<TipoInstituicao>,
    #[serde(default)]
    pub niveis_ensino: Option<Vec<NivelEnsino>>,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub endereco: Option<EnderecoInput>,
}

impl UpdateInstituicaoRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        for (field, value) in [
            ("razao_social", &self.razao_social),
            ("nome_fantasia", &self.nome_fantasia),
            ("responsavel", &self.responsavel),
        ] {
            if let Some(value) = value {
                if errors.required(field, value) {
                    errors.max_len(field, value, 255);
                }
            }
        }
        if let Some(telefone) = &self.telefone {
            errors.telefone("telefone", telefone);
        }
        if let Some(niveis) = &self.niveis_ensino {
            errors.check(
                !niveis.is_empty(),
                "niveis_ensino",
                "Informe ao menos um nível de ensino.",
            );
        }
        if let Some(descricao) = &self.descricao {
            errors.max_len("descricao", descricao, 2000);
        }
        if let Some(endereco) = &self.endereco {
            errors.nested("endereco", endereco.validate());
        }
        errors.finish()
    }
}

/// Proposal totals for one job, by status
#[derive(Debug, Clone, Default, Serialize, FromRow, PartialEq, Eq)]
pub struct PropostaContagem {
    pub enviadas: i64,
    pub aceitas: i64,
    pub recusadas: i64,
}

/// One of the institution's own jobs, as listed on its panel
#[derive(Debug, Clone, Serialize)]
pub struct MinhaVaga {
    #[serde(flatten)]
    pub vaga: Vaga,
    pub propostas: PropostaContagem,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn niveis_parse_from_text_array() {
        let row = InstituicaoRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            endereco_id: Uuid::new_v4(),
            email: "escola@example.com".to_string(),
            razao_social: "Escola LTDA".to_string(),
            nome_fantasia: "Escola".to_string(),
            cnpj: "11222333000181".to_string(),
            telefone: "4133334444".to_string(),
            responsavel: "Carlos".to_string(),
            tipo_instituicao: "PRIVADA".to_string(),
            niveis_ensino: vec!["FUNDAMENTAL_I".to_string(), "MEDIO".to_string()],
            descricao: None,
            logo_path: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(
            row.niveis().unwrap(),
            vec![NivelEnsino::FundamentalI, NivelEnsino::Medio]
        );
    }

    #[test]
    fn update_rejects_empty_levels_and_blank_names() {
        let req: UpdateInstituicaoRequest = serde_json::from_value(json!({
            "nome_fantasia": "  ",
            "niveis_ensino": []
        }))
        .unwrap();
        let Err(ApiError::Validation(errors)) = req.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["niveis_ensino", "nome_fantasia"]
        );
    }

    #[test]
    fn unknown_tipo_is_rejected_by_serde() {
        let result: Result<UpdateInstituicaoRequest, _> =
            serde_json::from_value(json!({ "tipo_instituicao": "ESTADUAL" }));
        assert!(result.is_err());
    }
}
