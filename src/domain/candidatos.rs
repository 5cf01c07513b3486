//! Candidate (support aide) profile types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::auth::validate_formacao;
use super::contato::Contato;
use super::deficiencias::Deficiencia;
use super::enderecos::{Endereco, EnderecoInput};
use crate::error::ApiError;
use crate::validation::{age_on, ValidationErrors, MIN_AGE};

text_enum! {
    Escolaridade {
        FundamentalCompleto => "FUNDAMENTAL_COMPLETO",
        MedioIncompleto => "MEDIO_INCOMPLETO",
        MedioCompleto => "MEDIO_COMPLETO",
        SuperiorIncompleto => "SUPERIOR_INCOMPLETO",
        SuperiorCompleto => "SUPERIOR_COMPLETO",
        PosGraduacao => "POS_GRADUACAO",
    }
}

impl Escolaridade {
    pub fn exige_curso(&self) -> bool {
        matches!(
            self,
            Self::SuperiorIncompleto | Self::SuperiorCompleto | Self::PosGraduacao
        )
    }
}

/// Candidate row joined with the owning user's email
#[derive(Debug, Clone, FromRow)]
pub struct CandidatoRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endereco_id: Uuid,
    pub email: String,
    pub nome: String,
    pub cpf: String,
    pub data_nascimento: NaiveDate,
    pub telefone: String,
    pub escolaridade: String,
    pub curso: Option<String>,
    pub instituicao_ensino: Option<String>,
    pub descricao: Option<String>,
    pub foto_path: Option<String>,
    pub disponivel: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Own profile, everything unmasked
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatoProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub nome: String,
    pub cpf: String,
    pub data_nascimento: NaiveDate,
    pub telefone: String,
    pub escolaridade: Escolaridade,
    pub curso: Option<String>,
    pub instituicao_ensino: Option<String>,
    pub descricao: Option<String>,
    pub foto_url: Option<String>,
    pub disponivel: bool,
    pub endereco: Endereco,
    pub deficiencias: Vec<Deficiencia>,
    pub experiencias_profissionais: Vec<ExperienciaProfissional>,
    pub experiencias_pessoais: Vec<ExperienciaPessoal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile as seen by someone else
#[derive(Debug, Clone, Serialize)]
pub struct CandidatoPublic {
    pub id: Uuid,
    pub nome: String,
    pub idade: i32,
    pub escolaridade: Escolaridade,
    pub curso: Option<String>,
    pub instituicao_ensino: Option<String>,
    pub descricao: Option<String>,
    pub foto_url: Option<String>,
    pub disponivel: bool,
    pub cidade: String,
    pub estado: String,
    pub deficiencias: Vec<Deficiencia>,
    pub experiencias_profissionais: Vec<ExperienciaProfissional>,
    pub contato: Contato,
}

/// Row for candidate search listings
#[derive(Debug, Clone, FromRow)]
pub struct CandidatoResumoRow {
    pub id: Uuid,
    pub nome: String,
    pub data_nascimento: NaiveDate,
    pub escolaridade: String,
    pub curso: Option<String>,
    pub foto_path: Option<String>,
    pub disponivel: bool,
    pub cidade: String,
    pub estado: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidatoResumo {
    pub id: Uuid,
    pub nome: String,
    pub idade: i32,
    pub escolaridade: Escolaridade,
    pub curso: Option<String>,
    pub foto_url: Option<String>,
    pub disponivel: bool,
    pub cidade: String,
    pub estado: String,
    pub deficiencias: Vec<Deficiencia>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CandidatoSearchQuery {
    pub cidade: Option<String>,
    pub estado: Option<String>,
    pub deficiencia_id: Option<i32>,
    pub escolaridade: Option<Escolaridade>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Partial update; absent fields are kept
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateCandidatoRequest {
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub data_nascimento: Option<NaiveDate>,
    #[serde(default)]
    pub telefone: Option<String>,
    #[serde(default)]
    pub escolaridade: Option<Escolaridade>,
    #[serde(default)]
    pub curso: Option<String>,
    #[serde(default)]
    pub instituicao_ensino: Option<String>,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub disponivel: Option<bool>,
    #[serde(default)]
    pub endereco: Option<EnderecoInput>,
    /// Replaces the whole set when present
    #[serde(default)]
    pub deficiencia_ids: Option<Vec<i32>>,
}

impl UpdateCandidatoRequest {
    /// `current` supplies the stored values the dependency rules need
    pub fn validate(&self, current: &CandidatoRow, today: NaiveDate) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if let Some(nome) = &self.nome {
            if errors.required("nome", nome) {
                errors.max_len("nome", nome, 255);
            }
        }
        if let Some(data_nascimento) = self.data_nascimento {
            errors.check(
                age_on(data_nascimento, today) >= MIN_AGE,
                "data_nascimento",
                "O candidato deve ter pelo menos 18 anos.",
            );
        }
        if let Some(telefone) = &self.telefone {
            errors.telefone("telefone", telefone);
        }

        let escolaridade = match self.escolaridade {
            Some(e) => e,
            None => current.escolaridade.parse().unwrap_or(Escolaridade::MedioCompleto),
        };
        validate_formacao(
            &mut errors,
            escolaridade,
            self.curso.as_deref().or(current.curso.as_deref()),
            self.instituicao_ensino
                .as_deref()
                .or(current.instituicao_ensino.as_deref()),
        );

        if let Some(descricao) = &self.descricao {
            errors.max_len("descricao", descricao, 2000);
        }
        if let Some(endereco) = &self.endereco {
            errors.nested("endereco", endereco.validate());
        }
        errors.finish()
    }
}

// ============================================================================
// Experiences
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct ExperienciaProfissional {
    pub id: Uuid,
    pub candidato_id: Uuid,
    pub instituicao: String,
    pub cargo: String,
    pub data_inicio: NaiveDate,
    pub data_fim: Option<NaiveDate>,
    pub atual: bool,
    pub descricao: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperienciaProfissionalInput {
    pub instituicao: String,
    pub cargo: String,
    pub data_inicio: NaiveDate,
    #[serde(default)]
    pub data_fim: Option<NaiveDate>,
    #[serde(default)]
    pub atual: bool,
    #[serde(default)]
    pub descricao: Option<String>,
}

impl ExperienciaProfissionalInput {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if errors.required("instituicao", &self.instituicao) {
            errors.max_len("instituicao", &self.instituicao, 255);
        }
        if errors.required("cargo", &self.cargo) {
            errors.max_len("cargo", &self.cargo, 255);
        }
        errors.check(
            self.data_inicio <= today,
            "data_inicio",
            "A data de início não pode estar no futuro.",
        );
        match (self.atual, self.data_fim) {
            (false, None) => errors.add(
                "data_fim",
                "Informe a data de término ou marque como experiência atual.",
            ),
            (true, Some(_)) => errors.add(
                "data_fim",
                "Uma experiência atual não possui data de término.",
            ),
            (false, Some(fim)) => errors.check(
                fim >= self.data_inicio,
                "data_fim",
                "A data de término deve ser posterior à data de início.",
            ),
            (true, None) => {}
        }
        if let Some(descricao) = &self.descricao {
            errors.max_len("descricao", descricao, 2000);
        }
        errors.finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct ExperienciaPessoal {
    pub id: Uuid,
    pub candidato_id: Uuid,
    pub titulo: String,
    pub descricao: String,
    pub deficiencia_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExperienciaPessoalInput {
    pub titulo: String,
    pub descricao: String,
    #[serde(default)]
    pub deficiencia_id: Option<i32>,
}

impl ExperienciaPessoalInput {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if errors.required("titulo", &self.titulo) {
            errors.max_len("titulo", &self.titulo, 255);
        }
        if errors.required("descricao", &self.descricao) {
            errors.max_len("descricao", &self.descricao, 2000);
        }
        errors.finish()
    }
}
