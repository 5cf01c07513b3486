//! Job postings published by institutions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::deficiencias::Deficiencia;
use super::instituicoes::NivelEnsino;
use super::parse_column;
use crate::error::ApiError;
use crate::validation::{is_valid_uf, ValidationErrors};

pub const MIN_CARGA_HORARIA: i32 = 1;
pub const MAX_CARGA_HORARIA: i32 = 60;

text_enum! {
    Modalidade {
        Presencial => "PRESENCIAL",
        Hibrido => "HIBRIDO",
        Remoto => "REMOTO",
    }
}

text_enum! {
    Regime {
        Clt => "CLT",
        Pj => "PJ",
        Estagio => "ESTAGIO",
        Temporario => "TEMPORARIO",
        Voluntario => "VOLUNTARIO",
    }
}

text_enum! {
    VagaStatus {
        Ativa => "ATIVA",
        Pausada => "PAUSADA",
        Fechada => "FECHADA",
    }
}

impl VagaStatus {
    /// Open and paused jobs switch freely; a closed job stays closed
    pub fn can_transition_to(&self, next: VagaStatus) -> bool {
        match self {
            VagaStatus::Fechada => false,
            _ => *self != next,
        }
    }

    pub fn transition(&self, next: VagaStatus) -> Result<VagaStatus, ApiError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(ApiError::field(
                "status",
                format!("Não é possível alterar a vaga de {} para {}.", self, next),
            ))
        }
    }
}

/// Row as selected with the owning institution's display name
#[derive(Debug, Clone, FromRow)]
pub struct VagaRow {
    pub id: Uuid,
    pub instituicao_id: Uuid,
    pub instituicao_nome: String,
    pub titulo: String,
    pub descricao: String,
    pub cidade: String,
    pub estado: String,
    pub modalidade: String,
    pub regime: String,
    pub carga_horaria: i32,
    pub remuneracao: Option<Decimal>,
    pub nivel_ensino: String,
    pub aluno_idade: Option<i32>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Vaga {
    pub id: Uuid,
    pub instituicao_id: Uuid,
    pub instituicao_nome: String,
    pub titulo: String,
    pub descricao: String,
    pub cidade: String,
    pub estado: String,
    pub modalidade: Modalidade,
    pub regime: Regime,
    pub carga_horaria: i32,
    pub remuneracao: Option<Decimal>,
    pub nivel_ensino: NivelEnsino,
    pub aluno_idade: Option<i32>,
    pub status: VagaStatus,
    pub deficiencias: Vec<Deficiencia>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vaga {
    pub fn from_row(row: VagaRow, deficiencias: Vec<Deficiencia>) -> Result<Self, ApiError> {
        Ok(Self {
            modalidade: parse_column(&row.modalidade)?,
            regime: parse_column(&row.regime)?,
            nivel_ensino: parse_column(&row.nivel_ensino)?,
            status: parse_column(&row.status)?,
            id: row.id,
            instituicao_id: row.instituicao_id,
            instituicao_nome: row.instituicao_nome,
            titulo: row.titulo,
            descricao: row.descricao,
            cidade: row.cidade,
            estado: row.estado,
            carga_horaria: row.carga_horaria,
            remuneracao: row.remuneracao,
            aluno_idade: row.aluno_idade,
            deficiencias,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVagaRequest {
    pub titulo: String,
    pub descricao: String,
    pub cidade: String,
    pub estado: String,
    pub modalidade: Modalidade,
    pub regime: Regime,
    pub carga_horaria: i32,
    #[serde(default)]
    pub remuneracao: Option<Decimal>,
    pub nivel_ensino: NivelEnsino,
    #[serde(default)]
    pub aluno_idade: Option<i32>,
    #[serde(default)]
    pub deficiencia_ids: Vec<i32>,
}

impl CreateVagaRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if errors.required("titulo", &self.titulo) {
            errors.max_len("titulo", &self.titulo, 255);
        }
        if errors.required("descricao", &self.descricao) {
            errors.max_len("descricao", &self.descricao, 5000);
        }
        if errors.required("cidade", &self.cidade) {
            errors.max_len("cidade", &self.cidade, 120);
        }
        errors.uf("estado", &self.estado);
        check_carga_horaria(&mut errors, self.carga_horaria);
        check_remuneracao(&mut errors, self.remuneracao);
        check_aluno_idade(&mut errors, self.aluno_idade);
        errors.finish()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateVagaRequest {
    #[serde(default)]
    pub titulo: Option<String>,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub cidade: Option<String>,
    #[serde(default)]
    pub estado: Option<String>,
    #[serde(default)]
    pub modalidade: Option<Modalidade>,
    #[serde(default)]
    pub regime: Option<Regime>,
    #[serde(default)]
    pub carga_horaria: Option<i32>,
    #[serde(default)]
    pub remuneracao: Option<Decimal>,
    #[serde(default)]
    pub nivel_ensino: Option<NivelEnsino>,
    #[serde(default)]
    pub aluno_idade: Option<i32>,
    #[serde(default)]
    pub deficiencia_ids: Option<Vec<i32>>,
}

impl UpdateVagaRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        if let Some(titulo) = &self.titulo {
            if errors.required("titulo", titulo) {
                errors.max_len("titulo", titulo, 255);
            }
        }
        if let Some(descricao) = &self.descricao {
            if errors.required("descricao", descricao) {
                errors.max_len("descricao", descricao, 5000);
            }
        }
        if let Some(cidade) = &self.cidade {
            if errors.required("cidade", cidade) {
                errors.max_len("cidade", cidade, 120);
            }
        }
        if let Some(estado) = &self.estado {
            errors.uf("estado", estado);
        }
        if let Some(carga) = self.carga_horaria {
            check_carga_horaria(&mut errors, carga);
        }
        check_remuneracao(&mut errors, self.remuneracao);
        check_aluno_idade(&mut errors, self.aluno_idade);
        errors.finish()
    }
}

fn check_carga_horaria(errors: &mut ValidationErrors, carga: i32) {
    errors.check(
        (MIN_CARGA_HORARIA..=MAX_CARGA_HORARIA).contains(&carga),
        "carga_horaria",
        "A carga horária deve estar entre 1 e 60 horas semanais.",
    );
}

fn check_remuneracao(errors: &mut ValidationErrors, remuneracao: Option<Decimal>) {
    if let Some(valor) = remuneracao {
        errors.check(
            !valor.is_sign_negative(),
            "remuneracao",
            "A remuneração não pode ser negativa.",
        );
    }
}

fn check_aluno_idade(errors: &mut ValidationErrors, idade: Option<i32>) {
    if let Some(idade) = idade {
        errors.check(
            (0..=120).contains(&idade),
            "aluno_idade",
            "Informe uma idade válida para o aluno.",
        );
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateVagaStatusRequest {
    pub status: VagaStatus,
}

/// Filters for the public job board
#[derive(Debug, Clone, Deserialize, Default)]
pub struct VagaQuery {
    pub cidade: Option<String>,
    pub estado: Option<String>,
    pub modalidade: Option<Modalidade>,
    pub regime: Option<Regime>,
    pub deficiencia_id: Option<i32>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl VagaQuery {
    /// Upper-cased state filter, rejected when it isn't a UF
    pub fn estado(&self) -> Result<Option<String>, ApiError> {
        match self.estado.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(uf) if is_valid_uf(uf) => Ok(Some(uf.to_uppercase())),
            Some(_) => Err(ApiError::field("estado", "Informe uma UF válida.")),
        }
    }
}
