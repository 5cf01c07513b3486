//! Authentication domain types
//!
//! Registration payloads for both account types, login and password reset.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::candidatos::Escolaridade;
use super::enderecos::EnderecoInput;
use super::instituicoes::{NivelEnsino, TipoInstituicao};
use crate::auth::IssuedToken;
use crate::error::ApiError;
use crate::validation::{age_on, ValidationErrors, MIN_AGE};

text_enum! {
    /// Account type; each user owns exactly one profile of this kind
    UserTipo {
        Candidato => "candidato",
        Instituicao => "instituicao",
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterCandidatoRequest {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub nome: String,
    pub cpf: String,
    pub data_nascimento: NaiveDate,
    pub telefone: String,
    pub escolaridade: Escolaridade,
    #[serde(default)]
    pub curso: Option<String>,
    #[serde(default)]
    pub instituicao_ensino: Option<String>,
    #[serde(default)]
    pub descricao: Option<String>,
    pub endereco: EnderecoInput,
    #[serde(default)]
    pub deficiencia_ids: Vec<i32>,
}

impl RegisterCandidatoRequest {
    pub fn validate(&self, today: NaiveDate) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        errors.email("email", &self.email);
        errors.password("password", &self.password, &self.password_confirmation);
        if errors.required("nome", &self.nome) {
            errors.max_len("nome", &self.nome, 255);
        }
        errors.cpf("cpf", &self.cpf);
        errors.check(
            age_on(self.data_nascimento, today) >= MIN_AGE,
            "data_nascimento",
            "O candidato deve ter pelo menos 18 anos.",
        );
        errors.telefone("telefone", &self.telefone);
        validate_formacao(
            &mut errors,
            self.escolaridade,
            self.curso.as_deref(),
            self.instituicao_ensino.as_deref(),
        );
        if let Some(descricao) = &self.descricao {
            errors.max_len("descricao", descricao, 2000);
        }
        errors.nested("endereco", self.endereco.validate());
        errors.finish()
    }
}

/// Higher-education levels must name the course and the school
pub fn validate_formacao(
    errors: &mut ValidationErrors,
    escolaridade: Escolaridade,
    curso: Option<&str>,
    instituicao_ensino: Option<&str>,
) {
    if escolaridade.exige_curso() {
        errors.required("curso", curso.unwrap_or_default());
        errors.required("instituicao_ensino", instituicao_ensino.unwrap_or_default());
    }
    if let Some(curso) = curso {
        errors.max_len("curso", curso, 255);
    }
    if let Some(instituicao) = instituicao_ensino {
        errors.max_len("instituicao_ensino", instituicao, 255);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInstituicaoRequest {
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    pub razao_social: String,
    pub nome_fantasia: String,
    pub cnpj: String,
    pub telefone: String,
    pub responsavel: String,
    pub tipo_instituicao: TipoInstituicao,
    #[serde(default)]
    pub niveis_ensino: Vec<NivelEnsino>,
    #[serde(default)]
    pub descricao: Option<String>,
    pub endereco: EnderecoInput,
}

impl RegisterInstituicaoRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        errors.email("email", &self.email);
        errors.password("password", &self.password, &self.password_confirmation);
        if errors.required("razao_social", &self.razao_social) {
            errors.max_len("razao_social", &self.razao_social, 255);
        }
        if errors.required("nome_fantasia", &self.nome_fantasia) {
            errors.max_len("nome_fantasia", &self.nome_fantasia, 255);
        }
        errors.cnpj("cnpj", &self.cnpj);
        errors.telefone("telefone", &self.telefone);
        if errors.required("responsavel", &self.responsavel) {
            errors.max_len("responsavel", &self.responsavel, 255);
        }
        errors.check(
            !self.niveis_ensino.is_empty(),
            "niveis_ensino",
            "Informe ao menos um nível de ensino.",
        );
        if let Some(descricao) = &self.descricao {
            errors.max_len("descricao", descricao, 2000);
        }
        errors.nested("endereco", self.endereco.validate());
        errors.finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub password: String,
    pub password_confirmation: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        errors.email("email", &self.email);
        errors.required("token", &self.token);
        errors.password("password", &self.password, &self.password_confirmation);
        errors.finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub password: String,
    pub password_confirmation: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();
        errors.required("current_password", &self.current_password);
        errors.password("password", &self.password, &self.password_confirmation);
        errors.finish()
    }
}

/// Who is logged in, in the shape the frontend keeps in its session store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub tipo: UserTipo,
    pub profile_id: Uuid,
    pub nome: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub token: IssuedToken,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordResponse {
    pub message: String,
    /// Only populated in dev, where no mail is sent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn candidato_payload() -> serde_json::Value {
        json!({
            "email": "ana@example.com",
            "password": "segredo123",
            "password_confirmation": "segredo123",
            "nome": "Ana Souza",
            "cpf": "529.982.247-25",
            "data_nascimento": "1995-04-10",
            "telefone": "(41) 99876-5432",
            "escolaridade": "SUPERIOR_INCOMPLETO",
            "curso": "Pedagogia",
            "instituicao_ensino": "UFPR",
            "endereco": {
                "cep": "80010-000",
                "logradouro": "Rua XV de Novembro",
                "numero": "100",
                "bairro": "Centro",
                "cidade": "Curitiba",
                "estado": "PR"
            },
            "deficiencia_ids": [1, 11]
        })
    }

    fn field_errors(result: Result<(), ApiError>) -> Vec<String> {
        match result {
            Err(ApiError::Validation(errors)) => errors.fields().map(str::to_string).collect(),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(()) => vec![],
        }
    }

    #[test]
    fn valid_candidato_registration() {
        let req: RegisterCandidatoRequest = serde_json::from_value(candidato_payload()).unwrap();
        assert!(req.validate(today()).is_ok());
        assert_eq!(req.deficiencia_ids, vec![1, 11]);
    }

    #[test]
    fn candidato_field_rules() {
        let mut payload = candidato_payload();
        payload["cpf"] = json!("111.111.111-11");
        payload["password_confirmation"] = json!("diferente1");
        payload["data_nascimento"] = json!("2010-01-01");
        payload["curso"] = json!(null);
        payload["endereco"]["estado"] = json!("XX");

        let req: RegisterCandidatoRequest = serde_json::from_value(payload).unwrap();
        assert_eq!(
            field_errors(req.validate(today())),
            vec![
                "cpf",
                "curso",
                "data_nascimento",
                "endereco.estado",
                "password"
            ]
        );
    }

    #[test]
    fn medio_does_not_require_course() {
        let mut payload = candidato_payload();
        payload["escolaridade"] = json!("MEDIO_COMPLETO");
        payload["curso"] = json!(null);
        payload["instituicao_ensino"] = json!(null);

        let req: RegisterCandidatoRequest = serde_json::from_value(payload).unwrap();
        assert!(req.validate(today()).is_ok());
    }

    #[test]
    fn instituicao_requires_valid_cnpj_and_levels() {
        let req: RegisterInstituicaoRequest = serde_json::from_value(json!({
            "email": "contato@escola.org",
            "password": "segredo123",
            "password_confirmation": "segredo123",
            "razao_social": "Escola Aprender LTDA",
            "nome_fantasia": "Escola Aprender",
            "cnpj": "11.222.333/0001-82",
            "telefone": "4133334444",
            "responsavel": "Carlos Lima",
            "tipo_instituicao": "PRIVADA",
            "niveis_ensino": [],
            "endereco": {
                "cep": "80010000",
                "logradouro": "Rua A",
                "numero": "1",
                "bairro": "Centro",
                "cidade": "Curitiba",
                "estado": "PR"
            }
        }))
        .unwrap();

        assert_eq!(field_errors(req.validate()), vec!["cnpj", "niveis_ensino"]);
    }

    #[test]
    fn user_tipo_round_trips_as_lowercase_text() {
        assert_eq!(serde_json::to_value(UserTipo::Instituicao).unwrap(), json!("instituicao"));
        assert_eq!("candidato".parse::<UserTipo>(), Ok(UserTipo::Candidato));
        assert!("admin".parse::<UserTipo>().is_err());
    }
}
