//! Postal addresses shared by candidates and institutions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::validation::{only_digits, ValidationErrors};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct Endereco {
    pub id: Uuid,
    pub cep: String,
    pub logradouro: String,
    pub numero: String,
    pub complemento: Option<String>,
    pub bairro: String,
    pub cidade: String,
    pub estado: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Address as submitted on registration and profile updates
#[derive(Debug, Clone, Deserialize)]
pub struct EnderecoInput {
    pub cep: String,
    pub logradouro: String,
    pub numero: String,
    #[serde(default)]
    pub complemento: Option<String>,
    pub bairro: String,
    pub cidade: String,
    pub estado: String,
}

impl EnderecoInput {
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.cep("cep", &self.cep);
        if errors.required("logradouro", &self.logradouro) {
            errors.max_len("logradouro", &self.logradouro, 255);
        }
        if errors.required("numero", &self.numero) {
            errors.max_len("numero", &self.numero, 20);
        }
        if let Some(complemento) = &self.complemento {
            errors.max_len("complemento", complemento, 255);
        }
        if errors.required("bairro", &self.bairro) {
            errors.max_len("bairro", &self.bairro, 120);
        }
        if errors.required("cidade", &self.cidade) {
            errors.max_len("cidade", &self.cidade, 120);
        }
        errors.uf("estado", &self.estado);
        errors
    }

    /// Trimmed copy with CEP reduced to digits and UF upper-cased
    pub fn normalized(&self) -> Self {
        Self {
            cep: only_digits(&self.cep),
            logradouro: self.logradouro.trim().to_string(),
            numero: self.numero.trim().to_string(),
            complemento: self
                .complemento
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            bairro: self.bairro.trim().to_string(),
            cidade: self.cidade.trim().to_string(),
            estado: self.estado.trim().to_uppercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> EnderecoInput {
        EnderecoInput {
            cep: "80010-000".to_string(),
            logradouro: " Rua XV de Novembro ".to_string(),
            numero: "100".to_string(),
            complemento: Some("  ".to_string()),
            bairro: "Centro".to_string(),
            cidade: "Curitiba".to_string(),
            estado: "pr".to_string(),
        }
    }

    #[test]
    fn valid_address_passes_and_normalizes() {
        let endereco = input();
        assert!(endereco.validate().is_empty());

        let normalized = endereco.normalized();
        assert_eq!(normalized.cep, "80010000");
        assert_eq!(normalized.estado, "PR");
        assert_eq!(normalized.logradouro, "Rua XV de Novembro");
        assert_eq!(normalized.complemento, None);
    }

    #[test]
    fn reports_each_bad_field() {
        let mut endereco = input();
        endereco.cep = "123".to_string();
        endereco.estado = "ZZ".to_string();
        endereco.bairro = String::new();

        let errors = endereco.validate();
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, vec!["bairro", "cep", "estado"]);
    }
}
