//! Address (CEP) and company (CNPJ) registry lookups
//!
//! Provider payloads are deserialized into the `*Response` types and
//! normalized into `CepInfo` / `CnpjInfo`, the only shapes the API exposes.

use serde::{Deserialize, Deserializer, Serialize};

use crate::validation::only_digits;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CepInfo {
    pub cep: String,
    pub logradouro: String,
    pub complemento: Option<String>,
    pub bairro: String,
    pub cidade: String,
    pub estado: String,
    pub ibge: Option<String>,
}

/// ViaCEP body; a missing CEP comes back as 200 `{"erro": true}`
/// (or `"true"` on newer deployments)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ViaCepResponse {
    #[serde(default, deserialize_with = "flag")]
    pub erro: bool,
    #[serde(default)]
    pub cep: String,
    #[serde(default)]
    pub logradouro: String,
    #[serde(default)]
    pub complemento: String,
    #[serde(default)]
    pub bairro: String,
    #[serde(default)]
    pub localidade: String,
    #[serde(default)]
    pub uf: String,
    #[serde(default)]
    pub ibge: String,
}

impl ViaCepResponse {
    /// `None` when ViaCEP reports the CEP as unknown
    pub fn into_info(self) -> Option<CepInfo> {
        if self.erro {
            return None;
        }
        Some(CepInfo {
            cep: only_digits(&self.cep),
            logradouro: self.logradouro,
            complemento: non_empty(self.complemento),
            bairro: self.bairro,
            cidade: self.localidade,
            estado: self.uf,
            ibge: non_empty(self.ibge),
        })
    }
}

text_enum! {
    CnpjFonte {
        ReceitaWs => "receitaws",
        BrasilApi => "brasilapi",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CnpjInfo {
    pub cnpj: String,
    pub razao_social: String,
    pub nome_fantasia: Option<String>,
    pub situacao: Option<String>,
    pub logradouro: Option<String>,
    pub numero: Option<String>,
    pub complemento: Option<String>,
    pub bairro: Option<String>,
    pub cidade: Option<String>,
    pub estado: Option<String>,
    pub cep: Option<String>,
    pub telefone: Option<String>,
    pub email: Option<String>,
    pub fonte: CnpjFonte,
}

/// ReceitaWS body; failures are 200 with `status: "ERROR"`
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ReceitaWsResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub cnpj: String,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub fantasia: String,
    #[serde(default)]
    pub situacao: String,
    #[serde(default)]
    pub logradouro: String,
    #[serde(default)]
    pub numero: String,
    #[serde(default)]
    pub complemento: String,
    #[serde(default)]
    pub bairro: String,
    #[serde(default)]
    pub municipio: String,
    #[serde(default)]
    pub uf: String,
    #[serde(default)]
    pub cep: String,
    #[serde(default)]
    pub telefone: String,
    #[serde(default)]
    pub email: String,
}

impl ReceitaWsResponse {
    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("ERROR")
    }

    /// ReceitaWS reports rate limits and bad input with the same status, so
    /// only an explicit "not found" style message counts as a miss
    pub fn is_not_found(&self) -> bool {
        self.is_error()
            && self
                .message
                .as_deref()
                .map(|m| {
                    let m = m.to_lowercase();
                    m.contains("não encontrado") || m.contains("nao encontrado") || m.contains("inválido")
                })
                .unwrap_or(false)
    }

    pub fn into_info(self) -> CnpjInfo {
        CnpjInfo {
            cnpj: only_digits(&self.cnpj),
            razao_social: self.nome,
            nome_fantasia: non_empty(self.fantasia),
            situacao: non_empty(self.situacao),
            logradouro: non_empty(self.logradouro),
            numero: non_empty(self.numero),
            complemento: non_empty(self.complemento),
            bairro: non_empty(self.bairro),
            cidade: non_empty(self.municipio),
            estado: non_empty(self.uf),
            cep: non_empty(only_digits(&self.cep)),
            telefone: non_empty(self.telefone),
            email: non_empty(self.email),
            fonte: CnpjFonte::ReceitaWs,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BrasilApiResponse {
    #[serde(default)]
    pub cnpj: String,
    #[serde(default)]
    pub razao_social: String,
    #[serde(default)]
    pub nome_fantasia: Option<String>,
    #[serde(default)]
    pub descricao_situacao_cadastral: Option<String>,
    #[serde(default)]
    pub logradouro: Option<String>,
    #[serde(default)]
    pub numero: Option<String>,
    #[serde(default)]
    pub complemento: Option<String>,
    #[serde(default)]
    pub bairro: Option<String>,
    #[serde(default)]
    pub municipio: Option<String>,
    #[serde(default)]
    pub uf: Option<String>,
    #[serde(default)]
    pub cep: Option<String>,
    #[serde(default)]
    pub ddd_telefone_1: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl BrasilApiResponse {
    pub fn into_info(self) -> CnpjInfo {
        CnpjInfo {
            cnpj: only_digits(&self.cnpj),
            razao_social: self.razao_social,
            nome_fantasia: self.nome_fantasia.and_then(non_empty),
            situacao: self.descricao_situacao_cadastral.and_then(non_empty),
            logradouro: self.logradouro.and_then(non_empty),
            numero: self.numero.and_then(non_empty),
            complemento: self.complemento.and_then(non_empty),
            bairro: self.bairro.and_then(non_empty),
            cidade: self.municipio.and_then(non_empty),
            estado: self.uf.and_then(non_empty),
            cep: self.cep.map(|c| only_digits(&c)).and_then(non_empty),
            telefone: self.ddd_telefone_1.and_then(non_empty),
            email: self.email.and_then(non_empty),
            fonte: CnpjFonte::BrasilApi,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Accepts `true`, `"true"` and friends
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Text(s)) => s.eq_ignore_ascii_case("true"),
        None => false,
    })
}
