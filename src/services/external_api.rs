//! HTTP client for the public registries used by the signup forms.
//!
//! - ViaCEP for postal code lookups
//! - ReceitaWS for CNPJ lookups, with BrasilAPI as fallback
//!
//! Every provider answer is reduced to `Ok(Some(_))` (found), `Ok(None)`
//! (provider says it does not exist) or `Err(_)` (provider unusable).

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::domain::external::{
    BrasilApiResponse, CepInfo, CnpjInfo, ReceitaWsResponse, ViaCepResponse,
};
use crate::error::ApiError;

#[derive(Clone)]
pub struct ExternalApiClient {
    client: Client,
    viacep_url: String,
    receitaws_url: String,
    brasilapi_url: String,
}

/// Why a single provider call produced nothing usable
#[derive(Debug)]
enum ProviderError {
    NotFound,
    Unavailable(String),
}

impl ExternalApiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.external_api_timeout_seconds))
            .user_agent(concat!("proapoio-backend/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            viacep_url: settings.viacep_url.trim_end_matches('/').to_string(),
            receitaws_url: settings.receitaws_url.trim_end_matches('/').to_string(),
            brasilapi_url: settings.brasilapi_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET a JSON document; 404 maps to `NotFound`, any other failure to
    /// `Unavailable`.
    async fn get_json<R: DeserializeOwned>(
        &self,
        provider: &'static str,
        url: &str,
    ) -> Result<R, ProviderError> {
        debug!(provider, url = %url, "External lookup");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(provider, error = %e, "External lookup request failed");
            ProviderError::Unavailable(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }
        if !status.is_success() {
            warn!(provider, status = %status, "External lookup returned an error status");
            return Err(ProviderError::Unavailable(format!("status {}", status)));
        }

        response.json::<R>().await.map_err(|e| {
            warn!(provider, error = %e, "Failed to parse external lookup response");
            ProviderError::Unavailable(e.to_string())
        })
    }

    /// `cep` must already be 8 digits
    #[instrument(skip(self))]
    pub async fn lookup_cep(&self, cep: &str) -> Result<Option<CepInfo>, ApiError> {
        let url = format!("{}/ws/{}/json/", self.viacep_url, cep);
        match self.get_json::<ViaCepResponse>("viacep", &url).await {
            Ok(body) => Ok(body.into_info()),
            Err(ProviderError::NotFound) => Ok(None),
            // ViaCEP answers 400 for malformed input, which we never send
            Err(ProviderError::Unavailable(reason)) => Err(ApiError::bad_gateway(format!(
                "Serviço de CEP indisponível: {}",
                reason
            ))),
        }
    }

    async fn receitaws(&self, cnpj: &str) -> Result<CnpjInfo, ProviderError> {
        let url = format!("{}/v1/cnpj/{}", self.receitaws_url, cnpj);
        let body = self.get_json::<ReceitaWsResponse>("receitaws", &url).await?;
        if body.is_not_found() {
            return Err(ProviderError::NotFound);
        }
        if body.is_error() {
            return Err(ProviderError::Unavailable(
                body.message.unwrap_or_else(|| "status ERROR".to_string()),
            ));
        }
        Ok(body.into_info())
    }

    async fn brasilapi(&self, cnpj: &str) -> Result<CnpjInfo, ProviderError> {
        let url = format!("{}/api/cnpj/v1/{}", self.brasilapi_url, cnpj);
        let body = self.get_json::<BrasilApiResponse>("brasilapi", &url).await?;
        Ok(body.into_info())
    }

    /// ReceitaWS first, BrasilAPI on any miss or failure. `Ok(None)` only
    /// when every provider reported the CNPJ as unknown.
    #[instrument(skip(self))]
    pub async fn lookup_cnpj(&self, cnpj: &str) -> Result<Option<CnpjInfo>, ApiError> {
        let primary = match self.receitaws(cnpj).await {
            Ok(info) => return Ok(Some(info)),
            Err(e) => e,
        };
        debug!(error = ?primary, "ReceitaWS gave no result, trying BrasilAPI");

        let fallback = match self.brasilapi(cnpj).await {
            Ok(info) => return Ok(Some(info)),
            Err(e) => e,
        };

        match (primary, fallback) {
            (ProviderError::NotFound, ProviderError::NotFound) => Ok(None),
            (_, ProviderError::Unavailable(reason)) | (ProviderError::Unavailable(reason), _) => {
                Err(ApiError::bad_gateway(format!(
                    "Serviço de consulta de CNPJ indisponível: {}",
                    reason
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client_for(server: &MockServer) -> ExternalApiClient {
        let mut settings = Settings::for_tests();
        settings.viacep_url = server.base_url();
        settings.receitaws_url = server.base_url();
        settings.brasilapi_url = server.base_url();
        ExternalApiClient::new(&settings).unwrap()
    }

    #[tokio::test]
    async fn cep_found() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/ws/01001000/json/");
            then.status(200).json_body(json!({
                "cep": "01001-000",
                "logradouro": "Praça da Sé",
                "bairro": "Sé",
                "localidade": "São Paulo",
                "uf": "SP"
            }));
        });

        let info = client_for(&server).lookup_cep("01001000").await.unwrap().unwrap();
        mock.assert();
        assert_eq!(info.cidade, "São Paulo");
    }

    #[tokio::test]
    async fn cep_erro_flag_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/ws/99999999/json/");
            then.status(200).json_body(json!({ "erro": "true" }));
        });

        assert_eq!(client_for(&server).lookup_cep("99999999").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cep_upstream_failure_is_bad_gateway() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/ws/01001000/json/");
            then.status(500);
        });

        let err = client_for(&server).lookup_cep("01001000").await.unwrap_err();
        assert!(matches!(err, ApiError::BadGateway(_)));
    }

    #[tokio::test]
    async fn cnpj_falls_back_to_brasilapi() {
        let server = MockServer::start();
        let receita = server.mock(|when, then| {
            when.method(GET).path("/v1/cnpj/11222333000181");
            then.status(429);
        });
        let brasil = server.mock(|when, then| {
            when.method(GET).path("/api/cnpj/v1/11222333000181");
            then.status(200).json_body(json!({
                "cnpj": "11222333000181",
                "razao_social": "ESCOLA APRENDER LTDA",
                "uf": "PR"
            }));
        });

        let info = client_for(&server)
            .lookup_cnpj("11222333000181")
            .await
            .unwrap()
            .unwrap();
        receita.assert();
        brasil.assert();
        assert_eq!(info.razao_social, "ESCOLA APRENDER LTDA");
        assert_eq!(info.fonte, crate::domain::external::CnpjFonte::BrasilApi);
    }

    #[tokio::test]
    async fn cnpj_primary_hit_skips_fallback() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/cnpj/11222333000181");
            then.status(200).json_body(json!({
                "status": "OK",
                "cnpj": "11.222.333/0001-81",
                "nome": "ESCOLA APRENDER LTDA"
            }));
        });
        let brasil = server.mock(|when, then| {
            when.method(GET).path("/api/cnpj/v1/11222333000181");
            then.status(200).json_body(json!({}));
        });

        let info = client_for(&server)
            .lookup_cnpj("11222333000181")
            .await
            .unwrap()
            .unwrap();
        brasil.assert_hits(0);
        assert_eq!(info.cnpj, "11222333000181");
    }

    #[tokio::test]
    async fn cnpj_unknown_everywhere_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/cnpj/11222333000181");
            then.status(200)
                .json_body(json!({ "status": "ERROR", "message": "CNPJ não encontrado" }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/cnpj/v1/11222333000181");
            then.status(404).json_body(json!({ "type": "not_found" }));
        });

        assert_eq!(
            client_for(&server).lookup_cnpj("11222333000181").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn cnpj_mixed_failure_is_bad_gateway() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/cnpj/11222333000181");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/cnpj/v1/11222333000181");
            then.status(503);
        });

        let err = client_for(&server)
            .lookup_cnpj("11222333000181")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadGateway(_)));
    }
}
