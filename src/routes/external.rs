//! Public lookups against Brazilian address and company registries
//!
//! Successful answers are cached; misses and provider failures are not.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use std::time::Duration;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::domain::external::{CepInfo, CnpjInfo};
use crate::error::ApiError;
use crate::services::cache::keys;
use crate::validation::{is_valid_cep, is_valid_cnpj, only_digits};

fn external_ttl(state: &AppState) -> Duration {
    Duration::from_secs(state.settings.external_cache_ttl_seconds)
}

/// GET /api/external/viacep/:cep
pub async fn viacep(
    State(state): State<Arc<AppState>>,
    Path(cep): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_valid_cep(&cep) {
        return Err(ApiError::field("cep", "Informe um CEP válido com 8 dígitos."));
    }
    let cep = only_digits(&cep);
    let key = keys::viacep(&cep);

    if let Some(info) = state.cache.get::<CepInfo>(&key).await {
        return Ok(DataResponse::new(info));
    }

    let info = state
        .external
        .lookup_cep(&cep)
        .await?
        .ok_or_else(|| ApiError::not_found("CEP não encontrado."))?;

    state.cache.set_with_ttl(&key, &info, external_ttl(&state)).await;
    Ok(DataResponse::new(info))
}

/// GET /api/external/receitaws/:cnpj
pub async fn receitaws(
    State(state): State<Arc<AppState>>,
    Path(cnpj): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !is_valid_cnpj(&cnpj) {
        return Err(ApiError::field("cnpj", "Informe um CNPJ válido."));
    }
    let cnpj = only_digits(&cnpj);
    let key = keys::cnpj(&cnpj);

    if let Some(info) = state.cache.get::<CnpjInfo>(&key).await {
        return Ok(DataResponse::new(info));
    }

    let info = state
        .external
        .lookup_cnpj(&cnpj)
        .await?
        .ok_or_else(|| ApiError::not_found("CNPJ não encontrado."))?;

    state.cache.set_with_ttl(&key, &info, external_ttl(&state)).await;
    Ok(DataResponse::new(info))
}
