pub mod auth;
pub mod candidatos;
pub mod dashboard;
pub mod deficiencias;
pub mod enderecos;
pub mod experiencias;
pub mod external;
pub mod health;
pub mod instituicoes;
pub mod notificacoes;
pub mod propostas;
pub mod vagas;
pub mod vagas_salvas;

#[cfg(test)]
mod db_tests;
#[cfg(test)]
mod tests;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart},
    http::StatusCode,
    routing::{delete, get, patch, post, put},
    Router,
};
use chrono::NaiveDate;
use std::sync::Arc;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::storage::{ImageKind, Storage};

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .route("/api/deficiencias", get(deficiencias::list_deficiencias))
        .route("/api/external/viacep/:cep", get(external::viacep))
        .route("/api/external/receitaws/:cnpj", get(external::receitaws))
        // Auth
        .route("/api/auth/register/candidato", post(auth::register_candidato))
        .route(
            "/api/auth/register/instituicao",
            post(auth::register_instituicao),
        )
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/auth/password", put(auth::change_password))
        // Candidates
        .route("/api/candidatos", get(candidatos::search_candidatos))
        .route(
            "/api/candidatos/me",
            get(candidatos::get_me)
                .put(candidatos::update_me)
                .delete(candidatos::delete_me),
        )
        .route("/api/candidatos/me/foto", post(candidatos::upload_foto))
        .route("/api/candidatos/me/vagas-salvas", get(vagas_salvas::list))
        .route(
            "/api/candidatos/me/experiencias-profissionais",
            get(experiencias::list_profissionais).post(experiencias::create_profissional),
        )
        .route(
            "/api/candidatos/me/experiencias-profissionais/:id",
            put(experiencias::update_profissional).delete(experiencias::delete_profissional),
        )
        .route(
            "/api/candidatos/me/experiencias-pessoais",
            get(experiencias::list_pessoais).post(experiencias::create_pessoal),
        )
        .route(
            "/api/candidatos/me/experiencias-pessoais/:id",
            put(experiencias::update_pessoal).delete(experiencias::delete_pessoal),
        )
        .route("/api/candidatos/:id", get(candidatos::get_candidato))
        // Institutions
        .route(
            "/api/instituicoes/me",
            get(instituicoes::get_me)
                .put(instituicoes::update_me)
                .delete(instituicoes::delete_me),
        )
        .route("/api/instituicoes/me/logo", post(instituicoes::upload_logo))
        .route("/api/instituicoes/me/vagas", get(instituicoes::minhas_vagas))
        .route("/api/instituicoes/:id", get(instituicoes::get_instituicao))
        // Jobs
        .route(
            "/api/vagas",
            get(vagas::list_vagas).post(vagas::create_vaga),
        )
        .route(
            "/api/vagas/:id",
            get(vagas::get_vaga)
                .put(vagas::update_vaga)
                .delete(vagas::delete_vaga),
        )
        .route("/api/vagas/:id/status", patch(vagas::update_status))
        .route(
            "/api/vagas/:id/salvar",
            post(vagas_salvas::salvar).delete(vagas_salvas::remover),
        )
        // Proposals
        .route(
            "/api/propostas",
            get(propostas::list_propostas).post(propostas::create_proposta),
        )
        .route(
            "/api/propostas/:id",
            get(propostas::get_proposta).delete(propostas::delete_proposta),
        )
        .route("/api/propostas/:id/aceitar", patch(propostas::aceitar))
        .route("/api/propostas/:id/recusar", patch(propostas::recusar))
        // Notifications
        .route("/api/notificacoes", get(notificacoes::list_notificacoes))
        .route(
            "/api/notificacoes/nao-lidas/contagem",
            get(notificacoes::contagem_nao_lidas),
        )
        .route("/api/notificacoes/lidas", patch(notificacoes::marcar_todas_lidas))
        .route(
            "/api/notificacoes/:id",
            get(notificacoes::get_notificacao).delete(notificacoes::delete_notificacao),
        )
        .route("/api/notificacoes/:id/lida", patch(notificacoes::marcar_lida))
        // Dashboard
        .route("/api/dashboard", get(dashboard::get_dashboard))
}

pub(crate) fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Trimmed value, `None` when absent or blank
pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `%term%` for ILIKE, with the term's own wildcards escaped
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Trimmed value for nullable text columns. `None` keeps the stored value and
/// a blank string clears it (`NULLIF($n, '')` in the update queries).
pub(crate) fn clearable(value: &Option<String>) -> Option<String> {
    value.as_deref().map(|v| v.trim().to_string())
}

/// Keep the status the body reader reports, so a body cut off by the size
/// limit is a 413 rather than a 400
fn multipart_error(err: MultipartError) -> ApiError {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(err.body_text()),
        _ => ApiError::bad_request(err.body_text()),
    }
}

/// Pull the image in `field` out of a multipart body and check it
pub(crate) async fn read_image(
    storage: &Storage,
    mut multipart: Multipart,
    field: &str,
) -> Result<(ImageKind, Bytes), ApiError> {
    while let Some(part) = multipart.next_field().await.map_err(multipart_error)? {
        if part.name() != Some(field) {
            continue;
        }
        let bytes = part.bytes().await.map_err(multipart_error)?;
        let kind = storage.check_image(field, &bytes)?;
        return Ok((kind, bytes));
    }

    Err(ApiError::field(field, "Envie um arquivo de imagem."))
}

#[cfg(test)]
mod helper_tests {
    use super::*;

    #[test]
    fn blank_strings_become_none() {
        assert_eq!(non_blank(&None), None);
        assert_eq!(non_blank(&Some("   ".to_string())), None);
        assert_eq!(non_blank(&Some(" Curitiba ".to_string())), Some("Curitiba".to_string()));
    }

    #[test]
    fn blank_clears_absent_keeps() {
        assert_eq!(clearable(&None), None);
        assert_eq!(clearable(&Some("  ".to_string())), Some(String::new()));
        assert_eq!(clearable(&Some(" Pedagogia ".to_string())), Some("Pedagogia".to_string()));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("apoio"), "%apoio%");
        assert_eq!(like_pattern(" 100%_ "), "%100\\%\\_%");
    }
}
