//! End-to-end flows against a real Postgres
//!
//! `sqlx::test` creates a fresh database per test from `DATABASE_URL` and
//! applies `./migrations` to it.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceExt;

use crate::app::{create_app, AppState};
use crate::config::Settings;
use crate::services::{Cache, ExternalApiClient};

const SENHA: &str = "senha-segura-123";

fn state(db: PgPool) -> Arc<AppState> {
    let settings = Settings::for_tests();
    let external = ExternalApiClient::new(&settings).unwrap();
    AppState::new(db, settings, Cache::in_memory(60), external)
}

async fn call(
    state: &Arc<AppState>,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = create_app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn endereco() -> Value {
    json!({
        "cep": "80010-000",
        "logradouro": "Rua XV de Novembro",
        "numero": "100",
        "bairro": "Centro",
        "cidade": "Curitiba",
        "estado": "PR"
    })
}

fn candidato_payload(email: &str, cpf: &str) -> Value {
    json!({
        "email": email,
        "password": SENHA,
        "password_confirmation": SENHA,
        "nome": "Ana Souza",
        "cpf": cpf,
        "data_nascimento": "1995-04-10",
        "telefone": "41998765432",
        "escolaridade": "MEDIO_COMPLETO",
        "endereco": endereco()
    })
}

fn instituicao_payload(email: &str, cnpj: &str) -> Value {
    json!({
        "email": email,
        "password": SENHA,
        "password_confirmation": SENHA,
        "razao_social": "Escola Aprender LTDA",
        "nome_fantasia": "Escola Aprender",
        "cnpj": cnpj,
        "telefone": "4133334444",
        "responsavel": "Carla Lima",
        "tipo_instituicao": "PRIVADA",
        "niveis_ensino": ["FUNDAMENTAL_I"],
        "endereco": endereco()
    })
}

/// Registered account: bearer token and profile id
struct Conta {
    token: String,
    profile_id: String,
}

async fn registrar(state: &Arc<AppState>, uri: &str, payload: Value) -> Conta {
    let (status, body) = call(state, Method::POST, uri, None, Some(payload)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    Conta {
        token: body["token"].as_str().unwrap().to_string(),
        profile_id: body["user"]["profile_id"].as_str().unwrap().to_string(),
    }
}

async fn candidato(state: &Arc<AppState>) -> Conta {
    registrar(
        state,
        "/api/auth/register/candidato",
        candidato_payload("ana@example.com", "529.982.247-25"),
    )
    .await
}

async fn instituicao(state: &Arc<AppState>) -> Conta {
    registrar(
        state,
        "/api/auth/register/instituicao",
        instituicao_payload("contato@aprender.edu.br", "11.222.333/0001-81"),
    )
    .await
}

async fn criar_vaga(state: &Arc<AppState>, token: &str) -> String {
    let (status, body) = call(
        state,
        Method::POST,
        "/api/vagas",
        Some(token),
        Some(json!({
            "titulo": "Profissional de apoio escolar",
            "descricao": "Acompanhamento de aluno com TEA no ensino fundamental.",
            "cidade": "Curitiba",
            "estado": "PR",
            "modalidade": "PRESENCIAL",
            "regime": "CLT",
            "carga_horaria": 30,
            "nivel_ensino": "FUNDAMENTAL_I"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn candidatar(state: &Arc<AppState>, token: &str, vaga_id: &str) -> (StatusCode, Value) {
    call(
        state,
        Method::POST,
        "/api/propostas",
        Some(token),
        Some(json!({ "vaga_id": vaga_id, "mensagem": "Tenho experiência com TEA." })),
    )
    .await
}

#[sqlx::test(migrations = "./migrations")]
async fn registered_email_and_documents_are_unique(db: PgPool) {
    let state = state(db);
    candidato(&state).await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/auth/register/instituicao",
        None,
        Some(instituicao_payload("ANA@example.com", "11222333000181")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["email"].is_array());

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/auth/register/candidato",
        None,
        Some(candidato_payload("outra@example.com", "52998224725")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["cpf"].is_array());
    assert!(body["errors"]["email"].is_null());
}

#[sqlx::test(migrations = "./migrations")]
async fn same_candidate_and_job_pair_only_once(db: PgPool) {
    let state = state(db);
    let escola = instituicao(&state).await;
    let ana = candidato(&state).await;
    let vaga_id = criar_vaga(&state, &escola.token).await;

    let (status, _) = candidatar(&state, &ana.token, &vaga_id).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = candidatar(&state, &ana.token, &vaga_id).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["vaga_id"].is_array());

    // An invite from the institution is the same pair
    let (status, body) = call(
        &state,
        Method::POST,
        "/api/propostas",
        Some(escola.token.as_str()),
        Some(json!({ "vaga_id": vaga_id, "candidato_id": ana.profile_id })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["vaga_id"].is_array());
}

#[sqlx::test(migrations = "./migrations")]
async fn accepting_releases_both_contacts(db: PgPool) {
    let state = state(db);
    let escola = instituicao(&state).await;
    let ana = candidato(&state).await;
    let vaga_id = criar_vaga(&state, &escola.token).await;

    let (_, body) = candidatar(&state, &ana.token, &vaga_id).await;
    let proposta_id = body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/propostas/{}", proposta_id);

    let (_, body) = call(&state, Method::GET, &uri, Some(escola.token.as_str()), None).await;
    assert_eq!(body["data"]["candidato"]["contato"]["liberado"], false);
    assert_ne!(body["data"]["candidato"]["contato"]["email"], "ana@example.com");

    let (status, body) = call(
        &state,
        Method::PATCH,
        &format!("{}/aceitar", uri),
        Some(escola.token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "ACEITA");

    let (_, body) = call(&state, Method::GET, &uri, Some(escola.token.as_str()), None).await;
    assert_eq!(body["data"]["candidato"]["contato"]["liberado"], true);
    assert_eq!(body["data"]["candidato"]["contato"]["email"], "ana@example.com");
    assert_eq!(body["data"]["candidato"]["contato"]["cpf"], "52998224725");

    let (_, body) = call(&state, Method::GET, &uri, Some(ana.token.as_str()), None).await;
    assert_eq!(
        body["data"]["instituicao"]["contato"]["email"],
        "contato@aprender.edu.br"
    );

    let (_, body) = call(
        &state,
        Method::GET,
        &format!("/api/candidatos/{}", ana.profile_id),
        Some(escola.token.as_str()),
        None,
    )
    .await;
    assert_eq!(body["data"]["contato"]["liberado"], true);
}

#[sqlx::test(migrations = "./migrations")]
async fn pending_proposal_on_closed_job_can_only_be_rejected(db: PgPool) {
    let state = state(db);
    let escola = instituicao(&state).await;
    let ana = candidato(&state).await;
    let vaga_id = criar_vaga(&state, &escola.token).await;

    let (_, body) = candidatar(&state, &ana.token, &vaga_id).await;
    let proposta_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &state,
        Method::PATCH,
        &format!("/api/vagas/{}/status", vaga_id),
        Some(escola.token.as_str()),
        Some(json!({ "status": "FECHADA" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(
        &state,
        Method::GET,
        "/api/notificacoes?tipo=VAGA_FECHADA",
        Some(ana.token.as_str()),
        None,
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = call(
        &state,
        Method::PATCH,
        &format!("/api/propostas/{}/aceitar", proposta_id),
        Some(escola.token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["status"].is_array());

    let (status, body) = call(
        &state,
        Method::PATCH,
        &format!("/api/propostas/{}/recusar", proposta_id),
        Some(escola.token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "RECUSADA");
}

#[sqlx::test(migrations = "./migrations")]
async fn deleting_an_account_ends_every_session(db: PgPool) {
    let state = state(db);
    let escola = instituicao(&state).await;
    let ana = candidato(&state).await;
    let vaga_id = criar_vaga(&state, &escola.token).await;
    candidatar(&state, &ana.token, &vaga_id).await;

    let (status, body) = call(
        &state,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "ana@example.com", "password": SENHA })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let outra_sessao = body["token"].as_str().unwrap().to_string();

    let (status, _) = call(
        &state,
        Method::DELETE,
        "/api/candidatos/me",
        Some(ana.token.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    for token in [&ana.token, &outra_sessao] {
        let (status, _) = call(
            &state,
            Method::GET,
            "/api/notificacoes",
            Some(token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // The institution hears that the pending proposal is gone
    let (_, body) = call(
        &state,
        Method::GET,
        "/api/notificacoes?tipo=PROPOSTA_CANCELADA",
        Some(escola.token.as_str()),
        None,
    )
    .await;
    let avisos = body["data"].as_array().unwrap();
    assert_eq!(avisos.len(), 1);
    assert_eq!(avisos[0]["dados"]["vaga_id"], vaga_id.as_str());
}

#[sqlx::test(migrations = "./migrations")]
async fn blank_optional_field_clears_it(db: PgPool) {
    let state = state(db);
    let ana = candidato(&state).await;

    let (status, body) = call(
        &state,
        Method::PUT,
        "/api/candidatos/me",
        Some(ana.token.as_str()),
        Some(json!({ "curso": "Magistério", "descricao": "Acompanhante terapêutica." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["curso"], "Magistério");

    let (status, body) = call(
        &state,
        Method::PUT,
        "/api/candidatos/me",
        Some(ana.token.as_str()),
        Some(json!({ "curso": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["curso"].is_null());
    assert_eq!(body["data"]["descricao"], "Acompanhante terapêutica.");
}
