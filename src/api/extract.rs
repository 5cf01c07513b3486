//! Body and query extractors whose rejections use the API error format

use axum::extract::{
    rejection::{JsonRejection, QueryRejection},
    FromRequest, FromRequestParts,
};

use crate::error::ApiError;

/// `Json<T>` that rejects with `ApiError` (422 for shape errors)
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// `Query<T>` that rejects with `ApiError`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => ApiError::Unprocessable(e.body_text()),
            JsonRejection::JsonSyntaxError(_) => {
                ApiError::bad_request("O corpo da requisição não é um JSON válido.")
            }
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::bad_request("Envie o corpo com Content-Type: application/json.")
            }
            other => ApiError::bad_request(other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Unprocessable(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::IntoResponse,
        routing::post,
        Router,
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Payload {
        #[allow(dead_code)]
        nome: String,
    }

    async fn handler(AppJson(_): AppJson<Payload>) -> impl IntoResponse {
        StatusCode::NO_CONTENT
    }

    async fn send(body: &str, content_type: &str) -> StatusCode {
        let app = Router::new().route("/", post(handler));
        app.oneshot(
            Request::post("/")
                .header("content-type", content_type)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
    }

    #[tokio::test]
    async fn maps_rejections() {
        assert_eq!(send(r#"{"nome":"Ana"}"#, "application/json").await, StatusCode::NO_CONTENT);
        assert_eq!(send(r#"{"outro":1}"#, "application/json").await, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(send("{nome", "application/json").await, StatusCode::BAD_REQUEST);
        assert_eq!(send(r#"{"nome":"Ana"}"#, "text/plain").await, StatusCode::BAD_REQUEST);
    }
}
