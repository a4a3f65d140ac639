// src/handlers/chat.rs

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use tracing::Instrument;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, text::preview},
    config::AppState,
    middleware::cors::{DURATION_HEADER, SOURCE_HEADER},
    models::chat::{ChatReply, ChatRequest},
    services::ChatService,
};

pub const CHAT_PROXY_PATH: &str = "/functions/v1/chat-proxy";

pub fn chat_routes() -> Router<AppState> {
    Router::new().route(
        CHAT_PROXY_PATH,
        post(chat_proxy).options(preflight).fallback(method_not_allowed),
    )
}

// Toda resposta do chat sai por aqui: headers da Ísis + log final.
fn respond(reply: ChatReply, started: Instant) -> Response {
    let duration_ms = started.elapsed().as_millis();
    tracing::info!(
        event = "response",
        source = reply.source.as_str(),
        duration_ms = duration_ms as u64,
        reply_preview = %preview(&reply.reply, 200),
    );

    (
        StatusCode::OK,
        [
            (SOURCE_HEADER, reply.source.as_str().to_string()),
            (DURATION_HEADER, duration_ms.to_string()),
        ],
        Json(reply),
    )
        .into_response()
}

// POST /functions/v1/chat-proxy
#[utoipa::path(
    post,
    path = "/functions/v1/chat-proxy",
    tag = "Ísis",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Resposta da Ísis (erros de dependência também voltam aqui)", body = ChatReply,
            headers(
                ("x-isis-source" = String, description = "Origem da resposta"),
                ("x-isis-duration-ms" = String, description = "Duração do turno em ms")
            )
        ),
        (status = 400, description = "Falta 'message' ou 'empresaCodigo'"),
        (status = 405, description = "Método não permitido")
    ),
    params(
        ("Authorization" = Option<String>, Header, description = "Repassado ao banco como identidade do chamador")
    )
)]
pub async fn chat_proxy(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let started = Instant::now();
    let request_id = Uuid::new_v4();

    async move {
        let chat = &app_state.chat_service;

        // A chave é checada antes de olhar o corpo.
        if !chat.is_configured() {
            return Ok(respond(ChatService::not_configured_reply(), started));
        }

        let request = match serde_json::from_slice::<ChatRequest>(&body) {
            Ok(request) => request.normalized(),
            Err(e) => {
                tracing::warn!(error = %e, "corpo da requisição não é um JSON válido");
                return Ok(respond(ChatService::unexpected_error_reply(), started));
            }
        };
        request.validate()?;

        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let reply = chat.reply(request, authorization, Utc::now()).await;
        Ok(respond(reply, started))
    }
    .instrument(tracing::info_span!("chat_proxy", %request_id))
    .await
}

// OPTIONS /functions/v1/chat-proxy
pub async fn preflight() -> &'static str {
    "ok"
}

pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{body::Body, http::Request, middleware::from_fn};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::middleware::cors::cors_headers;
    use crate::services::completion::CompletionSettings;
    use crate::services::ChatCompletionClient;
    use crate::test_support::{text, MemoryStore, ScriptedLlm};

    fn app(llm: Option<Arc<dyn ChatCompletionClient>>) -> Router {
        let state = AppState {
            chat_service: ChatService::new(Arc::new(MemoryStore::default()), llm, CompletionSettings::default()),
        };
        chat_routes().layer(from_fn(cors_headers)).with_state(state)
    }

    fn configured(replies: Vec<&str>) -> Router {
        let llm = ScriptedLlm::new(replies.into_iter().map(text).collect());
        app(Some(Arc::new(llm)))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(CHAT_PROXY_PATH)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn answers_with_isis_headers() {
        let response = configured(vec!["Olá! 👋"])
            .oneshot(post_json(r#"{"message":"oi","empresaCodigo":"1001"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SOURCE_HEADER], "openai");
        assert!(response.headers()[DURATION_HEADER].to_str().unwrap().parse::<u64>().is_ok());
        assert_eq!(response.headers()["access-control-allow-origin"], "*");

        let body = read_json(response).await;
        assert_eq!(body["reply"], "Olá! 👋");
        assert_eq!(body["replies"], json!(["Olá! 👋"]));
        assert_eq!(body["debug"]["strategy"], "primary");
    }

    #[tokio::test]
    async fn missing_fields_are_400() {
        let response = configured(vec![]).oneshot(post_json(r#"{"empresaCodigo":"1001"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await, json!({"error": "Missing 'message'"}));

        let response = configured(vec![]).oneshot(post_json(r#"{"message":"oi","empresaCodigo":"  "}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(read_json(response).await, json!({"error": "Missing 'empresaCodigo'"}));
    }

    #[tokio::test]
    async fn broken_json_gets_unexpected_error_reply() {
        let response = configured(vec![]).oneshot(post_json("{oi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[SOURCE_HEADER], "fallback");
        assert_eq!(read_json(response).await["reply"], "Erro inesperado no servidor.");
    }

    #[tokio::test]
    async fn missing_key_is_checked_before_body() {
        let response = app(None).oneshot(post_json("{oi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_json(response).await,
            json!({"reply": "(backend não configurado)", "source": "fallback", "debug": {"strategy": "reserve"}})
        );
    }

    #[tokio::test]
    async fn preflight_and_other_methods() {
        let request = Request::builder().method("OPTIONS").uri(CHAT_PROXY_PATH).body(Body::empty()).unwrap();
        let response = app(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-methods"], "POST, OPTIONS");
        assert_eq!(
            response.headers()["access-control-expose-headers"],
            "x-isis-source, x-isis-duration-ms"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");

        let request = Request::builder().method("GET").uri(CHAT_PROXY_PATH).body(Body::empty()).unwrap();
        let response = app(None).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(read_json(response).await, json!({"error": "Method not allowed"}));
    }
}
