// src/services/chat_service.rs

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;

use crate::common::text::preview;
use crate::db::AgendaStore;
use crate::models::agenda::TenantScope;
use crate::models::chat::{ChatReply, ChatRequest};
use crate::services::completion::{CompletionDriver, CompletionSettings};
use crate::services::interceptors::{self, Interceptor, TurnContext};
use crate::services::llm_client::ChatCompletionClient;
use crate::services::prompt::build_system_prompt;

pub const NOT_CONFIGURED: &str = "(backend não configurado)";
pub const UNEXPECTED_ERROR: &str = "Erro inesperado no servidor.";

/// Orquestra um turno: atalhos determinísticos, depois as rodadas com a LLM.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn AgendaStore>,
    llm: Option<Arc<dyn ChatCompletionClient>>,
    settings: Arc<CompletionSettings>,
    interceptors: Arc<Vec<Box<dyn Interceptor>>>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn AgendaStore>,
        llm: Option<Arc<dyn ChatCompletionClient>>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            store,
            llm,
            settings: Arc::new(settings),
            interceptors: Arc::new(interceptors::default_chain()),
        }
    }

    /// Sem chave da LLM o endpoint responde só "(backend não configurado)".
    pub fn is_configured(&self) -> bool {
        self.llm.is_some()
    }

    pub fn not_configured_reply() -> ChatReply {
        ChatReply::fallback(NOT_CONFIGURED)
    }

    pub fn unexpected_error_reply() -> ChatReply {
        ChatReply::fallback(UNEXPECTED_ERROR)
    }

    /// Nunca falha nem propaga panic: todo caminho termina num `ChatReply`.
    pub async fn reply(&self, request: ChatRequest, authorization: Option<String>, now: DateTime<Utc>) -> ChatReply {
        match AssertUnwindSafe(self.orchestrate(&request, authorization, now))
            .catch_unwind()
            .await
        {
            Ok(reply) => reply,
            Err(_) => {
                tracing::error!(event = "unexpected_error", "panic durante a orquestração do turno");
                Self::unexpected_error_reply()
            }
        }
    }

    async fn orchestrate(&self, request: &ChatRequest, authorization: Option<String>, now: DateTime<Utc>) -> ChatReply {
        tracing::info!(
            event = "user_message",
            message = %preview(&request.message, 200),
            history_count = request.history.len(),
        );

        let scope = TenantScope::new(request.empresa_codigo.clone(), authorization);
        let turn = TurnContext {
            store: self.store.as_ref(),
            scope: &scope,
            message: &request.message,
            history: &request.history,
            usuario_nome: request.usuario_nome.as_deref(),
            now,
        };

        if let Some(reply) = interceptors::run_chain(&self.interceptors, &turn).await {
            return reply;
        }

        let Some(llm) = self.llm.as_deref() else {
            return Self::not_configured_reply();
        };

        let default_period = match (request.data_inicio.as_deref(), request.data_fim.as_deref()) {
            (Some(inicio), Some(fim)) => Some((inicio, fim)),
            _ => None,
        };
        let prompt = build_system_prompt(request, now);
        CompletionDriver::new(llm, &self.settings, &turn, prompt, default_period)
            .run()
            .await
    }
}
