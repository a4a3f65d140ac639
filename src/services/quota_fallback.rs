// src/services/quota_fallback.rs

//! Resposta quando a primeira chamada à LLM falha. Único caso atendido sem o
//! modelo: 429 numa pergunta genérica sobre a agenda de hoje.

use crate::common::error::LlmError;
use crate::models::chat::ChatReply;
use crate::services::formatting::{numbered_list, EntryDetail};
use crate::services::intents;
use crate::services::interceptors::TurnContext;
use crate::services::phrases::today_listing_title;

pub const GENERIC_FAILURE: &str = "Ops! Tive um problema ao responder agora.";
pub const RATE_LIMITED: &str = "Estou recebendo muitas solicitações do meu motor de IA neste momento e não consegui concluir essa ação agora. Tente novamente em alguns instantes.";
pub const TODAY_LOOKUP_ERROR: &str =
    "Não consegui listar os agendamentos de hoje para responder sua pergunta agora. Tente novamente em alguns instantes.";

pub async fn reply_for_llm_failure(turn: &TurnContext<'_>, error: &LlmError) -> ChatReply {
    tracing::warn!(event = "openai_error", status = ?error.status_code(), error = %error);

    if !error.is_rate_limited() {
        return ChatReply::fallback(GENERIC_FAILURE);
    }
    if !intents::is_generic_today_question(turn.message) {
        return ChatReply::fallback(RATE_LIMITED);
    }

    let items = match turn.bookings_on(turn.today(), Vec::new()).await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(event = "quota_fallback_error", error = %e);
            return ChatReply::fallback(TODAY_LOOKUP_ERROR);
        }
    };

    let today = turn.today_label();
    if items.is_empty() {
        return ChatReply::direct(format!("Hoje ({today}) não há agendamentos no seu espaço."));
    }

    let plural = if items.len() == 1 { "" } else { "s" };
    ChatReply::direct(format!(
        "📅 {}\n\nEncontrei {} agendamento{plural} hoje. Veja os detalhes abaixo:\n\n{}",
        today_listing_title(&today),
        items.len(),
        numbered_list(&items, &today, EntryDetail { status: true, participants: true }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agenda::TenantScope;
    use crate::models::chat::ReplySource;
    use crate::test_support::{booking, MemoryStore};
    use chrono::{TimeZone, Utc};

    async fn run(store: &MemoryStore, message: &str, error: LlmError) -> ChatReply {
        let scope = TenantScope::new("1001", None);
        let turn = TurnContext {
            store,
            scope: &scope,
            message,
            history: &[],
            usuario_nome: None,
            now: Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap(),
        };
        reply_for_llm_failure(&turn, &error).await
    }

    fn store() -> MemoryStore {
        MemoryStore::default()
            .with_booking(booking("1001", (2025, 3, 10, 22, 0), (2025, 3, 10, 23, 0), "Maria", "Quadra 02"))
            .with_booking(booking("1001", (2025, 3, 10, 12, 0), (2025, 3, 10, 13, 0), "João", "Quadra 01"))
            .with_booking(booking("2002", (2025, 3, 10, 12, 0), (2025, 3, 10, 13, 0), "Outro", "Quadra 01"))
    }

    #[tokio::test]
    async fn rate_limited_today_question_lists_from_store() {
        let reply = run(&store(), "quais os agendamentos de hoje?", LlmError::RateLimited).await;
        assert_eq!(reply.source, ReplySource::ToolsDirect);
        assert!(reply.reply.starts_with("📅 Agendamentos para o dia 10/03/2025\n\nEncontrei 2 agendamentos hoje."));
        assert!(reply.reply.contains("1. Futsal – Quadra 01\n   - **Cliente:** João\n"));
        assert!(reply.reply.contains("   - **Status:** Agendado\n"));
        assert!(!reply.reply.contains("Outro"));
    }

    #[tokio::test]
    async fn rate_limited_with_empty_day_or_store_error() {
        let reply = run(&MemoryStore::default(), "agendamentos de hoje", LlmError::RateLimited).await;
        assert_eq!(reply.reply, "Hoje (10/03/2025) não há agendamentos no seu espaço.");

        let reply = run(&store().failing_reads(), "agendamentos de hoje", LlmError::RateLimited).await;
        assert_eq!(reply.reply, TODAY_LOOKUP_ERROR);
        assert_eq!(reply.source, ReplySource::Fallback);
    }

    #[tokio::test]
    async fn other_failures_get_fixed_apology() {
        let reply = run(&store(), "cria um agendamento amanhã", LlmError::RateLimited).await;
        assert_eq!(reply.reply, RATE_LIMITED);

        let reply = run(&store(), "quais os agendamentos de hoje?", LlmError::Status(500)).await;
        assert_eq!(reply.reply, GENERIC_FAILURE);
        assert_eq!(reply.source, ReplySource::Fallback);
    }
}
