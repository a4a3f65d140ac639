// src/services/interceptors.rs

//! Atalhos determinísticos avaliados antes da LLM, em ordem, primeiro que
//! resolver ganha. Cada um olha a mensagem atual e o que a Ísis escreveu no
//! turno anterior; se reconhecer o padrão responde direto, senão deixa passar.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::common::error::StoreError;
use crate::common::local_time::{clock_label, date_label, hour_label, local_day_range, local_to_utc, local_today, utc_to_local};
use crate::db::AgendaStore;
use crate::models::agenda::{BookingChanges, BookingField, BookingFilter, PeriodBound, TenantScope};
use crate::models::chat::{ChatReply, HistoryTurn};
use crate::services::formatting::{greeting, numbered_entry, numbered_list, BookingItem, EntryDetail};
use crate::services::intents;
use crate::services::phrases::CONFIRM_CHANGE_QUESTION;

/// Um turno de conversa visto pelos atalhos (e pelo fallback de cota).
pub struct TurnContext<'a> {
    pub store: &'a dyn AgendaStore,
    pub scope: &'a TenantScope,
    pub message: &'a str,
    pub history: &'a [HistoryTurn],
    pub usuario_nome: Option<&'a str>,
    pub now: DateTime<Utc>,
}

impl TurnContext<'_> {
    pub fn today(&self) -> NaiveDate {
        local_today(self.now)
    }

    pub fn today_label(&self) -> String {
        date_label(self.today())
    }

    pub fn last_assistant_text(&self) -> &str {
        intents::last_assistant_text(self.history)
    }

    /// Agendamentos de um dia local inteiro, ordenados por início.
    pub async fn bookings_on(&self, day: NaiveDate, representantes: Vec<String>) -> Result<Vec<BookingItem>, StoreError> {
        let (start, end) = local_day_range(day);
        let filter = BookingFilter {
            period: Some((PeriodBound::Instant(start), PeriodBound::Instant(end))),
            representantes,
            ..BookingFilter::default()
        };
        let page = self.store.list_bookings(self.scope, &filter).await?;
        Ok(page.rows.into_iter().map(BookingItem::from).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interception {
    Resolved(ChatReply),
    FallThrough,
}

#[async_trait]
pub trait Interceptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Checagem barata, sem I/O.
    fn matches(&self, turn: &TurnContext<'_>) -> bool;

    async fn resolve(&self, turn: &TurnContext<'_>) -> Interception;
}

pub fn default_chain() -> Vec<Box<dyn Interceptor>> {
    vec![
        Box::new(CancelConfirmation),
        Box::new(TimeChangeConfirmation),
        Box::new(ChangeTodayToFourteen),
    ]
}

pub async fn run_chain(chain: &[Box<dyn Interceptor>], turn: &TurnContext<'_>) -> Option<ChatReply> {
    for interceptor in chain {
        if !interceptor.matches(turn) {
            continue;
        }
        match interceptor.resolve(turn).await {
            Interception::Resolved(reply) => {
                tracing::info!(interceptor = interceptor.name(), source = reply.source.as_str(), "atalho resolveu o turno");
                return Some(reply);
            }
            Interception::FallThrough => {
                tracing::debug!(interceptor = interceptor.name(), "atalho deixou passar");
            }
        }
    }
    None
}

// =============================================================================
//  1. CONFIRMAÇÃO DE CANCELAMENTO
// =============================================================================

pub const CANCEL_LOOKUP_ERROR: &str = "Não consegui localizar os agendamentos que você pediu para cancelar agora. Tente novamente em alguns instantes ou especifique o cliente e horário.";
pub const CANCEL_NOT_FOUND: &str = "Não encontrei agendamentos correspondentes para cancelar nesse período. Verifique se a data e os nomes dos clientes estão corretos.";
pub const CANCEL_UPDATE_ERROR: &str = "Não consegui concluir o cancelamento desses agendamentos agora. Nenhuma alteração foi gravada. Tente novamente em alguns instantes.";

pub struct CancelConfirmation;

#[async_trait]
impl Interceptor for CancelConfirmation {
    fn name(&self) -> &'static str {
        "cancel_confirmation"
    }

    fn matches(&self, turn: &TurnContext<'_>) -> bool {
        intents::is_yes_confirmation(turn.message) && intents::mentions_cancellation(turn.last_assistant_text())
    }

    async fn resolve(&self, turn: &TurnContext<'_>) -> Interception {
        let proposal = turn.last_assistant_text();
        let day = intents::extract_date(proposal).unwrap_or_else(|| turn.today());
        let names = intents::extract_customer_names(proposal);

        let items = match turn.bookings_on(day, names.clone()).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(event = "direct_cancel_error", error = %e);
                return Interception::Resolved(ChatReply::fallback(CANCEL_LOOKUP_ERROR));
            }
        };
        if items.is_empty() {
            tracing::info!(event = "direct_cancel_not_found", clientes = ?names, dia = %day);
            return Interception::Resolved(ChatReply::direct(CANCEL_NOT_FOUND));
        }

        let ids: Vec<_> = items.iter().map(|item| item.row.agendamento_id).collect();
        match turn.store.cancel_bookings(turn.scope, &ids).await {
            Ok(0) => {
                tracing::warn!(event = "direct_cancel_update_error", ids = ?ids, "nenhuma linha alterada");
                Interception::Resolved(ChatReply::fallback(CANCEL_UPDATE_ERROR))
            }
            Ok(count) => {
                tracing::info!(event = "direct_cancel_ok", cancelados = count);
                Interception::Resolved(ChatReply::direct(format!(
                    "Tudo certo! Cancelei {count} agendamento(s) nesse período conforme sua confirmação. ✅"
                )))
            }
            Err(e) => {
                tracing::warn!(event = "direct_cancel_update_error", ids = ?ids, error = %e);
                Interception::Resolved(ChatReply::fallback(CANCEL_UPDATE_ERROR))
            }
        }
    }
}

// =============================================================================
//  2. CONFIRMAÇÃO DE NOVO HORÁRIO
// =============================================================================

pub const TIME_CHANGE_ERROR: &str =
    "Não consegui concluir a alteração do agendamento agora. Tente novamente em alguns instantes.";

pub struct TimeChangeConfirmation;

#[async_trait]
impl Interceptor for TimeChangeConfirmation {
    fn name(&self) -> &'static str {
        "time_change_confirmation"
    }

    fn matches(&self, turn: &TurnContext<'_>) -> bool {
        intents::is_yes_confirmation(turn.message) && intents::asks_change_confirmation(turn.last_assistant_text())
    }

    async fn resolve(&self, turn: &TurnContext<'_>) -> Interception {
        let Some((hour, minute)) = intents::extract_target_end(turn.last_assistant_text()) else {
            return Interception::FallThrough;
        };

        // Só aplica sem ambiguidade: exatamente um agendamento hoje.
        let items = match turn.bookings_on(turn.today(), Vec::new()).await {
            Ok(items) if items.len() == 1 => items,
            Ok(items) => {
                tracing::info!(event = "direct_update_skipped", agendamentos = items.len());
                return Interception::FallThrough;
            }
            Err(e) => {
                tracing::warn!(event = "direct_update_error", error = %e);
                return Interception::Resolved(ChatReply::fallback(TIME_CHANGE_ERROR));
            }
        };
        let item = &items[0];

        // Mesmo dia (local) do início, com o novo horário de término.
        let Some(local_end) = utc_to_local(item.row.inicio).date().and_hms_opt(hour, minute, 0) else {
            return Interception::FallThrough;
        };
        let new_end = local_to_utc(local_end);
        let changes = BookingChanges::default().set(BookingField::Fim, new_end.to_rfc3339());

        match turn.store.update_booking(turn.scope, item.row.agendamento_id, &changes).await {
            Ok(Some(_)) => {
                let novo = clock_label(hour, minute);
                tracing::info!(event = "direct_update_ok", agendamento_id = %item.row.agendamento_id, novo_fim = %novo);
                let reply = format!(
                    "✅ Alterei o agendamento de hoje para finalizar às {novo}.\n\n\
                     - **Cliente:** {}\n\
                     - **Quadra:** {}\n\
                     - **Horário anterior:** {}\n\
                     - **Novo horário:** {novo} (término)\n\n\
                     Se quiser, posso listar novamente os agendamentos de hoje para você conferir.",
                    item.row.representante_nome.as_deref().filter(|s| !s.is_empty()).unwrap_or("Cliente"),
                    item.row.quadra_nome.as_deref().filter(|s| !s.is_empty()).unwrap_or("(não informado)"),
                    item.time_range(),
                );
                Interception::Resolved(ChatReply::direct(reply))
            }
            Ok(None) => {
                tracing::warn!(event = "direct_update_error", agendamento_id = %item.row.agendamento_id, "nenhuma linha alterada");
                Interception::Resolved(ChatReply::fallback(TIME_CHANGE_ERROR))
            }
            Err(e) => {
                tracing::warn!(event = "direct_update_error", error = %e);
                Interception::Resolved(ChatReply::fallback(TIME_CHANGE_ERROR))
            }
        }
    }
}

// =============================================================================
//  3. "MUDAR O DE HOJE PARA 14H"
// =============================================================================

pub const FOURTEEN_LOOKUP_ERROR: &str = "Não consegui listar os agendamentos de hoje para ajudar na alteração.";
pub const NO_BOOKINGS_TODAY: &str =
    "Não encontrei agendamentos para hoje no seu espaço. Se quiser, posso verificar outra data ou cliente específico.";

const FOURTEEN: (u32, u32) = (14, 0);
const SHORT_LIST_LIMIT: usize = 5;

pub struct ChangeTodayToFourteen;

impl ChangeTodayToFourteen {
    fn new_time_line(item: &BookingItem) -> String {
        format!(
            "- **Novo horário:** {} às {}",
            hour_label(item.row.inicio),
            clock_label(FOURTEEN.0, FOURTEEN.1)
        )
    }

    /// Proposta curta, quando o usuário só respondeu "ok", "certo"...
    fn short_proposal(saudacao: &str, item: &BookingItem) -> String {
        format!(
            "{saudacao}Só pra confirmar: vou alterar o agendamento de hoje do **Cliente:** {} na **Quadra:** {}, que atualmente está em **Horário atual:** {}, para **finalizar às {}**.\n\n{}\n\n{CONFIRM_CHANGE_QUESTION} (sim/não)",
            item.customer(),
            item.court(),
            item.time_range(),
            clock_label(FOURTEEN.0, FOURTEEN.1),
            Self::new_time_line(item),
        )
    }

    fn detailed_proposal(saudacao: &str, today: &str, item: &BookingItem) -> String {
        let entry = numbered_entry(1, item, today, EntryDetail { status: false, participants: true });
        format!(
            "{saudacao}📅 Hoje ({today}) encontrei 1 agendamento que bate com o que você pediu:\n\n{entry}\nVou ajustar para **finalizar às {}**:\n\n{}\n\n{CONFIRM_CHANGE_QUESTION} (sim/não)",
            clock_label(FOURTEEN.0, FOURTEEN.1),
            Self::new_time_line(item),
        )
    }

    fn pick_one(saudacao: &str, today: &str, items: &[BookingItem]) -> String {
        let header = if items.len() <= SHORT_LIST_LIMIT {
            format!("{saudacao}📅 Hoje ({today}) encontrei {} agendamentos que posso alterar:\n\n", items.len())
        } else {
            format!("{saudacao}📅 Hoje ({today}) há {} agendamentos no seu espaço:\n\n", items.len())
        };
        format!(
            "{header}{}Me diga **o número** do agendamento que você quer alterar (por exemplo, 1) e o que você deseja fazer (alterar horário, mudar status, desmarcar, remarcar etc.), ou o nome do cliente, que eu preparo a alteração e peço sua confirmação final.",
            numbered_list(items, today, EntryDetail { status: false, participants: true }),
        )
    }
}

#[async_trait]
impl Interceptor for ChangeTodayToFourteen {
    fn name(&self) -> &'static str {
        "change_today_to_fourteen"
    }

    fn matches(&self, turn: &TurnContext<'_>) -> bool {
        intents::wants_change(turn.message)
            && !intents::wants_create(turn.message)
            && intents::mentions_fourteen(turn.message)
            && intents::today_in_context(turn.message, turn.history, &turn.today_label())
    }

    async fn resolve(&self, turn: &TurnContext<'_>) -> Interception {
        let items = match turn.bookings_on(turn.today(), Vec::new()).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(event = "direct_get_agendamentos_error", error = %e);
                return Interception::Resolved(ChatReply::fallback(FOURTEEN_LOOKUP_ERROR));
            }
        };

        let today = turn.today_label();
        let saudacao = greeting(turn.usuario_nome);
        let reply = match items.as_slice() {
            [] => NO_BOOKINGS_TODAY.to_string(),
            [only] if intents::is_acknowledgement(turn.message) => Self::short_proposal(&saudacao, only),
            [only] => Self::detailed_proposal(&saudacao, &today, only),
            many => Self::pick_one(&saudacao, &today, many),
        };
        Interception::Resolved(ChatReply::direct(reply))
    }
}
