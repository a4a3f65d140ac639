// src/services/intents.rs

//! Detecção heurística de intenção sobre a mensagem do usuário e sobre o texto
//! que a própria Ísis escreveu no turno anterior.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::models::chat::HistoryTurn;
use crate::services::phrases::{CANCEL_MARKERS, CONFIRM_CHANGE_QUESTION, CUSTOMER_LABEL, today_listing_title};

static RE_YES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(sim( mesmo| este mesmo)?|esse mesmo|isso mesmo|pode mudar|pode alterar|pode aplicar|pode fazer|pode cancelar)\b",
    )
    .unwrap()
});

static RE_CHANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(mudar|mude|muda|alterar|altera|altere|remarcar|remarca|cancelar|cancela|trocar|troca)\b")
        .unwrap()
});

// "agendamento" fica de fora: aparece em quase todo pedido de alteração.
static RE_CREATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(criar|crie|agendar|reservar|marcar)\b").unwrap());

static RE_ACK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(certo|ok|blz|beleza|tudo bem|ent[aã]o)\b").unwrap());

static RE_BOOKING_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bagendamentos?\b").unwrap());

static RE_DATE_DMY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})/(\d{2})/(\d{4})").unwrap());

static RE_CUSTOMER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i){}\s*([^\n]+)", regex::escape(CUSTOMER_LABEL))).unwrap()
});

static RE_INTERVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2})h(\d{2})?\s*às\s*(\d{1,2})h(\d{2})?").unwrap());

// Alternativas para "novo fim", em ordem de prioridade.
static RE_END_TIME: LazyLock<[Regex; 5]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)para\s+(?:as|às)\s+(\d{1,2})h(\d{2})?").unwrap(),
        Regex::new(r"(?i)finalizar\s+às?\s+(\d{1,2})h(\d{2})?").unwrap(),
        Regex::new(r"(?i)termine\s+às?\s+(\d{1,2})h(\d{2})?").unwrap(),
        Regex::new(r"(?i)t[eéê]rmino\s+às?\s+(\d{1,2})h(\d{2})?").unwrap(),
        Regex::new(r"(?i)novo\s+hor[aá]rio[^0-9]*(?:\d{1,2}h\d{2}?\s*às\s*)?(\d{1,2})h(\d{2})?").unwrap(),
    ]
});

static RE_FOURTEEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)finalizar às 14h|horário final.*14h|novo horário.*14h|14h00").unwrap()
});

// =============================================================================
//  MENSAGEM DO USUÁRIO
// =============================================================================

pub fn is_yes_confirmation(message: &str) -> bool {
    RE_YES.is_match(message.trim())
}

/// Verbos de alteração/cancelamento (mesmo conjunto usado pelo guard).
pub fn wants_change(message: &str) -> bool {
    RE_CHANGE.is_match(message)
}

pub fn wants_create(message: &str) -> bool {
    RE_CREATE.is_match(message)
}

pub fn is_acknowledgement(message: &str) -> bool {
    RE_ACK.is_match(message)
}

pub fn mentions_fourteen(message: &str) -> bool {
    message.to_lowercase().contains("14h")
}

fn says_today(text: &str) -> bool {
    text.to_lowercase().contains("hoje")
}

/// Pergunta genérica sobre a agenda de hoje (caso atendido sem LLM em 429).
pub fn is_generic_today_question(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("hoje") && lower.contains("agend") && !wants_change(message) && !wants_create(message)
}

// =============================================================================
//  HISTÓRICO
// =============================================================================

pub fn last_assistant_text(history: &[HistoryTurn]) -> &str {
    history
        .iter()
        .rev()
        .find(|turn| turn.is_assistant())
        .map_or("", |turn| turn.content.as_str())
}

fn last_user_text(history: &[HistoryTurn]) -> &str {
    history
        .iter()
        .rev()
        .find(|turn| turn.is_user())
        .map_or("", |turn| turn.content.as_str())
}

/// "Hoje" vale se a mensagem fala em hoje, se o último pedido do usuário foi sobre
/// os agendamentos de hoje, ou se a última resposta foi a listagem do dia.
pub fn today_in_context(message: &str, history: &[HistoryTurn], today_label: &str) -> bool {
    if says_today(message) {
        return true;
    }
    let last_user = last_user_text(history);
    if says_today(last_user) && RE_BOOKING_WORD.is_match(last_user) {
        return true;
    }
    last_assistant_text(history).contains(&today_listing_title(today_label))
}

pub fn mentions_cancellation(assistant_text: &str) -> bool {
    let lower = assistant_text.to_lowercase();
    CANCEL_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub fn asks_change_confirmation(assistant_text: &str) -> bool {
    assistant_text.contains(CONFIRM_CHANGE_QUESTION)
}

/// Primeira data dd/mm/yyyy válida do texto.
pub fn extract_date(text: &str) -> Option<NaiveDate> {
    RE_DATE_DMY.captures_iter(text).find_map(|caps| {
        let day = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let year = caps[3].parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// Nomes listados depois de "Cliente:", sem markdown e sem repetição.
pub fn extract_customer_names(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in RE_CUSTOMER_LINE.captures_iter(text) {
        let cleaned = caps[1].replace('*', "").trim().to_string();
        if !cleaned.is_empty() && !names.contains(&cleaned) {
            names.push(cleaned);
        }
    }
    names
}

fn hour_minute(hour: Option<regex::Match<'_>>, minute: Option<regex::Match<'_>>) -> Option<(u32, u32)> {
    let hour: u32 = hour?.as_str().parse().ok()?;
    let minute: u32 = match minute {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    (hour <= 23 && minute <= 59).then_some((hour, minute))
}

/// Novo horário de término proposto no texto. Num intervalo "Xh às Yh" vale o
/// fim do ÚLTIMO intervalo citado (a proposta cita o horário atual antes do novo).
pub fn extract_target_end(text: &str) -> Option<(u32, u32)> {
    if let Some(caps) = RE_INTERVAL.captures_iter(text).last() {
        return hour_minute(caps.get(3), caps.get(4));
    }

    for pattern in RE_END_TIME.iter() {
        if let Some(caps) = pattern.captures(text) {
            return hour_minute(caps.get(1), caps.get(2));
        }
    }

    RE_FOURTEEN.is_match(text).then_some((14, 0))
}
