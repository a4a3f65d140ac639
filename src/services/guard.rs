// src/services/guard.rs

//! Última palavra sobre o texto da LLM depois das tools: o modelo não pode
//! afirmar uma alteração que o banco não confirmou.

use std::sync::LazyLock;

use regex::Regex;

use crate::services::formatting::{numbered_list, BookingItem, EntryDetail};
use crate::services::intents;
use crate::services::tools::{ToolExecution, ToolName, ToolOutcome};

// =============================================================================
//  1. UPDATE QUE NÃO FOI APLICADO
// =============================================================================

/// O que sabemos do último `update_agendamento` que não foi aplicado.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedUpdate {
    pub id: Option<String>,
    pub fields: Vec<&'static str>,
    pub reason: String,
}

impl FailedUpdate {
    pub fn message(&self) -> String {
        let fields = if self.fields.is_empty() {
            "nenhum campo foi aplicado".to_string()
        } else {
            self.fields.join(", ")
        };
        format!(
            "Não consegui aplicar a alteração deste agendamento agora.\n\n\
             - **ID:** {}\n\
             - **Campos aplicados:** {fields}\n\
             - **Motivo:** {}\n\n\
             Nenhuma alteração foi gravada no sistema. Você pode tentar novamente informando claramente o novo horário, status ou modalidade que deseja.",
            self.id.as_deref().unwrap_or("(desconhecido)"),
            self.reason,
        )
    }
}

/// Só olha o ÚLTIMO update do turno: um update aplicado depois de uma falha vale.
pub fn failed_update(executions: &[ToolExecution]) -> Option<FailedUpdate> {
    let last = executions
        .iter()
        .rev()
        .find(|exec| exec.tool() == Some(ToolName::UpdateAgendamento))?;

    match &last.outcome {
        ToolOutcome::Update(outcome) if outcome.is_applied() => None,
        ToolOutcome::Update(outcome) => Some(FailedUpdate {
            id: outcome.updated_id().map(str::to_string),
            fields: outcome.applied_fields().to_vec(),
            reason: outcome
                .error()
                .unwrap_or_else(|| "Não consegui concluir a alteração do agendamento.".to_string()),
        }),
        ToolOutcome::Failed { error } => Some(FailedUpdate {
            id: None,
            fields: Vec::new(),
            reason: error.clone(),
        }),
        _ => None,
    }
}

// =============================================================================
//  2. PEDIDO DE ALTERAÇÃO RESPONDIDO SÓ COM LEITURAS
// =============================================================================

fn only_reads(executions: &[ToolExecution]) -> bool {
    !executions.is_empty()
        && !executions
            .iter()
            .any(|exec| exec.outcome.policy().is_some_and(|p| p.is_write_allowed()))
}

fn last_listing(executions: &[ToolExecution]) -> Option<&[BookingItem]> {
    executions.iter().rev().find_map(|exec| match &exec.outcome {
        ToolOutcome::Bookings(result) => Some(result.items.as_slice()),
        _ => None,
    })
}

/// Substitui a resposta da LLM por uma listagem quando o usuário pediu para
/// mudar/cancelar e nada foi escrito neste turno.
pub fn unconfirmed_change(message: &str, executions: &[ToolExecution], today_label: &str) -> Option<String> {
    if !intents::wants_change(message) || !only_reads(executions) {
        return None;
    }
    let items = last_listing(executions).filter(|items| !items.is_empty())?;

    let reply = match items {
        [only] => format!(
            "Encontrei um agendamento que bate com o que você pediu:\n\n\
             - **Cliente:** {}\n\
             - **Quadra:** {}\n\
             - **Data:** {}\n\
             - **Horário:** {}\n\n\
             Ainda **não cancelei nem alterei nada**. Se for esse o agendamento que você quer cancelar ou mudar, \
             me confirme por favor (por exemplo: \"sim, pode cancelar\" ou \"sim, mude o horário\").",
            only.customer(),
            only.court(),
            only.date_or(today_label),
            only.time_range(),
        ),
        many => format!(
            "Encontrei alguns agendamentos relacionados ao que você pediu:\n\n{}\
             Ainda **não cancelei nem alterei nenhum agendamento**. Me diga **o número ou o cliente/horário** do agendamento \
             que você quer desmarcar ou mudar, que eu preparo a alteração e peço sua confirmação final antes de aplicar.",
            numbered_list(many, today_label, EntryDetail::default()),
        ),
    };
    Some(reply)
}

// =============================================================================
//  3. LIMPEZA DO TEXTO DO MODELO
// =============================================================================

static RE_UUID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-5][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}").unwrap()
});
static RE_LONG_HEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[0-9a-fA-F]{16,}\b").unwrap());
static RE_ID_LABEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(ID\s*:\s*)([\w-]{10,})").unwrap());
static RE_FILLER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(vou\s+(buscar|consultar|verificar)|um\s+instante|já\s+volto|aguarde)").unwrap());
static RE_MANY_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

const WAITING_EMOJIS: [char; 6] = ['🔍', '⏳', '⌛', '🕐', '🕑', '🕒'];
const INTERNAL_CODE: &str = "[código interno]";

/// Esconde IDs internos e tira as linhas de "vou verificar, um instante".
pub fn sanitize_model_reply(text: &str) -> String {
    let hidden = RE_UUID.replace_all(text, INTERNAL_CODE);
    let hidden = RE_LONG_HEX.replace_all(&hidden, INTERNAL_CODE);
    let hidden = RE_ID_LABEL.replace_all(&hidden, format!("${{1}}{INTERNAL_CODE}"));

    let kept: Vec<&str> = hidden.lines().filter(|line| !RE_FILLER.is_match(line)).collect();
    let joined: String = kept.join("\n").chars().filter(|c| !WAITING_EMOJIS.contains(c)).collect();
    let cleaned = RE_MANY_BREAKS.replace_all(&joined, "\n\n").trim().to_string();

    if cleaned.is_empty() { hidden.into_owned() } else { cleaned }
}
