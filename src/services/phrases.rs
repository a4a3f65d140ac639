// src/services/phrases.rs

//! Frases que a Ísis escreve e que o backend depois procura no histórico.
//! O prompt e os interceptadores usam SEMPRE estas constantes: mudar o texto
//! aqui muda os dois lados juntos.

/// Pergunta final de toda proposta de alteração de horário.
pub const CONFIRM_CHANGE_QUESTION: &str = "Você confirma que deseja aplicar essa alteração?";

/// Label usado nas listagens; o interceptador de cancelamento extrai os nomes depois dele.
pub const CUSTOMER_LABEL: &str = "Cliente:";

/// Cabeçalho da listagem determinística de agendamentos do dia.
pub const TODAY_LISTING_HEADER: &str = "Agendamentos para o dia";

/// Palavras que marcam que a última resposta propôs um cancelamento.
pub const CANCEL_MARKERS: [&str; 2] = ["cancelar", "cancelamento"];

pub const NO_TIME_LABEL: &str = "(horário não informado)";

pub const WALK_IN_LABEL: &str = "Cliente Consumidor";

/// "Agendamentos para o dia dd/mm/yyyy"
pub fn today_listing_title(today_label: &str) -> String {
    format!("{TODAY_LISTING_HEADER} {today_label}")
}
