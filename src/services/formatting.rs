// src/services/formatting.rs

//! Textos determinísticos (Markdown simples) montados direto dos dados,
//! sem passar pela LLM.

use serde::Serialize;

use crate::common::local_time::{date_label, time_range_label, utc_to_local};
use crate::models::agenda::{BookingView, status_label};
use crate::services::phrases::{NO_TIME_LABEL, WALK_IN_LABEL};

/// Linha da view + data/horário legíveis no fuso da arena.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingItem {
    #[serde(flatten)]
    pub row: BookingView,
    pub data_legivel: String,
    pub horario_legivel: String,
}

impl From<BookingView> for BookingItem {
    fn from(row: BookingView) -> Self {
        let data_legivel = date_label(utc_to_local(row.inicio).date());
        let horario_legivel = time_range_label(row.inicio, row.fim);
        Self { row, data_legivel, horario_legivel }
    }
}

impl BookingItem {
    pub fn customer(&self) -> &str {
        self.row.representante_nome.as_deref().filter(|s| !s.is_empty()).unwrap_or(WALK_IN_LABEL)
    }

    pub fn court(&self) -> &str {
        self.row.quadra_nome.as_deref().filter(|s| !s.is_empty()).unwrap_or("Quadra")
    }

    pub fn modality(&self) -> &str {
        self.row.modalidade.as_deref().filter(|s| !s.is_empty()).unwrap_or("Agendamento")
    }

    pub fn time_range(&self) -> &str {
        if self.horario_legivel.is_empty() { NO_TIME_LABEL } else { &self.horario_legivel }
    }

    pub fn date_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.data_legivel.is_empty() { fallback } else { &self.data_legivel }
    }

    fn participants_line(&self) -> Option<String> {
        let total = self.row.participantes_total.unwrap_or(0);
        (total > 0).then(|| {
            format!(
                "{} ({} pagos, {} pendentes)",
                total,
                self.row.participantes_pagos.unwrap_or(0),
                self.row.participantes_pendentes.unwrap_or(0),
            )
        })
    }
}

/// Quais linhas opcionais entram em cada item da lista numerada.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryDetail {
    pub status: bool,
    pub participants: bool,
}

/// Item numerado:
/// `1. Futsal – Quadra 01` seguido das linhas Cliente/Data/Horário (+ opcionais).
pub fn numbered_entry(position: usize, item: &BookingItem, today_label: &str, detail: EntryDetail) -> String {
    let mut md = format!("{}. {} – {}\n", position, item.modality(), item.court());
    md.push_str(&format!("   - **Cliente:** {}\n", item.customer()));
    md.push_str(&format!("   - **Data:** {}\n", item.date_or(today_label)));
    md.push_str(&format!("   - **Horário:** {}\n", item.time_range()));

    if detail.status {
        if let Some(status) = item.row.agendamento_status.as_deref().filter(|s| !s.is_empty()) {
            md.push_str(&format!("   - **Status:** {}\n", status_label(status)));
        }
    }
    if detail.participants {
        if let Some(line) = item.participants_line() {
            md.push_str(&format!("   - **Participantes:** {line}\n"));
        }
    }
    md
}

/// Lista numerada completa, itens separados por linha em branco.
pub fn numbered_list(items: &[BookingItem], today_label: &str, detail: EntryDetail) -> String {
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| format!("{}\n", numbered_entry(idx + 1, item, today_label, detail)))
        .collect()
}

pub fn greeting(usuario_nome: Option<&str>) -> String {
    usuario_nome
        .filter(|nome| !nome.trim().is_empty())
        .map(|nome| format!("Olá, {nome}! "))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn view() -> BookingView {
        BookingView {
            agendamento_id: Uuid::nil(),
            agendamento_codigo: Some(7),
            codigo_empresa: "1001".into(),
            inicio: Utc.with_ymd_and_hms(2025, 3, 10, 21, 0, 0).unwrap(),
            fim: Utc.with_ymd_and_hms(2025, 3, 10, 23, 0, 0).unwrap(),
            modalidade: Some("Futsal".into()),
            agendamento_status: Some("scheduled".into()),
            quadra_id: None,
            quadra_nome: Some("Quadra 01".into()),
            representante_nome: None,
            participantes_total: Some(3),
            participantes_pagos: Some(1),
            participantes_pendentes: Some(2),
        }
    }

    #[test]
    fn item_labels_use_local_time() {
        let item = BookingItem::from(view());
        assert_eq!(item.data_legivel, "10/03/2025");
        assert_eq!(item.horario_legivel, "18h00 às 20h00");
        assert_eq!(item.customer(), "Cliente Consumidor");
    }

    #[test]
    fn entry_with_all_details() {
        let item = BookingItem::from(view());
        let md = numbered_entry(2, &item, "10/03/2025", EntryDetail { status: true, participants: true });
        assert_eq!(
            md,
            "2. Futsal – Quadra 01\n   - **Cliente:** Cliente Consumidor\n   - **Data:** 10/03/2025\n   - **Horário:** 18h00 às 20h00\n   - **Status:** Agendado\n   - **Participantes:** 3 (1 pagos, 2 pendentes)\n"
        );
    }

    #[test]
    fn item_serializes_flat() {
        let value = serde_json::to_value(BookingItem::from(view())).unwrap();
        assert_eq!(value["quadra_nome"], "Quadra 01");
        assert_eq!(value["horario_legivel"], "18h00 às 20h00");
    }

    #[test]
    fn greeting_only_with_name() {
        assert_eq!(greeting(Some("Ana")), "Olá, Ana! ");
        assert_eq!(greeting(Some("  ")), "");
        assert_eq!(greeting(None), "");
    }
}
