// src/models/agenda.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Tenant (empresa/arena) + identidade do chamador repassada ao banco.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantScope {
    pub empresa: String,
    pub authorization: Option<String>,
}

impl TenantScope {
    pub fn new(empresa: impl Into<String>, authorization: Option<String>) -> Self {
        Self {
            empresa: empresa.into(),
            authorization,
        }
    }
}

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Finished,
    Canceled,
    NoShow,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Finished => "finished",
            BookingStatus::Canceled => "canceled",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// Aceita também as grafias antigas que ainda aparecem no banco.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "scheduled" => Some(BookingStatus::Scheduled),
            "confirmed" => Some(BookingStatus::Confirmed),
            "in_progress" => Some(BookingStatus::InProgress),
            "finished" | "concluded" | "done" => Some(BookingStatus::Finished),
            "canceled" | "cancelled" => Some(BookingStatus::Canceled),
            "no_show" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }

    /// Rótulo mostrado ao usuário (nunca o valor interno em inglês).
    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "Agendado",
            BookingStatus::Confirmed => "Confirmado",
            BookingStatus::InProgress => "Em andamento",
            BookingStatus::Finished => "Concluído",
            BookingStatus::Canceled => "Cancelado",
            BookingStatus::NoShow => "Não compareceu",
        }
    }
}

/// Rótulo em português para um status cru; valores desconhecidos passam como estão.
pub fn status_label(raw: &str) -> String {
    match BookingStatus::parse(raw) {
        Some(status) => status.label().to_string(),
        None if raw.trim().eq_ignore_ascii_case("pending") => "Pendente".to_string(),
        None => raw.to_string(),
    }
}

// --- Agendamentos ---

/// Uma linha da view `v_agendamentos_isis` (1 linha por agendamento).
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct BookingView {
    pub agendamento_id: Uuid,
    pub agendamento_codigo: Option<i64>,
    pub codigo_empresa: String,
    pub inicio: DateTime<Utc>,
    pub fim: DateTime<Utc>,
    pub modalidade: Option<String>,
    pub agendamento_status: Option<String>,
    pub quadra_id: Option<Uuid>,
    pub quadra_nome: Option<String>,
    pub representante_nome: Option<String>,
    pub participantes_total: Option<i64>,
    pub participantes_pagos: Option<i64>,
    pub participantes_pendentes: Option<i64>,
}

/// Retrato do agendamento depois de um insert/update.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct BookingSnapshot {
    pub id: Uuid,
    pub codigo: Option<i64>,
    pub inicio: DateTime<Utc>,
    pub fim: DateTime<Utc>,
    pub status: Option<String>,
    pub modalidade: Option<String>,
    pub quadra_id: Option<Uuid>,
}

/// Período aplicado sobre `inicio`: [inicio, fim). Os limites vêm da LLM como
/// texto ISO e são convertidos pelo próprio banco.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodBound {
    Instant(DateTime<Utc>),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingFilter {
    pub period: Option<(PeriodBound, PeriodBound)>,
    pub status: Option<String>,
    pub quadra_id: Option<String>,
    /// ILIKE '%nome%' sobre representante_nome.
    pub cliente_nome: Option<String>,
    /// Igualdade exata com algum dos nomes.
    pub representantes: Vec<String>,
    pub offset: i64,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingPage {
    pub rows: Vec<BookingView>,
    /// Total de linhas que batem com o filtro, independente da paginação.
    pub total: i64,
}

/// Únicos campos que a Ísis pode alterar num agendamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingField {
    Inicio,
    Fim,
    Status,
    Modalidade,
}

impl BookingField {
    pub const ALL: [BookingField; 4] = [
        BookingField::Inicio,
        BookingField::Fim,
        BookingField::Status,
        BookingField::Modalidade,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            BookingField::Inicio => "inicio",
            BookingField::Fim => "fim",
            BookingField::Status => "status",
            BookingField::Modalidade => "modalidade",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        BookingField::ALL.into_iter().find(|f| f.column() == key)
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(self, BookingField::Inicio | BookingField::Fim)
    }
}

/// Alterações em ordem; `None` grava NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingChanges(pub Vec<(BookingField, Option<String>)>);

impl BookingChanges {
    pub fn set(mut self, field: BookingField, value: impl Into<String>) -> Self {
        self.0.push((field, Some(value.into())));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|(f, _)| f.column()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBooking {
    pub inicio: DateTime<Utc>,
    pub fim: DateTime<Utc>,
    pub status: String,
    pub modalidade: Option<String>,
    pub quadra_id: Option<Uuid>,
    pub cliente_id: Option<Uuid>,
    pub cliente_nome: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewParticipant {
    pub agendamento_id: Uuid,
    pub cliente_id: Uuid,
    pub nome: String,
    pub valor_cota: Decimal,
    pub status_pagamento: String,
    pub ordem: i32,
}

impl NewParticipant {
    /// Participante padrão criado junto com o agendamento.
    pub fn default_for(agendamento_id: Uuid, cliente_id: Uuid, nome: &str) -> Self {
        Self {
            agendamento_id,
            cliente_id,
            nome: nome.to_string(),
            valor_cota: Decimal::ZERO,
            status_pagamento: "Pendente".to_string(),
            ordem: 1,
        }
    }
}

/// Intervalo ocupado de uma quadra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct BusyInterval {
    pub inicio: DateTime<Utc>,
    pub fim: DateTime<Utc>,
}

// --- Clientes ---

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub codigo: Option<String>,
    pub nome: Option<String>,
    pub email: Option<String>,
    pub telefone: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CustomerKey {
    Codigo(String),
    Id(Uuid),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerSearch {
    pub term: Option<String>,
    pub limit: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerPage {
    pub rows: Vec<Customer>,
    pub total: i64,
}

// --- Quadras ---

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct CourtRow {
    pub id: Uuid,
    pub nome: Option<String>,
    pub status: Option<String>,
    /// Pode estar gravado como array ou como texto separado por vírgulas.
    pub modalidades: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Court {
    pub id: Uuid,
    pub nome: String,
    pub status: Option<String>,
    pub modalidades: Vec<String>,
}

impl From<CourtRow> for Court {
    fn from(row: CourtRow) -> Self {
        Self {
            id: row.id,
            nome: row.nome.unwrap_or_default(),
            status: row.status,
            modalidades: normalize_modalities(row.modalidades.as_ref()),
        }
    }
}

/// Lista limpa de modalidades a partir de array JSON ou texto "A, B".
pub fn normalize_modalities(raw: Option<&Value>) -> Vec<String> {
    let clean = |s: &str| {
        let t = s.trim();
        (!t.is_empty()).then(|| t.to_string())
    };
    match raw {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => clean(s),
                Value::Null => None,
                other => clean(&other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) => s.split(',').filter_map(clean).collect(),
        _ => Vec::new(),
    }
}

pub const COURT_ACTIVE_STATUS: &str = "Ativa";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourtFilter {
    pub active_only: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CourtPage {
    pub rows: Vec<Court>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn modalities_from_array_or_csv() {
        assert_eq!(
            normalize_modalities(Some(&json!(["Futsal", " Vôlei ", ""]))),
            vec!["Futsal", "Vôlei"]
        );
        assert_eq!(
            normalize_modalities(Some(&json!("Beach Tennis, Futevôlei,"))),
            vec!["Beach Tennis", "Futevôlei"]
        );
        assert!(normalize_modalities(None).is_empty());
        assert!(normalize_modalities(Some(&json!(null))).is_empty());
    }

    #[test]
    fn status_labels_are_portuguese() {
        assert_eq!(status_label("scheduled"), "Agendado");
        assert_eq!(status_label("cancelled"), "Cancelado");
        assert_eq!(status_label("done"), "Concluído");
        assert_eq!(status_label("pending"), "Pendente");
        assert_eq!(status_label("algo"), "algo");
    }

    #[test]
    fn only_whitelisted_fields_are_known() {
        assert_eq!(BookingField::from_key("fim"), Some(BookingField::Fim));
        assert_eq!(BookingField::from_key("participantes"), None);
        assert_eq!(BookingField::from_key("codigo_empresa"), None);
    }
}
