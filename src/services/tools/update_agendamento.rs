// src/services/tools/update_agendamento.rs

use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::common::error::StoreError;
use crate::common::lenient::opt_string;
use crate::models::agenda::{BookingChanges, BookingField, BookingSnapshot};

use super::{Policy, ToolContext};

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAgendamentoArgs {
    #[serde(default, deserialize_with = "opt_string")]
    pub agendamento_id: Option<String>,
    #[serde(default)]
    pub campos: Option<Value>,
    // Atalho: os mesmos campos também são aceitos no nível de cima.
    #[serde(flatten)]
    pub top_level: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Applied {
        id: String,
        fields: Vec<&'static str>,
        snapshot: BookingSnapshot,
    },
    MissingId,
    NoFields {
        id: String,
    },
    Failed {
        id: String,
        fields: Vec<&'static str>,
        error: String,
    },
    NotFound {
        id: String,
    },
}

pub const MISSING_ID_ERROR: &str = "agendamento_id obrigatório para update_agendamento";
pub const NO_FIELDS_ERROR: &str = "Nenhum campo permitido foi informado em 'campos' para update_agendamento.";
pub const NOT_FOUND_ERROR: &str = "Nenhum agendamento encontrado para atualizar (verifique empresa e ID).";

impl UpdateOutcome {
    pub fn policy(&self) -> Policy {
        match self {
            UpdateOutcome::Applied { .. } => Policy::WriteAllowed("agendamentos"),
            UpdateOutcome::MissingId | UpdateOutcome::NoFields { .. } => Policy::WriteRejected,
            UpdateOutcome::Failed { .. } => Policy::WriteError,
            UpdateOutcome::NotFound { .. } => Policy::WriteNoOp,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied { .. })
    }

    pub fn updated_id(&self) -> Option<&str> {
        match self {
            UpdateOutcome::MissingId => None,
            UpdateOutcome::Applied { id, .. }
            | UpdateOutcome::NoFields { id }
            | UpdateOutcome::Failed { id, .. }
            | UpdateOutcome::NotFound { id } => Some(id),
        }
    }

    pub fn applied_fields(&self) -> &[&'static str] {
        match self {
            UpdateOutcome::Applied { fields, .. } | UpdateOutcome::Failed { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<String> {
        match self {
            UpdateOutcome::Applied { .. } => None,
            UpdateOutcome::MissingId => Some(MISSING_ID_ERROR.to_string()),
            UpdateOutcome::NoFields { .. } => Some(NO_FIELDS_ERROR.to_string()),
            UpdateOutcome::Failed { error, .. } => Some(format!("Erro ao atualizar agendamento: {error}")),
            UpdateOutcome::NotFound { .. } => Some(NOT_FOUND_ERROR.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "ok": self.is_applied(),
            "policy": self.policy().tag(),
            "domain": "agenda",
        });
        if let Some(id) = self.updated_id() {
            body["updated_id"] = json!(id);
            body["applied_fields"] = json!(self.applied_fields());
        }
        if let Some(error) = self.error() {
            body["error"] = json!(error);
        }
        if let UpdateOutcome::Applied { snapshot, .. } = self {
            body["updated_snapshot"] = json!(snapshot);
        }
        body
    }
}

fn value_to_column(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Campos permitidos de `campos` + nível de cima; o resto é descartado em silêncio.
fn collect_changes(args: &UpdateAgendamentoArgs) -> BookingChanges {
    let mut merged = match &args.campos {
        Some(Value::Object(campos)) => campos.clone(),
        _ => Map::new(),
    };
    for field in BookingField::ALL {
        if let Some(value) = args.top_level.get(field.column()) {
            merged.insert(field.column().to_string(), value.clone());
        }
    }

    let changes = BookingField::ALL
        .into_iter()
        .filter_map(|field| merged.get(field.column()).map(|v| (field, value_to_column(v))))
        .collect();
    BookingChanges(changes)
}

pub async fn execute(ctx: &ToolContext<'_>, args: UpdateAgendamentoArgs) -> UpdateOutcome {
    let Some(id) = args.agendamento_id.clone() else {
        return UpdateOutcome::MissingId;
    };

    let changes = collect_changes(&args);
    if changes.is_empty() {
        return UpdateOutcome::NoFields { id };
    }
    let fields = changes.fields();

    let result = match Uuid::parse_str(&id) {
        Ok(uuid) => ctx.store.update_booking(ctx.scope, uuid, &changes).await,
        Err(_) => Err(StoreError::InvalidValue(format!("id de agendamento inválido: \"{id}\""))),
    };

    match result {
        Ok(Some(snapshot)) => UpdateOutcome::Applied { id, fields, snapshot },
        Ok(None) => UpdateOutcome::NotFound { id },
        Err(e) => {
            tracing::error!(agendamento_id = %id, error = %e, "falha ao atualizar agendamento");
            UpdateOutcome::Failed {
                id,
                fields,
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agenda::TenantScope;
    use crate::test_support::{booking, MemoryStore};
    use chrono::{TimeZone, Utc};

    async fn run(store: &MemoryStore, raw: Value) -> UpdateOutcome {
        let scope = TenantScope::new("1001", None);
        let ctx = ToolContext {
            store,
            scope: &scope,
            now: Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap(),
            message: "",
            history: &[],
            default_period: None,
        };
        execute(&ctx, serde_json::from_value(raw).unwrap()).await
    }

    fn seeded() -> (MemoryStore, Uuid) {
        let row = booking("1001", (2025, 3, 10, 21, 0), (2025, 3, 10, 23, 0), "Maria", "Quadra 01");
        let id = row.agendamento_id;
        (MemoryStore::default().with_booking(row), id)
    }

    #[tokio::test]
    async fn applies_only_whitelisted_fields() {
        let (store, id) = seeded();
        let outcome = run(
            &store,
            json!({
                "agendamento_id": id.to_string(),
                "campos": {"status": "confirmed", "participantes": ["x"], "codigo_empresa": "9999"},
                "fim": "2025-03-10T17:00:00Z"
            }),
        )
        .await;

        assert_eq!(outcome.policy(), Policy::WriteAllowed("agendamentos"));
        assert_eq!(outcome.applied_fields(), ["fim", "status"]);
        let json = outcome.to_json();
        assert_eq!(json["policy"], "write-allowed (agendamentos)");
        assert_eq!(json["updated_snapshot"]["status"], "confirmed");
        assert_eq!(store.bookings()[0].codigo_empresa, "1001");
        assert_eq!(store.bookings()[0].fim, Utc.with_ymd_and_hms(2025, 3, 10, 17, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn rejects_missing_id_and_empty_fields() {
        let (store, id) = seeded();
        let outcome = run(&store, json!({"campos": {"status": "canceled"}})).await;
        assert_eq!(outcome, UpdateOutcome::MissingId);
        assert_eq!(outcome.to_json()["error"], MISSING_ID_ERROR);

        let outcome = run(&store, json!({"agendamento_id": id.to_string(), "campos": {"quadra_id": "x"}})).await;
        let json = outcome.to_json();
        assert_eq!(json["policy"], "write-rejected");
        assert_eq!(json["applied_fields"], json!([]));
        assert_eq!(json["updated_id"], id.to_string());
    }

    #[tokio::test]
    async fn distinguishes_no_op_from_store_error() {
        let (store, _) = seeded();
        let other = Uuid::new_v4().to_string();
        let outcome = run(&store, json!({"agendamento_id": other, "campos": {"status": "canceled"}})).await;
        assert_eq!(outcome.policy(), Policy::WriteNoOp);
        assert_eq!(outcome.to_json()["applied_fields"], json!([]));

        let outcome = run(&store, json!({"agendamento_id": "abc", "campos": {"status": "canceled"}})).await;
        assert_eq!(outcome.policy(), Policy::WriteError);
        assert_eq!(outcome.applied_fields(), ["status"]);

        let (store, id) = seeded();
        let store = store.failing_writes();
        let outcome = run(&store, json!({"agendamento_id": id.to_string(), "campos": {"status": "canceled"}})).await;
        assert_eq!(outcome.policy(), Policy::WriteError);
        assert!(outcome.error().unwrap().starts_with("Erro ao atualizar agendamento: "));
    }
}
