// src/services/tools.rs

//! Registro das tools expostas à LLM e o dispatcher que as executa contra o
//! `AgendaStore`. Cada tool devolve um resultado tipado; o JSON que volta para
//! o modelo é derivado dele.

pub mod create_agendamento;
pub mod get_agendamentos;
pub mod get_clientes;
pub mod get_quadras;
pub mod update_agendamento;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::db::AgendaStore;
use crate::models::chat::{HistoryTurn, ToolTrace};
use crate::models::agenda::TenantScope;
use crate::services::llm_client::{LlmToolCall, ToolSpec};

pub use create_agendamento::{CreateOutcome, CreateRejection};
pub use get_agendamentos::BookingsResult;
pub use get_clientes::CustomersResult;
pub use get_quadras::CourtsResult;
pub use update_agendamento::UpdateOutcome;

// =============================================================================
//  REGISTRO
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    GetAgendamentos,
    CreateAgendamento,
    UpdateAgendamento,
    GetClientes,
    GetQuadras,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::GetAgendamentos,
        ToolName::CreateAgendamento,
        ToolName::UpdateAgendamento,
        ToolName::GetClientes,
        ToolName::GetQuadras,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::GetAgendamentos => "get_agendamentos",
            ToolName::CreateAgendamento => "create_agendamento",
            ToolName::UpdateAgendamento => "update_agendamento",
            ToolName::GetClientes => "get_clientes",
            ToolName::GetQuadras => "get_quadras",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        ToolName::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolName::GetAgendamentos => "Lista agendamentos por período e filtros opcionais (somente leitura).",
            ToolName::CreateAgendamento => "Cria um novo agendamento na tabela agendamentos para a empresa atual.",
            ToolName::UpdateAgendamento => {
                "Atualiza campos permitidos de um agendamento (permitido mexer em agendamentos)."
            }
            ToolName::GetClientes => {
                "Lista clientes cadastrados (tabela clientes) filtrando por nome, email, telefone ou código (somente leitura)."
            }
            ToolName::GetQuadras => {
                "Lista quadras da empresa atual (tabela quadras), incluindo modalidades configuradas (somente leitura)."
            }
        }
    }

    /// JSON-schema dos parâmetros.
    pub fn parameters(&self) -> Value {
        match self {
            ToolName::GetAgendamentos => json!({
                "type": "object",
                "properties": {
                    "data_inicio": { "type": ["string", "null"], "description": "ISO date/time de início do período. Se vazio, assume hoje 00:00." },
                    "data_fim": { "type": ["string", "null"], "description": "ISO date/time de fim do período. Se vazio, assume hoje 23:59." },
                    "status": { "type": ["string", "null"], "description": "Status do agendamento (ex.: scheduled, confirmed, canceled)." },
                    "cliente_nome": { "type": ["string", "null"], "description": "Parte do nome do cliente (representante_nome) para filtrar agendamentos." },
                    "quadra_id": { "type": ["string", "null"], "description": "ID da quadra para filtrar." },
                    "page": { "type": ["integer", "null"], "description": "Página (começa em 1)." },
                    "page_size": { "type": ["integer", "null"], "description": "Itens por página (máximo 200)." }
                },
                "required": []
            }),
            ToolName::CreateAgendamento => json!({
                "type": "object",
                "properties": {
                    "cliente_codigo": { "type": ["string", "null"], "description": "Código do cliente na tabela clientes. Se ausente, será tratado como Cliente Consumidor." },
                    "cliente_nome": { "type": "string", "description": "Nome do cliente responsável ou descrição para Cliente Consumidor (pode ser nome mascarado)." },
                    "data": { "type": "string", "description": "Data do agendamento no formato YYYY-MM-DD (fuso da arena)." },
                    "hora_inicio": { "type": "string", "description": "Horário inicial no formato HH:mm (fuso da arena)." },
                    "hora_fim": { "type": "string", "description": "Horário final no formato HH:mm (fuso da arena). Use 00:00 para meia-noite do dia seguinte." },
                    "quadra_id": { "type": ["string", "null"], "description": "ID da quadra (quando conhecido)." },
                    "modalidade": { "type": ["string", "null"], "description": "Modalidade/esporte do agendamento. Na prática é obrigatória; pode ser omitida apenas quando a quadra tiver exatamente uma modalidade cadastrada (o backend assume automaticamente)." },
                    "status": { "type": ["string", "null"], "description": "Status inicial do agendamento (padrão: scheduled)." }
                },
                "required": ["cliente_nome", "data", "hora_inicio", "hora_fim", "modalidade"]
            }),
            ToolName::UpdateAgendamento => json!({
                "type": "object",
                "properties": {
                    "agendamento_id": { "type": "string", "description": "ID do agendamento a ser alterado." },
                    "campos": {
                        "type": "object",
                        "description": "Campos mutáveis (ex.: inicio, fim, status, participantes)",
                        "additionalProperties": true
                    }
                },
                "required": ["agendamento_id", "campos"]
            }),
            ToolName::GetClientes => json!({
                "type": "object",
                "properties": {
                    "search_term": { "type": ["string", "null"], "description": "Texto para buscar em nome, email, telefone ou código." },
                    "limit": { "type": ["integer", "null"], "description": "Quantidade máxima de clientes a retornar (padrão 20)." }
                },
                "required": []
            }),
            ToolName::GetQuadras => json!({
                "type": "object",
                "properties": {
                    "apenas_ativas": { "type": ["boolean", "null"], "description": "Se true, retorna apenas quadras com status 'Ativa'." },
                    "limit": { "type": ["integer", "null"], "description": "Quantidade máxima de quadras a retornar (padrão 20)." }
                },
                "required": []
            }),
        }
    }

    pub fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.as_str(),
            description: self.description(),
            parameters: self.parameters(),
        }
    }
}

/// Schema completo enviado na 1ª rodada.
pub fn tool_specs() -> Vec<ToolSpec> {
    ToolName::ALL.iter().map(ToolName::spec).collect()
}

// =============================================================================
//  POLÍTICA DE ESCRITA
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    ReadOnly,
    /// Escrita aplicada; o escopo vai no marcador ("agendamentos", "agendamentos:create").
    WriteAllowed(&'static str),
    WriteRejected,
    WriteError,
    WriteNoOp,
}

impl Policy {
    pub fn tag(&self) -> String {
        match self {
            Policy::ReadOnly => "read-only".to_string(),
            Policy::WriteAllowed(scope) => format!("write-allowed ({scope})"),
            Policy::WriteRejected => "write-rejected".to_string(),
            Policy::WriteError => "write-error".to_string(),
            Policy::WriteNoOp => "write-no-op".to_string(),
        }
    }

    pub fn is_write_allowed(&self) -> bool {
        matches!(self, Policy::WriteAllowed(_))
    }
}

// =============================================================================
//  CONTEXTO E RESULTADOS
// =============================================================================

/// Tudo que uma tool enxerga do turno corrente.
pub struct ToolContext<'a> {
    pub store: &'a dyn AgendaStore,
    pub scope: &'a TenantScope,
    pub now: DateTime<Utc>,
    pub message: &'a str,
    pub history: &'a [HistoryTurn],
    /// Período padrão enviado pelo front (`data_inicio`/`data_fim` do corpo).
    pub default_period: Option<(&'a str, &'a str)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Bookings(BookingsResult),
    Create(CreateOutcome),
    Update(UpdateOutcome),
    Customers(CustomersResult),
    Courts(CourtsResult),
    /// Argumentos ilegíveis, tool desconhecida ou falha de leitura.
    Failed { error: String },
}

impl ToolOutcome {
    pub fn policy(&self) -> Option<Policy> {
        match self {
            ToolOutcome::Bookings(_) | ToolOutcome::Customers(_) | ToolOutcome::Courts(_) => Some(Policy::ReadOnly),
            ToolOutcome::Create(outcome) => Some(outcome.policy()),
            ToolOutcome::Update(outcome) => Some(outcome.policy()),
            ToolOutcome::Failed { .. } => None,
        }
    }

    /// JSON devolvido à LLM como conteúdo da mensagem `tool`.
    pub fn to_json(&self) -> Value {
        match self {
            ToolOutcome::Bookings(result) => result.to_json(),
            ToolOutcome::Create(outcome) => outcome.to_json(),
            ToolOutcome::Update(outcome) => outcome.to_json(),
            ToolOutcome::Customers(result) => result.to_json(),
            ToolOutcome::Courts(result) => result.to_json(),
            ToolOutcome::Failed { error } => json!({ "ok": false, "error": error }),
        }
    }
}

/// Uma chamada de tool executada neste turno.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExecution {
    pub name: String,
    pub args: Option<Value>,
    pub outcome: ToolOutcome,
}

impl ToolExecution {
    pub fn tool(&self) -> Option<ToolName> {
        ToolName::parse(&self.name)
    }

    /// Resumo limitado a alguns campos (nunca o payload inteiro).
    pub fn summary(&self) -> Value {
        summarize(&self.outcome.to_json())
    }

    pub fn trace(&self) -> ToolTrace {
        let error = match &self.outcome {
            ToolOutcome::Failed { error } => Some(error.clone()),
            _ => None,
        };
        ToolTrace {
            name: self.name.clone(),
            args: self.args.clone(),
            summary: Some(self.summary()),
            error,
        }
    }
}

const SUMMARY_KEYS: [&str; 12] = [
    "ok",
    "policy",
    "domain",
    "total",
    "updated_id",
    "applied_fields",
    "error",
    "conflict",
    "quadra_id",
    "requested_modalidade",
    "modalidades_disponiveis",
    "created_id",
];

pub fn summarize(result: &Value) -> Value {
    let mut summary = Map::new();
    if let Value::Object(fields) = result {
        for key in SUMMARY_KEYS {
            if let Some(value) = fields.get(key) {
                summary.insert(key.to_string(), value.clone());
            }
        }
    }
    Value::Object(summary)
}

// =============================================================================
//  DISPATCH
// =============================================================================

fn parse_args<T: DeserializeOwned>(raw: &Value) -> Result<T, String> {
    serde_json::from_value(raw.clone()).map_err(|e| format!("Falha ao interpretar argumentos: {e}"))
}

/// Executa uma chamada da LLM. Nunca falha: qualquer problema vira `ToolOutcome::Failed`.
pub async fn dispatch(ctx: &ToolContext<'_>, call: &LlmToolCall) -> ToolExecution {
    let raw = if call.arguments.trim().is_empty() {
        Ok(Value::Object(Map::new()))
    } else {
        serde_json::from_str::<Value>(&call.arguments).map_err(|e| format!("Falha ao interpretar argumentos: {e}"))
    };

    let (args, outcome) = match raw {
        Err(error) => (None, ToolOutcome::Failed { error }),
        Ok(args) => {
            let outcome = run(ctx, &call.name, &args).await;
            (Some(args), outcome)
        }
    };

    let execution = ToolExecution {
        name: call.name.clone(),
        args,
        outcome,
    };

    match &execution.outcome {
        ToolOutcome::Failed { error } => tracing::warn!(
            event = "tool_error",
            tool = %execution.name,
            args = ?execution.args,
            error = %error,
        ),
        _ => tracing::info!(
            event = "tool_success",
            tool = %execution.name,
            args = ?execution.args,
            summary = %execution.summary(),
        ),
    }

    execution
}

async fn run(ctx: &ToolContext<'_>, name: &str, args: &Value) -> ToolOutcome {
    let Some(tool) = ToolName::parse(name) else {
        return ToolOutcome::Failed {
            error: format!("Ferramenta desconhecida: {name}"),
        };
    };

    let result = match tool {
        ToolName::GetAgendamentos => match parse_args(args) {
            Ok(parsed) => get_agendamentos::execute(ctx, parsed, args).await.map(ToolOutcome::Bookings),
            Err(error) => return ToolOutcome::Failed { error },
        },
        ToolName::CreateAgendamento => match parse_args(args) {
            Ok(parsed) => Ok(ToolOutcome::Create(create_agendamento::execute(ctx, parsed).await)),
            Err(error) => return ToolOutcome::Failed { error },
        },
        ToolName::UpdateAgendamento => match parse_args(args) {
            Ok(parsed) => Ok(ToolOutcome::Update(update_agendamento::execute(ctx, parsed).await)),
            Err(error) => return ToolOutcome::Failed { error },
        },
        ToolName::GetClientes => match parse_args(args) {
            Ok(parsed) => get_clientes::execute(ctx, parsed).await.map(ToolOutcome::Customers),
            Err(error) => return ToolOutcome::Failed { error },
        },
        ToolName::GetQuadras => match parse_args(args) {
            Ok(parsed) => get_quadras::execute(ctx, parsed).await.map(ToolOutcome::Courts),
            Err(error) => return ToolOutcome::Failed { error },
        },
    };

    result.unwrap_or_else(|e| ToolOutcome::Failed {
        error: format!("Falha ao executar ferramenta: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tool_call, MemoryStore};
    use chrono::TimeZone;

    fn ctx<'a>(store: &'a MemoryStore, scope: &'a TenantScope) -> ToolContext<'a> {
        ToolContext {
            store,
            scope,
            now: Utc.with_ymd_and_hms(2025, 3, 10, 15, 0, 0).unwrap(),
            message: "",
            history: &[],
            default_period: None,
        }
    }

    #[test]
    fn registry_round_trips_names() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
            assert_eq!(tool.parameters()["type"], "object");
        }
        assert_eq!(tool_specs().len(), 5);
        assert_eq!(ToolName::parse("delete_everything"), None);
    }

    #[test]
    fn policy_tags() {
        assert_eq!(Policy::WriteAllowed("agendamentos:create").tag(), "write-allowed (agendamentos:create)");
        assert_eq!(Policy::WriteNoOp.tag(), "write-no-op");
        assert!(!Policy::ReadOnly.is_write_allowed());
    }

    #[test]
    fn summary_keeps_only_known_keys() {
        let summary = summarize(&json!({"ok": true, "policy": "read-only", "total": 2, "items": [1, 2]}));
        assert_eq!(summary, json!({"ok": true, "policy": "read-only", "total": 2}));
    }

    #[tokio::test]
    async fn malformed_arguments_become_tool_error() {
        let store = MemoryStore::default();
        let scope = TenantScope::new("1001", None);
        let execution = dispatch(&ctx(&store, &scope), &tool_call("get_quadras", "{not json")).await;
        assert_eq!(execution.args, None);
        match execution.outcome {
            ToolOutcome::Failed { error } => assert!(error.starts_with("Falha ao interpretar argumentos")),
            other => panic!("esperava falha, veio {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_reported() {
        let store = MemoryStore::default();
        let scope = TenantScope::new("1001", None);
        let execution = dispatch(&ctx(&store, &scope), &tool_call("drop_table", "{}")).await;
        assert_eq!(execution.outcome.policy(), None);
        assert_eq!(execution.trace().error.as_deref(), Some("Ferramenta desconhecida: drop_table"));
    }

    #[tokio::test]
    async fn read_store_failure_becomes_tool_error() {
        let store = MemoryStore::default().failing_reads();
        let scope = TenantScope::new("1001", None);
        let execution = dispatch(&ctx(&store, &scope), &tool_call("get_quadras", "{}")).await;
        assert!(matches!(execution.outcome, ToolOutcome::Failed { .. }));
        assert_eq!(execution.summary()["ok"], false);
    }
}
