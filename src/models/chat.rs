// src/models/chat.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::Validate;

use crate::common::lenient;

// --- REQUEST ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChatRequest {
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    #[validate(length(min = 1, message = "Missing 'message'"))]
    #[schema(example = "quais os agendamentos de hoje?")]
    pub message: String,

    #[serde(default, rename = "empresaCodigo", deserialize_with = "lenient::string_or_empty")]
    #[validate(length(min = 1, message = "Missing 'empresaCodigo'"))]
    #[schema(example = "1001")]
    pub empresa_codigo: String,

    #[serde(default, rename = "usuarioId", deserialize_with = "lenient::opt_string")]
    pub usuario_id: Option<String>,
    #[serde(default, rename = "usuarioNome", deserialize_with = "lenient::opt_string")]
    pub usuario_nome: Option<String>,
    #[serde(default, rename = "usuarioCargo", deserialize_with = "lenient::opt_string")]
    pub usuario_cargo: Option<String>,

    #[serde(default, deserialize_with = "history_or_empty")]
    pub history: Vec<HistoryTurn>,

    // Período padrão escolhido na tela (usado pelo get_agendamentos quando a LLM não manda datas)
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub data_inicio: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub data_fim: Option<String>,
}

/// Turno anterior da conversa, exatamente como o front guardou.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryTurn {
    #[schema(example = "assistant")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub content: String,
}

impl HistoryTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".into(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".into(), content: content.into() }
    }

    pub fn is_user(&self) -> bool {
        self.role == "user"
    }

    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }
}

// `history` que não for array é tratado como vazio; turnos malformados são ignorados.
fn history_or_empty<'de, D>(deserializer: D) -> Result<Vec<HistoryTurn>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<HistoryTurn>(item).ok())
            .filter(|turn| matches!(turn.role.as_str(), "user" | "assistant" | "system"))
            .collect(),
        _ => Vec::new(),
    })
}

impl ChatRequest {
    /// Apara os campos obrigatórios antes da validação.
    pub fn normalized(mut self) -> Self {
        self.message = self.message.trim().to_string();
        self.empresa_codigo = self.empresa_codigo.trim().to_string();
        self
    }
}

// --- RESPONSE ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ReplySource {
    #[serde(rename = "tools-direct")]
    ToolsDirect,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openai+tools")]
    OpenAiTools,
    #[serde(rename = "fallback")]
    Fallback,
}

impl ReplySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplySource::ToolsDirect => "tools-direct",
            ReplySource::OpenAi => "openai",
            ReplySource::OpenAiTools => "openai+tools",
            ReplySource::Fallback => "fallback",
        }
    }
}

/// "primary": resposta veio do modelo. "reserve": resposta montada pelo backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Primary,
    Reserve,
}

/// Registro de uma chamada de tool exposto no `debug` da resposta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolTrace {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub args: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub summary: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DebugInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolTrace>>,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatReply {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies: Option<Vec<String>>,
    pub source: ReplySource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl ChatReply {
    /// Resposta montada pelo backend sem passar pela LLM.
    pub fn direct(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            replies: None,
            source: ReplySource::ToolsDirect,
            debug: Some(DebugInfo { tools: None, strategy: Strategy::Reserve }),
        }
    }

    pub fn fallback(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            replies: None,
            source: ReplySource::Fallback,
            debug: Some(DebugInfo { tools: None, strategy: Strategy::Reserve }),
        }
    }

    /// Texto escrito pelo modelo (`openai` ou `openai+tools`).
    pub fn from_model(source: ReplySource, reply: impl Into<String>, replies: Vec<String>) -> Self {
        Self {
            reply: reply.into(),
            replies: Some(replies),
            source,
            debug: Some(DebugInfo { tools: None, strategy: Strategy::Primary }),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolTrace>) -> Self {
        let strategy = self.debug.as_ref().map_or(Strategy::Reserve, |d| d.strategy);
        self.debug = Some(DebugInfo { tools: Some(tools), strategy });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_front_end_payload() {
        let req = serde_json::from_value::<ChatRequest>(json!({
            "message": "  oi  ",
            "empresaCodigo": 1001,
            "usuarioNome": "Ana",
            "history": [
                {"role": "user", "content": "oi"},
                {"role": "tool", "content": "x"},
                {"role": "assistant"},
                "lixo"
            ]
        }))
        .unwrap()
        .normalized();

        assert_eq!(req.message, "oi");
        assert_eq!(req.empresa_codigo, "1001");
        assert_eq!(req.usuario_nome.as_deref(), Some("Ana"));
        assert_eq!(req.history.len(), 2);
        assert!(req.history[1].is_assistant());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn missing_fields_fail_validation() {
        let req: ChatRequest = serde_json::from_value(json!({"message": "   "})).unwrap();
        let errors = req.normalized().validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("message"));
        assert!(fields.contains_key("empresa_codigo"));
    }

    #[test]
    fn reply_serializes_wire_names() {
        let reply = ChatReply::direct("ok");
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value, json!({"reply": "ok", "source": "tools-direct", "debug": {"strategy": "reserve"}}));
    }
}
