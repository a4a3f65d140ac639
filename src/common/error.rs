use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Erros que viram resposta HTTP diretamente (antes de chegar na orquestração).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Método não permitido")]
    MethodNotAllowed,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            // O contrato do front espera só a primeira mensagem: {"error": "Missing 'message'"}
            AppError::ValidationError(errors) => (
                StatusCode::BAD_REQUEST,
                first_validation_message(&errors).unwrap_or_else(|| "Invalid request".to_string()),
            ),
            AppError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string()),
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

// Campos são validados em ordem fixa para a resposta ser determinística.
fn first_validation_message(errors: &validator::ValidationErrors) -> Option<String> {
    let fields = errors.field_errors();
    ["message", "empresa_codigo"]
        .iter()
        .filter_map(|field| fields.get(*field))
        .chain(fields.values())
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
}

/// Falha do armazenamento (query, insert ou update). A mensagem é preservada
/// porque o fluxo de update devolve o motivo ao usuário.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("{0}")]
    Query(String),

    #[error("valor inválido: {0}")]
    InvalidValue(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e.as_database_error() {
            Some(db_err) => StoreError::Query(db_err.message().to_string()),
            None => StoreError::Query(e.to_string()),
        }
    }
}

/// Etapas de uma escrita. As primárias derrubam a operação quando falham;
/// as demais são cascata: logadas, anexadas ao resultado e ignoradas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    CustomerCodeLookup,
    CustomerNameLookup,
    CourtLookup,
    ConflictCheck,
    BookingInsert,
    WalkInLookup,
    ParticipantInsert,
}

impl WriteStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteStep::CustomerCodeLookup => "customer_code_lookup",
            WriteStep::CustomerNameLookup => "customer_name_lookup",
            WriteStep::CourtLookup => "court_lookup",
            WriteStep::ConflictCheck => "conflict_check",
            WriteStep::BookingInsert => "booking_insert",
            WriteStep::WalkInLookup => "walk_in_lookup",
            WriteStep::ParticipantInsert => "participant_insert",
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, WriteStep::CustomerCodeLookup | WriteStep::BookingInsert)
    }

    /// Classifica a falha desta etapa (e já registra no log).
    pub fn fail(self, error: StoreError) -> StepFailure {
        if self.is_primary() {
            tracing::error!(step = self.as_str(), error = %error, "falha na etapa principal da escrita");
            StepFailure::Fatal { step: self, error }
        } else {
            StepFailure::Recoverable(RecoverableFailure::log(self, error))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoverableFailure {
    pub step: WriteStep,
    pub error: StoreError,
}

impl RecoverableFailure {
    fn log(step: WriteStep, error: StoreError) -> Self {
        tracing::warn!(step = step.as_str(), error = %error, "falha recuperável ignorada");
        Self { step, error }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepFailure {
    /// A operação principal falhou: o resultado inteiro é falha.
    Fatal { step: WriteStep, error: StoreError },
    /// Cascata: segue em frente, só registra.
    Recoverable(RecoverableFailure),
}

/// Falhas do provedor de chat-completion.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LlmError {
    #[error("provedor limitou as requisições (429)")]
    RateLimited,

    #[error("provedor respondeu com status {0}")]
    Status(u16),

    #[error("falha de rede ao chamar o provedor: {0}")]
    Network(String),

    #[error("resposta inválida do provedor: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::RateLimited)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            LlmError::RateLimited => Some(429),
            LlmError::Status(code) => Some(*code),
            _ => None,
        }
    }
}
