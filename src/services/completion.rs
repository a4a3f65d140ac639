// src/services/completion.rs

//! As duas rodadas com a LLM como máquina de estados:
//! `Initial` -> (`ToolExecution` ->) `Final`.
//!
//! Nenhuma rodada é repetida: falhou, o turno termina com resposta fixa.

use crate::models::chat::{ChatReply, HistoryTurn, ReplySource};
use crate::services::guard;
use crate::services::interceptors::TurnContext;
use crate::services::llm_client::{ChatCompletionClient, CompletionRequest, LlmMessage, LlmToolCall};
use crate::services::quota_fallback;
use crate::services::tools::{self, ToolContext, ToolExecution};

pub const SECOND_ROUND_FAILURE: &str = "Não consegui concluir a operação agora.";

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    /// 1ª rodada, com tools.
    pub model: String,
    /// 2ª rodada, sem tools.
    pub synthesis_model: String,
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            synthesis_model: "gpt-4.1-mini".to_string(),
            temperature: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    Initial,
    ToolExecution {
        /// Texto que o modelo escreveu junto com o pedido de tools.
        preliminary: Option<String>,
        tool_calls: Vec<LlmToolCall>,
    },
    Final(ChatReply),
}

fn history_message(turn: &HistoryTurn) -> LlmMessage {
    match turn.role.as_str() {
        "assistant" => LlmMessage::assistant(turn.content.clone()),
        "system" => LlmMessage::system(turn.content.clone()),
        _ => LlmMessage::user(turn.content.clone()),
    }
}

pub struct CompletionDriver<'a> {
    llm: &'a dyn ChatCompletionClient,
    settings: &'a CompletionSettings,
    turn: &'a TurnContext<'a>,
    tools: ToolContext<'a>,
    messages: Vec<LlmMessage>,
    executions: Vec<ToolExecution>,
}

impl<'a> CompletionDriver<'a> {
    pub fn new(
        llm: &'a dyn ChatCompletionClient,
        settings: &'a CompletionSettings,
        turn: &'a TurnContext<'a>,
        system_prompt: String,
        default_period: Option<(&'a str, &'a str)>,
    ) -> Self {
        let mut messages = Vec::with_capacity(turn.history.len() + 2);
        messages.push(LlmMessage::system(system_prompt));
        messages.extend(turn.history.iter().map(history_message));
        messages.push(LlmMessage::user(turn.message));

        let tools = ToolContext {
            store: turn.store,
            scope: turn.scope,
            now: turn.now,
            message: turn.message,
            history: turn.history,
            default_period,
        };

        Self {
            llm,
            settings,
            turn,
            tools,
            messages,
            executions: Vec::new(),
        }
    }

    pub async fn run(mut self) -> ChatReply {
        let mut state = TurnState::Initial;
        loop {
            state = match state {
                TurnState::Final(reply) => return reply,
                other => self.step(other).await,
            };
        }
    }

    /// Uma transição.
    pub async fn step(&mut self, state: TurnState) -> TurnState {
        match state {
            TurnState::Initial => self.first_round().await,
            TurnState::ToolExecution { preliminary, tool_calls } => self.tool_round(preliminary, tool_calls).await,
            done @ TurnState::Final(_) => done,
        }
    }

    fn traces(&self) -> Vec<crate::models::chat::ToolTrace> {
        self.executions.iter().map(ToolExecution::trace).collect()
    }

    async fn first_round(&mut self) -> TurnState {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            temperature: self.settings.temperature,
            messages: self.messages.clone(),
            tools: tools::tool_specs(),
        };

        let completion = match self.llm.complete(request).await {
            Ok(completion) => completion,
            Err(e) => return TurnState::Final(quota_fallback::reply_for_llm_failure(self.turn, &e).await),
        };

        if !completion.tool_calls.is_empty() {
            return TurnState::ToolExecution {
                preliminary: completion.content,
                tool_calls: completion.tool_calls,
            };
        }

        let reply = guard::sanitize_model_reply(completion.content.as_deref().unwrap_or_default());
        let replies = if reply.is_empty() { Vec::new() } else { vec![reply.clone()] };
        TurnState::Final(ChatReply::from_model(ReplySource::OpenAi, reply, replies).with_tools(Vec::new()))
    }

    async fn tool_round(&mut self, preliminary: Option<String>, tool_calls: Vec<LlmToolCall>) -> TurnState {
        self.messages
            .push(LlmMessage::assistant_tool_calls(preliminary.clone(), tool_calls.clone()));

        // Em sequência: uma tool pode depender do que a anterior gravou.
        for call in &tool_calls {
            let execution = tools::dispatch(&self.tools, call).await;
            self.messages
                .push(LlmMessage::tool_result(call, execution.outcome.to_json().to_string()));
            self.executions.push(execution);
        }

        if let Some(failure) = guard::failed_update(&self.executions) {
            tracing::warn!(event = "guard_update_failed", agendamento_id = ?failure.id, motivo = %failure.reason);
            return TurnState::Final(ChatReply::direct(failure.message()).with_tools(self.traces()));
        }

        let request = CompletionRequest {
            model: self.settings.synthesis_model.clone(),
            temperature: self.settings.temperature,
            messages: self.messages.clone(),
            tools: Vec::new(),
        };
        let completion = match self.llm.complete(request).await {
            Ok(completion) => completion,
            Err(e) => {
                tracing::warn!(event = "openai_error", round = 2, status = ?e.status_code(), error = %e);
                return TurnState::Final(ChatReply::fallback(SECOND_ROUND_FAILURE));
            }
        };
        let final_text = guard::sanitize_model_reply(completion.content.as_deref().unwrap_or_default());

        if let Some(listing) = guard::unconfirmed_change(self.turn.message, &self.executions, &self.turn.today_label()) {
            tracing::info!(event = "guard_change_unconfirmed");
            return TurnState::Final(ChatReply::direct(listing).with_tools(self.traces()));
        }

        let mut replies = Vec::new();
        if let Some(pre) = preliminary.as_deref().map(str::trim).filter(|p| !p.is_empty() && *p != final_text) {
            replies.push(pre.to_string());
        }
        if !final_text.is_empty() {
            replies.push(final_text.clone());
        }
        TurnState::Final(ChatReply::from_model(ReplySource::OpenAiTools, final_text, replies).with_tools(self.traces()))
    }
}
