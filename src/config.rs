// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::db::{AgendaRepository, AgendaStore};
use crate::services::completion::CompletionSettings;
use crate::services::llm_client::DEFAULT_BASE_URL;
use crate::services::{ChatCompletionClient, ChatService, OpenAiCompatClient};

// A chave pode vir em qualquer um dos dois nomes; o primeiro não vazio vale.
const LLM_KEY_VARS: [&str; 2] = ["ISIS-ADMIN-ARENA", "OPENAI_API_KEY_ISIS_ADMIN"];

/// Configuração lida do ambiente uma única vez, na subida.
#[derive(Clone)]
pub struct Settings {
    pub database_url: String,
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub completion: CompletionSettings,
    pub llm_timeout: Duration,
    pub bind_addr: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = non_empty("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let llm_api_key = LLM_KEY_VARS.iter().find_map(|key| non_empty(*key));

        let defaults = CompletionSettings::default();
        let temperature: f32 = match non_empty("ISIS_TEMPERATURE") {
            Some(raw) => raw.parse().with_context(|| format!("ISIS_TEMPERATURE inválida: {raw}"))?,
            None => defaults.temperature,
        };
        let timeout_secs: u64 = match non_empty("ISIS_LLM_TIMEOUT_SECS") {
            Some(raw) => raw.parse().with_context(|| format!("ISIS_LLM_TIMEOUT_SECS inválido: {raw}"))?,
            None => 60,
        };

        Ok(Self {
            database_url,
            llm_api_key,
            llm_base_url: non_empty("ISIS_LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            completion: CompletionSettings {
                model: non_empty("ISIS_MODEL").unwrap_or(defaults.model),
                synthesis_model: non_empty("ISIS_SYNTHESIS_MODEL").unwrap_or(defaults.synthesis_model),
                temperature,
            },
            llm_timeout: Duration::from_secs(timeout_secs),
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub chat_service: ChatService,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let store: Arc<dyn AgendaStore> = Arc::new(AgendaRepository::new(db_pool));

        let llm: Option<Arc<dyn ChatCompletionClient>> = match &settings.llm_api_key {
            Some(key) => {
                let client = OpenAiCompatClient::new(key.clone(), settings.llm_base_url.clone(), settings.llm_timeout)?;
                Some(Arc::new(client))
            }
            None => {
                tracing::warn!("Nenhuma chave de LLM configurada: o chat vai responder \"backend não configurado\"");
                None
            }
        };

        Ok(Self {
            chat_service: ChatService::new(store, llm, settings.completion.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let s = settings(&[("DATABASE_URL", "postgres://localhost/isis")]).unwrap();
        assert_eq!(s.llm_api_key, None);
        assert_eq!(s.llm_base_url, DEFAULT_BASE_URL);
        assert_eq!(s.completion, CompletionSettings::default());
        assert_eq!(s.llm_timeout, Duration::from_secs(60));
        assert_eq!(s.bind_addr, "0.0.0.0:3000");
    }

    #[test]
    fn first_non_empty_key_wins() {
        let s = settings(&[
            ("DATABASE_URL", "postgres://localhost/isis"),
            ("ISIS-ADMIN-ARENA", "  "),
            ("OPENAI_API_KEY_ISIS_ADMIN", "sk-segunda"),
        ])
        .unwrap();
        assert_eq!(s.llm_api_key.as_deref(), Some("sk-segunda"));

        let s = settings(&[
            ("DATABASE_URL", "postgres://localhost/isis"),
            ("ISIS-ADMIN-ARENA", "sk-primeira"),
            ("OPENAI_API_KEY_ISIS_ADMIN", "sk-segunda"),
        ])
        .unwrap();
        assert_eq!(s.llm_api_key.as_deref(), Some("sk-primeira"));
    }

    #[test]
    fn missing_database_or_bad_numbers_fail() {
        assert!(settings(&[]).is_err());
        assert!(settings(&[("DATABASE_URL", "x"), ("ISIS_TEMPERATURE", "quente")]).is_err());

        let s = settings(&[("DATABASE_URL", "x"), ("ISIS_TEMPERATURE", "0.1"), ("ISIS_MODEL", "gpt-x")]).unwrap();
        assert_eq!(s.completion.temperature, 0.1);
        assert_eq!(s.completion.model, "gpt-x");
    }
}
