pub mod phrases;
pub mod intents;
pub mod formatting;
pub mod llm_client;
pub use llm_client::{ChatCompletionClient, OpenAiCompatClient};
pub mod prompt;
pub mod tools;
pub mod interceptors;
pub mod quota_fallback;
pub mod guard;
pub mod completion;
pub mod chat_service;
pub use chat_service::ChatService;
