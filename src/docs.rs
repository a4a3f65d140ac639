// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Ísis ---
        handlers::chat::chat_proxy,
    ),
    components(
        schemas(
            // --- Request ---
            models::chat::ChatRequest,
            models::chat::HistoryTurn,

            // --- Response ---
            models::chat::ChatReply,
            models::chat::ReplySource,
            models::chat::Strategy,
            models::chat::DebugInfo,
            models::chat::ToolTrace,
        )
    ),
    tags(
        (name = "Ísis", description = "Assistente de agenda das arenas")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

// O token do chamador não é validado aqui: só é repassado ao banco.
impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "caller_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
