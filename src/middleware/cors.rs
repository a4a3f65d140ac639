// src/middleware/cors.rs

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

pub const SOURCE_HEADER: &str = "x-isis-source";
pub const DURATION_HEADER: &str = "x-isis-duration-ms";

const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-headers", "authorization, x-client-info, apikey, content-type"),
    ("access-control-allow-methods", "POST, OPTIONS"),
    ("access-control-expose-headers", "x-isis-source, x-isis-duration-ms"),
];

// O front chama direto do navegador: toda resposta leva os headers, inclusive 400/405.
pub async fn cors_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    response
}
