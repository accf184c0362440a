use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Reuses the caller's `x-request-id` or assigns a fresh UUID, and echoes
/// it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let existing = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|value| !value.is_empty())
        .cloned();

    let request_id = match existing {
        Some(value) => value,
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            req.headers_mut()
                .insert(REQUEST_ID_HEADER, generated.clone());
            generated
        }
    };

    let mut response = next.run(req).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}
