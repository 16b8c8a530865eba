//! Request-id propagation.
//!
//! Every request carries an `x-request-id`; callers may supply their own,
//! otherwise one is minted here. The id is echoed on the response so log
//! lines on both sides of the wire correlate.

use axum::extract::Request;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The request id carried by `headers`, or `"-"` when absent or unreadable.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
}

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = match req
        .headers()
        .get(REQUEST_ID_HEADER)
        .filter(|value| !value.is_empty())
    {
        Some(value) => value.clone(),
        None => match HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            Ok(value) => {
                req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
                value
            }
            Err(_) => return next.run(req).await,
        },
    };

    let mut response = next.run(req).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_reads_the_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("abc-123"));
        assert_eq!(request_id(&headers), "abc-123");
    }

    #[test]
    fn request_id_falls_back_when_missing() {
        assert_eq!(request_id(&HeaderMap::new()), "-");
    }
}
