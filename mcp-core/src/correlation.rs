use axum::body::Body;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::NeedsRequestId;

pub const HEADER_NAME: &str = "x-request-id";

/// Request-scoped correlation id, attached as an extension by
/// [`correlation_id_layer`] and read back out by handlers and the error
/// pipeline so every log line and error envelope can be tied to one request.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Middleware that honors an inbound `X-Request-Id` if present and otherwise
/// mints a new uuid v4, stashing it as a request extension and echoing it
/// back on the response.
pub async fn correlation_id_layer(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    req.extensions_mut().insert(RequestId(id.clone()));

    let span = tracing::info_span!("request", request_id = %id);
    let _enter = span.enter();

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(HEADER_NAME, value);
    }

    if response.extensions().get::<NeedsRequestId>().is_some() {
        response = rewrite_request_id(response, &id).await;
    }

    response
}

/// Error bodies are rendered before the correlation id is known (see
/// [`crate::error::NeedsRequestId`]); patch the placeholder back in here,
/// the one place in the pipeline that both sees the real id and the body.
async fn rewrite_request_id(response: Response, id: &str) -> Response {
    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, 1024 * 1024).await {
        Ok(b) => b,
        Err(_) => return Response::from_parts(parts, Body::empty()),
    };
    let patched = match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(mut value) => {
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    "request_id".to_string(),
                    serde_json::Value::String(id.to_string()),
                );
            }
            serde_json::to_vec(&value).unwrap_or_else(|_| bytes.to_vec())
        }
        Err(_) => bytes.to_vec(),
    };
    Response::from_parts(parts, Body::from(patched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    async fn handler(req: Request) -> &'static str {
        assert!(req.extensions().get::<RequestId>().is_some());
        "ok"
    }

    #[tokio::test]
    async fn mints_id_when_absent() {
        let app = Router::new()
            .route("/", get(handler))
            .layer(axum::middleware::from_fn(correlation_id_layer));
        let res = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(res.headers().contains_key(HEADER_NAME));
    }

    #[tokio::test]
    async fn echoes_inbound_id() {
        let app = Router::new()
            .route("/", get(handler))
            .layer(axum::middleware::from_fn(correlation_id_layer));
        let res = app
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(HEADER_NAME, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.headers().get(HEADER_NAME).unwrap(), "abc-123");
    }
}
