//! Request ids: assigned at the edge, echoed to the caller, and forwarded to
//! the completion API so one review can be followed across both logs.

use axum::http::{HeaderMap, HeaderName, Request};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Longest caller-supplied id that is trusted for logging and forwarding.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Generates a v4 UUID for requests that arrive without an id.
#[derive(Clone, Copy, Default)]
pub struct ReviewRequestId;

impl MakeRequestId for ReviewRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        Uuid::new_v4().to_string().parse().ok().map(RequestId::new)
    }
}

/// Layers that set the id on the way in and copy it onto the response.
pub fn request_id_layer() -> (SetRequestIdLayer<ReviewRequestId>, PropagateRequestIdLayer) {
    let header_name = HeaderName::from_static(X_REQUEST_ID);

    (
        SetRequestIdLayer::new(header_name.clone(), ReviewRequestId),
        PropagateRequestIdLayer::new(header_name),
    )
}

pub trait RequestIdExt {
    /// The request id, if it is short printable ASCII.
    fn request_id(&self) -> Option<&str>;

    /// Same as [`RequestIdExt::request_id`], with `-` standing in for a missing id.
    fn log_request_id(&self) -> &str {
        self.request_id().unwrap_or("-")
    }
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> Option<&str> {
        let id = self.get(X_REQUEST_ID)?.to_str().ok()?;
        (!id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN).then_some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn echo_app() -> Router {
        let (set_request_id, propagate_request_id) = request_id_layer();
        Router::new()
            .route(
                "/",
                get(|headers: HeaderMap| async move { headers.log_request_id().to_string() }),
            )
            .layer(propagate_request_id)
            .layer(set_request_id)
    }

    #[tokio::test]
    async fn missing_id_is_generated_and_echoed() {
        let response = echo_app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let echoed = response.headers()[X_REQUEST_ID].to_str().unwrap();
        assert!(Uuid::parse_str(echoed).is_ok());
    }

    #[tokio::test]
    async fn caller_id_is_kept() {
        let request = Request::get("/")
            .header(X_REQUEST_ID, "review-7")
            .body(Body::empty())
            .unwrap();

        let response = echo_app().oneshot(request).await.unwrap();

        assert_eq!(response.headers()[X_REQUEST_ID], "review-7");
    }

    #[test]
    fn overlong_or_missing_ids_are_not_trusted() {
        let mut headers = HeaderMap::new();
        assert_eq!(headers.log_request_id(), "-");

        headers.insert(X_REQUEST_ID, "a".repeat(MAX_REQUEST_ID_LEN + 1).parse().unwrap());
        assert_eq!(headers.request_id(), None);
        assert_eq!(headers.log_request_id(), "-");

        headers.insert(X_REQUEST_ID, "review-7".parse().unwrap());
        assert_eq!(headers.log_request_id(), "review-7");
    }
}
