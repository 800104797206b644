//! Uniform JSON response envelope.
//!
//! Every handler result leaves the server as a [`ResponseResource`]:
//!
//! ```json
//! {"code":200,"data":{"id":1}}
//! {"code":404,"error":"not found"}
//! ```
//!
//! `code` mirrors the HTTP status. `error` and `data` are omitted when
//! empty. Handlers that return `(data, status, error)` are adapted to the
//! router's [`Handler`] trait with [`envelope`].
//!
//! # Example
//!
//! ```rust
//! use http::StatusCode;
//! use serde_json::json;
//! use wicket_server::{envelope, Router};
//!
//! let mut router = Router::new();
//! router.get(
//!     "/items/{id}",
//!     envelope(|_req| async { (Some(json!({"id": 1})), StatusCode::OK, None::<String>) }),
//! );
//! ```

use std::fmt::Display;
use std::future::Future;

use bytes::Bytes;
use http::{header, Response, StatusCode};
use http_body_util::Full;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ResponseError;
use crate::router::{Handler, HandlerResult, HttpRequest};

/// Content type of every enveloped response.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// The JSON body written for every enveloped response.
///
/// Field order on the wire is `code`, `error`, `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseResource<T = Value> {
    /// HTTP status written with the response.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub code: u16,

    /// Error message, present only when the operation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Payload, present only when the handler supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(code: &u16) -> bool {
    *code == 0
}

impl ResponseResource {
    /// Builds the envelope for a handler outcome.
    ///
    /// A payload that serializes to JSON `null` and an error whose message
    /// is empty are both treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::Serialize`] if the payload cannot be
    /// represented as JSON.
    pub fn from_outcome<T, E>(
        status: StatusCode,
        data: Option<T>,
        error: Option<E>,
    ) -> Result<Self, ResponseError>
    where
        T: Serialize,
        E: Display,
    {
        let data = data
            .map(serde_json::to_value)
            .transpose()?
            .filter(|value| !value.is_null());
        let error = error
            .map(|err| err.to_string())
            .filter(|message| !message.is_empty());

        Ok(Self {
            code: status.as_u16(),
            error,
            data,
        })
    }
}

/// Writes `body` as a JSON response with the given status.
///
/// # Errors
///
/// Returns a [`ResponseError`] if the body cannot be serialized or the
/// response head cannot be built.
pub fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> HandlerResult {
    let body = serde_json::to_vec(body)?;
    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(Full::new(Bytes::from(body)))?;
    Ok(response)
}

/// Renders a handler outcome as an enveloped response.
///
/// # Errors
///
/// See [`json_response`].
pub fn respond<T, E>(status: StatusCode, data: Option<T>, error: Option<E>) -> HandlerResult
where
    T: Serialize,
    E: Display,
{
    let resource = ResponseResource::from_outcome(status, data, error)?;
    json_response(status, &resource)
}

/// Adapts a `(data, status, error)` handler to the router's [`Handler`].
///
/// The adapter runs the handler once per request and writes its outcome
/// as a [`ResponseResource`]. It keeps no state between calls.
pub fn envelope<F, Fut, T, E>(handler: F) -> impl Handler
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (Option<T>, StatusCode, Option<E>)> + Send + 'static,
    T: Serialize + Send + 'static,
    E: Display + Send + 'static,
{
    move |req: HttpRequest| {
        let outcome = handler(req);
        async move {
            let (data, status, error) = outcome.await;
            respond(status, data, error)
        }
    }
}

/// Builds a `{"code": ..., "message": ...}` acknowledgement object.
///
/// # Example
///
/// ```rust
/// use http::StatusCode;
/// use wicket_server::response_message;
///
/// let body = response_message(StatusCode::ACCEPTED, "queued");
/// assert_eq!(body.to_string(), r#"{"code":202,"message":"queued"}"#);
/// ```
pub fn response_message(status: StatusCode, message: impl Into<String>) -> Value {
    json!({
        "code": status.as_u16(),
        "message": message.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;
    use http_body_util::BodyExt;
    use serde::ser::Error as _;

    async fn body_string(response: crate::HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn request() -> HttpRequest {
        Request::new(Bytes::new())
    }

    #[derive(Serialize)]
    struct Item {
        id: u32,
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    #[tokio::test]
    async fn test_envelope_with_data() {
        let handler = envelope(|_req| async { (Some(Item { id: 1 }), StatusCode::OK, None::<&str>) });

        let response = handler.call(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
        assert_eq!(body_string(response).await, r#"{"code":200,"data":{"id":1}}"#);
    }

    #[tokio::test]
    async fn test_envelope_with_error() {
        let handler =
            envelope(|_req| async { (None::<Item>, StatusCode::NOT_FOUND, Some("not found")) });

        let response = handler.call(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_string(response).await,
            r#"{"code":404,"error":"not found"}"#
        );
    }

    #[tokio::test]
    async fn test_envelope_keeps_data_alongside_error() {
        let handler = envelope(|_req| async {
            (
                Some(json!({"partial": true})),
                StatusCode::INTERNAL_SERVER_ERROR,
                Some(std::io::Error::other("backend unavailable")),
            )
        });

        let response = handler.call(request()).await.unwrap();
        assert_eq!(
            body_string(response).await,
            r#"{"code":500,"error":"backend unavailable","data":{"partial":true}}"#
        );
    }

    #[tokio::test]
    async fn test_envelope_omits_empty_fields() {
        let handler = envelope(|_req| async { (Some(Value::Null), StatusCode::NO_CONTENT, Some("")) });

        let response = handler.call(request()).await.unwrap();
        assert_eq!(body_string(response).await, r#"{"code":204}"#);
    }

    #[tokio::test]
    async fn test_envelope_is_idempotent() {
        let handler = envelope(|_req| async {
            (Some(json!({"b": 2, "a": 1})), StatusCode::CREATED, None::<String>)
        });

        let first = body_string(handler.call(request()).await.unwrap()).await;
        let second = body_string(handler.call(request()).await.unwrap()).await;
        assert_eq!(first, second);
        assert_eq!(first, r#"{"code":201,"data":{"b":2,"a":1}}"#);
    }

    #[tokio::test]
    async fn test_envelope_serialization_failure_is_an_error() {
        let handler = envelope(|_req| async { (Some(Unserializable), StatusCode::OK, None::<String>) });

        let result = handler.call(request()).await;
        assert!(matches!(result, Err(ResponseError::Serialize(_))));
    }

    #[test]
    fn test_response_resource_round_trip() {
        let parsed: ResponseResource =
            serde_json::from_str(r#"{"code":404,"error":"not found"}"#).unwrap();
        assert_eq!(parsed.code, 404);
        assert_eq!(parsed.error.as_deref(), Some("not found"));
        assert!(parsed.data.is_none());
    }

    #[test]
    fn test_response_message() {
        let body = response_message(StatusCode::OK, "done");
        assert_eq!(body["code"], 200);
        assert_eq!(body["message"], "done");
        assert_eq!(body.to_string(), r#"{"code":200,"message":"done"}"#);
    }
}
