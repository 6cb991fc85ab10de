//! The externally visible result of translation.
//!
//! A [`Response`] is what the transport sends back: a status code and a body
//! that is always JSON *text*, never a structured value. The body shape is
//! fixed by [`ResponseBody`]:
//!
//! ```json
//! {"errorTrackingId":"req-42","message":"queue down","errors":["queue down"]}
//! ```
//!
//! Key order is part of the contract and follows field declaration order.

use serde::Serialize;
use smallvec::SmallVec;

/// Status codes the translator can produce.
pub mod status {
    /// Caller-correctable authentication failure.
    pub const UNAUTHORIZED: u16 = 401;
    /// Everything else.
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}

/// Body emitted when serialization of the real body fails.
///
/// Serializing strings cannot fail in practice; this keeps the "always valid
/// JSON" guarantee without a panic path.
const FALLBACK_BODY: &str = r#"{"errorTrackingId":null,"message":"Something went wrong","errors":[]}"#;

/// Public-safe response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseBody {
    /// Ambient request id; `null` when none was available.
    pub error_tracking_id: Option<String>,
    /// Message shown to the caller.
    pub message: String,
    /// Messages shown to the caller. One entry today.
    pub errors: SmallVec<[String; 1]>,
}

impl ResponseBody {
    /// Body template before a failure's message is applied.
    pub fn new(error_tracking_id: Option<String>, placeholder: impl Into<String>) -> Self {
        Self {
            error_tracking_id,
            message: placeholder.into(),
            errors: SmallVec::new(),
        }
    }

    /// Set `message` and append it to `errors`.
    pub fn push_message(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.errors.push(message.clone());
        self.message = message;
    }

    /// Serialize to the JSON text carried in [`Response::body`].
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from(FALLBACK_BODY))
    }
}

/// Status code plus serialized JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Serialized [`ResponseBody`].
    pub body: String,
}

impl Response {
    /// Build a response from a status and a body.
    pub fn new(status_code: u16, body: &ResponseBody) -> Self {
        Self {
            status_code,
            body: body.to_json(),
        }
    }
}
