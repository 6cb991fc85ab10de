//! # Ingress Errors
//!
//! Error taxonomy and failure-to-response translation for request handlers.
//!
//! ## Design Philosophy
//!
//! 1. **Every failure ends in one place**: a single translator turns it into a response
//! 2. **Responses are stable**: status code plus a JSON body with a fixed shape
//! 3. **Logs carry everything**: message, operation, context and the response sent
//! 4. **Bodies carry nothing internal**: context and operation never leave the log
//! 5. **Every response is traceable**: the ambient request id is always attached
//!
//! ## Taxonomy
//!
//! A [`ServiceError`] is a classified failure. It carries an [`ErrorKind`]
//! discriminator fixed at construction, a message, a [`DiagnosticContext`]
//! and an operation label. Context and operation are decorated as the error
//! propagates upward:
//!
//! ```rust
//! use ingress_errors::{ErrorKind, ServiceError, diagnostic_context};
//!
//! let err = ServiceError::aws_sqs_service("queue down")
//!     .set_context(diagnostic_context! { "retries" => 3 })
//!     .set_operation("consumer/process");
//!
//! assert_eq!(err.kind(), ErrorKind::AwsSqsService);
//! assert_eq!(err.operation(), "consumer/process");
//! ```
//!
//! Anything else implementing [`std::error::Error`] is an unclassified
//! failure and is translated with the default policy.
//!
//! ## Translation
//!
//! ```rust
//! use ingress_errors::{
//!     RequestContext, RingBufferSink, ServiceError, Translator, request,
//! };
//!
//! let sink = RingBufferSink::new(16, 2048);
//! let translator = Translator::new(sink.clone());
//!
//! let response = request::scope(RequestContext::new("req-7"), || {
//!     translator.translate(&ServiceError::verify_signature("bad sig"))
//! });
//!
//! assert_eq!(response.status_code, 401);
//! assert_eq!(
//!     response.body,
//!     r#"{"errorTrackingId":"req-7","message":"bad sig","errors":["bad sig"]}"#
//! );
//! assert_eq!(sink.len(), 1);
//! ```
//!
//! ## Features
//!
//! - `tokio` (default): task-local request scopes for async handlers
//! - `trusted_debug`: human-readable log record formatting (debug builds only)

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::result;
use zeroize::Zeroize;

pub mod context;
pub mod convenience;
pub mod kinds;
pub mod logging;
pub mod request;
pub mod response;
pub mod ring_buffer;
pub mod translator;

pub use context::*;
pub use kinds::*;
pub use logging::*;
pub use request::{AmbientStore, ContextStore, RequestContext};
pub use response::*;
pub use ring_buffer::*;
pub use translator::*;

/// Type alias for Results produced by this crate's own fallible APIs.
pub type Result<T> = result::Result<T, ContextError>;

/// Classified failure carrying operation and context metadata.
///
/// # Key Properties
///
/// - The [`ErrorKind`] is set once at construction and never changes
/// - `set_context` and `set_operation` replace wholesale and chain; last call wins
/// - Context and operation default to empty
/// - Owned strings are zeroized on drop
/// - `Debug` redacts the context; `Display` writes the message only
///
/// The message is treated as safe to disclose. Context and operation are
/// internal and only ever reach the log sink.
#[must_use = "errors should be translated or propagated"]
pub struct ServiceError {
    kind: ErrorKind,
    message: Cow<'static, str>,
    context: DiagnosticContext,
    operation: Cow<'static, str>,
}

impl ServiceError {
    /// Create an error of the given kind.
    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: DiagnosticContext::new(),
            operation: Cow::Borrowed(""),
        }
    }

    /// Create a generic classified error.
    #[inline]
    pub fn common(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Common, message)
    }

    /// Create a signature-verification failure.
    #[inline]
    pub fn verify_signature(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::VerifySignature, message)
    }

    /// Create a queue-service failure.
    #[inline]
    pub fn aws_sqs_service(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::AwsSqsService, message)
    }

    /// Create an error of a downstream-defined kind.
    #[inline]
    pub fn custom(name: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Custom(name), message)
    }

    /// Replace the diagnostic context.
    ///
    /// The previous context is dropped (and zeroized), not merged.
    #[inline]
    pub fn set_context(mut self, context: impl Into<DiagnosticContext>) -> Self {
        self.context = context.into();
        self
    }

    /// Replace the operation label.
    #[inline]
    pub fn set_operation(mut self, operation: impl Into<Cow<'static, str>>) -> Self {
        if let Cow::Owned(ref mut previous) = self.operation {
            previous.zeroize();
        }
        self.operation = operation.into();
        self
    }

    /// Add a single context entry, keeping the others.
    ///
    /// Values that fail to serialize are skipped.
    #[inline]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl serde::Serialize) -> Self {
        self.context.insert(key, value);
        self
    }

    /// Variant discriminator.
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human-readable message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Diagnostic context, empty unless set.
    #[inline]
    pub const fn context(&self) -> &DiagnosticContext {
        &self.context
    }

    /// Operation label, empty unless set.
    #[inline]
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Drop for ServiceError {
    fn drop(&mut self) {
        if let Cow::Owned(ref mut s) = self.message {
            s.zeroize();
        }
        if let Cow::Owned(ref mut s) = self.operation {
            s.zeroize();
        }
        // context zeroizes itself
    }
}

impl fmt::Debug for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("operation", &self.operation)
            .field("context", &self.context)
            .finish()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for ServiceError {}

/// A failure as seen by the translator.
///
/// Classification is by capability: anything that downcasts to
/// [`ServiceError`] is classified, everything else is not.
#[derive(Debug, Clone, Copy)]
pub enum Failure<'a> {
    /// A taxonomy error with kind, context and operation.
    Classified(&'a ServiceError),
    /// Any other error. Only its message is known.
    Unclassified(&'a (dyn StdError + 'a)),
}

impl<'a> Failure<'a> {
    /// Classify an arbitrary error by downcasting.
    #[inline]
    pub fn classify(error: &'a (dyn StdError + 'static)) -> Self {
        match error.downcast_ref::<ServiceError>() {
            Some(classified) => Self::Classified(classified),
            None => Self::Unclassified(error),
        }
    }

    /// Kind of a classified failure, `None` otherwise.
    #[inline]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Classified(err) => Some(err.kind()),
            Self::Unclassified(_) => None,
        }
    }

    /// Message text of the failure.
    pub fn message(&self) -> Cow<'a, str> {
        match *self {
            Self::Classified(err) => Cow::Borrowed(err.message()),
            Self::Unclassified(err) => Cow::Owned(err.to_string()),
        }
    }

    /// True when the failure is a taxonomy error.
    #[inline]
    pub const fn is_classified(&self) -> bool {
        matches!(self, Self::Classified(_))
    }
}

impl<'a> From<&'a ServiceError> for Failure<'a> {
    fn from(error: &'a ServiceError) -> Self {
        Self::Classified(error)
    }
}
