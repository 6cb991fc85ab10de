//! Failure-to-response translation.
//!
//! [`Translator::translate`] is the single terminal point for failures
//! reaching the handler boundary. It is total: whatever it receives, it
//! returns a [`Response`] with valid JSON text, and it never panics or
//! returns an error.
//!
//! # Status Policy
//!
//! | Classification                | Status |
//! |-------------------------------|--------|
//! | Unclassified failure          | 500    |
//! | `VerifySignature`             | 401    |
//! | `AwsSqsService`               | 500    |
//! | Any other classified kind     | 500    |
//!
//! # Disclosure
//!
//! The body carries the tracking id and the failure's message. Context and
//! operation go to the [`ErrorSink`] only. Whether unclassified messages are
//! echoed to callers is governed by [`MessagePolicy`].

use crate::request::{AmbientStore, ContextStore};
use crate::response::status;
use crate::{ErrorKind, ErrorSink, Failure, LogRecord, Response, ResponseBody};
use std::error::Error as StdError;

/// Placeholder body message before a failure's own message is applied.
pub const DEFAULT_FALLBACK_MESSAGE: &str = "Something went wrong";

/// Which messages reach the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessagePolicy {
    /// Every failure's message is echoed to the caller.
    #[default]
    Echo,
    /// Unclassified failures show the fallback message instead. The log
    /// still records the real message.
    ConcealUnclassified,
}

/// What to put in `errorTrackingId` when no request id is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingRequestId {
    /// Serialize as `null`.
    #[default]
    Null,
    /// Generate a random UUID v4 for this response.
    Generate,
}

/// Translator settings.
///
/// ```rust
/// use ingress_errors::{MessagePolicy, MissingRequestId, TranslatorConfig};
///
/// let config = TranslatorConfig::default()
///     .message_policy(MessagePolicy::ConcealUnclassified)
///     .missing_request_id(MissingRequestId::Generate);
/// assert_eq!(config.fallback_message, "Something went wrong");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConfig {
    /// Body message used as the template placeholder and for concealed failures.
    pub fallback_message: String,
    /// Disclosure policy for messages.
    pub message_policy: MessagePolicy,
    /// Behavior when the ambient request id is unavailable.
    pub missing_request_id: MissingRequestId,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            fallback_message: String::from(DEFAULT_FALLBACK_MESSAGE),
            message_policy: MessagePolicy::Echo,
            missing_request_id: MissingRequestId::Null,
        }
    }
}

impl TranslatorConfig {
    /// Replace the fallback message.
    pub fn fallback_message(mut self, message: impl Into<String>) -> Self {
        self.fallback_message = message.into();
        self
    }

    /// Replace the message policy.
    pub fn message_policy(mut self, policy: MessagePolicy) -> Self {
        self.message_policy = policy;
        self
    }

    /// Replace the missing request id policy.
    pub fn missing_request_id(mut self, policy: MissingRequestId) -> Self {
        self.missing_request_id = policy;
        self
    }
}

/// Status code for a classified failure.
///
/// Kinds without an explicit mapping fall through to 500.
pub const fn status_for(kind: &ErrorKind) -> u16 {
    match kind {
        // Authentication failure or signature mismatch
        ErrorKind::VerifySignature => status::UNAUTHORIZED,
        // Queue dependency failure, not caller-correctable
        ErrorKind::AwsSqsService => status::INTERNAL_SERVER_ERROR,
        _ => status::INTERNAL_SERVER_ERROR,
    }
}

/// Converts failures into responses and log records.
///
/// Holds the log sink and the ambient context store; both are injected so a
/// translator can be tested in isolation.
#[derive(Debug, Clone)]
pub struct Translator<S, C = AmbientStore> {
    sink: S,
    store: C,
    config: TranslatorConfig,
}

impl<S: ErrorSink> Translator<S> {
    /// Translator reading the ambient request scope, default config.
    pub fn new(sink: S) -> Self {
        Self::with_store(sink, AmbientStore)
    }
}

impl<S: ErrorSink, C: ContextStore> Translator<S, C> {
    /// Translator reading request ids from `store`.
    pub fn with_store(sink: S, store: C) -> Self {
        Self {
            sink,
            store,
            config: TranslatorConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: TranslatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// The sink records are emitted to.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Classify an arbitrary error, then translate it.
    pub fn translate_error(&self, error: &(dyn StdError + 'static)) -> Response {
        self.translate(Failure::classify(error))
    }

    /// Translate one failure.
    ///
    /// Builds the response, emits exactly one record to the sink, and
    /// returns the response. The failure itself is only read.
    pub fn translate<'a>(&self, failure: impl Into<Failure<'a>>) -> Response {
        let failure = failure.into();
        let tracking_id = self.tracking_id();

        let mut body =
            ResponseBody::new(tracking_id.clone(), self.config.fallback_message.as_str());

        let status_code = match failure {
            Failure::Classified(err) => status_for(&err.kind()),
            Failure::Unclassified(_) => status::INTERNAL_SERVER_ERROR,
        };

        let message = failure.message();
        let conceal = matches!(failure, Failure::Unclassified(_))
            && self.config.message_policy == MessagePolicy::ConcealUnclassified;
        if conceal {
            body.push_message(self.config.fallback_message.as_str());
        } else {
            body.push_message(&*message);
        }

        let response = Response::new(status_code, &body);

        let (operation, context) = match failure {
            Failure::Classified(err) => (Some(err.operation()), Some(err.context())),
            Failure::Unclassified(_) => (None, None),
        };
        self.sink.error(&LogRecord {
            message: &message,
            operation,
            context,
            client_response: &response,
            tracking_id: tracking_id.as_deref(),
        });

        response
    }

    fn tracking_id(&self) -> Option<String> {
        let from_store = self
            .store
            .get_store()
            .and_then(|ctx| ctx.aws_request_id().map(str::to_owned));
        match (from_store, self.config.missing_request_id) {
            (Some(id), _) => Some(id),
            (None, MissingRequestId::Null) => None,
            (None, MissingRequestId::Generate) => Some(uuid::Uuid::new_v4().to_string()),
        }
    }
}

/// Translate any failure with a one-off translator over the ambient scope.
///
/// A [`ServiceError`](crate::ServiceError) is classified by downcasting;
/// every other error takes the unclassified path.
pub fn handle_error<S: ErrorSink>(error: &(dyn StdError + 'static), sink: S) -> Response {
    Translator::new(sink).translate_error(error)
}
