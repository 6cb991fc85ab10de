//! Structured log records and the sinks that receive them.
//!
//! # Record Shape
//!
//! A [`LogRecord`] serializes as
//!
//! ```json
//! {"message":"queue down","operation":"consumer/process","context":{"retries":3},
//!  "clientResponse":{"statusCode":500,"body":"..."}}
//! ```
//!
//! `operation` and `context` are present only for classified failures. For
//! an unclassified failure they are absent, not empty, so "no metadata
//! available" stays distinguishable from "no metadata supplied".
//!
//! # Lifetime
//!
//! The record borrows from the error and the response with an explicit
//! lifetime. A sink must consume it during [`ErrorSink::error`]; it cannot
//! be retained past the translation that produced it. Sinks that keep
//! history (such as [`RingBufferSink`](crate::RingBufferSink)) copy out
//! bounded, owned fields.

use crate::{DiagnosticContext, Response};
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Maximum length for any individual field in formatted output (DoS prevention)
const MAX_FIELD_OUTPUT_LEN: usize = 1024;

/// Truncation indicator appended to truncated strings
const TRUNCATION_INDICATOR: &str = "...[TRUNCATED]";

/// Diagnostic record for one translated failure.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord<'a> {
    /// The failure's message.
    pub message: &'a str,
    /// Operation label; `None` for unclassified failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<&'a str>,
    /// Diagnostic context; `None` for unclassified failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<&'a DiagnosticContext>,
    /// The response returned to the caller.
    pub client_response: &'a Response,
    /// Tracking id placed in the response body. Indexing aid for sinks.
    #[serde(skip)]
    pub tracking_id: Option<&'a str>,
}

impl<'a> LogRecord<'a> {
    /// Format for human-readable logs in trusted debug contexts.
    ///
    /// WARNING: This materializes context values into a String. Only
    /// available with BOTH the `trusted_debug` feature AND debug assertions.
    #[cfg(all(feature = "trusted_debug", debug_assertions))]
    pub fn format_for_trusted_debug(&self) -> String {
        let mut output = format!(
            "[{}] tracking_id='{}' message='{}'",
            self.client_response.status_code,
            self.tracking_id.unwrap_or("<none>"),
            self.message
        );
        if let Some(operation) = self.operation {
            output.push_str(&format!(" operation='{}'", operation));
        }
        if let Some(context) = self.context {
            output.push_str(&format!(" context={}", context.to_json_string()));
        }
        output.push_str(&format!(" body={}", self.client_response.body));
        output
    }

    /// Write a bounded one-line rendering without intermediate allocation
    /// for short fields.
    ///
    /// ```rust
    /// # use ingress_errors::{LogRecord, Response, ResponseBody};
    /// let body = ResponseBody::new(Some("req-1".into()), "boom");
    /// let response = Response::new(500, &body);
    /// let record = LogRecord {
    ///     message: "boom",
    ///     operation: None,
    ///     context: None,
    ///     client_response: &response,
    ///     tracking_id: Some("req-1"),
    /// };
    /// let mut line = String::new();
    /// record.write_to(&mut line).unwrap();
    /// assert_eq!(line, "[500] tracking_id='req-1' message='boom'");
    /// ```
    pub fn write_to(&self, f: &mut impl fmt::Write) -> fmt::Result {
        write!(
            f,
            "[{}] tracking_id='{}' message='{}'",
            self.client_response.status_code,
            self.tracking_id.unwrap_or("<none>"),
            truncate_with_indicator(self.message)
        )?;

        if let Some(operation) = self.operation {
            write!(f, " operation='{}'", truncate_with_indicator(operation))?;
        }

        if let Some(context) = self.context {
            let json = context.to_json_string();
            write!(f, " context={}", truncate_with_indicator(&json))?;
        }

        Ok(())
    }

    /// True when the record came from a classified failure.
    #[inline]
    pub const fn is_classified(&self) -> bool {
        self.operation.is_some()
    }
}

/// Receiver of log records.
///
/// Emission is fire-and-forget: the translator neither waits on nor observes
/// the outcome. Sinks must not panic.
pub trait ErrorSink {
    /// Consume one record.
    fn error(&self, record: &LogRecord<'_>);
}

impl<T: ErrorSink + ?Sized> ErrorSink for &T {
    #[inline]
    fn error(&self, record: &LogRecord<'_>) {
        (**self).error(record)
    }
}

impl<T: ErrorSink + ?Sized> ErrorSink for Arc<T> {
    #[inline]
    fn error(&self, record: &LogRecord<'_>) {
        (**self).error(record)
    }
}

impl<T: ErrorSink + ?Sized> ErrorSink for Box<T> {
    #[inline]
    fn error(&self, record: &LogRecord<'_>) {
        (**self).error(record)
    }
}

/// Adapts a closure into a sink.
///
/// ```rust
/// # use ingress_errors::{FnSink, ServiceError, Translator};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let seen = AtomicUsize::new(0);
/// let translator = Translator::new(FnSink::new(|_record| {
///     seen.fetch_add(1, Ordering::Relaxed);
/// }));
/// translator.translate(&ServiceError::common("boom"));
/// assert_eq!(seen.load(Ordering::Relaxed), 1);
/// ```
pub struct FnSink<F>(pub F);

impl<F> FnSink<F>
where
    F: Fn(&LogRecord<'_>),
{
    /// Wrap a closure.
    #[inline]
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> ErrorSink for FnSink<F>
where
    F: Fn(&LogRecord<'_>),
{
    #[inline]
    fn error(&self, record: &LogRecord<'_>) {
        (self.0)(record)
    }
}

impl<F> fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnSink(..)")
    }
}

/// Emits one `tracing` ERROR event per record under target `ingress_errors`.
///
/// Unclassified records carry no `operation`/`context` fields at all. Fields
/// are emitted in full unless a limit is set with
/// [`with_field_limit`](Self::with_field_limit), so the logged `client_body`
/// is byte-for-byte the body returned to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    field_limit: Option<usize>,
}

impl TracingSink {
    /// Sink that emits every field untruncated.
    #[inline]
    pub const fn new() -> Self {
        Self { field_limit: None }
    }

    /// Cap each string field at `limit` bytes, marking cuts with
    /// `...[TRUNCATED]`. Guards log pipelines against flooding at the cost
    /// of diagnostic detail.
    #[inline]
    pub const fn with_field_limit(limit: usize) -> Self {
        Self {
            field_limit: Some(limit),
        }
    }

    /// Configured per-field limit, `None` when unbounded.
    #[inline]
    pub const fn field_limit(&self) -> Option<usize> {
        self.field_limit
    }

    #[inline]
    fn bound<'s>(&self, s: &'s str) -> Cow<'s, str> {
        match self.field_limit {
            Some(limit) => truncate_to_limit(s, limit),
            None => Cow::Borrowed(s),
        }
    }
}

impl ErrorSink for TracingSink {
    fn error(&self, record: &LogRecord<'_>) {
        let status_code = record.client_response.status_code;
        let tracking_id = record.tracking_id;
        let message = self.bound(record.message);
        let client_body = self.bound(&record.client_response.body);

        match (record.operation, record.context) {
            (Some(operation), Some(context)) => {
                let context = context.to_json_string();
                tracing::error!(
                    target: "ingress_errors",
                    error_message = %message,
                    operation = %self.bound(operation),
                    context = %self.bound(&context),
                    status_code,
                    tracking_id,
                    client_body = %client_body,
                    "request failed"
                );
            }
            _ => {
                tracing::error!(
                    target: "ingress_errors",
                    error_message = %message,
                    status_code,
                    tracking_id,
                    client_body = %client_body,
                    "request failed"
                );
            }
        }
    }
}

/// Truncate a string for display to prevent DoS via extremely long error messages.
///
/// If the string exceeds MAX_FIELD_OUTPUT_LEN, it's truncated with an indicator
/// to make the truncation visible to operators.
///
/// Returns a Cow<str> to avoid allocation when no truncation is needed.
#[inline]
pub(crate) fn truncate_with_indicator(s: &str) -> Cow<'_, str> {
    truncate_to_limit(s, MAX_FIELD_OUTPUT_LEN)
}

fn truncate_to_limit(s: &str, limit: usize) -> Cow<'_, str> {
    if s.len() <= limit {
        return Cow::Borrowed(s);
    }

    let max_content_len = limit.saturating_sub(TRUNCATION_INDICATOR.len());

    let mut idx = max_content_len;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }

    if idx == 0 {
        return Cow::Borrowed(TRUNCATION_INDICATOR);
    }

    let mut result = String::with_capacity(idx + TRUNCATION_INDICATOR.len());
    result.push_str(&s[..idx]);
    result.push_str(TRUNCATION_INDICATOR);
    Cow::Owned(result)
}
