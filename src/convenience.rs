//! Convenience macros for building errors and diagnostic context.
//!
//! # Usage
//!
//! ```rust
//! use ingress_errors::{ErrorKind, diagnostic_context, service_err};
//!
//! let queue = "ingest-events";
//! let err = service_err!(AwsSqsService, "send to {} failed", queue)
//!     .set_context(diagnostic_context! { "retries" => 3, "queue" => queue })
//!     .set_operation("services/sqs-service");
//!
//! assert_eq!(err.kind(), ErrorKind::AwsSqsService);
//! assert_eq!(err.message(), "send to ingest-events failed");
//! ```
//!
//! ## Sanitization
//!
//! Messages are echoed to callers, so format arguments passed to
//! `service_err!` go through [`sanitize`] first: control characters become
//! `?`, ANSI escape sequences are dropped and the result is bounded to
//! [`MAX_SANITIZED_LEN`] bytes.

use std::fmt::Display;

/// Maximum length in bytes of one sanitized format argument.
pub const MAX_SANITIZED_LEN: usize = 256;

const TRUNCATED: &str = "...[TRUNCATED]";

/// Render `value` for inclusion in an error message.
///
/// ```rust
/// # use ingress_errors::convenience::sanitize;
/// assert_eq!(sanitize("line\nbreak"), "line?break");
/// assert!(sanitize("A".repeat(300)).ends_with("...[TRUNCATED]"));
/// ```
pub fn sanitize(value: impl Display) -> String {
    let original = value.to_string();
    let mut out = String::with_capacity(original.len().min(MAX_SANITIZED_LEN));
    let mut in_escape = false;
    let mut truncated = false;

    for c in original.chars() {
        if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
            continue;
        }
        if c == '\u{1b}' {
            in_escape = true;
            continue;
        }

        let c = if c.is_control() { '?' } else { c };
        if out.len() + c.len_utf8() > MAX_SANITIZED_LEN {
            truncated = true;
            break;
        }
        out.push(c);
    }

    if truncated {
        let mut cut = MAX_SANITIZED_LEN - TRUNCATED.len();
        while cut > 0 && !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
        out.push_str(TRUNCATED);
    }
    out
}

/// Sanitize any `Display` value. See [`sanitize`].
#[macro_export]
macro_rules! sanitized {
    ($expr:expr) => {
        $crate::convenience::sanitize(&$expr)
    };
}

/// Build a [`DiagnosticContext`](crate::DiagnosticContext) from key/value pairs.
///
/// Keys must be string literals; values are anything `Serialize`.
///
/// ```rust
/// # use ingress_errors::diagnostic_context;
/// let ctx = diagnostic_context! { "a" => "a", "b" => 2 };
/// assert_eq!(ctx.len(), 2);
/// assert!(diagnostic_context! {}.is_empty());
/// ```
#[macro_export]
macro_rules! diagnostic_context {
    () => {
        $crate::DiagnosticContext::new()
    };
    ($($key:literal => $value:expr),+ $(,)?) => {{
        let mut ctx = $crate::DiagnosticContext::new();
        $( ctx.insert($key, $value); )+
        ctx
    }};
}

/// Build a [`ServiceError`](crate::ServiceError) of a built-in kind.
///
/// Format arguments are sanitized before interpolation.
#[macro_export]
macro_rules! service_err {
    ($kind:ident, $msg:literal) => {
        $crate::ServiceError::new($crate::ErrorKind::$kind, $msg)
    };
    ($kind:ident, $fmt:literal $(, $arg:expr)+ $(,)?) => {
        $crate::ServiceError::new(
            $crate::ErrorKind::$kind,
            format!($fmt $(, $crate::sanitized!($arg))+),
        )
    };
}
