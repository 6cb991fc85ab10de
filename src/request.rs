//! Ambient per-request context.
//!
//! The invoking runtime establishes a [`RequestContext`] before business
//! logic runs; the translator only ever reads it. Storage is scoped to one
//! logical request and never shared between concurrently in-flight requests:
//!
//! - [`scope`] binds a context to the current thread for the duration of a
//!   closure, restoring whatever was bound before (also on panic).
//! - [`scope_async`] (feature `tokio`) binds a context to a future through a
//!   task-local, so it follows the task across worker threads.
//!
//! When both are active the task-local scope wins.
//!
//! ```rust
//! use ingress_errors::{RequestContext, request};
//!
//! assert_eq!(request::current_request_id(), None);
//! request::scope(RequestContext::new("req-1"), || {
//!     assert_eq!(request::current_request_id().as_deref(), Some("req-1"));
//! });
//! assert_eq!(request::current_request_id(), None);
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key under which the runtime stores the request identifier.
pub const AWS_REQUEST_ID: &str = "awsRequestId";

/// Read-only key/value state for one in-flight request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    values: BTreeMap<String, String>,
}

impl RequestContext {
    /// Context holding only the request identifier.
    pub fn new(aws_request_id: impl Into<String>) -> Self {
        Self::empty().with_value(AWS_REQUEST_ID, aws_request_id)
    }

    /// Context with no values at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add or replace a value.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The request identifier, if the runtime supplied one.
    pub fn aws_request_id(&self) -> Option<&str> {
        self.get(AWS_REQUEST_ID)
    }
}

/// Read access to the active request context.
///
/// The translator consumes this rather than touching storage directly, so
/// tests can hand it a fixed context.
pub trait ContextStore {
    /// The context active for the current execution, if any.
    fn get_store(&self) -> Option<Arc<RequestContext>>;
}

/// Reads whatever [`scope`] or [`scope_async`] has made active.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbientStore;

impl ContextStore for AmbientStore {
    #[inline]
    fn get_store(&self) -> Option<Arc<RequestContext>> {
        current()
    }
}

/// A fixed context, regardless of ambient state.
impl ContextStore for Arc<RequestContext> {
    #[inline]
    fn get_store(&self) -> Option<Arc<RequestContext>> {
        Some(Arc::clone(self))
    }
}

impl<T: ContextStore + ?Sized> ContextStore for &T {
    #[inline]
    fn get_store(&self) -> Option<Arc<RequestContext>> {
        (**self).get_store()
    }
}

thread_local! {
    static THREAD_CONTEXT: RefCell<Option<Arc<RequestContext>>> = const { RefCell::new(None) };
}

#[cfg(feature = "tokio")]
tokio::task_local! {
    static TASK_CONTEXT: Arc<RequestContext>;
}

/// Restores the previous thread-local context when dropped.
struct ThreadScopeGuard {
    previous: Option<Arc<RequestContext>>,
}

impl Drop for ThreadScopeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        THREAD_CONTEXT.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Run `f` with `context` bound to the current thread.
pub fn scope<F, R>(context: RequestContext, f: F) -> R
where
    F: FnOnce() -> R,
{
    let previous = THREAD_CONTEXT.with(|slot| slot.borrow_mut().replace(Arc::new(context)));
    let _guard = ThreadScopeGuard { previous };
    f()
}

/// Run `future` with `context` bound to its task.
#[cfg(feature = "tokio")]
pub async fn scope_async<F>(context: RequestContext, future: F) -> F::Output
where
    F: std::future::Future,
{
    TASK_CONTEXT.scope(Arc::new(context), future).await
}

/// The context active for the current execution.
pub fn current() -> Option<Arc<RequestContext>> {
    task_context().or_else(|| THREAD_CONTEXT.with(|slot| slot.borrow().clone()))
}

#[cfg(feature = "tokio")]
#[inline]
fn task_context() -> Option<Arc<RequestContext>> {
    TASK_CONTEXT.try_with(Arc::clone).ok()
}

#[cfg(not(feature = "tokio"))]
#[inline]
fn task_context() -> Option<Arc<RequestContext>> {
    None
}

/// Shorthand for the active request identifier.
pub fn current_request_id() -> Option<String> {
    current().and_then(|ctx| ctx.aws_request_id().map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn no_context_outside_scope() {
        assert!(current().is_none());
        assert_eq!(current_request_id(), None);
    }

    #[test]
    fn scope_binds_and_restores() {
        scope(RequestContext::new("outer"), || {
            assert_eq!(current_request_id().as_deref(), Some("outer"));
            scope(RequestContext::new("inner"), || {
                assert_eq!(current_request_id().as_deref(), Some("inner"));
            });
            assert_eq!(current_request_id().as_deref(), Some("outer"));
        });
        assert!(current().is_none());
    }

    #[test]
    fn scope_restores_after_panic() {
        let result = std::panic::catch_unwind(|| {
            scope(RequestContext::new("doomed"), || panic!("handler blew up"));
        });
        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[test]
    fn context_without_request_id() {
        let ctx = RequestContext::empty().with_value("functionName", "ingest");
        scope(ctx, || {
            assert!(current().is_some());
            assert_eq!(current_request_id(), None);
        });
    }

    #[test]
    fn threads_do_not_share_scopes() {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                thread::spawn(move || {
                    let id = format!("req-{}", i);
                    scope(RequestContext::new(id.clone()), || {
                        thread::yield_now();
                        assert_eq!(current_request_id(), Some(id));
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked");
        }
    }

    #[test]
    fn fixed_store_ignores_ambient_state() {
        let fixed = Arc::new(RequestContext::new("fixed"));
        scope(RequestContext::new("ambient"), || {
            let ctx = fixed.get_store().expect("fixed store always has a context");
            assert_eq!(ctx.aws_request_id(), Some("fixed"));
            let ambient = AmbientStore.get_store().expect("scope is active");
            assert_eq!(ambient.aws_request_id(), Some("ambient"));
        });
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn task_scope_is_visible_inside_the_future() {
        let seen = scope_async(RequestContext::new("task-1"), async {
            tokio::task::yield_now().await;
            current_request_id()
        })
        .await;
        assert_eq!(seen.as_deref(), Some("task-1"));
        assert_eq!(current_request_id(), None);
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn task_scope_takes_precedence_over_thread_scope() {
        let _thread = ThreadScopeGuard {
            previous: THREAD_CONTEXT
                .with(|slot| slot.borrow_mut().replace(Arc::new(RequestContext::new("thread")))),
        };
        let seen = scope_async(RequestContext::new("task"), async { current_request_id() }).await;
        assert_eq!(seen.as_deref(), Some("task"));
        assert_eq!(current_request_id().as_deref(), Some("thread"));
    }
}
