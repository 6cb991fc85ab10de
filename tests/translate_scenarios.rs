//! End-to-end translation scenarios.
//!
//! Each test drives the public API the way a request handler would: bind a
//! request scope, fail somewhere below, translate at the boundary, then
//! inspect both the response and what was logged.

use ingress_errors::{
    ErrorKind, FnSink, LogRecord, MessagePolicy, MissingRequestId, RequestContext, Response,
    RingBufferSink, ServiceError, Translator, TranslatorConfig, diagnostic_context, request,
    service_err,
};
use serde_json::{Value, json};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Mutex;

// ============================================================================
// HELPERS
// ============================================================================

fn capture(records: &Mutex<Vec<Value>>) -> FnSink<impl Fn(&LogRecord<'_>) + '_> {
    FnSink::new(move |record: &LogRecord<'_>| {
        records
            .lock()
            .unwrap()
            .push(serde_json::to_value(record).unwrap());
    })
}

fn body(response: &Response) -> Value {
    serde_json::from_str(&response.body).unwrap()
}

/// A failure type this crate knows nothing about.
#[derive(Debug)]
struct UpstreamTimeout {
    millis: u64,
}

impl fmt::Display for UpstreamTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upstream timed out after {}ms", self.millis)
    }
}

impl StdError for UpstreamTimeout {}

// ============================================================================
// CONCRETE SCENARIOS
// ============================================================================

#[test]
fn queue_failure_with_context_and_operation() {
    let records = Mutex::new(Vec::new());
    let translator = Translator::new(capture(&records));

    let err = ServiceError::aws_sqs_service("queue down")
        .set_context(diagnostic_context! { "retries" => 3 })
        .set_operation("consumer/process");
    let response = request::scope(RequestContext::new("req-42"), || translator.translate(&err));

    assert_eq!(response.status_code, 500);
    assert_eq!(
        response.body,
        r#"{"errorTrackingId":"req-42","message":"queue down","errors":["queue down"]}"#
    );

    let records = records.lock().unwrap().clone();
    assert_eq!(
        records,
        vec![json!({
            "message": "queue down",
            "operation": "consumer/process",
            "context": {"retries": 3},
            "clientResponse": {"statusCode": 500, "body": response.body},
        })]
    );
}

#[test]
fn bad_signature_is_unauthorized() {
    let records = Mutex::new(Vec::new());
    let translator = Translator::new(capture(&records));

    let response = request::scope(RequestContext::new("req-7"), || {
        translator.translate(&ServiceError::verify_signature("bad sig"))
    });

    assert_eq!(response.status_code, 401);
    assert_eq!(
        response.body,
        r#"{"errorTrackingId":"req-7","message":"bad sig","errors":["bad sig"]}"#
    );
    assert_eq!(records.lock().unwrap().len(), 1);
}

#[test]
fn unclassified_failure_logs_without_operation_or_context() {
    let records = Mutex::new(Vec::new());
    let translator = Translator::new(capture(&records));

    let response = request::scope(RequestContext::new("req-1"), || {
        translator.translate_error(&std::io::Error::other("boom"))
    });

    assert_eq!(response.status_code, 500);
    assert_eq!(
        response.body,
        r#"{"errorTrackingId":"req-1","message":"boom","errors":["boom"]}"#
    );

    let records = records.lock().unwrap().clone();
    let record = records[0].as_object().unwrap();
    assert!(!record.contains_key("operation"));
    assert!(!record.contains_key("context"));
    assert_eq!(record["message"], json!("boom"));
}

#[test]
fn foreign_error_type_is_unclassified() {
    let records = Mutex::new(Vec::new());
    let translator = Translator::new(capture(&records));

    let response = request::scope(RequestContext::new("req-9"), || {
        translator.translate_error(&UpstreamTimeout { millis: 3000 })
    });

    assert_eq!(response.status_code, 500);
    assert_eq!(body(&response)["message"], json!("upstream timed out after 3000ms"));
}

#[test]
fn undecorated_classified_error_logs_empty_operation_and_context() {
    let records = Mutex::new(Vec::new());
    let translator = Translator::new(capture(&records));

    request::scope(RequestContext::new("req-3"), || {
        translator.translate(&ServiceError::common("plain"))
    });

    let records = records.lock().unwrap().clone();
    assert_eq!(records[0]["operation"], json!(""));
    assert_eq!(records[0]["context"], json!({}));
}

#[test]
fn custom_kind_falls_back_to_500() {
    let records = Mutex::new(Vec::new());
    let translator = Translator::new(capture(&records));

    let err = ServiceError::custom("ThrottledError", "slow down");
    assert_eq!(err.kind(), ErrorKind::Custom("ThrottledError"));

    let response = request::scope(RequestContext::new("req-5"), || translator.translate(&err));
    assert_eq!(response.status_code, 500);
}

#[test]
fn macro_built_error_sanitizes_arguments() {
    let records = Mutex::new(Vec::new());
    let translator = Translator::new(capture(&records));

    let queue = "orders\n\u{1b}[31minjected";
    let err = service_err!(AwsSqsService, "send to {} failed", queue);
    let response = request::scope(RequestContext::new("req-6"), || translator.translate(&err));

    assert_eq!(body(&response)["message"], json!("send to orders?injected failed"));
}

// ============================================================================
// AMBIENT SCOPE
// ============================================================================

#[test]
fn no_scope_yields_null_tracking_id() {
    let records = Mutex::new(Vec::new());
    let translator = Translator::new(capture(&records));

    let response = translator.translate(&ServiceError::common("outside"));
    assert_eq!(body(&response)["errorTrackingId"], Value::Null);
}

#[test]
fn no_scope_can_generate_tracking_id() {
    let sink = RingBufferSink::new(8, 2048);
    let translator = Translator::new(sink.clone()).with_config(
        TranslatorConfig::default().missing_request_id(MissingRequestId::Generate),
    );

    let response = translator.translate(&ServiceError::common("outside"));
    let id = body(&response)["errorTrackingId"].as_str().unwrap().to_owned();

    let logged = sink.get_recent(1);
    assert_eq!(logged[0].tracking_id.as_deref(), Some(id.as_str()));
}

#[tokio::test]
async fn async_scope_follows_the_task() {
    let sink = RingBufferSink::new(8, 2048);
    let translator = Translator::new(sink.clone());

    let response = request::scope_async(RequestContext::new("req-async"), async {
        tokio::task::yield_now().await;
        translator.translate(&ServiceError::verify_signature("expired token"))
    })
    .await;

    assert_eq!(response.status_code, 401);
    assert_eq!(body(&response)["errorTrackingId"], json!("req-async"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_keep_their_own_ids() {
    let sink = RingBufferSink::new(64, 2048);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let translator = Translator::new(sink.clone());
            let id = format!("req-{}", i);
            tokio::spawn(request::scope_async(RequestContext::new(id.clone()), async move {
                tokio::task::yield_now().await;
                let response = translator.translate(&ServiceError::common(format!("fail {}", i)));
                (id, response)
            }))
        })
        .collect();

    for handle in handles {
        let (id, response) = handle.await.unwrap();
        assert_eq!(body(&response)["errorTrackingId"], json!(id));
    }
    assert_eq!(sink.len(), 16);
}

// ============================================================================
// DISCLOSURE POLICY
// ============================================================================

#[test]
fn conceal_policy_keeps_raw_message_in_log() {
    let sink = RingBufferSink::new(8, 2048);
    let translator = Translator::new(sink.clone()).with_config(
        TranslatorConfig::default().message_policy(MessagePolicy::ConcealUnclassified),
    );

    let response = request::scope(RequestContext::new("req-8"), || {
        translator.translate_error(&std::io::Error::other("connect ECONNREFUSED 10.0.0.4:5432"))
    });

    assert_eq!(
        response.body,
        r#"{"errorTrackingId":"req-8","message":"Something went wrong","errors":["Something went wrong"]}"#
    );
    let logged = sink.get_recent(1);
    assert_eq!(&*logged[0].message, "connect ECONNREFUSED 10.0.0.4:5432");
}

#[test]
fn forensic_buffer_filters_by_request() {
    let sink = RingBufferSink::new(32, 2048);
    let translator = Translator::new(sink.clone());

    for id in ["req-a", "req-b", "req-a"] {
        request::scope(RequestContext::new(id), || {
            translator.translate(&ServiceError::common("x"))
        });
    }

    let for_a = sink.get_filtered(|entry| entry.tracking_id.as_deref() == Some("req-a"));
    assert_eq!(for_a.len(), 2);
}
