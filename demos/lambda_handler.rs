//! A queue-consuming handler that translates every failure at its boundary.
//!
//! Run with `RUST_LOG=ingress_errors=error cargo run --example lambda_handler`
//! to see the JSON log events next to the responses.

use ingress_errors::{
    RequestContext, Response, ServiceError, TracingSink, Translator, request, service_err,
};
use tracing_subscriber::EnvFilter;

/// What the runtime hands the handler.
struct Invocation {
    request_id: &'static str,
    signature: &'static str,
    queue: &'static str,
}

fn verify(signature: &str) -> Result<(), ServiceError> {
    if signature == "valid" {
        Ok(())
    } else {
        Err(ServiceError::verify_signature("Signature mismatch"))
    }
}

async fn publish(queue: &str) -> Result<(), ServiceError> {
    tokio::task::yield_now().await;
    if queue.ends_with("-dlq") {
        return Err(service_err!(AwsSqsService, "queue {} unavailable", queue)
            .with_context_entry("queue", queue)
            .with_context_entry("retries", 3));
    }
    Ok(())
}

async fn process(invocation: &Invocation) -> Result<Response, ServiceError> {
    verify(invocation.signature)?;
    publish(invocation.queue)
        .await
        .map_err(|err| err.set_operation("consumer/publish"))?;
    Ok(Response {
        status_code: 200,
        body: String::from(r#"{"ok":true}"#),
    })
}

async fn handler(translator: &Translator<TracingSink>, invocation: Invocation) -> Response {
    let context = RequestContext::new(invocation.request_id);
    request::scope_async(context, async {
        match process(&invocation).await {
            Ok(response) => response,
            Err(err) => translator.translate(&err),
        }
    })
    .await
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .init();

    let translator = Translator::new(TracingSink::new());

    let invocations = [
        Invocation {
            request_id: "req-1",
            signature: "valid",
            queue: "orders",
        },
        Invocation {
            request_id: "req-2",
            signature: "forged",
            queue: "orders",
        },
        Invocation {
            request_id: "req-3",
            signature: "valid",
            queue: "orders-dlq",
        },
    ];

    for invocation in invocations {
        let id = invocation.request_id;
        let response = handler(&translator, invocation).await;
        println!("{} -> {} {}", id, response.status_code, response.body);
    }
}
