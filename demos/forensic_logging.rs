use ingress_errors::{RequestContext, RingBufferSink, ServiceError, Translator, request};
use std::thread;
use std::time::Duration;

fn main() {
    println!("--- Forensic Ring Buffer Example ---\n");

    // Max 10 entries, max 256 bytes per entry
    let sink = RingBufferSink::new(10, 256);
    let translator = Translator::new(sink.clone());

    println!("1. Simulating a burst of forged webhooks (50 requests)...");

    for i in 1..=50 {
        let request_id = format!("req-{:04}", i);

        request::scope(RequestContext::new(request_id), || {
            let err = ServiceError::verify_signature(format!(
                "Signature mismatch for webhook delivery (attempt {})",
                i
            ))
            .with_context_entry("attempt", i)
            .set_operation("webhook/verify");
            translator.translate(&err)
        });

        if i % 10 == 0 {
            thread::sleep(Duration::from_millis(5));
        }
    }

    println!("2. Burst finished. Analyzing buffer state.");
    println!("   Total Evictions (Dropped records): {}", sink.eviction_count());
    println!("   Current Buffer Size: {}", sink.len());
    println!("   Buffer Capacity:     {}", sink.capacity());
    println!("   Payload Bytes:       {}", sink.payload_bytes());

    println!("\n3. Dumping remaining forensic data (last 10 responses):");
    println!("{:<10} | {:<8} | {:<6} | {}", "Time", "Request", "Status", "Message");
    println!("{:-<10}-|-{:-<8}-|-{:-<6}-|-{:-<20}", "", "", "", "");

    for entry in sink.get_recent(10) {
        println!(
            "{:<10} | {:<8} | {:<6} | {}",
            entry.timestamp % 10000,
            entry.tracking_id.as_deref().unwrap_or("-"),
            entry.status_code,
            entry.message
        );
    }

    println!("\nOnly the most recent forensic data remains; requests 1-40 were evicted.");
}
