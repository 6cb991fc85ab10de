// src/ring_buffer.rs
//! Ring buffer sink for bounded forensic logging with DoS protection.
//!
//! Keeps the most recent translated failures in memory with a fixed upper
//! bound, regardless of how many errors a caller manages to trigger.
//!
//! # Design Principles
//!
//! - **Bounded memory**: Fixed maximum size regardless of error volume
//! - **FIFO eviction**: Oldest entries dropped first
//! - **Per-entry size caps**: No single record can dominate the buffer
//! - **RwLock-based**: Concurrent readers, exclusive writers
//!
//! # Example
//!
//! ```rust
//! use ingress_errors::{RequestContext, RingBufferSink, ServiceError, Translator, request};
//!
//! // Max 1000 entries, 2KB per entry
//! let sink = RingBufferSink::new(1000, 2048);
//! let translator = Translator::new(sink.clone());
//!
//! request::scope(RequestContext::new("req-9"), || {
//!     translator.translate(&ServiceError::aws_sqs_service("queue down"));
//! });
//!
//! let recent = sink.get_recent(10);
//! assert_eq!(recent[0].tracking_id.as_deref(), Some("req-9"));
//! assert_eq!(recent[0].status_code, 500);
//! ```

use crate::{ErrorSink, LogRecord};
use std::borrow::Cow;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// A single forensic log entry with bounded size.
///
/// Uses Arc<str> so cloning out of the buffer is a refcount increment.
#[derive(Clone, Debug)]
pub struct ForensicEntry {
    /// Unix timestamp of the translation
    pub timestamp: u64,
    /// Tracking id returned to the caller, if any
    pub tracking_id: Option<Arc<str>>,
    /// Status code returned to the caller
    pub status_code: u16,
    /// Failure message
    pub message: Arc<str>,
    /// Operation label (classified failures only)
    pub operation: Option<Arc<str>>,
    /// Context as compact JSON (classified failures only)
    pub context: Option<Arc<str>>,
    /// Serialized response body
    pub client_body: Arc<str>,
    /// Approximate size in bytes
    pub size_bytes: usize,
}

/// Fixed-size ring buffer with exact allocation (no growth).
struct RingBuffer {
    entries: Box<[Option<ForensicEntry>]>,
    tail: usize,
    head: usize,
    len: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            entries: std::iter::repeat_with(|| None)
                .take(capacity)
                .collect::<Box<[Option<ForensicEntry>]>>(),
            tail: 0,
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, entry: ForensicEntry) -> Option<ForensicEntry> {
        let evicted = self.entries[self.tail].replace(entry);
        self.tail = (self.tail + 1) % self.entries.len();

        if self.len < self.entries.len() {
            self.len += 1;
        } else {
            self.head = (self.head + 1) % self.entries.len();
        }

        evicted
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> impl DoubleEndedIterator<Item = &ForensicEntry> {
        let head = self.head;
        let len = self.len;
        let cap = self.entries.len();

        (0..len).filter_map(move |i| {
            let idx = (head + i) % cap;
            self.entries[idx].as_ref()
        })
    }

    fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = None;
        }
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

/// Sink that keeps the most recent records in a bounded ring buffer.
///
/// Clones share the same buffer, so one handle can go to the translator and
/// another to whatever inspects the history.
pub struct RingBufferSink {
    buffer: Arc<RwLock<RingBuffer>>,
    max_entries: usize,
    max_entry_bytes: usize,
    eviction_count: Arc<AtomicU64>,
}

impl RingBufferSink {
    /// Create a new ring buffer sink.
    ///
    /// * `max_entries` - Maximum number of entries before FIFO eviction (at least 1)
    /// * `max_entry_bytes` - Maximum bytes per entry
    pub fn new(max_entries: usize, max_entry_bytes: usize) -> Self {
        let bounded_entries = max_entries.max(1);
        Self {
            buffer: Arc::new(RwLock::new(RingBuffer::new(bounded_entries))),
            max_entries: bounded_entries,
            max_entry_bytes,
            eviction_count: Arc::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    fn read_buffer(&self) -> RwLockReadGuard<'_, RingBuffer> {
        match self.buffer.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[inline]
    fn write_buffer(&self) -> RwLockWriteGuard<'_, RingBuffer> {
        match self.buffer.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Create a bounded forensic entry from a record.
    ///
    /// The tracking id is stored first so entries stay filterable by
    /// request. Half of what is left is reserved for the response body;
    /// message, operation and context share the other half.
    fn create_entry(&self, record: &LogRecord<'_>) -> ForensicEntry {
        let mut budget = EntryBudget::new(self.max_entry_bytes);

        let tracking_id = record.tracking_id.map(|id| budget.take(id, 128, 0));
        let body_reserve = budget.remaining / 2;

        let message = budget.take(record.message, 512, body_reserve);
        let operation = record.operation.map(|op| budget.take(op, 256, body_reserve));
        let context = record
            .context
            .map(|ctx| budget.take(&ctx.to_json_string(), 512, body_reserve));
        let client_body = budget.take(&record.client_response.body, usize::MAX, 0);

        ForensicEntry {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
            tracking_id,
            status_code: record.client_response.status_code,
            message,
            operation,
            context,
            client_body,
            size_bytes: budget.used,
        }
    }

    /// Get the N most recent entries in reverse chronological order.
    pub fn get_recent(&self, count: usize) -> Vec<ForensicEntry> {
        let buffer = self.read_buffer();
        buffer.iter().rev().take(count).cloned().collect()
    }

    /// Get all entries in reverse chronological order.
    pub fn get_all(&self) -> Vec<ForensicEntry> {
        let buffer = self.read_buffer();
        buffer.iter().rev().cloned().collect()
    }

    /// Get entries matching a predicate (e.g., one tracking id).
    ///
    /// ```rust
    /// # use ingress_errors::RingBufferSink;
    /// # let sink = RingBufferSink::new(100, 1024);
    /// let for_request = sink.get_filtered(|entry| {
    ///     entry.tracking_id.as_deref() == Some("req-42")
    /// });
    /// # assert!(for_request.is_empty());
    /// ```
    pub fn get_filtered<F>(&self, predicate: F) -> Vec<ForensicEntry>
    where
        F: Fn(&ForensicEntry) -> bool,
    {
        let buffer = self.read_buffer();
        buffer.iter().filter(|e| predicate(e)).cloned().collect()
    }

    /// Get current number of entries in buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.read_buffer().len()
    }

    /// Check if buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get total payload bytes (lower-bound estimate).
    pub fn payload_bytes(&self) -> usize {
        let buffer = self.read_buffer();
        buffer.iter().map(|e| e.size_bytes).sum()
    }

    /// Get total number of evictions since creation.
    #[inline]
    pub fn eviction_count(&self) -> u64 {
        self.eviction_count.load(Ordering::Relaxed)
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.write_buffer().clear();
    }

    /// Get buffer capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Check if buffer is at capacity.
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_entries
    }
}

impl ErrorSink for RingBufferSink {
    fn error(&self, record: &LogRecord<'_>) {
        let entry = self.create_entry(record);

        let mut buffer = self.write_buffer();
        if buffer.push(entry).is_some() {
            self.eviction_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Clone for RingBufferSink {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
            max_entries: self.max_entries,
            max_entry_bytes: self.max_entry_bytes,
            eviction_count: Arc::clone(&self.eviction_count),
        }
    }
}

impl std::fmt::Debug for RingBufferSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBufferSink")
            .field("len", &self.len())
            .field("capacity", &self.max_entries)
            .field("max_entry_bytes", &self.max_entry_bytes)
            .field("evictions", &self.eviction_count())
            .finish()
    }
}

/// Byte budget for one entry.
struct EntryBudget {
    remaining: usize,
    used: usize,
}

impl EntryBudget {
    fn new(max_bytes: usize) -> Self {
        Self {
            remaining: max_bytes,
            used: 0,
        }
    }

    /// Take at most `cap` bytes of `s`, leaving `reserve` bytes untouched.
    fn take(&mut self, s: &str, cap: usize, reserve: usize) -> Arc<str> {
        let available = self.remaining.saturating_sub(reserve).min(cap);
        let bounded = truncate_to_bytes(s, available);
        self.used += bounded.len();
        self.remaining -= bounded.len();
        Arc::from(&*bounded)
    }
}

/// Truncate string to maximum byte length, respecting UTF-8 boundaries.
fn truncate_to_bytes(s: &str, max_bytes: usize) -> Cow<'_, str> {
    if max_bytes == 0 {
        return Cow::Borrowed("");
    }
    if s.len() <= max_bytes {
        return Cow::Borrowed(s);
    }

    let indicator = "...[TRUNC]";
    if max_bytes <= indicator.len() {
        return Cow::Borrowed(&indicator[..max_bytes]);
    }
    let max_content = max_bytes - indicator.len();

    let mut idx = max_content;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }

    if idx == 0 {
        return Cow::Borrowed(indicator);
    }

    let mut out = String::with_capacity(idx + indicator.len());
    out.push_str(&s[..idx]);
    out.push_str(indicator);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RequestContext, ServiceError, Translator};

    fn translator(sink: &RingBufferSink, id: &str) -> Translator<RingBufferSink, Arc<RequestContext>> {
        Translator::with_store(sink.clone(), Arc::new(RequestContext::new(id)))
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let sink = RingBufferSink::new(3, 1024);
        let translator = translator(&sink, "req");

        for i in 0..5 {
            translator.translate(&ServiceError::common(format!("error {}", i)));
        }

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.eviction_count(), 2);

        let entries = sink.get_all();
        assert_eq!(&*entries[0].message, "error 4");
        assert_eq!(&*entries[2].message, "error 2");
    }

    #[test]
    fn ring_buffer_respects_size_limit() {
        let sink = RingBufferSink::new(100, 128);
        let translator = translator(&sink, "req");

        translator.translate(&ServiceError::common("A".repeat(10_000)));

        let entries = sink.get_recent(1);
        let entry = &entries[0];
        assert!(entry.size_bytes <= 128);
        assert!(entry.message.contains("TRUNC"));
    }

    #[test]
    fn long_message_keeps_correlation_fields() {
        let sink = RingBufferSink::new(10, 128);
        let translator = translator(&sink, "req-42");

        translator.translate(&ServiceError::common("A".repeat(500)));

        let entries = sink.get_recent(1);
        let entry = &entries[0];
        assert_eq!(entry.tracking_id.as_deref(), Some("req-42"));
        assert_eq!(entry.status_code, 500);
        assert!(!entry.client_body.is_empty());
        assert!(entry.client_body.starts_with(r#"{"errorTrackingId":"req-42""#));
        assert!(entry.size_bytes <= 128);

        let for_request = sink.get_filtered(|e| e.tracking_id.as_deref() == Some("req-42"));
        assert_eq!(for_request.len(), 1);
    }

    #[test]
    fn unclassified_entries_have_no_metadata() {
        let sink = RingBufferSink::new(10, 4096);
        let translator = translator(&sink, "req-1");

        translator.translate_error(&std::io::Error::other("boom"));

        let entries = sink.get_recent(1);
        let entry = &entries[0];
        assert!(entry.operation.is_none());
        assert!(entry.context.is_none());
        assert_eq!(entry.status_code, 500);
        assert_eq!(entry.tracking_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn classified_entries_keep_metadata() {
        let sink = RingBufferSink::new(10, 4096);
        let translator = translator(&sink, "req-7");

        translator.translate(
            &ServiceError::verify_signature("bad sig")
                .with_context_entry("header", "x-signature")
                .set_operation("utils/verify-signature"),
        );

        let entries = sink.get_recent(1);
        let entry = &entries[0];
        assert_eq!(entry.operation.as_deref(), Some("utils/verify-signature"));
        assert_eq!(entry.context.as_deref(), Some(r#"{"header":"x-signature"}"#));
        assert_eq!(entry.status_code, 401);
    }

    #[test]
    fn ring_buffer_filtering() {
        let sink = RingBufferSink::new(100, 1024);
        let even = translator(&sink, "req-even");
        let odd = translator(&sink, "req-odd");

        for i in 0..10 {
            let err = ServiceError::common(format!("error {}", i));
            if i % 2 == 0 {
                even.translate(&err);
            } else {
                odd.translate(&err);
            }
        }

        let evens = sink.get_filtered(|e| e.tracking_id.as_deref() == Some("req-even"));
        assert_eq!(evens.len(), 5);
    }

    #[test]
    fn ring_buffer_clone_shares_state() {
        let sink1 = RingBufferSink::new(100, 1024);
        let sink2 = sink1.clone();

        translator(&sink1, "req").translate(&ServiceError::common("test"));

        assert_eq!(sink1.len(), 1);
        assert_eq!(sink2.len(), 1);
        sink2.clear();
        assert!(sink1.is_empty());
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let sink = RingBufferSink::new(0, 1024);
        assert_eq!(sink.capacity(), 1);
        translator(&sink, "req").translate(&ServiceError::common("only"));
        assert!(sink.is_full());
    }

    #[test]
    fn truncate_respects_utf8() {
        let emoji = "🔥".repeat(100);
        let truncated = truncate_to_bytes(&emoji, 50);
        assert!(std::str::from_utf8(truncated.as_bytes()).is_ok());
        assert!(truncated.len() <= 50);
    }

    #[test]
    fn truncate_no_allocation_when_short() {
        let truncated = truncate_to_bytes("short", 100);
        assert!(matches!(truncated, Cow::Borrowed(_)));
    }

    #[test]
    fn ring_buffer_concurrent_logging() {
        use std::thread;

        let sink = RingBufferSink::new(128, 256);
        let mut handles = Vec::new();

        for i in 0..8 {
            let translator = translator(&sink, "req");
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    translator.translate(&ServiceError::common(format!("t{}-{}", i, j)));
                }
            }));
        }

        for handle in handles {
            handle.join().expect("thread panicked");
        }

        assert_eq!(sink.len(), 128);
        assert_eq!(sink.eviction_count(), 800 - 128);
    }

    #[test]
    fn arc_str_cloning_is_cheap() {
        let sink = RingBufferSink::new(10, 1024);
        translator(&sink, "req").translate(&ServiceError::common("details"));

        let entry1 = sink.get_recent(1)[0].clone();
        let entry2 = sink.get_recent(1)[0].clone();
        assert!(Arc::ptr_eq(&entry1.message, &entry2.message));
        assert!(Arc::ptr_eq(&entry1.client_body, &entry2.client_body));
    }
}
