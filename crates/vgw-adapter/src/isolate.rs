//! Error isolation for native callbacks.
//!
//! Vendor SDKs invoke callbacks synchronously from their own I/O threads; a
//! panic escaping into that frame can corrupt the native session or abort the
//! process. [`wrap`] turns any handler into one that captures the fault and
//! reroutes it to the platform's error channel instead.
//!
//! The wrapper also carries the session-generation guard: a callback that
//! arrives for an already-reset session is a silent no-op.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};
use vgw_core::error::AdapterError;
use vgw_core::types::{AdapterEvent, EventSender};

use crate::session::{NativeHandler, NativePayload};

/// Wrap a handler with generation check, debug logging, and fault capture.
///
/// - `expected_gen` is the session generation the handler was registered
///   under; `live_gen` is the adapter's current generation. A mismatch means
///   `reset()` has begun and the callback must not touch any table.
/// - A panic inside `inner` becomes one [`AdapterEvent::Error`] on `events`.
///   No retry: retry policy belongs to the caller of `send()`.
pub fn wrap<F>(
    label: &str,
    expected_gen: u64,
    live_gen: Arc<AtomicU64>,
    events: EventSender,
    inner: F,
) -> NativeHandler
where
    F: Fn(NativePayload) + Send + Sync + 'static,
{
    let label = label.to_string();

    Box::new(move |payload| {
        if live_gen.load(Ordering::Acquire) != expected_gen {
            debug!("[{label}] dropping callback for stale session generation");
            return;
        }

        debug!("[{label}] callback: {payload:?}");

        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| inner(payload))) {
            let fault = AdapterError::Callback(label.clone(), panic_message(&panic));
            warn!("[{label}] fault isolated: {fault}");
            let _ = events.send(AdapterEvent::Error {
                message: fault.to_string(),
            });
        }
    })
}

/// Best-effort extraction of a panic's message.
fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use vgw_core::types::{AlertKind, ChannelId};

    use crate::session::AlertPayload;

    fn payload() -> NativePayload {
        NativePayload::Alert(AlertPayload {
            channel: ChannelId::Trading,
            kind: AlertKind::LoginComplete,
            message: String::new(),
        })
    }

    #[test]
    fn stale_generation_is_a_no_op() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let live = Arc::new(AtomicU64::new(1));
        let calls = Arc::new(AtomicUsize::new(0));

        let calls2 = Arc::clone(&calls);
        let handler = wrap("test", 0, Arc::clone(&live), tx, move |_| {
            calls2.fetch_add(1, Ordering::SeqCst);
        });

        handler(payload());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());

        // Matching generation goes through.
        live.store(0, Ordering::SeqCst);
        handler(payload());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_becomes_one_error_event_per_invocation() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let live = Arc::new(AtomicU64::new(0));

        let handler = wrap("boom", 0, live, tx, |_| panic!("handler exploded"));

        handler(payload());
        handler(payload());

        for _ in 0..2 {
            match rx.try_recv() {
                Ok(AdapterEvent::Error { message }) => {
                    assert!(message.contains("handler exploded"));
                }
                other => panic!("expected error event, got {other:?}"),
            }
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn fault_does_not_poison_later_invocations() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let live = Arc::new(AtomicU64::new(0));
        let calls = Arc::new(AtomicUsize::new(0));

        let calls2 = Arc::clone(&calls);
        let handler = wrap("flaky", 0, live, tx, move |_| {
            let n = calls2.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                panic!("first call fails");
            }
        });

        handler(payload());
        handler(payload());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(rx.try_recv(), Ok(AdapterEvent::Error { .. })));
        assert!(rx.try_recv().is_err());
    }
}
