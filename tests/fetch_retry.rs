use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use enhanced_statusline::fetch::{FetchError, Fetcher, HttpRequest, HttpTransport, RetryPolicy};

/// Fails the first `failures` calls, then answers `body`
struct FlakyTransport {
    calls: AtomicUsize,
    failures: usize,
    body: &'static str,
}

impl FlakyTransport {
    fn new(failures: usize, body: &'static str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failures,
            body,
        }
    }
}

impl HttpTransport for FlakyTransport {
    fn get(&self, _request: &HttpRequest, _timeout: Duration) -> Result<String, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(FetchError::Transport("connection refused".into()))
        } else {
            Ok(self.body.to_string())
        }
    }
}

struct SlowTransport {
    calls: AtomicUsize,
    delay: Duration,
}

impl HttpTransport for SlowTransport {
    fn get(&self, _request: &HttpRequest, _timeout: Duration) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok("late".into())
    }
}

#[tokio::test]
async fn test_always_failing_transport_makes_exactly_max_attempts() {
    let transport = Arc::new(FlakyTransport::new(usize::MAX, ""));
    let fetcher = Fetcher::new(transport.clone());
    let policy = RetryPolicy::new(3, Duration::from_secs(1));

    let started = Instant::now();
    let err = fetcher
        .fetch(&HttpRequest::get("https://example.invalid"), policy)
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    assert!(
        elapsed >= Duration::from_millis(300),
        "backoff too short: {elapsed:?}"
    );
    match err {
        FetchError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, FetchError::Transport(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_recovers_on_a_later_attempt() {
    let transport = Arc::new(FlakyTransport::new(1, "ok"));
    let fetcher = Fetcher::new(transport.clone());
    let body = fetcher
        .fetch(
            &HttpRequest::get("https://example.invalid"),
            RetryPolicy::new(3, Duration::from_secs(1)),
        )
        .await
        .unwrap();
    assert_eq!(body, "ok");
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_attempt_is_bounded_by_timeout() {
    let transport = Arc::new(SlowTransport {
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(600),
    });
    let fetcher = Fetcher::new(transport.clone());
    let policy = RetryPolicy::new(1, Duration::from_millis(50));

    let started = Instant::now();
    let err = fetcher
        .fetch(&HttpRequest::get("https://example.invalid"), policy)
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(matches!(err.root(), FetchError::Timeout(_)));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}
