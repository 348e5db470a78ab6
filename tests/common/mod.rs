//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use inatproxy::{AttemptOutcome, RequestParams, Transport};
use serde_json::json;
use tokio::time::Instant;

/// Transport that replays a script of outcomes, then repeats `fallback`.
///
/// Records the tokio-clock instant of every call so tests running with a
/// paused clock can assert exact backoff delays.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<AttemptOutcome>>,
    fallback: AttemptOutcome,
    calls: Mutex<Vec<Call>>,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub params: RequestParams,
    pub at: Instant,
}

impl ScriptedTransport {
    pub fn new(script: Vec<AttemptOutcome>, fallback: AttemptOutcome) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always succeed with `{"ok": true}`.
    pub fn ok() -> Self {
        Self::new(vec![], AttemptOutcome::Success(json!({"ok": true})))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Gaps between consecutive calls.
    pub fn gaps(&self) -> Vec<Duration> {
        let calls = self.calls();
        calls.windows(2).map(|w| w[1].at - w[0].at).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, params: &RequestParams) -> AttemptOutcome {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            params: params.clone(),
            at: Instant::now(),
        });
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Transport that takes `latency` per call and tracks peak concurrency.
pub struct SlowTransport {
    latency: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl SlowTransport {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for SlowTransport {
    async fn get(&self, url: &str, _params: &RequestParams) -> AttemptOutcome {
        self.total.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.latency).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        AttemptOutcome::Success(json!({ "url": url }))
    }
}
