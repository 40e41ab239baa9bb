//! In-memory upstream for tests.
//!
//! [`MockRangeSource`] serves registered resources as `206 Partial Content`
//! responses, counts requests per URL and can delay or fail on demand.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::{HttpByteRangeSource, RangeRequest, RangeResponse};
use bytes::Bytes;
use core_async::sync::Notify;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct MockState {
    resources: HashMap<String, Bytes>,
    fetches: HashMap<String, usize>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    requests: Vec<RangeRequest>,
}

/// Deterministic in-memory [`HttpByteRangeSource`].
#[derive(Default)]
pub struct MockRangeSource {
    state: Mutex<MockState>,
    started: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started_notify: Notify,
}

/// Decrements the in-flight counter even when the request future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockRangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `len` bytes of a repeating pattern under `url`.
    pub fn with_resource(self, url: impl Into<String>, len: usize) -> Self {
        self.insert(url, pattern(len));
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(Some(delay));
        self
    }

    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.state.lock().resources.insert(url.into(), data.into());
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().delay = delay;
    }

    /// Makes every request for `url` fail with a 503.
    pub fn fail_url(&self, url: impl Into<String>) {
        self.state.lock().failing.insert(url.into());
    }

    pub fn resource(&self, url: &str) -> Option<Bytes> {
        self.state.lock().resources.get(url).cloned()
    }

    /// Requests answered (or failed) for `url`.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.state.lock().fetches.get(url).copied().unwrap_or(0)
    }

    /// Requests answered (or failed) across all URLs.
    pub fn total_fetches(&self) -> usize {
        self.state.lock().fetches.values().sum()
    }

    /// Requests that entered `fetch_range`, including ones still in flight.
    pub fn started_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RangeRequest> {
        self.state.lock().requests.clone()
    }

    /// Waits until at least `count` requests have started.
    pub async fn wait_for_started(&self, count: usize) {
        loop {
            let notified = self.started_notify.notified();
            if self.started_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl HttpByteRangeSource for MockRangeSource {
    async fn fetch_range(&self, request: RangeRequest) -> Result<RangeResponse> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        self.started_notify.notify_waiters();

        let delay = {
            let mut state = self.state.lock();
            state.requests.push(request.clone());
            state.delay
        };
        if let Some(delay) = delay {
            core_async::time::sleep(delay).await;
        }

        let (data, failing) = {
            let mut state = self.state.lock();
            *state.fetches.entry(request.url.clone()).or_insert(0) += 1;
            (
                state.resources.get(&request.url).cloned(),
                state.failing.contains(&request.url),
            )
        };
        self.completed.fetch_add(1, Ordering::SeqCst);

        if failing {
            return Err(BridgeError::HttpStatus {
                status: 503,
                url: request.url,
            });
        }
        let Some(data) = data else {
            return Err(BridgeError::HttpStatus {
                status: 404,
                url: request.url,
            });
        };

        let total = data.len() as u64;
        let start = request.range.start.min(total);
        let end = request.range.end().map_or(total, |end| end.min(total));

        Ok(RangeResponse {
            status: if start < end { 206 } else { 416 },
            start,
            total_length: Some(total),
            body: data.slice(start as usize..end as usize),
        })
    }
}

/// `len` bytes where byte `i` is `i % 251`.
pub fn pattern(len: usize) -> Bytes {
    (0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>().into()
}
