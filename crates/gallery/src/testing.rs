//! Deterministic collaborators for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::cache::providers::CacheTier;
use crate::cache::types::{CacheKey, CacheResult, VariantClass};
use crate::error::Result;
use crate::net::reachability::{ReachabilityMonitor, ReachabilityStatus, StatusHandler};
use crate::net::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::render::{RenderError, ThumbnailRenderer};

#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

type Responder = dyn Fn(&HttpRequest, usize) -> Result<HttpResponse> + Send + Sync;

/// Answers every request by calling a closure with the request and the
/// 0-based index of the call.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&HttpRequest, usize) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse> {
        let call = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.responder)(&request, call)
    }
}

/// Accepts every request and never answers it
#[derive(Default)]
pub struct PendingTransport {
    calls: AtomicUsize,
}

impl PendingTransport {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpTransport for PendingTransport {
    async fn perform(&self, _request: HttpRequest) -> Result<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// A monitor whose status is set by the test
pub struct ScriptedReachability {
    status: Mutex<ReachabilityStatus>,
    handler: Mutex<Option<Arc<StatusHandler>>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ScriptedReachability {
    pub fn new(status: ReachabilityStatus) -> Self {
        Self {
            status: Mutex::new(status),
            handler: Mutex::new(None),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }

    /// Change the status and notify the active subscriber, if any
    pub fn set_status(&self, status: ReachabilityStatus) {
        *self.status.lock() = status;
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(status);
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.handler.lock().is_some()
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl ReachabilityMonitor for ScriptedReachability {
    fn current_status(&self) -> ReachabilityStatus {
        *self.status.lock()
    }

    fn start_monitoring(&self, handler: StatusHandler) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.handler.lock() = Some(Arc::new(handler));
    }

    fn stop_monitoring(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        *self.handler.lock() = None;
    }
}

/// Wraps a renderer and records every requested bound
pub struct CountingRenderer<R> {
    inner: R,
    bounds: Mutex<Vec<u32>>,
}

impl<R> CountingRenderer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bounds: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.bounds.lock().len()
    }

    pub fn bounds(&self) -> Vec<u32> {
        self.bounds.lock().clone()
    }
}

#[async_trait]
impl<R: ThumbnailRenderer> ThumbnailRenderer for CountingRenderer<R> {
    async fn render_thumbnail(&self, data: Bytes, max_pixel_size: u32) -> Result<Bytes, RenderError> {
        self.bounds.lock().push(max_pixel_size);
        self.inner.render_thumbnail(data, max_pixel_size).await
    }
}

/// Wraps a cache tier and records the keys of every get and put
pub struct SpyTier<T> {
    inner: T,
    gets: Mutex<Vec<CacheKey>>,
    puts: Mutex<Vec<CacheKey>>,
}

impl<T> SpyTier<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            gets: Mutex::new(Vec::new()),
            puts: Mutex::new(Vec::new()),
        }
    }

    pub fn get_count(&self) -> usize {
        self.gets.lock().len()
    }

    pub fn put_count(&self) -> usize {
        self.puts.lock().len()
    }

    /// Number of puts for one variant class
    pub fn puts_for(&self, class: VariantClass) -> usize {
        self.puts.lock().iter().filter(|k| k.class() == class).count()
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: CacheTier> CacheTier for SpyTier<T> {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        self.gets.lock().push(key.clone());
        self.inner.get(key).await
    }

    async fn put(&self, key: &CacheKey, data: Bytes) -> CacheResult<()> {
        self.puts.lock().push(key.clone());
        self.inner.put(key, data).await
    }

    async fn remove(&self, key: &CacheKey) -> CacheResult<()> {
        self.inner.remove(key).await
    }

    async fn clear(&self, class: VariantClass) -> CacheResult<()> {
        self.inner.clear(class).await
    }
}
