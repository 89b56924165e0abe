//! # Reachability
//!
//! The platform connectivity contract ([`ReachabilityMonitor`]), two adapters
//! for it, and [`ConnectivityGate`], which turns status notifications into a
//! cancellable "wait until connected" future.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{GalleryError, Result};

/// Network path status as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReachabilityStatus {
    Satisfied,
    Unsatisfied,
    RequiresConnection,
    /// Connected over an expensive or constrained path
    Constrained,
}

impl ReachabilityStatus {
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ReachabilityStatus::Satisfied | ReachabilityStatus::Constrained
        )
    }

    fn to_u8(self) -> u8 {
        match self {
            ReachabilityStatus::Satisfied => 0,
            ReachabilityStatus::Unsatisfied => 1,
            ReachabilityStatus::RequiresConnection => 2,
            ReachabilityStatus::Constrained => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReachabilityStatus::Satisfied,
            2 => ReachabilityStatus::RequiresConnection,
            3 => ReachabilityStatus::Constrained,
            _ => ReachabilityStatus::Unsatisfied,
        }
    }
}

pub type StatusHandler = Box<dyn Fn(ReachabilityStatus) + Send + Sync>;

/// Platform connectivity source.
///
/// At most one subscription is active at a time: `start_monitoring` replaces
/// any previous handler and `stop_monitoring` drops it.
#[async_trait]
pub trait ReachabilityMonitor: Send + Sync {
    fn current_status(&self) -> ReachabilityStatus;
    fn start_monitoring(&self, handler: StatusHandler);
    fn stop_monitoring(&self);

    /// Re-evaluate the network path and return the fresh status.
    ///
    /// Monitors that are always live can rely on the default.
    async fn refresh_status(&self) -> ReachabilityStatus {
        self.current_status()
    }
}

/// A monitor that always reports [`ReachabilityStatus::Satisfied`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOnline;

impl ReachabilityMonitor for AlwaysOnline {
    fn current_status(&self) -> ReachabilityStatus {
        ReachabilityStatus::Satisfied
    }

    fn start_monitoring(&self, handler: StatusHandler) {
        handler(ReachabilityStatus::Satisfied);
    }

    fn stop_monitoring(&self) {}
}

/// Derives connectivity from periodic TCP connection attempts to a known endpoint.
///
/// Background probing runs while a subscription is active;
/// [`ReachabilityMonitor::refresh_status`] probes once on demand.
pub struct TcpProbeMonitor {
    target: String,
    interval: Duration,
    connect_timeout: Duration,
    status: Arc<AtomicU8>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpProbeMonitor {
    /// `target` is a `host:port` pair resolved on every probe.
    pub fn new(target: impl Into<String>, interval: Duration, connect_timeout: Duration) -> Self {
        Self {
            target: target.into(),
            interval,
            connect_timeout,
            // Optimistic until the first probe says otherwise
            status: Arc::new(AtomicU8::new(ReachabilityStatus::Satisfied.to_u8())),
            task: Mutex::new(None),
        }
    }

    /// Build a monitor probing the host of `url` on its known port.
    pub fn for_url(url: &url::Url, interval: Duration, connect_timeout: Duration) -> Option<Self> {
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(Self::new(format!("{host}:{port}"), interval, connect_timeout))
    }

    async fn probe(target: &str, connect_timeout: Duration) -> ReachabilityStatus {
        let addrs: Vec<SocketAddr> = match tokio::net::lookup_host(target).await {
            Ok(addrs) => addrs.collect(),
            Err(_) => return ReachabilityStatus::Unsatisfied,
        };

        for addr in addrs {
            if let Ok(Ok(_)) = tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await
            {
                return ReachabilityStatus::Satisfied;
            }
        }
        ReachabilityStatus::Unsatisfied
    }

    fn record(target: &str, status: &AtomicU8, current: ReachabilityStatus) {
        let previous = status.swap(current.to_u8(), Ordering::AcqRel);
        if previous != current.to_u8() {
            info!(target = %target, status = ?current, "Reachability changed");
        }
    }
}

#[async_trait]
impl ReachabilityMonitor for TcpProbeMonitor {
    fn current_status(&self) -> ReachabilityStatus {
        ReachabilityStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn start_monitoring(&self, handler: StatusHandler) {
        let target = self.target.clone();
        let interval = self.interval;
        let connect_timeout = self.connect_timeout;
        let status = Arc::clone(&self.status);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let current = Self::probe(&target, connect_timeout).await;
                Self::record(&target, &status, current);
                handler(current);
            }
        });

        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
    }

    fn stop_monitoring(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    async fn refresh_status(&self) -> ReachabilityStatus {
        let current = Self::probe(&self.target, self.connect_timeout).await;
        Self::record(&self.target, &self.status, current);
        current
    }
}

impl Drop for TcpProbeMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

#[derive(Default)]
struct GateState {
    waiters: usize,
    sender: Option<Arc<watch::Sender<ReachabilityStatus>>>,
}

/// Shares one monitor subscription between any number of waiters.
///
/// Monitoring starts when the first waiter arrives and stops when the last
/// one leaves, whether it completed, was cancelled or was dropped.
pub struct ConnectivityGate {
    monitor: Arc<dyn ReachabilityMonitor>,
    state: Arc<Mutex<GateState>>,
}

impl ConnectivityGate {
    pub fn new(monitor: Arc<dyn ReachabilityMonitor>) -> Self {
        Self {
            monitor,
            state: Arc::new(Mutex::new(GateState::default())),
        }
    }

    pub fn current_status(&self) -> ReachabilityStatus {
        self.monitor.current_status()
    }

    pub fn is_connected(&self) -> bool {
        self.current_status().is_connected()
    }

    /// Ask the monitor for a fresh status instead of the last recorded one
    pub async fn refresh_status(&self) -> ReachabilityStatus {
        self.monitor.refresh_status().await
    }

    /// Number of callers currently suspended in [`Self::wait_until_connected`]
    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters
    }

    /// Suspend until the monitor reports a connected state.
    ///
    /// Returns immediately when already connected and [`GalleryError::Cancelled`]
    /// as soon as `cancel` fires.
    pub async fn wait_until_connected(&self, cancel: &CancellationToken) -> Result<()> {
        let mut subscription = self.subscribe();

        loop {
            if subscription.receiver.borrow_and_update().is_connected() {
                debug!("Connectivity restored");
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GalleryError::Cancelled),
                changed = subscription.receiver.changed() => {
                    if changed.is_err() {
                        return Err(GalleryError::Reachability(
                            "status channel closed while waiting".to_string(),
                        ));
                    }
                }
            }
        }
    }

    fn subscribe(&self) -> Subscription {
        let mut state = self.state.lock();
        let sender = match &state.sender {
            Some(sender) => Arc::clone(sender),
            None => {
                let (sender, _) = watch::channel(self.monitor.current_status());
                let sender = Arc::new(sender);
                let handler_sender = Arc::clone(&sender);
                self.monitor.start_monitoring(Box::new(move |status| {
                    handler_sender.send_replace(status);
                }));
                debug!("Started reachability monitoring");
                state.sender = Some(Arc::clone(&sender));
                sender
            }
        };
        state.waiters += 1;

        // Re-read after subscribing so a change between channel creation and now is not lost
        let receiver = sender.subscribe();
        sender.send_if_modified(|status| {
            let current = self.monitor.current_status();
            let changed = *status != current;
            *status = current;
            changed
        });

        Subscription {
            receiver,
            monitor: Arc::clone(&self.monitor),
            state: Arc::clone(&self.state),
        }
    }
}

struct Subscription {
    receiver: watch::Receiver<ReachabilityStatus>,
    monitor: Arc<dyn ReachabilityMonitor>,
    state: Arc<Mutex<GateState>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.waiters = state.waiters.saturating_sub(1);
        if state.waiters == 0 {
            state.sender = None;
            self.monitor.stop_monitoring();
            debug!("Stopped reachability monitoring");
        }
    }
}
