//! # Network Module
//!
//! Transport seam, connectivity tracking, retry policy and the gateway that
//! combines them.

pub mod gateway;
pub mod probe;
pub mod reachability;
pub mod retry;
pub mod transport;

pub use gateway::{GatewaySettings, NetworkGateway};
pub use reachability::{
    AlwaysOnline, ConnectivityGate, ReachabilityMonitor, ReachabilityStatus, StatusHandler,
    TcpProbeMonitor,
};
pub use retry::{Retrier, RetryPolicy};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
