//! Network reachability.
//!
//! Fetches only start while the network is up.  A background task probes a
//! well-known address with a short TCP connect and publishes the answer as a
//! flag the render loop can read for free.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::SharedConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared online/offline flag.  Clones see the same flag.
#[derive(Debug, Clone)]
pub struct Connectivity {
    online: Arc<AtomicBool>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Store `online`, returning whether it changed.
    pub fn set(&self, online: bool) -> bool {
        self.online.swap(online, Ordering::Relaxed) != online
    }
}

/// True when a TCP connection to `addr` opens within `timeout`.
pub async fn probe(addr: &str, timeout: Duration) -> bool {
    matches!(tokio::time::timeout(timeout, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

/// Keep `connectivity` current.  The probe address and interval are re-read
/// from `config` on every round; an empty address means always online.
pub fn spawn_probe(runtime: &Handle, config: SharedConfig, connectivity: Connectivity) -> JoinHandle<()> {
    runtime.spawn(async move {
        loop {
            let (addr, interval) = {
                let cfg = config.load();
                (
                    cfg.network.probe_addr.clone(),
                    Duration::from_secs(cfg.network.probe_interval_secs),
                )
            };

            let online = addr.is_empty() || probe(&addr, CONNECT_TIMEOUT).await;
            if connectivity.set(online) {
                if online {
                    tracing::info!(probe = %addr, "network is reachable");
                } else {
                    tracing::warn!(probe = %addr, "network is unreachable, pausing fetches");
                }
            }
            tokio::time::sleep(interval).await;
        }
    })
}
