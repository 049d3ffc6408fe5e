//! # Port pre-flight: bind-test requested TCP ports before launch.
//!
//! [`PortArbiter`] answers "can the supervised process bind these ports
//! right now?" For each occupied port it also searches the window above it
//! for the nearest free alternative, so the dashboard can offer a concrete
//! fix instead of a bare failure.
//!
//! ## Rules
//! - A port is probed by binding a listener on the wildcard address
//!   (`0.0.0.0`), which detects conflicts on all interfaces; the socket is
//!   released immediately on success.
//! - Only `AddrInUse` counts as "occupied". Any other bind error (no
//!   permission, exhausted descriptors, …) makes the port unavailable
//!   *without* an alternative search — unrelated OS errors are not masked
//!   as conflicts.
//! - Ports are probed concurrently and independently; there is no shared
//!   state and no ordering dependency between them.
//! - This is a point-in-time check, not a reservation. The race between
//!   check and the process's own bind is tolerated: if it is lost, the
//!   process reports the bind failure on its own log stream.

use std::collections::{BTreeMap, BTreeSet};
use std::io;

use futures::future::join_all;
use tokio::net::TcpListener;

/// Result of probing one requested port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortCheck {
    /// Whether a bind on the wildcard address succeeded.
    pub available: bool,
    /// For an occupied port: the first free port in the search window, in
    /// increasing order. `None` when the window is exhausted or the probe
    /// failed for a reason other than `AddrInUse`.
    pub suggested: Option<u16>,
}

/// Outcome of a single bind test.
enum Probe {
    Free,
    InUse,
    Failed,
}

/// Checks TCP port availability on the local host.
#[derive(Debug, Clone, Copy)]
pub struct PortArbiter {
    /// Span of the alternative search above a busy port.
    pub search_window: u16,
}

impl Default for PortArbiter {
    fn default() -> Self {
        Self { search_window: 100 }
    }
}

impl PortArbiter {
    pub fn new(search_window: u16) -> Self {
        Self { search_window }
    }

    /// Probes every requested port concurrently.
    ///
    /// Returns one [`PortCheck`] per requested port; the map is keyed and
    /// ordered by port number.
    pub async fn check(&self, ports: &BTreeSet<u16>) -> BTreeMap<u16, PortCheck> {
        let probes = ports.iter().map(|&port| async move {
            let check = self.check_one(port).await;
            (port, check)
        });
        join_all(probes).await.into_iter().collect()
    }

    /// Probes one port, searching for an alternative when it is occupied.
    pub async fn check_one(&self, port: u16) -> PortCheck {
        match Self::probe(port).await {
            Probe::Free => PortCheck {
                available: true,
                suggested: None,
            },
            Probe::InUse => PortCheck {
                available: false,
                suggested: self.find_alternative(port).await,
            },
            Probe::Failed => PortCheck {
                available: false,
                suggested: None,
            },
        }
    }

    /// Walks `port+1..=port+window` in increasing order and returns the
    /// first port that binds, clamped at the top of the port range.
    async fn find_alternative(&self, port: u16) -> Option<u16> {
        let upper = port.saturating_add(self.search_window);
        for candidate in port.saturating_add(1)..=upper {
            if matches!(Self::probe(candidate).await, Probe::Free) {
                return Some(candidate);
            }
        }
        None
    }

    /// Bind-tests one port on the wildcard address.
    async fn probe(port: u16) -> Probe {
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => {
                drop(listener);
                Probe::Free
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => Probe::InUse,
            Err(_) => Probe::Failed,
        }
    }
}
