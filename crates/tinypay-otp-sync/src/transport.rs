//! Transport abstraction for moving application contexts between devices.
//!
//! The channel is best-effort and coalescing: a newer context may replace
//! an undelivered older one, there is no ordering guarantee across devices,
//! and the peer may be unreachable for long stretches.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, SyncError};
use crate::messages::ApplicationContext;

/// A link to the paired device.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish the latest context. May replace one not yet delivered.
    ///
    /// Hands the context off and returns; it should not wait for the peer
    /// to receive it.
    async fn update_context(&self, context: ApplicationContext) -> Result<()>;

    /// Wait for the next context from the peer.
    ///
    /// Returns [`SyncError::ChannelClosed`] once the link is gone.
    async fn recv(&self) -> Result<ApplicationContext>;

    /// Receive with timeout.
    ///
    /// Returns None if timeout expires before a context arrives.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<ApplicationContext>>;

    /// Whether a context sent now would be delivered immediately.
    async fn is_reachable(&self) -> bool;
}

/// A paired in-memory transport for tests.
///
/// Each direction is a `watch` channel, so undelivered contexts coalesce to
/// the latest one. A shared reachability switch parks outgoing contexts
/// while off and flushes them when switched back on.
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex, MutexGuard};
    use tokio::sync::watch;

    type Slot = Option<ApplicationContext>;

    /// One direction of the link.
    struct Direction {
        /// Dropped when the sending endpoint goes away.
        tx: Option<watch::Sender<Slot>>,
        /// Latest context sent while unreachable.
        parked: Slot,
    }

    struct LinkState {
        reachable: AtomicBool,
        directions: [Mutex<Direction>; 2],
    }

    impl LinkState {
        fn direction(&self, side: usize) -> Result<MutexGuard<'_, Direction>> {
            self.directions[side]
                .lock()
                .map_err(|_| SyncError::TransportUnavailable("link state poisoned".into()))
        }
    }

    /// Control handle shared by both endpoints of a pair.
    #[derive(Clone)]
    pub struct MemoryLink {
        state: Arc<LinkState>,
    }

    impl MemoryLink {
        /// Create two connected endpoints.
        pub fn pair() -> (MemoryEndpoint, MemoryEndpoint) {
            let (tx_a, rx_a) = watch::channel(None);
            let (tx_b, rx_b) = watch::channel(None);

            let state = Arc::new(LinkState {
                reachable: AtomicBool::new(true),
                directions: [
                    Mutex::new(Direction {
                        tx: Some(tx_a),
                        parked: None,
                    }),
                    Mutex::new(Direction {
                        tx: Some(tx_b),
                        parked: None,
                    }),
                ],
            });

            // Side 0 sends on direction 0 and receives what side 1 sends.
            let a = MemoryEndpoint {
                side: 0,
                state: Arc::clone(&state),
                inbox: tokio::sync::Mutex::new(rx_b),
            };
            let b = MemoryEndpoint {
                side: 1,
                state,
                inbox: tokio::sync::Mutex::new(rx_a),
            };
            (a, b)
        }

        /// Flip reachability. Switching on delivers anything parked.
        pub fn set_reachable(&self, reachable: bool) {
            self.state.reachable.store(reachable, Ordering::SeqCst);
            if !reachable {
                return;
            }

            for side in 0..2 {
                let Ok(mut direction) = self.state.direction(side) else {
                    continue;
                };
                if let Some(context) = direction.parked.take() {
                    if let Some(tx) = &direction.tx {
                        if tx.send(Some(context)).is_err() {
                            tracing::debug!("Dropping parked context, receiver is gone");
                        }
                    }
                }
            }
        }

        pub fn is_reachable(&self) -> bool {
            self.state.reachable.load(Ordering::SeqCst)
        }
    }

    /// One end of a [`MemoryLink`] pair.
    pub struct MemoryEndpoint {
        side: usize,
        state: Arc<LinkState>,
        inbox: tokio::sync::Mutex<watch::Receiver<Slot>>,
    }

    impl MemoryEndpoint {
        /// The switch controlling this pair.
        pub fn link(&self) -> MemoryLink {
            MemoryLink {
                state: Arc::clone(&self.state),
            }
        }

        /// Whether a context is waiting to be flushed from this side.
        pub fn has_parked(&self) -> bool {
            self.state
                .direction(self.side)
                .map(|d| d.parked.is_some())
                .unwrap_or(false)
        }
    }

    impl Drop for MemoryEndpoint {
        fn drop(&mut self) {
            if let Ok(mut direction) = self.state.direction(self.side) {
                direction.tx = None;
                direction.parked = None;
            }
        }
    }

    #[async_trait]
    impl Transport for MemoryEndpoint {
        async fn update_context(&self, context: ApplicationContext) -> Result<()> {
            let mut direction = self.state.direction(self.side)?;
            let tx = direction
                .tx
                .as_ref()
                .ok_or_else(|| SyncError::TransportUnavailable("endpoint closed".into()))?;
            if tx.is_closed() {
                return Err(SyncError::TransportUnavailable("peer endpoint dropped".into()));
            }

            if !self.state.reachable.load(Ordering::SeqCst) {
                direction.parked = Some(context);
                return Ok(());
            }

            tx.send(Some(context))
                .map_err(|_| SyncError::TransportUnavailable("peer endpoint dropped".into()))
        }

        async fn recv(&self) -> Result<ApplicationContext> {
            let mut rx = self.inbox.lock().await;
            loop {
                rx.changed().await.map_err(|_| SyncError::ChannelClosed)?;
                if let Some(context) = rx.borrow_and_update().clone() {
                    return Ok(context);
                }
            }
        }

        async fn recv_timeout(&self, timeout: Duration) -> Result<Option<ApplicationContext>> {
            match tokio::time::timeout(timeout, self.recv()).await {
                Ok(result) => result.map(Some),
                Err(_) => Ok(None),
            }
        }

        async fn is_reachable(&self) -> bool {
            let peer_present = self
                .state
                .direction(self.side)
                .map(|d| d.tx.as_ref().is_some_and(|tx| !tx.is_closed()))
                .unwrap_or(false);
            peer_present && self.state.reachable.load(Ordering::SeqCst)
        }
    }
}
