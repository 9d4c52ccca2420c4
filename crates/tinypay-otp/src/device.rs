//! The paired device: one owner of one chain state.
//!
//! A `PeerDevice` ties a [`ChainState`] to its store and to the link with the
//! other device. Every mutation runs under one async mutex against a copy of
//! the state; the copy is persisted and only then swapped in. A failed write
//! leaves the state as it was. Sends happen after the lock is released.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, Mutex};

use tinypay_otp_core::{generate, ChainState, CoreError, CurrentCode, PaymentCode, ScanUri};
use tinypay_otp_store::{StateStore, StoredState};
use tinypay_otp_sync::{
    ApplicationContext, ReconcileOutcome, StateChange, SyncError, SyncReconciler, SyncSnapshot,
    Transport,
};

use crate::config::DeviceConfig;
use crate::error::{DeviceError, Result};

/// Random identifier used to tell devices apart in logs.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub [u8; 8]);

impl DeviceId {
    /// Generate a random device ID.
    pub fn random() -> Self {
        use rand::Rng;
        Self(rand::thread_rng().gen())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self)
    }
}

/// A context staged under the state lock, numbered in commit order.
struct Outgoing {
    seq: u64,
    context: ApplicationContext,
}

/// One device of a phone/watch pair.
///
/// Share it with `Arc` and run [`PeerDevice::run_inbound`] on a task to
/// apply the peer's updates as they arrive.
pub struct PeerDevice<S: StateStore, T: Transport> {
    id: DeviceId,
    config: DeviceConfig,
    state: Mutex<ChainState>,
    store: Arc<S>,
    transport: Arc<T>,
    reconciler: SyncReconciler,
    events: broadcast::Sender<StateChange>,
    /// Last staged sequence number.
    staged: AtomicU64,
    /// Sequence number of the last context handed to the transport.
    outbox: Mutex<u64>,
}

impl<S: StateStore, T: Transport> PeerDevice<S, T> {
    /// Open a device, restoring whatever the store holds.
    pub async fn open(config: DeviceConfig, store: S, transport: T) -> Result<Self> {
        let store = Arc::new(store);
        let state = match store.load_state().await? {
            Some(stored) => stored.into_chain_state(),
            None => ChainState::new(),
        };

        let id = DeviceId::random();
        tracing::debug!(
            "Opened {:?} device {} (ready={}, cursor={})",
            config.role,
            id,
            state.is_ready(),
            state.cursor()
        );

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Ok(Self {
            id,
            reconciler: SyncReconciler::new(config.reconcile.clone()),
            config,
            state: Mutex::new(state),
            store,
            transport: Arc::new(transport),
            events,
            staged: AtomicU64::new(0),
            outbox: Mutex::new(0),
        })
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the transport reference.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// A copy of the current state.
    pub async fn state(&self) -> ChainState {
        self.state.lock().await.clone()
    }

    /// Subscribe to state changes, local and remote.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Local Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Generate a new chain from `root` and bind it to `payer_address`.
    ///
    /// Replaces the previous chain wholesale, resets the cursor and clears
    /// exhaustion, even when `root` is the one already in use. The full
    /// snapshot is sent to the peer.
    ///
    /// The root record is written before the chain, so a failed chain write
    /// can leave a stored root that is newer than the stored chain.
    pub async fn submit_root(&self, root: &str, payer_address: &str) -> Result<CurrentCode> {
        if root.is_empty() {
            return Err(CoreError::EmptyRoot.into());
        }

        let seed = root.to_string();
        let chain = tokio::task::spawn_blocking(move || generate(&seed))
            .await
            .map_err(|e| DeviceError::Generation(e.to_string()))?;
        let tail = *chain.tail();

        let mut next = ChainState::new();
        next.initialize(chain, payer_address, now_secs());

        let mut state = self.state.lock().await;
        if self.config.persist_root {
            self.store.save_root(root).await?;
        } else {
            self.store.clear_root().await?;
        }
        self.store.save_state(&StoredState::from_chain_state(&next)).await?;

        let previous_address = std::mem::replace(&mut *state, next).payer_address().to_string();
        tracing::info!(
            "{:?} {} installed a new chain, tail {}",
            self.config.role,
            self.id,
            tail
        );

        self.notify(StateChange::ChainReplaced {
            tail,
            cursor: state.cursor(),
        });
        if previous_address != state.payer_address() {
            self.notify(StateChange::AddressChanged {
                address: state.payer_address().to_string(),
            });
        }

        let code = state.current_code();
        let outgoing = self.stage(&state);
        drop(state);
        self.publish(outgoing).await;

        Ok(code?)
    }

    /// Overwrite the payer address. Returns whether it changed.
    pub async fn set_payer_address(&self, address: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        if !next.set_payer_address(address) {
            return Ok(false);
        }

        self.store.save_state(&StoredState::from_chain_state(&next)).await?;
        *state = next;
        self.notify(StateChange::AddressChanged {
            address: address.to_string(),
        });

        let outgoing = self.stage(&state);
        drop(state);
        self.publish(outgoing).await;
        Ok(true)
    }

    /// The code that should be shown now.
    pub async fn current_code(&self) -> Result<CurrentCode> {
        Ok(self.state.lock().await.current_code()?)
    }

    /// The current code as `addr:<address> otp:0x<digest>`.
    pub async fn payment_code(&self) -> Result<PaymentCode> {
        Ok(self.current_code().await?.payment_code())
    }

    /// The current code as a `tinypay://pay` URI.
    pub async fn pay_uri(&self) -> Result<ScanUri> {
        let code = self.current_code().await?;
        Ok(ScanUri::pay(code.payer_address, &code.digest))
    }

    /// Use up the current code. Returns the new cursor.
    ///
    /// The new cursor is persisted before it becomes visible; if the write
    /// fails the code stays unused and the error is returned. The peer is
    /// told afterwards, best-effort. At cursor 0 the state is marked
    /// exhausted and [`CoreError::AlreadyExhausted`] is returned.
    pub async fn consume_one(&self) -> Result<u16> {
        let mut state = self.state.lock().await;
        let from = state.cursor();
        let mut next = state.clone();

        match next.consume_one() {
            Ok(to) => {
                self.store.save_cursor(to).await?;
                *state = next;
                self.notify(StateChange::CursorAdvanced { from, to });

                let outgoing = self.stage(&state);
                drop(state);
                self.publish(outgoing).await;
                Ok(to)
            }
            Err(CoreError::AlreadyExhausted) => {
                self.store.save_state(&StoredState::from_chain_state(&next)).await?;
                *state = next;
                tracing::warn!("{:?} {} has used every code in its chain", self.config.role, self.id);
                Err(CoreError::AlreadyExhausted.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The persisted root, when `persist_root` is on.
    pub async fn stored_root(&self) -> Result<Option<String>> {
        Ok(self.store.load_root().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a context received from the peer.
    ///
    /// Bad entries are dropped; the rest is reconciled and, if anything
    /// changed, persisted and announced to subscribers. A failed write
    /// discards the merge. Nothing is sent back.
    pub async fn handle_incoming(&self, context: &ApplicationContext) -> Result<ReconcileOutcome> {
        let (snapshot, malformed) = context.decode();
        if !malformed.is_empty() {
            tracing::debug!("{} dropped {} malformed entries", self.id, malformed.len());
        }
        if snapshot.is_empty() {
            return Ok(ReconcileOutcome::default());
        }

        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let outcome = self.reconciler.reconcile(&mut next, &snapshot);
        if !outcome.changed() {
            return Ok(outcome);
        }

        let cursor_only = outcome
            .changes
            .iter()
            .all(|c| matches!(c, StateChange::CursorAdvanced { .. }));
        if cursor_only {
            self.store.save_cursor(next.cursor()).await?;
        } else {
            self.store.save_state(&StoredState::from_chain_state(&next)).await?;
        }
        *state = next;

        for change in &outcome.changes {
            self.notify(change.clone());
        }
        Ok(outcome)
    }

    /// Send the current state to the peer.
    ///
    /// Called when a session with the peer becomes active so that a device
    /// that missed updates catches up. Does nothing before a chain exists.
    pub async fn announce(&self) -> Result<()> {
        let state = self.state.lock().await;
        if !state.is_ready() {
            tracing::debug!("{} has no chain to announce", self.id);
            return Ok(());
        }
        let outgoing = self.stage(&state);
        drop(state);
        Ok(self.send(outgoing).await?)
    }

    /// Resend chain, cursor and address.
    pub async fn publish_full(&self) -> Result<()> {
        let state = self.state.lock().await;
        let outgoing = self.stage(&state);
        drop(state);
        Ok(self.send(outgoing).await?)
    }

    /// Apply inbound contexts until the link closes.
    ///
    /// A store failure on one context is logged and the pump keeps going.
    pub async fn run_inbound(&self) -> Result<()> {
        loop {
            match self.transport.recv().await {
                Ok(context) => {
                    if let Err(e) = self.handle_incoming(&context).await {
                        tracing::warn!("{} failed to apply peer update: {}", self.id, e);
                    }
                }
                Err(SyncError::ChannelClosed) => {
                    tracing::debug!("{} inbound link closed", self.id);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────────

    /// Build the context describing `state`. Must be called with the state
    /// lock held so sequence numbers follow commit order.
    ///
    /// Every context stands on its own: the link keeps only the latest one,
    /// so a cursor sent without its chain could strand a peer that never
    /// received the chain.
    fn stage(&self, state: &ChainState) -> Outgoing {
        let snapshot = if state.is_ready() {
            SyncSnapshot::full(state)
        } else {
            SyncSnapshot::address(state.payer_address())
        };
        Outgoing {
            seq: self.staged.fetch_add(1, Ordering::SeqCst) + 1,
            context: snapshot.to_context(),
        }
    }

    /// Hand a staged context to the transport unless a newer one already went.
    async fn send(&self, outgoing: Outgoing) -> std::result::Result<(), SyncError> {
        let mut last_sent = self.outbox.lock().await;
        if outgoing.seq <= *last_sent {
            tracing::debug!("{} skipped superseded update #{}", self.id, outgoing.seq);
            return Ok(());
        }
        *last_sent = outgoing.seq;
        self.transport.update_context(outgoing.context).await
    }

    /// Best-effort send.
    async fn publish(&self, outgoing: Outgoing) {
        if let Err(e) = self.send(outgoing).await {
            tracing::warn!("{} could not publish update: {}", self.id, e);
        }
    }

    fn notify(&self, change: StateChange) {
        // No subscribers is fine.
        let _ = self.events.send(change);
    }
}

/// Seconds since the Unix epoch.
fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
