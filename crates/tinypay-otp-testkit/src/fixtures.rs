//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: a phone and a watch joined by
//! an in-memory link, each with its own in-memory store.

use std::sync::Arc;
use std::time::Duration;

use rand::distributions::Alphanumeric;
use rand::Rng;

use tinypay_otp::{DeviceConfig, DeviceRole, PeerDevice, Result};
use tinypay_otp_store::MemoryStore;
use tinypay_otp_sync::{verify_convergence, MemoryEndpoint, MemoryLink, ReconcileOutcome, Transport};

/// A device backed by memory on both sides.
pub type MemoryDevice = PeerDevice<Arc<MemoryStore>, MemoryEndpoint>;

/// How long [`PairedDevices::deliver_to_watch`] waits for a pending context.
pub const DELIVERY_WAIT: Duration = Duration::from_millis(100);

/// A phone and a watch joined by a [`MemoryLink`].
pub struct PairedDevices {
    pub phone: Arc<MemoryDevice>,
    pub watch: Arc<MemoryDevice>,
    pub phone_store: Arc<MemoryStore>,
    pub watch_store: Arc<MemoryStore>,
    pub link: MemoryLink,
}

impl PairedDevices {
    /// Two fresh devices with no chain.
    pub async fn new() -> Result<Self> {
        let (phone_link, watch_link) = MemoryLink::pair();
        let link = phone_link.link();
        let phone_store = Arc::new(MemoryStore::new());
        let watch_store = Arc::new(MemoryStore::new());

        let phone = PeerDevice::open(
            DeviceConfig::for_role(DeviceRole::Phone),
            Arc::clone(&phone_store),
            phone_link,
        )
        .await?;
        let watch = PeerDevice::open(
            DeviceConfig::for_role(DeviceRole::Watch),
            Arc::clone(&watch_store),
            watch_link,
        )
        .await?;

        Ok(Self {
            phone: Arc::new(phone),
            watch: Arc::new(watch),
            phone_store,
            watch_store,
            link,
        })
    }

    /// Two devices sharing a chain: the root is entered on the phone and
    /// its announcement delivered to the watch.
    pub async fn with_root(root: &str, payer_address: &str) -> Result<Self> {
        let pair = Self::new().await?;
        pair.phone.submit_root(root, payer_address).await?;
        pair.deliver_to_watch().await?;
        Ok(pair)
    }

    /// Apply whatever the phone last sent. `None` if nothing is pending.
    pub async fn deliver_to_watch(&self) -> Result<Option<ReconcileOutcome>> {
        deliver(&self.watch).await
    }

    /// Apply whatever the watch last sent. `None` if nothing is pending.
    pub async fn deliver_to_phone(&self) -> Result<Option<ReconcileOutcome>> {
        deliver(&self.phone).await
    }

    /// Deliver in both directions.
    pub async fn exchange(&self) -> Result<()> {
        self.deliver_to_watch().await?;
        self.deliver_to_phone().await?;
        Ok(())
    }

    /// Whether both devices would show the same code.
    pub async fn is_converged(&self) -> bool {
        verify_convergence(&self.phone.state().await, &self.watch.state().await).is_converged()
    }
}

async fn deliver(device: &MemoryDevice) -> Result<Option<ReconcileOutcome>> {
    match device.transport().recv_timeout(DELIVERY_WAIT).await? {
        Some(context) => Ok(Some(device.handle_incoming(&context).await?)),
        None => Ok(None),
    }
}

/// A random alphanumeric root secret.
pub fn random_root() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinypay_otp_store::StateStore;

    #[tokio::test]
    async fn test_fresh_pair_not_converged() {
        let pair = PairedDevices::new().await.unwrap();
        assert!(!pair.is_converged().await);
        assert!(pair.deliver_to_watch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_with_root_converges() {
        let pair = PairedDevices::with_root(&random_root(), "0xpayer").await.unwrap();
        assert!(pair.is_converged().await);
        assert!(pair.watch_store.load_state().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_exchange_after_offline_use() {
        let pair = PairedDevices::with_root("fixture", "0xpayer").await.unwrap();

        pair.link.set_reachable(false);
        pair.phone.consume_one().await.unwrap();
        pair.watch.consume_one().await.unwrap();
        pair.watch.consume_one().await.unwrap();
        pair.link.set_reachable(true);

        pair.exchange().await.unwrap();
        assert!(pair.is_converged().await);
        assert_eq!(pair.phone.state().await.cursor(), 996);
    }

    #[test]
    fn test_random_roots_differ() {
        let a = random_root();
        assert_eq!(a.len(), 24);
        assert_ne!(a, random_root());
    }
}
