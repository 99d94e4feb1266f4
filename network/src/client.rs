//! Network peer client (spec §4.9).
//!
//! `PeerTransport` is the thin seam over the actual wire (a real gossip
//! transport in production, an in-memory stub in tests); `PeerClient` wraps
//! it with the shared retry/backoff/ban machinery every call goes through.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use agora_core::{Block, Enrollment, Hash, PublicKey, Transaction, UtxoKey};

use crate::ban::{BanManager, Clock};

#[derive(Debug, Clone, thiserror::Error)]
#[error("transport failure: {0}")]
pub struct TransportError(pub String);

/// Call-site policy for what `attempt_request` does once retries are
/// exhausted (spec §4.9 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Surface the failure to the caller.
    Yes,
    /// Swallow the failure and return the caller-supplied zero value.
    No,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NodeInfo {
    pub network: String,
    pub height: u64,
}

/// The raw remote calls (spec §4.9), one round trip each. Implementations
/// provide the actual wire encoding/transport; this crate only shapes the
/// retry and ban logic around them.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn get_public_key(&self) -> Result<PublicKey, TransportError>;
    async fn get_node_info(&self) -> Result<NodeInfo, TransportError>;
    async fn get_block_height(&self) -> Result<u64, TransportError>;
    async fn get_blocks_from(&self, start: u64, max: u32) -> Result<Vec<Block>, TransportError>;
    async fn put_transaction(&self, tx: Transaction) -> Result<(), TransportError>;
    async fn has_transaction_hash(&self, hash: Hash) -> Result<bool, TransportError>;
    async fn enroll_validator(&self, enrollment: Enrollment) -> Result<(), TransportError>;
    async fn get_enrollment(&self, utxo_key: UtxoKey) -> Result<Option<Enrollment>, TransportError>;
    async fn receive_preimage(&self, utxo_key: UtxoKey, height: u64, preimage: Hash) -> Result<(), TransportError>;
    async fn receive_envelope(&self, envelope: Vec<u8>) -> Result<(), TransportError>;
    async fn register_listener(&self, listener_addr: String) -> Result<(), TransportError>;
}

/// Wraps a [`PeerTransport`] with the shared `attempt_request` retry/ban
/// loop (spec §4.9). Cheap to clone: the transport and ban manager are
/// both reference-counted, so fire-and-forget calls can move an owned
/// clone onto a spawned task.
#[derive(Clone)]
pub struct PeerClient<T, C>
where
    T: PeerTransport + Clone + 'static,
    C: Clock + Send + 'static,
{
    transport: T,
    peer_address: String,
    ban_manager: Arc<Mutex<BanManager<C>>>,
    retry_delay: Duration,
    max_retries: u32,
}

impl<T, C> PeerClient<T, C>
where
    T: PeerTransport + Clone + 'static,
    C: Clock + Send + 'static,
{
    pub fn new(
        transport: T,
        peer_address: String,
        ban_manager: Arc<Mutex<BanManager<C>>>,
        retry_delay: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            transport,
            peer_address,
            ban_manager,
            retry_delay,
            max_retries,
        }
    }

    pub fn peer_address(&self) -> &str {
        &self.peer_address
    }

    /// The retry/backoff/ban loop every RPC method below routes through
    /// (spec §4.9 steps 1-4).
    async fn attempt_request<R, Fut, F>(&self, policy: Policy, zero: R, mut call: F) -> Result<R, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, TransportError>>,
    {
        let mut attempts = 0u32;
        loop {
            match call().await {
                Ok(value) => {
                    self.ban_manager.lock().await.on_successful_request(&self.peer_address);
                    return Ok(value);
                }
                Err(err) => {
                    attempts += 1;
                    tracing::warn!(
                        "request to {} failed (attempt {attempts}/{}): {err}",
                        self.peer_address,
                        self.max_retries
                    );
                    if attempts >= self.max_retries {
                        self.ban_manager.lock().await.on_failed_request(&self.peer_address);
                        return match policy {
                            Policy::Yes => Err(err),
                            Policy::No => Ok(zero),
                        };
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    pub async fn get_public_key(&self, policy: Policy) -> Result<PublicKey, TransportError> {
        self.attempt_request(policy, PublicKey([0; 32]), || self.transport.get_public_key()).await
    }

    pub async fn get_node_info(&self, policy: Policy) -> Result<NodeInfo, TransportError> {
        self.attempt_request(
            policy,
            NodeInfo { network: String::new(), height: 0 },
            || self.transport.get_node_info(),
        )
        .await
    }

    pub async fn get_block_height(&self, policy: Policy) -> Result<u64, TransportError> {
        self.attempt_request(policy, 0, || self.transport.get_block_height()).await
    }

    pub async fn get_blocks_from(&self, start: u64, max: u32, policy: Policy) -> Result<Vec<Block>, TransportError> {
        self.attempt_request(policy, Vec::new(), || self.transport.get_blocks_from(start, max)).await
    }

    pub async fn put_transaction(&self, tx: Transaction, policy: Policy) -> Result<(), TransportError> {
        self.attempt_request(policy, (), || self.transport.put_transaction(tx.clone())).await
    }

    pub async fn has_transaction_hash(&self, hash: Hash, policy: Policy) -> Result<bool, TransportError> {
        self.attempt_request(policy, false, || self.transport.has_transaction_hash(hash)).await
    }

    pub async fn enroll_validator(&self, enrollment: Enrollment, policy: Policy) -> Result<(), TransportError> {
        self.attempt_request(policy, (), || self.transport.enroll_validator(enrollment.clone())).await
    }

    pub async fn get_enrollment(&self, utxo_key: UtxoKey, policy: Policy) -> Result<Option<Enrollment>, TransportError> {
        self.attempt_request(policy, None, || self.transport.get_enrollment(utxo_key)).await
    }

    pub async fn receive_preimage(&self, utxo_key: UtxoKey, height: u64, preimage: Hash, policy: Policy) -> Result<(), TransportError> {
        self.attempt_request(policy, (), || self.transport.receive_preimage(utxo_key, height, preimage)).await
    }

    pub async fn receive_envelope(&self, envelope: Vec<u8>, policy: Policy) -> Result<(), TransportError> {
        self.attempt_request(policy, (), || self.transport.receive_envelope(envelope.clone())).await
    }

    pub async fn register_listener(&self, listener_addr: String, policy: Policy) -> Result<(), TransportError> {
        self.attempt_request(policy, (), || self.transport.register_listener(listener_addr.clone())).await
    }

    /// Fire-and-forget: spawns an independent task so the caller never
    /// blocks, and never surfaces a failure (spec §4.9). First checks
    /// `has_transaction_hash` and skips the push if the peer already has
    /// the transaction.
    pub fn send_transaction(&self, tx: Transaction) {
        let client = self.clone();
        tokio::spawn(async move {
            let hash = tx.hash();
            match client.has_transaction_hash(hash, Policy::No).await {
                Ok(true) => {}
                _ => {
                    let _ = client.put_transaction(tx, Policy::No).await;
                }
            }
        });
    }

    pub fn send_envelope(&self, envelope: Vec<u8>) {
        let client = self.clone();
        tokio::spawn(async move {
            let _ = client.receive_envelope(envelope, Policy::No).await;
        });
    }

    pub fn send_enrollment(&self, enrollment: Enrollment) {
        let client = self.clone();
        tokio::spawn(async move {
            let _ = client.enroll_validator(enrollment, Policy::No).await;
        });
    }

    pub fn send_preimage(&self, utxo_key: UtxoKey, height: u64, preimage: Hash) {
        let client = self.clone();
        tokio::spawn(async move {
            let _ = client.receive_preimage(utxo_key, height, preimage, Policy::No).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ban::FakeClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Clone)]
    struct FlakyTransport {
        fail_times: Arc<AtomicU32>,
    }

    #[async_trait]
    impl PeerTransport for FlakyTransport {
        async fn get_public_key(&self) -> Result<PublicKey, TransportError> {
            Ok(PublicKey([7; 32]))
        }
        async fn get_node_info(&self) -> Result<NodeInfo, TransportError> {
            Ok(NodeInfo { network: "test".into(), height: 3 })
        }
        async fn get_block_height(&self) -> Result<u64, TransportError> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(TransportError("boom".into()));
            }
            Ok(42)
        }
        async fn get_blocks_from(&self, _start: u64, _max: u32) -> Result<Vec<Block>, TransportError> {
            Ok(Vec::new())
        }
        async fn put_transaction(&self, _tx: Transaction) -> Result<(), TransportError> {
            Ok(())
        }
        async fn has_transaction_hash(&self, _hash: Hash) -> Result<bool, TransportError> {
            Ok(false)
        }
        async fn enroll_validator(&self, _enrollment: Enrollment) -> Result<(), TransportError> {
            Ok(())
        }
        async fn get_enrollment(&self, _utxo_key: UtxoKey) -> Result<Option<Enrollment>, TransportError> {
            Ok(None)
        }
        async fn receive_preimage(&self, _utxo_key: UtxoKey, _height: u64, _preimage: Hash) -> Result<(), TransportError> {
            Ok(())
        }
        async fn receive_envelope(&self, _envelope: Vec<u8>) -> Result<(), TransportError> {
            Ok(())
        }
        async fn register_listener(&self, _listener_addr: String) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn make_client(fail_times: u32) -> PeerClient<FlakyTransport, FakeClock> {
        let ban_manager = Arc::new(Mutex::new(BanManager::new(FakeClock::new(), 32, Duration::from_secs(60))));
        PeerClient::new(
            FlakyTransport { fail_times: Arc::new(AtomicU32::new(fail_times)) },
            "peer-x".into(),
            ban_manager,
            Duration::from_millis(1),
            3,
        )
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let client = make_client(2);
        let height = client.get_block_height(Policy::Yes).await.unwrap();
        assert_eq!(height, 42);
    }

    #[tokio::test]
    async fn exhausts_retries_and_bans_under_yes_policy() {
        let client = make_client(10);
        let result = client.get_block_height(Policy::Yes).await;
        assert!(result.is_err());
        assert!(client.ban_manager.lock().await.is_banned("peer-x"));
    }

    #[tokio::test]
    async fn exhausts_retries_and_returns_zero_under_no_policy() {
        let client = make_client(10);
        let result = client.get_block_height(Policy::No).await;
        assert_eq!(result.unwrap(), 0);
    }
}
