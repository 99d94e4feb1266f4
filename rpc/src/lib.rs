//! Agora RPC
//!
//! The JSON-RPC method contract matching the peer-client surface (spec
//! §4.9), built with `jsonrpsee`'s server macro. This crate names the
//! methods and their argument/return shapes; it does not stand up an HTTP
//! server or wire any transport — that is left to `agora-cli`.

use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use agora_core::{Block, Enrollment, Hash, PublicKey, Transaction, UtxoKey};
use agora_network::NodeInfo;

#[rpc(server)]
pub trait AgoraApi {
    #[method(name = "getPublicKey")]
    async fn get_public_key(&self) -> RpcResult<PublicKey>;

    #[method(name = "getNodeInfo")]
    async fn get_node_info(&self) -> RpcResult<NodeInfo>;

    #[method(name = "getBlockHeight")]
    async fn get_block_height(&self) -> RpcResult<u64>;

    #[method(name = "getBlocksFrom")]
    async fn get_blocks_from(&self, start: u64, max: u32) -> RpcResult<Vec<Block>>;

    #[method(name = "putTransaction")]
    async fn put_transaction(&self, tx: Transaction) -> RpcResult<()>;

    #[method(name = "hasTransactionHash")]
    async fn has_transaction_hash(&self, hash: Hash) -> RpcResult<bool>;

    #[method(name = "enrollValidator")]
    async fn enroll_validator(&self, enrollment: Enrollment) -> RpcResult<()>;

    #[method(name = "getEnrollment")]
    async fn get_enrollment(&self, utxo_key: UtxoKey) -> RpcResult<Option<Enrollment>>;

    #[method(name = "receivePreimage")]
    async fn receive_preimage(&self, utxo_key: UtxoKey, height: u64, preimage: Hash) -> RpcResult<()>;

    #[method(name = "receiveEnvelope")]
    async fn receive_envelope(&self, envelope: Vec<u8>) -> RpcResult<()>;

    #[method(name = "registerListener")]
    async fn register_listener(&self, listener_addr: String) -> RpcResult<()>;
}
