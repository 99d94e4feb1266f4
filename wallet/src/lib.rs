//! Agora Wallet
//!
//! Key generation and storage, address rendering, and a Freeze-transaction
//! builder for turning a spendable UTXO into enrollment-eligible stake
//! (spec §4.5, §6).

use agora_core::address::{AccountId, SeedAddress};
use agora_core::crypto::{key_pair_from_seed, key_pair_random, sign};
use agora_core::{Error, Hash, KeyPair, Result, TxInput, TxKind, TxOutput, Transaction};

/// A single key pair plus the address strings derived from it.
pub struct WalletKeyStore {
    pub key_pair: KeyPair,
}

impl WalletKeyStore {
    /// Generates a fresh key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self { key_pair: key_pair_random() }
    }

    /// Restores a key pair from its strkey-encoded seed phrase
    /// (`SeedAddress`, the 56-character string starting with `'S'`).
    pub fn from_seed_phrase(phrase: &str) -> Result<Self> {
        let seed_address = SeedAddress::from_string(phrase)?;
        Ok(Self { key_pair: key_pair_from_seed(&seed_address.0) })
    }

    /// The wallet's public strkey address (the 56-character string
    /// starting with `'G'`).
    pub fn to_address(&self) -> String {
        AccountId(self.key_pair.public).to_string()
    }

    /// Builds a single-input, single-output `Freeze` transaction spending
    /// `prev_tx`/`output_index` to a new frozen output of `amount` owned by
    /// this wallet, signed and ready to broadcast. Does not check that
    /// `amount` meets `min_freeze_amount` or that the referenced output
    /// actually exists and is spendable by this key — the validator checks
    /// both at acceptance time.
    pub fn build_freeze_tx(&self, prev_tx: Hash, output_index: u32, amount: u64) -> Transaction {
        let unsigned = Transaction {
            kind: TxKind::Freeze,
            inputs: vec![TxInput {
                prev_tx,
                output_index,
                signature: agora_core::Signature([0u8; 64]),
            }],
            outputs: vec![TxOutput { amount, destination: self.key_pair.public }],
        };
        let message = unsigned.signing_message();
        let signature = sign(&self.key_pair.secret, &message);
        Transaction {
            kind: unsigned.kind,
            inputs: vec![TxInput { prev_tx, output_index, signature }],
            outputs: unsigned.outputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_wallet_round_trips_through_its_address() {
        let wallet = WalletKeyStore::generate();
        let address = AccountId(wallet.key_pair.public).to_string();
        assert_eq!(wallet.to_address(), address);
        assert!(address.starts_with('G'));
    }

    #[test]
    fn from_seed_phrase_rejects_garbage() {
        let err = WalletKeyStore::from_seed_phrase("not a seed").unwrap_err();
        assert!(matches!(err, Error::MalformedAddress(_)));
    }

    #[test]
    fn build_freeze_tx_produces_a_verifiable_signature() {
        let wallet = WalletKeyStore::generate();
        let prev_tx = Hash([9u8; 64]);
        let tx = wallet.build_freeze_tx(prev_tx, 0, 40_000_000_000);
        assert_eq!(tx.kind, TxKind::Freeze);
        assert!(agora_core::crypto::verify(
            &wallet.key_pair.public,
            &tx.inputs[0].signature,
            &tx.signing_message(),
        ));
    }
}
