//! Consensus driver (spec §4.8).
//!
//! The federated-agreement engine itself is an external collaborator
//! (spec §1): this module only defines the seam, [`AgreementEngine`], and
//! the quorum-set derivation the driver feeds it.

use agora_core::config::{Config, ThresholdMode};
use agora_core::{Hash, PublicKey};

/// The quorum-slice configuration handed to the agreement engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuorumSet {
    pub validators: Vec<PublicKey>,
    pub threshold: usize,
}

/// Derives this node's quorum set from the known validator set (spec §4.8,
/// §9 Open Question on threshold policy).
pub fn derive_quorum_set(known_validators: &[PublicKey], mode: ThresholdMode) -> QuorumSet {
    let n = known_validators.len();
    let threshold = match mode {
        ThresholdMode::LegacyFullAgreement => n,
        ThresholdMode::Bft => (2 * n) / 3 + 1,
    };
    QuorumSet {
        validators: known_validators.to_vec(),
        threshold,
    }
}

/// The seam to the out-of-scope federated-agreement engine: envelope
/// exchange and externalization callbacks (spec §1, §4.8). `Envelope` is
/// opaque to this crate; the driver only ever passes candidate-block
/// hashes through it.
pub trait AgreementEngine {
    type Envelope;

    /// Proposes `candidate` (a block hash) for nomination at `height`.
    fn nominate(&mut self, height: u64, candidate: Hash) -> Self::Envelope;

    /// Drains externalized values the engine has settled on since the last
    /// call, as `(height, block_hash)` pairs.
    fn externalize_rx(&mut self) -> Vec<(u64, Hash)>;

    /// Installs a new quorum set, e.g. after a validator-set rollover.
    fn set_quorum_set(&mut self, quorum_set: QuorumSet);
}

/// Bridges an [`AgreementEngine`] to ledger state: resolves externalized
/// hashes against the transaction pool to produce concrete blocks and
/// recomputes the quorum set as enrollments change.
pub struct ConsensusDriver<E: AgreementEngine> {
    engine: E,
    config: Config,
}

impl<E: AgreementEngine> ConsensusDriver<E> {
    pub fn new(engine: E, config: Config) -> Self {
        Self { engine, config }
    }

    /// Proposes a candidate block hash for `height`.
    pub fn nominate(&mut self, height: u64, candidate: Hash) -> E::Envelope {
        self.engine.nominate(height, candidate)
    }

    /// Drains externalization events reported since the last poll.
    pub fn poll_externalized(&mut self) -> Vec<(u64, Hash)> {
        self.engine.externalize_rx()
    }

    /// Recomputes and installs the quorum set from the current validator
    /// public keys (spec §4.8: "derives this node's quorum set from the
    /// network configuration").
    pub fn refresh_quorum_set(&mut self, known_validators: &[PublicKey]) {
        let quorum_set = derive_quorum_set(known_validators, self.config.threshold_mode);
        self.engine.set_quorum_set(quorum_set);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_mode_requires_full_agreement() {
        let validators = vec![PublicKey([1; 32]), PublicKey([2; 32]), PublicKey([3; 32])];
        let qs = derive_quorum_set(&validators, ThresholdMode::LegacyFullAgreement);
        assert_eq!(qs.threshold, 3);
    }

    #[test]
    fn bft_mode_uses_two_thirds_plus_one() {
        let validators: Vec<PublicKey> = (0..6u8).map(|i| PublicKey([i; 32])).collect();
        let qs = derive_quorum_set(&validators, ThresholdMode::Bft);
        assert_eq!(qs.threshold, 5);
    }

    struct FakeEngine {
        quorum_set: Option<QuorumSet>,
        externalized: Vec<(u64, Hash)>,
    }

    impl AgreementEngine for FakeEngine {
        type Envelope = Hash;

        fn nominate(&mut self, _height: u64, candidate: Hash) -> Self::Envelope {
            candidate
        }

        fn externalize_rx(&mut self) -> Vec<(u64, Hash)> {
            std::mem::take(&mut self.externalized)
        }

        fn set_quorum_set(&mut self, quorum_set: QuorumSet) {
            self.quorum_set = Some(quorum_set);
        }
    }

    #[test]
    fn driver_refreshes_quorum_set_on_the_engine() {
        let engine = FakeEngine {
            quorum_set: None,
            externalized: vec![(1, Hash::ZERO)],
        };
        let mut driver = ConsensusDriver::new(engine, Config::default());
        let validators = vec![PublicKey([9; 32])];
        driver.refresh_quorum_set(&validators);
        assert_eq!(driver.engine.quorum_set.as_ref().unwrap().threshold, 1);
        assert_eq!(driver.poll_externalized(), vec![(1, Hash::ZERO)]);
    }
}
