//! Primitives: content-addressed hashing, Ed25519 keys/signatures, and the
//! Curve25519 Schnorr construction used by enrollments (spec §4.1).

use blake2::{Blake2b512, Digest};
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::Signer;
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use zeroize::Zeroize;

use crate::error::{Error, Result};
use crate::wire::CanonicalSerialize;

/// A fixed 64-byte opaque content-addressed hash (spec §3).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 64]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 64]);

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl CanonicalSerialize for Hash {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (bytes, n) = <[u8; 64]>::canonical_read(buf)?;
        Ok((Hash(bytes), n))
    }
}

/// 32-byte Ed25519 public key. Renders to a human string beginning with
/// `'G'` via [`crate::address`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl CanonicalSerialize for PublicKey {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (bytes, n) = <[u8; 32]>::canonical_read(buf)?;
        Ok((PublicKey(bytes), n))
    }
}

/// 32-byte Ed25519 seed. Renders to a human string beginning with `'S'`.
/// Zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Seed(pub [u8; 32]);

/// 64-byte Ed25519 secret key in libsodium form: `seed(32) ‖ public(32)`.
/// Zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey(pub [u8; 64]);

impl SecretKey {
    fn seed_bytes(&self) -> [u8; 32] {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&self.0[..32]);
        seed
    }

    fn public_bytes(&self) -> [u8; 32] {
        let mut public = [0u8; 32];
        public.copy_from_slice(&self.0[32..]);
        public
    }
}

/// 64-byte Ed25519 detached signature.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub [u8; 64]);

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

impl CanonicalSerialize for Signature {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (bytes, n) = <[u8; 64]>::canonical_read(buf)?;
        Ok((Signature(bytes), n))
    }
}

/// An Ed25519 key pair: public key plus the matching secret.
pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

/// Derives a deterministic key pair from a 32-byte seed.
pub fn key_pair_from_seed(seed: &Seed) -> KeyPair {
    let sk = ed25519_dalek::SecretKey::from_bytes(&seed.0).expect("32-byte seed is always valid");
    let pk = ed25519_dalek::PublicKey::from(&sk);
    let mut secret_bytes = [0u8; 64];
    secret_bytes[..32].copy_from_slice(&seed.0);
    secret_bytes[32..].copy_from_slice(pk.as_bytes());
    KeyPair {
        public: PublicKey(pk.to_bytes()),
        secret: SecretKey(secret_bytes),
    }
}

/// Generates a fresh key pair from the OS CSPRNG.
pub fn key_pair_random() -> KeyPair {
    use rand::RngCore;
    let mut seed_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed_bytes);
    key_pair_from_seed(&Seed(seed_bytes))
}

/// Produces a detached Ed25519 signature over `msg`.
pub fn sign(secret: &SecretKey, msg: &[u8]) -> Signature {
    let sk = ed25519_dalek::SecretKey::from_bytes(&secret.seed_bytes())
        .expect("secret key holds a valid 32-byte seed");
    let pk = ed25519_dalek::PublicKey::from_bytes(&secret.public_bytes())
        .expect("secret key holds a valid public half");
    let keypair = ed25519_dalek::Keypair { secret: sk, public: pk };
    Signature(keypair.sign(msg).to_bytes())
}

/// Verifies a detached Ed25519 signature. Never panics; malformed key or
/// signature bytes simply fail verification.
pub fn verify(public: &PublicKey, sig: &Signature, msg: &[u8]) -> bool {
    let pk = match ed25519_dalek::PublicKey::from_bytes(&public.0) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let signature = match ed25519_dalek::Signature::from_bytes(&sig.0) {
        Ok(sig) => sig,
        Err(_) => return false,
    };
    pk.verify_strict(msg, &signature).is_ok()
}

/// Converts an Ed25519 secret's seed half into the same clamped scalar
/// `ed25519-dalek` derives internally for signing (RFC 8032 §5.1.5:
/// SHA-512 the seed, clamp the low half). Because Ed25519 public keys are
/// defined as `scalar * ED25519_BASEPOINT`, this scalar's public point is
/// exactly the node's existing [`PublicKey`] reinterpreted as an Edwards
/// point — see [`ed25519_public_to_curve_point`].
pub fn ed25519_secret_to_curve_scalar(secret: &SecretKey) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(secret.seed_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest[..32]);
    bytes[0] &= 248;
    bytes[31] &= 127;
    bytes[31] |= 64;
    Scalar::from_bits(bytes)
}

/// Reconstructs the Curve25519 Edwards point behind an Ed25519 public key,
/// with no secret material required: an Ed25519 [`PublicKey`] already *is*
/// the compressed form of `scalar * ED25519_BASEPOINT` (spec §4.5:
/// "verification reconstructs the scalar's public point from the Ed25519
/// public key"). Returns `None` for bytes that do not decode to a valid
/// curve point.
pub fn ed25519_public_to_curve_point(public: &PublicKey) -> Option<EdwardsPoint> {
    CompressedEdwardsY(public.0).decompress()
}

/// A Schnorr signature over the Edwards25519 group (the same group
/// Ed25519 public keys live in), used only by enrollments (spec §4.5).
/// Encodes as `R(32) ‖ s(32)`.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchnorrSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl CanonicalSerialize for SchnorrSignature {
    fn canonical_write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.r);
        out.extend_from_slice(&self.s);
    }
    fn canonical_read(buf: &[u8]) -> Result<(Self, usize)> {
        let (r, n1) = <[u8; 32]>::canonical_read(buf)?;
        let (s, n2) = <[u8; 32]>::canonical_read(&buf[n1..])?;
        Ok((SchnorrSignature { r, s }, n1 + n2))
    }
}

fn schnorr_challenge(commitment: &CompressedEdwardsY, point: &EdwardsPoint, msg: &[u8]) -> Scalar {
    let mut preimage = Vec::with_capacity(64 + msg.len());
    preimage.extend_from_slice(commitment.as_bytes());
    preimage.extend_from_slice(point.compress().as_bytes());
    preimage.extend_from_slice(msg);
    Scalar::hash_from_bytes::<Sha512>(&preimage)
}

/// Signs `msg` with a Curve25519 scalar (spec §4.1/§4.5). The nonce is
/// derived deterministically from the scalar and message (RFC 6979-style)
/// rather than drawn from an RNG, so enrollment signing never depends on
/// an external entropy source at the call site.
pub fn schnorr_sign(scalar: &Scalar, msg: &[u8]) -> SchnorrSignature {
    let mut nonce_preimage = Vec::with_capacity(32 + msg.len());
    nonce_preimage.extend_from_slice(scalar.as_bytes());
    nonce_preimage.extend_from_slice(msg);
    let nonce = Scalar::hash_from_bytes::<Sha512>(&nonce_preimage);

    let commitment_point = &nonce * &ED25519_BASEPOINT_TABLE;
    let commitment = commitment_point.compress();
    let public_point = scalar * &ED25519_BASEPOINT_TABLE;
    let challenge = schnorr_challenge(&commitment, &public_point, msg);
    let response = nonce + challenge * scalar;

    SchnorrSignature {
        r: commitment.to_bytes(),
        s: response.to_bytes(),
    }
}

/// Verifies a [`SchnorrSignature`] against the Edwards point corresponding
/// to a signer's scalar (i.e. their Ed25519 public key, see
/// [`ed25519_public_to_curve_point`]). Never panics.
pub fn schnorr_verify(point: &EdwardsPoint, sig: &SchnorrSignature, msg: &[u8]) -> bool {
    let commitment = match CompressedEdwardsY(sig.r).decompress() {
        Some(point) => point,
        None => return false,
    };
    let response = match Option::<Scalar>::from(Scalar::from_canonical_bytes(sig.s)) {
        Some(scalar) => scalar,
        None => return false,
    };
    let commitment_compressed = commitment.compress();
    let challenge = schnorr_challenge(&commitment_compressed, point, msg);
    let lhs = &response * &ED25519_BASEPOINT_TABLE;
    let rhs = commitment + challenge * point;
    lhs == rhs
}

/// Derives the Edwards point corresponding to a Curve25519 scalar, i.e.
/// the public half used to verify a [`SchnorrSignature`] when the signer's
/// secret (rather than their existing Ed25519 public key) is at hand.
pub fn scalar_public_point(scalar: &Scalar) -> EdwardsPoint {
    scalar * &ED25519_BASEPOINT_TABLE
}

/// Feeds the canonical encoding of `value` into the Blake2b-512 sponge that
/// produces every other hash in the system (spec §3). Any change to
/// [`CanonicalSerialize`]'s output for a type is, by definition, a hard
/// fork.
pub fn hash_full<T: CanonicalSerialize>(value: &T) -> Hash {
    let encoded = value.canonical_encode();
    let digest = Blake2b512::digest(&encoded);
    let mut bytes = [0u8; 64];
    bytes.copy_from_slice(&digest);
    Hash(bytes)
}

/// Hashes raw bytes directly, used for the enrollment pre-image chain
/// (`h_{i+1} = hash(h_i)`) where there is no composite value to serialize.
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    let digest = Blake2b512::digest(bytes);
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    Hash(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let kp = key_pair_from_seed(&Seed([7u8; 32]));
        let msg = b"Hello World";
        let sig = sign(&kp.secret, msg);
        assert!(verify(&kp.public, &sig, msg));
        assert!(!verify(&kp.public, &sig, b"Hello World?"));

        let mut tampered = sig;
        tampered.0[0] ^= 0xff;
        assert!(!verify(&kp.public, &tampered, msg));

        let other = key_pair_from_seed(&Seed([9u8; 32]));
        assert!(!verify(&other.public, &sig, msg));
    }

    #[test]
    fn schnorr_round_trip() {
        let kp = key_pair_from_seed(&Seed([3u8; 32]));
        let scalar = ed25519_secret_to_curve_scalar(&kp.secret);
        let point = scalar_public_point(&scalar);
        let msg = b"enrollment";
        let sig = schnorr_sign(&scalar, msg);
        assert!(schnorr_verify(&point, &sig, msg));
        assert!(!schnorr_verify(&point, &sig, b"other"));
    }

    #[test]
    fn schnorr_verifies_against_existing_ed25519_public_key() {
        let kp = key_pair_from_seed(&Seed([5u8; 32]));
        let scalar = ed25519_secret_to_curve_scalar(&kp.secret);
        let from_scalar = scalar_public_point(&scalar);
        let from_public = ed25519_public_to_curve_point(&kp.public).expect("valid point");
        assert_eq!(from_scalar, from_public);

        let sig = schnorr_sign(&scalar, b"stake");
        assert!(schnorr_verify(&from_public, &sig, b"stake"));
    }

    #[test]
    fn hash_is_deterministic_and_distinct() {
        let a = hash_bytes(b"a");
        let a2 = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        assert_eq!(a, a2);
        assert_ne!(a, b);
    }
}
