use agora_core::address::{AccountId, SeedAddress};
use agora_core::crypto::{key_pair_from_seed, sign, verify};

#[test]
fn s1_address_round_trip() {
    let addr = "GDD5RFGBIUAFCOXQA246BOUPHCK7ZL2NSHDU7DVAPNPTJJKVPJMNLQFW";
    let decoded = AccountId::from_string(addr).expect("valid address");
    assert_eq!(decoded.to_string(), addr);
}

#[test]
fn s2_signing_round_trip() {
    let seed_str = "SBBUWIMSX5VL4KVFKY44GF6Q6R5LS2Z5B7CTAZBNCNPLS4UKFVDXC7TQ";
    let seed = SeedAddress::from_string(seed_str).expect("valid seed").0;
    let kp = key_pair_from_seed(&seed);

    let msg = b"Hello World";
    let sig = sign(&kp.secret, msg);
    assert!(verify(&kp.public, &sig, msg));
    assert!(!verify(&kp.public, &sig, b"Hello World?"));

    let mut flipped = sig;
    flipped.0[0] ^= 1;
    assert!(!verify(&kp.public, &flipped, msg));

    let other = agora_core::crypto::key_pair_random();
    assert!(!verify(&other.public, &sig, msg));
}
