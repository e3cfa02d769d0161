//! Property tests for request signatures

use beacon_core::crypto::{authorization_header, Keypair, SignatureVerifier};
use beacon_core::{Error, Identity, IdentityRecord, KeyDirectory, MemoryDirectory};
use proptest::prelude::*;
use std::sync::Arc;

const ALICE: &str = "alice@example.com";

fn verifier_for(keypair: &Keypair) -> SignatureVerifier {
    let directory = Arc::new(MemoryDirectory::new());
    directory
        .add(IdentityRecord::new(Identity::new(ALICE).unwrap(), keypair.public_key()))
        .unwrap();
    SignatureVerifier::new(directory)
}

fn flip_bit(bytes: &mut [u8], bit: usize) {
    let bit = bit % (bytes.len() * 8);
    bytes[bit / 8] ^= 1 << (bit % 8);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn signed_body_accepted(body in proptest::collection::vec(any::<u8>(), 0..512)) {
        let keypair = Keypair::generate();
        let verifier = verifier_for(&keypair);
        let header = authorization_header(&keypair.sign_request(&body));

        prop_assert!(verifier.verify(ALICE, &body, Some(header.as_str())).is_ok());
    }

    #[test]
    fn flipped_body_bit_rejected(
        body in proptest::collection::vec(any::<u8>(), 1..512),
        bit in any::<usize>(),
    ) {
        let keypair = Keypair::generate();
        let verifier = verifier_for(&keypair);
        let header = authorization_header(&keypair.sign_request(&body));

        let mut tampered = body.clone();
        flip_bit(&mut tampered, bit);

        let result = verifier.verify(ALICE, &tampered, Some(header.as_str()));
        prop_assert!(matches!(result, Err(Error::Unauthorized)));
    }

    #[test]
    fn flipped_signature_bit_rejected(
        body in proptest::collection::vec(any::<u8>(), 0..512),
        bit in any::<usize>(),
    ) {
        let keypair = Keypair::generate();
        let verifier = verifier_for(&keypair);

        let mut signature = hex::decode(keypair.sign_request(&body)).unwrap();
        flip_bit(&mut signature, bit);
        let header = authorization_header(&hex::encode(signature));

        let result = verifier.verify(ALICE, &body, Some(header.as_str()));
        prop_assert!(matches!(result, Err(Error::Unauthorized)));
    }
}
