//! # Canonical Hash Properties
//!
//! Known vectors pin the digest format against values produced by the
//! deployed issuance service (SHA-256 over the plain field concatenation).
//! Property tests check that every field, and the field order, affects the
//! digest.

use certichain_core::{canonical_hash, CertificateFields, VerificationBundle};
use proptest::prelude::*;

const LOCATOR: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";
const ADDRESS: &str = "0x00000000000000000000000000000000000000aa";

fn fields(grade: Option<&'static str>) -> CertificateFields<'static> {
    CertificateFields {
        locator: LOCATOR,
        subject_name: "Ada Lovelace",
        issuer_name: "Analytical University",
        program_name: "BSc Mathematics",
        issue_date: "2024-06-01",
        issuer_address: ADDRESS,
        issuer_public_key: "PUBKEY",
        grade,
    }
}

#[test]
fn known_vector_with_grade() {
    assert_eq!(
        canonical_hash(&fields(Some("First"))).to_string(),
        "0x37ce6d36e66b5e3529532ec4ae427fee6bb30419d934a098bf33954429654cbf"
    );
}

#[test]
fn known_vector_without_grade() {
    assert_eq!(
        canonical_hash(&fields(None)).to_string(),
        "0xae1ea65d2069e6d229e3b518a76f214911902069db4333daf698c3ccb42dce34"
    );
}

#[test]
fn bundle_and_issuance_fields_agree() {
    let payload = format!(
        "{LOCATOR}|Ada Lovelace|Analytical University|BSc Mathematics|2024-06-01|{ADDRESS}|PUBKEY|CERT-1|First"
    );
    let bundle = VerificationBundle::from_payload(&payload).unwrap();
    assert_eq!(bundle.canonical_hash(), canonical_hash(&fields(Some("First"))));
}

fn field_value() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ._-]{1,24}"
}

fn owned_fields() -> impl Strategy<Value = [String; 8]> {
    proptest::array::uniform8(field_value())
}

fn borrow(f: &[String; 8]) -> CertificateFields<'_> {
    CertificateFields {
        locator: &f[0],
        subject_name: &f[1],
        issuer_name: &f[2],
        program_name: &f[3],
        issue_date: &f[4],
        issuer_address: &f[5],
        issuer_public_key: &f[6],
        grade: Some(&f[7]),
    }
}

proptest! {
    #[test]
    fn hash_is_deterministic(f in owned_fields()) {
        prop_assert_eq!(canonical_hash(&borrow(&f)), canonical_hash(&borrow(&f)));
    }

    /// Appending a character to any single field changes the digest.
    #[test]
    fn every_field_contributes(f in owned_fields(), idx in 0usize..8, extra in "[a-z]") {
        let original = canonical_hash(&borrow(&f));
        let mut changed = f.clone();
        changed[idx].push_str(&extra);
        prop_assert_ne!(original, canonical_hash(&borrow(&changed)));
    }

    /// Swapping two distinct fields changes the digest unless the swap
    /// leaves the concatenation unchanged.
    #[test]
    fn field_order_matters(f in owned_fields(), a in 0usize..8, b in 0usize..8) {
        prop_assume!(a != b && f[a] != f[b]);
        let mut swapped = f.clone();
        swapped.swap(a, b);
        prop_assume!(f.concat() != swapped.concat());
        prop_assert_ne!(canonical_hash(&borrow(&f)), canonical_hash(&borrow(&swapped)));
    }
}
