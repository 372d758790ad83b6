//! # Hash Subcommand
//!
//! Prints the canonical digest of a bundle, as written to the ledger at
//! issuance.

use clap::Args;
use serde::Serialize;

use crate::input::BundleArgs;

#[derive(Args, Debug)]
pub struct HashArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,

    /// Identifier to use when the bundle file carries none.
    #[arg(long)]
    pub certificate_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashOutput {
    pub certificate_id: String,
    pub certificate_hash: String,
}

pub fn run(args: &HashArgs) -> anyhow::Result<HashOutput> {
    let bundle = args
        .bundle
        .load()?
        .to_bundle(args.certificate_id.as_deref())?;
    Ok(HashOutput {
        certificate_id: bundle.certificate_id.to_string(),
        certificate_hash: bundle.canonical_hash().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use certichain_core::VerificationBundle;

    const PAYLOAD: &str = "bafk1|Jane Doe|Tech U|CS101|2025-01-01|0x00000000000000000000000000000000000000aa|PEM1|CERT-1|9.5";

    fn args(payload: &str) -> HashArgs {
        HashArgs {
            bundle: BundleArgs {
                payload: Some(payload.to_string()),
                file: None,
            },
            certificate_id: None,
        }
    }

    #[test]
    fn hash_matches_core_digest() {
        let out = run(&args(PAYLOAD)).unwrap();
        let expected = VerificationBundle::from_payload(PAYLOAD)
            .unwrap()
            .canonical_hash();
        assert_eq!(out.certificate_hash, expected.to_string());
        assert!(out.certificate_hash.starts_with("0x"));
        assert_eq!(out.certificate_id, "CERT-1");
    }

    #[test]
    fn grade_changes_hash() {
        let a = run(&args(PAYLOAD)).unwrap();
        let b = run(&args(&PAYLOAD.replace("|9.5", "|9.0"))).unwrap();
        assert_ne!(a.certificate_hash, b.certificate_hash);
    }

    #[test]
    fn incomplete_payload_is_an_error() {
        assert!(run(&args("bafk1|Jane Doe")).is_err());
    }
}
