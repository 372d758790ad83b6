//! # Status Subcommand
//!
//! Reads a certificate's ledger record.

use anyhow::Context;
use certichain_client::Ledger;
use certichain_core::CertificateId;
use clap::Args;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Certificate identifier.
    pub id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutput {
    pub certificate_id: String,
    pub certificate_hash: String,
    pub revoked: bool,
    pub issuer_address: String,
}

pub async fn run(args: &StatusArgs, ledger: &dyn Ledger) -> anyhow::Result<StatusOutput> {
    let id = CertificateId::parse(&args.id)?;
    let record = ledger
        .credential(&id)
        .await
        .with_context(|| format!("reading ledger record for {id}"))?;
    if !record.exists() {
        anyhow::bail!("certificate {id} is not recorded on the ledger");
    }
    Ok(StatusOutput {
        certificate_id: id.to_string(),
        certificate_hash: record.digest,
        revoked: record.revoked,
        issuer_address: record.issuer.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use certichain_client::MemoryLedger;
    use certichain_core::LedgerAddress;

    fn addr(last: &str) -> LedgerAddress {
        LedgerAddress::parse(&format!("0x{:0>40}", last)).unwrap()
    }

    #[tokio::test]
    async fn reports_recorded_credential() {
        let ledger = MemoryLedger::new(addr("c0"));
        let id = CertificateId::parse("CERT-7").unwrap();
        ledger.issue(id.clone(), "0xabc".into(), addr("01"));
        ledger.revoke(&id);

        let out = run(&StatusArgs { id: "CERT-7".into() }, &ledger)
            .await
            .unwrap();
        assert!(out.revoked);
        assert_eq!(out.certificate_hash, "0xabc");
        assert_eq!(out.issuer_address, addr("01").to_string());
    }

    #[tokio::test]
    async fn unknown_credential_is_an_error() {
        let ledger = MemoryLedger::new(addr("c0"));
        let err = run(&StatusArgs { id: "CERT-404".into() }, &ledger)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("CERT-404"));
    }
}
