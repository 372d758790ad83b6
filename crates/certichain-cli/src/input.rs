//! # Bundle Input Arguments
//!
//! Shared by `hash` and `verify`: a bundle is given either as a QR payload
//! string or as a JSON bundle file.

use std::path::PathBuf;

use anyhow::Context;
use certichain_core::{BundleFile, VerificationBundle};
use clap::Args;

#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct BundleArgs {
    /// Pipe-delimited QR payload.
    #[arg(long)]
    pub payload: Option<String>,

    /// JSON bundle file as emailed to the holder.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// A loaded bundle source, borrowed by the verification pipeline.
#[derive(Debug, Clone)]
pub enum LoadedBundle {
    Payload(String),
    File(Vec<u8>),
}

impl BundleArgs {
    pub fn load(&self) -> anyhow::Result<LoadedBundle> {
        match (&self.payload, &self.file) {
            (Some(payload), _) => Ok(LoadedBundle::Payload(
                payload.trim_end_matches(['\r', '\n']).to_string(),
            )),
            (None, Some(path)) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("reading bundle file {}", path.display()))?;
                Ok(LoadedBundle::File(bytes))
            }
            (None, None) => anyhow::bail!("one of --payload or --file is required"),
        }
    }
}

impl LoadedBundle {
    /// Parse into a complete bundle. `certificate_id` overrides a file's own
    /// identifier and is ignored for payloads.
    pub fn to_bundle(&self, certificate_id: Option<&str>) -> anyhow::Result<VerificationBundle> {
        let bundle = match self {
            Self::Payload(payload) => VerificationBundle::from_payload(payload)?,
            Self::File(bytes) => BundleFile::from_json(bytes)?.into_bundle(certificate_id)?,
        };
        Ok(bundle)
    }
}
