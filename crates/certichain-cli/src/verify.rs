//! # Verify Subcommand
//!
//! Runs the same verification pipeline as `POST /v1/verify` against the
//! collaborators configured in the environment.

use certichain_api::state::{AppConfig, AppState, Collaborators};
use certichain_api::verification::{self, BundleInput, VerificationReport};
use clap::Args;

use crate::input::{BundleArgs, LoadedBundle};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,

    /// Identifier to use when the bundle file carries none.
    #[arg(long)]
    pub certificate_id: Option<String>,
}

/// Application state wired to the production collaborators.
pub fn state_from_env() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;
    let collaborators = Collaborators::from_env()?;
    Ok(AppState::new(config, collaborators))
}

pub async fn run(args: &VerifyArgs, state: &AppState) -> anyhow::Result<VerificationReport> {
    let loaded = args.bundle.load()?;
    let input = match &loaded {
        LoadedBundle::Payload(payload) => BundleInput::Payload(payload),
        LoadedBundle::File(bytes) => BundleInput::File {
            bytes,
            certificate_id: args.certificate_id.as_deref(),
        },
    };
    let report = verification::verify(state, input).await?;
    Ok(report)
}
