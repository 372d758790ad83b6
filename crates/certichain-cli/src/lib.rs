//! # certichain-cli — CertiChain Operator Command-Line Interface
//!
//! ## Subcommands
//!
//! - `hash`: canonical hash of a bundle file or QR payload
//! - `status`: ledger record of a certificate identifier
//! - `verify`: full verification pipeline against live collaborators
//!
//! ## Crate Policy
//!
//! - CLI construction (argument parsing) is separated from business logic.
//! - Handler functions delegate to `certichain-core`, `certichain-client` and
//!   the API's verification pipeline. Nothing is re-implemented here.
//! - Results go to stdout as JSON; diagnostics go to stderr via `tracing`.

pub mod hash;
pub mod input;
pub mod status;
pub mod verify;
