//! Diagnostics for AWS credential resolution inside a workload.
//!
//! The validator inspects the IRSA environment, then confirms the caller
//! identity through STS once per credential chain:
//!
//! - [`strategy::LegacyChain`], a hand-assembled provider chain
//! - [`strategy::DefaultChain`], the SDK's default chain

pub mod config;
pub mod environment;
pub mod error;
pub mod identity;
pub mod sso;
pub mod strategy;
pub mod sts;
pub mod validator;

pub use error::{Error, Result};
