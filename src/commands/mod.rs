//! Command implementations backing the `remit` binary.

/// Full pipeline execution from config and balances artifacts.
pub mod distribute;
/// Transfer log replay into a balances artifact.
pub mod snapshot;
/// Claim re-verification against a distribution artifact.
pub mod verify;
