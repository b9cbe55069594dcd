//! # Veriflow Testkit
//!
//! Shared test fixtures for the Veriflow crates: a deterministic accessor
//! signer, raw callback payloads shaped like the platform's, and a status
//! snapshot builder. Consume from `[dev-dependencies]`:
//!
//! ```toml
//! [dev-dependencies]
//! veriflow-testkit = { path = "../veriflow-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod fixtures;
pub mod signer;

pub use fixtures::*;
pub use signer::{mock_signature, MockAccessorSigner};

/// Install a compact tracing subscriber honoring `RUST_LOG`, once per
/// process. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
