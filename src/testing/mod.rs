//! Testing utilities and mock implementations
//!
//! Test doubles for the HTTP adapter and the LLM provider, used by unit tests
//! and the integration tests under `tests/`.

pub mod mocks;

pub use mocks::*;
