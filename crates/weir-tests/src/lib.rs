//! Integration test suite for Weir.
//!
//! The tests under `tests/` drive a [`weir_farm::Farm`] through its public
//! operations only, against the in-memory ledgers and either the in-memory
//! or the RocksDB store, and check the engine's accounting invariants.

pub mod helpers;
