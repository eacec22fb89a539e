//! # weir-core
//! Foundation types, fixed-point math and trait seams for the Weir
//! reward-distribution engine.

pub mod clock;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod math;
pub mod state;
pub mod traits;
pub mod types;
