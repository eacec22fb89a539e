//! # weir-node: RocksDB persistence, configuration and logging.
//!
//! - [`storage::RocksFarmStore`]: farm state backed by RocksDB
//! - [`node::FarmNode`]: a farm opened against the configured data directory
//! - [`config::NodeConfig`]: defaults, TOML file and `WEIR_*` environment
//! - [`logging::init_logging`]: subscriber setup for the binaries

pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod storage;

pub use config::{GenesisParams, NodeConfig};
pub use error::NodeError;
pub use logging::init_logging;
pub use node::FarmNode;
pub use storage::RocksFarmStore;
