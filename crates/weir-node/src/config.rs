//! Node configuration.
//!
//! [`NodeConfig`] starts from built-in defaults, then layers an optional TOML
//! file and `WEIR_*` environment variables on top (nested keys use a double
//! underscore, e.g. `WEIR_GENESIS__EMISSION_RATE`). Command-line flags are
//! applied by the binaries after loading.
//!
//! Base-unit amounts exceed the TOML integer range, so they are written as
//! decimal strings; plain integers are accepted too.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use weir_core::constants::{COIN, DEFAULT_MAX_SUPPLY, DEFAULT_STAKING_PERCENT, DEFAULT_STEEPNESS};
use weir_core::types::{AccountId, Params};

use crate::error::NodeError;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "WEIR";

/// Parameters a fresh farm starts with. Ignored once state is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisParams {
    /// Reward units emitted per second across all pools.
    #[serde(with = "amount")]
    pub emission_rate: u128,
    /// Share of total weight assigned to the lock pool, in percent.
    pub staking_weight_percent: u64,
    /// Decay curve steepness, WAD-scaled.
    #[serde(with = "amount")]
    pub steepness: u128,
    /// Unix timestamp before which nothing accrues.
    pub reward_start_time: u64,
    /// Hard cap of the reward asset.
    #[serde(with = "amount")]
    pub reward_cap: u128,
}

impl Default for GenesisParams {
    fn default() -> Self {
        Self {
            emission_rate: COIN,
            staking_weight_percent: DEFAULT_STAKING_PERCENT,
            steepness: DEFAULT_STEEPNESS,
            reward_start_time: 0,
            reward_cap: DEFAULT_MAX_SUPPLY,
        }
    }
}

impl GenesisParams {
    /// Engine parameters for a farm with only the lock pool.
    pub fn to_params(&self) -> Params {
        Params {
            staking_weight_percent: self.staking_weight_percent,
            steepness: self.steepness,
            ..Params::genesis(self.emission_rate, self.reward_start_time)
        }
    }
}

/// Configuration for a farm node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// Log level filter string (e.g. "info", "debug", "weir_farm=trace").
    pub log_level: String,
    /// Log output format ("text" or "json").
    pub log_format: String,
    /// Name the engine's account is derived from.
    pub engine_account: String,
    pub genesis: GenesisParams,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("weir");

        Self {
            data_dir,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            engine_account: "weir-farm".to_string(),
            genesis: GenesisParams::default(),
        }
    }
}

impl NodeConfig {
    /// Load from an optional TOML file and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, NodeError> {
        Self::load_with(file, Self::environment())
    }

    /// Load from an optional TOML file and an explicit environment source.
    pub fn load_with(file: Option<&Path>, env: Environment) -> Result<Self, NodeError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }
        let config: NodeConfig = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// The `WEIR_*` environment source.
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
    }

    /// Reject genesis parameters the engine would refuse.
    pub fn validate(&self) -> Result<(), NodeError> {
        weir_farm::validate_params(&self.genesis.to_params())?;
        Ok(())
    }

    /// Path to the RocksDB farm data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("farmdata")
    }

    /// The engine's account.
    pub fn engine_account(&self) -> AccountId {
        AccountId::from_name(&self.engine_account)
    }
}

/// Serde adapter for base-unit amounts: written as decimal strings, read
/// from strings or integers.
mod amount {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    struct AmountVisitor;

    impl Visitor<'_> for AmountVisitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(v as u128)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
            u128::try_from(v).map_err(|_| E::custom(format!("negative amount: {v}")))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
            Ok(v)
        }

        fn visit_i128<E: de::Error>(self, v: i128) -> Result<u128, E> {
            u128::try_from(v).map_err(|_| E::custom(format!("negative amount: {v}")))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
            v.trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid amount: {v:?}")))
        }
    }
}
