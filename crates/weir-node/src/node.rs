//! Farm node composition.
//!
//! [`FarmNode`] wires a [`Farm`] to the RocksDB store under the configured
//! data directory.

use std::sync::Arc;

use tracing::info;
use weir_core::traits::{Clock, RewardAsset, UnitLedger};
use weir_farm::{Context, Farm};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::storage::RocksFarmStore;

/// A farm persisted under [`NodeConfig::data_dir`].
pub struct FarmNode {
    config: NodeConfig,
    store: Arc<RocksFarmStore>,
    farm: Farm,
}

impl FarmNode {
    /// Open (or create) the farm described by `config`.
    ///
    /// A fresh data directory starts from `config.genesis`; an existing one
    /// resumes with its persisted state.
    pub fn open(
        config: NodeConfig,
        asset: Arc<dyn RewardAsset>,
        units: Arc<dyn UnitLedger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Arc::new(RocksFarmStore::open(config.db_path())?);
        let fresh = store.is_empty()?;

        let ctx = Context::new(asset, units, clock, config.engine_account());
        let farm = Farm::open(ctx, store.clone(), config.genesis.to_params())?;

        info!(
            data_dir = ?config.data_dir,
            fresh,
            pools = farm.pool_count(),
            "farm node ready"
        );
        Ok(Self {
            config,
            store,
            farm,
        })
    }

    pub fn farm(&self) -> &Farm {
        &self.farm
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Flush the store to disk.
    pub fn flush(&self) -> Result<(), NodeError> {
        self.store.flush()?;
        Ok(())
    }
}
