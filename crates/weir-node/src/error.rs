//! Errors raised while assembling a node.

use thiserror::Error;
use weir_core::error::{FarmError, WeirError};

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("config: {0}")] Config(#[from] config::ConfigError),
    #[error("io: {0}")] Io(#[from] std::io::Error),
    #[error(transparent)] Weir(#[from] WeirError),
}

impl From<FarmError> for NodeError {
    fn from(err: FarmError) -> Self {
        NodeError::Weir(err.into())
    }
}
