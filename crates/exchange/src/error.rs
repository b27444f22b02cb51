use bourse_core::VenueId;
use bourse_ports::StoreError;
use bourse_pricing::EngineError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Venue {0} has no products")]
    NoProducts(VenueId),

    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
