//! Configuration loading for the venue exchange
//!
//! Supports JSON configuration files for:
//! - Poll and rebalance timing
//! - Pricing curve parameters
//! - A seed catalog of venues and their products

use bourse_core::{Price, Product, VenueId};
use bourse_pricing::PricingConfig;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Root configuration of the exchange service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Service name shown in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// How often a watched venue is polled for price changes
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Rebalance period used when a start request names none
    #[serde(default = "default_rebalance_interval_ms")]
    pub rebalance_interval_ms: u64,

    /// What the recurring rebalance does on each tick
    #[serde(default)]
    pub rebalance_mode: RebalanceMode,

    /// Buffered events per venue topic
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub pricing: PricingConfig,

    /// Venues to seed into the in-memory catalog
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
}

fn default_name() -> String {
    "Bourse".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_rebalance_interval_ms() -> u64 {
    30_000
}

fn default_channel_capacity() -> usize {
    1024
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            poll_interval_ms: default_poll_interval_ms(),
            rebalance_interval_ms: default_rebalance_interval_ms(),
            rebalance_mode: RebalanceMode::default(),
            channel_capacity: default_channel_capacity(),
            pricing: PricingConfig::default(),
            venues: Vec::new(),
        }
    }
}

impl ExchangeConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create with one demo venue (a small bar menu)
    pub fn with_demo_venue() -> Self {
        let menu = [
            ("Lager", dec!(5.00)),
            ("Stout", dec!(6.50)),
            ("Cider", dec!(5.50)),
            ("House Red", dec!(7.00)),
            ("Espresso Martini", dec!(11.00)),
        ];
        let venue = VenueConfig {
            id: Uuid::new_v4(),
            name: "Demo Bar".to_string(),
            rebalance_interval_ms: None,
            products: menu
                .into_iter()
                .map(|(name, price)| ProductConfig {
                    name: name.to_string(),
                    regular_price: price,
                    current_price: None,
                    min_price: None,
                    max_price: None,
                })
                .collect(),
        };

        Self {
            venues: vec![venue],
            ..Default::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rebalance_interval(&self) -> Duration {
        Duration::from_millis(self.rebalance_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".to_string()));
        }
        if self.rebalance_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "rebalance_interval_ms must be positive".to_string(),
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be positive".to_string()));
        }
        self.pricing
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        for venue in &self.venues {
            venue.validate()?;
        }
        Ok(())
    }
}

/// What a venue's recurring rebalance does
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceMode {
    /// Decay order counts only
    #[default]
    Decay,
    /// Decay order counts, then reprice the venue
    Reprice,
}

/// A venue of the seed catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Fresh id when absent
    #[serde(default = "Uuid::new_v4")]
    pub id: VenueId,

    pub name: String,

    /// Overrides the default rebalance period for this venue
    #[serde(default)]
    pub rebalance_interval_ms: Option<u64>,

    #[serde(default)]
    pub products: Vec<ProductConfig>,
}

impl VenueConfig {
    pub fn rebalance_interval(&self) -> Option<Duration> {
        self.rebalance_interval_ms.map(Duration::from_millis)
    }

    /// Catalog products of this venue
    pub fn to_products(&self) -> Vec<Product> {
        self.products
            .iter()
            .map(|p| p.to_product(self.id))
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rebalance_interval_ms == Some(0) {
            return Err(ConfigError::InvalidVenue(format!(
                "{}: rebalance_interval_ms must be positive",
                self.name
            )));
        }
        for product in &self.products {
            product.validate().map_err(|e| {
                ConfigError::InvalidVenue(format!("{}: {}", self.name, e))
            })?;
        }
        Ok(())
    }
}

/// A product of the seed catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    pub name: String,
    pub regular_price: Price,
    /// Starts at the regular price when absent
    #[serde(default)]
    pub current_price: Option<Price>,
    #[serde(default)]
    pub min_price: Option<Price>,
    #[serde(default)]
    pub max_price: Option<Price>,
}

impl ProductConfig {
    pub fn to_product(&self, venue_id: VenueId) -> Product {
        let mut product = Product::new(venue_id, self.name.clone(), self.regular_price);
        product.min_price = self.min_price;
        product.max_price = self.max_price;
        if let Some(current) = self.current_price {
            product.current_price = current;
        }
        product
    }

    fn validate(&self) -> Result<(), String> {
        if self.regular_price <= Price::ZERO {
            return Err(format!("{} has a non-positive regular price", self.name));
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(format!("{} has min_price above max_price", self.name));
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Invalid venue config: {0}")]
    InvalidVenue(String),
}
