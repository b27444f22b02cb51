//! Bourse Pricing
//!
//! Demand-driven repricing of venue products. Every completed purchase
//! bumps per-product order counters; the engine then moves every product of
//! the venue toward a band position that reflects its popularity relative
//! to the venue's best seller.
//!
//! ## Pipeline
//!
//! ```text
//! purchase ─► order counts ─► ratio ─► popularity band ─► target position
//!                                                              │
//!                      momentum (smoothed, asymmetric) ◄───────┘
//!                              │
//!                              ▼
//!           band price ─► step cap ─► round toward current ─► clamp
//!                                                              │
//!                                        |Δ| > epsilon ? save + history
//! ```
//!
//! - **Model**: pure curve in [`PricingModel`], constants in [`PricingConfig`]
//! - **Demand**: transient counters and momentum per venue ([`VenueDemand`])
//! - **Engine**: [`PriceEngine`] ties both to a [`bourse_ports::CatalogStore`]
//! - **Rebalance**: decays counters so stale demand fades

pub mod config;
pub mod demand;
pub mod engine;
pub mod error;
pub mod model;

pub use config::{BandConfig, PricingConfig, StepProfile, ZeroOrderConfig};
pub use demand::{DecayOutcome, VenueDemand};
pub use engine::{PriceEngine, PriceUpdate, RebalanceOutcome};
pub use error::{EngineError, Result};
pub use model::{Popularity, PricingModel, Quote, QuoteInput};
