//! Domain types: identifiers, fallback keys, positions and exposures.

pub mod identifier;
pub mod models;

pub use identifier::{is_placeholder, FallbackKey, Identifier, SecurityKey};
pub use models::{
    AssetClass, ExposureRecord, FundDecomposition, HoldingRecord, LoadedPosition,
    ResolutionStatus, MAX_WEIGHT_PERCENTAGE,
};
