// Storage layer (local filesystem asset store)

pub mod asset_store;

pub use asset_store::*;
