//! Product image assets: the lifecycle manager and its object store backends.

pub mod disk;
pub mod manager;
#[cfg(test)]
pub mod memory;
pub mod orphans;
pub mod r2;
pub mod store;

pub use manager::{AssetError, AssetManager, AssetUpload};
pub use orphans::{LogOrphanReporter, OrphanReporter, OrphanedAssets};
