pub mod check;
pub mod data;
pub mod harvest;
pub mod serve;

// Re-export command functions for convenience
pub use check::check;
pub use data::{clear, records, stats};
pub use harvest::{harvest, HarvestParams};
pub use serve::serve;
