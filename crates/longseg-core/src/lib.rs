pub mod error;
pub mod bids;
pub mod cohort;
pub mod session;
pub mod spacing;
pub mod exec;
pub mod tools;
pub mod scratch;
pub mod stages;
pub mod atrophy;
pub mod reorg;
pub mod stats;
pub mod pipeline;
