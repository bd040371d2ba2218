pub mod bidsify;
pub mod run;
pub mod stats;
