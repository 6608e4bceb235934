pub mod classifier;
pub mod controller;
pub mod indicators;
pub mod ledger;
pub mod reconciler;
pub mod sizing;
