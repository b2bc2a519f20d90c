pub mod activity;
pub mod approximate;
pub mod common;
pub mod config;
pub mod filter_ledger;
mod observatory_model;
pub mod observatory_state;
pub mod sky;
#[cfg(test)]
mod tests;

pub use observatory_model::{ObservatoryModel, SlewDelay};
