//! Tabular persistence boundary: historical input and simulated output.

pub mod export;
pub mod import;
