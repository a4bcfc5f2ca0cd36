//! Historical input series and season assignment.

pub mod season;
pub mod types;

pub use season::SeasonScheme;
pub use types::{Aggregation, Frequency, Observation, ObservedSeries};
