pub mod intervals;
pub mod spectrum;
pub mod variability;
