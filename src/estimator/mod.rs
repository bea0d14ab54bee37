pub mod demand;
pub mod price;

pub use demand::DemandEstimator;
pub use price::PriceEstimator;
