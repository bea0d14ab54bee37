pub mod actions;
pub mod ticker;

pub use actions::PeriodicRefresher;
pub use ticker::RealTimeTicker;
