pub mod events;
pub mod params;

pub use events::EventSeries;
pub use params::{FitReport, HawkesParams};
