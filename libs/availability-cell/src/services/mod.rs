pub mod sanitize;
pub mod store;
pub mod window;

pub use store::AvailabilityService;
pub use window::CalendarWindow;
