pub mod appointments;
pub mod commit;
pub mod selection;

pub use appointments::AppointmentService;
pub use commit::BookingCommitService;
pub use selection::{PrerequisiteFlags, SelectionState, SlotSelection};
