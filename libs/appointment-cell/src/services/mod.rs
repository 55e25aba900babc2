pub mod booking;
pub mod generator;
pub mod job;
pub mod lifecycle;

pub use booking::AppointmentBookingService;
pub use generator::{SlotGenerationObserver, SlotGenerationService};
pub use job::spawn_slot_generation_job;
pub use lifecycle::AppointmentLifecycleService;
