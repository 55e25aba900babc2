pub mod availability;
pub mod doctor;
pub mod schedule;

pub use availability::AvailabilityService;
pub use doctor::DoctorService;
pub use schedule::{ScheduleHooks, ScheduleObserver, ScheduleService};
