pub mod registration;

pub use registration::{hash_password, RegistrationService};
