pub mod analytics;
pub mod appointments;
pub mod notifications;
pub mod payments;
pub mod views;
