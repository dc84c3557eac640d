pub mod appointment;
pub mod doctor;
pub mod notification;
pub mod patient;
pub mod prompt;
pub mod session;
pub mod user;
