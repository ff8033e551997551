pub mod activities;
pub mod auth;
pub mod core;
pub mod points;
pub mod ranking;
pub mod students;
