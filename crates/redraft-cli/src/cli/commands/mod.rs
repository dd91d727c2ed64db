pub mod config;
pub mod oneshot;
