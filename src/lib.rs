pub mod collectors;
pub mod config;
pub mod core;
pub mod tracking;
pub mod utils;
