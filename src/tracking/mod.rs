pub mod engine;
pub mod ground_track;
pub mod scheduler;
pub mod snapshot;
