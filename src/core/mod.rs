pub mod catalog;
mod deep_space;
pub mod elements;
pub mod frames;
pub mod orbit;
pub mod tle;
