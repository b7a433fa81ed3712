pub mod config;
pub mod correlation;
pub mod edge;
pub mod error;
pub mod market;
pub mod math;
pub mod odds;
pub mod projection;
pub mod ratings;
pub mod simulation;

pub use error::{EdgeError, Result};
