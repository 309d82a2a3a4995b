#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod progress;

pub use error::Error;
