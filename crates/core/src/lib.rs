#![forbid(unsafe_code)]

pub mod error;
pub mod ingest;
pub mod model;
pub mod progression;
pub mod time;
pub mod timer;
pub mod tracker;

pub use error::Error;
pub use time::Clock;
