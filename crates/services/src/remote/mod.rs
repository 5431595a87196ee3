//! Backends reached over the network.

mod rest;

pub use rest::{RestBackend, RestConfig};
