#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_service;
pub mod error;
pub mod remote;
pub mod sessions;

pub use fitrack_core::Clock;
pub use sessions as session;

pub use app_services::AppServices;
pub use catalog_service::{CatalogService, ImportReport};
pub use error::{AppServicesError, CatalogError, RestError, TrackerError};
pub use remote::{RestBackend, RestConfig};

pub use sessions::{
    CompletionReport, Loaded, Notice, PendingAck, PendingReset, ResetMode, ResetReport,
    SessionProgress, SessionTicker, Tick, TrackerLoopService, WorkoutSession,
};
