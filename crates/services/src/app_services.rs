use std::sync::Arc;

use fitrack_core::model::{ProgramId, TrackerSettings};
use storage::repository::{ProgramRepository, ProgressRepository, Storage};

use crate::Clock;
use crate::catalog_service::CatalogService;
use crate::error::AppServicesError;
use crate::remote::{RestBackend, RestConfig};
use crate::sessions::TrackerLoopService;

/// Assembles app-facing services over one backend.
#[derive(Clone)]
pub struct AppServices {
    programs: Arc<dyn ProgramRepository>,
    catalog: Arc<CatalogService>,
    tracker: Arc<TrackerLoopService>,
}

impl AppServices {
    /// Build services over any storage pair.
    #[must_use]
    pub fn from_storage(storage: Storage, clock: Clock, settings: TrackerSettings) -> Self {
        let catalog = Arc::new(CatalogService::new(Arc::clone(&storage.programs)));
        let tracker = Arc::new(
            TrackerLoopService::new(
                clock,
                Arc::clone(&storage.programs),
                Arc::clone(&storage.progress),
            )
            .with_settings(settings),
        );
        Self {
            programs: storage.programs,
            catalog,
            tracker,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Sqlite` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: TrackerSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(storage, clock, settings))
    }

    /// Build services backed by the REST API.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Rest` if the HTTP client cannot be built.
    pub fn new_rest(
        config: RestConfig,
        clock: Clock,
        settings: TrackerSettings,
    ) -> Result<Self, AppServicesError> {
        let backend = RestBackend::new(config)?;
        let programs: Arc<dyn ProgramRepository> = Arc::new(backend.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(backend);
        Ok(Self::from_storage(
            Storage { programs, progress },
            clock,
            settings,
        ))
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<CatalogService> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn tracker(&self) -> Arc<TrackerLoopService> {
        Arc::clone(&self.tracker)
    }

    /// The preferred program when it exists, otherwise the first listed one.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Storage` if the catalog cannot be read.
    pub async fn resolve_program(
        &self,
        preferred: ProgramId,
    ) -> Result<Option<ProgramId>, AppServicesError> {
        if self.programs.get_program(preferred).await?.is_some() {
            return Ok(Some(preferred));
        }
        let listed = self.programs.list_programs().await?;
        Ok(listed.first().map(|p| p.id))
    }
}
