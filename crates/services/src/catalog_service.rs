use std::sync::Arc;

use fitrack_core::ingest::{IngestNote, RawProgram, normalize_program};
use fitrack_core::model::{Program, ProgramId};
use storage::repository::{ProgramRepository, ProgramSummary};

use crate::error::CatalogError;
use crate::sessions::{Loaded, Notice};

/// Outcome of importing a program document.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub program_id: ProgramId,
    pub days: usize,
    pub exercises: usize,
    /// Defaults applied while normalizing the document.
    pub notes: Vec<IngestNote>,
}

/// Lists, fetches and imports programs and challenges.
#[derive(Clone)]
pub struct CatalogService {
    programs: Arc<dyn ProgramRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(programs: Arc<dyn ProgramRepository>) -> Self {
        Self { programs }
    }

    /// Every program and challenge; an empty list plus a notice when the
    /// catalog cannot be read.
    pub async fn list_programs(&self) -> Loaded<Vec<ProgramSummary>> {
        match self.programs.list_programs().await {
            Ok(list) => Loaded::clean(list),
            Err(err) => {
                tracing::warn!(error = %err, "program list unavailable");
                Loaded {
                    value: Vec::new(),
                    notices: vec![Notice::CatalogUnavailable {
                        reason: err.to_string(),
                    }],
                }
            }
        }
    }

    /// Fetch a program tree by ID.
    ///
    /// Returns `Ok(None)` when the program does not exist.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn get_program(&self, id: ProgramId) -> Result<Option<Program>, CatalogError> {
        Ok(self.programs.get_program(id).await?)
    }

    /// Normalize a raw program document and store it.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Ingest` for malformed JSON or a missing program
    /// id, and `CatalogError::Storage` if persistence fails.
    pub async fn import_json(&self, json: &str) -> Result<ImportReport, CatalogError> {
        let raw = RawProgram::from_json(json)?;
        let ingested = normalize_program(&raw)?;
        let program = ingested.value;
        for note in &ingested.notes {
            tracing::debug!(program_id = %program.id(), ?note, "default applied during import");
        }

        self.programs.upsert_program(&program).await?;
        tracing::info!(
            program_id = %program.id(),
            kind = program.kind().as_str(),
            defaults = ingested.notes.len(),
            "program imported"
        );

        Ok(ImportReport {
            program_id: program.id(),
            days: program.days().len(),
            exercises: program.total_exercises(),
            notes: ingested.notes,
        })
    }
}
