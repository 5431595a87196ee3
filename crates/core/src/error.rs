use thiserror::Error;

use crate::ingest::IngestError;
use crate::model::{BiometricsError, ExerciseError, ProgramError, SettingsError};
use crate::tracker::SelectionError;

/// Any domain error raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Exercise(#[from] ExerciseError),
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Biometrics(#[from] BiometricsError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
}
