use fitrack_core::model::{
    Exercise, ExerciseId, ExerciseKind, ProgramId, ProgramKind, Section,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u64_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn program_id_to_i64(id: ProgramId) -> Result<i64, StorageError> {
    u64_to_i64("program_id", id.value())
}

pub(crate) fn program_id_from_i64(v: i64) -> Result<ProgramId, StorageError> {
    Ok(ProgramId::new(i64_to_u64("program_id", v)?))
}

pub(crate) fn exercise_id_to_i64(id: ExerciseId) -> Result<i64, StorageError> {
    u64_to_i64("exercise_id", id.value())
}

pub(crate) fn exercise_id_from_i64(v: i64) -> Result<ExerciseId, StorageError> {
    Ok(ExerciseId::new(i64_to_u64("exercise_id", v)?))
}

pub(crate) fn index_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn index_from_i64(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn opt_u32(row: &SqliteRow, field: &'static str) -> Result<Option<u32>, StorageError> {
    row.try_get::<Option<i64>, _>(field)
        .map_err(ser)?
        .map(|v| {
            u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
        })
        .transpose()
}

pub(crate) fn parse_program_kind(s: &str) -> Result<ProgramKind, StorageError> {
    ProgramKind::parse(s)
        .ok_or_else(|| StorageError::Serialization(format!("invalid program kind: {s}")))
}

/// Stored section key. Stable across renames of the display label.
pub(crate) fn section_to_str(section: Section) -> &'static str {
    match section {
        Section::WarmUp => "warm_up",
        Section::Workout => "workout",
        Section::CoolDown => "cool_down",
    }
}

pub(crate) fn parse_section(s: &str) -> Result<Section, StorageError> {
    Section::parse_lenient(s).map_err(ser)
}

/// Flattened kind columns: `(kind, duration_secs, reps, sets)`.
pub(crate) fn kind_columns(
    kind: ExerciseKind,
) -> (&'static str, Option<i64>, Option<i64>, Option<i64>) {
    match kind {
        ExerciseKind::Time { duration_secs } => {
            ("time", duration_secs.map(i64::from), None, None)
        }
        ExerciseKind::Reps { reps, sets } => {
            ("reps", None, reps.map(i64::from), sets.map(i64::from))
        }
    }
}

pub(crate) fn map_exercise_row(row: &SqliteRow) -> Result<Exercise, StorageError> {
    let kind_str: String = row.try_get("kind").map_err(ser)?;
    let kind = match kind_str.as_str() {
        "time" => ExerciseKind::Time {
            duration_secs: opt_u32(row, "duration_secs")?,
        },
        "reps" => ExerciseKind::Reps {
            reps: opt_u32(row, "reps")?,
            sets: opt_u32(row, "sets")?,
        },
        other => {
            return Err(StorageError::Serialization(format!(
                "invalid exercise kind: {other}"
            )));
        }
    };

    #[allow(clippy::cast_possible_truncation)]
    let calories = row
        .try_get::<Option<f64>, _>("calories")
        .map_err(ser)?
        .map(|c| c as f32);
    let section_str: String = row.try_get("section").map_err(ser)?;

    Exercise::new(
        exercise_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        kind,
        calories,
        parse_section(&section_str)?,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_keys_parse_back() {
        for section in [Section::WarmUp, Section::Workout, Section::CoolDown] {
            assert_eq!(parse_section(section_to_str(section)).unwrap(), section);
        }
    }

    #[test]
    fn synthetic_exercise_ids_fit_in_sqlite_integers() {
        let id = ExerciseId::synthetic(3, 7);
        let stored = exercise_id_to_i64(id).unwrap();
        assert_eq!(exercise_id_from_i64(stored).unwrap(), id);
    }

    #[test]
    fn negative_ids_are_rejected() {
        assert!(matches!(
            program_id_from_i64(-1),
            Err(StorageError::Serialization(_))
        ));
    }
}
