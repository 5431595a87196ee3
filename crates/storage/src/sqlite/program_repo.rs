use std::collections::BTreeMap;

use fitrack_core::model::{Day, Exercise, Program, ProgramId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, exercise_id_to_i64, index_from_i64, index_to_i64, kind_columns, map_exercise_row,
    parse_program_kind, program_id_from_i64, program_id_to_i64, section_to_str, ser,
};
use crate::repository::{ProgramRepository, ProgramSummary, StorageError};

#[async_trait::async_trait]
impl ProgramRepository for SqliteRepository {
    async fn list_programs(&self) -> Result<Vec<ProgramSummary>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                p.id, p.kind, p.title,
                (SELECT COUNT(*) FROM program_days d WHERE d.program_id = p.id) AS days,
                (SELECT COUNT(*) FROM exercises e WHERE e.program_id = p.id) AS exercises
            FROM programs p
            ORDER BY p.id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut list = Vec::with_capacity(rows.len());
        for row in rows {
            let kind: String = row.try_get("kind").map_err(ser)?;
            list.push(ProgramSummary {
                id: program_id_from_i64(row.try_get("id").map_err(ser)?)?,
                kind: parse_program_kind(&kind)?,
                title: row.try_get("title").map_err(ser)?,
                days: index_from_i64("days", row.try_get("days").map_err(ser)?)?,
                exercises: index_from_i64("exercises", row.try_get("exercises").map_err(ser)?)?,
            });
        }
        Ok(list)
    }

    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>, StorageError> {
        let pid = program_id_to_i64(id)?;

        let Some(header) = sqlx::query("SELECT kind, title FROM programs WHERE id = ?1")
            .bind(pid)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
        else {
            return Ok(None);
        };

        let day_rows = sqlx::query(
            r"
            SELECT day_index, title FROM program_days
            WHERE program_id = ?1
            ORDER BY day_index ASC
            ",
        )
        .bind(pid)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let exercise_rows = sqlx::query(
            r"
            SELECT id, day_index, title, kind, duration_secs, reps, sets, calories, section
            FROM exercises
            WHERE program_id = ?1
            ORDER BY day_index ASC, position ASC
            ",
        )
        .bind(pid)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut by_day: BTreeMap<usize, Vec<Exercise>> = BTreeMap::new();
        for row in &exercise_rows {
            let day_index = index_from_i64("day_index", row.try_get("day_index").map_err(ser)?)?;
            by_day
                .entry(day_index)
                .or_default()
                .push(map_exercise_row(row)?);
        }

        let mut days = Vec::with_capacity(day_rows.len());
        for row in &day_rows {
            let day_index = index_from_i64("day_index", row.try_get("day_index").map_err(ser)?)?;
            let title: String = row.try_get("title").map_err(ser)?;
            let exercises = by_day.remove(&day_index).unwrap_or_default();
            days.push(Day::new(day_index, title, exercises));
        }

        let kind: String = header.try_get("kind").map_err(ser)?;
        let title: String = header.try_get("title").map_err(ser)?;
        Program::new(id, parse_program_kind(&kind)?, title, days)
            .map(Some)
            .map_err(ser)
    }

    async fn upsert_program(&self, program: &Program) -> Result<(), StorageError> {
        let pid = program_id_to_i64(program.id())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO programs (id, kind, title)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                kind = excluded.kind,
                title = excluded.title
            ",
        )
        .bind(pid)
        .bind(program.kind().as_str())
        .bind(program.title())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        // The tree is replaced wholesale; exercises cascade with their days.
        sqlx::query("DELETE FROM program_days WHERE program_id = ?1")
            .bind(pid)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for day in program.days() {
            let day_index = index_to_i64("day_index", day.index())?;
            sqlx::query(
                r"
                INSERT INTO program_days (program_id, day_index, title)
                VALUES (?1, ?2, ?3)
                ",
            )
            .bind(pid)
            .bind(day_index)
            .bind(day.title())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            for (position, exercise) in day.exercises().iter().enumerate() {
                let (kind, duration_secs, reps, sets) = kind_columns(exercise.kind());
                sqlx::query(
                    r"
                    INSERT INTO exercises (
                        id, program_id, day_index, position, title, kind,
                        duration_secs, reps, sets, calories, section
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    ",
                )
                .bind(exercise_id_to_i64(exercise.id())?)
                .bind(pid)
                .bind(day_index)
                .bind(index_to_i64("position", position)?)
                .bind(exercise.title())
                .bind(kind)
                .bind(duration_secs)
                .bind(reps)
                .bind(sets)
                .bind(exercise.calories().map(f64::from))
                .bind(section_to_str(exercise.section()))
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        tracing::debug!(
            program_id = %program.id(),
            days = program.days().len(),
            "stored program tree"
        );
        Ok(())
    }
}
