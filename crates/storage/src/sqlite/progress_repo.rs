use chrono::{DateTime, NaiveDate, Utc};
use fitrack_core::model::{
    Achievement, AchievementSet, CompletedSet, ProgramId, ProgressRecord, Streak,
};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{
    conn, exercise_id_from_i64, exercise_id_to_i64, index_to_i64, program_id_to_i64, ser,
};
use crate::repository::{
    CompletionRequest, DayCompletionRequest, ProgramRepository, ProgressRepository, StorageError,
    apply_completion,
};

async fn load_record(
    db: &mut SqliteConnection,
    program_id: ProgramId,
) -> Result<ProgressRecord, StorageError> {
    let pid = program_id_to_i64(program_id)?;

    let header = sqlx::query(
        "SELECT streak, last_completed_on, program_completed FROM progress WHERE program_id = ?1",
    )
    .bind(pid)
    .fetch_optional(&mut *db)
    .await
    .map_err(conn)?;

    let (streak, program_completed) = match header {
        Some(row) => {
            let count: i64 = row.try_get("streak").map_err(ser)?;
            let count = u32::try_from(count)
                .map_err(|_| StorageError::Serialization(format!("invalid streak: {count}")))?;
            let last: Option<NaiveDate> = row.try_get("last_completed_on").map_err(ser)?;
            let done: i64 = row.try_get("program_completed").map_err(ser)?;
            (Streak::from_persisted(count, last), done != 0)
        }
        None => (Streak::default(), false),
    };

    let completed_rows =
        sqlx::query("SELECT exercise_id FROM completed_exercises WHERE program_id = ?1")
            .bind(pid)
            .fetch_all(&mut *db)
            .await
            .map_err(conn)?;
    let mut completed = CompletedSet::new();
    for row in &completed_rows {
        completed.insert(exercise_id_from_i64(row.try_get("exercise_id").map_err(ser)?)?);
    }

    let achievement_rows =
        sqlx::query("SELECT achievement FROM achievements WHERE program_id = ?1")
            .bind(pid)
            .fetch_all(&mut *db)
            .await
            .map_err(conn)?;
    let mut achievements = AchievementSet::new();
    for row in &achievement_rows {
        let id: String = row.try_get("achievement").map_err(ser)?;
        match Achievement::from_id(&id) {
            Some(a) => {
                achievements.unlock(a);
            }
            None => tracing::warn!(%program_id, achievement = %id, "ignoring unknown achievement"),
        }
    }

    Ok(ProgressRecord::from_persisted(
        program_id,
        completed,
        streak,
        achievements,
        program_completed,
    ))
}

async fn store_streak(
    db: &mut SqliteConnection,
    pid: i64,
    streak: Streak,
) -> Result<(), StorageError> {
    sqlx::query(
        r"
        INSERT INTO progress (program_id, streak, last_completed_on)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(program_id) DO UPDATE SET
            streak = excluded.streak,
            last_completed_on = excluded.last_completed_on
        ",
    )
    .bind(pid)
    .bind(i64::from(streak.count()))
    .bind(streak.last_completed_on())
    .execute(&mut *db)
    .await
    .map_err(conn)?;
    Ok(())
}

async fn clear_program_completed(db: &mut SqliteConnection, pid: i64) -> Result<(), StorageError> {
    sqlx::query(
        r"
        UPDATE progress
        SET program_completed = 0, program_completed_at = NULL
        WHERE program_id = ?1
        ",
    )
    .bind(pid)
    .execute(&mut *db)
    .await
    .map_err(conn)?;
    Ok(())
}

impl SqliteRepository {
    async fn day_exists(&self, pid: i64, day_index: i64) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM program_days WHERE program_id = ?1 AND day_index = ?2")
            .bind(pid)
            .bind(day_index)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }

    async fn program_exists(&self, pid: i64) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM programs WHERE id = ?1")
            .bind(pid)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }
}

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(&self, program_id: ProgramId) -> Result<ProgressRecord, StorageError> {
        let mut db = self.pool.acquire().await.map_err(conn)?;
        load_record(&mut db, program_id).await
    }

    async fn complete_exercise(
        &self,
        request: &CompletionRequest,
    ) -> Result<ProgressRecord, StorageError> {
        let program = self
            .get_program(request.program_id)
            .await?
            .ok_or(StorageError::NotFound)?;
        let in_day = program
            .day(request.day_index)
            .is_some_and(|d| d.contains(request.exercise_id));
        if !in_day {
            return Err(StorageError::NotFound);
        }

        let pid = program_id_to_i64(request.program_id)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;
        let mut record = load_record(&mut tx, request.program_id).await?;
        let before = record.achievements().clone();

        if apply_completion(
            &mut record,
            &program,
            request.exercise_id,
            request.completed_on(),
        ) {
            sqlx::query(
                r"
                INSERT INTO completed_exercises (program_id, exercise_id, completed_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(program_id, exercise_id) DO NOTHING
                ",
            )
            .bind(pid)
            .bind(exercise_id_to_i64(request.exercise_id)?)
            .bind(request.completed_at)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

            store_streak(&mut tx, pid, record.streak()).await?;

            for achievement in record.achievements().iter().filter(|a| !before.contains(*a)) {
                sqlx::query(
                    r"
                    INSERT INTO achievements (program_id, achievement)
                    VALUES (?1, ?2)
                    ON CONFLICT(program_id, achievement) DO NOTHING
                    ",
                )
                .bind(pid)
                .bind(achievement.as_str())
                .execute(&mut *tx)
                .await
                .map_err(conn)?;
            }
        }

        tx.commit().await.map_err(conn)?;
        Ok(record)
    }

    async fn complete_day(&self, request: &DayCompletionRequest) -> Result<Streak, StorageError> {
        let pid = program_id_to_i64(request.program_id)?;
        let day_index = index_to_i64("day_index", request.day_index)?;
        if !self.day_exists(pid, day_index).await? {
            return Err(StorageError::NotFound);
        }

        let heart_rate = request
            .biometrics
            .and_then(|b| b.heart_rate())
            .map(i64::from);
        let weight_kg = request
            .biometrics
            .and_then(|b| b.weight_kg())
            .map(f64::from);

        sqlx::query(
            r"
            INSERT INTO day_completions (program_id, day_index, heart_rate, weight_kg, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(pid)
        .bind(day_index)
        .bind(heart_rate)
        .bind(weight_kg)
        .bind(request.completed_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let mut db = self.pool.acquire().await.map_err(conn)?;
        Ok(load_record(&mut db, request.program_id).await?.streak())
    }

    async fn reset_day(
        &self,
        program_id: ProgramId,
        day_index: usize,
    ) -> Result<(), StorageError> {
        let pid = program_id_to_i64(program_id)?;
        let day = index_to_i64("day_index", day_index)?;
        if !self.day_exists(pid, day).await? {
            return Err(StorageError::NotFound);
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;
        sqlx::query(
            r"
            DELETE FROM completed_exercises
            WHERE program_id = ?1 AND exercise_id IN (
                SELECT id FROM exercises WHERE program_id = ?1 AND day_index = ?2
            )
            ",
        )
        .bind(pid)
        .bind(day)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        clear_program_completed(&mut tx, pid).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn reset_program(&self, program_id: ProgramId) -> Result<(), StorageError> {
        let pid = program_id_to_i64(program_id)?;
        if !self.program_exists(pid).await? {
            return Err(StorageError::NotFound);
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;
        sqlx::query(
            r"
            DELETE FROM completed_exercises
            WHERE program_id = ?1 AND exercise_id IN (
                SELECT id FROM exercises WHERE program_id = ?1
            )
            ",
        )
        .bind(pid)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        clear_program_completed(&mut tx, pid).await?;
        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn mark_program_complete(
        &self,
        program_id: ProgramId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO progress (program_id, program_completed, program_completed_at)
            VALUES (?1, 1, ?2)
            ON CONFLICT(program_id) DO UPDATE SET
                program_completed = 1,
                program_completed_at = excluded.program_completed_at
            ",
        )
        .bind(program_id_to_i64(program_id)?)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
