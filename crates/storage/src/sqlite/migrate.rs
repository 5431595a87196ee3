use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS programs (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('program', 'challenge')),
            title TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS program_days (
            program_id INTEGER NOT NULL,
            day_index INTEGER NOT NULL CHECK (day_index >= 0),
            title TEXT NOT NULL,
            PRIMARY KEY (program_id, day_index),
            FOREIGN KEY (program_id) REFERENCES programs(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS exercises (
            id INTEGER NOT NULL,
            program_id INTEGER NOT NULL,
            day_index INTEGER NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            title TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('time', 'reps')),
            duration_secs INTEGER,
            reps INTEGER,
            sets INTEGER,
            calories REAL,
            section TEXT NOT NULL,
            PRIMARY KEY (program_id, id),
            FOREIGN KEY (program_id, day_index)
                REFERENCES program_days(program_id, day_index) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS progress (
            program_id INTEGER PRIMARY KEY,
            streak INTEGER NOT NULL DEFAULT 0 CHECK (streak >= 0),
            last_completed_on TEXT,
            program_completed INTEGER NOT NULL DEFAULT 0,
            program_completed_at TEXT
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS completed_exercises (
            program_id INTEGER NOT NULL,
            exercise_id INTEGER NOT NULL,
            completed_at TEXT NOT NULL,
            PRIMARY KEY (program_id, exercise_id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS achievements (
            program_id INTEGER NOT NULL,
            achievement TEXT NOT NULL,
            PRIMARY KEY (program_id, achievement)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS day_completions (
            id INTEGER PRIMARY KEY,
            program_id INTEGER NOT NULL,
            day_index INTEGER NOT NULL,
            heart_rate INTEGER,
            weight_kg REAL,
            completed_at TEXT NOT NULL
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_exercises_program_day_position
            ON exercises (program_id, day_index, position);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_day_completions_program_completed
            ON day_completions (program_id, completed_at);
    ",
];

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the program tree tables and the progress tables.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied sqlite schema migration");
    }

    Ok(())
}
