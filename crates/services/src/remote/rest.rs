use std::env;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fitrack_core::ingest::{
    Ingested, RawProgram, RawProgress, normalize_program, normalize_progress, raw_program,
};
use fitrack_core::model::{Program, ProgramId, ProgressRecord, Streak};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use storage::repository::{
    CompletionRequest, DayCompletionRequest, ProgramRepository, ProgramSummary,
    ProgressRepository, StorageError,
};

use crate::error::RestError;

const DEFAULT_RETRIES: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct RestConfig {
    pub base_url: String,
    pub token: Option<String>,
    /// Extra attempts for writes that failed transiently.
    pub retries: u32,
    pub backoff: Duration,
    pub timeout: Duration,
}

impl RestConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Read `FITRACK_API_BASE_URL`, `FITRACK_API_TOKEN` and
    /// `FITRACK_API_RETRIES`.
    ///
    /// # Errors
    ///
    /// Returns `RestError::MissingBaseUrl` when no base URL is set and
    /// `RestError::InvalidRetries` for a non-numeric retry count.
    pub fn from_env() -> Result<Self, RestError> {
        let base_url = env::var("FITRACK_API_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(RestError::MissingBaseUrl)?;
        let mut config = Self::new(base_url);
        config.token = env::var("FITRACK_API_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty());
        if let Ok(raw) = env::var("FITRACK_API_RETRIES") {
            config.retries = raw
                .trim()
                .parse()
                .map_err(|_| RestError::InvalidRetries(raw.clone()))?;
        }
        Ok(config)
    }
}

//
// ─── WIRE BODIES ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteExerciseBody {
    day_index: usize,
    exercise_id: u64,
    completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteDayBody {
    day_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    heart_rate: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight_kg: Option<f32>,
    completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetDayBody {
    day_index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompletedAtBody {
    completed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreakBody {
    #[serde(default)]
    streak: u32,
    #[serde(default, alias = "lastCompletedDate")]
    last_completed_on: Option<NaiveDate>,
}

//
// ─── BACKEND ───────────────────────────────────────────────────────────────────
//

/// Program and progress repositories served by a REST API.
///
/// Reads are attempted once. Writes are retried up to `retries` extra times
/// on timeouts, connection failures, 429 and 5xx responses.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    config: RestConfig,
}

impl RestBackend {
    /// # Errors
    ///
    /// Returns `RestError::Http` if the HTTP client cannot be built.
    pub fn new(config: RestConfig) -> Result<Self, RestError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    #[must_use]
    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.config.base_url.trim_end_matches('/'));
        let builder = self.client.request(method, url);
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn read<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, RestError> {
        let response = self.request(Method::GET, path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check(response)?.json().await?))
    }

    async fn write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Response, RestError> {
        let mut attempt = 0;
        loop {
            let result = self
                .request(method.clone(), path)
                .json(body)
                .send()
                .await
                .map_err(RestError::from)
                .and_then(check);
            match result {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    tracing::debug!(path, attempt, error = %err, "retrying write");
                    tokio::time::sleep(self.config.backoff * attempt).await;
                }
                Err(err) => {
                    tracing::warn!(path, attempts = attempt + 1, error = %err, "write failed");
                    return Err(err);
                }
            }
        }
    }
}

fn check(response: Response) -> Result<Response, RestError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RestError::HttpStatus(status))
    }
}

fn log_notes<T>(ingested: &Ingested<T>, program_id: ProgramId) {
    for note in &ingested.notes {
        tracing::debug!(%program_id, ?note, "default applied to backend document");
    }
}

fn progress_from_raw(program_id: ProgramId, raw: &RawProgress) -> ProgressRecord {
    let ingested = normalize_progress(program_id, raw);
    log_notes(&ingested, program_id);
    ingested.value
}

#[async_trait]
impl ProgramRepository for RestBackend {
    async fn list_programs(&self) -> Result<Vec<ProgramSummary>, StorageError> {
        let raw: Vec<RawProgram> = self.read("/programs").await?.unwrap_or_default();
        let mut list = Vec::with_capacity(raw.len());
        for doc in &raw {
            match normalize_program(doc) {
                Ok(ingested) => list.push(ProgramSummary::from_program(&ingested.value)),
                Err(err) => tracing::warn!(error = %err, "skipping unreadable program"),
            }
        }
        list.sort_by_key(|p| p.id);
        Ok(list)
    }

    async fn get_program(&self, id: ProgramId) -> Result<Option<Program>, StorageError> {
        let Some(raw) = self.read::<RawProgram>(&format!("/programs/{id}")).await? else {
            return Ok(None);
        };
        let ingested = normalize_program(&raw).map_err(RestError::from)?;
        log_notes(&ingested, id);
        Ok(Some(ingested.value))
    }

    async fn upsert_program(&self, program: &Program) -> Result<(), StorageError> {
        self.write(
            Method::PUT,
            &format!("/programs/{}", program.id()),
            &raw_program(program),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for RestBackend {
    async fn get_progress(&self, program_id: ProgramId) -> Result<ProgressRecord, StorageError> {
        let raw: Option<RawProgress> = self.read(&format!("/progress/{program_id}")).await?;
        Ok(raw.map_or_else(
            || ProgressRecord::empty(program_id),
            |raw| progress_from_raw(program_id, &raw),
        ))
    }

    async fn complete_exercise(
        &self,
        request: &CompletionRequest,
    ) -> Result<ProgressRecord, StorageError> {
        let body = CompleteExerciseBody {
            day_index: request.day_index,
            exercise_id: request.exercise_id.value(),
            completed_at: request.completed_at,
        };
        let path = format!("/progress/{}/exercises", request.program_id);
        let raw: RawProgress = self
            .write(Method::POST, &path, &body)
            .await?
            .json()
            .await
            .map_err(RestError::from)?;
        Ok(progress_from_raw(request.program_id, &raw))
    }

    async fn complete_day(&self, request: &DayCompletionRequest) -> Result<Streak, StorageError> {
        let body = CompleteDayBody {
            day_index: request.day_index,
            heart_rate: request.biometrics.and_then(|b| b.heart_rate()),
            weight_kg: request.biometrics.and_then(|b| b.weight_kg()),
            completed_at: request.completed_at,
        };
        let path = format!("/progress/{}/days", request.program_id);
        let streak: StreakBody = self
            .write(Method::POST, &path, &body)
            .await?
            .json()
            .await
            .map_err(RestError::from)?;
        Ok(Streak::from_persisted(streak.streak, streak.last_completed_on))
    }

    async fn reset_day(
        &self,
        program_id: ProgramId,
        day_index: usize,
    ) -> Result<(), StorageError> {
        let path = format!("/progress/{program_id}/reset-day");
        self.write(Method::POST, &path, &ResetDayBody { day_index })
            .await?;
        Ok(())
    }

    async fn reset_program(&self, program_id: ProgramId) -> Result<(), StorageError> {
        let path = format!("/progress/{program_id}/reset");
        self.write(Method::POST, &path, &serde_json::json!({}))
            .await?;
        Ok(())
    }

    async fn mark_program_complete(
        &self,
        program_id: ProgramId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let path = format!("/progress/{program_id}/complete");
        self.write(Method::POST, &path, &CompletedAtBody { completed_at: at })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_only_covers_transient_statuses() {
        assert!(RestError::HttpStatus(StatusCode::SERVICE_UNAVAILABLE).is_transient());
        assert!(RestError::HttpStatus(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!RestError::HttpStatus(StatusCode::BAD_REQUEST).is_transient());
        assert!(!RestError::HttpStatus(StatusCode::NOT_FOUND).is_transient());
    }

    #[test]
    fn status_errors_map_to_storage_errors() {
        let not_found: StorageError = RestError::HttpStatus(StatusCode::NOT_FOUND).into();
        assert!(matches!(not_found, StorageError::NotFound));
        let conflict: StorageError = RestError::HttpStatus(StatusCode::CONFLICT).into();
        assert!(matches!(conflict, StorageError::Conflict));
        let other: StorageError = RestError::HttpStatus(StatusCode::BAD_GATEWAY).into();
        assert!(matches!(other, StorageError::Connection(_)));
    }

    #[test]
    fn day_body_omits_missing_readings() {
        let body = CompleteDayBody {
            day_index: 2,
            heart_rate: Some(120),
            weight_kg: None,
            completed_at: fitrack_core::time::fixed_now(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["dayIndex"], 2);
        assert_eq!(json["heartRate"], 120);
        assert!(json.get("weightKg").is_none());
    }
}
