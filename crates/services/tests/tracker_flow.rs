use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fitrack_core::model::{
    Biometrics, Day, Exercise, ExerciseId, ExerciseKind, Program, ProgramId, ProgramKind,
    ProgressRecord, Section, Streak,
};
use fitrack_core::progression::Cursor;
use fitrack_core::time::fixed_now;
use fitrack_core::tracker::TrackerEvent;
use services::Clock;
use services::error::TrackerError;
use services::session::{Notice, PendingAck, PendingReset, ResetMode, TrackerLoopService};
use storage::repository::{
    CompletionRequest, DayCompletionRequest, InMemoryRepository, ProgramRepository,
    ProgressRepository, StorageError,
};

//
// ─── FIXTURES ──────────────────────────────────────────────────────────────────
//

const PROGRAM: ProgramId = ProgramId::new(1);

fn timed(id: u64, title: &str, secs: u32) -> Exercise {
    Exercise::new(
        ExerciseId::new(id),
        title,
        ExerciseKind::Time {
            duration_secs: Some(secs),
        },
        None,
        Section::Workout,
    )
    .unwrap()
}

/// Day 0 has three exercises, day 1 has one, day 2 is a rest day.
fn program() -> Program {
    Program::new(
        PROGRAM,
        ProgramKind::Program,
        "Full Body",
        vec![
            Day::new(
                0,
                "Legs",
                vec![
                    timed(11, "Squat", 3),
                    timed(12, "Lunge", 3),
                    timed(13, "Wall sit", 3),
                ],
            ),
            Day::new(1, "Core", vec![timed(21, "Plank", 3)]),
            Day::new(2, "Rest", Vec::new()),
        ],
    )
    .unwrap()
}

/// Progress backend whose writes can be switched to fail.
struct FlakyProgress {
    inner: InMemoryRepository,
    fail_reads: AtomicBool,
    fail_completions: AtomicBool,
    fail_days: AtomicBool,
    fail_resets: AtomicBool,
}

impl FlakyProgress {
    fn new(inner: InMemoryRepository) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_completions: AtomicBool::new(false),
            fail_days: AtomicBool::new(false),
            fail_resets: AtomicBool::new(false),
        }
    }

    fn guard(flag: &AtomicBool) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Connection("backend offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProgressRepository for FlakyProgress {
    async fn get_progress(&self, program_id: ProgramId) -> Result<ProgressRecord, StorageError> {
        Self::guard(&self.fail_reads)?;
        self.inner.get_progress(program_id).await
    }

    async fn complete_exercise(
        &self,
        request: &CompletionRequest,
    ) -> Result<ProgressRecord, StorageError> {
        Self::guard(&self.fail_completions)?;
        self.inner.complete_exercise(request).await
    }

    async fn complete_day(&self, request: &DayCompletionRequest) -> Result<Streak, StorageError> {
        Self::guard(&self.fail_days)?;
        self.inner.complete_day(request).await
    }

    async fn reset_day(&self, program_id: ProgramId, day_index: usize) -> Result<(), StorageError> {
        Self::guard(&self.fail_resets)?;
        self.inner.reset_day(program_id, day_index).await
    }

    async fn reset_program(&self, program_id: ProgramId) -> Result<(), StorageError> {
        Self::guard(&self.fail_resets)?;
        self.inner.reset_program(program_id).await
    }

    async fn mark_program_complete(
        &self,
        program_id: ProgramId,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        Self::guard(&self.fail_days)?;
        self.inner.mark_program_complete(program_id, at).await
    }
}

async fn setup() -> (InMemoryRepository, Arc<FlakyProgress>, TrackerLoopService) {
    let repo = InMemoryRepository::new();
    repo.upsert_program(&program()).await.unwrap();
    let flaky = Arc::new(FlakyProgress::new(repo.clone()));
    let service = TrackerLoopService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        flaky.clone(),
    );
    (repo, flaky, service)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[tokio::test]
async fn completing_a_program_persists_every_step() {
    let (repo, _flaky, service) = setup().await;
    let loaded = service.start_session(PROGRAM).await.unwrap();
    assert!(!loaded.is_degraded());
    let mut session = loaded.value;

    let first = service.complete_current(&mut session).await.unwrap();
    assert_eq!(first.outcome.percent, 25);
    assert_eq!(session.cursor(), Cursor::new(0, 1));
    assert!(first.notices.is_empty());

    service.complete_current(&mut session).await.unwrap();
    let day_done = service.complete_current(&mut session).await.unwrap();
    assert_eq!(day_done.outcome.day_completed(), Some(0));
    assert_eq!(session.cursor(), Cursor::new(1, 0));
    assert!(session.pending().is_empty());

    let days = repo.day_completions().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0].day_index, 0);

    let last = service.complete_current(&mut session).await.unwrap();
    assert!(last.outcome.program_completed());
    assert_eq!(last.outcome.percent, 100);
    assert!(session.progress().program_completed());

    let stored = repo.get_progress(PROGRAM).await.unwrap();
    assert_eq!(stored.completed().len(), 4);
    assert!(stored.program_completed());
    assert_eq!(stored.streak().count(), 1);

    let summary = session.summary();
    assert_eq!(summary.completed, 4);
    assert_eq!(summary.total, 4);
    assert!(!summary.diverged);
}

#[tokio::test]
async fn completing_twice_sends_nothing_new() {
    let (repo, _flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;

    service.complete_current(&mut session).await.unwrap();
    session.select_exercise(0).unwrap();
    let again = service.complete_current(&mut session).await.unwrap();

    assert!(!again.outcome.inserted);
    assert!(again.outcome.events.is_empty());
    assert_eq!(repo.get_progress(PROGRAM).await.unwrap().completed().len(), 1);
}

#[tokio::test]
async fn rejected_completion_rolls_the_session_back() {
    let (repo, flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    let before = session.clone();

    flaky.fail_completions.store(true, Ordering::SeqCst);
    let err = service.complete_current(&mut session).await.unwrap_err();

    assert!(matches!(
        err,
        TrackerError::Sync {
            operation: "complete exercise",
            ..
        }
    ));
    assert_eq!(session, before);
    assert!(repo.get_progress(PROGRAM).await.unwrap().completed().is_empty());
}

#[tokio::test]
async fn rest_day_cannot_be_completed() {
    let (_repo, _flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    session.select_day(2).unwrap();

    let err = service.complete_current(&mut session).await.unwrap_err();
    assert!(matches!(err, TrackerError::Selection(_)));
}

#[tokio::test]
async fn failed_day_acknowledgement_stays_pending_until_retried() {
    let (repo, flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    session.set_readings(Some(Biometrics::new(Some(142), Some(71.5)).unwrap()));

    flaky.fail_days.store(true, Ordering::SeqCst);
    for _ in 0..2 {
        service.complete_current(&mut session).await.unwrap();
    }
    let report = service.complete_current(&mut session).await.unwrap();

    assert_eq!(report.notices.len(), 1);
    assert!(matches!(
        report.notices[0],
        Notice::AcknowledgementPending {
            ack: PendingAck::DayCompleted { day_index: 0, .. },
            ..
        }
    ));
    assert_eq!(session.tracker().completed_count(), 3);
    assert_eq!(session.pending().len(), 1);
    assert!(repo.day_completions().unwrap().is_empty());

    let still = service.retry_pending(&mut session).await;
    assert_eq!(still.len(), 1);
    assert_eq!(session.pending().len(), 1);

    flaky.fail_days.store(false, Ordering::SeqCst);
    assert!(service.retry_pending(&mut session).await.is_empty());
    assert!(session.pending().is_empty());

    let days = repo.day_completions().unwrap();
    assert_eq!(days.len(), 1);
    let readings = days[0].biometrics.unwrap();
    assert_eq!(readings.heart_rate(), Some(142));
    assert_eq!(readings.weight_kg(), Some(71.5));
    assert!(session.readings().is_none());
}

#[tokio::test]
async fn synced_reset_rolls_back_when_rejected() {
    let (_repo, flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    service.complete_current(&mut session).await.unwrap();
    let before = session.clone();

    flaky.fail_resets.store(true, Ordering::SeqCst);
    let err = service
        .reset_day(&mut session, ResetMode::Synced)
        .await
        .unwrap_err();

    assert!(matches!(err, TrackerError::Sync { operation: "reset day", .. }));
    assert_eq!(session, before);
}

#[tokio::test]
async fn forced_reset_diverges_until_refreshed() {
    let (repo, flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    service.complete_current(&mut session).await.unwrap();

    flaky.fail_resets.store(true, Ordering::SeqCst);
    let report = service
        .reset_program(&mut session, ResetMode::ForceLocal)
        .await
        .unwrap();

    assert_eq!(report.removed, 1);
    assert!(report.local_only);
    assert!(session.is_diverged());
    assert_eq!(session.tracker().completed_count(), 0);
    assert_eq!(session.cursor(), Cursor::default());
    assert_eq!(repo.get_progress(PROGRAM).await.unwrap().completed().len(), 1);

    service.refresh(&mut session).await.unwrap();
    assert!(!session.is_diverged());
    assert_eq!(session.tracker().completed_count(), 1);
}

#[tokio::test]
async fn refused_local_reset_is_reported_when_the_next_completion_restores_it() {
    let (repo, flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    service.complete_current(&mut session).await.unwrap();
    service.complete_current(&mut session).await.unwrap();

    flaky.fail_resets.store(true, Ordering::SeqCst);
    service
        .reset_day(&mut session, ResetMode::ForceLocal)
        .await
        .unwrap();
    assert_eq!(session.pending_resets(), &[PendingReset::Day(0)]);

    session.select_day(1).unwrap();
    let report = service.complete_current(&mut session).await.unwrap();

    assert_eq!(
        report.notices,
        vec![Notice::ResetReverted {
            reset: PendingReset::Day(0),
            restored: vec![ExerciseId::new(11), ExerciseId::new(12)],
            reason: "connection error: backend offline".into(),
        }]
    );
    assert!(!session.is_diverged());
    let ids: Vec<ExerciseId> = session.progress().completed().iter().collect();
    assert_eq!(ids, [11, 12, 21].map(ExerciseId::new));
    assert_eq!(repo.get_progress(PROGRAM).await.unwrap().completed().len(), 3);
}

#[tokio::test]
async fn local_reset_is_stored_before_the_next_completion() {
    let (repo, flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    service.complete_current(&mut session).await.unwrap();
    service.complete_current(&mut session).await.unwrap();

    flaky.fail_resets.store(true, Ordering::SeqCst);
    service
        .reset_day(&mut session, ResetMode::ForceLocal)
        .await
        .unwrap();
    flaky.fail_resets.store(false, Ordering::SeqCst);

    session.select_day(1).unwrap();
    let report = service.complete_current(&mut session).await.unwrap();

    assert!(report.notices.is_empty());
    assert!(!session.is_diverged());
    let stored: Vec<ExerciseId> = repo
        .get_progress(PROGRAM)
        .await
        .unwrap()
        .completed()
        .iter()
        .collect();
    assert_eq!(stored, [ExerciseId::new(21)]);
    assert_eq!(session.tracker().completed_count(), 1);
}

#[tokio::test]
async fn stored_reset_clears_backend_progress() {
    let (repo, _flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    service.complete_current(&mut session).await.unwrap();
    service.complete_current(&mut session).await.unwrap();

    let report = service
        .reset_day(&mut session, ResetMode::Synced)
        .await
        .unwrap();

    assert_eq!(report.removed, 2);
    assert!(!report.local_only);
    assert_eq!(session.cursor(), Cursor::new(0, 0));
    let stored = repo.get_progress(PROGRAM).await.unwrap();
    assert!(stored.completed().is_empty());
    assert_eq!(stored.streak().count(), 1);
}

#[tokio::test]
async fn unreadable_progress_starts_fresh_with_a_notice() {
    let (_repo, flaky, service) = setup().await;
    flaky.fail_reads.store(true, Ordering::SeqCst);

    let loaded = service.start_session(PROGRAM).await.unwrap();

    assert!(loaded.is_degraded());
    assert!(matches!(
        loaded.notices[0],
        Notice::ProgressUnavailable { .. }
    ));
    assert_eq!(loaded.value.tracker().completed_count(), 0);
}

#[tokio::test]
async fn unknown_program_is_an_error() {
    let (_repo, _flaky, service) = setup().await;
    let err = service
        .start_session(ProgramId::new(404))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::ProgramNotFound(id) if id == ProgramId::new(404)));
}

#[tokio::test]
async fn expired_countdown_completes_automatically() {
    let (repo, _flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    session.toggle_timer();

    assert!(service.tick(&mut session).await.unwrap().is_none());
    assert!(service.tick(&mut session).await.unwrap().is_none());
    let report = service.tick(&mut session).await.unwrap().unwrap();

    assert!(report.outcome.events.contains(&TrackerEvent::ExerciseCompleted {
        exercise_id: ExerciseId::new(11),
        day: 0,
        automatic: true,
    }));
    assert_eq!(session.cursor(), Cursor::new(0, 1));
    assert!(
        repo.get_progress(PROGRAM)
            .await
            .unwrap()
            .completed()
            .contains(ExerciseId::new(11))
    );
}

#[tokio::test]
async fn failed_automatic_completion_pauses_the_countdown() {
    let (_repo, flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    session.toggle_timer();
    service.tick(&mut session).await.unwrap();
    service.tick(&mut session).await.unwrap();

    flaky.fail_completions.store(true, Ordering::SeqCst);
    assert!(service.tick(&mut session).await.is_err());

    assert_eq!(session.tracker().completed_count(), 0);
    assert_eq!(
        session.timer().state(),
        fitrack_core::timer::TimerState::Paused
    );
}

#[tokio::test]
async fn skip_moves_on_without_writing() {
    let (repo, _flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    session.select_exercise(2).unwrap();

    let advance = service.skip(&mut session);

    assert_eq!(advance.cursor(), Cursor::new(1, 0));
    assert!(repo.get_progress(PROGRAM).await.unwrap().completed().is_empty());
}

#[tokio::test]
async fn consecutive_days_extend_the_streak() {
    let (repo, _flaky, service) = setup().await;
    let mut session = service.start_session(PROGRAM).await.unwrap().value;
    service.complete_current(&mut session).await.unwrap();

    let mut clock = Clock::fixed(fixed_now());
    clock.advance(chrono::Duration::days(1));
    let tomorrow = service.clone().with_clock(clock);
    let report = tomorrow.complete_current(&mut session).await.unwrap();

    assert!(report.outcome.events.iter().any(|e| matches!(
        e,
        TrackerEvent::StreakUpdated { count: 2, .. }
    )));
    assert_eq!(session.summary().streak, 2);
    assert_eq!(repo.get_progress(PROGRAM).await.unwrap().streak().count(), 2);
}
