use chrono::Duration;
use fitrack_core::model::{
    Achievement, Biometrics, Day, Exercise, ExerciseId, ExerciseKind, Program, ProgramId,
    ProgramKind, Section,
};
use fitrack_core::time::fixed_now;
use storage::repository::{
    CompletionRequest, DayCompletionRequest, ProgramRepository, ProgressRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

fn build_program() -> Program {
    let timed = |id: u64, section: Section| {
        Exercise::new(
            ExerciseId::new(id),
            format!("Timed {id}"),
            ExerciseKind::Time {
                duration_secs: Some(45),
            },
            Some(7.5),
            section,
        )
        .unwrap()
    };
    let reps = Exercise::new(
        ExerciseId::new(2),
        "Push-ups",
        ExerciseKind::Reps {
            reps: Some(12),
            sets: None,
        },
        None,
        Section::Workout,
    )
    .unwrap();

    Program::new(
        ProgramId::new(7),
        ProgramKind::Challenge,
        "Core Challenge",
        vec![
            Day::new(0, "Kickoff", vec![timed(1, Section::WarmUp), reps]),
            Day::new(1, "Rest", Vec::new()),
            Day::new(2, "Finale", vec![timed(3, Section::CoolDown)]),
        ],
    )
    .unwrap()
}

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn request(exercise: u64, day_index: usize) -> CompletionRequest {
    CompletionRequest {
        program_id: ProgramId::new(7),
        day_index,
        exercise_id: ExerciseId::new(exercise),
        completed_at: fixed_now(),
    }
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_program_tree() {
    let repo = connect("memdb_tree").await;
    let program = build_program();
    repo.upsert_program(&program).await.unwrap();

    let fetched = repo
        .get_program(program.id())
        .await
        .unwrap()
        .expect("program stored");
    assert_eq!(fetched, program);
    assert!(fetched.days()[1].is_rest_day());

    let listed = repo.list_programs().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].kind, ProgramKind::Challenge);
    assert_eq!(listed[0].days, 3);
    assert_eq!(listed[0].exercises, 3);

    assert!(repo.get_program(ProgramId::new(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_upsert_replaces_days() {
    let repo = connect("memdb_replace").await;
    repo.upsert_program(&build_program()).await.unwrap();

    let shorter = Program::new(
        ProgramId::new(7),
        ProgramKind::Program,
        "Core Program",
        vec![Day::new(0, "Only", Vec::new())],
    )
    .unwrap();
    repo.upsert_program(&shorter).await.unwrap();

    let fetched = repo.get_program(ProgramId::new(7)).await.unwrap().unwrap();
    assert_eq!(fetched, shorter);
}

#[tokio::test]
async fn sqlite_completion_updates_streak_and_achievements() {
    let repo = connect("memdb_complete").await;
    repo.upsert_program(&build_program()).await.unwrap();

    let first = repo.complete_exercise(&request(1, 0)).await.unwrap();
    assert!(first.completed().contains(ExerciseId::new(1)));
    assert_eq!(first.streak().count(), 1);
    assert!(first.achievements().contains(Achievement::FirstExercise));

    let again = repo.complete_exercise(&request(1, 0)).await.unwrap();
    assert_eq!(again, first);

    let mut next_day = request(2, 0);
    next_day.completed_at = fixed_now() + Duration::days(1);
    let second = repo.complete_exercise(&next_day).await.unwrap();
    assert_eq!(second.streak().count(), 2);

    let stored = repo.get_progress(ProgramId::new(7)).await.unwrap();
    assert_eq!(stored, second);
}

#[tokio::test]
async fn sqlite_rejects_exercise_outside_day() {
    let repo = connect("memdb_reject").await;
    repo.upsert_program(&build_program()).await.unwrap();

    let err = repo.complete_exercise(&request(3, 0)).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
    let progress = repo.get_progress(ProgramId::new(7)).await.unwrap();
    assert!(progress.completed().is_empty());
}

#[tokio::test]
async fn sqlite_resets_keep_streak_and_achievements() {
    let repo = connect("memdb_reset").await;
    repo.upsert_program(&build_program()).await.unwrap();
    repo.complete_exercise(&request(1, 0)).await.unwrap();
    repo.complete_exercise(&request(3, 2)).await.unwrap();
    repo.mark_program_complete(ProgramId::new(7), fixed_now())
        .await
        .unwrap();

    repo.reset_day(ProgramId::new(7), 0).await.unwrap();
    let after_day = repo.get_progress(ProgramId::new(7)).await.unwrap();
    let ids: Vec<_> = after_day.completed().iter().map(|id| id.value()).collect();
    assert_eq!(ids, vec![3]);
    assert!(!after_day.program_completed());

    repo.reset_program(ProgramId::new(7)).await.unwrap();
    let after_program = repo.get_progress(ProgramId::new(7)).await.unwrap();
    assert!(after_program.completed().is_empty());
    assert_eq!(after_program.streak().count(), 1);
    assert!(after_program.achievements().contains(Achievement::FirstExercise));

    let err = repo.reset_day(ProgramId::new(7), 9).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_day_completion_returns_streak() {
    let repo = connect("memdb_day").await;
    repo.upsert_program(&build_program()).await.unwrap();
    repo.complete_exercise(&request(3, 2)).await.unwrap();

    let streak = repo
        .complete_day(&DayCompletionRequest {
            program_id: ProgramId::new(7),
            day_index: 2,
            biometrics: Some(Biometrics::new(Some(120), Some(72.5)).unwrap()),
            completed_at: fixed_now(),
        })
        .await
        .unwrap();
    assert_eq!(streak.count(), 1);
    assert_eq!(streak.last_completed_on(), Some(fixed_now().date_naive()));
}

#[tokio::test]
async fn sqlite_mark_program_complete_without_progress_row() {
    let repo = connect("memdb_mark").await;
    repo.upsert_program(&build_program()).await.unwrap();
    repo.mark_program_complete(ProgramId::new(7), fixed_now())
        .await
        .unwrap();

    let progress = repo.get_progress(ProgramId::new(7)).await.unwrap();
    assert!(progress.program_completed());
    assert_eq!(progress.streak().count(), 0);
}
