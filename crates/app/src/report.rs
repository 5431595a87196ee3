//! Plain-text rendering for the command line.

use fitrack_core::model::DayStatus;
use fitrack_core::progression::{Advance, Cursor, SectionFilter};
use fitrack_core::timer::ExerciseTimer;
use fitrack_core::tracker::TrackerEvent;
use services::ImportReport;
use services::session::{CompletionReport, Notice, ResetReport, WorkoutSession};
use storage::repository::ProgramSummary;

pub fn notices(notices: &[Notice]) {
    for notice in notices {
        eprintln!("warning: {}", notice.message());
    }
}

fn minutes(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn status_mark(status: DayStatus) -> &'static str {
    match status {
        DayStatus::Rest => "~",
        DayStatus::Pending => " ",
        DayStatus::InProgress => ">",
        DayStatus::Completed => "x",
    }
}

pub fn programs(list: &[ProgramSummary]) {
    if list.is_empty() {
        println!("No programs stored yet.");
        return;
    }
    for program in list {
        println!(
            "{:>6}  {:<9}  {}  ({} days, {} exercises)",
            program.id,
            program.kind.as_str(),
            program.title,
            program.days,
            program.exercises
        );
    }
}

pub fn imported(report: &ImportReport) {
    println!(
        "Imported program {} ({} days, {} exercises)",
        report.program_id, report.days, report.exercises
    );
    if !report.notes.is_empty() {
        println!("{} default(s) applied while reading the document", report.notes.len());
    }
}

pub fn session(session: &WorkoutSession, filter: SectionFilter, search: &str) {
    let program = session.program();
    let summary = session.summary();
    println!(
        "{} [{}]  {}% ({}/{})  streak {}  achievements {}",
        program.title(),
        program.kind().as_str(),
        summary.percent,
        summary.completed,
        summary.total,
        summary.streak,
        summary.achievements
    );
    let unlocked: Vec<&str> = session
        .progress()
        .achievements()
        .iter()
        .map(|a| a.as_str())
        .collect();
    if !unlocked.is_empty() {
        println!("  unlocked: {}", unlocked.join(", "));
    }
    if session.progress().program_completed() {
        println!("  program completed");
    }
    println!();

    for day in session.overview() {
        let marker = if day.index == summary.current_day { "*" } else { " " };
        if day.status == DayStatus::Rest {
            println!("{marker}[{}] Day {:<3} {}  rest", status_mark(day.status), day.index + 1, day.title);
            continue;
        }
        println!(
            "{marker}[{}] Day {:<3} {}  {}/{}  {}  {:.0} kcal",
            status_mark(day.status),
            day.index + 1,
            day.title,
            day.completed,
            day.total,
            minutes(day.planned_secs),
            day.calories
        );
    }

    let Some(day) = session.current_day() else {
        return;
    };
    println!();
    println!("Day {}: {}", day.index() + 1, day.title());
    let completed = session.progress().completed();
    let selected = session.current_exercise().map(|e| e.id());
    for exercise in session.filtered_exercises(filter, search) {
        let done = if completed.contains(exercise.id()) { "x" } else { " " };
        let cursor = if selected == Some(exercise.id()) { ">" } else { " " };
        println!(
            "{cursor}[{done}] {:<24} {:<9} {:<10} {}",
            exercise.title(),
            exercise.section().as_str(),
            exercise.kind().label(),
            minutes(exercise.planned_secs(session.tracker().settings()))
        );
    }
}

pub fn completion(session: &WorkoutSession, report: &CompletionReport) {
    let outcome = &report.outcome;
    if !outcome.inserted {
        println!("Already completed; nothing changed.");
        return;
    }
    for event in &outcome.events {
        match event {
            TrackerEvent::ExerciseCompleted {
                exercise_id,
                automatic,
                ..
            } => {
                let how = if *automatic { " (timer)" } else { "" };
                println!("Completed exercise {exercise_id}{how}");
            }
            TrackerEvent::StreakUpdated { count, .. } => println!("Streak: {count} day(s)"),
            TrackerEvent::AchievementUnlocked(achievement) => {
                println!("Achievement unlocked: {}", achievement.as_str());
            }
            TrackerEvent::DayCompleted { day } => println!("Day {} completed", day + 1),
            TrackerEvent::ProgramCompleted { .. } => println!("Program completed!"),
        }
    }
    println!("Progress: {}%", outcome.percent);
    if let Some(advance) = outcome.advance {
        self::advance(session, advance);
    }
    notices(&report.notices);
}

pub fn advance(session: &WorkoutSession, advance: Advance) {
    let title = session.current_exercise().map_or("-", |e| e.title());
    let cursor = advance.cursor();
    match advance {
        Advance::SameDay(_) => println!("Next: {title}"),
        Advance::NextDay(_) => println!("Next: day {} - {title}", cursor.day + 1),
        Advance::Stay(_) => println!("Nothing left to move to."),
    }
}

/// Command-line flags selecting `cursor` in a later run.
fn selection_flags(cursor: Cursor) -> String {
    format!("--day {} --exercise {}", cursor.day + 1, cursor.exercise + 1)
}

/// Skips are not stored, so the next run needs the position spelled out.
pub fn skipped(session: &WorkoutSession, advance: Advance) {
    self::advance(session, advance);
    if !matches!(advance, Advance::Stay(_)) {
        println!("Continue with: {}", selection_flags(advance.cursor()));
    }
}

pub fn reset(what: &str, report: ResetReport) {
    println!("Reset {what}: {} completion(s) cleared", report.removed);
    if report.local_only {
        eprintln!(
            "warning: the backend did not confirm the reset; the next run reloads its progress"
        );
    }
}

pub fn countdown(timer: &ExerciseTimer) {
    println!("  {}", minutes(timer.remaining_secs()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_flags_are_one_based() {
        assert_eq!(selection_flags(Cursor::new(0, 0)), "--day 1 --exercise 1");
        assert_eq!(selection_flags(Cursor::new(2, 4)), "--day 3 --exercise 5");
    }

    #[test]
    fn minutes_pad_seconds() {
        assert_eq!(minutes(65), "1:05");
        assert_eq!(minutes(30), "0:30");
    }
}
