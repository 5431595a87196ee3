use serde::{Deserialize, Serialize};

use crate::model::{CompletedSet, Day, DayStatus, Exercise, Program, Section, TrackerSettings};

//
// ─── CURSOR ────────────────────────────────────────────────────────────────────
//

/// Selected day and exercise within a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cursor {
    pub day: usize,
    pub exercise: usize,
}

impl Cursor {
    #[must_use]
    pub fn new(day: usize, exercise: usize) -> Self {
        Self { day, exercise }
    }
}

/// Where advancement landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Next unfinished exercise later in the same day.
    SameDay(Cursor),
    /// First exercise of the following day.
    NextDay(Cursor),
    /// Nothing further; selection stays put.
    Stay(Cursor),
}

impl Advance {
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        match self {
            Self::SameDay(c) | Self::NextDay(c) | Self::Stay(c) => *c,
        }
    }
}

/// Choose the next selection after completing or skipping `from`.
///
/// Picks the lowest index strictly after `from.exercise` in the same day
/// that is not completed; otherwise index 0 of the next day; otherwise
/// stays on `from`. Never moves backwards.
#[must_use]
pub fn next_position(program: &Program, from: Cursor, completed: &CompletedSet) -> Advance {
    if let Some(day) = program.day(from.day) {
        let later = day
            .exercises()
            .iter()
            .enumerate()
            .skip(from.exercise.saturating_add(1))
            .find(|(_, e)| !completed.contains(e.id()));
        if let Some((index, _)) = later {
            return Advance::SameDay(Cursor::new(from.day, index));
        }
    }

    let next_day = from.day.saturating_add(1);
    if next_day < program.days().len() {
        return Advance::NextDay(Cursor::new(next_day, 0));
    }
    Advance::Stay(from)
}

//
// ─── FILTERING ─────────────────────────────────────────────────────────────────
//

/// Section filter for the exercise list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionFilter {
    #[default]
    All,
    Only(Section),
}

impl SectionFilter {
    fn matches(self, section: Section) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == section,
        }
    }
}

/// Exercises of `day` matching both the section filter and a
/// case-insensitive title substring, in their original order.
#[must_use]
pub fn filter_exercises<'a>(day: &'a Day, filter: SectionFilter, query: &str) -> Vec<&'a Exercise> {
    let needle = query.trim().to_lowercase();
    day.exercises()
        .iter()
        .filter(|e| filter.matches(e.section()))
        .filter(|e| needle.is_empty() || e.title().to_lowercase().contains(&needle))
        .collect()
}

//
// ─── DAY OVERVIEW ──────────────────────────────────────────────────────────────
//

/// Presentation-agnostic summary of one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayOverview {
    pub index: usize,
    pub title: String,
    pub status: DayStatus,
    pub completed: usize,
    pub total: usize,
    pub planned_secs: u32,
    pub calories: f32,
}

#[must_use]
pub fn day_overview(day: &Day, completed: &CompletedSet, settings: &TrackerSettings) -> DayOverview {
    DayOverview {
        index: day.index(),
        title: day.title().to_owned(),
        status: DayStatus::classify(day, completed),
        completed: day.exercise_ids().filter(|id| completed.contains(*id)).count(),
        total: day.exercises().len(),
        planned_secs: day
            .exercises()
            .iter()
            .map(|e| e.planned_secs(settings))
            .fold(0_u32, u32::saturating_add),
        calories: day.exercises().iter().filter_map(Exercise::calories).sum(),
    }
}

#[must_use]
pub fn program_overview(
    program: &Program,
    completed: &CompletedSet,
    settings: &TrackerSettings,
) -> Vec<DayOverview> {
    program
        .days()
        .iter()
        .map(|day| day_overview(day, completed, settings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExerciseId, ExerciseKind, ProgramId, ProgramKind};

    fn ex(id: u64, title: &str, section: Section) -> Exercise {
        Exercise::new(
            ExerciseId::new(id),
            title,
            ExerciseKind::Time {
                duration_secs: Some(40),
            },
            Some(5.0),
            section,
        )
        .unwrap()
    }

    fn program(days: Vec<Vec<u64>>) -> Program {
        let days = days
            .into_iter()
            .enumerate()
            .map(|(i, ids)| {
                Day::new(
                    i,
                    format!("Day {}", i + 1),
                    ids.into_iter()
                        .map(|id| ex(id, &format!("Ex {id}"), Section::Workout))
                        .collect(),
                )
            })
            .collect();
        Program::new(ProgramId::new(1), ProgramKind::Program, "P", days).unwrap()
    }

    fn done(ids: &[u64]) -> CompletedSet {
        ids.iter().copied().map(ExerciseId::new).collect()
    }

    #[test]
    fn advances_to_lowest_unfinished_later_index() {
        let p = program(vec![vec![1, 2, 3, 4]]);
        let next = next_position(&p, Cursor::new(0, 0), &done(&[1, 2]));
        assert_eq!(next, Advance::SameDay(Cursor::new(0, 2)));
    }

    #[test]
    fn never_moves_back_to_earlier_unfinished_exercise() {
        let p = program(vec![vec![1, 2, 3]]);
        let next = next_position(&p, Cursor::new(0, 1), &done(&[2]));
        assert_eq!(next, Advance::SameDay(Cursor::new(0, 2)));
    }

    #[test]
    fn moves_to_next_day_when_day_has_nothing_left() {
        let p = program(vec![vec![1], vec![2]]);
        let next = next_position(&p, Cursor::new(0, 0), &done(&[1]));
        assert_eq!(next, Advance::NextDay(Cursor::new(1, 0)));
    }

    #[test]
    fn moves_to_next_day_even_if_it_is_a_rest_day() {
        let p = program(vec![vec![1], vec![], vec![3]]);
        let next = next_position(&p, Cursor::new(0, 0), &done(&[1]));
        assert_eq!(next, Advance::NextDay(Cursor::new(1, 0)));
    }

    #[test]
    fn stays_on_last_exercise_of_last_day() {
        let p = program(vec![vec![1, 2]]);
        let next = next_position(&p, Cursor::new(0, 1), &done(&[1, 2]));
        assert_eq!(next, Advance::Stay(Cursor::new(0, 1)));
    }

    #[test]
    fn filter_matches_section_and_query() {
        let day = Day::new(
            0,
            "Mixed",
            vec![
                ex(1, "Arm Circles", Section::WarmUp),
                ex(2, "Push-ups", Section::Workout),
                ex(3, "Pull-ups", Section::Workout),
                ex(4, "Child's pose", Section::CoolDown),
            ],
        );
        let ids = |v: Vec<&Exercise>| v.iter().map(|e| e.id().value()).collect::<Vec<_>>();

        assert_eq!(ids(filter_exercises(&day, SectionFilter::All, "")), vec![1, 2, 3, 4]);
        assert_eq!(
            ids(filter_exercises(&day, SectionFilter::Only(Section::Workout), "")),
            vec![2, 3]
        );
        assert_eq!(ids(filter_exercises(&day, SectionFilter::All, "UPS")), vec![2, 3]);
        assert_eq!(
            ids(filter_exercises(&day, SectionFilter::Only(Section::WarmUp), "ups")),
            Vec::<u64>::new()
        );
    }

    #[test]
    fn overview_reports_counts_and_totals() {
        let p = program(vec![vec![1, 2], vec![]]);
        let overview = program_overview(&p, &done(&[2]), &TrackerSettings::default());
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].status, DayStatus::InProgress);
        assert_eq!(overview[0].completed, 1);
        assert_eq!(overview[0].total, 2);
        assert_eq!(overview[0].planned_secs, 80);
        assert!((overview[0].calories - 10.0).abs() < f32::EPSILON);
        assert_eq!(overview[1].status, DayStatus::Rest);
    }
}
