use std::time::Duration;

use fitrack_core::model::ExerciseId;
use fitrack_core::timer::ExerciseTimer;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const TICK_PERIOD: Duration = Duration::from_secs(1);
const CHANNEL_CAPACITY: usize = 8;

/// One elapsed second from a specific interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
}

/// Drives a session's countdown with a single repeating interval.
///
/// Starting again aborts the previous interval first, and every tick carries
/// the generation of the interval that produced it so late ticks from an
/// aborted interval are dropped. Dropping the ticker aborts its task.
pub struct SessionTicker {
    period: Duration,
    tx: mpsc::Sender<Tick>,
    rx: mpsc::Receiver<Tick>,
    generation: u64,
    task: Option<JoinHandle<()>>,
    following: Option<ExerciseId>,
}

impl Default for SessionTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTicker {
    #[must_use]
    pub fn new() -> Self {
        Self::with_period(TICK_PERIOD)
    }

    #[must_use]
    pub fn with_period(period: Duration) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        Self {
            period,
            tx,
            rx,
            generation: 0,
            task: None,
            following: None,
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    #[must_use]
    pub fn accepts(&self, tick: Tick) -> bool {
        self.task.is_some() && tick.generation == self.generation
    }

    /// Start a fresh interval, replacing any running one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> u64 {
        self.abort();
        self.generation += 1;
        let generation = self.generation;
        let period = self.period;
        let tx = self.tx.clone();
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(Tick { generation }).await.is_err() {
                    break;
                }
            }
        }));
        tracing::trace!(generation, "ticker started");
        generation
    }

    pub fn stop(&mut self) {
        if self.task.is_some() {
            self.abort();
            self.generation += 1;
            self.following = None;
        }
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Match the interval to a countdown: run while it runs, restart when
    /// the counted exercise changes, stop otherwise.
    pub fn follow(&mut self, timer: &ExerciseTimer) {
        if !timer.is_running() {
            self.stop();
            return;
        }
        if !self.is_running() || self.following != timer.exercise_id() {
            self.start();
            self.following = timer.exercise_id();
        }
    }

    /// Next tick of the current interval; `None` when stopped.
    pub async fn next(&mut self) -> Option<Tick> {
        while self.task.is_some() {
            let tick = self.rx.recv().await?;
            if tick.generation == self.generation {
                return Some(tick);
            }
            tracing::trace!(
                stale = tick.generation,
                current = self.generation,
                "dropping stale tick"
            );
        }
        None
    }
}

impl Drop for SessionTicker {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitrack_core::model::{Exercise, ExerciseKind, Section, TrackerSettings};

    fn timer(id: u64) -> ExerciseTimer {
        let exercise = Exercise::new(
            ExerciseId::new(id),
            "Plank",
            ExerciseKind::Time {
                duration_secs: Some(10),
            },
            None,
            Section::Workout,
        )
        .unwrap();
        ExerciseTimer::for_exercise(Some(&exercise), &TrackerSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_ticks_from_current_interval() {
        let mut ticker = SessionTicker::new();
        let generation = ticker.start();
        let tick = ticker.next().await.unwrap();
        assert_eq!(tick.generation, generation);
        assert!(ticker.accepts(tick));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_drops_ticks_from_previous_interval() {
        let mut ticker = SessionTicker::with_period(Duration::from_millis(10));
        let first = ticker.start();
        tokio::time::sleep(Duration::from_millis(35)).await;

        let second = ticker.start();
        assert_ne!(first, second);
        let tick = ticker.next().await.unwrap();
        assert_eq!(tick.generation, second);
        assert!(!ticker.accepts(Tick { generation: first }));
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_ticker_yields_nothing() {
        let mut ticker = SessionTicker::new();
        ticker.start();
        ticker.stop();
        assert!(!ticker.is_running());
        assert_eq!(ticker.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn follow_tracks_running_countdown() {
        let mut ticker = SessionTicker::new();
        let mut t = timer(1);

        ticker.follow(&t);
        assert!(!ticker.is_running());

        t.toggle();
        ticker.follow(&t);
        assert!(ticker.is_running());
        let generation = ticker.generation();

        ticker.follow(&t);
        assert_eq!(ticker.generation(), generation);

        let mut other = timer(2);
        other.toggle();
        ticker.follow(&other);
        assert!(ticker.generation() > generation);

        other.pause();
        ticker.follow(&other);
        assert!(!ticker.is_running());
    }
}
