use std::time::Duration;

use bevy::prelude::{Resource, Timer, TimerMode};

/// Quiet period the original app waited after the last keystroke.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(30);

/// Collapses a burst of text changes into a single "settled" signal.
///
/// Every [`notify`](Self::notify) restarts the quiet period; [`tick`](Self::tick)
/// reports `true` once the period elapses without another change. The caller
/// reads the text at fire time, so the last write always wins.
///
/// The first tick after a notify is not counted: its delta covers the frame in
/// which the change arrived, which passed before the change was seen.
#[derive(Resource, Debug, Clone)]
pub struct DebounceScheduler {
    quiet_period: Duration,
    timer: Option<Timer>,
    just_armed: bool,
}

impl Default for DebounceScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_QUIET_PERIOD)
    }
}

impl DebounceScheduler {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            timer: None,
            just_armed: false,
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Cancels any pending fire and starts a fresh quiet period.
    pub fn notify(&mut self) {
        self.timer = Some(Timer::new(self.quiet_period, TimerMode::Once));
        self.just_armed = true;
    }

    /// Advances the pending timer; `true` means the text has settled.
    pub fn tick(&mut self, delta: Duration) -> bool {
        let Some(timer) = self.timer.as_mut() else {
            return false;
        };
        if std::mem::take(&mut self.just_armed) {
            return false;
        }
        if timer.tick(delta).is_finished() {
            self.timer = None;
            return true;
        }
        false
    }

    pub fn cancel(&mut self) {
        self.timer = None;
        self.just_armed = false;
    }

    pub fn is_pending(&self) -> bool {
        self.timer.is_some()
    }
}
