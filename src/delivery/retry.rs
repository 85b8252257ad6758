use core::time::Duration;

use crate::scheduler::{RepeatingTask, Scheduler, TaskId};

/// The recurring task that polls for an inspector while reports are buffered.
///
/// [`start`](Self::start) and [`stop`](Self::stop) are idempotent: starting a
/// running timer and stopping a stopped one do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct RetryTimer {
    task: Option<TaskId>,
}

impl RetryTimer {
    /// Creates a stopped timer.
    pub const fn new() -> Self {
        Self { task: None }
    }

    /// Whether the timer is scheduled.
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Schedules the task built by `make_task` every `period`, unless the
    /// timer is already running.
    ///
    /// Returns whether a new schedule was created.
    pub fn start(
        &mut self,
        scheduler: &dyn Scheduler,
        period: Duration,
        make_task: impl FnOnce() -> RepeatingTask,
    ) -> bool {
        if self.task.is_some() {
            return false;
        }
        self.task = Some(scheduler.schedule_repeating(period, make_task()));
        true
    }

    /// Cancels the schedule, if any.
    ///
    /// Returns whether the timer was running.
    pub fn stop(&mut self, scheduler: &dyn Scheduler) -> bool {
        match self.task.take() {
            Some(id) => {
                scheduler.cancel(id);
                true
            }
            None => false,
        }
    }
}
