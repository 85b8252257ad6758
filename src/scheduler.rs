//! Recurring task scheduling.
//!
//! The retry timer of the delivery buffer is a recurring task that runs on a
//! host-supplied [`Scheduler`]. Two implementations ship with the crate:
//!
//! - [`ManualScheduler`]: virtual time, advanced explicitly by the host. Suits
//!   single-threaded, event-driven hosts that own their timer queue, and tests.
//! - `TokioScheduler` (feature `tokio`): one interval task per schedule on a
//!   tokio runtime.

use core::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use std::sync::Arc;

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;

/// A task run on every tick of a recurring schedule.
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Identifies a scheduled task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[derive(Debug, Default)]
struct TaskIds(AtomicU64);

impl TaskIds {
    fn next(&self) -> TaskId {
        TaskId(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// A host timer queue able to run recurring tasks.
///
/// Implementations must accept [`cancel`](Scheduler::cancel) for unknown or
/// already cancelled ids, and from inside the task being cancelled.
pub trait Scheduler: Send + Sync + 'static {
    /// Runs `task` every `period`, starting one period from now.
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TaskId;

    /// Stops a task. Idempotent.
    fn cancel(&self, id: TaskId);
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TaskId {
        (**self).schedule_repeating(period, task)
    }

    fn cancel(&self, id: TaskId) {
        (**self).cancel(id)
    }
}

struct ManualTask {
    id: TaskId,
    period: Duration,
    due: Duration,
    /// `None` while the task is running.
    run: Option<RepeatingTask>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    tasks: Vec<ManualTask>,
    cancelled_while_running: HashSet<TaskId, FxBuildHasher>,
}

/// A scheduler driven by explicit calls to [`advance`](Self::advance).
///
/// Clones share the same queue, so the host can keep one handle to drive time
/// while the instrumentation context holds another.
///
/// ```
/// use std::{
///     sync::{
///         Arc,
///         atomic::{AtomicUsize, Ordering},
///     },
///     time::Duration,
/// };
///
/// use clutch_report::scheduler::{ManualScheduler, Scheduler};
///
/// let scheduler = ManualScheduler::new();
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let counter = ticks.clone();
/// let id = scheduler.schedule_repeating(
///     Duration::from_secs(1),
///     Box::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }),
/// );
///
/// scheduler.advance(Duration::from_millis(3500));
/// assert_eq!(ticks.load(Ordering::SeqCst), 3);
///
/// scheduler.cancel(id);
/// scheduler.advance(Duration::from_secs(10));
/// assert_eq!(ticks.load(Ordering::SeqCst), 3);
/// ```
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Arc<spin::Mutex<ManualState>>,
    ids: Arc<TaskIds>,
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("tasks", &state.tasks.len())
            .finish()
    }
}

impl ManualScheduler {
    /// Creates a scheduler at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of live tasks.
    pub fn active_tasks(&self) -> usize {
        self.state.lock().tasks.len()
    }

    /// Moves virtual time forward by `by`, running every task that falls due,
    /// in due-time order and then in scheduling order.
    ///
    /// Returns the number of task runs.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut runs = 0;

        loop {
            let (id, mut run) = {
                let mut state = self.state.lock();
                let next = state
                    .tasks
                    .iter_mut()
                    .filter(|task| task.run.is_some() && task.due <= target)
                    .min_by_key(|task| (task.due, task.id));

                let Some(task) = next else {
                    state.now = target;
                    break;
                };

                let Some(run) = task.run.take() else {
                    break;
                };
                let (id, due) = (task.id, task.due);
                task.due += task.period;
                state.now = due;
                (id, run)
            };

            // The lock is released so the task may schedule or cancel.
            run();
            runs += 1;

            let mut state = self.state.lock();
            if state.cancelled_while_running.remove(&id) {
                state.tasks.retain(|task| task.id != id);
            } else if let Some(task) = state.tasks.iter_mut().find(|task| task.id == id) {
                task.run = Some(run);
            }
        }

        runs
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&self, period: Duration, task: RepeatingTask) -> TaskId {
        let period = period.max(Duration::from_nanos(1));
        let id = self.ids.next();
        let mut state = self.state.lock();
        let due = state.now + period;
        state.tasks.push(ManualTask {
            id,
            period,
            due,
            run: Some(task),
        });
        id
    }

    fn cancel(&self, id: TaskId) {
        let mut state = self.state.lock();
        let Some(index) = state.tasks.iter().position(|task| task.id == id) else {
            return;
        };
        if state.tasks[index].run.is_some() {
            state.tasks.remove(index);
        } else {
            state.cancelled_while_running.insert(id);
        }
    }
}

#[cfg(feature = "tokio")]
pub use self::tokio_impl::TokioScheduler;

#[cfg(feature = "tokio")]
mod tokio_impl {
    use core::{fmt, time::Duration};

    use hashbrown::HashMap;
    use rustc_hash::FxBuildHasher;
    use tokio::{runtime::Handle, task::JoinHandle, time::MissedTickBehavior};

    use super::{RepeatingTask, Scheduler, TaskId, TaskIds};

    /// Runs recurring tasks as tokio interval loops.
    pub struct TokioScheduler {
        handle: Handle,
        ids: TaskIds,
        tasks: spin::Mutex<HashMap<TaskId, JoinHandle<()>, FxBuildHasher>>,
    }

    impl fmt::Debug for TokioScheduler {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("TokioScheduler")
                .field("tasks", &self.tasks.lock().len())
                .finish()
        }
    }

    impl TokioScheduler {
        /// Schedules onto the given runtime.
        pub fn new(handle: Handle) -> Self {
            Self {
                handle,
                ids: TaskIds::default(),
                tasks: spin::Mutex::new(HashMap::default()),
            }
        }

        /// Schedules onto the runtime the caller is running in, if any.
        pub fn try_current() -> Option<Self> {
            Handle::try_current().ok().map(Self::new)
        }
    }

    impl Scheduler for TokioScheduler {
        fn schedule_repeating(&self, period: Duration, mut task: RepeatingTask) -> TaskId {
            let period = period.max(Duration::from_millis(1));
            let id = self.ids.next();
            let join = self.handle.spawn(async move {
                let start = tokio::time::Instant::now() + period;
                let mut interval = tokio::time::interval_at(start, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    task();
                }
            });
            self.tasks.lock().insert(id, join);
            id
        }

        fn cancel(&self, id: TaskId) {
            if let Some(join) = self.tasks.lock().remove(&id) {
                join.abort();
            }
        }
    }

    impl Drop for TokioScheduler {
        fn drop(&mut self) {
            for (_, join) in self.tasks.lock().drain() {
                join.abort();
            }
        }
    }
}
