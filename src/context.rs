//! The instrumentation context.
//!
//! An [`Instrumentation`] owns everything instances share: the delivery buffer
//! and its retry timer, the fallback instance counter, and the attached
//! inspector. Create one when the application starts, hand clones to whatever
//! renders instrumented instances, and call
//! [`shutdown`](Instrumentation::shutdown) when it stops. Independent trees can
//! use independent contexts.

use core::fmt;

use clutch_report_internals::{InstanceCounter, ScopeId};
use triomphe::Arc;

use crate::{
    config::InstrumentationConfig,
    delivery::{BufferedReport, DeliveryBuffer, RetryTimer},
    inspector::{self, SharedSink, SinkSlot},
    report::Report,
    scheduler::Scheduler,
};

struct Delivery {
    buffer: DeliveryBuffer,
    timer: RetryTimer,
}

struct Shared {
    config: InstrumentationConfig,
    scheduler: Box<dyn Scheduler>,
    sink: SinkSlot,
    delivery: spin::Mutex<Delivery>,
    instances: InstanceCounter,
}

/// Handle to a shared instrumentation context.
///
/// Cloning is cheap; all clones refer to the same context.
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, time::Duration};
///
/// use clutch_report::{
///     Instrumentation,
///     inspector::MemoryInspector,
///     report::Report,
///     scheduler::ManualScheduler,
/// };
///
/// let scheduler = ManualScheduler::new();
/// let instrumentation = Instrumentation::builder(scheduler.clone())
///     .global_inspector(false)
///     .build();
///
/// // Nobody is listening yet, so the report waits in the buffer.
/// instrumentation.send("0#page#none", &Report::own("page", None, None, None), None);
/// assert_eq!(instrumentation.pending(), 1);
///
/// // Once an inspector is attached the next tick delivers it.
/// let memory = Arc::new(MemoryInspector::new());
/// instrumentation.attach_inspector(memory.clone());
/// scheduler.advance(Duration::from_secs(1));
/// assert_eq!(memory.delivered_keys(), ["0#page#none"]);
/// assert_eq!(instrumentation.pending(), 0);
/// ```
#[derive(Clone)]
pub struct Instrumentation(Arc<Shared>);

impl fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let delivery = self.0.delivery.lock();
        f.debug_struct("Instrumentation")
            .field("config", &self.0.config)
            .field("attached", &self.0.sink.is_set())
            .field("pending", &delivery.buffer.len())
            .field("retrying", &delivery.timer.is_running())
            .finish()
    }
}

/// Builder for an [`Instrumentation`] context.
///
/// Starts from [`InstrumentationConfig::from_env`].
pub struct InstrumentationBuilder {
    config: InstrumentationConfig,
    scheduler: Box<dyn Scheduler>,
}

impl fmt::Debug for InstrumentationBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstrumentationBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl InstrumentationBuilder {
    /// Replaces the whole configuration.
    pub fn config(mut self, config: InstrumentationConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets how often the retry timer polls for an inspector.
    pub fn retry_period(mut self, period: core::time::Duration) -> Self {
        self.config.retry_period = period;
        self
    }

    /// Bounds the buffer, `None` for no bound.
    pub fn buffer_capacity(mut self, capacity: Option<usize>) -> Self {
        self.config.buffer_capacity = capacity;
        self
    }

    /// Whether to fall back to the process-wide inspector handle.
    pub fn global_inspector(mut self, enabled: bool) -> Self {
        self.config.use_global_inspector = enabled;
        self
    }

    /// Creates the context.
    pub fn build(self) -> Instrumentation {
        let config = self.config.normalized();
        Instrumentation(Arc::new(Shared {
            delivery: spin::Mutex::new(Delivery {
                buffer: DeliveryBuffer::new(config.buffer_capacity),
                timer: RetryTimer::new(),
            }),
            config,
            scheduler: self.scheduler,
            sink: SinkSlot::new(),
            instances: InstanceCounter::new(),
        }))
    }
}

impl Shared {
    fn inspector(&self) -> Option<SharedSink> {
        self.sink.get().or_else(|| {
            if self.config.use_global_inspector {
                inspector::current_v1()
            } else {
                None
            }
        })
    }

    /// Delivers everything buffered so far and stops the retry timer.
    fn flush_to(&self, sink: &SharedSink) -> usize {
        let entries = {
            let mut delivery = self.delivery.lock();
            let Delivery { buffer, timer } = &mut *delivery;
            if timer.stop(&*self.scheduler) {
                tracing::debug!(target: "clutch_report::delivery", "retry timer stopped");
            }
            buffer.take()
        };

        let count = entries.len();
        if count > 0 {
            tracing::debug!(target: "clutch_report::delivery", count, "flushing buffered reports");
        }
        for entry in entries {
            sink.report(&entry.key, &entry.report, entry.internal_id.as_deref());
        }
        count
    }

    fn retry_tick(&self) {
        match self.inspector() {
            Some(sink) => {
                self.flush_to(&sink);
            }
            None => {
                tracing::trace!(target: "clutch_report::delivery", "no inspector attached yet");
            }
        }
    }
}

impl Instrumentation {
    /// Starts building a context that schedules its retry timer on
    /// `scheduler`.
    pub fn builder(scheduler: impl Scheduler) -> InstrumentationBuilder {
        InstrumentationBuilder {
            config: InstrumentationConfig::from_env(),
            scheduler: Box::new(scheduler),
        }
    }

    /// Creates a context with the environment-derived configuration.
    pub fn new(scheduler: impl Scheduler) -> Self {
        Self::builder(scheduler).build()
    }

    /// The effective configuration.
    pub fn config(&self) -> &InstrumentationConfig {
        &self.0.config
    }

    /// The fallback identity source shared by every instance of this context.
    pub fn instance_counter(&self) -> &InstanceCounter {
        &self.0.instances
    }

    /// Attaches an inspector to this context, returning the previous one.
    ///
    /// Buffered reports are delivered on the next send or retry tick.
    pub fn attach_inspector(&self, sink: SharedSink) -> Option<SharedSink> {
        tracing::debug!(target: "clutch_report::delivery", "inspector attached");
        self.0.sink.replace(Some(sink))
    }

    /// Detaches the context's own inspector, returning it.
    pub fn detach_inspector(&self) -> Option<SharedSink> {
        self.0.sink.replace(None)
    }

    /// The inspector reports would be delivered to right now.
    pub fn inspector(&self) -> Option<SharedSink> {
        self.0.inspector()
    }

    /// Whether an inspector is reachable.
    pub fn has_inspector(&self) -> bool {
        self.0.inspector().is_some()
    }

    /// Sends a report under `key`.
    ///
    /// With an inspector reachable, anything still buffered is delivered first
    /// and then the report itself. Otherwise the report is queued and the
    /// retry timer started.
    pub fn send(&self, key: &str, report: &Report, internal_id: Option<&str>) {
        if let Some(sink) = self.0.inspector() {
            self.0.flush_to(&sink);
            sink.report(key, report, internal_id);
            return;
        }

        let mut delivery = self.0.delivery.lock();
        let Delivery { buffer, timer } = &mut *delivery;

        let evicted = buffer.push(BufferedReport {
            key: key.to_owned(),
            report: report.clone(),
            internal_id: internal_id.map(str::to_owned),
        });
        if let Some(evicted) = evicted {
            tracing::warn!(
                target: "clutch_report::delivery",
                key = %evicted.key,
                total_evicted = buffer.evicted(),
                "report buffer full, dropped oldest report"
            );
        }

        let shared = self.0.clone();
        let started = timer.start(&*self.0.scheduler, self.0.config.retry_period, move || {
            Box::new(move || shared.retry_tick())
        });
        if started {
            tracing::debug!(
                target: "clutch_report::delivery",
                period = ?self.0.config.retry_period,
                "no inspector, buffering reports"
            );
        }
    }

    /// Delivers buffered reports now, if an inspector is reachable.
    ///
    /// Returns the number of reports delivered.
    pub fn flush(&self) -> usize {
        match self.0.inspector() {
            Some(sink) => self.0.flush_to(&sink),
            None => 0,
        }
    }

    /// Number of reports waiting for an inspector.
    pub fn pending(&self) -> usize {
        self.0.delivery.lock().buffer.len()
    }

    /// Number of reports evicted from the buffer so far.
    pub fn evicted(&self) -> u64 {
        self.0.delivery.lock().buffer.evicted()
    }

    /// Whether the retry timer is running.
    pub fn is_retrying(&self) -> bool {
        self.0.delivery.lock().timer.is_running()
    }

    /// Cancels a pending removal of the reports under `scope`.
    ///
    /// Does nothing when no inspector is reachable.
    pub fn cancel_drop_reports(&self, scope: &ScopeId) {
        if let Some(sink) = self.0.inspector() {
            tracing::trace!(target: "clutch_report::lifecycle", %scope, "cancel drop");
            sink.cancel_drop_reports(scope);
        }
    }

    /// Requests removal of the reports under `scope`.
    ///
    /// Does nothing when no inspector is reachable; buffered reports under
    /// `scope` are still delivered once one is.
    pub fn drop_reports(&self, scope: &ScopeId) {
        if let Some(sink) = self.0.inspector() {
            tracing::trace!(target: "clutch_report::lifecycle", %scope, "drop reports");
            sink.drop_reports(scope);
        }
    }

    /// Stops the retry timer and detaches the context's own inspector.
    ///
    /// Buffered reports are kept; a later send restarts the timer. Idempotent.
    pub fn shutdown(&self) {
        self.0.delivery.lock().timer.stop(&*self.0.scheduler);
        self.0.sink.replace(None);
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;
    use std::sync::Arc as StdArc;

    use super::*;
    use crate::{
        inspector::{InspectorEvent, InspectorSink, MemoryInspector},
        scheduler::ManualScheduler,
    };

    static_assertions::assert_impl_all!(Instrumentation: Send, Sync, Clone);

    fn local(scheduler: &ManualScheduler) -> Instrumentation {
        Instrumentation::builder(scheduler.clone())
            .config(InstrumentationConfig {
                use_global_inspector: false,
                ..InstrumentationConfig::default()
            })
            .build()
    }

    fn report(id: &str) -> Report {
        Report::own(id, None, None, None)
    }

    #[test]
    fn test_buffered_reports_delivered_once_in_order() {
        let scheduler = ManualScheduler::new();
        let instrumentation = local(&scheduler);

        let keys: Vec<String> = (0..5).map(|i| format!("0#item#{i}")).collect();
        for key in &keys {
            instrumentation.send(key, &report("item"), None);
        }
        assert_eq!(instrumentation.pending(), 5);
        assert!(instrumentation.is_retrying());

        // Ticks without an inspector change nothing.
        scheduler.advance(Duration::from_secs(3));
        assert_eq!(instrumentation.pending(), 5);

        let memory = StdArc::new(MemoryInspector::new());
        instrumentation.attach_inspector(memory.clone());
        scheduler.advance(Duration::from_secs(1));

        assert_eq!(memory.delivered_keys(), keys);
        assert_eq!(instrumentation.pending(), 0);
        assert!(!instrumentation.is_retrying());
        assert_eq!(scheduler.active_tasks(), 0);

        scheduler.advance(Duration::from_secs(10));
        assert_eq!(memory.delivered_keys().len(), 5);
    }

    #[test]
    fn test_send_with_inspector_is_immediate() {
        let scheduler = ManualScheduler::new();
        let instrumentation = local(&scheduler);
        let memory = StdArc::new(MemoryInspector::new());
        instrumentation.attach_inspector(memory.clone());

        instrumentation.send("0#a#none", &report("a"), Some("node-1"));
        assert_eq!(memory.delivered_keys(), ["0#a#none"]);
        assert_eq!(instrumentation.pending(), 0);
        assert!(!instrumentation.is_retrying());
        assert_eq!(scheduler.active_tasks(), 0);

        match &memory.events()[0] {
            InspectorEvent::Report { internal_id, .. } => {
                assert_eq!(internal_id.as_deref(), Some("node-1"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_send_flushes_backlog_first() {
        let scheduler = ManualScheduler::new();
        let instrumentation = local(&scheduler);

        instrumentation.send("0#old#", &report("old"), None);
        let memory = StdArc::new(MemoryInspector::new());
        instrumentation.attach_inspector(memory.clone());
        instrumentation.send("0#new#", &report("new"), None);

        assert_eq!(memory.delivered_keys(), ["0#old#", "0#new#"]);
        assert!(!instrumentation.is_retrying());
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[test]
    fn test_single_timer_while_buffering() {
        let scheduler = ManualScheduler::new();
        let instrumentation = local(&scheduler);
        for i in 0..3 {
            instrumentation.send(&format!("0#{i}#"), &report("x"), None);
        }
        assert_eq!(scheduler.active_tasks(), 1);
    }

    #[test]
    fn test_buffer_bound_drops_oldest() {
        let scheduler = ManualScheduler::new();
        let instrumentation = Instrumentation::builder(scheduler.clone())
            .global_inspector(false)
            .buffer_capacity(Some(2))
            .build();

        for key in ["0#a#", "0#b#", "0#c#"] {
            instrumentation.send(key, &report("x"), None);
        }
        assert_eq!(instrumentation.evicted(), 1);

        let memory = StdArc::new(MemoryInspector::new());
        instrumentation.attach_inspector(memory.clone());
        assert_eq!(instrumentation.flush(), 2);
        assert_eq!(memory.delivered_keys(), ["0#b#", "0#c#"]);
    }

    #[test]
    fn test_zero_capacity_still_delivers_latest() {
        let scheduler = ManualScheduler::new();
        let instrumentation = Instrumentation::builder(scheduler.clone())
            .global_inspector(false)
            .buffer_capacity(Some(0))
            .build();
        assert_eq!(instrumentation.config().buffer_capacity, Some(1));

        instrumentation.send("0#a#", &report("a"), None);
        instrumentation.send("0#b#", &report("b"), None);
        assert_eq!(instrumentation.pending(), 1);

        let memory = StdArc::new(MemoryInspector::new());
        instrumentation.attach_inspector(memory.clone());
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(memory.delivered_keys(), ["0#b#"]);
    }

    /// Sends another report from inside `report`, the way a re-entrant
    /// inspector might.
    struct Reentrant {
        instrumentation: spin::Mutex<Option<Instrumentation>>,
        inner: MemoryInspector,
    }

    impl InspectorSink for Reentrant {
        fn report(&self, key: &str, report: &Report, internal_id: Option<&str>) {
            self.inner.report(key, report, internal_id);
            if key == "0#first#" {
                let instrumentation = self.instrumentation.lock().clone();
                if let Some(instrumentation) = instrumentation {
                    instrumentation.send("0#nested#", report, None);
                }
            }
        }

        fn cancel_drop_reports(&self, scope: &ScopeId) {
            self.inner.cancel_drop_reports(scope);
        }

        fn drop_reports(&self, scope: &ScopeId) {
            self.inner.drop_reports(scope);
        }
    }

    #[test]
    fn test_flush_tolerates_reentrant_sends() {
        let scheduler = ManualScheduler::new();
        let instrumentation = local(&scheduler);
        instrumentation.send("0#first#", &report("a"), None);
        instrumentation.send("0#second#", &report("b"), None);

        let sink = StdArc::new(Reentrant {
            instrumentation: spin::Mutex::new(Some(instrumentation.clone())),
            inner: MemoryInspector::new(),
        });
        instrumentation.attach_inspector(sink.clone());
        scheduler.advance(Duration::from_secs(1));

        // The nested send lands while the backlog is out of the buffer, so it
        // is delivered between the two buffered reports.
        assert_eq!(
            sink.inner.delivered_keys(),
            ["0#first#", "0#nested#", "0#second#"]
        );
        assert_eq!(instrumentation.pending(), 0);

        *sink.instrumentation.lock() = None;
    }

    #[test]
    fn test_drop_without_inspector_keeps_buffer() {
        let scheduler = ManualScheduler::new();
        let instrumentation = local(&scheduler);
        instrumentation.send("4#a#none", &report("a"), None);
        instrumentation.send("5#b#none", &report("b"), None);

        instrumentation.drop_reports(&ScopeId::new("4"));
        instrumentation.cancel_drop_reports(&ScopeId::new("4"));
        assert_eq!(instrumentation.pending(), 2);

        let memory = StdArc::new(MemoryInspector::new());
        instrumentation.attach_inspector(memory.clone());
        scheduler.advance(Duration::from_secs(1));
        assert_eq!(memory.delivered_keys(), ["4#a#none", "5#b#none"]);
        // Nothing is replayed to the late inspector.
        assert_eq!(memory.events().len(), 2);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let scheduler = ManualScheduler::new();
        let instrumentation = local(&scheduler);
        instrumentation.attach_inspector(StdArc::new(MemoryInspector::new()));
        instrumentation.shutdown();
        assert!(!instrumentation.has_inspector());

        instrumentation.send("0#a#", &report("a"), None);
        assert!(instrumentation.is_retrying());
        instrumentation.shutdown();
        instrumentation.shutdown();
        assert!(!instrumentation.is_retrying());
        assert_eq!(scheduler.active_tasks(), 0);
        assert_eq!(instrumentation.pending(), 1);
    }

    #[test]
    fn test_global_inspector_handle() {
        let scheduler = ManualScheduler::new();
        let global = Instrumentation::builder(scheduler.clone())
            .global_inspector(true)
            .build();
        let isolated = local(&scheduler);

        global.send("0#early#", &report("early"), None);

        let memory = StdArc::new(MemoryInspector::new());
        inspector::install(memory.clone()).unwrap();
        assert!(inspector::install(StdArc::new(MemoryInspector::new())).is_err());

        assert!(global.has_inspector());
        assert!(!isolated.has_inspector());

        scheduler.advance(Duration::from_secs(1));
        global.send("0#late#", &report("late"), None);
        assert_eq!(memory.delivered_keys(), ["0#early#", "0#late#"]);

        // A local inspector wins over the global one.
        let local_memory = StdArc::new(MemoryInspector::new());
        global.attach_inspector(local_memory.clone());
        global.send("0#local#", &report("local"), None);
        assert_eq!(local_memory.delivered_keys(), ["0#local#"]);

        assert!(inspector::uninstall().is_some());
        assert!(!inspector::is_installed());
    }

    #[cfg(feature = "tokio")]
    #[tokio::test(start_paused = true)]
    async fn test_retry_flush_on_tokio() {
        let scheduler = crate::scheduler::TokioScheduler::try_current().unwrap();
        let instrumentation = Instrumentation::builder(scheduler)
            .global_inspector(false)
            .retry_period(Duration::from_millis(500))
            .build();

        instrumentation.send("0#a#none", &report("a"), None);
        instrumentation.send("0#b#", &report("b"), None);
        assert!(instrumentation.is_retrying());

        tokio::time::sleep(Duration::from_millis(750)).await;
        assert_eq!(instrumentation.pending(), 2);

        let memory = StdArc::new(MemoryInspector::new());
        instrumentation.attach_inspector(memory.clone());
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(memory.delivered_keys(), ["0#a#none", "0#b#"]);
        assert_eq!(instrumentation.pending(), 0);
        assert!(!instrumentation.is_retrying());
    }
}
