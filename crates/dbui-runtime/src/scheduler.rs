#![forbid(unsafe_code)]

//! Coalescing update scheduler.
//!
//! [`UpdateScheduler::schedule_update`] may be called from any thread, any
//! number of times. It enqueues a representation at most once per pending
//! pass (the claim lives in the representation's [`DirtySet`]) and posts at
//! most one UI callback for everything enqueued before that callback runs.
//!
//! # Invariants
//!
//! 1. A representation is in the queue at most once.
//! 2. At most one flush callback is outstanding. The callback clears the
//!    `armed` flag before draining, so work enqueued during a flush arms a
//!    new callback.
//! 3. The queue holds weak references. A representation dropped while
//!    queued is counted as stale and skipped.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | Representation disposed while queued | Pass reports stale, nothing touched |
//! | Representation dropped while queued | Counted stale |
//! | Queue longer than `max_pass_batch` | Remainder re-posted in a new callback |

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use dbui_core::sync::lock;

use crate::config::RuntimeConfig;
use crate::debug_trace::{self, TraceEvent};
use crate::dirty::DirtySet;
use crate::toolkit::UiExecutor;

/// Result of running one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran. `failed` categories raised an error.
    Ran { serviced: u32, failed: u32 },
    /// The target was disposed or not yet live; nothing was touched.
    Stale,
}

/// Something the scheduler can run a pass for.
pub trait PendingPass: Send + Sync + 'static {
    fn dirty(&self) -> &DirtySet;

    /// Reconcile pending flags. Called on the UI thread only.
    fn run_pass(&self) -> PassOutcome;
}

/// Counters for observing scheduler behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// `schedule_update` calls.
    pub requests: u64,
    /// Requests absorbed by an already pending pass.
    pub coalesced: u64,
    /// UI callbacks posted.
    pub callbacks: u64,
    /// Passes that ran.
    pub passes: u64,
    /// Passes skipped because the target was disposed or dropped.
    pub stale: u64,
    /// Dirty categories whose reconciliation failed.
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    coalesced: AtomicU64,
    callbacks: AtomicU64,
    passes: AtomicU64,
    stale: AtomicU64,
    failures: AtomicU64,
}

struct SchedulerInner {
    executor: Arc<dyn UiExecutor>,
    queue: Mutex<VecDeque<Weak<dyn PendingPass>>>,
    armed: AtomicBool,
    max_batch: usize,
    counters: Counters,
}

/// Handle to the scheduler. Cloning shares it.
#[derive(Clone)]
pub struct UpdateScheduler {
    inner: Arc<SchedulerInner>,
}

impl fmt::Debug for UpdateScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateScheduler")
            .field("queued", &self.queued())
            .field("armed", &self.inner.armed.load(Ordering::Relaxed))
            .finish()
    }
}

impl UpdateScheduler {
    pub fn new(executor: Arc<dyn UiExecutor>, config: &RuntimeConfig) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                executor,
                queue: Mutex::new(VecDeque::new()),
                armed: AtomicBool::new(false),
                max_batch: config.max_pass_batch.max(1),
                counters: Counters::default(),
            }),
        }
    }

    /// Request a pass for `target`. Safe from any thread; never blocks on
    /// the UI thread.
    pub fn schedule_update(&self, target: &Arc<dyn PendingPass>) {
        let counters = &self.inner.counters;
        counters.requests.fetch_add(1, Ordering::Relaxed);
        if !target.dirty().claim_schedule() {
            counters.coalesced.fetch_add(1, Ordering::Relaxed);
            return;
        }
        lock(&self.inner.queue).push_back(Arc::downgrade(target));
        SchedulerInner::arm(&self.inner);
    }

    /// Representations waiting for a pass.
    pub fn queued(&self) -> usize {
        lock(&self.inner.queue).len()
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.inner.counters;
        SchedulerStats {
            requests: c.requests.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            callbacks: c.callbacks.load(Ordering::Relaxed),
            passes: c.passes.load(Ordering::Relaxed),
            stale: c.stale.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
        }
    }
}

impl SchedulerInner {
    fn arm(this: &Arc<Self>) {
        if this.armed.swap(true, Ordering::AcqRel) {
            return;
        }
        this.counters.callbacks.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(this);
        this.executor.execute(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                SchedulerInner::flush(&inner);
            }
        }));
    }

    fn flush(this: &Arc<Self>) {
        this.armed.store(false, Ordering::Release);
        let (batch, queued) = {
            let mut queue = lock(&this.queue);
            let n = queue.len().min(this.max_batch);
            let batch: Vec<Weak<dyn PendingPass>> = queue.drain(..n).collect();
            (batch, queue.len())
        };
        debug_trace::emit(TraceEvent::Flush {
            batch: batch.len(),
            queued,
        });
        for weak in batch {
            let Some(target) = weak.upgrade() else {
                this.counters.stale.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            match target.run_pass() {
                PassOutcome::Ran { failed, .. } => {
                    this.counters.passes.fetch_add(1, Ordering::Relaxed);
                    this.counters
                        .failures
                        .fetch_add(u64::from(failed), Ordering::Relaxed);
                }
                PassOutcome::Stale => {
                    tracing::trace!("stale pass absorbed");
                    this.counters.stale.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        if !lock(&this.queue).is_empty() {
            Self::arm(this);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dirty::DirtyFlags;
    use crate::toolkit::UiTask;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct ManualExecutor {
        tasks: Mutex<Vec<UiTask>>,
    }

    impl ManualExecutor {
        fn run_all(&self) -> usize {
            let mut ran = 0;
            loop {
                let tasks: Vec<UiTask> = std::mem::take(&mut *self.tasks.lock().unwrap());
                if tasks.is_empty() {
                    return ran;
                }
                for t in tasks {
                    t();
                    ran += 1;
                }
            }
        }
    }

    impl UiExecutor for ManualExecutor {
        fn execute(&self, task: UiTask) {
            self.tasks.lock().unwrap().push(task);
        }

        fn is_ui_thread(&self) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct CountingPass {
        dirty: DirtySet,
        passes: AtomicUsize,
        values: AtomicUsize,
    }

    impl PendingPass for CountingPass {
        fn dirty(&self) -> &DirtySet {
            &self.dirty
        }

        fn run_pass(&self) -> PassOutcome {
            if !self.dirty.begin_pass() {
                return PassOutcome::Stale;
            }
            self.passes.fetch_add(1, Ordering::SeqCst);
            if self.dirty.check_and_clear(DirtyFlags::VALUE) {
                self.values.fetch_add(1, Ordering::SeqCst);
            }
            PassOutcome::Ran { serviced: 1, failed: 0 }
        }
    }

    fn setup(batch: usize) -> (Arc<ManualExecutor>, UpdateScheduler) {
        let exec = Arc::new(ManualExecutor::default());
        let sched = UpdateScheduler::new(
            exec.clone() as Arc<dyn UiExecutor>,
            &RuntimeConfig::default().with_max_pass_batch(batch),
        );
        (exec, sched)
    }

    #[test]
    fn repeated_requests_collapse_into_one_pass() {
        let (exec, sched) = setup(16);
        let counted = Arc::new(CountingPass::default());
        let target: Arc<dyn PendingPass> = counted.clone();
        for _ in 0..100 {
            counted.dirty.mark(DirtyFlags::VALUE);
            sched.schedule_update(&target);
        }
        assert_eq!(sched.queued(), 1);
        assert_eq!(exec.run_all(), 1);
        assert_eq!(counted.passes.load(Ordering::SeqCst), 1);
        assert_eq!(counted.values.load(Ordering::SeqCst), 1);
        let stats = sched.stats();
        assert_eq!(stats.requests, 100);
        assert_eq!(stats.coalesced, 99);
        assert_eq!(stats.callbacks, 1);
    }

    #[test]
    fn many_targets_share_one_callback() {
        let (exec, sched) = setup(64);
        let targets: Vec<Arc<CountingPass>> =
            (0..10).map(|_| Arc::new(CountingPass::default())).collect();
        for p in &targets {
            let target: Arc<dyn PendingPass> = p.clone();
            sched.schedule_update(&target);
        }
        assert_eq!(exec.run_all(), 1);
        assert!(targets.iter().all(|p| p.passes.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn batch_limit_reposts_remainder() {
        let (exec, sched) = setup(3);
        let targets: Vec<Arc<CountingPass>> =
            (0..7).map(|_| Arc::new(CountingPass::default())).collect();
        for p in &targets {
            let target: Arc<dyn PendingPass> = p.clone();
            sched.schedule_update(&target);
        }
        assert_eq!(exec.run_all(), 3);
        assert_eq!(sched.stats().passes, 7);
    }

    #[test]
    fn disposed_and_dropped_targets_are_stale() {
        let (exec, sched) = setup(16);
        let disposed = Arc::new(CountingPass::default());
        let target: Arc<dyn PendingPass> = disposed.clone();
        sched.schedule_update(&target);
        disposed.dirty.dispose();

        let dropped: Arc<dyn PendingPass> = Arc::new(CountingPass::default());
        sched.schedule_update(&dropped);
        drop(dropped);

        exec.run_all();
        assert_eq!(disposed.passes.load(Ordering::SeqCst), 0);
        let stats = sched.stats();
        assert_eq!(stats.stale, 2);
        assert_eq!(stats.passes, 0);
    }

    #[test]
    fn request_after_flush_posts_again() {
        let (exec, sched) = setup(16);
        let counted = Arc::new(CountingPass::default());
        let target: Arc<dyn PendingPass> = counted.clone();
        sched.schedule_update(&target);
        exec.run_all();
        sched.schedule_update(&target);
        exec.run_all();
        assert_eq!(counted.passes.load(Ordering::SeqCst), 2);
        assert_eq!(sched.stats().callbacks, 2);
    }
}
