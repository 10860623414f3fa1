//! Shared tick scheduler
//!
//! One timer thread drives every periodic task in the process instead of one
//! dedicated thread per object instance. Each task gets a cancellable
//! [`TickHandle`]; cancellation is synchronous — once `cancel()` returns, no
//! further tick can start and any in-flight tick has completed. A panicking
//! tick is caught and logged; the timer thread keeps serving the remaining
//! tasks.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

type TickFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Counter for task ids, process-wide.
static TASK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Default)]
struct TaskFlags {
    cancelled: bool,
    running: bool,
}

/// Shared between the timer thread and the task's handle.
struct TaskState {
    flags: Mutex<TaskFlags>,
    cond: Condvar,
}

impl TaskState {
    fn is_cancelled(&self) -> bool {
        self.flags.lock().map(|f| f.cancelled).unwrap_or(true)
    }
}

struct Task {
    name: String,
    interval: Duration,
    next_due: Instant,
    tick: TickFn,
    state: Arc<TaskState>,
}

struct SchedulerState {
    tasks: Vec<Task>,
    shutdown: bool,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    cond: Condvar,
}

/// Cancellable handle to one scheduled periodic task
///
/// `cancel` must not be called from inside the task's own tick.
pub struct TickHandle {
    task_id: u64,
    state: Arc<TaskState>,
    scheduler: Weak<SchedulerInner>,
}

impl TickHandle {
    /// Cancel the task. Blocks until any in-flight tick has completed; after
    /// this returns no further tick can start. Idempotent.
    pub fn cancel(&self) {
        {
            let mut flags = self.state.flags.lock().unwrap();
            flags.cancelled = true;
            while flags.running {
                flags = self.state.cond.wait(flags).unwrap();
            }
        }
        // Wake the timer thread so it drops the entry promptly.
        if let Some(inner) = self.scheduler.upgrade() {
            inner.cond.notify_all();
        }
    }

    /// Whether the task has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Task id, for diagnostics.
    pub fn id(&self) -> u64 {
        self.task_id
    }
}

/// Shared timer owning one background thread and all periodic tasks
pub struct TickScheduler {
    inner: Arc<SchedulerInner>,
    thread: Option<JoinHandle<()>>,
}

impl TickScheduler {
    pub fn new() -> Self {
        let inner = Arc::new(SchedulerInner {
            state: Mutex::new(SchedulerState {
                tasks: Vec::new(),
                shutdown: false,
            }),
            cond: Condvar::new(),
        });
        let worker = inner.clone();
        let thread = std::thread::Builder::new()
            .name("tick-scheduler".into())
            .spawn(move || Self::run(worker))
            .expect("failed to spawn tick-scheduler thread");
        Self {
            inner,
            thread: Some(thread),
        }
    }

    /// Register a periodic task. The first tick fires one interval from now.
    pub fn schedule(
        &self,
        name: impl Into<String>,
        interval: Duration,
        tick: impl Fn() + Send + Sync + 'static,
    ) -> TickHandle {
        let name = name.into();
        let id = TASK_ID_COUNTER.fetch_add(1, Ordering::SeqCst);
        let task_state = Arc::new(TaskState {
            flags: Mutex::new(TaskFlags::default()),
            cond: Condvar::new(),
        });
        let task = Task {
            name: name.clone(),
            interval,
            next_due: Instant::now() + interval,
            tick: Arc::new(tick),
            state: task_state.clone(),
        };
        {
            let mut state = self.inner.state.lock().unwrap();
            state.tasks.push(task);
        }
        self.inner.cond.notify_all();
        log::debug!("scheduled task '{}' every {:?}", name, interval);
        TickHandle {
            task_id: id,
            state: task_state,
            scheduler: Arc::downgrade(&self.inner),
        }
    }

    /// Number of live (non-cancelled) tasks.
    pub fn task_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .map(|s| s.tasks.iter().filter(|t| !t.state.is_cancelled()).count())
            .unwrap_or(0)
    }

    fn run(inner: Arc<SchedulerInner>) {
        loop {
            let due = {
                let mut state = inner.state.lock().unwrap();
                loop {
                    if state.shutdown {
                        return;
                    }
                    state.tasks.retain(|t| !t.state.is_cancelled());
                    let now = Instant::now();
                    let soonest = state
                        .tasks
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, t)| t.next_due)
                        .map(|(i, t)| (i, t.next_due));
                    match soonest {
                        None => {
                            state = inner.cond.wait(state).unwrap();
                        }
                        Some((_, next_due)) if next_due > now => {
                            let timeout = next_due - now;
                            let (guard, _) = inner.cond.wait_timeout(state, timeout).unwrap();
                            state = guard;
                        }
                        Some((index, _)) => {
                            let task = &mut state.tasks[index];
                            task.next_due = now + task.interval;
                            break (task.name.clone(), task.tick.clone(), task.state.clone());
                        }
                    }
                }
            };
            let (name, tick, task_state) = due;
            Self::run_gated(&name, &tick, &task_state);
        }
    }

    /// Run one tick behind the task's run gate so that `cancel` can
    /// synchronize with it.
    fn run_gated(name: &str, tick: &TickFn, state: &Arc<TaskState>) {
        {
            let mut flags = state.flags.lock().unwrap();
            if flags.cancelled {
                return;
            }
            flags.running = true;
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| tick()));
        if outcome.is_err() {
            log::error!("scheduled task '{}' panicked; timer thread continues", name);
        }
        let mut flags = state.flags.lock().unwrap();
        flags.running = false;
        state.cond.notify_all();
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        if let Ok(mut state) = self.inner.state.lock() {
            state.shutdown = true;
        }
        self.inner.cond.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
