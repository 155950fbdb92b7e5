//! Shared task table
//!
//! Scheduling state for every task on the node: states, release times,
//! statistics and the halt reason. Dispatchers running at different
//! interrupt priorities share one table, so a task on one level can
//! suspend, resume or fault a task owned by another.
//!
//! The table sits inside a critical-section mutex. Every access is short
//! and no task body ever runs while it is locked, so a more urgent level
//! can always preempt a dispatcher that is mid-activation.

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::waitqueue::MultiWakerRegistration;
use heapless::Vec;

use super::kernel::{IdleInfo, KernelStats};
use super::task::{Fault, Halt, Priority, SpawnError, TaskHandle, TaskInfo, TaskState};

/// Dispatchers (and the idle loop) that may wait on a table at once
///
/// Registering more wakes everyone early; they simply check again.
pub const MAX_WATCHERS: usize = 4;

/// Bookkeeping for one task
#[derive(Debug, Clone, Copy)]
struct TaskEntry {
    name: &'static str,
    priority: Priority,
    period_ms: u32,
    state: TaskState,
    release_ms: u64,
    last_dispatch: u32,
    activations: u32,
    deadline_misses: u32,
}

impl TaskEntry {
    fn new(name: &'static str, priority: Priority, period_ms: u32, now_ms: u64) -> Self {
        Self {
            name,
            priority,
            period_ms,
            state: TaskState::Ready,
            release_ms: now_ms,
            last_dispatch: 0,
            activations: 0,
            deadline_misses: 0,
        }
    }

    fn info(&self) -> TaskInfo {
        TaskInfo {
            name: self.name,
            priority: self.priority,
            period_ms: self.period_ms,
            state: self.state,
            activations: self.activations,
            deadline_misses: self.deadline_misses,
        }
    }

    /// Freeze the task; returns whether the state changed
    fn suspend(&mut self) -> bool {
        let wake_ms = match self.state {
            TaskState::Ready | TaskState::Running => None,
            TaskState::Delayed { until_ms } => Some(until_ms),
            TaskState::Suspended { .. } | TaskState::Terminated => return false,
        };
        self.state = TaskState::Suspended { wake_ms };
        true
    }

    /// Unfreeze the task; returns whether the state changed
    fn resume(&mut self, now_ms: u64) -> bool {
        let TaskState::Suspended { wake_ms } = self.state else {
            return false;
        };
        self.state = match wake_ms {
            Some(until_ms) if until_ms > now_ms => TaskState::Delayed { until_ms },
            _ => {
                self.release_ms = now_ms;
                TaskState::Ready
            }
        };
        true
    }

    /// Ready now, or will be as soon as a dispatcher looks
    fn is_due(&self, now_ms: u64) -> bool {
        match self.state {
            TaskState::Ready | TaskState::Running => true,
            TaskState::Delayed { until_ms } => until_ms <= now_ms,
            TaskState::Suspended { .. } | TaskState::Terminated => false,
        }
    }
}

struct Inner<const N: usize> {
    tasks: Vec<TaskEntry, N>,
    stats: KernelStats,
    halted: Option<Halt>,
    now_ms: u64,
    generation: u32,
    watchers: MultiWakerRegistration<MAX_WATCHERS>,
}

impl<const N: usize> Inner<N> {
    /// Tell every watcher that scheduling state moved
    fn changed(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.watchers.wake();
    }

    fn reject(&mut self, name: &'static str) -> SpawnError {
        if self.halted.is_some() {
            return SpawnError::Halted;
        }
        let err = SpawnError::Capacity { name };
        self.halted = Some(Halt::Spawn(err));
        self.changed();
        err
    }

    fn suspend(&mut self, handle: TaskHandle) -> bool {
        let changed = self
            .tasks
            .get_mut(handle.index())
            .is_some_and(TaskEntry::suspend);
        if changed {
            self.stats.suspends += 1;
            self.changed();
        }
        changed
    }

    fn resume(&mut self, handle: TaskHandle, now_ms: u64) -> bool {
        let changed = self
            .tasks
            .get_mut(handle.index())
            .is_some_and(|entry| entry.resume(now_ms));
        if changed {
            self.stats.resumes += 1;
            self.changed();
        }
        changed
    }

    fn fault(&mut self, handle: TaskHandle, fault: Fault) -> Halt {
        if let Some(halt) = self.halted {
            return halt;
        }
        let name = match self.tasks.get_mut(handle.index()) {
            Some(entry) => {
                entry.state = TaskState::Terminated;
                entry.name
            }
            None => "?",
        };
        let halt = Halt::Fault { task: name, fault };
        self.halted = Some(halt);
        self.changed();
        halt
    }
}

/// What a dispatcher should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Run one activation of this task
    Run {
        handle: TaskHandle,
        period_ms: u32,
    },
    /// Nothing in the band is ready
    Idle { next_wake_ms: Option<u64> },
    /// The table has halted
    Halted(Halt),
}

/// Operations a running task performs through its [`Context`](super::Context)
pub(crate) trait Scheduling {
    fn delay(&self, handle: TaskHandle, until_ms: u64);
    fn suspend(&self, handle: TaskHandle) -> bool;
    fn resume(&self, handle: TaskHandle, now_ms: u64) -> bool;
    fn state(&self, handle: TaskHandle) -> Option<TaskState>;
}

/// Scheduling state for up to `N` tasks
pub struct TaskTable<const N: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Inner<N>>>,
}

impl<const N: usize> TaskTable<N> {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                tasks: Vec::new(),
                stats: KernelStats {
                    dispatches: 0,
                    idle_calls: 0,
                    suspends: 0,
                    resumes: 0,
                },
                halted: None,
                now_ms: 0,
                generation: 0,
                watchers: MultiWakerRegistration::new(),
            })),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner<N>) -> R) -> R {
        self.inner.lock(|inner| f(&mut inner.borrow_mut()))
    }

    /// Add a task; it starts ready
    ///
    /// Running out of slots is fatal: the table halts and no dispatcher
    /// schedules anything afterwards.
    pub fn register(
        &self,
        name: &'static str,
        priority: Priority,
        period_ms: u32,
    ) -> Result<TaskHandle, SpawnError> {
        self.with(|inner| {
            if inner.halted.is_some() {
                return Err(SpawnError::Halted);
            }
            let Ok(index) = u8::try_from(inner.tasks.len()) else {
                return Err(inner.reject(name));
            };
            let entry = TaskEntry::new(name, priority, period_ms, inner.now_ms);
            if inner.tasks.push(entry).is_err() {
                return Err(inner.reject(name));
            }
            inner.changed();
            Ok(TaskHandle::new(index))
        })
    }

    /// Refuse a task that has nowhere to run
    ///
    /// Halts the table exactly like a full task table does.
    pub fn reject(&self, name: &'static str) -> SpawnError {
        self.with(|inner| inner.reject(name))
    }

    /// Suspend a task; `false` if already suspended or unknown
    pub fn suspend(&self, handle: TaskHandle) -> bool {
        self.with(|inner| inner.suspend(handle))
    }

    /// Resume a suspended task; `false` if not suspended or unknown
    pub fn resume(&self, handle: TaskHandle) -> bool {
        self.with(|inner| {
            let now_ms = inner.now_ms;
            inner.resume(handle, now_ms)
        })
    }

    /// Terminate a task with a fault and halt
    ///
    /// Also the entry point for faults found outside the task body, such
    /// as a broken stack guard. The first halt reason sticks.
    pub fn fault(&self, handle: TaskHandle, fault: Fault) -> Halt {
        self.with(|inner| inner.fault(handle, fault))
    }

    /// Current state of a task
    pub fn state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.with(|inner| inner.tasks.get(handle.index()).map(|entry| entry.state))
    }

    /// Bookkeeping snapshot for a task
    pub fn info(&self, handle: TaskHandle) -> Option<TaskInfo> {
        self.with(|inner| inner.tasks.get(handle.index()).map(TaskEntry::info))
    }

    /// Number of tasks registered
    pub fn task_count(&self) -> usize {
        self.with(|inner| inner.tasks.len())
    }

    /// Table-wide counters
    pub fn stats(&self) -> KernelStats {
        self.with(|inner| inner.stats)
    }

    /// Why the table halted, if it has
    pub fn halted(&self) -> Option<Halt> {
        self.with(|inner| inner.halted)
    }

    /// Change counter, bumped on every state change a watcher cares about
    pub fn generation(&self) -> u32 {
        self.with(|inner| inner.generation)
    }

    /// Wait until the generation moves past `seen`
    ///
    /// Read [`generation`](Self::generation) before looking at the table,
    /// then wait on it, and no change in between is lost.
    pub async fn changed(&self, seen: u32) {
        poll_fn(|cx| {
            self.with(|inner| {
                if inner.generation != seen {
                    Poll::Ready(())
                } else {
                    inner.watchers.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await
    }

    /// Count an idle period if no task is due at `now_ms`
    ///
    /// For an idle loop running below every dispatcher. Returns `None`
    /// while anything is ready, running or past its delay, and once halted.
    pub fn idle(&self, now_ms: u64) -> Option<IdleInfo> {
        self.with(|inner| {
            if inner.halted.is_some() || inner.tasks.iter().any(|e| e.is_due(now_ms)) {
                return None;
            }
            inner.stats.idle_calls = inner.stats.idle_calls.wrapping_add(1);
            Some(IdleInfo {
                now_ms,
                task_count: inner.tasks.len(),
            })
        })
    }

    /// Count an idle step already known to have nothing ready
    pub(crate) fn note_idle(&self, now_ms: u64) -> IdleInfo {
        self.with(|inner| {
            inner.stats.idle_calls = inner.stats.idle_calls.wrapping_add(1);
            IdleInfo {
                now_ms,
                task_count: inner.tasks.len(),
            }
        })
    }

    /// Release expired delays and claim the next activation in `band`
    ///
    /// The claimed task is marked running; the caller must hand it back
    /// with [`finish`](Self::finish).
    pub(crate) fn begin(&self, now_ms: u64, band: impl Fn(Priority) -> bool) -> Dispatch {
        self.with(|inner| {
            if let Some(halt) = inner.halted {
                return Dispatch::Halted(halt);
            }
            inner.now_ms = now_ms;

            for entry in inner.tasks.iter_mut() {
                if let TaskState::Delayed { until_ms } = entry.state {
                    if until_ms <= now_ms {
                        entry.state = TaskState::Ready;
                        entry.release_ms = until_ms;
                    }
                }
            }

            // Highest priority first, then least recently dispatched
            let picked = inner
                .tasks
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.state == TaskState::Ready && band(entry.priority))
                .max_by(|(ia, a), (ib, b)| {
                    a.priority
                        .cmp(&b.priority)
                        .then(b.last_dispatch.cmp(&a.last_dispatch))
                        .then(ib.cmp(ia))
                })
                .map(|(index, _)| index);

            let Some(index) = picked else {
                let next_wake_ms = inner
                    .tasks
                    .iter()
                    .filter(|entry| band(entry.priority))
                    .filter_map(|entry| match entry.state {
                        TaskState::Delayed { until_ms } => Some(until_ms),
                        _ => None,
                    })
                    .min();
                return Dispatch::Idle { next_wake_ms };
            };

            inner.stats.dispatches = inner.stats.dispatches.wrapping_add(1);
            let dispatches = inner.stats.dispatches;
            let entry = &mut inner.tasks[index];
            if entry.period_ms > 0 && now_ms >= entry.release_ms + u64::from(entry.period_ms) {
                entry.deadline_misses += 1;
            }
            entry.state = TaskState::Running;
            entry.activations = entry.activations.wrapping_add(1);
            entry.last_dispatch = dispatches;

            // Index fits: register only admits indices that fit in a u8
            Dispatch::Run {
                handle: TaskHandle::new(index as u8),
                period_ms: entry.period_ms,
            }
        })
    }

    /// Hand back an activation claimed by [`begin`](Self::begin)
    ///
    /// A task still marked running goes back to ready; one that delayed
    /// or was suspended meanwhile keeps that state.
    pub(crate) fn finish(&self, handle: TaskHandle, fault: Option<Fault>) -> Option<Halt> {
        self.with(|inner| {
            if let Some(fault) = fault {
                return Some(inner.fault(handle, fault));
            }
            if let Some(entry) = inner.tasks.get_mut(handle.index()) {
                if entry.state == TaskState::Running {
                    entry.state = TaskState::Ready;
                }
            }
            inner.changed();
            None
        })
    }
}

impl<const N: usize> Default for TaskTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Scheduling for TaskTable<N> {
    fn delay(&self, handle: TaskHandle, until_ms: u64) {
        self.with(|inner| {
            if let Some(entry) = inner.tasks.get_mut(handle.index()) {
                if entry.state == TaskState::Running {
                    entry.state = TaskState::Delayed { until_ms };
                }
            }
        })
    }

    fn suspend(&self, handle: TaskHandle) -> bool {
        self.with(|inner| inner.suspend(handle))
    }

    fn resume(&self, handle: TaskHandle, now_ms: u64) -> bool {
        self.with(|inner| inner.resume(handle, now_ms))
    }

    fn state(&self, handle: TaskHandle) -> Option<TaskState> {
        TaskTable::state(self, handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::pin::pin;
    use embassy_futures::poll_once;

    #[test]
    fn test_full_table_halts() {
        let table: TaskTable<1> = TaskTable::new();
        table.register("a", Priority(1), 10).unwrap();

        let err = table.register("b", Priority(1), 10).unwrap_err();
        assert_eq!(err, SpawnError::Capacity { name: "b" });
        assert_eq!(table.halted(), Some(Halt::Spawn(err)));
        assert_eq!(table.register("c", Priority(1), 10), Err(SpawnError::Halted));
        assert_eq!(table.reject("d"), SpawnError::Halted);
    }

    #[test]
    fn test_begin_only_claims_within_band() {
        let table: TaskTable<2> = TaskTable::new();
        let low = table.register("low", Priority(1), 100).unwrap();
        let high = table.register("high", Priority(3), 100).unwrap();

        assert_eq!(
            table.begin(0, |p| p == Priority(1)),
            Dispatch::Run {
                handle: low,
                period_ms: 100
            }
        );
        // The low task is mid-activation; the high band still dispatches
        assert_eq!(
            table.begin(0, |p| p == Priority(3)),
            Dispatch::Run {
                handle: high,
                period_ms: 100
            }
        );
        assert_eq!(table.state(low), Some(TaskState::Running));
        assert_eq!(table.state(high), Some(TaskState::Running));
    }

    #[test]
    fn test_suspend_while_running_survives_finish() {
        let table: TaskTable<2> = TaskTable::new();
        let task = table.register("t", Priority(1), 100).unwrap();

        assert!(matches!(table.begin(0, |_| true), Dispatch::Run { .. }));
        assert!(table.suspend(task));
        assert_eq!(table.finish(task, None), None);

        assert_eq!(table.state(task), Some(TaskState::Suspended { wake_ms: None }));
        assert_eq!(table.begin(0, |_| true), Dispatch::Idle { next_wake_ms: None });
    }

    #[test]
    fn test_idle_waits_for_due_tasks() {
        let table: TaskTable<1> = TaskTable::new();
        let task = table.register("t", Priority(1), 100).unwrap();

        // Ready task: not idle
        assert_eq!(table.idle(0), None);

        assert!(matches!(table.begin(0, |_| true), Dispatch::Run { .. }));
        table.delay(task, 100);
        table.finish(task, None);

        assert_eq!(table.idle(50), Some(IdleInfo { now_ms: 50, task_count: 1 }));
        // Delay expired but not yet dispatched
        assert_eq!(table.idle(100), None);
        assert_eq!(table.stats().idle_calls, 1);
    }

    #[test]
    fn test_changed_wakes_on_resume() {
        let table: TaskTable<1> = TaskTable::new();
        let task = table.register("t", Priority(1), 100).unwrap();
        table.suspend(task);

        let seen = table.generation();
        let mut wait = pin!(table.changed(seen));
        assert!(poll_once(wait.as_mut()).is_pending());

        assert!(table.resume(task));
        assert!(poll_once(wait.as_mut()).is_ready());
    }

    #[test]
    fn test_first_fault_sticks() {
        let table: TaskTable<2> = TaskTable::new();
        let a = table.register("a", Priority(2), 10).unwrap();
        let b = table.register("b", Priority(1), 10).unwrap();

        let first = table.fault(a, Fault::StackOverflow);
        let second = table.fault(b, Fault::StackOverflow);

        assert_eq!(first, Halt::Fault { task: "a", fault: Fault::StackOverflow });
        assert_eq!(second, first);
        assert_eq!(table.state(a), Some(TaskState::Terminated));
        assert_eq!(table.begin(0, |_| true), Dispatch::Halted(first));
    }
}
