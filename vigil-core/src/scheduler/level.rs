//! Priority levels
//!
//! A [`Level`] dispatches only the tasks of one priority from a shared
//! [`TaskTable`]. Run each level from its own interrupt priority (one
//! interrupt executor per level) and a level whose task becomes ready
//! preempts every less urgent level in the middle of its activation.
//! Tasks of equal priority share their level and take turns.
//!
//! [`Levels`] sorts tasks into levels as they are created.

use heapless::Vec;

use super::kernel::{Bodies, Step, TaskSpawner};
use super::table::TaskTable;
use super::task::{Priority, SpawnError, Task, TaskHandle};

/// Dispatcher for the tasks of one priority
pub struct Level<'a, B: ?Sized, const N: usize> {
    table: &'a TaskTable<N>,
    priority: Priority,
    bodies: Bodies<'a, B, N>,
    tasks: usize,
}

impl<'a, B: Task + ?Sized, const N: usize> Level<'a, B, N> {
    /// Create an empty level on `table`
    pub fn new(table: &'a TaskTable<N>, priority: Priority) -> Self {
        Self {
            table,
            priority,
            bodies: Bodies::new(),
            tasks: 0,
        }
    }

    /// Register a task at this level's priority
    pub fn create_task(
        &mut self,
        body: &'a mut B,
        name: &'static str,
        period_ms: u32,
    ) -> Result<TaskHandle, SpawnError> {
        let handle = self.table.register(name, self.priority, period_ms)?;
        self.bodies.insert(handle, body);
        self.tasks += 1;
        Ok(handle)
    }

    /// Priority this level dispatches
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Number of tasks on this level
    pub fn task_count(&self) -> usize {
        self.tasks
    }

    /// The shared table
    pub fn table(&self) -> &'a TaskTable<N> {
        self.table
    }

    /// Dispatch at most one activation of this level at `now_ms`
    ///
    /// `Idle` carries the earliest delay deadline among this level's tasks.
    pub fn step(&mut self, now_ms: u64) -> Step {
        let priority = self.priority;
        self.bodies.step(self.table, now_ms, |p| p == priority)
    }
}

/// Level for bodies that move to another executor
pub type SendLevel<'a, const N: usize> = Level<'a, dyn Task + Send + 'a, N>;

/// Up to `L` levels over a table of `N` tasks
pub struct Levels<'a, const N: usize, const L: usize> {
    table: &'a TaskTable<N>,
    levels: Vec<SendLevel<'a, N>, L>,
}

impl<'a, const N: usize, const L: usize> Levels<'a, N, L> {
    /// No levels yet
    pub fn new(table: &'a TaskTable<N>) -> Self {
        Self {
            table,
            levels: Vec::new(),
        }
    }

    /// Create a task on the level for `priority`, opening it if needed
    ///
    /// A priority that needs a level beyond the `L` available is refused
    /// and halts the table.
    pub fn create_task<T: Task + Send + 'a>(
        &mut self,
        body: &'a mut T,
        name: &'static str,
        priority: Priority,
        period_ms: u32,
    ) -> Result<TaskHandle, SpawnError> {
        let index = match self.levels.iter().position(|l| l.priority == priority) {
            Some(index) => index,
            None => {
                if self.levels.push(Level::new(self.table, priority)).is_err() {
                    return Err(self.table.reject(name));
                }
                self.levels.len() - 1
            }
        };
        self.levels[index].create_task(body, name, period_ms)
    }

    /// Number of levels opened
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Whether no level has been opened
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The levels, most urgent first
    pub fn into_levels(mut self) -> Vec<SendLevel<'a, N>, L> {
        self.levels.sort_unstable_by(|a, b| b.priority.cmp(&a.priority));
        self.levels
    }
}

impl<'a, const N: usize, const L: usize> TaskSpawner<'a> for Levels<'a, N, L> {
    fn spawn_task<T: Task + Send + 'a>(
        &mut self,
        body: &'a mut T,
        name: &'static str,
        priority: Priority,
        period_ms: u32,
    ) -> Result<TaskHandle, SpawnError> {
        self.create_task(body, name, priority, period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{Context, Fault, Halt, TaskState};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    /// Task that never delays
    struct Busy<'r> {
        runs: &'r AtomicU32,
    }

    impl Task for Busy<'_> {
        fn run(&mut self, _cx: &mut Context<'_>) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// One long activation, then sleeps for a minute
    struct Slow<'s> {
        busy: Duration,
        started: &'s AtomicBool,
        finished: &'s AtomicBool,
    }

    impl Task for Slow<'_> {
        fn run(&mut self, cx: &mut Context<'_>) {
            self.started.store(true, Ordering::SeqCst);
            thread::sleep(self.busy);
            self.finished.store(true, Ordering::SeqCst);
            cx.delay(60_000);
        }
    }

    /// What the urgent task saw on its second activation
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Seen {
        at_ms: u64,
        slow_state: Option<TaskState>,
        slow_finished: bool,
    }

    /// Runs every 10 ms and looks at the slow task
    struct Urgent<'s> {
        slow: TaskHandle,
        slow_finished: &'s AtomicBool,
        runs: u32,
        seen: Option<Seen>,
    }

    impl Task for Urgent<'_> {
        fn run(&mut self, cx: &mut Context<'_>) {
            self.runs += 1;
            if self.runs == 2 {
                self.seen = Some(Seen {
                    at_ms: cx.now_ms(),
                    slow_state: cx.state(self.slow),
                    slow_finished: self.slow_finished.load(Ordering::SeqCst),
                });
            }
            cx.delay(10);
        }
    }

    #[test]
    fn test_level_dispatches_only_its_priority() {
        let table: TaskTable<2> = TaskTable::new();
        let low_runs = AtomicU32::new(0);
        let high_runs = AtomicU32::new(0);
        let mut low_body = Busy { runs: &low_runs };
        let mut high_body = Busy { runs: &high_runs };

        let mut low: SendLevel<'_, 2> = Level::new(&table, Priority(1));
        let mut high: SendLevel<'_, 2> = Level::new(&table, Priority(3));
        let low_handle = low.create_task(&mut low_body, "low", 10).unwrap();
        let high_handle = high.create_task(&mut high_body, "high", 10).unwrap();

        // The more urgent task is ready, but it is not this level's
        assert_eq!(low.step(0), Step::Ran(low_handle));
        assert_eq!(high.step(0), Step::Ran(high_handle));
        assert_eq!(low.step(0), Step::Ran(low_handle));

        assert_eq!(low_runs.load(Ordering::SeqCst), 2);
        assert_eq!(high_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_suspend_reaches_across_levels() {
        struct Suspender {
            target: TaskHandle,
        }

        impl Task for Suspender {
            fn run(&mut self, cx: &mut Context<'_>) {
                assert!(cx.suspend(self.target));
                cx.delay(100);
            }
        }

        let table: TaskTable<2> = TaskTable::new();
        let runs = AtomicU32::new(0);
        let mut worker = Busy { runs: &runs };

        let mut low: SendLevel<'_, 2> = Level::new(&table, Priority(1));
        let worker_handle = low.create_task(&mut worker, "worker", 10).unwrap();

        let mut suspender = Suspender { target: worker_handle };
        let mut high: SendLevel<'_, 2> = Level::new(&table, Priority(2));
        high.create_task(&mut suspender, "suspender", 100).unwrap();

        high.step(0);
        assert_eq!(low.step(0), Step::Idle { next_wake_ms: None });
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        assert!(table.resume(worker_handle));
        assert_eq!(low.step(1), Step::Ran(worker_handle));
    }

    #[test]
    fn test_urgent_level_preempts_long_activation() {
        let table: TaskTable<2> = TaskTable::new();
        let started = AtomicBool::new(false);
        let finished = AtomicBool::new(false);

        let mut slow = Slow {
            busy: Duration::from_millis(80),
            started: &started,
            finished: &finished,
        };
        let mut background: SendLevel<'_, 2> = Level::new(&table, Priority(1));
        let slow_handle = background.create_task(&mut slow, "slow", 1000).unwrap();

        let mut urgent = Urgent {
            slow: slow_handle,
            slow_finished: &finished,
            runs: 0,
            seen: None,
        };

        {
            let mut foreground: SendLevel<'_, 2> = Level::new(&table, Priority(3));
            let urgent_handle = foreground.create_task(&mut urgent, "urgent", 10).unwrap();

            let epoch = Instant::now();
            let now = move || epoch.elapsed().as_millis() as u64;
            let table = &table;
            let started = &started;

            thread::scope(|s| {
                s.spawn(move || {
                    assert_eq!(background.step(now()), Step::Ran(slow_handle));
                });

                s.spawn(move || {
                    while !started.load(Ordering::SeqCst) {
                        thread::yield_now();
                    }
                    while table.info(urgent_handle).map_or(0, |i| i.activations) < 2 {
                        match foreground.step(now()) {
                            Step::Ran(_) => {}
                            Step::Idle {
                                next_wake_ms: Some(wake_ms),
                            } => thread::sleep(Duration::from_millis(
                                wake_ms.saturating_sub(now()),
                            )),
                            other => panic!("unexpected step: {:?}", other),
                        }
                    }
                });
            });
        }

        // The urgent task ran 10 ms after its first activation, while the
        // 80 ms activation below it was still in progress
        let seen = urgent.seen.unwrap();
        assert_eq!(seen.slow_state, Some(TaskState::Running));
        assert!(!seen.slow_finished);
        assert!(seen.at_ms < 60, "urgent task ran at {} ms", seen.at_ms);

        assert!(finished.load(Ordering::SeqCst));
        assert!(matches!(
            table.state(slow_handle),
            Some(TaskState::Delayed { .. })
        ));
    }

    #[test]
    fn test_fault_after_activation_stops_every_level() {
        let table: TaskTable<2> = TaskTable::new();
        let low_runs = AtomicU32::new(0);
        let high_runs = AtomicU32::new(0);
        let mut low_body = Busy { runs: &low_runs };
        let mut high_body = Busy { runs: &high_runs };

        let mut low: SendLevel<'_, 2> = Level::new(&table, Priority(1));
        let mut high: SendLevel<'_, 2> = Level::new(&table, Priority(2));
        low.create_task(&mut low_body, "low", 10).unwrap();
        let high_handle = high.create_task(&mut high_body, "high", 10).unwrap();

        // Charged to the task whose activation just ended
        assert_eq!(high.step(0), Step::Ran(high_handle));
        let reason = table.fault(high_handle, Fault::StackOverflow);
        assert_eq!(
            reason,
            Halt::Fault {
                task: "high",
                fault: Fault::StackOverflow
            }
        );

        assert_eq!(table.state(high_handle), Some(TaskState::Terminated));
        assert_eq!(low.step(1), Step::Halted(reason));
        assert_eq!(high.step(1), Step::Halted(reason));
        assert_eq!(low_runs.load(Ordering::SeqCst), 0);
        assert_eq!(high_runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_levels_group_tasks_most_urgent_first() {
        let table: TaskTable<4> = TaskTable::new();
        let runs = AtomicU32::new(0);
        let mut a = Busy { runs: &runs };
        let mut b = Busy { runs: &runs };
        let mut c = Busy { runs: &runs };

        let mut levels: Levels<'_, 4, 2> = Levels::new(&table);
        levels.create_task(&mut a, "a", Priority(1), 10).unwrap();
        levels.create_task(&mut b, "b", Priority(3), 10).unwrap();
        levels.create_task(&mut c, "c", Priority(1), 10).unwrap();
        assert_eq!(levels.len(), 2);

        let levels = levels.into_levels();
        let shape: std::vec::Vec<(u8, usize)> = levels
            .iter()
            .map(|l| (l.priority().0, l.task_count()))
            .collect();
        assert_eq!(shape, [(3, 1), (1, 2)]);
    }

    #[test]
    fn test_levels_refuse_priority_beyond_capacity() {
        let table: TaskTable<4> = TaskTable::new();
        let runs = AtomicU32::new(0);
        let mut a = Busy { runs: &runs };
        let mut b = Busy { runs: &runs };

        let mut levels: Levels<'_, 4, 1> = Levels::new(&table);
        levels.create_task(&mut a, "a", Priority(1), 10).unwrap();

        let err = levels.create_task(&mut b, "b", Priority(2), 10).unwrap_err();
        assert_eq!(err, SpawnError::Capacity { name: "b" });
        assert_eq!(table.halted(), Some(Halt::Spawn(err)));

        let mut levels = levels.into_levels();
        assert!(matches!(levels[0].step(0), Step::Halted(_)));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
