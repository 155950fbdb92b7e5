//! Priority kernel
//!
//! Dispatches one activation at a time: expired delays are woken, the
//! highest-priority ready task runs, and when nothing is ready the idle
//! hook runs and the caller is told when the next delay expires.
//!
//! Scheduling state lives in a [`TaskTable`]. A `Kernel` owns its table
//! and dispatches every priority from one thread of execution; for true
//! preemption each priority gets its own [`Level`](super::Level) on a
//! shared table instead, driven from its own interrupt priority.
//!
//! Task bodies reach the table only through the [`Context`] handed to
//! each activation, which is also how one task suspends or resumes
//! another.

use super::table::{Dispatch, Scheduling, TaskTable};
use super::task::{Fault, Halt, Priority, SpawnError, Task, TaskHandle, TaskInfo, TaskState};

/// Result of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step {
    /// A task ran one activation
    Ran(TaskHandle),
    /// Nothing was ready (a [`Kernel`] has run its idle hook)
    Idle {
        /// Earliest pending delay deadline (`None` if no task is delayed)
        next_wake_ms: Option<u64>,
    },
    /// The kernel has halted and schedules nothing further
    Halted(Halt),
}

/// Kernel-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KernelStats {
    /// Activations dispatched
    pub dispatches: u32,
    /// Idle hook invocations
    pub idle_calls: u32,
    /// Suspend requests that changed a task's state
    pub suspends: u32,
    /// Resume requests that changed a task's state
    pub resumes: u32,
}

/// What the idle hook is told
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdleInfo {
    /// Current time in milliseconds
    pub now_ms: u64,
    /// Number of tasks created on the kernel
    pub task_count: usize,
}

/// Background work run whenever no task is ready
///
/// Must not block.
pub trait IdleHook {
    /// Called once per idle step
    fn on_idle(&mut self, info: &IdleInfo);
}

/// Time source for [`Kernel::run`]
pub trait Clock {
    /// Current time in milliseconds
    fn now_ms(&mut self) -> u64;

    /// Sleep until `deadline_ms`, or until woken if `None`
    fn sleep_until(&mut self, deadline_ms: Option<u64>);
}

/// Per-activation view of the scheduler
pub struct Context<'k> {
    table: &'k dyn Scheduling,
    current: TaskHandle,
    period_ms: u32,
    now_ms: u64,
    fault: Option<Fault>,
}

impl Context<'_> {
    /// Time at which this activation was dispatched
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Handle of the running task
    pub fn current(&self) -> TaskHandle {
        self.current
    }

    /// Period of the running task
    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Yield until at least `ms` milliseconds from now
    pub fn delay(&mut self, ms: u32) {
        self.table.delay(self.current, self.now_ms + u64::from(ms));
    }

    /// Yield for one period of the running task
    pub fn delay_period(&mut self) {
        self.delay(self.period_ms);
    }

    /// Suspend another task (or this one)
    ///
    /// Returns `false` if the task was already suspended or is unknown.
    /// A task suspended mid-activation finishes that activation first.
    pub fn suspend(&mut self, handle: TaskHandle) -> bool {
        self.table.suspend(handle)
    }

    /// Resume a suspended task
    ///
    /// Returns `false` if the task was not suspended or is unknown.
    pub fn resume(&mut self, handle: TaskHandle) -> bool {
        self.table.resume(handle, self.now_ms)
    }

    /// Current state of a task
    pub fn state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.table.state(handle)
    }

    /// Report an unrecoverable fault in the running task
    ///
    /// The task is terminated when the activation returns and every
    /// dispatcher on the table halts.
    pub fn fault(&mut self, fault: Fault) {
        if self.fault.is_none() {
            self.fault = Some(fault);
        }
    }
}

/// Task bodies owned by one dispatcher, indexed by handle
pub(crate) struct Bodies<'a, B: ?Sized, const N: usize> {
    slots: [Option<&'a mut B>; N],
}

impl<'a, B: Task + ?Sized, const N: usize> Bodies<'a, B, N> {
    pub(crate) fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
        }
    }

    pub(crate) fn insert(&mut self, handle: TaskHandle, body: &'a mut B) {
        if let Some(slot) = self.slots.get_mut(handle.index()) {
            *slot = Some(body);
        }
    }

    /// Claim and run at most one activation among tasks in `band`
    ///
    /// The table is unlocked while the body runs.
    pub(crate) fn step(
        &mut self,
        table: &TaskTable<N>,
        now_ms: u64,
        band: impl Fn(Priority) -> bool,
    ) -> Step {
        let (handle, period_ms) = match table.begin(now_ms, band) {
            Dispatch::Run { handle, period_ms } => (handle, period_ms),
            Dispatch::Idle { next_wake_ms } => return Step::Idle { next_wake_ms },
            Dispatch::Halted(halt) => return Step::Halted(halt),
        };

        let fault = match self.slots.get_mut(handle.index()).and_then(Option::as_mut) {
            Some(body) => {
                let mut cx = Context {
                    table,
                    current: handle,
                    period_ms,
                    now_ms,
                    fault: None,
                };
                body.run(&mut cx);
                cx.fault
            }
            None => None,
        };

        match table.finish(handle, fault) {
            Some(halt) => Step::Halted(halt),
            None => Step::Ran(handle),
        }
    }
}

/// Something node tasks can be created on
pub trait TaskSpawner<'a> {
    /// Create a task with the given priority and period
    fn spawn_task<T: Task + Send + 'a>(
        &mut self,
        body: &'a mut T,
        name: &'static str,
        priority: Priority,
        period_ms: u32,
    ) -> Result<TaskHandle, SpawnError>;
}

/// Single-dispatcher priority kernel for up to `N` tasks
pub struct Kernel<'a, const N: usize> {
    table: TaskTable<N>,
    bodies: Bodies<'a, dyn Task + 'a, N>,
    idle: Option<&'a mut dyn IdleHook>,
}

impl<'a, const N: usize> Kernel<'a, N> {
    /// Create an empty kernel
    pub fn new() -> Self {
        Self {
            table: TaskTable::new(),
            bodies: Bodies::new(),
            idle: None,
        }
    }

    /// Register a task
    ///
    /// The task starts ready. Running out of task slots is fatal: the
    /// kernel halts and every later [`step`](Self::step) reports it.
    pub fn create_task(
        &mut self,
        body: &'a mut dyn Task,
        name: &'static str,
        priority: Priority,
        period_ms: u32,
    ) -> Result<TaskHandle, SpawnError> {
        let handle = self.table.register(name, priority, period_ms)?;
        self.bodies.insert(handle, body);
        Ok(handle)
    }

    /// Install the idle hook
    pub fn set_idle_hook(&mut self, hook: &'a mut dyn IdleHook) {
        self.idle = Some(hook);
    }

    /// The scheduling state behind this kernel
    pub fn table(&self) -> &TaskTable<N> {
        &self.table
    }

    /// Suspend a task from outside any task body
    pub fn suspend(&mut self, handle: TaskHandle) -> bool {
        self.table.suspend(handle)
    }

    /// Resume a task from outside any task body
    pub fn resume(&mut self, handle: TaskHandle) -> bool {
        self.table.resume(handle)
    }

    /// Terminate a task with a fault and halt the kernel
    ///
    /// Used for faults detected outside the task body, such as a stack
    /// overflow reported by the platform.
    pub fn fault(&mut self, handle: TaskHandle, fault: Fault) -> Halt {
        self.table.fault(handle, fault)
    }

    /// Current state of a task
    pub fn state(&self, handle: TaskHandle) -> Option<TaskState> {
        self.table.state(handle)
    }

    /// Bookkeeping snapshot for a task
    pub fn info(&self, handle: TaskHandle) -> Option<TaskInfo> {
        self.table.info(handle)
    }

    /// Number of tasks created
    pub fn task_count(&self) -> usize {
        self.table.task_count()
    }

    /// Kernel-wide counters
    pub fn stats(&self) -> KernelStats {
        self.table.stats()
    }

    /// Why the kernel halted, if it has
    pub fn halted(&self) -> Option<Halt> {
        self.table.halted()
    }

    /// Dispatch at most one activation at time `now_ms`
    pub fn step(&mut self, now_ms: u64) -> Step {
        let step = self.bodies.step(&self.table, now_ms, |_| true);
        if let Step::Idle { .. } = step {
            let info = self.table.note_idle(now_ms);
            if let Some(hook) = self.idle.as_mut() {
                hook.on_idle(&info);
            }
        }
        step
    }

    /// Dispatch until the kernel halts
    ///
    /// Never returns while the system is healthy; the returned [`Halt`]
    /// is always fatal.
    pub fn run<C: Clock>(&mut self, clock: &mut C) -> Halt {
        loop {
            match self.step(clock.now_ms()) {
                Step::Ran(_) => {}
                Step::Idle { next_wake_ms } => clock.sleep_until(next_wake_ms),
                Step::Halted(halt) => return halt,
            }
        }
    }
}

impl<'a, const N: usize> TaskSpawner<'a> for Kernel<'a, N> {
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

impl<const N: usize> Default for Kernel<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::vec::Vec as StdVec;

    /// Task that logs its name and delays one period
    struct Periodic<'l> {
        name: &'static str,
        log: &'l RefCell<StdVec<&'static str>>,
    }

    impl Task for Periodic<'_> {
        fn run(&mut self, cx: &mut Context<'_>) {
            self.log.borrow_mut().push(self.name);
            cx.delay_period();
        }
    }

    /// Task that never delays
    struct Busy {
        runs: u32,
    }

    impl Task for Busy {
        fn run(&mut self, _cx: &mut Context<'_>) {
            self.runs += 1;
        }
    }

    struct CountingIdle {
        calls: u32,
        last: Option<IdleInfo>,
    }

    impl IdleHook for CountingIdle {
        fn on_idle(&mut self, info: &IdleInfo) {
            self.calls += 1;
            self.last = Some(*info);
        }
    }

    /// Clock that jumps straight to the requested deadline
    struct JumpClock {
        now: u64,
    }

    impl Clock for JumpClock {
        fn now_ms(&mut self) -> u64 {
            self.now
        }

        fn sleep_until(&mut self, deadline_ms: Option<u64>) {
            self.now = deadline_ms.unwrap_or(self.now + 1);
        }
    }

    #[test]
    fn test_highest_priority_runs_first() {
        let log = RefCell::new(StdVec::new());
        let mut low = Periodic { name: "low", log: &log };
        let mut high = Periodic { name: "high", log: &log };
        let mut mid = Periodic { name: "mid", log: &log };

        let mut kernel: Kernel<'_, 4> = Kernel::new();
        kernel.create_task(&mut low, "low", Priority(1), 1000).unwrap();
        kernel.create_task(&mut high, "high", Priority(3), 1000).unwrap();
        kernel.create_task(&mut mid, "mid", Priority(2), 1000).unwrap();

        for _ in 0..3 {
            assert!(matches!(kernel.step(0), Step::Ran(_)));
        }
        assert_eq!(*log.borrow(), ["high", "mid", "low"]);

        // Everyone is delayed now
        assert_eq!(kernel.step(0), Step::Idle { next_wake_ms: Some(1000) });
    }

    #[test]
    fn test_delay_is_never_early() {
        let log = RefCell::new(StdVec::new());
        let mut task = Periodic { name: "t", log: &log };

        let mut kernel: Kernel<'_, 1> = Kernel::new();
        let handle = kernel.create_task(&mut task, "t", Priority(1), 500).unwrap();

        kernel.step(0);
        assert_eq!(kernel.state(handle), Some(TaskState::Delayed { until_ms: 500 }));

        assert!(matches!(kernel.step(499), Step::Idle { .. }));
        assert_eq!(kernel.step(500), Step::Ran(handle));
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_equal_priority_shares_time() {
        let mut a = Busy { runs: 0 };
        let mut b = Busy { runs: 0 };

        {
            let mut kernel: Kernel<'_, 2> = Kernel::new();
            kernel.create_task(&mut a, "a", Priority(1), 10).unwrap();
            kernel.create_task(&mut b, "b", Priority(1), 10).unwrap();
            for _ in 0..10 {
                kernel.step(0);
            }
        }

        assert_eq!(a.runs, 5);
        assert_eq!(b.runs, 5);
    }

    #[test]
    fn test_suspend_is_idempotent() {
        let mut task = Busy { runs: 0 };
        let mut kernel: Kernel<'_, 1> = Kernel::new();
        let handle = kernel.create_task(&mut task, "t", Priority(1), 10).unwrap();

        assert!(kernel.suspend(handle));
        let frozen = kernel.state(handle);
        assert!(!kernel.suspend(handle));
        assert_eq!(kernel.state(handle), frozen);
        assert_eq!(kernel.stats().suspends, 1);
    }

    #[test]
    fn test_resume_on_running_task_is_noop() {
        let mut task = Busy { runs: 0 };
        let mut kernel: Kernel<'_, 1> = Kernel::new();
        let handle = kernel.create_task(&mut task, "t", Priority(1), 10).unwrap();

        assert!(!kernel.resume(handle));
        assert_eq!(kernel.state(handle), Some(TaskState::Ready));
        assert_eq!(kernel.stats().resumes, 0);
    }

    #[test]
    fn test_suspended_task_is_not_dispatched() {
        let mut task = Busy { runs: 0 };
        {
            let mut kernel: Kernel<'_, 1> = Kernel::new();
            let handle = kernel.create_task(&mut task, "t", Priority(1), 10).unwrap();

            kernel.suspend(handle);
            assert_eq!(kernel.step(0), Step::Idle { next_wake_ms: None });
            assert_eq!(kernel.step(1000), Step::Idle { next_wake_ms: None });

            kernel.resume(handle);
            assert_eq!(kernel.step(1000), Step::Ran(handle));
        }
        assert_eq!(task.runs, 1);
    }

    #[test]
    fn test_suspend_mid_delay_keeps_deadline() {
        let log = RefCell::new(StdVec::new());
        let mut task = Periodic { name: "t", log: &log };

        let mut kernel: Kernel<'_, 1> = Kernel::new();
        let handle = kernel.create_task(&mut task, "t", Priority(1), 1000).unwrap();
        kernel.step(0);

        assert!(kernel.suspend(handle));
        assert_eq!(
            kernel.state(handle),
            Some(TaskState::Suspended { wake_ms: Some(1000) })
        );

        // Deadline passes while suspended: nothing runs
        assert!(matches!(kernel.step(1500), Step::Idle { .. }));

        // Resumed after the deadline: ready immediately
        kernel.resume(handle);
        assert_eq!(kernel.state(handle), Some(TaskState::Ready));
        assert_eq!(kernel.step(1500), Step::Ran(handle));
    }

    #[test]
    fn test_resume_before_deadline_waits_out_delay() {
        let log = RefCell::new(StdVec::new());
        let mut task = Periodic { name: "t", log: &log };

        let mut kernel: Kernel<'_, 1> = Kernel::new();
        let handle = kernel.create_task(&mut task, "t", Priority(1), 1000).unwrap();
        kernel.step(0);
        kernel.step(200);

        kernel.suspend(handle);
        kernel.step(300);
        kernel.resume(handle);

        assert_eq!(kernel.state(handle), Some(TaskState::Delayed { until_ms: 1000 }));
        assert!(matches!(kernel.step(999), Step::Idle { .. }));
        assert_eq!(kernel.step(1000), Step::Ran(handle));
    }

    #[test]
    fn test_task_can_suspend_and_resume_another() {
        struct Controller {
            target: Option<TaskHandle>,
            runs: u32,
        }

        impl Task for Controller {
            fn run(&mut self, cx: &mut Context<'_>) {
                self.runs += 1;
                if let Some(target) = self.target {
                    match self.runs {
                        1 => assert!(cx.suspend(target)),
                        3 => assert!(cx.resume(target)),
                        _ => {}
                    }
                }
                cx.delay_period();
            }
        }

        let log = RefCell::new(StdVec::new());
        let mut worker = Periodic { name: "worker", log: &log };
        let mut controller = Controller { target: None, runs: 0 };

        let mut kernel: Kernel<'_, 2> = Kernel::new();
        let worker_handle = kernel
            .create_task(&mut worker, "worker", Priority(1), 100)
            .unwrap();
        controller.target = Some(worker_handle);
        kernel
            .create_task(&mut controller, "controller", Priority(2), 100)
            .unwrap();

        let mut now = 0;
        for _ in 0..20 {
            if let Step::Idle { next_wake_ms: Some(t) } = kernel.step(now) {
                now = t;
            }
            if now > 400 {
                break;
            }
        }

        // Worker ran only after the controller's third activation at t=200
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(kernel.stats().suspends, 1);
        assert_eq!(kernel.stats().resumes, 1);
    }

    #[test]
    fn test_idle_hook_runs_when_nothing_ready() {
        let log = RefCell::new(StdVec::new());
        let mut task = Periodic { name: "t", log: &log };
        let mut idle = CountingIdle { calls: 0, last: None };

        {
            let mut kernel: Kernel<'_, 2> = Kernel::new();
            kernel.create_task(&mut task, "t", Priority(1), 100).unwrap();
            kernel.set_idle_hook(&mut idle);

            kernel.step(0);
            kernel.step(10);
            kernel.step(20);
            assert_eq!(kernel.stats().idle_calls, 2);
        }

        assert_eq!(idle.calls, 2);
        assert_eq!(idle.last, Some(IdleInfo { now_ms: 20, task_count: 1 }));
    }

    #[test]
    fn test_spawn_failure_halts_kernel() {
        let mut a = Busy { runs: 0 };
        let mut b = Busy { runs: 0 };

        {
            let mut kernel: Kernel<'_, 1> = Kernel::new();
            kernel.create_task(&mut a, "a", Priority(1), 10).unwrap();

            let err = kernel.create_task(&mut b, "b", Priority(1), 10).unwrap_err();
            assert_eq!(err, SpawnError::Capacity { name: "b" });

            let halt = Halt::Spawn(SpawnError::Capacity { name: "b" });
            assert_eq!(kernel.step(0), Step::Halted(halt));
            assert_eq!(kernel.step(100), Step::Halted(halt));
            assert_eq!(kernel.run(&mut JumpClock { now: 0 }), halt);
        }

        // No task was ever scheduled
        assert_eq!(a.runs, 0);
        assert_eq!(b.runs, 0);
    }

    #[test]
    fn test_fault_terminates_task_and_halts() {
        struct Faulty;

        impl Task for Faulty {
            fn run(&mut self, cx: &mut Context<'_>) {
                cx.fault(Fault::StackOverflow);
            }
        }

        let log = RefCell::new(StdVec::new());
        let mut faulty = Faulty;
        let mut other = Periodic { name: "other", log: &log };

        let mut kernel: Kernel<'_, 2> = Kernel::new();
        let handle = kernel.create_task(&mut faulty, "faulty", Priority(2), 10).unwrap();
        kernel.create_task(&mut other, "other", Priority(1), 10).unwrap();

        let halt = kernel.run(&mut JumpClock { now: 0 });
        assert_eq!(
            halt,
            Halt::Fault {
                task: "faulty",
                fault: Fault::StackOverflow
            }
        );
        assert_eq!(kernel.state(handle), Some(TaskState::Terminated));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_late_release_counts_deadline_miss() {
        let log = RefCell::new(StdVec::new());
        let mut task = Periodic { name: "t", log: &log };

        let mut kernel: Kernel<'_, 1> = Kernel::new();
        let handle = kernel.create_task(&mut task, "t", Priority(1), 100).unwrap();

        kernel.step(0);
        kernel.step(150); // released at 100, 50 ms late
        kernel.step(450); // released at 250, 200 ms late

        let info = kernel.info(handle).unwrap();
        assert_eq!(info.activations, 3);
        assert_eq!(info.deadline_misses, 1);
    }

    #[test]
    fn test_run_follows_clock_deadlines() {
        struct StopAfter {
            runs: u32,
            seen: StdVec<u64>,
        }

        impl Task for StopAfter {
            fn run(&mut self, cx: &mut Context<'_>) {
                self.runs += 1;
                self.seen.push(cx.now_ms());
                if self.runs == 4 {
                    cx.fault(Fault::StackOverflow);
                } else {
                    cx.delay(250);
                }
            }
        }

        let mut task = StopAfter { runs: 0, seen: StdVec::new() };
        {
            let mut kernel: Kernel<'_, 1> = Kernel::new();
            kernel.create_task(&mut task, "t", Priority(1), 250).unwrap();
            kernel.run(&mut JumpClock { now: 0 });
        }

        assert_eq!(task.seen, [0, 250, 500, 750]);
    }
}
