//! Task definitions

use crate::bridge::{Transaction, TransactionStatus};

use super::kernel::Context;

/// Task priority (larger is more urgent)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Priority(pub u8);

/// Handle to a task created on a kernel
///
/// Handles are only minted by [`Kernel::create_task`](super::Kernel::create_task)
/// and are the capability other tasks use to suspend or resume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskHandle(u8);

impl TaskHandle {
    pub(crate) fn new(index: u8) -> Self {
        Self(index)
    }

    /// Index of the task in its kernel's table
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scheduling state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TaskState {
    /// Eligible to run
    Ready,
    /// Currently executing an activation
    Running,
    /// Waiting for its own delay to expire
    Delayed {
        /// Wake deadline in milliseconds
        until_ms: u64,
    },
    /// Frozen by another task until explicitly resumed
    Suspended {
        /// Pending delay deadline, if the task was delayed when suspended
        wake_ms: Option<u64>,
    },
    /// Stopped after an unrecoverable fault
    Terminated,
}

impl TaskState {
    /// Whether the task is ready or running
    pub fn is_active(self) -> bool {
        matches!(self, TaskState::Ready | TaskState::Running)
    }

    /// Whether the task is suspended
    pub fn is_suspended(self) -> bool {
        matches!(self, TaskState::Suspended { .. })
    }
}

/// Snapshot of a task's bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskInfo {
    /// Task name
    pub name: &'static str,
    /// Task priority
    pub priority: Priority,
    /// Task period in milliseconds
    pub period_ms: u32,
    /// Current state
    pub state: TaskState,
    /// Number of activations run so far
    pub activations: u32,
    /// Number of releases dispatched a full period or more late
    pub deadline_misses: u32,
}

/// A periodic unit of work
///
/// Each call to [`run`](Task::run) is one activation: the body does its
/// work for this period and then yields, normally with
/// [`Context::delay_period`]. A body that returns without delaying stays
/// ready and is dispatched again.
pub trait Task {
    /// Run one activation
    fn run(&mut self, cx: &mut Context<'_>);
}

/// Unrecoverable task fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Task exhausted its stack
    StackOverflow,
    /// Hardware transaction failed under the abort policy
    Hardware {
        /// Failed operation
        transaction: Transaction,
        /// Status reported by the hardware
        status: TransactionStatus,
    },
}

/// Task creation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpawnError {
    /// The task table is full
    Capacity {
        /// Name of the task that did not fit
        name: &'static str,
    },
    /// The kernel has already halted
    Halted,
}

/// Why the kernel stopped scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Halt {
    /// Task creation failed at startup
    Spawn(SpawnError),
    /// A task faulted
    Fault {
        /// Name of the faulting task
        task: &'static str,
        /// What went wrong
        fault: Fault,
    },
}
