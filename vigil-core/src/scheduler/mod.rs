//! Periodic task scheduler
//!
//! A fixed set of periodic tasks, each with a priority and a period,
//! dispatched by priority, with one task able to suspend and resume
//! another. All scheduling state sits in a shared [`TaskTable`]; a
//! [`Kernel`] dispatches every priority from one loop, while [`Level`]s
//! split the table by priority so each can run at its own interrupt
//! priority and preempt the ones below it.

pub mod kernel;
pub mod level;
pub mod table;
pub mod task;

pub use kernel::{Clock, Context, IdleHook, IdleInfo, Kernel, KernelStats, Step, TaskSpawner};
pub use level::{Level, Levels, SendLevel};
pub use table::TaskTable;
pub use task::{Fault, Halt, Priority, SpawnError, Task, TaskHandle, TaskInfo, TaskState};
