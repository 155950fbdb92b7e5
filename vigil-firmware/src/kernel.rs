//! Preemptive kernel wiring
//!
//! Every distinct task priority runs as one [`Level`] on its own
//! interrupt executor. The most urgent level sits on the highest
//! interrupt priority, so a level whose task becomes ready preempts any
//! less urgent level mid-activation. Thread mode only runs once every
//! level is parked, which makes it the idle context.
//!
//! Interrupt priorities (lower is more urgent):
//! - P0: sensor bus executor, peripheral interrupts
//! - P1..P3: kernel levels, most urgent first

use defmt::*;
use embassy_executor::{InterruptExecutor, SendSpawner};
use embassy_futures::select::select;
use embassy_futures::yield_now;
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority as IrqPriority};
use embassy_time::{Instant, Timer};

use vigil_core::node::MAX_LEVELS;
use vigil_core::scheduler::{Fault, SendLevel, Step, TaskTable};

use crate::stack_guard;

/// Kernel task table size
pub const MAX_TASKS: usize = 4;

/// Scheduling state shared by every level and the idle loop
pub static TABLE: TaskTable<MAX_TASKS> = TaskTable::new();

/// One level of the node kernel
pub type NodeLevel = SendLevel<'static, MAX_TASKS>;

static LEVEL_EXECUTORS: [InterruptExecutor; MAX_LEVELS] = [
    InterruptExecutor::new(),
    InterruptExecutor::new(),
    InterruptExecutor::new(),
];

#[interrupt]
unsafe fn SWI_IRQ_1() {
    LEVEL_EXECUTORS[0].on_interrupt()
}

#[interrupt]
unsafe fn SWI_IRQ_2() {
    LEVEL_EXECUTORS[1].on_interrupt()
}

#[interrupt]
unsafe fn SWI_IRQ_3() {
    LEVEL_EXECUTORS[2].on_interrupt()
}

/// Start the executor for level `rank` (0 is the most urgent)
pub fn start_level(rank: usize) -> SendSpawner {
    match rank {
        0 => {
            interrupt::SWI_IRQ_1.set_priority(IrqPriority::P1);
            LEVEL_EXECUTORS[0].start(interrupt::SWI_IRQ_1)
        }
        1 => {
            interrupt::SWI_IRQ_2.set_priority(IrqPriority::P2);
            LEVEL_EXECUTORS[1].start(interrupt::SWI_IRQ_2)
        }
        _ => {
            interrupt::SWI_IRQ_3.set_priority(IrqPriority::P3);
            LEVEL_EXECUTORS[2].start(interrupt::SWI_IRQ_3)
        }
    }
}

/// Level task - dispatches one priority's kernel tasks
#[embassy_executor::task(pool_size = 3)]
pub async fn level_task(mut level: NodeLevel) {
    let priority = level.priority().0;
    info!(
        "Level {} dispatcher started ({} task(s))",
        priority,
        level.task_count()
    );

    loop {
        // Read before stepping so a change made meanwhile is not missed
        let seen = TABLE.generation();

        match level.step(Instant::now().as_millis()) {
            Step::Ran(handle) => {
                if stack_guard::tripped() {
                    let reason = TABLE.fault(handle, Fault::StackOverflow);
                    error!("Stack guard broken after {:?}: {:?}", handle, reason);
                }
                yield_now().await;
            }
            Step::Idle {
                next_wake_ms: Some(wake_ms),
            } => {
                select(Timer::at(Instant::from_millis(wake_ms)), TABLE.changed(seen)).await;
            }
            Step::Idle { next_wake_ms: None } => TABLE.changed(seen).await,
            Step::Halted(reason) => {
                debug!("Level {} stopped: {:?}", priority, reason);
                return;
            }
        }
    }
}
